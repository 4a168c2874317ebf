use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use thiserror::Error;

use crate::signal::Signal;

/// Raised when assigning directly to a property that is driven by an
/// updater (for example a binding). Writes must go through the updater.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("property is read-only while an updater is attached")]
pub struct ReadOnlyPropertyError;

/// Raised when evaluating an expression whose source property has been
/// destroyed.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("a source property of this expression has been destroyed")]
pub struct PropertyDestroyedError;

/// An external driver that owns the writes to a [`Property`].
///
/// While an updater is attached the property rejects direct assignment;
/// values pushed through the update function still get equality
/// short-circuiting and both change signals. [`Binding`](crate::Binding) is
/// the canonical implementation.
pub trait PropertyUpdater<T> {
	/// The value the driven property should currently hold. Called once on
	/// attachment to seed the property.
	fn get(&self) -> Result<T, PropertyDestroyedError>;

	/// Hands the updater the property's privileged write path. The updater
	/// calls `update` whenever it produces a new value.
	fn set_update_function(&mut self, update: Box<dyn Fn(T)>);
}

// The pinned cell every observer of a property actually references. The
// `Property` value itself is a thin movable owner; handles into this cell
// survive any move of the owner.
pub(crate) struct PropertyShared<T> {
	value: RefCell<T>,
	value_changed: Signal<T>,
	value_about_to_change: Signal<(T, T)>,
	destroyed: Signal<()>,
	updater: RefCell<Option<Box<dyn PropertyUpdater<T>>>>,
}

impl<T: 'static> PropertyShared<T> {
	fn new(value: T) -> Rc<Self> {
		Rc::new(PropertyShared {
			value: RefCell::new(value),
			value_changed: Signal::new(),
			value_about_to_change: Signal::new(),
			destroyed: Signal::new(),
			updater: RefCell::new(None),
		})
	}

	pub(crate) fn current(&self) -> T
	where
		T: Clone,
	{
		self.value.borrow().clone()
	}

	// The privileged write path: equality short-circuit plus both change
	// signals, but no read-only check. Signals are emitted on clones so no
	// cell borrow is held while user slots run.
	pub(crate) fn update(&self, value: T)
	where
		T: PartialEq + Clone,
	{
		if value == *self.value.borrow() {
			return;
		}

		let change = (self.value.borrow().clone(), value);
		self.value_about_to_change.emit(&change);

		let (_, value) = change;
		let current = value.clone();
		*self.value.borrow_mut() = value;
		self.value_changed.emit(&current);
	}
}

/// An observable value.
///
/// Mutations through [`set`](Self::set) are equality short-circuited and
/// broadcast through [`value_about_to_change`](Self::value_about_to_change)
/// and [`value_changed`](Self::value_changed). Dropping the property emits
/// [`destroyed`](Self::destroyed) so listeners can let go of it.
///
/// Properties are move-only. The observable state is pinned behind the
/// moving owner, so connections and expression nodes keep working across
/// moves of the `Property` value itself.
pub struct Property<T> {
	shared: Rc<PropertyShared<T>>,
}

impl<T: 'static> Property<T> {
	pub fn new(value: T) -> Self {
		Property {
			shared: PropertyShared::new(value),
		}
	}

	/// Borrows the current value.
	pub fn get(&self) -> Ref<'_, T> {
		self.shared.value.borrow()
	}

	/// Mutable access to the stored value, bypassing change detection.
	/// Callers that mutate through this borrow are responsible for invoking
	/// any change semantics themselves.
	pub fn get_mut(&self) -> RefMut<'_, T> {
		self.shared.value.borrow_mut()
	}

	/// Emitted with the new value after every effective mutation.
	pub fn value_changed(&self) -> &Signal<T> {
		&self.shared.value_changed
	}

	/// Emitted with `(previous, next)` just before an effective mutation is
	/// stored.
	pub fn value_about_to_change(&self) -> &Signal<(T, T)> {
		&self.shared.value_about_to_change
	}

	/// Emitted when the property is dropped, before its signals go away.
	pub fn destroyed(&self) -> &Signal<()> {
		&self.shared.destroyed
	}

	/// Whether an updater is currently driving this property.
	pub fn has_binding(&self) -> bool {
		self.shared.updater.borrow().is_some()
	}

	/// Detaches the updater, if any. Listener connections are untouched and
	/// the property becomes directly writable again.
	pub fn reset(&self) {
		// Drop the detached updater only after the cell borrow is released.
		let updater = self.shared.updater.borrow_mut().take();
		drop(updater);
	}

	pub(crate) fn shared(&self) -> &Rc<PropertyShared<T>> {
		&self.shared
	}
}

impl<T: PartialEq + Clone + 'static> Property<T> {
	/// Assigns a new value.
	///
	/// Rejected while an updater is attached. A value equal to the current
	/// one is dropped silently; custom equality (for example one-way,
	/// monotonic updates) is expressed through the `PartialEq`
	/// implementation of `T`, typically via a newtype. The comparison
	/// evaluates `new == current`.
	pub fn set(&self, value: T) -> Result<(), ReadOnlyPropertyError> {
		if self.shared.updater.borrow().is_some() {
			return Err(ReadOnlyPropertyError);
		}
		self.shared.update(value);
		Ok(())
	}

	/// Creates a property driven by `updater`: the initial value is pulled
	/// from it, the privileged write path is handed to it, and direct
	/// assignment is rejected from then on.
	pub fn with_updater(updater: Box<dyn PropertyUpdater<T>>) -> Result<Self, PropertyDestroyedError> {
		let property = Property::new(updater.get()?);
		property.attach(updater);
		Ok(property)
	}

	/// Replaces the current updater with `updater`.
	///
	/// Listener connections on the property's signals are preserved; the
	/// value produced by the new updater is pushed through the privileged
	/// path, emitting [`value_changed`](Self::value_changed) if it differs.
	pub fn set_updater(&self, updater: Box<dyn PropertyUpdater<T>>) -> Result<(), PropertyDestroyedError> {
		let value = updater.get()?;
		let previous = self.shared.updater.borrow_mut().take();
		drop(previous);
		self.attach(updater);
		self.shared.update(value);
		Ok(())
	}

	fn attach(&self, mut updater: Box<dyn PropertyUpdater<T>>) {
		let shared = Rc::downgrade(&self.shared);
		updater.set_update_function(Box::new(move |value| {
			if let Some(shared) = shared.upgrade() {
				shared.update(value);
			}
		}));
		*self.shared.updater.borrow_mut() = Some(updater);
	}
}

impl<T> Drop for Property<T> {
	fn drop(&mut self) {
		// Listeners get a chance to null out their references before the
		// signals themselves disappear.
		self.shared.destroyed.emit(&());
	}
}

impl<T: std::fmt::Debug + 'static> std::fmt::Debug for Property<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Property")
			.field("value", &*self.get())
			.field("bound", &self.has_binding())
			.finish()
	}
}

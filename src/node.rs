use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::connection::ScopedConnection;
use crate::property::{Property, PropertyDestroyedError, PropertyShared};

// Change notifications flow through this callback: property leaves invoke it
// whenever they are marked dirty. Bindings install one to drive immediate
// re-evaluation.
pub(crate) type DirtyHandler = Rc<dyn Fn()>;

trait NodeBody<T> {
	fn evaluate(&self) -> Result<T, PropertyDestroyedError>;
	fn is_dirty(&self) -> bool;
	fn set_dirty_handler(&self, handler: Option<DirtyHandler>);
}

/// A vertex in a lazy expression graph over properties and constants.
///
/// Nodes track the dirtiness of their inputs; [`evaluate`](Self::evaluate)
/// on a clean node returns the cached result without invoking any user
/// callable. Nodes are move-only, and their bookkeeping is pinned in shared
/// cells, so moving a node (or a source [`Property`]) never breaks the
/// change tracking.
pub struct Node<T> {
	body: Box<dyn NodeBody<T>>,
}

impl<T: Clone + PartialEq + 'static> Node<T> {
	/// A leaf holding a fixed value. Never dirty.
	pub fn constant(value: T) -> Self {
		Node {
			body: Box::new(ConstantNode { value }),
		}
	}

	/// A leaf observing `property`.
	///
	/// The node holds the property weakly and never extends its lifetime;
	/// once the property is dropped the node is poisoned and evaluation
	/// fails with [`PropertyDestroyedError`].
	pub fn from_property(property: &Property<T>) -> Self {
		let dirty = Rc::new(Cell::new(false));
		let poisoned = Rc::new(Cell::new(false));
		let handler: Rc<RefCell<Option<DirtyHandler>>> = Rc::new(RefCell::new(None));

		let changed = property.value_changed().connect({
			let dirty = dirty.clone();
			let handler = handler.clone();
			move |_: &T| {
				dirty.set(true);
				let installed = handler.borrow().clone();
				if let Some(installed) = installed {
					installed();
				}
			}
		});
		// Poisoning propagates like a dirtying change: composite nodes must
		// re-descend and surface the dead source instead of serving their
		// cached value, and installed handlers must get woken for it.
		let destroyed = property.destroyed().connect({
			let poisoned = poisoned.clone();
			let handler = handler.clone();
			move || {
				poisoned.set(true);
				let installed = handler.borrow().clone();
				if let Some(installed) = installed {
					installed();
				}
			}
		});

		Node {
			body: Box::new(PropertyNode {
				source: Rc::downgrade(property.shared()),
				dirty,
				poisoned,
				handler,
				_changed: changed.into(),
				_destroyed: destroyed.into(),
			}),
		}
	}

	/// Applies `func` to this node's value, producing a new node.
	///
	/// The function is applied eagerly once at construction and afterwards
	/// only when a re-evaluated input actually changed; it must be pure
	/// with respect to its argument.
	pub fn map<U, F>(self, func: F) -> Node<U>
	where
		U: Clone + 'static,
		F: Fn(&T) -> U + 'static,
	{
		let body = UnaryNode {
			func,
			child: self,
			cached: RefCell::new(None),
			last_input: RefCell::new(None),
		};
		let _ = body.evaluate();
		Node { body: Box::new(body) }
	}

	/// Combines this node with `other` through `func`. Same evaluation
	/// contract as [`map`](Self::map).
	pub fn zip_with<U, R, F>(self, other: Node<U>, func: F) -> Node<R>
	where
		U: Clone + PartialEq + 'static,
		R: Clone + 'static,
		F: Fn(&T, &U) -> R + 'static,
	{
		let body = BinaryNode {
			func,
			left: self,
			right: other,
			cached: RefCell::new(None),
			last_input: RefCell::new(None),
		};
		let _ = body.evaluate();
		Node { body: Box::new(body) }
	}
}

impl<T> Node<T> {
	/// Computes the node's current value, re-running user functions only
	/// along dirty paths.
	pub fn evaluate(&self) -> Result<T, PropertyDestroyedError> {
		self.body.evaluate()
	}

	/// Whether any source property changed since the last evaluation.
	pub fn is_dirty(&self) -> bool {
		self.body.is_dirty()
	}

	pub(crate) fn set_dirty_handler(&self, handler: Option<DirtyHandler>) {
		self.body.set_dirty_handler(handler);
	}
}

struct ConstantNode<T> {
	value: T,
}

impl<T: Clone> NodeBody<T> for ConstantNode<T> {
	fn evaluate(&self) -> Result<T, PropertyDestroyedError> {
		Ok(self.value.clone())
	}

	fn is_dirty(&self) -> bool {
		false
	}

	fn set_dirty_handler(&self, _handler: Option<DirtyHandler>) {}
}

struct PropertyNode<T> {
	source: Weak<PropertyShared<T>>,
	dirty: Rc<Cell<bool>>,
	poisoned: Rc<Cell<bool>>,
	handler: Rc<RefCell<Option<DirtyHandler>>>,
	_changed: ScopedConnection,
	_destroyed: ScopedConnection,
}

impl<T: Clone + 'static> NodeBody<T> for PropertyNode<T> {
	fn evaluate(&self) -> Result<T, PropertyDestroyedError> {
		if self.poisoned.get() {
			return Err(PropertyDestroyedError);
		}
		let source = self.source.upgrade().ok_or(PropertyDestroyedError)?;
		self.dirty.set(false);
		Ok(source.current())
	}

	fn is_dirty(&self) -> bool {
		self.dirty.get() || self.poisoned.get()
	}

	fn set_dirty_handler(&self, handler: Option<DirtyHandler>) {
		*self.handler.borrow_mut() = handler;
	}
}

struct UnaryNode<T, U, F> {
	func: F,
	child: Node<T>,
	cached: RefCell<Option<U>>,
	last_input: RefCell<Option<T>>,
}

impl<T, U, F> NodeBody<U> for UnaryNode<T, U, F>
where
	T: Clone + PartialEq + 'static,
	U: Clone + 'static,
	F: Fn(&T) -> U,
{
	fn evaluate(&self) -> Result<U, PropertyDestroyedError> {
		if !self.child.is_dirty() {
			if let Some(cached) = self.cached.borrow().as_ref() {
				return Ok(cached.clone());
			}
		}

		let input = self.child.evaluate()?;

		// A dirty child may still produce the value we already computed
		// with; only a changed input re-applies the function.
		if self.last_input.borrow().as_ref() == Some(&input) {
			if let Some(cached) = self.cached.borrow().as_ref() {
				return Ok(cached.clone());
			}
		}

		let value = (self.func)(&input);
		*self.last_input.borrow_mut() = Some(input);
		*self.cached.borrow_mut() = Some(value.clone());
		Ok(value)
	}

	fn is_dirty(&self) -> bool {
		self.child.is_dirty() || self.cached.borrow().is_none()
	}

	fn set_dirty_handler(&self, handler: Option<DirtyHandler>) {
		self.child.set_dirty_handler(handler);
	}
}

struct BinaryNode<T, U, R, F> {
	func: F,
	left: Node<T>,
	right: Node<U>,
	cached: RefCell<Option<R>>,
	last_input: RefCell<Option<(T, U)>>,
}

impl<T, U, R, F> NodeBody<R> for BinaryNode<T, U, R, F>
where
	T: Clone + PartialEq + 'static,
	U: Clone + PartialEq + 'static,
	R: Clone + 'static,
	F: Fn(&T, &U) -> R,
{
	fn evaluate(&self) -> Result<R, PropertyDestroyedError> {
		if !self.left.is_dirty() && !self.right.is_dirty() {
			if let Some(cached) = self.cached.borrow().as_ref() {
				return Ok(cached.clone());
			}
		}

		let input = (self.left.evaluate()?, self.right.evaluate()?);
		if self.last_input.borrow().as_ref() == Some(&input) {
			if let Some(cached) = self.cached.borrow().as_ref() {
				return Ok(cached.clone());
			}
		}

		let value = (self.func)(&input.0, &input.1);
		*self.last_input.borrow_mut() = Some(input);
		*self.cached.borrow_mut() = Some(value.clone());
		Ok(value)
	}

	fn is_dirty(&self) -> bool {
		self.left.is_dirty() || self.right.is_dirty() || self.cached.borrow().is_none()
	}

	fn set_dirty_handler(&self, handler: Option<DirtyHandler>) {
		// Both subtrees report into the same handler; the binding layer
		// only cares that something under the root changed.
		self.left.set_dirty_handler(handler.clone());
		self.right.set_dirty_handler(handler);
	}
}

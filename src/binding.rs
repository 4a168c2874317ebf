use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::node::Node;
use crate::property::{Property, PropertyDestroyedError, PropertyUpdater};

type BindingThunk = Rc<dyn Fn() -> Result<(), PropertyDestroyedError>>;

#[derive(Default)]
struct BindingEvaluatorBody {
	next_id: Cell<u64>,
	bindings: RefCell<Vec<(u64, BindingThunk)>>,
}

/// Coordinates batched re-evaluation of a group of manual-mode
/// [`Binding`]s.
///
/// Cloning an evaluator shares the underlying sequence; identity is the
/// sequence itself. Bindings register themselves at construction and are
/// replayed by [`evaluate_all`](Self::evaluate_all) in creation order.
#[derive(Clone, Default)]
pub struct BindingEvaluator {
	body: Rc<BindingEvaluatorBody>,
}

impl BindingEvaluator {
	pub fn new() -> Self {
		Self::default()
	}

	/// Re-evaluates every registered binding, in the order the bindings
	/// were created. Clean bindings short-circuit inside the node layer.
	pub fn evaluate_all(&self) -> Result<(), PropertyDestroyedError> {
		// Replay a snapshot so binding thunks may register or remove
		// bindings without invalidating the iteration.
		let thunks: Vec<BindingThunk> = self
			.body
			.bindings
			.borrow()
			.iter()
			.map(|(_, thunk)| thunk.clone())
			.collect();
		tracing::debug!(bindings = thunks.len(), "evaluating bindings");
		for thunk in thunks {
			thunk()?;
		}
		Ok(())
	}

	fn register(&self, thunk: BindingThunk) -> u64 {
		let id = self.body.next_id.get();
		self.body.next_id.set(id + 1);
		self.body.bindings.borrow_mut().push((id, thunk));
		id
	}

	fn remove(&self, id: u64) {
		self.body.bindings.borrow_mut().retain(|(entry, _)| *entry != id);
	}
}

struct BindingBody<T> {
	node: Node<T>,
	update: RefCell<Option<Box<dyn Fn(T)>>>,
}

impl<T: Clone + PartialEq + 'static> BindingBody<T> {
	// Evaluates the root and pushes the result into the driven property,
	// if one is attached yet.
	fn refresh(&self) -> Result<(), PropertyDestroyedError> {
		let value = self.node.evaluate()?;
		if let Some(update) = self.update.borrow().as_ref() {
			update(value);
		}
		Ok(())
	}
}

/// Publishes the value of an expression [`Node`] into a [`Property`].
///
/// A binding is a [`PropertyUpdater`]: attach it with
/// [`Property::with_updater`] or [`Property::set_updater`], or use the
/// [`bind`] / [`bind_immediate`] helpers. In manual mode recomputation
/// happens when the associated [`BindingEvaluator`] replays; in immediate
/// mode every source change re-evaluates and writes through synchronously.
pub struct Binding<T> {
	body: Rc<BindingBody<T>>,
	evaluator: Option<(BindingEvaluator, u64)>,
}

impl<T: Clone + PartialEq + 'static> Binding<T> {
	/// A manual-mode binding: source changes only mark the expression
	/// dirty, and `evaluator.evaluate_all()` performs the recomputation.
	pub fn new(node: Node<T>, evaluator: &BindingEvaluator) -> Self {
		let body = Rc::new(BindingBody {
			node,
			update: RefCell::new(None),
		});
		let thunk = Rc::downgrade(&body);
		let id = evaluator.register(Rc::new(move || match thunk.upgrade() {
			Some(body) => body.refresh(),
			None => Ok(()),
		}));
		Binding {
			body,
			evaluator: Some((evaluator.clone(), id)),
		}
	}

	/// An immediate-mode binding: every source change synchronously
	/// re-evaluates the expression and writes the result through.
	pub fn new_immediate(node: Node<T>) -> Self {
		let body = Rc::new(BindingBody {
			node,
			update: RefCell::new(None),
		});
		let handler = Rc::downgrade(&body);
		body.node.set_dirty_handler(Some(Rc::new(move || {
			if let Some(body) = handler.upgrade() {
				if let Err(error) = body.refresh() {
					tracing::warn!(%error, "immediate binding skipped a refresh");
				}
			}
		})));
		Binding {
			body,
			evaluator: None,
		}
	}
}

impl<T: Clone + PartialEq + 'static> PropertyUpdater<T> for Binding<T> {
	fn get(&self) -> Result<T, PropertyDestroyedError> {
		self.body.node.evaluate()
	}

	fn set_update_function(&mut self, update: Box<dyn Fn(T)>) {
		*self.body.update.borrow_mut() = Some(update);
	}
}

impl<T> Drop for Binding<T> {
	fn drop(&mut self) {
		if let Some((evaluator, id)) = self.evaluator.take() {
			evaluator.remove(id);
		}
	}
}

/// Creates a read-only property driven by `node` under manual evaluation:
/// the value refreshes when `evaluator.evaluate_all()` runs.
pub fn bind<T: Clone + PartialEq + 'static>(
	evaluator: &BindingEvaluator,
	node: Node<T>,
) -> Result<Property<T>, PropertyDestroyedError> {
	Property::with_updater(Box::new(Binding::new(node, evaluator)))
}

/// Creates a read-only property driven by `node`, refreshed synchronously
/// on every source change.
pub fn bind_immediate<T: Clone + PartialEq + 'static>(
	node: Node<T>,
) -> Result<Property<T>, PropertyDestroyedError> {
	Property::with_updater(Box::new(Binding::new_immediate(node)))
}

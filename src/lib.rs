//! Signals, observable properties and lazily evaluated property bindings.
//!
//! The three layers build on each other:
//!
//! - [`Signal`] is a type-safe, multi-listener callback emitter with
//!   generation-checked [`ConnectionHandle`]s, reentrancy-safe emission and
//!   deferred cross-thread delivery through a [`ConnectionEvaluator`].
//! - [`Property`] wraps a value and broadcasts its mutations through
//!   signals, with equality short-circuiting and an updater seam that turns
//!   a property read-only while something else drives it.
//! - [`Node`] and [`Binding`] form a dirty-tracked expression graph over
//!   properties whose result is published into a read-only output property,
//!   either immediately on every change or batched through a
//!   [`BindingEvaluator`].
//!
//! ```
//! use tether::{bind, BindingEvaluator, Node, Property};
//!
//! let a = Property::new(8);
//! let b = Property::new(7);
//!
//! let evaluator = BindingEvaluator::new();
//! let sum = bind(
//! 	&evaluator,
//! 	Node::from_property(&a).zip_with(Node::from_property(&b), |a, b| a + b),
//! )
//! .unwrap();
//! assert_eq!(*sum.get(), 15);
//!
//! a.set(13).unwrap();
//! assert_eq!(*sum.get(), 15);
//!
//! evaluator.evaluate_all().unwrap();
//! assert_eq!(*sum.get(), 20);
//! ```
//!
//! Everything except [`ConnectionEvaluator`] is single-threaded; see the
//! individual types for the exact contracts.

mod binding;
mod connection;
mod evaluator;
mod gen_index;
mod node;
mod property;
mod signal;

pub use binding::{bind, bind_immediate, Binding, BindingEvaluator};
pub use connection::{ConnectionHandle, OutOfRangeError, ScopedConnection};
pub use evaluator::ConnectionEvaluator;
pub use gen_index::{GenerationalIndex, GenerationalIndexArray};
pub use node::Node;
pub use property::{Property, PropertyDestroyedError, PropertyUpdater, ReadOnlyPropertyError};
pub use signal::{ConnectionBlocker, IntoDeferredSlot, IntoSlot, PayloadSlot, Signal, UnitSlot};

use std::cell::Cell;
use std::rc::Rc;

use tether::{
	bind, bind_immediate, Binding, BindingEvaluator, Node, Property, PropertyUpdater,
	ReadOnlyPropertyError,
};

#[test]
fn a_manual_binding_evaluates_on_demand() {
	let evaluator = BindingEvaluator::new();
	let binding = Binding::new(Node::constant(7), &evaluator);

	assert_eq!(binding.get(), Ok(7));
}

#[test]
fn a_property_can_be_constructed_from_a_binding() {
	let evaluator = BindingEvaluator::new();
	let property = Property::with_updater(Box::new(Binding::new(Node::constant(42), &evaluator))).unwrap();

	assert_eq!(*property.get(), 42);
}

#[test]
fn assigning_to_a_bound_property_fails() {
	let evaluator = BindingEvaluator::new();
	let property = bind(&evaluator, Node::constant(42)).unwrap();

	assert_eq!(property.set(3), Err(ReadOnlyPropertyError));
	assert_eq!(*property.get(), 42);
}

#[test]
fn input_changes_reach_the_output_when_the_evaluator_runs() {
	let evaluator = BindingEvaluator::new();
	let input = Property::new(5);
	let output = bind(&evaluator, Node::from_property(&input).map(|x| x * x)).unwrap();

	assert_eq!(*input.get(), 5);
	assert_eq!(*output.get(), 25);

	input.set(8).unwrap();
	assert_eq!(*output.get(), 25);

	evaluator.evaluate_all().unwrap();
	assert_eq!(*output.get(), 64);
}

#[test]
fn multiple_bindings_with_independent_inputs_update_together() {
	let evaluator = BindingEvaluator::new();

	let input1 = Property::new(5);
	let prop1 = bind(&evaluator, Node::from_property(&input1).map(|x| x * x)).unwrap();

	let input2 = Property::new(6);
	let prop2 = bind(&evaluator, Node::from_property(&input2).map(|x| 3 * x)).unwrap();

	assert_eq!(*prop1.get(), 25);
	assert_eq!(*prop2.get(), 18);

	input1.set(4).unwrap();
	input2.set(12).unwrap();

	assert_eq!(*prop1.get(), 25);
	assert_eq!(*prop2.get(), 18);

	evaluator.evaluate_all().unwrap();

	assert_eq!(*prop1.get(), 16);
	assert_eq!(*prop2.get(), 36);
}

#[test]
fn multiple_bindings_may_share_an_input() {
	let evaluator = BindingEvaluator::new();
	let input = Property::new(5);

	let prop1 = bind(&evaluator, Node::from_property(&input).map(|x| x * x)).unwrap();
	let prop2 = bind(&evaluator, Node::from_property(&input).map(|x| 3 * x)).unwrap();

	assert_eq!(*prop1.get(), 25);
	assert_eq!(*prop2.get(), 15);

	input.set(8).unwrap();
	evaluator.evaluate_all().unwrap();

	assert_eq!(*prop1.get(), 64);
	assert_eq!(*prop2.get(), 24);
}

#[test]
fn bindings_evaluate_in_creation_order() {
	let evaluator = BindingEvaluator::new();
	let ordering = Rc::new(std::cell::RefCell::new(Vec::new()));

	let input = Property::new(5);

	let prop1 = bind(&evaluator, Node::from_property(&input).map(|x| x * x)).unwrap();
	let _order1 = prop1.value_changed().connect({
		let ordering = ordering.clone();
		move || ordering.borrow_mut().push(1)
	});

	let prop2 = bind(&evaluator, Node::from_property(&input).map(|x| 3 * x)).unwrap();
	let _order2 = prop2.value_changed().connect({
		let ordering = ordering.clone();
		move || ordering.borrow_mut().push(2)
	});

	input.set(8).unwrap();
	evaluator.evaluate_all().unwrap();

	assert_eq!(*ordering.borrow(), vec![1, 2]);
}

#[test]
fn helper_wraps_constants_properties_and_functions() {
	let evaluator = BindingEvaluator::new();

	let constant = bind(&evaluator, Node::constant(7)).unwrap();
	assert_eq!(*constant.get(), 7);

	let input = Property::new(18);
	let mirrored = bind(&evaluator, Node::from_property(&input)).unwrap();
	assert_eq!(*mirrored.get(), 18);

	let squared = bind(&evaluator, Node::from_property(&input).map(|x| x * x)).unwrap();
	assert_eq!(*squared.get(), 324);
}

#[test]
fn a_manual_binding_holds_its_value_until_evaluated() {
	let evaluator = BindingEvaluator::new();
	let a = Property::new(8);
	let b = Property::new(7);
	let x = bind(
		&evaluator,
		Node::from_property(&a).zip_with(Node::from_property(&b), |a, b| a + b),
	)
	.unwrap();
	assert_eq!(*x.get(), 15);

	a.set(13).unwrap();
	assert_eq!(*x.get(), 15);

	evaluator.evaluate_all().unwrap();
	assert_eq!(*x.get(), 20);
}

#[test]
fn an_immediate_binding_writes_through_synchronously() {
	let a = Property::new(8);
	let b = Property::new(7);
	let x = bind_immediate(Node::from_property(&a).zip_with(Node::from_property(&b), |a, b| a + b))
		.unwrap();
	assert_eq!(*x.get(), 15);

	a.set(13).unwrap();
	assert_eq!(*x.get(), 20);

	b.set(10).unwrap();
	assert_eq!(*x.get(), 23);
}

#[test]
fn an_immediate_binding_notifies_output_listeners() {
	let input = Property::new(2);
	let output = bind_immediate(Node::from_property(&input).map(|x| 2 * x)).unwrap();

	let seen = Rc::new(Cell::new(None));
	let _handle = output.value_changed().connect({
		let seen = seen.clone();
		move |value: &i32| seen.set(Some(*value))
	});

	input.set(4).unwrap();
	assert_eq!(seen.get(), Some(8));
}

#[test]
fn an_immediate_binding_survives_losing_its_source() {
	let source = Property::new(3);
	let output = bind_immediate(Node::from_property(&source).map(|x| x + 1)).unwrap();
	assert_eq!(*output.get(), 4);

	// Dropping the source wakes the binding, whose refresh now fails; the
	// write is skipped and the output keeps its last value.
	drop(source);
	assert_eq!(*output.get(), 4);
}

#[test]
fn a_binding_can_be_replaced_by_another_binding() {
	let source = Property::new(0);
	let bound = bind_immediate(Node::from_property(&source)).unwrap();

	assert_eq!(bound.set(1), Err(ReadOnlyPropertyError));

	let another_source = Property::new(1);
	bound
		.set_updater(Box::new(Binding::new_immediate(Node::from_property(&another_source))))
		.unwrap();

	assert_eq!(*bound.get(), 1);

	another_source.set(10).unwrap();
	assert_eq!(*bound.get(), 10);
}

#[test]
fn replacing_a_binding_keeps_listener_connections() {
	let called = Rc::new(Cell::new(false));

	let source = Property::new(0);
	let bound = bind_immediate(Node::from_property(&source)).unwrap();

	let _handle = bound.value_changed().connect({
		let called = called.clone();
		move || called.set(true)
	});

	assert!(!called.get());

	let another_source = Property::new(1);
	bound
		.set_updater(Box::new(Binding::new_immediate(Node::from_property(&another_source))))
		.unwrap();

	assert!(called.get());

	called.set(false);
	another_source.set(10).unwrap();
	assert!(called.get());
}

#[test]
fn reset_breaks_the_binding_without_touching_listeners() {
	let value = Property::new(2);
	let result = bind_immediate(Node::from_property(&value).map(|x| 2 * x)).unwrap();

	assert_eq!(*result.get(), 4);

	result.reset();
	value.set(4).unwrap();

	assert_eq!(*result.get(), 4);
	assert!(!result.has_binding());
}

#[test]
fn a_dropped_binding_leaves_the_evaluator() {
	let evaluator = BindingEvaluator::new();
	let input = Property::new(5);

	let output = bind(&evaluator, Node::from_property(&input).map(|x| x + 1)).unwrap();
	assert_eq!(*output.get(), 6);

	drop(output);

	// The dropped binding must have deregistered its thunk; a stale one
	// would try to write into a dead property.
	input.set(9).unwrap();
	evaluator.evaluate_all().unwrap();
}

#[test]
fn evaluator_clones_share_the_same_sequence() {
	let evaluator = BindingEvaluator::new();
	let clone = evaluator.clone();

	let input = Property::new(1);
	let output = bind(&evaluator, Node::from_property(&input)).unwrap();

	input.set(2).unwrap();
	clone.evaluate_all().unwrap();

	assert_eq!(*output.get(), 2);
}

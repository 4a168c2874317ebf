use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::Arc;

use tether::{ConnectionEvaluator, Signal};

#[test]
fn deferred_slots_run_only_when_evaluated() {
	let signal = Signal::<i32>::new();
	let evaluator = Arc::new(ConnectionEvaluator::new());
	let total = Arc::new(AtomicI32::new(4));

	let _handle = signal.connect_deferred(&evaluator, {
		let total = total.clone();
		move |value: &i32| {
			total.fetch_add(*value, Ordering::SeqCst);
		}
	});

	signal.emit(&2);
	signal.emit(&3);
	assert_eq!(total.load(Ordering::SeqCst), 4);

	evaluator.evaluate_deferred_connections();
	assert_eq!(total.load(Ordering::SeqCst), 9);
}

#[test]
fn evaluating_twice_runs_each_invocation_once() {
	let signal = Signal::<()>::new();
	let evaluator = Arc::new(ConnectionEvaluator::new());
	let count = Arc::new(AtomicUsize::new(0));

	let _handle = signal.connect_deferred(&evaluator, {
		let count = count.clone();
		move || {
			count.fetch_add(1, Ordering::SeqCst);
		}
	});

	signal.emit(&());
	evaluator.evaluate_deferred_connections();
	evaluator.evaluate_deferred_connections();

	assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn queued_invocations_run_in_enqueue_order() {
	let signal = Signal::<i32>::new();
	let evaluator = Arc::new(ConnectionEvaluator::new());
	let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

	let _first = signal.connect_deferred(&evaluator, {
		let order = order.clone();
		move |value: &i32| order.lock().push((1, *value))
	});
	let _second = signal.connect_deferred(&evaluator, {
		let order = order.clone();
		move |value: &i32| order.lock().push((2, *value))
	});

	signal.emit(&10);
	signal.emit(&20);
	evaluator.evaluate_deferred_connections();

	assert_eq!(*order.lock(), vec![(1, 10), (2, 10), (1, 20), (2, 20)]);
}

#[test]
fn disconnecting_cancels_queued_invocations() {
	let signal = Signal::<()>::new();
	let evaluator = Arc::new(ConnectionEvaluator::new());
	let count = Arc::new(AtomicUsize::new(0));

	let mut handle = signal.connect_deferred(&evaluator, {
		let count = count.clone();
		move || {
			count.fetch_add(1, Ordering::SeqCst);
		}
	});

	signal.emit(&());
	handle.disconnect();

	evaluator.evaluate_deferred_connections();
	assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[test]
fn dropping_the_signal_cancels_queued_invocations() {
	let signal = Signal::<()>::new();
	let evaluator = Arc::new(ConnectionEvaluator::new());
	let count = Arc::new(AtomicUsize::new(0));

	let _handle = signal.connect_deferred(&evaluator, {
		let count = count.clone();
		move || {
			count.fetch_add(1, Ordering::SeqCst);
		}
	});

	signal.emit(&());
	drop(signal);

	evaluator.evaluate_deferred_connections();
	assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[test]
fn invocations_are_drained_on_another_thread() {
	let signal = Signal::<i32>::new();
	let evaluator = Arc::new(ConnectionEvaluator::new());
	let total = Arc::new(AtomicI32::new(0));

	let _handle = signal.connect_deferred(&evaluator, {
		let total = total.clone();
		move |value: &i32| {
			total.fetch_add(*value, Ordering::SeqCst);
		}
	});

	signal.emit(&7);
	signal.emit(&8);

	let worker = std::thread::spawn({
		let evaluator = evaluator.clone();
		move || evaluator.evaluate_deferred_connections()
	});
	worker.join().unwrap();

	assert_eq!(total.load(Ordering::SeqCst), 15);
}

#[test]
fn notify_hook_fires_on_every_enqueue() {
	let enqueued = Arc::new(AtomicUsize::new(0));
	let evaluator = Arc::new(ConnectionEvaluator::with_notify({
		let enqueued = enqueued.clone();
		move || {
			enqueued.fetch_add(1, Ordering::SeqCst);
		}
	}));

	let signal = Signal::<()>::new();
	let _handle = signal.connect_deferred(&evaluator, || {});

	signal.emit(&());
	signal.emit(&());

	assert_eq!(enqueued.load(Ordering::SeqCst), 2);
}

#[test]
fn a_slot_may_reenter_the_evaluator() {
	// The queue is drained before any thunk runs, so a thunk that calls
	// back into the evaluator neither deadlocks nor re-runs itself.
	let signal = Signal::<()>::new();
	let evaluator = Arc::new(ConnectionEvaluator::new());
	let count = Arc::new(AtomicUsize::new(0));

	let _handle = signal.connect_deferred(&evaluator, {
		let evaluator = evaluator.clone();
		let count = count.clone();
		move || {
			count.fetch_add(1, Ordering::SeqCst);
			evaluator.evaluate_deferred_connections();
		}
	});

	signal.emit(&());
	evaluator.evaluate_deferred_connections();

	assert_eq!(count.load(Ordering::SeqCst), 1);
}

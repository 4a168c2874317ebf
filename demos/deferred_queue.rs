use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use tether::{ConnectionEvaluator, Signal};

fn main() {
	let signal = Signal::<i32>::new();
	let evaluator = Arc::new(ConnectionEvaluator::new());
	let total = Arc::new(AtomicI32::new(0));

	let _connection = signal.connect_deferred(&evaluator, {
		let total = total.clone();
		move |value: &i32| {
			total.fetch_add(*value, Ordering::SeqCst);
		}
	});

	// Emissions only queue the slot invocations.
	signal.emit(&2);
	signal.emit(&3);
	println!("before evaluation: {}", total.load(Ordering::SeqCst));

	// The queue can be drained from any thread.
	let worker = std::thread::spawn({
		let evaluator = evaluator.clone();
		move || evaluator.evaluate_deferred_connections()
	});
	worker.join().expect("worker thread");

	println!("after evaluation: {}", total.load(Ordering::SeqCst));
}

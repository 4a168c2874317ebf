use tether::{ConnectionBlocker, ScopedConnection, Signal};

fn display_labelled(label: &str, value: i32) {
	println!("{}: {}", label, value);
}

fn main() {
	let signal = Signal::<i32>::new();

	{
		// A ScopedConnection disconnects once it goes out of scope, so a
		// slot borrowing from an object can be tied to that object's
		// lifetime.
		let _guard = ScopedConnection::new(
			signal.connect(|value: &i32| display_labelled("Guard is connected", *value)),
		);

		signal.emit(&1);
	}

	signal.emit(&2);

	let handle = signal.connect(|value: &i32| display_labelled("Connection is not blocked", *value));

	signal.emit(&3);
	{
		// A ConnectionBlocker suppresses the slot for the duration of its
		// scope, a simple way to break feedback loops.
		let _blocker = ConnectionBlocker::new(&handle).expect("connection is active");

		signal.emit(&4);
	}

	signal.emit(&5);
}

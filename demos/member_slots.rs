use std::rc::Rc;

use tether::Signal;

struct Person {
	name: String,
	speak: Signal<String>,
}

impl Person {
	fn new(name: &str) -> Rc<Self> {
		Rc::new(Person {
			name: name.to_owned(),
			speak: Signal::new(),
		})
	}

	fn listen(&self, message: &str) {
		println!("{} received: {}", self.name, message);
	}
}

fn main() {
	let alice = Person::new("Alice");
	let bob = Person::new("Bob");

	// A slot that calls a method captures its receiver; the handle is what
	// unhooks the receiver again.
	let mut connection1 = alice.speak.connect({
		let bob = bob.clone();
		move |message: &String| bob.listen(message)
	});
	let mut connection2 = bob.speak.connect({
		let alice = alice.clone();
		move |message: &String| alice.listen(message)
	});

	alice.speak.emit(&"Have a nice day!".to_owned());
	bob.speak.emit(&"Thank you!".to_owned());

	connection1.disconnect();
	connection2.disconnect();
}

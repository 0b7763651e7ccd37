use crate::env::Env;

// Threaded by reference through the expander, resolver and builtins; forked
// children inherit a copy and their mutations never propagate back.
pub struct State {
	pub env: Env,
}

impl State {
	pub fn new() -> State {
		State { env: Env::from_process() }
	}
}

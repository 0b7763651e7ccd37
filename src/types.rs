#[derive(Debug, PartialEq, Eq)]
pub struct Stage {
	// first token is the command name, the rest are raw arguments
	pub argv: Vec<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct Pipeline {
	pub stages: Vec<Stage>,
}

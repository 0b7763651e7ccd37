mod builtin;
mod config;
mod env;
mod eval;
mod expand;
mod global;
mod job;
mod parser;
mod search;
mod types;

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

fn main() {
	job::setup_shell_signals();
	let mut state = global::State::new();
	config::initialise(&mut state.env);
	let mut rl = match DefaultEditor::new() {
		Ok(rl) => rl,
		Err(e) => {
			eprintln!("msh: {}", e);
			std::process::exit(1);
		}
	};
	loop {
		let prompt = state.env.get("PROMPT").unwrap_or(">> ").to_string();
		match rl.readline(&prompt) {
			Ok(line) => {
				if line.trim().is_empty() {
					continue;
				}
				eval::run_line(&mut state, &line);
			}
			Err(ReadlineError::Interrupted) => continue,
			Err(ReadlineError::Eof) => {
				println!();
				break;
			}
			Err(e) => {
				eprintln!("msh: {}", e);
				break;
			}
		}
	}
}

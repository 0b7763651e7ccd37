use std::collections::HashMap;
use std::env;
use std::ffi::{CString, NulError};
use std::sync::OnceLock;

use regex::Regex;

pub fn is_valid_name(name: &str) -> bool {
	static NAME_RE: OnceLock<Regex> = OnceLock::new();
	let re = NAME_RE.get_or_init(|| Regex::new("^[a-zA-Z_][a-zA-Z0-9_]*$").unwrap());
	re.is_match(name)
}

pub struct Env {
	vars: HashMap<String, String>,
}

impl Env {
	pub fn from_process() -> Env {
		let vars = env::vars().filter(|(k, _)| is_valid_name(k)).collect();
		Env { vars }
	}

	pub fn get(&self, name: &str) -> Option<&str> {
		self.vars.get(name).map(|v| v.as_str())
	}

	// callers validate the name first; the table never holds an invalid key
	pub fn set(&mut self, name: &str, value: &str) {
		debug_assert!(is_valid_name(name));
		self.vars.insert(name.to_string(), value.to_string());
	}

	// rendered once per spawn: children see a snapshot, never the live table
	pub fn envp(&self) -> Result<Vec<CString>, NulError> {
		self.vars
			.iter()
			.map(|(k, v)| CString::new(format!("{}={}", k, v)))
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn name_grammar() {
		assert!(is_valid_name("PATH"));
		assert!(is_valid_name("_x"));
		assert!(is_valid_name("A_1"));
		assert!(!is_valid_name(""));
		assert!(!is_valid_name("1x"));
		assert!(!is_valid_name("A-B"));
		assert!(!is_valid_name("A B"));
	}

	#[test]
	fn set_and_get() {
		let mut e = Env::from_process();
		assert_eq!(e.get("MSH_TEST_UNSET_XYZ"), None);
		e.set("MSH_TEST_KEY", "VALUE");
		assert_eq!(e.get("MSH_TEST_KEY"), Some("VALUE"));
	}

	#[test]
	fn seeded_from_process() {
		let e = Env::from_process();
		assert!(e.get("PATH").is_some());
	}

	#[test]
	fn envp_renders_pairs() {
		let mut e = Env::from_process();
		e.set("MSH_TEST_PAIR", "v");
		let envp = e.envp().unwrap();
		assert!(envp.iter().any(|c| c.to_bytes() == b"MSH_TEST_PAIR=v"));
	}
}

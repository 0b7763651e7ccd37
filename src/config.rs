use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::env::{self, Env};
use crate::expand;

const DEFAULT_PATH: &str = "/bin:/usr/bin:/usr/local/bin:/sbin:/usr/sbin:/usr/local/sbin";
const DEFAULT_PROMPT: &str = ">> ";

pub fn initialise(e: &mut Env) {
	let rc_dir = match e.get("MSHDOTDIR") {
		Some(dir) => PathBuf::from(dir),
		None => PathBuf::from(expand::expand_tilde(e, "~")),
	};
	load_rc(e, &rc_dir.join(".mshrc"));
}

fn load_rc(e: &mut Env, path: &Path) {
	if e.get("PATH").is_none() {
		e.set("PATH", DEFAULT_PATH);
	}
	let text = match fs::read_to_string(path) {
		Ok(text) => text,
		Err(_) => {
			set_defaults(e);
			return;
		}
	};
	if text.is_empty() {
		eprintln!("msh: .mshrc is empty, no configurations loaded");
		return;
	}
	let entries = match serde_json::from_str(&text) {
		Ok(Value::Object(entries)) => entries,
		_ => {
			eprintln!("msh: invalid JSON format for .mshrc");
			return;
		}
	};
	for (key, value) in &entries {
		let value = match value {
			Value::String(value) => value,
			_ => {
				eprintln!("msh: .mshrc: {}: not a string", key);
				continue;
			}
		};
		if !env::is_valid_name(key) {
			eprintln!("msh: .mshrc: {}: invalid characters for variable name", key);
			continue;
		}
		// values may reference keys stored earlier in the file
		let value = expand::substitute(e, value).unwrap_or_else(|_| value.clone());
		e.set(key, &value);
	}
	set_defaults(e);
}

fn set_defaults(e: &mut Env) {
	if e.get("PROMPT").is_none() {
		e.set("PROMPT", DEFAULT_PROMPT);
	}
	if e.get("MSH_VERSION").is_none() {
		e.set("MSH_VERSION", "1.0");
	}
}

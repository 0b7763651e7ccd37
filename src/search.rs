use std::path::{Path, PathBuf};

use nix::unistd::{access, AccessFlags};

use crate::builtin::Builtin;
use crate::env::Env;

#[derive(Debug)]
pub enum Resolved {
	Builtin(Builtin),
	External(PathBuf),
	NotFound,
}

pub fn resolve(e: &Env, name: &str) -> Resolved {
	if let Some(b) = Builtin::lookup(name) {
		return Resolved::Builtin(b);
	}
	match find_external(e, name) {
		Some(path) => Resolved::External(path),
		None => Resolved::NotFound,
	}
}

// An existing file path (absolute, relative or ./-prefixed) is taken as the
// executable directly; only bare names go through the PATH walk.
pub fn find_external(e: &Env, name: &str) -> Option<PathBuf> {
	let direct = Path::new(name);
	if direct.is_file() || name.starts_with("./") {
		return Some(direct.to_path_buf());
	}
	search_path(e, name)
}

pub fn search_path(e: &Env, name: &str) -> Option<PathBuf> {
	for dir in e.get("PATH").unwrap_or("").split(':') {
		let candidate = Path::new(dir).join(name);
		if candidate.is_file() && is_executable(&candidate) {
			return Some(candidate);
		}
	}
	None
}

pub fn is_executable(path: &Path) -> bool {
	access(path, AccessFlags::X_OK).is_ok()
}

use thiserror::Error;

use crate::env::{self, Env};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExpandError {
	#[error("invalid characters for variable {0}")]
	BadName(String),
}

// a token wholly wrapped in one matching pair of `quote`
pub fn strip_wrapped(token: &str, quote: char) -> Option<&str> {
	let rest = token.strip_prefix(quote)?;
	if rest.is_empty() {
		return None;
	}
	rest.strip_suffix(quote)
}

// The general argument pass: quote stripping, `\${` normalization, variable
// substitution, then tilde expansion. `$PWD` alone is left for the exec
// layer to bind at spawn time.
pub fn expand_arg(e: &Env, token: &str) -> Result<String, ExpandError> {
	if let Some(inner) = strip_wrapped(token, '\'') {
		return Ok(inner.to_string());
	}
	if token == "$PWD" {
		return Ok(token.to_string());
	}
	let text = strip_wrapped(token, '"').unwrap_or(token);
	let text = if text.contains('\\') {
		text.replace("\\${", "${")
	} else {
		text.to_string()
	};
	let expanded = substitute(e, &text)?;
	Ok(expand_tilde(e, &expanded))
}

// `${NAME}` with an invalid NAME is a syntax error; a valid but absent NAME
// is deleted. A bare `$NAME` is substituted when present and left literal
// when absent.
pub fn substitute(e: &Env, text: &str) -> Result<String, ExpandError> {
	let chars: Vec<char> = text.chars().collect();
	let mut out = String::with_capacity(text.len());
	let mut i = 0;
	while i < chars.len() {
		if chars[i] == '$' && i + 1 < chars.len() {
			if chars[i + 1] == '{' {
				if let Some(off) = chars[i + 2..].iter().position(|&c| c == '}') {
					let name: String = chars[i + 2..i + 2 + off].iter().collect();
					if !env::is_valid_name(&name) {
						return Err(ExpandError::BadName(name));
					}
					if let Some(v) = e.get(&name) {
						out.push_str(v);
					}
					i += off + 3;
					continue;
				}
			} else if is_name_start(chars[i + 1]) {
				let mut j = i + 2;
				while j < chars.len() && is_name_char(chars[j]) {
					j += 1;
				}
				let name: String = chars[i + 1..j].iter().collect();
				match e.get(&name) {
					Some(v) => out.push_str(v),
					None => out.extend(&chars[i..j]),
				}
				i = j;
				continue;
			}
		}
		out.push(chars[i]);
		i += 1;
	}
	Ok(out)
}

fn is_name_start(c: char) -> bool {
	c.is_ascii_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
	c.is_ascii_alphanumeric() || c == '_'
}

pub fn expand_tilde(e: &Env, s: &str) -> String {
	let home = match e.get("HOME") {
		Some(h) => h,
		None => return s.to_string(),
	};
	if s == "~" {
		home.to_string()
	} else if let Some(rest) = s.strip_prefix("~/") {
		format!("{}/{}", home, rest)
	} else {
		s.to_string()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::env::Env;

	fn test_env() -> Env {
		let mut e = Env::from_process();
		e.set("MSH_TEST_X", "val");
		e.set("HOME", "/home/u");
		e
	}

	#[test]
	fn braced_reference() {
		let e = test_env();
		assert_eq!(expand_arg(&e, "${MSH_TEST_X}").unwrap(), "val");
		assert_eq!(expand_arg(&e, "a${MSH_TEST_X}b").unwrap(), "avalb");
	}

	#[test]
	fn absent_braced_reference_is_deleted() {
		let e = test_env();
		assert_eq!(expand_arg(&e, "pre${MSH_TEST_UNSET_XYZ}post").unwrap(), "prepost");
	}

	#[test]
	fn invalid_name_is_a_syntax_error() {
		let e = test_env();
		assert_eq!(
			expand_arg(&e, "${1bad}"),
			Err(ExpandError::BadName("1bad".to_string()))
		);
		assert!(expand_arg(&e, "${a-b}").is_err());
		assert!(expand_arg(&e, "${}").is_err());
	}

	#[test]
	fn bare_reference() {
		let e = test_env();
		assert_eq!(expand_arg(&e, "$MSH_TEST_X/tail").unwrap(), "val/tail");
		// absent bare references stay literal
		assert_eq!(expand_arg(&e, "$MSH_TEST_UNSET_XYZ").unwrap(), "$MSH_TEST_UNSET_XYZ");
	}

	#[test]
	fn single_quotes_suppress_expansion() {
		let e = test_env();
		assert_eq!(expand_arg(&e, "'${MSH_TEST_X}'").unwrap(), "${MSH_TEST_X}");
		assert_eq!(expand_arg(&e, "'hi there'").unwrap(), "hi there");
	}

	#[test]
	fn double_quotes_expand() {
		let e = test_env();
		assert_eq!(expand_arg(&e, "\"${MSH_TEST_X} y\"").unwrap(), "val y");
	}

	#[test]
	fn pwd_token_is_left_for_the_exec_layer() {
		let e = test_env();
		assert_eq!(expand_arg(&e, "$PWD").unwrap(), "$PWD");
	}

	#[test]
	fn backslash_normalizes_then_expands() {
		let e = test_env();
		assert_eq!(expand_arg(&e, "\\${MSH_TEST_X}").unwrap(), "val");
		assert!(expand_arg(&e, "\\${1bad}").is_err());
	}

	#[test]
	fn tilde_after_substitution() {
		let e = test_env();
		assert_eq!(expand_arg(&e, "~").unwrap(), "/home/u");
		assert_eq!(expand_arg(&e, "~/docs").unwrap(), "/home/u/docs");
		assert_eq!(expand_arg(&e, "a~b").unwrap(), "a~b");
	}

	#[test]
	fn unterminated_brace_stays_literal() {
		let e = test_env();
		assert_eq!(expand_arg(&e, "${oops").unwrap(), "${oops");
	}
}

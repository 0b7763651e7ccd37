use std::ffi::CString;
use std::fs::File;
use std::io::{self, Read};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::{FromRawFd, IntoRawFd, RawFd};
use std::path::PathBuf;

use nix::errno::Errno;
use nix::sys::wait::waitpid;
use nix::unistd::{self, ForkResult};
use thiserror::Error;

use crate::builtin::Builtin;
use crate::expand::{self, ExpandError};
use crate::global::State;
use crate::job::Job;
use crate::parser;
use crate::search::{self, Resolved};
use crate::types::{Pipeline, Stage};

#[derive(Debug, Error)]
pub enum ExecError {
	#[error("Nix error: {0}")]
	Nix(#[from] nix::Error),
	#[error("IO error: {0}")]
	Io(#[from] io::Error),
	#[error("Nul char error: {0}")]
	Nul(#[from] std::ffi::NulError),
	#[error("syntax error: {0}")]
	Expand(#[from] ExpandError),
}

pub fn run_line(state: &mut State, line: &str) -> u8 {
	let stages = parser::split_pipeline(line);
	run_stages(state, &stages)
}

fn run_stages(state: &mut State, stages: &[String]) -> u8 {
	let pipeline = match build_pipeline(stages) {
		Ok(Some(pipeline)) => pipeline,
		Ok(None) => return 0,
		Err(e) => {
			eprintln!("msh: syntax error: {}", e);
			return 1;
		}
	};
	// malformed variable references abort the whole line before any fork
	for stage in &pipeline.stages {
		for arg in &stage.argv[1..] {
			if let Err(e) = expand::expand_arg(&state.env, arg) {
				eprintln!("msh: syntax error: {}", e);
				return 1;
			}
		}
	}
	if pipeline.stages.len() == 1 {
		let stage = &pipeline.stages[0];
		if let Some(b) = Builtin::lookup(&stage.argv[0]) {
			return b.run(state, &stage.argv[1..]);
		}
	}
	match run_pipeline(state, &pipeline) {
		Ok(status) => status,
		Err(e) => {
			eprintln!("msh: {}", e);
			126
		}
	}
}

// A lone blank line is not an error; an empty stage between pipes is.
fn build_pipeline(stages: &[String]) -> Result<Option<Pipeline>, String> {
	let mut built = Vec::with_capacity(stages.len());
	for text in stages {
		let argv = parser::split_tokens(text);
		if argv.is_empty() {
			if stages.len() == 1 {
				return Ok(None);
			}
			return Err("expected command after pipe".to_string());
		}
		built.push(Stage { argv });
	}
	Ok(Some(Pipeline { stages: built }))
}

fn run_pipeline(state: &mut State, pipeline: &Pipeline) -> Result<u8, ExecError> {
	let n = pipeline.stages.len();
	let mut pipes: Vec<(RawFd, RawFd)> = Vec::with_capacity(n.saturating_sub(1));
	for _ in 1..n {
		let (r, w) = unistd::pipe()?;
		pipes.push((r.into_raw_fd(), w.into_raw_fd()));
	}
	let mut job = Job::new(n);
	for (i, stage) in pipeline.stages.iter().enumerate() {
		match job.push_fork() {
			Ok(ForkResult::Child) => {
				if i > 0 {
					let _ = unistd::dup2(pipes[i - 1].0, libc::STDIN_FILENO);
				}
				if i < n - 1 {
					let _ = unistd::dup2(pipes[i].1, libc::STDOUT_FILENO);
				}
				// both ends of every pipe: a leaked write end holds the
				// upstream reader open past EOF
				close_all(&pipes);
				exec_stage(state, stage);
			}
			Ok(ForkResult::Parent { .. }) => {}
			Err(e) => {
				// fatal for this pipeline only; reap whatever was spawned
				close_all(&pipes);
				job.wait();
				return Err(e.into());
			}
		}
	}
	close_all(&pipes);
	Ok(job.wait())
}

fn close_all(pipes: &[(RawFd, RawFd)]) {
	for &(r, w) in pipes {
		let _ = unistd::close(r);
		let _ = unistd::close(w);
	}
}

// Runs in the forked child; never returns.
fn exec_stage(state: &mut State, stage: &Stage) -> ! {
	let status = match do_stage(state, stage) {
		Ok(status) => status,
		Err(e) => {
			eprintln!("msh: {}", e);
			126
		}
	};
	unsafe { libc::_exit(status as libc::c_int) }
}

fn do_stage(state: &mut State, stage: &Stage) -> Result<u8, ExecError> {
	match search::resolve(&state.env, &stage.argv[0]) {
		Resolved::Builtin(b) => Ok(b.run(state, &stage.argv[1..])),
		Resolved::External(path) => do_exec(state, stage, path),
		Resolved::NotFound => {
			eprintln!("msh: command not found: {}", stage.argv[0]);
			Ok(127)
		}
	}
}

fn do_exec(state: &State, stage: &Stage, path: PathBuf) -> Result<u8, ExecError> {
	let name = &stage.argv[0];
	if !search::is_executable(&path) {
		eprintln!("msh: permission denied: {}", name);
		return Ok(126);
	}
	let mut args = Vec::with_capacity(stage.argv.len() - 1);
	for arg in &stage.argv[1..] {
		let expanded = expand::expand_arg(&state.env, arg)?;
		if expanded == "$PWD" {
			// late-bound: the logical working directory as of spawn time
			args.push(state.env.get("PWD").unwrap_or_default().to_string());
		} else {
			args.push(expanded);
		}
	}
	let mut argv = Vec::with_capacity(args.len() + 1);
	argv.push(CString::new(name.as_str())?);
	if name.contains('\\') {
		// command names carrying a backslash exec with only their first
		// argument, `\${` unwound
		if let Some(first) = args.first() {
			argv.push(CString::new(first.replace("\\${", "${"))?);
		}
	} else {
		for arg in &args {
			argv.push(CString::new(arg.as_str())?);
		}
	}
	let envp = state.env.envp()?;
	let path_c = CString::new(path.as_os_str().as_bytes())?;
	unistd::execve(&path_c, &argv, &envp)?;
	unreachable!()
}

const CAPTURE_BUF: usize = 4096;

// Nested pipeline with stdout captured through a private pipe. The capture
// is one bounded read; output beyond one read's worth is truncated.
pub fn capture(state: &mut State, command: &str) -> Result<String, ExecError> {
	let stages = parser::split_pipeline(command);
	let (pipe_read, pipe_write) = unistd::pipe()?;
	let (pipe_read, pipe_write) = (pipe_read.into_raw_fd(), pipe_write.into_raw_fd());
	match unsafe { unistd::fork() }? {
		ForkResult::Child => {
			let _ = unistd::close(pipe_read);
			let _ = unistd::dup2(pipe_write, libc::STDOUT_FILENO);
			let _ = unistd::close(pipe_write);
			let _ = run_stages(state, &stages);
			unsafe { libc::_exit(0) }
		}
		ForkResult::Parent { child } => {
			let _ = unistd::close(pipe_write);
			let mut reader = unsafe { File::from_raw_fd(pipe_read) };
			let mut buf = vec![0u8; CAPTURE_BUF];
			let n = loop {
				match reader.read(&mut buf) {
					Ok(n) => break n,
					Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
					Err(e) => return Err(e.into()),
				}
			};
			drop(reader);
			loop {
				match waitpid(child, None) {
					Ok(_) => break,
					Err(Errno::EINTR) => continue,
					Err(e) => return Err(e.into()),
				}
			}
			Ok(String::from_utf8_lossy(&buf[..n]).into_owned())
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::global::State;

	fn test_state() -> State {
		let mut state = State::new();
		state.env.set("PATH", "/bin:/usr/bin");
		state
	}

	#[test]
	fn capture_single_stage() {
		let mut state = test_state();
		let out = capture(&mut state, "echo hi").unwrap();
		assert_eq!(out, "hi\n");
	}

	#[test]
	fn capture_two_stage_pipeline() {
		let mut state = test_state();
		let out = capture(&mut state, "echo hello | cat").unwrap();
		assert_eq!(out, "hello\n");
	}

	#[test]
	fn failed_stage_still_reaps_and_the_rest_runs() {
		let mut state = test_state();
		let out = capture(&mut state, "msh_no_such_command_xyz | echo ok").unwrap();
		assert_eq!(out, "ok\n");
	}

	#[test]
	fn arguments_are_expanded_before_exec() {
		let mut state = test_state();
		state.env.set("MSH_TEST_WORD", "expanded");
		let out = capture(&mut state, "echo ${MSH_TEST_WORD}").unwrap();
		assert_eq!(out, "expanded\n");
	}

	#[test]
	fn empty_stage_is_rejected_before_spawn() {
		let mut state = test_state();
		let status = run_stages(&mut state, &["echo hi".to_string(), "  ".to_string()]);
		assert_eq!(status, 1);
	}

	#[test]
	fn blank_single_stage_is_ignored() {
		let mut state = test_state();
		assert_eq!(run_stages(&mut state, &["   ".to_string()]), 0);
	}

	#[test]
	fn invalid_reference_aborts_the_line() {
		let mut state = test_state();
		let status = run_stages(&mut state, &["echo ${1bad}".to_string()]);
		assert_eq!(status, 1);
	}

	#[test]
	fn pipeline_status_is_the_last_stage() {
		let mut state = test_state();
		let pipeline = build_pipeline(&["sh -c 'exit 3'".to_string()]).unwrap().unwrap();
		let status = run_pipeline(&mut state, &pipeline).unwrap();
		assert_eq!(status, 3);
	}
}

use nix::errno::Errno;
use nix::sys::signal::{self, killpg, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{self, ForkResult, Pid};

extern "C" fn interrupt_noop(_: libc::c_int) {}

// Once, in the parent, before the first prompt: the shell must never be
// stopped for writing while not in the foreground group, and a terminal
// interrupt must make waitpid fail with EINTR (no SA_RESTART) instead of
// killing the shell, so it can be forwarded to the foreground group.
pub fn setup_shell_signals() {
	let _ = unsafe { signal::signal(Signal::SIGTTOU, SigHandler::SigIgn) };
	let action = SigAction::new(
		SigHandler::Handler(interrupt_noop),
		SaFlags::empty(),
		SigSet::empty(),
	);
	let _ = unsafe { signal::sigaction(Signal::SIGINT, &action) };
}

// In each child, immediately post-fork.
fn reset_child_signals() {
	let action = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
	let _ = unsafe { signal::sigaction(Signal::SIGINT, &action) };
}

// One process group per pipeline: the first fork establishes it, every
// later child joins it. setpgid runs on both sides of the fork to close
// the race.
pub struct Job {
	gid: Option<Pid>,
	pids: Vec<Pid>,
}

impl Job {
	pub fn new(size_hint: usize) -> Job {
		Job { gid: None, pids: Vec::with_capacity(size_hint) }
	}

	pub fn push_fork(&mut self) -> nix::Result<ForkResult> {
		let r = unsafe { unistd::fork() }?;
		match r {
			ForkResult::Parent { child } => {
				let gid = *self.gid.get_or_insert(child);
				let _ = unistd::setpgid(child, gid);
				self.pids.push(child);
			}
			ForkResult::Child => {
				let zero = Pid::from_raw(0);
				let _ = unistd::setpgid(zero, self.gid.unwrap_or(zero));
				reset_child_signals();
			}
		}
		Ok(r)
	}

	// Sequential left-to-right reap; the pipeline's status is the last
	// stage's. An interrupt during a wait is forwarded to the whole group
	// and the wait re-issued so reaping completes.
	pub fn wait(&self) -> u8 {
		let mut status = 0;
		for &pid in &self.pids {
			loop {
				match waitpid(pid, None) {
					Ok(ws) => {
						status = exit_status(ws);
						break;
					}
					Err(Errno::EINTR) => {
						if let Some(gid) = self.gid {
							let _ = killpg(gid, Signal::SIGINT);
						}
					}
					Err(_) => break,
				}
			}
		}
		status
	}
}

fn exit_status(ws: WaitStatus) -> u8 {
	match ws {
		WaitStatus::Exited(_, code) => code as u8,
		WaitStatus::Signaled(_, sig, _) => (128 + sig as i32) as u8,
		_ => 0,
	}
}

//! The "bounded external process" abstraction from Design Note "Subprocess +
//! timeouts": two-phase termination (terminate, grace, kill) with stdout
//! capture capped at 1 MiB. Every engine-adapter call site builds one of
//! these instead of talking to `std::process::Command` directly, so the
//! grace-period policy lives in exactly one place.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use wait_timeout::ChildExt;

/// Captured output is capped at this many bytes; anything beyond is dropped
/// and a truncation marker is appended once (spec.md §9).
pub const OUTPUT_CAP_BYTES: usize = 1024 * 1024;

const TRUNCATION_MARKER: &[u8] = b"\n...[output truncated]...\n";

#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub status: Option<ExitStatus>,
    pub output: Vec<u8>,
    pub timed_out: bool,
    pub wall_time: Duration,
}

impl ProcessOutcome {
    pub fn output_string(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

pub struct BoundedProcess {
    child: Child,
    buffer: Arc<Mutex<Vec<u8>>>,
    readers: Vec<JoinHandle<()>>,
    started_at: Instant,
}

impl BoundedProcess {
    pub fn spawn(mut command: Command) -> std::io::Result<Self> {
        command.stdout(Stdio::piped()).stderr(Stdio::piped());
        let mut child = command.spawn()?;

        let buffer = Arc::new(Mutex::new(Vec::new()));
        let mut readers = Vec::new();

        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(stdout, Arc::clone(&buffer)));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(stderr, Arc::clone(&buffer)));
        }

        Ok(BoundedProcess {
            child,
            buffer,
            readers,
            started_at: Instant::now(),
        })
    }

    /// Wait up to `deadline` for the child to exit naturally. If it hasn't,
    /// send a graceful terminate signal and wait up to `grace` more before a
    /// hard kill. `grace` is 10s baseline, 110s when fork mode is active
    /// (spec.md §5).
    pub fn wait_with_grace(mut self, deadline: Duration, grace: Duration) -> std::io::Result<ProcessOutcome> {
        let mut timed_out = false;

        let status = match self.child.wait_timeout(deadline)? {
            Some(status) => Some(status),
            None => {
                terminate(&mut self.child);
                match self.child.wait_timeout(grace)? {
                    Some(status) => Some(status),
                    None => {
                        timed_out = true;
                        self.child.kill().ok();
                        self.child.wait().ok()
                    }
                }
            }
        };

        for handle in self.readers.drain(..) {
            let _ = handle.join();
        }

        let output = Arc::try_unwrap(self.buffer)
            .map(|m| m.into_inner().unwrap_or_default())
            .unwrap_or_default();

        Ok(ProcessOutcome {
            status,
            output,
            timed_out,
            wall_time: self.started_at.elapsed(),
        })
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R, buffer: Arc<Mutex<Vec<u8>>>) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut chunk = [0u8; 8192];
        let mut truncated = false;
        loop {
            match pipe.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    let mut buf = buffer.lock().unwrap();
                    if truncated {
                        continue;
                    }
                    let remaining = OUTPUT_CAP_BYTES.saturating_sub(buf.len());
                    if remaining == 0 {
                        buf.extend_from_slice(TRUNCATION_MARKER);
                        truncated = true;
                        continue;
                    }
                    let take = remaining.min(n);
                    buf.extend_from_slice(&chunk[..take]);
                    if take < n {
                        buf.extend_from_slice(TRUNCATION_MARKER);
                        truncated = true;
                    }
                }
                Err(_) => break,
            }
        }
    })
}

#[cfg(unix)]
fn terminate(child: &Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let _ = kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM);
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    let _ = child.kill();
}

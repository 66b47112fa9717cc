//! Child processes with a deadline (yt-dlp, ffmpeg).
//!
//! Meant to run on the `BlockingPool`: the wait loop sleeps the calling thread.

use std::io::Read;
use std::process::Child;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to wait for child: {0}")]
    Io(#[from] std::io::Error),
    #[error("killed after {0:?}")]
    TimedOut(Duration),
}

#[derive(Debug)]
pub struct ProcessOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    /// Last non-blank stderr line, the usual place for the actual error
    pub fn last_error_line(&self) -> &str {
        self.stderr.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("")
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_string(&mut buf);
        }
        buf
    })
}

/// Waits for a child process with a deadline. Kills the child on timeout.
///
/// Both pipes are drained on their own threads; `--dump-json` output easily
/// exceeds the pipe buffer.
pub fn wait_with_deadline(mut child: Child, timeout: Duration) -> Result<ProcessOutput, ProcessError> {
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());
    let deadline = Instant::now() + timeout;

    let status = loop {
        match child.try_wait()? {
            Some(status) => break status,
            None if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ProcessError::TimedOut(timeout));
            }
            None => std::thread::sleep(Duration::from_millis(100)),
        }
    };

    Ok(ProcessOutput {
        success: status.success(),
        stdout: stdout.join().unwrap_or_default(),
        stderr: stderr.join().unwrap_or_default(),
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::{Command, Stdio};

    fn sh(script: &str) -> Child {
        Command::new("sh")
            .args(["-c", script])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap()
    }

    #[test]
    fn test_collects_output_of_finished_child() {
        let out = wait_with_deadline(sh("echo hello; echo oops >&2; exit 3"), Duration::from_secs(5)).unwrap();
        assert!(!out.success);
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.last_error_line(), "oops");
    }

    #[test]
    fn test_kills_child_past_deadline() {
        let started = Instant::now();
        let err = wait_with_deadline(sh("sleep 30"), Duration::from_millis(200)).unwrap_err();
        assert!(matches!(err, ProcessError::TimedOut(_)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}

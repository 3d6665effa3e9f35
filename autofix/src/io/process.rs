//! Child-process execution with a wall-clock timeout and bounded output.

use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

use crate::error::FixError;

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn stdout_text(&self) -> String {
        let mut text = String::from_utf8_lossy(&self.stdout).into_owned();
        push_truncated_notice(&mut text, "stdout", self.stdout_truncated);
        text
    }

    pub fn stderr_text(&self) -> String {
        let mut text = String::from_utf8_lossy(&self.stderr).into_owned();
        push_truncated_notice(&mut text, "stderr", self.stderr_truncated);
        text
    }
}

fn push_truncated_notice(text: &mut String, label: &str, truncated: usize) {
    if truncated > 0 {
        text.push_str(&format!("\n[{label} truncated {truncated} bytes]\n"));
    }
}

/// Build a command that runs `command_line` through the platform shell.
///
/// On unix the shell leads its own process group so a timeout can take down
/// everything the test command started, not just the shell.
#[cfg(unix)]
pub fn shell_command(command_line: &str, workdir: &Path) -> Command {
    use std::os::unix::process::CommandExt;

    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command_line)
        .current_dir(workdir)
        .process_group(0);
    cmd
}

#[cfg(windows)]
pub fn shell_command(command_line: &str, workdir: &Path) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command_line).current_dir(workdir);
    cmd
}

/// Kill whatever is still running in the process group `pid` leads.
///
/// Returns false when the group is already empty.
#[cfg(unix)]
fn kill_group(pid: u32) -> bool {
    let group = format!("-{pid}");
    match Command::new("kill")
        .args(["-KILL", "--", &group])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
    {
        Ok(status) => status.success(),
        Err(e) => {
            debug!(err = %e, "process group kill failed");
            false
        }
    }
}

/// Kill the child and, on unix, the process group it leads.
fn kill_tree(child: &mut Child) -> Result<()> {
    #[cfg(unix)]
    {
        if kill_group(child.id()) {
            return Ok(());
        }
    }
    child.kill().context("kill command")
}

/// Run a command with a timeout and capture stdout/stderr without risking pipe deadlocks.
///
/// Output is read on separate threads while the child runs. `output_limit_bytes` bounds the
/// amount kept per stream; the rest is drained and counted. A child that outlives `timeout`
/// is killed and reported with `timed_out = true`. On unix, anything the command left running
/// in its process group is killed once it exits, so the readers always finish. Spawn failures
/// surface as [`FixError::ProcessExecution`].
#[instrument(skip_all, fields(label = %label, timeout_secs = timeout.as_secs(), output_limit_bytes = output_limit_bytes))]
pub fn run_command_with_timeout(
    mut cmd: Command,
    label: &str,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(FixError::ProcessExecution {
                command: label.to_string(),
                detail: e.to_string(),
            }
            .into());
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_handle = thread::spawn(move || read_stream_limited(stdout, output_limit_bytes));
    let stderr_handle = thread::spawn(move || read_stream_limited(stderr, output_limit_bytes));

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => {
            // Background jobs left by the command still hold the output pipes.
            #[cfg(unix)]
            let _ = kill_group(child.id());
            status
        }
        None => {
            warn!(
                timeout_secs = timeout.as_secs(),
                "command timed out, killing"
            );
            timed_out = true;
            kill_tree(&mut child)?;
            child.wait().context("wait command after kill")?
        }
    };

    let (stdout, stdout_truncated) = join_output(stdout_handle).context("join stdout")?;
    let (stderr, stderr_truncated) = join_output(stderr_handle).context("join stderr")?;

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
    })
}

fn join_output(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let keep = n.min(limit.saturating_sub(buf.len()));
        buf.extend_from_slice(&chunk[..keep]);
        truncated += n - keep;
    }

    Ok((buf, truncated))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn captures_both_streams() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cmd = shell_command("echo out; echo err 1>&2", temp.path());
        let output =
            run_command_with_timeout(cmd, "echo", Duration::from_secs(10), 1024).expect("run");
        assert!(output.status.success());
        assert_eq!(output.stdout_text(), "out\n");
        assert_eq!(output.stderr_text(), "err\n");
        assert!(!output.timed_out);
    }

    #[test]
    fn truncates_beyond_limit() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cmd = shell_command("printf 'abcdefghij' 1>&2", temp.path());
        let output =
            run_command_with_timeout(cmd, "printf", Duration::from_secs(10), 4).expect("run");
        assert_eq!(output.stderr, b"abcd");
        assert_eq!(output.stderr_truncated, 6);
        assert!(output.stderr_text().contains("[stderr truncated 6 bytes]"));
    }

    #[test]
    fn kills_on_timeout() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cmd = shell_command("sleep 5", temp.path());
        let output =
            run_command_with_timeout(cmd, "sleep", Duration::from_millis(200), 1024).expect("run");
        assert!(output.timed_out);
    }

    #[test]
    fn background_jobs_do_not_outlive_the_command() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cmd = shell_command("sleep 30 & echo done", temp.path());
        let started = std::time::Instant::now();
        let output =
            run_command_with_timeout(cmd, "sleep", Duration::from_secs(10), 1024).expect("run");
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!output.timed_out);
        assert_eq!(output.stdout_text(), "done\n");
    }

    #[test]
    fn spawn_failure_is_process_execution_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut cmd = Command::new("definitely-not-a-real-binary-autofix");
        cmd.current_dir(temp.path());
        let err = run_command_with_timeout(cmd, "missing", Duration::from_secs(1), 1024)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FixError>(),
            Some(FixError::ProcessExecution { .. })
        ));
    }
}

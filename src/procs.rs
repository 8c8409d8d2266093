//! External process runner.
//!
//! Thin single-purpose wrappers around `std::process::Command` for the
//! handful of external tools the dessication and rehydration pipelines shell
//! out to: `samtools` (header/sort/view), a system `sort`, and the
//! decompressors for gzipped/bzipped FASTQ sources. Every wrapper surfaces a
//! non-zero exit as `DamError::ExternalToolError` with the command line and
//! a tail of captured stderr, never a bare `io::Error`.
//!
//! Every child runs with `LC_ALL=C`: the block index and the lookup engine
//! both assume byte-lexicographic read-id order, and `sort`'s collation
//! changes under any other locale.

use std::io::Read;
use std::process::{Child, Command, Stdio};

use crate::error::{DamError, Result};

const STDERR_TAIL_BYTES: usize = 2048;

/// Run `command` with `args`, feeding it `stdin` (if any) and capturing
/// stdout in full. Fails with `ExternalToolError` on non-zero exit.
pub fn run_capturing(command: &str, args: &[&str], stdin: Option<&[u8]>) -> Result<Vec<u8>> {
    let mut cmd = Command::new(command);
    cmd.args(args).env("LC_ALL", "C").stdout(Stdio::piped()).stderr(Stdio::piped());
    cmd.stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() });

    log::debug!("running: {command} {}", args.join(" "));
    let mut child = cmd.spawn().map_err(|e| spawn_error(command, args, &e))?;

    if let Some(bytes) = stdin {
        use std::io::Write;
        child
            .stdin
            .take()
            .expect("stdin was requested as piped")
            .write_all(bytes)?;
    }

    let output = child.wait_with_output()?;
    check_status(command, args, output.status, &output.stderr)?;
    Ok(output.stdout)
}

/// Spawn `command` with stdout piped for the caller to read incrementally
/// (e.g. as the input side of a further pipeline stage or a line reader).
/// The child's stderr is inherited so tool diagnostics reach the terminal.
pub fn spawn_streaming(command: &str, args: &[&str]) -> Result<Child> {
    log::debug!("spawning: {command} {}", args.join(" "));
    Command::new(command)
        .args(args)
        .env("LC_ALL", "C")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|e| spawn_error(command, args, &e))
}

/// Pipe `upstream`'s stdout into `command`'s stdin, returning the new child
/// with its own stdout piped. Mirrors a shell `upstream | command`.
pub fn pipe_into(mut upstream: Child, command: &str, args: &[&str]) -> Result<Child> {
    let upstream_stdout = upstream
        .stdout
        .take()
        .expect("upstream child must have been spawned with a piped stdout");

    log::debug!("piping into: {command} {}", args.join(" "));
    let child = Command::new(command)
        .args(args)
        .env("LC_ALL", "C")
        .stdin(Stdio::from(upstream_stdout))
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|e| spawn_error(command, args, &e))?;

    // `upstream` is dropped here without being waited on, same as a shell
    // pipeline: it keeps writing until `command` stops reading, then exits
    // on its own. Only the downstream exit status is surfaced to callers.
    drop(upstream);
    Ok(child)
}

/// Spawn `command` with `data` written to its stdin on a background thread
/// (so a large payload can't deadlock against the child's own stdout pipe
/// filling up before we've started draining it), returning the child with
/// stdout piped.
pub fn pipe_into_stdin(data: Vec<u8>, command: &str, args: &[&str]) -> Result<Child> {
    log::debug!("piping {} byte(s) into: {command} {}", data.len(), args.join(" "));
    let mut child = Command::new(command)
        .args(args)
        .env("LC_ALL", "C")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|e| spawn_error(command, args, &e))?;

    let mut stdin = child.stdin.take().expect("stdin was requested as piped");
    std::thread::spawn(move || {
        use std::io::Write;
        let _ = stdin.write_all(&data);
    });

    Ok(child)
}

fn spawn_error(command: &str, args: &[&str], source: &std::io::Error) -> DamError {
    DamError::ExternalToolError {
        command: format!("{command} {}", args.join(" ")),
        status: "failed to spawn".to_string(),
        stderr_tail: format!(" — {source}"),
    }
}

fn check_status(command: &str, args: &[&str], status: std::process::ExitStatus, stderr: &[u8]) -> Result<()> {
    if status.success() {
        return Ok(());
    }
    Err(DamError::ExternalToolError {
        command: format!("{command} {}", args.join(" ")),
        status: status.to_string(),
        stderr_tail: format_stderr_tail(stderr),
    })
}

fn format_stderr_tail(stderr: &[u8]) -> String {
    if stderr.is_empty() {
        return String::new();
    }
    let mut tail = stderr;
    if tail.len() > STDERR_TAIL_BYTES {
        tail = &tail[tail.len() - STDERR_TAIL_BYTES..];
    }
    let text = String::from_utf8_lossy(tail);
    format!(" — {}", text.trim())
}

/// Read an exited child's full stdout after the caller is done piping into
/// later stages (used once at the tail of a pipeline).
pub fn drain_stdout(mut child: Child) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    child
        .stdout
        .take()
        .expect("child must have been spawned with a piped stdout")
        .read_to_end(&mut buf)?;
    let status = child.wait()?;
    if !status.success() {
        return Err(DamError::ExternalToolError {
            command: "<pipeline>".to_string(),
            status: status.to_string(),
            stderr_tail: String::new(),
        });
    }
    Ok(buf)
}

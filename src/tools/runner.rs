// src/tools/runner.rs
// C5: tool runner. Executes one analyzer as a child process inside the
// analyzer sandbox, under a per-tool deadline, and returns a ToolResult.
//
// Mirrors this codebase's `ProcessExecutor::execute` pattern (tokio::process
// + `.output()`), generalized with a `tokio::time::timeout` around the wait
// and a process-group kill on timeout rather than killing only the direct
// child.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::tools::registry::ToolSpec;
use crate::types::ToolResult;
use crate::utils::redact::redact_secrets;

enum WaitOutcome {
    Cancelled,
    Exited(std::io::Result<std::process::Output>),
}

/// Run one analyzer against `workdir`. Never returns an `Err` for a tool
/// failure: timeouts, non-matching exit codes, and spawn failures are all
/// reported as a `ToolResult` with `timed_out`/`error` set, since a single
/// tool failing is not fatal to the job (spec §4.9).
pub async fn run(
    spec: &'static ToolSpec,
    workdir: &Path,
    deadline: Duration,
    cancel: CancellationToken,
) -> ToolResult {
    let started = Instant::now();
    let argv = spec.argv(workdir);

    let mut cmd = Command::new(spec.binary);
    cmd.args(&argv)
        .current_dir(workdir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // New process group so a timeout can signal every descendant the
    // analyzer spawned (e.g. a shell wrapper), not just the direct child.
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            warn!(tool = spec.id, error = %e, "failed to spawn analyzer");
            return failed_result(spec, started, Some(format!("spawn failed: {e}")), false);
        }
    };

    let pid = child.id();

    let wait = async {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => WaitOutcome::Cancelled,
            out = child.wait_with_output() => WaitOutcome::Exited(out),
        }
    };

    let outcome = match tokio::time::timeout(deadline, wait).await {
        Ok(outcome) => outcome,
        Err(_) => {
            if let Some(pid) = pid {
                kill_process_group(pid);
            }
            warn!(tool = spec.id, deadline = ?deadline, "analyzer timed out");
            return ToolResult {
                tool: spec.id.to_string(),
                raw_findings: Vec::new(),
                timed_out: true,
                error: None,
                duration: started.elapsed(),
            };
        }
    };

    match outcome {
        WaitOutcome::Cancelled => {
            if let Some(pid) = pid {
                kill_process_group(pid);
            }
            failed_result(spec, started, Some("context cancelled".to_string()), false)
        }
        WaitOutcome::Exited(Ok(output)) => {
            let code = output.status.code().unwrap_or(-1);
            let stderr = redact_secrets(&String::from_utf8_lossy(&output.stderr));
            if !stderr.is_empty() {
                debug!(tool = spec.id, stderr = %stderr, "analyzer stderr");
            }

            if !spec.is_success_exit(code) {
                warn!(tool = spec.id, exit_code = code, "analyzer exited with unexpected code");
                return failed_result(
                    spec,
                    started,
                    Some(format!("unexpected exit code {code}")),
                    false,
                );
            }

            match crate::normalize::parse(spec.output_format, workdir, &output.stdout) {
                Ok(findings) => ToolResult {
                    tool: spec.id.to_string(),
                    raw_findings: findings,
                    timed_out: false,
                    error: None,
                    duration: started.elapsed(),
                },
                Err(e) => {
                    warn!(tool = spec.id, error = %e, "failed to parse analyzer output");
                    failed_result(spec, started, Some(e.to_string()), false)
                }
            }
        }
        WaitOutcome::Exited(Err(e)) => {
            failed_result(spec, started, Some(format!("wait failed: {e}")), false)
        }
    }
}

fn failed_result(
    spec: &'static ToolSpec,
    started: Instant,
    error: Option<String>,
    timed_out: bool,
) -> ToolResult {
    ToolResult {
        tool: spec.id.to_string(),
        raw_findings: Vec::new(),
        timed_out,
        error,
        duration: started.elapsed(),
    }
}

#[cfg(unix)]
fn kill_process_group(pid: u32) {
    // SIGKILL the whole group so descendants spawned by the analyzer do not
    // survive the timeout. `pid` is the group leader's pid by construction
    // (process_group(0) above), so the negated pid addresses the group.
    unsafe {
        libc::kill(-(pid as libc::pid_t), libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: u32) {}

//! Per-connection orchestration (spec §3 "Session", §4.F): wires workspace
//! → screener → compiler → child → the interactive I/O loop → verdict.
//!
//! One `Session` per accepted TCP connection; `server::run` spawns one task
//! per connection to host it, matching the teacher's one-task-per-connection
//! concurrency model.

use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{info, warn};

use crate::child::{self, LaunchError, Limits};
use crate::compiler::Compiler;
use crate::config::Config;
use crate::heuristic::{Prompt, SilenceTracker};
use crate::protocol::{self, OutMessage, SourceInput, Submission};
use crate::screener;
use crate::verdict::{self, Outcome};
use crate::workspace::Workspace;

const MAX_REQUEST_BYTES: usize = 65535;
const CHUNK_SIZE: usize = 4096;
const POLL_INTERVAL: Duration = Duration::from_millis(100);
const TICK_PAUSE: Duration = Duration::from_millis(10);

/// Handle one connection end to end. Every path here terminates with
/// exactly one terminal message on the wire (spec §8 invariant 1); cleanup
/// (workspace removal, child reap) happens on every path via `Drop` and
/// explicit awaits.
pub async fn handle(mut socket: TcpStream, config: &Config, compiler: &Compiler) {
    let session_start = Instant::now();

    let mut buf = vec![0u8; MAX_REQUEST_BYTES];
    let n = match socket.read(&mut buf).await {
        Ok(0) => return,
        Ok(n) => n,
        Err(e) => {
            warn!("failed to read request: {e}");
            return;
        }
    };

    let raw = String::from_utf8_lossy(&buf[..n]);
    let submission = protocol::parse_submission(&raw);
    let limits = resolve_limits(config, &submission);

    if is_dangerous(&submission, &config.deny_patterns) {
        let _ = send(
            &mut socket,
            OutMessage::Error {
                message: "Submission rejected by security screener".to_string(),
                exit_code: -3,
            },
        )
        .await;
        return;
    }

    let workspace = match Workspace::create(&config.workspace.root) {
        Ok(ws) => ws,
        Err(e) => {
            warn!("failed to create workspace: {e}");
            let _ = send(
                &mut socket,
                OutMessage::Error {
                    message: format!("Failed to create workspace: {e}"),
                    exit_code: -1,
                },
            )
            .await;
            return;
        }
    };

    let compile_outcome = match &submission.input {
        SourceInput::Single(source) => compiler.compile_single(&workspace, source).await,
        SourceInput::Multi(files) => compiler.compile_multi(&workspace, files).await,
    };

    let compile_outcome = match compile_outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("compiler invocation failed: {e}");
            let _ = send(
                &mut socket,
                OutMessage::Error {
                    message: format!("Failed to invoke compiler: {e}"),
                    exit_code: -1,
                },
            )
            .await;
            return;
        }
    };

    if !compile_outcome.success {
        let _ = send(
            &mut socket,
            OutMessage::Error {
                message: format!("Compilation failed: {}", compile_outcome.diagnostics),
                exit_code: -2,
            },
        )
        .await;
        return;
    }

    if send(&mut socket, OutMessage::CompileSuccess).await.is_err() {
        return;
    }

    let mut child = match child::spawn(&workspace, limits) {
        Ok(child) => child,
        Err(e) => {
            let message = match e {
                LaunchError::NotExecutable => "Program is not executable".to_string(),
                LaunchError::Spawn(_) => e.to_string(),
            };
            let _ = send(
                &mut socket,
                OutMessage::Error {
                    message,
                    exit_code: -1,
                },
            )
            .await;
            return;
        }
    };

    let pid = child.id().unwrap_or(0);
    let stdin = child.stdin.take().expect("child stdin was piped");
    let stdout = child.stdout.take().expect("child stdout was piped");

    info!(pid, "child started");
    let program_start = Instant::now();
    run_io_loop(
        &mut socket,
        &mut child,
        stdin,
        stdout,
        limits,
        session_start,
        program_start,
    )
    .await;
}

fn is_dangerous(submission: &Submission, patterns: &[String]) -> bool {
    match &submission.input {
        SourceInput::Single(source) => screener::is_dangerous(source, patterns),
        SourceInput::Multi(files) => {
            screener::is_dangerous_files(files.iter().map(|(_, c)| c.as_str()), patterns)
        }
    }
}

fn resolve_limits(config: &Config, submission: &Submission) -> Limits {
    let time_limit_sec = submission
        .time_limit_sec
        .unwrap_or(config.limits.default_time_limit_sec)
        .min(config.limits.max_time_limit_sec);
    let memory_limit_mb = submission
        .memory_limit_mb
        .unwrap_or(config.limits.default_memory_limit_mb)
        .min(config.limits.max_memory_limit_mb);
    Limits {
        time_limit_sec,
        memory_limit_mb,
    }
}

async fn send(socket: &mut TcpStream, msg: OutMessage) -> std::io::Result<()> {
    socket.write_all(msg.encode().as_bytes()).await
}

/// The interactive loop from spec §4.F: poll child stdout and the client
/// socket, forward bytes each way, run the input-request heuristic, enforce
/// the wall-clock limit, and reap the child.
async fn run_io_loop(
    socket: &mut TcpStream,
    child: &mut tokio::process::Child,
    mut child_stdin: tokio::process::ChildStdin,
    mut child_stdout: tokio::process::ChildStdout,
    limits: Limits,
    session_start: Instant,
    program_start: Instant,
) {
    let pid = child.id().unwrap_or(0);
    let time_limit = Duration::from_secs(limits.time_limit_sec);

    let mut tracker = SilenceTracker::new(Instant::now());
    let mut accumulated_output = String::new();
    let mut waiting_for_input = false;
    let mut input_sent = false;
    let mut timed_out = false;

    let mut out_buf = vec![0u8; CHUNK_SIZE];
    let mut in_buf = vec![0u8; CHUNK_SIZE];

    loop {
        // 1. Wall-clock check, measured from the child's own start so a slow
        // compile never eats into its time budget.
        if !timed_out && program_start.elapsed() > time_limit {
            timed_out = true;
            child::kill_process_group(pid);
            let status = child.wait().await;
            let exit_code = status.map(child::exit_status_code).unwrap_or(-1);
            let outcome = Outcome {
                output: accumulated_output,
                error: String::new(),
                exit_code,
                execution_time_ms: to_millis(session_start.elapsed()),
                timed_out: true,
                memory_exceeded: false,
                time_limit_sec: limits.time_limit_sec,
                memory_limit_mb: limits.memory_limit_mb,
            };
            let _ = send(socket, verdict::classify(&outcome)).await;
            return;
        }

        tokio::select! {
            read_result = child_stdout.read(&mut out_buf) => {
                match read_result {
                    Ok(0) => { /* EOF handled by the reap check below */ }
                    Ok(n) => {
                        let now = Instant::now();
                        let chunk = &out_buf[..n];
                        tracker.on_child_output(chunk, now);
                        let text = String::from_utf8_lossy(chunk).into_owned();
                        accumulated_output.push_str(&text);
                        input_sent = false;
                        if send(socket, OutMessage::Output { chunk: text }).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => warn!("error reading child output: {e}"),
                }
            }
            read_result = socket.read(&mut in_buf) => {
                match read_result {
                    Ok(0) => {
                        child::kill_process_group(pid);
                        let _ = child.wait().await;
                        let _ = send(socket, OutMessage::Error {
                            message: "Client disconnected".to_string(),
                            exit_code: -6,
                        }).await;
                        return;
                    }
                    Ok(n) => {
                        let mut payload = in_buf[..n].to_vec();
                        payload.push(b'\n');
                        if child_stdin.write_all(&payload).await.is_err() {
                            warn!("failed to write client input to child stdin");
                        }
                        let now = Instant::now();
                        tracker.on_activity(now);
                        waiting_for_input = false;
                        input_sent = true;
                    }
                    Err(e) => warn!("error reading from client socket: {e}"),
                }
            }
            () = tokio::time::sleep(POLL_INTERVAL) => {}
        }

        // 4. Silence evaluation.
        if let Prompt::Emit(message) = tracker.evaluate(waiting_for_input, input_sent, Instant::now()) {
            waiting_for_input = true;
            input_sent = false;
            if send(socket, OutMessage::InputRequired { prompt: message }).await.is_err() {
                return;
            }
        }

        // 5. Reap.
        match child.try_wait() {
            Ok(Some(status)) => {
                let outcome = Outcome {
                    output: accumulated_output,
                    error: String::new(),
                    exit_code: child::exit_status_code(status),
                    execution_time_ms: to_millis(session_start.elapsed()),
                    timed_out: false,
                    memory_exceeded: false,
                    time_limit_sec: limits.time_limit_sec,
                    memory_limit_mb: limits.memory_limit_mb,
                };
                let _ = send(socket, verdict::classify(&outcome)).await;
                return;
            }
            Ok(None) => {}
            Err(e) => {
                warn!("waitpid failed: {e}");
                return;
            }
        }

        tokio::time::sleep(TICK_PAUSE).await;
    }
}

fn to_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

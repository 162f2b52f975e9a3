//! Verdict classifier (spec §4.H): maps exit status plus the `timed_out`/
//! `memory_exceeded` flags into the single `EXECUTION_RESULT` a session
//! emits.

use crate::protocol::{OutMessage, Status};

/// Everything the classifier needs, gathered once the child has exited (or
/// been killed) and the I/O loop has a final byte count.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub output: String,
    pub error: String,
    pub exit_code: i32,
    pub execution_time_ms: u64,
    pub timed_out: bool,
    /// Always `false` in this implementation — `RLIMIT_AS` breaches surface
    /// as abnormal exit and classify as RUNTIME_ERROR instead. Preserved
    /// from the original rather than inferred (spec §9 open question).
    pub memory_exceeded: bool,
    /// The limit that was in force for this run, used to synthesize
    /// `error` when `timed_out`/`memory_exceeded` fires.
    pub time_limit_sec: u64,
    pub memory_limit_mb: u64,
}

/// Classify an `Outcome` into the precedence-ordered `(Status, exit_code)`
/// pair from spec §4.H, then wrap it as the outbound message. On a timeout
/// or memory-limit verdict, `error` is synthesized from the limit that was
/// exceeded (mirroring the original's `send_json_result`), overriding
/// whatever `outcome.error` held.
#[must_use]
pub fn classify(outcome: &Outcome) -> OutMessage {
    let (status, exit_code, error) = if outcome.timed_out {
        (
            Status::TimeLimitExceeded,
            -4,
            format!("Time limit exceeded ({}s)", outcome.time_limit_sec),
        )
    } else if outcome.memory_exceeded {
        (
            Status::MemoryLimitExceeded,
            -5,
            format!("Memory limit exceeded ({}MB)", outcome.memory_limit_mb),
        )
    } else if outcome.exit_code == 0 {
        (Status::Success, 0, outcome.error.clone())
    } else {
        (Status::RuntimeError, outcome.exit_code, outcome.error.clone())
    };

    OutMessage::ExecutionResult {
        output: outcome.output.clone(),
        error,
        status,
        exit_code,
        execution_time_ms: outcome.execution_time_ms,
        timed_out: outcome.timed_out,
        memory_exceeded: outcome.memory_exceeded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Outcome {
        Outcome {
            output: String::new(),
            error: String::new(),
            exit_code: 0,
            execution_time_ms: 10,
            timed_out: false,
            memory_exceeded: false,
            time_limit_sec: 5,
            memory_limit_mb: 256,
        }
    }

    #[test]
    fn clean_exit_is_success() {
        let msg = classify(&base());
        match msg {
            OutMessage::ExecutionResult {
                status, exit_code, ..
            } => {
                assert!(matches!(status, Status::Success));
                assert_eq!(exit_code, 0);
            }
            _ => panic!("expected ExecutionResult"),
        }
    }

    #[test]
    fn nonzero_exit_is_runtime_error_with_that_code() {
        let mut outcome = base();
        outcome.exit_code = 7;
        let msg = classify(&outcome);
        match msg {
            OutMessage::ExecutionResult {
                status, exit_code, ..
            } => {
                assert!(matches!(status, Status::RuntimeError));
                assert_eq!(exit_code, 7);
            }
            _ => panic!("expected ExecutionResult"),
        }
    }

    #[test]
    fn timeout_takes_precedence_over_exit_code() {
        let mut outcome = base();
        outcome.exit_code = 0;
        outcome.timed_out = true;
        let msg = classify(&outcome);
        match msg {
            OutMessage::ExecutionResult {
                status,
                exit_code,
                error,
                ..
            } => {
                assert!(matches!(status, Status::TimeLimitExceeded));
                assert_eq!(exit_code, -4);
                assert_eq!(error, "Time limit exceeded (5s)");
            }
            _ => panic!("expected ExecutionResult"),
        }
    }

    #[test]
    fn memory_exceeded_takes_precedence_over_exit_code_but_not_timeout() {
        let mut outcome = base();
        outcome.memory_exceeded = true;
        outcome.timed_out = true;
        let msg = classify(&outcome);
        match msg {
            OutMessage::ExecutionResult { exit_code, error, .. } => {
                assert_eq!(exit_code, -4);
                assert_eq!(error, "Time limit exceeded (5s)");
            }
            _ => panic!("expected ExecutionResult"),
        }

        let mut outcome2 = base();
        outcome2.memory_exceeded = true;
        let msg2 = classify(&outcome2);
        match msg2 {
            OutMessage::ExecutionResult {
                status,
                exit_code,
                error,
                ..
            } => {
                assert!(matches!(status, Status::MemoryLimitExceeded));
                assert_eq!(exit_code, -5);
                assert_eq!(error, "Memory limit exceeded (256MB)");
            }
            _ => panic!("expected ExecutionResult"),
        }
    }
}

//! Input-request heuristic (spec §4.G): decides, from silence in the
//! child's output stream, when to emit `INPUT_REQUIRED`.
//!
//! Deliberately a small pure struct, separated from the async I/O loop, so
//! its thresholds are unit-testable without spawning a child or a socket.
//! This is the most fragile part of the system — there is no portable way
//! to observe that the child is blocked in `read(stdin)`, so this fires on
//! output having stalled for a few poll cycles. Do not try to make it
//! smarter by inspecting the child; that needs platform-specific tooling
//! (ptrace, /proc) this design intentionally avoids.

use std::time::{Duration, Instant};

const SILENCE_THRESHOLD: Duration = Duration::from_millis(200);
const EXPLICIT_PROMPT_CYCLES: u32 = 2;
const GENERIC_SILENCE_CYCLES: u32 = 3;

/// What to do after one poll tick, if anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    None,
    /// Emit `INPUT_REQUIRED` with this message.
    Emit(String),
}

/// Tracks the accumulators from spec §3 "Session": `current_line` and
/// `consecutive_silence_cycles`, plus the activity timestamp the heuristic
/// measures silence against.
pub struct SilenceTracker {
    current_line: Vec<u8>,
    consecutive_silence_cycles: u32,
    last_activity: Instant,
    has_output_before_silence: bool,
}

impl SilenceTracker {
    #[must_use]
    pub fn new(now: Instant) -> Self {
        Self {
            current_line: Vec::new(),
            consecutive_silence_cycles: 0,
            last_activity: now,
            has_output_before_silence: false,
        }
    }

    /// Feed a chunk of child output. CR/LF clears `current_line`; other
    /// bytes append. Resets the silence counter and marks activity.
    pub fn on_child_output(&mut self, chunk: &[u8], now: Instant) {
        for &byte in chunk {
            if byte == b'\r' || byte == b'\n' {
                self.current_line.clear();
            } else {
                self.current_line.push(byte);
            }
        }
        self.has_output_before_silence = true;
        self.consecutive_silence_cycles = 0;
        self.last_activity = now;
    }

    /// Client input arrived (or was just sent to the child): resets the
    /// silence counter and marks activity, same as child output would.
    pub fn on_activity(&mut self, now: Instant) {
        self.consecutive_silence_cycles = 0;
        self.last_activity = now;
    }

    /// Evaluate one poll tick. `waiting_for_input` and `input_sent` are the
    /// session flags from spec §3; the heuristic only runs when both are
    /// clear and at least one chunk of output has ever been seen.
    pub fn evaluate(&mut self, waiting_for_input: bool, input_sent: bool, now: Instant) -> Prompt {
        if waiting_for_input || input_sent || !self.has_output_before_silence {
            return Prompt::None;
        }

        if now.duration_since(self.last_activity) > SILENCE_THRESHOLD {
            self.consecutive_silence_cycles += 1;
        }

        let explicit_prompt = self.is_explicit_prompt();

        let should_emit = (explicit_prompt && self.consecutive_silence_cycles >= EXPLICIT_PROMPT_CYCLES)
            || self.consecutive_silence_cycles >= GENERIC_SILENCE_CYCLES;

        if !should_emit {
            return Prompt::None;
        }

        let message = if explicit_prompt {
            format!(
                "Program expects input: {}",
                String::from_utf8_lossy(&self.current_line)
            )
        } else {
            "Program is waiting for input...".to_string()
        };

        self.current_line.clear();
        self.consecutive_silence_cycles = 0;

        Prompt::Emit(message)
    }

    fn is_explicit_prompt(&self) -> bool {
        if self.current_line.is_empty() {
            return false;
        }
        let ends_with_punct = matches!(self.current_line.last(), Some(b':') | Some(b'>'));
        let lowered = String::from_utf8_lossy(&self.current_line).to_lowercase();
        ends_with_punct || lowered.contains("enter") || lowered.contains("input")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_prompt_without_prior_output() {
        let t0 = Instant::now();
        let mut tracker = SilenceTracker::new(t0);
        let prompt = tracker.evaluate(false, false, t0 + Duration::from_millis(500));
        assert_eq!(prompt, Prompt::None);
    }

    #[test]
    fn explicit_prompt_fires_after_two_cycles() {
        let t0 = Instant::now();
        let mut tracker = SilenceTracker::new(t0);
        tracker.on_child_output(b"Enter your name:", t0);

        // Cycle 1: silent past threshold.
        let p1 = tracker.evaluate(false, false, t0 + Duration::from_millis(250));
        assert_eq!(p1, Prompt::None);

        // Cycle 2: second consecutive silent tick crosses the explicit threshold.
        let p2 = tracker.evaluate(false, false, t0 + Duration::from_millis(500));
        assert!(matches!(p2, Prompt::Emit(ref m) if m.contains("Enter your name:")));
    }

    #[test]
    fn generic_silence_needs_three_cycles() {
        let t0 = Instant::now();
        let mut tracker = SilenceTracker::new(t0);
        tracker.on_child_output(b"working", t0);

        assert_eq!(
            tracker.evaluate(false, false, t0 + Duration::from_millis(250)),
            Prompt::None
        );
        assert_eq!(
            tracker.evaluate(false, false, t0 + Duration::from_millis(500)),
            Prompt::None
        );
        let p3 = tracker.evaluate(false, false, t0 + Duration::from_millis(750));
        assert_eq!(p3, Prompt::Emit("Program is waiting for input...".to_string()));
    }

    #[test]
    fn waiting_for_input_suppresses_evaluation() {
        let t0 = Instant::now();
        let mut tracker = SilenceTracker::new(t0);
        tracker.on_child_output(b"prompt:", t0);
        let prompt = tracker.evaluate(true, false, t0 + Duration::from_secs(1));
        assert_eq!(prompt, Prompt::None);
    }

    #[test]
    fn fresh_output_resets_silence_counter() {
        let t0 = Instant::now();
        let mut tracker = SilenceTracker::new(t0);
        tracker.on_child_output(b"one:", t0);
        tracker.evaluate(false, false, t0 + Duration::from_millis(250));
        // More output arrives before the threshold is crossed again.
        tracker.on_child_output(b"two:", t0 + Duration::from_millis(260));
        let prompt = tracker.evaluate(false, false, t0 + Duration::from_millis(300));
        assert_eq!(prompt, Prompt::None);
    }

    #[test]
    fn current_line_tracks_latest_unterminated_line() {
        let t0 = Instant::now();
        let mut tracker = SilenceTracker::new(t0);
        tracker.on_child_output(b"first line\nsecond", t0);
        assert_eq!(tracker.current_line, b"second");
    }
}

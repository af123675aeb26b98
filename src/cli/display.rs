//! Display utilities for the focus timer CLI.
//!
//! This module provides formatted output for:
//! - Start, stop and remaining-time replies
//! - Quiet output for scripts
//! - Error messages

use std::time::Duration;

use chrono::{DateTime, Local};

// ============================================================================
// Display
// ============================================================================

/// Display utilities for CLI output.
#[derive(Debug, Clone, Copy, Default)]
pub struct Display {
    /// Print bare values instead of sentences
    quiet: bool,
}

impl Display {
    /// Creates a display; `quiet` selects bare output for scripts.
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    /// Shows when a freshly started timer will finish.
    pub fn show_start_success(&self, deadline: &DateTime<Local>) {
        println!("{}", self.start_message(deadline));
    }

    /// Shows how much time was left when the timer was stopped.
    pub fn show_stop_success(&self, remaining: Duration) {
        println!("{}", self.stop_message(remaining));
    }

    /// Shows the time left on the clock.
    pub fn show_remaining(&self, remaining: Duration) {
        for line in self.remaining_lines(remaining) {
            println!("{}", line);
        }
    }

    /// Shows an error message.
    pub fn show_error(message: &str) {
        eprintln!("error: {}", message);
    }

    fn start_message(&self, deadline: &DateTime<Local>) -> String {
        let time = Self::format_clock(deadline);
        if self.quiet {
            time
        } else {
            format!("timer will finish at {}", time)
        }
    }

    fn stop_message(&self, remaining: Duration) -> String {
        let minutes = Self::round_minutes(remaining);
        if self.quiet {
            minutes.to_string()
        } else {
            format!(
                "there was {} {} left on the clock!",
                minutes,
                Self::minutes_word(minutes)
            )
        }
    }

    fn remaining_lines(&self, remaining: Duration) -> Vec<String> {
        let minutes = Self::round_minutes(remaining);

        if self.quiet {
            return vec![minutes.to_string()];
        }

        if remaining.is_zero() {
            return vec![
                "the clock was not running!".to_string(),
                "use `tomato start` to get going.".to_string(),
            ];
        }

        vec![format!(
            "there {} {} {} left on the clock!",
            if minutes == 1 { "is" } else { "are" },
            minutes,
            Self::minutes_word(minutes)
        )]
    }

    /// Formats a deadline as local `HH:MM`.
    fn format_clock(deadline: &DateTime<Local>) -> String {
        deadline.format("%H:%M").to_string()
    }

    /// Rounds a duration to the nearest whole minute, halves rounding up.
    fn round_minutes(duration: Duration) -> u128 {
        (duration.as_millis() + 30_000) / 60_000
    }

    fn minutes_word(minutes: u128) -> &'static str {
        if minutes == 1 {
            "minute"
        } else {
            "minutes"
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Run progress reporting
//!
//! The interpreter reports what it is doing and asks whether to pause or
//! stop through a `ProgressSink`. Every method has a no-op default.

use std::fmt;
use std::io::{self, BufRead, Write};

use crate::verdict::VerdictStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Setup,
    Preconditions,
    Scenarios,
    Teardown,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPhase::Setup => write!(f, "SETUP"),
            RunPhase::Preconditions => write!(f, "PRECONDITION"),
            RunPhase::Scenarios => write!(f, "SCENARIOS"),
            RunPhase::Teardown => write!(f, "TEARDOWN"),
        }
    }
}

pub trait ProgressSink {
    fn phase(&mut self, _test: &str, _phase: RunPhase) {}

    fn scenario_started(&mut self, _scenario: u32, _nested: bool) {}

    fn scenario_result(&mut self, _scenario: u32, _status: VerdictStatus, _nested: bool) {}

    /// One executed command, for the operator's console
    fn step(&mut self, _text: &str) {}

    /// `MSG(text)`: wait until the operator acknowledges
    fn prompt(&mut self, _text: &str) {}

    fn is_paused(&self) -> bool {
        false
    }

    fn cancel_requested(&self) -> bool {
        false
    }
}

/// Operator console: progress through `tracing`, prompts on stdin
#[derive(Debug, Clone, Default)]
pub struct ConsoleProgress {
    /// Never block on prompts
    pub ci: bool,
}

impl ConsoleProgress {
    pub fn new(ci: bool) -> Self {
        Self { ci }
    }
}

impl ProgressSink for ConsoleProgress {
    fn phase(&mut self, test: &str, phase: RunPhase) {
        tracing::info!("[{}] {}", test, phase);
    }

    fn scenario_started(&mut self, scenario: u32, nested: bool) {
        let indent = if nested { "  " } else { "" };
        tracing::info!("{}Scenario: {}", indent, scenario);
    }

    fn scenario_result(&mut self, scenario: u32, status: VerdictStatus, nested: bool) {
        let indent = if nested { "  " } else { "" };
        match status {
            VerdictStatus::Failed => tracing::warn!("{}Scenario {} result: {}", indent, scenario, status),
            _ => tracing::info!("{}Scenario {} result: {}", indent, scenario, status),
        }
    }

    fn step(&mut self, text: &str) {
        tracing::info!("{}", text);
    }

    fn prompt(&mut self, text: &str) {
        if self.ci {
            tracing::info!("MSG: {}", text);
            return;
        }
        print!("\n\n{}\n\nPress Enter to continue test run", text);
        if let Err(e) = io::stdout().flush() {
            tracing::warn!("Failed to flush prompt: {}", e);
        }
        let mut line = String::new();
        if let Err(e) = io::stdin().lock().read_line(&mut line) {
            tracing::warn!("Failed to read operator input: {}", e);
        }
    }
}

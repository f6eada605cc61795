//! Per-test run journals
//!
//! `Log.txt` records every step, `Error.txt` only failures, and
//! `VideoCompression.txt` receives the transcoder's diagnostics. All three
//! are recreated at the start of a run.

use chrono::Local;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use super::layout::TestLayout;
use crate::error::ScenarioError;

/// Width of the header rules
const RULE: usize = 80;

#[derive(Default)]
pub struct RunJournal {
    log: Option<BufWriter<File>>,
    errors: Option<BufWriter<File>>,
    video: Option<File>,
}

fn recreate(path: &Path) -> Result<File, ScenarioError> {
    if path.exists() {
        fs::remove_file(path).map_err(|e| ScenarioError::io(path, e))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| ScenarioError::io(path, e))
}

fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S,%3f").to_string()
}

impl RunJournal {
    /// Journal that only forwards to the console
    pub fn closed() -> Self {
        Self::default()
    }

    pub fn open(layout: &TestLayout) -> Result<Self, ScenarioError> {
        Ok(Self {
            log: Some(BufWriter::new(recreate(&layout.log)?)),
            errors: Some(BufWriter::new(recreate(&layout.error_log)?)),
            video: Some(recreate(&layout.video_log)?),
        })
    }

    pub fn info(&mut self, line: &str) {
        tracing::debug!("{}", line);
        if let Some(writer) = &mut self.log
            && let Err(e) = writeln!(writer, "{} {}", timestamp(), line)
        {
            tracing::warn!("Failed to write run log: {}", e);
        }
    }

    pub fn error(&mut self, line: &str) {
        tracing::error!("{}", line);
        if let Some(writer) = &mut self.errors
            && let Err(e) = writeln!(writer, "{} {}", timestamp(), line)
        {
            tracing::warn!("Failed to write error log: {}", e);
        }
    }

    pub fn header(&mut self, test: &str, version: &str) {
        self.info(&"%".repeat(RULE));
        self.info(&format!("TEST: {}", test));
        self.info(&format!("TIME&DATE: {}", Local::now().format("%d/%m/%Y %X")));
        self.info(&format!("VERSION: {}", version));
        self.info(&"%".repeat(RULE));
    }

    pub fn sheet_banner(&mut self, sheet: &str) {
        self.info(&"-".repeat(RULE));
        self.info(&format!("SHEET: {}", sheet));
        self.info(&"-".repeat(RULE));
    }

    pub fn scenario_banner(&mut self, scenario: u32) {
        self.info("");
        self.info(&format!("\t{}", "=".repeat(60)));
        self.info(&format!("\tScenario {}:", scenario));
        self.info(&format!("\t{}", "=".repeat(60)));
    }

    /// Sink for transcoder diagnostics
    pub fn video_log(&self) -> Option<&File> {
        self.video.as_ref()
    }

    pub fn close(&mut self) {
        for mut writer in [self.log.take(), self.errors.take()].into_iter().flatten() {
            if let Err(e) = writer.flush() {
                tracing::warn!("Failed to flush run journal: {}", e);
            }
        }
        self.video = None;
    }
}

impl Drop for RunJournal {
    fn drop(&mut self) {
        self.close();
    }
}

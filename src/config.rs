//! Runner configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for a test run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Folder holding one sub-folder per test
    pub tests_folder: PathBuf,
    /// Golden images folder inside each test folder
    pub golden_folder: String,
    /// Wait after every GDT/SIM injection (ms)
    pub settle_ms: u64,
    /// Wait before reading back a GDT item (ms)
    pub read_settle_ms: u64,
    /// Wait after clearing SIM injections at teardown (ms)
    pub clear_settle_ms: u64,
    /// Poll interval while the run is paused (ms)
    pub pause_poll_ms: u64,
    /// Poll interval while waiting for a background video (ms)
    pub video_poll_ms: u64,
    /// Wait before and after a screenshot (ms)
    pub screenshot_settle_ms: u64,
    /// Minimum correlation for a golden image match
    pub match_threshold: f64,
    /// Minimum correlation for matches inside recorded videos
    pub video_threshold: f64,
    /// Display optics, pixels per degree
    pub pixels_per_degree: f64,
    /// GDT connection names; index 0 serves `GDT`, index 1 `GDT_PSP2`
    pub gdt_connections: Vec<String>,
    /// Screenshot command template, `{path}` is the output file
    pub screenshot_command: Vec<String>,
    /// Video capture command template, `{path}` and `{ms}`
    pub video_command: Vec<String>,
    /// Transcoder command template, `{input}` and `{output}`
    pub transcode_command: Vec<String>,
    /// Verify against an existing Results folder instead of resetting it
    pub reuse_results: bool,
    /// Version written into journals and report footers
    pub version: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            tests_folder: PathBuf::from("tests"),
            golden_folder: "Golden".to_string(),
            settle_ms: 100,
            read_settle_ms: 1000,
            clear_settle_ms: 1200,
            pause_poll_ms: 1000,
            video_poll_ms: 1000,
            screenshot_settle_ms: 1000,
            match_threshold: 0.98,
            video_threshold: 0.98,
            pixels_per_degree: 39.0,
            gdt_connections: vec!["OFP_SR1".to_string(), "OFP_SR2".to_string()],
            screenshot_command: to_strings(&["v2u", "{path}"]),
            video_command: to_strings(&["v2u", "-t", "{ms}", "{path}"]),
            transcode_command: to_strings(&["ffmpeg", "-y", "-i", "{input}", "{output}"]),
            reuse_results: false,
            version: format!("hudcheck {}", env!("CARGO_PKG_VERSION")),
        }
    }
}

fn to_strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

/// Template runner settings (checked into git)
pub const RUNNER_SETTINGS_TEMPLATE: &str = "config/runner_settings.template.json";
/// Local runner settings (gitignored, machine-specific)
pub const RUNNER_SETTINGS_FILE: &str = "config/runner_settings.json";

impl RunnerConfig {
    /// Load configuration from a JSON settings file
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        serde_json::from_str(&contents).map_err(|e| format!("Failed to parse {}: {}", path.display(), e))
    }

    /// Load configuration from default config files
    /// Priority: local settings > template settings > built-in defaults
    pub fn from_config_files() -> Self {
        if let Ok(config) = Self::from_file(Path::new(RUNNER_SETTINGS_FILE)) {
            return config;
        }
        if let Ok(config) = Self::from_file(Path::new(RUNNER_SETTINGS_TEMPLATE)) {
            return config;
        }
        Self::default()
    }

    /// Explicit settings file if given, otherwise the default files
    pub fn load(explicit: Option<&Path>) -> Result<Self, String> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => Ok(Self::from_config_files()),
        }
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn read_settle(&self) -> Duration {
        Duration::from_millis(self.read_settle_ms)
    }

    pub fn clear_settle(&self) -> Duration {
        Duration::from_millis(self.clear_settle_ms)
    }

    pub fn pause_poll(&self) -> Duration {
        Duration::from_millis(self.pause_poll_ms)
    }

    pub fn video_poll(&self) -> Duration {
        Duration::from_millis(self.video_poll_ms)
    }

    pub fn screenshot_settle(&self) -> Duration {
        Duration::from_millis(self.screenshot_settle_ms)
    }

    /// Zero every wait; used by tests and dry runs on the bench rig
    pub fn without_delays(mut self) -> Self {
        self.settle_ms = 0;
        self.read_settle_ms = 0;
        self.clear_settle_ms = 0;
        self.pause_poll_ms = 0;
        self.video_poll_ms = 0;
        self.screenshot_settle_ms = 0;
        self
    }
}

//! Files and folders of one test
//!
//! ```text
//! <tests>/<name>/
//!     <name>.toml            workbook
//!     <name>_Result.json     report
//!     Log.txt Error.txt VideoCompression.txt
//!     Golden/                golden images and patterns
//!     Results/<sheet>/       captures: Scenario_N.png, Scenario_N.mp4
//!     Output/<sheet>/        annotated: Step N.png, Step N.avi
//! ```

use std::path::{Path, PathBuf};

use crate::config::RunnerConfig;

#[derive(Debug, Clone)]
pub struct TestLayout {
    pub name: String,
    pub root: PathBuf,
    pub golden: PathBuf,
    pub output: PathBuf,
    pub results: PathBuf,
    pub workbook: PathBuf,
    pub report: PathBuf,
    pub log: PathBuf,
    pub error_log: PathBuf,
    pub video_log: PathBuf,
}

impl TestLayout {
    pub fn new(config: &RunnerConfig, name: &str) -> Self {
        Self::at(&config.tests_folder.join(name), name, &config.golden_folder)
    }

    pub fn at(root: &Path, name: &str, golden_folder: &str) -> Self {
        Self {
            name: name.to_string(),
            root: root.to_path_buf(),
            golden: root.join(golden_folder),
            output: root.join("Output"),
            results: root.join("Results"),
            workbook: root.join(format!("{}.toml", name)),
            report: root.join(format!("{}_Result.json", name)),
            log: root.join("Log.txt"),
            error_log: root.join("Error.txt"),
            video_log: root.join("VideoCompression.txt"),
        }
    }

    pub fn output_dir(&self, sheet: &str) -> PathBuf {
        self.output.join(sheet)
    }

    pub fn results_dir(&self, sheet: &str) -> PathBuf {
        self.results.join(sheet)
    }

    pub fn screenshot(&self, sheet: &str, scenario: u32) -> PathBuf {
        self.results_dir(sheet).join(format!("Scenario_{}.png", scenario))
    }

    /// (raw capture, compressed recording)
    pub fn recording(&self, sheet: &str, scenario: u32) -> (PathBuf, PathBuf) {
        let dir = self.results_dir(sheet);
        (
            dir.join(format!("Scenario_{}.avi", scenario)),
            dir.join(format!("Scenario_{}.mp4", scenario)),
        )
    }

    /// `Step N.<ext>`, or `Step N_1.<ext>`, `Step N_2.<ext>`, ... when taken
    pub fn step_output(&self, sheet: &str, scenario: u32, extension: &str) -> PathBuf {
        let dir = self.output_dir(sheet);
        let first = dir.join(format!("Step {}.{}", scenario, extension));
        if !first.exists() {
            return first;
        }
        (1..)
            .map(|n| dir.join(format!("Step {}_{}.{}", scenario, n, extension)))
            .find(|p| !p.exists())
            .unwrap_or(first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let config = RunnerConfig {
            tests_folder: PathBuf::from("/data/tests"),
            ..Default::default()
        };
        let layout = TestLayout::new(&config, "HUD_001");
        assert_eq!(layout.workbook, PathBuf::from("/data/tests/HUD_001/HUD_001.toml"));
        assert_eq!(layout.report, PathBuf::from("/data/tests/HUD_001/HUD_001_Result.json"));
        assert_eq!(layout.golden, PathBuf::from("/data/tests/HUD_001/Golden"));
        assert_eq!(
            layout.screenshot("Scenarios", 3),
            PathBuf::from("/data/tests/HUD_001/Results/Scenarios/Scenario_3.png")
        );
    }

    #[test]
    fn test_step_output_numbering() {
        let dir = tempfile::tempdir().unwrap();
        let layout = TestLayout::at(dir.path(), "T", "Golden");
        std::fs::create_dir_all(layout.output_dir("Scenarios")).unwrap();

        let first = layout.step_output("Scenarios", 2, "png");
        assert!(first.ends_with("Step 2.png"));
        std::fs::write(&first, b"").unwrap();

        let second = layout.step_output("Scenarios", 2, "png");
        assert!(second.ends_with("Step 2_1.png"));
        std::fs::write(&second, b"").unwrap();

        assert!(layout.step_output("Scenarios", 2, "png").ends_with("Step 2_2.png"));
    }
}

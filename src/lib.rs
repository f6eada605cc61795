//! hudcheck - hardware-in-the-loop test runner for head-up displays
//!
//! Scenario workbooks drive a rig (GDT channels, simulation engine, display
//! capture) and check what the HUD shows against golden images.

pub mod config;
pub mod error;
pub mod noise;
pub mod pattern;
pub mod rig;
pub mod scenario;
pub mod verdict;
pub mod video;

// Re-export commonly used types for convenience
pub use config::RunnerConfig;
pub use error::{
    ComparisonError, ConnectionError, NoiseError, ParameterError, PatternError, RigError, ScenarioError,
};
pub use noise::NoiseSpec;
pub use pattern::{GoldenImage, GoldenPattern, MatchOutcome, PatternMatcher, SearchBox};
pub use rig::Rig;
pub use scenario::{ProgressSink, Report, RunOutcome, RunSummary, ScenarioInterpreter, run_test};
pub use verdict::VerdictStatus;

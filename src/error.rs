//! Error taxonomy shared by the matcher, the rig collaborators and the
//! scenario interpreter.
//!
//! Primitive operations return narrow errors (`ParameterError`,
//! `ComparisonError`, `PatternError`, `NoiseError`, `RigError`). Anything the
//! interpreter cannot recover from is lifted into `ScenarioError`, which aborts
//! the run and sends it straight to teardown.

use std::io;

/// Invalid argument passed to a primitive operation.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{parameter}: {message}")]
pub struct ParameterError {
    pub parameter: String,
    pub message: String,
}

impl ParameterError {
    pub fn new(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            parameter: parameter.into(),
            message: message.into(),
        }
    }
}

/// A GDT channel or the simulation engine could not be reached.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{target}: {message}")]
pub struct ConnectionError {
    pub target: String,
    pub message: String,
}

impl ConnectionError {
    pub fn new(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            message: message.into(),
        }
    }
}

/// Failure reported by one collaborator call.
#[derive(Debug, thiserror::Error)]
pub enum RigError {
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("{0} is not connected yet")]
    NotConnected(String),

    #[error("injection error: {0}")]
    Injection(String),

    #[error("parameter error: {0}")]
    Parameter(#[from] ParameterError),

    #[error("capture error: {0}")]
    Capture(String),

    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Sparse golden pattern could not be built or read back.
#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("Invalid pattern file: {path} ({reason})")]
    InvalidFile { path: String, reason: String },

    #[error("pattern has no pixel different from the background colour")]
    Empty,

    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("image error on {path}: {source}")]
    Image {
        path: String,
        #[source]
        source: image::ImageError,
    },
}

/// Image or video comparator precondition violated.
#[derive(Debug, thiserror::Error)]
pub enum ComparisonError {
    #[error("{kind} file does not exist: {path}")]
    MissingFile { kind: &'static str, path: String },

    #[error("Invalid image file {path}: {source}")]
    InvalidImage {
        path: String,
        #[source]
        source: image::ImageError,
    },

    #[error("Invalid bounds for {path}: {message}")]
    Bounds { path: String, message: String },

    #[error(
        "Invalid golden image size {path}: golden image {axis} ({golden}) is greater than reference image {axis} ({reference})"
    )]
    GoldenTooLarge {
        path: String,
        axis: &'static str,
        golden: u32,
        reference: u32,
    },

    #[error("golden image {path} has no reference point offset")]
    MissingReferencePoint { path: String },

    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error(transparent)]
    Parameter(#[from] ParameterError),

    #[error("video error: {0}")]
    Video(String),
}

/// Malformed `noise_<kind>(...)` literal.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NoiseError {
    #[error("Cannot read {literal}. Make sure to follow the format noise_<kind>(arg1,arg2,...)")]
    Syntax { literal: String },

    #[error("Incorrect usage of noise {kind}: expected {expected}, got {found} argument(s)")]
    Arity {
        kind: &'static str,
        expected: &'static str,
        found: usize,
    },

    #[error("Incorrect usage of noise {kind}: \"{token}\" must be an integer")]
    Integer { kind: &'static str, token: String },

    #[error("SimEngine injection error: \"{token}\" must be a number!")]
    Duration { token: String },
}

impl NoiseError {
    /// Duration problems are injection failures (logged, skipped); everything
    /// else is a malformed command.
    pub fn is_injection_error(&self) -> bool {
        matches!(self, NoiseError::Duration { .. })
    }
}

/// Fatal to the run: malformed command syntax or missing structure.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("{message}: {text}")]
    Malformed { text: String, message: String },

    #[error("unknown {role} command: {text}")]
    UnknownCommand { role: &'static str, text: String },

    #[error("Cannot find the symbol '#' to determine where to read sheet {sheet}")]
    MissingAnchor { sheet: String },

    #[error("Sheet '{name}' was not found. Sheet names: {available:?}")]
    MissingSheet { name: String, available: Vec<String> },

    #[error("There are no tests corresponding to the specified test name: {0}")]
    MissingTest(String),

    #[error("Failed to read workbook {path}: {message}")]
    Workbook { path: String, message: String },

    #[error("GDT error: Failed to inject value {value} into data item {item}. Please check if the value or data item is valid.")]
    InjectionFailed { item: String, value: String },

    #[error(transparent)]
    Noise(#[from] NoiseError),

    #[error(transparent)]
    Comparison(#[from] ComparisonError),

    #[error("PARAMETER ERROR: {0}")]
    Parameter(#[from] ParameterError),

    #[error("CONNECTION ERROR: {0}")]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Rig(#[from] RigError),

    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl ScenarioError {
    pub fn malformed(text: impl Into<String>, message: impl Into<String>) -> Self {
        ScenarioError::Malformed {
            text: text.into(),
            message: message.into(),
        }
    }

    pub fn io(path: impl AsRef<std::path::Path>, source: io::Error) -> Self {
        ScenarioError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noise_duration_is_injection_error() {
        let err = NoiseError::Duration { token: "abc".into() };
        assert!(err.is_injection_error());
        assert!(err.to_string().contains("\"abc\""));

        let err = NoiseError::Syntax { literal: "noise_x".into() };
        assert!(!err.is_injection_error());
    }

    #[test]
    fn test_bounds_error_names_file() {
        let err = ComparisonError::Bounds {
            path: "Scenario_1.png".into(),
            message: "top left X coordinate (10) should be less than bottom right X coordinate (5)".into(),
        };
        let text = err.to_string();
        assert!(text.contains("Scenario_1.png"));
        assert!(text.contains("(10)"));
    }
}

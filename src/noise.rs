//! `noise_<kind>(args)` literals for simulation-engine waveform injection.
//!
//! ```text
//! noise_steps(value,frequency,start,end)
//! noise_sine(bias,amplitude,frequency)
//! noise_constant(value,duration_ms)
//! noise_pulse(value1,duration1_ms,value2,duration2_ms,repetitions)
//! noise_manhattan(value1,duration1_ms,value2,duration2_ms,...,repetitions)
//! ```
//!
//! Values are handed to the engine verbatim; durations and counts are
//! integers.

use std::fmt;
use std::time::Duration;

use crate::error::NoiseError;

const PREFIX: &str = "noise_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoiseSpec {
    Steps {
        value: String,
        frequency: String,
        start: String,
        end: String,
    },
    Sine {
        bias: String,
        amplitude: String,
        frequency: String,
    },
    Constant {
        value: String,
        duration_ms: u64,
    },
    Pulse {
        first_value: String,
        first_ms: u64,
        second_value: String,
        second_ms: u64,
        repetitions: u32,
    },
    Manhattan {
        /// (value, duration ms) pairs
        segments: Vec<(String, u64)>,
        repetitions: u32,
    },
}

/// Whether a SIM cell value should be read as a noise literal
pub fn is_noise_literal(text: &str) -> bool {
    text.trim()
        .get(..PREFIX.len())
        .is_some_and(|p| p.eq_ignore_ascii_case(PREFIX))
}

impl NoiseSpec {
    pub fn parse(text: &str) -> Result<Self, NoiseError> {
        let syntax = || NoiseError::Syntax {
            literal: text.to_string(),
        };

        let trimmed = text.trim();
        if !is_noise_literal(trimmed) {
            return Err(syntax());
        }
        let rest = &trimmed[PREFIX.len()..];
        let open = rest.find('(').ok_or_else(syntax)?;
        let args = rest[open + 1..].strip_suffix(')').ok_or_else(syntax)?;
        let kind = rest[..open].to_lowercase();
        let args: Vec<String> = args.split(',').map(|a| a.trim().to_string()).collect();

        match kind.as_str() {
            "steps" => {
                let [value, frequency, start, end] = exact::<4>(args, "steps", "4 (value,frequency,start,end)")?;
                Ok(NoiseSpec::Steps {
                    value,
                    frequency,
                    start,
                    end,
                })
            }
            "sine" => {
                let [bias, amplitude, frequency] = exact::<3>(args, "sine", "3 (bias,amplitude,frequency)")?;
                Ok(NoiseSpec::Sine {
                    bias,
                    amplitude,
                    frequency,
                })
            }
            "constant" => {
                let [value, duration] = exact::<2>(args, "constant", "2 (value,duration_ms)")?;
                Ok(NoiseSpec::Constant {
                    value,
                    duration_ms: integer("constant", &duration)?,
                })
            }
            "pulse" => {
                let [first_value, first_ms, second_value, second_ms, repetitions] = exact::<5>(
                    args,
                    "pulse",
                    "5 (value1,duration1_ms,value2,duration2_ms,repetitions)",
                )?;
                Ok(NoiseSpec::Pulse {
                    first_value,
                    first_ms: integer("pulse", &first_ms)?,
                    second_value,
                    second_ms: integer("pulse", &second_ms)?,
                    repetitions: integer("pulse", &repetitions)?,
                })
            }
            "manhattan" => parse_manhattan(args),
            _ => Err(syntax()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            NoiseSpec::Steps { .. } => "steps",
            NoiseSpec::Sine { .. } => "sine",
            NoiseSpec::Constant { .. } => "constant",
            NoiseSpec::Pulse { .. } => "pulse",
            NoiseSpec::Manhattan { .. } => "manhattan",
        }
    }

    /// How long the waveform holds the channel once injected, for the kinds
    /// that have a finite length.
    pub fn hold_time(&self) -> Option<Duration> {
        match self {
            NoiseSpec::Constant { duration_ms, .. } => Some(Duration::from_millis(*duration_ms)),
            NoiseSpec::Pulse {
                first_ms,
                second_ms,
                repetitions,
                ..
            } => Some(Duration::from_millis(
                *repetitions as u64 * (first_ms + second_ms),
            )),
            _ => None,
        }
    }
}

fn exact<const N: usize>(
    args: Vec<String>,
    kind: &'static str,
    expected: &'static str,
) -> Result<[String; N], NoiseError> {
    let found = args.len();
    args.try_into().map_err(|_| NoiseError::Arity {
        kind,
        expected,
        found,
    })
}

fn integer<T: std::str::FromStr>(kind: &'static str, token: &str) -> Result<T, NoiseError> {
    token.parse().map_err(|_| NoiseError::Integer {
        kind,
        token: token.to_string(),
    })
}

fn parse_manhattan(mut args: Vec<String>) -> Result<NoiseSpec, NoiseError> {
    if args.len() < 3 || args.len() % 2 == 0 {
        return Err(NoiseError::Arity {
            kind: "manhattan",
            expected: "value/duration pairs followed by a repeat count",
            found: args.len(),
        });
    }

    let repetitions = args.pop().unwrap_or_default();
    let repetitions = integer("manhattan", &repetitions)?;

    let mut segments = Vec::with_capacity(args.len() / 2);
    for pair in args.chunks_exact(2) {
        let (value, duration) = (&pair[0], &pair[1]);
        let duration_ms = duration.parse().map_err(|_| NoiseError::Duration {
            token: duration.clone(),
        })?;
        segments.push((value.clone(), duration_ms));
    }

    Ok(NoiseSpec::Manhattan {
        segments,
        repetitions,
    })
}

impl fmt::Display for NoiseSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoiseSpec::Steps {
                value,
                frequency,
                start,
                end,
            } => write!(f, "noise_steps({},{},{},{})", value, frequency, start, end),
            NoiseSpec::Sine {
                bias,
                amplitude,
                frequency,
            } => write!(f, "noise_sine({},{},{})", bias, amplitude, frequency),
            NoiseSpec::Constant { value, duration_ms } => {
                write!(f, "noise_constant({},{})", value, duration_ms)
            }
            NoiseSpec::Pulse {
                first_value,
                first_ms,
                second_value,
                second_ms,
                repetitions,
            } => write!(
                f,
                "noise_pulse({},{},{},{},{})",
                first_value, first_ms, second_value, second_ms, repetitions
            ),
            NoiseSpec::Manhattan {
                segments,
                repetitions,
            } => {
                write!(f, "noise_manhattan(")?;
                for (value, duration) in segments {
                    write!(f, "{},{},", value, duration)?;
                }
                write!(f, "{})", repetitions)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_four_params() {
        let spec = NoiseSpec::parse("noise_steps(1,2,3,4)").unwrap();
        assert_eq!(
            spec,
            NoiseSpec::Steps {
                value: "1".into(),
                frequency: "2".into(),
                start: "3".into(),
                end: "4".into(),
            }
        );
    }

    #[test]
    fn test_steps_wrong_arity() {
        let err = NoiseSpec::parse("noise_steps(1,2)").unwrap_err();
        assert_eq!(
            err,
            NoiseError::Arity {
                kind: "steps",
                expected: "4 (value,frequency,start,end)",
                found: 2,
            }
        );
        assert!(!err.is_injection_error());
        assert!(err.to_string().contains("value,frequency,start,end"));
    }

    #[test]
    fn test_kind_is_case_insensitive() {
        let spec = NoiseSpec::parse("NOISE_Sine(0.5,2,10)").unwrap();
        assert_eq!(spec.kind(), "sine");
        assert!(is_noise_literal("Noise_constant(1,100)"));
        assert!(!is_noise_literal("noisy"));
    }

    #[test]
    fn test_constant_and_pulse_integers() {
        let spec = NoiseSpec::parse("noise_constant(3.5,250)").unwrap();
        assert_eq!(spec.hold_time(), Some(Duration::from_millis(250)));

        let spec = NoiseSpec::parse("noise_pulse(1,100,0,50,3)").unwrap();
        assert_eq!(spec.hold_time(), Some(Duration::from_millis(450)));

        let err = NoiseSpec::parse("noise_constant(3.5,abc)").unwrap_err();
        assert!(matches!(err, NoiseError::Integer { kind: "constant", .. }));
    }

    #[test]
    fn test_manhattan_pairs() {
        let spec = NoiseSpec::parse("noise_manhattan(10,100,20,200,3)").unwrap();
        assert_eq!(
            spec,
            NoiseSpec::Manhattan {
                segments: vec![("10".into(), 100), ("20".into(), 200)],
                repetitions: 3,
            }
        );
        assert_eq!(spec.to_string(), "noise_manhattan(10,100,20,200,3)");
    }

    #[test]
    fn test_manhattan_duration_is_injection_error() {
        let err = NoiseSpec::parse("noise_manhattan(10,fast,20,200,3)").unwrap_err();
        assert_eq!(err, NoiseError::Duration { token: "fast".into() });
        assert!(err.is_injection_error());
    }

    #[test]
    fn test_manhattan_even_count_rejected() {
        let err = NoiseSpec::parse("noise_manhattan(10,100,3,4)").unwrap_err();
        assert!(matches!(err, NoiseError::Arity { kind: "manhattan", found: 4, .. }));
    }

    #[test]
    fn test_malformed_syntax() {
        assert!(matches!(
            NoiseSpec::parse("noise_steps 1,2,3,4"),
            Err(NoiseError::Syntax { .. })
        ));
        assert!(matches!(
            NoiseSpec::parse("noise_square(1,2)"),
            Err(NoiseError::Syntax { .. })
        ));
    }
}

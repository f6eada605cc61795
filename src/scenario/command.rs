//! Cell text to typed commands
//!
//! The reference row gives every column a role; a cell's role and heading
//! decide how its text is read:
//!
//! | Role                    | Cell                                   |
//! |-------------------------|----------------------------------------|
//! | GDT, GDT_PSP2           | value for the heading's data item      |
//! | GDT_STRUCT[_PSP2]       | value for the heading's `Struct.field` |
//! | SIM                     | value or noise literal for the label   |
//! | any inject role, INJECT | `key=value:key=value` bundle           |
//! | ACTION                  | `SLEEP(s)`, `MSG(text)`, `VIDEO(s)`... |
//! | EXPECTED                | comma separated verification forms     |

use std::collections::HashMap;

use super::compare::{RelationalCheck, parse_validity};
use crate::error::{ParameterError, ScenarioError};
use crate::pattern::{AngularOffset, SearchBox};

/// Marker for a cell that is not applicable
pub const NOT_APPLICABLE: &str = "N/A";
const LEGACY_NOT_APPLICABLE: &str = "N\\A";

/// `N\A` is read as `N/A`
pub fn normalize_cell(text: &str) -> &str {
    if text == LEGACY_NOT_APPLICABLE { NOT_APPLICABLE } else { text }
}

// ============================================================================
// Column roles
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    /// GDT data items of channel 0 (`GDT`) or 1 (`GDT_PSP2`)
    Gdt(usize),
    GdtStruct(usize),
    Sim,
    Action,
    Expected,
}

impl ColumnRole {
    pub fn parse(reference: &str) -> Option<Self> {
        match reference.trim().to_uppercase().as_str() {
            "GDT" => Some(ColumnRole::Gdt(0)),
            "GDT_PSP2" => Some(ColumnRole::Gdt(1)),
            "GDT_STRUCT" => Some(ColumnRole::GdtStruct(0)),
            "GDT_STRUCT_PSP2" => Some(ColumnRole::GdtStruct(1)),
            "SIM" => Some(ColumnRole::Sim),
            "ACTION" => Some(ColumnRole::Action),
            "EXPECTED" => Some(ColumnRole::Expected),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ColumnRole::Gdt(0) => "GDT",
            ColumnRole::Gdt(_) => "GDT_PSP2",
            ColumnRole::GdtStruct(0) => "GDT_STRUCT",
            ColumnRole::GdtStruct(_) => "GDT_STRUCT_PSP2",
            ColumnRole::Sim => "SIM",
            ColumnRole::Action => "ACTION",
            ColumnRole::Expected => "EXPECTED",
        }
    }

    /// GDT channel a column connects at sheet start
    pub fn connects(self) -> Option<usize> {
        match self {
            ColumnRole::Gdt(channel) => Some(channel),
            _ => None,
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum GdtWrite {
    Value(String),
    Validity(bool),
    Override(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Injection {
    Gdt {
        channel: usize,
        item: String,
        write: GdtWrite,
    },
    /// Straight-visor coefficients
    Visor { channel: usize },
    GdtStruct {
        channel: usize,
        structure: String,
        field: String,
        value: String,
    },
    /// `value` may be a noise literal
    Sim {
        label: String,
        unit: String,
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Delay(f64),
    Message(String),
    CallTest(String),
    Screenshot,
    Video { seconds: f64, background: bool },
    GdtDisconnect,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameMethod {
    Pattern {
        search: SearchBox,
        tolerance: u32,
    },
    SubImage {
        search: SearchBox,
        grab: SearchBox,
        tolerance: u32,
    },
    PatternRdp {
        offset: AngularOffset,
        tolerance: u32,
    },
}

impl FrameMethod {
    pub fn name(&self) -> &'static str {
        match self {
            FrameMethod::Pattern { .. } => "PATTERN",
            FrameMethod::SubImage { .. } => "SUB_IMAGE",
            FrameMethod::PatternRdp { .. } => "PATTERN_RDP",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimCheck {
    pub label: String,
    pub unit: String,
    pub expected: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expectation {
    FrameCompare {
        absence: bool,
        golden: String,
        method: FrameMethod,
    },
    Flashing {
        expected: u32,
        steady: String,
        flashing: String,
        search: SearchBox,
        tolerance: u32,
    },
    Sim(Vec<SimCheck>),
    Gdt {
        channel: usize,
        checks: Vec<RelationalCheck>,
    },
    GdtStruct {
        channel: usize,
        structure: String,
        checks: Vec<RelationalCheck>,
    },
    GdtBitview(Vec<RelationalCheck>),
    NotApplicable,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Inject(Injection),
    /// Items of an `INJECT` column; each one fails on its own
    InjectBundle(Vec<Injection>),
    Act(Action),
    /// AND-combined
    Verify(Vec<Expectation>),
}

// ============================================================================
// Parser
// ============================================================================

/// Split `Label[unit]` into label and unit; no unit is `N/A`
pub fn split_unit(label: &str) -> (String, String) {
    if label.ends_with(']')
        && let Some(start) = label.rfind('[')
    {
        return (label[..start].to_string(), label[start..].to_string());
    }
    (label.to_string(), NOT_APPLICABLE.to_string())
}

/// Text between the first `(` and the last `)`
fn call_args(text: &str) -> Option<&str> {
    let open = text.find('(')?;
    let close = text.rfind(')')?;
    (open < close).then(|| &text[open + 1..close])
}

/// Split on commas that are not inside parentheses
pub fn split_expressions(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth <= 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

fn parse_tolerance(text: &str, cell: &str) -> Result<u32, ScenarioError> {
    text.trim()
        .parse()
        .map_err(|_| ScenarioError::malformed(cell, format!("Tolerance \"{}\" is not a whole number", text)))
}

fn parse_box(text: &str) -> Result<SearchBox, ScenarioError> {
    Ok(SearchBox::parse(text)?)
}

/// Reads cells, resolving SIM values through the `Actions` aliases
#[derive(Debug, Clone, Default)]
pub struct CommandParser {
    aliases: HashMap<String, String>,
}

impl CommandParser {
    pub fn new(aliases: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            aliases: aliases.into_iter().collect(),
        }
    }

    pub fn parse_cell(&self, role: ColumnRole, heading: &str, value: &str) -> Result<Command, ScenarioError> {
        match role {
            ColumnRole::Action => Ok(Command::Act(parse_action(value)?)),
            ColumnRole::Expected => Ok(Command::Verify(parse_expected(value)?)),
            _ if heading.to_uppercase().contains("INJECT") => {
                let items = value
                    .split(':')
                    .map(|pair| match pair.split('=').collect::<Vec<_>>().as_slice() {
                        [key, item_value] => self.injection(role, key, item_value),
                        _ => Err(ScenarioError::malformed(value, "Bundle items must be key=value")),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Command::InjectBundle(items))
            }
            _ => Ok(Command::Inject(self.injection(role, heading, value)?)),
        }
    }

    fn injection(&self, role: ColumnRole, key: &str, value: &str) -> Result<Injection, ScenarioError> {
        match role {
            ColumnRole::Gdt(channel) => gdt_injection(channel, key, value),
            ColumnRole::GdtStruct(channel) => {
                let (structure, field) = key
                    .split_once('.')
                    .ok_or_else(|| ScenarioError::malformed(key, "GDT_STRUCT items must be Struct.field"))?;
                Ok(Injection::GdtStruct {
                    channel,
                    structure: structure.to_string(),
                    field: field.to_string(),
                    value: value.to_string(),
                })
            }
            ColumnRole::Sim => {
                let (label, unit) = split_unit(key);
                let value = self
                    .aliases
                    .get(&value.to_lowercase())
                    .cloned()
                    .unwrap_or_else(|| value.to_string());
                Ok(Injection::Sim { label, unit, value })
            }
            ColumnRole::Action | ColumnRole::Expected => Err(ScenarioError::UnknownCommand {
                role: role.name(),
                text: value.to_string(),
            }),
        }
    }
}

fn gdt_injection(channel: usize, key: &str, value: &str) -> Result<Injection, ScenarioError> {
    if key.eq_ignore_ascii_case("visor") && value.eq_ignore_ascii_case("true") {
        return Ok(Injection::Visor { channel });
    }
    let lower = key.to_lowercase();
    let flag = |what: &str, words: &str| {
        parse_validity(value).map_err(|_| {
            ParameterError::new(
                key,
                format!("\"{}\" cannot be used for {} injection! value has to be {}.", value, what, words),
            )
        })
    };
    let (item, write) = if lower.contains(".validity") {
        (base_item(key), GdtWrite::Validity(flag("validity", "Valid or Invalid")?))
    } else if lower.contains(".override") {
        (base_item(key), GdtWrite::Override(flag("override", "True or False")?))
    } else {
        (key, GdtWrite::Value(value.to_string()))
    };
    Ok(Injection::Gdt {
        channel,
        item: item.to_string(),
        write,
    })
}

/// `item.validity` -> `item`
fn base_item(key: &str) -> &str {
    key.split('.').next().unwrap_or(key)
}

pub fn parse_action(text: &str) -> Result<Action, ScenarioError> {
    let upper = text.trim().to_uppercase();
    let seconds = |usage: &str| {
        call_args(text)
            .and_then(|a| a.trim().parse::<f64>().ok())
            .ok_or_else(|| ScenarioError::malformed(text, usage))
    };

    if upper.starts_with("SLEEP") || upper.starts_with("DELAY") {
        Ok(Action::Delay(seconds("Wrong usage of delay, try delay(seconds)")?))
    } else if upper.starts_with("MSG") {
        Ok(Action::Message(call_args(text).unwrap_or_default().to_string()))
    } else if upper.starts_with("CALL_TEST") {
        match call_args(text).map(str::trim) {
            Some(name) if !name.is_empty() => Ok(Action::CallTest(name.to_string())),
            _ => Err(ScenarioError::malformed(text, "Wrong usage of call_test, try call_test(name)")),
        }
    } else if upper.starts_with("SCREENSHOT") {
        Ok(Action::Screenshot)
    } else if upper.starts_with("BVIDEO") || upper.starts_with("VIDEO") {
        Ok(Action::Video {
            seconds: seconds("Wrong usage of video, try video(seconds)")?,
            background: upper.starts_with("BVIDEO"),
        })
    } else if upper.starts_with("GDT_DISCONNECT") {
        Ok(Action::GdtDisconnect)
    } else {
        Err(ScenarioError::UnknownCommand {
            role: "ACTION",
            text: text.to_string(),
        })
    }
}

pub fn parse_expected(text: &str) -> Result<Vec<Expectation>, ScenarioError> {
    if text.contains([' ', '\n', '\t']) {
        return Err(ScenarioError::malformed(
            text,
            "Expected commands shall not have whitespaces, new lines or tabulations",
        ));
    }
    split_expressions(text).into_iter().map(parse_expression).collect()
}

fn parse_expression(text: &str) -> Result<Expectation, ScenarioError> {
    let upper = text.to_uppercase();
    let name = upper.split('(').next().unwrap_or_default();

    if normalize_cell(text).eq_ignore_ascii_case(NOT_APPLICABLE) {
        return Ok(Expectation::NotApplicable);
    }
    let args = call_args(text).ok_or_else(|| ScenarioError::malformed(text, "Missing (arguments)"))?;

    match name {
        "FRAMECOMPARE" | "!FRAMECOMPARE" => parse_frame_compare(text, args, name.starts_with('!')),
        "VIDEOPROCESS" => parse_video_process(text, args),
        "SIM" => {
            let checks = args
                .split(':')
                .map(|pair| {
                    let (label, expected) = pair
                        .split_once('=')
                        .ok_or_else(|| ScenarioError::malformed(text, "Wrong usage of SIM read, try SIM(Label=value:Label2=value)"))?;
                    let (label, unit) = split_unit(label);
                    Ok(SimCheck {
                        label,
                        unit,
                        expected: expected.to_string(),
                    })
                })
                .collect::<Result<Vec<_>, ScenarioError>>()?;
            Ok(Expectation::Sim(checks))
        }
        "GDT" | "GDT_PSP2" => Ok(Expectation::Gdt {
            channel: usize::from(name == "GDT_PSP2"),
            checks: relational_checks(args)?,
        }),
        "GDT_STRUCT" | "GDT_STRUCT_PSP2" => {
            let (structure, rest) = args
                .split_once(':')
                .ok_or_else(|| ScenarioError::malformed(text, "Wrong usage of GDT struct read, try GDT_STRUCT(struct:item=value)"))?;
            Ok(Expectation::GdtStruct {
                channel: usize::from(name == "GDT_STRUCT_PSP2"),
                structure: structure.to_string(),
                checks: relational_checks(rest)?,
            })
        }
        "GDT_BITVIEW" => Ok(Expectation::GdtBitview(relational_checks(args)?)),
        _ => Err(ScenarioError::UnknownCommand {
            role: "EXPECTED",
            text: text.to_string(),
        }),
    }
}

/// `item<op>value` list separated by `;` (or `:`)
fn relational_checks(text: &str) -> Result<Vec<RelationalCheck>, ScenarioError> {
    let checks = text
        .split([';', ':'])
        .filter(|s| !s.is_empty())
        .map(RelationalCheck::parse)
        .collect::<Result<Vec<_>, _>>()?;
    if checks.is_empty() {
        return Err(ScenarioError::malformed(text, "No data item to verify"));
    }
    Ok(checks)
}

fn parse_frame_compare(text: &str, args: &str, absence: bool) -> Result<Expectation, ScenarioError> {
    let data: Vec<&str> = args.split(':').collect();
    let method = data.get(1).map(|m| m.to_uppercase()).unwrap_or_default();
    let usage = match method.as_str() {
        "SUB_IMAGE" => "Invalid Format! FrameCompare(source_file:element_type:search_box:grab_box:tolerance)",
        "PATTERN" => "Invalid Format! FrameCompare(source_file:element_type:search_box:tolerance)",
        _ => "Invalid Format! FrameCompare(source_file:element_type:position:tolerance)",
    };
    let method = match (method.as_str(), data.as_slice()) {
        ("PATTERN", [_, _, search, tolerance]) => FrameMethod::Pattern {
            search: parse_box(search)?,
            tolerance: parse_tolerance(tolerance, text)?,
        },
        ("SUB_IMAGE", [_, _, search, grab, tolerance]) => FrameMethod::SubImage {
            search: parse_box(search)?,
            grab: parse_box(grab)?,
            tolerance: parse_tolerance(tolerance, text)?,
        },
        ("PATTERN_RDP", [_, _, position, tolerance]) => FrameMethod::PatternRdp {
            offset: AngularOffset::parse(position)?,
            tolerance: parse_tolerance(tolerance, text)?,
        },
        ("PATTERN" | "SUB_IMAGE" | "PATTERN_RDP", _) | ("", _) => {
            return Err(ScenarioError::malformed(text, usage));
        }
        (other, _) => {
            return Err(ScenarioError::malformed(text, format!("Invalid command: {}", other)));
        }
    };
    Ok(Expectation::FrameCompare {
        absence,
        golden: data[0].to_string(),
        method,
    })
}

fn parse_video_process(text: &str, args: &str) -> Result<Expectation, ScenarioError> {
    let usage = "Wrong usage of videoprocess(flashing:count:steady_img:flashing_img:search_box:tolerance)";
    let data: Vec<&str> = args.split(':').collect();
    match data.as_slice() {
        [kind, count, steady, flashing, search, tolerance] if kind.eq_ignore_ascii_case("flashing") => {
            Ok(Expectation::Flashing {
                expected: count
                    .trim()
                    .parse()
                    .map_err(|_| ScenarioError::malformed(text, usage))?,
                steady: steady.to_string(),
                flashing: flashing.to_string(),
                search: parse_box(search)?,
                tolerance: parse_tolerance(tolerance, text)?,
            })
        }
        [kind, ..] if !kind.eq_ignore_ascii_case("flashing") => Err(ScenarioError::UnknownCommand {
            role: "EXPECTED",
            text: text.to_string(),
        }),
        _ => Err(ScenarioError::malformed(text, usage)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{Horizontal, Vertical};
    use crate::scenario::compare::Relation;

    fn parser() -> CommandParser {
        CommandParser::new([("gear_down".to_string(), "1".to_string())])
    }

    #[test]
    fn test_column_roles() {
        assert_eq!(ColumnRole::parse("gdt"), Some(ColumnRole::Gdt(0)));
        assert_eq!(ColumnRole::parse("GDT_PSP2"), Some(ColumnRole::Gdt(1)));
        assert_eq!(ColumnRole::parse("GDT_STRUCT_PSP2"), Some(ColumnRole::GdtStruct(1)));
        assert_eq!(ColumnRole::parse("Expected"), Some(ColumnRole::Expected));
        assert_eq!(ColumnRole::parse("Comment"), None);
        assert_eq!(ColumnRole::Gdt(1).connects(), Some(1));
        assert_eq!(ColumnRole::Sim.connects(), None);
    }

    #[test]
    fn test_gdt_injections() {
        let p = parser();
        assert_eq!(
            p.parse_cell(ColumnRole::Gdt(0), "alt", "150").unwrap(),
            Command::Inject(Injection::Gdt {
                channel: 0,
                item: "alt".into(),
                write: GdtWrite::Value("150".into()),
            })
        );
        assert_eq!(
            p.parse_cell(ColumnRole::Gdt(1), "gear.Validity", "Invalid").unwrap(),
            Command::Inject(Injection::Gdt {
                channel: 1,
                item: "gear".into(),
                write: GdtWrite::Validity(false),
            })
        );
        assert_eq!(
            p.parse_cell(ColumnRole::Gdt(0), "gear.override", "false").unwrap(),
            Command::Inject(Injection::Gdt {
                channel: 0,
                item: "gear".into(),
                write: GdtWrite::Override(false),
            })
        );
        assert_eq!(
            p.parse_cell(ColumnRole::Gdt(0), "VISOR", "True").unwrap(),
            Command::Inject(Injection::Visor { channel: 0 })
        );
        assert!(matches!(
            p.parse_cell(ColumnRole::Gdt(0), "gear.validity", "sometimes"),
            Err(ScenarioError::Parameter(_))
        ));
    }

    #[test]
    fn test_sim_injection_uses_aliases_and_units() {
        let p = parser();
        assert_eq!(
            p.parse_cell(ColumnRole::Sim, "Gear[pos]", "GEAR_DOWN").unwrap(),
            Command::Inject(Injection::Sim {
                label: "Gear".into(),
                unit: "[pos]".into(),
                value: "1".into(),
            })
        );
        let Command::Inject(Injection::Sim { unit, value, .. }) =
            p.parse_cell(ColumnRole::Sim, "Airspeed", "noise_sine(1,2,3)").unwrap()
        else {
            panic!("expected SIM injection");
        };
        assert_eq!(unit, "N/A");
        assert_eq!(value, "noise_sine(1,2,3)");
    }

    #[test]
    fn test_bundle_injection() {
        let p = parser();
        let command = p.parse_cell(ColumnRole::Sim, "INJECT", "Airspeed[kts]=250:Flaps=2").unwrap();
        let Command::InjectBundle(items) = command else {
            panic!("expected bundle");
        };
        assert_eq!(items.len(), 2);
        assert!(matches!(&items[1], Injection::Sim { label, value, .. } if label == "Flaps" && value == "2"));

        assert!(matches!(
            p.parse_cell(ColumnRole::Gdt(0), "INJECT_ITEMS", "alt=1:bad"),
            Err(ScenarioError::Malformed { .. })
        ));
        assert!(matches!(
            p.parse_cell(ColumnRole::GdtStruct(0), "INJECT", "HUD.mode=1:HUD.brightness=5").unwrap(),
            Command::InjectBundle(items) if items.len() == 2
        ));
    }

    #[test]
    fn test_struct_injection_needs_field() {
        let p = parser();
        assert!(matches!(
            p.parse_cell(ColumnRole::GdtStruct(0), "HUD", "1"),
            Err(ScenarioError::Malformed { .. })
        ));
    }

    #[test]
    fn test_actions() {
        assert_eq!(parse_action("delay(1.5)").unwrap(), Action::Delay(1.5));
        assert_eq!(parse_action("SLEEP(2)").unwrap(), Action::Delay(2.0));
        assert_eq!(parse_action("MSG(Check the lamp)").unwrap(), Action::Message("Check the lamp".into()));
        assert_eq!(parse_action("call_test(HUD_002)").unwrap(), Action::CallTest("HUD_002".into()));
        assert_eq!(parse_action("Screenshot").unwrap(), Action::Screenshot);
        assert_eq!(
            parse_action("BVIDEO(3)").unwrap(),
            Action::Video {
                seconds: 3.0,
                background: true
            }
        );
        assert_eq!(
            parse_action("video(5)").unwrap(),
            Action::Video {
                seconds: 5.0,
                background: false
            }
        );
        assert_eq!(parse_action("GDT_DISCONNECT").unwrap(), Action::GdtDisconnect);
        assert!(matches!(parse_action("delay(x)"), Err(ScenarioError::Malformed { .. })));
        assert!(matches!(parse_action("JUMP(3)"), Err(ScenarioError::UnknownCommand { .. })));
    }

    #[test]
    fn test_frame_compare_forms() {
        let parsed = parse_expected("!FRAMECOMPARE(cross.pattern:PATTERN:10,20,110,220:5)").unwrap();
        assert_eq!(
            parsed,
            vec![Expectation::FrameCompare {
                absence: true,
                golden: "cross.pattern".into(),
                method: FrameMethod::Pattern {
                    search: SearchBox::new(10, 20, 110, 220),
                    tolerance: 5
                },
            }]
        );

        let parsed = parse_expected("FrameCompare(fpm.pattern:pattern_rdp:left,2.5,above,1:3)").unwrap();
        let Expectation::FrameCompare {
            absence: false,
            method: FrameMethod::PatternRdp { offset, tolerance: 3 },
            ..
        } = &parsed[0]
        else {
            panic!("expected PATTERN_RDP");
        };
        assert_eq!(offset.horizontal, Horizontal::Left);
        assert_eq!(offset.vertical, Vertical::Above);

        assert!(matches!(
            parse_expected("FRAMECOMPARE(g.png:SUB_IMAGE:0,0,10,10:5)"),
            Err(ScenarioError::Malformed { .. })
        ));
        assert!(matches!(
            parse_expected("FRAMECOMPARE(g.png:CIRCLE:0,0,10,10:5)"),
            Err(ScenarioError::Malformed { .. })
        ));
        assert!(matches!(
            parse_expected("FRAMECOMPARE(g.png:PATTERN_RDP:up,1,above,1:5)"),
            Err(ScenarioError::Parameter(_))
        ));
    }

    #[test]
    fn test_multiple_expressions() {
        let parsed = parse_expected("GDT(alt>100;speed<=250),SIM(Gear[pos]=1),N/A").unwrap();
        assert_eq!(parsed.len(), 3);
        let Expectation::Gdt { channel: 0, checks } = &parsed[0] else {
            panic!("expected GDT");
        };
        assert_eq!(checks.len(), 2);
        assert_eq!(checks[1].relation, Relation::Le);
        assert_eq!(
            parsed[1],
            Expectation::Sim(vec![SimCheck {
                label: "Gear".into(),
                unit: "[pos]".into(),
                expected: "1".into()
            }])
        );
        assert_eq!(parsed[2], Expectation::NotApplicable);
    }

    #[test]
    fn test_gdt_family() {
        let parsed = parse_expected("GDT_STRUCT_PSP2(HUD_MODE:u8Mode=3;u8Page!=0)").unwrap();
        assert!(matches!(
            &parsed[0],
            Expectation::GdtStruct { channel: 1, structure, checks } if structure == "HUD_MODE" && checks.len() == 2
        ));
        let parsed = parse_expected("GDT_BITVIEW(u32Resets=0)").unwrap();
        assert!(matches!(&parsed[0], Expectation::GdtBitview(checks) if checks[0].item == "u32Resets"));
        assert!(matches!(parse_expected("GDT()"), Err(ScenarioError::Malformed { .. })));
        assert!(matches!(parse_expected("LAMP(on)"), Err(ScenarioError::UnknownCommand { .. })));
    }

    #[test]
    fn test_video_process() {
        let parsed = parse_expected("VIDEOPROCESS(flashing:3:steady.png:flash.png:5,5,50,50:5)").unwrap();
        assert_eq!(
            parsed[0],
            Expectation::Flashing {
                expected: 3,
                steady: "steady.png".into(),
                flashing: "flash.png".into(),
                search: SearchBox::new(5, 5, 50, 50),
                tolerance: 5,
            }
        );
        assert!(matches!(
            parse_expected("VIDEOPROCESS(flashing:3:steady.png)"),
            Err(ScenarioError::Malformed { .. })
        ));
    }

    #[test]
    fn test_whitespace_is_rejected() {
        assert!(matches!(
            parse_expected("GDT(alt> 100)"),
            Err(ScenarioError::Malformed { .. })
        ));
    }

    #[test]
    fn test_legacy_not_applicable() {
        assert_eq!(normalize_cell("N\\A"), "N/A");
        assert_eq!(parse_expected("N\\A").unwrap(), vec![Expectation::NotApplicable]);
    }
}

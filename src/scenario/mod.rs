//! Scenario workbooks and their interpreter
//!
//! - `sheet` - workbook model and anchor lookup
//! - `command` - cell text to typed commands
//! - `compare` - relational checks on read-back values
//! - `injection` - ledger of injections released at teardown
//! - `interpreter` - runs a test against the rig
//! - `journal` - Log.txt / Error.txt / VideoCompression.txt
//! - `layout` - a test's files and folders
//! - `progress` - operator-facing progress and cancellation
//! - `report` - result report written next to the workbook

pub mod command;
pub mod compare;
pub mod injection;
pub mod interpreter;
pub mod journal;
pub mod layout;
pub mod progress;
pub mod report;
pub mod sheet;

pub use command::{Command, CommandParser, Expectation, Injection};
pub use interpreter::{RunOutcome, RunSummary, ScenarioInterpreter, ScenarioResult, run_test};
pub use layout::TestLayout;
pub use progress::{ConsoleProgress, ProgressSink, RunPhase};
pub use report::{Report, ReportCell, ReportSheet};
pub use sheet::{ScenarioSheet, Workbook};

//! Scenario interpreter
//!
//! One test runs `SETUP -> PRECONDITION -> SCENARIOS -> TEARDOWN`:
//!
//! - SETUP resets the Output/Results folders, opens the journals and copies
//!   the workbook sheets into the report.
//! - PRECONDITION runs the `Preconditions` sheet, if any, without result
//!   columns.
//! - SCENARIOS runs every scenario sheet row by row. Each cell is parsed into
//!   a command by its column role and executed against the rig.
//! - TEARDOWN always runs, whatever stopped the run: it waits for any
//!   background recording, releases every recorded injection once, turns the
//!   SIM noise off and writes the report.
//!
//! `CALL_TEST(name)` runs another test as a nested interpreter sharing the
//! same rig, progress sink and report.

mod verify;


use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use super::command::{Action, ColumnRole, Command, CommandParser, GdtWrite, Injection, NOT_APPLICABLE, normalize_cell};
use super::injection::{InjectionLedger, InjectionTarget};
use super::journal::RunJournal;
use super::layout::TestLayout;
use super::progress::{ProgressSink, RunPhase};
use super::report::{Actual, Report, ReportCell, ResultColumns};
use super::sheet::{Anchor, PRECONDITIONS_SHEET, ScenarioSheet, Workbook};
use crate::config::RunnerConfig;
use crate::error::{ComparisonError, ConnectionError, NoiseError, ParameterError, RigError, ScenarioError};
use crate::noise::{NoiseSpec, is_noise_literal};
use crate::pattern::PatternMatcher;
use crate::rig::{ItemType, Rig, VideoProcess};
use crate::verdict::VerdictStatus;

/// Struct written by the `visor=true` shortcut
const VISOR_STRUCT: &str = "VISOR_COEFFICIENTS";

// ============================================================================
// Results
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Passed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioResult {
    pub sheet: String,
    pub scenario: u32,
    pub status: VerdictStatus,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub test: String,
    pub outcome: RunOutcome,
    pub scenarios: Vec<ScenarioResult>,
    /// Error that stopped the run early
    pub error: Option<String>,
}

impl RunSummary {
    /// Status a caller records for this test: a run that stopped early is
    /// FAILED, otherwise the combined scenario status.
    pub fn status(&self) -> VerdictStatus {
        match self.outcome {
            RunOutcome::Passed => VerdictStatus::combine(self.scenarios.iter().map(|s| s.status)),
            RunOutcome::Failed | RunOutcome::Cancelled => VerdictStatus::Failed,
        }
    }

    pub fn count(&self, status: VerdictStatus) -> usize {
        self.scenarios.iter().filter(|s| s.status == status).count()
    }
}

/// Why a run stopped before its last row
enum Halt {
    Cancelled,
    Error(ScenarioError),
}

impl From<ScenarioError> for Halt {
    fn from(e: ScenarioError) -> Self {
        Halt::Error(e)
    }
}

impl From<RigError> for Halt {
    fn from(e: RigError) -> Self {
        Halt::Error(e.into())
    }
}

impl From<ComparisonError> for Halt {
    fn from(e: ComparisonError) -> Self {
        Halt::Error(e.into())
    }
}

impl From<ParameterError> for Halt {
    fn from(e: ParameterError) -> Self {
        Halt::Error(e.into())
    }
}

impl From<ConnectionError> for Halt {
    fn from(e: ConnectionError) -> Self {
        Halt::Error(e.into())
    }
}

impl From<NoiseError> for Halt {
    fn from(e: NoiseError) -> Self {
        Halt::Error(e.into())
    }
}

/// Line written to `Error.txt` for the error that stopped the run
fn error_line(e: &ScenarioError) -> String {
    match e {
        ScenarioError::Parameter(p) => format!("\nPARAMETER ERROR: {}: {}", p.parameter, p.message),
        ScenarioError::Connection(c) | ScenarioError::Rig(RigError::Connection(c)) => {
            format!("\nGDT ERROR: {}", c)
        }
        other => format!("\nERROR WHILE RUNNING: {}", other),
    }
}

/// `BVIDEO` recording still running in the background
struct DeferredVideoJob {
    end: Instant,
    uncompressed: PathBuf,
    compressed: PathBuf,
    process: Box<dyn VideoProcess>,
}

/// Statuses and actuals gathered from one row's cells
#[derive(Default)]
struct RowOutcome {
    statuses: Vec<VerdictStatus>,
    actuals: Vec<Actual>,
}

/// Per-sheet state shared by its rows
struct SheetContext<'s> {
    sheet: &'s ScenarioSheet,
    anchor: Anchor,
    roles: Vec<Option<ColumnRole>>,
    headings: Vec<String>,
    /// `None` on the preconditions sheet
    columns: Option<ResultColumns>,
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Coefficients of a straight visor: identity terms at `[0,4]` and `[1,1]`
fn visor_coefficients() -> impl Iterator<Item = (usize, usize, f64)> {
    (0..2).flat_map(|row| {
        (0..10).map(move |column| {
            let value = if (row, column) == (0, 4) || (row, column) == (1, 1) { 1.0 } else { 0.0 };
            (row, column, value)
        })
    })
}

fn reset_dir(path: &Path) -> Result<(), ScenarioError> {
    if path.exists() {
        fs::remove_dir_all(path).map_err(|e| ScenarioError::io(path, e))?;
    }
    fs::create_dir_all(path).map_err(|e| ScenarioError::io(path, e))
}

// ============================================================================
// Interpreter
// ============================================================================

pub struct ScenarioInterpreter<'a> {
    layout: TestLayout,
    config: &'a RunnerConfig,
    rig: &'a mut Rig,
    progress: &'a mut dyn ProgressSink,
    report: &'a mut Report,
    /// Run by `CALL_TEST`; leaves channels connected and the report unsaved
    nested: bool,
    start_from: Option<u32>,
    matcher: PatternMatcher,
    video_matcher: PatternMatcher,
    parser: CommandParser,
    journal: RunJournal,
    ledger: InjectionLedger,
    deferred_video: Option<DeferredVideoJob>,
    /// Sheet being run; names its Output/Results sub-folders
    sheet: String,
    /// Report sheet receiving this sheet's results
    report_sheet: String,
    /// Report sheets that get a footer at teardown
    written_sheets: Vec<String>,
    scenario_id: u32,
    results: Vec<ScenarioResult>,
}

impl<'a> ScenarioInterpreter<'a> {
    pub fn new(
        layout: TestLayout,
        config: &'a RunnerConfig,
        rig: &'a mut Rig,
        progress: &'a mut dyn ProgressSink,
        report: &'a mut Report,
    ) -> Self {
        Self {
            layout,
            config,
            rig,
            progress,
            report,
            nested: false,
            start_from: None,
            matcher: PatternMatcher::new(config.match_threshold, config.pixels_per_degree),
            video_matcher: PatternMatcher::new(config.video_threshold, config.pixels_per_degree),
            parser: CommandParser::default(),
            journal: RunJournal::closed(),
            ledger: InjectionLedger::default(),
            deferred_video: None,
            sheet: String::new(),
            report_sheet: String::new(),
            written_sheets: Vec::new(),
            scenario_id: 0,
            results: Vec::new(),
        }
    }

    /// Skip the rows before scenario `scenario` on every scenario sheet
    pub fn start_from(mut self, scenario: Option<u32>) -> Self {
        self.start_from = scenario;
        self
    }

    fn nested(mut self) -> Self {
        self.nested = true;
        self
    }

    /// Run the test to completion; teardown runs whatever happens
    pub fn run(mut self) -> RunSummary {
        let halted = self.execute().err();
        let (outcome, error) = match halted {
            None if self.results.iter().any(|r| r.status == VerdictStatus::Failed) => (RunOutcome::Failed, None),
            None => (RunOutcome::Passed, None),
            Some(Halt::Cancelled) => {
                self.journal.error("Test run cancelled by user.");
                (RunOutcome::Cancelled, None)
            }
            Some(Halt::Error(e)) => {
                self.journal.error(&error_line(&e));
                (RunOutcome::Failed, Some(e.to_string()))
            }
        };

        self.teardown();

        RunSummary {
            test: self.layout.name.clone(),
            outcome,
            scenarios: std::mem::take(&mut self.results),
            error,
        }
    }

    fn execute(&mut self) -> Result<(), Halt> {
        self.progress.phase(&self.layout.name, RunPhase::Setup);
        if !self.layout.root.is_dir() {
            return Err(ScenarioError::MissingTest(self.layout.name.clone()).into());
        }

        reset_dir(&self.layout.output)?;
        if self.config.reuse_results {
            fs::create_dir_all(&self.layout.results).map_err(|e| ScenarioError::io(&self.layout.results, e))?;
        } else {
            reset_dir(&self.layout.results)?;
        }
        self.journal = RunJournal::open(&self.layout)?;
        self.journal.header(&self.layout.name, &self.config.version);

        let workbook = Workbook::load(&self.layout.workbook)?;
        let main_sheet = workbook.main_sheet()?.name.clone();
        if self.nested {
            self.report.add_sheet(&self.layout.name, workbook.main_sheet()?);
        } else {
            for sheet in &workbook.sheets {
                self.report.add_sheet(&sheet.name, sheet);
            }
        }

        let aliases = workbook.aliases();
        for (shortcut, real) in &aliases {
            self.journal.info(&format!("Action {} = {}", shortcut, real));
        }
        self.parser = CommandParser::new(aliases);

        if let Some(sheet) = workbook.sheet(PRECONDITIONS_SHEET) {
            self.progress.phase(&self.layout.name, RunPhase::Preconditions);
            self.sheet = sheet.name.clone();
            self.run_sheet(sheet, false)?;
        }

        self.progress.phase(&self.layout.name, RunPhase::Scenarios);
        let banners = workbook.sheets.len() > 1;
        for sheet in workbook.scenario_sheets() {
            if banners {
                self.journal.sheet_banner(&sheet.name);
            }
            for dir in [self.layout.output_dir(&sheet.name), self.layout.results_dir(&sheet.name)] {
                fs::create_dir_all(&dir).map_err(|e| ScenarioError::io(&dir, e))?;
            }
            self.sheet = sheet.name.clone();
            self.report_sheet = self.report_sheet_for(&main_sheet, sheet);
            if !self.written_sheets.contains(&self.report_sheet) {
                self.written_sheets.push(self.report_sheet.clone());
            }
            self.run_sheet(sheet, true)?;
        }
        Ok(())
    }

    /// A called test writes its main sheet under the test's name and its
    /// other sheets as `<test> <sheet>`
    fn report_sheet_for(&mut self, main_sheet: &str, sheet: &ScenarioSheet) -> String {
        if !self.nested {
            return sheet.name.clone();
        }
        if sheet.name == main_sheet {
            return self.layout.name.clone();
        }
        let name = format!("{} {}", self.layout.name, sheet.name);
        self.report.add_sheet(&name, sheet);
        name
    }

    fn run_sheet(&mut self, sheet: &ScenarioSheet, scored: bool) -> Result<(), Halt> {
        let anchor = sheet.find_anchor().ok_or_else(|| ScenarioError::MissingAnchor {
            sheet: sheet.name.clone(),
        })?;
        let width = sheet.column_count();
        let roles: Vec<Option<ColumnRole>> = (0..width)
            .map(|column| {
                anchor
                    .row
                    .checked_sub(1)
                    .and_then(|row| sheet.cell(row, column))
                    .and_then(ColumnRole::parse)
            })
            .collect();
        let headings: Vec<String> = (0..width)
            .map(|column| sheet.cell(anchor.row, column).unwrap_or_default().to_string())
            .collect();

        self.scenario_id = 0;
        let mut first_row = anchor.row + 2;
        if scored && let Some(wanted) = self.start_from {
            match sheet.find_scenario(wanted, anchor.column) {
                Some(row) if row >= first_row => {
                    first_row = row;
                    self.scenario_id = wanted.saturating_sub(1);
                }
                _ => self.warn(&format!(
                    "Could not find scenario {} in {}, running from start.",
                    wanted, sheet.name
                )),
            }
        }

        let columns = if scored {
            Some(self.report.sheet_mut(&self.report_sheet).append_result_columns(anchor.row))
        } else {
            None
        };

        self.rig.sim.set_noise_enabled(true)?;
        self.step("SIM: Noise has been enabled.");
        let mut channels: Vec<usize> = roles.iter().flatten().filter_map(|r| r.connects()).collect();
        channels.sort_unstable();
        channels.dedup();
        for channel in channels {
            self.rig.ensure_connected(channel)?;
        }

        let context = SheetContext {
            sheet,
            anchor,
            roles,
            headings,
            columns,
        };
        for row in first_row..sheet.row_count() {
            self.run_row(&context, row)?;
        }
        Ok(())
    }

    fn run_row(&mut self, context: &SheetContext<'_>, row: usize) -> Result<(), Halt> {
        if let Some(columns) = context.columns {
            self.report.sheet_mut(&self.report_sheet).reset_row(row, columns);
        }
        // Rows without a scenario number are free text
        if context.sheet.cell(row, context.anchor.column).is_none() {
            return Ok(());
        }

        let mut started = false;
        let mut outcome = RowOutcome::default();
        for (column, role) in context.roles.iter().enumerate() {
            self.checkpoint()?;
            let (Some(role), Some(raw)) = (role, context.sheet.cell(row, column)) else {
                continue;
            };
            let value = normalize_cell(raw);
            if value == NOT_APPLICABLE && *role != ColumnRole::Expected {
                continue;
            }
            if context.columns.is_some() && !started {
                started = true;
                self.scenario_id += 1;
                self.journal.scenario_banner(self.scenario_id);
                self.progress.scenario_started(self.scenario_id, self.nested);
            }

            let command = self.parser.parse_cell(*role, &context.headings[column], value)?;
            self.execute_command(command, &mut outcome)?;
        }
        self.join_deferred_video()?;

        if !outcome.statuses.is_empty() {
            let status = VerdictStatus::combine(outcome.statuses.iter().copied());
            self.journal.info("");
            self.journal.info(&format!("\tScenario result: {}.", status));
            if context.columns.is_some() {
                self.progress.scenario_result(self.scenario_id, status, self.nested);
                self.results.push(ScenarioResult {
                    sheet: self.sheet.clone(),
                    scenario: self.scenario_id,
                    status,
                });
            } else {
                self.step(&format!("PRECONDITION result: {}", status));
            }
            if let Some(columns) = context.columns {
                self.report
                    .sheet_mut(&self.report_sheet)
                    .set(row, columns.pass_fail, ReportCell::status(status));
            }
        }
        if let Some(columns) = context.columns
            && !outcome.actuals.is_empty()
        {
            self.report
                .sheet_mut(&self.report_sheet)
                .set(row, columns.actual, Actual::combine(&outcome.actuals));
        }
        Ok(())
    }

    fn execute_command(&mut self, command: Command, outcome: &mut RowOutcome) -> Result<(), Halt> {
        match command {
            Command::Inject(injection) => self.inject(&injection),
            Command::InjectBundle(items) => {
                for injection in &items {
                    match self.inject(injection) {
                        Err(Halt::Error(e)) => self.journal.error(&format!("Injection skipped: {}", e)),
                        other => other?,
                    }
                }
                Ok(())
            }
            Command::Act(action) => self.act(action, outcome),
            Command::Verify(expectations) => {
                self.join_deferred_video()?;
                self.verify_cell(&expectations, outcome)
            }
        }
    }

    // ========================================================================
    // Injections
    // ========================================================================

    fn inject(&mut self, injection: &Injection) -> Result<(), Halt> {
        match injection {
            Injection::Gdt { channel, item, write } => self.inject_gdt(*channel, item, write)?,
            Injection::Visor { channel } => self.inject_visor(*channel)?,
            Injection::GdtStruct {
                channel,
                structure,
                field,
                value,
            } => self.inject_struct(*channel, structure, field, value)?,
            Injection::Sim { label, unit, value } => self.inject_sim(label, unit, value)?,
        }
        self.pause_for(self.config.settle());
        Ok(())
    }

    /// Try each item type until the channel accepts the write
    fn inject_gdt(&mut self, channel: usize, item: &str, write: &GdtWrite) -> Result<(), ScenarioError> {
        self.rig.ensure_connected(channel)?;
        let gdt = self.rig.channel(channel)?;
        let accepted = ItemType::ALL.into_iter().find(|&item_type| {
            let written = match write {
                GdtWrite::Value(value) => gdt.write_value(item_type, item, value),
                GdtWrite::Validity(valid) => gdt.write_validity(item_type, item, *valid),
                GdtWrite::Override(enabled) => gdt.set_override(item_type, item, *enabled),
            };
            match written {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::debug!("GDT {} as {}: {}", item, item_type, e);
                    false
                }
            }
        });

        let shown = match write {
            GdtWrite::Value(value) => value.clone(),
            GdtWrite::Validity(true) => "Valid".to_string(),
            GdtWrite::Validity(false) => "Invalid".to_string(),
            GdtWrite::Override(enabled) => enabled.to_string(),
        };
        let Some(item_type) = accepted else {
            return Err(ScenarioError::InjectionFailed {
                item: item.to_string(),
                value: shown,
            });
        };

        self.step(&format!("GDT_PSP{}: {} = {}", channel + 1, item, shown));
        self.ledger
            .record(InjectionTarget::Gdt { channel, item_type }, item, shown);
        Ok(())
    }

    fn inject_visor(&mut self, channel: usize) -> Result<(), ScenarioError> {
        for (row, column, value) in visor_coefficients() {
            let field = format!("af32PilotPoly3[{},{}]", row, column);
            self.inject_struct(channel, VISOR_STRUCT, &field, &format!("{:.1}", value))?;
        }
        self.step(&format!("GDT_PSP{}: {} = STRAIGHT", channel + 1, VISOR_STRUCT));
        Ok(())
    }

    fn inject_struct(&mut self, channel: usize, structure: &str, field: &str, value: &str) -> Result<(), ScenarioError> {
        self.rig.ensure_connected(channel)?;
        if !self.rig.channel(channel)?.write_struct_field(structure, field, value)? {
            return Err(ScenarioError::InjectionFailed {
                item: format!("{}.{}", structure, field),
                value: value.to_string(),
            });
        }
        tracing::debug!("GDT_PSP{}: {}.{} = {}", channel + 1, structure, field, value);
        self.ledger.record(
            InjectionTarget::GdtStruct {
                channel,
                structure: structure.to_string(),
            },
            field,
            value,
        );
        Ok(())
    }

    /// SIM rejections are logged and the run goes on
    fn inject_sim(&mut self, label: &str, unit: &str, value: &str) -> Result<(), ScenarioError> {
        let injected = if is_noise_literal(value) {
            let noise = match NoiseSpec::parse(value) {
                Ok(noise) => noise,
                Err(e) if e.is_injection_error() => {
                    self.journal.error(&e.to_string());
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            };
            self.step(&format!("SIM: {}{} <- {}", label, unit, noise));
            if let Some(hold) = noise.hold_time() {
                tracing::debug!("SIM: {} noise holds {} for {:?}", noise.kind(), label, hold);
            }
            self.rig.sim.inject_noise(label, unit, &noise)
        } else {
            let value = match value.to_lowercase().as_str() {
                "true" => "True",
                "false" => "False",
                _ => value,
            };
            self.step(&format!("SIM: {} = {}", label, value));
            self.rig.sim.set_value(label, unit, value)
        };

        match injected {
            Ok(()) => {
                self.ledger.record(
                    InjectionTarget::Sim {
                        unit: unit.to_string(),
                    },
                    label,
                    value,
                );
                Ok(())
            }
            Err(RigError::Injection(message)) => {
                self.journal.error(&format!("SimEngine injection error: {}", message));
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    // ========================================================================
    // Actions
    // ========================================================================

    fn act(&mut self, action: Action, outcome: &mut RowOutcome) -> Result<(), Halt> {
        match action {
            Action::Delay(seconds) => {
                let duration = Duration::try_from_secs_f64(seconds).map_err(|_| {
                    ScenarioError::malformed(seconds.to_string(), "Wrong usage of delay, try delay(seconds)")
                })?;
                self.step(&format!("delay ({})", seconds));
                self.pause_for(duration);
            }
            Action::Message(text) => {
                self.journal.info(&format!("MSG: {}", text));
                self.progress.prompt(&text);
            }
            Action::CallTest(name) => {
                let status = self.call_test(&name)?;
                outcome.statuses.push(status);
                outcome.actuals.push(Actual::TestCall(name));
            }
            Action::Screenshot => self.screenshot(),
            Action::Video { seconds, background } => {
                let file = self.record_video(seconds, background)?;
                outcome.actuals.push(Actual::Recording {
                    sheet: self.sheet.clone(),
                    file,
                });
            }
            Action::GdtDisconnect => {
                for e in self.rig.disconnect_all() {
                    self.journal.error(&format!("GDT: {}", e));
                }
                self.step("GDT: disconnected.");
            }
        }
        Ok(())
    }

    fn call_test(&mut self, name: &str) -> Result<VerdictStatus, Halt> {
        self.step(&format!("Calling test: {}", name));
        self.journal.info(&"=".repeat(50));
        let layout = TestLayout::new(self.config, name);
        let summary = ScenarioInterpreter::new(
            layout,
            self.config,
            &mut *self.rig,
            &mut *self.progress,
            &mut *self.report,
        )
        .nested()
        .run();
        self.journal.info(&"=".repeat(50));

        if summary.outcome == RunOutcome::Cancelled {
            return Err(Halt::Cancelled);
        }
        if let Some(e) = &summary.error {
            self.journal.error(&format!("Called test {} stopped: {}", name, e));
        }
        let status = summary.status();
        self.step(&format!("Test {} result: {}", name, status));
        Ok(status)
    }

    /// Capture failures are logged; a missing screenshot fails the
    /// comparison that needs it.
    fn screenshot(&mut self) {
        self.pause_for(self.config.screenshot_settle());
        let path = self.layout.screenshot(&self.sheet, self.scenario_id);
        match self.rig.capture.screenshot(&path) {
            Ok(()) => self.step(&format!("Success taking img - {}", path.display())),
            Err(e) => self.journal.error(&format!("Failed saving screenshot {}: {}", path.display(), e)),
        }
        self.pause_for(self.config.screenshot_settle());
    }

    /// Returns the recording's file name
    fn record_video(&mut self, seconds: f64, background: bool) -> Result<String, Halt> {
        let duration = Duration::try_from_secs_f64(seconds).map_err(|_| {
            ScenarioError::malformed(seconds.to_string(), "Wrong usage of video, try video(seconds)")
        })?;
        // One recording at a time
        self.join_deferred_video()?;

        let (uncompressed, compressed) = self.layout.recording(&self.sheet, self.scenario_id);
        self.journal.info("");
        self.journal.info("\tTest Category: Video");
        self.step(&format!("Taking video: {}", compressed.display()));
        let process = self.rig.capture.start_video(&uncompressed, duration)?;
        let file = file_name(&compressed);

        if background {
            self.deferred_video = Some(DeferredVideoJob {
                end: Instant::now() + duration,
                uncompressed,
                compressed,
                process,
            });
        } else {
            process.wait()?;
            self.transcode(&uncompressed, &compressed)?;
            self.journal.info(&format!(
                "\t\tRecorded {} seconds of video to file: {}.",
                seconds,
                compressed.display()
            ));
        }
        Ok(file)
    }

    fn transcode(&mut self, uncompressed: &Path, compressed: &Path) -> Result<(), ScenarioError> {
        self.rig
            .transcoder
            .transcode(uncompressed, compressed, self.journal.video_log())?;
        Ok(())
    }

    /// Wait for the background recording to end, then transcode it
    fn join_deferred_video(&mut self) -> Result<(), Halt> {
        let Some(job) = self.deferred_video.take() else {
            return Ok(());
        };
        self.step("Waiting for video to end...");
        loop {
            let remaining = job.end.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            if self.progress.cancel_requested() {
                self.deferred_video = Some(job);
                return Err(Halt::Cancelled);
            }
            let poll = self.config.video_poll();
            thread::sleep(if poll.is_zero() { remaining } else { remaining.min(poll) });
        }
        self.finish_video(job)?;
        self.step("...Done");
        Ok(())
    }

    fn finish_video(&mut self, job: DeferredVideoJob) -> Result<(), ScenarioError> {
        job.process.wait()?;
        self.transcode(&job.uncompressed, &job.compressed)?;
        self.journal.info(&format!("\t\tRecorded video to file: {}.", job.compressed.display()));
        Ok(())
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    fn teardown(&mut self) {
        self.progress.phase(&self.layout.name, RunPhase::Teardown);

        if let Some(job) = self.deferred_video.take()
            && let Err(e) = self.finish_video(job)
        {
            self.warn(&format!("Background video: {}", e));
        }

        self.step("Clearing SIM Injections");
        for e in self.ledger.release_sim(self.rig) {
            self.warn(&format!("SIM release: {}", e));
        }
        self.pause_for(self.config.clear_settle());
        let sim = &mut self.rig.sim;
        let cleanup = [
            ("unapply on exit", sim.unapply_all_on_exit()),
            ("unapply", sim.unapply_all()),
            ("noise off", sim.set_noise_enabled(false)),
        ];
        for (what, result) in cleanup {
            if let Err(e) = result {
                self.warn(&format!("SIM {}: {}", what, e));
            }
        }
        self.step("SIM: Noise has been disabled.");

        for e in self.ledger.release_gdt(self.rig) {
            self.warn(&format!("GDT release: {}", e));
        }
        if !self.nested {
            for e in self.rig.disconnect_all() {
                self.warn(&format!("GDT: {}", e));
            }
        }

        for name in &self.written_sheets {
            self.report.sheet_mut(name).write_footer(&self.config.version);
        }
        self.journal.close();

        if !self.nested
            && !self.report.sheets.is_empty()
            && let Err(e) = self.report.save(&self.layout.report)
        {
            tracing::warn!("Failed to save report: {}", e);
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Stop on cancel; block while paused
    fn checkpoint(&mut self) -> Result<(), Halt> {
        loop {
            if self.progress.cancel_requested() {
                return Err(Halt::Cancelled);
            }
            if !self.progress.is_paused() {
                return Ok(());
            }
            thread::sleep(self.config.pause_poll().max(Duration::from_millis(1)));
        }
    }

    fn pause_for(&self, duration: Duration) {
        if !duration.is_zero() {
            thread::sleep(duration);
        }
    }

    fn step(&mut self, text: &str) {
        self.journal.info(text);
        self.progress.step(text);
    }

    fn warn(&mut self, text: &str) {
        tracing::warn!("{}", text);
        self.journal.info(text);
    }
}

/// Run test `name` from the configured tests folder
pub fn run_test(
    name: &str,
    config: &RunnerConfig,
    rig: &mut Rig,
    progress: &mut dyn ProgressSink,
    start_from: Option<u32>,
) -> RunSummary {
    let mut report = Report::default();
    ScenarioInterpreter::new(TestLayout::new(config, name), config, rig, progress, &mut report)
        .start_from(start_from)
        .run()
}

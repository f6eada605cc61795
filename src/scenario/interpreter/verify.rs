//! EXPECTED cells: golden-image and video checks, SIM and GDT read-backs

use super::{Halt, RowOutcome, ScenarioInterpreter, file_name};
use crate::error::{ComparisonError, RigError, ScenarioError};
use crate::pattern::matcher::annotate;
use crate::pattern::{GoldenImage, SearchBox, open_raster};
use crate::rig::{BIT_COUNTERS_BUFFER, GdtValue, ItemType};
use crate::scenario::command::{Expectation, FrameMethod, SimCheck};
use crate::scenario::compare::{Relation, RelationalCheck, compare, compare_text};
use crate::scenario::report::Actual;
use crate::verdict::VerdictStatus;
use crate::video::flash_count;

/// Result of one expectation
struct Evaluation {
    status: VerdictStatus,
    actual: Option<Actual>,
}

/// Read-back lines split by outcome
#[derive(Default)]
struct ValueChecks {
    lines: Vec<String>,
    passed: Vec<String>,
    failed: Vec<String>,
}

impl ValueChecks {
    fn push(&mut self, ok: bool, line: String) {
        if ok {
            self.passed.push(line.clone());
        } else {
            self.failed.push(line.clone());
        }
        self.lines.push(line);
    }

    fn status(&self) -> VerdictStatus {
        VerdictStatus::from_bool(self.failed.is_empty())
    }
}

fn shown(value: Option<&GdtValue>) -> String {
    value.map_or_else(|| "None".to_string(), GdtValue::to_string)
}

impl ScenarioInterpreter<'_> {
    /// All expectations of one cell, AND-combined into one status
    pub(super) fn verify_cell(&mut self, expectations: &[Expectation], outcome: &mut RowOutcome) -> Result<(), Halt> {
        let mut statuses = Vec::with_capacity(expectations.len());
        for expectation in expectations {
            self.checkpoint()?;
            let evaluation = self.evaluate(expectation)?;
            statuses.push(evaluation.status);
            outcome.actuals.extend(evaluation.actual);
        }
        outcome.statuses.push(VerdictStatus::combine(statuses));
        Ok(())
    }

    fn evaluate(&mut self, expectation: &Expectation) -> Result<Evaluation, ScenarioError> {
        match expectation {
            Expectation::NotApplicable => {
                self.journal.info("\t\tSTAGE RESULT: N/A");
                Ok(Evaluation {
                    status: VerdictStatus::NoAutoRun,
                    actual: None,
                })
            }
            Expectation::FrameCompare { absence, golden, method } => self.frame_compare(*absence, golden, method),
            Expectation::Flashing {
                expected,
                steady,
                flashing,
                search,
                tolerance,
            } => self.flashing(*expected, steady, flashing, *search, *tolerance),
            Expectation::Sim(checks) => self.sim_values(checks),
            Expectation::Gdt { channel, checks } => {
                self.rig.ensure_connected(*channel)?;
                self.journal.info("\tTest Category: GDTValue");
                let channel = *channel;
                let values = self.check_values(checks, |this, item| this.read_gdt(channel, item))?;
                Ok(self.values_evaluation(values, Vec::new()))
            }
            Expectation::GdtStruct {
                channel,
                structure,
                checks,
            } => {
                self.rig.ensure_connected(*channel)?;
                self.journal.info("\tTest Category: GDTStruct");
                let channel = *channel;
                let values = self.check_values(checks, |this, field| {
                    this.pause_for(this.config.read_settle());
                    let read = this
                        .rig
                        .channel(channel)
                        .and_then(|gdt| gdt.read_struct_field(structure, field));
                    (this.keep_reading(read), None)
                })?;
                Ok(self.values_evaluation(values, vec![structure.clone()]))
            }
            Expectation::GdtBitview(checks) => {
                self.rig.ensure_connected(0)?;
                self.journal.info("\tTest Category: GDTBitview");
                let values = self.check_values(checks, |this, item| {
                    this.pause_for(this.config.read_settle());
                    let read = this
                        .rig
                        .channel(0)
                        .and_then(|gdt| gdt.read_buffer_element(BIT_COUNTERS_BUFFER, item, "Value"));
                    (this.keep_reading(read), None)
                })?;
                Ok(self.values_evaluation(values, vec![BIT_COUNTERS_BUFFER.to_string()]))
            }
        }
    }

    // ========================================================================
    // Golden images
    // ========================================================================

    fn frame_compare(&mut self, absence: bool, golden: &str, method: &FrameMethod) -> Result<Evaluation, ScenarioError> {
        let mode = if absence { "absence" } else { "presence" };
        self.journal.info("");
        self.journal
            .info(&format!("\tTest Category: Golden Image Verification (checking for {}).", mode));

        let reference_path = self.layout.screenshot(&self.sheet, self.scenario_id);
        if !reference_path.exists() {
            return Err(ComparisonError::MissingFile {
                kind: "Reference image",
                path: reference_path.display().to_string(),
            }
            .into());
        }
        let reference = open_raster(&reference_path)?;
        let golden_image = GoldenImage::open(&self.layout.golden.join(golden))?;
        let shown_path = reference_path.display().to_string();

        let outcome = match method {
            FrameMethod::Pattern { search, tolerance } => self.matcher.compare_pattern(
                &reference,
                &shown_path,
                &golden_image,
                *search,
                *tolerance,
                absence,
            )?,
            FrameMethod::SubImage {
                search,
                grab,
                tolerance,
            } => self.matcher.compare_sub_image(
                &reference,
                &shown_path,
                &golden_image,
                *search,
                *grab,
                *tolerance,
                absence,
            )?,
            FrameMethod::PatternRdp { offset, tolerance } => self.matcher.compare_pattern_rdp(
                &reference,
                &shown_path,
                &golden_image,
                offset,
                *tolerance,
                absence,
            )?,
        };
        self.journal.info(&format!("\t\tVerification method: {}.", method.name()));
        self.journal.info(&format!(
            "\t\tBest match {:.4} at {:?} in {}",
            outcome.score, outcome.location, outcome.search
        ));

        let output = self.layout.step_output(&self.sheet, self.scenario_id, "png");
        annotate(&reference, &outcome)
            .save(&output)
            .map_err(|source| ComparisonError::InvalidImage {
                path: output.display().to_string(),
                source,
            })?;

        let status = VerdictStatus::from_bool(outcome.matched);
        self.journal.info(&format!("\t\tVerification result: {}", status));
        let bang = if absence { "!" } else { "" };
        self.step(&format!("VISUAL_TESTING({}): {}FRAMECOMPARE({}) = {}", shown_path, bang, golden, status));
        Ok(Evaluation {
            status,
            actual: Some(Actual::Image {
                sheet: self.sheet.clone(),
                file: file_name(&output),
            }),
        })
    }

    fn flashing(
        &mut self,
        expected: u32,
        steady: &str,
        flashing: &str,
        search: SearchBox,
        tolerance: u32,
    ) -> Result<Evaluation, ScenarioError> {
        self.journal.info("");
        self.journal.info("\tTest Category: Video Processing (flashing).");
        let (_, recording) = self.layout.recording(&self.sheet, self.scenario_id);
        let frames = self
            .rig
            .video
            .read_frames(&recording)
            .map_err(|e| ComparisonError::Video(format!("{}: {}", recording.display(), e)))?;
        let steady = GoldenImage::open(&self.layout.golden.join(steady))?;
        let flashing = GoldenImage::open(&self.layout.golden.join(flashing))?;

        let output = self.layout.step_output(&self.sheet, self.scenario_id, "avi");
        let mut sink = self.rig.video.create_writer(&output)?;
        let report = flash_count(
            &self.video_matcher,
            frames,
            &steady,
            &flashing,
            expected,
            search,
            tolerance,
            sink.as_mut(),
        )?;
        sink.finish()?;

        self.journal.info(&format!(
            "\t\tFlashes: {} observed, {} expected over {} frames",
            report.observed, report.expected, report.frames
        ));
        self.step(&format!(
            "VIDEO_PROCESS({}): VIDEOPROCESS = {}",
            recording.display(),
            report.status
        ));
        Ok(Evaluation {
            status: report.status,
            actual: Some(Actual::Video {
                sheet: self.sheet.clone(),
                file: file_name(&output),
            }),
        })
    }

    // ========================================================================
    // Read-backs
    // ========================================================================

    fn sim_values(&mut self, checks: &[SimCheck]) -> Result<Evaluation, ScenarioError> {
        self.journal.info("");
        self.journal.info("\tTest Category: SIMValue");
        self.pause_for(self.config.settle());

        let mut values = ValueChecks::default();
        for check in checks {
            let actual = match self.rig.sim.element_value(&check.label, &check.unit) {
                Ok(value) => Some(value),
                Err(RigError::Injection(message)) => {
                    tracing::debug!("SIM read {}: {}", check.label, message);
                    None
                }
                Err(e) => return Err(e.into()),
            };
            let ok = actual
                .as_deref()
                .is_some_and(|a| compare_text(a, Relation::Eq, &check.expected));
            values.push(ok, format!("{} = {}", check.label, actual.as_deref().unwrap_or("None")));
        }

        self.log_values(&values);
        let status = values.status();
        Ok(Evaluation {
            status,
            actual: Some(Actual::SimValues(values.lines)),
        })
    }

    fn check_values(
        &mut self,
        checks: &[RelationalCheck],
        mut read: impl FnMut(&mut Self, &str) -> (Option<GdtValue>, Option<ItemType>),
    ) -> Result<ValueChecks, ScenarioError> {
        let mut values = ValueChecks::default();
        for check in checks {
            let (value, item_type) = read(self, &check.item);
            let ok = compare(value.as_ref(), check.relation, &check.expected, item_type)?;
            values.push(ok, format!("{} = {}", check.item, shown(value.as_ref())));
        }
        Ok(values)
    }

    fn values_evaluation(&mut self, values: ValueChecks, header: Vec<String>) -> Evaluation {
        self.log_values(&values);
        let status = values.status();
        let lines = header.into_iter().chain(values.lines).collect();
        Evaluation {
            status,
            actual: Some(Actual::GdtValues(lines)),
        }
    }

    fn log_values(&mut self, values: &ValueChecks) {
        if !values.passed.is_empty() {
            self.step(&format!("PASSED VALUES: {}", values.passed.join("; ")));
        }
        if !values.failed.is_empty() {
            self.step(&format!("FAILED VALUES: {}", values.failed.join("; ")));
        }
        self.journal.info(&format!("\t\tSTAGE RESULT: {}", values.status()));
    }

    /// Read errors become a missing value, which fails the check
    fn keep_reading(&mut self, read: Result<Option<GdtValue>, RigError>) -> Option<GdtValue> {
        read.unwrap_or_else(|e| {
            self.journal.error(&format!("GDT read: {}", e));
            None
        })
    }

    /// First item type that yields a value; `item.validity` reads the
    /// validity flag instead
    fn read_gdt(&mut self, channel: usize, item: &str) -> (Option<GdtValue>, Option<ItemType>) {
        self.pause_for(self.config.read_settle());
        let validity = item.to_lowercase().ends_with(".validity");
        let name = if validity {
            item.split('.').next().unwrap_or(item)
        } else {
            item
        };

        let gdt = match self.rig.channel(channel) {
            Ok(gdt) => gdt,
            Err(e) => {
                self.journal.error(&format!("GDT read: {}", e));
                return (None, None);
            }
        };
        for item_type in ItemType::ALL {
            match gdt.read_item(item_type, name) {
                Ok(reading) => {
                    let value = if validity {
                        reading.validity.map(GdtValue::Bool)
                    } else {
                        reading.value
                    };
                    if value.is_some() {
                        return (value, Some(item_type));
                    }
                }
                Err(e) => tracing::debug!("GDT read {} as {}: {}", name, item_type, e),
            }
        }
        (None, None)
    }
}

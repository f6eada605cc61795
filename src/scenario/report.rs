//! Result report
//!
//! The report is a copy of the workbook sheets with three result columns
//! (Pass/Fail, Actual, PR) appended to every scenario sheet. It is written
//! as `<test>_Result.json` when the root run ends.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::sheet::ScenarioSheet;
use crate::error::ScenarioError;
use crate::verdict::VerdictStatus;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportCell {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// RGB hex fill
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hyperlink: Option<String>,
}

impl ReportCell {
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn status(status: VerdictStatus) -> Self {
        Self {
            value: Some(status.to_string()),
            fill: Some(status_fill(status).to_string()),
            hyperlink: None,
        }
    }
}

pub fn status_fill(status: VerdictStatus) -> &'static str {
    match status {
        VerdictStatus::Failed => "FF0000",
        VerdictStatus::Passed => "00B050",
        VerdictStatus::NoAutoRun => "808080",
    }
}

/// Positions of the appended result columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultColumns {
    pub pass_fail: usize,
    pub actual: usize,
    pub pr: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSheet {
    pub name: String,
    pub cells: Vec<Vec<ReportCell>>,
}

impl ReportSheet {
    pub fn from_sheet(name: impl Into<String>, sheet: &ScenarioSheet) -> Self {
        Self {
            name: name.into(),
            cells: sheet
                .rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|c| ReportCell {
                            value: c.clone(),
                            ..Default::default()
                        })
                        .collect()
                })
                .collect(),
        }
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&ReportCell> {
        self.cells.get(row).and_then(|r| r.get(column))
    }

    pub fn set(&mut self, row: usize, column: usize, cell: ReportCell) {
        if self.cells.len() <= row {
            self.cells.resize_with(row + 1, Vec::new);
        }
        let cells = &mut self.cells[row];
        if cells.len() <= column {
            cells.resize_with(column + 1, ReportCell::default);
        }
        cells[column] = cell;
    }

    /// Empty the cell
    pub fn clear(&mut self, row: usize, column: usize) {
        self.set(row, column, ReportCell::default());
    }

    pub fn column_count(&self) -> usize {
        self.cells.iter().map(|r| r.len()).max().unwrap_or(0)
    }

    /// Append Pass/Fail, Actual and PR after the last used column, headed on
    /// `header_row` with an empty row below
    pub fn append_result_columns(&mut self, header_row: usize) -> ResultColumns {
        let first = self.column_count();
        let columns = ResultColumns {
            pass_fail: first,
            actual: first + 1,
            pr: first + 2,
        };
        for (column, title) in [
            (columns.pass_fail, "Pass/Fail"),
            (columns.actual, "Actual"),
            (columns.pr, "PR"),
        ] {
            self.set(header_row, column, ReportCell::text(title));
            self.clear(header_row + 1, column);
        }
        columns
    }

    /// Blank a data row's result cells before it runs
    pub fn reset_row(&mut self, row: usize, columns: ResultColumns) {
        self.clear(row, columns.pass_fail);
        self.set(row, columns.actual, ReportCell::text(" "));
        self.clear(row, columns.pr);
    }

    /// `Test was executed with <version>` two rows under the last one
    pub fn write_footer(&mut self, version: &str) {
        let row = self.cells.len() + 1;
        self.set(row, 0, ReportCell::text(format!("Test was executed with {}", version)));
    }
}

/// What the Actual cell shows
#[derive(Debug, Clone, PartialEq)]
pub enum Actual {
    /// Annotated image in `Output/<sheet>`
    Image { sheet: String, file: String },
    /// Annotated video in `Output/<sheet>`
    Video { sheet: String, file: String },
    /// Recording in `Results/<sheet>`
    Recording { sheet: String, file: String },
    SimValues(Vec<String>),
    GdtValues(Vec<String>),
    /// Sheet holding a called test's results
    TestCall(String),
    Text(String),
}

impl Actual {
    pub fn to_cell(&self) -> ReportCell {
        let linked = |value: &str, link: String| ReportCell {
            value: Some(value.to_string()),
            fill: None,
            hyperlink: Some(link),
        };
        match self {
            Actual::Image { sheet, file } | Actual::Video { sheet, file } => {
                linked(file, format!("./Output/{}/{}", sheet, file))
            }
            Actual::Recording { sheet, file } => linked(file, format!("./Results/{}/{}", sheet, file)),
            Actual::SimValues(lines) => ReportCell::text(format!("SIMValues: \n{}", lines.join("\n"))),
            Actual::GdtValues(lines) => ReportCell::text(format!("GDTVALUES: \n{}", lines.join("\n"))),
            Actual::TestCall(name) => linked(&format!("Sheet: \"{}\"", name), format!("#{}!A1", name)),
            Actual::Text(text) => ReportCell::text(text.clone()),
        }
    }

    /// One cell for several actuals: values stacked, first link kept
    pub fn combine(actuals: &[Actual]) -> ReportCell {
        let cells: Vec<ReportCell> = actuals.iter().map(Actual::to_cell).collect();
        let values: Vec<&str> = cells.iter().filter_map(|c| c.value.as_deref()).collect();
        ReportCell {
            value: (!values.is_empty()).then(|| values.join("\n")),
            fill: None,
            hyperlink: cells.iter().find_map(|c| c.hyperlink.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub sheets: Vec<ReportSheet>,
}

impl Report {
    pub fn sheet(&self, name: &str) -> Option<&ReportSheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    /// Sheet `name`, created empty when missing
    pub fn sheet_mut(&mut self, name: &str) -> &mut ReportSheet {
        let index = match self.sheets.iter().position(|s| s.name == name) {
            Some(index) => index,
            None => {
                self.sheets.push(ReportSheet {
                    name: name.to_string(),
                    cells: Vec::new(),
                });
                self.sheets.len() - 1
            }
        };
        &mut self.sheets[index]
    }

    /// Copy `sheet` into the report as `name`, replacing any sheet of that name
    pub fn add_sheet(&mut self, name: &str, sheet: &ScenarioSheet) {
        *self.sheet_mut(name) = ReportSheet::from_sheet(name, sheet);
    }

    pub fn save(&self, path: &Path) -> Result<(), ScenarioError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| ScenarioError::Workbook {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        fs::write(path, json).map_err(|e| ScenarioError::io(path, e))
    }

    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let content = fs::read_to_string(path).map_err(|e| ScenarioError::io(path, e))?;
        serde_json::from_str(&content).map_err(|e| ScenarioError::Workbook {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> ScenarioSheet {
        ScenarioSheet::new(
            "Scenarios",
            vec![
                vec![None, Some("GDT".into()), Some("EXPECTED".into())],
                vec![Some("#".into()), Some("alt".into()), Some("Expected".into())],
                vec![None, None, None],
                vec![Some("1".into()), Some("150".into()), Some("GDT(alt>100)".into())],
            ],
        )
    }

    #[test]
    fn test_result_columns_follow_grid() {
        let mut sheet = ReportSheet::from_sheet("Scenarios", &grid());
        let columns = sheet.append_result_columns(1);
        assert_eq!(columns, ResultColumns { pass_fail: 3, actual: 4, pr: 5 });
        assert_eq!(sheet.cell(1, 3).unwrap().value.as_deref(), Some("Pass/Fail"));
        assert_eq!(sheet.cell(1, 5).unwrap().value.as_deref(), Some("PR"));
        assert_eq!(sheet.cell(2, 4).unwrap().value, None);

        sheet.reset_row(3, columns);
        assert_eq!(sheet.cell(3, 4).unwrap().value.as_deref(), Some(" "));
        sheet.set(3, columns.pass_fail, ReportCell::status(VerdictStatus::Failed));
        assert_eq!(sheet.cell(3, 3).unwrap().fill.as_deref(), Some("FF0000"));
    }

    #[test]
    fn test_footer_two_rows_below() {
        let mut sheet = ReportSheet::from_sheet("Scenarios", &grid());
        sheet.write_footer("hudcheck 0.1.0");
        assert_eq!(sheet.cells.len(), 6);
        assert_eq!(
            sheet.cell(5, 0).unwrap().value.as_deref(),
            Some("Test was executed with hudcheck 0.1.0")
        );
    }

    #[test]
    fn test_actual_cells() {
        let image = Actual::Image {
            sheet: "Scenarios".into(),
            file: "Step 2.png".into(),
        }
        .to_cell();
        assert_eq!(image.hyperlink.as_deref(), Some("./Output/Scenarios/Step 2.png"));

        let call = Actual::TestCall("HUD_002".into()).to_cell();
        assert_eq!(call.value.as_deref(), Some("Sheet: \"HUD_002\""));
        assert_eq!(call.hyperlink.as_deref(), Some("#HUD_002!A1"));

        let gdt = Actual::GdtValues(vec!["alt = 150".into(), "gear = Valid".into()]).to_cell();
        assert_eq!(gdt.value.as_deref(), Some("GDTVALUES: \nalt = 150\ngear = Valid"));

        let both = Actual::combine(&[
            Actual::SimValues(vec!["Gear = 1".into()]),
            Actual::Recording {
                sheet: "Scenarios".into(),
                file: "Scenario_1.mp4".into(),
            },
        ]);
        assert_eq!(both.value.as_deref(), Some("SIMValues: \nGear = 1\nScenario_1.mp4"));
        assert_eq!(both.hyperlink.as_deref(), Some("./Results/Scenarios/Scenario_1.mp4"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("T_Result.json");
        let mut report = Report::default();
        report.add_sheet("Scenarios", &grid());
        report.sheet_mut("Scenarios").write_footer("v1");
        report.save(&path).unwrap();

        let loaded = Report::load(&path).unwrap();
        assert_eq!(loaded, report);
        assert!(loaded.sheet("Missing").is_none());
    }
}

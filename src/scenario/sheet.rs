//! Scenario workbooks
//!
//! A workbook is a TOML file with one `[[sheets]]` entry per sheet. Each
//! sheet is a grid of rows; empty strings are empty cells.
//!
//! ```toml
//! [[sheets]]
//! name = "Scenarios"
//! rows = [
//!     ["",  "GDT", "SIM",        "ACTION", "EXPECTED"],
//!     ["#", "alt", "Speed[kts]", "Action", "Expected"],
//!     ["",  "",    "",           "",       ""],
//!     [1,   150,   "",           "",       "GDT(alt>100)"],
//! ]
//! ```

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::ScenarioError;

/// Cell as written in the workbook file
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawCell {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl RawCell {
    fn into_cell(self) -> Option<String> {
        let text = match self {
            RawCell::Text(s) => s,
            RawCell::Integer(v) => v.to_string(),
            RawCell::Float(v) => v.to_string(),
            RawCell::Bool(v) => if v { "True".to_string() } else { "False".to_string() },
        };
        if text.is_empty() { None } else { Some(text) }
    }
}

#[derive(Debug, Deserialize)]
struct RawSheet {
    name: String,
    #[serde(default)]
    rows: Vec<Vec<RawCell>>,
}

#[derive(Debug, Deserialize)]
struct RawWorkbook {
    #[serde(default)]
    sheets: Vec<RawSheet>,
}

/// Grid of optional text cells, indexed from 0
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioSheet {
    pub name: String,
    pub rows: Vec<Vec<Option<String>>>,
}

/// Position of the `#` sentinel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    /// Heading row
    pub row: usize,
    /// Scenario column
    pub column: usize,
}

impl ScenarioSheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .and_then(|c| c.as_deref())
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.rows.iter().map(|r| r.len()).max().unwrap_or(0)
    }

    /// First cell containing `#`, scanning rows top to bottom
    pub fn find_anchor(&self) -> Option<Anchor> {
        self.rows.iter().enumerate().find_map(|(row, cells)| {
            cells
                .iter()
                .position(|c| c.as_deref().is_some_and(|v| v.contains('#')))
                .map(|column| Anchor { row, column })
        })
    }

    /// Row whose scenario column holds `scenario`
    pub fn find_scenario(&self, scenario: u32, column: usize) -> Option<usize> {
        let wanted = scenario.to_string();
        (0..self.rows.len()).find(|&row| self.cell(row, column).is_some_and(|v| v.trim() == wanted))
    }

    /// Row as a vector padded to `width` cells
    pub fn row(&self, row: usize, width: usize) -> Vec<Option<String>> {
        let mut cells = self.rows.get(row).cloned().unwrap_or_default();
        cells.resize(width.max(cells.len()), None);
        cells
    }
}

/// Ordered named sheets
#[derive(Debug, Clone, PartialEq)]
pub struct Workbook {
    pub sheets: Vec<ScenarioSheet>,
}

pub const ACTIONS_SHEET: &str = "Actions";
pub const PRECONDITIONS_SHEET: &str = "Preconditions";
pub const SCENARIOS_SHEET: &str = "Scenarios";

impl Workbook {
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let content = fs::read_to_string(path).map_err(|e| ScenarioError::Workbook {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::parse(&content).map_err(|message| ScenarioError::Workbook {
            path: path.display().to_string(),
            message,
        })
    }

    pub fn parse(content: &str) -> Result<Self, String> {
        let raw: RawWorkbook = toml::from_str(content).map_err(|e| e.to_string())?;
        if raw.sheets.is_empty() {
            return Err("workbook has no sheets".to_string());
        }
        Ok(Self {
            sheets: raw
                .sheets
                .into_iter()
                .map(|s| ScenarioSheet {
                    name: s.name,
                    rows: s
                        .rows
                        .into_iter()
                        .map(|r| r.into_iter().map(RawCell::into_cell).collect())
                        .collect(),
                })
                .collect(),
        })
    }

    pub fn sheet(&self, name: &str) -> Option<&ScenarioSheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    /// Sheet a calling test copies into its report: `Scenarios` when there
    /// are several sheets, otherwise the only one.
    pub fn main_sheet(&self) -> Result<&ScenarioSheet, ScenarioError> {
        if self.sheets.len() == 1 {
            return Ok(&self.sheets[0]);
        }
        self.sheet(SCENARIOS_SHEET)
            .ok_or_else(|| ScenarioError::MissingSheet {
                name: SCENARIOS_SHEET.to_string(),
                available: self.names(),
            })
    }

    /// Sheets run as scenarios, in workbook order
    pub fn scenario_sheets(&self) -> Vec<&ScenarioSheet> {
        if self.sheets.len() == 1 {
            return self.sheets.iter().collect();
        }
        self.sheets
            .iter()
            .filter(|s| s.name.contains(SCENARIOS_SHEET))
            .collect()
    }

    /// `shortcut=real` aliases from the `Actions` sheet, keys lowercased
    pub fn aliases(&self) -> Vec<(String, String)> {
        let Some(sheet) = self.sheet(ACTIONS_SHEET) else {
            return Vec::new();
        };
        sheet
            .rows
            .iter()
            .flatten()
            .flatten()
            .filter_map(|cell| {
                let (shortcut, real) = cell.split_once('=')?;
                if real.contains('=') {
                    return None;
                }
                Some((shortcut.trim().to_lowercase(), real.trim().to_string()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOOK: &str = r##"
[[sheets]]
name = "Actions"
rows = [["gear_down=1", "note"], ["Flaps=noise_constant(3,100)"]]

[[sheets]]
name = "Scenarios"
rows = [
    ["", "GDT", "EXPECTED"],
    ["#", "alt", "Expected"],
    ["", "altitude", ""],
    [1, 150, "GDT(alt>100)"],
    [2, 90.5, "N/A"],
]

[[sheets]]
name = "More Scenarios"
rows = [["#"]]
"##;

    #[test]
    fn test_parse_cells() {
        let book = Workbook::parse(BOOK).unwrap();
        let sheet = book.sheet("Scenarios").unwrap();
        assert_eq!(sheet.cell(3, 0), Some("1"));
        assert_eq!(sheet.cell(3, 1), Some("150"));
        assert_eq!(sheet.cell(4, 1), Some("90.5"));
        assert_eq!(sheet.cell(0, 0), None);
        assert_eq!(sheet.cell(10, 10), None);
        assert_eq!(sheet.column_count(), 3);
    }

    #[test]
    fn test_find_anchor_and_scenario() {
        let book = Workbook::parse(BOOK).unwrap();
        let sheet = book.sheet("Scenarios").unwrap();
        assert_eq!(sheet.find_anchor(), Some(Anchor { row: 1, column: 0 }));
        assert_eq!(sheet.find_scenario(2, 0), Some(4));
        assert_eq!(sheet.find_scenario(7, 0), None);

        let bare = ScenarioSheet::new("x", vec![vec![Some("a".into())]]);
        assert_eq!(bare.find_anchor(), None);
    }

    #[test]
    fn test_sheet_selection() {
        let book = Workbook::parse(BOOK).unwrap();
        let names: Vec<_> = book.scenario_sheets().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Scenarios", "More Scenarios"]);
        assert_eq!(book.main_sheet().unwrap().name, "Scenarios");

        let single = Workbook::parse("[[sheets]]\nname = \"Test\"\nrows = []\n").unwrap();
        assert_eq!(single.scenario_sheets().len(), 1);
        assert_eq!(single.main_sheet().unwrap().name, "Test");

        let missing = Workbook::parse("[[sheets]]\nname = \"A\"\n[[sheets]]\nname = \"B\"\n").unwrap();
        assert!(matches!(missing.main_sheet(), Err(ScenarioError::MissingSheet { .. })));
    }

    #[test]
    fn test_aliases() {
        let book = Workbook::parse(BOOK).unwrap();
        assert_eq!(
            book.aliases(),
            vec![
                ("gear_down".to_string(), "1".to_string()),
                ("flaps".to_string(), "noise_constant(3,100)".to_string()),
            ]
        );
    }

    #[test]
    fn test_load_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("T.toml");
        fs::write(&path, "sheets = 3").unwrap();
        match Workbook::load(&path) {
            Err(ScenarioError::Workbook { path: p, .. }) => assert!(p.ends_with("T.toml")),
            other => panic!("unexpected: {:?}", other),
        }
    }
}

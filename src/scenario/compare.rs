//! Relational checks against read-back values

use std::cmp::Ordering;
use std::fmt;

use crate::error::{ParameterError, ScenarioError};
use crate::rig::{GdtValue, ItemType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Relation {
    pub fn parse(symbol: &str) -> Option<Self> {
        match symbol {
            "=" => Some(Relation::Eq),
            "!=" => Some(Relation::Ne),
            "<" => Some(Relation::Lt),
            "<=" => Some(Relation::Le),
            ">" => Some(Relation::Gt),
            ">=" => Some(Relation::Ge),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Relation::Eq => "=",
            Relation::Ne => "!=",
            Relation::Lt => "<",
            Relation::Le => "<=",
            Relation::Gt => ">",
            Relation::Ge => ">=",
        }
    }

    pub fn holds<T: PartialOrd + ?Sized>(self, actual: &T, expected: &T) -> bool {
        match actual.partial_cmp(expected) {
            Some(Ordering::Equal) => matches!(self, Relation::Eq | Relation::Le | Relation::Ge),
            Some(Ordering::Less) => matches!(self, Relation::Ne | Relation::Lt | Relation::Le),
            Some(Ordering::Greater) => matches!(self, Relation::Ne | Relation::Gt | Relation::Ge),
            None => self == Relation::Ne,
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// `item<op>value`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationalCheck {
    pub item: String,
    pub relation: Relation,
    pub expected: String,
}

impl RelationalCheck {
    /// The operator starts at the first `!`, `<`, `>` or `=` and takes one
    /// trailing `=`.
    pub fn parse(text: &str) -> Result<Self, ScenarioError> {
        let start = text
            .find(['!', '<', '>', '='])
            .ok_or_else(|| ScenarioError::malformed(text, "Missing operator in check"))?;
        let rest = &text[start..];
        let len = if rest.len() > 1 && rest.as_bytes()[1] == b'=' { 2 } else { 1 };
        let symbol = &rest[..len];
        let relation = Relation::parse(symbol).ok_or_else(|| {
            ScenarioError::malformed(
                text,
                format!("'{}' is not a valid operator. Valid operators are: !=, <=, <, >=, >, =", symbol),
            )
        })?;
        let item = &text[..start];
        if item.is_empty() {
            return Err(ScenarioError::malformed(text, "Missing data item before operator"));
        }
        Ok(Self {
            item: item.to_string(),
            relation,
            expected: rest[len..].to_string(),
        })
    }
}

impl fmt::Display for RelationalCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.item, self.relation, self.expected)
    }
}

/// `Valid`/`Invalid`, `True`/`False` or `1`/`0`
pub fn parse_validity(text: &str) -> Result<bool, ParameterError> {
    match text.trim().to_lowercase().as_str() {
        "valid" | "true" | "1" => Ok(true),
        "invalid" | "false" | "0" => Ok(false),
        _ => Err(ParameterError::new(
            "validity",
            format!("\"{}\" is not 'valid' nor 'invalid'.", text),
        )),
    }
}

/// Decimals kept when comparing a float read from an item of `item_type`
fn float_decimals(actual: f64, item_type: Option<ItemType>) -> Option<i32> {
    let width = item_type?.display_width()?;
    let integer_digits = format!("{:.0}", actual.abs().trunc()).len() as i32;
    Some((width - integer_digits).max(0))
}

fn round_to(value: f64, decimals: i32) -> f64 {
    // Past f64 precision rounding cannot change the value
    if decimals >= 15 {
        return value;
    }
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

fn not_a_number(expected: &str) -> ScenarioError {
    ScenarioError::malformed(expected, "Expected value is not a number")
}

/// Evaluate `actual <relation> expected`.
///
/// A missing value always fails. Bools compare against a validity word,
/// the expected value of a float is rounded to the item type's display width,
/// integers compare as integers and text compares numerically when both
/// sides are numbers.
pub fn compare(
    actual: Option<&GdtValue>,
    relation: Relation,
    expected: &str,
    item_type: Option<ItemType>,
) -> Result<bool, ScenarioError> {
    let Some(actual) = actual else {
        return Ok(false);
    };
    match actual {
        GdtValue::Bool(value) => {
            let wanted = parse_validity(expected).map_err(|_| {
                ParameterError::new(
                    "expected",
                    format!(
                        "\"{}\" cannot be used for validity comparison! value has to be Valid or Invalid.",
                        expected
                    ),
                )
            })?;
            Ok(relation.holds(value, &wanted))
        }
        GdtValue::Float(value) => {
            let wanted: f64 = expected.trim().parse().map_err(|_| not_a_number(expected))?;
            match float_decimals(*value, item_type) {
                Some(decimals) => Ok(relation.holds(value, &round_to(wanted, decimals))),
                None => Ok(relation.holds(value, &wanted)),
            }
        }
        GdtValue::Int(value) => {
            let trimmed = expected.trim();
            if let Ok(wanted) = trimmed.parse::<i64>() {
                return Ok(relation.holds(value, &wanted));
            }
            let wanted: f64 = trimmed.parse().map_err(|_| not_a_number(expected))?;
            Ok(relation.holds(&(*value as f64), &wanted))
        }
        GdtValue::Text(value) => Ok(compare_text(value, relation, expected)),
    }
}

/// Numeric when both sides parse, otherwise plain string comparison
pub fn compare_text(actual: &str, relation: Relation, expected: &str) -> bool {
    match (actual.trim().parse::<f64>(), expected.trim().parse::<f64>()) {
        (Ok(a), Ok(b)) => relation.holds(&a, &b),
        _ => relation.holds(actual, expected),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(text: &str) -> RelationalCheck {
        RelationalCheck::parse(text).unwrap()
    }

    #[test]
    fn test_parse_operators() {
        let c = check("alt>100");
        assert_eq!((c.item.as_str(), c.relation, c.expected.as_str()), ("alt", Relation::Gt, "100"));
        assert_eq!(check("alt>=100").relation, Relation::Ge);
        assert_eq!(check("mode!=3").relation, Relation::Ne);
        assert_eq!(check("gear.validity=Valid").item, "gear.validity");
        assert_eq!(check("x=-5").expected, "-5");
    }

    #[test]
    fn test_parse_rejects_bad_operators() {
        assert!(matches!(RelationalCheck::parse("alt"), Err(ScenarioError::Malformed { .. })));
        assert!(matches!(RelationalCheck::parse("alt==3"), Err(ScenarioError::Malformed { .. })));
        assert!(matches!(RelationalCheck::parse("alt!3"), Err(ScenarioError::Malformed { .. })));
        assert!(matches!(RelationalCheck::parse(">3"), Err(ScenarioError::Malformed { .. })));
    }

    #[test]
    fn test_greater_than_with_missing_value() {
        let c = check("alt>100");
        let eval = |v: Option<GdtValue>| compare(v.as_ref(), c.relation, &c.expected, Some(ItemType::Number)).unwrap();
        assert!(eval(Some(GdtValue::Int(150))));
        assert!(!eval(Some(GdtValue::Int(90))));
        assert!(!eval(None));
    }

    #[test]
    fn test_bool_against_validity_words() {
        let valid = GdtValue::Bool(true);
        assert!(compare(Some(&valid), Relation::Eq, "Valid", None).unwrap());
        assert!(compare(Some(&valid), Relation::Eq, "1", None).unwrap());
        assert!(!compare(Some(&valid), Relation::Eq, "invalid", None).unwrap());
        assert!(matches!(
            compare(Some(&valid), Relation::Eq, "maybe", None),
            Err(ScenarioError::Parameter(_))
        ));
    }

    #[test]
    fn test_float_rounding_uses_item_width() {
        // NUMBER keeps 7 - 3 = 4 decimals of the expected value for 123.xxx
        let shown = GdtValue::Float(123.4568);
        assert!(compare(Some(&shown), Relation::Eq, "123.45678", Some(ItemType::Number)).unwrap());
        assert!(!compare(Some(&shown), Relation::Eq, "123.45678", Some(ItemType::Double)).unwrap());
        let read = GdtValue::Float(123.456_789);
        assert!(compare(Some(&read), Relation::Eq, "123.456789", Some(ItemType::Double)).unwrap());
        assert!(compare(Some(&GdtValue::Float(-1.5)), Relation::Lt, "0", Some(ItemType::Number)).unwrap());
        assert!(matches!(
            compare(Some(&read), Relation::Eq, "abc", None),
            Err(ScenarioError::Malformed { .. })
        ));
    }

    #[test]
    fn test_float_read_is_not_rounded() {
        let read = GdtValue::Float(123.456_789);
        assert!(!compare(Some(&read), Relation::Eq, "123.4568", Some(ItemType::Number)).unwrap());
        assert!(compare(Some(&read), Relation::Lt, "123.4568", Some(ItemType::Number)).unwrap());
        assert!(compare(Some(&read), Relation::Gt, "123.45678", Some(ItemType::Number)).unwrap());
    }

    #[test]
    fn test_text_comparison() {
        assert!(compare_text("3", Relation::Eq, "3.0"));
        assert!(compare_text("NAV", Relation::Eq, "NAV"));
        assert!(compare_text("NAV", Relation::Ne, "ILS"));
        assert!(compare(Some(&GdtValue::Text("10".into())), Relation::Gt, "9", None).unwrap());
    }

    #[test]
    fn test_validity_words() {
        assert!(parse_validity("VALID").unwrap());
        assert!(!parse_validity("0").unwrap());
        assert!(parse_validity("2").is_err());
    }
}

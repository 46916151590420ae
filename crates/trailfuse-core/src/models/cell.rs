//! Tagged cell values produced by the table parsing layer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One parsed table cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Bool(bool),
    #[default]
    Missing,
}

impl CellValue {
    /// Classify raw text the way a dynamically typed CSV parser would.
    ///
    /// Empty text is `Missing`, `true`/`false` become booleans, finite numbers
    /// become `Number` and everything else stays text.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return CellValue::Missing;
        }
        if trimmed.eq_ignore_ascii_case("true") {
            return CellValue::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return CellValue::Bool(false);
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => CellValue::Number(n),
            _ => CellValue::Text(trimmed.to_string()),
        }
    }

    /// Finite numeric value, if this cell holds one
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) if n.is_finite() => Some(*n),
            CellValue::Number(_) | CellValue::Text(_) | CellValue::Bool(_) | CellValue::Missing => {
                None
            }
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            CellValue::Number(_) | CellValue::Bool(_) | CellValue::Missing => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, CellValue::Missing)
    }

    /// Short type name used in validation messages
    pub fn type_name(&self) -> &'static str {
        match self {
            CellValue::Number(_) => "number",
            CellValue::Text(_) => "string",
            CellValue::Bool(_) => "boolean",
            CellValue::Missing => "missing",
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::Missing => Ok(()),
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_classification() {
        assert_eq!(CellValue::parse(""), CellValue::Missing);
        assert_eq!(CellValue::parse("   "), CellValue::Missing);
        assert_eq!(CellValue::parse("TRUE"), CellValue::Bool(true));
        assert_eq!(CellValue::parse("false"), CellValue::Bool(false));
        assert_eq!(CellValue::parse(" 12.5 "), CellValue::Number(12.5));
        assert_eq!(CellValue::parse("-3"), CellValue::Number(-3.0));
        assert_eq!(CellValue::parse("10:30"), CellValue::Text("10:30".to_string()));
        assert_eq!(CellValue::parse("NaN"), CellValue::Text("NaN".to_string()));
    }

    #[test]
    fn test_display_for_talk_conversion() {
        assert_eq!(CellValue::Number(4.0).to_string(), "4");
        assert_eq!(CellValue::Bool(true).to_string(), "true");
        assert_eq!(CellValue::Missing.to_string(), "");
    }
}

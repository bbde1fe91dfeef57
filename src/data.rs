//! Cell values.
//!
//! Source sheets are untyped: a cell is text, a number, or absent. Absence is
//! modelled as `Option<Value>::None` everywhere, so a [`Value`] always carries
//! something displayable.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Number(n) => format_number(*n),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

/// Converts raw text into a cell, treating blank input as absent.
pub fn text_cell(raw: &str) -> Option<Value> {
    if raw.trim().is_empty() {
        None
    } else {
        Some(Value::Text(raw.to_string()))
    }
}

/// Display text for a possibly-absent cell; absent cells render as `""`.
pub fn display_cell(cell: &Option<Value>) -> String {
    cell.as_ref().map(Value::as_display).unwrap_or_default()
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        (n as i64).to_string()
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_numbers_display_without_fraction() {
        assert_eq!(Value::Number(500.0).as_display(), "500");
        assert_eq!(Value::Number(-3.0).as_display(), "-3");
        assert_eq!(Value::Number(12.5).as_display(), "12.5");
    }

    #[test]
    fn text_cell_treats_blank_as_absent() {
        assert_eq!(text_cell(""), None);
        assert_eq!(text_cell("   "), None);
        assert_eq!(text_cell("0042"), Some(Value::Text("0042".into())));
    }

    #[test]
    fn display_cell_renders_absent_as_empty() {
        assert_eq!(display_cell(&None), "");
        assert_eq!(display_cell(&Some(Value::from("Centro"))), "Centro");
    }
}

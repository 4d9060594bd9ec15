//! Value comparisons for scenario expectations

use serde::Deserialize;
use serde_json::Value;
use std::fmt;

/// Error when a comparison fails or cannot be made
#[derive(Debug, Clone, PartialEq)]
pub struct AssertionError {
    pub message: String,
    pub expected: String,
    pub actual: String,
}

impl fmt::Display for AssertionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (expected: {}, actual: {})", self.message, self.expected, self.actual)
    }
}

impl std::error::Error for AssertionError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum Comparison {
    #[default]
    #[serde(rename = "=", alias = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
}

impl Comparison {
    pub fn as_str(&self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Ne => "!=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
            Comparison::Lt => "<",
            Comparison::Le => "<=",
        }
    }

    fn is_ordering(&self) -> bool {
        matches!(self, Comparison::Gt | Comparison::Ge | Comparison::Lt | Comparison::Le)
    }

    /// Compare `actual` against `expected`; `Err` when the values cannot be
    /// compared with this operator
    pub fn evaluate(
        &self,
        actual: &Value,
        expected: &Value,
        tolerance: f64,
    ) -> Result<bool, AssertionError> {
        if let (Some(a), Some(e)) = (actual.as_f64(), expected.as_f64()) {
            return Ok(self.compare_numbers(a, e, tolerance));
        }

        if self.is_ordering() {
            return Err(AssertionError {
                message: format!("operator '{}' needs two numbers", self.as_str()),
                expected: expected.to_string(),
                actual: actual.to_string(),
            });
        }

        let equal = match (numeric_array(actual), numeric_array(expected)) {
            (Some(a), Some(e)) => {
                a.len() == e.len() && a.iter().zip(&e).all(|(x, y)| (x - y).abs() <= tolerance)
            }
            _ => actual == expected,
        };
        Ok(match self {
            Comparison::Ne => !equal,
            _ => equal,
        })
    }

    fn compare_numbers(&self, actual: f64, expected: f64, tolerance: f64) -> bool {
        match self {
            Comparison::Eq => (actual - expected).abs() <= tolerance,
            Comparison::Ne => (actual - expected).abs() > tolerance,
            Comparison::Gt => actual > expected,
            Comparison::Ge => actual >= expected - tolerance,
            Comparison::Lt => actual < expected,
            Comparison::Le => actual <= expected + tolerance,
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn numeric_array(value: &Value) -> Option<Vec<f64>> {
    value.as_array()?.iter().map(Value::as_f64).collect()
}

//! Expected and unexpected log lines
//!
//! The outer runner checks a scenario's output after it finishes: every
//! expected literal must appear in some line, and no unexpected literal may.

use serde::Deserialize;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LogExpectations {
    #[serde(default)]
    pub expected: Vec<String>,
    #[serde(default)]
    pub unexpected: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogValidation {
    /// Expected literals no line contained
    pub missing: Vec<String>,
    /// Unexpected literals that did show up
    pub unexpected_found: Vec<String>,
}

impl LogValidation {
    pub fn passed(&self) -> bool {
        self.missing.is_empty() && self.unexpected_found.is_empty()
    }

    /// One human-readable line per problem
    pub fn problems(&self) -> Vec<String> {
        self.missing
            .iter()
            .map(|line| format!("Expected line not found: {}", line))
            .chain(
                self.unexpected_found
                    .iter()
                    .map(|line| format!("Unexpected line found: {}", line)),
            )
            .collect()
    }
}

impl LogExpectations {
    pub fn is_empty(&self) -> bool {
        self.expected.is_empty() && self.unexpected.is_empty()
    }

    pub fn validate<S: AsRef<str>>(&self, lines: &[S]) -> LogValidation {
        let seen = |literal: &String| lines.iter().any(|l| l.as_ref().contains(literal.as_str()));
        LogValidation {
            missing: self.expected.iter().filter(|e| !seen(e)).cloned().collect(),
            unexpected_found: self.unexpected.iter().filter(|u| seen(u)).cloned().collect(),
        }
    }
}

//! Validation results
//!
//! Validation never fails with an error: problems are collected as
//! [`ValidationProblem`] values so that an invalid state can be displayed.
//! A [`ValidationProblems`] collection is OK exactly when it holds no
//! ERROR-severity entry.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a validation problem, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Ok,
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Ok => write!(f, "OK"),
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// A single diagnostic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationProblem {
    pub severity: Severity,
    /// Id of whatever raised the problem (operation, slot, transformation)
    pub source_id: String,
    pub message: String,
}

impl ValidationProblem {
    pub fn new(severity: Severity, source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            source_id: source_id.into(),
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for ValidationProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.source_id, self.message)
    }
}

/// Ordered collection of problems
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationProblems {
    problems: Vec<ValidationProblem>,
}

impl ValidationProblems {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, problem: ValidationProblem) {
        self.problems.push(problem);
    }

    pub fn error(&mut self, source_id: impl Into<String>, message: impl Into<String>) {
        self.add(ValidationProblem::new(Severity::Error, source_id, message));
    }

    pub fn warning(&mut self, source_id: impl Into<String>, message: impl Into<String>) {
        self.add(ValidationProblem::new(Severity::Warning, source_id, message));
    }

    pub fn info(&mut self, source_id: impl Into<String>, message: impl Into<String>) {
        self.add(ValidationProblem::new(Severity::Info, source_id, message));
    }

    pub fn extend(&mut self, other: ValidationProblems) {
        self.problems.extend(other.problems);
    }

    /// True when no ERROR-severity problem exists
    pub fn is_ok(&self) -> bool {
        !self.problems.iter().any(ValidationProblem::is_error)
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    /// Highest severity present; `Ok` for an empty collection
    pub fn severity(&self) -> Severity {
        self.problems
            .iter()
            .map(|p| p.severity)
            .max()
            .unwrap_or(Severity::Ok)
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationProblem> {
        self.problems.iter().filter(|p| p.is_error())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValidationProblem> {
        self.problems.iter()
    }
}

impl<'a> IntoIterator for &'a ValidationProblems {
    type Item = &'a ValidationProblem;
    type IntoIter = std::slice::Iter<'a, ValidationProblem>;

    fn into_iter(self) -> Self::IntoIter {
        self.problems.iter()
    }
}

impl fmt::Display for ValidationProblems {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.problems.iter().map(|p| p.to_string()).collect();
        write!(f, "{}", messages.join("; "))
    }
}

#![forbid(unsafe_code)]
#![allow(unused_assignments)]

use cadence_ast::Span;
use miette::Diagnostic;
use thiserror::Error;

use crate::error::CheckError;

/// Diagnostic severity level
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    /// Fails the check
    Error,
    /// Reported, never affects success
    Warning,
}

impl Severity {
    pub fn display(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error, Diagnostic)]
#[allow(unused_assignments)]
pub enum CheckWarning {
    #[error("unreachable statement")]
    #[diagnostic(code(cadence::sema::unreachable_statement), severity(Warning))]
    UnreachableStatement {
        #[label("this statement will never run")]
        span: Span,
    },
}

impl CheckWarning {
    pub fn severity(&self) -> Severity {
        Severity::Warning
    }
}

/// Ordered collection of everything a run reported.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Diagnostics {
    errors: Vec<CheckError>,
    warnings: Vec<CheckWarning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, error: CheckError) {
        tracing::debug!(%error, "check error");
        self.errors.push(error);
    }

    pub fn extend(&mut self, errors: impl IntoIterator<Item = CheckError>) {
        for error in errors {
            self.report(error);
        }
    }

    pub fn warn(&mut self, warning: CheckWarning) {
        self.warnings.push(warning);
    }

    pub fn errors(&self) -> &[CheckError] {
        &self.errors
    }

    pub fn warnings(&self) -> &[CheckWarning] {
        &self.warnings
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_parts(self) -> (Vec<CheckError>, Vec<CheckWarning>) {
        (self.errors, self.warnings)
    }
}

/// All errors of a failed run, rendered by miette as related diagnostics.
#[derive(Debug, Error, Diagnostic)]
#[error("checking failed with {} error(s)", .errors.len())]
#[diagnostic(code(cadence::sema::failed))]
pub struct CheckerErrors {
    #[related]
    pub errors: Vec<CheckError>,
}

#![forbid(unsafe_code)]
#![allow(unused_assignments)]

use cadence_ast::Span;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
#[error("parse error: {message}")]
#[diagnostic(code(cadence::parse))]
#[allow(unused_assignments)]
pub struct ParseError {
    pub message: String,
    #[label]
    pub span: Span,
}

#![forbid(unsafe_code)]

mod error;
mod parser;

use cadence_lex::Lexer;
use miette::IntoDiagnostic;

pub use error::ParseError;
pub use parser::Parser;

pub fn parse_source(src: &str) -> miette::Result<cadence_ast::Program> {
    let tokens = Lexer::new(src).lex().into_diagnostic()?;
    let mut parser = Parser::new(&tokens);
    parser.parse_program().into_diagnostic()
}

pub fn parse_expr(src: &str) -> miette::Result<cadence_ast::Expr> {
    let tokens = Lexer::new(src).lex().into_diagnostic()?;
    let mut parser = Parser::new(&tokens);
    parser.parse_expr_eof().into_diagnostic()
}

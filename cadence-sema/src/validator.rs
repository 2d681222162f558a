#![forbid(unsafe_code)]

use cadence_ast::Declaration;

use crate::config::CheckerConfig;
use crate::error::CheckError;
use crate::kinds::DeclarationKind;

/// Kind a declaration is classified as for the top-level restriction.
pub fn declaration_kind(declaration: &Declaration) -> DeclarationKind {
    match declaration {
        Declaration::Import(_) => DeclarationKind::Import,
        Declaration::Variable(v) if v.is_constant => DeclarationKind::Constant,
        Declaration::Variable(_) => DeclarationKind::Variable,
        Declaration::Function(_) => DeclarationKind::Function,
        Declaration::Composite(c) => DeclarationKind::for_composite(c.kind),
        Declaration::Interface(i) => DeclarationKind::for_interface(i.kind),
        Declaration::Event(_) => DeclarationKind::Event,
        Declaration::Transaction(_) => DeclarationKind::Transaction,
    }
}

/// One `InvalidTopLevelDeclaration` per declaration whose kind the
/// configuration does not allow at the top level.
pub fn validate_top_level(declarations: &[Declaration], config: &CheckerConfig) -> Vec<CheckError> {
    declarations
        .iter()
        .filter_map(|declaration| {
            let kind = declaration_kind(declaration);
            if config.is_top_level_allowed(kind) {
                return None;
            }
            Some(CheckError::InvalidTopLevelDeclaration {
                kind,
                span: declaration.span(),
            })
        })
        .collect()
}

#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::kinds::DeclarationKind;

/// How composite members without an explicit access modifier are treated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessCheckMode {
    /// Every composite member must carry a modifier.
    Strict,
    /// A missing modifier means private.
    NotSpecifiedRestricted,
    /// A missing modifier means public.
    #[default]
    NotSpecifiedUnrestricted,
    /// Access modifiers are not checked at all.
    None,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CheckerConfig {
    /// Kinds allowed at the top level of the program; `None` allows all.
    pub allowed_top_level_declarations: Option<BTreeSet<DeclarationKind>>,
    pub access_check_mode: AccessCheckMode,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    checker: Option<CheckerSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct CheckerSection {
    #[serde(default)]
    allowed_top_level_declarations: Option<Vec<DeclarationKind>>,
    #[serde(default)]
    access_check_mode: AccessCheckMode,
}

impl CheckerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_valid_top_level_declarations(
        mut self,
        kinds: impl IntoIterator<Item = DeclarationKind>,
    ) -> Self {
        self.allowed_top_level_declarations = Some(kinds.into_iter().collect());
        self
    }

    pub fn with_access_check_mode(mut self, mode: AccessCheckMode) -> Self {
        self.access_check_mode = mode;
        self
    }

    /// Load from a TOML document with an optional `[checker]` table:
    ///
    /// ```toml
    /// [checker]
    /// allowed-top-level-declarations = ["import", "contract", "contract-interface"]
    /// access-check-mode = "strict"
    /// ```
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let parsed: ConfigFile = toml::from_str(raw).map_err(|e| ConfigError {
            message: e.to_string(),
        })?;
        let section = parsed.checker.unwrap_or_default();
        Ok(Self {
            allowed_top_level_declarations: section
                .allowed_top_level_declarations
                .map(|kinds| kinds.into_iter().collect()),
            access_check_mode: section.access_check_mode,
        })
    }

    pub fn is_top_level_allowed(&self, kind: DeclarationKind) -> bool {
        self.allowed_top_level_declarations
            .as_ref()
            .is_none_or(|allowed| allowed.contains(&kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_checker_table() {
        let config = CheckerConfig::from_toml_str(
            r#"
            [checker]
            allowed-top-level-declarations = ["import", "contract"]
            access-check-mode = "not-specified-restricted"
            "#,
        )
        .expect("config");
        assert_eq!(
            config,
            CheckerConfig::new()
                .with_valid_top_level_declarations([
                    DeclarationKind::Import,
                    DeclarationKind::Contract
                ])
                .with_access_check_mode(AccessCheckMode::NotSpecifiedRestricted)
        );
        assert!(!config.is_top_level_allowed(DeclarationKind::Function));
    }

    #[test]
    fn empty_document_is_unrestricted() {
        let config = CheckerConfig::from_toml_str("").expect("config");
        assert_eq!(config, CheckerConfig::default());
        assert!(config.is_top_level_allowed(DeclarationKind::Transaction));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = CheckerConfig::from_toml_str("[checker]\nstrictness = 3").unwrap_err();
        assert!(err.to_string().contains("invalid checker configuration"));
    }
}

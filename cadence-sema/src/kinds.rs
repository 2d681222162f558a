#![forbid(unsafe_code)]

use std::fmt;

use cadence_ast::CompositeKind;
use serde::{Deserialize, Serialize};

/// What a name was declared as. Used for redeclaration and
/// not-declared diagnostics and for the top-level restriction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeclarationKind {
    Value,
    Function,
    Constant,
    Variable,
    Parameter,
    SelfBinding,
    Type,
    Structure,
    Resource,
    Contract,
    Event,
    StructureInterface,
    ResourceInterface,
    ContractInterface,
    Field,
    Initializer,
    Destructor,
    Import,
    Transaction,
    Prepare,
    Execute,
}

impl DeclarationKind {
    pub fn for_composite(kind: CompositeKind) -> Self {
        match kind {
            CompositeKind::Structure => DeclarationKind::Structure,
            CompositeKind::Resource => DeclarationKind::Resource,
            CompositeKind::Contract => DeclarationKind::Contract,
            CompositeKind::Event => DeclarationKind::Event,
        }
    }

    pub fn for_interface(kind: CompositeKind) -> Self {
        match kind {
            CompositeKind::Structure | CompositeKind::Event => DeclarationKind::StructureInterface,
            CompositeKind::Resource => DeclarationKind::ResourceInterface,
            CompositeKind::Contract => DeclarationKind::ContractInterface,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DeclarationKind::Value => "value",
            DeclarationKind::Function => "function",
            DeclarationKind::Constant => "constant",
            DeclarationKind::Variable => "variable",
            DeclarationKind::Parameter => "parameter",
            DeclarationKind::SelfBinding => "self",
            DeclarationKind::Type => "type",
            DeclarationKind::Structure => "structure",
            DeclarationKind::Resource => "resource",
            DeclarationKind::Contract => "contract",
            DeclarationKind::Event => "event",
            DeclarationKind::StructureInterface => "structure interface",
            DeclarationKind::ResourceInterface => "resource interface",
            DeclarationKind::ContractInterface => "contract interface",
            DeclarationKind::Field => "field",
            DeclarationKind::Initializer => "initializer",
            DeclarationKind::Destructor => "destructor",
            DeclarationKind::Import => "import",
            DeclarationKind::Transaction => "transaction",
            DeclarationKind::Prepare => "prepare",
            DeclarationKind::Execute => "execute",
        }
    }

    /// Bindings that own their value and take part in resource tracking.
    pub fn is_owning_binding(&self) -> bool {
        matches!(
            self,
            DeclarationKind::Constant | DeclarationKind::Variable | DeclarationKind::Parameter
        )
    }
}

impl fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_deserialize_from_kebab_case() {
        #[derive(Deserialize)]
        struct Wrapper {
            kinds: Vec<DeclarationKind>,
        }
        let w: Wrapper =
            toml::from_str(r#"kinds = ["contract-interface", "import", "resource"]"#).unwrap();
        assert_eq!(
            w.kinds,
            vec![
                DeclarationKind::ContractInterface,
                DeclarationKind::Import,
                DeclarationKind::Resource
            ]
        );
    }
}

#![forbid(unsafe_code)]

use cadence_ast::{Access, CompositeKind, Span};
use indexmap::IndexMap;

use crate::types::{CompositeId, FunctionParameter, FunctionType, InterfaceId, Type};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemberKind {
    Field,
    Function,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Member {
    pub identifier: String,
    pub kind: MemberKind,
    pub access: Access,
    /// `let` fields are only assignable inside an initializer.
    pub is_constant: bool,
    pub ty: Type,
    pub span: Option<Span>,
}

impl Member {
    pub fn field(identifier: &str, access: Access, is_constant: bool, ty: Type) -> Self {
        Self {
            identifier: identifier.to_string(),
            kind: MemberKind::Field,
            access,
            is_constant,
            ty,
            span: None,
        }
    }

    pub fn function_type(&self) -> Option<&FunctionType> {
        match (&self.kind, &self.ty) {
            (MemberKind::Function, Type::Function(f)) => Some(f),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompositeType {
    pub kind: CompositeKind,
    pub identifier: String,
    /// `C.R` for a type nested in contract `C`.
    pub qualified_identifier: String,
    pub members: IndexMap<String, Member>,
    pub conformances: Vec<InterfaceId>,
    pub initializer: Option<Vec<FunctionParameter>>,
    pub nested_types: IndexMap<String, Type>,
    pub containing_contract: Option<CompositeId>,
    pub has_destructor: bool,
    pub span: Option<Span>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct InterfaceType {
    pub kind: CompositeKind,
    pub identifier: String,
    pub qualified_identifier: String,
    pub members: IndexMap<String, Member>,
    pub initializer: Option<Vec<FunctionParameter>>,
    pub containing_contract: Option<CompositeId>,
    pub span: Option<Span>,
}

/// Arena owning every composite and interface type of one checker run.
/// `Type` values refer into it by id.
#[derive(Clone, Debug, PartialEq)]
pub struct TypeRegistry {
    composites: Vec<CompositeType>,
    interfaces: Vec<InterfaceType>,
    auth_account: CompositeId,
    public_account: CompositeId,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            composites: Vec::new(),
            interfaces: Vec::new(),
            auth_account: CompositeId {
                index: 0,
                kind: CompositeKind::Structure,
            },
            public_account: CompositeId {
                index: 0,
                kind: CompositeKind::Structure,
            },
        };
        registry.auth_account = registry.add_builtin_account("AuthAccount");
        registry.public_account = registry.add_builtin_account("PublicAccount");
        registry
    }

    fn add_builtin_account(&mut self, name: &str) -> CompositeId {
        let id = self.add_composite(CompositeKind::Structure, name, name.to_string(), None);
        let address = Member::field("address", Access::Public, true, Type::Address);
        self.composite_mut(id)
            .members
            .insert(address.identifier.clone(), address);
        id
    }

    pub fn auth_account(&self) -> CompositeId {
        self.auth_account
    }

    pub fn public_account(&self) -> CompositeId {
        self.public_account
    }

    pub fn add_composite(
        &mut self,
        kind: CompositeKind,
        identifier: &str,
        qualified_identifier: String,
        containing_contract: Option<CompositeId>,
    ) -> CompositeId {
        let id = CompositeId {
            index: self.composites.len() as u32,
            kind,
        };
        self.composites.push(CompositeType {
            kind,
            identifier: identifier.to_string(),
            qualified_identifier,
            members: IndexMap::new(),
            conformances: Vec::new(),
            initializer: None,
            nested_types: IndexMap::new(),
            containing_contract,
            has_destructor: false,
            span: None,
        });
        id
    }

    pub fn add_interface(
        &mut self,
        kind: CompositeKind,
        identifier: &str,
        qualified_identifier: String,
        containing_contract: Option<CompositeId>,
    ) -> InterfaceId {
        let id = InterfaceId {
            index: self.interfaces.len() as u32,
            kind,
        };
        self.interfaces.push(InterfaceType {
            kind,
            identifier: identifier.to_string(),
            qualified_identifier,
            members: IndexMap::new(),
            initializer: None,
            containing_contract,
            span: None,
        });
        id
    }

    pub fn composite(&self, id: CompositeId) -> &CompositeType {
        &self.composites[id.index as usize]
    }

    pub fn composite_mut(&mut self, id: CompositeId) -> &mut CompositeType {
        &mut self.composites[id.index as usize]
    }

    pub fn interface(&self, id: InterfaceId) -> &InterfaceType {
        &self.interfaces[id.index as usize]
    }

    pub fn interface_mut(&mut self, id: InterfaceId) -> &mut InterfaceType {
        &mut self.interfaces[id.index as usize]
    }

    pub fn composites(&self) -> impl Iterator<Item = (CompositeId, &CompositeType)> {
        self.composites.iter().enumerate().map(|(i, c)| {
            (
                CompositeId {
                    index: i as u32,
                    kind: c.kind,
                },
                c,
            )
        })
    }

    pub fn find_composite(&self, qualified_identifier: &str) -> Option<CompositeId> {
        self.composites()
            .find(|(_, c)| c.qualified_identifier == qualified_identifier)
            .map(|(id, _)| id)
    }

    pub fn span(&self, ty: &Type) -> Option<Span> {
        match ty {
            Type::Composite(id) => self.composite(*id).span,
            Type::Interface(id) => self.interface(*id).span,
            _ => None,
        }
    }

    /// Declared members of a composite or interface type.
    pub fn members(&self, ty: &Type) -> Option<&IndexMap<String, Member>> {
        match ty {
            Type::Composite(id) => Some(&self.composite(*id).members),
            Type::Interface(id) => Some(&self.interface(*id).members),
            _ => None,
        }
    }

    pub fn members_mut(&mut self, ty: &Type) -> Option<&mut IndexMap<String, Member>> {
        match ty {
            Type::Composite(id) => Some(&mut self.composite_mut(*id).members),
            Type::Interface(id) => Some(&mut self.interface_mut(*id).members),
            _ => None,
        }
    }

    /// Contract a member owner belongs to: the contract itself or its container.
    pub fn enclosing_contract(&self, ty: &Type) -> Option<CompositeId> {
        match ty {
            Type::Composite(id) if id.kind == CompositeKind::Contract => Some(*id),
            Type::Composite(id) => self.composite(*id).containing_contract,
            Type::Interface(id) => self.interface(*id).containing_contract,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_accounts_expose_address() {
        let registry = TypeRegistry::new();
        let auth = registry.composite(registry.auth_account());
        assert_eq!(auth.identifier, "AuthAccount");
        assert_eq!(auth.members["address"].ty, Type::Address);
        assert_eq!(
            registry.find_composite("PublicAccount"),
            Some(registry.public_account())
        );
    }

    #[test]
    fn nested_types_report_their_contract() {
        let mut registry = TypeRegistry::new();
        let c = registry.add_composite(CompositeKind::Contract, "C", "C".into(), None);
        let r = registry.add_composite(CompositeKind::Resource, "R", "C.R".into(), Some(c));
        assert_eq!(registry.enclosing_contract(&Type::Composite(r)), Some(c));
        assert_eq!(registry.enclosing_contract(&Type::Composite(c)), Some(c));
        assert_eq!(Type::Composite(r).display(&registry), "C.R");
    }
}

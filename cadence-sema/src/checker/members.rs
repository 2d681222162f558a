#![forbid(unsafe_code)]

use cadence_ast::{Access, Expr, ExprKind, Ident, Span};

use super::Checker;
use crate::composite::{Member, MemberKind};
use crate::config::AccessCheckMode;
use crate::error::CheckError;
use crate::types::{FunctionParameter, Type};

fn field(identifier: &str, ty: Type) -> Member {
    Member::field(identifier, Access::Public, true, ty)
}

fn function(identifier: &str, parameters: Vec<FunctionParameter>, return_type: Type) -> Member {
    Member {
        identifier: identifier.to_string(),
        kind: MemberKind::Function,
        access: Access::Public,
        is_constant: true,
        ty: Type::function(parameters, return_type),
        span: None,
    }
}

/// Members every array, dictionary and string value has.
pub(crate) fn builtin_member(ty: &Type, name: &str) -> Option<Member> {
    let unlabelled = FunctionParameter::unlabelled;
    let labelled = FunctionParameter::labelled;
    match ty {
        Type::VariableArray(element) => {
            let element = (**element).clone();
            let copyable = !element.is_resource();
            match name {
                "length" => Some(field(name, Type::INT)),
                "append" => Some(function(name, vec![unlabelled(element)], Type::Void)),
                "insert" => Some(function(
                    name,
                    vec![labelled("at", Type::INT), unlabelled(element)],
                    Type::Void,
                )),
                "remove" => Some(function(name, vec![labelled("at", Type::INT)], element)),
                "removeFirst" | "removeLast" => Some(function(name, Vec::new(), element)),
                "contains" if copyable => {
                    Some(function(name, vec![unlabelled(element)], Type::Bool))
                }
                "concat" if copyable => Some(function(
                    name,
                    vec![unlabelled(ty.clone())],
                    ty.clone(),
                )),
                _ => None,
            }
        }
        Type::ConstantArray(element, _) => match name {
            "length" => Some(field(name, Type::INT)),
            "contains" if !element.is_resource() => Some(function(
                name,
                vec![unlabelled((**element).clone())],
                Type::Bool,
            )),
            _ => None,
        },
        Type::Dictionary(key, value) => {
            let (key, value) = ((**key).clone(), (**value).clone());
            match name {
                "length" => Some(field(name, Type::INT)),
                "keys" => Some(field(name, Type::array(key))),
                "values" if !value.is_resource() => Some(field(name, Type::array(value))),
                "insert" => Some(function(
                    name,
                    vec![labelled("key", key), unlabelled(value.clone())],
                    Type::optional(value),
                )),
                "remove" => Some(function(
                    name,
                    vec![labelled("key", key)],
                    Type::optional(value),
                )),
                _ => None,
            }
        }
        Type::String => match name {
            "length" => Some(field(name, Type::INT)),
            "concat" => Some(function(name, vec![unlabelled(Type::String)], Type::String)),
            "slice" => Some(function(
                name,
                vec![labelled("from", Type::INT), labelled("upTo", Type::INT)],
                Type::String,
            )),
            _ => None,
        },
        _ => None,
    }
}

impl Checker {
    /// Declared or built-in member of `base`. Unknown members are reported;
    /// invalid bases resolve to nothing silently.
    pub(super) fn resolve_member(&mut self, base: &Type, member: &Ident) -> Option<Member> {
        if base.is_invalid() {
            return None;
        }
        let found = match self.registry.members(base) {
            Some(members) => members.get(&member.node).cloned(),
            None => builtin_member(base, &member.node),
        };
        if found.is_none() {
            let error = CheckError::NotDeclaredMember {
                name: member.node.clone(),
                ty: self.display(base),
                span: member.span,
            };
            self.report(error);
        }
        found
    }

    /// `base.member` as a value.
    pub(super) fn check_member_expr(&mut self, base: &Expr, member: &Ident) -> Type {
        let base_ty = self.check_expr(base, None);
        let Some(resolved) = self.resolve_member(&base_ty, member) else {
            return Type::Invalid;
        };
        self.check_read_access(&resolved, &base_ty, member.span);
        resolved.ty
    }

    /// `base.member` on the left of an assignment.
    pub(super) fn check_member_target(&mut self, base: &Expr, member: &Ident) -> Type {
        let base_ty = self.check_expr(base, None);
        let Some(resolved) = self.resolve_member(&base_ty, member) else {
            return Type::Invalid;
        };
        let declared = self.registry.members(&base_ty).is_some();
        let is_constant = !declared
            || resolved.kind == MemberKind::Function
            || (resolved.is_constant && !self.is_initializing(base, &base_ty));
        if is_constant {
            self.report(CheckError::AssignmentToConstantMember {
                name: member.node.clone(),
                span: member.span,
            });
        } else if !self.can_write(&resolved, &base_ty) {
            self.report(CheckError::InvalidAssignmentAccess {
                name: member.node.clone(),
                span: member.span,
            });
        }
        resolved.ty
    }

    /// Inside an initializer of `owner`, writing through `self`.
    pub(super) fn is_initializing(&self, base: &Expr, owner: &Type) -> bool {
        let Some(function) = self.current_function() else {
            return false;
        };
        function.kind.initializes_fields()
            && matches!(&base.kind, ExprKind::Ident(name) if name.node == "self")
            && function.owner.as_ref() == Some(owner)
    }

    fn effective_access(&self, access: Access) -> Access {
        match (access, self.config.access_check_mode) {
            (Access::NotSpecified, AccessCheckMode::NotSpecifiedUnrestricted) => Access::Public,
            (Access::NotSpecified, _) => Access::Private,
            (access, _) => access,
        }
    }

    fn check_read_access(&mut self, member: &Member, owner: &Type, span: Span) {
        if self.config.access_check_mode == AccessCheckMode::None {
            return;
        }
        let denied = match self.effective_access(member.access) {
            Access::Private if !self.composites.contains(owner) => Some("private"),
            Access::Contract if !self.within_contract_of(owner) => Some("contract"),
            _ => None,
        };
        if let Some(access) = denied {
            self.report(CheckError::InvalidAccess {
                name: member.identifier.clone(),
                access,
                span,
            });
        }
    }

    fn within_contract_of(&self, owner: &Type) -> bool {
        let Some(contract) = self.registry.enclosing_contract(owner) else {
            return self.composites.contains(owner);
        };
        self.composites
            .iter()
            .any(|c| self.registry.enclosing_contract(c) == Some(contract))
    }

    fn can_write(&self, member: &Member, owner: &Type) -> bool {
        match self.config.access_check_mode {
            AccessCheckMode::None => true,
            AccessCheckMode::NotSpecifiedUnrestricted if member.access == Access::NotSpecified => {
                true
            }
            _ => member.access == Access::PublicSettable || self.composites.contains(owner),
        }
    }
}

#![forbid(unsafe_code)]

use crate::composite::{Member, MemberKind, TypeRegistry};
use crate::types::{CompositeId, FunctionParameter, FunctionType, InterfaceId, Type};

/// `sub <: sup`. `Invalid` on either side is accepted so that a failed
/// check does not produce follow-up mismatches.
pub fn is_subtype(registry: &TypeRegistry, sub: &Type, sup: &Type) -> bool {
    if sub == sup {
        return true;
    }
    match (sub, sup) {
        (Type::Invalid, _) | (_, Type::Invalid) => true,
        (Type::Never, _) => true,
        (_, Type::AnyStruct) => !sub.is_resource() && !matches!(sub, Type::Void),
        (_, Type::AnyResource) => sub.is_resource(),
        (Type::Optional(sub), Type::Optional(sup)) => is_subtype(registry, sub, sup),
        (_, Type::Optional(sup)) => is_subtype(registry, sub, sup),
        (Type::VariableArray(sub), Type::VariableArray(sup)) => is_subtype(registry, sub, sup),
        (Type::ConstantArray(sub, n), Type::ConstantArray(sup, m)) => {
            n == m && is_subtype(registry, sub, sup)
        }
        (Type::Dictionary(sub_key, sub_value), Type::Dictionary(sup_key, sup_value)) => {
            is_subtype(registry, sub_key, sup_key) && is_subtype(registry, sub_value, sup_value)
        }
        (Type::Function(sub), Type::Function(sup)) => is_function_subtype(registry, sub, sup),
        (Type::Composite(c), Type::Interface(i)) => registry.composite(*c).conformances.contains(i),
        _ => false,
    }
}

fn is_function_subtype(registry: &TypeRegistry, sub: &FunctionType, sup: &FunctionType) -> bool {
    sub.parameters.len() == sup.parameters.len()
        && sub
            .parameters
            .iter()
            .zip(&sup.parameters)
            .all(|(a, b)| is_subtype(registry, &b.ty, &a.ty))
        && is_subtype(registry, &sub.return_type, &sup.return_type)
}

/// Smallest type both `a` and `b` convert to, if any. Mixing resource
/// and non-resource types has no common supertype.
pub fn least_common_supertype(registry: &TypeRegistry, a: &Type, b: &Type) -> Option<Type> {
    if is_subtype(registry, a, b) {
        return Some(b.clone());
    }
    if is_subtype(registry, b, a) {
        return Some(a.clone());
    }
    match (a, b) {
        (Type::Optional(inner), other) | (other, Type::Optional(inner)) => {
            let other = match other {
                Type::Optional(o) => o.as_ref(),
                o => o,
            };
            least_common_supertype(registry, inner, other).map(Type::optional)
        }
        _ => match (a.is_resource(), b.is_resource()) {
            (true, true) => Some(Type::AnyResource),
            (false, false) if !matches!(a, Type::Void) && !matches!(b, Type::Void) => {
                Some(Type::AnyStruct)
            }
            _ => None,
        },
    }
}

/// Outcome of comparing a composite against one declared conformance.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConformanceReport {
    pub missing: Vec<String>,
    pub mismatched: Vec<String>,
}

impl ConformanceReport {
    pub fn is_conformant(&self) -> bool {
        self.missing.is_empty() && self.mismatched.is_empty()
    }
}

pub fn is_composite_conformant(
    registry: &TypeRegistry,
    composite: CompositeId,
    interface: InterfaceId,
) -> ConformanceReport {
    let c = registry.composite(composite);
    let i = registry.interface(interface);
    let mut report = ConformanceReport::default();

    if let Some(required) = &i.initializer {
        match &c.initializer {
            None if required.is_empty() => {}
            None => report.missing.push("init".to_string()),
            Some(params) if !parameters_match(params, required) => {
                report.mismatched.push("init".to_string())
            }
            Some(_) => {}
        }
    }

    for (name, required) in &i.members {
        match c.members.get(name) {
            None => report.missing.push(name.clone()),
            Some(member) if !member_matches(member, required) => {
                report.mismatched.push(name.clone())
            }
            Some(_) => {}
        }
    }
    report
}

fn member_matches(member: &Member, required: &Member) -> bool {
    if member.kind != required.kind {
        return false;
    }
    match (member.function_type(), required.function_type()) {
        (Some(have), Some(want)) => {
            parameters_match(&have.parameters, &want.parameters)
                && have.return_type == want.return_type
        }
        _ => {
            // a `var` requirement cannot be met by a `let` field
            member.kind == MemberKind::Field
                && member.ty == required.ty
                && (required.is_constant || !member.is_constant)
        }
    }
}

fn parameters_match(have: &[FunctionParameter], want: &[FunctionParameter]) -> bool {
    have.len() == want.len()
        && have
            .iter()
            .zip(want)
            .all(|(a, b)| a.label == b.label && a.ty == b.ty)
}

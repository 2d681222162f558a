#![forbid(unsafe_code)]

use cadence_ast::CompositeKind;

use crate::composite::TypeRegistry;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IntegerType {
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Word8,
    Word16,
    Word32,
    Word64,
}

impl IntegerType {
    pub const ALL: [IntegerType; 14] = [
        IntegerType::Int,
        IntegerType::Int8,
        IntegerType::Int16,
        IntegerType::Int32,
        IntegerType::Int64,
        IntegerType::UInt,
        IntegerType::UInt8,
        IntegerType::UInt16,
        IntegerType::UInt32,
        IntegerType::UInt64,
        IntegerType::Word8,
        IntegerType::Word16,
        IntegerType::Word32,
        IntegerType::Word64,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            IntegerType::Int => "Int",
            IntegerType::Int8 => "Int8",
            IntegerType::Int16 => "Int16",
            IntegerType::Int32 => "Int32",
            IntegerType::Int64 => "Int64",
            IntegerType::UInt => "UInt",
            IntegerType::UInt8 => "UInt8",
            IntegerType::UInt16 => "UInt16",
            IntegerType::UInt32 => "UInt32",
            IntegerType::UInt64 => "UInt64",
            IntegerType::Word8 => "Word8",
            IntegerType::Word16 => "Word16",
            IntegerType::Word32 => "Word32",
            IntegerType::Word64 => "Word64",
        }
    }

    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            IntegerType::Int
                | IntegerType::Int8
                | IntegerType::Int16
                | IntegerType::Int32
                | IntegerType::Int64
        )
    }

    /// Inclusive bounds; `None` means unbounded in that direction.
    pub fn bounds(&self) -> (Option<i128>, Option<i128>) {
        match self {
            IntegerType::Int => (None, None),
            IntegerType::Int8 => (Some(i8::MIN.into()), Some(i8::MAX.into())),
            IntegerType::Int16 => (Some(i16::MIN.into()), Some(i16::MAX.into())),
            IntegerType::Int32 => (Some(i32::MIN.into()), Some(i32::MAX.into())),
            IntegerType::Int64 => (Some(i64::MIN.into()), Some(i64::MAX.into())),
            IntegerType::UInt => (Some(0), None),
            IntegerType::UInt8 | IntegerType::Word8 => (Some(0), Some(u8::MAX.into())),
            IntegerType::UInt16 | IntegerType::Word16 => (Some(0), Some(u16::MAX.into())),
            IntegerType::UInt32 | IntegerType::Word32 => (Some(0), Some(u32::MAX.into())),
            IntegerType::UInt64 | IntegerType::Word64 => (Some(0), Some(u64::MAX.into())),
        }
    }

    /// Whether the literal `negative ? -magnitude : magnitude` fits.
    pub fn contains_literal(&self, magnitude: u128, negative: bool) -> bool {
        let (min, max) = self.bounds();
        let Ok(value) = i128::try_from(magnitude) else {
            // Only the unbounded types accept magnitudes beyond i128.
            return match (negative, min, max) {
                (true, None, _) => true,
                (false, _, None) => true,
                _ => false,
            };
        };
        let value = if negative { -value } else { value };
        min.is_none_or(|min| value >= min) && max.is_none_or(|max| value <= max)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionParameter {
    /// Label required at call sites; `None` when the argument is unlabelled.
    pub label: Option<String>,
    pub identifier: String,
    pub ty: Type,
}

impl FunctionParameter {
    pub fn unlabelled(ty: Type) -> Self {
        Self {
            label: None,
            identifier: String::new(),
            ty,
        }
    }

    pub fn labelled(label: &str, ty: Type) -> Self {
        Self {
            label: Some(label.to_string()),
            identifier: label.to_string(),
            ty,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionType {
    pub parameters: Vec<FunctionParameter>,
    pub return_type: Type,
}

impl FunctionType {
    pub fn new(parameters: Vec<FunctionParameter>, return_type: Type) -> Self {
        Self {
            parameters,
            return_type,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompositeId {
    pub(crate) index: u32,
    pub(crate) kind: CompositeKind,
}

impl CompositeId {
    pub fn kind(&self) -> CompositeKind {
        self.kind
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InterfaceId {
    pub(crate) index: u32,
    pub(crate) kind: CompositeKind,
}

impl InterfaceId {
    pub fn kind(&self) -> CompositeKind {
        self.kind
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Type {
    /// Result of a failed check. Compatible with everything so one
    /// root cause produces one diagnostic.
    Invalid,
    Never,
    Void,
    AnyStruct,
    AnyResource,
    Bool,
    String,
    Character,
    Address,
    Integer(IntegerType),
    Optional(Box<Type>),
    VariableArray(Box<Type>),
    ConstantArray(Box<Type>, u64),
    Dictionary(Box<Type>, Box<Type>),
    Function(Box<FunctionType>),
    Composite(CompositeId),
    Interface(InterfaceId),
}

impl Type {
    pub const INT: Type = Type::Integer(IntegerType::Int);

    pub fn optional(inner: Type) -> Type {
        Type::Optional(Box::new(inner))
    }

    pub fn array(element: Type) -> Type {
        Type::VariableArray(Box::new(element))
    }

    pub fn dictionary(key: Type, value: Type) -> Type {
        Type::Dictionary(Box::new(key), Box::new(value))
    }

    pub fn function(parameters: Vec<FunctionParameter>, return_type: Type) -> Type {
        Type::Function(Box::new(FunctionType::new(parameters, return_type)))
    }

    /// Resource-kinded values are linear: moved or destroyed exactly once.
    pub fn is_resource(&self) -> bool {
        match self {
            Type::AnyResource => true,
            Type::Optional(inner) | Type::VariableArray(inner) | Type::ConstantArray(inner, _) => {
                inner.is_resource()
            }
            Type::Dictionary(_, value) => value.is_resource(),
            Type::Composite(id) => id.kind == CompositeKind::Resource,
            Type::Interface(id) => id.kind == CompositeKind::Resource,
            Type::Invalid
            | Type::Never
            | Type::Void
            | Type::AnyStruct
            | Type::Bool
            | Type::String
            | Type::Character
            | Type::Address
            | Type::Integer(_)
            | Type::Function(_) => false,
        }
    }

    /// True if the type is, or contains, the invalid type.
    pub fn is_invalid(&self) -> bool {
        match self {
            Type::Invalid => true,
            Type::Optional(inner) | Type::VariableArray(inner) | Type::ConstantArray(inner, _) => {
                inner.is_invalid()
            }
            Type::Dictionary(key, value) => key.is_invalid() || value.is_invalid(),
            Type::Function(f) => {
                f.return_type.is_invalid() || f.parameters.iter().any(|p| p.ty.is_invalid())
            }
            _ => false,
        }
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, Type::Optional(_))
    }

    pub fn integer(&self) -> Option<IntegerType> {
        match self {
            Type::Integer(t) => Some(*t),
            _ => None,
        }
    }

    /// Types usable as dictionary keys.
    pub fn is_hashable(&self) -> bool {
        matches!(
            self,
            Type::Invalid
                | Type::Bool
                | Type::String
                | Type::Character
                | Type::Address
                | Type::Integer(_)
        )
    }

    pub fn display(&self, registry: &TypeRegistry) -> String {
        match self {
            Type::Invalid => "<<invalid>>".to_string(),
            Type::Never => "Never".to_string(),
            Type::Void => "Void".to_string(),
            Type::AnyStruct => "AnyStruct".to_string(),
            Type::AnyResource => "AnyResource".to_string(),
            Type::Bool => "Bool".to_string(),
            Type::String => "String".to_string(),
            Type::Character => "Character".to_string(),
            Type::Address => "Address".to_string(),
            Type::Integer(t) => t.name().to_string(),
            Type::Optional(inner) => format!("{}?", inner.display(registry)),
            Type::VariableArray(inner) => format!("[{}]", inner.display(registry)),
            Type::ConstantArray(inner, size) => format!("[{}; {size}]", inner.display(registry)),
            Type::Dictionary(key, value) => {
                format!("{{{}: {}}}", key.display(registry), value.display(registry))
            }
            Type::Function(f) => {
                let params = f
                    .parameters
                    .iter()
                    .map(|p| p.ty.display(registry))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("(({params}): {})", f.return_type.display(registry))
            }
            Type::Composite(id) => registry.composite(*id).qualified_identifier.clone(),
            Type::Interface(id) => registry.interface(*id).qualified_identifier.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_kind_propagates_through_containers() {
        let r = Type::Composite(CompositeId {
            index: 0,
            kind: CompositeKind::Resource,
        });
        assert!(r.is_resource());
        assert!(Type::optional(r.clone()).is_resource());
        assert!(Type::array(r.clone()).is_resource());
        assert!(Type::dictionary(Type::String, r.clone()).is_resource());
        assert!(!Type::dictionary(Type::String, Type::INT).is_resource());
        assert!(!Type::function(vec![FunctionParameter::unlabelled(r)], Type::Void).is_resource());
    }

    #[test]
    fn integer_literal_ranges() {
        assert!(IntegerType::Int8.contains_literal(128, true));
        assert!(!IntegerType::Int8.contains_literal(128, false));
        assert!(!IntegerType::UInt8.contains_literal(1, true));
        assert!(IntegerType::UInt64.contains_literal(u64::MAX.into(), false));
        assert!(!IntegerType::UInt64.contains_literal(u128::from(u64::MAX) + 1, false));
        assert!(IntegerType::Int.contains_literal(u128::MAX, true));
        assert!(IntegerType::UInt.contains_literal(u128::MAX, false));
    }
}

#![forbid(unsafe_code)]

use cadence_ast::{Access, Span};
use indexmap::IndexMap;

use crate::composite::TypeRegistry;
use crate::error::CheckError;
use crate::kinds::DeclarationKind;
use crate::types::{IntegerType, Type};

/// Identity of one declared binding. Two bindings with the same name in
/// different frames have different ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(u32);

impl BindingId {
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ValueDeclaration {
    pub name: String,
    pub kind: DeclarationKind,
    pub ty: Type,
    pub is_constant: bool,
    pub access: Access,
    /// `None` for built-ins.
    pub span: Option<Span>,
    pub binding: BindingId,
    /// Number of function frames enclosing the declaration. Globals are 0.
    pub function_depth: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TypeDeclaration {
    pub name: String,
    pub kind: DeclarationKind,
    pub ty: Type,
    pub span: Option<Span>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKind {
    Builtin,
    Global,
    Function,
    Block,
    Composite,
}

#[derive(Clone, Debug)]
pub struct Frame {
    pub kind: FrameKind,
    pub values: IndexMap<String, ValueDeclaration>,
    pub types: IndexMap<String, TypeDeclaration>,
}

impl Frame {
    fn new(kind: FrameKind) -> Self {
        Self {
            kind,
            values: IndexMap::new(),
            types: IndexMap::new(),
        }
    }
}

/// Lexical scope chain. Inner frames shadow outer ones; a frame never
/// writes into its parent.
#[derive(Clone, Debug)]
pub struct Scope {
    frames: Vec<Frame>,
    next_binding: u32,
    function_depth: usize,
}

const PRIMITIVES: [(&str, Type); 9] = [
    ("Never", Type::Never),
    ("Void", Type::Void),
    ("AnyStruct", Type::AnyStruct),
    ("AnyResource", Type::AnyResource),
    ("Bool", Type::Bool),
    ("String", Type::String),
    ("Character", Type::Character),
    ("Address", Type::Address),
    ("Int", Type::INT),
];

impl Scope {
    /// A builtin frame holding the primitive and account types, with an
    /// empty global frame on top.
    pub fn new(registry: &TypeRegistry) -> Self {
        let mut builtin = Frame::new(FrameKind::Builtin);
        let primitives = PRIMITIVES.into_iter().chain(
            IntegerType::ALL
                .into_iter()
                .map(|t| (t.name(), Type::Integer(t))),
        );
        for (name, ty) in primitives {
            builtin.types.insert(
                name.to_string(),
                TypeDeclaration {
                    name: name.to_string(),
                    kind: DeclarationKind::Type,
                    ty,
                    span: None,
                },
            );
        }
        for id in [registry.auth_account(), registry.public_account()] {
            let name = registry.composite(id).identifier.clone();
            builtin.types.insert(
                name.clone(),
                TypeDeclaration {
                    name,
                    kind: DeclarationKind::Structure,
                    ty: Type::Composite(id),
                    span: None,
                },
            );
        }
        Self {
            frames: vec![builtin, Frame::new(FrameKind::Global)],
            next_binding: 0,
            function_depth: 0,
        }
    }

    pub fn push(&mut self, kind: FrameKind) {
        if kind == FrameKind::Function {
            self.function_depth += 1;
        }
        self.frames.push(Frame::new(kind));
    }

    pub fn pop(&mut self) -> Option<Frame> {
        if self.frames.len() <= 2 {
            return None;
        }
        let frame = self.frames.pop()?;
        if frame.kind == FrameKind::Function {
            self.function_depth -= 1;
        }
        Some(frame)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn function_depth(&self) -> usize {
        self.function_depth
    }

    pub fn globals(&self) -> &Frame {
        &self.frames[1]
    }

    pub fn declare_value(
        &mut self,
        name: &str,
        kind: DeclarationKind,
        ty: Type,
        is_constant: bool,
        access: Access,
        span: Span,
    ) -> Result<ValueDeclaration, CheckError> {
        let function_depth = self.function_depth;
        let binding = BindingId(self.next_binding);
        let frame = self.top_mut();
        if let Some(previous) = frame.values.get(name) {
            return Err(CheckError::Redeclaration {
                name: name.to_string(),
                kind,
                span,
                previous: previous.span,
            });
        }
        let declaration = ValueDeclaration {
            name: name.to_string(),
            kind,
            ty,
            is_constant,
            access,
            span: Some(span),
            binding,
            function_depth,
        };
        frame.values.insert(name.to_string(), declaration.clone());
        self.next_binding += 1;
        Ok(declaration)
    }

    pub fn declare_type(
        &mut self,
        name: &str,
        kind: DeclarationKind,
        ty: Type,
        span: Span,
    ) -> Result<(), CheckError> {
        let frame = self.top_mut();
        if let Some(previous) = frame.types.get(name) {
            return Err(CheckError::Redeclaration {
                name: name.to_string(),
                kind,
                span,
                previous: previous.span,
            });
        }
        frame.types.insert(
            name.to_string(),
            TypeDeclaration {
                name: name.to_string(),
                kind,
                ty,
                span: Some(span),
            },
        );
        Ok(())
    }

    pub fn lookup_value(&self, name: &str) -> Option<&ValueDeclaration> {
        self.frames.iter().rev().find_map(|f| f.values.get(name))
    }

    pub fn resolve_value(&self, name: &str, span: Span) -> Result<&ValueDeclaration, CheckError> {
        self.lookup_value(name).ok_or_else(|| CheckError::NotDeclared {
            name: name.to_string(),
            expected_kind: DeclarationKind::Variable,
            span,
        })
    }

    pub fn lookup_type(&self, name: &str) -> Option<&TypeDeclaration> {
        self.frames.iter().rev().find_map(|f| f.types.get(name))
    }

    pub fn resolve_type(&self, name: &str, span: Span) -> Result<&TypeDeclaration, CheckError> {
        self.lookup_type(name).ok_or_else(|| CheckError::NotDeclared {
            name: name.to_string(),
            expected_kind: DeclarationKind::Type,
            span,
        })
    }

    /// Value declarations in frames at index `from` and above.
    pub fn values_from(&self, from: usize) -> impl Iterator<Item = &ValueDeclaration> {
        self.frames
            .iter()
            .skip(from)
            .flat_map(|f| f.values.values())
    }

    fn top_mut(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_ast::span;

    fn declare(scope: &mut Scope, name: &str, at: usize) -> Result<ValueDeclaration, CheckError> {
        scope.declare_value(
            name,
            DeclarationKind::Constant,
            Type::INT,
            true,
            Access::NotSpecified,
            span(at, name.len()),
        )
    }

    #[test]
    fn redeclaration_in_same_frame_points_at_previous() {
        let mut scope = Scope::new(&TypeRegistry::new());
        declare(&mut scope, "x", 4).expect("first declaration");
        let err = declare(&mut scope, "x", 20).unwrap_err();
        assert_eq!(
            err,
            CheckError::Redeclaration {
                name: "x".into(),
                kind: DeclarationKind::Constant,
                span: span(20, 1),
                previous: Some(span(4, 1)),
            }
        );
    }

    #[test]
    fn inner_frames_shadow_and_pop_cleanly() {
        let mut scope = Scope::new(&TypeRegistry::new());
        let outer = declare(&mut scope, "x", 0).expect("outer");
        scope.push(FrameKind::Function);
        let inner = declare(&mut scope, "x", 10).expect("shadowing is allowed");
        assert_ne!(outer.binding, inner.binding);
        assert_eq!(inner.function_depth, 1);
        assert_eq!(scope.lookup_value("x").map(|d| d.binding), Some(inner.binding));

        scope.pop();
        assert_eq!(scope.function_depth(), 0);
        assert_eq!(scope.lookup_value("x").map(|d| d.binding), Some(outer.binding));
    }

    #[test]
    fn missing_names_report_expected_kind() {
        let scope = Scope::new(&TypeRegistry::new());
        assert!(matches!(
            scope.resolve_value("y", span(0, 1)),
            Err(CheckError::NotDeclared { expected_kind: DeclarationKind::Variable, .. })
        ));
        assert!(matches!(
            scope.resolve_type("X", span(0, 1)),
            Err(CheckError::NotDeclared { expected_kind: DeclarationKind::Type, .. })
        ));
        assert!(scope.resolve_type("UInt64", span(0, 1)).is_ok());
        assert!(scope.resolve_type("AuthAccount", span(0, 1)).is_ok());
    }

    #[test]
    fn global_frame_cannot_be_popped() {
        let mut scope = Scope::new(&TypeRegistry::new());
        assert!(scope.pop().is_none());
        assert_eq!(scope.depth(), 2);
    }
}

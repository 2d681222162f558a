#![forbid(unsafe_code)]

use std::mem;

use cadence_ast::{Argument, BinOp, CompositeKind, DictionaryEntry, Expr, ExprKind, UnaryOp};

use super::{Checker, FunctionKind};
use crate::error::CheckError;
use crate::kinds::DeclarationKind;
use crate::resources::InvalidationKind;
use crate::scope::ValueDeclaration;
use crate::subtyping::least_common_supertype;
use crate::types::{FunctionType, IntegerType, Type};

/// Syntactic position of a call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum CallContext {
    Plain,
    /// `create R(...)`
    Create,
    /// `emit E(...)`
    Emit,
}

impl Checker {
    /// Type of an expression. `expected` only guides literal typing; the
    /// caller does the subtype check.
    pub(super) fn check_expr(&mut self, expr: &Expr, expected: Option<&Type>) -> Type {
        match &expr.kind {
            ExprKind::Ident(name) => {
                let declaration = match self.scope.resolve_value(&name.node, name.span) {
                    Ok(declaration) => declaration.clone(),
                    Err(error) => {
                        self.report(error);
                        return Type::Invalid;
                    }
                };
                self.check_binding_use(&declaration, expr);
                declaration.ty
            }
            ExprKind::Nil => Type::optional(Type::Never),
            ExprKind::Bool(_) => Type::Bool,
            ExprKind::Int(value) => self.check_integer_literal(*value, false, expected, expr),
            ExprKind::String(value) => match expected {
                Some(Type::Character) if value.chars().count() == 1 => Type::Character,
                _ => Type::String,
            },
            ExprKind::Array(elements) => self.check_array_literal(elements, expected, expr),
            ExprKind::Dictionary(entries) => self.check_dictionary_literal(entries, expected, expr),
            ExprKind::Unary { op, expr: operand } => self.check_unary(*op, operand, expected, expr),
            ExprKind::Binary { left, op, right } => {
                self.check_binary(left, *op, right, expected, expr)
            }
            ExprKind::Conditional {
                test,
                then_expr,
                else_expr,
            } => self.check_conditional(test, then_expr, else_expr, expected),
            ExprKind::Force(inner) => {
                let inner_expected = expected.map(|t| Type::optional(t.clone()));
                let ty = self.check_expr(inner, inner_expected.as_ref());
                match ty {
                    Type::Optional(inner) => *inner,
                    Type::Invalid => Type::Invalid,
                    other => {
                        self.report(CheckError::NonOptionalForceUnwrap {
                            actual: self.display(&other),
                            span: expr.span,
                        });
                        other
                    }
                }
            }
            ExprKind::Member { base, member } => self.check_member_expr(base, member),
            ExprKind::Index { base, index } => {
                let base_ty = self.check_expr(base, None);
                self.check_index(&base_ty, index)
            }
            ExprKind::Call { .. } => self.check_call(expr, CallContext::Plain),
            ExprKind::Create(inner) => {
                if matches!(inner.kind, ExprKind::Call { .. }) {
                    return self.check_call(inner, CallContext::Create);
                }
                let ty = self.check_expr(inner, None);
                if !ty.is_invalid() {
                    self.report(CheckError::InvalidConstruction {
                        ty: self.display(&ty),
                        span: expr.span,
                    });
                }
                Type::Invalid
            }
            ExprKind::Destroy(inner) => {
                let ty = self.check_expr(inner, None);
                if ty.is_resource() {
                    self.invalidate_source(inner, InvalidationKind::Destroy);
                } else if !ty.is_invalid() {
                    self.report(CheckError::InvalidDestruction {
                        actual: self.display(&ty),
                        span: expr.span,
                    });
                }
                Type::Void
            }
        }
    }

    /// A read of a binding: it must still own its resource and must not
    /// be a resource of an enclosing function.
    pub(super) fn check_binding_use(&mut self, declaration: &ValueDeclaration, expr: &Expr) {
        if let Err(invalidation) = self.resources.check_use(declaration.binding) {
            self.report(CheckError::ResourceUseAfterInvalidation {
                name: declaration.name.clone(),
                invalidation: invalidation.kind,
                span: expr.span,
                invalidated_at: invalidation.span,
                in_loop: false,
            });
        }
        if declaration.ty.is_resource()
            && declaration.function_depth > 0
            && declaration.function_depth < self.scope.function_depth()
        {
            self.report(CheckError::ResourceCapturing {
                name: declaration.name.clone(),
                span: expr.span,
            });
        }
    }

    fn check_integer_literal(
        &mut self,
        magnitude: u128,
        negative: bool,
        expected: Option<&Type>,
        expr: &Expr,
    ) -> Type {
        let target = match expected {
            Some(Type::Integer(integer)) => *integer,
            Some(Type::Optional(inner)) => inner.integer().unwrap_or(IntegerType::Int),
            _ => IntegerType::Int,
        };
        if !target.contains_literal(magnitude, negative) {
            self.report(CheckError::InvalidIntegerLiteralRange {
                ty: target.name().to_string(),
                span: expr.span,
            });
        }
        Type::Integer(target)
    }

    fn check_array_literal(
        &mut self,
        elements: &[Expr],
        expected: Option<&Type>,
        expr: &Expr,
    ) -> Type {
        let (element, size) = match expected {
            Some(Type::VariableArray(element)) => ((**element).clone(), None),
            Some(Type::ConstantArray(element, size)) => ((**element).clone(), Some(*size)),
            _ => {
                let mut element_ty = Type::Never;
                for value in elements {
                    let ty = self.check_transferred_value(value, None, InvalidationKind::Move);
                    element_ty = self.join_literal_types(element_ty, ty, value);
                }
                return Type::array(element_ty);
            }
        };

        for value in elements {
            let ty = self.check_transferred_value(value, Some(&element), InvalidationKind::Move);
            self.expect_subtype(&ty, &element, value.span);
        }
        match size {
            Some(size) => {
                if usize::try_from(size).ok() != Some(elements.len()) {
                    self.report(CheckError::ConstantSizedArrayLiteralSize {
                        expected: size,
                        actual: elements.len(),
                        span: expr.span,
                    });
                }
                Type::ConstantArray(Box::new(element), size)
            }
            None => Type::array(element),
        }
    }

    fn check_dictionary_literal(
        &mut self,
        entries: &[DictionaryEntry],
        expected: Option<&Type>,
        expr: &Expr,
    ) -> Type {
        if let Some(Type::Dictionary(key, value)) = expected {
            let (key, value) = ((**key).clone(), (**value).clone());
            for entry in entries {
                let key_ty = self.check_expr(&entry.key, Some(&key));
                self.expect_subtype(&key_ty, &key, entry.key.span);
                let value_ty = self.check_transferred_value(
                    &entry.value,
                    Some(&value),
                    InvalidationKind::Move,
                );
                self.expect_subtype(&value_ty, &value, entry.value.span);
            }
            return Type::dictionary(key, value);
        }

        let mut key_ty = Type::Never;
        let mut value_ty = Type::Never;
        for entry in entries {
            let key = self.check_expr(&entry.key, None);
            key_ty = self.join_literal_types(key_ty, key, &entry.key);
            let value = self.check_transferred_value(&entry.value, None, InvalidationKind::Move);
            value_ty = self.join_literal_types(value_ty, value, &entry.value);
        }
        if !entries.is_empty() && !key_ty.is_hashable() {
            self.report(CheckError::InvalidDictionaryKeyType {
                ty: self.display(&key_ty),
                span: expr.span,
            });
        }
        Type::dictionary(key_ty, value_ty)
    }

    /// Element type of a literal so far, widened by one more element.
    fn join_literal_types(&mut self, so_far: Type, next: Type, at: &Expr) -> Type {
        match least_common_supertype(&self.registry, &so_far, &next) {
            Some(joined) => joined,
            None => {
                self.report(CheckError::TypeMismatch {
                    expected: self.display(&so_far),
                    actual: self.display(&next),
                    span: at.span,
                });
                so_far
            }
        }
    }

    fn check_unary(
        &mut self,
        op: UnaryOp,
        operand: &Expr,
        expected: Option<&Type>,
        expr: &Expr,
    ) -> Type {
        match op {
            UnaryOp::Neg => {
                if let ExprKind::Int(magnitude) = operand.kind {
                    return self.check_integer_literal(magnitude, true, expected, expr);
                }
                let ty = self.check_expr(operand, expected);
                match ty.integer() {
                    Some(integer) if integer.is_signed() => ty,
                    _ if ty.is_invalid() => ty,
                    _ => {
                        self.report(CheckError::InvalidUnaryOperand {
                            op: op.symbol(),
                            actual: self.display(&ty),
                            span: expr.span,
                        });
                        Type::Invalid
                    }
                }
            }
            UnaryOp::Not => {
                let ty = self.check_expr(operand, Some(&Type::Bool));
                if ty != Type::Bool && !ty.is_invalid() {
                    self.report(CheckError::InvalidUnaryOperand {
                        op: op.symbol(),
                        actual: self.display(&ty),
                        span: expr.span,
                    });
                }
                Type::Bool
            }
            UnaryOp::Move => {
                let ty = self.check_expr(operand, expected);
                if ty.is_resource() {
                    self.invalidate_source(operand, InvalidationKind::Move);
                } else if !ty.is_invalid() {
                    self.report(CheckError::InvalidMoveOperation { span: expr.span });
                }
                ty
            }
        }
    }

    fn check_binary(
        &mut self,
        left: &Expr,
        op: BinOp,
        right: &Expr,
        expected: Option<&Type>,
        expr: &Expr,
    ) -> Type {
        match op {
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => {
                let hint = expected.filter(|t| t.integer().is_some());
                let (left_ty, right_ty) = self.check_integer_operands(left, right, hint);
                match self.common_integer(&left_ty, &right_ty) {
                    Some(ty) => ty,
                    None => {
                        self.report_operands(op, &left_ty, &right_ty, expr);
                        Type::Invalid
                    }
                }
            }
            BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => {
                let (left_ty, right_ty) = self.check_integer_operands(left, right, None);
                if self.common_integer(&left_ty, &right_ty).is_none() {
                    self.report_operands(op, &left_ty, &right_ty, expr);
                }
                Type::Bool
            }
            BinOp::Eq | BinOp::Ne => {
                let left_ty = self.check_expr(left, None);
                let right_ty = self.check_expr(right, Some(&left_ty));
                let comparable = !left_ty.is_resource()
                    && !right_ty.is_resource()
                    && (self.is_subtype(&left_ty, &right_ty)
                        || self.is_subtype(&right_ty, &left_ty));
                if !comparable {
                    self.report_operands(op, &left_ty, &right_ty, expr);
                }
                Type::Bool
            }
            BinOp::And | BinOp::Or => {
                let left_ty = self.check_expr(left, Some(&Type::Bool));
                // the right operand may be skipped
                let short_circuit = self.resources.clone();
                let right_ty = self.check_expr(right, Some(&Type::Bool));
                self.resources.merge(&short_circuit);
                let valid = |t: &Type| *t == Type::Bool || t.is_invalid();
                if !valid(&left_ty) || !valid(&right_ty) {
                    self.report_operands(op, &left_ty, &right_ty, expr);
                }
                Type::Bool
            }
            BinOp::NilCoalesce => {
                let expected_left = expected.map(|t| Type::optional(t.clone()));
                let left_ty = self.check_expr(left, expected_left.as_ref());
                let inner = match &left_ty {
                    Type::Optional(inner) if !left_ty.is_resource() => Some((**inner).clone()),
                    _ => None,
                };
                let short_circuit = self.resources.clone();
                let right_ty = self.check_expr(right, inner.as_ref());
                self.resources.merge(&short_circuit);
                let Some(inner) = inner else {
                    self.report_operands(op, &left_ty, &right_ty, expr);
                    return Type::Invalid;
                };
                if right_ty.is_resource() {
                    self.report_operands(op, &left_ty, &right_ty, expr);
                    return Type::Invalid;
                }
                match least_common_supertype(&self.registry, &inner, &right_ty) {
                    Some(ty) => ty,
                    None => {
                        self.report_operands(op, &left_ty, &right_ty, expr);
                        Type::Invalid
                    }
                }
            }
        }
    }

    /// A literal operand adopts the type of the other side.
    fn check_integer_operands(
        &mut self,
        left: &Expr,
        right: &Expr,
        hint: Option<&Type>,
    ) -> (Type, Type) {
        let left_is_literal = matches!(left.kind, ExprKind::Int(_));
        let right_is_literal = matches!(right.kind, ExprKind::Int(_));
        if left_is_literal && !right_is_literal && hint.is_none() {
            let right_ty = self.check_expr(right, None);
            let left_ty = self.check_expr(left, Some(&right_ty));
            return (left_ty, right_ty);
        }
        let left_ty = self.check_expr(left, hint);
        let right_ty = self.check_expr(right, Some(&left_ty));
        (left_ty, right_ty)
    }

    fn common_integer(&self, left: &Type, right: &Type) -> Option<Type> {
        if left.is_invalid() || right.is_invalid() {
            return Some(Type::Invalid);
        }
        match (left.integer(), right.integer()) {
            (Some(l), Some(r)) if l == r => Some(left.clone()),
            _ => None,
        }
    }

    fn report_operands(&mut self, op: BinOp, left: &Type, right: &Type, expr: &Expr) {
        if (left.is_invalid() || right.is_invalid()) && !left.is_resource() && !right.is_resource()
        {
            return;
        }
        self.report(CheckError::InvalidBinaryOperands {
            op: op.symbol(),
            left: self.display(left),
            right: self.display(right),
            span: expr.span,
        });
    }

    fn check_conditional(
        &mut self,
        test: &Expr,
        then_expr: &Expr,
        else_expr: &Expr,
        expected: Option<&Type>,
    ) -> Type {
        let test_ty = self.check_expr(test, Some(&Type::Bool));
        self.expect_subtype(&test_ty, &Type::Bool, test.span);

        let before = self.resources.clone();
        let then_ty = self.check_expr(then_expr, expected);
        let after_then = mem::replace(&mut self.resources, before);
        let else_ty = self.check_expr(else_expr, expected.or(Some(&then_ty)));
        self.resources.merge(&after_then);
        for (ty, branch) in [(&then_ty, then_expr), (&else_ty, else_expr)] {
            if ty.is_resource() {
                self.report(CheckError::InvalidConditionalResourceOperand { span: branch.span });
            }
        }
        match least_common_supertype(&self.registry, &then_ty, &else_ty) {
            Some(ty) => ty,
            None => {
                self.report(CheckError::TypeMismatch {
                    expected: self.display(&then_ty),
                    actual: self.display(&else_ty),
                    span: else_expr.span,
                });
                Type::Invalid
            }
        }
    }

    pub(super) fn check_index(&mut self, base: &Type, index: &Expr) -> Type {
        match base {
            Type::VariableArray(element) | Type::ConstantArray(element, _) => {
                let index_ty = self.check_expr(index, Some(&Type::INT));
                if index_ty.integer().is_none() && !index_ty.is_invalid() {
                    self.report(CheckError::TypeMismatch {
                        expected: "integer".to_string(),
                        actual: self.display(&index_ty),
                        span: index.span,
                    });
                }
                (**element).clone()
            }
            Type::Dictionary(key, value) => {
                let index_ty = self.check_expr(index, Some(key));
                self.expect_subtype(&index_ty, key, index.span);
                Type::optional((**value).clone())
            }
            Type::Invalid => {
                self.check_expr(index, None);
                Type::Invalid
            }
            other => {
                self.check_expr(index, None);
                self.report(CheckError::NotIndexableType {
                    ty: self.display(other),
                    span: index.span,
                });
                Type::Invalid
            }
        }
    }

    /// A value handed over to a new owner: an argument, an element of a
    /// literal or a returned value. Resources must be moved with `<-`.
    pub(super) fn check_transferred_value(
        &mut self,
        expr: &Expr,
        expected: Option<&Type>,
        kind: InvalidationKind,
    ) -> Type {
        if let ExprKind::Unary {
            op: UnaryOp::Move,
            expr: inner,
        } = &expr.kind
        {
            let ty = self.check_expr(inner, expected);
            if ty.is_resource() {
                self.invalidate_source(inner, kind);
            } else if !ty.is_invalid() && !expected.is_some_and(Type::is_resource) {
                self.report(CheckError::InvalidMoveOperation { span: expr.span });
            }
            return ty;
        }

        let ty = self.check_expr(expr, expected);
        if ty.is_resource() {
            self.report(CheckError::MissingMoveOperation { span: expr.span });
            self.invalidate_source(expr, kind);
        }
        ty
    }

    /// The binding or location `expr` reads from no longer owns its resource.
    pub(super) fn invalidate_source(&mut self, expr: &Expr, kind: InvalidationKind) {
        match &expr.kind {
            ExprKind::Ident(name) => {
                let Some(declaration) = self.scope.lookup_value(&name.node).cloned() else {
                    return;
                };
                if declaration.function_depth == 0 && self.scope.function_depth() > 0 {
                    if declaration.ty.is_resource() {
                        self.report(CheckError::ResourceCapturing {
                            name: declaration.name,
                            span: expr.span,
                        });
                    }
                    return;
                }
                // an already invalidated binding was reported when it was read
                let _ = self
                    .resources
                    .record_invalidation(declaration.binding, kind, expr.span);
            }
            ExprKind::Member { base, .. } => {
                let destroys_own_field = kind == InvalidationKind::Destroy
                    && self
                        .current_function()
                        .is_some_and(|f| f.kind == FunctionKind::Destructor)
                    && matches!(&base.kind, ExprKind::Ident(name) if name.node == "self");
                if !destroys_own_field {
                    self.report(CheckError::InvalidNestedMove { span: expr.span });
                }
            }
            ExprKind::Index { .. } => {
                self.report(CheckError::InvalidNestedMove { span: expr.span });
            }
            ExprKind::Force(inner)
            | ExprKind::Unary {
                op: UnaryOp::Move,
                expr: inner,
            } => self.invalidate_source(inner, kind),
            _ => {}
        }
    }

    /// Calls, constructor calls under `create`, and event constructions
    /// under `emit`.
    pub(super) fn check_call(&mut self, expr: &Expr, context: CallContext) -> Type {
        let ExprKind::Call { callee, args } = &expr.kind else {
            return self.check_expr(expr, None);
        };
        let constructor = self.constructor_kind(callee);
        let callee_ty = self.check_expr(callee, None);

        match callee_ty {
            Type::Function(function) => {
                self.check_arguments(&function, args, expr);
                match constructor {
                    Some(kind) => self.check_construction(kind, &function, context, callee, expr),
                    None if context == CallContext::Create => {
                        self.report(CheckError::InvalidConstruction {
                            ty: self.display(&function.return_type),
                            span: expr.span,
                        });
                    }
                    None => {}
                }
                function.return_type
            }
            Type::Invalid => {
                for arg in args {
                    self.check_expr(&arg.value, None);
                }
                Type::Invalid
            }
            other => {
                for arg in args {
                    self.check_expr(&arg.value, None);
                }
                let ty = self.display(&other);
                let error = if context == CallContext::Create {
                    CheckError::InvalidConstruction { ty, span: expr.span }
                } else {
                    CheckError::NotCallable { ty, span: callee.span }
                };
                self.report(error);
                Type::Invalid
            }
        }
    }

    /// Kind of composite a callee constructs, if it names a constructor.
    fn constructor_kind(&self, callee: &Expr) -> Option<CompositeKind> {
        let ExprKind::Ident(name) = &callee.kind else {
            return None;
        };
        match self.scope.lookup_value(&name.node)?.kind {
            DeclarationKind::Structure => Some(CompositeKind::Structure),
            DeclarationKind::Resource => Some(CompositeKind::Resource),
            DeclarationKind::Event => Some(CompositeKind::Event),
            _ => None,
        }
    }

    fn check_construction(
        &mut self,
        kind: CompositeKind,
        function: &FunctionType,
        context: CallContext,
        callee: &Expr,
        expr: &Expr,
    ) {
        let ty = self.display(&function.return_type);
        match (kind, context) {
            (CompositeKind::Resource, CallContext::Create) => {}
            (CompositeKind::Resource, _) => {
                self.report(CheckError::MissingCreate { ty, span: expr.span });
            }
            (_, CallContext::Create) => {
                self.report(CheckError::InvalidConstruction { ty, span: expr.span });
            }
            (CompositeKind::Event, CallContext::Plain) => {
                let name = match &callee.kind {
                    ExprKind::Ident(name) => name.node.clone(),
                    _ => ty,
                };
                self.report(CheckError::InvalidEventUsage {
                    name,
                    span: expr.span,
                });
            }
            _ => {}
        }
    }

    fn check_arguments(&mut self, function: &FunctionType, args: &[Argument], call: &Expr) {
        if function.parameters.len() != args.len() {
            self.report(CheckError::ArgumentCount {
                expected: function.parameters.len(),
                actual: args.len(),
                span: call.span,
            });
        }

        for (index, arg) in args.iter().enumerate() {
            let Some(parameter) = function.parameters.get(index) else {
                self.check_expr(&arg.value, None);
                continue;
            };
            match (&parameter.label, &arg.label) {
                (Some(expected), None) => self.report(CheckError::MissingArgumentLabel {
                    expected: expected.clone(),
                    span: arg.span,
                }),
                (Some(expected), Some(actual)) if *expected != actual.node => {
                    self.report(CheckError::IncorrectArgumentLabel {
                        expected: expected.clone(),
                        actual: actual.node.clone(),
                        span: actual.span,
                    })
                }
                (None, Some(actual)) => self.report(CheckError::IncorrectArgumentLabel {
                    expected: "_".to_string(),
                    actual: actual.node.clone(),
                    span: actual.span,
                }),
                _ => {}
            }
            let ty = self.check_transferred_value(
                &arg.value,
                Some(&parameter.ty),
                InvalidationKind::PassedToFunction,
            );
            self.expect_subtype(&ty, &parameter.ty, arg.value.span);
        }
    }
}

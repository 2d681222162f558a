#![forbid(unsafe_code)]

use std::collections::HashSet;
use std::mem;

use cadence_ast::{
    Access, AssignStmt, Block, CompositeKind, Declaration, ElseBranch, EmitStmt, Expr, ExprKind,
    IfStmt, IfTest, Parameter, ReturnStmt, Span, Stmt, SwapStmt, Transfer, VariableDeclaration,
    WhileStmt,
};
use tracing::trace;

use super::expressions::CallContext;
use super::{Checker, FunctionContext, FunctionKind, Jump, LoopContext};
use crate::diagnostics::CheckWarning;
use crate::error::CheckError;
use crate::kinds::DeclarationKind;
use crate::resources::InvalidationKind;
use crate::scope::FrameKind;
use crate::types::{FunctionType, Type};
use crate::validator::declaration_kind;

impl Checker {
    /// Check a function, initializer, destructor, `prepare` or `execute`
    /// body. Parameters and body-level locals share one frame; the body
    /// starts from an empty resource state.
    pub(super) fn check_function_body(
        &mut self,
        params: &[Parameter],
        signature: &FunctionType,
        body: &Block,
        kind: FunctionKind,
        owner: Option<Type>,
        span: Span,
    ) {
        trace!(?kind, "checking function body");
        let frame = self.scope.depth();
        self.scope.push(FrameKind::Function);
        let outer = mem::take(&mut self.resources);

        if let Some(owner) = &owner {
            if let Err(error) = self.scope.declare_value(
                "self",
                DeclarationKind::SelfBinding,
                owner.clone(),
                true,
                Access::NotSpecified,
                span,
            ) {
                self.report(error);
            }
        }
        for (param, parameter) in params.iter().zip(&signature.parameters) {
            match self.scope.declare_value(
                &param.name.node,
                DeclarationKind::Parameter,
                parameter.ty.clone(),
                true,
                Access::NotSpecified,
                param.name.span,
            ) {
                Ok(declaration) if parameter.ty.is_resource() => {
                    self.resources.track(declaration.binding, &declaration.name);
                }
                Ok(_) => {}
                Err(error) => self.report(error),
            }
        }

        self.functions.push(FunctionContext {
            kind,
            return_type: signature.return_type.clone(),
            frame,
            loops: Vec::new(),
            owner,
        });
        let jump = self.check_statements(&body.stmts);
        if jump == Jump::None {
            let needs_return = !matches!(
                signature.return_type,
                Type::Void | Type::Invalid | Type::Never
            );
            if kind == FunctionKind::Function && needs_return {
                self.report(CheckError::MissingReturnStatement { span });
            }
            self.check_frame_loss(frame);
        }
        self.functions.pop();

        self.resources = outer;
        self.scope.pop();
    }

    /// Statements of one block. Everything after a `return`, `break` or
    /// `continue` is unreachable and reported once as a warning.
    fn check_statements(&mut self, stmts: &[Stmt]) -> Jump {
        self.declare_local_functions(stmts);
        let mut jump = Jump::None;
        for stmt in stmts {
            if jump != Jump::None {
                self.warn(CheckWarning::UnreachableStatement { span: stmt.span() });
                break;
            }
            jump = self.check_statement(stmt);
        }
        jump
    }

    /// Local functions are visible in their whole block, so they can call
    /// each other regardless of order.
    fn declare_local_functions(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            let Stmt::Declaration(Declaration::Function(function)) = stmt else {
                continue;
            };
            let signature = self.resolve_signature(&function.params, function.return_type.as_ref());
            self.signatures
                .insert(Self::key(function.name.span), signature.clone());
            if let Err(error) = self.scope.declare_value(
                &function.name.node,
                DeclarationKind::Function,
                Type::Function(Box::new(signature)),
                true,
                function.access,
                function.name.span,
            ) {
                self.report(error);
            }
        }
    }

    fn check_block(
        &mut self,
        block: &Block,
        binding: Option<(&VariableDeclaration, Type)>,
    ) -> Jump {
        let frame = self.scope.depth();
        self.scope.push(FrameKind::Block);
        if let Some((declaration, ty)) = binding {
            self.declare_variable(declaration, ty);
        }
        let jump = self.check_statements(&block.stmts);
        if jump == Jump::None {
            self.check_frame_loss(frame);
        }
        self.scope.pop();
        jump
    }

    fn check_statement(&mut self, stmt: &Stmt) -> Jump {
        match stmt {
            Stmt::Declaration(declaration) => {
                match declaration {
                    Declaration::Variable(variable) => self.check_variable_declaration(variable),
                    Declaration::Function(function) => {
                        self.check_function_declaration(function, None)
                    }
                    other => self.report(CheckError::InvalidDeclaration {
                        kind: declaration_kind(other),
                        span: other.span(),
                    }),
                }
                Jump::None
            }
            Stmt::Return(ret) => self.check_return(ret),
            Stmt::Break(span) => self.check_loop_exit(*span, "break"),
            Stmt::Continue(span) => self.check_loop_exit(*span, "continue"),
            Stmt::If(stmt) => self.check_if(stmt),
            Stmt::While(stmt) => self.check_while(stmt),
            Stmt::Assign(stmt) => {
                self.check_assignment(stmt);
                Jump::None
            }
            Stmt::Swap(stmt) => {
                self.check_swap(stmt);
                Jump::None
            }
            Stmt::Emit(stmt) => {
                self.check_emit(stmt);
                Jump::None
            }
            Stmt::Expr(expr) => {
                let ty = self.check_expr(expr, None);
                let keeps_owner = matches!(
                    expr.kind,
                    ExprKind::Ident(_)
                        | ExprKind::Member { .. }
                        | ExprKind::Index { .. }
                        | ExprKind::Destroy(_)
                        | ExprKind::Force(_)
                );
                if ty.is_resource() && !keeps_owner {
                    self.report(CheckError::ResourceLoss { span: expr.span });
                }
                Jump::None
            }
        }
    }

    pub(super) fn check_variable_declaration(&mut self, declaration: &VariableDeclaration) {
        let ty = self.check_variable_value(declaration);
        self.declare_variable(declaration, ty);
    }

    fn declare_variable(&mut self, declaration: &VariableDeclaration, ty: Type) {
        let kind = if declaration.is_constant {
            DeclarationKind::Constant
        } else {
            DeclarationKind::Variable
        };
        let is_resource = ty.is_resource();
        match self.scope.declare_value(
            &declaration.name.node,
            kind,
            ty,
            declaration.is_constant,
            declaration.access,
            declaration.name.span,
        ) {
            Ok(declared) if is_resource => self.resources.track(declared.binding, &declared.name),
            Ok(_) => {}
            Err(error) => self.report(error),
        }
    }

    /// Type the declared binding gets. Errors of the annotation are
    /// reported after those of the value.
    fn check_variable_value(&mut self, declaration: &VariableDeclaration) -> Type {
        let (declared, annotation_errors) = match &declaration.type_annotation {
            Some(annotation) => {
                let (ty, errors) = self.resolve_annotation(annotation);
                (Some(ty), errors)
            }
            None => (None, Vec::new()),
        };

        let value_ty = match &declaration.second {
            None => self.check_expr(&declaration.value, declared.as_ref()),
            Some((transfer, second)) => {
                self.check_second_value(&declaration.value, transfer, second)
            }
        };
        if let Some(declared) = &declared {
            self.expect_subtype(&value_ty, declared, declaration.value.span);
        }

        let decisive = match &declared {
            Some(ty) if !ty.is_invalid() => ty.clone(),
            _ => value_ty.clone(),
        };
        self.check_transfer(&declaration.transfer, &decisive);
        if declaration.second.is_none() && value_ty.is_resource() {
            self.invalidate_source(&declaration.value, InvalidationKind::Move);
        }

        self.diagnostics.extend(annotation_errors);
        declared.unwrap_or(value_ty)
    }

    /// `let z <- y <- x`: `y`'s old resource goes to `z`, `x` takes its
    /// place. Returns the type of the old value.
    fn check_second_value(&mut self, first: &Expr, transfer: &Transfer, second: &Expr) -> Type {
        if !is_assignment_target(first) {
            let ty = self.check_expr(first, None);
            self.report(CheckError::InvalidAssignmentTarget { span: first.span });
            return ty;
        }

        let target_ty = self.check_assignment_target(first, true);
        if !target_ty.is_resource() && !target_ty.is_invalid() {
            self.report(CheckError::NonResourceType {
                actual: self.display(&target_ty),
                span: first.span,
            });
        }
        self.check_assignment_value(first, &target_ty, transfer, second, true);
        target_ty
    }

    fn check_assignment(&mut self, stmt: &AssignStmt) {
        let target_ty = self.check_assignment_target(&stmt.target, false);
        self.check_assignment_value(&stmt.target, &target_ty, &stmt.transfer, &stmt.value, false);
    }

    /// Type of an assignable location. `reads_old_value` is set when the
    /// location's current value is taken out, as in an exchange or swap.
    fn check_assignment_target(&mut self, target: &Expr, reads_old_value: bool) -> Type {
        match &target.kind {
            ExprKind::Ident(name) => {
                let declaration = match self.scope.resolve_value(&name.node, name.span) {
                    Ok(declaration) => declaration.clone(),
                    Err(error) => {
                        self.report(error);
                        return Type::Invalid;
                    }
                };
                if declaration.is_constant {
                    self.report(CheckError::AssignmentToConstant {
                        name: declaration.name.clone(),
                        span: target.span,
                    });
                }
                if reads_old_value {
                    self.check_binding_use(&declaration, target);
                }
                declaration.ty
            }
            ExprKind::Member { base, member } => self.check_member_target(base, member),
            ExprKind::Index { base, index } => {
                let base_ty = self.check_expr(base, None);
                self.check_index(&base_ty, index)
            }
            _ => {
                self.check_expr(target, None);
                self.report(CheckError::InvalidAssignmentTarget { span: target.span });
                Type::Invalid
            }
        }
    }

    fn check_assignment_value(
        &mut self,
        target: &Expr,
        target_ty: &Type,
        transfer: &Transfer,
        value: &Expr,
        exchange: bool,
    ) {
        let expected = (!target_ty.is_invalid()).then_some(target_ty);
        let value_ty = self.check_expr(value, expected);
        self.expect_subtype(&value_ty, target_ty, value.span);
        let decisive = if target_ty.is_invalid() {
            &value_ty
        } else {
            target_ty
        };
        self.check_transfer(transfer, decisive);
        if value_ty.is_resource() {
            self.invalidate_source(value, InvalidationKind::Move);
        }

        if !target_ty.is_resource() {
            return;
        }
        match &target.kind {
            ExprKind::Ident(name) => {
                let Some(declaration) = self.scope.lookup_value(&name.node).cloned() else {
                    return;
                };
                match self.resources.state(declaration.binding) {
                    Some(state) if state.may_own() && !exchange => {
                        self.report(CheckError::InvalidResourceAssignment { span: target.span });
                        self.resources.revalidate(declaration.binding);
                    }
                    Some(_) => self.resources.revalidate(declaration.binding),
                    None => self.resources.track(declaration.binding, &declaration.name),
                }
            }
            ExprKind::Member { base, .. } if !exchange => {
                let owner_ty = self.current_function().and_then(|f| f.owner.clone());
                let initializing =
                    owner_ty.is_some_and(|owner| self.is_initializing(base, &owner));
                if !initializing {
                    self.report(CheckError::InvalidResourceAssignment { span: target.span });
                }
            }
            ExprKind::Index { .. } if !exchange => {
                self.report(CheckError::InvalidResourceAssignment { span: target.span });
            }
            _ => {}
        }
    }

    fn check_swap(&mut self, stmt: &SwapStmt) {
        let left = self.check_assignment_target(&stmt.left, true);
        let right = self.check_assignment_target(&stmt.right, true);
        if !self.is_subtype(&left, &right) || !self.is_subtype(&right, &left) {
            self.report(CheckError::TypeMismatch {
                expected: self.display(&left),
                actual: self.display(&right),
                span: stmt.right.span,
            });
        }
    }

    fn check_emit(&mut self, stmt: &EmitStmt) {
        let ty = self.check_call(&stmt.call, CallContext::Emit);
        let is_event = matches!(&ty, Type::Composite(id) if id.kind() == CompositeKind::Event);
        if !is_event && !ty.is_invalid() {
            self.report(CheckError::EmitNonEvent {
                actual: self.display(&ty),
                span: stmt.call.span,
            });
        }
    }

    fn check_return(&mut self, stmt: &ReturnStmt) -> Jump {
        let Some(function) = self.current_function() else {
            return Jump::Return;
        };
        let return_type = function.return_type.clone();
        let frame = function.frame;

        match &stmt.value {
            Some(value) if return_type == Type::Void => {
                self.check_expr(value, None);
                self.report(CheckError::InvalidReturnValue { span: value.span });
            }
            Some(value) => {
                let ty = self.check_transferred_value(
                    value,
                    Some(&return_type),
                    InvalidationKind::Returned,
                );
                self.expect_subtype(&ty, &return_type, value.span);
            }
            None if !matches!(return_type, Type::Void | Type::Invalid) => {
                self.report(CheckError::MissingReturnValue {
                    expected: self.display(&return_type),
                    span: stmt.span,
                });
            }
            None => {}
        }
        self.check_frame_loss(frame);
        Jump::Return
    }

    fn check_loop_exit(&mut self, span: Span, keyword: &'static str) -> Jump {
        let frame = self
            .current_function()
            .and_then(|f| f.loops.last())
            .map(|l| l.frame);
        let Some(frame) = frame else {
            self.report(CheckError::ControlStatement { keyword, span });
            return Jump::None;
        };
        self.check_frame_loss(frame);

        let state = self.resources.clone();
        if let Some(context) = self.functions.last_mut().and_then(|f| f.loops.last_mut()) {
            if keyword == "break" {
                context.breaks.push(state);
            } else {
                context.continues.push(state);
            }
        }
        Jump::Loop
    }

    fn check_condition(&mut self, test: &Expr) {
        let ty = self.check_expr(test, Some(&Type::Bool));
        self.expect_subtype(&ty, &Type::Bool, test.span);
    }

    fn check_if(&mut self, stmt: &IfStmt) -> Jump {
        let binding = match &stmt.test {
            IfTest::Expr(test) => {
                self.check_condition(test);
                None
            }
            IfTest::Binding(declaration) => {
                let ty = self.check_optional_binding(declaration);
                Some((declaration.as_ref(), ty))
            }
        };

        let before = self.resources.clone();
        let then_jump = self.check_block(&stmt.then_block, binding);
        let after_then = mem::replace(&mut self.resources, before);

        let else_jump = match &stmt.else_branch {
            Some(ElseBranch::Block(block)) => self.check_block(block, None),
            Some(ElseBranch::If(nested)) => self.check_if(nested),
            None => Jump::None,
        };

        match (then_jump, else_jump) {
            (Jump::None, Jump::None) => self.resources.merge(&after_then),
            (Jump::None, _) => self.resources = after_then,
            (_, Jump::None) => {}
            _ => self.resources.merge(&after_then),
        }
        then_jump.min(else_jump)
    }

    /// `if let x <- optional`: the test value must be optional and the
    /// binding gets the wrapped type.
    fn check_optional_binding(&mut self, declaration: &VariableDeclaration) -> Type {
        let value_ty = self.check_expr(&declaration.value, None);
        let bound = match &value_ty {
            Type::Optional(inner) => (**inner).clone(),
            Type::Invalid => Type::Invalid,
            other => {
                self.report(CheckError::TypeMismatch {
                    expected: "optional".to_string(),
                    actual: self.display(other),
                    span: declaration.value.span,
                });
                Type::Invalid
            }
        };
        self.check_transfer(&declaration.transfer, &value_ty);
        if value_ty.is_resource() {
            self.invalidate_source(&declaration.value, InvalidationKind::Move);
        }

        let Some(annotation) = &declaration.type_annotation else {
            return bound;
        };
        let (declared, errors) = self.resolve_annotation(annotation);
        self.expect_subtype(&bound, &declared, declaration.value.span);
        self.diagnostics.extend(errors);
        declared
    }

    fn check_while(&mut self, stmt: &WhileStmt) -> Jump {
        self.check_condition(&stmt.cond);
        let before = self.resources.clone();

        let frame = self.scope.depth();
        let Some(function) = self.functions.last_mut() else {
            return Jump::None;
        };
        function.loops.push(LoopContext {
            frame,
            breaks: Vec::new(),
            continues: Vec::new(),
        });
        let jump = self.check_block(&stmt.body, None);
        let Some(context) = self.functions.last_mut().and_then(|f| f.loops.pop()) else {
            return Jump::None;
        };

        // states that flow back to the condition
        let mut back_edges = context.continues;
        if jump == Jump::None {
            back_edges.push(self.resources.clone());
        }

        let mut reported = HashSet::new();
        for edge in &back_edges {
            for (binding, tracked) in edge.iter() {
                let Some(invalidation) = tracked.state.invalidation() else {
                    continue;
                };
                let owned_before = before.state(binding).is_some_and(|s| s.is_valid());
                if owned_before && reported.insert(binding) {
                    self.report(CheckError::ResourceUseAfterInvalidation {
                        name: tracked.name.clone(),
                        invalidation: invalidation.kind,
                        span: invalidation.span,
                        invalidated_at: invalidation.span,
                        in_loop: true,
                    });
                }
            }
        }

        let mut after = before;
        for edge in back_edges.iter().chain(&context.breaks) {
            after.merge(edge);
        }
        for binding in reported {
            after.settle(binding);
        }
        self.resources = after;
        Jump::None
    }

    /// Resources declared in frames from `from` upwards that are still
    /// owned when control leaves them.
    fn check_frame_loss(&mut self, from: usize) {
        let declared: Vec<_> = self
            .scope
            .values_from(from)
            .filter_map(|d| d.span.map(|span| (d.binding, span)))
            .collect();
        let owned = self
            .resources
            .unconsumed(declared.iter().map(|(binding, _)| *binding));
        for (binding, span) in declared {
            if owned.contains(&binding) && self.lost.insert(binding) {
                self.report(CheckError::ResourceLoss { span });
            }
        }
    }
}

fn is_assignment_target(expr: &Expr) -> bool {
    matches!(
        expr.kind,
        ExprKind::Ident(_) | ExprKind::Member { .. } | ExprKind::Index { .. }
    )
}

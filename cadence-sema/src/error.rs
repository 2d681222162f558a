#![forbid(unsafe_code)]
#![allow(unused_assignments)]

use cadence_ast::Span;
use miette::Diagnostic;
use thiserror::Error;

use crate::kinds::DeclarationKind;
use crate::resources::InvalidationKind;

/// Every semantic failure the checker can report. Errors never abort
/// checking; they are appended to the run's diagnostics in source order.
#[derive(Clone, Debug, PartialEq, Eq, Error, Diagnostic)]
#[allow(unused_assignments)]
pub enum CheckError {
    #[error("cannot redeclare {kind} `{name}`: it is already declared")]
    #[diagnostic(code(cadence::sema::redeclaration))]
    Redeclaration {
        name: String,
        kind: DeclarationKind,
        #[label("redeclared here")]
        span: Span,
        #[label("previously declared here")]
        previous: Option<Span>,
    },

    #[error("cannot find {expected_kind} in this scope: `{name}`")]
    #[diagnostic(code(cadence::sema::not_declared))]
    NotDeclared {
        name: String,
        expected_kind: DeclarationKind,
        #[label("not found in this scope")]
        span: Span,
    },

    #[error("mismatched types: expected `{expected}`, got `{actual}`")]
    #[diagnostic(code(cadence::sema::type_mismatch))]
    TypeMismatch {
        expected: String,
        actual: String,
        #[label]
        span: Span,
    },

    #[error("invalid return value: function does not return a value")]
    #[diagnostic(code(cadence::sema::invalid_return_value))]
    InvalidReturnValue {
        #[label]
        span: Span,
    },

    #[error("missing return value: expected `{expected}`")]
    #[diagnostic(code(cadence::sema::missing_return_value))]
    MissingReturnValue {
        expected: String,
        #[label]
        span: Span,
    },

    #[error("missing return statement")]
    #[diagnostic(code(cadence::sema::missing_return_statement))]
    MissingReturnStatement {
        #[label("function body may finish without returning")]
        span: Span,
    },

    #[error("invalid use of non-resource type `{actual}`: expected a resource")]
    #[diagnostic(code(cadence::sema::non_resource_type))]
    NonResourceType {
        actual: String,
        #[label]
        span: Span,
    },

    #[error("cannot assign to unassignable expression")]
    #[diagnostic(code(cadence::sema::invalid_assignment_target))]
    InvalidAssignmentTarget {
        #[label]
        span: Span,
    },

    #[error("incorrect transfer operation: expected `{expected}`")]
    #[diagnostic(code(cadence::sema::incorrect_transfer_operation))]
    IncorrectTransferOperation {
        expected: &'static str,
        #[label]
        span: Span,
    },

    #[error("cannot assign to constant `{name}`")]
    #[diagnostic(code(cadence::sema::assignment_to_constant))]
    AssignmentToConstant {
        name: String,
        #[label]
        span: Span,
    },

    #[error("cannot assign to constant member `{name}` outside an initializer")]
    #[diagnostic(code(cadence::sema::assignment_to_constant_member))]
    AssignmentToConstantMember {
        name: String,
        #[label]
        span: Span,
    },

    #[error("cannot assign to member `{name}`: it is not settable from this location")]
    #[diagnostic(code(cadence::sema::invalid_assignment_access))]
    InvalidAssignmentAccess {
        name: String,
        #[label]
        span: Span,
    },

    #[error("use of previously {invalidation} resource `{name}`")]
    #[diagnostic(code(cadence::sema::resource_use_after_invalidation))]
    ResourceUseAfterInvalidation {
        name: String,
        invalidation: InvalidationKind,
        #[label("used here")]
        span: Span,
        #[label("invalidated here")]
        invalidated_at: Span,
        /// Invalidated on an earlier iteration of an enclosing loop.
        in_loop: bool,
    },

    #[error("loss of resource")]
    #[diagnostic(code(cadence::sema::resource_loss))]
    ResourceLoss {
        #[label("resource is neither moved nor destroyed")]
        span: Span,
    },

    #[error("{kind} declarations are not valid at the top level")]
    #[diagnostic(code(cadence::sema::invalid_top_level_declaration))]
    InvalidTopLevelDeclaration {
        kind: DeclarationKind,
        #[label]
        span: Span,
    },

    #[error("{kind} declarations are not valid in this location")]
    #[diagnostic(code(cadence::sema::invalid_declaration))]
    InvalidDeclaration {
        kind: DeclarationKind,
        #[label]
        span: Span,
    },

    #[error("{kind} declarations cannot be nested inside {container} declarations")]
    #[diagnostic(code(cadence::sema::invalid_nested_declaration))]
    InvalidNestedDeclaration {
        kind: DeclarationKind,
        container: DeclarationKind,
        #[label]
        span: Span,
    },

    #[error("missing move operation: `<-`")]
    #[diagnostic(code(cadence::sema::missing_move_operation))]
    MissingMoveOperation {
        #[label("resource must be moved with `<-`")]
        span: Span,
    },

    #[error("invalid move operation for non-resource")]
    #[diagnostic(code(cadence::sema::invalid_move_operation))]
    InvalidMoveOperation {
        #[label]
        span: Span,
    },

    #[error("cannot move nested resource")]
    #[diagnostic(code(cadence::sema::invalid_nested_move))]
    InvalidNestedMove {
        #[label]
        span: Span,
    },

    #[error("cannot assign resource: target still holds a resource")]
    #[diagnostic(code(cadence::sema::invalid_resource_assignment))]
    InvalidResourceAssignment {
        #[label]
        span: Span,
    },

    #[error("resource `{name}` cannot be captured by a nested function")]
    #[diagnostic(code(cadence::sema::resource_capturing))]
    ResourceCapturing {
        name: String,
        #[label]
        span: Span,
    },

    #[error("missing resource annotation: `<-`")]
    #[diagnostic(code(cadence::sema::missing_resource_annotation))]
    MissingResourceAnnotation {
        #[label]
        span: Span,
    },

    #[error("invalid resource annotation on non-resource type")]
    #[diagnostic(code(cadence::sema::invalid_resource_annotation))]
    InvalidResourceAnnotation {
        #[label]
        span: Span,
    },

    #[error("integer literal out of range for `{ty}`")]
    #[diagnostic(code(cadence::sema::invalid_integer_literal_range))]
    InvalidIntegerLiteralRange {
        ty: String,
        #[label]
        span: Span,
    },

    #[error("invalid dictionary key type `{ty}`")]
    #[diagnostic(code(cadence::sema::invalid_dictionary_key_type))]
    InvalidDictionaryKeyType {
        ty: String,
        #[label]
        span: Span,
    },

    #[error("cannot apply binary operation `{op}` to `{left}` and `{right}`")]
    #[diagnostic(code(cadence::sema::invalid_binary_operands))]
    InvalidBinaryOperands {
        op: &'static str,
        left: String,
        right: String,
        #[label]
        span: Span,
    },

    #[error("cannot apply unary operation `{op}` to `{actual}`")]
    #[diagnostic(code(cadence::sema::invalid_unary_operand))]
    InvalidUnaryOperand {
        op: &'static str,
        actual: String,
        #[label]
        span: Span,
    },

    #[error("resources are not valid operands of a conditional expression")]
    #[diagnostic(code(cadence::sema::invalid_conditional_resource_operand))]
    InvalidConditionalResourceOperand {
        #[label]
        span: Span,
    },

    #[error("cannot force-unwrap non-optional type `{actual}`")]
    #[diagnostic(code(cadence::sema::non_optional_force_unwrap))]
    NonOptionalForceUnwrap {
        actual: String,
        #[label]
        span: Span,
    },

    #[error("value of type `{ty}` has no member `{name}`")]
    #[diagnostic(code(cadence::sema::not_declared_member))]
    NotDeclaredMember {
        name: String,
        ty: String,
        #[label]
        span: Span,
    },

    #[error("cannot access `{name}`: it has {access} access")]
    #[diagnostic(code(cadence::sema::invalid_access))]
    InvalidAccess {
        name: String,
        access: &'static str,
        #[label]
        span: Span,
    },

    #[error("missing access modifier for `{name}`")]
    #[diagnostic(code(cadence::sema::missing_access_modifier))]
    MissingAccessModifier {
        name: String,
        #[label]
        span: Span,
    },

    #[error("cannot index into value of type `{ty}`")]
    #[diagnostic(code(cadence::sema::not_indexable_type))]
    NotIndexableType {
        ty: String,
        #[label]
        span: Span,
    },

    #[error("cannot call type `{ty}`")]
    #[diagnostic(code(cadence::sema::not_callable))]
    NotCallable {
        ty: String,
        #[label]
        span: Span,
    },

    #[error("incorrect number of arguments: expected {expected}, got {actual}")]
    #[diagnostic(code(cadence::sema::argument_count))]
    ArgumentCount {
        expected: usize,
        actual: usize,
        #[label]
        span: Span,
    },

    #[error("missing argument label: `{expected}`")]
    #[diagnostic(code(cadence::sema::missing_argument_label))]
    MissingArgumentLabel {
        expected: String,
        #[label]
        span: Span,
    },

    #[error("incorrect argument label: expected `{expected}`, got `{actual}`")]
    #[diagnostic(code(cadence::sema::incorrect_argument_label))]
    IncorrectArgumentLabel {
        expected: String,
        actual: String,
        #[label]
        span: Span,
    },

    #[error("cannot create value of type `{ty}`")]
    #[diagnostic(code(cadence::sema::invalid_construction))]
    InvalidConstruction {
        ty: String,
        #[label]
        span: Span,
    },

    #[error("cannot construct resource `{ty}` without `create`")]
    #[diagnostic(code(cadence::sema::missing_create))]
    MissingCreate {
        ty: String,
        #[label]
        span: Span,
    },

    #[error("cannot destroy non-resource type `{actual}`")]
    #[diagnostic(code(cadence::sema::invalid_destruction))]
    InvalidDestruction {
        actual: String,
        #[label]
        span: Span,
    },

    #[error("event `{name}` can only be constructed in an `emit` statement")]
    #[diagnostic(code(cadence::sema::invalid_event_usage))]
    InvalidEventUsage {
        name: String,
        #[label]
        span: Span,
    },

    #[error("cannot emit non-event type `{actual}`")]
    #[diagnostic(code(cadence::sema::emit_non_event))]
    EmitNonEvent {
        actual: String,
        #[label]
        span: Span,
    },

    #[error("invalid resource field `{name}` in {container}")]
    #[diagnostic(code(cadence::sema::invalid_resource_field))]
    InvalidResourceField {
        name: String,
        container: DeclarationKind,
        #[label]
        span: Span,
    },

    #[error("`{name}` is not an interface and cannot be conformed to")]
    #[diagnostic(code(cadence::sema::invalid_conformance))]
    InvalidConformance {
        name: String,
        #[label]
        span: Span,
    },

    #[error("{actual} cannot conform to {expected} interface `{name}`")]
    #[diagnostic(code(cadence::sema::composite_kind_mismatch))]
    CompositeKindMismatch {
        name: String,
        expected: &'static str,
        actual: &'static str,
        #[label]
        span: Span,
    },

    #[error(
        "`{composite}` does not conform to `{interface}`: missing {missing:?}, mismatched {mismatched:?}"
    )]
    #[diagnostic(code(cadence::sema::conformance))]
    Conformance {
        composite: String,
        interface: String,
        missing: Vec<String>,
        mismatched: Vec<String>,
        #[label]
        span: Span,
    },

    #[error("interface function `{name}` cannot have an implementation")]
    #[diagnostic(code(cadence::sema::invalid_implementation))]
    InvalidImplementation {
        name: String,
        #[label]
        span: Span,
    },

    #[error("function `{name}` is missing a body")]
    #[diagnostic(code(cadence::sema::missing_function_body))]
    MissingFunctionBody {
        name: String,
        #[label]
        span: Span,
    },

    #[error("`{keyword}` is only valid inside a loop")]
    #[diagnostic(code(cadence::sema::control_statement))]
    ControlStatement {
        keyword: &'static str,
        #[label]
        span: Span,
    },

    #[error("array literal has {actual} elements, expected {expected}")]
    #[diagnostic(code(cadence::sema::constant_sized_array_literal_size))]
    ConstantSizedArrayLiteralSize {
        expected: u64,
        actual: usize,
        #[label]
        span: Span,
    },

    #[error("{kind} overloading is not supported")]
    #[diagnostic(code(cadence::sema::unsupported_overloading))]
    UnsupportedOverloading {
        kind: DeclarationKind,
        #[label]
        span: Span,
    },

    #[error("destructors cannot have parameters")]
    #[diagnostic(code(cadence::sema::invalid_destructor_parameters))]
    InvalidDestructorParameters {
        #[label]
        span: Span,
    },
}

impl CheckError {
    /// Primary location of the error.
    pub fn span(&self) -> Span {
        match self {
            CheckError::Redeclaration { span, .. }
            | CheckError::NotDeclared { span, .. }
            | CheckError::TypeMismatch { span, .. }
            | CheckError::InvalidReturnValue { span }
            | CheckError::MissingReturnValue { span, .. }
            | CheckError::MissingReturnStatement { span }
            | CheckError::NonResourceType { span, .. }
            | CheckError::InvalidAssignmentTarget { span }
            | CheckError::IncorrectTransferOperation { span, .. }
            | CheckError::AssignmentToConstant { span, .. }
            | CheckError::AssignmentToConstantMember { span, .. }
            | CheckError::InvalidAssignmentAccess { span, .. }
            | CheckError::ResourceUseAfterInvalidation { span, .. }
            | CheckError::ResourceLoss { span }
            | CheckError::InvalidTopLevelDeclaration { span, .. }
            | CheckError::InvalidDeclaration { span, .. }
            | CheckError::InvalidNestedDeclaration { span, .. }
            | CheckError::MissingMoveOperation { span }
            | CheckError::InvalidMoveOperation { span }
            | CheckError::InvalidNestedMove { span }
            | CheckError::InvalidResourceAssignment { span }
            | CheckError::ResourceCapturing { span, .. }
            | CheckError::MissingResourceAnnotation { span }
            | CheckError::InvalidResourceAnnotation { span }
            | CheckError::InvalidIntegerLiteralRange { span, .. }
            | CheckError::InvalidDictionaryKeyType { span, .. }
            | CheckError::InvalidBinaryOperands { span, .. }
            | CheckError::InvalidUnaryOperand { span, .. }
            | CheckError::InvalidConditionalResourceOperand { span }
            | CheckError::NonOptionalForceUnwrap { span, .. }
            | CheckError::NotDeclaredMember { span, .. }
            | CheckError::InvalidAccess { span, .. }
            | CheckError::MissingAccessModifier { span, .. }
            | CheckError::NotIndexableType { span, .. }
            | CheckError::NotCallable { span, .. }
            | CheckError::ArgumentCount { span, .. }
            | CheckError::MissingArgumentLabel { span, .. }
            | CheckError::IncorrectArgumentLabel { span, .. }
            | CheckError::InvalidConstruction { span, .. }
            | CheckError::MissingCreate { span, .. }
            | CheckError::InvalidDestruction { span, .. }
            | CheckError::InvalidEventUsage { span, .. }
            | CheckError::EmitNonEvent { span, .. }
            | CheckError::InvalidResourceField { span, .. }
            | CheckError::InvalidConformance { span, .. }
            | CheckError::CompositeKindMismatch { span, .. }
            | CheckError::Conformance { span, .. }
            | CheckError::InvalidImplementation { span, .. }
            | CheckError::MissingFunctionBody { span, .. }
            | CheckError::ControlStatement { span, .. }
            | CheckError::ConstantSizedArrayLiteralSize { span, .. }
            | CheckError::UnsupportedOverloading { span, .. }
            | CheckError::InvalidDestructorParameters { span } => *span,
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
#[error("invalid checker configuration: {message}")]
#[diagnostic(code(cadence::sema::config))]
#[allow(unused_assignments)]
pub struct ConfigError {
    pub message: String,
}

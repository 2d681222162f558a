#![allow(dead_code)]

use cadence_sema::{CheckError, CheckResult, CheckerConfig, check_program};

pub fn parse_and_check(src: &str) -> CheckResult {
    parse_and_check_with(src, &CheckerConfig::default())
}

pub fn parse_and_check_with(src: &str, config: &CheckerConfig) -> CheckResult {
    let program = cadence_parse::parse_source(src).expect("parse");
    check_program(&program, config)
}

/// Variant names of the reported errors, in order.
pub fn error_names(result: &CheckResult) -> Vec<&'static str> {
    result.errors.iter().map(error_name).collect()
}

pub fn error_name(error: &CheckError) -> &'static str {
    match error {
        CheckError::Redeclaration { .. } => "Redeclaration",
        CheckError::NotDeclared { .. } => "NotDeclared",
        CheckError::TypeMismatch { .. } => "TypeMismatch",
        CheckError::InvalidReturnValue { .. } => "InvalidReturnValue",
        CheckError::MissingReturnValue { .. } => "MissingReturnValue",
        CheckError::MissingReturnStatement { .. } => "MissingReturnStatement",
        CheckError::NonResourceType { .. } => "NonResourceType",
        CheckError::InvalidAssignmentTarget { .. } => "InvalidAssignmentTarget",
        CheckError::IncorrectTransferOperation { .. } => "IncorrectTransferOperation",
        CheckError::AssignmentToConstant { .. } => "AssignmentToConstant",
        CheckError::AssignmentToConstantMember { .. } => "AssignmentToConstantMember",
        CheckError::InvalidAssignmentAccess { .. } => "InvalidAssignmentAccess",
        CheckError::ResourceUseAfterInvalidation { .. } => "ResourceUseAfterInvalidation",
        CheckError::ResourceLoss { .. } => "ResourceLoss",
        CheckError::InvalidTopLevelDeclaration { .. } => "InvalidTopLevelDeclaration",
        CheckError::InvalidDeclaration { .. } => "InvalidDeclaration",
        CheckError::InvalidNestedDeclaration { .. } => "InvalidNestedDeclaration",
        CheckError::MissingMoveOperation { .. } => "MissingMoveOperation",
        CheckError::InvalidMoveOperation { .. } => "InvalidMoveOperation",
        CheckError::InvalidNestedMove { .. } => "InvalidNestedMove",
        CheckError::InvalidResourceAssignment { .. } => "InvalidResourceAssignment",
        CheckError::ResourceCapturing { .. } => "ResourceCapturing",
        CheckError::MissingResourceAnnotation { .. } => "MissingResourceAnnotation",
        CheckError::InvalidResourceAnnotation { .. } => "InvalidResourceAnnotation",
        CheckError::InvalidIntegerLiteralRange { .. } => "InvalidIntegerLiteralRange",
        CheckError::InvalidDictionaryKeyType { .. } => "InvalidDictionaryKeyType",
        CheckError::InvalidBinaryOperands { .. } => "InvalidBinaryOperands",
        CheckError::InvalidUnaryOperand { .. } => "InvalidUnaryOperand",
        CheckError::InvalidConditionalResourceOperand { .. } => "InvalidConditionalResourceOperand",
        CheckError::NonOptionalForceUnwrap { .. } => "NonOptionalForceUnwrap",
        CheckError::NotDeclaredMember { .. } => "NotDeclaredMember",
        CheckError::InvalidAccess { .. } => "InvalidAccess",
        CheckError::MissingAccessModifier { .. } => "MissingAccessModifier",
        CheckError::NotIndexableType { .. } => "NotIndexableType",
        CheckError::NotCallable { .. } => "NotCallable",
        CheckError::ArgumentCount { .. } => "ArgumentCount",
        CheckError::MissingArgumentLabel { .. } => "MissingArgumentLabel",
        CheckError::IncorrectArgumentLabel { .. } => "IncorrectArgumentLabel",
        CheckError::InvalidConstruction { .. } => "InvalidConstruction",
        CheckError::MissingCreate { .. } => "MissingCreate",
        CheckError::InvalidDestruction { .. } => "InvalidDestruction",
        CheckError::InvalidEventUsage { .. } => "InvalidEventUsage",
        CheckError::EmitNonEvent { .. } => "EmitNonEvent",
        CheckError::InvalidResourceField { .. } => "InvalidResourceField",
        CheckError::InvalidConformance { .. } => "InvalidConformance",
        CheckError::CompositeKindMismatch { .. } => "CompositeKindMismatch",
        CheckError::Conformance { .. } => "Conformance",
        CheckError::InvalidImplementation { .. } => "InvalidImplementation",
        CheckError::MissingFunctionBody { .. } => "MissingFunctionBody",
        CheckError::ControlStatement { .. } => "ControlStatement",
        CheckError::ConstantSizedArrayLiteralSize { .. } => "ConstantSizedArrayLiteralSize",
        CheckError::UnsupportedOverloading { .. } => "UnsupportedOverloading",
        CheckError::InvalidDestructorParameters { .. } => "InvalidDestructorParameters",
    }
}

pub fn assert_ok(src: &str) -> CheckResult {
    let result = parse_and_check(src);
    assert!(
        result.errors.is_empty(),
        "expected no errors, got: {:?}",
        error_names(&result)
    );
    result
}

pub fn assert_errors(src: &str, expected: &[&str]) -> CheckResult {
    let result = parse_and_check(src);
    assert_eq!(error_names(&result), expected, "errors: {:?}", result.errors);
    result
}

#![forbid(unsafe_code)]

use cadence_ast::{Parameter, TypeAnnotation, TypeExpr, TypeExprKind};

use super::Checker;
use crate::error::CheckError;
use crate::kinds::DeclarationKind;
use crate::types::{FunctionParameter, FunctionType, Type};

impl Checker {
    /// Resolve a written annotation. Errors are returned rather than
    /// reported so callers can order them after the value's errors.
    pub(super) fn resolve_annotation(
        &self,
        annotation: &TypeAnnotation,
    ) -> (Type, Vec<CheckError>) {
        let mut errors = Vec::new();
        let ty = self.resolve_annotation_into(annotation, &mut errors);
        (ty, errors)
    }

    fn resolve_annotation_into(
        &self,
        annotation: &TypeAnnotation,
        errors: &mut Vec<CheckError>,
    ) -> Type {
        let ty = self.resolve_type_expr(&annotation.ty, errors);
        if !ty.is_invalid() {
            if ty.is_resource() && !annotation.is_resource {
                errors.push(CheckError::MissingResourceAnnotation {
                    span: annotation.span,
                });
            } else if !ty.is_resource() && annotation.is_resource {
                errors.push(CheckError::InvalidResourceAnnotation {
                    span: annotation.span,
                });
            }
        }
        ty
    }

    fn resolve_type_expr(&self, expr: &TypeExpr, errors: &mut Vec<CheckError>) -> Type {
        match &expr.kind {
            TypeExprKind::Nominal { identifier, nested } => {
                let mut ty = match self.scope.resolve_type(&identifier.node, identifier.span) {
                    Ok(declaration) => declaration.ty.clone(),
                    Err(error) => {
                        errors.push(error);
                        return Type::Invalid;
                    }
                };
                let mut qualified = identifier.node.clone();
                for segment in nested {
                    qualified.push('.');
                    qualified.push_str(&segment.node);
                    let found = match &ty {
                        Type::Composite(id) => self
                            .registry
                            .composite(*id)
                            .nested_types
                            .get(&segment.node)
                            .cloned(),
                        Type::Invalid => return Type::Invalid,
                        _ => None,
                    };
                    match found {
                        Some(next) => ty = next,
                        None => {
                            errors.push(CheckError::NotDeclared {
                                name: qualified,
                                expected_kind: DeclarationKind::Type,
                                span: segment.span,
                            });
                            return Type::Invalid;
                        }
                    }
                }
                ty
            }
            TypeExprKind::Optional(inner) => Type::optional(self.resolve_type_expr(inner, errors)),
            TypeExprKind::VariableArray(element) => {
                Type::array(self.resolve_type_expr(element, errors))
            }
            TypeExprKind::ConstantArray { element, size } => {
                Type::ConstantArray(Box::new(self.resolve_type_expr(element, errors)), *size)
            }
            TypeExprKind::Dictionary { key, value } => {
                let key_ty = self.resolve_type_expr(key, errors);
                let value_ty = self.resolve_type_expr(value, errors);
                if !key_ty.is_hashable() {
                    errors.push(CheckError::InvalidDictionaryKeyType {
                        ty: self.display(&key_ty),
                        span: key.span,
                    });
                }
                Type::dictionary(key_ty, value_ty)
            }
            TypeExprKind::Function {
                params,
                return_type,
            } => {
                let parameters = params
                    .iter()
                    .map(|p| FunctionParameter::unlabelled(self.resolve_annotation_into(p, errors)))
                    .collect();
                let return_type = self.resolve_annotation_into(return_type, errors);
                Type::function(parameters, return_type)
            }
        }
    }

    /// Signature of a function, initializer or event. Annotation errors
    /// are reported immediately.
    pub(super) fn resolve_signature(
        &mut self,
        params: &[Parameter],
        return_type: Option<&TypeAnnotation>,
    ) -> FunctionType {
        let mut errors = Vec::new();
        let parameters = params
            .iter()
            .map(|param| FunctionParameter {
                label: argument_label(param),
                identifier: param.name.node.clone(),
                ty: self.resolve_annotation_into(&param.type_annotation, &mut errors),
            })
            .collect();
        let return_type = match return_type {
            Some(annotation) => self.resolve_annotation_into(annotation, &mut errors),
            None => Type::Void,
        };
        self.diagnostics.extend(errors);
        FunctionType::new(parameters, return_type)
    }
}

/// `_` drops the label; without an explicit label the parameter name is used.
fn argument_label(param: &Parameter) -> Option<String> {
    match &param.label {
        Some(label) if label.node == "_" => None,
        Some(label) => Some(label.node.clone()),
        None => Some(param.name.node.clone()),
    }
}

#![forbid(unsafe_code)]

mod annotations;
mod declarations;
mod expressions;
mod members;
mod statements;

use std::collections::{HashMap, HashSet};
use std::mem;

use cadence_ast::{Program, Span, Transfer, TransferOp};
use indexmap::IndexMap;
use tracing::debug;

use crate::composite::TypeRegistry;
use crate::config::CheckerConfig;
use crate::diagnostics::{CheckWarning, CheckerErrors, Diagnostics};
use crate::error::CheckError;
use crate::resources::ResourceTracker;
use crate::scope::{BindingId, Scope, TypeDeclaration, ValueDeclaration};
use crate::subtyping::is_subtype;
use crate::types::{FunctionType, Type};
use crate::validator::validate_top_level;

/// What a checked program declares at the top level.
#[derive(Clone, Debug, PartialEq)]
pub struct Elaboration {
    pub global_values: IndexMap<String, ValueDeclaration>,
    pub global_types: IndexMap<String, TypeDeclaration>,
    pub registry: TypeRegistry,
}

impl Elaboration {
    pub fn value_type(&self, name: &str) -> Option<&Type> {
        self.global_values.get(name).map(|d| &d.ty)
    }

    pub fn display(&self, ty: &Type) -> String {
        ty.display(&self.registry)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CheckResult {
    pub elaboration: Elaboration,
    pub errors: Vec<CheckError>,
    pub warnings: Vec<CheckWarning>,
}

impl CheckResult {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_result(self) -> Result<Elaboration, CheckerErrors> {
        if self.errors.is_empty() {
            Ok(self.elaboration)
        } else {
            Err(CheckerErrors {
                errors: self.errors,
            })
        }
    }
}

/// Whether control can continue past a statement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Jump {
    None,
    /// `break` or `continue`
    Loop,
    Return,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FunctionKind {
    Function,
    Initializer,
    Destructor,
    Prepare,
    Execute,
}

impl FunctionKind {
    fn initializes_fields(&self) -> bool {
        matches!(self, FunctionKind::Initializer | FunctionKind::Prepare)
    }
}

#[derive(Debug)]
struct LoopContext {
    /// First scope frame belonging to the loop body.
    frame: usize,
    breaks: Vec<ResourceTracker>,
    continues: Vec<ResourceTracker>,
}

#[derive(Debug)]
struct FunctionContext {
    kind: FunctionKind,
    return_type: Type,
    /// Scope frame holding parameters and body-level locals.
    frame: usize,
    loops: Vec<LoopContext>,
    /// Type of `self`, for composite and transaction members.
    owner: Option<Type>,
}

/// Two-pass semantic checker. One value holds all state of a run, so
/// independent checkers can run on different threads.
#[derive(Debug)]
pub struct Checker {
    config: CheckerConfig,
    registry: TypeRegistry,
    scope: Scope,
    resources: ResourceTracker,
    diagnostics: Diagnostics,
    functions: Vec<FunctionContext>,
    /// Composite bodies being checked, innermost last.
    composites: Vec<Type>,
    /// Types of composite, interface, event and transaction declarations,
    /// keyed by the offset of their name (transactions: of the keyword).
    declared_types: HashMap<usize, Type>,
    /// Resolved signatures keyed by the offset of the declaring node.
    signatures: HashMap<usize, FunctionType>,
    /// Type declarations that failed with a redeclaration.
    redeclared: HashSet<usize>,
    /// Bindings already reported as lost on some path.
    lost: HashSet<BindingId>,
}

pub fn check_program(program: &Program, config: &CheckerConfig) -> CheckResult {
    Checker::new(config.clone()).check_program(program)
}

impl Checker {
    pub fn new(config: CheckerConfig) -> Self {
        let registry = TypeRegistry::new();
        let scope = Scope::new(&registry);
        Self {
            config,
            registry,
            scope,
            resources: ResourceTracker::new(),
            diagnostics: Diagnostics::new(),
            functions: Vec::new(),
            composites: Vec::new(),
            declared_types: HashMap::new(),
            signatures: HashMap::new(),
            redeclared: HashSet::new(),
            lost: HashSet::new(),
        }
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    /// Check a whole program. The checker can be reused; every call starts
    /// from a fresh state.
    pub fn check_program(&mut self, program: &Program) -> CheckResult {
        *self = Checker::new(mem::take(&mut self.config));
        debug!(declarations = program.declarations.len(), "checking program");

        let restricted = validate_top_level(&program.declarations, &self.config);
        self.diagnostics.extend(restricted);

        self.declare_globals(program);
        debug!("declare pass finished");

        for declaration in &program.declarations {
            self.check_declaration(declaration);
        }

        let (errors, warnings) = mem::take(&mut self.diagnostics).into_parts();
        debug!(
            errors = errors.len(),
            warnings = warnings.len(),
            "check pass finished"
        );
        let globals = self.scope.globals();
        CheckResult {
            elaboration: Elaboration {
                global_values: globals.values.clone(),
                global_types: globals.types.clone(),
                registry: self.registry.clone(),
            },
            errors,
            warnings,
        }
    }

    fn report(&mut self, error: CheckError) {
        self.diagnostics.report(error);
    }

    fn warn(&mut self, warning: CheckWarning) {
        self.diagnostics.warn(warning);
    }

    fn display(&self, ty: &Type) -> String {
        ty.display(&self.registry)
    }

    fn is_subtype(&self, sub: &Type, sup: &Type) -> bool {
        is_subtype(&self.registry, sub, sup)
    }

    /// Report a `TypeMismatch` unless `actual <: expected`.
    fn expect_subtype(&mut self, actual: &Type, expected: &Type, span: Span) -> bool {
        if self.is_subtype(actual, expected) {
            return true;
        }
        let error = CheckError::TypeMismatch {
            expected: self.display(expected),
            actual: self.display(actual),
            span,
        };
        self.report(error);
        false
    }

    /// Resources transfer with `<-`, everything else with `=`.
    fn check_transfer(&mut self, transfer: &Transfer, ty: &Type) {
        if ty.is_invalid() {
            return;
        }
        let expected = if ty.is_resource() {
            TransferOp::Move
        } else {
            TransferOp::Copy
        };
        if transfer.node != expected {
            self.report(CheckError::IncorrectTransferOperation {
                expected: expected.symbol(),
                span: transfer.span,
            });
        }
    }

    fn current_function(&self) -> Option<&FunctionContext> {
        self.functions.last()
    }

    fn key(span: Span) -> usize {
        span.offset()
    }
}

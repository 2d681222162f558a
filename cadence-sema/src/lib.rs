#![forbid(unsafe_code)]

mod checker;
mod composite;
mod config;
mod diagnostics;
mod error;
mod kinds;
mod resources;
mod scope;
mod subtyping;
mod types;
pub mod validator;

pub use checker::{CheckResult, Checker, Elaboration, check_program};
pub use composite::{CompositeType, InterfaceType, Member, MemberKind, TypeRegistry};
pub use config::{AccessCheckMode, CheckerConfig};
pub use diagnostics::{CheckWarning, CheckerErrors, Diagnostics, Severity};
pub use error::{CheckError, ConfigError};
pub use kinds::DeclarationKind;
pub use resources::{Invalidation, InvalidationKind, ResourceState, ResourceTracker};
pub use scope::{BindingId, FrameKind, Scope, TypeDeclaration, ValueDeclaration};
pub use subtyping::{ConformanceReport, is_composite_conformant, is_subtype, least_common_supertype};
pub use types::{CompositeId, FunctionParameter, FunctionType, IntegerType, InterfaceId, Type};

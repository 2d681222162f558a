#![forbid(unsafe_code)]

use cadence_ast::{
    Access, CompositeDeclaration, CompositeKind, Declaration, EventDeclaration, FieldDeclaration,
    FunctionDeclaration, Ident, InterfaceDeclaration, Members, Program, Span, SpecialFunctionKind,
    TransactionDeclaration,
};
use tracing::trace;

use super::{Checker, FunctionKind};
use crate::composite::{Member, MemberKind};
use crate::config::AccessCheckMode;
use crate::error::CheckError;
use crate::kinds::DeclarationKind;
use crate::scope::FrameKind;
use crate::subtyping::is_composite_conformant;
use crate::types::{CompositeId, FunctionParameter, FunctionType, Type};

impl Checker {
    /// Declare pass over the global scope: type names first, then member
    /// signatures and conformances, then values.
    pub(super) fn declare_globals(&mut self, program: &Program) {
        for declaration in &program.declarations {
            match declaration {
                Declaration::Composite(c) => self.register_composite(c, None),
                Declaration::Interface(i) => self.register_interface(i, None),
                Declaration::Event(e) => self.register_event(e, None),
                Declaration::Transaction(t) => self.register_transaction(t),
                Declaration::Import(_) | Declaration::Variable(_) | Declaration::Function(_) => {}
            }
        }

        for declaration in &program.declarations {
            match declaration {
                Declaration::Composite(c) => self.resolve_composite(c),
                Declaration::Interface(i) => self.resolve_interface(i),
                Declaration::Event(e) => self.resolve_event(e),
                Declaration::Transaction(t) => self.resolve_transaction(t),
                Declaration::Function(f) => {
                    let signature = self.resolve_signature(&f.params, f.return_type.as_ref());
                    self.signatures.insert(Self::key(f.name.span), signature);
                }
                Declaration::Import(_) | Declaration::Variable(_) => {}
            }
        }

        for declaration in &program.declarations {
            self.declare_global_value(declaration);
        }
    }

    fn register_composite(&mut self, decl: &CompositeDeclaration, container: Option<CompositeId>) {
        let id = self.add_composite_type(decl.kind, &decl.name, container);
        self.bind_type_name(
            &decl.name,
            DeclarationKind::for_composite(decl.kind),
            Type::Composite(id),
            container,
        );
        for nested in &decl.members.composites {
            self.register_composite(nested, Some(id));
        }
        for nested in &decl.members.interfaces {
            self.register_interface(nested, Some(id));
        }
        for nested in &decl.members.events {
            self.register_event(nested, Some(id));
        }
    }

    fn register_interface(&mut self, decl: &InterfaceDeclaration, container: Option<CompositeId>) {
        let qualified = self.qualify(&decl.name.node, container);
        let contract =
            container.and_then(|c| self.registry.enclosing_contract(&Type::Composite(c)));
        let id = self
            .registry
            .add_interface(decl.kind, &decl.name.node, qualified, contract);
        self.registry.interface_mut(id).span = Some(decl.name.span);
        let ty = Type::Interface(id);
        self.declared_types.insert(Self::key(decl.name.span), ty.clone());
        self.bind_type_name(
            &decl.name,
            DeclarationKind::for_interface(decl.kind),
            ty,
            container,
        );
    }

    fn register_event(&mut self, decl: &EventDeclaration, container: Option<CompositeId>) {
        let id = self.add_composite_type(CompositeKind::Event, &decl.name, container);
        self.bind_type_name(
            &decl.name,
            DeclarationKind::Event,
            Type::Composite(id),
            container,
        );
    }

    fn register_transaction(&mut self, decl: &TransactionDeclaration) {
        let id = self.registry.add_composite(
            CompositeKind::Structure,
            "transaction",
            "transaction".to_string(),
            None,
        );
        self.registry.composite_mut(id).span = Some(decl.span);
        self.declared_types
            .insert(Self::key(decl.span), Type::Composite(id));
    }

    fn add_composite_type(
        &mut self,
        kind: CompositeKind,
        name: &Ident,
        container: Option<CompositeId>,
    ) -> CompositeId {
        let qualified = self.qualify(&name.node, container);
        let contract =
            container.and_then(|c| self.registry.enclosing_contract(&Type::Composite(c)));
        let id = self
            .registry
            .add_composite(kind, &name.node, qualified, contract);
        self.registry.composite_mut(id).span = Some(name.span);
        self.declared_types
            .insert(Self::key(name.span), Type::Composite(id));
        id
    }

    fn qualify(&self, name: &str, container: Option<CompositeId>) -> String {
        match container {
            Some(c) => format!("{}.{name}", self.registry.composite(c).qualified_identifier),
            None => name.to_string(),
        }
    }

    /// Global types go into the scope; nested types into their container.
    fn bind_type_name(
        &mut self,
        name: &Ident,
        kind: DeclarationKind,
        ty: Type,
        container: Option<CompositeId>,
    ) {
        let Some(container) = container else {
            if let Err(error) = self.scope.declare_type(&name.node, kind, ty, name.span) {
                self.redeclared.insert(Self::key(name.span));
                self.report(error);
            }
            return;
        };
        let existing = self
            .registry
            .composite(container)
            .nested_types
            .get(&name.node)
            .cloned();
        match existing {
            Some(previous) => {
                let previous = self.registry.span(&previous);
                self.redeclared.insert(Self::key(name.span));
                self.report(CheckError::Redeclaration {
                    name: name.node.clone(),
                    kind,
                    span: name.span,
                    previous,
                });
            }
            None => {
                self.registry
                    .composite_mut(container)
                    .nested_types
                    .insert(name.node.clone(), ty);
            }
        }
    }

    fn resolve_composite(&mut self, decl: &CompositeDeclaration) {
        let Some(Type::Composite(id)) = self.declared_types.get(&Self::key(decl.name.span)).cloned()
        else {
            return;
        };
        let is_contract = decl.kind == CompositeKind::Contract;
        if is_contract {
            self.enter_contract_frame(id, false);
        }

        self.resolve_conformances(id, decl);
        let owner = Type::Composite(id);
        self.resolve_members(&owner, decl.kind, &decl.members);
        if let Some(initializer) = decl.members.initializers().next() {
            let parameters = self.signature_of(initializer.span).parameters;
            self.registry.composite_mut(id).initializer = Some(parameters);
        }

        for nested in &decl.members.composites {
            self.resolve_composite(nested);
        }
        for nested in &decl.members.interfaces {
            self.resolve_interface(nested);
        }
        for nested in &decl.members.events {
            self.resolve_event(nested);
        }

        if is_contract {
            self.scope.pop();
        }
    }

    fn resolve_interface(&mut self, decl: &InterfaceDeclaration) {
        let Some(Type::Interface(id)) = self.declared_types.get(&Self::key(decl.name.span)).cloned()
        else {
            return;
        };
        let owner = Type::Interface(id);
        self.resolve_members(&owner, decl.kind, &decl.members);
        if let Some(initializer) = decl.members.initializers().next() {
            let parameters = self.signature_of(initializer.span).parameters;
            self.registry.interface_mut(id).initializer = Some(parameters);
        }
    }

    fn resolve_event(&mut self, decl: &EventDeclaration) {
        let Some(Type::Composite(id)) = self.declared_types.get(&Self::key(decl.name.span)).cloned()
        else {
            return;
        };
        let signature = self.resolve_signature(&decl.params, None);
        let owner = Type::Composite(id);
        for (param, resolved) in decl.params.iter().zip(&signature.parameters) {
            if resolved.ty.is_resource() {
                self.report(CheckError::InvalidResourceField {
                    name: param.name.node.clone(),
                    container: DeclarationKind::Event,
                    span: param.name.span,
                });
            }
            let member = Member {
                identifier: param.name.node.clone(),
                kind: MemberKind::Field,
                access: Access::Public,
                is_constant: true,
                ty: resolved.ty.clone(),
                span: Some(param.name.span),
            };
            self.add_member(&owner, member, DeclarationKind::Parameter, param.name.span);
        }
        self.registry.composite_mut(id).initializer = Some(signature.parameters);
    }

    fn resolve_transaction(&mut self, decl: &TransactionDeclaration) {
        let Some(owner) = self.declared_types.get(&Self::key(decl.span)).cloned() else {
            return;
        };
        self.resolve_fields(&owner, CompositeKind::Structure, &decl.fields, false);
        if let Some(prepare) = &decl.prepare {
            let signature = self.resolve_signature(&prepare.params, None);
            if let Type::Composite(id) = owner {
                self.registry.composite_mut(id).initializer = Some(signature.parameters.clone());
            }
            self.signatures.insert(Self::key(prepare.span), signature);
        }
    }

    fn resolve_conformances(&mut self, id: CompositeId, decl: &CompositeDeclaration) {
        for conformance in &decl.conformances {
            let ty = match self.scope.resolve_type(&conformance.node, conformance.span) {
                Ok(declaration) => declaration.ty.clone(),
                Err(error) => {
                    self.report(error);
                    continue;
                }
            };
            match ty {
                Type::Interface(interface) if interface.kind() != decl.kind => {
                    self.report(CheckError::CompositeKindMismatch {
                        name: conformance.node.clone(),
                        expected: interface.kind().keyword(),
                        actual: decl.kind.keyword(),
                        span: conformance.span,
                    });
                }
                Type::Interface(interface) => {
                    let conformances = &mut self.registry.composite_mut(id).conformances;
                    if !conformances.contains(&interface) {
                        conformances.push(interface);
                    }
                }
                Type::Invalid => {}
                _ => self.report(CheckError::InvalidConformance {
                    name: conformance.node.clone(),
                    span: conformance.span,
                }),
            }
        }
    }

    fn resolve_members(&mut self, owner: &Type, kind: CompositeKind, members: &Members) {
        self.resolve_fields(owner, kind, &members.fields, true);

        let mut has_initializer = false;
        for special in &members.special_functions {
            let signature = self.resolve_signature(&special.params, None);
            match special.kind {
                SpecialFunctionKind::Initializer if has_initializer => {
                    self.report(CheckError::UnsupportedOverloading {
                        kind: DeclarationKind::Initializer,
                        span: special.span,
                    });
                }
                SpecialFunctionKind::Initializer => has_initializer = true,
                SpecialFunctionKind::Destructor => {
                    if !special.params.is_empty() {
                        self.report(CheckError::InvalidDestructorParameters { span: special.span });
                    }
                    match owner {
                        Type::Composite(id) if kind == CompositeKind::Resource => {
                            self.registry.composite_mut(*id).has_destructor = true;
                        }
                        _ if kind == CompositeKind::Resource => {}
                        _ => self.report(CheckError::InvalidDeclaration {
                            kind: DeclarationKind::Destructor,
                            span: special.span,
                        }),
                    }
                }
                SpecialFunctionKind::Prepare => self.report(CheckError::InvalidDeclaration {
                    kind: DeclarationKind::Prepare,
                    span: special.span,
                }),
            }
            self.signatures.insert(Self::key(special.span), signature);
        }

        for function in &members.functions {
            let signature = self.resolve_signature(&function.params, function.return_type.as_ref());
            self.signatures
                .insert(Self::key(function.name.span), signature.clone());
            self.check_access_modifier(function.access, &function.name);
            let member = Member {
                identifier: function.name.node.clone(),
                kind: MemberKind::Function,
                access: function.access,
                is_constant: true,
                ty: Type::Function(Box::new(signature)),
                span: Some(function.name.span),
            };
            self.add_member(owner, member, DeclarationKind::Function, function.name.span);
        }
    }

    fn resolve_fields(
        &mut self,
        owner: &Type,
        kind: CompositeKind,
        fields: &[FieldDeclaration],
        check_access: bool,
    ) {
        for field in fields {
            let (ty, errors) = self.resolve_annotation(&field.type_annotation);
            self.diagnostics.extend(errors);
            if ty.is_resource() && matches!(kind, CompositeKind::Structure | CompositeKind::Event) {
                let container = match owner {
                    Type::Interface(_) => DeclarationKind::for_interface(kind),
                    _ => DeclarationKind::for_composite(kind),
                };
                self.report(CheckError::InvalidResourceField {
                    name: field.name.node.clone(),
                    container,
                    span: field.name.span,
                });
            }
            if check_access {
                self.check_access_modifier(field.access, &field.name);
            }
            let member = Member {
                identifier: field.name.node.clone(),
                kind: MemberKind::Field,
                access: field.access,
                is_constant: field.is_constant,
                ty,
                span: Some(field.name.span),
            };
            self.add_member(owner, member, DeclarationKind::Field, field.name.span);
        }
    }

    fn add_member(&mut self, owner: &Type, member: Member, kind: DeclarationKind, span: Span) {
        let previous = self
            .registry
            .members(owner)
            .and_then(|members| members.get(&member.identifier))
            .map(|existing| existing.span);
        if let Some(previous) = previous {
            self.report(CheckError::Redeclaration {
                name: member.identifier,
                kind,
                span,
                previous,
            });
            return;
        }
        if let Some(members) = self.registry.members_mut(owner) {
            members.insert(member.identifier.clone(), member);
        }
    }

    fn check_access_modifier(&mut self, access: Access, name: &Ident) {
        if self.config.access_check_mode == AccessCheckMode::Strict
            && access == Access::NotSpecified
        {
            self.report(CheckError::MissingAccessModifier {
                name: name.node.clone(),
                span: name.span,
            });
        }
    }

    fn signature_of(&self, span: Span) -> FunctionType {
        self.signatures
            .get(&Self::key(span))
            .cloned()
            .unwrap_or_else(|| FunctionType::new(Vec::new(), Type::Void))
    }

    fn constructor_type(&self, id: CompositeId) -> Type {
        let parameters: Vec<FunctionParameter> = self
            .registry
            .composite(id)
            .initializer
            .clone()
            .unwrap_or_default();
        Type::function(parameters, Type::Composite(id))
    }

    fn declare_global_value(&mut self, declaration: &Declaration) {
        match declaration {
            Declaration::Function(f) => {
                let signature = self.signature_of(f.name.span);
                if let Err(error) = self.scope.declare_value(
                    &f.name.node,
                    DeclarationKind::Function,
                    Type::Function(Box::new(signature)),
                    true,
                    f.access,
                    f.name.span,
                ) {
                    self.report(error);
                }
            }
            Declaration::Composite(c) => self.declare_composite_value(&c.name, c.access),
            Declaration::Event(e) => self.declare_composite_value(&e.name, e.access),
            Declaration::Import(import) => {
                for identifier in &import.identifiers {
                    let declared = self.scope.declare_value(
                        &identifier.node,
                        DeclarationKind::Import,
                        Type::Invalid,
                        true,
                        Access::NotSpecified,
                        identifier.span,
                    );
                    let declared = declared.and_then(|_| {
                        self.scope.declare_type(
                            &identifier.node,
                            DeclarationKind::Import,
                            Type::Invalid,
                            identifier.span,
                        )
                    });
                    if let Err(error) = declared {
                        self.report(error);
                    }
                }
            }
            Declaration::Interface(_) | Declaration::Variable(_) | Declaration::Transaction(_) => {}
        }
    }

    /// Contracts are values themselves; other composites get a constructor.
    fn declare_composite_value(&mut self, name: &Ident, access: Access) {
        if self.redeclared.contains(&Self::key(name.span)) {
            return;
        }
        let Some(Type::Composite(id)) = self.declared_types.get(&Self::key(name.span)).cloned()
        else {
            return;
        };
        let value_ty = if id.kind() == CompositeKind::Contract {
            Type::Composite(id)
        } else {
            self.constructor_type(id)
        };
        if let Err(error) = self.scope.declare_value(
            &name.node,
            DeclarationKind::for_composite(id.kind()),
            value_ty,
            true,
            access,
            name.span,
        ) {
            self.report(error);
        }
    }

    /// Make a contract's nested types, and optionally their constructors,
    /// visible by their short names.
    fn enter_contract_frame(&mut self, id: CompositeId, with_values: bool) {
        self.scope.push(FrameKind::Composite);
        let nested: Vec<(String, Type)> = self
            .registry
            .composite(id)
            .nested_types
            .iter()
            .map(|(name, ty)| (name.clone(), ty.clone()))
            .collect();
        for (name, ty) in nested {
            let Some(span) = self.registry.span(&ty) else {
                continue;
            };
            let kind = match &ty {
                Type::Composite(c) => DeclarationKind::for_composite(c.kind()),
                Type::Interface(i) => DeclarationKind::for_interface(i.kind()),
                _ => DeclarationKind::Type,
            };
            if let Err(error) = self.scope.declare_type(&name, kind, ty.clone(), span) {
                self.report(error);
            }
            let Type::Composite(nested_id) = ty else {
                continue;
            };
            if with_values && nested_id.kind() != CompositeKind::Contract {
                let value_ty = self.constructor_type(nested_id);
                if let Err(error) =
                    self.scope
                        .declare_value(&name, kind, value_ty, true, Access::Public, span)
                {
                    self.report(error);
                }
            }
        }
    }

    /// Check pass for one top-level declaration.
    pub(super) fn check_declaration(&mut self, declaration: &Declaration) {
        trace!(span = ?declaration.span(), "checking declaration");
        match declaration {
            Declaration::Import(_) | Declaration::Event(_) => {}
            Declaration::Variable(v) => self.check_variable_declaration(v),
            Declaration::Function(f) => self.check_function_declaration(f, None),
            Declaration::Composite(c) => self.check_composite(c),
            Declaration::Interface(i) => self.check_interface(i),
            Declaration::Transaction(t) => self.check_transaction(t),
        }
    }

    pub(super) fn check_function_declaration(
        &mut self,
        decl: &FunctionDeclaration,
        owner: Option<Type>,
    ) {
        let key = Self::key(decl.name.span);
        let signature = match self.signatures.get(&key) {
            Some(signature) => signature.clone(),
            None => {
                let signature = self.resolve_signature(&decl.params, decl.return_type.as_ref());
                self.signatures.insert(key, signature.clone());
                signature
            }
        };
        match &decl.body {
            Some(body) => self.check_function_body(
                &decl.params,
                &signature,
                body,
                FunctionKind::Function,
                owner,
                decl.name.span,
            ),
            None => self.report(CheckError::MissingFunctionBody {
                name: decl.name.node.clone(),
                span: decl.name.span,
            }),
        }
    }

    fn check_composite(&mut self, decl: &CompositeDeclaration) {
        let Some(Type::Composite(id)) = self.declared_types.get(&Self::key(decl.name.span)).cloned()
        else {
            return;
        };
        let ty = Type::Composite(id);
        self.check_conformances(id, decl.name.span);

        let is_contract = decl.kind == CompositeKind::Contract;
        if is_contract {
            self.enter_contract_frame(id, true);
        }
        self.composites.push(ty.clone());

        for special in &decl.members.special_functions {
            let (kind, name) = match special.kind {
                SpecialFunctionKind::Initializer => (FunctionKind::Initializer, "init"),
                SpecialFunctionKind::Destructor => (FunctionKind::Destructor, "destroy"),
                SpecialFunctionKind::Prepare => continue,
            };
            let signature = self.signature_of(special.span);
            match &special.body {
                Some(body) => self.check_function_body(
                    &special.params,
                    &signature,
                    body,
                    kind,
                    Some(ty.clone()),
                    special.span,
                ),
                None => self.report(CheckError::MissingFunctionBody {
                    name: name.to_string(),
                    span: special.span,
                }),
            }
        }
        for function in &decl.members.functions {
            self.check_function_declaration(function, Some(ty.clone()));
        }

        let container = DeclarationKind::for_composite(decl.kind);
        for nested in &decl.members.composites {
            if !is_contract {
                self.report(CheckError::InvalidNestedDeclaration {
                    kind: DeclarationKind::for_composite(nested.kind),
                    container,
                    span: nested.span,
                });
            }
            self.check_composite(nested);
        }
        for nested in &decl.members.interfaces {
            if !is_contract {
                self.report(CheckError::InvalidNestedDeclaration {
                    kind: DeclarationKind::for_interface(nested.kind),
                    container,
                    span: nested.span,
                });
            }
            self.check_interface(nested);
        }
        for nested in &decl.members.events {
            if !is_contract {
                self.report(CheckError::InvalidNestedDeclaration {
                    kind: DeclarationKind::Event,
                    container,
                    span: nested.span,
                });
            }
        }

        self.composites.pop();
        if is_contract {
            self.scope.pop();
        }
    }

    fn check_conformances(&mut self, id: CompositeId, span: Span) {
        let conformances = self.registry.composite(id).conformances.clone();
        for interface in conformances {
            let report = is_composite_conformant(&self.registry, id, interface);
            if !report.is_conformant() {
                self.report(CheckError::Conformance {
                    composite: self.registry.composite(id).qualified_identifier.clone(),
                    interface: self.registry.interface(interface).qualified_identifier.clone(),
                    missing: report.missing,
                    mismatched: report.mismatched,
                    span,
                });
            }
        }
    }

    /// Interfaces only declare requirements; bodies are rejected.
    fn check_interface(&mut self, decl: &InterfaceDeclaration) {
        for special in &decl.members.special_functions {
            if special.body.is_some() {
                let name = match special.kind {
                    SpecialFunctionKind::Initializer => "init",
                    SpecialFunctionKind::Destructor => "destroy",
                    SpecialFunctionKind::Prepare => "prepare",
                };
                self.report(CheckError::InvalidImplementation {
                    name: name.to_string(),
                    span: special.span,
                });
            }
        }
        for function in &decl.members.functions {
            if function.body.is_some() {
                self.report(CheckError::InvalidImplementation {
                    name: function.name.node.clone(),
                    span: function.name.span,
                });
            }
        }

        let container = DeclarationKind::for_interface(decl.kind);
        let nested = decl
            .members
            .composites
            .iter()
            .map(|c| (DeclarationKind::for_composite(c.kind), c.span))
            .chain(
                decl.members
                    .interfaces
                    .iter()
                    .map(|i| (DeclarationKind::for_interface(i.kind), i.span)),
            )
            .chain(
                decl.members
                    .events
                    .iter()
                    .map(|e| (DeclarationKind::Event, e.span)),
            );
        for (kind, span) in nested.collect::<Vec<_>>() {
            self.report(CheckError::InvalidNestedDeclaration {
                kind,
                container,
                span,
            });
        }
    }

    fn check_transaction(&mut self, decl: &TransactionDeclaration) {
        let Some(ty) = self.declared_types.get(&Self::key(decl.span)).cloned() else {
            return;
        };
        self.composites.push(ty.clone());
        if let Some(prepare) = &decl.prepare {
            let signature = self.signature_of(prepare.span);
            match &prepare.body {
                Some(body) => self.check_function_body(
                    &prepare.params,
                    &signature,
                    body,
                    FunctionKind::Prepare,
                    Some(ty.clone()),
                    prepare.span,
                ),
                None => self.report(CheckError::MissingFunctionBody {
                    name: "prepare".to_string(),
                    span: prepare.span,
                }),
            }
        }
        if let Some(execute) = &decl.execute {
            let signature = FunctionType::new(Vec::new(), Type::Void);
            self.check_function_body(
                &[],
                &signature,
                execute,
                FunctionKind::Execute,
                Some(ty),
                execute.span,
            );
        }
        self.composites.pop();
    }
}

use cadence_sema::{AccessCheckMode, CheckError, CheckerConfig, DeclarationKind, Type};

mod common;
use common::{assert_errors, assert_ok, error_names, parse_and_check_with};

const HAS_NAME: &str = r#"
struct interface HasName {
    let name: String
    fun greet(): String
}
"#;

#[test]
fn composite_conforms_to_interface() {
    let result = assert_ok(&format!(
        r#"{HAS_NAME}
struct Person: HasName {{
    let name: String
    init(name: String) {{
        self.name = name
    }}
    fun greet(): String {{
        return self.name
    }}
}}
let p = Person(name: "Ada")
let greeting = p.greet()
"#
    ));
    let elaboration = &result.elaboration;
    assert_eq!(elaboration.value_type("greeting"), Some(&Type::String));
    let person = elaboration.value_type("p").expect("p");
    assert_eq!(elaboration.display(person), "Person");
    assert_eq!(
        elaboration.global_types["HasName"].kind,
        DeclarationKind::StructureInterface
    );
}

#[test]
fn missing_interface_member() {
    let result = assert_errors(
        &format!(
            "{HAS_NAME}struct Person: HasName {{\n let name: String\n init() {{\n  self.name = \"\"\n }}\n}}"
        ),
        &["Conformance"],
    );
    let CheckError::Conformance {
        missing, mismatched, ..
    } = &result.errors[0]
    else {
        panic!("expected conformance error");
    };
    assert_eq!(missing, &["greet".to_string()]);
    assert!(mismatched.is_empty());
}

#[test]
fn mismatched_interface_member() {
    let result = assert_errors(
        &format!(
            "{HAS_NAME}struct Person: HasName {{\n let name: Int\n init() {{\n  self.name = 1\n }}\n fun greet(): String {{\n  return \"hi\"\n }}\n}}"
        ),
        &["Conformance"],
    );
    assert!(matches!(
        &result.errors[0],
        CheckError::Conformance { mismatched, .. } if mismatched == &["name".to_string()]
    ));
}

#[test]
fn conformance_kinds() {
    assert_errors(
        "resource interface RI {}\nstruct S: RI {}",
        &["CompositeKindMismatch"],
    );
    assert_errors("struct A {}\nstruct B: A {}", &["InvalidConformance"]);
    assert_errors("struct B: Missing {}", &["NotDeclared"]);
}

const MEMBERS: &str = "struct S {\n let x: Int\n init() {\n  self.x = 1\n }\n fun f() {}\n}\n";

#[test]
fn strict_mode_requires_access_modifiers() {
    let strict = CheckerConfig::new().with_access_check_mode(AccessCheckMode::Strict);
    let result = parse_and_check_with(MEMBERS, &strict);
    assert_eq!(
        error_names(&result),
        ["MissingAccessModifier", "MissingAccessModifier"]
    );

    let annotated = "struct S {\n pub let x: Int\n init() {\n  self.x = 1\n }\n pub fun f() {}\n}";
    let result = parse_and_check_with(annotated, &strict);
    assert!(result.is_success(), "{:?}", result.errors);
}

#[test]
fn unspecified_access_is_private_when_restricted() {
    let restricted =
        CheckerConfig::new().with_access_check_mode(AccessCheckMode::NotSpecifiedRestricted);
    let src = format!("{MEMBERS}fun test(): Int {{\n let s = S()\n return s.x\n}}");
    let result = parse_and_check_with(&src, &restricted);
    assert_eq!(error_names(&result), ["InvalidAccess"]);
    assert!(matches!(
        result.errors[0],
        CheckError::InvalidAccess { access: "private", .. }
    ));

    // same source with the default mode
    assert_ok(&src);

    let unchecked = CheckerConfig::new().with_access_check_mode(AccessCheckMode::None);
    let private = "struct S {\n priv let x: Int\n init() {\n  self.x = 1\n }\n}\nfun test(): Int {\n let s = S()\n return s.x\n}";
    assert!(parse_and_check_with(private, &unchecked).is_success());
    assert_errors(private, &["InvalidAccess"]);
}

#[test]
fn private_members_are_visible_inside_their_composite() {
    assert_ok(
        "struct S {\n priv let x: Int\n init() {\n  self.x = 1\n }\n pub fun get(): Int {\n  return self.x\n }\n}",
    );
}

#[test]
fn contract_access() {
    let src = r#"
contract C {
    access(contract) fun secret() {}
    pub resource R {
        pub fun f() {
            C.secret()
        }
    }
    pub fun make(): <-R {
        return <-create R()
    }
}
fun test() {
    let r <- C.make()
    destroy r
}
"#;
    let result = assert_ok(src);
    assert!(matches!(
        result.elaboration.value_type("C"),
        Some(Type::Composite(_))
    ));

    let outside = format!("{src}fun leak() {{\n C.secret()\n}}");
    let result = assert_errors(&outside, &["InvalidAccess"]);
    assert!(matches!(
        result.errors[0],
        CheckError::InvalidAccess { access: "contract", .. }
    ));
}

#[test]
fn constant_members_are_set_only_in_initializers() {
    assert_errors(
        "struct S {\n pub let x: Int\n init() {\n  self.x = 1\n }\n pub fun set() {\n  self.x = 2\n }\n}",
        &["AssignmentToConstantMember"],
    );
    assert_errors(
        "struct S {\n pub let x: Int\n init() {\n  self.x = 1\n }\n}\nfun test() {\n let s = S()\n s.x = 3\n}",
        &["AssignmentToConstantMember"],
    );
    assert_errors(
        "fun test() {\n let xs = [1]\n xs.length = 3\n}",
        &["AssignmentToConstantMember"],
    );
}

#[test]
fn variable_members_need_settable_access_outside() {
    let declaration = |access: &str| {
        format!(
            "struct S {{\n {access} var y: Int\n init() {{\n  self.y = 1\n }}\n}}\nfun test() {{\n let s = S()\n s.y = 3\n}}"
        )
    };
    assert_errors(&declaration("pub"), &["InvalidAssignmentAccess"]);
    assert_ok(&declaration("pub(set)"));
    assert_ok("struct S {\n pub var y: Int\n init() {\n  self.y = 1\n }\n pub fun bump() {\n  self.y = self.y + 1\n }\n}");
}

#[test]
fn events_are_emitted() {
    let event = "event Transfer(amount: Int)\n";
    assert_ok(&format!("{event}fun test() {{\n emit Transfer(amount: 1)\n}}"));
    assert_errors(
        &format!("{event}fun test() {{\n let e = Transfer(amount: 1)\n}}"),
        &["InvalidEventUsage"],
    );
    assert_errors(
        &format!("{event}fun test() {{\n emit Transfer(value: 1)\n}}"),
        &["IncorrectArgumentLabel"],
    );
    assert_errors(
        "fun f(): Int {\n return 1\n}\nfun test() {\n emit f()\n}",
        &["EmitNonEvent"],
    );
    assert_errors(
        "resource R {}\nevent Moved(r: <-R)",
        &["InvalidResourceField"],
    );
}

#[test]
fn transaction_fields_are_set_in_prepare() {
    let result = assert_ok(
        r#"
transaction {
    let x: Int
    prepare(signer: AuthAccount) {
        self.x = 1
    }
    execute {
        let y = self.x
    }
}
"#,
    );
    assert!(result.warnings.is_empty());

    assert_errors(
        "transaction {\n let x: Int\n prepare() {\n  self.x = 1\n }\n execute {\n  self.x = 2\n }\n}",
        &["AssignmentToConstantMember"],
    );
}

#[test]
fn nested_declarations_only_in_contracts() {
    assert_errors("struct S {\n struct T {}\n}", &["InvalidNestedDeclaration"]);
    assert_errors(
        "resource R {\n event E()\n}",
        &["InvalidNestedDeclaration"],
    );
    assert_ok("contract C {\n pub struct T {}\n pub event E()\n}");
}

#[test]
fn interfaces_only_declare_requirements() {
    assert_errors(
        "struct interface I {\n fun f() {}\n}",
        &["InvalidImplementation"],
    );
    assert_errors(
        "resource interface I {\n init() {}\n}",
        &["InvalidImplementation"],
    );
    assert_errors(
        "struct interface I {\n struct S {}\n}",
        &["InvalidNestedDeclaration"],
    );
}

#[test]
fn special_function_rules() {
    assert_errors(
        "struct S {\n destroy() {}\n}",
        &["InvalidDeclaration"],
    );
    assert_errors(
        "resource R {\n destroy(x: Int) {}\n}",
        &["InvalidDestructorParameters"],
    );
    assert_errors(
        "struct S {\n init() {}\n init(x: Int) {}\n}",
        &["UnsupportedOverloading"],
    );
    assert_errors("struct S {\n fun f()\n}", &["MissingFunctionBody"]);
}

#[test]
fn composite_member_rules() {
    assert_errors(
        "resource R {}\nstruct S {\n let r: <-R\n init(r: <-R) {\n  self.r <- r\n }\n}",
        &["InvalidResourceField"],
    );
    assert_errors(
        "struct S {\n let x: Int\n let x: Int\n}",
        &["Redeclaration"],
    );
    assert_errors(
        "struct S {}\nfun test() {\n let s = S()\n let y = s.missing\n}",
        &["NotDeclaredMember"],
    );
}

#[test]
fn composite_type_redeclaration() {
    let result = assert_errors("struct S {}\nresource S {}", &["Redeclaration"]);
    assert!(matches!(
        &result.errors[0],
        CheckError::Redeclaration { kind: DeclarationKind::Resource, .. }
    ));
}

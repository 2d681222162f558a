use cadence_ast::{
    Access, CompositeKind, Declaration, ExprKind, IfTest, ImportLocation, Stmt, TransferOp,
    TypeExprKind, UnaryOp,
};
use cadence_parse::{parse_expr, parse_source};

#[test]
fn chained_comparisons_are_rejected() {
    let err = parse_source("let a = 1 < 2 < 3").expect_err("expected parse error");
    let msg = err.to_string();
    assert!(msg.contains("chained comparisons"), "unexpected error message: {msg}");
}

#[test]
fn second_value_declaration_parses() {
    let program = parse_source("fun test() { let z <- y <- x }").expect("parse");
    let Declaration::Function(f) = &program.declarations[0] else {
        panic!("expected function");
    };
    let body = f.body.as_ref().expect("body");
    let Stmt::Declaration(Declaration::Variable(v)) = &body.stmts[0] else {
        panic!("expected variable declaration");
    };
    assert_eq!(v.transfer.node, TransferOp::Move);
    let (transfer, value) = v.second.as_ref().expect("second value");
    assert_eq!(transfer.node, TransferOp::Move);
    assert!(matches!(&value.kind, ExprKind::Ident(id) if id.node == "x"));
}

#[test]
fn declarations_of_every_kind_parse() {
    let src = r#"
        import A, B from 0x01
        import "crypto"

        pub resource interface Receiver {
            pub fun deposit(from: <-R)
        }

        pub resource R: Receiver {
            pub(set) var balance: Int
            init(balance: Int) { self.balance = balance }
            pub fun deposit(from: <-R) { destroy from }
            destroy() {}
        }

        pub event Deposited(amount: Int)

        access(contract) let x: {String: [Int; 3]}? = nil

        transaction {
            let n: Int
            prepare(signer: AuthAccount) { self.n = 1 }
            execute {}
        }
    "#;
    let program = parse_source(src).expect("parse");
    assert_eq!(program.declarations.len(), 7);

    let Declaration::Import(import) = &program.declarations[0] else {
        panic!("expected import");
    };
    assert_eq!(import.identifiers.len(), 2);
    assert_eq!(import.location.node, ImportLocation::Address(1));

    let Declaration::Interface(iface) = &program.declarations[2] else {
        panic!("expected interface");
    };
    assert_eq!(iface.kind, CompositeKind::Resource);
    assert!(iface.members.functions[0].body.is_none());

    let Declaration::Composite(r) = &program.declarations[3] else {
        panic!("expected composite");
    };
    assert_eq!(r.conformances[0].node, "Receiver");
    assert_eq!(r.members.fields[0].access, Access::PublicSettable);
    assert_eq!(r.members.special_functions.len(), 2);
    let param = &r.members.functions[0].params[0];
    assert_eq!(param.name.node, "from");
    assert!(param.type_annotation.is_resource);

    let Declaration::Variable(x) = &program.declarations[5] else {
        panic!("expected variable");
    };
    assert_eq!(x.access, Access::Contract);
    let ann = x.type_annotation.as_ref().expect("annotation");
    let TypeExprKind::Optional(inner) = &ann.ty.kind else {
        panic!("expected optional");
    };
    assert!(matches!(inner.kind, TypeExprKind::Dictionary { .. }));

    let Declaration::Transaction(tx) = &program.declarations[6] else {
        panic!("expected transaction");
    };
    assert!(tx.prepare.is_some() && tx.execute.is_some());
}

#[test]
fn call_on_next_line_is_a_new_statement() {
    let program = parse_source("fun test() {\n let x = f\n (1)\n}").expect("parse");
    let Declaration::Function(f) = &program.declarations[0] else {
        panic!("expected function");
    };
    assert_eq!(f.body.as_ref().expect("body").stmts.len(), 2);
}

#[test]
fn labelled_arguments_accept_soft_keywords() {
    let expr = parse_expr("s.slice(from: 0, upTo: 1)").expect("parse");
    let ExprKind::Call { args, .. } = expr.kind else {
        panic!("expected call");
    };
    let labels: Vec<_> = args
        .iter()
        .map(|a| a.label.as_ref().map(|l| l.node.clone()))
        .collect();
    assert_eq!(labels, vec![Some("from".to_string()), Some("upTo".to_string())]);
}

#[test]
fn move_of_create_parses_as_nested_unary() {
    let expr = parse_expr("<-create R()").expect("parse");
    let ExprKind::Unary { op, expr } = expr.kind else {
        panic!("expected unary");
    };
    assert_eq!(op, UnaryOp::Move);
    assert!(matches!(expr.kind, ExprKind::Create(_)));
}

#[test]
fn if_let_and_swap_parse() {
    let src = "fun test() { if let r <- opt { a <-> b } else if c { return } }";
    let program = parse_source(src).expect("parse");
    let Declaration::Function(f) = &program.declarations[0] else {
        panic!("expected function");
    };
    let Stmt::If(i) = &f.body.as_ref().expect("body").stmts[0] else {
        panic!("expected if");
    };
    assert!(matches!(i.test, IfTest::Binding(_)));
    assert!(matches!(i.then_block.stmts[0], Stmt::Swap(_)));
    assert!(i.else_branch.is_some());
}

#[test]
fn nil_coalescing_is_right_associative() {
    let expr = parse_expr("a ?? b ?? c").expect("parse");
    let ExprKind::Binary { left, right, .. } = expr.kind else {
        panic!("expected binary");
    };
    assert!(matches!(left.kind, ExprKind::Ident(_)));
    assert!(matches!(right.kind, ExprKind::Binary { .. }));
}

#[test]
fn unterminated_block_is_reported() {
    let err = parse_source("fun test() { let x = 1").expect_err("expected parse error");
    let msg = err.to_string();
    assert!(msg.contains("unterminated brace block"), "unexpected error message: {msg}");
}

use cadence_sema::{CheckError, InvalidationKind};

mod common;
use common::{assert_errors, assert_ok};

const R: &str = "resource R {}\n";

fn with_r(body: &str) -> String {
    format!("{R}{body}")
}

#[test]
fn resource_left_in_scope_is_lost() {
    assert_errors(
        &with_r("fun test() {\n let r <- create R()\n}"),
        &["ResourceLoss"],
    );
    assert_ok(&with_r("fun test() {\n let r <- create R()\n destroy r\n}"));
}

#[test]
fn resource_lost_on_early_return() {
    assert_errors(
        &with_r("fun test(c: Bool) {\n let r <- create R()\n if c {\n  return\n }\n destroy r\n}"),
        &["ResourceLoss"],
    );
}

#[test]
fn returning_a_resource_moves_it() {
    assert_ok(&with_r(
        "fun make(): <-R {\n let r <- create R()\n return <-r\n}",
    ));
    assert_errors(
        &with_r("fun make(): <-R {\n let r <- create R()\n return r\n}"),
        &["MissingMoveOperation"],
    );
}

#[test]
fn use_after_move() {
    let result = assert_errors(
        &with_r(
            "fun test() {\n let r <- create R()\n let s <- r\n let t <- r\n destroy s\n destroy t\n}",
        ),
        &["ResourceUseAfterInvalidation"],
    );
    let CheckError::ResourceUseAfterInvalidation {
        name,
        invalidation,
        in_loop,
        ..
    } = &result.errors[0]
    else {
        panic!("expected use after invalidation");
    };
    assert_eq!(name, "r");
    assert_eq!(*invalidation, InvalidationKind::Move);
    assert!(!in_loop);
    assert!(result.errors[0].to_string().contains("moved"));
}

#[test]
fn use_after_passing_to_function() {
    let result = assert_errors(
        &with_r(
            "fun consume(r: <-R) {\n destroy r\n}\nfun test() {\n let r <- create R()\n consume(r: <-r)\n consume(r: <-r)\n}",
        ),
        &["ResourceUseAfterInvalidation"],
    );
    assert!(matches!(
        result.errors[0],
        CheckError::ResourceUseAfterInvalidation {
            invalidation: InvalidationKind::PassedToFunction,
            ..
        }
    ));
}

#[test]
fn destroy_in_one_branch_invalidates_after_the_if() {
    assert_errors(
        &with_r("fun test(c: Bool) {\n let r <- create R()\n if c {\n  destroy r\n }\n destroy r\n}"),
        &["ResourceUseAfterInvalidation"],
    );
}

#[test]
fn destroy_in_one_branch_loses_it_on_the_other() {
    assert_errors(
        &with_r("fun test(c: Bool) {\n let r <- create R()\n if c {\n  destroy r\n }\n}"),
        &["ResourceLoss"],
    );
    assert_errors(
        &with_r(
            "fun test(c: Bool) {\n let r <- create R()\n if c {\n  destroy r\n } else {\n }\n}",
        ),
        &["ResourceLoss"],
    );
    assert_errors(
        &with_r("fun test(c: Bool) {\n let r <- create R()\n if c {\n  destroy r\n }\n return\n}"),
        &["ResourceLoss"],
    );
}

#[test]
fn assigning_over_a_maybe_destroyed_resource() {
    assert_errors(
        &with_r(
            "fun test(c: Bool) {\n var r <- create R()\n if c {\n  destroy r\n }\n r <- create R()\n destroy r\n}",
        ),
        &["InvalidResourceAssignment"],
    );
}

#[test]
fn destroy_in_both_branches() {
    assert_ok(&with_r(
        "fun test(c: Bool) {\n let r <- create R()\n if c {\n  destroy r\n } else {\n  destroy r\n }\n}",
    ));
}

#[test]
fn destroy_inside_loop_body() {
    let result = assert_errors(
        &with_r("fun test(c: Bool) {\n let r <- create R()\n while c {\n  destroy r\n }\n}"),
        &["ResourceUseAfterInvalidation"],
    );
    assert!(matches!(
        result.errors[0],
        CheckError::ResourceUseAfterInvalidation { in_loop: true, .. }
    ));
    assert_errors(
        &with_r("fun test(c: Bool) {\n let r <- create R()\n while c {\n  destroy r\n  break\n }\n}"),
        &["ResourceLoss"],
    );
}

#[test]
fn loop_local_resources() {
    assert_ok(&with_r(
        "fun test(c: Bool) {\n while c {\n  let r <- create R()\n  destroy r\n }\n}",
    ));
    assert_errors(
        &with_r("fun test(c: Bool) {\n while c {\n  let r <- create R()\n }\n}"),
        &["ResourceLoss"],
    );
    assert_errors(
        &with_r(
            "fun test(c: Bool) {\n while c {\n  let r <- create R()\n  if c {\n   break\n  }\n  destroy r\n }\n}",
        ),
        &["ResourceLoss"],
    );
}

#[test]
fn continue_outside_loop() {
    assert_errors("fun test() {\n continue\n}", &["ControlStatement"]);
}

#[test]
fn nested_function_cannot_capture_resource() {
    assert_errors(
        &with_r(
            "fun test() {\n let r <- create R()\n fun inner() {\n  destroy r\n }\n destroy r\n}",
        ),
        &["ResourceCapturing"],
    );
    assert_errors(
        &with_r("let r <- create R()\nfun test() {\n destroy r\n}"),
        &["ResourceCapturing"],
    );
}

#[test]
fn nested_resources_cannot_be_moved_out() {
    let container = "resource C {\n let r: <-R\n init(r: <-R) {\n  self.r <- r\n }\n destroy() {\n  destroy self.r\n }\n}\n";
    assert_ok(&with_r(container));
    assert_errors(
        &with_r(&format!(
            "{container}fun test(c: <-C) {{\n let r <- c.r\n destroy c\n destroy r\n}}"
        )),
        &["InvalidNestedMove"],
    );
    assert_errors(
        &with_r("fun test(rs: <-[R]) {\n let r <- rs[0]\n destroy r\n destroy rs\n}"),
        &["InvalidNestedMove"],
    );
}

#[test]
fn construction_rules() {
    assert_errors(
        &with_r("fun test() {\n let r <- R()\n destroy r\n}"),
        &["MissingCreate"],
    );
    assert_errors(
        "struct S {}\nfun test() {\n let s = create S()\n}",
        &["InvalidConstruction"],
    );
    assert_errors(
        "struct S {}\nfun test() {\n let s = S()\n destroy s\n}",
        &["InvalidDestruction"],
    );
}

#[test]
fn created_resource_must_be_stored() {
    assert_errors(
        &with_r("fun test() {\n create R()\n}"),
        &["ResourceLoss"],
    );
}

#[test]
fn resources_need_move_annotation_when_declared() {
    assert_errors(
        &with_r("fun test() {\n let r = create R()\n destroy r\n}"),
        &["IncorrectTransferOperation"],
    );
    assert_errors("fun test() {\n let x = 1\n let y = <-x\n}", &["InvalidMoveOperation"]);
}

#[test]
fn optional_binding_moves_resource() {
    assert_ok(&with_r(
        "fun test(r: <-R?) {\n if let x <- r {\n  destroy x\n }\n}",
    ));
    assert_errors(
        &with_r("fun test(r: <-R?) {\n if let x <- r {\n }\n}"),
        &["ResourceLoss"],
    );
}

#[test]
fn assigning_over_a_live_resource() {
    assert_errors(
        &with_r(
            "fun test() {\n var r <- create R()\n r <- create R()\n destroy r\n}",
        ),
        &["InvalidResourceAssignment"],
    );
    assert_ok(&with_r(
        "fun test() {\n var r <- create R()\n destroy r\n r <- create R()\n destroy r\n}",
    ));
}

#[test]
fn swapping_resources() {
    assert_ok(&with_r(
        "fun test() {\n var a <- create R()\n var b <- create R()\n a <-> b\n destroy a\n destroy b\n}",
    ));
    assert_errors(
        "fun test() {\n var a = 1\n var b = true\n a <-> b\n}",
        &["TypeMismatch"],
    );
}

const CONSUME: &str = "fun f(_ r: <-R): Bool {\n destroy r\n return true\n}\n";

#[test]
fn conditional_arms_are_separate_paths() {
    assert_ok(&with_r(&format!(
        "{CONSUME}fun test(c: Bool) {{\n let r <- create R()\n let x = c ? f(<-r) : f(<-r)\n}}"
    )));
    assert_errors(
        &with_r(&format!(
            "{CONSUME}fun test(c: Bool) {{\n let r <- create R()\n let x = c ? f(<-r) : false\n}}"
        )),
        &["ResourceLoss"],
    );
}

#[test]
fn short_circuited_operand_may_not_run() {
    for op in ["&&", "||"] {
        assert_errors(
            &with_r(&format!(
                "{CONSUME}fun test(c: Bool) {{\n let r <- create R()\n let x = c {op} f(<-r)\n}}"
            )),
            &["ResourceLoss"],
        );
    }
    assert_errors(
        &with_r(&format!(
            "{CONSUME}fun test(c: Bool) {{\n let r <- create R()\n let x = c && f(<-r)\n destroy r\n}}"
        )),
        &["ResourceUseAfterInvalidation"],
    );
}

#[test]
fn conditional_operands_cannot_be_resources() {
    assert_errors(
        &with_r("fun test(c: Bool) {\n let r <- c ? create R() : create R()\n destroy r\n}"),
        &[
            "InvalidConditionalResourceOperand",
            "InvalidConditionalResourceOperand",
        ],
    );
}

#[test]
fn resource_annotations_must_match_the_type() {
    assert_errors(
        &with_r("fun test(r: R) {\n destroy r\n}"),
        &["MissingResourceAnnotation"],
    );
    assert_errors("fun test(x: <-Int) {}", &["InvalidResourceAnnotation"]);
    assert_ok(&with_r("fun test(rs: <-{String: R}) {\n destroy rs\n}"));
}

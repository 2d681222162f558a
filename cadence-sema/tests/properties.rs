use std::collections::HashSet;

use cadence_sema::{CheckResult, CheckerConfig, check_program};
use proptest::{
    prelude::{any, prop},
    prop_assert, prop_assert_eq,
    test_runner::{Config, TestRunner},
};
use rayon::prelude::*;

mod common;
use common::{error_names, parse_and_check};

fn runner() -> TestRunner {
    TestRunner::new(Config {
        cases: 64,
        ..Config::default()
    })
}

fn constants(names: &[&str]) -> String {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| format!("let {name} = {i}\n"))
        .collect()
}

#[test]
fn every_duplicate_global_is_one_redeclaration() {
    let names = prop::collection::vec(prop::sample::select(vec!["a", "b", "c", "d"]), 1..12);
    runner()
        .run(&names, |names| {
            let result = parse_and_check(&constants(&names));
            let distinct: HashSet<_> = names.iter().collect();
            prop_assert_eq!(result.errors.len(), names.len() - distinct.len());
            prop_assert!(error_names(&result).iter().all(|n| *n == "Redeclaration"));
            Ok(())
        })
        .expect("redeclaration count");
}

#[test]
fn uint8_literals_are_accepted_exactly_in_range() {
    runner()
        .run(&(0u32..1024), |value| {
            let result = parse_and_check(&format!("let x: UInt8 = {value}"));
            prop_assert_eq!(result.is_success(), value <= u32::from(u8::MAX));
            Ok(())
        })
        .expect("literal range");
}

#[test]
fn checking_twice_gives_the_same_result() {
    let strategy = (any::<bool>(), prop::collection::vec(0u8..4, 0..6));
    runner()
        .run(&strategy, |(destroy_last, moves)| {
            let mut src = String::from("resource R {}\nfun test() {\n let r0 <- create R()\n");
            for (i, source) in moves.iter().enumerate() {
                let source = usize::from(*source).min(i);
                src.push_str(&format!(" let r{} <- r{source}\n", i + 1));
            }
            if destroy_last {
                src.push_str(&format!(" destroy r{}\n", moves.len()));
            }
            src.push_str("}\n");

            let program = cadence_parse::parse_source(&src).expect("parse");
            let config = CheckerConfig::default();
            prop_assert_eq!(check_program(&program, &config), check_program(&program, &config));
            Ok(())
        })
        .expect("deterministic");
}

#[test]
fn independent_checkers_run_in_parallel() {
    let sources: Vec<String> = (0..32)
        .map(|i| match i % 4 {
            0 => format!("let x{i} = {i}"),
            1 => format!("let x = 1\nlet x = {i}"),
            2 => format!("resource R{i} {{}}\nfun f() {{\n let r <- create R{i}()\n}}"),
            _ => format!("let y: Bool = {i}"),
        })
        .collect();

    let sequential: Vec<CheckResult> = sources.iter().map(|s| parse_and_check(s)).collect();
    let parallel: Vec<CheckResult> = sources.par_iter().map(|s| parse_and_check(s)).collect();
    assert_eq!(sequential, parallel);

    let failing = parallel.iter().filter(|r| !r.is_success()).count();
    assert_eq!(failing, 24);
}

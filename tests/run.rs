// ----------------------------
// File: tests/run.rs
// ----------------------------
//! End-to-end scenarios: compile source and run the emitted program
//! through the interpreter, checking the exact output.

use dolme::interp::Interpreter;

fn run(src: &str) -> String {
    let c = dolme::compile(src);
    assert!(c.syntax_errors.is_empty(), "syntax errors: {:?}", c.syntax_errors);
    assert!(c.semantic_errors.is_empty(), "semantic errors: {:?}", c.semantic_errors);

    let mut buf = Vec::new();
    {
        let mut it = Interpreter::new(&c.instructions).with_writer(&mut buf);
        it.run().expect("interpretation");
    }
    String::from_utf8(buf).expect("utf8 output")
}

#[test]
fn prints_globals_in_order() {
    let out = run("let x : int = 2; let y : int = 3; print(x); print(y);");
    assert_eq!(out, "2\n3\n");
}

#[test]
fn if_else_takes_the_then_arm() {
    let out = run("let x : int = 10; if (x == 10) { print(x); } else { let y : int = 0; print(y); }");
    assert_eq!(out, "10\n");
}

#[test]
fn if_else_takes_the_else_arm() {
    let out = run("let x : int = 9; if (x == 10) { print(x); } else { let y : int = 0; print(y); }");
    assert_eq!(out, "0\n");
}

#[test]
fn while_counts_to_three() {
    let out = run("let i : int = 0; while (i < 3) { print(i); i = i + 1; }");
    assert_eq!(out, "0\n1\n2\n");
}

#[test]
fn break_leaves_the_loop_early() {
    let out = run("let i : int = 0; while (i < 10) { if (i == 2) { break; } print(i); i = i + 1; }");
    assert_eq!(out, "0\n1\n");
}

#[test]
fn continue_skips_to_the_next_iteration() {
    let out = run(
        "let i : int = 0; while (i < 5) { i = i + 1; if (i == 3) { continue; } print(i); }",
    );
    assert_eq!(out, "1\n2\n4\n5\n");
}

#[test]
fn function_call_returns_a_value() {
    let out = run("func add(a: int, b: int) : int { return a + b; } let r : int = add(2, 3); print(r);");
    assert_eq!(out, "5\n");
}

#[test]
fn float_addition_prints_twenty_fraction_digits() {
    let out = run("let a : float = 1.5; let b : float = 2.25; let c : float = a + b; print(c);");
    assert_eq!(out, "3.75000000000000000000\n");
}

#[test]
fn nested_calls_compose() {
    let out = run(
        "func double(n: int) : int { return n * 2; } \
         func quad(n: int) : int { return double(double(n)); } \
         let r : int = quad(3); print(r);",
    );
    assert_eq!(out, "12\n");
}

#[test]
fn unary_minus_literals_flow_through_arithmetic() {
    let out = run("let x : int = -42; let y : int = x + 2; print(y);");
    assert_eq!(out, "-40\n");
}

#[test]
fn boolean_conditions_combine_with_and_or_not() {
    let out = run(
        "let a : int = 1; let b : int = 2; \
         if (a == 1 and not b == 3) { print(a); } else { print(b); }",
    );
    assert_eq!(out, "1\n");
}

#[test]
fn statement_calls_execute_for_effect() {
    let out = run("func shout(n: int) : int { print(n); return n; } shout(7);");
    assert_eq!(out, "7\n");
}

#[test]
fn globals_are_visible_inside_functions() {
    let out = run(
        "let base : int = 100; \
         func bump(n: int) : int { return base + n; } \
         let r : int = bump(5); print(r);",
    );
    assert_eq!(out, "105\n");
}

#[test]
fn expression_results_match_i64_arithmetic() {
    let cases: &[(&str, i64)] = &[
        ("2 + 3 * 4", 2 + 3 * 4),
        ("(2 + 3) * 4", (2 + 3) * 4),
        ("10 - 2 - 3", 10 - 2 - 3),
        ("100 / 7", 100 / 7),
        ("100 % 7", 100 % 7),
        ("1 + 2 * 3 - 4 / 2", 1 + 2 * 3 - 4 / 2),
        ("-5 + 3", -5 + 3),
    ];
    for (expr, expected) in cases {
        let out = run(&format!("let r : int = {expr}; print(r);"));
        assert_eq!(out, format!("{expected}\n"), "expression {expr}");
    }
}

#[test]
fn reruns_produce_identical_output() {
    let src = "let i : int = 0; while (i < 4) { print(i); i = i + 1; }";
    let first = run(src);
    let second = run(src);
    assert_eq!(first, second);
}

#[test]
fn division_by_zero_aborts_the_run() {
    let c = dolme::compile("let a : int = 1; let b : int = 0; let r : int = a / b; print(r);");
    assert!(c.is_clean());
    let mut buf = Vec::new();
    let mut it = Interpreter::new(&c.instructions).with_writer(&mut buf);
    let err = it.run().expect_err("division by zero must abort");
    assert_eq!(err.to_string(), "division by zero");
}

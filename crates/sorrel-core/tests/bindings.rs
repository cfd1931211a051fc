mod common;

use common::*;
use sorrel_core::{ExprKind, TypeKind};

#[test]
fn let_parses_names_values_and_body() {
    let mut h = Harness::strict();
    h.define_core("+");
    let form = list(vec![
        sym("let"),
        vector(vec![sym("x"), int(1), sym("y"), int(2)]),
        list(vec![sym("+"), sym("x"), sym("y")]),
    ]);
    let expr = h.parse(&form).expect("parse let");
    match expr.kind {
        ExprKind::Let { names, values, body } => {
            assert_eq!(
                names.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
                ["x", "y"]
            );
            assert_eq!(values.len(), 2);
            assert_eq!(body.len(), 1);
        }
        other => panic!("expected let, got {:?}", other),
    }
}

#[test]
fn odd_binding_vectors_are_rejected() {
    let mut h = Harness::strict();
    let form = list(vec![
        sym("let"),
        vector(vec![sym("x"), int(1), sym("y")]),
    ]);
    let err = h.parse(&form).expect_err("odd bindings");
    assert_eq!(
        parse_error_message(err),
        "let requires an even number of forms in binding vector"
    );
}

#[test]
fn let_bindings_must_be_a_vector() {
    let mut h = Harness::strict();
    let err = h
        .parse(&list(vec![sym("let"), int(1), int(2)]))
        .expect_err("non-vector bindings");
    assert_eq!(
        parse_error_message(err),
        "let requires a vector for its bindings"
    );
}

#[test]
fn qualified_let_names_error_in_strict_and_downgrade_in_linter() {
    let mut h = Harness::strict();
    let form = list(vec![
        sym("let"),
        vector(vec![qsym("ns", "x"), int(1)]),
        int(2),
    ]);
    let err = h.parse(&form).expect_err("qualified name");
    assert_eq!(parse_error_message(err), "Can't let qualified name: ns/x");

    let mut h = Harness::linter();
    let form = list(vec![
        sym("let"),
        vector(vec![at(qsym("ns", "x"), 1, 7), int(1)]),
        int(2),
    ]);
    h.parse(&form).expect("linter continues");
    assert!(h
        .output()
        .contains("test.srl:1:7: Parse error: Can't let qualified name: ns/x"));
}

#[test]
fn a_value_cannot_see_its_own_name() {
    let mut h = Harness::strict();
    let form = list(vec![
        sym("let"),
        vector(vec![sym("x"), sym("x")]),
        sym("x"),
    ]);
    let err = h.parse(&form).expect_err("self-referential let value");
    assert_eq!(parse_error_message(err), "Unable to resolve symbol: x");
}

#[test]
fn later_values_see_earlier_names() {
    let mut h = Harness::strict();
    let form = list(vec![
        sym("let"),
        vector(vec![sym("x"), int(1), sym("y"), sym("x")]),
        sym("y"),
    ]);
    h.parse(&form).expect("sequential scoping");
}

#[test]
fn letfn_values_may_reference_each_other() {
    let mut h = Harness::strict();
    let form = list(vec![
        sym("letfn"),
        vector(vec![
            sym("even?"),
            list(vec![sym("fn"), vector(vec![sym("n")]), list(vec![sym("odd?"), sym("n")])]),
            sym("odd?"),
            list(vec![sym("fn"), vector(vec![sym("n")]), list(vec![sym("even?"), sym("n")])]),
        ]),
        list(vec![sym("even?"), int(4)]),
    ]);
    let expr = h.parse(&form).expect("mutual references resolve");
    assert!(matches!(expr.kind, ExprKind::Letfn { .. }));
}

#[test]
fn linter_warns_on_empty_bindings_and_empty_body() {
    let mut h = Harness::linter();
    h.parse(&at(list(vec![sym("let"), vector(vec![])]), 1, 1))
        .expect("empty let");
    assert_eq!(
        h.lines(),
        vec![
            "test.srl:1:1: Parse warning: let form with empty bindings vector",
            "test.srl:1:1: Parse warning: let form with empty body",
        ]
    );
}

#[test]
fn loop_does_not_warn_on_empty_bindings() {
    let mut h = Harness::linter();
    h.parse(&at(list(vec![sym("loop"), vector(vec![]), int(1)]), 1, 1))
        .expect("empty loop bindings");
    assert_eq!(h.problems(), 0);
}

#[test]
fn unused_bindings_warn_unless_skip_unused_is_set() {
    let mut h = Harness::linter();
    let form = list(vec![
        sym("let"),
        vector(vec![at(sym("x"), 1, 7), int(1)]),
        int(2),
    ]);
    h.parse(&form).expect("parse let");
    assert_eq!(
        h.lines(),
        vec!["test.srl:1:7: Parse warning: unused binding: x"]
    );

    let mut h = Harness::linter();
    let bindings = with_meta(
        vector(vec![at(sym("x"), 1, 7), int(1)]),
        vec![(kw("skip-unused"), boolean(true))],
    );
    h.parse(&list(vec![sym("let"), bindings, int(2)]))
        .expect("parse let");
    assert_eq!(h.problems(), 0);
}

#[test]
fn bindings_referenced_in_the_body_are_marked_used() {
    let mut h = Harness::linter();
    let form = list(vec![
        sym("let"),
        vector(vec![sym("x"), int(1)]),
        sym("x"),
    ]);
    h.parse(&form).expect("parse let");
    assert_eq!(h.problems(), 0);
}

#[test]
fn shadowing_an_unused_binding_in_the_same_frame_warns() {
    let mut h = Harness::linter();
    let form = list(vec![
        sym("let"),
        vector(vec![at(sym("x"), 1, 7), int(1), at(sym("x"), 1, 12), int(2)]),
        sym("x"),
    ]);
    h.parse(&form).expect("parse let");
    assert_eq!(
        h.lines(),
        vec!["test.srl:1:7: Parse warning: Unused binding: x"]
    );
}

#[test]
fn binding_types_are_inferred_from_values() {
    let mut h = Harness::linter();
    let form = list(vec![
        sym("let"),
        vector(vec![sym("n"), int(1), sym("s"), string("hi")]),
        vector(vec![sym("n"), sym("s")]),
    ]);
    let expr = h.parse(&form).expect("parse let");
    let ExprKind::Let { values, .. } = &expr.kind else {
        panic!("expected let");
    };
    assert_eq!(
        values[0].infer_type(&sorrel_core::Scope::new(), &h.env),
        Some(TypeKind::Int)
    );
    assert_eq!(
        values[1].infer_type(&sorrel_core::Scope::new(), &h.env),
        Some(TypeKind::Str)
    );
}

#[test]
fn loop_with_recur_in_tail_position() {
    let mut h = Harness::strict();
    h.define_core("zero?");
    h.define_core("dec");
    let form = list(vec![
        sym("loop"),
        vector(vec![sym("n"), int(10)]),
        list(vec![
            sym("if"),
            list(vec![sym("zero?"), sym("n")]),
            kw("done"),
            list(vec![sym("recur"), list(vec![sym("dec"), sym("n")])]),
        ]),
    ]);
    let expr = h.parse(&form).expect("parse loop");
    let ExprKind::Loop { names, body, .. } = &expr.kind else {
        panic!("expected loop");
    };
    assert_eq!(names.len(), 1);
    let ExprKind::If { negative, .. } = &body[0].kind else {
        panic!("expected if in loop body");
    };
    match &negative.kind {
        ExprKind::Recur { args } => assert_eq!(args.len(), 1),
        other => panic!("expected recur, got {:?}", other),
    }
    assert_eq!(h.problems(), 0);
}

#[test]
fn recur_outside_any_loop_is_rejected() {
    let mut h = Harness::strict();
    let err = h
        .parse(&list(vec![sym("recur"), int(1)]))
        .expect_err("no recursion point");
    assert_eq!(parse_error_message(err), "No recursion point for recur");
}

#[test]
fn recur_argument_count_must_match_the_loop_bindings() {
    let mut h = Harness::strict();
    let form = list(vec![
        sym("loop"),
        vector(vec![sym("a"), int(1), sym("b"), int(2)]),
        list(vec![sym("recur"), int(1)]),
    ]);
    let err = h.parse(&form).expect_err("arity mismatch");
    assert_eq!(
        parse_error_message(err),
        "Mismatched argument count to recur, expected: 2 args, got: 1"
    );
}

#[test]
fn recur_must_be_in_tail_position() {
    let mut h = Harness::strict();
    let form = list(vec![
        sym("loop"),
        vector(vec![sym("n"), int(1)]),
        list(vec![sym("recur"), sym("n")]),
        int(2),
    ]);
    let err = h.parse(&form).expect_err("non-tail recur");
    assert_eq!(
        parse_error_message(err),
        "Can only recur from tail position"
    );
}

#[test]
fn non_symbol_binding_names_substitute_deterministically_in_linter() {
    let mut h = Harness::linter();
    let form = list(vec![
        sym("let"),
        vector(vec![int(1), int(2)]),
        int(3),
    ]);
    let expr = h.parse(&form).expect("linter substitutes");
    let ExprKind::Let { names, .. } = &expr.kind else {
        panic!("expected let");
    };
    assert_eq!(names[0].name, "__linter_1__");
    let expr = h.parse(&form).expect("fresh context restarts the counter");
    let ExprKind::Let { names, .. } = &expr.kind else {
        panic!("expected let");
    };
    assert_eq!(names[0].name, "__linter_1__");

    let mut h = Harness::strict();
    let err = h.parse(&form).expect_err("strict mode rejects");
    assert_eq!(parse_error_message(err), "Unsupported binding form: 1");
}

#[test]
fn nested_binding_frames_track_their_depth() {
    let mut h = Harness::strict();
    let form = list(vec![
        sym("let"),
        vector(vec![sym("x"), int(1)]),
        list(vec![
            sym("let"),
            vector(vec![sym("y"), int(2)]),
            vector(vec![sym("x"), sym("y")]),
        ]),
    ]);
    h.parse(&form).expect("nested lets resolve");
}

mod common;

use std::sync::{Arc, Mutex};

use common::*;
use sorrel_core::{ExprKind, Form, FormKind, SorrelError};

fn install_macro(h: &mut Harness, name: &str) -> sorrel_core::VarId {
    let id = h.define_user(name);
    let var = h.env.var_mut(id);
    var.is_macro = true;
    var.value = Some(Form::symbol(format!("{}-impl", name)));
    id
}

/// Rewrites `(unless c a b)` into `(if c b a)`.
fn unless_evaluator() -> FnEvaluator {
    FnEvaluator::new(|expr, _env| match &expr.kind {
        ExprKind::MacroCall { args, .. } => {
            let cond = args[2].clone();
            let positive = args[3].clone();
            let negative = args[4].clone();
            Ok(Form::list(vec![
                Form::symbol("if"),
                cond,
                negative,
                positive,
            ]))
        }
        other => panic!("expected macro call, got {:?}", other),
    })
}

#[test]
fn macro_expansion_reenters_the_parser() {
    let mut h = Harness::strict();
    install_macro(&mut h, "unless");
    h.define_user("flag");
    let form = at(
        list(vec![sym("unless"), sym("flag"), int(1), int(2)]),
        3,
        1,
    );
    let expr = h
        .parse_with(&form, &mut unless_evaluator())
        .expect("expansion parses");
    match expr.kind {
        ExprKind::If {
            positive, negative, ..
        } => {
            let ExprKind::Literal { value, .. } = &positive.kind else {
                panic!("expected literal");
            };
            assert_eq!(value.kind, FormKind::Int(2));
            let ExprKind::Literal { value, .. } = &negative.kind else {
                panic!("expected literal");
            };
            assert_eq!(value.kind, FormKind::Int(1));
        }
        other => panic!("expected if, got {:?}", other),
    }
}

#[test]
fn expansion_inherits_the_call_site_position() {
    let mut h = Harness::strict();
    install_macro(&mut h, "unless");
    h.define_user("flag");
    let form = at(
        list(vec![sym("unless"), sym("flag"), int(1), int(2)]),
        7,
        4,
    );
    let expr = h
        .parse_with(&form, &mut unless_evaluator())
        .expect("expansion parses");
    assert_eq!(expr.span, Some(span(7, 4)));
    let ExprKind::If { positive, .. } = &expr.kind else {
        panic!("expected if");
    };
    assert_eq!(positive.span, Some(span(7, 4)));
}

#[test]
fn macro_arguments_carry_the_form_and_environment_first() {
    let mut h = Harness::strict();
    install_macro(&mut h, "capture");
    let seen = Arc::new(Mutex::new(None::<Vec<Form>>));
    let sink = seen.clone();
    let mut evaluator = FnEvaluator::new(move |expr, _env| {
        if let ExprKind::MacroCall { args, .. } = &expr.kind {
            *sink.lock().unwrap() = Some(args.clone());
        }
        Ok(Form::int(0))
    });
    let call = list(vec![sym("capture"), int(41)]);
    let form = list(vec![
        sym("let"),
        vector(vec![sym("y"), int(1)]),
        call.clone(),
    ]);
    h.parse_with(&form, &mut evaluator).expect("parse let");
    let args = seen.lock().unwrap().clone().expect("macro invoked");
    assert_eq!(args.len(), 3);
    assert_eq!(args[0], call);
    match &args[1].kind {
        FormKind::Map(entries) => {
            let has_y = entries
                .iter()
                .any(|(k, _)| matches!(&k.kind, FormKind::Symbol(s) if s.name == "y"));
            assert!(has_y, "local bindings map lists y");
        }
        other => panic!("expected bindings map, got {:?}", other),
    }
    assert_eq!(args[2].kind, FormKind::Int(41));
}

#[test]
fn identity_expansion_parses_like_a_plain_call() {
    let mut h = Harness::strict();
    let id = install_macro(&mut h, "noop");
    let mut evaluator = FnEvaluator::new(|expr, _env| match &expr.kind {
        ExprKind::MacroCall { args, .. } => Ok(args[0].clone()),
        other => panic!("expected macro call, got {:?}", other),
    });
    let form = list(vec![sym("noop"), int(1)]);
    let expr = h.parse_with(&form, &mut evaluator).expect("parse");
    match expr.kind {
        ExprKind::Call { callable, args } => {
            assert!(matches!(callable.kind, ExprKind::VarRef { var } if var == id));
            assert_eq!(args.len(), 1);
        }
        other => panic!("expected call, got {:?}", other),
    }
}

#[test]
fn expansion_runs_to_a_fixpoint_through_reparsing() {
    let mut h = Harness::strict();
    install_macro(&mut h, "twice");
    install_macro(&mut h, "once");
    let mut evaluator = FnEvaluator::new(|expr, _env| {
        let ExprKind::MacroCall { name, args, .. } = &expr.kind else {
            panic!("expected macro call");
        };
        match name.as_str() {
            "user/twice" => Ok(Form::list(vec![Form::symbol("once"), args[2].clone()])),
            "user/once" => Ok(args[2].clone()),
            other => panic!("unexpected macro {}", other),
        }
    });
    let form = list(vec![sym("twice"), int(9)]);
    let expr = h.parse_with(&form, &mut evaluator).expect("parse");
    let ExprKind::Literal { value, .. } = &expr.kind else {
        panic!("expected literal, got {:?}", expr.kind);
    };
    assert_eq!(value.kind, FormKind::Int(9));
}

#[test]
fn local_bindings_shadow_macros() {
    let mut h = Harness::strict();
    install_macro(&mut h, "m");
    let mut evaluator = FnEvaluator::new(|_expr, _env| {
        panic!("macro must not expand when shadowed by a local");
    });
    let form = list(vec![
        sym("let"),
        vector(vec![sym("m"), int(1)]),
        list(vec![sym("m"), int(2)]),
    ]);
    let expr = h.parse_with(&form, &mut evaluator).expect("parse let");
    let ExprKind::Let { body, .. } = &expr.kind else {
        panic!("expected let");
    };
    match &body[0].kind {
        ExprKind::Call { callable, .. } => {
            assert!(matches!(callable.kind, ExprKind::Binding { .. }))
        }
        other => panic!("expected call, got {:?}", other),
    }
}

#[test]
fn macro_vars_without_a_value_are_not_expanded() {
    let mut h = Harness::strict();
    let id = h.define_user("hollow");
    h.env.var_mut(id).is_macro = true;
    let mut evaluator = FnEvaluator::new(|_expr, _env| {
        panic!("valueless macro must not be invoked");
    });
    let form = list(vec![sym("hollow"), int(1)]);
    h.parse_with(&form, &mut evaluator).expect("parsed as call");
}

#[test]
fn evaluator_errors_abort_the_form() {
    let mut h = Harness::strict();
    install_macro(&mut h, "explode");
    let mut evaluator =
        FnEvaluator::new(|_expr, _env| Err(SorrelError::eval("macro blew up")));
    let form = list(vec![sym("explode")]);
    let err = h.parse_with(&form, &mut evaluator).expect_err("eval error");
    assert!(matches!(err, SorrelError::Eval(_)));
}

#[test]
fn expansion_preserves_existing_positions_and_metadata() {
    let mut h = Harness::strict();
    install_macro(&mut h, "wrap");
    let mut evaluator = FnEvaluator::new(|expr, _env| {
        let ExprKind::MacroCall { args, .. } = &expr.kind else {
            panic!("expected macro call");
        };
        // Splice the original argument, which has its own position,
        // into a freshly built vector that has none.
        Ok(Form::vector(vec![
            args[2].clone(),
            with_meta(Form::int(5), vec![(kw("fresh"), boolean(true))]),
        ]))
    });
    let arg = at(int(3), 9, 9);
    let form = at(list(vec![sym("wrap"), arg]), 2, 2);
    let expr = h.parse_with(&form, &mut evaluator).expect("parse");
    let ExprKind::Vector { items } = &expr.kind else {
        panic!("expected vector, got {:?}", expr.kind);
    };
    assert_eq!(items[0].span, Some(span(9, 9)), "original position kept");
    assert_eq!(items[1].span, Some(span(2, 2)), "new node inherits call site");
    assert_eq!(expr.span, Some(span(2, 2)));
}

use crate::config::LintConfig;
use crate::diagnostics::Diagnostics;
use crate::env::{GlobalEnv, Namespace, Var};
use crate::error::SorrelError;
use crate::expr::{Expr, ExprKind};
use crate::form::{FormKind, MetaMap, Span, Symbol, CORE_FILENAME, USER_FILENAME};
use crate::parser::ParseContext;
use crate::scope::Binding;
use crate::types::TypeKind;

pub(crate) fn needs_unused_warning(binding: &Binding) -> bool {
    let name = &binding.name;
    !binding.used
        && !name.name.starts_with('_')
        && !name.name.starts_with("&form")
        && !name.name.starts_with("&env")
        && !name
            .meta()
            .map(|meta| meta.truthy_kw("skip-unused"))
            .unwrap_or(false)
}

/// Warns about unused bindings in the innermost frame, sorted by name
/// for deterministic output.
pub(crate) fn warn_unused_top_frame(ctx: &mut ParseContext, label: &str) {
    let mut unused: Vec<Symbol> = Vec::new();
    for id in ctx.scope.top_frame_bindings() {
        let binding = ctx.scope.get(id);
        if needs_unused_warning(binding) {
            unused.push(binding.name.clone());
        }
    }
    unused.sort_by(|a, b| a.name.cmp(&b.name));
    for sym in unused {
        ctx.diag
            .parse_warning(sym.span.as_ref(), &format!("{}{}", label, sym));
    }
}

/// Whether the callable may be a macro the analyzer cannot expand, so
/// unresolved symbols among its arguments should not be reported. For
/// known macros the returned symbols are pushed as linter bindings.
pub(crate) fn is_unknown_callable(
    expr: &Expr,
    ctx: &mut ParseContext,
) -> (bool, Option<Vec<Symbol>>) {
    if !ctx.config.is_linter() {
        return (false, None);
    }
    let ExprKind::VarRef { var } = &expr.kind else {
        return (false, None);
    };
    let (is_macro, is_fake, has_expr, var_ns, sym) = {
        let var = ctx.env.var(*var);
        let current = ctx.env.current_ns();
        let core = ctx.env.core_ns();
        let sym = if var.ns != current && var.ns != core {
            Symbol::qualified(
                ctx.env.namespace(var.ns).name.name.clone(),
                var.name.name.clone(),
            )
        } else {
            Symbol::new(var.name.name.clone())
        };
        (var.is_macro, var.is_fake, var.expr.is_some(), var.ns, sym)
    };
    if is_macro {
        return (true, None);
    }
    if let Some(params) = known_macros_entry(&sym, ctx) {
        return (true, params);
    }
    if has_expr {
        return (false, None);
    }
    if !sym.is_qualified() && is_fake && var_ns != ctx.env.core_ns() {
        return (true, None);
    }
    (false, None)
}

/// Looks the symbol up in the core `*known-macros*` map. The outer
/// option is the hit; the inner one is the macro's binding symbols.
fn known_macros_entry(sym: &Symbol, ctx: &mut ParseContext) -> Option<Option<Vec<Symbol>>> {
    let known = ctx.known_macros_var()?;
    let value = ctx.env.var(known).value.as_ref()?;
    let FormKind::Map(entries) = &value.kind else {
        return None;
    };
    let key = FormKind::Symbol(sym.clone());
    let (_, binding_forms) = entries.iter().find(|(k, _)| k.kind == key)?;
    let params = match &binding_forms.kind {
        FormKind::List(items) | FormKind::Vector(items) => Some(
            items
                .iter()
                .filter_map(|form| form.to_symbol())
                .collect::<Vec<_>>(),
        ),
        _ => None,
    };
    Some(params)
}

pub(crate) fn tagged_types(meta: Option<&MetaMap>) -> Vec<TypeKind> {
    let Some(meta) = meta else {
        return Vec::new();
    };
    let Some(tag) = meta.get_kw("tag") else {
        return Vec::new();
    };
    match &tag.kind {
        FormKind::Symbol(sym) if !sym.is_qualified() => {
            TypeKind::lookup(&sym.name).into_iter().collect()
        }
        FormKind::String(s) => s.split('|').filter_map(TypeKind::lookup).collect(),
        _ => Vec::new(),
    }
}

fn types_string(types: &[TypeKind]) -> String {
    types
        .iter()
        .map(|t| t.name())
        .collect::<Vec<_>>()
        .join(" or ")
}

/// Cross-checks declared `:tag` types against inferred argument types.
/// Returns whether a mismatch was reported.
fn check_types(params: &[Symbol], args: &[Expr], name: &str, ctx: &mut ParseContext) -> bool {
    let mut reported = false;
    for (i, param) in params.iter().enumerate() {
        let declared = tagged_types(param.meta());
        if declared.is_empty() {
            continue;
        }
        let Some(arg) = args.get(i) else {
            continue;
        };
        let Some(passed) = arg.infer_type(&ctx.scope, ctx.env) else {
            continue;
        };
        if !declared.iter().any(|t| t.is_equal_or_implements(passed)) {
            ctx.diag.parse_warning(
                arg.span.as_ref(),
                &format!(
                    "arg[{}] of {} must have type {}, got {}",
                    i,
                    name,
                    types_string(&declared),
                    passed
                ),
            );
            reported = true;
        }
    }
    reported
}

fn select_arity<'f>(
    arities: &'f [crate::expr::FnArityExpr],
    variadic: Option<&'f crate::expr::FnArityExpr>,
    passed: usize,
) -> Option<&'f crate::expr::FnArityExpr> {
    if let Some(arity) = arities.iter().find(|a| a.params.len() == passed) {
        return Some(arity);
    }
    if let Some(variadic) = variadic {
        if passed >= variadic.params.len().saturating_sub(1) {
            return Some(variadic);
        }
    }
    None
}

/// Checks a call against a known fn expression. Macro calls carry the
/// form and local environment as extra leading arguments. Returns
/// whether a problem was reported.
fn report_wrong_arity(
    fn_expr: &Expr,
    is_macro: bool,
    args: &[Expr],
    name: &str,
    pos: Option<&Span>,
    ctx: &mut ParseContext,
) -> bool {
    let ExprKind::Fn {
        arities, variadic, ..
    } = &fn_expr.kind
    else {
        return false;
    };
    let mut passed = args.len();
    if is_macro {
        passed += 2;
    }
    if let Some(arity) = select_arity(arities, variadic.as_deref(), passed) {
        let params = arity.params.clone();
        return check_types(&params, args, name, ctx);
    }
    ctx.diag.parse_warning(
        pos,
        &format!("Wrong number of args ({}) passed to {}", args.len(), name),
    );
    true
}

/// Whether any arglist vector admits the given argument count,
/// including `&`-variadic tails.
fn check_arglist(vectors: &[crate::form::Form], passed: usize) -> bool {
    for v in vectors {
        if let Some(params) = v.as_vector() {
            let n = params.len();
            let has_amp = n >= 2
                && params[n - 2]
                    .as_symbol()
                    .map(|sym| !sym.is_qualified() && sym.name == "&")
                    .unwrap_or(false);
            if n == passed || (has_amp && passed >= n - 2) {
                return true;
            }
        }
    }
    false
}

fn form_is_callable(kind: &FormKind) -> bool {
    matches!(
        kind,
        FormKind::Keyword(_)
            | FormKind::Map(_)
            | FormKind::Set(_)
            | FormKind::Vector(_)
            | FormKind::Var(_)
    )
}

fn report_not_a_function(ctx: &mut ParseContext, pos: Option<&Span>, name: &str) {
    ctx.diag
        .parse_warning(pos, &format!("{} is not a function", name));
}

fn all_literal(args: &[Expr]) -> bool {
    args.iter().all(Expr::is_literal)
}

fn unwrap_meta(expr: Option<Expr>) -> Option<Expr> {
    match expr {
        Some(Expr {
            kind: ExprKind::Meta { expr, .. },
            ..
        }) => Some(*expr),
        other => other,
    }
}

/// Structural checks for a callable that is not a resolved var: map
/// and set literals take fixed argument counts, keywords one or two,
/// and some expressions can never be called.
fn check_call_expr(
    expr: &Expr,
    is_macro: bool,
    args: &[Expr],
    name: &str,
    pos: Option<&Span>,
    ctx: &mut ParseContext,
) {
    match &expr.kind {
        ExprKind::Fn { .. } => {
            report_wrong_arity(expr, is_macro, args, name, pos, ctx);
        }
        ExprKind::Map { .. } => {
            if args.is_empty() || args.len() > 2 {
                ctx.diag.parse_warning(
                    pos,
                    &format!("Wrong number of args ({}) passed to a map", args.len()),
                );
            }
        }
        ExprKind::Set { .. } => {
            if args.len() != 1 {
                ctx.diag.parse_warning(
                    pos,
                    &format!("Wrong number of args ({}) passed to a set", args.len()),
                );
            }
        }
        ExprKind::Literal { value, surrogate } => {
            if !form_is_callable(&value.kind) && !surrogate {
                report_not_a_function(ctx, pos, name);
                return;
            }
            if let FormKind::Keyword(_) = value.kind {
                if args.is_empty() || args.len() > 2 {
                    ctx.diag.parse_warning(
                        pos,
                        &format!("Wrong number of args ({}) passed to {}", args.len(), name),
                    );
                }
            }
        }
        ExprKind::Recur { .. } | ExprKind::Throw { .. } => report_not_a_function(ctx, pos, name),
        _ => {}
    }
}

/// Linter-mode call-site validation, plus immediate evaluation of
/// namespace-shaping calls so later symbols resolve through the new
/// aliases.
pub(crate) fn check_call_site(call: &Expr, ctx: &mut ParseContext) -> Result<(), SorrelError> {
    let ExprKind::Call { callable, args } = &call.kind else {
        return Ok(());
    };
    let pos = call.span.as_ref();
    match &callable.kind {
        ExprKind::VarRef { var } => {
            let var = *var;
            let name = callable.callable_name(ctx.env);
            let (is_macro, has_value, value_callable, def_expr, arglist) = {
                let v = ctx.env.var(var);
                (
                    v.is_macro,
                    v.value.is_some(),
                    v.value
                        .as_ref()
                        .map(|form| form_is_callable(&form.kind))
                        .unwrap_or(false),
                    unwrap_meta(v.expr.clone()),
                    v.meta.as_ref().and_then(|m| m.get_kw("arglist")).cloned(),
                )
            };
            let mut wrong_arity = false;
            if let Some(
                fn_expr @ Expr {
                    kind: ExprKind::Fn { .. },
                    ..
                },
            ) = &def_expr
            {
                wrong_arity = report_wrong_arity(fn_expr, is_macro, args, &name, pos, ctx);
            } else if let Some(arglist) = &arglist {
                let vectors = match &arglist.kind {
                    FormKind::List(items) | FormKind::Vector(items) => Some(items.as_slice()),
                    _ => None,
                };
                if let Some(vectors) = vectors {
                    if !check_arglist(vectors, args.len()) {
                        ctx.diag.parse_warning(
                            pos,
                            &format!(
                                "Wrong number of args ({}) passed to {}",
                                args.len(),
                                name
                            ),
                        );
                        wrong_arity = true;
                    }
                }
            } else if has_value {
                if !value_callable {
                    report_not_a_function(ctx, pos, &name);
                }
            } else if let Some(expr) = &def_expr {
                check_call_expr(expr, is_macro, args, &name, pos, ctx);
            }
            if !wrong_arity && ctx.is_ns_shaping_var(var) && all_literal(args) {
                ctx.evaluator.eval(call, ctx.env)?;
            }
        }
        _ => {
            let name = callable.callable_name(ctx.env);
            check_call_expr(callable, false, args, &name, pos, ctx);
        }
    }
    Ok(())
}

fn is_record_constructor(sym: &Symbol) -> bool {
    !sym.is_qualified() && (sym.name.starts_with("->") || sym.name.starts_with("map->"))
}

fn is_entry_point_ns(config: &LintConfig, ns: &Namespace) -> bool {
    config.entry_points.contains(&Symbol::new(ns.name.name.clone()))
}

fn is_entry_point_var(env: &GlobalEnv, config: &LintConfig, var: &Var) -> bool {
    let ns = env.namespace(var.ns);
    is_entry_point_ns(config, ns)
        || config
            .entry_points
            .contains(&Symbol::qualified(ns.name.name.clone(), var.name.name.clone()))
}

fn is_internal_file(span: &Span) -> bool {
    let file = span.file_name();
    file == CORE_FILENAME || file == USER_FILENAME
}

/// Marks every non-core namespace and var used. Hosts call this
/// between files so per-file unused warnings stay local to the file
/// being analyzed.
pub fn reset_usage(env: &mut GlobalEnv) {
    let core = env.core_ns();
    let namespaces: Vec<_> = env
        .all_namespaces()
        .map(|(id, _)| id)
        .filter(|id| *id != core)
        .collect();
    for id in namespaces {
        env.namespace_mut(id).used = true;
        let vars: Vec<_> = env.namespace(id).mappings().map(|(_, var)| var).collect();
        for var in vars {
            env.var_mut(var).used = true;
        }
    }
}

fn warn_sorted(diag: &mut Diagnostics, mut entries: Vec<(String, Span)>, label: &str) {
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    for (name, span) in entries {
        diag.parse_warning(Some(&span), &format!("{}{}", label, name));
    }
}

pub fn warn_on_unused_namespaces(env: &GlobalEnv, config: &LintConfig, diag: &mut Diagnostics) {
    let current = env.current_ns();
    let mut entries = Vec::new();
    for (id, ns) in env.all_namespaces() {
        if id == current || ns.used {
            continue;
        }
        if config.ignored_unused_namespaces.contains(&ns.name.name) {
            continue;
        }
        let Some(span) = &ns.name.span else { continue };
        if is_internal_file(span) {
            continue;
        }
        entries.push((ns.name.name.clone(), span.clone()));
    }
    warn_sorted(diag, entries, "unused namespace ");
}

pub fn warn_on_globally_unused_namespaces(
    env: &GlobalEnv,
    config: &LintConfig,
    diag: &mut Diagnostics,
) {
    let mut entries = Vec::new();
    for (_, ns) in env.all_namespaces() {
        if ns.globally_used {
            continue;
        }
        if config.ignored_unused_namespaces.contains(&ns.name.name) {
            continue;
        }
        if is_entry_point_ns(config, ns) {
            continue;
        }
        let Some(span) = &ns.name.span else { continue };
        if is_internal_file(span) {
            continue;
        }
        entries.push((ns.name.name.clone(), span.clone()));
    }
    warn_sorted(diag, entries, "globally unused namespace ");
}

/// Private vars never referenced in their own file.
pub fn warn_on_unused_vars(env: &GlobalEnv, diag: &mut Diagnostics) {
    let core = env.core_ns();
    let mut entries = Vec::new();
    for (ns_id, ns) in env.all_namespaces() {
        if ns_id == core {
            continue;
        }
        for (_, var_id) in ns.mappings() {
            let var = env.var(var_id);
            if var.ns != ns_id || var.used || !var.is_private {
                continue;
            }
            let Some(span) = &var.span else { continue };
            entries.push((var.name.name.clone(), span.clone()));
        }
    }
    warn_sorted(diag, entries, "unused var ");
}

/// Public vars never referenced anywhere in the program.
pub fn warn_on_globally_unused_vars(env: &GlobalEnv, config: &LintConfig, diag: &mut Diagnostics) {
    let core = env.core_ns();
    let mut entries = Vec::new();
    for (ns_id, ns) in env.all_namespaces() {
        if ns_id == core {
            continue;
        }
        for (_, var_id) in ns.mappings() {
            let var = env.var(var_id);
            if var.ns != ns_id || var.globally_used || var.is_private {
                continue;
            }
            if is_record_constructor(&var.name) || is_entry_point_var(env, config, var) {
                continue;
            }
            let Some(span) = &var.span else { continue };
            entries.push((env.var_qualified_name(var_id), span.clone()));
        }
    }
    warn_sorted(diag, entries, "globally unused var ");
}

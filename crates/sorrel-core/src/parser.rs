use std::mem;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::{Dialect, LintConfig};
use crate::diagnostics::Diagnostics;
use crate::env::{GlobalEnv, VarId};
use crate::error::SorrelError;
use crate::eval::Evaluator;
use crate::expr::{CatchClause, Expr, ExprKind, FnArityExpr};
use crate::form::{Form, FormKind, MetaMap, Span, Symbol, CORE_FILENAME};
use crate::lint;
use crate::scope::Scope;
use crate::types::TypeKind;

/// Core vars the analyzer resolves lazily on first use.
#[derive(Default)]
pub(crate) struct WellKnownVars {
    pub(crate) require: Option<VarId>,
    pub(crate) refer: Option<VarId>,
    pub(crate) alias: Option<VarId>,
    pub(crate) create_ns: Option<VarId>,
    pub(crate) in_ns: Option<VarId>,
    pub(crate) known_macros: Option<VarId>,
}

/// Everything one analysis pass needs: the global environment, the
/// diagnostic sink, the evaluator seam, the lint configuration, and
/// the per-form lexical state.
pub struct ParseContext<'a> {
    pub env: &'a mut GlobalEnv,
    pub diag: &'a mut Diagnostics,
    pub evaluator: &'a mut dyn Evaluator,
    pub config: &'a LintConfig,
    pub(crate) scope: Scope,
    /// Bindings introduced by known macros around unknown-callable
    /// arguments; consulted only to suppress unresolved-symbol errors.
    pub(crate) linter_scope: Scope,
    pub(crate) loop_bindings: Vec<Vec<Symbol>>,
    pub(crate) recur: bool,
    pub(crate) no_recur_allowed: bool,
    pub(crate) unknown_callable_scope: bool,
    gensym_counter: usize,
    pub(crate) well_known: WellKnownVars,
}

impl<'a> ParseContext<'a> {
    pub fn new(
        env: &'a mut GlobalEnv,
        diag: &'a mut Diagnostics,
        evaluator: &'a mut dyn Evaluator,
        config: &'a LintConfig,
    ) -> Self {
        Self {
            env,
            diag,
            evaluator,
            config,
            scope: Scope::new(),
            linter_scope: Scope::new(),
            loop_bindings: Vec::new(),
            recur: false,
            no_recur_allowed: false,
            unknown_callable_scope: false,
            gensym_counter: 0,
            well_known: WellKnownVars::default(),
        }
    }

    /// Deterministic placeholder for a binding position the linter
    /// could not make sense of. Leading underscore keeps it exempt
    /// from unused warnings.
    fn gensym(&mut self) -> Symbol {
        self.gensym_counter += 1;
        Symbol::new(format!("__linter_{}__", self.gensym_counter))
    }

    pub(crate) fn known_macros_var(&mut self) -> Option<VarId> {
        if self.well_known.known_macros.is_none() {
            let core = self.env.core_ns();
            self.well_known.known_macros = self.env.resolve_in(core, "*known-macros*");
        }
        self.well_known.known_macros
    }

    /// Whether the var is one of the namespace-shaping core functions
    /// evaluated immediately at analysis time.
    pub(crate) fn is_ns_shaping_var(&mut self, id: VarId) -> bool {
        let core = self.env.core_ns();
        let env = &*self.env;
        let wk = &mut self.well_known;
        let slots: [(&mut Option<VarId>, &str); 5] = [
            (&mut wk.require, "require"),
            (&mut wk.refer, "refer"),
            (&mut wk.alias, "alias"),
            (&mut wk.create_ns, "create-ns"),
            (&mut wk.in_ns, "in-ns"),
        ];
        for (slot, name) in slots {
            if slot.is_none() {
                *slot = env.resolve_in(core, name);
            }
            if *slot == Some(id) {
                return true;
            }
        }
        false
    }
}

/// Parses one read object into an expression. Containers that carry
/// reader metadata come back wrapped in a `Meta` expression.
pub fn parse(form: &Form, ctx: &mut ParseContext) -> Result<Expr, SorrelError> {
    match &form.kind {
        FormKind::List(_) => parse_list(form, ctx),
        FormKind::Symbol(_) => parse_symbol(form, ctx),
        FormKind::Vector(items) => {
            let items = parse_seq(items, ctx)?;
            let expr = Expr::new(ExprKind::Vector { items }, form.span.clone());
            wrap_container_meta(expr, form, ctx)
        }
        FormKind::Map(entries) => {
            let expr = parse_map_entries(entries, form.span.clone(), ctx)?;
            wrap_container_meta(expr, form, ctx)
        }
        FormKind::Set(items) => {
            let items = parse_seq(items, ctx)?;
            let expr = Expr::new(ExprKind::Set { items }, form.span.clone());
            wrap_container_meta(expr, form, ctx)
        }
        _ => Ok(Expr::literal(form.clone())),
    }
}

/// The per-form boundary: reports the error that aborted this
/// top-level form and hands it back so the driver can decide whether
/// to abort (strict) or continue with the next form (linter).
pub fn try_parse(form: &Form, ctx: &mut ParseContext) -> Result<Expr, SorrelError> {
    match parse(form, ctx) {
        Ok(expr) => Ok(expr),
        Err(err) => {
            ctx.diag.report(&err);
            Err(err)
        }
    }
}

fn parse_seq(items: &[Form], ctx: &mut ParseContext) -> Result<Vec<Expr>, SorrelError> {
    items.iter().map(|form| parse(form, ctx)).collect()
}

fn parse_map_entries(
    entries: &[(Form, Form)],
    span: Option<Span>,
    ctx: &mut ParseContext,
) -> Result<Expr, SorrelError> {
    let mut keys = Vec::with_capacity(entries.len());
    let mut values = Vec::with_capacity(entries.len());
    for (k, v) in entries {
        keys.push(parse(k, ctx)?);
        values.push(parse(v, ctx)?);
    }
    Ok(Expr::new(ExprKind::Map { keys, values }, span))
}

fn parse_meta_map(
    meta: &MetaMap,
    span: Option<Span>,
    ctx: &mut ParseContext,
) -> Result<Expr, SorrelError> {
    let mut keys = Vec::with_capacity(meta.len());
    let mut values = Vec::with_capacity(meta.len());
    for (k, v) in meta.iter() {
        keys.push(parse(k, ctx)?);
        values.push(parse(v, ctx)?);
    }
    Ok(Expr::new(ExprKind::Map { keys, values }, span))
}

fn wrap_container_meta(
    expr: Expr,
    form: &Form,
    ctx: &mut ParseContext,
) -> Result<Expr, SorrelError> {
    match form.meta.as_deref() {
        Some(meta) => {
            let meta_expr = parse_meta_map(meta, form.span.clone(), ctx)?;
            Ok(Expr::new(
                ExprKind::Meta {
                    meta: Box::new(meta_expr),
                    expr: Box::new(expr),
                },
                form.span.clone(),
            ))
        }
        None => Ok(expr),
    }
}

fn check_form(
    form: &Form,
    items: &[Form],
    min: usize,
    max: usize,
) -> Result<usize, SorrelError> {
    let count = items.len();
    if count < min {
        return Err(SorrelError::parse_at(
            format!("Too few arguments to {}", items[0]),
            form,
        ));
    }
    if count > max {
        return Err(SorrelError::parse_at(
            format!("Too many arguments to {}", items[0]),
            form,
        ));
    }
    Ok(count)
}

/// Forms whose head was read from the bundled core library are
/// considered macro output.
fn is_created_by_macro(items: &[Form]) -> bool {
    items
        .first()
        .and_then(|form| form.span.as_ref())
        .map(|span| span.file_name() == CORE_FILENAME)
        .unwrap_or(false)
}

fn skip_redundant_do(form: &Form) -> bool {
    form.meta()
        .map(|meta| meta.truthy_kw("skip-redundant-do"))
        .unwrap_or(false)
}

pub(crate) fn tagged_type(meta: Option<&MetaMap>) -> Option<TypeKind> {
    let tag = meta?.get_kw("tag")?;
    match &tag.kind {
        FormKind::Symbol(sym) if !sym.is_qualified() => TypeKind::lookup(&sym.name),
        _ => None,
    }
}

fn parse_list(form: &Form, ctx: &mut ParseContext) -> Result<Expr, SorrelError> {
    if let Some(expanded) = macroexpand1(form, ctx)? {
        return parse(&expanded, ctx);
    }
    let items = match form.as_list() {
        Some(items) if !items.is_empty() => items,
        _ => return Ok(Expr::literal(form.clone())),
    };
    let saved_unknown = ctx.unknown_callable_scope;
    ctx.unknown_callable_scope = false;
    let res = parse_list_inner(form, items, saved_unknown, ctx);
    ctx.unknown_callable_scope = saved_unknown;
    res
}

fn parse_list_inner(
    form: &Form,
    items: &[Form],
    saved_unknown: bool,
    ctx: &mut ParseContext,
) -> Result<Expr, SorrelError> {
    let span = form.span.clone();
    let first = &items[0];
    if let Some(head) = first.as_symbol() {
        if !head.is_qualified() {
            match head.name.as_str() {
                "quote" => {
                    check_form(form, items, 2, 2)?;
                    return Ok(Expr::literal(items[1].clone()));
                }
                "if" => {
                    check_form(form, items, 3, 4)?;
                    if ctx.config.is_linter() && items.len() < 4 && ctx.config.if_without_else {
                        ctx.diag.parse_warning(span.as_ref(), "missing else branch");
                    }
                    let cond = parse(&items[1], ctx)?;
                    let positive = parse(&items[2], ctx)?;
                    let negative = match items.get(3) {
                        Some(form) => parse(form, ctx)?,
                        None => Expr::new(
                            ExprKind::Literal {
                                value: Form::nil(),
                                surrogate: false,
                            },
                            span.clone(),
                        ),
                    };
                    return Ok(Expr::new(
                        ExprKind::If {
                            cond: Box::new(cond),
                            positive: Box::new(positive),
                            negative: Box::new(negative),
                        },
                        span,
                    ));
                }
                "fn" => return parse_fn(form, items, ctx),
                "let" => return parse_let_loop(LetKind::Let, form, items, ctx),
                "letfn" => return parse_let_loop(LetKind::Letfn, form, items, ctx),
                "loop" => return parse_let_loop(LetKind::Loop, form, items, ctx),
                "recur" => return parse_recur(form, items, ctx),
                // A var's macro flag has to be set during the parse
                // stage for the linter to count arguments correctly.
                "set-macro__" => return parse_set_macro(form, items, ctx),
                "def" => return parse_def(form, items, false, ctx),
                "def-linter__" => return parse_def(form, items, true, ctx),
                "var" => return parse_var(form, items, ctx),
                "do" => {
                    let body = parse_body(&items[1..], ctx)?;
                    let created_by_macro = is_created_by_macro(items);
                    if ctx.config.is_linter() && !created_by_macro {
                        if body.is_empty() {
                            ctx.diag
                                .parse_warning(span.as_ref(), "do form with empty body");
                        } else if body.len() == 1 {
                            ctx.diag.parse_warning(span.as_ref(), "redundant do form");
                        }
                    }
                    return Ok(Expr::new(
                        ExprKind::Do {
                            body,
                            created_by_macro,
                        },
                        span,
                    ));
                }
                "throw" => {
                    check_form(form, items, 2, 2)?;
                    let value = parse(&items[1], ctx)?;
                    return Ok(Expr::new(
                        ExprKind::Throw {
                            value: Box::new(value),
                        },
                        span,
                    ));
                }
                "try" => return parse_try(form, items, ctx),
                _ => {}
            }
        }
    }

    ctx.unknown_callable_scope = saved_unknown;
    let callable = parse(first, ctx)?;
    let (unknown, macro_params) = lint::is_unknown_callable(&callable, ctx);
    let mut pushed_linter_frame = false;
    if unknown {
        ctx.unknown_callable_scope = true;
        if let Some(syms) = macro_params {
            ctx.linter_scope.push_frame();
            for sym in syms {
                ctx.linter_scope.add(sym, 0, None);
            }
            pushed_linter_frame = true;
        }
    } else {
        ctx.unknown_callable_scope = false;
    }
    let args = parse_seq(&items[1..], ctx);
    if pushed_linter_frame {
        ctx.linter_scope.pop_frame();
    }
    let call = Expr::new(
        ExprKind::Call {
            callable: Box::new(callable),
            args: args?,
        },
        span,
    );
    if ctx.config.is_linter() {
        lint::check_call_site(&call, ctx)?;
    }
    Ok(call)
}

fn parse_body(items: &[Form], ctx: &mut ParseContext) -> Result<Vec<Expr>, SorrelError> {
    let saved_recur = mem::replace(&mut ctx.recur, false);
    let res = parse_body_inner(items, ctx);
    ctx.recur = saved_recur;
    res
}

fn parse_body_inner(items: &[Form], ctx: &mut ParseContext) -> Result<Vec<Expr>, SorrelError> {
    let mut res = Vec::with_capacity(items.len());
    for (i, form) in items.iter().enumerate() {
        let expr = parse(form, ctx)?;
        let more_follow = i + 1 < items.len();
        if ctx.recur && more_follow && !ctx.config.is_linter() {
            return Err(SorrelError::parse_at(
                "Can only recur from tail position",
                form,
            ));
        }
        if ctx.config.is_linter() {
            match &expr.kind {
                ExprKind::Def {
                    created_by_macro: false,
                    ..
                } => ctx.diag.parse_warning(expr.span.as_ref(), "inline def"),
                ExprKind::Do {
                    created_by_macro: false,
                    ..
                } if !skip_redundant_do(form) => ctx
                    .diag
                    .parse_warning(expr.span.as_ref(), "redundant do form"),
                _ => {}
            }
        }
        res.push(expr);
    }
    Ok(res)
}

fn parse_def(
    form: &Form,
    items: &[Form],
    for_linter: bool,
    ctx: &mut ParseContext,
) -> Result<Expr, SorrelError> {
    let count = check_form(form, items, 2, 4)?;
    let second = &items[1];
    let sym = match second.to_symbol() {
        Some(sym) => sym,
        None => {
            return Err(SorrelError::parse_at(
                "First argument to def must be a Symbol",
                second,
            ))
        }
    };
    let current = ctx.env.current_ns();
    if let Some(ns) = &sym.ns {
        if *ns != ctx.env.namespace(current).name.name {
            return Err(SorrelError::parse_at(
                "Can't create defs outside of current ns",
                form,
            ));
        }
    }
    // Intern before parsing the value so self-referential defs resolve.
    let var = ctx.env.intern(current, &sym.unqualified());
    if for_linter {
        ctx.env.var_mut(var).globally_used = true;
    }
    let created_by_macro = is_created_by_macro(items);
    let mut meta = sym.meta().cloned();
    let mut value = None;
    if count == 3 {
        value = Some(parse(&items[2], ctx)?);
    } else if count == 4 {
        value = Some(parse(&items[3], ctx)?);
        let docstring = &items[2];
        match &docstring.kind {
            FormKind::String(_) => {
                let mut m = meta.unwrap_or_default();
                m.assoc(Form::keyword("doc"), docstring.clone());
                meta = Some(m);
            }
            _ => {
                return Err(SorrelError::parse_at("Docstring must be a string", docstring));
            }
        }
    }
    update_var(ctx, var, form, &value, &sym);
    let meta_expr = match &meta {
        Some(meta) => Some(Box::new(parse_meta_map(meta, form.span.clone(), ctx)?)),
        None => None,
    };
    Ok(Expr::new(
        ExprKind::Def {
            var,
            name: sym,
            value: value.map(Box::new),
            meta: meta_expr,
            created_by_macro,
        },
        form.span.clone(),
    ))
}

fn update_var(
    ctx: &mut ParseContext,
    id: VarId,
    form: &Form,
    value: &Option<Expr>,
    sym: &Symbol,
) {
    let tagged = tagged_type(sym.meta());
    let var = ctx.env.var_mut(id);
    var.span = form.span.clone();
    var.expr = value.clone();
    if let Some(meta) = sym.meta() {
        if let Some(private) = meta.get_kw("private") {
            var.is_private = private.is_truthy();
        }
        if let Some(dynamic) = meta.get_kw("dynamic") {
            var.is_dynamic = dynamic.is_truthy();
        }
        var.tagged_type = tagged;
    }
}

fn parse_var(form: &Form, items: &[Form], ctx: &mut ParseContext) -> Result<Expr, SorrelError> {
    check_form(form, items, 2, 2)?;
    let sym = match items[1].to_symbol() {
        Some(sym) => sym,
        None => {
            return Err(SorrelError::parse_at("var's argument must be a symbol", form));
        }
    };
    let var = match ctx.env.resolve(&sym) {
        Some(var) => var,
        None => {
            if !ctx.config.is_linter() {
                return Err(SorrelError::parse_at(
                    format!("Unable to resolve var {} in this context", sym),
                    form,
                ));
            }
            let current = ctx.env.current_ns();
            let sym_ns = ctx.env.namespace_for(current, &sym);
            if !ctx.unknown_callable_scope && (sym_ns.is_none() || sym_ns == Some(current)) {
                ctx.diag.parse_error(
                    form.span.as_ref(),
                    &format!("Unable to resolve symbol: {}", sym),
                );
            }
            ctx.env.intern_fake(sym_ns, &sym)
        }
    };
    ctx.env.mark_var_used(var);
    Ok(Expr::new(
        ExprKind::Literal {
            value: Form::var(var),
            surrogate: false,
        },
        form.span.clone(),
    ))
}

fn parse_set_macro(
    form: &Form,
    items: &[Form],
    ctx: &mut ParseContext,
) -> Result<Expr, SorrelError> {
    check_form(form, items, 2, 2)?;
    let expr = parse(&items[1], ctx)?;
    if let ExprKind::Literal { value, .. } = &expr.kind {
        if let FormKind::Var(id) = value.kind {
            // Applied at parse time, not evaluation time.
            let var = ctx.env.var_mut(id);
            var.is_macro = true;
            let mut meta = var.meta.take().unwrap_or_default();
            meta.assoc(Form::keyword("macro"), Form::boolean(true));
            var.meta = Some(meta);
            return Ok(Expr::new(ExprKind::SetMacro { var: id }, form.span.clone()));
        }
    }
    Err(SorrelError::parse_at(
        "set-macro__ argument must be a var",
        form,
    ))
}

fn parse_params(
    form: &Form,
    ctx: &mut ParseContext,
) -> Result<(Vec<Symbol>, bool), SorrelError> {
    let v = match form.as_vector() {
        Some(v) => v,
        None => {
            return Err(SorrelError::parse_at(
                format!("Parameter declaration must be a vector. Got: {}", form),
                form,
            ))
        }
    };
    let mut res = Vec::with_capacity(v.len());
    for (i, ro) in v.iter().enumerate() {
        let is_amp = ro
            .as_symbol()
            .map(|sym| !sym.is_qualified() && sym.name == "&")
            .unwrap_or(false);
        if is_amp {
            if v.len() > i + 2 {
                let extra = &v[i + 2];
                return Err(SorrelError::parse_at(
                    format!("Unexpected parameter: {}", extra),
                    extra,
                ));
            }
            if v.len() == i + 2 {
                let variadic = &v[i + 1];
                let sym = match variadic.to_symbol() {
                    Some(sym) => sym,
                    None if ctx.config.is_linter() => ctx.gensym(),
                    None => {
                        return Err(SorrelError::parse_at(
                            format!("Unsupported binding form: {}", variadic),
                            variadic,
                        ))
                    }
                };
                res.push(sym);
                return Ok((res, true));
            }
            return Ok((res, false));
        }
        let sym = match ro.to_symbol() {
            Some(sym) => sym,
            None if ctx.config.is_linter() => ctx.gensym(),
            None => {
                return Err(SorrelError::parse_at(
                    format!("Unsupported binding form: {}", ro),
                    ro,
                ))
            }
        };
        res.push(sym);
    }
    Ok((res, false))
}

fn add_arity(
    arities: &mut Vec<FnArityExpr>,
    variadic: &mut Option<Box<FnArityExpr>>,
    sig: &[Form],
    sig_span: Option<Span>,
    ctx: &mut ParseContext,
) -> Result<(), SorrelError> {
    let params_form = &sig[0];
    let body_forms = &sig[1..];
    let (args, is_variadic) = parse_params(params_form, ctx)?;

    ctx.scope.push_frame();
    for (i, sym) in args.iter().enumerate() {
        ctx.scope.add(sym.clone(), i, None);
    }
    ctx.loop_bindings.push(args.clone());
    let saved_no_recur = mem::replace(&mut ctx.no_recur_allowed, false);

    let mut res = parse_body(body_forms, ctx).map(|body| FnArityExpr {
        span: sig_span,
        params: args.clone(),
        body,
        tag: tagged_type(params_form.meta()),
    });
    if res.is_ok() {
        if is_variadic {
            if variadic.is_some() {
                res = Err(SorrelError::parse_at(
                    "Can't have more than 1 variadic overload",
                    params_form,
                ));
            } else if arities.iter().any(|a| a.params.len() >= args.len()) {
                res = Err(SorrelError::parse_at(
                    "Can't have fixed arity function with more params than variadic function",
                    params_form,
                ));
            }
        } else if arities.iter().any(|a| a.params.len() == args.len()) {
            res = Err(SorrelError::parse_at(
                "Can't have 2 overloads with same arity",
                params_form,
            ));
        } else if variadic
            .as_ref()
            .map(|v| args.len() >= v.params.len())
            .unwrap_or(false)
        {
            res = Err(SorrelError::parse_at(
                "Can't have fixed arity function with more params than variadic function",
                params_form,
            ));
        }
    }
    if let Ok(arity) = &res {
        if ctx.config.is_linter() {
            if ctx.config.fn_with_empty_body && arity.body.is_empty() {
                ctx.diag
                    .parse_warning(arity.span.as_ref(), "fn form with empty body");
            }
            if ctx.config.unused_fn_parameters {
                lint::warn_unused_top_frame(ctx, "unused parameter: ");
            }
        }
    }

    ctx.no_recur_allowed = saved_no_recur;
    ctx.loop_bindings.pop();
    ctx.scope.pop_frame();

    let arity = res?;
    if is_variadic {
        *variadic = Some(Box::new(arity));
    } else {
        arities.push(arity);
    }
    Ok(())
}

// (fn f [x] ...) or (fn f ([x] ...) ([x y] ...))
fn parse_fn(form: &Form, items: &[Form], ctx: &mut ParseContext) -> Result<Expr, SorrelError> {
    let span = form.span.clone();
    let mut bodies = &items[1..];
    let mut self_name = None;
    let mut pushed_self = false;
    if let Some(sym) = bodies.first().and_then(Form::to_symbol) {
        self_name = Some(sym.clone());
        bodies = &bodies[1..];
        ctx.scope.push_frame();
        ctx.scope.add(sym, 0, None);
        pushed_self = true;
    }
    let mut arities = Vec::new();
    let mut variadic = None;
    let res = parse_fn_arities(form, bodies, &mut arities, &mut variadic, ctx);
    if pushed_self {
        ctx.scope.pop_frame();
    }
    res?;
    let fn_expr = Expr::new(
        ExprKind::Fn {
            arities,
            variadic,
            self_name,
        },
        span,
    );
    match form.meta() {
        Some(meta) => {
            let span = fn_expr.span.clone();
            let meta_expr = parse_meta_map(meta, span.clone(), ctx)?;
            Ok(Expr::new(
                ExprKind::Meta {
                    meta: Box::new(meta_expr),
                    expr: Box::new(fn_expr),
                },
                span,
            ))
        }
        None => Ok(fn_expr),
    }
}

fn parse_fn_arities(
    form: &Form,
    bodies: &[Form],
    arities: &mut Vec<FnArityExpr>,
    variadic: &mut Option<Box<FnArityExpr>>,
    ctx: &mut ParseContext,
) -> Result<(), SorrelError> {
    match bodies.first() {
        None => Err(SorrelError::parse_at("Parameter declaration missing", form)),
        Some(first) if first.as_vector().is_some() => {
            // single arity
            add_arity(arities, variadic, bodies, form.span.clone(), ctx)
        }
        _ => {
            for body in bodies {
                let sig = match body.as_list() {
                    Some(sig) => sig,
                    None => {
                        return Err(SorrelError::parse_at(
                            format!("Function body must be a list. Got: {}", body),
                            body,
                        ))
                    }
                };
                match sig.first() {
                    Some(params) if params.as_vector().is_some() => {
                        add_arity(arities, variadic, sig, body.span.clone(), ctx)?;
                    }
                    Some(params) => {
                        return Err(SorrelError::parse_at(
                            format!("Parameter declaration must be a vector. Got: {}", params),
                            params,
                        ))
                    }
                    None => {
                        return Err(SorrelError::parse_at("Parameter declaration missing", body))
                    }
                }
            }
            Ok(())
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum LetKind {
    Let,
    Loop,
    Letfn,
}

impl LetKind {
    fn name(self) -> &'static str {
        match self {
            LetKind::Let => "let",
            LetKind::Loop => "loop",
            LetKind::Letfn => "letfn",
        }
    }
}

fn parse_let_loop(
    kind: LetKind,
    form: &Form,
    items: &[Form],
    ctx: &mut ParseContext,
) -> Result<Expr, SorrelError> {
    let name = kind.name();
    let bindings_form = match items.get(1) {
        Some(form) => form,
        None => {
            return Err(SorrelError::parse_at(
                format!("{} requires a vector for its bindings", name),
                form,
            ))
        }
    };
    let b = match bindings_form.as_vector() {
        Some(b) => b,
        None => {
            return Err(SorrelError::parse_at(
                format!("{} requires a vector for its bindings", name),
                form,
            ))
        }
    };
    if b.len() % 2 != 0 {
        return Err(SorrelError::parse_at(
            format!("{} requires an even number of forms in binding vector", name),
            bindings_form,
        ));
    }
    if ctx.config.is_linter() && kind != LetKind::Loop && b.is_empty() {
        ctx.diag.parse_warning(
            form.span.as_ref(),
            &format!("{} form with empty bindings vector", name),
        );
    }
    let skip_unused = bindings_form
        .meta()
        .map(|meta| meta.truthy_kw("skip-unused"))
        .unwrap_or(false);

    ctx.scope.push_frame();
    let res = parse_let_loop_parts(kind, form, items, b, skip_unused, ctx);
    ctx.scope.pop_frame();
    let (names, values, body) = res?;

    let kind = match kind {
        LetKind::Let => ExprKind::Let {
            names,
            values,
            body,
        },
        LetKind::Loop => ExprKind::Loop {
            names,
            values,
            body,
        },
        LetKind::Letfn => ExprKind::Letfn {
            names,
            values,
            body,
        },
    };
    Ok(Expr::new(kind, form.span.clone()))
}

fn parse_let_loop_parts(
    kind: LetKind,
    form: &Form,
    items: &[Form],
    b: &[Form],
    skip_unused: bool,
    ctx: &mut ParseContext,
) -> Result<(Vec<Symbol>, Vec<Expr>, Vec<Expr>), SorrelError> {
    let name = kind.name();
    let count = b.len() / 2;
    let mut names = Vec::with_capacity(count);
    let mut values = Vec::with_capacity(count);
    for i in 0..count {
        let name_form = &b[i * 2];
        let sym = match name_form.to_symbol() {
            Some(sym) if sym.is_qualified() => {
                let msg = format!("Can't let qualified name: {}", sym);
                if ctx.config.is_linter() {
                    ctx.diag.parse_error(name_form.span.as_ref(), &msg);
                    sym
                } else {
                    return Err(SorrelError::parse_at(msg, name_form));
                }
            }
            Some(sym) => sym,
            None if ctx.config.is_linter() => ctx.gensym(),
            None => {
                return Err(SorrelError::parse_at(
                    format!("Unsupported binding form: {}", name_form),
                    name_form,
                ))
            }
        };
        let mut inferred = None;
        if kind != LetKind::Letfn {
            let value = parse(&b[i * 2 + 1], ctx)?;
            if ctx.config.is_linter() {
                inferred = value.infer_type(&ctx.scope, ctx.env);
            }
            values.push(value);
        }
        let (_, shadowed) = ctx.scope.add(sym.clone(), i, inferred);
        if ctx.config.is_linter() && !skip_unused {
            if let Some(old) = shadowed {
                let old = ctx.scope.get(old).clone();
                if lint::needs_unused_warning(&old) {
                    ctx.diag.parse_warning(
                        old.name.span.as_ref(),
                        &format!("Unused binding: {}", old.name),
                    );
                }
            }
        }
        names.push(sym);
    }
    if kind == LetKind::Letfn {
        // Names are all in scope before any value parses, so the
        // functions can refer to each other.
        for i in 0..count {
            values.push(parse(&b[i * 2 + 1], ctx)?);
        }
    }

    let body_forms = &items[2..];
    let body = if kind == LetKind::Loop {
        ctx.loop_bindings.push(names.clone());
        let saved_no_recur = mem::replace(&mut ctx.no_recur_allowed, false);
        let body = parse_body(body_forms, ctx);
        ctx.no_recur_allowed = saved_no_recur;
        ctx.loop_bindings.pop();
        body?
    } else {
        parse_body(body_forms, ctx)?
    };

    if ctx.config.is_linter() {
        if body.is_empty() {
            ctx.diag.parse_warning(
                form.span.as_ref(),
                &format!("{} form with empty body", name),
            );
        }
        if !skip_unused {
            lint::warn_unused_top_frame(ctx, "unused binding: ");
        }
    }
    Ok((names, values, body))
}

fn parse_recur(form: &Form, items: &[Form], ctx: &mut ParseContext) -> Result<Expr, SorrelError> {
    if ctx.no_recur_allowed {
        return Err(SorrelError::parse_at("Cannot recur across try", form));
    }
    let expected = match ctx.loop_bindings.last() {
        Some(bindings) => bindings.len(),
        None => {
            return Err(SorrelError::parse_at("No recursion point for recur", form));
        }
    };
    let args = parse_seq(&items[1..], ctx)?;
    if args.len() != expected {
        return Err(SorrelError::parse_at(
            format!(
                "Mismatched argument count to recur, expected: {} args, got: {}",
                expected,
                args.len()
            ),
            form,
        ));
    }
    ctx.recur = true;
    Ok(Expr::new(ExprKind::Recur { args }, form.span.clone()))
}

fn clause_items<'f>(form: &'f Form, word: &str) -> Option<&'f [Form]> {
    let items = form.as_list()?;
    let head = items.first()?.as_symbol()?;
    (!head.is_qualified() && head.name == word).then_some(items)
}

fn resolve_type(form: &Form, ctx: &mut ParseContext) -> Result<TypeKind, SorrelError> {
    let expr = parse(form, ctx)?;
    if let ExprKind::Literal { value, .. } = &expr.kind {
        if let FormKind::Type(t) = value.kind {
            return Ok(t);
        }
    }
    if ctx.config.is_linter() {
        // Sentinel so catch-clause analysis can continue.
        return Ok(TypeKind::Error);
    }
    Err(SorrelError::parse_at(
        format!("Unable to resolve type: {}", form),
        form,
    ))
}

fn parse_catch(
    form: &Form,
    items: &[Form],
    ctx: &mut ParseContext,
) -> Result<CatchClause, SorrelError> {
    if items.len() < 3 {
        return Err(SorrelError::parse_at(
            "catch requires at least two arguments: type symbol and binding symbol",
            form,
        ));
    }
    let ex_type = resolve_type(&items[1], ctx)?;
    let binding = match items[2].to_symbol() {
        Some(sym) => sym,
        None => {
            return Err(SorrelError::parse_at(
                format!("Bad binding form, expected symbol, got: {}", items[2]),
                &items[2],
            ))
        }
    };
    ctx.scope.push_frame();
    ctx.scope.add(binding.clone(), 0, None);
    let body = parse_body(&items[3..], ctx);
    ctx.scope.pop_frame();
    Ok(CatchClause {
        span: form.span.clone(),
        ex_type,
        binding,
        body: body?,
    })
}

fn parse_try(form: &Form, items: &[Form], ctx: &mut ParseContext) -> Result<Expr, SorrelError> {
    let saved_no_recur = mem::replace(&mut ctx.no_recur_allowed, true);
    let res = parse_try_inner(form, items, ctx);
    ctx.no_recur_allowed = saved_no_recur;
    res
}

fn parse_try_inner(
    form: &Form,
    items: &[Form],
    ctx: &mut ParseContext,
) -> Result<Expr, SorrelError> {
    #[derive(PartialEq)]
    enum Last {
        Regular,
        Catch,
        Finally,
    }
    let span = form.span.clone();
    let mut body = Vec::new();
    let mut catches = Vec::new();
    let mut finally = None;
    let mut finally_span: Option<Span> = None;
    let mut last = Last::Regular;
    for child in &items[1..] {
        if last == Last::Finally {
            return Err(SorrelError::parse_at(
                "finally clause must be last in try expression",
                child,
            ));
        }
        if let Some(clause) = clause_items(child, "catch") {
            catches.push(parse_catch(child, clause, ctx)?);
            last = Last::Catch;
        } else if let Some(clause) = clause_items(child, "finally") {
            finally = Some(parse_body(&clause[1..], ctx)?);
            finally_span = child.span.clone();
            last = Last::Finally;
        } else {
            if last == Last::Catch {
                return Err(SorrelError::parse_at(
                    "Only catch or finally clause can follow catch in try expression",
                    child,
                ));
            }
            body.push(parse(child, ctx)?);
        }
    }
    if ctx.config.is_linter() {
        if body.is_empty() {
            ctx.diag
                .parse_warning(span.as_ref(), "try form with empty body");
        }
        if catches.is_empty() && finally.is_none() {
            ctx.diag
                .parse_warning(span.as_ref(), "try form without catch or finally");
        }
        if let Some(finally) = &finally {
            if finally.is_empty() {
                ctx.diag
                    .parse_warning(finally_span.as_ref(), "finally form with empty body");
            }
        }
    }
    Ok(Expr::new(
        ExprKind::Try {
            body,
            catches,
            finally,
        },
        span,
    ))
}

fn resolve_macro(op: &Form, ctx: &mut ParseContext) -> Option<VarId> {
    let sym = op.as_symbol()?;
    if ctx.scope.lookup(sym).is_some() {
        return None;
    }
    let var = ctx.env.resolve(sym)?;
    {
        let var = ctx.env.var(var);
        if !var.is_macro || var.value.is_none() {
            return None;
        }
    }
    ctx.env.mark_var_used(var);
    Some(var)
}

/// Reattaches positions to a macro expansion: every node lacking one
/// inherits the call site's. Metadata is preserved throughout.
fn fix_info(form: &Form, inherited: Option<&Span>) -> Form {
    let kind = match &form.kind {
        FormKind::List(items) => {
            FormKind::List(items.iter().map(|f| fix_info(f, inherited)).collect())
        }
        FormKind::Vector(items) => {
            FormKind::Vector(items.iter().map(|f| fix_info(f, inherited)).collect())
        }
        FormKind::Set(items) => {
            FormKind::Set(items.iter().map(|f| fix_info(f, inherited)).collect())
        }
        FormKind::Map(entries) => FormKind::Map(
            entries
                .iter()
                .map(|(k, v)| (fix_info(k, inherited), fix_info(v, inherited)))
                .collect(),
        ),
        other => other.clone(),
    };
    Form {
        kind,
        span: form.span.clone().or_else(|| inherited.cloned()),
        meta: form.meta.clone(),
    }
}

fn local_bindings_map(scope: &Scope) -> Form {
    let entries = scope
        .visible_symbols()
        .into_iter()
        .map(|sym| (Form::from_symbol(sym), Form::nil()))
        .collect();
    Form::map(entries)
}

/// Expands a macro call once. `None` means the head does not name a
/// macro, or the macro handed its input back unchanged.
fn macroexpand1(form: &Form, ctx: &mut ParseContext) -> Result<Option<Form>, SorrelError> {
    let items = match form.as_list() {
        Some(items) if !items.is_empty() => items,
        _ => return Ok(None),
    };
    let var = match resolve_macro(&items[0], ctx) {
        Some(var) => var,
        None => return Ok(None),
    };
    let name = ctx.env.var_qualified_name(var);
    // The macro sees the whole form and the local bindings first,
    // matching the &form/&env convention.
    let mut args = Vec::with_capacity(items.len() + 1);
    args.push(form.clone());
    args.push(local_bindings_map(&ctx.scope));
    args.extend(items[1..].iter().cloned());
    let call = Expr::new(
        ExprKind::MacroCall { var, args, name },
        form.span.clone(),
    );
    let expanded = ctx.evaluator.eval(&call, ctx.env)?;
    let fixed = fix_info(&expanded, form.span.as_ref());
    if fixed == *form {
        return Ok(None);
    }
    Ok(Some(fixed))
}

fn is_interop_symbol(sym: &Symbol) -> bool {
    !sym.is_qualified()
        && (sym.name.starts_with('.') || sym.name.ends_with('.') || sym.name.contains('$'))
}

static HOST_CLASS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r".+\..+\.[A-Z].+").expect("host class regex"));

fn is_host_class_symbol(sym: &Symbol) -> bool {
    let subject = sym.ns.as_deref().unwrap_or(&sym.name);
    HOST_CLASS_RE.is_match(subject)
}

fn make_var_ref(var: VarId, form: &Form, ctx: &mut ParseContext) -> Expr {
    ctx.env.mark_var_used(var);
    Expr::new(ExprKind::VarRef { var }, form.span.clone())
}

fn parse_symbol(form: &Form, ctx: &mut ParseContext) -> Result<Expr, SorrelError> {
    let sym = match form.to_symbol() {
        Some(sym) => sym,
        None => return Ok(Expr::literal(form.clone())),
    };
    if let Some(binding) = ctx.scope.lookup(&sym) {
        ctx.scope.mark_used(binding);
        return Ok(Expr::new(
            ExprKind::Binding { binding, name: sym },
            form.span.clone(),
        ));
    }
    if let Some(var) = ctx.env.resolve(&sym) {
        return Ok(make_var_ref(var, form, ctx));
    }
    if !sym.is_qualified() {
        if let Some(t) = TypeKind::lookup(&sym.name) {
            return Ok(Expr::new(
                ExprKind::Literal {
                    value: Form::new(FormKind::Type(t)),
                    surrogate: false,
                },
                form.span.clone(),
            ));
        }
    }
    if !ctx.config.is_linter() {
        return Err(SorrelError::parse_at(
            format!("Unable to resolve symbol: {}", sym),
            form,
        ));
    }
    if ctx.config.dialect == Dialect::Browser && !sym.is_qualified() {
        // Callable namespace, e.g. (ns-name arg).
        let current = ctx.env.current_ns();
        let ns = ctx
            .env
            .find_namespace(&sym.name)
            .or_else(|| ctx.env.namespace(current).alias_target(&sym.name));
        if let Some(ns) = ns {
            let ns = ctx.env.namespace_mut(ns);
            ns.used = true;
            ns.globally_used = true;
            return Ok(Expr::surrogate(form.clone()));
        }
        // Segmented host interop like Math.PI: trim the last segment
        // and resolve the rest.
        let parts: Vec<&str> = sym.name.split('.').collect();
        if parts.len() > 1 && !parts[0].is_empty() && !parts[parts.len() - 1].is_empty() {
            let trimmed = parts[..parts.len() - 1].join(".");
            let derived = Form {
                kind: FormKind::Symbol(Symbol::new(trimmed)),
                span: form.span.clone(),
                meta: None,
            };
            return parse_symbol(&derived, ctx);
        }
        // Constructor call like Name.
        if parts.len() == 2 && !parts[0].is_empty() && parts[1].is_empty() {
            if let Some(var) = ctx.env.resolve(&Symbol::new(parts[0])) {
                return Ok(make_var_ref(var, form, ctx));
            }
        }
    }
    let current = ctx.env.current_ns();
    let sym_ns = ctx.env.namespace_for(current, &sym);
    if sym_ns.is_none() || sym_ns == Some(current) {
        if is_interop_symbol(&sym) || is_host_class_symbol(&sym) {
            return Ok(Expr::surrogate(form.clone()));
        }
        if !ctx.unknown_callable_scope && ctx.linter_scope.lookup(&sym).is_none() {
            ctx.diag.parse_error(
                form.span.as_ref(),
                &format!("Unable to resolve symbol: {}", sym),
            );
        }
    }
    let fake = ctx.env.intern_fake(sym_ns, &sym);
    Ok(make_var_ref(fake, form, ctx))
}

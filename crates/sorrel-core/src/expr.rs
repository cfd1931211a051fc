use crate::env::{GlobalEnv, VarId};
use crate::form::{Form, Span, Symbol};
use crate::scope::{BindingId, Scope};
use crate::types::TypeKind;

/// One arity of a `fn` form.
#[derive(Clone, Debug)]
pub struct FnArityExpr {
    pub span: Option<Span>,
    pub params: Vec<Symbol>,
    pub body: Vec<Expr>,
    /// Return type from `:tag` metadata on the parameter vector.
    pub tag: Option<TypeKind>,
}

#[derive(Clone, Debug)]
pub struct CatchClause {
    pub span: Option<Span>,
    pub ex_type: TypeKind,
    pub binding: Symbol,
    pub body: Vec<Expr>,
}

/// A typed, position-annotated expression produced by the analyzer.
#[derive(Clone, Debug)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Option<Span>,
}

#[derive(Clone, Debug)]
pub enum ExprKind {
    Literal {
        value: Form,
        /// Placeholder for values the linter could not resolve.
        surrogate: bool,
    },
    Vector {
        items: Vec<Expr>,
    },
    Map {
        keys: Vec<Expr>,
        values: Vec<Expr>,
    },
    Set {
        items: Vec<Expr>,
    },
    If {
        cond: Box<Expr>,
        positive: Box<Expr>,
        negative: Box<Expr>,
    },
    Def {
        var: VarId,
        name: Symbol,
        value: Option<Box<Expr>>,
        meta: Option<Box<Expr>>,
        created_by_macro: bool,
    },
    Call {
        callable: Box<Expr>,
        args: Vec<Expr>,
    },
    MacroCall {
        var: VarId,
        /// Raw, unparsed arguments: the original form, the local
        /// bindings map, then the call's own arguments.
        args: Vec<Form>,
        name: String,
    },
    Recur {
        args: Vec<Expr>,
    },
    VarRef {
        var: VarId,
    },
    Binding {
        binding: BindingId,
        name: Symbol,
    },
    Meta {
        meta: Box<Expr>,
        expr: Box<Expr>,
    },
    Do {
        body: Vec<Expr>,
        created_by_macro: bool,
    },
    Fn {
        arities: Vec<FnArityExpr>,
        variadic: Option<Box<FnArityExpr>>,
        self_name: Option<Symbol>,
    },
    Let {
        names: Vec<Symbol>,
        values: Vec<Expr>,
        body: Vec<Expr>,
    },
    Loop {
        names: Vec<Symbol>,
        values: Vec<Expr>,
        body: Vec<Expr>,
    },
    Letfn {
        names: Vec<Symbol>,
        values: Vec<Expr>,
        body: Vec<Expr>,
    },
    Throw {
        value: Box<Expr>,
    },
    Try {
        body: Vec<Expr>,
        catches: Vec<CatchClause>,
        finally: Option<Vec<Expr>>,
    },
    SetMacro {
        var: VarId,
    },
}

impl Expr {
    pub fn new(kind: ExprKind, span: Option<Span>) -> Self {
        Self { kind, span }
    }

    /// A literal carrying the read object's own position.
    pub fn literal(value: Form) -> Self {
        let span = value.span.clone();
        Self::new(
            ExprKind::Literal {
                value,
                surrogate: false,
            },
            span,
        )
    }

    pub fn surrogate(value: Form) -> Self {
        let span = value.span.clone();
        Self::new(
            ExprKind::Literal {
                value,
                surrogate: true,
            },
            span,
        )
    }

    pub fn is_literal(&self) -> bool {
        matches!(self.kind, ExprKind::Literal { .. })
    }

    /// Trivial type inference for linter diagnostics. Returns `None`
    /// when nothing useful can be said.
    pub fn infer_type(&self, scope: &Scope, env: &GlobalEnv) -> Option<TypeKind> {
        match &self.kind {
            ExprKind::Literal { value, surrogate } => {
                if *surrogate {
                    None
                } else {
                    Some(TypeKind::of_form(&value.kind))
                }
            }
            ExprKind::Vector { .. } => Some(TypeKind::Vector),
            ExprKind::Map { .. } => Some(TypeKind::Map),
            ExprKind::Set { .. } => Some(TypeKind::Set),
            ExprKind::Fn { .. } => Some(TypeKind::Fn),
            ExprKind::Binding { binding, .. } => scope.get(*binding).inferred_type,
            ExprKind::VarRef { var } => env.var(*var).tagged_type,
            ExprKind::Meta { expr, .. } => expr.infer_type(scope, env),
            ExprKind::If {
                positive, negative, ..
            } => {
                let p = positive.infer_type(scope, env)?;
                let n = negative.infer_type(scope, env)?;
                if p == n {
                    Some(p)
                } else {
                    None
                }
            }
            ExprKind::Do { body, .. }
            | ExprKind::Let { body, .. }
            | ExprKind::Loop { body, .. }
            | ExprKind::Letfn { body, .. } => body.last().and_then(|e| e.infer_type(scope, env)),
            _ => None,
        }
    }

    /// How the expression reads when named in a call-site diagnostic.
    pub fn callable_name(&self, env: &GlobalEnv) -> String {
        match &self.kind {
            ExprKind::VarRef { var } => env.var_qualified_name(*var),
            ExprKind::Binding { name, .. } => name.to_string(),
            ExprKind::Literal { value, .. } => value.to_string(),
            ExprKind::Fn { .. } => "fn".to_string(),
            ExprKind::Meta { expr, .. } => expr.callable_name(env),
            _ => "expression".to_string(),
        }
    }
}

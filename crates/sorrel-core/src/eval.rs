use crate::env::GlobalEnv;
use crate::error::SorrelError;
use crate::expr::Expr;
use crate::form::Form;

/// The analyzer's only view of the evaluator: macros run through it at
/// analysis time, as do namespace-shaping calls (`require`, `alias`,
/// ...) with all-literal arguments. Implementations own how a macro
/// var's value is applied.
pub trait Evaluator {
    fn eval(&mut self, expr: &Expr, env: &mut GlobalEnv) -> Result<Form, SorrelError>;
}

/// Evaluator for hosts that never execute code at analysis time. Any
/// attempt to expand a macro through it is an error, which the
/// per-form boundary reports.
pub struct NullEvaluator;

impl Evaluator for NullEvaluator {
    fn eval(&mut self, expr: &Expr, _env: &mut GlobalEnv) -> Result<Form, SorrelError> {
        let mut err = SorrelError::eval("no evaluator installed");
        if let Some(span) = &expr.span {
            err = err.with_span(span.clone());
        }
        Err(err)
    }
}

pub mod config;
pub mod diagnostics;
pub mod env;
pub mod error;
pub mod eval;
pub mod expr;
pub mod form;
pub mod lint;
pub mod parser;
pub mod scope;
pub mod types;

pub use config::{Dialect, LintConfig, Mode};
pub use diagnostics::{Diagnostics, ReadCursor};
pub use env::{GlobalEnv, Namespace, NsId, Var, VarId};
pub use error::SorrelError;
pub use eval::{Evaluator, NullEvaluator};
pub use expr::{CatchClause, Expr, ExprKind, FnArityExpr};
pub use form::{Form, FormKind, MetaMap, Span, Symbol, CORE_FILENAME, USER_FILENAME};
pub use lint::{
    reset_usage, warn_on_globally_unused_namespaces, warn_on_globally_unused_vars,
    warn_on_unused_namespaces, warn_on_unused_vars,
};
pub use parser::{parse, try_parse, ParseContext};
pub use scope::{Binding, BindingId, Scope};
pub use types::TypeKind;

#![allow(dead_code)]

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use sorrel_core::{
    parse, Diagnostics, Evaluator, Expr, Form, GlobalEnv, LintConfig, MetaMap, NullEvaluator,
    ParseContext, SorrelError, Span, Symbol, VarId,
};

pub const TEST_FILE: &str = "test.srl";

pub fn span(line: u32, col: u32) -> Span {
    Span::new(TEST_FILE, line, col, line, col + 1)
}

pub fn at(form: Form, line: u32, col: u32) -> Form {
    form.with_span(span(line, col))
}

pub fn sym(name: &str) -> Form {
    Form::symbol(name)
}

pub fn qsym(ns: &str, name: &str) -> Form {
    Form::from_symbol(Symbol::qualified(ns, name))
}

pub fn kw(name: &str) -> Form {
    Form::keyword(name)
}

pub fn int(n: i64) -> Form {
    Form::int(n)
}

pub fn string(s: &str) -> Form {
    Form::string(s)
}

pub fn boolean(b: bool) -> Form {
    Form::boolean(b)
}

pub fn nil() -> Form {
    Form::nil()
}

pub fn list(items: Vec<Form>) -> Form {
    Form::list(items)
}

pub fn vector(items: Vec<Form>) -> Form {
    Form::vector(items)
}

pub fn set(items: Vec<Form>) -> Form {
    Form::set(items)
}

pub fn map(entries: Vec<(Form, Form)>) -> Form {
    Form::map(entries)
}

pub fn with_meta(form: Form, entries: Vec<(Form, Form)>) -> Form {
    form.with_meta(MetaMap::from_entries(entries))
}

#[derive(Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// An evaluator backed by a closure, for macro-expansion tests.
pub struct FnEvaluator(Box<dyn FnMut(&Expr, &mut GlobalEnv) -> Result<Form, SorrelError>>);

impl FnEvaluator {
    pub fn new(
        f: impl FnMut(&Expr, &mut GlobalEnv) -> Result<Form, SorrelError> + 'static,
    ) -> Self {
        Self(Box::new(f))
    }
}

impl Evaluator for FnEvaluator {
    fn eval(&mut self, expr: &Expr, env: &mut GlobalEnv) -> Result<Form, SorrelError> {
        (self.0)(expr, env)
    }
}

/// One analysis session: a fresh environment plus a captured
/// diagnostic stream. Each `parse` call analyzes one top-level form.
pub struct Harness {
    pub env: GlobalEnv,
    pub config: LintConfig,
    pub diag: Diagnostics,
    buf: SharedBuf,
}

impl Harness {
    pub fn new(config: LintConfig) -> Self {
        let buf = SharedBuf::default();
        let diag = Diagnostics::new(Box::new(buf.clone()));
        Self {
            env: GlobalEnv::new(),
            config,
            diag,
            buf,
        }
    }

    pub fn strict() -> Self {
        Self::new(LintConfig::default())
    }

    pub fn linter() -> Self {
        Self::new(LintConfig::linter())
    }

    pub fn define_core(&mut self, name: &str) -> VarId {
        let core = self.env.core_ns();
        self.env.intern(core, &Symbol::new(name))
    }

    pub fn define_user(&mut self, name: &str) -> VarId {
        let current = self.env.current_ns();
        self.env.intern(current, &Symbol::new(name))
    }

    pub fn parse(&mut self, form: &Form) -> Result<Expr, SorrelError> {
        let mut evaluator = NullEvaluator;
        self.parse_with(form, &mut evaluator)
    }

    pub fn parse_with(
        &mut self,
        form: &Form,
        evaluator: &mut dyn Evaluator,
    ) -> Result<Expr, SorrelError> {
        let mut ctx = ParseContext::new(&mut self.env, &mut self.diag, evaluator, &self.config);
        parse(form, &mut ctx)
    }

    pub fn try_parse(&mut self, form: &Form) -> Result<Expr, SorrelError> {
        let mut evaluator = NullEvaluator;
        let mut ctx =
            ParseContext::new(&mut self.env, &mut self.diag, &mut evaluator, &self.config);
        sorrel_core::try_parse(form, &mut ctx)
    }

    pub fn output(&self) -> String {
        self.buf.text()
    }

    pub fn lines(&self) -> Vec<String> {
        self.output().lines().map(str::to_string).collect()
    }

    pub fn problems(&self) -> usize {
        self.diag.problem_count()
    }
}

pub fn parse_error_message(err: SorrelError) -> String {
    match err {
        SorrelError::Parse(data) => data.message,
        SorrelError::Eval(data) => panic!("expected parse error, got eval error: {}", data),
    }
}

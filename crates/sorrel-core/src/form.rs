use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::env::VarId;
use crate::types::TypeKind;

/// Filename attached to forms produced by the bundled core library.
/// Forms originating here are treated as macro-generated.
pub const CORE_FILENAME: &str = "<sorrel.core>";
/// Filename used for forms typed at a REPL prompt.
pub const USER_FILENAME: &str = "<user>";

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Span {
    pub file: Option<Arc<str>>,
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl Span {
    pub fn new(
        file: impl Into<Arc<str>>,
        start_line: u32,
        start_col: u32,
        end_line: u32,
        end_col: u32,
    ) -> Self {
        Self {
            file: Some(file.into()),
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// A zero-width span, as produced for a read cursor.
    pub fn point(file: Option<Arc<str>>, line: u32, col: u32) -> Self {
        Self {
            file,
            start_line: line,
            start_col: col,
            end_line: line,
            end_col: col,
        }
    }

    pub fn file_name(&self) -> &str {
        self.file.as_deref().unwrap_or("<file>")
    }
}

/// A possibly namespace-qualified name. Equality and hashing ignore
/// position and metadata, so symbols compare by name alone.
#[derive(Clone, Debug, Default)]
pub struct Symbol {
    pub ns: Option<String>,
    pub name: String,
    pub meta: Option<Box<MetaMap>>,
    pub span: Option<Span>,
}

impl Symbol {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            ns: None,
            name: name.into(),
            meta: None,
            span: None,
        }
    }

    pub fn qualified(ns: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            ns: Some(ns.into()),
            name: name.into(),
            meta: None,
            span: None,
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_meta(mut self, meta: MetaMap) -> Self {
        self.meta = Some(Box::new(meta));
        self
    }

    pub fn is_qualified(&self) -> bool {
        self.ns.is_some()
    }

    /// The symbol stripped of its namespace part.
    pub fn unqualified(&self) -> Symbol {
        Symbol {
            ns: None,
            name: self.name.clone(),
            meta: self.meta.clone(),
            span: self.span.clone(),
        }
    }

    pub fn meta(&self) -> Option<&MetaMap> {
        self.meta.as_deref()
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.ns == other.ns && self.name == other.name
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ns.hash(state);
        self.name.hash(state);
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.ns {
            Some(ns) => write!(f, "{}/{}", ns, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// An insertion-ordered map used for reader metadata and map literals.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct MetaMap {
    entries: Vec<(Form, Form)>,
}

impl MetaMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<(Form, Form)>) -> Self {
        let mut map = Self::new();
        for (k, v) in entries {
            map.assoc(k, v);
        }
        map
    }

    pub fn get(&self, key: &FormKind) -> Option<&Form> {
        self.entries
            .iter()
            .find(|(k, _)| &k.kind == key)
            .map(|(_, v)| v)
    }

    pub fn get_kw(&self, name: &str) -> Option<&Form> {
        self.get(&FormKind::Keyword(name.to_string()))
    }

    /// Whether the keyword is present with a truthy value.
    pub fn truthy_kw(&self, name: &str) -> bool {
        self.get_kw(name).map(Form::is_truthy).unwrap_or(false)
    }

    pub fn assoc(&mut self, key: Form, value: Form) {
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| k.kind == key.kind) {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Form, Form)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<(Form, Form)> {
        self.entries
    }
}

/// One read object: a value the reader produced, with optional source
/// position and reader metadata. Equality compares values only.
#[derive(Clone, Debug)]
pub struct Form {
    pub kind: FormKind,
    pub span: Option<Span>,
    pub meta: Option<Box<MetaMap>>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FormKind {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    String(String),
    Keyword(String),
    Symbol(Symbol),
    List(Vec<Form>),
    Vector(Vec<Form>),
    Map(Vec<(Form, Form)>),
    Set(Vec<Form>),
    /// A resolved var handle appearing as a value, e.g. the result of
    /// the `var` special form.
    Var(VarId),
    /// A builtin type appearing as a value, e.g. `Error` in a catch
    /// clause.
    Type(TypeKind),
}

impl PartialEq for Form {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Form {
    pub fn new(kind: FormKind) -> Self {
        Self {
            kind,
            span: None,
            meta: None,
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_meta(mut self, meta: MetaMap) -> Self {
        if let FormKind::Symbol(sym) = &mut self.kind {
            sym.meta = Some(Box::new(meta));
        } else {
            self.meta = Some(Box::new(meta));
        }
        self
    }

    pub fn nil() -> Self {
        Self::new(FormKind::Nil)
    }

    pub fn boolean(b: bool) -> Self {
        Self::new(FormKind::Bool(b))
    }

    pub fn int(n: i64) -> Self {
        Self::new(FormKind::Int(n))
    }

    pub fn float(n: f64) -> Self {
        Self::new(FormKind::Float(n))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Self::new(FormKind::String(s.into()))
    }

    pub fn keyword(name: impl Into<String>) -> Self {
        Self::new(FormKind::Keyword(name.into()))
    }

    pub fn symbol(name: impl Into<String>) -> Self {
        Self::new(FormKind::Symbol(Symbol::new(name)))
    }

    pub fn from_symbol(sym: Symbol) -> Self {
        let span = sym.span.clone();
        Self {
            kind: FormKind::Symbol(sym),
            span,
            meta: None,
        }
    }

    pub fn list(items: Vec<Form>) -> Self {
        Self::new(FormKind::List(items))
    }

    pub fn vector(items: Vec<Form>) -> Self {
        Self::new(FormKind::Vector(items))
    }

    pub fn set(items: Vec<Form>) -> Self {
        Self::new(FormKind::Set(items))
    }

    pub fn map(entries: Vec<(Form, Form)>) -> Self {
        Self::new(FormKind::Map(entries))
    }

    pub fn var(id: VarId) -> Self {
        Self::new(FormKind::Var(id))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self.kind, FormKind::Nil)
    }

    /// Everything but `nil` and `false` is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self.kind, FormKind::Nil | FormKind::Bool(false))
    }

    pub fn as_symbol(&self) -> Option<&Symbol> {
        match &self.kind {
            FormKind::Symbol(sym) => Some(sym),
            _ => None,
        }
    }

    /// The sequence capability: only lists provide first/rest.
    pub fn as_list(&self) -> Option<&[Form]> {
        match &self.kind {
            FormKind::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<&[Form]> {
        match &self.kind {
            FormKind::Vector(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match &self.kind {
            FormKind::String(s) => Some(s),
            _ => None,
        }
    }

    /// Metadata lives on the symbol itself for symbol forms.
    pub fn meta(&self) -> Option<&MetaMap> {
        match &self.kind {
            FormKind::Symbol(sym) => sym.meta(),
            _ => self.meta.as_deref(),
        }
    }

    /// A `Symbol` carrying this form's position and metadata, when the
    /// form is a symbol.
    pub fn to_symbol(&self) -> Option<Symbol> {
        let sym = self.as_symbol()?;
        let mut sym = sym.clone();
        if sym.span.is_none() {
            sym.span = self.span.clone();
        }
        Some(sym)
    }
}

impl fmt::Display for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[Form]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for FormKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormKind::Nil => write!(f, "nil"),
            FormKind::Bool(b) => write!(f, "{}", b),
            FormKind::Int(n) => write!(f, "{}", n),
            FormKind::Float(n) => write!(f, "{}", n),
            FormKind::Char(c) => write!(f, "\\{}", c),
            FormKind::String(s) => write!(f, "{:?}", s),
            FormKind::Keyword(name) => write!(f, ":{}", name),
            FormKind::Symbol(sym) => write!(f, "{}", sym),
            FormKind::List(items) => {
                write!(f, "(")?;
                write_joined(f, items)?;
                write!(f, ")")
            }
            FormKind::Vector(items) => {
                write!(f, "[")?;
                write_joined(f, items)?;
                write!(f, "]")
            }
            FormKind::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} {}", k, v)?;
                }
                write!(f, "}}")
            }
            FormKind::Set(items) => {
                write!(f, "#{{")?;
                write_joined(f, items)?;
                write!(f, "}}")
            }
            FormKind::Var(_) => write!(f, "#'var"),
            FormKind::Type(t) => write!(f, "{}", t),
        }
    }
}

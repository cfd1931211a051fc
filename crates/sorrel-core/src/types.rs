use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;

use crate::form::FormKind;

/// Builtin types known to the analyzer. These appear as literal values
/// when a symbol names a type (e.g. `Error` in a catch clause) and as
/// inferred types during linting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Any,
    Nil,
    Bool,
    Int,
    Float,
    Number,
    Str,
    Char,
    Keyword,
    Symbol,
    List,
    Vector,
    Map,
    Set,
    Seqable,
    Fn,
    Var,
    Type,
    Error,
}

static TYPE_NAMES: Lazy<HashMap<&'static str, TypeKind>> = Lazy::new(|| {
    use TypeKind::*;
    let mut names = HashMap::new();
    for t in [
        Any, Nil, Bool, Int, Float, Number, Str, Char, Keyword, Symbol, List, Vector, Map, Set,
        Seqable, Fn, Var, Type, Error,
    ] {
        names.insert(t.name(), t);
    }
    names
});

impl TypeKind {
    pub fn name(self) -> &'static str {
        match self {
            TypeKind::Any => "Any",
            TypeKind::Nil => "Nil",
            TypeKind::Bool => "Bool",
            TypeKind::Int => "Int",
            TypeKind::Float => "Float",
            TypeKind::Number => "Number",
            TypeKind::Str => "Str",
            TypeKind::Char => "Char",
            TypeKind::Keyword => "Keyword",
            TypeKind::Symbol => "Symbol",
            TypeKind::List => "List",
            TypeKind::Vector => "Vector",
            TypeKind::Map => "Map",
            TypeKind::Set => "Set",
            TypeKind::Seqable => "Seqable",
            TypeKind::Fn => "Fn",
            TypeKind::Var => "Var",
            TypeKind::Type => "Type",
            TypeKind::Error => "Error",
        }
    }

    pub fn lookup(name: &str) -> Option<TypeKind> {
        TYPE_NAMES.get(name).copied()
    }

    /// The type of a literal value, used by trivial inference.
    pub fn of_form(kind: &FormKind) -> TypeKind {
        match kind {
            FormKind::Nil => TypeKind::Nil,
            FormKind::Bool(_) => TypeKind::Bool,
            FormKind::Int(_) => TypeKind::Int,
            FormKind::Float(_) => TypeKind::Float,
            FormKind::Char(_) => TypeKind::Char,
            FormKind::String(_) => TypeKind::Str,
            FormKind::Keyword(_) => TypeKind::Keyword,
            FormKind::Symbol(_) => TypeKind::Symbol,
            FormKind::List(_) => TypeKind::List,
            FormKind::Vector(_) => TypeKind::Vector,
            FormKind::Map(_) => TypeKind::Map,
            FormKind::Set(_) => TypeKind::Set,
            FormKind::Var(_) => TypeKind::Var,
            FormKind::Type(_) => TypeKind::Type,
        }
    }

    /// Whether a value of `concrete` satisfies a declaration of `self`.
    /// Abstract types cover their members; everything satisfies `Any`.
    pub fn is_equal_or_implements(self, concrete: TypeKind) -> bool {
        if self == TypeKind::Any || self == concrete {
            return true;
        }
        match self {
            TypeKind::Number => matches!(concrete, TypeKind::Int | TypeKind::Float),
            TypeKind::Seqable => matches!(
                concrete,
                TypeKind::List | TypeKind::Vector | TypeKind::Map | TypeKind::Set | TypeKind::Str
            ),
            _ => false,
        }
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

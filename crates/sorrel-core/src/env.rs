use std::collections::HashMap;

use crate::expr::Expr;
use crate::form::{Form, MetaMap, Span, Symbol};
use crate::types::TypeKind;

pub const CORE_NS_NAME: &str = "sorrel.core";
pub const USER_NS_NAME: &str = "user";

/// Stable handle to a namespace in the global environment's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NsId(u32);

/// Stable handle to a var. A var's namespace is always valid by
/// construction, so every var reference has a home namespace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VarId(u32);

#[derive(Debug)]
pub struct Var {
    pub ns: NsId,
    pub name: Symbol,
    pub value: Option<Form>,
    /// The expression this var was last `def`ed to, if any.
    pub expr: Option<Expr>,
    pub meta: Option<MetaMap>,
    pub tagged_type: Option<TypeKind>,
    pub is_macro: bool,
    pub is_private: bool,
    pub is_dynamic: bool,
    pub is_fake: bool,
    pub used: bool,
    pub globally_used: bool,
    /// Position of the `def` form that created the var.
    pub span: Option<Span>,
}

impl Var {
    fn new(ns: NsId, name: Symbol) -> Self {
        Self {
            ns,
            name,
            value: None,
            expr: None,
            meta: None,
            tagged_type: None,
            is_macro: false,
            is_private: false,
            is_dynamic: false,
            is_fake: false,
            used: false,
            globally_used: false,
            span: None,
        }
    }
}

#[derive(Debug)]
pub struct Namespace {
    pub name: Symbol,
    mappings: HashMap<String, VarId>,
    aliases: HashMap<String, NsId>,
    pub used: bool,
    pub globally_used: bool,
}

impl Namespace {
    fn new(name: Symbol) -> Self {
        Self {
            name,
            mappings: HashMap::new(),
            aliases: HashMap::new(),
            used: false,
            globally_used: false,
        }
    }

    pub fn mappings(&self) -> impl Iterator<Item = (&str, VarId)> {
        self.mappings.iter().map(|(name, id)| (name.as_str(), *id))
    }

    pub fn alias_target(&self, alias: &str) -> Option<NsId> {
        self.aliases.get(alias).copied()
    }
}

/// Ownership of namespaces and vars. The analyzer resolves and interns
/// through this interface and mutates usage flags on it; arenas keep
/// every handle stable for the lifetime of the environment.
pub struct GlobalEnv {
    namespaces: Vec<Namespace>,
    ns_by_name: HashMap<String, NsId>,
    vars: Vec<Var>,
    core: NsId,
    current: NsId,
}

impl GlobalEnv {
    pub fn new() -> Self {
        let mut env = Self {
            namespaces: Vec::new(),
            ns_by_name: HashMap::new(),
            vars: Vec::new(),
            core: NsId(0),
            current: NsId(0),
        };
        env.core = env.ensure_namespace(&Symbol::new(CORE_NS_NAME));
        env.current = env.ensure_namespace(&Symbol::new(USER_NS_NAME));
        env
    }

    pub fn core_ns(&self) -> NsId {
        self.core
    }

    pub fn current_ns(&self) -> NsId {
        self.current
    }

    pub fn set_current_ns(&mut self, ns: NsId) {
        self.current = ns;
    }

    pub fn namespace(&self, id: NsId) -> &Namespace {
        &self.namespaces[id.0 as usize]
    }

    pub fn namespace_mut(&mut self, id: NsId) -> &mut Namespace {
        &mut self.namespaces[id.0 as usize]
    }

    pub fn var(&self, id: VarId) -> &Var {
        &self.vars[id.0 as usize]
    }

    pub fn var_mut(&mut self, id: VarId) -> &mut Var {
        &mut self.vars[id.0 as usize]
    }

    pub fn all_namespaces(&self) -> impl Iterator<Item = (NsId, &Namespace)> {
        self.namespaces
            .iter()
            .enumerate()
            .map(|(i, ns)| (NsId(i as u32), ns))
    }

    /// Creates the namespace if it does not exist yet. The first
    /// positioned name symbol seen for it sticks, so unused-namespace
    /// warnings can point at the declaration site.
    pub fn ensure_namespace(&mut self, sym: &Symbol) -> NsId {
        if let Some(id) = self.ns_by_name.get(&sym.name) {
            let ns = &mut self.namespaces[id.0 as usize];
            if ns.name.span.is_none() && sym.span.is_some() {
                ns.name.span = sym.span.clone();
            }
            return *id;
        }
        let id = NsId(self.namespaces.len() as u32);
        self.namespaces.push(Namespace::new(sym.unqualified()));
        self.ns_by_name.insert(sym.name.clone(), id);
        id
    }

    pub fn find_namespace(&self, name: &str) -> Option<NsId> {
        self.ns_by_name.get(name).copied()
    }

    pub fn add_alias(&mut self, ns: NsId, alias: impl Into<String>, target: NsId) {
        self.namespace_mut(ns).aliases.insert(alias.into(), target);
    }

    /// The namespace a qualified symbol refers to when seen from
    /// `from`: aliases win over global names. Unqualified symbols have
    /// no namespace.
    pub fn namespace_for(&self, from: NsId, sym: &Symbol) -> Option<NsId> {
        let ns_name = sym.ns.as_deref()?;
        self.namespace(from)
            .alias_target(ns_name)
            .or_else(|| self.find_namespace(ns_name))
    }

    /// Looks a symbol up from the current namespace, respecting
    /// aliases. Unqualified symbols fall back to the core namespace.
    pub fn resolve(&self, sym: &Symbol) -> Option<VarId> {
        match &sym.ns {
            Some(_) => {
                let ns = self.namespace_for(self.current, sym)?;
                self.resolve_in(ns, &sym.name)
            }
            None => self
                .resolve_in(self.current, &sym.name)
                .or_else(|| self.resolve_in(self.core, &sym.name)),
        }
    }

    pub fn resolve_in(&self, ns: NsId, name: &str) -> Option<VarId> {
        self.namespace(ns).mappings.get(name).copied()
    }

    /// Creates or fetches a var in the given namespace. Re-interning a
    /// fake var promotes it to a real one.
    pub fn intern(&mut self, ns: NsId, sym: &Symbol) -> VarId {
        if let Some(id) = self.resolve_in(ns, &sym.name) {
            self.var_mut(id).is_fake = false;
            return id;
        }
        let id = VarId(self.vars.len() as u32);
        self.vars.push(Var::new(ns, sym.unqualified()));
        self.namespaces[ns.0 as usize]
            .mappings
            .insert(sym.name.clone(), id);
        id
    }

    /// Linter-only placeholder interning: when the apparent namespace
    /// is unknown, the full printed name lands in the current one.
    pub fn intern_fake(&mut self, ns: Option<NsId>, sym: &Symbol) -> VarId {
        let (ns, name) = match ns {
            Some(ns) => (ns, Symbol::new(sym.name.clone())),
            None => (self.current, Symbol::new(sym.to_string())),
        };
        if let Some(id) = self.resolve_in(ns, &name.name) {
            return id;
        }
        let id = self.intern(ns, &name);
        self.var_mut(id).is_fake = true;
        id
    }

    /// Marks a var and its home namespace used, both per-file and
    /// globally.
    pub fn mark_var_used(&mut self, id: VarId) {
        let ns = {
            let var = self.var_mut(id);
            var.used = true;
            var.globally_used = true;
            var.ns
        };
        let ns = self.namespace_mut(ns);
        ns.used = true;
        ns.globally_used = true;
    }

    pub fn var_qualified_name(&self, id: VarId) -> String {
        let var = self.var(id);
        format!("{}/{}", self.namespace(var.ns).name.name, var.name.name)
    }
}

impl Default for GlobalEnv {
    fn default() -> Self {
        Self::new()
    }
}

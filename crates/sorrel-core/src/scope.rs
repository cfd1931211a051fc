use std::collections::HashMap;

use crate::form::Symbol;
use crate::types::TypeKind;

/// Stable handle into a [`Scope`]'s binding arena. Handles stay valid
/// after their frame is popped, so expressions can point into the
/// scope without ownership cycles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BindingId(u32);

#[derive(Clone, Debug)]
pub struct Binding {
    pub name: Symbol,
    pub index: usize,
    pub frame: usize,
    pub used: bool,
    pub inferred_type: Option<TypeKind>,
}

#[derive(Default)]
struct Frame {
    by_name: HashMap<String, BindingId>,
}

/// Nested lexical frames over an arena of binding descriptors.
#[derive(Default)]
pub struct Scope {
    slots: Vec<Binding>,
    frames: Vec<Frame>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_frame(&mut self) {
        self.frames.push(Frame::default());
    }

    pub fn pop_frame(&mut self) {
        self.frames.pop();
    }

    /// Number of currently live frames.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Adds a binding to the innermost frame. Returns the new handle
    /// plus the handle it shadowed in the same frame, if any.
    pub fn add(
        &mut self,
        name: Symbol,
        index: usize,
        inferred_type: Option<TypeKind>,
    ) -> (BindingId, Option<BindingId>) {
        debug_assert!(!self.frames.is_empty(), "no frame to bind into");
        let frame_depth = self.frames.len() - 1;
        let id = BindingId(self.slots.len() as u32);
        let key = name.name.clone();
        self.slots.push(Binding {
            name,
            index,
            frame: frame_depth,
            used: false,
            inferred_type,
        });
        let frame = self.frames.last_mut().expect("frame pushed above");
        let shadowed = frame.by_name.insert(key, id);
        (id, shadowed)
    }

    /// Looks a symbol up through the frame chain. Qualified symbols
    /// never name locals.
    pub fn lookup(&self, sym: &Symbol) -> Option<BindingId> {
        if sym.is_qualified() {
            return None;
        }
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.by_name.get(&sym.name).copied())
    }

    pub fn get(&self, id: BindingId) -> &Binding {
        &self.slots[id.0 as usize]
    }

    pub fn mark_used(&mut self, id: BindingId) {
        self.slots[id.0 as usize].used = true;
    }

    pub fn set_inferred_type(&mut self, id: BindingId, inferred: Option<TypeKind>) {
        self.slots[id.0 as usize].inferred_type = inferred;
    }

    /// Live bindings of the innermost frame; shadowed entries are
    /// gone. Callers sort by name for deterministic output.
    pub fn top_frame_bindings(&self) -> Vec<BindingId> {
        self.frames
            .last()
            .map(|frame| frame.by_name.values().copied().collect())
            .unwrap_or_default()
    }

    /// Every name visible from the innermost frame, innermost
    /// occurrence winning. Used to build the `&env` map for macros.
    pub fn visible_symbols(&self) -> Vec<Symbol> {
        let mut seen = std::collections::HashSet::new();
        let mut result = Vec::new();
        for frame in self.frames.iter().rev() {
            for id in frame.by_name.values() {
                let binding = self.get(*id);
                if seen.insert(binding.name.name.clone()) {
                    result.push(binding.name.clone());
                }
            }
        }
        result
    }
}

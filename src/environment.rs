use std::{cell::RefCell, rc::Rc};

use indexmap::{IndexMap, IndexSet};

use crate::value::{ObjectValue, Value};

pub type Slot = u32;

/// Slot 0 of every scope is reserved for the frame's return value.
pub const RETURN_SLOT: Slot = 0;

pub type ScopeRef = Rc<RefCell<Scope>>;

/// One environment frame: a name table allocated during lowering and the
/// slot storage written at run time. The global scope additionally tracks
/// which names were exported with `pub`.
pub struct Scope {
    names: IndexMap<String, Slot>,
    slots: Vec<Option<Value>>,
    next: Slot,
    exported: IndexSet<String>,
}

impl Scope {
    pub fn new() -> ScopeRef {
        Rc::new(RefCell::new(Self {
            names: IndexMap::new(),
            slots: Vec::new(),
            next: RETURN_SLOT + 1,
            exported: IndexSet::new(),
        }))
    }

    /// Idempotent: returns the existing slot when the name is known.
    pub fn register(&mut self, name: &str) -> Slot {
        if let Some(slot) = self.names.get(name) {
            return *slot;
        }
        let slot = self.next;
        self.next += 1;
        self.names.insert(name.to_string(), slot);
        slot
    }

    pub fn lookup(&self, name: &str) -> Option<Slot> {
        self.names.get(name).copied()
    }

    pub fn define(&mut self, slot: Slot, value: Value) {
        let idx = slot as usize;
        if self.slots.len() <= idx {
            self.slots.resize(idx + 1, None);
        }
        self.slots[idx] = Some(value);
    }

    pub fn get(&self, slot: Slot) -> Option<Value> {
        self.slots.get(slot as usize).and_then(|v| v.clone())
    }

    pub fn set_return(&mut self, value: Value) {
        self.define(RETURN_SLOT, value);
    }

    pub fn get_return(&self) -> Value {
        self.get(RETURN_SLOT).unwrap_or_else(Value::none)
    }

    /// Marks a name as exported; false when it already was.
    pub fn mark_exported(&mut self, name: &str) -> bool {
        self.exported.insert(name.to_string())
    }

    /// The `pub` names with their current values, in export order.
    pub fn export_snapshot(&self) -> ObjectValue {
        let mut exports = ObjectValue::new();
        for name in &self.exported {
            let value = self
                .lookup(name)
                .and_then(|slot| self.get(slot))
                .unwrap_or_else(Value::none);
            exports
                .insert(Value::string(name.clone()), value)
                .unwrap_or_else(|_| unreachable!("string keys always encode"));
        }
        exports
    }
}

/// The compile-time view of the environment: the global scope, the stack
/// of enclosing local scopes, and the nearest return-receiving frame (a
/// function or block-expression scope).
#[derive(Clone)]
pub struct Scopes {
    global: ScopeRef,
    locals: Vec<ScopeRef>,
    frame: Option<ScopeRef>,
}

impl Scopes {
    pub fn new() -> Self {
        Self {
            global: Scope::new(),
            locals: Vec::new(),
            frame: None,
        }
    }

    pub fn global(&self) -> &ScopeRef {
        &self.global
    }

    /// Derived scopes with one fresh local pushed.
    pub fn with_scope(&self) -> Scopes {
        let mut derived = self.clone();
        derived.locals.push(Scope::new());
        derived
    }

    /// Like `with_scope`, but the fresh scope also becomes the
    /// return-receiving frame.
    pub fn with_frame(&self) -> Scopes {
        let mut derived = self.clone();
        let scope = Scope::new();
        derived.frame = Some(Rc::clone(&scope));
        derived.locals.push(scope);
        derived
    }

    pub fn innermost(&self) -> &ScopeRef {
        self.locals.last().unwrap_or(&self.global)
    }

    pub fn lookup(&self, name: &str) -> Option<(ScopeRef, Slot)> {
        for scope in self.locals.iter().rev() {
            if let Some(slot) = scope.borrow().lookup(name) {
                return Some((Rc::clone(scope), slot));
            }
        }
        self.global
            .borrow()
            .lookup(name)
            .map(|slot| (Rc::clone(&self.global), slot))
    }

    /// Resolves a name, allocating it in the innermost scope when unbound.
    pub fn register(&self, name: &str) -> (ScopeRef, Slot) {
        if let Some(found) = self.lookup(name) {
            return found;
        }
        let scope = self.innermost();
        let slot = scope.borrow_mut().register(name);
        (Rc::clone(scope), slot)
    }

    /// Writes the return value of the nearest enclosing frame.
    pub fn set_return(&self, value: Value) {
        match &self.frame {
            Some(frame) => frame.borrow_mut().set_return(value),
            None => self.innermost().borrow_mut().set_return(value),
        }
    }
}

impl Default for Scopes {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_is_idempotent() {
        let scopes = Scopes::new();
        let (_, first) = scopes.register("x");
        let (_, second) = scopes.register("x");
        assert_eq!(first, second);
        assert_ne!(first, RETURN_SLOT);
    }

    #[test]
    fn lookup_walks_locals_before_global() {
        let scopes = Scopes::new();
        scopes.global().borrow_mut().register("x");
        let inner = scopes.with_scope();
        let (scope, slot) = inner.register("x");
        assert!(Rc::ptr_eq(&scope, inner.global()));
        scope.borrow_mut().define(slot, Value::int(1));

        let (shadow_scope, shadow_slot) = {
            let slot = inner.innermost().borrow_mut().register("y");
            (Rc::clone(inner.innermost()), slot)
        };
        shadow_scope.borrow_mut().define(shadow_slot, Value::int(2));
        let (found, found_slot) = inner.lookup("y").expect("y is bound");
        assert!(Rc::ptr_eq(&found, &shadow_scope));
        assert_eq!(found_slot, shadow_slot);
    }

    #[test]
    fn unbound_names_allocate_innermost() {
        let scopes = Scopes::new();
        let inner = scopes.with_scope();
        let (scope, _) = inner.register("fresh");
        assert!(Rc::ptr_eq(&scope, inner.innermost()));
        assert!(scopes.global().borrow().lookup("fresh").is_none());
    }

    #[test]
    fn set_return_targets_the_frame() {
        let scopes = Scopes::new();
        let framed = scopes.with_frame();
        let frame_scope = Rc::clone(framed.innermost());
        // A nested plain scope still returns through the frame.
        let nested = framed.with_scope();
        nested.set_return(Value::int(9));
        assert_eq!(frame_scope.borrow().get_return().to_string(), "9");
    }

    #[test]
    fn export_snapshot_reads_final_values() {
        let scopes = Scopes::new();
        let (scope, slot) = scopes.register("x");
        scope.borrow_mut().define(slot, Value::int(1));
        assert!(scopes.global().borrow_mut().mark_exported("x"));
        assert!(!scopes.global().borrow_mut().mark_exported("x"));
        scope.borrow_mut().define(slot, Value::int(10));

        let exports = scopes.global().borrow().export_snapshot();
        assert_eq!(exports.get_named("x").unwrap().to_string(), "10");
    }
}

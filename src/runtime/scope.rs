// Foxscream Scope Arena
// Scopes live in an arena and link to their parent by index

use std::mem;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::ast::Expr;

use super::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Root,
    /// Captured variables of a function call
    Closure,
    /// Receiver fields spliced under a method body
    Fields,
    Function,
    Class,
    Loop,
    Block,
}

impl ScopeKind {
    /// Scopes that receive first-time assignments
    pub fn is_declaration(self) -> bool {
        matches!(self, ScopeKind::Root | ScopeKind::Function | ScopeKind::Class)
    }

    /// Scopes that signals may not cross
    fn is_boundary(self) -> bool {
        matches!(self, ScopeKind::Root | ScopeKind::Function | ScopeKind::Class)
    }
}

/// In-flight early exit
#[derive(Debug, Clone, Default)]
pub enum Signal {
    #[default]
    None,
    Returning {
        /// false for a bare `return`
        explicit: bool,
        value: Value,
    },
    Breaking(Option<String>),
    Continuing(Option<String>),
    Leaving(Option<String>),
}

impl Signal {
    pub fn is_set(&self) -> bool {
        !matches!(self, Signal::None)
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Signal::None => "none",
            Signal::Returning { .. } => "return",
            Signal::Breaking(_) => "break",
            Signal::Continuing(_) => "continue",
            Signal::Leaving(_) => "leave",
        }
    }

    fn label(&self) -> Option<&str> {
        match self {
            Signal::Breaking(label) | Signal::Continuing(label) | Signal::Leaving(label) => {
                label.as_deref()
            }
            _ => None,
        }
    }
}

pub struct Scope {
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    pub label: Option<String>,
    pub signal: Signal,
    pub bindings: FxHashMap<String, Value>,
    /// Front runs first
    pub defers: Vec<Rc<Expr>>,
    /// Class scopes: names declared `static`
    pub statics: Vec<String>,
}

impl Scope {
    fn new(kind: ScopeKind, parent: Option<ScopeId>, label: Option<String>) -> Self {
        Self {
            kind,
            parent,
            label,
            signal: Signal::None,
            bindings: FxHashMap::default(),
            defers: Vec::new(),
            statics: Vec::new(),
        }
    }

    /// Whether this scope is where `signal` stops
    pub fn absorbs(&self, signal: &Signal) -> bool {
        let label_matches = match signal.label() {
            Some(wanted) => self.label.as_deref() == Some(wanted),
            None => true,
        };
        match signal {
            Signal::None => false,
            Signal::Returning { .. } => {
                matches!(self.kind, ScopeKind::Function | ScopeKind::Root)
            }
            Signal::Breaking(_) | Signal::Continuing(_) => {
                self.kind == ScopeKind::Loop && label_matches
            }
            Signal::Leaving(_) => {
                matches!(self.kind, ScopeKind::Block | ScopeKind::Loop) && label_matches
            }
        }
    }
}

/// Why a signal could not be delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Undelivered {
    pub keyword: &'static str,
    pub label: Option<String>,
}

/// Arena of scopes with a current-scope cursor. Released slots are reset
/// and recycled, so every issued id stays a valid index.
pub struct ScopeArena {
    slots: Vec<Scope>,
    /// Parallel to `slots`: false once a slot is released
    alive: Vec<bool>,
    free: Vec<usize>,
    root: ScopeId,
    current: ScopeId,
}

impl ScopeArena {
    pub fn new() -> Self {
        let root = ScopeId(0);
        Self {
            slots: vec![Scope::new(ScopeKind::Root, None, None)],
            alive: vec![true],
            free: Vec::new(),
            root,
            current: root,
        }
    }

    pub fn root(&self) -> ScopeId {
        self.root
    }

    pub fn current(&self) -> ScopeId {
        self.current
    }

    pub fn set_current(&mut self, id: ScopeId) {
        self.current = id;
    }

    /// Number of live scopes, root included
    pub fn live(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.slots[id.0]
    }

    fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.slots[id.0]
    }

    /// Create a scope under `parent` and make it current
    pub fn enter(&mut self, kind: ScopeKind, parent: ScopeId, label: Option<String>) -> ScopeId {
        let scope = Scope::new(kind, Some(parent), label);
        let id = match self.free.pop() {
            Some(index) => {
                self.slots[index] = scope;
                self.alive[index] = true;
                ScopeId(index)
            }
            None => {
                self.slots.push(scope);
                self.alive.push(true);
                ScopeId(self.slots.len() - 1)
            }
        };
        debug!(?kind, scope = id.0, parent = parent.0, "descend");
        self.current = id;
        id
    }

    /// Create a scope under the current one
    pub fn descend(&mut self, kind: ScopeKind, label: Option<String>) -> ScopeId {
        self.enter(kind, self.current, label)
    }

    /// Release a scope and return its record
    pub fn release(&mut self, id: ScopeId) -> Option<Scope> {
        if id == self.root || !self.alive[id.0] {
            return None;
        }
        self.alive[id.0] = false;
        let scope = mem::replace(
            &mut self.slots[id.0],
            Scope::new(ScopeKind::Block, None, None),
        );
        self.free.push(id.0);
        debug!(kind = ?scope.kind, scope = id.0, "ascend");
        Some(scope)
    }

    /// Drop every scope except the root and clear the root's signal
    pub fn reset_to_root(&mut self) {
        let root = self.root;
        self.slots.truncate(1);
        self.alive.truncate(1);
        self.free.clear();
        self.scope_mut(root).signal = Signal::None;
        self.scope_mut(root).defers.clear();
        self.current = root;
    }

    // ==================== Bindings ====================

    /// Look `name` up from the current scope outward
    pub fn get(&self, name: &str) -> Option<Value> {
        self.get_from(self.current, name)
    }

    pub fn get_from(&self, start: ScopeId, name: &str) -> Option<Value> {
        let mut cursor = Some(start);
        while let Some(id) = cursor {
            let scope = self.scope(id);
            if let Some(value) = scope.bindings.get(name) {
                return Some(value.clone());
            }
            cursor = scope.parent;
        }
        None
    }

    /// Bind in the current scope, shadowing outer bindings
    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        let current = self.current;
        self.scope_mut(current).bindings.insert(name.into(), value);
    }

    /// Overwrite the nearest existing binding, or create one in the nearest
    /// declaration scope
    pub fn assign(&mut self, name: &str, value: Value) {
        let mut cursor = Some(self.current);
        let mut declaration: Option<ScopeId> = None;
        while let Some(id) = cursor {
            let scope = self.scope(id);
            if scope.bindings.contains_key(name) {
                self.scope_mut(id).bindings.insert(name.to_string(), value);
                return;
            }
            if declaration.is_none() && scope.kind.is_declaration() {
                declaration = Some(id);
            }
            cursor = scope.parent;
        }
        let target = declaration.unwrap_or(self.root);
        self.scope_mut(target)
            .bindings
            .insert(name.to_string(), value);
    }

    /// Names bound directly in `id`
    pub fn bindings(&self, id: ScopeId) -> &FxHashMap<String, Value> {
        &self.scope(id).bindings
    }

    pub fn register_defer(&mut self, expr: Rc<Expr>) {
        let current = self.current;
        self.scope_mut(current).defers.insert(0, expr);
    }

    pub fn take_defers(&mut self, id: ScopeId) -> Vec<Rc<Expr>> {
        mem::take(&mut self.scope_mut(id).defers)
    }

    pub fn mark_static(&mut self, name: impl Into<String>) {
        let current = self.current;
        self.scope_mut(current).statics.push(name.into());
    }

    // ==================== Signals ====================

    pub fn signal(&self, id: ScopeId) -> &Signal {
        &self.scope(id).signal
    }

    pub fn take_signal(&mut self, id: ScopeId) -> Signal {
        mem::take(&mut self.scope_mut(id).signal)
    }

    pub fn set_signal(&mut self, id: ScopeId, signal: Signal) {
        self.scope_mut(id).signal = signal;
    }

    /// Whether the current scope has been told to stop
    pub fn interrupted(&self) -> bool {
        self.scope(self.current).signal.is_set()
    }

    /// Thread `signal` from the current scope outward until a scope absorbs
    /// it. Every scope on the way is marked so its statement list stops.
    pub fn raise(&mut self, signal: Signal) -> Result<(), Undelivered> {
        let mut cursor = Some(self.current);
        let mut path = Vec::new();
        while let Some(id) = cursor {
            let scope = self.scope(id);
            path.push(id);
            if scope.absorbs(&signal) {
                for id in path {
                    self.scope_mut(id).signal = signal.clone();
                }
                return Ok(());
            }
            if scope.kind.is_boundary() {
                break;
            }
            cursor = scope.parent;
        }
        Err(Undelivered {
            keyword: signal.keyword(),
            label: signal.label().map(String::from),
        })
    }

    /// Undo the marks `signal` left from `from` up to the scope absorbing it
    pub fn clear_signal_path(&mut self, from: ScopeId, signal: &Signal) {
        let mut cursor = Some(from);
        while let Some(id) = cursor {
            let scope = self.scope_mut(id);
            scope.signal = Signal::None;
            if scope.absorbs(signal) || scope.kind.is_boundary() {
                return;
            }
            cursor = scope.parent;
        }
    }
}

impl Default for ScopeArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{ClassLink, Object, ObjectKind, Payload};
    use pretty_assertions::assert_eq;

    fn int(n: i64) -> Value {
        Value::new(Object::new(
            ObjectKind::Primitive,
            ClassLink::SelfClass,
            Payload::Int(n),
        ))
    }

    #[test]
    fn test_bind_shadows_without_touching_outer() {
        let mut arena = ScopeArena::new();
        arena.bind("x", int(1));
        let inner = arena.descend(ScopeKind::Block, None);
        arena.bind("x", int(2));

        assert_eq!(arena.get("x").and_then(|v| v.as_int()), Some(2));
        arena.release(inner);
        arena.set_current(arena.root());
        assert_eq!(arena.get("x").and_then(|v| v.as_int()), Some(1));
    }

    #[test]
    fn test_assign_creates_in_nearest_declaration_scope() {
        let mut arena = ScopeArena::new();
        let root = arena.root();
        let function = arena.descend(ScopeKind::Function, None);
        let block = arena.descend(ScopeKind::Block, None);
        arena.assign("fresh", int(1));

        assert!(arena.bindings(block).get("fresh").is_none());
        assert!(arena.bindings(function).get("fresh").is_some());
        assert!(arena.bindings(root).get("fresh").is_none());
    }

    #[test]
    fn test_assign_overwrites_existing_outer_binding() {
        let mut arena = ScopeArena::new();
        let root = arena.root();
        arena.bind("total", int(0));
        arena.descend(ScopeKind::Loop, None);
        arena.descend(ScopeKind::Block, None);
        arena.assign("total", int(5));

        assert_eq!(
            arena.bindings(root).get("total").and_then(|v| v.as_int()),
            Some(5)
        );
    }

    #[test]
    fn test_break_is_absorbed_by_loop() {
        let mut arena = ScopeArena::new();
        let root = arena.root();
        let looping = arena.descend(ScopeKind::Loop, None);
        let body = arena.descend(ScopeKind::Block, None);

        arena.raise(Signal::Breaking(None)).unwrap();
        assert!(arena.signal(body).is_set());
        assert!(arena.signal(looping).is_set());
        assert!(!arena.signal(root).is_set());
    }

    #[test]
    fn test_labeled_break_skips_inner_loop() {
        let mut arena = ScopeArena::new();
        let outer = arena.descend(ScopeKind::Loop, Some("outer".into()));
        let inner = arena.descend(ScopeKind::Loop, None);

        arena.raise(Signal::Breaking(Some("outer".into()))).unwrap();
        assert!(!arena.scope(inner).absorbs(arena.signal(inner)));
        assert!(arena.scope(outer).absorbs(arena.signal(outer)));
    }

    #[test]
    fn test_break_does_not_cross_function() {
        let mut arena = ScopeArena::new();
        arena.descend(ScopeKind::Loop, None);
        arena.descend(ScopeKind::Function, None);

        assert_eq!(
            arena.raise(Signal::Breaking(None)),
            Err(Undelivered {
                keyword: "break",
                label: None
            })
        );
    }

    #[test]
    fn test_unlabeled_leave_stops_at_nearest_block() {
        let mut arena = ScopeArena::new();
        let outer = arena.descend(ScopeKind::Block, Some("l".into()));
        let inner = arena.descend(ScopeKind::Block, None);

        arena.raise(Signal::Leaving(None)).unwrap();
        assert!(arena.signal(inner).is_set());
        assert!(!arena.signal(outer).is_set());
    }

    #[test]
    fn test_defers_are_prepended() {
        let mut arena = ScopeArena::new();
        let block = arena.descend(ScopeKind::Block, None);
        let span = crate::error::Span::default();
        for name in ["a", "b"] {
            arena.register_defer(Rc::new(Expr::Identifier {
                name: name.into(),
                span,
            }));
        }

        let order: Vec<String> = arena
            .take_defers(block)
            .iter()
            .map(|expr| match expr.as_ref() {
                Expr::Identifier { name, .. } => name.clone(),
                _ => String::new(),
            })
            .collect();
        assert_eq!(order, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_released_slots_are_recycled() {
        let mut arena = ScopeArena::new();
        let first = arena.descend(ScopeKind::Block, None);
        arena.release(first);
        arena.set_current(arena.root());
        let second = arena.descend(ScopeKind::Block, None);

        assert_eq!(first, second);
        assert_eq!(arena.live(), 2);
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut arena = ScopeArena::new();
        let first = arena.descend(ScopeKind::Block, None);
        let second = arena.descend(ScopeKind::Loop, None);

        assert_eq!(arena.release(second).map(|scope| scope.kind), Some(ScopeKind::Loop));
        assert!(arena.release(second).is_none());
        assert!(arena.release(arena.root()).is_none());
        assert_eq!(arena.live(), 2);

        // A recycled slot is live again and can be released once more
        arena.set_current(first);
        let third = arena.descend(ScopeKind::Block, None);
        assert_eq!(third, second);
        assert_eq!(arena.scope(third).kind, ScopeKind::Block);
        assert!(arena.release(third).is_some());
        assert!(arena.release(first).is_some());
        assert_eq!(arena.live(), 1);

        arena.reset_to_root();
        let fresh = arena.descend(ScopeKind::Block, None);
        assert_eq!(arena.live(), 2);
        assert!(arena.release(fresh).is_some());
    }
}

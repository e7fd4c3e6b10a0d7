// Foxscream Runtime Values
// Every datum is an object record behind a shared handle

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::ast::{ClassKind, FunctionDef};
use crate::error::{FoxResult, Span};
use crate::resolve::{CallSignature, Resolution};

use super::Runtime;

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a fresh object identity
pub fn next_id() -> u64 {
    NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Native function type: receives the runtime and the evaluated arguments
pub type NativeFn = fn(&mut Runtime, NativeCall) -> FoxResult<Value>;

/// Arguments handed to a native function
pub struct NativeCall {
    pub args: Vec<Value>,
    pub kwargs: Vec<(String, Value)>,
    pub span: Span,
}

/// How an object reaches its class
#[derive(Clone)]
pub enum ClassLink {
    /// Classes are their own class pointer
    SelfClass,
    Of(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Class(ClassKind),
    Instance,
    /// Scalars, containers and functions created by the runtime
    Primitive,
}

/// Body of one overload
pub enum Callable {
    User {
        def: Rc<FunctionDef>,
        /// Free variables captured at definition time
        closure: Rc<FxHashMap<String, Value>>,
    },
    Native(NativeFn),
}

/// One signature + body of a function value
pub struct Overload {
    pub id: u64,
    pub name: String,
    pub signature: CallSignature,
    pub body: Callable,
}

impl Overload {
    pub fn new(name: impl Into<String>, signature: CallSignature, body: Callable) -> Self {
        Self {
            id: next_id(),
            name: name.into(),
            signature,
            body,
        }
    }
}

/// Overload set carried by a function value
#[derive(Clone, Default)]
pub struct Function {
    pub overloads: Vec<Rc<Overload>>,
}

impl Function {
    /// Add an overload, replacing one that declares identical parameters
    pub fn with_overload(&self, overload: Rc<Overload>) -> Function {
        let mut overloads: Vec<Rc<Overload>> = self
            .overloads
            .iter()
            .filter(|o| !o.signature.same_parameters(&overload.signature))
            .cloned()
            .collect();
        overloads.push(overload);
        Function { overloads }
    }
}

/// A function fetched from an object, together with every inherited candidate
#[derive(Clone)]
pub struct BoundMethod {
    pub receiver: Value,
    /// (overload, field distance from the receiver)
    pub candidates: Vec<(Rc<Overload>, u32)>,
}

/// Hashable form of the scalar values allowed as dictionary keys
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DictKey {
    Null,
    Bool(bool),
    Int(i64),
    /// Non-integral floats by bit pattern; integral floats hash as `Int`
    Float(u64),
    Str(String),
}

impl DictKey {
    pub fn from_value(value: &Value) -> Option<DictKey> {
        match &value.borrow().payload {
            Payload::Null => Some(DictKey::Null),
            Payload::Bool(b) => Some(DictKey::Bool(*b)),
            Payload::Int(n) => Some(DictKey::Int(*n)),
            Payload::Float(f) => {
                if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                    Some(DictKey::Int(*f as i64))
                } else {
                    Some(DictKey::Float(f.to_bits()))
                }
            }
            Payload::Str(s) => Some(DictKey::Str(s.clone())),
            _ => None,
        }
    }
}

/// Insertion-ordered dictionary with scalar keys
#[derive(Clone, Default)]
pub struct Dict {
    entries: Vec<(Value, Value)>,
    index: FxHashMap<DictKey, usize>,
}

impl Dict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &DictKey) -> Option<&Value> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    pub fn contains(&self, key: &DictKey) -> bool {
        self.index.contains_key(key)
    }

    pub fn insert(&mut self, hashed: DictKey, key: Value, value: Value) {
        match self.index.get(&hashed) {
            Some(&i) => self.entries[i].1 = value,
            None => {
                self.index.insert(hashed, self.entries.len());
                self.entries.push((key, value));
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Value, Value)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> Vec<Value> {
        self.entries.iter().map(|(k, _)| k.clone()).collect()
    }
}

/// Raw data an object carries
#[derive(Clone)]
pub enum Payload {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<Value>),
    Dict(Dict),
    Function(Function),
    Bound(BoundMethod),
    /// Plain instances and classes
    None,
}

/// The uniform object record
pub struct Object {
    pub id: u64,
    pub name: String,
    pub kind: ObjectKind,
    pub class: ClassLink,
    pub payload: Payload,
    /// Direct parents in declaration order (`[C]` for instances of `C`)
    pub parents: Vec<Value>,
    pub fields: FxHashMap<String, Value>,
    /// Classes only: fields copied into every new instance
    pub template: FxHashMap<String, Value>,
    /// Classes only: flattened ancestry and field tables
    pub resolution: Option<Rc<Resolution>>,
    /// Prelude classes only: calling the class converts its argument
    pub converter: Option<NativeFn>,
}

impl Object {
    pub fn new(kind: ObjectKind, class: ClassLink, payload: Payload) -> Self {
        Self {
            id: next_id(),
            name: String::new(),
            kind,
            class,
            payload,
            parents: Vec::new(),
            fields: FxHashMap::default(),
            template: FxHashMap::default(),
            resolution: None,
            converter: None,
        }
    }
}

/// Shared handle to an object. Cloning the handle aliases the object.
#[derive(Clone)]
pub struct Value(Rc<RefCell<Object>>);

impl Value {
    pub fn new(object: Object) -> Self {
        Value(Rc::new(RefCell::new(object)))
    }

    pub fn borrow(&self) -> Ref<'_, Object> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Object> {
        self.0.borrow_mut()
    }

    pub fn id(&self) -> u64 {
        self.0.borrow().id
    }

    pub fn ptr_eq(&self, other: &Value) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn is_class(&self) -> bool {
        matches!(self.borrow().kind, ObjectKind::Class(_))
    }

    pub fn class_kind(&self) -> Option<ClassKind> {
        match self.borrow().kind {
            ObjectKind::Class(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn is_instance(&self) -> bool {
        self.borrow().kind == ObjectKind::Instance
    }

    pub fn is_null(&self) -> bool {
        matches!(self.borrow().payload, Payload::Null)
    }

    pub fn is_callable(&self) -> bool {
        let object = self.borrow();
        matches!(object.payload, Payload::Function(_) | Payload::Bound(_))
            || matches!(object.kind, ObjectKind::Class(_))
    }

    /// The class this value is an instance of; `None` for classes
    pub fn class_of(&self) -> Option<Value> {
        match &self.borrow().class {
            ClassLink::SelfClass => None,
            ClassLink::Of(class) => Some(class.clone()),
        }
    }

    pub fn name(&self) -> String {
        self.borrow().name.clone()
    }

    /// Name of the value's class (or of the class itself)
    pub fn type_name(&self) -> String {
        match self.class_of() {
            Some(class) => class.name(),
            None => self.name(),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self.borrow().payload {
            Payload::Int(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self.borrow().payload {
            Payload::Int(n) => Some(n as f64),
            Payload::Float(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.borrow().payload {
            Payload::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<String> {
        match &self.borrow().payload {
            Payload::Str(s) => Some(s.clone()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<Vec<Value>> {
        match &self.borrow().payload {
            Payload::Array(items) => Some(items.clone()),
            _ => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match &self.borrow().payload {
            Payload::Null => false,
            Payload::Bool(b) => *b,
            Payload::Int(n) => *n != 0,
            Payload::Float(f) => *f != 0.0,
            Payload::Str(s) => !s.is_empty(),
            Payload::Array(items) => !items.is_empty(),
            Payload::Dict(dict) => !dict.is_empty(),
            _ => true,
        }
    }

    pub fn get_own_field(&self, name: &str) -> Option<Value> {
        self.borrow().fields.get(name).cloned()
    }

    /// Copy for closure capture and instance templates: containers and plain
    /// instances are duplicated recursively, everything else is shared.
    pub fn deep_copy(&self) -> Value {
        let mut memo = FxHashMap::default();
        self.deep_copy_with(&mut memo)
    }

    fn deep_copy_with(&self, memo: &mut FxHashMap<u64, Value>) -> Value {
        let id = self.id();
        if let Some(copy) = memo.get(&id) {
            return copy.clone();
        }

        let object = self.borrow();
        let duplicated = matches!(object.payload, Payload::Array(_) | Payload::Dict(_))
            || object.kind == ObjectKind::Instance;
        if !duplicated {
            return self.clone();
        }

        let mut copy = Object::new(object.kind, object.class.clone(), Payload::None);
        copy.name = object.name.clone();
        copy.parents = object.parents.clone();
        let copy = Value::new(copy);
        memo.insert(id, copy.clone());

        let payload = match &object.payload {
            Payload::Array(items) => {
                Payload::Array(items.iter().map(|v| v.deep_copy_with(memo)).collect())
            }
            Payload::Dict(dict) => {
                let mut cloned = Dict::new();
                for (key, value) in dict.iter() {
                    if let Some(hashed) = DictKey::from_value(key) {
                        cloned.insert(hashed, key.clone(), value.deep_copy_with(memo));
                    }
                }
                Payload::Dict(cloned)
            }
            other => other.clone(),
        };
        let fields: FxHashMap<String, Value> = object
            .fields
            .iter()
            .map(|(name, value)| (name.clone(), value.deep_copy_with(memo)))
            .collect();
        drop(object);

        {
            let mut target = copy.borrow_mut();
            target.payload = payload;
            target.fields = fields;
        }
        copy
    }

    /// Source-like rendering; strings are quoted
    pub fn repr(&self) -> String {
        self.render(true, &mut FxHashSet::default())
    }

    /// Render the value. Containers already on the path being rendered
    /// show as `[...]`.
    fn render(&self, quoted: bool, open: &mut FxHashSet<u64>) -> String {
        let object = self.borrow();
        match &object.payload {
            Payload::Null => "null".to_string(),
            Payload::Bool(b) => b.to_string(),
            Payload::Int(n) => n.to_string(),
            Payload::Float(x) => format_float(*x),
            Payload::Str(s) if quoted => format!("{:?}", s),
            Payload::Str(s) => s.clone(),
            Payload::Array(_) | Payload::Dict(_) if !open.insert(object.id) => "[...]".to_string(),
            Payload::Array(items) => {
                let items: Vec<String> = items.iter().map(|v| v.render(true, open)).collect();
                open.remove(&object.id);
                format!("[{}]", items.join(", "))
            }
            Payload::Dict(dict) => {
                let text = if dict.is_empty() {
                    "[:]".to_string()
                } else {
                    let items: Vec<String> = dict
                        .iter()
                        .map(|(k, v)| format!("{}: {}", k.render(true, open), v.render(true, open)))
                        .collect();
                    format!("[{}]", items.join(", "))
                };
                open.remove(&object.id);
                text
            }
            Payload::Function(_) if object.name.is_empty() => "<fn>".to_string(),
            Payload::Function(_) => format!("<fn {}>", object.name),
            Payload::Bound(bound) => {
                format!("<method {} of {}>", object.name, bound.receiver.type_name())
            }
            Payload::None => match object.kind {
                ObjectKind::Class(kind) if object.name.is_empty() => format!("<{}>", kind),
                ObjectKind::Class(kind) => format!("<{} {}>", kind, object.name),
                _ => format!("<{} instance>", self.type_name()),
            },
        }
    }

    /// Structural equality. A pair of containers met again while comparing
    /// them counts as equal, so cyclic structures terminate.
    fn equals(&self, other: &Value, pairs: &mut FxHashSet<(u64, u64)>) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        let left = self.borrow();
        let right = other.borrow();
        match (&left.payload, &right.payload) {
            (Payload::Null, Payload::Null) => true,
            (Payload::Bool(a), Payload::Bool(b)) => a == b,
            (Payload::Int(a), Payload::Int(b)) => a == b,
            (Payload::Float(a), Payload::Float(b)) => a == b,
            (Payload::Int(a), Payload::Float(b)) | (Payload::Float(b), Payload::Int(a)) => {
                (*a as f64) == *b
            }
            (Payload::Str(a), Payload::Str(b)) => a == b,
            (Payload::Array(_), Payload::Array(_)) | (Payload::Dict(_), Payload::Dict(_))
                if !pairs.insert((left.id, right.id)) =>
            {
                true
            }
            (Payload::Array(a), Payload::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equals(y, pairs))
            }
            (Payload::Dict(a), Payload::Dict(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(key, value)| {
                        DictKey::from_value(key)
                            .and_then(|hashed| b.get(&hashed).cloned())
                            .is_some_and(|found| value.equals(&found, pairs))
                    })
            }
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other, &mut FxHashSet::default())
    }
}

fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{:.1}", f)
    } else {
        format!("{}", f)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render(false, &mut FxHashSet::default()))
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value#{}({})", self.id(), self.repr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn scalar(payload: Payload) -> Value {
        Value::new(Object::new(
            ObjectKind::Primitive,
            ClassLink::SelfClass,
            payload,
        ))
    }

    #[test]
    fn test_equality_is_structural_for_scalars_and_containers() {
        assert_eq!(scalar(Payload::Int(1)), scalar(Payload::Float(1.0)));
        assert_eq!(
            scalar(Payload::Array(vec![scalar(Payload::Int(1))])),
            scalar(Payload::Array(vec![scalar(Payload::Int(1))]))
        );
        assert_ne!(
            scalar(Payload::Str("a".into())),
            scalar(Payload::Str("b".into()))
        );
    }

    #[test]
    fn test_deep_copy_duplicates_arrays() {
        let inner = scalar(Payload::Array(vec![scalar(Payload::Int(1))]));
        let outer = scalar(Payload::Array(vec![inner.clone()]));
        let copy = outer.deep_copy();

        assert!(!copy.ptr_eq(&outer));
        if let Payload::Array(items) = &mut inner.borrow_mut().payload {
            items.push(scalar(Payload::Int(2)));
        }
        assert_eq!(copy.to_string(), "[[1]]");
        assert_eq!(outer.to_string(), "[[1, 2]]");
    }

    #[test]
    fn test_display() {
        assert_eq!(scalar(Payload::Float(2.0)).to_string(), "2.0");
        assert_eq!(scalar(Payload::Float(2.5)).to_string(), "2.5");
        assert_eq!(scalar(Payload::Dict(Dict::new())).to_string(), "[:]");
        let mut dict = Dict::new();
        let key = scalar(Payload::Str("a".into()));
        dict.insert(DictKey::Str("a".into()), key, scalar(Payload::Int(1)));
        assert_eq!(scalar(Payload::Dict(dict)).to_string(), "[\"a\": 1]");
    }

    #[test]
    fn test_self_referencing_arrays_compare_and_render() {
        let left = scalar(Payload::Array(vec![scalar(Payload::Int(1))]));
        let right = scalar(Payload::Array(vec![scalar(Payload::Int(1))]));
        for value in [&left, &right] {
            if let Payload::Array(items) = &mut value.borrow_mut().payload {
                items[0] = value.clone();
            }
        }

        assert_eq!(left, right);
        assert_eq!(left.to_string(), "[[...]]");
        assert_eq!(left.repr(), "[[...]]");
        assert_ne!(left, scalar(Payload::Array(vec![scalar(Payload::Int(1))])));
    }

    #[test]
    fn test_integral_float_keys_alias_int_keys() {
        assert_eq!(
            DictKey::from_value(&scalar(Payload::Float(3.0))),
            Some(DictKey::Int(3))
        );
        assert_eq!(DictKey::from_value(&scalar(Payload::Array(vec![]))), None);
    }
}

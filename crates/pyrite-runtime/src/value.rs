//! Runtime values
//!
//! Values are reference counted with `Rc`; a `Runtime` and everything it hands
//! out is confined to the thread that created it.

use crate::callable::Callable;
use crate::error::{ExceptionKind, RuntimeError, RuntimeResult};
use crate::generator::Generator;
use num::BigInt;
use rustc_hash::FxHasher;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::hash::{BuildHasherDefault, Hash, Hasher};
use std::rc::Rc;

// ============================================================================
// Names
// ============================================================================

/// An identifier with its hash computed once up front.
///
/// Names produced by [`crate::Runtime::intern`] share one allocation, so
/// keyword matching can compare by pointer before falling back to text.
#[derive(Clone)]
pub struct Name {
    text: Rc<str>,
    hash: u64,
}

impl Name {
    pub fn new(text: &str) -> Self {
        Self::from_rc(Rc::from(text))
    }

    pub fn from_rc(text: Rc<str>) -> Self {
        let mut hasher = FxHasher::default();
        hasher.write(text.as_bytes());
        let hash = hasher.finish();
        Self { text, hash }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn as_rc(&self) -> &Rc<str> {
        &self.text
    }

    /// Precomputed hash, reused by every namespace lookup
    pub fn precomputed_hash(&self) -> u64 {
        self.hash
    }

    /// Identity comparison (same interned allocation)
    pub fn ptr_eq(&self, other: &Name) -> bool {
        Rc::ptr_eq(&self.text, &other.text)
    }

    /// Names with a leading underscore are skipped by `import *`
    pub fn is_private(&self) -> bool {
        self.text.starts_with('_')
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || (self.hash == other.hash && self.text == other.text)
    }
}

impl Eq for Name {}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.text)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl From<&str> for Name {
    fn from(text: &str) -> Self {
        Name::new(text)
    }
}

/// Hasher that passes a [`Name`]'s precomputed hash straight through
#[derive(Default)]
pub struct NameHasher(u64);

impl Hasher for NameHasher {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.0 = self.0.rotate_left(5) ^ u64::from(byte);
        }
    }

    fn write_u64(&mut self, n: u64) {
        self.0 = n;
    }
}

/// Hash map keyed by [`Name`] without rehashing
pub type NameMap<V> = HashMap<Name, V, BuildHasherDefault<NameHasher>>;

// ============================================================================
// Namespaces and scopes
// ============================================================================

/// A shared, string-keyed dictionary (module globals, builtins, `**kwargs`).
#[derive(Clone, Default)]
pub struct Namespace(Rc<RefCell<NameMap<Value>>>);

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &Name) -> Option<Value> {
        self.0.borrow().get(name).cloned()
    }

    pub fn contains(&self, name: &Name) -> bool {
        self.0.borrow().contains_key(name)
    }

    /// Insert a binding, returning the value it replaced
    pub fn insert(&self, name: Name, value: Value) -> Option<Value> {
        self.0.borrow_mut().insert(name, value)
    }

    pub fn remove(&self, name: &Name) -> Option<Value> {
        self.0.borrow_mut().remove(name)
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Snapshot of the current keys
    pub fn keys(&self) -> Vec<Name> {
        self.0.borrow().keys().cloned().collect()
    }

    /// Snapshot of the current bindings
    pub fn entries(&self) -> Vec<(Name, Value)> {
        self.0
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn clear(&self) {
        // Values are dropped after the borrow ends; dropping one may release
        // a generator frame that touches this namespace.
        let old = std::mem::take(&mut *self.0.borrow_mut());
        drop(old);
    }

    pub fn ptr_eq(&self, other: &Namespace) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Number of live handles to this namespace
    pub fn handle_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = self.keys().iter().map(|k| k.to_string()).collect();
        keys.sort();
        f.debug_tuple("Namespace").field(&keys).finish()
    }
}

/// A frame's local scope: a plain dictionary or any object speaking the
/// mapping protocol.
#[derive(Clone, Debug)]
pub enum Scope {
    Dict(Namespace),
    Mapping(ObjectRef),
}

// ============================================================================
// Cells
// ============================================================================

/// Shared indirect storage for a closed-over variable
#[derive(Clone, Default)]
pub struct CellRef(Rc<RefCell<Option<Value>>>);

impl CellRef {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_value(value: Value) -> Self {
        Self(Rc::new(RefCell::new(Some(value))))
    }

    pub fn get(&self) -> Option<Value> {
        self.0.borrow().clone()
    }

    pub fn set(&self, value: Value) {
        let old = self.0.replace(Some(value));
        drop(old);
    }

    pub fn take(&self) -> Option<Value> {
        self.0.borrow_mut().take()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_none()
    }

    pub fn ptr_eq(&self, other: &CellRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0.borrow() {
            Some(value) => write!(f, "<cell: {}>", value.repr()),
            None => f.write_str("<cell: empty>"),
        }
    }
}

// ============================================================================
// Host objects
// ============================================================================

/// Objects supplied by the embedding object model.
///
/// Every method has a default that reports the operation as unsupported, so
/// an implementor only overrides the protocols it speaks.
pub trait Object: fmt::Debug {
    fn type_name(&self) -> &str;

    fn get_attr(&self, _name: &Name) -> Option<Value> {
        None
    }

    fn set_attr(&self, name: &Name, _value: Value) -> RuntimeResult<()> {
        Err(RuntimeError::AttributeNotFound {
            type_name: self.type_name().to_string(),
            name: name.to_string(),
        })
    }

    /// Attribute dictionary, if the object has one
    fn namespace(&self) -> Option<Namespace> {
        None
    }

    /// Whether the object implements the mapping protocol
    fn is_mapping(&self) -> bool {
        false
    }

    fn get_item(&self, _key: &Value) -> RuntimeResult<Value> {
        Err(RuntimeError::TypeError(format!(
            "'{}' object is not subscriptable",
            self.type_name()
        )))
    }

    fn set_item(&self, _key: &Value, _value: Value) -> RuntimeResult<()> {
        Err(RuntimeError::TypeError(format!(
            "'{}' object does not support item assignment",
            self.type_name()
        )))
    }

    fn del_item(&self, _key: &Value) -> RuntimeResult<()> {
        Err(RuntimeError::TypeError(format!(
            "'{}' object does not support item deletion",
            self.type_name()
        )))
    }

    fn is_iterator(&self) -> bool {
        false
    }

    /// Advance an iterator; `Ok(None)` signals the end of iteration
    fn next_item(&self) -> RuntimeResult<Option<Value>> {
        Err(RuntimeError::TypeError(format!(
            "'{}' object is not an iterator",
            self.type_name()
        )))
    }
}

pub type ObjectRef = Rc<dyn Object>;

/// Shared mutable list storage
pub type ListRef = Rc<RefCell<Vec<Value>>>;

/// A module's runtime object: its name and namespace
#[derive(Debug)]
pub struct ModuleObject {
    name: Rc<str>,
    namespace: Namespace,
}

impl ModuleObject {
    pub fn new(name: Rc<str>, namespace: Namespace) -> Self {
        Self { name, namespace }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }
}

/// An exception instance
#[derive(Debug)]
pub struct ExceptionObject {
    kind: ExceptionKind,
    args: Vec<Value>,
    cause: RefCell<Option<Value>>,
}

impl ExceptionObject {
    pub fn new(kind: ExceptionKind, args: Vec<Value>) -> Self {
        Self {
            kind,
            args,
            cause: RefCell::new(None),
        }
    }

    pub fn kind(&self) -> ExceptionKind {
        self.kind
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// `str(exc)`: empty, the single argument, or the argument tuple
    pub fn message(&self) -> String {
        match self.args.as_slice() {
            [] => String::new(),
            [single] => single.to_string(),
            many => Value::Tuple(Rc::from(many.to_vec())).repr(),
        }
    }

    pub fn cause(&self) -> Option<Value> {
        self.cause.borrow().clone()
    }

    pub fn set_cause(&self, cause: Option<Value>) {
        let old = self.cause.replace(cause);
        drop(old);
    }
}

// ============================================================================
// Value
// ============================================================================

/// A runtime value
///
/// `PartialEq` is structural; the language's `==` goes through the object
/// runtime's rich comparison.
#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    /// Integers outside the `i64` range
    BigInt(Rc<BigInt>),
    Float(f64),
    Str(Rc<str>),
    Tuple(Rc<[Value]>),
    List(ListRef),
    Dict(Namespace),
    Cell(CellRef),
    Callable(Callable),
    Generator(Generator),
    Module(Rc<ModuleObject>),
    ExceptionType(ExceptionKind),
    Exception(Rc<ExceptionObject>),
    Object(ObjectRef),
}

impl Value {
    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn tuple(items: Vec<Value>) -> Value {
        Value::Tuple(Rc::from(items))
    }

    /// Build an integer, demoting to `Int` when it fits in 64 bits
    pub fn from_bigint(value: BigInt) -> Value {
        use num::ToPrimitive;
        match value.to_i64() {
            Some(small) => Value::Int(small),
            None => Value::BigInt(Rc::new(value)),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) | Value::BigInt(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Tuple(_) => "tuple",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
            Value::Cell(_) => "cell",
            Value::Callable(Callable::Function(_)) => "function",
            Value::Callable(Callable::BoundMethod(_)) => "method",
            Value::Callable(Callable::Native(_)) => "builtin_function_or_method",
            Value::Generator(_) => "generator",
            Value::Module(_) => "module",
            Value::ExceptionType(_) => "type",
            Value::Exception(exc) => exc.kind().name(),
            Value::Object(obj) => obj.type_name(),
        }
    }

    /// Identity comparison (`is`)
    pub fn is_same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::BigInt(a), Value::BigInt(b)) => Rc::ptr_eq(a, b),
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => Rc::ptr_eq(a, b),
            (Value::Tuple(a), Value::Tuple(b)) => Rc::ptr_eq(a, b),
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Dict(a), Value::Dict(b)) => a.ptr_eq(b),
            (Value::Cell(a), Value::Cell(b)) => a.ptr_eq(b),
            (Value::Callable(a), Value::Callable(b)) => a.ptr_eq(b),
            (Value::Generator(a), Value::Generator(b)) => a.ptr_eq(b),
            (Value::Module(a), Value::Module(b)) => Rc::ptr_eq(a, b),
            (Value::ExceptionType(a), Value::ExceptionType(b)) => a == b,
            (Value::Exception(a), Value::Exception(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// `repr()` text
    pub fn repr(&self) -> String {
        match self {
            Value::None => "None".to_string(),
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            Value::Int(i) => i.to_string(),
            Value::BigInt(b) => b.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Str(s) => format!("'{}'", s),
            Value::Tuple(items) => {
                let parts: Vec<String> = items.iter().map(Value::repr).collect();
                if parts.len() == 1 {
                    format!("({},)", parts[0])
                } else {
                    format!("({})", parts.join(", "))
                }
            }
            Value::List(items) => {
                let parts: Vec<String> = items.borrow().iter().map(Value::repr).collect();
                format!("[{}]", parts.join(", "))
            }
            Value::Dict(ns) => {
                let mut parts: Vec<String> = ns
                    .entries()
                    .iter()
                    .map(|(k, v)| format!("'{}': {}", k, v.repr()))
                    .collect();
                parts.sort();
                format!("{{{}}}", parts.join(", "))
            }
            Value::Cell(cell) => format!("{:?}", cell),
            Value::Callable(callable) => match callable {
                Callable::Function(f) => format!("<function {}>", f.name()),
                Callable::BoundMethod(m) => format!("<bound method {}>", m.function().name()),
                Callable::Native(n) => format!("<built-in function {}>", n.name()),
            },
            Value::Generator(g) => format!("<generator object {}>", g.name()),
            Value::Module(m) => format!("<module '{}'>", m.name()),
            Value::ExceptionType(kind) => format!("<class '{}'>", kind),
            Value::Exception(exc) => {
                let args: Vec<String> = exc.args().iter().map(Value::repr).collect();
                format!("{}({})", exc.kind(), args.join(", "))
            }
            Value::Object(obj) => format!("<{} object>", obj.type_name()),
        }
    }
}

fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{:.1}", f)
    } else if f.is_nan() {
        "nan".to_string()
    } else if f.is_infinite() {
        let text = if f > 0.0 { "inf" } else { "-inf" };
        text.to_string()
    } else {
        f.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::Exception(exc) => f.write_str(&exc.message()),
            other => f.write_str(&other.repr()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) => a[..] == b[..],
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Dict(a), Value::Dict(b)) => {
                a.ptr_eq(b) || {
                    let left = a.entries();
                    left.len() == b.len()
                        && left
                            .iter()
                            .all(|(k, v)| b.get(k).map_or(false, |other| *v == other))
                }
            }
            _ => self.is_same(other),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(Rc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(Rc::from(value))
    }
}

impl From<Callable> for Value {
    fn from(value: Callable) -> Self {
        Value::Callable(value)
    }
}

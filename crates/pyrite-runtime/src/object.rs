//! Object runtime boundary
//!
//! [`ObjectRuntime`] is the generic protocol the fast paths in [`crate::ops`]
//! fall back to: attribute and item access, numeric operators, comparison,
//! truthiness, iteration and builtin-module import. [`StandardObjects`] is the
//! implementation used unless the embedder installs its own.

use crate::error::{RuntimeError, RuntimeResult};
use crate::value::{ListRef, Name, Namespace, Object, Value};
use num::{BigInt, Integer, ToPrimitive, Zero};
use rustc_hash::FxHashMap;
use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::rc::Rc;

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    TrueDivide,
    FloorDivide,
    Modulo,
    BitAnd,
    BitOr,
    BitXor,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::TrueDivide => "/",
            BinaryOp::FloorDivide => "//",
            BinaryOp::Modulo => "%",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
        }
    }
}

/// Unary operators other than `not`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negative,
    Positive,
    Invert,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Negative => "unary -",
            UnaryOp::Positive => "unary +",
            UnaryOp::Invert => "unary ~",
        }
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Lt,
    Le,
    Eq,
    Ne,
    Gt,
    Ge,
    In,
    NotIn,
    Is,
    IsNot,
    ExceptionMatch,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::In => "in",
            CompareOp::NotIn => "not in",
            CompareOp::Is => "is",
            CompareOp::IsNot => "is not",
            CompareOp::ExceptionMatch => "exception match",
        }
    }

    /// Whether an ordering satisfies this operator; `None` means unordered
    pub fn holds(self, ordering: Option<Ordering>) -> bool {
        match (self, ordering) {
            (CompareOp::Ne, None) => true,
            (_, None) => false,
            (CompareOp::Lt, Some(o)) => o == Ordering::Less,
            (CompareOp::Le, Some(o)) => o != Ordering::Greater,
            (CompareOp::Eq, Some(o)) => o == Ordering::Equal,
            (CompareOp::Ne, Some(o)) => o != Ordering::Equal,
            (CompareOp::Gt, Some(o)) => o == Ordering::Greater,
            (CompareOp::Ge, Some(o)) => o != Ordering::Less,
            _ => false,
        }
    }
}

/// The generic object protocol
///
/// Implementations must behave identically to the inline fast paths for the
/// operand types those paths handle.
pub trait ObjectRuntime {
    fn binary_op(&self, op: BinaryOp, lhs: &Value, rhs: &Value) -> RuntimeResult<Value>;

    fn unary_op(&self, op: UnaryOp, operand: &Value) -> RuntimeResult<Value>;

    /// Rich comparison for `<`, `<=`, `==`, `!=`, `>`, `>=`
    fn rich_compare(&self, op: CompareOp, lhs: &Value, rhs: &Value) -> RuntimeResult<Value>;

    fn is_true(&self, value: &Value) -> RuntimeResult<bool>;

    fn contains(&self, container: &Value, item: &Value) -> RuntimeResult<bool>;

    fn get_attr(&self, target: &Value, name: &Name) -> RuntimeResult<Value>;

    fn set_attr(&self, target: &Value, name: &Name, value: Value) -> RuntimeResult<()>;

    fn get_item(&self, target: &Value, key: &Value) -> RuntimeResult<Value>;

    fn set_item(&self, target: &Value, key: &Value, value: Value) -> RuntimeResult<()>;

    fn del_item(&self, target: &Value, key: &Value) -> RuntimeResult<()>;

    /// The attribute dictionary of `value`, if it has one
    fn namespace_of(&self, value: &Value) -> Option<Namespace>;

    /// Obtain an iterator over `value`
    fn iter(&self, value: &Value) -> RuntimeResult<Value>;

    /// Advance an iterator; `Ok(None)` signals exhaustion, not an error
    fn iter_next(&self, iterator: &Value) -> RuntimeResult<Option<Value>>;

    /// Import a module implemented by the host, `None` if it has no such module
    fn import_builtin(&self, name: &str) -> Option<Value>;
}

// ============================================================================
// Standard implementation
// ============================================================================

/// Reference object protocol over the runtime's own value types
#[derive(Debug, Default)]
pub struct StandardObjects {
    builtin_modules: RefCell<FxHashMap<String, Value>>,
}

impl StandardObjects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `value` importable as builtin module `name`
    pub fn register_builtin_module(&self, name: &str, value: Value) {
        self.builtin_modules
            .borrow_mut()
            .insert(name.to_string(), value);
    }
}

impl ObjectRuntime for StandardObjects {
    fn binary_op(&self, op: BinaryOp, lhs: &Value, rhs: &Value) -> RuntimeResult<Value> {
        if let (Some(a), Some(b)) = (Number::of(lhs), Number::of(rhs)) {
            return numeric_binary(op, a, b);
        }

        match (op, lhs, rhs) {
            (BinaryOp::Add, Value::Str(a), Value::Str(b)) => {
                let mut joined = String::with_capacity(a.len() + b.len());
                joined.push_str(a);
                joined.push_str(b);
                Ok(Value::from(joined))
            }
            (BinaryOp::Add, Value::Tuple(a), Value::Tuple(b)) => {
                Ok(Value::tuple(a.iter().chain(b.iter()).cloned().collect()))
            }
            (BinaryOp::Add, Value::List(a), Value::List(b)) => {
                let items: Vec<Value> = a.borrow().iter().chain(b.borrow().iter()).cloned().collect();
                Ok(Value::list(items))
            }
            (BinaryOp::Multiply, Value::Str(s), Value::Int(n))
            | (BinaryOp::Multiply, Value::Int(n), Value::Str(s)) => {
                let count = repeat_count(*n);
                repeated_len(s.len(), count, "string")?;
                Ok(Value::from(s.repeat(count)))
            }
            (BinaryOp::Multiply, Value::List(l), Value::Int(n))
            | (BinaryOp::Multiply, Value::Int(n), Value::List(l)) => {
                let count = repeat_count(*n);
                let source = l.borrow();
                let total = repeated_len(source.len(), count, "list")?;
                let mut items = Vec::with_capacity(total);
                if total > 0 {
                    for _ in 0..count {
                        items.extend(source.iter().cloned());
                    }
                }
                Ok(Value::list(items))
            }
            _ => Err(RuntimeError::TypeError(format!(
                "unsupported operand type(s) for {}: '{}' and '{}'",
                op.symbol(),
                lhs.type_name(),
                rhs.type_name()
            ))),
        }
    }

    fn unary_op(&self, op: UnaryOp, operand: &Value) -> RuntimeResult<Value> {
        let unsupported = || {
            RuntimeError::TypeError(format!(
                "bad operand type for {}: '{}'",
                op.symbol(),
                operand.type_name()
            ))
        };

        match (op, Number::of(operand).ok_or_else(unsupported)?) {
            (UnaryOp::Positive, Number::Int(i)) => Ok(Value::Int(i)),
            (UnaryOp::Positive, Number::Big(b)) => Ok(Value::from_bigint(b)),
            (UnaryOp::Positive, Number::Float(f)) => Ok(Value::Float(f)),
            (UnaryOp::Negative, Number::Int(i)) => Ok(match i.checked_neg() {
                Some(n) => Value::Int(n),
                None => Value::from_bigint(-BigInt::from(i)),
            }),
            (UnaryOp::Negative, Number::Big(b)) => Ok(Value::from_bigint(-b)),
            (UnaryOp::Negative, Number::Float(f)) => Ok(Value::Float(-f)),
            (UnaryOp::Invert, Number::Int(i)) => Ok(Value::Int(!i)),
            (UnaryOp::Invert, Number::Big(b)) => Ok(Value::from_bigint(-b - 1)),
            (UnaryOp::Invert, Number::Float(_)) => Err(unsupported()),
        }
    }

    fn rich_compare(&self, op: CompareOp, lhs: &Value, rhs: &Value) -> RuntimeResult<Value> {
        match op {
            CompareOp::Eq => return Ok(Value::Bool(values_equal(lhs, rhs))),
            CompareOp::Ne => return Ok(Value::Bool(!values_equal(lhs, rhs))),
            CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge => {}
            other => {
                return Err(RuntimeError::SystemError(format!(
                    "'{}' is not a rich comparison",
                    other.symbol()
                )))
            }
        }

        let ordering = order_values(lhs, rhs).ok_or_else(|| {
            RuntimeError::TypeError(format!(
                "'{}' not supported between instances of '{}' and '{}'",
                op.symbol(),
                lhs.type_name(),
                rhs.type_name()
            ))
        })?;
        Ok(Value::Bool(op.holds(ordering)))
    }

    fn is_true(&self, value: &Value) -> RuntimeResult<bool> {
        Ok(match value {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::BigInt(b) => !b.is_zero(),
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Tuple(items) => !items.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Dict(ns) => !ns.is_empty(),
            _ => true,
        })
    }

    fn contains(&self, container: &Value, item: &Value) -> RuntimeResult<bool> {
        match container {
            Value::Tuple(items) => Ok(items.iter().any(|v| values_equal(v, item))),
            Value::List(items) => Ok(items.borrow().iter().any(|v| values_equal(v, item))),
            Value::Str(haystack) => match item {
                Value::Str(needle) => Ok(haystack.contains(&**needle)),
                other => Err(RuntimeError::TypeError(format!(
                    "'in <string>' requires string as left operand, not {}",
                    other.type_name()
                ))),
            },
            Value::Dict(ns) => Ok(match item {
                Value::Str(key) => ns.contains(&Name::from_rc(key.clone())),
                _ => false,
            }),
            Value::Object(obj) if obj.is_mapping() => match obj.get_item(item) {
                Ok(_) => Ok(true),
                Err(RuntimeError::KeyNotFound { .. }) => Ok(false),
                Err(e) => Err(e),
            },
            other => Err(RuntimeError::TypeError(format!(
                "argument of type '{}' is not iterable",
                other.type_name()
            ))),
        }
    }

    fn get_attr(&self, target: &Value, name: &Name) -> RuntimeResult<Value> {
        let found = match target {
            Value::Module(module) => module.namespace().get(name),
            Value::Object(obj) => obj.get_attr(name),
            Value::Exception(exc) => match name.as_str() {
                "args" => Some(Value::tuple(exc.args().to_vec())),
                "__cause__" => Some(exc.cause().unwrap_or(Value::None)),
                _ => None,
            },
            Value::Callable(callable) if name.as_str() == "__name__" => {
                Some(Value::from(callable.name()))
            }
            Value::Generator(generator) if name.as_str() == "__name__" => {
                Some(Value::from(generator.name()))
            }
            Value::ExceptionType(kind) if name.as_str() == "__name__" => {
                Some(Value::from(kind.name()))
            }
            _ => None,
        };

        found.ok_or_else(|| RuntimeError::AttributeNotFound {
            type_name: target.type_name().to_string(),
            name: name.to_string(),
        })
    }

    fn set_attr(&self, target: &Value, name: &Name, value: Value) -> RuntimeResult<()> {
        match target {
            Value::Module(module) => {
                module.namespace().insert(name.clone(), value);
                Ok(())
            }
            Value::Object(obj) => obj.set_attr(name, value),
            other => Err(RuntimeError::AttributeNotFound {
                type_name: other.type_name().to_string(),
                name: name.to_string(),
            }),
        }
    }

    fn get_item(&self, target: &Value, key: &Value) -> RuntimeResult<Value> {
        match target {
            Value::List(items) => {
                let items = items.borrow();
                let index = sequence_index(key, items.len(), "list")?;
                Ok(items[index].clone())
            }
            Value::Tuple(items) => {
                let index = sequence_index(key, items.len(), "tuple")?;
                Ok(items[index].clone())
            }
            Value::Str(text) => {
                let chars: Vec<char> = text.chars().collect();
                let index = sequence_index(key, chars.len(), "string")?;
                Ok(Value::from(chars[index].to_string()))
            }
            Value::Dict(ns) => {
                let name = dict_key(key)?;
                ns.get(&name).ok_or_else(|| RuntimeError::KeyNotFound { key: key.repr() })
            }
            Value::Object(obj) => obj.get_item(key),
            other => Err(RuntimeError::TypeError(format!(
                "'{}' object is not subscriptable",
                other.type_name()
            ))),
        }
    }

    fn set_item(&self, target: &Value, key: &Value, value: Value) -> RuntimeResult<()> {
        match target {
            Value::List(items) => {
                let len = items.borrow().len();
                let index = sequence_index(key, len, "list assignment")?;
                let old = std::mem::replace(&mut items.borrow_mut()[index], value);
                drop(old);
                Ok(())
            }
            Value::Dict(ns) => {
                ns.insert(dict_key(key)?, value);
                Ok(())
            }
            Value::Object(obj) => obj.set_item(key, value),
            other => Err(RuntimeError::TypeError(format!(
                "'{}' object does not support item assignment",
                other.type_name()
            ))),
        }
    }

    fn del_item(&self, target: &Value, key: &Value) -> RuntimeResult<()> {
        match target {
            Value::List(items) => {
                let len = items.borrow().len();
                let index = sequence_index(key, len, "list assignment")?;
                let old = items.borrow_mut().remove(index);
                drop(old);
                Ok(())
            }
            Value::Dict(ns) => ns
                .remove(&dict_key(key)?)
                .map(drop)
                .ok_or_else(|| RuntimeError::KeyNotFound { key: key.repr() }),
            Value::Object(obj) => obj.del_item(key),
            other => Err(RuntimeError::TypeError(format!(
                "'{}' object does not support item deletion",
                other.type_name()
            ))),
        }
    }

    fn namespace_of(&self, value: &Value) -> Option<Namespace> {
        match value {
            Value::Module(module) => Some(module.namespace().clone()),
            Value::Object(obj) => obj.namespace(),
            _ => None,
        }
    }

    fn iter(&self, value: &Value) -> RuntimeResult<Value> {
        let source = match value {
            Value::List(items) => IterSource::List(items.clone()),
            Value::Tuple(items) => IterSource::Items(items.clone()),
            Value::Str(text) => IterSource::Items(
                text.chars()
                    .map(|c| Value::from(c.to_string()))
                    .collect::<Vec<_>>()
                    .into(),
            ),
            Value::Dict(ns) => IterSource::Items(
                ns.keys()
                    .into_iter()
                    .map(|k| Value::Str(k.as_rc().clone()))
                    .collect::<Vec<_>>()
                    .into(),
            ),
            Value::Object(obj) if obj.is_iterator() => return Ok(value.clone()),
            Value::Generator(_) => return Ok(value.clone()),
            other => {
                return Err(RuntimeError::TypeError(format!(
                    "'{}' object is not iterable",
                    other.type_name()
                )))
            }
        };

        Ok(Value::Object(Rc::new(SequenceIterator {
            source,
            position: Cell::new(0),
        })))
    }

    fn iter_next(&self, iterator: &Value) -> RuntimeResult<Option<Value>> {
        match iterator {
            Value::Object(obj) => obj.next_item(),
            other => Err(RuntimeError::TypeError(format!(
                "'{}' object is not an iterator",
                other.type_name()
            ))),
        }
    }

    fn import_builtin(&self, name: &str) -> Option<Value> {
        self.builtin_modules.borrow().get(name).cloned()
    }
}

// ============================================================================
// Iteration
// ============================================================================

#[derive(Debug)]
enum IterSource {
    /// Live view of a list; sees appends made during iteration
    List(ListRef),
    Items(Rc<[Value]>),
}

/// Iterator over the runtime's own sequence types
#[derive(Debug)]
struct SequenceIterator {
    source: IterSource,
    position: Cell<usize>,
}

impl Object for SequenceIterator {
    fn type_name(&self) -> &str {
        "iterator"
    }

    fn is_iterator(&self) -> bool {
        true
    }

    fn next_item(&self) -> RuntimeResult<Option<Value>> {
        let index = self.position.get();
        let item = match &self.source {
            IterSource::List(items) => items.borrow().get(index).cloned(),
            IterSource::Items(items) => items.get(index).cloned(),
        };
        if item.is_some() {
            self.position.set(index + 1);
        }
        Ok(item)
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn dict_key(key: &Value) -> RuntimeResult<Name> {
    match key {
        Value::Str(text) => Ok(Name::from_rc(text.clone())),
        other => Err(RuntimeError::TypeError(format!(
            "dictionary keys must be str, not {}",
            other.type_name()
        ))),
    }
}

/// Largest element count a `*` repetition may produce
const MAX_REPEAT_LEN: usize = 1 << 32;

/// Negative repeat counts behave as zero
fn repeat_count(n: i64) -> usize {
    usize::try_from(n).unwrap_or(0)
}

fn repeated_len(len: usize, count: usize, what: &str) -> RuntimeResult<usize> {
    len.checked_mul(count)
        .filter(|&total| total <= MAX_REPEAT_LEN)
        .ok_or_else(|| RuntimeError::Overflow(format!("repeated {} is too long", what)))
}

/// Normalize a possibly negative index against `len`
fn sequence_index(key: &Value, len: usize, what: &str) -> RuntimeResult<usize> {
    let raw = match key {
        Value::Int(i) => *i,
        Value::Bool(b) => i64::from(*b),
        Value::BigInt(_) => {
            return Err(RuntimeError::IndexOutOfRange(format!(
                "{} index out of range",
                what
            )))
        }
        other => {
            return Err(RuntimeError::TypeError(format!(
                "{} indices must be integers, not {}",
                what.split(' ').next().unwrap_or(what),
                other.type_name()
            )))
        }
    };

    let len_i = i64::try_from(len).unwrap_or(i64::MAX);
    let index = if raw < 0 { raw + len_i } else { raw };
    if index < 0 || index >= len_i {
        return Err(RuntimeError::IndexOutOfRange(format!(
            "{} index out of range",
            what
        )));
    }
    usize::try_from(index)
        .map_err(|_| RuntimeError::IndexOutOfRange(format!("{} index out of range", what)))
}

/// Numeric view of a value; `bool` participates as an integer
#[derive(Debug, Clone)]
enum Number {
    Int(i64),
    Big(BigInt),
    Float(f64),
}

impl Number {
    fn of(value: &Value) -> Option<Number> {
        match value {
            Value::Bool(b) => Some(Number::Int(i64::from(*b))),
            Value::Int(i) => Some(Number::Int(*i)),
            Value::BigInt(b) => Some(Number::Big((**b).clone())),
            Value::Float(f) => Some(Number::Float(*f)),
            _ => None,
        }
    }

    fn to_big(&self) -> Option<BigInt> {
        match self {
            Number::Int(i) => Some(BigInt::from(*i)),
            Number::Big(b) => Some(b.clone()),
            Number::Float(_) => None,
        }
    }

    fn to_f64(&self) -> f64 {
        match self {
            Number::Int(i) => *i as f64,
            Number::Big(b) => b.to_f64().unwrap_or(f64::NAN),
            Number::Float(f) => *f,
        }
    }

    fn is_float(&self) -> bool {
        matches!(self, Number::Float(_))
    }
}

fn numeric_binary(op: BinaryOp, a: Number, b: Number) -> RuntimeResult<Value> {
    if op == BinaryOp::TrueDivide {
        let divisor = b.to_f64();
        if divisor == 0.0 {
            return Err(RuntimeError::ZeroDivision("division by zero".to_string()));
        }
        return Ok(Value::Float(a.to_f64() / divisor));
    }

    if a.is_float() || b.is_float() {
        return float_binary(op, a.to_f64(), b.to_f64());
    }

    if let (Number::Int(x), Number::Int(y)) = (&a, &b) {
        if let Some(result) = small_int_binary(op, *x, *y)? {
            return Ok(Value::Int(result));
        }
    }

    // Overflowed or already big: redo in arbitrary precision
    let (x, y) = match (a.to_big(), b.to_big()) {
        (Some(x), Some(y)) => (x, y),
        _ => return Err(RuntimeError::SystemError("non-integer operand".to_string())),
    };
    let result = match op {
        BinaryOp::Add => x + y,
        BinaryOp::Subtract => x - y,
        BinaryOp::Multiply => x * y,
        BinaryOp::FloorDivide | BinaryOp::Modulo if y.is_zero() => {
            return Err(RuntimeError::ZeroDivision(
                "integer division or modulo by zero".to_string(),
            ))
        }
        BinaryOp::FloorDivide => x.div_floor(&y),
        BinaryOp::Modulo => x.mod_floor(&y),
        BinaryOp::BitAnd => x & y,
        BinaryOp::BitOr => x | y,
        BinaryOp::BitXor => x ^ y,
        BinaryOp::TrueDivide => {
            return Err(RuntimeError::SystemError(
                "true division reached the integer path".to_string(),
            ))
        }
    };
    Ok(Value::from_bigint(result))
}

/// `Ok(None)` means the result does not fit in 64 bits
fn small_int_binary(op: BinaryOp, x: i64, y: i64) -> RuntimeResult<Option<i64>> {
    Ok(match op {
        BinaryOp::Add => x.checked_add(y),
        BinaryOp::Subtract => x.checked_sub(y),
        BinaryOp::Multiply => x.checked_mul(y),
        BinaryOp::FloorDivide | BinaryOp::Modulo if y == 0 => {
            return Err(RuntimeError::ZeroDivision(
                "integer division or modulo by zero".to_string(),
            ))
        }
        BinaryOp::FloorDivide => x.checked_div(y).map(|q| {
            if x % y != 0 && ((x < 0) != (y < 0)) {
                q - 1
            } else {
                q
            }
        }),
        BinaryOp::Modulo => x.checked_rem(y).map(|r| {
            if r != 0 && ((r < 0) != (y < 0)) {
                r + y
            } else {
                r
            }
        }),
        BinaryOp::BitAnd => Some(x & y),
        BinaryOp::BitOr => Some(x | y),
        BinaryOp::BitXor => Some(x ^ y),
        BinaryOp::TrueDivide => None,
    })
}

fn float_binary(op: BinaryOp, x: f64, y: f64) -> RuntimeResult<Value> {
    let zero_check = |message: &str| {
        if y == 0.0 {
            Err(RuntimeError::ZeroDivision(message.to_string()))
        } else {
            Ok(())
        }
    };

    match op {
        BinaryOp::Add => Ok(Value::Float(x + y)),
        BinaryOp::Subtract => Ok(Value::Float(x - y)),
        BinaryOp::Multiply => Ok(Value::Float(x * y)),
        BinaryOp::TrueDivide => {
            zero_check("float division by zero")?;
            Ok(Value::Float(x / y))
        }
        BinaryOp::FloorDivide => {
            zero_check("float divmod()")?;
            Ok(Value::Float((x / y).floor()))
        }
        BinaryOp::Modulo => {
            zero_check("float modulo")?;
            let r = x % y;
            Ok(Value::Float(if r != 0.0 && ((r < 0.0) != (y < 0.0)) {
                r + y
            } else {
                r
            }))
        }
        BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor => {
            Err(RuntimeError::TypeError(format!(
                "unsupported operand type(s) for {}: 'float' and 'float'",
                op.symbol()
            )))
        }
    }
}

fn compare_numbers(a: &Number, b: &Number) -> Option<Ordering> {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => Some(x.cmp(y)),
        (Number::Float(_), _) | (_, Number::Float(_)) => a.to_f64().partial_cmp(&b.to_f64()),
        _ => match (a.to_big(), b.to_big()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => None,
        },
    }
}

/// Language-level equality (`==`)
pub fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    if let (Some(a), Some(b)) = (Number::of(lhs), Number::of(rhs)) {
        return compare_numbers(&a, &b) == Some(Ordering::Equal);
    }

    match (lhs, rhs) {
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::Tuple(a), Value::Tuple(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| values_equal(x, y))
        }
        (Value::List(a), Value::List(b)) => {
            if Rc::ptr_eq(a, b) {
                return true;
            }
            let (a, b) = (a.borrow(), b.borrow());
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| values_equal(x, y))
        }
        (Value::Dict(a), Value::Dict(b)) => {
            a.ptr_eq(b)
                || (a.len() == b.len()
                    && a
                        .entries()
                        .iter()
                        .all(|(k, v)| b.get(k).map_or(false, |other| values_equal(v, &other))))
        }
        _ => lhs.is_same(rhs),
    }
}

/// Ordering for `<`-family comparisons; `None` when the types are unordered
/// or a float comparison involves NaN.
fn order_values(lhs: &Value, rhs: &Value) -> Option<Option<Ordering>> {
    if let (Some(a), Some(b)) = (Number::of(lhs), Number::of(rhs)) {
        return Some(compare_numbers(&a, &b));
    }

    match (lhs, rhs) {
        (Value::Str(a), Value::Str(b)) => Some(Some(a.cmp(b))),
        (Value::Tuple(a), Value::Tuple(b)) => order_sequences(a, b),
        (Value::List(a), Value::List(b)) => {
            let (a, b) = (a.borrow().clone(), b.borrow().clone());
            order_sequences(&a, &b)
        }
        _ => None,
    }
}

fn order_sequences(a: &[Value], b: &[Value]) -> Option<Option<Ordering>> {
    for (x, y) in a.iter().zip(b.iter()) {
        if !values_equal(x, y) {
            return order_values(x, y);
        }
    }
    Some(Some(a.len().cmp(&b.len())))
}

/// Name used in call-related error messages
pub fn describe_callable(value: &Value) -> String {
    match value {
        Value::Callable(callable) => callable.name().to_string(),
        other => other.type_name().to_string(),
    }
}

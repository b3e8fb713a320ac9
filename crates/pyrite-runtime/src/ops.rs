//! Operator dispatch
//!
//! Hot operators test for a pair of common concrete operand types and compute
//! the result inline. Anything else, including integer overflow, falls back to
//! the [`ObjectRuntime`](crate::object::ObjectRuntime) protocol, which produces
//! the same results for the types the fast paths handle.

use crate::binding::call;
use crate::error::{ExceptionKind, RuntimeError, RuntimeResult};
use crate::frame::{BlockKind, Frame};
use crate::object::{BinaryOp, CompareOp, UnaryOp};
use crate::runtime::Runtime;
use crate::value::{ExceptionObject, Name, Value};
use std::rc::Rc;

fn fast_paths(rt: &Runtime) -> bool {
    rt.config().dispatch.fast_paths
}

// ============================================================================
// Arithmetic
// ============================================================================

pub fn binary_add(rt: &Runtime, lhs: &Value, rhs: &Value) -> RuntimeResult<Value> {
    if fast_paths(rt) {
        match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => {
                let sum = a.wrapping_add(*b);
                // Overflow flips the sign relative to both operands
                if (sum ^ a) >= 0 || (sum ^ b) >= 0 {
                    return Ok(Value::Int(sum));
                }
            }
            (Value::Str(a), Value::Str(b)) => {
                let mut joined = String::with_capacity(a.len() + b.len());
                joined.push_str(a);
                joined.push_str(b);
                return Ok(Value::from(joined));
            }
            _ => {}
        }
    }
    rt.objects().binary_op(BinaryOp::Add, lhs, rhs)
}

pub fn binary_subtract(rt: &Runtime, lhs: &Value, rhs: &Value) -> RuntimeResult<Value> {
    if fast_paths(rt) {
        if let (Value::Int(a), Value::Int(b)) = (lhs, rhs) {
            let diff = a.wrapping_sub(*b);
            if (diff ^ a) >= 0 || (diff ^ !b) >= 0 {
                return Ok(Value::Int(diff));
            }
        }
    }
    rt.objects().binary_op(BinaryOp::Subtract, lhs, rhs)
}

/// `container[index]`
pub fn binary_subscr(rt: &Runtime, container: &Value, index: &Value) -> RuntimeResult<Value> {
    if fast_paths(rt) {
        if let Value::Int(i) = index {
            let item = match container {
                Value::List(items) => {
                    let items = items.borrow();
                    normalize_index(*i, items.len()).map(|at| items[at].clone())
                }
                Value::Tuple(items) => normalize_index(*i, items.len()).map(|at| items[at].clone()),
                _ => None,
            };
            if let Some(item) = item {
                return Ok(item);
            }
        }
    }
    rt.objects().get_item(container, index)
}

fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let index = if index < 0 { index + len } else { index };
    if (0..len).contains(&index) {
        usize::try_from(index).ok()
    } else {
        None
    }
}

pub fn binary_op(rt: &Runtime, op: BinaryOp, lhs: &Value, rhs: &Value) -> RuntimeResult<Value> {
    match op {
        BinaryOp::Add => binary_add(rt, lhs, rhs),
        BinaryOp::Subtract => binary_subtract(rt, lhs, rhs),
        _ => rt.objects().binary_op(op, lhs, rhs),
    }
}

pub fn unary_op(rt: &Runtime, op: UnaryOp, operand: &Value) -> RuntimeResult<Value> {
    if fast_paths(rt) && op == UnaryOp::Negative {
        if let Value::Int(i) = operand {
            if let Some(negated) = i.checked_neg() {
                return Ok(Value::Int(negated));
            }
        }
    }
    rt.objects().unary_op(op, operand)
}

/// Truthiness
pub fn check_cond(rt: &Runtime, value: &Value) -> RuntimeResult<bool> {
    if fast_paths(rt) {
        if let Value::Bool(b) = value {
            return Ok(*b);
        }
    }
    rt.objects().is_true(value)
}

pub fn unary_not(rt: &Runtime, value: &Value) -> RuntimeResult<Value> {
    Ok(Value::Bool(!check_cond(rt, value)?))
}

// ============================================================================
// Comparison
// ============================================================================

pub fn compare(rt: &Runtime, op: CompareOp, lhs: &Value, rhs: &Value) -> RuntimeResult<Value> {
    match op {
        CompareOp::Is => return Ok(Value::Bool(lhs.is_same(rhs))),
        CompareOp::IsNot => return Ok(Value::Bool(!lhs.is_same(rhs))),
        CompareOp::In => return Ok(Value::Bool(rt.objects().contains(rhs, lhs)?)),
        CompareOp::NotIn => return Ok(Value::Bool(!rt.objects().contains(rhs, lhs)?)),
        CompareOp::ExceptionMatch => return Ok(Value::Bool(exception_match(lhs, rhs)?)),
        _ => {}
    }

    if fast_paths(rt) {
        if let (Value::Int(a), Value::Int(b)) = (lhs, rhs) {
            return Ok(Value::Bool(op.holds(Some(a.cmp(b)))));
        }
    }
    rt.objects().rich_compare(op, lhs, rhs)
}

/// Whether exception `value` (an instance or class) is caught by `pattern`,
/// a class or a tuple of classes
pub fn exception_match(value: &Value, pattern: &Value) -> RuntimeResult<bool> {
    let kind = match value {
        Value::Exception(exc) => exc.kind(),
        Value::ExceptionType(kind) => *kind,
        _ => return Ok(false),
    };
    match pattern {
        Value::ExceptionType(expected) => Ok(kind.is_subclass_of(*expected)),
        Value::Tuple(patterns) => {
            for candidate in patterns.iter() {
                if exception_match(value, candidate)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        _ => Err(RuntimeError::TypeError(
            "catching classes that do not inherit from BaseException is not allowed".to_string(),
        )),
    }
}

/// Whether an `except pattern:` clause catches `err`.
///
/// Fatal errors are never caught.
pub fn exception_matches(err: &RuntimeError, pattern: &Value) -> RuntimeResult<bool> {
    if err.is_fatal() {
        return Ok(false);
    }
    match err {
        RuntimeError::Raised(value) => exception_match(value, pattern),
        other => exception_match(&Value::ExceptionType(other.kind()), pattern),
    }
}

// ============================================================================
// Attributes and items
// ============================================================================

pub fn load_attr(rt: &Runtime, target: &Value, name: &Name) -> RuntimeResult<Value> {
    rt.objects().get_attr(target, name)
}

pub fn store_attr(rt: &Runtime, target: &Value, name: &Name, value: Value) -> RuntimeResult<()> {
    rt.objects().set_attr(target, name, value)
}

pub fn store_subscr(rt: &Runtime, target: &Value, key: &Value, value: Value) -> RuntimeResult<()> {
    rt.objects().set_item(target, key, value)
}

pub fn delete_subscr(rt: &Runtime, target: &Value, key: &Value) -> RuntimeResult<()> {
    rt.objects().del_item(target, key)
}

// ============================================================================
// Iteration and unpacking
// ============================================================================

pub fn get_iter(rt: &Runtime, value: &Value) -> RuntimeResult<Value> {
    match value {
        Value::Generator(_) => Ok(value.clone()),
        other => rt.objects().iter(other),
    }
}

/// Advance `iterator`; `Ok(None)` ends the loop
pub fn for_iter(rt: &mut Runtime, iterator: &Value) -> RuntimeResult<Option<Value>> {
    match iterator {
        Value::Generator(generator) => generator.next(rt),
        other => rt.objects().iter_next(other),
    }
}

/// Drain any iterable into a vector
pub fn collect_iterable(rt: &mut Runtime, value: &Value) -> RuntimeResult<Vec<Value>> {
    let iterator = get_iter(rt, value)?;
    let mut items = Vec::new();
    while let Some(item) = for_iter(rt, &iterator)? {
        items.push(item);
    }
    Ok(items)
}

fn unpack_iter(rt: &Runtime, value: &Value) -> RuntimeResult<Value> {
    get_iter(rt, value).map_err(|err| {
        if err.kind() == ExceptionKind::TypeError {
            RuntimeError::TypeError(format!(
                "cannot unpack non-iterable {} object",
                value.type_name()
            ))
        } else {
            err
        }
    })
}

/// `a, b, c = value`
pub fn unpack_sequence(rt: &mut Runtime, value: &Value, count: usize) -> RuntimeResult<Vec<Value>> {
    if fast_paths(rt) {
        match value {
            Value::Tuple(items) if items.len() == count => return Ok(items.to_vec()),
            Value::List(items) if items.borrow().len() == count => {
                return Ok(items.borrow().clone())
            }
            _ => {}
        }
    }

    let iterator = unpack_iter(rt, value)?;
    let mut items = Vec::with_capacity(count);
    while items.len() < count {
        match for_iter(rt, &iterator)? {
            Some(item) => items.push(item),
            None => {
                return Err(RuntimeError::ValueError(format!(
                    "not enough values to unpack (expected {}, got {})",
                    count,
                    items.len()
                )))
            }
        }
    }
    if for_iter(rt, &iterator)?.is_some() {
        return Err(RuntimeError::ValueError(format!(
            "too many values to unpack (expected {})",
            count
        )));
    }
    Ok(items)
}

/// `a, *rest, z = value`; the starred target receives a list
pub fn unpack_ex(
    rt: &mut Runtime,
    value: &Value,
    before: usize,
    after: usize,
) -> RuntimeResult<Vec<Value>> {
    let iterator = unpack_iter(rt, value)?;
    let mut items = Vec::new();
    while let Some(item) = for_iter(rt, &iterator)? {
        items.push(item);
    }

    let required = before + after;
    if items.len() < required {
        return Err(RuntimeError::ValueError(format!(
            "not enough values to unpack (expected at least {}, got {})",
            required,
            items.len()
        )));
    }

    let tail = items.split_off(items.len() - after);
    let starred = items.split_off(before);
    items.push(Value::list(starred));
    items.extend(tail);
    Ok(items)
}

// ============================================================================
// Context managers
// ============================================================================

/// Enter a `with` block.
///
/// Pushes the manager's `__exit__` onto the value stack, sets up a
/// `Finally` block jumping to `handler`, and returns the result of
/// `__enter__`.
pub fn setup_with(
    rt: &mut Runtime,
    frame: &mut Frame,
    manager: &Value,
    handler: u32,
) -> RuntimeResult<Value> {
    let exit = rt.objects().get_attr(manager, &rt.intern("__exit__"))?;
    let enter = rt.objects().get_attr(manager, &rt.intern("__enter__"))?;
    frame.push(exit)?;
    let entered = call(rt, &enter, Vec::new(), Vec::new())?;
    frame.setup_block(BlockKind::Finally, handler)?;
    Ok(entered)
}

fn pop_exit(frame: &mut Frame) -> RuntimeResult<Value> {
    let block = frame.pop_block()?;
    frame.unwind_block(&block);
    frame.pop()
}

/// Leave a `with` block normally
pub fn exit_with(rt: &mut Runtime, frame: &mut Frame) -> RuntimeResult<()> {
    let exit = pop_exit(frame)?;
    call(rt, &exit, vec![Value::None, Value::None, Value::None], Vec::new())?;
    Ok(())
}

/// Leave a `with` block because `err` was raised.
///
/// Returns whether `__exit__` suppressed the error.
pub fn exit_with_error(rt: &mut Runtime, frame: &mut Frame, err: &RuntimeError) -> RuntimeResult<bool> {
    if err.is_fatal() {
        return Err(err.clone());
    }
    let exit = pop_exit(frame)?;
    let args = vec![
        Value::ExceptionType(err.kind()),
        err.to_exception(),
        Value::None,
    ];
    let result = call(rt, &exit, args, Vec::new())?;
    rt.objects().is_true(&result)
}

// ============================================================================
// Raise
// ============================================================================

/// Build the error for `raise exc from cause`.
///
/// A bare `raise` (no `exc`) re-raises the exception currently being handled.
pub fn do_raise(rt: &Runtime, exc: Option<Value>, cause: Option<Value>) -> RuntimeError {
    let exc = match exc {
        Some(exc) => exc,
        None => {
            return match rt.handled_exception() {
                Some(active) => RuntimeError::Raised(active.clone()),
                None => RuntimeError::Runtime("No active exception to reraise".to_string()),
            }
        }
    };

    let instance = match exc {
        Value::ExceptionType(kind) => Rc::new(ExceptionObject::new(kind, Vec::new())),
        Value::Exception(instance) => instance,
        _ => {
            return RuntimeError::TypeError(
                "exceptions must derive from BaseException".to_string(),
            )
        }
    };

    if let Some(cause) = cause {
        let cause = match cause {
            Value::None => None,
            Value::ExceptionType(kind) => Some(Value::Exception(Rc::new(ExceptionObject::new(
                kind,
                Vec::new(),
            )))),
            Value::Exception(_) => Some(cause),
            _ => {
                return RuntimeError::TypeError(
                    "exception causes must derive from BaseException".to_string(),
                )
            }
        };
        instance.set_cause(cause);
    }

    RuntimeError::Raised(Value::Exception(instance))
}

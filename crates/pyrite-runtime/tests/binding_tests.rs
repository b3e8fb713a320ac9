//! Call binding tests
//!
//! Covers positional, keyword, default, `*args`/`**kwargs` and closure binding,
//! plus the exact wording of every binding error.

mod common;

use common::*;
#[allow(unused_imports)]
use common::{assert_eq, assert_ne};
use pyrite_config::RuntimeConfig;
use pyrite_runtime::callable::{Completion, FunctionDescriptor, NativeFunctionBuilder};
use pyrite_runtime::frame::Frame;
use pyrite_runtime::value::{CellRef, Name, Namespace, Value};
use pyrite_runtime::{
    bind_and_invoke, call, call_with_unpacked, names, Callable, ExceptionKind, InvariantViolation,
    Runtime, RuntimeError, RuntimeResult,
};
use rstest::rstest;

fn kw(name: &str, value: i64) -> (Name, Value) {
    (Name::new(name), Value::Int(value))
}

// ============================================================================
// Successful binding
// ============================================================================

#[test]
fn test_positional_with_default() {
    let mut rt = Runtime::new();
    let f = FunctionDescriptor::builder("f", echo_locals, Namespace::new())
        .positional(["a", "b"])
        .defaults(vec![Value::Int(2)])
        .build()
        .unwrap();

    let result = bind_and_invoke(&mut rt, &f, vec![Value::Int(1)], vec![]).unwrap();
    assert_eq!(result, tuple_of(&[1, 2]));

    let result = bind_and_invoke(&mut rt, &f, vec![Value::Int(1), Value::Int(5)], vec![]).unwrap();
    assert_eq!(result, tuple_of(&[1, 5]));
}

#[test]
fn test_keywords_bind_by_name() {
    let mut rt = Runtime::new();
    let f = FunctionDescriptor::builder("f", echo_locals, Namespace::new())
        .positional([rt.intern("a"), rt.intern("b")])
        .build()
        .unwrap();

    // Interned names match by identity, fresh names by text
    let interned = vec![(rt.intern("b"), Value::Int(2)), (rt.intern("a"), Value::Int(1))];
    let result = bind_and_invoke(&mut rt, &f, vec![], interned).unwrap();
    assert_eq!(result, tuple_of(&[1, 2]));

    let result = bind_and_invoke(&mut rt, &f, vec![Value::Int(1)], vec![kw("b", 2)]).unwrap();
    assert_eq!(result, tuple_of(&[1, 2]));
}

#[test]
fn test_varargs_and_varkwargs() {
    let mut rt = Runtime::new();
    let f = FunctionDescriptor::builder("f", echo_locals, Namespace::new())
        .positional(["a"])
        .varargs("args")
        .varkwargs("kwargs")
        .build()
        .unwrap();

    let result = bind_and_invoke(
        &mut rt,
        &f,
        vec![Value::Int(1), Value::Int(2), Value::Int(3)],
        vec![kw("x", 4)],
    )
    .unwrap();

    let items = match result {
        Value::Tuple(items) => items.to_vec(),
        other => panic!("expected tuple, got {:?}", other),
    };
    assert_eq!(items[0], Value::Int(1));
    assert_eq!(items[1], tuple_of(&[2, 3]));
    let expected_kwargs = Namespace::new();
    expected_kwargs.insert(Name::new("x"), Value::Int(4));
    assert_eq!(items[2], Value::Dict(expected_kwargs));
}

#[test]
fn test_empty_varargs_is_empty_tuple() {
    let mut rt = Runtime::new();
    let f = FunctionDescriptor::builder("f", echo_locals, Namespace::new())
        .varargs("args")
        .build()
        .unwrap();
    let result = bind_and_invoke(&mut rt, &f, vec![], vec![]).unwrap();
    assert_eq!(result, Value::tuple(vec![Value::tuple(vec![])]));
}

#[test]
fn test_keyword_only_default() {
    let mut rt = Runtime::new();
    let f = FunctionDescriptor::builder("f", echo_locals, Namespace::new())
        .positional(["a"])
        .keyword_only(["k"])
        .kw_default("k", Value::Int(5))
        .build()
        .unwrap();

    let result = bind_and_invoke(&mut rt, &f, vec![Value::Int(1)], vec![]).unwrap();
    assert_eq!(result, tuple_of(&[1, 5]));
    let result = bind_and_invoke(&mut rt, &f, vec![Value::Int(1)], vec![kw("k", 9)]).unwrap();
    assert_eq!(result, tuple_of(&[1, 9]));
}

#[test]
fn test_non_parameter_locals_start_unbound() {
    let mut rt = Runtime::new();
    let f = FunctionDescriptor::builder("f", echo_locals, Namespace::new())
        .positional(["a"])
        .locals(["tmp"])
        .build()
        .unwrap();
    let result = bind_and_invoke(&mut rt, &f, vec![Value::Int(1)], vec![]).unwrap();
    assert_eq!(result, Value::tuple(vec![Value::Int(1), Value::None]));
}

// ============================================================================
// Binding errors
// ============================================================================

#[rstest]
#[case::exact(vec![], "f() takes exactly 2 positional arguments but 3 were given")]
#[case::with_default(vec![Value::Int(0)], "f() takes from 1 to 2 positional arguments but 3 were given")]
fn test_too_many_positional(#[case] defaults: Vec<Value>, #[case] expected: &str) {
    let mut rt = Runtime::new();
    let f = FunctionDescriptor::builder("f", echo_locals, Namespace::new())
        .positional(["a", "b"])
        .defaults(defaults)
        .build()
        .unwrap();

    let args = vec![Value::Int(1), Value::Int(2), Value::Int(3)];
    let err = bind_and_invoke(&mut rt, &f, args, vec![]).unwrap_err();
    assert_eq!(err.to_string(), expected);
    assert_eq!(err.kind(), ExceptionKind::TypeError);
}

#[test]
fn test_too_many_positional_mentions_keyword_only() {
    let mut rt = Runtime::new();
    let f = FunctionDescriptor::builder("f", echo_locals, Namespace::new())
        .positional(["a"])
        .keyword_only(["k"])
        .build()
        .unwrap();

    let err = bind_and_invoke(&mut rt, &f, vec![Value::Int(1), Value::Int(2)], vec![kw("k", 3)])
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "f() takes exactly 1 positional argument but 2 positional arguments \
         (and 1 keyword-only argument) were given"
    );
}

#[rstest]
#[case(&["x"], "f() missing 1 required positional argument: 'x'")]
#[case(&["x", "y"], "f() missing 2 required positional arguments: 'x' and 'y'")]
#[case(&["x", "y", "z"], "f() missing 3 required positional arguments: 'x', 'y', and 'z'")]
fn test_missing_arguments_joined(#[case] params: &[&str], #[case] expected: &str) {
    let mut rt = Runtime::new();
    let f = FunctionDescriptor::builder("f", echo_locals, Namespace::new())
        .positional(params.iter().copied())
        .build()
        .unwrap();

    let err = bind_and_invoke(&mut rt, &f, vec![], vec![]).unwrap_err();
    assert_eq!(err.to_string(), expected);
}

#[test]
fn test_missing_positional_and_keyword_only_reported_together() {
    let mut rt = Runtime::new();
    let f = FunctionDescriptor::builder("f", echo_locals, Namespace::new())
        .positional(["a"])
        .keyword_only(["k"])
        .build()
        .unwrap();

    let err = bind_and_invoke(&mut rt, &f, vec![], vec![]).unwrap_err();
    assert_eq!(err.to_string(), "f() missing 2 required arguments: 'a' and 'k'");

    let err = bind_and_invoke(&mut rt, &f, vec![Value::Int(1)], vec![]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "f() missing 1 required keyword-only argument: 'k'"
    );
}

#[test]
fn test_unexpected_keyword() {
    let mut rt = Runtime::new();
    let f = FunctionDescriptor::builder("f", echo_locals, Namespace::new())
        .positional(["a"])
        .build()
        .unwrap();
    let err = bind_and_invoke(&mut rt, &f, vec![Value::Int(1)], vec![kw("zz", 2)]).unwrap_err();
    assert_eq!(err.to_string(), "f() got an unexpected keyword argument 'zz'");
}

#[test]
fn test_multiple_values_for_argument() {
    let mut rt = Runtime::new();
    let f = FunctionDescriptor::builder("f", echo_locals, Namespace::new())
        .positional(["a"])
        .build()
        .unwrap();
    let err = bind_and_invoke(&mut rt, &f, vec![Value::Int(1)], vec![kw("a", 2)]).unwrap_err();
    assert_eq!(err.to_string(), "f() got multiple values for argument 'a'");
}

#[test]
fn test_binding_error_releases_frame() {
    let mut rt = Runtime::new();
    let f = FunctionDescriptor::builder("f", echo_locals, Namespace::new())
        .positional(["a"])
        .build()
        .unwrap();
    bind_and_invoke(&mut rt, &f, vec![], vec![]).unwrap_err();
    assert_eq!(rt.arena().stats().in_use(), 0);
    assert!(rt.arena().free_frames_are_clean());
    assert!(rt.traceback().is_empty());
}

// ============================================================================
// Closures
// ============================================================================

fn read_cell(_rt: &mut Runtime, frame: &mut Frame) -> RuntimeResult<Completion> {
    let value = names::load_deref(frame, 0, "x")?;
    let slot_cleared = frame.fast_local(0).is_none();
    Ok(Completion::Return(Value::tuple(vec![value, Value::Bool(slot_cleared)])))
}

#[test]
fn test_captured_parameter_moves_into_cell() {
    let mut rt = Runtime::new();
    let f = FunctionDescriptor::builder("f", read_cell, Namespace::new())
        .positional(["x"])
        .cell_vars(["x"])
        .build()
        .unwrap();

    let result = bind_and_invoke(&mut rt, &f, vec![Value::Int(7)], vec![]).unwrap();
    assert_eq!(result, Value::tuple(vec![Value::Int(7), Value::Bool(true)]));
}

#[test]
fn test_free_variable_copied_from_closure() {
    let mut rt = Runtime::new();
    let captured = CellRef::with_value(Value::from("outer"));
    let f = FunctionDescriptor::builder("inner", read_cell, Namespace::new())
        .free_vars(["x"])
        .closure(vec![captured.clone()])
        .build()
        .unwrap();

    let result = bind_and_invoke(&mut rt, &f, vec![], vec![]).unwrap();
    assert_eq!(
        result,
        Value::tuple(vec![Value::from("outer"), Value::Bool(true)])
    );
}

#[test]
fn test_empty_free_variable_is_fatal() {
    let mut rt = Runtime::new();
    let f = FunctionDescriptor::builder("inner", read_cell, Namespace::new())
        .cell_vars(["own"])
        .free_vars(["x"])
        .closure(vec![CellRef::empty()])
        .build()
        .unwrap();

    let err = bind_and_invoke(&mut rt, &f, vec![], vec![]).unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(
        err,
        RuntimeError::Invariant(InvariantViolation::EmptyFreeVariable { index: 1, .. })
    ));
    assert_eq!(rt.arena().stats().in_use(), 0);
}

// ============================================================================
// Call dispatch
// ============================================================================

#[test]
fn test_bound_method_prepends_receiver() {
    let mut rt = Runtime::new();
    let f = FunctionDescriptor::builder("method", echo_locals, Namespace::new())
        .positional(["self", "x"])
        .build()
        .unwrap();
    let method = Value::Callable(Callable::bind(Value::from("recv"), Callable::Function(f)));

    let result = call(&mut rt, &method, vec![Value::Int(1)], vec![]).unwrap();
    assert_eq!(result, Value::tuple(vec![Value::from("recv"), Value::Int(1)]));
}

#[test]
fn test_native_arity_checked() {
    let mut rt = Runtime::new();
    let add = NativeFunctionBuilder::new("add")
        .with_arity(2)
        .with_implementation(|rt, args, _| pyrite_runtime::ops::binary_add(rt, &args[0], &args[1]))
        .build()
        .unwrap();
    let add = Value::Callable(add);

    let result = call(&mut rt, &add, vec![Value::Int(2), Value::Int(3)], vec![]).unwrap();
    assert_eq!(result, Value::Int(5));

    let err = call(&mut rt, &add, vec![Value::Int(2)], vec![]).unwrap_err();
    assert_eq!(err.to_string(), "add() takes exactly 2 arguments (1 given)");

    let err = call(&mut rt, &add, vec![Value::Int(2), Value::Int(3)], vec![kw("x", 1)]).unwrap_err();
    assert_eq!(err.to_string(), "add() takes no keyword arguments");
}

#[test]
fn test_calling_exception_class_instantiates() {
    let mut rt = Runtime::new();
    let exc = call(
        &mut rt,
        &Value::ExceptionType(ExceptionKind::ValueError),
        vec![Value::from("boom")],
        vec![],
    )
    .unwrap();
    assert_eq!(exc.repr(), "ValueError('boom')");
}

#[test]
fn test_non_callable() {
    let mut rt = Runtime::new();
    let err = call(&mut rt, &Value::Int(3), vec![], vec![]).unwrap_err();
    assert_eq!(err.to_string(), "'int' object is not callable");
}

#[test]
fn test_call_with_unpacked_arguments() {
    let mut rt = Runtime::new();
    let f = function_value(
        FunctionDescriptor::builder("f", echo_locals, Namespace::new())
            .positional(["a", "b", "c"])
            .build()
            .unwrap(),
    );

    let star = Value::list(vec![Value::Int(2)]);
    let kwargs = Namespace::new();
    kwargs.insert(Name::new("c"), Value::Int(3));
    let result = call_with_unpacked(
        &mut rt,
        &f,
        vec![Value::Int(1)],
        Some(&star),
        vec![],
        Some(&Value::Dict(kwargs)),
    )
    .unwrap();
    assert_eq!(result, tuple_of(&[1, 2, 3]));
}

#[test]
fn test_call_with_unpacked_errors() {
    let mut rt = Runtime::new();
    let f = function_value(
        FunctionDescriptor::builder("f", echo_locals, Namespace::new())
            .positional(["a"])
            .build()
            .unwrap(),
    );

    let err = call_with_unpacked(&mut rt, &f, vec![], Some(&Value::Int(1)), vec![], None)
        .unwrap_err();
    assert_eq!(err.to_string(), "f() argument after * must be an iterable, not int");

    let err = call_with_unpacked(&mut rt, &f, vec![], None, vec![], Some(&Value::Int(1)))
        .unwrap_err();
    assert_eq!(err.to_string(), "f() argument after ** must be a mapping, not int");

    let kwargs = Namespace::new();
    kwargs.insert(Name::new("a"), Value::Int(2));
    let err = call_with_unpacked(
        &mut rt,
        &f,
        vec![],
        None,
        vec![kw("a", 1)],
        Some(&Value::Dict(kwargs)),
    )
    .unwrap_err();
    assert_eq!(err.to_string(), "f() got multiple values for keyword argument 'a'");
}

// ============================================================================
// Recursion depth
// ============================================================================

fn recurse(rt: &mut Runtime, frame: &mut Frame) -> RuntimeResult<Completion> {
    let this = names::load_global(frame, &Name::new("recurse"))?;
    call(rt, &this, vec![], vec![]).map(Completion::Return)
}

#[test]
fn test_recursion_limit_is_catchable() {
    let mut config = RuntimeConfig::default();
    config.arena.max_depth = 8;
    let mut rt = Runtime::with_config(config);

    let globals = Namespace::new();
    let f = FunctionDescriptor::builder("recurse", recurse, globals.clone())
        .build()
        .unwrap();
    globals.insert(Name::new("recurse"), function_value(f.clone()));

    let err = bind_and_invoke(&mut rt, &f, vec![], vec![]).unwrap_err();
    assert!(!err.is_fatal());
    assert_eq!(err.kind(), ExceptionKind::RecursionError);
    assert_eq!(err.to_string(), "maximum recursion depth exceeded");
    assert_eq!(rt.arena().stats().in_use(), 0);
    assert!(rt.current_frame().is_none());

    globals.clear();
}

//! Frame arena behaviour observed through calls

mod common;

use common::*;
#[allow(unused_imports)]
use common::{assert_eq, assert_ne};
use pyrite_config::RuntimeConfig;
use pyrite_runtime::callable::{Completion, FunctionDescriptor};
use pyrite_runtime::frame::{BlockKind, Frame, FrameLayout, MAX_BLOCKS};
use pyrite_runtime::value::{Name, Namespace, Value};
use pyrite_runtime::{call, names, ExceptionKind, Runtime, RuntimeError, RuntimeResult};
use std::rc::Rc;

/// `countdown(n)`: recurses down to zero and returns the deepest frame depth
fn countdown(rt: &mut Runtime, frame: &mut Frame) -> RuntimeResult<Completion> {
    if let Value::Int(n) = names::load_fast(frame, 0, "n")? {
        if n > 0 {
            let callee = names::load_global(frame, &Name::new("countdown"))?;
            return call(rt, &callee, vec![Value::Int(n - 1)], vec![]).map(Completion::Return);
        }
    }
    let depth = i64::try_from(frame.depth()).unwrap_or(i64::MAX);
    Ok(Completion::Return(Value::Int(depth)))
}

fn runtime_with(batch_size: usize, max_depth: usize) -> (Runtime, Namespace, Value) {
    let mut config = RuntimeConfig::default();
    config.arena.batch_size = batch_size;
    config.arena.max_depth = max_depth;
    let rt = Runtime::with_config(config);

    let globals = Namespace::new();
    let function = FunctionDescriptor::builder("countdown", countdown, globals.clone())
        .positional(["n"])
        .build()
        .unwrap();
    let callee = function_value(function);
    globals.insert(Name::new("countdown"), callee.clone());
    (rt, globals, callee)
}

#[test]
fn test_recursion_grows_arena_in_batches() {
    let (mut rt, globals, countdown) = runtime_with(4, 100);

    let depth = call(&mut rt, &countdown, vec![Value::Int(5)], vec![]).unwrap();
    assert_eq!(depth, Value::Int(5));
    assert_eq!(rt.arena().stats().batches, 2);
    assert_eq!(rt.arena().stats().allocated, 8);
    assert_eq!(rt.arena().stats().in_use(), 0);

    // Steady state: the pool already holds enough frames
    call(&mut rt, &countdown, vec![Value::Int(5)], vec![]).unwrap();
    assert_eq!(rt.arena().stats().batches, 2);
    assert_eq!(rt.arena().free_count(), 8);
    assert!(rt.arena().free_frames_are_clean());

    globals.clear();
}

#[test]
fn test_recursion_limit_unwinds_every_frame() {
    let (mut rt, globals, countdown) = runtime_with(4, 8);

    let err = call(&mut rt, &countdown, vec![Value::Int(100)], vec![]).unwrap_err();
    assert!(matches!(err, RuntimeError::RecursionLimit));
    assert_eq!(err.kind(), ExceptionKind::RecursionError);
    assert_eq!(err.to_string(), "maximum recursion depth exceeded");
    assert_eq!(rt.arena().stats().in_use(), 0);
    assert!(rt.current_frame().is_none());

    // Recoverable: a shallow call still works
    assert_eq!(
        call(&mut rt, &countdown, vec![Value::Int(2)], vec![]).unwrap(),
        Value::Int(2)
    );

    globals.clear();
}

#[test]
fn test_call_drops_frame_references() {
    let mut rt = Runtime::new();
    let globals = Namespace::new();
    let function = FunctionDescriptor::builder("echo", echo_locals, globals.clone())
        .positional(["a", "b"])
        .build()
        .unwrap();
    let echo = function_value(function);
    let before = globals.handle_count();

    let payload = Value::list(vec![Value::Int(1)]);
    let result = call(&mut rt, &echo, vec![payload.clone(), Value::Int(2)], vec![]).unwrap();
    assert_eq!(result, Value::tuple(vec![payload.clone(), Value::Int(2)]));
    drop(result);

    assert_eq!(globals.handle_count(), before);
    if let Value::List(items) = &payload {
        assert_eq!(Rc::strong_count(items), 1);
    }
    assert!(rt.arena().free_frames_are_clean());
}

// ============================================================================
// Stack discipline
// ============================================================================

fn bare_frame(rt: &Runtime, layout: FrameLayout) -> Frame {
    rt.arena().acquire(
        Rc::from("f"),
        Namespace::new(),
        None,
        Namespace::new(),
        layout,
    )
}

#[test]
fn test_value_stack_bounds_are_fatal() {
    let rt = Runtime::new();
    let mut frame = bare_frame(&rt, FrameLayout::new(1, 0, 0));

    frame.push(Value::Int(1)).unwrap();
    let overflow = frame.push(Value::Int(2)).unwrap_err();
    assert!(overflow.is_fatal());
    assert_eq!(overflow.to_string(), "value stack overflow in 'f' (capacity 1)");

    assert_eq!(frame.pop().unwrap(), Value::Int(1));
    let underflow = frame.pop().unwrap_err();
    assert!(underflow.is_fatal());
    assert_eq!(underflow.to_string(), "value stack underflow in 'f'");

    rt.arena().release(frame);
}

#[test]
fn test_block_stack_bounds() {
    let rt = Runtime::new();
    let mut frame = bare_frame(&rt, FrameLayout::new(2, 0, 0));

    for handler in 0..MAX_BLOCKS {
        frame.setup_block(BlockKind::Loop, handler as u32).unwrap();
    }
    let err = frame.setup_block(BlockKind::Loop, 99).unwrap_err();
    assert_eq!(err.to_string(), "block stack overflow in 'f'");

    // Unwinding discards values pushed inside the block
    rt.arena().release(frame);
    let mut frame = bare_frame(&rt, FrameLayout::new(2, 0, 0));
    frame.push(Value::Int(1)).unwrap();
    frame.setup_block(BlockKind::Except, 4).unwrap();
    frame.push(Value::Int(2)).unwrap();
    let block = frame.pop_block().unwrap();
    frame.unwind_block(&block);
    assert_eq!(frame.stack_len(), 1);
    assert!(frame.pop_block().is_err());

    rt.arena().release(frame);
}

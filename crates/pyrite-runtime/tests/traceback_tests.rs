//! Traceback tracking and uncaught-error reporting

mod common;

use common::*;
#[allow(unused_imports)]
use common::{assert_eq, assert_ne};
use pyrite_config::RuntimeConfig;
use pyrite_runtime::callable::{Completion, FunctionDescriptor};
use pyrite_runtime::frame::{Frame, FrameLayout};
use pyrite_runtime::module::ModuleDescriptor;
use pyrite_runtime::traceback::{Traceback, TracebackRecord};
use pyrite_runtime::value::{Name, Value};
use pyrite_runtime::{call, names, ExceptionKind, Runtime, RuntimeError, RuntimeResult};
use std::rc::Rc;

fn record(name: &str, depth: usize, line: i64) -> TracebackRecord {
    TracebackRecord {
        name: Rc::from(name),
        instr: 0,
        line,
        depth,
    }
}

#[test]
fn test_reraise_at_same_depth_supersedes() {
    let mut tb = Traceback::new(1000);
    tb.push(record("main", 0, 1));
    tb.push(record("outer", 1, 2));
    tb.push(record("inner", 2, 3));
    tb.push(record("outer", 1, 9));

    let lines = tb.format();
    assert_eq!(
        lines,
        vec![
            "#0 In \"main\", instr 0, line 1".to_string(),
            "#1 In \"outer\", instr 0, line 9".to_string(),
            "#2 In \"inner\", instr 0, line 3".to_string(),
        ]
    );
}

#[test]
fn test_clear_empties_records() {
    let mut tb = Traceback::new(1000);
    tb.push(record("main", 0, 1));
    tb.clear();
    assert!(tb.is_empty());
    assert!(tb.format().is_empty());
}

// ============================================================================
// Uncaught errors at the entry module
// ============================================================================

fn inner(_rt: &mut Runtime, frame: &mut Frame) -> RuntimeResult<Completion> {
    frame.mark_error(7, 12);
    Err(RuntimeError::ValueError("bad value".to_string()))
}

fn outer(rt: &mut Runtime, frame: &mut Frame) -> RuntimeResult<Completion> {
    let callee = names::load_global(frame, &Name::new("inner"))?;
    match call(rt, &callee, vec![], vec![]) {
        Ok(value) => Ok(Completion::Return(value)),
        Err(err) => {
            frame.mark_error(3, 5);
            Err(err)
        }
    }
}

fn main_body(rt: &mut Runtime, frame: &mut Frame) -> RuntimeResult<Completion> {
    let globals = frame.globals().cloned().unwrap();
    for (name, body) in [("inner", inner as pyrite_runtime::EntryPoint), ("outer", outer)] {
        let function = FunctionDescriptor::builder(name, body, globals.clone())
            .build()
            .unwrap();
        names::store_name(frame, &Name::new(name), function_value(function))?;
    }

    let callee = names::load_name(frame, &Name::new("outer"))?;
    if let Err(err) = call(rt, &callee, vec![], vec![]) {
        frame.mark_error(1, 1);
        return Err(err);
    }
    Ok(Completion::Return(Value::None))
}

fn exit_body(rt: &mut Runtime, _frame: &mut Frame) -> RuntimeResult<Completion> {
    let exit = Value::ExceptionType(ExceptionKind::SystemExit);
    Err(pyrite_runtime::ops::do_raise(rt, Some(exit), None))
}

fn runtime_with_main(config: RuntimeConfig, body: pyrite_runtime::EntryPoint) -> (Runtime, SharedBuffer) {
    let mut rt = Runtime::with_config(config);
    let output = SharedBuffer::default();
    rt.set_error_output(Box::new(output.clone()));
    rt.register_module(ModuleDescriptor::defined(
        0,
        "__main__",
        body,
        FrameLayout::new(4, 0, 0),
    ));
    (rt, output)
}

#[test]
fn test_uncaught_error_prints_traceback() {
    let (mut rt, output) = runtime_with_main(RuntimeConfig::default(), main_body);

    let err = rt.run_main().unwrap_err();
    assert_eq!(err.kind(), ExceptionKind::ValueError);
    assert_eq!(
        output.contents(),
        "Traceback (most recent call last):\n\
         #0 In \"__main__\", instr 1, line 1\n\
         #1 In \"outer\", instr 3, line 5\n\
         #2 In \"inner\", instr 7, line 12\n\
         ValueError: bad value\n"
    );
    assert_eq!(rt.arena().stats().in_use(), 0);
}

#[test]
fn test_disabled_traceback_records_nothing() {
    let mut config = RuntimeConfig::default();
    config.traceback.enabled = false;
    let (mut rt, output) = runtime_with_main(config, main_body);

    rt.run_main().unwrap_err();
    assert_eq!(
        output.contents(),
        "Traceback (most recent call last):\nValueError: bad value\n"
    );
}

#[test]
fn test_system_exit_is_not_reported() {
    let (mut rt, output) = runtime_with_main(RuntimeConfig::default(), exit_body);

    let err = rt.run_main().unwrap_err();
    assert_eq!(err.kind(), ExceptionKind::SystemExit);
    assert_eq!(output.contents(), "");
}

#[test]
fn test_clear_error_forgets_provenance() {
    let (mut rt, _output) = runtime_with_main(RuntimeConfig::default(), main_body);
    rt.import(0).unwrap_err();
    assert_eq!(rt.traceback().len(), 3);

    rt.clear_error();
    assert!(rt.traceback().is_empty());
}

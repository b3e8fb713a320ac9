//! Shared test utilities
//!
//! Entry points here stand in for translated function bodies.

#![allow(dead_code)]

use pyrite_config::RuntimeConfig;
use pyrite_runtime::callable::{Completion, FunctionDescriptor};
use pyrite_runtime::frame::Frame;
use pyrite_runtime::value::{Name, Namespace, Object, Value};
use pyrite_runtime::{Callable, Runtime, RuntimeError, RuntimeResult};
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

pub use pretty_assertions::{assert_eq, assert_ne};

/// Runtime with every operator forced through the generic protocol
pub fn generic_runtime() -> Runtime {
    let mut config = RuntimeConfig::default();
    config.dispatch.fast_paths = false;
    Runtime::with_config(config)
}

/// Body returning a tuple of its fast locals (`None` for unbound slots)
pub fn echo_locals(_rt: &mut Runtime, frame: &mut Frame) -> RuntimeResult<Completion> {
    let locals = frame
        .fast_locals()
        .iter()
        .map(|slot| slot.clone().unwrap_or(Value::None))
        .collect();
    Ok(Completion::Return(Value::tuple(locals)))
}

pub fn return_none(_rt: &mut Runtime, _frame: &mut Frame) -> RuntimeResult<Completion> {
    Ok(Completion::Return(Value::None))
}

/// Wrap a built descriptor as a callable value
pub fn function_value(function: Rc<FunctionDescriptor>) -> Value {
    Value::Callable(Callable::Function(function))
}

pub fn tuple_of(items: &[i64]) -> Value {
    Value::tuple(items.iter().map(|&i| Value::Int(i)).collect())
}

/// Append `entry` to the list bound to `name` in the frame's globals or builtins
pub fn log_to(frame: &Frame, name: &str, entry: Value) -> RuntimeResult<()> {
    match pyrite_runtime::names::load_global(frame, &Name::new(name))? {
        Value::List(items) => {
            items.borrow_mut().push(entry);
            Ok(())
        }
        other => Err(RuntimeError::TypeError(format!(
            "expected a list, got {}",
            other.type_name()
        ))),
    }
}

/// Install an empty list under `name` and return a handle to it
pub fn install_log(namespace: &Namespace, name: &str) -> Value {
    let log = Value::list(Vec::new());
    namespace.insert(Name::new(name), log.clone());
    log
}

pub fn list_items(value: &Value) -> Vec<Value> {
    match value {
        Value::List(items) => items.borrow().clone(),
        other => panic!("expected a list, got {:?}", other),
    }
}

/// Writer capturing output for assertions
#[derive(Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A host mapping used as a non-dict local scope
#[derive(Debug, Default)]
pub struct MappingScope {
    entries: RefCell<HashMap<String, Value>>,
}

impl MappingScope {
    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.borrow().get(key).cloned()
    }
}

fn mapping_key(key: &Value) -> RuntimeResult<String> {
    key.as_str()
        .map(str::to_string)
        .ok_or_else(|| RuntimeError::TypeError("mapping keys must be str".to_string()))
}

impl Object for MappingScope {
    fn type_name(&self) -> &str {
        "mappingproxy"
    }

    fn is_mapping(&self) -> bool {
        true
    }

    fn get_item(&self, key: &Value) -> RuntimeResult<Value> {
        let k = mapping_key(key)?;
        self.entries
            .borrow()
            .get(&k)
            .cloned()
            .ok_or_else(|| RuntimeError::KeyNotFound { key: key.repr() })
    }

    fn set_item(&self, key: &Value, value: Value) -> RuntimeResult<()> {
        let k = mapping_key(key)?;
        self.entries.borrow_mut().insert(k, value);
        Ok(())
    }

    fn del_item(&self, key: &Value) -> RuntimeResult<()> {
        let k = mapping_key(key)?;
        self.entries
            .borrow_mut()
            .remove(&k)
            .map(drop)
            .ok_or_else(|| RuntimeError::KeyNotFound { key: key.repr() })
    }
}

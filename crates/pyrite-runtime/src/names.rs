//! Scoped name resolution
//!
//! Unoptimized scopes (module bodies and class bodies) resolve names through
//! their locals mapping, then globals, then builtins. Function bodies use fast
//! locals and cells, addressed by slot.

use crate::error::{RuntimeError, RuntimeResult};
use crate::frame::Frame;
use crate::value::{Name, Scope, Value};

fn key_of(name: &Name) -> Value {
    Value::Str(name.as_rc().clone())
}

// ============================================================================
// Locals, globals and builtins
// ============================================================================

/// Resolve `name` through locals, globals, then builtins
pub fn load_name(frame: &Frame, name: &Name) -> RuntimeResult<Value> {
    match frame.locals() {
        Some(Scope::Dict(namespace)) => {
            if let Some(value) = namespace.get(name) {
                return Ok(value);
            }
        }
        Some(Scope::Mapping(mapping)) => match mapping.get_item(&key_of(name)) {
            Ok(value) => return Ok(value),
            Err(RuntimeError::KeyNotFound { .. }) => {}
            Err(err) => return Err(err),
        },
        None => {
            return Err(RuntimeError::SystemError(format!(
                "no locals when loading '{}'",
                name
            )))
        }
    }
    load_global(frame, name)
}

/// Resolve `name` through globals, then builtins
pub fn load_global(frame: &Frame, name: &Name) -> RuntimeResult<Value> {
    frame
        .globals()
        .and_then(|globals| globals.get(name))
        .or_else(|| frame.builtins().and_then(|builtins| builtins.get(name)))
        .ok_or_else(|| RuntimeError::UndefinedName {
            name: name.to_string(),
        })
}

pub fn store_name(frame: &Frame, name: &Name, value: Value) -> RuntimeResult<()> {
    match frame.locals() {
        Some(Scope::Dict(namespace)) => {
            namespace.insert(name.clone(), value);
            Ok(())
        }
        Some(Scope::Mapping(mapping)) => mapping.set_item(&key_of(name), value),
        None => Err(RuntimeError::SystemError(format!(
            "no locals found when storing '{}'",
            name
        ))),
    }
}

pub fn delete_name(frame: &Frame, name: &Name) -> RuntimeResult<()> {
    let undefined = || RuntimeError::UndefinedName {
        name: name.to_string(),
    };
    match frame.locals() {
        Some(Scope::Dict(namespace)) => namespace.remove(name).map(drop).ok_or_else(undefined),
        Some(Scope::Mapping(mapping)) => match mapping.del_item(&key_of(name)) {
            Err(RuntimeError::KeyNotFound { .. }) => Err(undefined()),
            other => other,
        },
        None => Err(RuntimeError::SystemError(format!(
            "no locals when deleting '{}'",
            name
        ))),
    }
}

pub fn store_global(frame: &Frame, name: &Name, value: Value) -> RuntimeResult<()> {
    let globals = frame
        .globals()
        .ok_or_else(|| RuntimeError::SystemError(format!("no globals when storing '{}'", name)))?;
    globals.insert(name.clone(), value);
    Ok(())
}

pub fn delete_global(frame: &Frame, name: &Name) -> RuntimeResult<()> {
    frame
        .globals()
        .and_then(|globals| globals.remove(name))
        .map(drop)
        .ok_or_else(|| RuntimeError::UndefinedName {
            name: name.to_string(),
        })
}

// ============================================================================
// Fast locals
// ============================================================================

pub fn load_fast(frame: &Frame, index: usize, name: &str) -> RuntimeResult<Value> {
    frame
        .fast_local(index)
        .cloned()
        .ok_or_else(|| RuntimeError::UnboundLocal {
            name: name.to_string(),
        })
}

pub fn store_fast(frame: &mut Frame, index: usize, value: Value) -> RuntimeResult<()> {
    frame.set_fast_local(index, value)
}

pub fn delete_fast(frame: &mut Frame, index: usize, name: &str) -> RuntimeResult<()> {
    frame
        .take_fast_local(index)?
        .map(drop)
        .ok_or_else(|| RuntimeError::UnboundLocal {
            name: name.to_string(),
        })
}

// ============================================================================
// Cells
// ============================================================================

pub fn load_deref(frame: &Frame, index: usize, name: &str) -> RuntimeResult<Value> {
    frame.cell(index)?.get().ok_or_else(|| RuntimeError::UnboundCell {
        name: name.to_string(),
    })
}

pub fn store_deref(frame: &Frame, index: usize, value: Value) -> RuntimeResult<()> {
    frame.cell(index)?.set(value);
    Ok(())
}

pub fn delete_deref(frame: &Frame, index: usize, name: &str) -> RuntimeResult<()> {
    frame
        .cell(index)?
        .take()
        .map(drop)
        .ok_or_else(|| RuntimeError::UnboundCell {
            name: name.to_string(),
        })
}

/// The cell itself, for building an inner function's closure
pub fn load_closure(frame: &Frame, index: usize) -> RuntimeResult<Value> {
    Ok(Value::Cell(frame.cell(index)?.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{FrameArena, FrameLayout};
    use crate::value::Namespace;
    use pretty_assertions::assert_eq;
    use std::rc::Rc;

    fn module_frame(arena: &FrameArena, globals: &Namespace, builtins: &Namespace) -> Frame {
        arena.acquire(
            Rc::from("<module>"),
            globals.clone(),
            Some(Scope::Dict(globals.clone())),
            builtins.clone(),
            FrameLayout::new(0, 0, 0),
        )
    }

    #[test]
    fn test_builtins_shadowed_by_globals() {
        let arena = FrameArena::new(1);
        let globals = Namespace::new();
        let builtins = Namespace::new();
        builtins.insert(Name::new("len"), Value::Int(1));
        let frame = module_frame(&arena, &globals, &builtins);

        assert_eq!(load_name(&frame, &Name::new("len")).unwrap(), Value::Int(1));
        store_name(&frame, &Name::new("len"), Value::Int(2)).unwrap();
        assert_eq!(load_name(&frame, &Name::new("len")).unwrap(), Value::Int(2));
        arena.release(frame);
    }

    #[test]
    fn test_delete_missing_name() {
        let arena = FrameArena::new(1);
        let frame = module_frame(&arena, &Namespace::new(), &Namespace::new());
        let err = delete_name(&frame, &Name::new("ghost")).unwrap_err();
        assert_eq!(err.to_string(), "name 'ghost' is not defined");
        arena.release(frame);
    }
}

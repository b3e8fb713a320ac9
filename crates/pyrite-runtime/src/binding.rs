//! Call binding
//!
//! Builds a callee frame from a [`FunctionDescriptor`] and the arguments of one
//! invocation, then either runs the body or hands the frame to a
//! [`Generator`].
//!
//! Binding follows a fixed order so error precedence is stable:
//!
//! 1. positional arguments fill leading parameter slots, surplus goes to `*args`
//! 2. keyword arguments bind by name, unknown names go to `**kwargs`
//! 3. surplus positional arguments without `*args` are rejected
//! 4. unfilled slots take defaults; whatever is still empty is reported together
//! 5. closure cells are created and free variables copied in

use crate::callable::{Callable, Completion, FunctionDescriptor};
use crate::error::{BindingError, ExceptionKind, InvariantViolation, MissingKind, RuntimeError, RuntimeResult};
use crate::frame::Frame;
use crate::generator::Generator;
use crate::object::describe_callable;
use crate::ops;
use crate::runtime::Runtime;
use crate::value::{CellRef, ExceptionObject, Name, Namespace, Value};
use std::rc::Rc;

/// Bind arguments into a fresh frame and run the function.
///
/// For generator functions the bound frame is wrapped in a [`Generator`]
/// without running any of the body.
pub fn bind_and_invoke(
    rt: &mut Runtime,
    function: &Rc<FunctionDescriptor>,
    args: Vec<Value>,
    kwargs: Vec<(Name, Value)>,
) -> RuntimeResult<Value> {
    let mut frame = rt.arena().acquire(
        function.name_rc().clone(),
        function.globals().clone(),
        None,
        rt.builtins().clone(),
        function.layout(),
    );

    let bound = bind_arguments(function, &mut frame, args, kwargs)
        .and_then(|()| bind_cells(function, &mut frame));
    if let Err(err) = bound {
        rt.arena().release(frame);
        return Err(err);
    }

    if function.flags().generator {
        let generator = Generator::new(
            function.name_rc().clone(),
            function.entry(),
            frame,
            rt.arena().clone(),
        );
        return Ok(Value::Generator(generator));
    }

    let result = rt.execute(function.entry(), &mut frame);
    rt.arena().release(frame);

    match result? {
        Completion::Return(value) => Ok(value),
        Completion::Yield(_) => Err(InvariantViolation::UnexpectedSuspend {
            name: function.name().to_string(),
        }
        .into()),
    }
}

fn bind_arguments(
    function: &FunctionDescriptor,
    frame: &mut Frame,
    args: Vec<Value>,
    kwargs: Vec<(Name, Value)>,
) -> RuntimeResult<()> {
    let argcount = function.argcount();
    let total_params = argcount + function.kwonly_count();
    let given = args.len();

    let varkw = match function.varkwargs_slot() {
        Some(slot) => {
            let namespace = Namespace::new();
            frame.set_fast_local(slot, Value::Dict(namespace.clone()))?;
            Some(namespace)
        }
        None => None,
    };

    let mut args = args.into_iter();
    for (slot, value) in args.by_ref().take(argcount).enumerate() {
        frame.set_fast_local(slot, value)?;
    }
    if let Some(slot) = function.varargs_slot() {
        frame.set_fast_local(slot, Value::tuple(args.collect()))?;
    }

    for (name, value) in kwargs {
        match function.keyword_slot(&name) {
            Some(slot) => {
                if frame.fast_local(slot).is_some() {
                    return Err(BindingError::MultipleValues {
                        function: function.name().to_string(),
                        name: name.to_string(),
                    }
                    .into());
                }
                frame.set_fast_local(slot, value)?;
            }
            None => match &varkw {
                Some(namespace) => {
                    namespace.insert(name, value);
                }
                None => {
                    return Err(BindingError::UnexpectedKeyword {
                        function: function.name().to_string(),
                        name: name.to_string(),
                    }
                    .into())
                }
            },
        }
    }

    let defaults = function.defaults();
    if given > argcount && function.varargs_slot().is_none() {
        let kwonly_given = (argcount..total_params)
            .filter(|&slot| frame.fast_local(slot).is_some())
            .count();
        return Err(BindingError::TooManyPositional {
            function: function.name().to_string(),
            min_positional: argcount - defaults.len(),
            max_positional: argcount,
            has_defaults: !defaults.is_empty(),
            given,
            kwonly_given,
        }
        .into());
    }

    let first_default = argcount - defaults.len();
    let mut missing_positional = Vec::new();
    for slot in given.min(argcount)..argcount {
        if frame.fast_local(slot).is_some() {
            continue;
        }
        match slot.checked_sub(first_default).and_then(|i| defaults.get(i)) {
            Some(default) => frame.set_fast_local(slot, default.clone())?,
            None => missing_positional.push(function.var_names()[slot].to_string()),
        }
    }

    let mut missing_kwonly = Vec::new();
    for slot in argcount..total_params {
        if frame.fast_local(slot).is_some() {
            continue;
        }
        let name = &function.var_names()[slot];
        match function.kw_default(name) {
            Some(default) => frame.set_fast_local(slot, default.clone())?,
            None => missing_kwonly.push(name.to_string()),
        }
    }

    let kind = match (missing_positional.is_empty(), missing_kwonly.is_empty()) {
        (true, true) => return Ok(()),
        (false, true) => MissingKind::Positional,
        (true, false) => MissingKind::KeywordOnly,
        (false, false) => MissingKind::Mixed,
    };
    missing_positional.extend(missing_kwonly);
    Err(BindingError::Missing {
        function: function.name().to_string(),
        kind,
        names: missing_positional,
    }
    .into())
}

fn bind_cells(function: &FunctionDescriptor, frame: &mut Frame) -> RuntimeResult<()> {
    let flags = function.flags();
    let num_params = function.argcount()
        + function.kwonly_count()
        + usize::from(flags.varargs)
        + usize::from(flags.varkwargs);
    let params = &function.var_names()[..num_params];

    // A parameter captured by an inner function moves into its cell
    for (index, cell_name) in function.cell_vars().iter().enumerate() {
        let cell = match params.iter().position(|param| param == cell_name) {
            Some(slot) => match frame.take_fast_local(slot)? {
                Some(value) => CellRef::with_value(value),
                None => CellRef::empty(),
            },
            None => CellRef::empty(),
        };
        frame.set_cell(index, cell)?;
    }

    let offset = function.cell_vars().len();
    for (index, cell) in function.closure().iter().enumerate() {
        if cell.is_empty() {
            return Err(InvariantViolation::EmptyFreeVariable {
                function: function.name().to_string(),
                index: offset + index,
            }
            .into());
        }
        frame.set_cell(offset + index, cell.clone())?;
    }
    Ok(())
}

// ============================================================================
// Call entry points
// ============================================================================

/// Invoke any callable value
pub fn call(
    rt: &mut Runtime,
    callee: &Value,
    args: Vec<Value>,
    kwargs: Vec<(Name, Value)>,
) -> RuntimeResult<Value> {
    match callee {
        Value::Callable(callable) => call_callable(rt, callable, args, kwargs),
        Value::ExceptionType(kind) => instantiate_exception(*kind, args, &kwargs),
        other => Err(RuntimeError::TypeError(format!(
            "'{}' object is not callable",
            other.type_name()
        ))),
    }
}

fn call_callable(
    rt: &mut Runtime,
    callable: &Callable,
    mut args: Vec<Value>,
    kwargs: Vec<(Name, Value)>,
) -> RuntimeResult<Value> {
    match callable {
        Callable::Function(function) => bind_and_invoke(rt, function, args, kwargs),
        Callable::BoundMethod(method) => {
            args.insert(0, method.receiver().clone());
            call_callable(rt, method.function(), args, kwargs)
        }
        Callable::Native(native) => native.invoke(rt, &args, &kwargs),
    }
}

fn instantiate_exception(
    kind: ExceptionKind,
    args: Vec<Value>,
    kwargs: &[(Name, Value)],
) -> RuntimeResult<Value> {
    if !kwargs.is_empty() {
        return Err(RuntimeError::TypeError(format!(
            "{}() takes no keyword arguments",
            kind
        )));
    }
    Ok(Value::Exception(Rc::new(ExceptionObject::new(kind, args))))
}

/// Invoke `callee` as `callee(*positional, *star_args, **keywords, **star_kwargs)`
pub fn call_with_unpacked(
    rt: &mut Runtime,
    callee: &Value,
    positional: Vec<Value>,
    star_args: Option<&Value>,
    keywords: Vec<(Name, Value)>,
    star_kwargs: Option<&Value>,
) -> RuntimeResult<Value> {
    let mut args = positional;
    if let Some(extra) = star_args {
        match extra {
            Value::Tuple(items) => args.extend(items.iter().cloned()),
            Value::List(items) => {
                let items = items.borrow().clone();
                args.extend(items);
            }
            other => {
                let iterator = ops::get_iter(rt, other).map_err(|err| {
                    if err.kind() == ExceptionKind::TypeError {
                        BindingError::ArgsNotIterable {
                            function: describe_callable(callee),
                            type_name: other.type_name().to_string(),
                        }
                        .into()
                    } else {
                        err
                    }
                })?;
                while let Some(item) = ops::for_iter(rt, &iterator)? {
                    args.push(item);
                }
            }
        }
    }

    let mut kwargs = keywords;
    if let Some(mapping) = star_kwargs {
        let namespace = match mapping {
            Value::Dict(namespace) => namespace,
            other => {
                return Err(BindingError::KwargsNotMapping {
                    function: describe_callable(callee),
                    type_name: other.type_name().to_string(),
                }
                .into())
            }
        };
        for (name, value) in namespace.entries() {
            if kwargs.iter().any(|(existing, _)| *existing == name) {
                return Err(BindingError::DuplicateKeyword {
                    function: describe_callable(callee),
                    name: name.to_string(),
                }
                .into());
            }
            kwargs.push((name, value));
        }
    }

    call(rt, callee, args, kwargs)
}

//! Callable descriptors and native functions
//!
//! A translated function is described by an immutable [`FunctionDescriptor`]:
//! its entry point, parameter names, defaults, closure and frame layout.
//! [`Callable`] is the tagged variant every call site dispatches on.
//!
//! # Examples
//!
//! ```rust
//! use pyrite_runtime::callable::{Completion, FunctionDescriptor};
//! use pyrite_runtime::frame::Frame;
//! use pyrite_runtime::value::{Namespace, Value};
//! use pyrite_runtime::{Runtime, RuntimeResult};
//!
//! fn body(_rt: &mut Runtime, frame: &mut Frame) -> RuntimeResult<Completion> {
//!     Ok(Completion::Return(frame.fast_local(0).cloned().unwrap_or(Value::None)))
//! }
//!
//! let identity = FunctionDescriptor::builder("identity", body, Namespace::new())
//!     .positional(["x"])
//!     .build()
//!     .unwrap();
//! assert_eq!(identity.argcount(), 1);
//! ```

use crate::error::{BindingError, RuntimeResult};
use crate::frame::{Frame, FrameLayout};
use crate::runtime::Runtime;
use crate::value::{CellRef, Name, Namespace, Value};
use std::fmt;
use std::rc::Rc;

/// Signature of a translated body
pub type EntryPoint = fn(&mut Runtime, &mut Frame) -> RuntimeResult<Completion>;

/// How a body handed control back
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// The body finished with a value
    Return(Value),
    /// A generator body suspended after storing its resume label
    Yield(Value),
}

/// Code flags relevant to binding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CodeFlags {
    pub varargs: bool,
    pub varkwargs: bool,
    pub generator: bool,
}

/// Immutable description of a compiled function
pub struct FunctionDescriptor {
    name: Rc<str>,
    entry: EntryPoint,
    globals: Namespace,
    var_names: Vec<Name>,
    argcount: usize,
    kwonly_count: usize,
    defaults: Vec<Value>,
    kw_defaults: Vec<(Name, Value)>,
    closure: Vec<CellRef>,
    cell_vars: Vec<Name>,
    free_vars: Vec<Name>,
    flags: CodeFlags,
    layout: FrameLayout,
}

impl FunctionDescriptor {
    pub fn builder(name: &str, entry: EntryPoint, globals: Namespace) -> FunctionBuilder {
        FunctionBuilder::new(name, entry, globals)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_rc(&self) -> &Rc<str> {
        &self.name
    }

    pub fn entry(&self) -> EntryPoint {
        self.entry
    }

    pub fn globals(&self) -> &Namespace {
        &self.globals
    }

    /// Fast-local slot names in slot order
    pub fn var_names(&self) -> &[Name] {
        &self.var_names
    }

    /// Number of positional parameters
    pub fn argcount(&self) -> usize {
        self.argcount
    }

    pub fn kwonly_count(&self) -> usize {
        self.kwonly_count
    }

    /// Defaults for the trailing positional parameters
    pub fn defaults(&self) -> &[Value] {
        &self.defaults
    }

    pub fn kw_default(&self, name: &Name) -> Option<&Value> {
        self.kw_defaults
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    pub fn closure(&self) -> &[CellRef] {
        &self.closure
    }

    pub fn cell_vars(&self) -> &[Name] {
        &self.cell_vars
    }

    pub fn free_vars(&self) -> &[Name] {
        &self.free_vars
    }

    pub fn flags(&self) -> CodeFlags {
        self.flags
    }

    pub fn layout(&self) -> FrameLayout {
        self.layout
    }

    /// Slot holding the `*args` tuple
    pub fn varargs_slot(&self) -> Option<usize> {
        self.flags
            .varargs
            .then_some(self.argcount + self.kwonly_count)
    }

    /// Slot holding the `**kwargs` dict
    pub fn varkwargs_slot(&self) -> Option<usize> {
        self.flags
            .varkwargs
            .then_some(self.argcount + self.kwonly_count + usize::from(self.flags.varargs))
    }

    /// Slot of the parameter `name` may bind to by keyword.
    ///
    /// Interned names match by pointer; anything else by text.
    pub fn keyword_slot(&self, name: &Name) -> Option<usize> {
        let params = &self.var_names[..self.argcount + self.kwonly_count];
        params
            .iter()
            .position(|param| param.ptr_eq(name))
            .or_else(|| params.iter().position(|param| param == name))
    }
}

impl fmt::Debug for FunctionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDescriptor")
            .field("name", &self.name)
            .field("var_names", &self.var_names)
            .field("argcount", &self.argcount)
            .field("kwonly_count", &self.kwonly_count)
            .field("flags", &self.flags)
            .field("layout", &self.layout)
            .finish()
    }
}

/// Errors that can occur when building a callable
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("native function '{0}' has no implementation")]
    MissingImplementation(String),

    #[error("{function}() has {defaults} defaults for {params} positional parameters")]
    TooManyDefaults {
        function: String,
        defaults: usize,
        params: usize,
    },

    #[error("{function}() declares {expected} free variables but its closure has {got} cells")]
    ClosureMismatch {
        function: String,
        expected: usize,
        got: usize,
    },
}

/// Builder for [`FunctionDescriptor`]
///
/// Slots are laid out as positional parameters, keyword-only parameters,
/// `*args`, `**kwargs`, then remaining locals.
pub struct FunctionBuilder {
    name: String,
    entry: EntryPoint,
    globals: Namespace,
    positional: Vec<Name>,
    keyword_only: Vec<Name>,
    varargs: Option<Name>,
    varkwargs: Option<Name>,
    locals: Vec<Name>,
    defaults: Vec<Value>,
    kw_defaults: Vec<(Name, Value)>,
    closure: Vec<CellRef>,
    cell_vars: Vec<Name>,
    free_vars: Vec<Name>,
    generator: bool,
    stack_size: usize,
}

impl FunctionBuilder {
    pub fn new(name: &str, entry: EntryPoint, globals: Namespace) -> Self {
        Self {
            name: name.to_string(),
            entry,
            globals,
            positional: Vec::new(),
            keyword_only: Vec::new(),
            varargs: None,
            varkwargs: None,
            locals: Vec::new(),
            defaults: Vec::new(),
            kw_defaults: Vec::new(),
            closure: Vec::new(),
            cell_vars: Vec::new(),
            free_vars: Vec::new(),
            generator: false,
            stack_size: 0,
        }
    }

    pub fn positional<I, N>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<Name>,
    {
        self.positional = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn keyword_only<I, N>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<Name>,
    {
        self.keyword_only = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn varargs(mut self, name: impl Into<Name>) -> Self {
        self.varargs = Some(name.into());
        self
    }

    pub fn varkwargs(mut self, name: impl Into<Name>) -> Self {
        self.varkwargs = Some(name.into());
        self
    }

    /// Non-parameter fast locals
    pub fn locals<I, N>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<Name>,
    {
        self.locals = names.into_iter().map(Into::into).collect();
        self
    }

    /// Defaults for the last `values.len()` positional parameters
    pub fn defaults(mut self, values: Vec<Value>) -> Self {
        self.defaults = values;
        self
    }

    pub fn kw_default(mut self, name: impl Into<Name>, value: Value) -> Self {
        self.kw_defaults.push((name.into(), value));
        self
    }

    pub fn cell_vars<I, N>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<Name>,
    {
        self.cell_vars = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn free_vars<I, N>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<Name>,
    {
        self.free_vars = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn closure(mut self, cells: Vec<CellRef>) -> Self {
        self.closure = cells;
        self
    }

    pub fn generator(mut self) -> Self {
        self.generator = true;
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = size;
        self
    }

    pub fn build(self) -> Result<Rc<FunctionDescriptor>, BuildError> {
        if self.defaults.len() > self.positional.len() {
            return Err(BuildError::TooManyDefaults {
                function: self.name,
                defaults: self.defaults.len(),
                params: self.positional.len(),
            });
        }
        if self.closure.len() != self.free_vars.len() {
            return Err(BuildError::ClosureMismatch {
                function: self.name,
                expected: self.free_vars.len(),
                got: self.closure.len(),
            });
        }

        let flags = CodeFlags {
            varargs: self.varargs.is_some(),
            varkwargs: self.varkwargs.is_some(),
            generator: self.generator,
        };
        let argcount = self.positional.len();
        let kwonly_count = self.keyword_only.len();

        let mut var_names = self.positional;
        var_names.extend(self.keyword_only);
        var_names.extend(self.varargs);
        var_names.extend(self.varkwargs);
        var_names.extend(self.locals);

        // Generators need one slot for the value delivered by `send`
        let stack_size = if self.generator {
            self.stack_size.max(1)
        } else {
            self.stack_size
        };
        let layout = FrameLayout::new(
            stack_size,
            self.cell_vars.len() + self.free_vars.len(),
            var_names.len(),
        );

        Ok(Rc::new(FunctionDescriptor {
            name: Rc::from(self.name),
            entry: self.entry,
            globals: self.globals,
            var_names,
            argcount,
            kwonly_count,
            defaults: self.defaults,
            kw_defaults: self.kw_defaults,
            closure: self.closure,
            cell_vars: self.cell_vars,
            free_vars: self.free_vars,
            flags,
            layout,
        }))
    }
}

// ============================================================================
// Native functions
// ============================================================================

/// Host implementation of a native function
pub type NativeFn = Rc<dyn Fn(&mut Runtime, &[Value], &[(Name, Value)]) -> RuntimeResult<Value>>;

/// A function implemented by the host
pub struct NativeFunction {
    name: Rc<str>,
    arity: Option<usize>,
    accepts_keywords: bool,
    implementation: NativeFn,
}

impl NativeFunction {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> Option<usize> {
        self.arity
    }

    /// Validate the argument shape and run the implementation
    pub fn invoke(
        &self,
        rt: &mut Runtime,
        args: &[Value],
        kwargs: &[(Name, Value)],
    ) -> RuntimeResult<Value> {
        if !kwargs.is_empty() && !self.accepts_keywords {
            return Err(BindingError::NativeKeywords {
                function: self.name.to_string(),
            }
            .into());
        }
        if let Some(expected) = self.arity {
            if args.len() != expected {
                return Err(BindingError::NativeArity {
                    function: self.name.to_string(),
                    expected,
                    given: args.len(),
                }
                .into());
            }
        }
        (self.implementation)(rt, args, kwargs)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

/// Builder for constructing native functions with arity validation
///
/// Fixed-arity functions are checked before the implementation runs; variadic
/// functions validate their own arguments.
pub struct NativeFunctionBuilder {
    name: String,
    arity: Option<usize>,
    accepts_keywords: bool,
    implementation: Option<NativeFn>,
}

impl NativeFunctionBuilder {
    /// Create a new native function builder with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arity: None,
            accepts_keywords: false,
            implementation: None,
        }
    }

    /// Require exactly `arity` positional arguments
    pub fn with_arity(mut self, arity: usize) -> Self {
        self.arity = Some(arity);
        self
    }

    /// Accept any number of positional arguments
    pub fn variadic(mut self) -> Self {
        self.arity = None;
        self
    }

    /// Pass keyword arguments through instead of rejecting them
    pub fn with_keywords(mut self) -> Self {
        self.accepts_keywords = true;
        self
    }

    pub fn with_implementation<F>(mut self, implementation: F) -> Self
    where
        F: Fn(&mut Runtime, &[Value], &[(Name, Value)]) -> RuntimeResult<Value> + 'static,
    {
        self.implementation = Some(Rc::new(implementation));
        self
    }

    pub fn build(self) -> Result<Callable, BuildError> {
        let implementation = self
            .implementation
            .ok_or_else(|| BuildError::MissingImplementation(self.name.clone()))?;

        Ok(Callable::Native(Rc::new(NativeFunction {
            name: Rc::from(self.name),
            arity: self.arity,
            accepts_keywords: self.accepts_keywords,
            implementation,
        })))
    }
}

// ============================================================================
// Callable
// ============================================================================

/// A method bound to its receiver
#[derive(Debug)]
pub struct BoundMethod {
    receiver: Value,
    function: Callable,
}

impl BoundMethod {
    pub fn receiver(&self) -> &Value {
        &self.receiver
    }

    pub fn function(&self) -> &Callable {
        &self.function
    }
}

/// Anything a call site can invoke
#[derive(Debug, Clone)]
pub enum Callable {
    Function(Rc<FunctionDescriptor>),
    BoundMethod(Rc<BoundMethod>),
    Native(Rc<NativeFunction>),
}

impl Callable {
    /// Bind `function` to `receiver`
    pub fn bind(receiver: Value, function: Callable) -> Callable {
        Callable::BoundMethod(Rc::new(BoundMethod { receiver, function }))
    }

    pub fn name(&self) -> &str {
        match self {
            Callable::Function(f) => f.name(),
            Callable::BoundMethod(m) => m.function.name(),
            Callable::Native(n) => n.name(),
        }
    }

    pub fn ptr_eq(&self, other: &Callable) -> bool {
        match (self, other) {
            (Callable::Function(a), Callable::Function(b)) => Rc::ptr_eq(a, b),
            (Callable::BoundMethod(a), Callable::BoundMethod(b)) => Rc::ptr_eq(a, b),
            (Callable::Native(a), Callable::Native(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<Rc<FunctionDescriptor>> for Callable {
    fn from(function: Rc<FunctionDescriptor>) -> Self {
        Callable::Function(function)
    }
}

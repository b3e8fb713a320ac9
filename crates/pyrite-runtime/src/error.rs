//! Runtime error types
//!
//! Every fallible runtime helper returns [`RuntimeResult`]. The `Display` text of
//! each variant is the message the corresponding language-level exception
//! carries; [`RuntimeError::kind`] names that exception's class.

use crate::value::{ExceptionObject, Value};
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

/// Result type for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Language-level exception classes the runtime itself raises.
///
/// The hierarchy is fixed; user-defined exception classes belong to the
/// object runtime and are matched through [`ExceptionKind::is_subclass_of`]
/// on their nearest builtin base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionKind {
    BaseException,
    SystemExit,
    GeneratorExit,
    Exception,
    StopIteration,
    ArithmeticError,
    OverflowError,
    ZeroDivisionError,
    LookupError,
    IndexError,
    KeyError,
    AttributeError,
    NameError,
    UnboundLocalError,
    ImportError,
    TypeError,
    ValueError,
    RuntimeError,
    RecursionError,
    SystemError,
}

impl ExceptionKind {
    /// Every class, seeded into the builtins namespace
    pub const ALL: [ExceptionKind; 20] = [
        ExceptionKind::BaseException,
        ExceptionKind::SystemExit,
        ExceptionKind::GeneratorExit,
        ExceptionKind::Exception,
        ExceptionKind::StopIteration,
        ExceptionKind::ArithmeticError,
        ExceptionKind::OverflowError,
        ExceptionKind::ZeroDivisionError,
        ExceptionKind::LookupError,
        ExceptionKind::IndexError,
        ExceptionKind::KeyError,
        ExceptionKind::AttributeError,
        ExceptionKind::NameError,
        ExceptionKind::UnboundLocalError,
        ExceptionKind::ImportError,
        ExceptionKind::TypeError,
        ExceptionKind::ValueError,
        ExceptionKind::RuntimeError,
        ExceptionKind::RecursionError,
        ExceptionKind::SystemError,
    ];

    /// Class name as it appears in messages and tracebacks
    pub fn name(self) -> &'static str {
        match self {
            ExceptionKind::BaseException => "BaseException",
            ExceptionKind::SystemExit => "SystemExit",
            ExceptionKind::GeneratorExit => "GeneratorExit",
            ExceptionKind::Exception => "Exception",
            ExceptionKind::StopIteration => "StopIteration",
            ExceptionKind::ArithmeticError => "ArithmeticError",
            ExceptionKind::OverflowError => "OverflowError",
            ExceptionKind::ZeroDivisionError => "ZeroDivisionError",
            ExceptionKind::LookupError => "LookupError",
            ExceptionKind::IndexError => "IndexError",
            ExceptionKind::KeyError => "KeyError",
            ExceptionKind::AttributeError => "AttributeError",
            ExceptionKind::NameError => "NameError",
            ExceptionKind::UnboundLocalError => "UnboundLocalError",
            ExceptionKind::ImportError => "ImportError",
            ExceptionKind::TypeError => "TypeError",
            ExceptionKind::ValueError => "ValueError",
            ExceptionKind::RuntimeError => "RuntimeError",
            ExceptionKind::RecursionError => "RecursionError",
            ExceptionKind::SystemError => "SystemError",
        }
    }

    /// Direct base class, `None` for `BaseException`
    pub fn base(self) -> Option<ExceptionKind> {
        use ExceptionKind::*;
        match self {
            BaseException => None,
            SystemExit | GeneratorExit | Exception => Some(BaseException),
            StopIteration | ArithmeticError | LookupError | AttributeError | NameError
            | ImportError | TypeError | ValueError | RuntimeError | SystemError => Some(Exception),
            OverflowError | ZeroDivisionError => Some(ArithmeticError),
            IndexError | KeyError => Some(LookupError),
            UnboundLocalError => Some(NameError),
            RecursionError => Some(RuntimeError),
        }
    }

    /// Check whether `self` is `other` or derives from it
    pub fn is_subclass_of(self, other: ExceptionKind) -> bool {
        let mut current = Some(self);
        while let Some(kind) = current {
            if kind == other {
                return true;
            }
            current = kind.base();
        }
        false
    }
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which kind of parameter a missing-argument report is about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingKind {
    Positional,
    KeywordOnly,
    /// Both positional and keyword-only parameters are missing
    Mixed,
}

/// Argument binding failures
///
/// All of these surface as `TypeError` in the running program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    #[error(
        "{function}() takes {} but {} given",
        takes_phrase(.min_positional, .max_positional, .has_defaults),
        given_phrase(.given, .kwonly_given)
    )]
    TooManyPositional {
        function: String,
        min_positional: usize,
        max_positional: usize,
        has_defaults: bool,
        given: usize,
        kwonly_given: usize,
    },

    #[error(
        "{function}() missing {} required {}argument{}: {}",
        .names.len(),
        missing_kind_word(.kind),
        plural(.names.len()),
        join_names(.names)
    )]
    Missing {
        function: String,
        kind: MissingKind,
        names: Vec<String>,
    },

    #[error("{function}() got an unexpected keyword argument '{name}'")]
    UnexpectedKeyword { function: String, name: String },

    #[error("{function}() got multiple values for argument '{name}'")]
    MultipleValues { function: String, name: String },

    #[error("{function}() got multiple values for keyword argument '{name}'")]
    DuplicateKeyword { function: String, name: String },

    #[error("{function}() argument after * must be an iterable, not {type_name}")]
    ArgsNotIterable { function: String, type_name: String },

    #[error("{function}() argument after ** must be a mapping, not {type_name}")]
    KwargsNotMapping { function: String, type_name: String },

    #[error("{function}() takes exactly {expected} argument{} ({given} given)", plural_of(.expected))]
    NativeArity {
        function: String,
        expected: usize,
        given: usize,
    },

    #[error("{function}() takes no keyword arguments")]
    NativeKeywords { function: String },
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

fn plural_of(count: &usize) -> &'static str {
    plural(*count)
}

fn takes_phrase(min: &usize, max: &usize, has_defaults: &bool) -> String {
    if *has_defaults {
        format!("from {} to {} positional arguments", min, max)
    } else {
        format!("exactly {} positional argument{}", max, plural(*max))
    }
}

fn given_phrase(given: &usize, kwonly_given: &usize) -> String {
    if *kwonly_given == 0 {
        let verb = if *given == 1 { "was" } else { "were" };
        return format!("{} {}", given, verb);
    }
    format!(
        "{} positional argument{} (and {} keyword-only argument{}) were",
        given,
        plural(*given),
        kwonly_given,
        plural(*kwonly_given)
    )
}

fn missing_kind_word(kind: &MissingKind) -> &'static str {
    match kind {
        MissingKind::Positional => "positional ",
        MissingKind::KeywordOnly => "keyword-only ",
        MissingKind::Mixed => "",
    }
}

/// Join quoted names with English conjunction rules:
/// `'a'`, `'a' and 'b'`, `'a', 'b', and 'c'`
pub fn join_names(names: &[String]) -> String {
    let quoted: Vec<String> = names.iter().map(|n| format!("'{}'", n)).collect();
    match quoted.len() {
        0 => String::new(),
        1 => quoted[0].clone(),
        2 => format!("{} and {}", quoted[0], quoted[1]),
        n => format!("{}, and {}", quoted[..n - 1].join(", "), quoted[n - 1]),
    }
}

/// Violations of the execution model itself
///
/// These indicate a defect in translated code or in the embedding program,
/// never a condition user code can handle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("cell {index} of {function} should not be empty")]
    EmptyFreeVariable { function: String, index: usize },

    #[error("generator '{name}' already executing")]
    GeneratorRunning { name: String },

    #[error("generator '{name}' resumed after its frame was released")]
    ResumedPastExhaustion { name: String },

    #[error("'{name}' suspended outside a generator")]
    UnexpectedSuspend { name: String },

    #[error("value stack overflow in '{frame}' (capacity {capacity})")]
    StackOverflow { frame: String, capacity: usize },

    #[error("value stack underflow in '{frame}'")]
    StackUnderflow { frame: String },

    #[error("block stack overflow in '{frame}'")]
    BlockOverflow { frame: String },

    #[error("block stack underflow in '{frame}'")]
    BlockUnderflow { frame: String },

    #[error("slot {index} out of range in '{frame}'")]
    SlotOutOfRange { frame: String, index: usize },
}

/// Runtime errors
#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error("name '{name}' is not defined")]
    UndefinedName { name: String },

    #[error("local variable '{name}' referenced before assignment")]
    UnboundLocal { name: String },

    #[error("free variable '{name}' referenced before assignment in enclosing scope")]
    UnboundCell { name: String },

    #[error("unknown module {0}")]
    UnknownModule(String),

    #[error("cannot import name {name}")]
    CannotImportName { name: String },

    #[error("from-import-* object has no __dict__ and no __all__")]
    StarImportUnsupported,

    #[error("'{type_name}' object has no attribute '{name}'")]
    AttributeNotFound { type_name: String, name: String },

    #[error("{key}")]
    KeyNotFound { key: String },

    #[error("{0}")]
    IndexOutOfRange(String),

    #[error("{0}")]
    TypeError(String),

    #[error("{0}")]
    ValueError(String),

    #[error("{0}")]
    ZeroDivision(String),

    #[error("{0}")]
    Overflow(String),

    #[error("maximum recursion depth exceeded")]
    RecursionLimit,

    #[error("{0}")]
    SystemError(String),

    /// Raised as the language's `RuntimeError`
    #[error("{0}")]
    Runtime(String),

    #[error("{}", stop_message(.value))]
    StopIteration { value: Value },

    /// An exception object raised by user code
    #[error("{}", raised_message(.0))]
    Raised(Value),

    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

fn stop_message(value: &Value) -> String {
    if value.is_none() {
        String::new()
    } else {
        value.to_string()
    }
}

fn raised_message(value: &Value) -> String {
    match value {
        Value::Exception(exc) => exc.message(),
        other => other.to_string(),
    }
}

impl RuntimeError {
    /// Fatal errors abort the current operation and are never caught by
    /// exception handlers or recorded in the traceback.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RuntimeError::Invariant(_))
    }

    /// The language-level exception class this error is raised as
    pub fn kind(&self) -> ExceptionKind {
        match self {
            RuntimeError::Binding(_) => ExceptionKind::TypeError,
            RuntimeError::UndefinedName { .. } => ExceptionKind::NameError,
            RuntimeError::UnboundLocal { .. } | RuntimeError::UnboundCell { .. } => {
                ExceptionKind::UnboundLocalError
            }
            RuntimeError::UnknownModule(_)
            | RuntimeError::CannotImportName { .. }
            | RuntimeError::StarImportUnsupported => ExceptionKind::ImportError,
            RuntimeError::AttributeNotFound { .. } => ExceptionKind::AttributeError,
            RuntimeError::KeyNotFound { .. } => ExceptionKind::KeyError,
            RuntimeError::IndexOutOfRange(_) => ExceptionKind::IndexError,
            RuntimeError::TypeError(_) => ExceptionKind::TypeError,
            RuntimeError::ValueError(_) => ExceptionKind::ValueError,
            RuntimeError::ZeroDivision(_) => ExceptionKind::ZeroDivisionError,
            RuntimeError::Overflow(_) => ExceptionKind::OverflowError,
            RuntimeError::RecursionLimit => ExceptionKind::RecursionError,
            RuntimeError::SystemError(_) | RuntimeError::Invariant(_) => {
                ExceptionKind::SystemError
            }
            RuntimeError::Runtime(_) => ExceptionKind::RuntimeError,
            RuntimeError::StopIteration { .. } => ExceptionKind::StopIteration,
            RuntimeError::Raised(value) => match value {
                Value::Exception(exc) => exc.kind(),
                _ => ExceptionKind::TypeError,
            },
        }
    }

    /// Materialize the error as an exception object for handlers.
    pub fn to_exception(&self) -> Value {
        match self {
            RuntimeError::Raised(value) => value.clone(),
            RuntimeError::StopIteration { value } => Value::Exception(Rc::new(
                ExceptionObject::new(ExceptionKind::StopIteration, vec![value.clone()]),
            )),
            other => Value::Exception(Rc::new(ExceptionObject::new(
                other.kind(),
                vec![Value::from(other.to_string().as_str())],
            ))),
        }
    }
}

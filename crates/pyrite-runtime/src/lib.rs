//! Pyrite Runtime - execution support for ahead-of-time compiled function bodies
//!
//! Translated bodies are plain Rust functions with the signature
//! [`EntryPoint`]. This library supplies everything such a body relies on:
//! - Frame storage, recycled through an arena
//! - Argument binding for calls (positional, keyword, `*args`, `**kwargs`, closures)
//! - Generator suspension and resumption
//! - Error provenance and traceback formatting
//! - Lazy, memoized module initialization
//! - Name resolution and operator dispatch with inline fast paths

/// Pyrite runtime version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod binding;
pub mod callable;
pub mod error;
pub mod frame;
pub mod generator;
pub mod module;
pub mod names;
pub mod object;
pub mod ops;
pub mod runtime;
pub mod traceback;
pub mod value;

pub use binding::{bind_and_invoke, call, call_with_unpacked};
pub use callable::{
    BuildError, Callable, CodeFlags, Completion, EntryPoint, FunctionBuilder, FunctionDescriptor,
    NativeFunction, NativeFunctionBuilder,
};
pub use error::{BindingError, ExceptionKind, InvariantViolation, RuntimeError, RuntimeResult};
pub use frame::{ArenaStats, Block, BlockKind, Frame, FrameArena, FrameLayout, Position};
pub use generator::{Generator, GeneratorState};
pub use module::{ModuleDescriptor, ModuleId, ModuleKind, ModuleTable};
pub use object::{BinaryOp, CompareOp, ObjectRuntime, StandardObjects, UnaryOp};
pub use runtime::{Runtime, MAIN_MODULE};
pub use traceback::{Traceback, TracebackRecord};
pub use value::{CellRef, Name, Namespace, Object, ObjectRef, Scope, Value};

//! The runtime context
//!
//! [`Runtime`] owns every piece of process-wide mutable state: the frame
//! arena, the traceback, module caches, the builtins namespace and the call
//! chain cursor. It is `!Send`; one runtime serves one thread.

use crate::callable::{Completion, EntryPoint};
use crate::error::{ExceptionKind, RuntimeError, RuntimeResult};
use crate::frame::{Frame, FrameArena, FrameLink};
use crate::module::{self, ModuleDescriptor, ModuleId, ModuleTable};
use crate::object::{ObjectRuntime, StandardObjects};
use crate::traceback::Traceback;
use crate::value::{Name, Namespace, Value};
use pyrite_config::{ConfigLoader, ConfigResult, RuntimeConfig};
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::io::Write;
use std::path::Path;
use std::rc::Rc;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Identity of the program's entry module
pub const MAIN_MODULE: ModuleId = 0;

pub struct Runtime {
    config: RuntimeConfig,
    arena: FrameArena,
    traceback: Traceback,
    modules: ModuleTable,
    builtins: Namespace,
    objects: Rc<dyn ObjectRuntime>,
    interned: RefCell<FxHashMap<Rc<str>, Name>>,
    current: Option<FrameLink>,
    /// Exceptions being handled by active `except` blocks, innermost last
    handled: Vec<Value>,
    error_output: Box<dyn Write>,
}

impl Runtime {
    /// Create a runtime with default configuration
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self::with_objects(config, Rc::new(StandardObjects::new()))
    }

    /// Create a runtime backed by a custom object protocol
    pub fn with_objects(config: RuntimeConfig, objects: Rc<dyn ObjectRuntime>) -> Self {
        let builtins = Namespace::new();
        for kind in ExceptionKind::ALL {
            builtins.insert(Name::new(kind.name()), Value::ExceptionType(kind));
        }

        Self {
            arena: FrameArena::new(config.arena.batch_size),
            traceback: Traceback::new(config.traceback.limit),
            modules: ModuleTable::new(),
            builtins,
            objects,
            interned: RefCell::new(FxHashMap::default()),
            current: None,
            handled: Vec::new(),
            error_output: Box::new(std::io::stderr()),
            config,
        }
    }

    /// Create a runtime configured from the nearest `pyrite.toml` above `dir`
    pub fn from_directory(dir: &Path) -> ConfigResult<Self> {
        let config = ConfigLoader::new().load_from_directory(dir)?;
        Ok(Self::with_config(config.runtime))
    }

    /// Install a `tracing` subscriber using the configured filter.
    ///
    /// Does nothing if a global subscriber is already installed.
    pub fn init_logging(&self) {
        let filter = EnvFilter::try_new(&self.config.logging.filter)
            .unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn arena(&self) -> &FrameArena {
        &self.arena
    }

    pub fn traceback(&self) -> &Traceback {
        &self.traceback
    }

    pub fn traceback_mut(&mut self) -> &mut Traceback {
        &mut self.traceback
    }

    pub fn builtins(&self) -> &Namespace {
        &self.builtins
    }

    pub fn objects(&self) -> &dyn ObjectRuntime {
        &*self.objects
    }

    pub fn modules(&self) -> &ModuleTable {
        &self.modules
    }

    /// Return the canonical [`Name`] for `text`.
    ///
    /// Interned names compare by pointer during keyword binding.
    pub fn intern(&self, text: &str) -> Name {
        if let Some(name) = self.interned.borrow().get(text) {
            return name.clone();
        }
        let name = Name::new(text);
        self.interned
            .borrow_mut()
            .insert(name.as_rc().clone(), name.clone());
        name
    }

    pub fn register_module(&mut self, descriptor: ModuleDescriptor) {
        self.modules.register(descriptor);
    }

    pub fn import(&mut self, id: ModuleId) -> RuntimeResult<Value> {
        module::import(self, id)
    }

    /// The innermost frame currently executing
    pub fn current_frame(&self) -> Option<FrameLink> {
        self.current
    }

    /// Run `entry` with `frame` on top of the call chain.
    ///
    /// Non-fatal errors leaving the body are recorded in the traceback at the
    /// frame's depth.
    pub(crate) fn execute(
        &mut self,
        entry: EntryPoint,
        frame: &mut Frame,
    ) -> RuntimeResult<Completion> {
        frame.attach(self.current);
        if frame.depth() >= self.config.arena.max_depth {
            return Err(RuntimeError::RecursionLimit);
        }

        let caller = self.current.replace(frame.link());
        let result = entry(self, frame);
        self.current = caller;

        if let Err(err) = &result {
            if !err.is_fatal() && self.config.traceback.enabled {
                self.traceback.record(frame);
            }
        }
        result
    }

    // === Exception state ===

    /// Enter an `except` block for `err`, returning the exception object
    pub fn begin_handling(&mut self, err: &RuntimeError) -> Value {
        let exception = err.to_exception();
        self.handled.push(exception.clone());
        exception
    }

    /// Leave the innermost `except` block
    pub fn end_handling(&mut self) -> Option<Value> {
        self.handled.pop()
    }

    /// The exception a bare `raise` re-raises
    pub fn handled_exception(&self) -> Option<&Value> {
        self.handled.last()
    }

    /// Forget the recorded provenance of the last error
    pub fn clear_error(&mut self) {
        self.traceback.clear();
    }

    /// Redirect uncaught-error reports (stderr by default)
    pub fn set_error_output(&mut self, output: Box<dyn Write>) {
        self.error_output = output;
    }

    /// Import the entry module, reporting an uncaught error with its traceback
    pub fn run_main(&mut self) -> RuntimeResult<Value> {
        let err = match module::import(self, MAIN_MODULE) {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if err.is_fatal() {
            error!(error = %err, "runtime invariant violated");
        } else if !err.kind().is_subclass_of(ExceptionKind::SystemExit) {
            self.report_uncaught(&err);
        }
        Err(err)
    }

    fn report_uncaught(&mut self, err: &RuntimeError) {
        let mut report = String::from("Traceback (most recent call last):\n");
        for line in self.traceback.format() {
            report.push_str(&line);
            report.push('\n');
        }
        let message = err.to_string();
        if message.is_empty() {
            report.push_str(err.kind().name());
        } else {
            report.push_str(&format!("{}: {}", err.kind(), message));
        }
        report.push('\n');

        error!(kind = %err.kind(), "uncaught error\n{}", report);
        let written = self
            .error_output
            .write_all(report.as_bytes())
            .and_then(|()| self.error_output.flush());
        if let Err(io_err) = written {
            error!(error = %io_err, "failed to write traceback");
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("arena", &self.arena)
            .field("current", &self.current)
            .field("traceback", &self.traceback.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_intern_shares_allocation() {
        let rt = Runtime::new();
        let a = rt.intern("spam");
        let b = rt.intern("spam");
        assert!(a.ptr_eq(&b));
    }

    #[test]
    fn test_builtins_hold_exception_classes() {
        let rt = Runtime::new();
        assert_eq!(
            rt.builtins().get(&Name::new("ValueError")),
            Some(Value::ExceptionType(ExceptionKind::ValueError))
        );
    }

    #[test]
    fn test_handling_stack() {
        let mut rt = Runtime::new();
        assert!(rt.handled_exception().is_none());
        let exc = rt.begin_handling(&RuntimeError::ValueError("bad".to_string()));
        assert_eq!(rt.handled_exception(), Some(&exc));
        rt.end_handling();
        assert!(rt.handled_exception().is_none());
    }
}

//! Module import graph
//!
//! Modules are described by a static table of [`ModuleDescriptor`]s keyed by a
//! small integer id. Each descriptor carries a write-once cache; the first
//! import fills it and every later import reads it.
//!
//! The cache is filled with the module object *before* its body runs, so a
//! cyclic import sees the partially initialized module instead of recursing.
//! A body that fails leaves the partial module cached.

use crate::callable::{Completion, EntryPoint};
use crate::error::{InvariantViolation, RuntimeError, RuntimeResult};
use crate::frame::{Frame, FrameLayout};
use crate::ops;
use crate::runtime::Runtime;
use crate::value::{ModuleObject, Name, Namespace, Scope, Value};
use rustc_hash::FxHashMap;
use std::cell::OnceCell;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, instrument};

/// Stable module identity; `0` is the program entry module
pub type ModuleId = u32;

/// How a module is initialized
#[derive(Clone, Copy)]
pub enum ModuleKind {
    /// Provided by the object runtime
    Builtin,
    /// Initialized by running a translated body
    Defined(EntryPoint),
}

impl fmt::Debug for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleKind::Builtin => f.write_str("Builtin"),
            ModuleKind::Defined(_) => f.write_str("Defined"),
        }
    }
}

/// Static description of one module
#[derive(Debug)]
pub struct ModuleDescriptor {
    id: ModuleId,
    name: Rc<str>,
    kind: ModuleKind,
    parent: Option<ModuleId>,
    layout: FrameLayout,
    cache: OnceCell<Value>,
}

impl ModuleDescriptor {
    pub fn builtin(id: ModuleId, name: &str) -> Self {
        Self {
            id,
            name: Rc::from(name),
            kind: ModuleKind::Builtin,
            parent: None,
            layout: FrameLayout::default(),
            cache: OnceCell::new(),
        }
    }

    pub fn defined(id: ModuleId, name: &str, entry: EntryPoint, layout: FrameLayout) -> Self {
        Self {
            id,
            name: Rc::from(name),
            kind: ModuleKind::Defined(entry),
            parent: None,
            layout,
            cache: OnceCell::new(),
        }
    }

    /// Import `parent` before this module
    pub fn with_parent(mut self, parent: ModuleId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn id(&self) -> ModuleId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ModuleKind {
        self.kind
    }

    pub fn parent(&self) -> Option<ModuleId> {
        self.parent
    }

    pub fn layout(&self) -> FrameLayout {
        self.layout
    }

    pub fn is_initialized(&self) -> bool {
        self.cache.get().is_some()
    }

    pub fn cached(&self) -> Option<Value> {
        self.cache.get().cloned()
    }

    /// Fill the cache, keeping the first value if it is already set
    fn populate(&self, value: Value) -> Value {
        self.cache.get_or_init(|| value).clone()
    }
}

/// Process-wide module table
#[derive(Debug, Default)]
pub struct ModuleTable {
    modules: FxHashMap<ModuleId, Rc<ModuleDescriptor>>,
}

impl ModuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: ModuleDescriptor) {
        self.modules.insert(descriptor.id, Rc::new(descriptor));
    }

    pub fn get(&self, id: ModuleId) -> Option<Rc<ModuleDescriptor>> {
        self.modules.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

// ============================================================================
// Import operations
// ============================================================================

/// Import module `id`, initializing it and its parents on first use
#[instrument(level = "debug", skip(rt))]
pub fn import(rt: &mut Runtime, id: ModuleId) -> RuntimeResult<Value> {
    let descriptor = rt
        .modules()
        .get(id)
        .ok_or_else(|| RuntimeError::UnknownModule(id.to_string()))?;
    if let Some(module) = descriptor.cached() {
        return Ok(module);
    }

    if let Some(parent) = descriptor.parent() {
        import(rt, parent)?;
        // The parent's body may have imported this module already
        if let Some(module) = descriptor.cached() {
            return Ok(module);
        }
    }

    debug!(module = descriptor.name(), "initializing module");
    match descriptor.kind() {
        ModuleKind::Builtin => {
            let module = rt
                .objects()
                .import_builtin(descriptor.name())
                .ok_or_else(|| RuntimeError::UnknownModule(descriptor.name().to_string()))?;
            Ok(descriptor.populate(module))
        }
        ModuleKind::Defined(entry) => run_module_body(rt, &descriptor, entry),
    }
}

fn run_module_body(
    rt: &mut Runtime,
    descriptor: &ModuleDescriptor,
    entry: EntryPoint,
) -> RuntimeResult<Value> {
    let namespace = Namespace::new();
    let module = descriptor.populate(Value::Module(Rc::new(ModuleObject::new(
        descriptor.name.clone(),
        namespace.clone(),
    ))));

    let name = Value::Str(descriptor.name.clone());
    namespace.insert(rt.intern("__name__"), name.clone());
    namespace.insert(rt.intern("__file__"), name);
    namespace.insert(rt.intern("__builtins__"), Value::Dict(rt.builtins().clone()));

    let mut frame = rt.arena().acquire(
        descriptor.name.clone(),
        namespace.clone(),
        Some(Scope::Dict(namespace)),
        rt.builtins().clone(),
        descriptor.layout(),
    );
    let result = rt.execute(entry, &mut frame);
    rt.arena().release(frame);

    match result? {
        Completion::Return(_) => Ok(module),
        Completion::Yield(_) => Err(InvariantViolation::UnexpectedSuspend {
            name: descriptor.name().to_string(),
        }
        .into()),
    }
}

/// `from module import name`
pub fn import_from(rt: &mut Runtime, module: &Value, name: &Name) -> RuntimeResult<Value> {
    rt.objects()
        .get_attr(module, name)
        .map_err(|err| match err {
            RuntimeError::AttributeNotFound { .. } => RuntimeError::CannotImportName {
                name: name.to_string(),
            },
            other => other,
        })
}

/// `from package import name`, where `name` may be submodule `id`
pub fn import_from_or_module(
    rt: &mut Runtime,
    module: &Value,
    name: &Name,
    id: ModuleId,
) -> RuntimeResult<Value> {
    match rt.objects().get_attr(module, name) {
        Ok(value) => Ok(value),
        Err(RuntimeError::AttributeNotFound { .. }) => import(rt, id),
        Err(err) => Err(err),
    }
}

/// `from module import *` into the frame's local scope.
///
/// Bindings made before a failure are kept.
pub fn import_star(rt: &mut Runtime, frame: &Frame, module: &Value) -> RuntimeResult<()> {
    let locals = frame.locals().cloned().ok_or_else(|| {
        RuntimeError::SystemError("no locals found during 'import *'".to_string())
    })?;

    let all = rt.intern("__all__");
    let names: Vec<Name> = match rt.objects().get_attr(module, &all) {
        Ok(exported) => exported_names(rt, module, &exported)?,
        Err(RuntimeError::AttributeNotFound { .. }) => match rt.objects().namespace_of(module) {
            Some(namespace) => namespace
                .keys()
                .into_iter()
                .filter(|name| !name.is_private())
                .collect(),
            None => return Err(RuntimeError::StarImportUnsupported),
        },
        Err(err) => return Err(err),
    };

    for name in names {
        let value = rt.objects().get_attr(module, &name)?;
        match &locals {
            Scope::Dict(namespace) => {
                namespace.insert(name, value);
            }
            Scope::Mapping(mapping) => mapping.set_item(&Value::Str(name.as_rc().clone()), value)?,
        }
    }
    Ok(())
}

fn exported_names(rt: &mut Runtime, module: &Value, exported: &Value) -> RuntimeResult<Vec<Name>> {
    let iterator = ops::get_iter(rt, exported)?;
    let mut names = Vec::new();
    while let Some(item) = ops::for_iter(rt, &iterator)? {
        match item {
            Value::Str(text) => names.push(Name::from_rc(text)),
            other => {
                let owner = match module {
                    Value::Module(m) => m.name().to_string(),
                    other => other.type_name().to_string(),
                };
                return Err(RuntimeError::TypeError(format!(
                    "Item in {}.__all__ must be str, not {}",
                    owner,
                    other.type_name()
                )));
            }
        }
    }
    Ok(names)
}

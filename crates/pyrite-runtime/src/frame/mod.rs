//! Activation records for translated function and module bodies
//!
//! A translated body receives a fully bound [`Frame`] and uses it for its
//! value stack, fast locals, closure cells and try-block stack. Frames come
//! from a [`FrameArena`] and go back to it when the call (or generator) that
//! owns them finishes.
//!
//! ## Layout
//!
//! ```text
//! fast locals: [positional params][kw-only params][*args][**kwargs][other locals]
//! cells:       [cell vars][free vars]
//! ```
//!
//! The position marker is how generator bodies resume: a body yields after
//! storing a resume label with [`Frame::resume_at`], and on re-entry dispatches
//! on [`Frame::position`].

mod arena;

pub use arena::{ArenaStats, FrameArena};

use crate::error::{InvariantViolation, RuntimeResult};
use crate::value::{CellRef, Namespace, Scope, Value};
use std::rc::Rc;

/// Maximum nesting of try/loop blocks within one frame
pub const MAX_BLOCKS: usize = 20;

/// Unique identity of one frame activation
pub type FrameId = u64;

/// Capacities a frame needs to run a particular body
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameLayout {
    /// Maximum value stack depth
    pub stack_size: usize,
    /// Cell variables plus free variables
    pub num_cells: usize,
    /// Fast-local slots
    pub num_fast: usize,
}

impl FrameLayout {
    pub const fn new(stack_size: usize, num_cells: usize, num_fast: usize) -> Self {
        Self {
            stack_size,
            num_cells,
            num_fast,
        }
    }
}

/// Last executed position of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// Never executed
    Start,
    /// Suspended at (or last executed) the given label
    At(u32),
    /// Returned, or being closed
    Terminal,
}

impl Position {
    /// Numeric form used in traceback lines
    pub fn as_instr(self) -> i64 {
        match self {
            Position::Start => -1,
            Position::At(label) => i64::from(label),
            Position::Terminal => -2,
        }
    }
}

/// Where inside a body the current error was raised
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionOrigin {
    pub instr: i64,
    pub line: i64,
}

impl ExceptionOrigin {
    pub const UNKNOWN: ExceptionOrigin = ExceptionOrigin { instr: -1, line: -1 };
}

impl Default for ExceptionOrigin {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

/// Non-owning reference to a frame on the call chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLink {
    pub id: FrameId,
    pub depth: usize,
}

/// Kind of an entry on the try-block stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Loop,
    Except,
    Finally,
    ExceptHandler,
}

/// A try-block stack entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,
    /// Label to jump to when the block unwinds
    pub handler: u32,
    /// Value stack depth when the block was set up
    pub level: usize,
}

/// One activation record
pub struct Frame {
    id: FrameId,
    name: Rc<str>,
    globals: Option<Namespace>,
    locals: Option<Scope>,
    builtins: Option<Namespace>,
    stack: Vec<Value>,
    stack_capacity: usize,
    fast_locals: Vec<Option<Value>>,
    cells: Vec<Option<CellRef>>,
    blocks: Vec<Block>,
    position: Position,
    origin: ExceptionOrigin,
    back: Option<FrameLink>,
    depth: usize,
}

impl Frame {
    pub(crate) fn blank() -> Self {
        Self {
            id: 0,
            name: Rc::from(""),
            globals: None,
            locals: None,
            builtins: None,
            stack: Vec::new(),
            stack_capacity: 0,
            fast_locals: Vec::new(),
            cells: Vec::new(),
            blocks: Vec::new(),
            position: Position::Start,
            origin: ExceptionOrigin::UNKNOWN,
            back: None,
            depth: 0,
        }
    }

    /// Fill a blank frame for a new activation
    pub(crate) fn prepare(
        &mut self,
        id: FrameId,
        name: Rc<str>,
        globals: Namespace,
        locals: Option<Scope>,
        builtins: Namespace,
        layout: FrameLayout,
    ) {
        self.id = id;
        self.name = name;
        self.globals = Some(globals);
        self.locals = locals;
        self.builtins = Some(builtins);
        self.stack.reserve(layout.stack_size);
        self.stack_capacity = layout.stack_size;
        self.fast_locals.resize(layout.num_fast, None);
        self.cells.resize(layout.num_cells, None);
    }

    /// Drop every reference the frame owns, keeping allocated capacity
    pub(crate) fn reset(&mut self) {
        self.id = 0;
        self.name = Rc::from("");
        self.globals = None;
        self.locals = None;
        self.builtins = None;
        self.stack.clear();
        self.stack_capacity = 0;
        self.fast_locals.clear();
        self.cells.clear();
        self.blocks.clear();
        self.position = Position::Start;
        self.origin = ExceptionOrigin::UNKNOWN;
        self.back = None;
        self.depth = 0;
    }

    pub fn id(&self) -> FrameId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_rc(&self) -> &Rc<str> {
        &self.name
    }

    pub fn globals(&self) -> Option<&Namespace> {
        self.globals.as_ref()
    }

    pub fn locals(&self) -> Option<&Scope> {
        self.locals.as_ref()
    }

    pub fn set_locals(&mut self, locals: Option<Scope>) {
        self.locals = locals;
    }

    pub fn builtins(&self) -> Option<&Namespace> {
        self.builtins.as_ref()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The caller's frame, if this frame is on the call chain
    pub fn back(&self) -> Option<FrameLink> {
        self.back
    }

    pub fn link(&self) -> FrameLink {
        FrameLink {
            id: self.id,
            depth: self.depth,
        }
    }

    pub(crate) fn attach(&mut self, back: Option<FrameLink>) {
        self.back = back;
        self.depth = back.map_or(0, |link| link.depth + 1);
    }

    pub(crate) fn detach(&mut self) {
        self.back = None;
    }

    // === Value stack ===

    pub fn push(&mut self, value: Value) -> RuntimeResult<()> {
        if self.stack.len() >= self.stack_capacity {
            return Err(InvariantViolation::StackOverflow {
                frame: self.name.to_string(),
                capacity: self.stack_capacity,
            }
            .into());
        }
        self.stack.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> RuntimeResult<Value> {
        self.stack.pop().ok_or_else(|| {
            InvariantViolation::StackUnderflow {
                frame: self.name.to_string(),
            }
            .into()
        })
    }

    pub fn top(&self) -> Option<&Value> {
        self.stack.last()
    }

    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    pub fn stack_capacity(&self) -> usize {
        self.stack_capacity
    }

    // === Fast locals ===

    pub fn fast_local(&self, index: usize) -> Option<&Value> {
        self.fast_locals.get(index).and_then(Option::as_ref)
    }

    pub fn set_fast_local(&mut self, index: usize, value: Value) -> RuntimeResult<()> {
        let slot = self.fast_slot(index)?;
        *slot = Some(value);
        Ok(())
    }

    pub fn take_fast_local(&mut self, index: usize) -> RuntimeResult<Option<Value>> {
        Ok(self.fast_slot(index)?.take())
    }

    pub fn fast_locals(&self) -> &[Option<Value>] {
        &self.fast_locals
    }

    fn fast_slot(&mut self, index: usize) -> RuntimeResult<&mut Option<Value>> {
        let frame = &self.name;
        self.fast_locals.get_mut(index).ok_or_else(|| {
            InvariantViolation::SlotOutOfRange {
                frame: frame.to_string(),
                index,
            }
            .into()
        })
    }

    // === Cells ===

    pub fn cell(&self, index: usize) -> RuntimeResult<&CellRef> {
        self.cells
            .get(index)
            .and_then(Option::as_ref)
            .ok_or_else(|| {
                InvariantViolation::SlotOutOfRange {
                    frame: self.name.to_string(),
                    index,
                }
                .into()
            })
    }

    pub fn set_cell(&mut self, index: usize, cell: CellRef) -> RuntimeResult<()> {
        match self.cells.get_mut(index) {
            Some(slot) => {
                *slot = Some(cell);
                Ok(())
            }
            None => Err(InvariantViolation::SlotOutOfRange {
                frame: self.name.to_string(),
                index,
            }
            .into()),
        }
    }

    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    // === Position and error origin ===

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    /// Record the label a generator body resumes at after yielding
    pub fn resume_at(&mut self, label: u32) {
        self.position = Position::At(label);
    }

    /// Record where the error about to be returned was raised
    pub fn mark_error(&mut self, instr: u32, line: u32) {
        self.origin = ExceptionOrigin {
            instr: i64::from(instr),
            line: i64::from(line),
        };
    }

    pub fn exception_origin(&self) -> ExceptionOrigin {
        self.origin
    }

    // === Block stack ===

    pub fn setup_block(&mut self, kind: BlockKind, handler: u32) -> RuntimeResult<()> {
        if self.blocks.len() >= MAX_BLOCKS {
            return Err(InvariantViolation::BlockOverflow {
                frame: self.name.to_string(),
            }
            .into());
        }
        self.blocks.push(Block {
            kind,
            handler,
            level: self.stack.len(),
        });
        Ok(())
    }

    pub fn pop_block(&mut self) -> RuntimeResult<Block> {
        self.blocks.pop().ok_or_else(|| {
            InvariantViolation::BlockUnderflow {
                frame: self.name.to_string(),
            }
            .into()
        })
    }

    /// Discard stack values pushed since `block` was set up
    pub fn unwind_block(&mut self, block: &Block) {
        self.stack.truncate(block.level);
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Number of runtime values the frame currently keeps alive
    pub fn owned_reference_count(&self) -> usize {
        usize::from(self.globals.is_some())
            + usize::from(self.locals.is_some())
            + usize::from(self.builtins.is_some())
            + self.stack.len()
            + self.fast_locals.iter().filter(|v| v.is_some()).count()
            + self.cells.iter().filter(|c| c.is_some()).count()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("depth", &self.depth)
            .field("position", &self.position)
            .field("stack", &self.stack)
            .field("fast_locals", &self.fast_locals)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuntimeError;
    use pretty_assertions::assert_eq;

    fn frame_with(layout: FrameLayout) -> Frame {
        let mut frame = Frame::blank();
        frame.prepare(
            1,
            Rc::from("f"),
            Namespace::new(),
            None,
            Namespace::new(),
            layout,
        );
        frame
    }

    #[test]
    fn test_stack_respects_capacity() {
        let mut frame = frame_with(FrameLayout::new(1, 0, 0));
        frame.push(Value::Int(1)).unwrap();
        let err = frame.push(Value::Int(2)).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Invariant(InvariantViolation::StackOverflow { capacity: 1, .. })
        ));
        assert_eq!(frame.pop().unwrap(), Value::Int(1));
        assert!(frame.pop().unwrap_err().is_fatal());
    }

    #[test]
    fn test_block_unwind_truncates_stack() {
        let mut frame = frame_with(FrameLayout::new(4, 0, 0));
        frame.push(Value::Int(1)).unwrap();
        frame.setup_block(BlockKind::Except, 12).unwrap();
        frame.push(Value::Int(2)).unwrap();
        frame.push(Value::Int(3)).unwrap();

        let block = frame.pop_block().unwrap();
        assert_eq!(block.handler, 12);
        frame.unwind_block(&block);
        assert_eq!(frame.stack_len(), 1);
    }

    #[test]
    fn test_fast_local_out_of_range() {
        let mut frame = frame_with(FrameLayout::new(0, 0, 2));
        frame.set_fast_local(1, Value::None).unwrap();
        assert!(frame.set_fast_local(2, Value::None).is_err());
    }

    #[test]
    fn test_reset_drops_everything() {
        let mut frame = frame_with(FrameLayout::new(2, 1, 1));
        frame.push(Value::Int(1)).unwrap();
        frame.set_fast_local(0, Value::Int(2)).unwrap();
        frame.set_cell(0, CellRef::empty()).unwrap();
        assert_eq!(frame.owned_reference_count(), 5);

        frame.reset();
        assert_eq!(frame.owned_reference_count(), 0);
        assert_eq!(frame.position(), Position::Start);
        assert_eq!(frame.name(), "");
        assert_eq!(frame.id(), 0);
    }
}

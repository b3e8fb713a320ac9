//! Generator state machine
//!
//! A generator owns the frame of a suspended body. Each resumption re-enters the
//! body's entry point with that frame; the body dispatches on
//! [`Frame::position`] to find where it left off.
//!
//! ```text
//!   fresh ──send/next──▶ running ──yield──▶ suspended
//!                          │  ▲                 │
//!                          │  └───send/next─────┘
//!                          ▼
//!                      exhausted ◀──close── (fresh | suspended)
//! ```

use crate::callable::{Completion, EntryPoint};
use crate::error::{InvariantViolation, RuntimeError, RuntimeResult};
use crate::frame::{Frame, FrameArena, Position};
use crate::runtime::Runtime;
use crate::value::Value;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use tracing::trace;

/// Observable generator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorState {
    /// Created but never resumed
    Fresh,
    /// Stopped at a yield
    Suspended,
    /// Currently executing
    Running,
    /// Returned, raised, or closed
    Exhausted,
}

struct GeneratorInner {
    name: Rc<str>,
    entry: EntryPoint,
    running: Cell<bool>,
    exhausted: Cell<bool>,
    /// Empty while running and after exhaustion
    frame: RefCell<Option<Frame>>,
    arena: FrameArena,
}

impl Drop for GeneratorInner {
    fn drop(&mut self) {
        if let Some(frame) = self.frame.get_mut().take() {
            self.arena.release(frame);
        }
    }
}

enum Resumed {
    Yielded(Value),
    Returned(Value),
}

/// A resumable generator body
#[derive(Clone)]
pub struct Generator(Rc<GeneratorInner>);

impl Generator {
    pub(crate) fn new(name: Rc<str>, entry: EntryPoint, mut frame: Frame, arena: FrameArena) -> Self {
        frame.detach();
        trace!(generator = &*name, "generator created");
        Self(Rc::new(GeneratorInner {
            name,
            entry,
            running: Cell::new(false),
            exhausted: Cell::new(false),
            frame: RefCell::new(Some(frame)),
            arena,
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn ptr_eq(&self, other: &Generator) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn state(&self) -> GeneratorState {
        if self.0.exhausted.get() {
            return GeneratorState::Exhausted;
        }
        if self.0.running.get() {
            return GeneratorState::Running;
        }
        match self.0.frame.borrow().as_ref().map(Frame::position) {
            Some(Position::Start) => GeneratorState::Fresh,
            Some(_) => GeneratorState::Suspended,
            None => GeneratorState::Exhausted,
        }
    }

    /// Advance the generator; `Ok(None)` once it has finished
    pub fn next(&self, rt: &mut Runtime) -> RuntimeResult<Option<Value>> {
        match self.resume(rt, None)? {
            Resumed::Yielded(value) => Ok(Some(value)),
            Resumed::Returned(_) => Ok(None),
        }
    }

    /// Resume with `value` as the result of the pending yield.
    ///
    /// Finishing (now or earlier) raises `StopIteration` carrying the
    /// return value.
    pub fn send(&self, rt: &mut Runtime, value: Value) -> RuntimeResult<Value> {
        match self.resume(rt, Some(value))? {
            Resumed::Yielded(value) => Ok(value),
            Resumed::Returned(value) => Err(RuntimeError::StopIteration { value }),
        }
    }

    /// Run pending cleanup in the body and exhaust the generator.
    ///
    /// A fresh generator has no cleanup to run and is exhausted directly.
    pub fn close(&self, rt: &mut Runtime) -> RuntimeResult<()> {
        let inner = &self.0;
        if inner.running.get() {
            return Err(InvariantViolation::GeneratorRunning {
                name: inner.name.to_string(),
            }
            .into());
        }
        if inner.exhausted.get() {
            return Ok(());
        }
        let mut frame = match inner.frame.borrow_mut().take() {
            Some(frame) => frame,
            None => {
                inner.exhausted.set(true);
                return Ok(());
            }
        };

        if frame.position() == Position::Start {
            self.finish(frame);
            return Ok(());
        }

        frame.set_position(Position::Terminal);
        let result = self.run(rt, &mut frame);
        self.finish(frame);

        match result? {
            Completion::Return(_) => Ok(()),
            Completion::Yield(_) => Err(RuntimeError::Runtime(
                "generator ignored GeneratorExit".to_string(),
            )),
        }
    }

    fn resume(&self, rt: &mut Runtime, sent: Option<Value>) -> RuntimeResult<Resumed> {
        let inner = &self.0;
        if inner.running.get() {
            return Err(InvariantViolation::GeneratorRunning {
                name: inner.name.to_string(),
            }
            .into());
        }
        if inner.exhausted.get() {
            return Ok(Resumed::Returned(Value::None));
        }

        let mut frame = inner.frame.borrow_mut().take().ok_or_else(|| {
            RuntimeError::from(InvariantViolation::ResumedPastExhaustion {
                name: inner.name.to_string(),
            })
        })?;

        let delivered = match (frame.position(), sent) {
            (Position::Start, Some(value)) if !value.is_none() => Err(RuntimeError::TypeError(
                "can't send non-None value to a just-started generator".to_string(),
            )),
            (Position::Start, _) => Ok(()),
            (_, sent) => frame.push(sent.unwrap_or(Value::None)),
        };
        if let Err(err) = delivered {
            *inner.frame.borrow_mut() = Some(frame);
            return Err(err);
        }

        match self.run(rt, &mut frame) {
            Ok(Completion::Yield(value)) => {
                trace!(generator = &*inner.name, "generator suspended");
                *inner.frame.borrow_mut() = Some(frame);
                Ok(Resumed::Yielded(value))
            }
            Ok(Completion::Return(value)) => {
                self.finish(frame);
                Ok(Resumed::Returned(value))
            }
            Err(err) => {
                self.finish(frame);
                Err(err)
            }
        }
    }

    fn run(&self, rt: &mut Runtime, frame: &mut Frame) -> RuntimeResult<Completion> {
        let inner = &self.0;
        inner.running.set(true);
        trace!(generator = &*inner.name, position = ?frame.position(), "generator running");
        let result = rt.execute(inner.entry, frame);
        inner.running.set(false);
        frame.detach();
        result
    }

    fn finish(&self, frame: Frame) {
        let inner = &self.0;
        inner.exhausted.set(true);
        trace!(generator = &*inner.name, "generator exhausted");
        inner.arena.release(frame);
    }
}

impl fmt::Debug for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generator")
            .field("name", &self.0.name)
            .field("state", &self.state())
            .finish()
    }
}

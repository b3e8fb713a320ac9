//! Frame arena
//!
//! Frames are recycled through a free list that grows in fixed-size batches.
//! A released frame keeps its vector capacity, so steady-state calls do not
//! allocate.

use super::{Frame, FrameId, FrameLayout};
use crate::value::{Namespace, Scope};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, trace};

/// Arena counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArenaStats {
    /// Batch allocations performed
    pub batches: usize,
    /// Frames allocated across all batches
    pub allocated: usize,
    pub acquired: usize,
    pub released: usize,
}

impl ArenaStats {
    /// Frames currently owned by a call or generator
    pub fn in_use(&self) -> usize {
        self.acquired - self.released
    }
}

struct ArenaState {
    free: Vec<Frame>,
    batch_size: usize,
    next_id: FrameId,
    stats: ArenaStats,
}

/// Shared handle to a frame pool
///
/// Cloning the handle shares the pool; generators keep a handle so their
/// frame can be returned when they are dropped.
#[derive(Clone)]
pub struct FrameArena {
    state: Rc<RefCell<ArenaState>>,
}

impl FrameArena {
    pub fn new(batch_size: usize) -> Self {
        Self {
            state: Rc::new(RefCell::new(ArenaState {
                free: Vec::new(),
                batch_size: batch_size.max(1),
                next_id: 1,
                stats: ArenaStats::default(),
            })),
        }
    }

    /// Take a frame from the pool, sized for `layout`
    pub fn acquire(
        &self,
        name: Rc<str>,
        globals: Namespace,
        locals: Option<Scope>,
        builtins: Namespace,
        layout: FrameLayout,
    ) -> Frame {
        let (mut frame, id) = {
            let mut state = self.state.borrow_mut();
            if state.free.is_empty() {
                let batch = state.batch_size;
                state.free.extend((0..batch).map(|_| Frame::blank()));
                state.stats.batches += 1;
                state.stats.allocated += batch;
                debug!(batch, total = state.stats.allocated, "frame arena grew");
            }

            let id = state.next_id;
            state.next_id += 1;
            state.stats.acquired += 1;
            match state.free.pop() {
                Some(frame) => (frame, id),
                None => (Frame::blank(), id),
            }
        };

        frame.prepare(id, name, globals, locals, builtins, layout);
        trace!(frame = frame.name(), id, "frame acquired");
        frame
    }

    /// Clear a frame and return it to the pool
    pub fn release(&self, mut frame: Frame) {
        trace!(frame = frame.name(), id = frame.id(), "frame released");
        // Dropping the frame's values can release generator frames into this
        // arena, so the pool is only borrowed once the frame is empty.
        frame.reset();

        let mut state = self.state.borrow_mut();
        state.stats.released += 1;
        state.free.push(frame);
    }

    pub fn stats(&self) -> ArenaStats {
        self.state.borrow().stats
    }

    /// Frames currently waiting in the free list
    pub fn free_count(&self) -> usize {
        self.state.borrow().free.len()
    }

    pub fn batch_size(&self) -> usize {
        self.state.borrow().batch_size
    }

    /// Check that no pooled frame still holds a reference or its last name
    pub fn free_frames_are_clean(&self) -> bool {
        self.state
            .borrow()
            .free
            .iter()
            .all(|frame| frame.owned_reference_count() == 0 && frame.name().is_empty())
    }
}

impl std::fmt::Debug for FrameArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameArena")
            .field("stats", &self.stats())
            .field("free", &self.free_count())
            .finish()
    }
}

//! Error provenance
//!
//! Translated bodies run on the native stack, which says nothing about source
//! positions. Instead, each frame an error propagates out of leaves a
//! [`TracebackRecord`] keyed by call depth, and the collection is pruned to
//! one contiguous chain when it is formatted.

use crate::frame::Frame;
use std::rc::Rc;

/// Where one frame was when an error left it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracebackRecord {
    pub name: Rc<str>,
    pub instr: i64,
    pub line: i64,
    pub depth: usize,
}

impl TracebackRecord {
    pub fn from_frame(frame: &Frame) -> Self {
        let origin = frame.exception_origin();
        Self {
            name: frame.name_rc().clone(),
            instr: origin.instr,
            line: origin.line,
            depth: frame.depth(),
        }
    }
}

/// Records ordered deepest first
#[derive(Debug, Clone)]
pub struct Traceback {
    records: Vec<TracebackRecord>,
    limit: usize,
}

impl Traceback {
    pub fn new(limit: usize) -> Self {
        Self {
            records: Vec::new(),
            limit,
        }
    }

    /// Record `frame` as an error leaves it
    pub fn record(&mut self, frame: &Frame) {
        self.push(TracebackRecord::from_frame(frame));
    }

    /// Add a record, replacing any earlier one at the same depth
    pub fn push(&mut self, record: TracebackRecord) {
        self.records.retain(|existing| existing.depth != record.depth);
        self.records.push(record);
        self.records.sort_by(|a, b| b.depth.cmp(&a.depth));
    }

    pub fn records(&self) -> &[TracebackRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Prune and renumber the records, then render them outermost first.
    ///
    /// Walking outward-in, each kept record is renumbered to its position in
    /// the chain. The walk stops at the first record deeper than one past
    /// that position; it and everything deeper are leftovers of an abandoned
    /// call chain and are dropped.
    pub fn format(&mut self) -> Vec<String> {
        let mut chain: Vec<TracebackRecord> = Vec::with_capacity(self.records.len());
        for record in self.records.iter().rev() {
            if record.depth > chain.len() + 1 {
                break;
            }
            let mut renumbered = record.clone();
            renumbered.depth = chain.len();
            chain.push(renumbered);
        }

        let lines = chain
            .iter()
            .take(self.limit)
            .map(|record| {
                format!(
                    "#{} In \"{}\", instr {}, line {}",
                    record.depth, record.name, record.instr, record.line
                )
            })
            .collect();

        chain.reverse();
        self.records = chain;
        lines
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

//! Session-scoped reference registry.
//!
//! The resolver owns the per-run visitation map (record → write state) and
//! the insertion counters that make "relative" references work without a
//! connection. A generated key is registered as a [`ResolvedReference`] the
//! moment its row is emitted; every later use materializes it into a
//! [`SqlExpr`] against the *current* counters, so a reference picked up after
//! three more rows went into the same table automatically becomes "last
//! inserted minus 3".

use std::collections::HashMap;

use crate::graph::RecordId;
use crate::ident::{Ident, QuoteStyle};
use crate::statement::SqlExpr;
use crate::value::Value;

/// The key of an already-emitted row: either a concrete value or a deferred
/// database-side expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedReference {
    /// Key known at generation time.
    Concrete(Value),
    /// Identity key readable only as "last inserted row of this table";
    /// `seq` is the table's insert ordinal at emission time.
    RowRef {
        table: Ident,
        key_column: String,
        seq: u64,
    },
    /// Sequence-drawn key readable only through the sequence's current value;
    /// `seq` is the draw ordinal at emission time.
    SequenceRef {
        sequence: String,
        increment: i64,
        seq: u64,
    },
}

/// Per-record visitation state. Absence from the map means unvisited.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteState {
    /// On the current DFS stack; hitting this again is a cycle.
    InProgress,
    /// Emitted, with its registered key reference. Permanent for the run.
    Written(ResolvedReference),
}

/// An obligation to patch a cyclic FK column once its target is written.
#[derive(Debug, Clone)]
pub struct DeferredUpdate {
    /// Row whose FK column was emitted as NULL.
    pub source: RecordId,
    /// In-progress record the column must eventually reference.
    pub target: RecordId,
    pub relation: String,
    pub fk_column: String,
    /// Table of the source row.
    pub table: Ident,
}

/// Registry mapping processed records to key references, scoped to one run.
#[derive(Debug, Default)]
pub struct ReferenceResolver {
    states: HashMap<RecordId, WriteState>,
    deferred: Vec<DeferredUpdate>,
    table_inserts: HashMap<String, u64>,
    sequence_draws: HashMap<String, u64>,
}

impl ReferenceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, id: RecordId) -> Option<&WriteState> {
        self.states.get(&id)
    }

    pub fn is_in_progress(&self, id: RecordId) -> bool {
        matches!(self.states.get(&id), Some(WriteState::InProgress))
    }

    /// Returns false (signalling a cycle) if the record is already in
    /// progress; a written record is never re-marked.
    pub fn mark_in_progress(&mut self, id: RecordId) -> bool {
        match self.states.get(&id) {
            Some(WriteState::InProgress) => false,
            Some(WriteState::Written(_)) => true,
            None => {
                self.states.insert(id, WriteState::InProgress);
                true
            }
        }
    }

    pub fn clear_in_progress(&mut self, id: RecordId) {
        if self.is_in_progress(id) {
            self.states.remove(&id);
        }
    }

    pub fn mark_written(&mut self, id: RecordId, reference: ResolvedReference) {
        self.states.insert(id, WriteState::Written(reference));
    }

    /// The stored reference of a written record.
    pub fn resolved(&self, id: RecordId) -> Option<&ResolvedReference> {
        match self.states.get(&id) {
            Some(WriteState::Written(r)) => Some(r),
            _ => None,
        }
    }

    /// Record one emitted insert into `table`; returns the row's 0-based
    /// insert ordinal for that table.
    pub fn note_insert(&mut self, table: &Ident) -> u64 {
        let count = self
            .table_inserts
            .entry(table_key(table))
            .or_insert(0);
        let seq = *count;
        *count += 1;
        seq
    }

    /// Number of inserts noted for `table` so far, i.e. the ordinal the next
    /// insert into it will receive.
    pub fn table_count(&self, table: &Ident) -> u64 {
        self.table_inserts
            .get(&table_key(table))
            .copied()
            .unwrap_or(0)
    }

    /// Record one inline sequence draw; returns the 0-based draw ordinal.
    pub fn note_sequence_draw(&mut self, sequence: &str) -> u64 {
        let count = self.sequence_draws.entry(sequence.to_string()).or_insert(0);
        let seq = *count;
        *count += 1;
        seq
    }

    /// Turn a stored reference into a value expression valid at this point of
    /// the emitted sequence.
    pub fn materialize(&self, reference: &ResolvedReference) -> SqlExpr {
        match reference {
            ResolvedReference::Concrete(v) => SqlExpr::Literal(v.clone()),
            ResolvedReference::RowRef {
                table,
                key_column,
                seq,
            } => {
                let count = self
                    .table_inserts
                    .get(&table_key(table))
                    .copied()
                    .unwrap_or(0);
                // count > seq always holds: the row was noted before any use.
                let rows_back = count.saturating_sub(seq + 1) as u32;
                SqlExpr::LastInsert {
                    table: table.clone(),
                    key_column: key_column.clone(),
                    rows_back,
                }
            }
            ResolvedReference::SequenceRef {
                sequence,
                increment,
                seq,
            } => {
                let draws = self.sequence_draws.get(sequence).copied().unwrap_or(0);
                let offset = draws.saturating_sub(seq + 1) as i64 * increment;
                SqlExpr::SequenceCurrent {
                    sequence: sequence.clone(),
                    offset,
                }
            }
        }
    }

    pub fn defer_update(&mut self, update: DeferredUpdate) {
        self.deferred.push(update);
    }

    /// Remove and return the deferred obligations naming `target`.
    pub fn take_deferred_for(&mut self, target: RecordId) -> Vec<DeferredUpdate> {
        let mut taken = Vec::new();
        let mut kept = Vec::new();
        for d in self.deferred.drain(..) {
            if d.target == target {
                taken.push(d);
            } else {
                kept.push(d);
            }
        }
        self.deferred = kept;
        taken
    }

    /// Number of records marked written this run.
    pub fn written_count(&self) -> usize {
        self.states
            .values()
            .filter(|s| matches!(s, WriteState::Written(_)))
            .count()
    }
}

fn table_key(table: &Ident) -> String {
    table.render(QuoteStyle::DoubleQuote)
}

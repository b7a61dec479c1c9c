//! Per-entity identifier allocation.
//!
//! One allocator per session. Simulated counters are entirely client-side and
//! strictly increasing for the lifetime of the run; speculative pre-allocation
//! (handing a record its key before its row exists, to close a cycle) is
//! stashed per record so the eventual insert reuses the same value. Not safe
//! for concurrent callers; a session is a single logical writer.

use std::collections::HashMap;

use crate::error::{SeedError, SeedResult};
use crate::graph::{Record, RecordId};
use crate::schema::{EntityDescriptor, IdentifierStrategy};
use crate::value::Value;

/// Outcome of allocating a key for one record, before its insert is emitted.
#[derive(Debug, Clone, PartialEq)]
pub enum AllocatedKey {
    /// Key known now; goes into the insert's key column as a literal.
    Concrete(Value),
    /// Database identity column: omitted from the insert, referenced later
    /// through a last-inserted-row expression.
    Identity,
    /// Drawn inline from a sequence in the insert's key column.
    Sequence { name: String, increment: i64 },
}

/// Session-scoped key allocator.
#[derive(Debug, Default)]
pub struct IdentifierAllocator {
    counters: HashMap<String, i64>,
    preallocated: HashMap<RecordId, Value>,
}

impl IdentifierAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the key for a record that is about to be inserted.
    pub fn allocate(
        &mut self,
        descriptor: &EntityDescriptor,
        record: &Record,
        id: RecordId,
        ident: &str,
    ) -> SeedResult<AllocatedKey> {
        match &descriptor.identifier {
            IdentifierStrategy::PreAssigned { column } => {
                let key = record.value(column).cloned().filter(|v| !v.is_null());
                match key {
                    Some(v) => Ok(AllocatedKey::Concrete(v)),
                    None => Err(SeedError::MissingKey {
                        entity: descriptor.name.clone(),
                        ident: ident.to_string(),
                        column: column.clone(),
                    }),
                }
            }
            IdentifierStrategy::DatabaseIdentity { .. } => Ok(AllocatedKey::Identity),
            IdentifierStrategy::Sequence {
                name, increment, ..
            } => Ok(AllocatedKey::Sequence {
                name: name.clone(),
                increment: *increment,
            }),
            IdentifierStrategy::SimulatedCounter { .. } => {
                // A cycle may have handed this record its key already.
                if let Some(v) = self.preallocated.remove(&id) {
                    return Ok(AllocatedKey::Concrete(v));
                }
                Ok(AllocatedKey::Concrete(self.draw(descriptor)))
            }
        }
    }

    /// Speculatively obtain a record's eventual key before its row exists.
    ///
    /// Returns `None` when the strategy cannot allocate out of order
    /// (identity columns and sequences in connection-less mode).
    pub fn allocate_ahead(
        &mut self,
        descriptor: &EntityDescriptor,
        record: &Record,
        id: RecordId,
    ) -> Option<Value> {
        match &descriptor.identifier {
            IdentifierStrategy::PreAssigned { column } => {
                record.value(column).cloned().filter(|v| !v.is_null())
            }
            IdentifierStrategy::SimulatedCounter { .. } => {
                if let Some(v) = self.preallocated.get(&id) {
                    return Some(v.clone());
                }
                let v = self.draw(descriptor);
                self.preallocated.insert(id, v.clone());
                Some(v)
            }
            _ => None,
        }
    }

    fn draw(&mut self, descriptor: &EntityDescriptor) -> Value {
        let IdentifierStrategy::SimulatedCounter {
            start, increment, ..
        } = &descriptor.identifier
        else {
            unreachable!("draw is only called for simulated counters");
        };
        let next = self
            .counters
            .entry(descriptor.name.clone())
            .or_insert(*start);
        let value = *next;
        *next += *increment;
        Value::Int(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::RecordGraph;
    use crate::value::ValueType;

    fn counter_entity(start: i64, increment: i64) -> EntityDescriptor {
        EntityDescriptor::build("order", "orders")
            .identifier(IdentifierStrategy::SimulatedCounter {
                column: "id".into(),
                start,
                increment,
            })
            .finish()
            .unwrap()
    }

    #[test]
    fn simulated_counter_is_monotonic() {
        let desc = counter_entity(100, 10);
        let mut graph = RecordGraph::new();
        let mut alloc = IdentifierAllocator::new();
        let mut seen = Vec::new();
        for _ in 0..3 {
            let id = graph.add("order");
            match alloc
                .allocate(&desc, graph.record(id), id, "order")
                .unwrap()
            {
                AllocatedKey::Concrete(Value::Int(v)) => seen.push(v),
                other => panic!("unexpected key: {other:?}"),
            }
        }
        assert_eq!(seen, vec![100, 110, 120]);
    }

    #[test]
    fn preallocation_reserves_the_same_value() {
        let desc = counter_entity(1, 1);
        let mut graph = RecordGraph::new();
        let id = graph.add("order");
        let mut alloc = IdentifierAllocator::new();

        let ahead = alloc.allocate_ahead(&desc, graph.record(id), id).unwrap();
        // Repeated speculative asks return the same key.
        assert_eq!(
            alloc.allocate_ahead(&desc, graph.record(id), id).unwrap(),
            ahead
        );
        // The real allocation consumes the reservation, not a fresh value.
        assert_eq!(
            alloc.allocate(&desc, graph.record(id), id, "order").unwrap(),
            AllocatedKey::Concrete(ahead)
        );

        // Next record skips past the reserved key.
        let next = graph.add("order");
        assert_eq!(
            alloc
                .allocate(&desc, graph.record(next), next, "order")
                .unwrap(),
            AllocatedKey::Concrete(Value::Int(2))
        );
    }

    #[test]
    fn preassigned_requires_a_key() {
        let desc = EntityDescriptor::build("author", "authors")
            .identifier(IdentifierStrategy::PreAssigned { column: "id".into() })
            .finish()
            .unwrap();
        let mut graph = RecordGraph::new();
        let id = graph.add("author");
        let mut alloc = IdentifierAllocator::new();

        let err = alloc
            .allocate(&desc, graph.record(id), id, "author#0")
            .unwrap_err();
        assert!(matches!(err, SeedError::MissingKey { .. }));

        graph.set(id, "id", 7i64);
        assert_eq!(
            alloc
                .allocate(&desc, graph.record(id), id, "author#0")
                .unwrap(),
            AllocatedKey::Concrete(Value::Int(7))
        );
    }

    #[test]
    fn identity_cannot_allocate_ahead() {
        let desc = EntityDescriptor::build("log", "logs")
            .column("message", ValueType::Text)
            .identifier(IdentifierStrategy::DatabaseIdentity { column: "id".into() })
            .finish()
            .unwrap();
        let mut graph = RecordGraph::new();
        let id = graph.add("log");
        let mut alloc = IdentifierAllocator::new();
        assert!(alloc.allocate_ahead(&desc, graph.record(id), id).is_none());
        assert_eq!(
            alloc.allocate(&desc, graph.record(id), id, "log#0").unwrap(),
            AllocatedKey::Identity
        );
    }
}

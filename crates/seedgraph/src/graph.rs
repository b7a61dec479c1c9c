//! The in-memory record graph.
//!
//! Records live in an arena and reference each other through [`RecordId`]
//! indices, so arbitrary cycles are expressible without interior mutability
//! and the visitation map can key on plain indices instead of object
//! identity.

use indexmap::IndexMap;

use crate::value::Value;

/// Arena index of one record. Only meaningful for the graph that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId(pub(crate) usize);

impl RecordId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Target(s) of one relation slot on a record.
///
/// Iteration order of `Many` and `Keyed` is the declared collection order;
/// for ordered relations it determines the order column.
#[derive(Debug, Clone)]
pub enum RelationTarget {
    One(RecordId),
    Many(Vec<RecordId>),
    Keyed(Vec<(Value, RecordId)>),
}

impl RelationTarget {
    /// All referenced record ids, in declared order.
    pub fn ids(&self) -> Vec<RecordId> {
        match self {
            Self::One(id) => vec![*id],
            Self::Many(ids) => ids.clone(),
            Self::Keyed(pairs) => pairs.iter().map(|(_, id)| *id).collect(),
        }
    }
}

/// One instance of an entity: scalar values plus relation targets.
#[derive(Debug, Clone)]
pub struct Record {
    entity: String,
    values: IndexMap<String, Value>,
    relations: IndexMap<String, RelationTarget>,
}

impl Record {
    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn value(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn relation(&self, name: &str) -> Option<&RelationTarget> {
        self.relations.get(name)
    }
}

/// Arena of records forming one (possibly cyclic) object graph.
///
/// `RecordId`s index into this arena directly; passing an id from a different
/// graph panics, the same as out-of-bounds `Vec` indexing.
#[derive(Debug, Clone, Default)]
pub struct RecordGraph {
    records: Vec<Record>,
}

impl RecordGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an empty record of the given entity type.
    pub fn add(&mut self, entity: &str) -> RecordId {
        self.records.push(Record {
            entity: entity.to_string(),
            values: IndexMap::new(),
            relations: IndexMap::new(),
        });
        RecordId(self.records.len() - 1)
    }

    /// Set a scalar column value.
    pub fn set(&mut self, id: RecordId, column: &str, value: impl Into<Value>) {
        self.records[id.0]
            .values
            .insert(column.to_string(), value.into());
    }

    /// Point a single-valued relation at a target record.
    pub fn relate(&mut self, id: RecordId, relation: &str, target: RecordId) {
        self.records[id.0]
            .relations
            .insert(relation.to_string(), RelationTarget::One(target));
    }

    /// Set a many-valued relation to the given targets, in order.
    pub fn relate_many(&mut self, id: RecordId, relation: &str, targets: Vec<RecordId>) {
        self.records[id.0]
            .relations
            .insert(relation.to_string(), RelationTarget::Many(targets));
    }

    /// Append one target to a many-valued relation.
    pub fn push_related(&mut self, id: RecordId, relation: &str, target: RecordId) {
        match self.records[id.0].relations.get_mut(relation) {
            Some(RelationTarget::Many(ids)) => ids.push(target),
            _ => {
                self.relate_many(id, relation, vec![target]);
            }
        }
    }

    /// Append one keyed target to a map-valued relation.
    pub fn relate_keyed(
        &mut self,
        id: RecordId,
        relation: &str,
        key: impl Into<Value>,
        target: RecordId,
    ) {
        match self.records[id.0].relations.get_mut(relation) {
            Some(RelationTarget::Keyed(pairs)) => pairs.push((key.into(), target)),
            _ => {
                self.records[id.0].relations.insert(
                    relation.to_string(),
                    RelationTarget::Keyed(vec![(key.into(), target)]),
                );
            }
        }
    }

    pub fn record(&self, id: RecordId) -> &Record {
        &self.records[id.0]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Best-effort identity used in diagnostics: entity type, arena index,
    /// and the key value when one is set.
    pub(crate) fn ident(&self, id: RecordId, key_column: &str) -> String {
        let record = &self.records[id.0];
        match record.value(key_column) {
            Some(key) if !key.is_null() => {
                format!("{}#{} key={:?}", record.entity, id.0, key)
            }
            _ => format!("{}#{}", record.entity, id.0),
        }
    }
}

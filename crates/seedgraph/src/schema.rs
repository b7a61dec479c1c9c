//! Entity metadata model.
//!
//! The core performs no reflection: callers hand in a [`Schema`] of
//! pre-resolved [`EntityDescriptor`]s, built programmatically or deserialized
//! from static config. Descriptors are immutable once built and shared
//! read-only across a generation run.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{SeedError, SeedResult};
use crate::ident::Ident;
use crate::value::ValueType;

/// How a new primary key is obtained for an entity. Exactly one strategy per
/// entity for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierStrategy {
    /// The caller already set the key on the record.
    PreAssigned { column: String },
    /// The database generates the key in an identity column; the column is
    /// omitted from the INSERT and later references use a relative expression.
    DatabaseIdentity { column: String },
    /// Keys are drawn inline from a named sequence.
    Sequence {
        column: String,
        name: String,
        increment: i64,
    },
    /// Client-side counter; keys are concrete without any database involvement.
    SimulatedCounter {
        column: String,
        start: i64,
        increment: i64,
    },
}

impl IdentifierStrategy {
    /// Name of the primary-key column this strategy governs.
    pub fn column(&self) -> &str {
        match self {
            Self::PreAssigned { column }
            | Self::DatabaseIdentity { column }
            | Self::Sequence { column, .. }
            | Self::SimulatedCounter { column, .. } => column,
        }
    }

    /// Whether a key can be handed out before the row exists (needed to close
    /// a cycle through a non-nullable column).
    pub fn supports_preallocation(&self) -> bool {
        matches!(self, Self::PreAssigned { .. } | Self::SimulatedCounter { .. })
    }
}

/// Cardinality of a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    Single,
    OrderedMany,
    UnorderedMany,
    KeyedMap,
}

impl Cardinality {
    pub fn is_many(&self) -> bool {
        !matches!(self, Self::Single)
    }
}

/// Join table carrying a many-valued owning relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinTable {
    pub table: Ident,
    /// FK column referencing the owning entity's key.
    pub owner_column: String,
    /// FK column referencing the target entity's key.
    pub target_column: String,
    /// Zero-based position column, required for `OrderedMany`.
    pub order_column: Option<String>,
    /// Map-key column, required for `KeyedMap`.
    pub key_column: Option<String>,
}

/// A reference from one entity to one or many others.
///
/// The owning side carries the foreign key (either a column on the entity's
/// own table for `Single`, or a join table for many-valued relations); the
/// inverse side carries nothing and is traversed for reachability only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDescriptor {
    pub name: String,
    /// Entity name of the relation target.
    pub target: String,
    pub cardinality: Cardinality,
    pub owning: bool,
    /// Whether the FK column may be NULL (owning `Single` only).
    pub nullable: bool,
    /// FK column on this entity's table (owning `Single` only).
    pub fk_column: Option<String>,
    /// Join table (owning many-valued relations only).
    pub join_table: Option<JoinTable>,
}

impl RelationDescriptor {
    /// Owning single-valued relation: one FK column on this entity's table.
    pub fn single(name: &str, target: &str, fk_column: &str) -> Self {
        Self {
            name: name.to_string(),
            target: target.to_string(),
            cardinality: Cardinality::Single,
            owning: true,
            nullable: false,
            fk_column: Some(fk_column.to_string()),
            join_table: None,
        }
    }

    /// Owning many-valued relation through a join table.
    pub fn many(name: &str, target: &str, cardinality: Cardinality, join: JoinTable) -> Self {
        Self {
            name: name.to_string(),
            target: target.to_string(),
            cardinality,
            owning: true,
            nullable: false,
            fk_column: None,
            join_table: Some(join),
        }
    }

    /// Inverse relation: no columns here, traversed for reachability.
    pub fn inverse(name: &str, target: &str, cardinality: Cardinality) -> Self {
        Self {
            name: name.to_string(),
            target: target.to_string(),
            cardinality,
            owning: false,
            nullable: true,
            fk_column: None,
            join_table: None,
        }
    }

    /// Mark the FK column nullable.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

/// One scalar column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name. Names outside the plain lower-case identifier set are
    /// quoted at render time; lower-case reserved words must be renamed.
    pub name: String,
    pub value_type: ValueType,
    pub nullable: bool,
    pub primary_key: bool,
}

impl ColumnDescriptor {
    pub fn new(name: &str, value_type: ValueType) -> Self {
        Self {
            name: name.to_string(),
            value_type,
            nullable: false,
            primary_key: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

/// One persistent object type with its table mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    pub name: String,
    pub table: Ident,
    pub columns: Vec<ColumnDescriptor>,
    pub relations: Vec<RelationDescriptor>,
    pub identifier: IdentifierStrategy,
}

impl EntityDescriptor {
    /// Start building a descriptor. `table` accepts dotted/quoted notation.
    pub fn build(name: &str, table: &str) -> EntityBuilder {
        EntityBuilder {
            name: name.to_string(),
            table: table.to_string(),
            columns: Vec::new(),
            relations: Vec::new(),
            identifier: None,
        }
    }

    /// Primary-key column name (from the identifier strategy).
    pub fn key_column(&self) -> &str {
        self.identifier.column()
    }

    pub fn relation(&self, name: &str) -> Option<&RelationDescriptor> {
        self.relations.iter().find(|r| r.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Declared value type of the primary-key column, when it is listed among
    /// the scalar columns; `Int` otherwise (generated keys).
    pub fn key_type(&self) -> ValueType {
        self.column(self.key_column())
            .map(|c| c.value_type)
            .unwrap_or(ValueType::Int)
    }
}

/// Fluent builder for [`EntityDescriptor`].
pub struct EntityBuilder {
    name: String,
    table: String,
    columns: Vec<ColumnDescriptor>,
    relations: Vec<RelationDescriptor>,
    identifier: Option<IdentifierStrategy>,
}

impl EntityBuilder {
    /// Add a non-nullable scalar column.
    pub fn column(mut self, name: &str, value_type: ValueType) -> Self {
        self.columns.push(ColumnDescriptor::new(name, value_type));
        self
    }

    /// Add a nullable scalar column.
    pub fn nullable_column(mut self, name: &str, value_type: ValueType) -> Self {
        self.columns
            .push(ColumnDescriptor::new(name, value_type).nullable());
        self
    }

    pub fn relation(mut self, relation: RelationDescriptor) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn identifier(mut self, identifier: IdentifierStrategy) -> Self {
        self.identifier = Some(identifier);
        self
    }

    /// Validate and finish.
    pub fn finish(self) -> SeedResult<EntityDescriptor> {
        let table = Ident::parse(&self.table)?;
        let identifier = self.identifier.ok_or_else(|| {
            SeedError::model(format!("Entity '{}' has no identifier strategy", self.name))
        })?;

        if let IdentifierStrategy::Sequence { increment, .. }
        | IdentifierStrategy::SimulatedCounter { increment, .. } = &identifier
            && *increment == 0
        {
            return Err(SeedError::model(format!(
                "Entity '{}': identifier increment must be non-zero",
                self.name
            )));
        }

        let mut columns = self.columns;
        // The key column, when listed, gets its primary_key flag set; when the
        // strategy is PreAssigned or SimulatedCounter and unlisted, it is
        // injected so the INSERT has somewhere to put the key.
        if let Some(c) = columns.iter_mut().find(|c| c.name == identifier.column()) {
            c.primary_key = true;
        } else if identifier.supports_preallocation() {
            let mut key = ColumnDescriptor::new(identifier.column(), ValueType::Int);
            key.primary_key = true;
            columns.insert(0, key);
        }

        for r in &self.relations {
            validate_relation(&self.name, r)?;
            if let Some(fk) = &r.fk_column
                && columns.iter().any(|c| c.name == *fk)
            {
                return Err(SeedError::model(format!(
                    "Entity '{}': relation '{}' FK column '{}' collides with a scalar column",
                    self.name, r.name, fk
                )));
            }
        }

        Ok(EntityDescriptor {
            name: self.name,
            table,
            columns,
            relations: self.relations,
            identifier,
        })
    }
}

fn validate_relation(entity: &str, r: &RelationDescriptor) -> SeedResult<()> {
    if !r.owning {
        if r.fk_column.is_some() || r.join_table.is_some() {
            return Err(SeedError::model(format!(
                "Entity '{entity}': inverse relation '{}' must not carry columns",
                r.name
            )));
        }
        return Ok(());
    }
    match r.cardinality {
        Cardinality::Single => {
            if r.fk_column.is_none() {
                return Err(SeedError::model(format!(
                    "Entity '{entity}': owning relation '{}' needs an FK column",
                    r.name
                )));
            }
        }
        Cardinality::OrderedMany | Cardinality::UnorderedMany | Cardinality::KeyedMap => {
            let join = r.join_table.as_ref().ok_or_else(|| {
                SeedError::model(format!(
                    "Entity '{entity}': owning relation '{}' needs a join table",
                    r.name
                ))
            })?;
            if r.cardinality == Cardinality::OrderedMany && join.order_column.is_none() {
                return Err(SeedError::model(format!(
                    "Entity '{entity}': ordered relation '{}' needs an order column",
                    r.name
                )));
            }
            if r.cardinality == Cardinality::KeyedMap && join.key_column.is_none() {
                return Err(SeedError::model(format!(
                    "Entity '{entity}': keyed relation '{}' needs a key column",
                    r.name
                )));
            }
        }
    }
    Ok(())
}

/// The metadata provider: entity name → descriptor.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    entities: HashMap<String, Arc<EntityDescriptor>>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder {
            entities: Vec::new(),
        }
    }

    /// Look up the descriptor for an entity name.
    pub fn describe(&self, entity: &str) -> SeedResult<&Arc<EntityDescriptor>> {
        self.entities
            .get(entity)
            .ok_or_else(|| SeedError::model(format!("Unknown entity '{entity}'")))
    }

    /// All descriptors, in no particular order.
    pub fn entities(&self) -> impl Iterator<Item = &Arc<EntityDescriptor>> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Builder validating cross-entity references.
pub struct SchemaBuilder {
    entities: Vec<EntityDescriptor>,
}

impl SchemaBuilder {
    pub fn entity(mut self, descriptor: EntityDescriptor) -> Self {
        self.entities.push(descriptor);
        self
    }

    pub fn finish(self) -> SeedResult<Schema> {
        let mut entities: HashMap<String, Arc<EntityDescriptor>> = HashMap::new();
        for e in &self.entities {
            if entities
                .insert(e.name.clone(), Arc::new(e.clone()))
                .is_some()
            {
                return Err(SeedError::model(format!("Duplicate entity '{}'", e.name)));
            }
        }
        for e in &self.entities {
            for r in &e.relations {
                if !entities.contains_key(&r.target) {
                    return Err(SeedError::model(format!(
                        "Entity '{}': relation '{}' targets unknown entity '{}'",
                        e.name, r.name, r.target
                    )));
                }
            }
        }
        Ok(Schema { entities })
    }
}

//! Building statements for one record.
//!
//! Given a record and its descriptor, produce the primary Insert (scalar
//! columns plus owning single-valued FK columns) and, after the owner row is
//! registered, one auxiliary join-table Insert per element of each owning
//! many-valued relation. Cyclic FK columns are written as NULL with a
//! deferred-update obligation, or inline with a pre-allocated key when the
//! column cannot be deferred but the dialect allows deferred constraints.

use tracing::warn;

use crate::allocator::{AllocatedKey, IdentifierAllocator};
use crate::dialect::Dialect;
use crate::error::{SeedError, SeedResult};
use crate::graph::{RecordGraph, RecordId, RelationTarget};
use crate::resolver::{DeferredUpdate, ReferenceResolver};
use crate::schema::{Cardinality, EntityDescriptor, RelationDescriptor, Schema};
use crate::statement::{SqlExpr, Statement};
use crate::value::Value;

/// Build the primary Insert for `id`, whose key has already been allocated.
///
/// All owning relation targets must be `Written` or `InProgress` at this
/// point; the graph writer guarantees that by recursing dependencies first.
#[allow(clippy::too_many_arguments)]
pub(crate) fn build_primary(
    graph: &RecordGraph,
    schema: &Schema,
    dialect: &Dialect,
    resolver: &mut ReferenceResolver,
    allocator: &mut IdentifierAllocator,
    descriptor: &EntityDescriptor,
    id: RecordId,
    key: &AllocatedKey,
) -> SeedResult<Statement> {
    let record = graph.record(id);
    let ident = graph.ident(id, descriptor.key_column());
    let mut stmt = Statement::insert(descriptor.table.clone());

    // Key column first, so an inline nextval is drawn before any currval
    // reference in the same VALUES list evaluates.
    match key {
        AllocatedKey::Concrete(v) => {
            stmt.set(descriptor.key_column(), SqlExpr::Literal(v.clone()));
        }
        AllocatedKey::Sequence { name, .. } => {
            stmt.set(descriptor.key_column(), SqlExpr::SequenceNext(name.clone()));
        }
        AllocatedKey::Identity => {}
    }

    for column in &descriptor.columns {
        if column.name == descriptor.key_column() {
            continue;
        }
        let value = record.value(&column.name).cloned().unwrap_or(Value::Null);
        let value = match value {
            Value::Text(s) if s.is_empty() && dialect.empty_string_is_null() => Value::Null,
            v => v,
        };
        if value.is_null() && !column.nullable {
            return Err(SeedError::NullInRequiredColumn {
                entity: descriptor.name.clone(),
                column: column.name.clone(),
                ident,
            });
        }
        if let Value::Float(f) = &value
            && !f.is_finite()
        {
            return Err(SeedError::UnmappableValue {
                entity: descriptor.name.clone(),
                column: column.name.clone(),
                ident,
                expected: column.value_type.to_string(),
                found: "non-finite float".to_string(),
            });
        }
        if !value.fits(column.value_type) {
            return Err(SeedError::UnmappableValue {
                entity: descriptor.name.clone(),
                column: column.name.clone(),
                ident,
                expected: column.value_type.to_string(),
                found: value.kind_str().to_string(),
            });
        }
        stmt.set(&column.name, SqlExpr::Literal(value));
    }

    for relation in descriptor.relations.iter().filter(|r| r.owning) {
        match relation.cardinality {
            Cardinality::Single => {
                let expr = single_fk_expr(
                    graph, schema, dialect, resolver, allocator, descriptor, id, relation,
                )?;
                let fk = relation
                    .fk_column
                    .as_deref()
                    .ok_or_else(|| relation_model_error(descriptor, relation, "missing FK column"))?;
                stmt.set(fk, expr);
            }
            _ => {
                // Join rows are built after the owner row is registered, but a
                // required cycle must fail before anything is emitted.
                precheck_many_targets(graph, schema, dialect, resolver, descriptor, id, relation)?;
            }
        }
    }

    Ok(stmt)
}

/// FK column expression for an owning single-valued relation.
#[allow(clippy::too_many_arguments)]
fn single_fk_expr(
    graph: &RecordGraph,
    schema: &Schema,
    dialect: &Dialect,
    resolver: &mut ReferenceResolver,
    allocator: &mut IdentifierAllocator,
    descriptor: &EntityDescriptor,
    id: RecordId,
    relation: &RelationDescriptor,
) -> SeedResult<SqlExpr> {
    let record = graph.record(id);
    let target = match record.relation(&relation.name) {
        None => {
            if relation.nullable {
                return Ok(SqlExpr::null());
            }
            return Err(SeedError::RequiredReferenceMissing {
                entity: descriptor.name.clone(),
                relation: relation.name.clone(),
                ident: graph.ident(id, descriptor.key_column()),
            });
        }
        Some(RelationTarget::One(tid)) => *tid,
        Some(_) => {
            return Err(relation_model_error(
                descriptor,
                relation,
                "single-valued relation holds a collection",
            ));
        }
    };

    if let Some(reference) = resolver.resolved(target) {
        return Ok(resolver.materialize(reference));
    }

    // The target is on the current DFS stack: a cycle.
    debug_assert!(resolver.is_in_progress(target));
    if relation.nullable {
        warn!(
            entity = %descriptor.name,
            relation = %relation.name,
            "cycle detected; deferring FK column to a follow-up UPDATE"
        );
        resolver.defer_update(DeferredUpdate {
            source: id,
            target,
            relation: relation.name.clone(),
            fk_column: relation
                .fk_column
                .clone()
                .ok_or_else(|| relation_model_error(descriptor, relation, "missing FK column"))?,
            table: descriptor.table.clone(),
        });
        return Ok(SqlExpr::null());
    }

    cyclic_key_expr(graph, schema, dialect, allocator, descriptor, relation, target)
}

/// Inline key for a cyclic reference through a column that cannot be NULL.
///
/// Only possible when the target's strategy can hand out its key ahead of the
/// row and the dialect lets the constraint check wait until commit.
#[allow(clippy::too_many_arguments)]
fn cyclic_key_expr(
    graph: &RecordGraph,
    schema: &Schema,
    dialect: &Dialect,
    allocator: &mut IdentifierAllocator,
    descriptor: &EntityDescriptor,
    relation: &RelationDescriptor,
    target: RecordId,
) -> SeedResult<SqlExpr> {
    let target_desc = schema.describe(graph.record(target).entity())?;
    if !target_desc.identifier.supports_preallocation() || !dialect.supports_deferred_constraints() {
        return Err(SeedError::CycleWithoutUpdatableColumn {
            entity: descriptor.name.clone(),
            relation: relation.name.clone(),
        });
    }
    // Preallocation support was just checked, so a missing speculative key
    // can only mean a pre-assigned target with its key column unset.
    let key = allocator
        .allocate_ahead(target_desc, graph.record(target), target)
        .ok_or_else(|| SeedError::MissingKey {
            entity: target_desc.name.clone(),
            ident: graph.ident(target, target_desc.key_column()),
            column: target_desc.key_column().to_string(),
        })?;
    warn!(
        entity = %descriptor.name,
        relation = %relation.name,
        "cycle through required column; inlining pre-allocated key (requires deferred constraints)"
    );
    Ok(SqlExpr::Literal(key))
}

/// Fail fast when a many-valued relation reaches an in-progress record that
/// cannot be referenced ahead of its row.
fn precheck_many_targets(
    graph: &RecordGraph,
    schema: &Schema,
    dialect: &Dialect,
    resolver: &ReferenceResolver,
    descriptor: &EntityDescriptor,
    id: RecordId,
    relation: &RelationDescriptor,
) -> SeedResult<()> {
    let Some(target) = graph.record(id).relation(&relation.name) else {
        return Ok(());
    };
    for tid in target.ids() {
        if resolver.is_in_progress(tid) {
            let target_desc = schema.describe(graph.record(tid).entity())?;
            if !target_desc.identifier.supports_preallocation()
                || !dialect.supports_deferred_constraints()
            {
                return Err(SeedError::CycleWithoutUpdatableColumn {
                    entity: descriptor.name.clone(),
                    relation: relation.name.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Build the auxiliary join-table Inserts for one owning many-valued
/// relation. Called after the owner row has been emitted and registered, so
/// the owner reference materializes against current counters.
pub(crate) fn build_join_rows(
    graph: &RecordGraph,
    schema: &Schema,
    resolver: &mut ReferenceResolver,
    allocator: &mut IdentifierAllocator,
    descriptor: &EntityDescriptor,
    id: RecordId,
    relation: &RelationDescriptor,
) -> SeedResult<Vec<Statement>> {
    let Some(target) = graph.record(id).relation(&relation.name) else {
        return Ok(Vec::new());
    };
    let join = relation
        .join_table
        .as_ref()
        .ok_or_else(|| relation_model_error(descriptor, relation, "missing join table"))?;

    let elements: Vec<(Option<Value>, RecordId)> = match (relation.cardinality, target) {
        (Cardinality::KeyedMap, RelationTarget::Keyed(pairs)) => pairs
            .iter()
            .map(|(k, tid)| (Some(k.clone()), *tid))
            .collect(),
        (Cardinality::KeyedMap, _) => {
            return Err(relation_model_error(
                descriptor,
                relation,
                "keyed relation holds a non-keyed collection",
            ));
        }
        (_, RelationTarget::Keyed(_)) => {
            return Err(relation_model_error(
                descriptor,
                relation,
                "non-keyed relation holds a keyed collection",
            ));
        }
        (_, t) => t.ids().into_iter().map(|tid| (None, tid)).collect(),
    };

    let owner_ref = resolver
        .resolved(id)
        .cloned()
        .ok_or_else(|| relation_model_error(descriptor, relation, "owner not yet written"))?;

    let mut rows = Vec::with_capacity(elements.len());
    for (position, (map_key, tid)) in elements.into_iter().enumerate() {
        let target_expr = match resolver.resolved(tid) {
            Some(r) => resolver.materialize(r),
            None => {
                // In-progress target, prechecked: inline its future key.
                let target_desc = schema.describe(graph.record(tid).entity())?;
                let key = allocator
                    .allocate_ahead(target_desc, graph.record(tid), tid)
                    .ok_or_else(|| SeedError::MissingKey {
                        entity: target_desc.name.clone(),
                        ident: graph.ident(tid, target_desc.key_column()),
                        column: target_desc.key_column().to_string(),
                    })?;
                SqlExpr::Literal(key)
            }
        };

        let mut row = Statement::insert(join.table.clone());
        row.set(&join.owner_column, resolver.materialize(&owner_ref));
        row.set(&join.target_column, target_expr);
        if relation.cardinality == Cardinality::OrderedMany
            && let Some(order_column) = &join.order_column
        {
            row.set(order_column, SqlExpr::Literal(Value::Int(position as i64)));
        }
        if let (Some(key_column), Some(map_key)) = (&join.key_column, map_key) {
            row.set(key_column, SqlExpr::Literal(map_key));
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Build the compensating Update for one deferred cyclic column.
pub(crate) fn build_deferred_update(
    graph: &RecordGraph,
    schema: &Schema,
    resolver: &ReferenceResolver,
    update: &DeferredUpdate,
) -> SeedResult<Statement> {
    let source_desc = schema.describe(graph.record(update.source).entity())?;
    let source_ref = resolver.resolved(update.source).ok_or_else(|| {
        SeedError::model(format!(
            "deferred update for relation '{}' names an unwritten source row",
            update.relation
        ))
    })?;
    let target_ref = resolver.resolved(update.target).ok_or_else(|| {
        SeedError::model(format!(
            "deferred update for relation '{}' names an unwritten target row",
            update.relation
        ))
    })?;
    let mut stmt = Statement::update(
        update.table.clone(),
        source_desc.key_column(),
        resolver.materialize(source_ref),
    );
    stmt.set(&update.fk_column, resolver.materialize(target_ref));
    Ok(stmt)
}

fn relation_model_error(
    descriptor: &EntityDescriptor,
    relation: &RelationDescriptor,
    detail: &str,
) -> SeedError {
    SeedError::model(format!(
        "Entity '{}', relation '{}': {detail}",
        descriptor.name, relation.name
    ))
}

//! The orchestrating traversal engine.
//!
//! One [`GraphWriter`] is one generation session: it owns the visitation map
//! and the identifier counters, walks the graph depth-first from each root,
//! and hands finished statements to the sink in a total, cycle-safe order.
//!
//! Per record the state machine is Unvisited → InProgress → Written, with
//! Written permanent for the run. Owning relation targets are recursed before
//! the record's own insert (a referenced row must exist first); inverse
//! relation targets are recursed after it (they reference *this* row).
//! Hitting an in-progress record through an owning relation is a cycle: the
//! FK column is emitted NULL and patched by exactly one compensating Update
//! once the in-progress record finishes, or inlined with a pre-allocated key
//! when the column cannot be NULL (see the builder module).
//!
//! A session is a single logical writer: synchronous, single-threaded, abort
//! on first error with no partial-success mode. Independent sessions may run
//! concurrently only with their own resolver and allocator, which this type
//! guarantees by owning both.

use std::sync::Arc;

use tracing::{debug, info};

use crate::allocator::{AllocatedKey, IdentifierAllocator};
use crate::builder;
use crate::dialect::Dialect;
use crate::error::{SeedError, SeedResult};
use crate::graph::{RecordGraph, RecordId};
use crate::resolver::{ReferenceResolver, ResolvedReference, WriteState};
use crate::schema::{IdentifierStrategy, Schema};
use crate::sink::StatementSink;
use crate::statement::Statement;

/// One generation session over one record graph.
pub struct GraphWriter<'a, S: StatementSink> {
    schema: &'a Schema,
    graph: &'a RecordGraph,
    dialect: Dialect,
    resolver: ReferenceResolver,
    allocator: IdentifierAllocator,
    sink: S,
    statements_emitted: u64,
}

impl<'a, S: StatementSink> GraphWriter<'a, S> {
    /// Start a session. Fails with a model error before anything is emitted
    /// when the schema asks for a capability the dialect lacks.
    pub fn new(
        schema: &'a Schema,
        graph: &'a RecordGraph,
        dialect: Dialect,
        sink: S,
    ) -> SeedResult<Self> {
        for entity in schema.entities() {
            if matches!(entity.identifier, IdentifierStrategy::Sequence { .. })
                && !dialect.supports_sequences()
            {
                return Err(SeedError::model(format!(
                    "Entity '{}' uses a sequence but the {dialect:?} dialect has none",
                    entity.name
                )));
            }
        }
        Ok(Self {
            schema,
            graph,
            dialect,
            resolver: ReferenceResolver::new(),
            allocator: IdentifierAllocator::new(),
            sink,
            statements_emitted: 0,
        })
    }

    /// Write the closure of everything reachable from `root`, returning the
    /// root's key reference. Idempotent within the run: a root already
    /// written produces no further statements.
    pub fn write(&mut self, root: RecordId) -> SeedResult<ResolvedReference> {
        self.write_record(root)?;
        self.resolver
            .resolved(root)
            .cloned()
            .ok_or_else(|| SeedError::model("root record was not written"))
    }

    /// Write several roots in order, sharing one visitation map.
    pub fn write_all(&mut self, roots: impl IntoIterator<Item = RecordId>) -> SeedResult<()> {
        for root in roots {
            self.write(root)?;
        }
        Ok(())
    }

    /// Ask the sink to flush buffered statements now.
    pub fn flush(&mut self) -> SeedResult<()> {
        self.sink.flush()
    }

    /// Flush and close the sink, ending the session.
    pub fn finish(mut self) -> SeedResult<S> {
        self.sink.flush()?;
        self.sink.close()?;
        info!(
            records = self.resolver.written_count(),
            statements = self.statements_emitted,
            "generation run finished"
        );
        Ok(self.sink)
    }

    /// Statements handed to the sink so far.
    pub fn statements_emitted(&self) -> u64 {
        self.statements_emitted
    }

    fn write_record(&mut self, id: RecordId) -> SeedResult<()> {
        if matches!(self.resolver.state(id), Some(WriteState::Written(_))) {
            return Ok(());
        }
        if !self.resolver.mark_in_progress(id) {
            // Already on the DFS stack; the ancestor call finishes it.
            return Ok(());
        }

        let descriptor = Arc::clone(self.schema.describe(self.graph.record(id).entity())?);

        // Dependencies first: rows referenced by this record's own columns or
        // join rows must precede it in the emitted sequence.
        for relation in descriptor.relations.iter().filter(|r| r.owning) {
            if let Some(target) = self.graph.record(id).relation(&relation.name) {
                for tid in target.ids() {
                    self.write_record(tid)?;
                }
            }
        }

        let ident = self.graph.ident(id, descriptor.key_column());
        let key = self
            .allocator
            .allocate(&descriptor, self.graph.record(id), id, &ident)?;

        // The reference other rows will use for this record's key. Sequence
        // draws are noted before the insert is built so that same-sequence
        // references inside this very statement offset past this row's draw.
        let reference = match &key {
            AllocatedKey::Concrete(v) => ResolvedReference::Concrete(v.clone()),
            AllocatedKey::Identity => ResolvedReference::RowRef {
                table: descriptor.table.clone(),
                key_column: descriptor.key_column().to_string(),
                seq: self.resolver.table_count(&descriptor.table),
            },
            AllocatedKey::Sequence { name, increment } => ResolvedReference::SequenceRef {
                sequence: name.clone(),
                increment: *increment,
                seq: self.resolver.note_sequence_draw(name),
            },
        };

        let primary = builder::build_primary(
            self.graph,
            self.schema,
            &self.dialect,
            &mut self.resolver,
            &mut self.allocator,
            &descriptor,
            id,
            &key,
        )?;
        self.emit(&primary)?;
        self.resolver.note_insert(&descriptor.table);
        self.resolver.mark_written(id, reference);
        self.resolver.clear_in_progress(id);

        // Join rows follow their owner row immediately.
        for relation in descriptor
            .relations
            .iter()
            .filter(|r| r.owning && r.cardinality.is_many())
        {
            let rows = builder::build_join_rows(
                self.graph,
                self.schema,
                &mut self.resolver,
                &mut self.allocator,
                &descriptor,
                id,
                relation,
            )?;
            for row in rows {
                self.emit(&row)?;
                self.resolver.note_insert(&row.table);
            }
        }

        // Close every cycle edge that was waiting for this record's key.
        for deferred in self.resolver.take_deferred_for(id) {
            let update =
                builder::build_deferred_update(self.graph, self.schema, &self.resolver, &deferred)?;
            self.emit(&update)?;
        }

        // Dependents last: inverse relation targets reference this row.
        for relation in descriptor.relations.iter().filter(|r| !r.owning) {
            if let Some(target) = self.graph.record(id).relation(&relation.name) {
                for tid in target.ids() {
                    self.write_record(tid)?;
                }
            }
        }

        Ok(())
    }

    fn emit(&mut self, statement: &Statement) -> SeedResult<()> {
        debug!(table = %statement.table, kind = ?statement.kind, "emitting statement");
        self.sink.write(statement, &self.dialect)?;
        self.statements_emitted += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Cardinality, EntityDescriptor, RelationDescriptor};
    use crate::sink::MemorySink;
    use crate::value::ValueType;

    fn simulated(column: &str) -> IdentifierStrategy {
        IdentifierStrategy::SimulatedCounter {
            column: column.into(),
            start: 1,
            increment: 1,
        }
    }

    fn library_schema() -> Schema {
        let author = EntityDescriptor::build("author", "authors")
            .column("name", ValueType::Text)
            .relation(RelationDescriptor::inverse(
                "books",
                "book",
                Cardinality::UnorderedMany,
            ))
            .identifier(simulated("id"))
            .finish()
            .unwrap();
        let book = EntityDescriptor::build("book", "books")
            .column("title", ValueType::Text)
            .relation(RelationDescriptor::single("author", "author", "author_id"))
            .identifier(simulated("id"))
            .finish()
            .unwrap();
        Schema::builder()
            .entity(author)
            .entity(book)
            .finish()
            .unwrap()
    }

    #[test]
    fn dependency_comes_before_dependent() {
        let schema = library_schema();
        let mut graph = RecordGraph::new();
        let book = graph.add("book");
        let author = graph.add("author");
        graph.set(book, "title", "Ficciones");
        graph.set(author, "name", "Borges");
        graph.relate(book, "author", author);

        let mut writer =
            GraphWriter::new(&schema, &graph, Dialect::Postgres, MemorySink::new()).unwrap();
        writer.write(book).unwrap();
        let sink = writer.finish().unwrap();
        let sql = sink.sql();
        assert_eq!(sql.len(), 2);
        assert!(sql[0].starts_with("INSERT INTO authors"));
        assert_eq!(
            sql[1],
            "INSERT INTO books (id, title, author_id) VALUES (1, 'Ficciones', 1)"
        );
    }

    #[test]
    fn inverse_relation_pulls_dependents_after_the_row() {
        let schema = library_schema();
        let mut graph = RecordGraph::new();
        let author = graph.add("author");
        graph.set(author, "name", "Borges");
        for title in ["Ficciones", "El Aleph"] {
            let book = graph.add("book");
            graph.set(book, "title", title);
            graph.relate(book, "author", author);
            graph.push_related(author, "books", book);
        }

        let mut writer =
            GraphWriter::new(&schema, &graph, Dialect::Postgres, MemorySink::new()).unwrap();
        writer.write(author).unwrap();
        let sink = writer.finish().unwrap();
        let sql = sink.sql();
        assert_eq!(sql.len(), 3);
        assert!(sql[0].starts_with("INSERT INTO authors"));
        assert!(sql[1].contains("'Ficciones'") && sql[1].contains("author_id"));
        assert!(sql[2].contains("'El Aleph'"));
    }

    #[test]
    fn writing_the_same_root_twice_emits_nothing_new() {
        let schema = library_schema();
        let mut graph = RecordGraph::new();
        let author = graph.add("author");
        graph.set(author, "name", "Borges");

        let mut writer =
            GraphWriter::new(&schema, &graph, Dialect::Postgres, MemorySink::new()).unwrap();
        let first = writer.write(author).unwrap();
        let second = writer.write(author).unwrap();
        assert_eq!(first, second);
        assert_eq!(writer.statements_emitted(), 1);
    }

    #[test]
    fn sequence_schema_needs_a_sequence_dialect() {
        let order = EntityDescriptor::build("order", "orders")
            .identifier(IdentifierStrategy::Sequence {
                column: "id".into(),
                name: "order_seq".into(),
                increment: 1,
            })
            .finish()
            .unwrap();
        let schema = Schema::builder().entity(order).finish().unwrap();
        let graph = RecordGraph::new();
        let err = GraphWriter::new(&schema, &graph, Dialect::Sqlite, MemorySink::new());
        assert!(err.is_err());
        assert!(GraphWriter::new(&schema, &graph, Dialect::Postgres, MemorySink::new()).is_ok());
    }
}

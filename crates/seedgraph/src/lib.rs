//! # seedgraph
//!
//! Compile an in-memory, possibly cyclic graph of records into an ordered
//! sequence of SQL statements that recreates the graph — correct foreign
//! keys, correct primary keys — without a live database connection.
//!
//! ## How it fits together
//!
//! - **Metadata is plain data**: build a [`Schema`] of [`EntityDescriptor`]s
//!   (table, columns, relations, identifier strategy) up front; the core
//!   performs no reflection.
//! - **Records live in an arena**: a [`RecordGraph`] hands out [`RecordId`]s,
//!   so cycles are just indices pointing back at each other.
//! - **One session, one writer**: a [`GraphWriter`] walks the graph
//!   depth-first, allocates or defers primary keys per entity strategy,
//!   renders values through a [`Dialect`], and emits [`Statement`]s to a
//!   [`StatementSink`].
//! - **No connection needed**: keys the database would generate are
//!   referenced through "last inserted row" / sequence-current expressions
//!   that are valid at the point the statement executes.
//!
//! ```ignore
//! use seedgraph::{
//!     Dialect, EntityDescriptor, GraphWriter, IdentifierStrategy, RecordGraph,
//!     RelationDescriptor, Schema, ScriptSink, ValueType,
//! };
//!
//! let author = EntityDescriptor::build("author", "authors")
//!     .column("name", ValueType::Text)
//!     .identifier(IdentifierStrategy::SimulatedCounter {
//!         column: "id".into(), start: 1, increment: 1,
//!     })
//!     .finish()?;
//! let book = EntityDescriptor::build("book", "books")
//!     .column("title", ValueType::Text)
//!     .relation(RelationDescriptor::single("author", "author", "author_id"))
//!     .identifier(IdentifierStrategy::SimulatedCounter {
//!         column: "id".into(), start: 1, increment: 1,
//!     })
//!     .finish()?;
//! let schema = Schema::builder().entity(author).entity(book).finish()?;
//!
//! let mut graph = RecordGraph::new();
//! let a = graph.add("author");
//! graph.set(a, "name", "Borges");
//! let b = graph.add("book");
//! graph.set(b, "title", "Ficciones");
//! graph.relate(b, "author", a);
//!
//! let sink = ScriptSink::new(std::io::stdout()).transaction();
//! let mut writer = GraphWriter::new(&schema, &graph, Dialect::Postgres, sink)?;
//! writer.write(b)?;
//! writer.finish()?;
//! # Ok::<(), seedgraph::SeedError>(())
//! ```
//!
//! A run either fully emits the closure of its roots or aborts on the first
//! error; nothing is retried and no partial-success mode exists.

pub mod allocator;
mod builder;
pub mod dialect;
pub mod error;
pub mod graph;
pub mod ident;
pub mod resolver;
pub mod schema;
pub mod sink;
pub mod statement;
pub mod value;
pub mod writer;

pub use allocator::{AllocatedKey, IdentifierAllocator};
pub use dialect::Dialect;
pub use error::{SeedError, SeedResult};
pub use graph::{Record, RecordGraph, RecordId, RelationTarget};
pub use ident::{Ident, QuoteStyle};
pub use resolver::{DeferredUpdate, ReferenceResolver, ResolvedReference, WriteState};
pub use schema::{
    Cardinality, ColumnDescriptor, EntityDescriptor, IdentifierStrategy, JoinTable,
    RelationDescriptor, Schema,
};
pub use sink::{ChangelogSink, MemorySink, ScriptSink, StatementSink};
pub use statement::{SqlExpr, Statement, StatementKind};
pub use value::{Value, ValueType};
pub use writer::GraphWriter;

//! Statement sinks.
//!
//! The writer hands every finished [`Statement`] to a [`StatementSink`], in
//! emission order; a sink may buffer or batch but must preserve that order
//! in its backing store and surface write errors synchronously at the next
//! `write`, `flush`, or `close`. No statement is silently dropped.

use std::io::Write;

use crate::dialect::Dialect;
use crate::error::SeedResult;
use crate::statement::{Statement, StatementKind};

/// Consumer of emitted statements.
pub trait StatementSink {
    fn write(&mut self, statement: &Statement, dialect: &Dialect) -> SeedResult<()>;

    fn flush(&mut self) -> SeedResult<()> {
        Ok(())
    }

    /// Called once, at the end of a successful run.
    fn close(&mut self) -> SeedResult<()> {
        Ok(())
    }
}

/// Renders one terminated SQL statement per line into any `io::Write`,
/// optionally framed in a transaction.
#[derive(Debug)]
pub struct ScriptSink<W: Write> {
    out: W,
    terminator: String,
    transaction: bool,
    begun: bool,
}

impl<W: Write> ScriptSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            terminator: ";".to_string(),
            transaction: false,
            begun: false,
        }
    }

    /// Frame the script in `BEGIN;` / `COMMIT;`.
    pub fn transaction(mut self) -> Self {
        self.transaction = true;
        self
    }

    /// Override the statement terminator (e.g. `;\nGO` style batches).
    pub fn terminator(mut self, terminator: &str) -> Self {
        self.terminator = terminator.to_string();
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> StatementSink for ScriptSink<W> {
    fn write(&mut self, statement: &Statement, dialect: &Dialect) -> SeedResult<()> {
        if self.transaction && !self.begun {
            writeln!(self.out, "BEGIN{}", self.terminator)?;
            self.begun = true;
        }
        let sql = statement.render(dialect)?;
        writeln!(self.out, "{sql}{}", self.terminator)?;
        Ok(())
    }

    fn flush(&mut self) -> SeedResult<()> {
        self.out.flush()?;
        Ok(())
    }

    fn close(&mut self) -> SeedResult<()> {
        if self.transaction && self.begun {
            writeln!(self.out, "COMMIT{}", self.terminator)?;
        }
        self.out.flush()?;
        Ok(())
    }
}

/// Buffers rendered statements in memory; the programmatic / test sink.
#[derive(Debug, Default)]
pub struct MemorySink {
    statements: Vec<(StatementKind, String)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn statements(&self) -> &[(StatementKind, String)] {
        &self.statements
    }

    /// Rendered SQL, in emission order.
    pub fn sql(&self) -> Vec<&str> {
        self.statements.iter().map(|(_, s)| s.as_str()).collect()
    }

    pub fn count_of(&self, kind: StatementKind) -> usize {
        self.statements.iter().filter(|(k, _)| *k == kind).count()
    }
}

impl StatementSink for MemorySink {
    fn write(&mut self, statement: &Statement, dialect: &Dialect) -> SeedResult<()> {
        let sql = statement.render(dialect)?;
        self.statements.push((statement.kind, sql));
        Ok(())
    }
}

/// Groups statements into named change-sets in a SQL-formatted changelog.
///
/// Statements written before the first [`ChangelogSink::change_set`] call go
/// into an implicit numbered set.
#[derive(Debug)]
pub struct ChangelogSink<W: Write> {
    out: W,
    author: String,
    next_id: usize,
    pending_name: Option<String>,
    header_written: bool,
}

impl<W: Write> ChangelogSink<W> {
    pub fn new(out: W, author: &str) -> Self {
        Self {
            out,
            author: author.to_string(),
            next_id: 1,
            pending_name: None,
            header_written: false,
        }
    }

    /// Start a new named change-set; takes effect at the next statement.
    pub fn change_set(&mut self, name: &str) {
        self.pending_name = Some(name.to_string());
        self.header_written = false;
    }

    fn ensure_header(&mut self) -> SeedResult<()> {
        if self.header_written {
            return Ok(());
        }
        let name = match self.pending_name.take() {
            Some(name) => name,
            None => {
                let name = self.next_id.to_string();
                self.next_id += 1;
                name
            }
        };
        writeln!(self.out, "--changeset {}:{}", self.author, name)?;
        self.header_written = true;
        Ok(())
    }
}

impl<W: Write> StatementSink for ChangelogSink<W> {
    fn write(&mut self, statement: &Statement, dialect: &Dialect) -> SeedResult<()> {
        self.ensure_header()?;
        let sql = statement.render(dialect)?;
        writeln!(self.out, "{sql};")?;
        Ok(())
    }

    fn flush(&mut self) -> SeedResult<()> {
        self.out.flush()?;
        Ok(())
    }

    fn close(&mut self) -> SeedResult<()> {
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::Ident;
    use crate::statement::SqlExpr;
    use crate::value::Value;

    fn stmt(table: &str, n: i64) -> Statement {
        let mut s = Statement::insert(Ident::parse(table).unwrap());
        s.set("id", SqlExpr::Literal(Value::Int(n)));
        s
    }

    #[test]
    fn script_sink_one_statement_per_line() {
        let mut sink = ScriptSink::new(Vec::new());
        sink.write(&stmt("a", 1), &Dialect::Postgres).unwrap();
        sink.write(&stmt("b", 2), &Dialect::Postgres).unwrap();
        sink.close().unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(
            text,
            "INSERT INTO a (id) VALUES (1);\nINSERT INTO b (id) VALUES (2);\n"
        );
    }

    #[test]
    fn script_sink_transaction_framing() {
        let mut sink = ScriptSink::new(Vec::new()).transaction();
        sink.write(&stmt("a", 1), &Dialect::Postgres).unwrap();
        sink.close().unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert!(text.starts_with("BEGIN;\n"));
        assert!(text.ends_with("COMMIT;\n"));
    }

    #[test]
    fn changelog_sink_groups_into_change_sets() {
        let mut sink = ChangelogSink::new(Vec::new(), "seed");
        sink.write(&stmt("a", 1), &Dialect::Postgres).unwrap();
        sink.change_set("fixtures");
        sink.write(&stmt("b", 2), &Dialect::Postgres).unwrap();
        sink.write(&stmt("b", 3), &Dialect::Postgres).unwrap();
        sink.close().unwrap();
        let text = String::from_utf8(sink.out).unwrap();
        assert_eq!(text.matches("--changeset").count(), 2);
        assert!(text.contains("--changeset seed:1\n"));
        assert!(text.contains("--changeset seed:fixtures\n"));
    }

    #[test]
    fn memory_sink_counts_kinds() {
        let mut sink = MemorySink::new();
        sink.write(&stmt("a", 1), &Dialect::Postgres).unwrap();
        assert_eq!(sink.count_of(StatementKind::Insert), 1);
        assert_eq!(sink.count_of(StatementKind::Update), 0);
        assert_eq!(sink.sql(), vec!["INSERT INTO a (id) VALUES (1)"]);
    }
}

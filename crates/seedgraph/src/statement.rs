//! Emitted statements and their value expressions.
//!
//! A [`Statement`] is one table write: an ordered column → expression map plus
//! a kind (Insert or Update) and, for updates, a primary-key predicate.
//! Expressions stay symbolic until [`Statement::render`] turns them into SQL
//! text through a dialect, so sinks can re-render or inspect them.

use indexmap::IndexMap;

use crate::dialect::Dialect;
use crate::error::{SeedError, SeedResult};
use crate::ident::Ident;
use crate::value::Value;

/// A value expression in a column position.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlExpr {
    /// A literal, rendered by the dialect (includes the NULL and temporal
    /// sentinel cases).
    Literal(Value),
    /// Key of the most recently inserted row in `table`, `rows_back` rows
    /// back. The connection-less stand-in for a generated key.
    LastInsert {
        table: Ident,
        key_column: String,
        rows_back: u32,
    },
    /// Most recently drawn sequence value, minus `offset`.
    SequenceCurrent { sequence: String, offset: i64 },
    /// Draw the next sequence value inline.
    SequenceNext(String),
}

impl SqlExpr {
    pub fn null() -> Self {
        Self::Literal(Value::Null)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Literal(Value::Null))
    }

    pub fn render(&self, dialect: &Dialect) -> SeedResult<String> {
        match self {
            Self::Literal(Value::Float(f)) if !f.is_finite() => Err(SeedError::model(format!(
                "non-finite float {f} has no SQL literal"
            ))),
            Self::Literal(v) => Ok(dialect.literal(v)),
            Self::LastInsert {
                table,
                key_column,
                rows_back,
            } => Ok(dialect.last_insert_expr(table, key_column, *rows_back)),
            Self::SequenceCurrent { sequence, offset } => {
                let current = dialect.current_sequence_value(sequence)?;
                if *offset == 0 {
                    Ok(current)
                } else {
                    Ok(format!("({current} - {offset})"))
                }
            }
            Self::SequenceNext(sequence) => dialect.next_sequence_value(sequence),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Insert,
    Update,
}

/// One table write, ready to be rendered against a dialect.
#[derive(Debug, Clone)]
pub struct Statement {
    pub table: Ident,
    pub kind: StatementKind,
    /// Column → expression, in descriptor order.
    pub columns: IndexMap<String, SqlExpr>,
    /// `WHERE column = expr` predicate (updates only).
    pub predicate: Option<(String, SqlExpr)>,
}

impl Statement {
    pub fn insert(table: Ident) -> Self {
        Self {
            table,
            kind: StatementKind::Insert,
            columns: IndexMap::new(),
            predicate: None,
        }
    }

    pub fn update(table: Ident, predicate_column: &str, predicate: SqlExpr) -> Self {
        Self {
            table,
            kind: StatementKind::Update,
            columns: IndexMap::new(),
            predicate: Some((predicate_column.to_string(), predicate)),
        }
    }

    /// Set a column expression. Last write per column wins.
    pub fn set(&mut self, column: &str, expr: SqlExpr) {
        self.columns.insert(column.to_string(), expr);
    }

    /// Render as a single SQL statement, without trailing terminator.
    pub fn render(&self, dialect: &Dialect) -> SeedResult<String> {
        let table = dialect.quote(&self.table);
        match self.kind {
            StatementKind::Insert => {
                if self.columns.is_empty() {
                    return Ok(format!("INSERT INTO {table} DEFAULT VALUES"));
                }
                let cols: Vec<String> = self
                    .columns
                    .keys()
                    .map(|c| dialect.quote_column(c))
                    .collect();
                let vals = self
                    .columns
                    .values()
                    .map(|e| e.render(dialect))
                    .collect::<SeedResult<Vec<_>>>()?;
                Ok(format!(
                    "INSERT INTO {table} ({}) VALUES ({})",
                    cols.join(", "),
                    vals.join(", ")
                ))
            }
            StatementKind::Update => {
                let sets = self
                    .columns
                    .iter()
                    .map(|(c, e)| Ok(format!("{} = {}", dialect.quote_column(c), e.render(dialect)?)))
                    .collect::<SeedResult<Vec<_>>>()?;
                let mut sql = format!("UPDATE {table} SET {}", sets.join(", "));
                if let Some((col, expr)) = &self.predicate {
                    sql.push_str(&format!(
                        " WHERE {} = {}",
                        dialect.quote_column(col),
                        expr.render(dialect)?
                    ));
                }
                Ok(sql)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str) -> Ident {
        Ident::parse(name).unwrap()
    }

    #[test]
    fn render_insert() {
        let mut stmt = Statement::insert(table("authors"));
        stmt.set("id", SqlExpr::Literal(Value::Int(1)));
        stmt.set("name", SqlExpr::Literal(Value::Text("Borges".into())));
        assert_eq!(
            stmt.render(&Dialect::Postgres).unwrap(),
            "INSERT INTO authors (id, name) VALUES (1, 'Borges')"
        );
    }

    #[test]
    fn render_empty_insert() {
        let stmt = Statement::insert(table("audit_log"));
        assert_eq!(
            stmt.render(&Dialect::Postgres).unwrap(),
            "INSERT INTO audit_log DEFAULT VALUES"
        );
    }

    #[test]
    fn render_update_with_predicate() {
        let mut stmt = Statement::update(table("employees"), "id", SqlExpr::Literal(Value::Int(2)));
        stmt.set("manager_id", SqlExpr::Literal(Value::Int(1)));
        assert_eq!(
            stmt.render(&Dialect::Postgres).unwrap(),
            "UPDATE employees SET manager_id = 1 WHERE id = 2"
        );
    }

    #[test]
    fn render_last_insert_reference() {
        let mut stmt = Statement::insert(table("books"));
        stmt.set(
            "author_id",
            SqlExpr::LastInsert {
                table: table("authors"),
                key_column: "id".into(),
                rows_back: 0,
            },
        );
        assert_eq!(
            stmt.render(&Dialect::Postgres).unwrap(),
            "INSERT INTO books (author_id) VALUES ((SELECT max(id) FROM authors))"
        );
    }

    #[test]
    fn render_sequence_expressions() {
        let mut stmt = Statement::insert(table("orders"));
        stmt.set("id", SqlExpr::SequenceNext("order_seq".into()));
        stmt.set(
            "parent_id",
            SqlExpr::SequenceCurrent {
                sequence: "order_seq".into(),
                offset: 2,
            },
        );
        assert_eq!(
            stmt.render(&Dialect::Postgres).unwrap(),
            "INSERT INTO orders (id, parent_id) VALUES (nextval('order_seq'), (currval('order_seq') - 2))"
        );
        assert!(stmt.render(&Dialect::Mysql).is_err());
    }

    #[test]
    fn mixed_case_column_is_quoted() {
        let mut stmt = Statement::insert(table("t"));
        stmt.set("Order", SqlExpr::Literal(Value::Int(1)));
        assert_eq!(
            stmt.render(&Dialect::Postgres).unwrap(),
            "INSERT INTO t (\"Order\") VALUES (1)"
        );
        assert_eq!(
            stmt.render(&Dialect::Mysql).unwrap(),
            "INSERT INTO t (`Order`) VALUES (1)"
        );
    }

    #[test]
    fn non_finite_float_does_not_render() {
        let mut stmt = Statement::insert(table("t"));
        stmt.set("x", SqlExpr::Literal(Value::Float(f64::NAN)));
        assert!(stmt.render(&Dialect::Postgres).is_err());
    }

    #[test]
    fn column_order_is_insertion_order() {
        let mut stmt = Statement::insert(table("t"));
        stmt.set("b", SqlExpr::Literal(Value::Int(2)));
        stmt.set("a", SqlExpr::Literal(Value::Int(1)));
        let sql = stmt.render(&Dialect::Postgres).unwrap();
        assert!(sql.starts_with("INSERT INTO t (b, a)"));
    }
}

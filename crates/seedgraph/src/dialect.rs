//! Target-database dialects.
//!
//! A [`Dialect`] is a pure value-rendering strategy: typed values in, SQL
//! literal text out, plus sequence expressions, identifier quoting and the
//! capability flags the allocator and statement builder consult. Dialects are
//! tagged variants passed explicitly into a session; there is no provider
//! registry.

use crate::error::{SeedError, SeedResult};
use crate::ident::{Ident, QuoteStyle};
use crate::value::Value;

/// Target database flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Mysql,
    Sqlite,
    /// Plain SQL:2008; sequences via `NEXT VALUE FOR`.
    Ansi,
}

impl Dialect {
    pub fn quote_style(&self) -> QuoteStyle {
        match self {
            Self::Mysql => QuoteStyle::Backtick,
            _ => QuoteStyle::DoubleQuote,
        }
    }

    /// Render an identifier with this dialect's quoting convention.
    pub fn quote(&self, ident: &Ident) -> String {
        ident.render(self.quote_style())
    }

    /// Render a bare column name. Names outside the plain lower-case
    /// identifier set (e.g. `Order`) are quoted; lower-case reserved words
    /// must be renamed or pre-quoted in the schema.
    pub fn quote_column(&self, name: &str) -> String {
        let plain = !name.is_empty()
            && name.chars().enumerate().all(|(i, c)| {
                c == '_'
                    || c.is_ascii_lowercase()
                    || (i > 0 && (c.is_ascii_digit() || c == '$'))
            });
        if plain {
            return name.to_string();
        }
        match self.quote_style() {
            QuoteStyle::DoubleQuote => format!("\"{}\"", name.replace('"', "\"\"")),
            QuoteStyle::Backtick => format!("`{}`", name.replace('`', "``")),
        }
    }

    pub fn supports_sequences(&self) -> bool {
        matches!(self, Self::Postgres | Self::Ansi)
    }

    pub fn supports_identity_columns(&self) -> bool {
        true
    }

    /// Whether FK constraints can be declared deferrable, allowing a cyclic
    /// column to reference a row inserted later in the same transaction.
    pub fn supports_deferred_constraints(&self) -> bool {
        matches!(self, Self::Postgres | Self::Sqlite | Self::Ansi)
    }

    /// Oracle-style dialects treat `''` as NULL. None of the shipped variants
    /// do, but the statement builder honors the flag.
    pub fn empty_string_is_null(&self) -> bool {
        false
    }

    /// Render one typed value as a SQL literal.
    pub fn literal(&self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => match self {
                Self::Sqlite => if *b { "1" } else { "0" }.to_string(),
                _ => if *b { "TRUE" } else { "FALSE" }.to_string(),
            },
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Decimal(d) => d.to_string(),
            Value::Text(s) => self.string_literal(s),
            Value::Bytes(b) => {
                let hex = to_hex(b);
                match self {
                    Self::Postgres => format!("'\\x{hex}'"),
                    _ => format!("X'{hex}'"),
                }
            }
            Value::Uuid(u) => format!("'{u}'"),
            Value::Date(d) => format!("'{}'", d.format("%Y-%m-%d")),
            Value::Time(t) => format!("'{}'", t.format("%H:%M:%S%.f")),
            Value::Timestamp(ts) => format!("'{}'", ts.format("%Y-%m-%d %H:%M:%S%.f")),
            Value::TimestampTz(ts) => format!("'{}'", ts.format("%Y-%m-%d %H:%M:%S%.f+00:00")),
            Value::Json(j) => self.string_literal(&j.to_string()),
            Value::Now => match self {
                Self::Mysql => "NOW()".to_string(),
                _ => "CURRENT_TIMESTAMP".to_string(),
            },
            Value::RelativeNow { seconds } => match self {
                Self::Postgres => format!("CURRENT_TIMESTAMP + INTERVAL '{seconds} seconds'"),
                Self::Mysql => format!("DATE_ADD(NOW(), INTERVAL {seconds} SECOND)"),
                Self::Sqlite => format!("DATETIME('now', '{seconds:+} seconds')"),
                Self::Ansi => format!("CURRENT_TIMESTAMP + INTERVAL '{seconds}' SECOND"),
            },
            Value::RelativeDate { days } => match self {
                Self::Postgres => format!("CURRENT_DATE + {days}"),
                Self::Mysql => format!("DATE_ADD(CURDATE(), INTERVAL {days} DAY)"),
                Self::Sqlite => format!("DATE('now', '{days:+} days')"),
                Self::Ansi => format!("CURRENT_DATE + INTERVAL '{days}' DAY"),
            },
        }
    }

    /// "Draw the next value of this sequence" expression.
    pub fn next_sequence_value(&self, name: &str) -> SeedResult<String> {
        match self {
            Self::Postgres => Ok(format!("nextval('{name}')")),
            Self::Ansi => Ok(format!("NEXT VALUE FOR {name}")),
            _ => Err(SeedError::model(format!(
                "{self:?} dialect does not support sequences (sequence '{name}')"
            ))),
        }
    }

    /// "Most recently drawn value of this sequence" expression.
    pub fn current_sequence_value(&self, name: &str) -> SeedResult<String> {
        match self {
            Self::Postgres => Ok(format!("currval('{name}')")),
            Self::Ansi => Ok(format!("PREVIOUS VALUE FOR {name}")),
            _ => Err(SeedError::model(format!(
                "{self:?} dialect does not support sequences (sequence '{name}')"
            ))),
        }
    }

    /// "Key of the most recently inserted row in `table`, `rows_back` rows
    /// back" expression, used verbatim in a foreign-key value position.
    ///
    /// Correct against pre-existing rows because it reads the running maximum
    /// at execution time, in emission order.
    pub fn last_insert_expr(&self, table: &Ident, key_column: &str, rows_back: u32) -> String {
        let table = self.quote(table);
        let key_column = self.quote_column(key_column);
        if rows_back == 0 {
            return format!("(SELECT max({key_column}) FROM {table})");
        }
        match self {
            Self::Ansi => format!(
                "(SELECT {key_column} FROM {table} ORDER BY {key_column} DESC \
                 OFFSET {rows_back} ROWS FETCH NEXT 1 ROWS ONLY)"
            ),
            _ => format!(
                "(SELECT {key_column} FROM {table} ORDER BY {key_column} DESC \
                 LIMIT 1 OFFSET {rows_back})"
            ),
        }
    }

    fn string_literal(&self, s: &str) -> String {
        let mut out = String::with_capacity(s.len() + 2);
        out.push('\'');
        for ch in s.chars() {
            match ch {
                '\'' => out.push_str("''"),
                // MySQL treats backslash as an escape character by default.
                '\\' if matches!(self, Self::Mysql) => out.push_str("\\\\"),
                _ => out.push(ch),
            }
        }
        out.push('\'');
        out
    }
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

//! SQL identifier handling.
//!
//! [`Ident`] represents a table or column name, supporting dotted notation
//! (`schema.table`) and quoted parts (`"CamelCase"`). Parsing always uses
//! double quotes; rendering goes through a [`QuoteStyle`] so that dialects
//! with a different quote character (MySQL backticks) come out right.
//!
//! - Unquoted parts are validated against `[A-Za-z_][A-Za-z0-9_$]*`
//! - Quoted parts allow any characters except NUL

use serde::{Deserialize, Serialize};

use crate::error::{SeedError, SeedResult};

/// Identifier quoting convention of a dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteStyle {
    /// `"name"`, quote escaped by doubling (standard SQL)
    DoubleQuote,
    /// `` `name` ``, backtick escaped by doubling (MySQL)
    Backtick,
}

impl QuoteStyle {
    fn quote_char(self) -> char {
        match self {
            Self::DoubleQuote => '"',
            Self::Backtick => '`',
        }
    }
}

/// A part of a SQL identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentPart {
    /// Unquoted: must match `[A-Za-z_][A-Za-z0-9_$]*`.
    Unquoted(String),
    /// Quoted: any characters except NUL, rendered inside the dialect's quotes.
    Quoted(String),
}

/// A SQL identifier (column, table, or schema-qualified table name).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ident {
    parts: Vec<IdentPart>,
}

impl Ident {
    /// Parse an identifier string, supporting dotted and quoted forms.
    ///
    /// - Dotted: `schema.table`
    /// - Quoted: `"CamelCase"."OrderLine"`
    /// - Mixed: `public."OrderLine"`
    pub fn parse(s: &str) -> SeedResult<Self> {
        if s.is_empty() {
            return Err(SeedError::model("Identifier cannot be empty"));
        }
        if s.contains('\0') {
            return Err(SeedError::model("Identifier cannot contain NUL character"));
        }

        let mut parts = Vec::new();
        let mut chars = s.chars().peekable();

        while chars.peek().is_some() {
            if !parts.is_empty() {
                match chars.next() {
                    Some('.') => {
                        if chars.peek().is_none() {
                            return Err(SeedError::model("Trailing '.' in identifier"));
                        }
                    }
                    Some(c) => {
                        return Err(SeedError::model(format!(
                            "Expected '.' between identifier parts, got '{c}'"
                        )));
                    }
                    None => break,
                }
            }

            if chars.peek() == Some(&'"') {
                chars.next();
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('"') => {
                            if chars.peek() == Some(&'"') {
                                chars.next();
                                name.push('"');
                            } else {
                                break;
                            }
                        }
                        Some(c) => name.push(c),
                        None => return Err(SeedError::model("Unclosed quoted identifier")),
                    }
                }
                if name.is_empty() {
                    return Err(SeedError::model("Empty quoted identifier"));
                }
                parts.push(IdentPart::Quoted(name));
                continue;
            }

            let mut name = String::new();
            while let Some(&c) = chars.peek() {
                if c == '.' {
                    break;
                }
                let ok = if name.is_empty() {
                    c == '_' || c.is_ascii_alphabetic()
                } else {
                    c == '_' || c == '$' || c.is_ascii_alphanumeric()
                };
                if !ok {
                    return Err(SeedError::model(format!(
                        "Invalid character in identifier: '{c}'"
                    )));
                }
                name.push(c);
                chars.next();
            }
            if name.is_empty() {
                return Err(SeedError::model("Empty identifier segment"));
            }
            parts.push(IdentPart::Unquoted(name));
        }

        Ok(Self { parts })
    }

    /// Create a single always-quoted identifier.
    pub fn quoted(name: &str) -> SeedResult<Self> {
        if name.is_empty() {
            return Err(SeedError::model("Empty quoted identifier"));
        }
        if name.contains('\0') {
            return Err(SeedError::model("Identifier cannot contain NUL character"));
        }
        Ok(Self {
            parts: vec![IdentPart::Quoted(name.to_string())],
        })
    }

    /// Render using the given quoting convention.
    pub fn render(&self, style: QuoteStyle) -> String {
        let mut out = String::new();
        self.write(style, &mut out);
        out
    }

    pub(crate) fn write(&self, style: QuoteStyle, out: &mut String) {
        let q = style.quote_char();
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            match part {
                IdentPart::Unquoted(s) => out.push_str(s),
                IdentPart::Quoted(s) => {
                    out.push(q);
                    for ch in s.chars() {
                        if ch == q {
                            out.push(q);
                        }
                        out.push(ch);
                    }
                    out.push(q);
                }
            }
        }
    }
}

// Serde round-trips through the double-quoted string form.
impl From<Ident> for String {
    fn from(ident: Ident) -> Self {
        ident.render(QuoteStyle::DoubleQuote)
    }
}

impl TryFrom<String> for Ident {
    type Error = SeedError;

    fn try_from(s: String) -> SeedResult<Self> {
        Ident::parse(&s)
    }
}

impl std::fmt::Display for Ident {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render(QuoteStyle::DoubleQuote))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ident_simple() {
        let ident = Ident::parse("orders").unwrap();
        assert_eq!(ident.render(QuoteStyle::DoubleQuote), "orders");
        assert_eq!(ident.render(QuoteStyle::Backtick), "orders");
    }

    #[test]
    fn ident_dotted() {
        let ident = Ident::parse("public.orders").unwrap();
        assert_eq!(ident.render(QuoteStyle::DoubleQuote), "public.orders");
    }

    #[test]
    fn ident_quoted_per_style() {
        let ident = Ident::parse(r#""OrderLine""#).unwrap();
        assert_eq!(ident.render(QuoteStyle::DoubleQuote), r#""OrderLine""#);
        assert_eq!(ident.render(QuoteStyle::Backtick), "`OrderLine`");
    }

    #[test]
    fn ident_quoted_escapes_quote_char() {
        let ident = Ident::quoted(r#"has"quote"#).unwrap();
        assert_eq!(ident.render(QuoteStyle::DoubleQuote), r#""has""quote""#);
        assert_eq!(ident.render(QuoteStyle::Backtick), r#"`has"quote`"#);
    }

    #[test]
    fn ident_mixed() {
        let ident = Ident::parse(r#"public."OrderLine""#).unwrap();
        assert_eq!(ident.render(QuoteStyle::DoubleQuote), r#"public."OrderLine""#);
    }

    #[test]
    fn ident_rejects_bad_input() {
        assert!(Ident::parse("").is_err());
        assert!(Ident::parse("1table").is_err());
        assert!(Ident::parse("my table").is_err());
        assert!(Ident::parse("schema..t").is_err());
        assert!(Ident::parse("schema.").is_err());
        assert!(Ident::parse(r#""unclosed"#).is_err());
    }

    #[test]
    fn ident_with_dollar() {
        let ident = Ident::parse("tmp$1").unwrap();
        assert_eq!(ident.render(QuoteStyle::DoubleQuote), "tmp$1");
    }
}

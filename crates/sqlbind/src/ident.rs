//! Table and column identifiers.
//!
//! An [`Ident`] is a dotted path (`schema.table`) whose parts are stored unquoted.
//! Quoting happens at render time, per dialect, through
//! [`Formatter::append_ident`](crate::dialect::Formatter::append_ident).
//!
//! Input parts may be bare (`[A-Za-z_][A-Za-z0-9_$]*`) or double-quoted, in which
//! case any character but NUL is allowed and `""` stands for a literal quote.

use crate::error::{OrmError, OrmResult};
use std::fmt;

/// A validated, possibly schema-qualified identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ident {
    parts: Vec<String>,
}

impl Ident {
    /// Parse `users`, `public.users` or `"Odd Name".id`.
    pub fn parse(input: &str) -> OrmResult<Self> {
        if input.is_empty() {
            return Err(OrmError::validation("identifier cannot be empty"));
        }
        if input.contains('\0') {
            return Err(OrmError::validation("identifier cannot contain NUL"));
        }

        let mut parts = Vec::new();
        let mut rest = input;
        loop {
            let (part, tail) = match rest.strip_prefix('"') {
                Some(quoted) => split_quoted(quoted, input)?,
                None => split_bare(rest, input)?,
            };
            parts.push(part);
            match tail.strip_prefix('.') {
                Some("") => {
                    return Err(OrmError::validation(format!(
                        "trailing '.' in identifier {input:?}"
                    )));
                }
                Some(next) => rest = next,
                None if tail.is_empty() => break,
                None => {
                    return Err(OrmError::validation(format!(
                        "unexpected {tail:?} in identifier {input:?}"
                    )));
                }
            }
        }
        Ok(Self { parts })
    }

    /// A single-part identifier taken verbatim, without validation of its characters.
    pub fn raw(name: impl Into<String>) -> OrmResult<Self> {
        let name = name.into();
        if name.is_empty() || name.contains('\0') {
            return Err(OrmError::validation(format!("invalid identifier {name:?}")));
        }
        Ok(Self { parts: vec![name] })
    }

    pub fn parts(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(String::as_str)
    }

    /// Last path segment, i.e. the table or column name without its schema.
    pub fn name(&self) -> &str {
        self.parts.last().map(String::as_str).unwrap_or_default()
    }
}

fn split_quoted<'a>(s: &'a str, input: &str) -> OrmResult<(String, &'a str)> {
    let mut name = String::new();
    let mut chars = s.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c != '"' {
            name.push(c);
            continue;
        }
        if matches!(chars.peek(), Some((_, '"'))) {
            chars.next();
            name.push('"');
            continue;
        }
        if name.is_empty() {
            return Err(OrmError::validation(format!(
                "empty quoted part in identifier {input:?}"
            )));
        }
        return Ok((name, &s[i + 1..]));
    }
    Err(OrmError::validation(format!(
        "unclosed quote in identifier {input:?}"
    )))
}

fn split_bare<'a>(s: &'a str, input: &str) -> OrmResult<(String, &'a str)> {
    let end = s.find('.').unwrap_or(s.len());
    let part = &s[..end];
    let mut chars = part.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first == '_' || first.is_ascii_alphabetic())
                && chars.all(|c| c == '_' || c == '$' || c.is_ascii_alphanumeric())
        }
        None => false,
    };
    if !valid {
        return Err(OrmError::validation(format!(
            "invalid identifier part {part:?} in {input:?}"
        )));
    }
    Ok((part.to_string(), &s[end..]))
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.parts.join("."))
    }
}

/// Conversion into an [`Ident`], used by builder methods that take table names.
pub trait IntoIdent {
    fn into_ident(self) -> OrmResult<Ident>;
}

impl IntoIdent for Ident {
    fn into_ident(self) -> OrmResult<Ident> {
        Ok(self)
    }
}

impl IntoIdent for &Ident {
    fn into_ident(self) -> OrmResult<Ident> {
        Ok(self.clone())
    }
}

impl IntoIdent for &str {
    fn into_ident(self) -> OrmResult<Ident> {
        Ident::parse(self)
    }
}

impl IntoIdent for String {
    fn into_ident(self) -> OrmResult<Ident> {
        Ident::parse(&self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(s: &str) -> Vec<String> {
        Ident::parse(s).unwrap().parts().map(str::to_string).collect()
    }

    #[test]
    fn parses_bare_and_dotted() {
        assert_eq!(parts("users"), ["users"]);
        assert_eq!(parts("public.users"), ["public", "users"]);
        assert_eq!(parts("my_var$1"), ["my_var$1"]);
    }

    #[test]
    fn parses_quoted_parts() {
        assert_eq!(parts(r#""Camel Case""#), ["Camel Case"]);
        assert_eq!(parts(r#""has""quote""#), [r#"has"quote"#]);
        assert_eq!(parts(r#"public."UserTable""#), ["public", "UserTable"]);
    }

    #[test]
    fn rejects_malformed() {
        for bad in ["", "1table", "my table", "a..b", "a.", r#""open"#, r#""""#, "a;drop"] {
            assert!(Ident::parse(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn name_is_last_segment() {
        assert_eq!(Ident::parse("public.users").unwrap().name(), "users");
    }
}

//! SQL dialects and the formatter that renders fragments for them.
//!
//! The formatter turns `?`-placeholder fragments plus [`Value`] arguments into final
//! SQL text with inlined literals. Rendering is deterministic: the same fragment and
//! arguments always produce the same bytes.

use crate::error::{OrmError, OrmResult};
use crate::ident::Ident;
use crate::value::Value;
use std::fmt::Write as _;

/// Database flavors the formatter knows how to spell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    #[default]
    Postgres,
    Sqlite,
    MySql,
}

impl Dialect {
    pub fn name(self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite",
            Dialect::MySql => "mysql",
        }
    }

    /// Character wrapped around identifiers.
    pub fn quote_char(self) -> char {
        match self {
            Dialect::MySql => '`',
            Dialect::Postgres | Dialect::Sqlite => '"',
        }
    }

    /// Whether `DROP TABLE` / `TRUNCATE` accept `CASCADE` and `RESTRICT`.
    pub fn supports_table_cascade(self) -> bool {
        !matches!(self, Dialect::Sqlite)
    }

    /// Whether the dialect has a `TRUNCATE TABLE` statement.
    pub fn supports_truncate(self) -> bool {
        !matches!(self, Dialect::Sqlite)
    }

    /// Whether `TRUNCATE` accepts `RESTART IDENTITY`.
    pub fn supports_restart_identity(self) -> bool {
        matches!(self, Dialect::Postgres)
    }

    /// Keyword prefixed to each row of a `VALUES` list.
    pub fn values_row_keyword(self) -> &'static str {
        match self {
            Dialect::MySql => "ROW",
            Dialect::Postgres | Dialect::Sqlite => "",
        }
    }
}

/// Renders identifiers, literals and placeholder fragments for one dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct Formatter {
    dialect: Dialect,
}

impl Formatter {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Append an identifier, quoting every dotted part.
    pub fn append_ident(&self, buf: &mut String, ident: &Ident) {
        let q = self.dialect.quote_char();
        for (i, part) in ident.parts().enumerate() {
            if i > 0 {
                buf.push('.');
            }
            buf.push(q);
            for ch in part.chars() {
                if ch == q {
                    buf.push(q);
                }
                buf.push(ch);
            }
            buf.push(q);
        }
    }

    /// Append a value as an SQL literal.
    pub fn append_value(&self, buf: &mut String, value: &Value) {
        match value {
            Value::Null => buf.push_str("NULL"),
            Value::Bool(b) => match (self.dialect, b) {
                (Dialect::Sqlite, true) => buf.push('1'),
                (Dialect::Sqlite, false) => buf.push('0'),
                (_, true) => buf.push_str("TRUE"),
                (_, false) => buf.push_str("FALSE"),
            },
            Value::Int(i) => {
                let _ = write!(buf, "{i}");
            }
            Value::Float(f) if f.is_nan() => self.append_string(buf, "NaN"),
            Value::Float(f) if f.is_infinite() => {
                self.append_string(buf, if *f > 0.0 { "Infinity" } else { "-Infinity" })
            }
            Value::Float(f) => {
                let _ = write!(buf, "{f}");
            }
            Value::Text(s) => self.append_string(buf, s),
            Value::Bytes(b) => self.append_bytes(buf, b),
            Value::Json(v) => self.append_string(buf, &v.to_string()),
            Value::Uuid(u) => self.append_string(buf, &u.to_string()),
            Value::Date(d) => self.append_string(buf, &d.format("%Y-%m-%d").to_string()),
            Value::Time(t) => self.append_string(buf, &t.format("%H:%M:%S%.f").to_string()),
            Value::Timestamp(ts) => {
                self.append_string(buf, &ts.format("%Y-%m-%d %H:%M:%S%.f").to_string())
            }
            Value::TimestampTz(ts) => {
                self.append_string(buf, &ts.format("%Y-%m-%d %H:%M:%S%.f+00:00").to_string())
            }
        }
    }

    fn append_string(&self, buf: &mut String, s: &str) {
        buf.push('\'');
        for ch in s.chars() {
            match ch {
                '\'' => buf.push_str("''"),
                '\\' if self.dialect == Dialect::MySql => buf.push_str("\\\\"),
                '\0' => {}
                _ => buf.push(ch),
            }
        }
        buf.push('\'');
    }

    fn append_bytes(&self, buf: &mut String, bytes: &[u8]) {
        match self.dialect {
            Dialect::Postgres => buf.push_str("'\\x"),
            Dialect::Sqlite | Dialect::MySql => buf.push_str("X'"),
        }
        for b in bytes {
            let _ = write!(buf, "{b:02x}");
        }
        buf.push('\'');
    }

    /// Append `fragment`, replacing each `?` outside string literals with the next
    /// argument. `\?` emits a literal question mark.
    ///
    /// Supplying fewer or more arguments than placeholders is an error.
    pub fn append_query(&self, buf: &mut String, fragment: &str, args: &[Value]) -> OrmResult<()> {
        let mut args = args.iter();
        let mut in_string = false;
        let mut chars = fragment.chars().peekable();

        while let Some(ch) = chars.next() {
            match ch {
                '\'' => {
                    in_string = !in_string;
                    buf.push(ch);
                }
                '\\' if !in_string && chars.peek() == Some(&'?') => {
                    chars.next();
                    buf.push('?');
                }
                '?' if !in_string => match args.next() {
                    Some(arg) => self.append_value(buf, arg),
                    None => {
                        return Err(OrmError::validation(format!(
                            "not enough arguments for placeholders in {fragment:?}"
                        )));
                    }
                },
                _ => buf.push(ch),
            }
        }

        let extra = args.count();
        if extra > 0 {
            return Err(OrmError::validation(format!(
                "{extra} unused argument(s) for {fragment:?}"
            )));
        }
        Ok(())
    }

    /// Render a fragment into a fresh string.
    pub fn render(&self, fragment: &str, args: &[Value]) -> OrmResult<String> {
        let mut buf = String::with_capacity(fragment.len() + args.len() * 8);
        self.append_query(&mut buf, fragment, args)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(s: &str) -> Ident {
        Ident::parse(s).unwrap()
    }

    #[test]
    fn quotes_identifiers_per_dialect() {
        let mut pg = String::new();
        Formatter::new(Dialect::Postgres).append_ident(&mut pg, &ident("public.users"));
        assert_eq!(pg, r#""public"."users""#);

        let mut my = String::new();
        Formatter::new(Dialect::MySql).append_ident(&mut my, &ident("users"));
        assert_eq!(my, "`users`");

        let mut escaped = String::new();
        Formatter::default().append_ident(&mut escaped, &ident(r#""a""b""#));
        assert_eq!(escaped, r#""a""b""#);
    }

    #[test]
    fn substitutes_placeholders() {
        let f = Formatter::default();
        let sql = f
            .render(
                "num > ? AND name = ?",
                &[Value::Int(1), Value::Text("O'Brien".into())],
            )
            .unwrap();
        assert_eq!(sql, "num > 1 AND name = 'O''Brien'");
    }

    #[test]
    fn skips_placeholders_inside_literals_and_escapes() {
        let f = Formatter::default();
        let sql = f.render(r"x = '?' AND y \? ?", &[Value::Bool(true)]).unwrap();
        assert_eq!(sql, "x = '?' AND y ? TRUE");
    }

    #[test]
    fn argument_count_mismatch_is_an_error() {
        let f = Formatter::default();
        assert!(f.render("a = ? AND b = ?", &[Value::Int(1)]).is_err());
        assert!(f.render("a = 1", &[Value::Int(1)]).is_err());
    }

    #[test]
    fn bytes_and_booleans_follow_dialect() {
        let bytes = Value::Bytes(vec![0xde, 0xad]);
        assert_eq!(
            Formatter::new(Dialect::Postgres).render("?", &[bytes.clone()]).unwrap(),
            r"'\xdead'"
        );
        assert_eq!(
            Formatter::new(Dialect::Sqlite).render("?", &[bytes]).unwrap(),
            "X'dead'"
        );
        assert_eq!(
            Formatter::new(Dialect::Sqlite).render("?", &[Value::Bool(true)]).unwrap(),
            "1"
        );
    }

    #[test]
    fn rendering_is_deterministic() {
        let f = Formatter::new(Dialect::MySql);
        let args = [Value::Text(r"a\b".into()), Value::Float(1.5)];
        let first = f.render("? ?", &args).unwrap();
        assert_eq!(first, f.render("? ?", &args).unwrap());
        assert_eq!(first, r"'a\\b' 1.5");
    }
}

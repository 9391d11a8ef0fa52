use super::{Operation, Query};
use crate::dialect::{Dialect, Formatter};
use crate::error::{OrmError, OrmResult};
use crate::value::{ToValue, Value};
use std::collections::{BTreeSet, HashMap};

/// A literal row set, `VALUES (…), (…)`, meant to be used as a CTE body:
///
/// ```ignore
/// let values = db.new_values().row([("id", &1 as &dyn ToValue), ("name", &"a")]);
/// let rows: Vec<HashMap<String, Value>> = Vec::new();
/// db.new_select().with("_data", &values).table("_data").scan(&ctx, &mut rows).await?;
/// // WITH "_data" ("id", "name") AS (VALUES (1, 'a')) SELECT * FROM "_data"
/// ```
///
/// Columns are the sorted union of every row's keys; a key missing from a row
/// renders as `NULL`.
pub struct ValuesQuery {
    fmter: Formatter,
    rows: Vec<HashMap<String, Value>>,
    err: Option<OrmError>,
}

impl ValuesQuery {
    pub(crate) fn new(fmter: Formatter) -> Self {
        Self {
            fmter,
            rows: Vec::new(),
            err: None,
        }
    }

    /// Append one row of `(column, value)` pairs.
    pub fn row<'v, I, K>(mut self, cells: I) -> Self
    where
        I: IntoIterator<Item = (K, &'v dyn ToValue)>,
        K: Into<String>,
    {
        if self.err.is_some() {
            return self;
        }
        let row: OrmResult<HashMap<String, Value>> = cells
            .into_iter()
            .map(|(k, v)| Ok((k.into(), v.to_value()?)))
            .collect();
        match row {
            Ok(row) => self.rows.push(row),
            Err(err) => self.err = Some(err),
        }
        self
    }

    /// Append rows that are already generic maps.
    pub fn rows(mut self, rows: impl IntoIterator<Item = HashMap<String, Value>>) -> Self {
        if self.err.is_none() {
            self.rows.extend(rows);
        }
        self
    }

    fn columns(&self) -> Vec<&str> {
        let set: BTreeSet<&str> = self
            .rows
            .iter()
            .flat_map(|r| r.keys().map(String::as_str))
            .collect();
        set.into_iter().collect()
    }

    fn build_sql(&self) -> OrmResult<String> {
        if let Some(err) = &self.err {
            return Err(err.replay());
        }
        if self.rows.is_empty() {
            return Err(OrmError::validation("sqlbind: VALUES requires at least one row"));
        }

        let columns = self.columns();
        let row_keyword = self.fmter.dialect().values_row_keyword();
        let mut sql = String::from("VALUES ");
        for (i, row) in self.rows.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str(row_keyword);
            sql.push('(');
            for (j, column) in columns.iter().enumerate() {
                if j > 0 {
                    sql.push_str(", ");
                }
                match row.get(*column) {
                    Some(value) => self.fmter.append_value(&mut sql, value),
                    None => sql.push_str("NULL"),
                }
            }
            sql.push(')');
        }
        Ok(sql)
    }
}

impl Query for ValuesQuery {
    fn operation(&self) -> Operation {
        Operation::Values
    }

    fn dialect(&self) -> Dialect {
        self.fmter.dialect()
    }

    fn model_type(&self) -> Option<&'static str> {
        None
    }

    fn to_sql(&self) -> OrmResult<String> {
        self.build_sql()
    }

    fn cte_columns(&self) -> Vec<String> {
        self.columns().into_iter().map(str::to_string).collect()
    }
}

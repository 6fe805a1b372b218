//! Rows of the in-memory relational pipeline.
//!
//! A row binds table aliases to records. `$join` merges the bindings of two
//! rows, `$group` collapses member rows into a single group row that keeps
//! the key values and the members so aggregates can walk them.

use indexmap::IndexMap;

use crate::value::{Record, Value};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    /// Alias to record. A left-join miss binds the alias to `Null`.
    pub tables: IndexMap<String, Value>,
    /// Group key name to key value, set on rows produced by `$group`.
    pub groups: Option<Record>,
    /// Member rows of a group, or the frame rows of a window aggregate.
    pub items: Option<Vec<Row>>,
}

impl Row {
    /// A row holding a single record under `alias`.
    pub fn single(alias: impl Into<String>, record: Value) -> Self {
        let mut tables = IndexMap::new();
        tables.insert(alias.into(), record);
        Row {
            tables,
            groups: None,
            items: None,
        }
    }

    /// The bindings of both rows; `other` wins on alias clashes.
    pub fn merge(&self, other: &Row) -> Row {
        let mut tables = self.tables.clone();
        for (alias, record) in &other.tables {
            tables.insert(alias.clone(), record.clone());
        }
        Row {
            tables,
            groups: None,
            items: None,
        }
    }

    /// A group row: key values plus members. Non-key fields resolve against
    /// the first member.
    pub fn group(keys: Record, members: Vec<Row>) -> Row {
        let tables = members
            .first()
            .map(|m| m.tables.clone())
            .unwrap_or_default();
        Row {
            tables,
            groups: Some(keys),
            items: Some(members),
        }
    }

    pub fn is_grouped(&self) -> bool {
        self.groups.is_some()
    }

    /// Rows an aggregate iterates: group members or, outside a group, the
    /// row itself.
    pub fn members(&self) -> Vec<Row> {
        match &self.items {
            Some(items) => items.clone(),
            None => vec![self.clone()],
        }
    }

    /// Resolve an unqualified field: group keys first, then each bound
    /// record in binding order.
    pub fn lookup(&self, field: &str) -> Value {
        if let Some(groups) = &self.groups
            && let Some(v) = groups.get(field)
        {
            return v.clone();
        }
        for record in self.tables.values() {
            if let Some(v) = record.lookup_path(field) {
                return v;
            }
        }
        Value::Null
    }

    /// Resolve a field of one alias (`users:name`).
    pub fn lookup_qualified(&self, alias: &str, field: &str) -> Value {
        if let Some(groups) = &self.groups
            && let Some(v) = groups.get(&format!("{alias}:{field}"))
        {
            return v.clone();
        }
        self.tables
            .get(alias)
            .and_then(|record| record.lookup_path(field))
            .unwrap_or(Value::Null)
    }

    /// Flatten all bound records into one record, first binding wins.
    pub fn flatten(&self) -> Record {
        let mut out = Record::new();
        if let Some(groups) = &self.groups {
            for (k, v) in groups {
                out.entry(k.clone()).or_insert_with(|| v.clone());
            }
        }
        for record in self.tables.values() {
            if let Value::Object(map) = record {
                for (k, v) in map {
                    out.entry(k.clone()).or_insert_with(|| v.clone());
                }
            }
        }
        out
    }
}

/// Turn a source value into rows. Plain arrays of records are tagged under
/// `alias`; rows pass through untouched.
pub fn to_rows(value: Value, alias: &str) -> Result<Vec<Row>, Value> {
    match value {
        Value::Rows(rows) => Ok(rows),
        Value::Array(items) => Ok(items
            .into_iter()
            .map(|record| Row::single(alias, record))
            .collect()),
        Value::Null => Ok(Vec::new()),
        other => Err(other),
    }
}

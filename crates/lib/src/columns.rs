//! # Column Whitelists
//!
//! Partial updates never turn caller-supplied keys into SQL identifiers. Each
//! entity declares an enum of the columns it lets callers write, and the only
//! way to obtain an identifier is the exhaustive `Column::name` match. Request
//! bodies are typed structs with `deny_unknown_fields`, so an unexpected key
//! fails deserialization before any SQL is built.

use turso::Value;

/// A writable column of one table.
pub trait Column: Copy + std::fmt::Debug {
    fn name(self) -> &'static str;
}

/// An ordered list of `column = ?` assignments for one `UPDATE`.
#[derive(Debug)]
pub struct Assignments<C: Column> {
    entries: Vec<(C, Value)>,
}

impl<C: Column> Default for Assignments<C> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<C: Column> Assignments<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, column: C, value: Value) -> &mut Self {
        self.entries.push((column, value));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Renders `UPDATE <table> SET a = ?, b = ? WHERE <key_column> = ?` and
    /// its parameters, with `key` bound last.
    pub fn into_update(
        self,
        table: &'static str,
        key_column: &'static str,
        key: Value,
    ) -> (String, Vec<Value>) {
        let set_clause = self
            .entries
            .iter()
            .map(|(column, _)| format!("{} = ?", column.name()))
            .collect::<Vec<_>>()
            .join(", ");
        let mut params: Vec<Value> = self.entries.into_iter().map(|(_, v)| v).collect();
        params.push(key);
        (
            format!("UPDATE {table} SET {set_clause} WHERE {key_column} = ?"),
            params,
        )
    }
}

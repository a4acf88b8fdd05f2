use crate::{Error, Result, Value};
use std::{
    ops::{Index, Range},
    sync::Arc,
};

/// A column of a fetched [`Row`].
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    /// Type declared in the schema, if the engine reports one.
    pub decltype: Option<String>,
    /// Type parsed from a `name [type]` column name, when column names are inspected.
    pub annotation: Option<String>,
    pub value: Value,
}

/// An immutable, fetched record.
///
/// Values are reachable by position and by column name; when two columns
/// share a name the last one wins. Rows are cheap to clone and to slice,
/// the columns are shared.
#[derive(Debug, Clone)]
pub struct Row {
    columns: Arc<[Column]>,
    range: Range<usize>,
}

impl Row {
    pub fn new(columns: impl Into<Arc<[Column]>>) -> Self {
        let columns = columns.into();
        let range = 0..columns.len();
        Self { columns, range }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns[self.range.clone()]
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.columns().get(index).map(|c| &c.value)
    }

    pub fn get_column(&self, name: &str) -> Option<&Value> {
        self.columns()
            .iter()
            .rev()
            .find(|c| c.name == name)
            .map(|c| &c.value)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns().iter().map(|c| c.name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.columns().iter().map(|c| &c.value)
    }

    /// Row over the columns `range`, relative to this row.
    pub fn slice(&self, range: Range<usize>) -> Result<Row> {
        if range.start > range.end || range.end > self.len() {
            return Err(Error::msg(format!(
                "Cannot slice the columns {}..{} of a row with {} columns",
                range.start,
                range.end,
                self.len()
            )));
        }
        Ok(Row {
            columns: self.columns.clone(),
            range: self.range.start + range.start..self.range.start + range.end,
        })
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.values().cloned().collect()
    }
}

impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        self.columns() == other.columns()
    }
}

impl Index<usize> for Row {
    type Output = Value;
    fn index(&self, index: usize) -> &Self::Output {
        &self.columns()[index].value
    }
}

impl Index<&str> for Row {
    type Output = Value;
    fn index(&self, name: &str) -> &Self::Output {
        match self.get_column(name) {
            Some(value) => value,
            None => panic!("The row has no column named `{}`", name),
        }
    }
}

impl From<Row> for Vec<Value> {
    fn from(value: Row) -> Self {
        value.to_vec()
    }
}

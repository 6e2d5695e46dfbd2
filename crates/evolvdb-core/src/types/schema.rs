//! Column metadata and schemas.
//!
//! A [`Schema`] is an ordered list of uniquely named, typed [`Column`]s.
//! Column names may carry a qualifier (`alias.col`); lookups are
//! case-insensitive and can fall back to the part after the dot.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::DataType;
use crate::error::{CoreError, CoreResult};

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Column {
    /// Column name, possibly qualified (`o.amount`).
    pub name: String,
    /// Declared type.
    pub data_type: DataType,
}

impl Column {
    /// Creates a new column.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self { name: name.into(), data_type }
    }

    /// Returns the part of the name after the first dot, or the whole name.
    #[must_use]
    pub fn unqualified_name(&self) -> &str {
        unqualified(&self.name)
    }

    /// Returns this column renamed to `qualifier.name` unless it is already qualified.
    #[must_use]
    pub fn qualified_with(&self, qualifier: &str) -> Self {
        if self.name.contains('.') || qualifier.is_empty() {
            self.clone()
        } else {
            Self { name: format!("{qualifier}.{}", self.name), data_type: self.data_type }
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.data_type)
    }
}

/// Returns the part of `name` after the first dot.
fn unqualified(name: &str) -> &str {
    match name.find('.') {
        Some(dot) if dot > 0 => &name[dot + 1..],
        _ => name,
    }
}

/// An ordered set of columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<Column>,
    /// Lower-cased full name to position.
    name_to_index: HashMap<String, usize>,
}

impl Schema {
    /// Creates a schema from columns.
    ///
    /// When two columns share a name, lookups resolve to the first one. Use
    /// [`try_new`](Self::try_new) to reject such input.
    #[must_use]
    pub fn new(columns: Vec<Column>) -> Self {
        let mut name_to_index = HashMap::with_capacity(columns.len());
        for (i, col) in columns.iter().enumerate() {
            name_to_index.entry(col.name.to_lowercase()).or_insert(i);
        }
        Self { columns, name_to_index }
    }

    /// Creates a schema, rejecting empty column lists and duplicate names.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if the list is empty or names repeat.
    pub fn try_new(columns: Vec<Column>) -> CoreResult<Self> {
        if columns.is_empty() {
            return Err(CoreError::Validation("schema must have at least one column".into()));
        }
        let schema = Self::new(columns);
        if schema.name_to_index.len() != schema.columns.len() {
            return Err(CoreError::Validation("schema column names must be unique".into()));
        }
        Ok(schema)
    }

    /// Creates an empty schema.
    #[must_use]
    pub fn empty() -> Self {
        Self { columns: Vec::new(), name_to_index: HashMap::new() }
    }

    /// Returns the columns in order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Returns the column names in order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the schema has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Returns the column at `index`.
    #[must_use]
    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Finds a column by its full name, ignoring case.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(&name.to_lowercase()).copied()
    }

    /// Finds a column whose name, with any qualifier stripped, equals `column`.
    #[must_use]
    pub fn index_of_unqualified(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.unqualified_name().eq_ignore_ascii_case(column))
    }

    /// Returns true if some column is named `qualifier.<something>`.
    #[must_use]
    pub fn has_qualifier(&self, qualifier: &str) -> bool {
        self.columns.iter().any(|c| {
            c.name
                .split_once('.')
                .is_some_and(|(q, _)| !q.is_empty() && q.eq_ignore_ascii_case(qualifier))
        })
    }

    /// Returns true if any column name carries a qualifier.
    #[must_use]
    pub fn has_qualified_columns(&self) -> bool {
        self.columns.iter().any(|c| c.unqualified_name().len() != c.name.len())
    }

    /// Resolves a column reference within this schema.
    ///
    /// A qualified reference matches `qualifier.column` exactly. It falls
    /// back to the bare name only when no column carries that qualifier, so
    /// `o.name` never binds another relation's `name`. An unqualified
    /// reference matches the exact name first, then any qualified column
    /// with that suffix.
    #[must_use]
    pub fn resolve(&self, qualifier: Option<&str>, column: &str) -> Option<usize> {
        match qualifier {
            Some(q) => self.index_of(&format!("{q}.{column}")).or_else(|| {
                if self.has_qualifier(q) {
                    None
                } else {
                    self.index_of(column)
                }
            }),
            None => self.index_of(column).or_else(|| self.index_of_unqualified(column)),
        }
    }

    /// Returns true if [`resolve`](Self::resolve) or a same-suffix match finds the column.
    ///
    /// This is the looser test the rewriter uses to decide which side of a
    /// join a reference belongs to.
    #[must_use]
    pub fn contains(&self, qualifier: Option<&str>, column: &str) -> bool {
        if self.resolve(qualifier, column).is_some() {
            return true;
        }
        qualifier.is_some() && self.index_of_unqualified(column).is_some()
    }

    /// Concatenates two schemas for a join output.
    ///
    /// Right-hand columns are qualified with `right_qualifier` unless they
    /// already carry a qualifier.
    #[must_use]
    pub fn join(&self, right: &Schema, right_qualifier: &str) -> Self {
        let mut columns = self.columns.clone();
        columns.extend(right.columns.iter().map(|c| c.qualified_with(right_qualifier)));
        Self::new(columns)
    }

    /// Creates a schema with only the columns at `indices`.
    #[must_use]
    pub fn project(&self, indices: &[usize]) -> Self {
        Self::new(indices.iter().filter_map(|&i| self.columns.get(i).cloned()).collect())
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Vec<Column>> for Schema {
    fn from(columns: Vec<Column>) -> Self {
        Self::new(columns)
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, col) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{col}")?;
        }
        write!(f, ")")
    }
}

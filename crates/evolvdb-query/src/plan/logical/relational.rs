//! Relational plan nodes.
//!
//! This module defines the payloads of the relational operators:
//! `Scan`, `Filter`, `Project`, `Join`, `Aggregate` and `Insert`.

// Allow missing_const_for_fn - const fn with Vec isn't stable
#![allow(clippy::missing_const_for_fn)]

use std::fmt;
use std::sync::Arc;

use evolvdb_core::{Column, Schema};

use super::expr::LogicalExpr;

/// A table scan node.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanNode {
    /// Table name.
    pub table_name: String,
    /// Optional table alias.
    pub alias: Option<String>,
    /// The table schema as bound from the catalog.
    pub schema: Arc<Schema>,
}

impl ScanNode {
    /// Creates a new scan node for the given table.
    #[must_use]
    pub fn new(table_name: impl Into<String>, schema: Arc<Schema>) -> Self {
        Self { table_name: table_name.into(), alias: None, schema }
    }

    /// Sets the table alias.
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Returns the effective table reference name (alias or table name).
    #[must_use]
    pub fn reference_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table_name)
    }
}

/// A filter node.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterNode {
    /// The predicate to filter by.
    pub predicate: LogicalExpr,
}

impl FilterNode {
    /// Creates a new filter node.
    #[must_use]
    pub const fn new(predicate: LogicalExpr) -> Self {
        Self { predicate }
    }
}

/// A named output expression of a projection or aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectItem {
    /// The computed expression.
    pub expr: LogicalExpr,
    /// Output column name.
    pub name: String,
}

impl ProjectItem {
    /// Creates an item.
    #[must_use]
    pub fn new(expr: LogicalExpr, name: impl Into<String>) -> Self {
        Self { expr, name: name.into() }
    }

    /// Creates an item named after the expression's display form.
    ///
    /// A bare column keeps its column name.
    #[must_use]
    pub fn unnamed(expr: LogicalExpr) -> Self {
        let name = expr.column_name().map_or_else(|| expr.to_string(), ToOwned::to_owned);
        Self { expr, name }
    }
}

impl fmt::Display for ProjectItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let expr = self.expr.to_string();
        if expr == self.name {
            write!(f, "{expr}")
        } else {
            write!(f, "{expr} AS {}", self.name)
        }
    }
}

/// A projection node.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectNode {
    /// Output items, in order.
    pub items: Vec<ProjectItem>,
    /// Output schema, one column per item.
    pub schema: Arc<Schema>,
}

/// Join type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinType {
    /// INNER JOIN.
    Inner,
    /// LEFT OUTER JOIN.
    Left,
    /// RIGHT OUTER JOIN.
    Right,
    /// FULL OUTER JOIN.
    Full,
}

impl JoinType {
    /// Returns true if unmatched left rows are preserved.
    #[must_use]
    pub const fn preserves_left(self) -> bool {
        matches!(self, Self::Left | Self::Full)
    }

    /// Returns true if unmatched right rows are preserved.
    #[must_use]
    pub const fn preserves_right(self) -> bool {
        matches!(self, Self::Right | Self::Full)
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Inner => "INNER",
            Self::Left => "LEFT OUTER",
            Self::Right => "RIGHT OUTER",
            Self::Full => "FULL OUTER",
        };
        write!(f, "{name}")
    }
}

/// A join node.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinNode {
    /// The type of join.
    pub join_type: JoinType,
    /// The join condition. `None` joins every pair.
    pub condition: Option<LogicalExpr>,
    /// Left columns followed by the qualified right columns.
    pub schema: Arc<Schema>,
}

/// A hash aggregation node.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateNode {
    /// Grouping expressions.
    pub group_by: Vec<LogicalExpr>,
    /// Output items; each is a group expression or contains aggregates.
    pub outputs: Vec<ProjectItem>,
    /// Output schema, one column per output item.
    pub schema: Arc<Schema>,
}

impl AggregateNode {
    /// Returns true if the node has no grouping expressions.
    #[must_use]
    pub fn is_ungrouped(&self) -> bool {
        self.group_by.is_empty()
    }
}

/// An INSERT of literal rows.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertNode {
    /// Target table.
    pub table_name: String,
    /// Target columns, in the order the row values are given.
    pub columns: Vec<Column>,
    /// Value expressions, one inner list per row.
    pub rows: Vec<Vec<LogicalExpr>>,
    /// Full schema of the target table.
    pub table_schema: Arc<Schema>,
}

#[cfg(test)]
mod tests {
    use evolvdb_core::DataType;

    use super::*;

    #[test]
    fn scan_reference_name() {
        let schema = Arc::new(Schema::new(vec![Column::new("id", DataType::Int)]));
        let scan = ScanNode::new("users", Arc::clone(&schema));
        assert_eq!(scan.reference_name(), "users");
        assert_eq!(scan.with_alias("u").reference_name(), "u");
    }

    #[test]
    fn project_item_names() {
        let item = ProjectItem::unnamed(LogicalExpr::qualified_column("u", "name"));
        assert_eq!(item.name, "name");
        assert_eq!(item.to_string(), "u.name AS name");

        let item = ProjectItem::unnamed(LogicalExpr::count_star());
        assert_eq!(item.name, "COUNT(*)");
        assert_eq!(item.to_string(), "COUNT(*)");

        let item = ProjectItem::new(LogicalExpr::column("id"), "id");
        assert_eq!(item.to_string(), "id");
    }

    #[test]
    fn join_type_sides() {
        assert!(JoinType::Left.preserves_left());
        assert!(!JoinType::Left.preserves_right());
        assert!(JoinType::Full.preserves_right());
        assert!(!JoinType::Inner.preserves_left());
        assert_eq!(JoinType::Right.to_string(), "RIGHT OUTER");
    }
}

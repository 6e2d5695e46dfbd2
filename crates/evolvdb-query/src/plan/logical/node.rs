//! Logical plan node.
//!
//! This module defines the main `LogicalPlan` enum that represents
//! the tree structure of a logical query plan.

// Allow matching arms with identical bodies - intentional for grouping
#![allow(clippy::match_same_arms)]
// Allow use_self in builders
#![allow(clippy::use_self)]

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use evolvdb_core::{Catalog, Column, DataType, Schema};

use super::expr::{schema_contains, ColumnRef, LogicalExpr};
use super::relational::{
    AggregateNode, FilterNode, InsertNode, JoinNode, JoinType, ProjectItem, ProjectNode, ScanNode,
};
use crate::error::QueryResult;

/// Name of the single column produced by an INSERT.
pub const INSERTED_COUNT: &str = "inserted_count";

/// Returns the `(inserted_count BIGINT)` schema of an INSERT.
#[must_use]
pub fn inserted_count_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![Column::new(INSERTED_COUNT, DataType::BigInt)]))
}

/// A logical query plan.
///
/// This is an immutable tree: rewrites build new nodes rather than mutating
/// existing ones. Every node knows its output schema; a `Filter` reports its
/// input's.
#[derive(Debug, Clone, PartialEq)]
pub enum LogicalPlan {
    // ========== Leaf Nodes (no inputs) ==========
    /// Table scan.
    Scan(Box<ScanNode>),

    /// INSERT of literal rows.
    Insert(Box<InsertNode>),

    // ========== Unary Nodes (single input) ==========
    /// Filter (WHERE clause).
    Filter {
        /// The filter node.
        node: FilterNode,
        /// The input plan.
        input: Box<LogicalPlan>,
    },

    /// Projection (SELECT list).
    Project {
        /// The projection node.
        node: ProjectNode,
        /// The input plan.
        input: Box<LogicalPlan>,
    },

    /// Aggregation (GROUP BY).
    Aggregate {
        /// The aggregate node.
        node: Box<AggregateNode>,
        /// The input plan.
        input: Box<LogicalPlan>,
    },

    // ========== Binary Nodes ==========
    /// Join of two inputs.
    Join {
        /// The join node.
        node: Box<JoinNode>,
        /// Left input.
        left: Box<LogicalPlan>,
        /// Right input.
        right: Box<LogicalPlan>,
    },
}

impl LogicalPlan {
    // ========== Constructors ==========

    /// Creates a table scan.
    #[must_use]
    pub fn scan(table: impl Into<String>, schema: impl Into<Arc<Schema>>) -> Self {
        Self::Scan(Box::new(ScanNode::new(table, schema.into())))
    }

    /// Creates a table scan with alias.
    #[must_use]
    pub fn scan_aliased(
        table: impl Into<String>,
        alias: impl Into<String>,
        schema: impl Into<Arc<Schema>>,
    ) -> Self {
        Self::Scan(Box::new(ScanNode::new(table, schema.into()).with_alias(alias)))
    }

    /// Creates a scan bound against a catalog entry.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the table does not exist.
    pub fn scan_table(catalog: &dyn Catalog, table: &str, alias: Option<&str>) -> QueryResult<Self> {
        let meta = catalog.lookup_table(table)?;
        let mut node = ScanNode::new(meta.name, meta.schema);
        node.alias = alias.map(ToOwned::to_owned);
        Ok(Self::Scan(Box::new(node)))
    }

    /// Creates an INSERT of `rows` into `columns` of a table.
    #[must_use]
    pub fn insert(
        table: impl Into<String>,
        table_schema: impl Into<Arc<Schema>>,
        columns: Vec<Column>,
        rows: Vec<Vec<LogicalExpr>>,
    ) -> Self {
        Self::Insert(Box::new(InsertNode {
            table_name: table.into(),
            columns,
            rows,
            table_schema: table_schema.into(),
        }))
    }

    // ========== Builder Methods ==========

    /// Adds a filter to this plan.
    #[must_use]
    pub fn filter(self, predicate: LogicalExpr) -> Self {
        Self::Filter { node: FilterNode::new(predicate), input: Box::new(self) }
    }

    /// Adds a projection to this plan.
    ///
    /// # Errors
    ///
    /// Returns an error if an item does not type-check against this plan's schema.
    pub fn project(self, items: Vec<ProjectItem>) -> QueryResult<Self> {
        let schema = output_schema(&items, &self.schema())?;
        Ok(self.project_with_schema(items, schema))
    }

    /// Adds a projection whose schema the caller already knows.
    pub(crate) fn project_with_schema(self, items: Vec<ProjectItem>, schema: Arc<Schema>) -> Self {
        Self::Project { node: ProjectNode { items, schema }, input: Box::new(self) }
    }

    /// Adds an aggregation to this plan.
    ///
    /// # Errors
    ///
    /// Returns an error if an output does not type-check against this plan's schema.
    pub fn aggregate(self, group_by: Vec<LogicalExpr>, outputs: Vec<ProjectItem>) -> QueryResult<Self> {
        let schema = output_schema(&outputs, &self.schema())?;
        Ok(Self::Aggregate {
            node: Box::new(AggregateNode { group_by, outputs, schema }),
            input: Box::new(self),
        })
    }

    /// Joins this plan with another.
    #[must_use]
    pub fn join(self, right: LogicalPlan, join_type: JoinType, condition: Option<LogicalExpr>) -> Self {
        let schema = Arc::new(self.schema().join(&right.schema(), &right.qualifier()));
        Self::Join {
            node: Box::new(JoinNode { join_type, condition, schema }),
            left: Box::new(self),
            right: Box::new(right),
        }
    }

    /// Creates an inner join with another plan.
    #[must_use]
    pub fn inner_join(self, right: LogicalPlan, on: LogicalExpr) -> Self {
        self.join(right, JoinType::Inner, Some(on))
    }

    /// Creates a left outer join with another plan.
    #[must_use]
    pub fn left_join(self, right: LogicalPlan, on: LogicalExpr) -> Self {
        self.join(right, JoinType::Left, Some(on))
    }

    // ========== Accessors ==========

    /// Returns the output schema of this node.
    #[must_use]
    pub fn schema(&self) -> Arc<Schema> {
        match self {
            Self::Scan(node) => Arc::clone(&node.schema),
            Self::Insert(_) => inserted_count_schema(),
            Self::Filter { input, .. } => input.schema(),
            Self::Project { node, .. } => Arc::clone(&node.schema),
            Self::Aggregate { node, .. } => Arc::clone(&node.schema),
            Self::Join { node, .. } => Arc::clone(&node.schema),
        }
    }

    /// Returns the child plans of this node.
    #[must_use]
    pub fn children(&self) -> Vec<&LogicalPlan> {
        match self {
            Self::Scan(_) | Self::Insert(_) => vec![],
            Self::Filter { input, .. }
            | Self::Project { input, .. }
            | Self::Aggregate { input, .. } => vec![input.as_ref()],
            Self::Join { left, right, .. } => vec![left.as_ref(), right.as_ref()],
        }
    }

    /// Returns true if this is a leaf node.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Scan(_) | Self::Insert(_))
    }

    /// Returns the node type name (for display/debugging).
    #[must_use]
    pub fn node_type(&self) -> &'static str {
        match self {
            Self::Scan(_) => "Scan",
            Self::Insert(_) => "Insert",
            Self::Filter { .. } => "Filter",
            Self::Project { .. } => "Project",
            Self::Aggregate { .. } => "Aggregate",
            Self::Join { .. } => "Join",
        }
    }

    /// Returns the name this relation is referred to by when it is the
    /// right side of a join: the alias or table name of its left-most scan.
    #[must_use]
    pub fn qualifier(&self) -> String {
        match self {
            Self::Scan(node) => node.reference_name().to_owned(),
            Self::Insert(node) => node.table_name.clone(),
            Self::Filter { input, .. }
            | Self::Project { input, .. }
            | Self::Aggregate { input, .. } => input.qualifier(),
            Self::Join { left, .. } => left.qualifier(),
        }
    }

    /// Returns the lower-cased alias-or-table names of every scan in this subtree.
    #[must_use]
    pub fn qualifiers(&self) -> HashSet<String> {
        let mut out = HashSet::new();
        self.collect_qualifiers(&mut out);
        out
    }

    fn collect_qualifiers(&self, out: &mut HashSet<String>) {
        match self {
            Self::Scan(node) => {
                out.insert(node.reference_name().to_lowercase());
            }
            Self::Insert(node) => {
                out.insert(node.table_name.to_lowercase());
            }
            _ => {
                for child in self.children() {
                    child.collect_qualifiers(out);
                }
            }
        }
    }

    /// Returns true if this relation provides the referenced column.
    #[must_use]
    pub fn binds(&self, column: &ColumnRef) -> bool {
        schema_contains(&self.schema(), &self.qualifiers(), column)
    }

    /// Counts the nodes in this tree.
    #[must_use]
    pub fn node_count(&self) -> usize {
        1 + self.children().iter().map(|c| c.node_count()).sum::<usize>()
    }

    /// Pretty prints the plan as a tree.
    #[must_use]
    pub fn display_tree(&self) -> DisplayTree<'_> {
        DisplayTree { plan: self }
    }
}

fn output_schema(items: &[ProjectItem], input: &Schema) -> QueryResult<Arc<Schema>> {
    let columns = items
        .iter()
        .map(|item| Ok(Column::new(item.name.clone(), item.expr.data_type(input)?)))
        .collect::<QueryResult<Vec<_>>>()?;
    Ok(Arc::new(Schema::new(columns)))
}

/// Helper for tree-style plan display.
pub struct DisplayTree<'a> {
    plan: &'a LogicalPlan,
}

impl fmt::Display for DisplayTree<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_node(f, self.plan, "", true)
    }
}

fn fmt_node(f: &mut fmt::Formatter<'_>, plan: &LogicalPlan, prefix: &str, is_last: bool) -> fmt::Result {
    let connector = if is_last { "└── " } else { "├── " };

    write!(f, "{prefix}{connector}")?;
    fmt_node_content(f, plan)?;
    writeln!(f)?;

    let children = plan.children();
    let new_prefix = format!("{prefix}{}", if is_last { "    " } else { "│   " });

    for (i, child) in children.iter().enumerate() {
        fmt_node(f, child, &new_prefix, i == children.len() - 1)?;
    }

    Ok(())
}

fn fmt_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn fmt_node_content(f: &mut fmt::Formatter<'_>, plan: &LogicalPlan) -> fmt::Result {
    match plan {
        LogicalPlan::Scan(node) => {
            write!(f, "Scan: {}", node.table_name)?;
            if let Some(alias) = &node.alias {
                write!(f, " AS {alias}")?;
            }
        }
        LogicalPlan::Insert(node) => {
            write!(f, "Insert: {} ({} rows)", node.table_name, node.rows.len())?;
        }
        LogicalPlan::Filter { node, .. } => {
            write!(f, "Filter: {}", node.predicate)?;
        }
        LogicalPlan::Project { node, .. } => {
            write!(f, "Project: ")?;
            fmt_list(f, &node.items)?;
        }
        LogicalPlan::Aggregate { node, .. } => {
            write!(f, "Aggregate: ")?;
            if !node.group_by.is_empty() {
                write!(f, "GROUP BY ")?;
                fmt_list(f, &node.group_by)?;
                write!(f, " ")?;
            }
            fmt_list(f, &node.outputs)?;
        }
        LogicalPlan::Join { node, .. } => {
            write!(f, "Join: {} JOIN", node.join_type)?;
            if let Some(cond) = &node.condition {
                write!(f, " ON {cond}")?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> LogicalPlan {
        LogicalPlan::scan_aliased(
            "users",
            "u",
            Schema::new(vec![
                Column::new("id", DataType::Int),
                Column::new("name", DataType::Varchar(32)),
            ]),
        )
    }

    fn orders() -> LogicalPlan {
        LogicalPlan::scan_aliased(
            "orders",
            "o",
            Schema::new(vec![
                Column::new("id", DataType::Int),
                Column::new("user_id", DataType::Int),
                Column::new("amount", DataType::BigInt),
            ]),
        )
    }

    #[test]
    fn simple_scan() {
        let plan = users();
        assert_eq!(plan.node_type(), "Scan");
        assert!(plan.is_leaf());
        assert!(plan.children().is_empty());
        assert_eq!(plan.qualifier(), "u");
    }

    #[test]
    fn filter_keeps_input_schema() {
        let plan = users().filter(LogicalExpr::column("id").gt(LogicalExpr::integer(21)));
        assert_eq!(plan.node_type(), "Filter");
        assert_eq!(plan.children().len(), 1);
        assert_eq!(plan.schema().names(), vec!["id", "name"]);
    }

    #[test]
    fn join_schema_qualifies_right() {
        let plan = users().inner_join(
            orders(),
            LogicalExpr::qualified_column("u", "id")
                .eq(LogicalExpr::qualified_column("o", "user_id")),
        );
        assert_eq!(plan.node_type(), "Join");
        assert_eq!(plan.children().len(), 2);
        assert_eq!(plan.schema().names(), vec!["id", "name", "o.id", "o.user_id", "o.amount"]);

        let quals = plan.qualifiers();
        assert!(quals.contains("u") && quals.contains("o"));
        assert!(plan.binds(&ColumnRef::new(Some("o"), "amount")));
        assert!(!plan.binds(&ColumnRef::new(Some("x"), "amount")));
    }

    #[test]
    fn project_and_aggregate_schemas() {
        let plan = orders()
            .project(vec![
                ProjectItem::unnamed(LogicalExpr::column("user_id")),
                ProjectItem::new(LogicalExpr::column("amount").mul(LogicalExpr::integer(2)), "twice"),
            ])
            .unwrap();
        let schema = plan.schema();
        assert_eq!(schema.names(), vec!["user_id", "twice"]);
        assert_eq!(schema.column(1).unwrap().data_type, DataType::BigInt);

        let agg = orders()
            .aggregate(
                vec![LogicalExpr::column("user_id")],
                vec![
                    ProjectItem::unnamed(LogicalExpr::column("user_id")),
                    ProjectItem::new(LogicalExpr::count_star(), "cnt"),
                ],
            )
            .unwrap();
        assert_eq!(agg.schema().names(), vec!["user_id", "cnt"]);
    }

    #[test]
    fn project_rejects_unknown_column() {
        let err = users().project(vec![ProjectItem::unnamed(LogicalExpr::column("email"))]);
        assert!(err.is_err());
    }

    #[test]
    fn insert_reports_count_schema() {
        let table = Schema::new(vec![Column::new("id", DataType::Int)]);
        let plan = LogicalPlan::insert(
            "t",
            table.clone(),
            table.columns().to_vec(),
            vec![vec![LogicalExpr::integer(1)]],
        );
        assert_eq!(plan.schema().names(), vec![INSERTED_COUNT]);
        assert!(plan.is_leaf());
    }

    #[test]
    fn node_count() {
        let plan = users()
            .inner_join(orders(), LogicalExpr::boolean(true))
            .filter(LogicalExpr::boolean(true));
        assert_eq!(plan.node_count(), 4);
    }

    #[test]
    fn display_tree() {
        let plan = users()
            .inner_join(
                orders(),
                LogicalExpr::qualified_column("u", "id")
                    .eq(LogicalExpr::qualified_column("o", "user_id")),
            )
            .filter(LogicalExpr::qualified_column("o", "amount").gt(LogicalExpr::integer(100)));

        let output = format!("{}", plan.display_tree());
        assert!(output.contains("Filter: (o.amount > 100)"));
        assert!(output.contains("Join: INNER JOIN ON (u.id = o.user_id)"));
        assert!(output.contains("├── Scan: users AS u"));
        assert!(output.contains("└── Scan: orders AS o"));
    }
}

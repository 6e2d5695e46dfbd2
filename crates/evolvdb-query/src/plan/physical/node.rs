//! Physical plan node types.
//!
//! This module defines the concrete execution strategies that make up
//! a physical query plan.

// Allow matching arms with identical bodies - intentional for grouping
#![allow(clippy::match_same_arms)]

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use evolvdb_core::{Column, Schema};

use crate::exec::{ExecutionContext, Executor};
use crate::plan::logical::{inserted_count_schema, JoinType, LogicalExpr, ProjectItem};

use super::cost::{Cost, CostModel};

/// A physical query plan.
///
/// This is a tree structure where each node represents a concrete
/// execution operator with a specific algorithm choice and the cost the
/// optimizer estimated for it.
#[derive(Debug, Clone, PartialEq)]
pub enum PhysicalPlan {
    // ========== Leaf Operators ==========
    /// Full table scan.
    SeqScan(Box<SeqScanNode>),

    /// INSERT of literal rows.
    Insert(Box<InsertExecNode>),

    // ========== Unary Operators ==========
    /// Filter operator.
    Filter {
        /// Filter configuration.
        node: FilterExecNode,
        /// Input plan.
        input: Box<PhysicalPlan>,
    },

    /// Projection operator.
    Project {
        /// Projection configuration.
        node: ProjectExecNode,
        /// Input plan.
        input: Box<PhysicalPlan>,
    },

    /// Hash-based aggregation.
    Aggregate {
        /// Aggregation configuration.
        node: Box<AggregateExecNode>,
        /// Input plan.
        input: Box<PhysicalPlan>,
    },

    // ========== Binary Operators (Joins) ==========
    /// Nested loop join. Supports every join type and arbitrary conditions.
    NestedLoopJoin {
        /// Join configuration.
        node: Box<NestedLoopJoinNode>,
        /// Left input (outer).
        left: Box<PhysicalPlan>,
        /// Right input (buffered).
        right: Box<PhysicalPlan>,
    },

    /// Inner hash join on a single key pair. The right input is the build side.
    HashJoin {
        /// Join configuration.
        node: Box<EquiJoinNode>,
        /// Probe side input.
        left: Box<PhysicalPlan>,
        /// Build side input.
        right: Box<PhysicalPlan>,
    },

    /// Inner sort-merge join on a single key pair.
    SortMergeJoin {
        /// Join configuration.
        node: Box<EquiJoinNode>,
        /// Left input.
        left: Box<PhysicalPlan>,
        /// Right input.
        right: Box<PhysicalPlan>,
    },
}

/// Full table scan configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SeqScanNode {
    /// Table to scan.
    pub table_name: String,
    /// Alias the query refers to the table by.
    pub alias: Option<String>,
    /// Table schema.
    pub schema: Arc<Schema>,
    /// Estimated cost.
    pub cost: Cost,
}

impl SeqScanNode {
    /// Creates a scan node.
    #[must_use]
    pub fn new(table_name: impl Into<String>, schema: Arc<Schema>) -> Self {
        Self { table_name: table_name.into(), alias: None, schema, cost: Cost::zero() }
    }

    /// Sets the alias.
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Sets the cost.
    #[must_use]
    pub const fn with_cost(mut self, cost: Cost) -> Self {
        self.cost = cost;
        self
    }

    /// Returns the alias if set, otherwise the table name.
    #[must_use]
    pub fn reference_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table_name)
    }
}

/// INSERT configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertExecNode {
    /// Target table.
    pub table_name: String,
    /// Target columns, in row-value order.
    pub columns: Vec<Column>,
    /// Value expressions, one inner list per row.
    pub rows: Vec<Vec<LogicalExpr>>,
    /// Estimated cost.
    pub cost: Cost,
}

/// Filter configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterExecNode {
    /// The predicate; only rows where it is `TRUE` pass.
    pub predicate: LogicalExpr,
    /// Estimated cost.
    pub cost: Cost,
}

impl FilterExecNode {
    /// Creates a filter node.
    #[must_use]
    pub const fn new(predicate: LogicalExpr) -> Self {
        Self { predicate, cost: Cost::zero() }
    }

    /// Sets the cost.
    #[must_use]
    pub const fn with_cost(mut self, cost: Cost) -> Self {
        self.cost = cost;
        self
    }
}

/// Projection configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectExecNode {
    /// Output items.
    pub items: Vec<ProjectItem>,
    /// Output schema.
    pub schema: Arc<Schema>,
    /// Estimated cost.
    pub cost: Cost,
}

/// Hash aggregation configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateExecNode {
    /// Grouping expressions.
    pub group_by: Vec<LogicalExpr>,
    /// Output items.
    pub outputs: Vec<ProjectItem>,
    /// Output schema.
    pub schema: Arc<Schema>,
    /// Estimated cost.
    pub cost: Cost,
}

/// Nested loop join configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct NestedLoopJoinNode {
    /// Join type.
    pub join_type: JoinType,
    /// Join condition; `None` pairs every row.
    pub condition: Option<LogicalExpr>,
    /// Output schema.
    pub schema: Arc<Schema>,
    /// Scan names bound by the left input.
    pub left_qualifiers: HashSet<String>,
    /// Scan names bound by the right input.
    pub right_qualifiers: HashSet<String>,
    /// Estimated cost.
    pub cost: Cost,
}

/// Configuration shared by the single-key equi-join strategies.
#[derive(Debug, Clone, PartialEq)]
pub struct EquiJoinNode {
    /// Key evaluated against left rows.
    pub left_key: LogicalExpr,
    /// Key evaluated against right rows.
    pub right_key: LogicalExpr,
    /// Output schema.
    pub schema: Arc<Schema>,
    /// Scan names bound by the left input.
    pub left_qualifiers: HashSet<String>,
    /// Scan names bound by the right input.
    pub right_qualifiers: HashSet<String>,
    /// Estimated cost.
    pub cost: Cost,
}

impl PhysicalPlan {
    /// Returns the output schema of this node.
    #[must_use]
    pub fn schema(&self) -> Arc<Schema> {
        match self {
            Self::SeqScan(node) => Arc::clone(&node.schema),
            Self::Insert(_) => inserted_count_schema(),
            Self::Filter { input, .. } => input.schema(),
            Self::Project { node, .. } => Arc::clone(&node.schema),
            Self::Aggregate { node, .. } => Arc::clone(&node.schema),
            Self::NestedLoopJoin { node, .. } => Arc::clone(&node.schema),
            Self::HashJoin { node, .. } | Self::SortMergeJoin { node, .. } => {
                Arc::clone(&node.schema)
            }
        }
    }

    /// Returns the child plans of this node.
    #[must_use]
    pub fn children(&self) -> Vec<&PhysicalPlan> {
        match self {
            Self::SeqScan(_) | Self::Insert(_) => vec![],
            Self::Filter { input, .. }
            | Self::Project { input, .. }
            | Self::Aggregate { input, .. } => vec![input.as_ref()],
            Self::NestedLoopJoin { left, right, .. }
            | Self::HashJoin { left, right, .. }
            | Self::SortMergeJoin { left, right, .. } => vec![left.as_ref(), right.as_ref()],
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
            Self::SeqScan(node) => {
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

    /// Returns true if this is a leaf node.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::SeqScan(_) | Self::Insert(_))
    }

    /// Returns the node type name (for display/debugging).
    #[must_use]
    pub fn node_type(&self) -> &'static str {
        match self {
            Self::SeqScan(_) => "SeqScan",
            Self::Insert(_) => "Insert",
            Self::Filter { .. } => "Filter",
            Self::Project { .. } => "Project",
            Self::Aggregate { .. } => "Aggregate",
            Self::NestedLoopJoin { .. } => "NestedLoopJoin",
            Self::HashJoin { .. } => "HashJoin",
            Self::SortMergeJoin { .. } => "SortMergeJoin",
        }
    }

    /// Returns the cost the optimizer recorded for this node.
    #[must_use]
    pub fn cost(&self) -> Cost {
        match self {
            Self::SeqScan(node) => node.cost,
            Self::Insert(node) => node.cost,
            Self::Filter { node, .. } => node.cost,
            Self::Project { node, .. } => node.cost,
            Self::Aggregate { node, .. } => node.cost,
            Self::NestedLoopJoin { node, .. } => node.cost,
            Self::HashJoin { node, .. } | Self::SortMergeJoin { node, .. } => node.cost,
        }
    }

    /// Recomputes the cost of this tree bottom-up under `model`.
    #[must_use]
    pub fn estimate(&self, model: &CostModel) -> Cost {
        match self {
            Self::SeqScan(node) => model.seq_scan(&node.table_name),
            Self::Insert(node) => model.insert(node.rows.len()),
            Self::Filter { input, .. } => model.filter(&input.estimate(model)),
            Self::Project { input, .. } => model.project(&input.estimate(model)),
            Self::Aggregate { input, .. } => model.aggregate(&input.estimate(model)),
            Self::NestedLoopJoin { left, right, .. } => {
                model.nested_loop_join(&left.estimate(model), &right.estimate(model))
            }
            Self::HashJoin { left, right, .. } => {
                model.hash_join(&left.estimate(model), &right.estimate(model))
            }
            Self::SortMergeJoin { left, right, .. } => {
                model.sort_merge_join(&left.estimate(model), &right.estimate(model))
            }
        }
    }

    /// Position of this strategy in the optimizer's tie-break order.
    #[must_use]
    pub(crate) const fn preference_rank(&self) -> u8 {
        match self {
            Self::HashJoin { .. } => 0,
            Self::SortMergeJoin { .. } => 1,
            Self::NestedLoopJoin { .. } => 2,
            _ => 3,
        }
    }

    /// Counts the nodes in this tree.
    #[must_use]
    pub fn node_count(&self) -> usize {
        1 + self.children().iter().map(|c| c.node_count()).sum::<usize>()
    }

    /// Builds the operator tree for this plan, bound to `ctx`.
    ///
    /// The returned executor is not yet open.
    #[must_use]
    pub fn create(&self, ctx: &ExecutionContext) -> Executor {
        Executor::new(self, ctx.clone())
    }

    /// Pretty prints the plan as a tree.
    #[must_use]
    pub fn display_tree(&self) -> DisplayTree<'_> {
        DisplayTree { plan: self }
    }
}

impl fmt::Display for PhysicalPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_tree())
    }
}

/// Helper for tree-style plan display.
pub struct DisplayTree<'a> {
    plan: &'a PhysicalPlan,
}

impl fmt::Display for DisplayTree<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_node(f, self.plan, "", true)
    }
}

fn fmt_node(
    f: &mut fmt::Formatter<'_>,
    plan: &PhysicalPlan,
    prefix: &str,
    is_last: bool,
) -> fmt::Result {
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

fn fmt_node_content(f: &mut fmt::Formatter<'_>, plan: &PhysicalPlan) -> fmt::Result {
    match plan {
        PhysicalPlan::SeqScan(node) => {
            write!(f, "SeqScan: {}", node.table_name)?;
            if let Some(alias) = &node.alias {
                write!(f, " AS {alias}")?;
            }
        }
        PhysicalPlan::Insert(node) => {
            write!(f, "Insert: {} ({} rows)", node.table_name, node.rows.len())?;
        }
        PhysicalPlan::Filter { node, .. } => {
            write!(f, "Filter: {}", node.predicate)?;
        }
        PhysicalPlan::Project { node, .. } => {
            write!(f, "Project: ")?;
            fmt_list(f, &node.items)?;
        }
        PhysicalPlan::Aggregate { node, .. } => {
            write!(f, "Aggregate: ")?;
            if !node.group_by.is_empty() {
                write!(f, "GROUP BY ")?;
                fmt_list(f, &node.group_by)?;
                write!(f, " ")?;
            }
            write!(f, "[")?;
            fmt_list(f, &node.outputs)?;
            write!(f, "]")?;
        }
        PhysicalPlan::NestedLoopJoin { node, .. } => {
            write!(f, "NestedLoopJoin: {} JOIN", node.join_type)?;
            if let Some(cond) = &node.condition {
                write!(f, " ON {cond}")?;
            }
        }
        PhysicalPlan::HashJoin { node, .. } => {
            write!(f, "HashJoin: {} = {}", node.left_key, node.right_key)?;
        }
        PhysicalPlan::SortMergeJoin { node, .. } => {
            write!(f, "SortMergeJoin: {} = {}", node.left_key, node.right_key)?;
        }
    }
    write!(f, " (cost: {:.2})", plan.cost().total())
}

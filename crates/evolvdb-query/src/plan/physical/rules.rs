//! Implementation rules.
//!
//! Each rule turns one kind of logical node, whose inputs have already been
//! planned, into one or more costed physical alternatives.

use std::fmt;

use crate::error::{QueryError, QueryResult};
use crate::plan::logical::{ColumnRef, JoinType, LogicalExpr, LogicalPlan};

use super::cost::CostModel;
use super::node::{
    AggregateExecNode, EquiJoinNode, FilterExecNode, InsertExecNode, NestedLoopJoinNode,
    PhysicalPlan, ProjectExecNode, SeqScanNode,
};

/// A rule producing physical alternatives for a logical node.
pub trait PhysicalRule: Send + Sync + fmt::Debug {
    /// Returns the rule name.
    fn name(&self) -> &'static str;

    /// Returns true if the rule implements this logical node.
    fn matches(&self, plan: &LogicalPlan) -> bool;

    /// Produces the alternatives for `plan`, given its planned inputs.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnsupportedLogicalNode`] when called on a node
    /// the rule does not match or with the wrong number of inputs.
    fn apply(
        &self,
        plan: &LogicalPlan,
        inputs: Vec<PhysicalPlan>,
        model: &CostModel,
    ) -> QueryResult<Vec<PhysicalPlan>>;
}

/// Returns one rule per logical node kind, with every join strategy enabled.
#[must_use]
pub fn default_rules() -> Vec<Box<dyn PhysicalRule>> {
    vec![
        Box::new(ScanRule),
        Box::new(InsertRule),
        Box::new(FilterRule),
        Box::new(ProjectRule),
        Box::new(AggregateRule),
        Box::new(JoinRule::new()),
    ]
}

/// Returns the rule set of the baseline planner: joins are always nested loops.
#[must_use]
pub fn nested_loop_rules() -> Vec<Box<dyn PhysicalRule>> {
    vec![
        Box::new(ScanRule),
        Box::new(InsertRule),
        Box::new(FilterRule),
        Box::new(ProjectRule),
        Box::new(AggregateRule),
        Box::new(JoinRule::nested_loop_only()),
    ]
}

fn unsupported(rule: &dyn PhysicalRule, plan: &LogicalPlan) -> QueryError {
    QueryError::UnsupportedLogicalNode(format!("{} applied to {}", rule.name(), plan.node_type()))
}

fn single_input(
    rule: &dyn PhysicalRule,
    plan: &LogicalPlan,
    inputs: Vec<PhysicalPlan>,
) -> QueryResult<PhysicalPlan> {
    let mut inputs = inputs.into_iter();
    match (inputs.next(), inputs.next()) {
        (Some(input), None) => Ok(input),
        _ => Err(unsupported(rule, plan)),
    }
}

fn two_inputs(
    rule: &dyn PhysicalRule,
    plan: &LogicalPlan,
    inputs: Vec<PhysicalPlan>,
) -> QueryResult<(PhysicalPlan, PhysicalPlan)> {
    let mut inputs = inputs.into_iter();
    match (inputs.next(), inputs.next(), inputs.next()) {
        (Some(left), Some(right), None) => Ok((left, right)),
        _ => Err(unsupported(rule, plan)),
    }
}

/// Scan → SeqScan.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanRule;

impl PhysicalRule for ScanRule {
    fn name(&self) -> &'static str {
        "ScanRule"
    }

    fn matches(&self, plan: &LogicalPlan) -> bool {
        matches!(plan, LogicalPlan::Scan(_))
    }

    fn apply(
        &self,
        plan: &LogicalPlan,
        _inputs: Vec<PhysicalPlan>,
        model: &CostModel,
    ) -> QueryResult<Vec<PhysicalPlan>> {
        let LogicalPlan::Scan(scan) = plan else {
            return Err(unsupported(self, plan));
        };
        let mut node = SeqScanNode::new(scan.table_name.clone(), scan.schema.clone())
            .with_cost(model.seq_scan(&scan.table_name));
        node.alias.clone_from(&scan.alias);
        Ok(vec![PhysicalPlan::SeqScan(Box::new(node))])
    }
}

/// Insert → Insert.
#[derive(Debug, Clone, Copy, Default)]
pub struct InsertRule;

impl PhysicalRule for InsertRule {
    fn name(&self) -> &'static str {
        "InsertRule"
    }

    fn matches(&self, plan: &LogicalPlan) -> bool {
        matches!(plan, LogicalPlan::Insert(_))
    }

    fn apply(
        &self,
        plan: &LogicalPlan,
        _inputs: Vec<PhysicalPlan>,
        model: &CostModel,
    ) -> QueryResult<Vec<PhysicalPlan>> {
        let LogicalPlan::Insert(insert) = plan else {
            return Err(unsupported(self, plan));
        };
        Ok(vec![PhysicalPlan::Insert(Box::new(InsertExecNode {
            table_name: insert.table_name.clone(),
            columns: insert.columns.clone(),
            rows: insert.rows.clone(),
            cost: model.insert(insert.rows.len()),
        }))])
    }
}

/// Filter → Filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterRule;

impl PhysicalRule for FilterRule {
    fn name(&self) -> &'static str {
        "FilterRule"
    }

    fn matches(&self, plan: &LogicalPlan) -> bool {
        matches!(plan, LogicalPlan::Filter { .. })
    }

    fn apply(
        &self,
        plan: &LogicalPlan,
        inputs: Vec<PhysicalPlan>,
        model: &CostModel,
    ) -> QueryResult<Vec<PhysicalPlan>> {
        let LogicalPlan::Filter { node, .. } = plan else {
            return Err(unsupported(self, plan));
        };
        let input = single_input(self, plan, inputs)?;
        let cost = model.filter(&input.cost());
        Ok(vec![PhysicalPlan::Filter {
            node: FilterExecNode::new(node.predicate.clone()).with_cost(cost),
            input: Box::new(input),
        }])
    }
}

/// Project → Project.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectRule;

impl PhysicalRule for ProjectRule {
    fn name(&self) -> &'static str {
        "ProjectRule"
    }

    fn matches(&self, plan: &LogicalPlan) -> bool {
        matches!(plan, LogicalPlan::Project { .. })
    }

    fn apply(
        &self,
        plan: &LogicalPlan,
        inputs: Vec<PhysicalPlan>,
        model: &CostModel,
    ) -> QueryResult<Vec<PhysicalPlan>> {
        let LogicalPlan::Project { node, .. } = plan else {
            return Err(unsupported(self, plan));
        };
        let input = single_input(self, plan, inputs)?;
        let cost = model.project(&input.cost());
        Ok(vec![PhysicalPlan::Project {
            node: ProjectExecNode { items: node.items.clone(), schema: node.schema.clone(), cost },
            input: Box::new(input),
        }])
    }
}

/// Aggregate → hash Aggregate.
#[derive(Debug, Clone, Copy, Default)]
pub struct AggregateRule;

impl PhysicalRule for AggregateRule {
    fn name(&self) -> &'static str {
        "AggregateRule"
    }

    fn matches(&self, plan: &LogicalPlan) -> bool {
        matches!(plan, LogicalPlan::Aggregate { .. })
    }

    fn apply(
        &self,
        plan: &LogicalPlan,
        inputs: Vec<PhysicalPlan>,
        model: &CostModel,
    ) -> QueryResult<Vec<PhysicalPlan>> {
        let LogicalPlan::Aggregate { node, .. } = plan else {
            return Err(unsupported(self, plan));
        };
        let input = single_input(self, plan, inputs)?;
        let cost = model.aggregate(&input.cost());
        Ok(vec![PhysicalPlan::Aggregate {
            node: Box::new(AggregateExecNode {
                group_by: node.group_by.clone(),
                outputs: node.outputs.clone(),
                schema: node.schema.clone(),
                cost,
            }),
            input: Box::new(input),
        }])
    }
}

/// Join → NestedLoopJoin, plus HashJoin and SortMergeJoin for inner
/// single-key equi-joins.
#[derive(Debug, Clone, Copy)]
pub struct JoinRule {
    equi_strategies: bool,
}

impl Default for JoinRule {
    fn default() -> Self {
        Self::new()
    }
}

impl JoinRule {
    /// Creates a join rule offering every applicable strategy.
    #[must_use]
    pub const fn new() -> Self {
        Self { equi_strategies: true }
    }

    /// Creates a join rule that only offers nested loop joins.
    #[must_use]
    pub const fn nested_loop_only() -> Self {
        Self { equi_strategies: false }
    }
}

/// Returns `(left_key, right_key)` if `condition` is a single `col = col`
/// whose operands bind to opposite inputs, with the keys swapped as needed
/// so that the left key binds the left input.
#[must_use]
pub fn equi_join_keys(
    condition: &LogicalExpr,
    left: &LogicalPlan,
    right: &LogicalPlan,
) -> Option<(LogicalExpr, LogicalExpr)> {
    let (a, b) = condition.as_column_equality()?;
    let (ra, rb) = (column_ref(a)?, column_ref(b)?);
    // A key must bind to exactly one input.
    let only_left = |r: &ColumnRef| left.binds(r) && !right.binds(r);
    let only_right = |r: &ColumnRef| right.binds(r) && !left.binds(r);
    if only_left(&ra) && only_right(&rb) {
        Some((a.clone(), b.clone()))
    } else if only_left(&rb) && only_right(&ra) {
        Some((b.clone(), a.clone()))
    } else {
        None
    }
}

fn column_ref(expr: &LogicalExpr) -> Option<ColumnRef> {
    match expr {
        LogicalExpr::Column { qualifier, name } => Some(ColumnRef::new(qualifier.as_deref(), name)),
        _ => None,
    }
}

impl PhysicalRule for JoinRule {
    fn name(&self) -> &'static str {
        "JoinRule"
    }

    fn matches(&self, plan: &LogicalPlan) -> bool {
        matches!(plan, LogicalPlan::Join { .. })
    }

    fn apply(
        &self,
        plan: &LogicalPlan,
        inputs: Vec<PhysicalPlan>,
        model: &CostModel,
    ) -> QueryResult<Vec<PhysicalPlan>> {
        let LogicalPlan::Join { node, left: logical_left, right: logical_right } = plan else {
            return Err(unsupported(self, plan));
        };
        let (left, right) = two_inputs(self, plan, inputs)?;
        let (left_cost, right_cost) = (left.cost(), right.cost());
        let left_qualifiers = logical_left.qualifiers();
        let right_qualifiers = logical_right.qualifiers();

        let keys = if self.equi_strategies && node.join_type == JoinType::Inner {
            node.condition
                .as_ref()
                .and_then(|cond| equi_join_keys(cond, logical_left, logical_right))
        } else {
            None
        };

        let mut alternatives = Vec::with_capacity(3);
        if let Some((left_key, right_key)) = keys {
            let equi = EquiJoinNode {
                left_key,
                right_key,
                schema: node.schema.clone(),
                left_qualifiers: left_qualifiers.clone(),
                right_qualifiers: right_qualifiers.clone(),
                cost: model.hash_join(&left_cost, &right_cost),
            };
            let merge = EquiJoinNode { cost: model.sort_merge_join(&left_cost, &right_cost), ..equi.clone() };
            alternatives.push(PhysicalPlan::HashJoin {
                node: Box::new(equi),
                left: Box::new(left.clone()),
                right: Box::new(right.clone()),
            });
            alternatives.push(PhysicalPlan::SortMergeJoin {
                node: Box::new(merge),
                left: Box::new(left.clone()),
                right: Box::new(right.clone()),
            });
        }

        alternatives.push(PhysicalPlan::NestedLoopJoin {
            node: Box::new(NestedLoopJoinNode {
                join_type: node.join_type,
                condition: node.condition.clone(),
                schema: node.schema.clone(),
                left_qualifiers,
                right_qualifiers,
                cost: model.nested_loop_join(&left_cost, &right_cost),
            }),
            left: Box::new(left),
            right: Box::new(right),
        });
        Ok(alternatives)
    }
}

//! Predicate pushdown optimization.
//!
//! Pushes filter predicates below joins so that fewer rows reach the join.

use tracing::trace;

use crate::plan::logical::{
    conjunction, split_conjunction, AggregateNode, FilterNode, JoinNode, LogicalExpr, LogicalPlan,
};

/// Predicate pushdown optimizer.
///
/// Transforms plans by pushing each conjunct of a filter into the join
/// input that alone provides every column the conjunct references.
/// Predicates never cross a `Project` or an `Aggregate`.
///
/// # Example Transformation
///
/// Before:
/// ```text
/// Filter(u.age > 21 AND o.amount > 100)
///   Join(u.id = o.user_id)
///     Scan(users AS u)
///     Scan(orders AS o)
/// ```
///
/// After:
/// ```text
/// Join(u.id = o.user_id)
///   Filter(u.age > 21)
///     Scan(users AS u)
///   Filter(o.amount > 100)
///     Scan(orders AS o)
/// ```
#[derive(Debug, Clone, Default)]
pub struct PredicatePushdown {}

impl PredicatePushdown {
    /// Creates a new predicate pushdown optimizer.
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// Optimizes a plan by pushing predicates down.
    #[must_use]
    pub fn optimize(&self, plan: LogicalPlan) -> LogicalPlan {
        self.push_down(plan, Vec::new())
    }

    /// Recursively pushes predicates down through the plan tree.
    ///
    /// `predicates` are conjuncts carried from the filters above `plan`.
    fn push_down(&self, plan: LogicalPlan, mut predicates: Vec<LogicalExpr>) -> LogicalPlan {
        match plan {
            // Collect the predicate and keep going
            LogicalPlan::Filter { node, input } => {
                predicates.extend(split_conjunction(&node.predicate));
                self.push_down(*input, predicates)
            }

            LogicalPlan::Join { node, left, right } => {
                self.push_through_join(*node, *left, *right, predicates)
            }

            // A projection renames and computes columns; predicates stay above it
            LogicalPlan::Project { node, input } => {
                let optimized_input = self.push_down(*input, Vec::new());
                let result = LogicalPlan::Project { node, input: Box::new(optimized_input) };
                Self::apply_predicates(result, predicates)
            }

            LogicalPlan::Aggregate { node, input } => {
                self.push_through_aggregate(*node, *input, predicates)
            }

            // Leaves keep the filter directly above them
            LogicalPlan::Scan(_) | LogicalPlan::Insert(_) => {
                Self::apply_predicates(plan, predicates)
            }
        }
    }

    /// Filters above an aggregate refer to its outputs and stay above it.
    fn push_through_aggregate(
        &self,
        node: AggregateNode,
        input: LogicalPlan,
        predicates: Vec<LogicalExpr>,
    ) -> LogicalPlan {
        let optimized_input = self.push_down(input, Vec::new());
        let result =
            LogicalPlan::Aggregate { node: Box::new(node), input: Box::new(optimized_input) };
        Self::apply_predicates(result, predicates)
    }

    /// Pushes predicates through a join.
    ///
    /// For outer joins only the preserved side may receive conjuncts:
    /// filtering the null-padded side would drop padded rows the filter
    /// above would have seen.
    fn push_through_join(
        &self,
        node: JoinNode,
        left: LogicalPlan,
        right: LogicalPlan,
        predicates: Vec<LogicalExpr>,
    ) -> LogicalPlan {
        let mut left_predicates = Vec::with_capacity(predicates.len());
        let mut right_predicates = Vec::with_capacity(predicates.len());
        let mut remaining = Vec::with_capacity(predicates.len());

        let push_left = !node.join_type.preserves_right();
        let push_right = !node.join_type.preserves_left();

        for pred in predicates {
            let refs = pred.column_refs();
            let in_left = refs.iter().all(|r| left.binds(r));
            let in_right = refs.iter().all(|r| right.binds(r));

            if in_left && !in_right && push_left {
                trace!(predicate = %pred, "pushing predicate to left join input");
                left_predicates.push(pred);
            } else if in_right && !in_left && push_right {
                trace!(predicate = %pred, "pushing predicate to right join input");
                right_predicates.push(pred);
            } else {
                remaining.push(pred);
            }
        }

        let optimized_left = self.push_down(left, left_predicates);
        let optimized_right = self.push_down(right, right_predicates);

        let result = LogicalPlan::Join {
            node: Box::new(node),
            left: Box::new(optimized_left),
            right: Box::new(optimized_right),
        };

        Self::apply_predicates(result, remaining)
    }

    /// Applies remaining predicates as a Filter node above the plan.
    fn apply_predicates(plan: LogicalPlan, predicates: Vec<LogicalExpr>) -> LogicalPlan {
        if predicates.is_empty() {
            return plan;
        }
        LogicalPlan::Filter { node: FilterNode::new(conjunction(predicates)), input: Box::new(plan) }
    }
}

//! Greedy join reordering.
//!
//! Rewrites chains of INNER joins into left-deep trees that start from the
//! smallest input and repeatedly add the cheapest next input.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::plan::logical::{
    conjunction, split_conjunction, BinaryOp, JoinNode, JoinType, LogicalExpr, LogicalPlan,
    ProjectItem,
};
use crate::plan::physical::{Cost, CostModel};

/// Join reordering optimizer.
///
/// A maximal chain of INNER joins is flattened into its inputs ("leaves")
/// and the conjuncts of its conditions. The rebuilt tree is seeded with the
/// leaf of fewest estimated rows; each step adds the leaf whose join with
/// the tree so far has the lowest estimated cost, using the hash-join
/// estimate when an equality conjunct connects the two and the nested-loop
/// estimate otherwise. Conjuncts no join consumed end up in a filter above
/// the tree, and a projection restores the original column order.
///
/// Chains of two leaves are left alone, as are chains whose reordered
/// output would carry the same column name twice, such as a self-join
/// without aliases.
#[derive(Debug, Clone, Default)]
pub struct JoinReorder {
    cost_model: CostModel,
}

impl JoinReorder {
    /// Creates a join reorderer that estimates with `cost_model`.
    #[must_use]
    pub const fn new(cost_model: CostModel) -> Self {
        Self { cost_model }
    }

    /// Optimizes a plan by reordering inner join chains.
    #[must_use]
    pub fn optimize(&self, plan: LogicalPlan) -> LogicalPlan {
        match plan {
            LogicalPlan::Join { node, left, right } if node.join_type == JoinType::Inner => {
                if chain_leaf_count(&left) + chain_leaf_count(&right) <= 2 {
                    LogicalPlan::Join {
                        node,
                        left: Box::new(self.optimize(*left)),
                        right: Box::new(self.optimize(*right)),
                    }
                } else {
                    let written =
                        LogicalPlan::Join { node: node.clone(), left: left.clone(), right: right.clone() };
                    self.reorder_chain(*node, *left, *right)
                        .unwrap_or_else(|| self.keep_chain(written))
                }
            }
            LogicalPlan::Join { node, left, right } => LogicalPlan::Join {
                node,
                left: Box::new(self.optimize(*left)),
                right: Box::new(self.optimize(*right)),
            },
            LogicalPlan::Filter { node, input } => {
                LogicalPlan::Filter { node, input: Box::new(self.optimize(*input)) }
            }
            LogicalPlan::Project { node, input } => {
                LogicalPlan::Project { node, input: Box::new(self.optimize(*input)) }
            }
            LogicalPlan::Aggregate { node, input } => {
                LogicalPlan::Aggregate { node, input: Box::new(self.optimize(*input)) }
            }
            LogicalPlan::Scan(_) | LogicalPlan::Insert(_) => plan,
        }
    }

    /// Optimizes the inputs of an inner join chain without reordering it.
    fn keep_chain(&self, plan: LogicalPlan) -> LogicalPlan {
        match plan {
            LogicalPlan::Join { node, left, right } if node.join_type == JoinType::Inner => LogicalPlan::Join {
                node,
                left: Box::new(self.keep_chain(*left)),
                right: Box::new(self.keep_chain(*right)),
            },
            other => self.optimize(other),
        }
    }

    /// Returns `None` when the reordered columns cannot be mapped back.
    fn reorder_chain(&self, node: JoinNode, left: LogicalPlan, right: LogicalPlan) -> Option<LogicalPlan> {
        let original_schema = Arc::clone(&node.schema);

        let mut leaves = Vec::new();
        let mut conjuncts = Vec::new();
        flatten(left, &mut leaves, &mut conjuncts);
        flatten(right, &mut leaves, &mut conjuncts);
        if let Some(cond) = &node.condition {
            conjuncts.extend(split_conjunction(cond));
        }

        let leaves: Vec<LogicalPlan> = leaves.into_iter().map(|l| self.optimize(l)).collect();
        let widths: Vec<usize> = leaves.iter().map(|l| l.schema().len()).collect();
        let rows: Vec<f64> = leaves.iter().map(|l| self.estimate_rows(l)).collect();

        let seed = rows
            .iter()
            .enumerate()
            .fold(0, |best, (i, r)| if *r < rows[best] { i } else { best });
        let mut remaining: Vec<(usize, LogicalPlan)> = leaves.into_iter().enumerate().collect();
        let (_, mut tree) = remaining.remove(seed);
        let mut tree_cost = Cost::new(rows[seed], 0.0, 0.0);
        let mut order = vec![seed];

        while !remaining.is_empty() {
            let mut best: Option<(usize, Option<usize>, Cost)> = None;
            for (pos, (leaf, candidate)) in remaining.iter().enumerate() {
                let equi = pick_equi_conjunct(&conjuncts, &tree, candidate);
                let candidate_cost = Cost::new(rows[*leaf], 0.0, 0.0);
                let estimate = if equi.is_some() {
                    self.cost_model.hash_join(&tree_cost, &candidate_cost)
                } else {
                    self.cost_model.nested_loop_join(&tree_cost, &candidate_cost)
                };
                if best.as_ref().map_or(true, |(_, _, c)| estimate.is_less_than(c)) {
                    best = Some((pos, equi, estimate));
                }
            }

            let Some((pos, equi, estimate)) = best else { break };
            let (leaf, next) = remaining.remove(pos);
            let condition = equi.map(|k| conjuncts.remove(k));
            tree = tree.join(next, JoinType::Inner, condition);
            tree_cost = Cost::new(estimate.row_count(), 0.0, 0.0);
            order.push(leaf);
        }

        debug!(order = ?order, "reordered inner join chain");

        if !conjuncts.is_empty() {
            tree = tree.filter(conjunction(conjuncts));
        }
        restore_column_order(tree, &original_schema, &widths, &order)
    }

    /// Estimates a leaf's rows from its left-most scan.
    fn estimate_rows(&self, plan: &LogicalPlan) -> f64 {
        match plan {
            LogicalPlan::Scan(node) => self.cost_model.table_rows(&node.table_name),
            _ => plan
                .children()
                .first()
                .map_or(self.cost_model.params().default_row_count, |c| self.estimate_rows(c)),
        }
    }
}

fn chain_leaf_count(plan: &LogicalPlan) -> usize {
    match plan {
        LogicalPlan::Join { node, left, right } if node.join_type == JoinType::Inner => {
            chain_leaf_count(left) + chain_leaf_count(right)
        }
        _ => 1,
    }
}

fn flatten(plan: LogicalPlan, leaves: &mut Vec<LogicalPlan>, conjuncts: &mut Vec<LogicalExpr>) {
    match plan {
        LogicalPlan::Join { node, left, right } if node.join_type == JoinType::Inner => {
            flatten(*left, leaves, conjuncts);
            flatten(*right, leaves, conjuncts);
            if let Some(cond) = &node.condition {
                conjuncts.extend(split_conjunction(cond));
            }
        }
        other => leaves.push(other),
    }
}

/// Finds a conjunct `a = b` with one side wholly inside `left` and the
/// other wholly inside `right`.
fn pick_equi_conjunct(conjuncts: &[LogicalExpr], left: &LogicalPlan, right: &LogicalPlan) -> Option<usize> {
    conjuncts.iter().position(|conjunct| {
        let LogicalExpr::BinaryOp { left: a, op: BinaryOp::Eq, right: b } = conjunct else {
            return false;
        };
        let a_refs = a.column_refs();
        let b_refs = b.column_refs();
        if a_refs.is_empty() || b_refs.is_empty() {
            return false;
        }
        let forward = a_refs.iter().all(|r| left.binds(r)) && b_refs.iter().all(|r| right.binds(r));
        let backward = b_refs.iter().all(|r| left.binds(r)) && a_refs.iter().all(|r| right.binds(r));
        forward || backward
    })
}

/// Wraps the reordered tree in a projection that presents its columns in
/// the chain's original order under their original names.
///
/// Each leaf contributes a contiguous run of `widths[leaf]` columns to a
/// join schema, so a column's position follows from the leaf order alone.
/// The projection names each position, so every name in the reordered
/// schema must be unique; `None` otherwise.
fn restore_column_order(
    tree: LogicalPlan,
    original: &Arc<evolvdb_core::Schema>,
    widths: &[usize],
    order: &[usize],
) -> Option<LogicalPlan> {
    let current = tree.schema();
    if current.names() == original.names() {
        return Some(tree);
    }
    let mut seen = HashSet::new();
    if !current.names().iter().all(|name| seen.insert(name.to_lowercase())) {
        return None;
    }

    let mut new_offset = vec![0; widths.len()];
    let mut offset = 0;
    for &leaf in order {
        new_offset[leaf] = offset;
        offset += widths[leaf];
    }

    let mut items = Vec::with_capacity(original.len());
    let mut old_pos = 0;
    for (leaf, &width) in widths.iter().enumerate() {
        for j in 0..width {
            let old = original.column(old_pos)?;
            let new = current.column(new_offset[leaf] + j)?;
            items.push(ProjectItem::new(LogicalExpr::column(new.name.clone()), old.name.clone()));
            old_pos += 1;
        }
    }
    Some(tree.project_with_schema(items, Arc::clone(original)))
}

//! Projection pruning optimization.
//!
//! Pushes column requirements down toward scans so that intermediate rows
//! carry only the columns something above actually reads.

use std::collections::HashSet;
use std::sync::Arc;

use evolvdb_core::Column;
use tracing::trace;

use crate::plan::logical::{
    ColumnRef, JoinNode, LogicalExpr, LogicalPlan, ProjectItem, ProjectNode,
};

/// Projection pruning optimizer.
///
/// Computes the columns each node must produce, top down, and narrows the
/// plan to them: non-root projections drop unused items and scans gain a
/// narrowing projection. Join schemas are rebuilt from their narrowed
/// inputs. The root's output is never changed.
///
/// # Example Transformation
///
/// Before:
/// ```text
/// Project(name)
///   Filter(age > 21)
///     Scan(users)
/// ```
///
/// After:
/// ```text
/// Project(name)
///   Filter(age > 21)
///     Project(name, age)
///       Scan(users)
/// ```
#[derive(Debug, Clone, Default)]
pub struct ProjectionPruning {}

impl ProjectionPruning {
    /// Creates a new projection pruning optimizer.
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// Optimizes a plan by pruning unused columns.
    #[must_use]
    pub fn optimize(&self, plan: LogicalPlan) -> LogicalPlan {
        if matches!(plan, LogicalPlan::Insert(_)) {
            return plan;
        }
        let required = Self::root_requirement(&plan);
        self.prune(plan, &required, true)
    }

    /// The root Project needs what its items read; any other root needs
    /// every column it produces.
    fn root_requirement(plan: &LogicalPlan) -> HashSet<ColumnRef> {
        match plan {
            LogicalPlan::Project { node, .. } => {
                node.items.iter().flat_map(|item| item.expr.column_refs()).collect()
            }
            _ => plan
                .schema()
                .columns()
                .iter()
                .map(|c| ColumnRef::from_column_name(&c.name))
                .collect(),
        }
    }

    fn prune(&self, plan: LogicalPlan, required: &HashSet<ColumnRef>, is_root: bool) -> LogicalPlan {
        match plan {
            LogicalPlan::Project { node, input } => self.prune_project(node, *input, required, is_root),

            LogicalPlan::Filter { node, input } => {
                let mut child_required = required.clone();
                child_required.extend(node.predicate.column_refs());
                let input = self.prune(*input, &child_required, false);
                LogicalPlan::Filter { node, input: Box::new(input) }
            }

            LogicalPlan::Aggregate { node, input } => {
                let mut child_required = required.clone();
                child_required.extend(node.group_by.iter().flat_map(LogicalExpr::column_refs));
                child_required.extend(node.outputs.iter().flat_map(|o| o.expr.column_refs()));
                let input = self.prune(*input, &child_required, false);
                LogicalPlan::Aggregate { node, input: Box::new(input) }
            }

            LogicalPlan::Join { node, left, right } => self.prune_join(*node, *left, *right, required),

            LogicalPlan::Scan(_) => Self::narrow_leaf(plan, required),

            LogicalPlan::Insert(_) => plan,
        }
    }

    fn prune_project(
        &self,
        node: ProjectNode,
        input: LogicalPlan,
        required: &HashSet<ColumnRef>,
        is_root: bool,
    ) -> LogicalPlan {
        let ProjectNode { items, schema } = node;

        let mut keep: Vec<bool> = if is_root {
            vec![true; items.len()]
        } else {
            items.iter().map(|item| required.iter().any(|r| item_matches(&item.name, r))).collect()
        };
        if !keep.iter().any(|&k| k) {
            keep = vec![true; items.len()];
        }

        let child_required: HashSet<ColumnRef> = items
            .iter()
            .zip(&keep)
            .filter(|(_, &k)| k)
            .flat_map(|(item, _)| item.expr.column_refs())
            .collect();
        let input = self.prune(input, &child_required, false);

        if keep.iter().all(|&k| k) {
            return LogicalPlan::Project { node: ProjectNode { items, schema }, input: Box::new(input) };
        }

        let indices: Vec<usize> = keep.iter().enumerate().filter(|(_, &k)| k).map(|(i, _)| i).collect();
        let narrowed = Arc::new(schema.project(&indices));
        let items: Vec<ProjectItem> =
            items.into_iter().zip(keep).filter(|(_, k)| *k).map(|(item, _)| item).collect();
        trace!(kept = items.len(), "narrowed projection");
        input.project_with_schema(items, narrowed)
    }

    /// Splits the requirement between the join inputs. References that
    /// resolve on both sides, on neither, or that the condition reads go to
    /// both.
    fn prune_join(
        &self,
        node: JoinNode,
        left: LogicalPlan,
        right: LogicalPlan,
        required: &HashSet<ColumnRef>,
    ) -> LogicalPlan {
        let mut left_required = HashSet::new();
        let mut right_required = HashSet::new();

        for r in required {
            let in_left = left.binds(r);
            let in_right = right.binds(r);
            if in_left || !in_right {
                left_required.insert(r.clone());
            }
            if in_right || !in_left {
                right_required.insert(r.clone());
            }
        }
        if let Some(cond) = &node.condition {
            for r in cond.column_refs() {
                left_required.insert(r.clone());
                right_required.insert(r);
            }
        }

        let left = self.prune(left, &left_required, false);
        let right = self.prune(right, &right_required, false);
        left.join(right, node.join_type, node.condition)
    }

    /// Puts a narrowing projection above a leaf unless it would keep every
    /// column. When nothing is required the first column survives.
    fn narrow_leaf(plan: LogicalPlan, required: &HashSet<ColumnRef>) -> LogicalPlan {
        let schema = plan.schema();
        if schema.is_empty() {
            return plan;
        }
        let qualifiers = plan.qualifiers();

        let mut indices: Vec<usize> = schema
            .columns()
            .iter()
            .enumerate()
            .filter(|(_, c)| required.iter().any(|r| column_matches(c, &qualifiers, r)))
            .map(|(i, _)| i)
            .collect();
        if indices.is_empty() {
            indices.push(0);
        }
        if indices.len() == schema.len() {
            return plan;
        }

        let items = indices
            .iter()
            .filter_map(|&i| schema.column(i))
            .map(|c| ProjectItem::new(LogicalExpr::column(c.name.clone()), c.name.clone()))
            .collect();
        let narrowed = Arc::new(schema.project(&indices));
        trace!(table = %plan.qualifier(), columns = indices.len(), "narrowing scan");
        plan.project_with_schema(items, narrowed)
    }
}

fn bare_name(name: &str) -> &str {
    name.split_once('.').map_or(name, |(_, bare)| bare)
}

/// Matches an output item name against a required reference.
fn item_matches(item_name: &str, r: &ColumnRef) -> bool {
    let name = item_name.to_lowercase();
    name == r.name || name == r.full_name() || bare_name(&name) == r.name
}

/// Matches a leaf column against a required reference, honouring the
/// reference's qualifier.
fn column_matches(column: &Column, qualifiers: &HashSet<String>, r: &ColumnRef) -> bool {
    let name = column.name.to_lowercase();
    if r.full_name() == name {
        return true;
    }
    let name_ok = r.name == name || r.name == bare_name(&name);
    match &r.qualifier {
        None => name_ok,
        Some(q) => name_ok && qualifiers.contains(q),
    }
}

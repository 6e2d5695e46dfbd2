//! Cost-based physical optimization.
//!
//! [`VolcanoOptimizer`] plans a logical tree bottom-up: every child is
//! planned first, then every alternative of every matching rule is costed
//! and the cheapest kept. Equal totals are broken by strategy preference
//! (hash join, then sort-merge join, then nested loop join, then anything
//! else) so that the outcome is deterministic.

use tracing::{debug, trace};

use crate::error::{QueryError, QueryResult};
use crate::plan::logical::LogicalPlan;

use super::cost::CostModel;
use super::memo::Memo;
use super::node::PhysicalPlan;
use super::rules::{default_rules, nested_loop_rules, PhysicalRule};

/// Cost-based optimizer over a fixed rule set.
#[derive(Debug)]
pub struct VolcanoOptimizer {
    cost_model: CostModel,
    rules: Vec<Box<dyn PhysicalRule>>,
    use_memo: bool,
}

impl Default for VolcanoOptimizer {
    fn default() -> Self {
        Self::new(CostModel::default())
    }
}

impl VolcanoOptimizer {
    /// Creates an optimizer with the default rules and no memo.
    #[must_use]
    pub fn new(cost_model: CostModel) -> Self {
        Self { cost_model, rules: default_rules(), use_memo: false }
    }

    /// Enables or disables the memo.
    #[must_use]
    pub const fn with_memo(mut self, use_memo: bool) -> Self {
        self.use_memo = use_memo;
        self
    }

    /// Replaces the rule set.
    #[must_use]
    pub fn with_rules(mut self, rules: Vec<Box<dyn PhysicalRule>>) -> Self {
        self.rules = rules;
        self
    }

    /// Returns the cost model.
    #[must_use]
    pub const fn cost_model(&self) -> &CostModel {
        &self.cost_model
    }

    /// Returns the cheapest physical plan for `plan`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::NoPhysicalAlternative`] if no rule implements
    /// some node of the tree.
    pub fn optimize(&self, plan: &LogicalPlan) -> QueryResult<PhysicalPlan> {
        if self.use_memo {
            let mut memo = Memo::new();
            let best = self.optimize_with_memo(plan, &mut memo)?;
            debug!(groups = memo.group_count(), hits = memo.hits(), "memo search finished");
            Ok(best)
        } else {
            self.search(plan, &mut None)
        }
    }

    /// Like [`optimize`](Self::optimize), recording and reusing winners in
    /// `memo`. The memo must have been filled from this same tree.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::NoPhysicalAlternative`] if no rule implements
    /// some node of the tree.
    pub fn optimize_with_memo(&self, plan: &LogicalPlan, memo: &mut Memo) -> QueryResult<PhysicalPlan> {
        self.search(plan, &mut Some(memo))
    }

    fn search(&self, plan: &LogicalPlan, memo: &mut Option<&mut Memo>) -> QueryResult<PhysicalPlan> {
        if let Some(group) = memo.as_deref_mut().and_then(|m| m.lookup(plan)) {
            return Ok(group.best.clone());
        }

        let inputs = plan
            .children()
            .into_iter()
            .map(|child| self.search(child, memo))
            .collect::<QueryResult<Vec<_>>>()?;

        let mut best: Option<PhysicalPlan> = None;
        for rule in self.rules.iter().filter(|r| r.matches(plan)) {
            for candidate in rule.apply(plan, inputs.clone(), &self.cost_model)? {
                trace!(rule = rule.name(), candidate = candidate.node_type(), cost = %candidate.cost());
                if best.as_ref().map_or(true, |current| is_better(&candidate, current)) {
                    best = Some(candidate);
                }
            }
        }

        let best = best.ok_or_else(|| QueryError::NoPhysicalAlternative(plan.node_type().to_owned()))?;
        if let Some(m) = memo.as_deref_mut() {
            m.insert(plan, best.clone());
        }
        Ok(best)
    }
}

fn is_better(candidate: &PhysicalPlan, current: &PhysicalPlan) -> bool {
    let (new, old) = (candidate.cost().total(), current.cost().total());
    new < old || (new == old && candidate.preference_rank() < current.preference_rank())
}

/// Baseline planner: one physical node per logical node, joins always as
/// nested loops. Used when cost-based planning is disabled and as the
/// reference for result equivalence.
#[derive(Debug)]
pub struct PhysicalPlanner {
    inner: VolcanoOptimizer,
}

impl Default for PhysicalPlanner {
    fn default() -> Self {
        Self::new(CostModel::default())
    }
}

impl PhysicalPlanner {
    /// Creates a baseline planner.
    #[must_use]
    pub fn new(cost_model: CostModel) -> Self {
        Self { inner: VolcanoOptimizer::new(cost_model).with_rules(nested_loop_rules()) }
    }

    /// Plans a logical tree.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::NoPhysicalAlternative`] for nodes it cannot plan.
    pub fn plan(&self, plan: &LogicalPlan) -> QueryResult<PhysicalPlan> {
        self.inner.optimize(plan)
    }
}

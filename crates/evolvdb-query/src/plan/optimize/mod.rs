//! Logical plan rewriting.
//!
//! This module provides rewrite passes for logical query plans,
//! transforming them into cheaper equivalent plans.
//!
//! # Rewrite Passes
//!
//! The rewriter applies, in order:
//!
//! - **Predicate Pushdown**: push filter conjuncts below joins
//! - **Projection Pruning**: carry only the columns that are read
//! - **Join Reordering**: turn inner join chains into greedy left-deep trees
//!
//! # Example
//!
//! ```
//! use evolvdb_core::{Column, DataType, Schema};
//! use evolvdb_query::plan::logical::{LogicalExpr, LogicalPlan};
//! use evolvdb_query::plan::optimize::LogicalRewriter;
//!
//! let users = Schema::new(vec![Column::new("id", DataType::Int)]);
//! let orders = Schema::new(vec![Column::new("user_id", DataType::Int)]);
//!
//! let plan = LogicalPlan::scan_aliased("users", "u", users)
//!     .inner_join(
//!         LogicalPlan::scan_aliased("orders", "o", orders),
//!         LogicalExpr::qualified_column("u", "id").eq(LogicalExpr::qualified_column("o", "user_id")),
//!     )
//!     .filter(LogicalExpr::qualified_column("u", "id").gt(LogicalExpr::integer(10)));
//!
//! let rewritten = LogicalRewriter::new().rewrite(&plan);
//! assert_eq!(rewritten.node_type(), "Join");
//! ```

mod join_reorder;
mod predicate_pushdown;
mod projection_pruning;

use std::sync::Arc;

pub use join_reorder::JoinReorder;
pub use predicate_pushdown::PredicatePushdown;
pub use projection_pruning::ProjectionPruning;

use evolvdb_core::StatsProvider;
use tracing::debug;

use crate::exec::ExecutionContext;
use crate::plan::logical::LogicalPlan;
use crate::plan::physical::{CostModel, CostParameters};

/// Default number of predicate pushdown passes.
pub const DEFAULT_PUSHDOWN_PASSES: usize = 4;

/// Logical plan rewriter.
///
/// Applies the rewrite passes to transform logical plans into
/// cheaper equivalent plans.
#[derive(Debug, Clone)]
pub struct LogicalRewriter {
    /// Whether to enable predicate pushdown.
    predicate_pushdown: bool,
    /// Whether to enable projection pruning.
    projection_pruning: bool,
    /// Whether to enable join reordering.
    join_reordering: bool,
    /// Maximum pushdown passes.
    max_pushdown_passes: usize,
    /// Estimates used by join reordering.
    cost_model: CostModel,
}

impl Default for LogicalRewriter {
    fn default() -> Self {
        Self::new()
    }
}

impl LogicalRewriter {
    /// Creates a new rewriter with all passes enabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            predicate_pushdown: true,
            projection_pruning: true,
            join_reordering: true,
            max_pushdown_passes: DEFAULT_PUSHDOWN_PASSES,
            cost_model: CostModel::default(),
        }
    }

    /// Creates a rewriter configured from an execution context.
    #[must_use]
    pub fn from_context(ctx: &ExecutionContext) -> Self {
        let config = ctx.config();
        Self::new()
            .with_max_pushdown_passes(config.max_pushdown_passes)
            .with_cost_model(CostModel::new(config.cost).with_optional_stats(ctx.stats()))
    }

    /// Disables predicate pushdown.
    #[must_use]
    pub const fn without_predicate_pushdown(mut self) -> Self {
        self.predicate_pushdown = false;
        self
    }

    /// Disables projection pruning.
    #[must_use]
    pub const fn without_projection_pruning(mut self) -> Self {
        self.projection_pruning = false;
        self
    }

    /// Disables join reordering.
    #[must_use]
    pub const fn without_join_reordering(mut self) -> Self {
        self.join_reordering = false;
        self
    }

    /// Sets the maximum number of pushdown passes.
    #[must_use]
    pub const fn with_max_pushdown_passes(mut self, max: usize) -> Self {
        self.max_pushdown_passes = max;
        self
    }

    /// Uses statistics when estimating join inputs.
    #[must_use]
    pub fn with_stats(mut self, stats: Arc<dyn StatsProvider>) -> Self {
        self.cost_model = self.cost_model.with_stats(stats);
        self
    }

    /// Sets the cost parameters, keeping any attached statistics.
    #[must_use]
    pub fn with_cost_params(mut self, params: CostParameters) -> Self {
        self.cost_model = CostModel::new(params).with_optional_stats(self.cost_model.stats());
        self
    }

    /// Replaces the cost model.
    #[must_use]
    pub fn with_cost_model(mut self, cost_model: CostModel) -> Self {
        self.cost_model = cost_model;
        self
    }

    /// Rewrites a logical plan.
    #[must_use]
    pub fn rewrite(&self, plan: &LogicalPlan) -> LogicalPlan {
        let mut current = plan.clone();

        if self.predicate_pushdown {
            let pushdown = PredicatePushdown::new();
            for pass in 0..self.max_pushdown_passes {
                let pushed = pushdown.optimize(current.clone());
                if pushed == current {
                    debug!(passes = pass, "predicate pushdown reached a fixpoint");
                    break;
                }
                current = pushed;
            }
        }

        if self.projection_pruning {
            current = ProjectionPruning::new().optimize(current);
            debug!(nodes = current.node_count(), "projection pruning done");
        }

        if self.join_reordering {
            current = JoinReorder::new(self.cost_model.clone()).optimize(current);
            debug!(nodes = current.node_count(), "join reordering done");
        }

        current
    }
}

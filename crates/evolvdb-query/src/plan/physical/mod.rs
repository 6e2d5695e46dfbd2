//! Physical query plan.
//!
//! This module defines the physical query plan that represents
//! the concrete execution strategy for a query, and the cost-based
//! optimizer that chooses it.
//!
//! # Overview
//!
//! Physical plans describe *how* to execute a query, in contrast to
//! logical plans which describe *what* to compute. Each logical node kind
//! has one implementation rule; a join can become a nested loop join, or,
//! for an inner single-key equi-join, also a hash join or sort-merge join.
//!
//! # Plan Types
//!
//! - **Leaves**: `SeqScan`, `Insert`
//! - **Unary**: `Filter`, `Project`, `Aggregate`
//! - **Joins**: `NestedLoopJoin`, `HashJoin`, `SortMergeJoin`
//!
//! # Example
//!
//! ```
//! use evolvdb_core::{Column, DataType, Schema};
//! use evolvdb_query::plan::logical::{LogicalExpr, LogicalPlan};
//! use evolvdb_query::plan::physical::VolcanoOptimizer;
//!
//! let users = Schema::new(vec![Column::new("id", DataType::Int)]);
//! let orders = Schema::new(vec![Column::new("user_id", DataType::Int)]);
//! let logical = LogicalPlan::scan_aliased("users", "u", users).inner_join(
//!     LogicalPlan::scan_aliased("orders", "o", orders),
//!     LogicalExpr::qualified_column("u", "id").eq(LogicalExpr::qualified_column("o", "user_id")),
//! );
//!
//! let physical = VolcanoOptimizer::default().optimize(&logical).unwrap();
//! assert_eq!(physical.node_type(), "HashJoin");
//! println!("{}", physical.display_tree());
//! ```

mod cost;
mod memo;
mod node;
mod optimizer;
pub mod rules;

pub use cost::{Cost, CostModel, CostParameters};
pub use memo::{Group, GroupId, Memo};
pub use node::{
    AggregateExecNode, DisplayTree, EquiJoinNode, FilterExecNode, InsertExecNode,
    NestedLoopJoinNode, PhysicalPlan, ProjectExecNode, SeqScanNode,
};
pub use optimizer::{PhysicalPlanner, VolcanoOptimizer};
pub use rules::PhysicalRule;

use tracing::debug;

use crate::error::QueryResult;
use crate::exec::ExecutionContext;
use crate::plan::logical::LogicalPlan;

/// Plans a logical tree for execution under `ctx`.
///
/// The context's configuration selects between the cost-based optimizer
/// (with or without memo) and the nested-loop-only baseline planner; its
/// statistics feed the cost model.
///
/// # Errors
///
/// Returns a planning error if some node has no physical implementation.
pub fn optimize(plan: &LogicalPlan, ctx: &ExecutionContext) -> QueryResult<PhysicalPlan> {
    let config = ctx.config();
    let model = CostModel::new(config.cost).with_optional_stats(ctx.stats());

    let physical = if config.cost_based {
        VolcanoOptimizer::new(model).with_memo(config.use_memo).optimize(plan)?
    } else {
        PhysicalPlanner::new(model).plan(plan)?
    };
    debug!(
        cost_based = config.cost_based,
        memo = config.use_memo,
        root = physical.node_type(),
        cost = %physical.cost(),
        "physical plan chosen"
    );
    Ok(physical)
}

//! `EvolvDB` Query
//!
//! This crate turns bound logical plans into results.
//!
//! # Overview
//!
//! A query passes through three stages:
//!
//! - **Rewrite**: [`rewrite`] pushes predicates down, prunes unused columns and
//!   reorders inner joins by estimated size ([`plan::optimize`])
//! - **Plan**: [`optimize`] picks a physical strategy for every node by cost
//!   ([`plan::physical`])
//! - **Execute**: [`PhysicalPlan::create`] builds a tree of pull-based
//!   operators that the caller opens, drains and closes ([`exec`])
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use evolvdb_core::{Column, DataType, MemoryCatalog, Schema, Tuple, Value};
//! use evolvdb_query::plan::logical::{LogicalExpr, LogicalPlan, ProjectItem};
//! use evolvdb_query::{optimize, rewrite, ExecutionContext};
//!
//! let catalog = MemoryCatalog::new();
//! let schema = Schema::new(vec![
//!     Column::new("user_id", DataType::Int),
//!     Column::new("amount", DataType::Int),
//! ]);
//! let rows = [(1, 10), (1, 20), (2, 5)]
//!     .into_iter()
//!     .map(|(u, a)| Tuple::new(vec![Value::Int(u), Value::Int(a)]))
//!     .collect();
//! catalog.create_table_with_rows("orders", schema, rows).unwrap();
//! let ctx = ExecutionContext::new(Arc::new(catalog));
//!
//! // SELECT user_id, COUNT(*) FROM orders GROUP BY user_id
//! let plan = LogicalPlan::scan_table(ctx.catalog(), "orders", None)
//!     .unwrap()
//!     .aggregate(
//!         vec![LogicalExpr::column("user_id")],
//!         vec![
//!             ProjectItem::unnamed(LogicalExpr::column("user_id")),
//!             ProjectItem::new(LogicalExpr::count_star(), "n"),
//!         ],
//!     )
//!     .unwrap();
//!
//! let physical = optimize(&rewrite(&plan), &ctx).unwrap();
//! let rows = physical.create(&ctx).collect().unwrap();
//! assert_eq!(rows[0].values(), &[Value::Int(1), Value::BigInt(2)]);
//! assert_eq!(rows[1].values(), &[Value::Int(2), Value::BigInt(1)]);
//! ```
//!
//! # Modules
//!
//! - [`plan`] - Logical plans, the rewriter and physical planning
//! - [`exec`] - Execution context, operators and the executor
//! - [`error`] - Error types ([`QueryError`])

// Deny unwrap in library code to ensure proper error handling
#![deny(clippy::unwrap_used)]

pub mod error;
pub mod exec;
pub mod plan;

use evolvdb_core::Tuple;

pub use error::{ErrorCategory, QueryError, QueryResult};
pub use exec::{execute, ExecutionConfig, ExecutionContext, Executor, Operator, OperatorState};
pub use plan::logical::{LogicalExpr, LogicalPlan};
pub use plan::optimize::LogicalRewriter;
pub use plan::physical::{optimize, PhysicalPlan};

/// Rewrites a logical plan with every rewrite pass enabled and default costs.
///
/// Use [`LogicalRewriter::from_context`] to rewrite with a context's
/// statistics and configuration.
#[must_use]
pub fn rewrite(plan: &LogicalPlan) -> LogicalPlan {
    LogicalRewriter::new().rewrite(plan)
}

/// Rewrites, optimizes and executes a logical plan under `ctx`.
///
/// # Errors
///
/// Returns any planning or execution error.
pub fn run(plan: &LogicalPlan, ctx: &ExecutionContext) -> QueryResult<Vec<Tuple>> {
    let rewritten = LogicalRewriter::from_context(ctx).rewrite(plan);
    let physical = optimize(&rewritten, ctx)?;
    execute(&physical, ctx)
}

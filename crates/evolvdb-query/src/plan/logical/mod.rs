//! Logical query plan.
//!
//! This module defines the logical query plan that represents
//! query semantics independent of execution strategy.
//!
//! # Overview
//!
//! A logical plan is a tree of operators that describes how to compute
//! a query result. It focuses on *what* to compute, not *how* to compute it.
//! Plans arrive already bound: every scan carries its table schema and every
//! node can report its output schema.
//!
//! # Example
//!
//! ```
//! use evolvdb_core::{Column, DataType, Schema};
//! use evolvdb_query::plan::logical::{LogicalExpr, LogicalPlan, ProjectItem};
//!
//! let users = Schema::new(vec![
//!     Column::new("id", DataType::Int),
//!     Column::new("age", DataType::Int),
//! ]);
//!
//! // SELECT id FROM users WHERE age > 21
//! let plan = LogicalPlan::scan("users", users)
//!     .filter(LogicalExpr::column("age").gt(LogicalExpr::integer(21)))
//!     .project(vec![ProjectItem::unnamed(LogicalExpr::column("id"))])
//!     .unwrap();
//! assert_eq!(plan.schema().names(), vec!["id"]);
//! ```

mod expr;
mod node;
mod relational;
mod type_infer;

pub use expr::{
    conjunction, schema_contains, split_conjunction, AggregateFunction, BinaryOp, ColumnRef,
    LogicalExpr,
};
pub use node::{inserted_count_schema, DisplayTree, LogicalPlan, INSERTED_COUNT};
pub use relational::{
    AggregateNode, FilterNode, InsertNode, JoinNode, JoinType, ProjectItem, ProjectNode, ScanNode,
};

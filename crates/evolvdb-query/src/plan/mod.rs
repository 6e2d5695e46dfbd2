//! Query planning.
//!
//! This module provides logical plans, the rewriter that improves them, and
//! cost-based physical planning.

pub mod logical;
pub mod optimize;
pub mod physical;

pub use logical::{LogicalExpr, LogicalPlan};
pub use optimize::LogicalRewriter;
pub use physical::{optimize, PhysicalPlan};

//! Main query executor.
//!
//! This module provides the [`Executor`] that builds and runs
//! operator trees from physical plans.

use std::sync::Arc;

use evolvdb_core::{Schema, Tuple};
use tracing::debug;

use crate::error::QueryResult;
use crate::plan::physical::PhysicalPlan;

use super::context::ExecutionContext;
use super::operator::{BoxedOperator, Operator, OperatorState};
use super::operators::{
    AggregateOp, FilterOp, HashJoinOp, InsertOp, NestedLoopJoinOp, ProjectOp, SeqScanOp,
    SortMergeJoinOp,
};

/// The main query executor.
///
/// Owns the operator tree built from a physical plan together with the
/// context it runs in. The caller drives `open`, `next` and `close`, or uses
/// [`collect`](Self::collect) to do all three.
pub struct Executor {
    /// The root operator of the tree.
    root: BoxedOperator,
    /// Execution context.
    ctx: ExecutionContext,
}

impl Executor {
    /// Creates a new executor for the given physical plan.
    ///
    /// The operator tree is built but not opened.
    #[must_use]
    pub fn new(plan: &PhysicalPlan, ctx: ExecutionContext) -> Self {
        Self { root: build_operator_tree(plan), ctx }
    }

    /// Returns the output schema.
    #[must_use]
    pub fn schema(&self) -> Arc<Schema> {
        self.root.schema()
    }

    /// Opens the operator tree.
    ///
    /// # Errors
    ///
    /// Returns any error raised while opening an operator.
    pub fn open(&mut self) -> QueryResult<()> {
        self.root.open(&self.ctx)
    }

    /// Returns the next tuple, or `None` at end of stream.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidState`](crate::error::QueryError::InvalidState)
    /// before [`open`](Self::open) and any evaluation or storage error.
    pub fn next(&mut self) -> QueryResult<Option<Tuple>> {
        self.root.next()
    }

    /// Closes the operator tree and releases its buffers. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns the first error raised while closing an operator.
    pub fn close(&mut self) -> QueryResult<()> {
        self.root.close()
    }

    /// Returns the execution context.
    #[must_use]
    pub fn context(&self) -> &ExecutionContext {
        &self.ctx
    }

    /// Returns the state of the root operator.
    #[must_use]
    pub fn state(&self) -> OperatorState {
        self.root.state()
    }

    /// Opens, drains and closes the tree, returning every tuple.
    ///
    /// # Errors
    ///
    /// Returns the first error; the tree is closed either way.
    pub fn collect(&mut self) -> QueryResult<Vec<Tuple>> {
        collect(self.root.as_mut(), &self.ctx)
    }

    /// Counts the result rows without keeping them.
    ///
    /// # Errors
    ///
    /// Returns the first error; the tree is closed either way.
    pub fn count(&mut self) -> QueryResult<usize> {
        let counted = self.open().and_then(|()| {
            let mut count = 0;
            while self.root.next()?.is_some() {
                count += 1;
            }
            Ok(count)
        });
        let closed = self.close();
        let count = counted?;
        closed?;
        Ok(count)
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("root", &self.root.name())
            .field("state", &self.root.state())
            .finish_non_exhaustive()
    }
}

/// Builds an operator tree from a physical plan.
#[must_use]
pub fn build_operator_tree(plan: &PhysicalPlan) -> BoxedOperator {
    match plan {
        PhysicalPlan::SeqScan(node) => Box::new(SeqScanOp::new(node.as_ref().clone())),
        PhysicalPlan::Insert(node) => Box::new(InsertOp::new(node.as_ref().clone())),
        PhysicalPlan::Filter { node, input } => {
            Box::new(FilterOp::new(node.predicate.clone(), input.qualifiers(), build_operator_tree(input)))
        }
        PhysicalPlan::Project { node, input } => {
            Box::new(ProjectOp::new(node.clone(), input.qualifiers(), build_operator_tree(input)))
        }
        PhysicalPlan::Aggregate { node, input } => {
            Box::new(AggregateOp::new(
                node.as_ref().clone(),
                input.qualifiers(),
                build_operator_tree(input),
            ))
        }
        PhysicalPlan::NestedLoopJoin { node, left, right } => Box::new(NestedLoopJoinOp::new(
            node.as_ref().clone(),
            build_operator_tree(left),
            build_operator_tree(right),
        )),
        PhysicalPlan::HashJoin { node, left, right } => Box::new(HashJoinOp::new(
            node.as_ref().clone(),
            build_operator_tree(left),
            build_operator_tree(right),
        )),
        PhysicalPlan::SortMergeJoin { node, left, right } => Box::new(SortMergeJoinOp::new(
            node.as_ref().clone(),
            build_operator_tree(left),
            build_operator_tree(right),
        )),
    }
}

/// Opens `operator`, drains it and closes it.
///
/// The operator is closed even when `open` or `next` fails.
///
/// # Errors
///
/// Returns the first error raised by the operator tree.
pub fn collect(operator: &mut dyn Operator, ctx: &ExecutionContext) -> QueryResult<Vec<Tuple>> {
    let drained = operator.open(ctx).and_then(|()| {
        let mut rows = Vec::new();
        while let Some(tuple) = operator.next()? {
            rows.push(tuple);
        }
        Ok(rows)
    });
    let closed = operator.close();
    let rows = drained?;
    closed?;
    debug!(operator = operator.name(), rows = rows.len(), "collected result");
    Ok(rows)
}

/// Executes a physical plan to completion.
///
/// # Errors
///
/// Returns the first error raised while running the plan.
pub fn execute(plan: &PhysicalPlan, ctx: &ExecutionContext) -> QueryResult<Vec<Tuple>> {
    plan.create(ctx).collect()
}

#[cfg(test)]
mod tests {
    use evolvdb_core::Value;

    use super::*;
    use crate::error::QueryError;
    use crate::exec::operators::fixtures;
    use crate::plan::logical::LogicalExpr;
    use crate::plan::physical::{FilterExecNode, SeqScanNode};

    fn scan_plan(ctx: &ExecutionContext, table: &str) -> PhysicalPlan {
        let meta = ctx.catalog().lookup_table(table).unwrap();
        PhysicalPlan::SeqScan(Box::new(SeqScanNode::new(table, meta.schema)))
    }

    fn filter_plan(ctx: &ExecutionContext, predicate: LogicalExpr) -> PhysicalPlan {
        PhysicalPlan::Filter {
            node: FilterExecNode::new(predicate),
            input: Box::new(scan_plan(ctx, "users")),
        }
    }

    #[test]
    fn execute_runs_plan() {
        let ctx = fixtures::context();
        let plan = filter_plan(&ctx, LogicalExpr::column("id").gt(LogicalExpr::integer(1)));
        let rows = execute(&plan, &ctx).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get(1), Some(&Value::from("Bob")));
    }

    #[test]
    fn executor_lifecycle() {
        let ctx = fixtures::context();
        let mut executor = scan_plan(&ctx, "users").create(&ctx);
        assert_eq!(executor.schema().names(), vec!["id", "name"]);
        assert_eq!(executor.state(), OperatorState::Created);
        assert!(matches!(executor.next(), Err(QueryError::InvalidState(_))));

        executor.open().unwrap();
        let mut seen = 0;
        while executor.next().unwrap().is_some() {
            seen += 1;
        }
        assert_eq!(seen, 3);
        assert!(executor.next().unwrap().is_none());

        executor.close().unwrap();
        executor.close().unwrap();
        assert!(executor.state().is_closed());
        assert!(format!("{executor:?}").contains("SeqScan"));
    }

    #[test]
    fn count_and_collect() {
        let ctx = fixtures::context();
        let mut executor = scan_plan(&ctx, "orders").create(&ctx);
        assert_eq!(executor.count().unwrap(), 5);
        assert_eq!(executor.collect().unwrap().len(), 5);
        assert_eq!(executor.context().config().max_pushdown_passes, 4);
    }

    #[test]
    fn failures_still_close() {
        let ctx = fixtures::context();
        let plan = filter_plan(&ctx, LogicalExpr::column("nope").eq(LogicalExpr::integer(1)));
        let mut executor = plan.create(&ctx);
        assert!(matches!(executor.collect(), Err(QueryError::UnknownColumn(_))));
        assert!(executor.state().is_closed());

        let missing = PhysicalPlan::SeqScan(Box::new(SeqScanNode::new(
            "missing",
            Arc::new(Schema::empty()),
        )));
        let mut executor = missing.create(&ctx);
        assert!(matches!(executor.count(), Err(QueryError::Storage(_))));
        assert!(executor.state().is_closed());
    }
}

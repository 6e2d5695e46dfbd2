//! Filter operator for predicate evaluation.

use std::collections::HashSet;
use std::sync::Arc;

use evolvdb_core::{Schema, Tuple};
use tracing::debug;

use crate::error::QueryResult;
use crate::exec::context::ExecutionContext;
use crate::exec::eval::{evaluate_bound, is_true};
use crate::exec::operator::{BoxedOperator, Operator, OperatorBase, OperatorState};
use crate::plan::logical::LogicalExpr;

/// Filter operator.
///
/// Passes through rows where the predicate is `TRUE`; `FALSE` and `NULL`
/// both reject.
pub struct FilterOp {
    /// Base operator state.
    base: OperatorBase,
    /// The predicate to evaluate.
    predicate: LogicalExpr,
    /// Scan names the input binds.
    qualifiers: HashSet<String>,
    /// Input operator.
    input: BoxedOperator,
}

impl FilterOp {
    /// Creates a new filter operator over an input binding `qualifiers`.
    #[must_use]
    pub fn new(predicate: LogicalExpr, qualifiers: HashSet<String>, input: BoxedOperator) -> Self {
        let schema = input.schema();
        Self { base: OperatorBase::new(schema), predicate, qualifiers, input }
    }

    /// Returns the predicate.
    #[must_use]
    pub fn predicate(&self) -> &LogicalExpr {
        &self.predicate
    }
}

impl Operator for FilterOp {
    fn open(&mut self, ctx: &ExecutionContext) -> QueryResult<()> {
        self.input.open(ctx)?;
        self.base.set_open();
        Ok(())
    }

    fn next(&mut self) -> QueryResult<Option<Tuple>> {
        if !self.base.check_next(self.name())? {
            return Ok(None);
        }
        let schema = self.base.schema();
        while let Some(tuple) = self.input.next()? {
            if is_true(&evaluate_bound(&self.predicate, &tuple, &schema, &self.qualifiers)?) {
                return Ok(self.base.emit(Some(tuple)));
            }
        }
        Ok(self.base.emit(None))
    }

    fn close(&mut self) -> QueryResult<()> {
        if self.base.state().is_finished() {
            debug!(predicate = %self.predicate, rows = self.base.rows_produced(), "Filter closed");
        }
        let closed = self.input.close();
        self.base.set_closed();
        closed
    }

    fn schema(&self) -> Arc<Schema> {
        self.base.schema()
    }

    fn state(&self) -> OperatorState {
        self.base.state()
    }

    fn name(&self) -> &'static str {
        "Filter"
    }
}

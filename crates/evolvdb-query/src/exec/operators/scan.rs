//! Scan operator for reading tables.

use std::sync::Arc;

use evolvdb_core::catalog::TupleCursor;
use evolvdb_core::{Schema, Tuple};
use tracing::debug;

use crate::error::QueryResult;
use crate::exec::context::ExecutionContext;
use crate::exec::operator::{Operator, OperatorBase, OperatorState};
use crate::plan::physical::SeqScanNode;

/// Full table scan operator.
///
/// Opens a cursor from the catalog's table handle and yields every stored
/// tuple in storage order.
pub struct SeqScanOp {
    /// Base operator state.
    base: OperatorBase,
    /// The node configuration.
    node: SeqScanNode,
    /// Open cursor; `None` until opened and after close.
    cursor: Option<TupleCursor>,
}

impl SeqScanOp {
    /// Creates a new scan operator.
    #[must_use]
    pub fn new(node: SeqScanNode) -> Self {
        let schema = Arc::clone(&node.schema);
        Self { base: OperatorBase::new(schema), node, cursor: None }
    }

    /// Returns the table name being scanned.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.node.table_name
    }
}

impl Operator for SeqScanOp {
    fn open(&mut self, ctx: &ExecutionContext) -> QueryResult<()> {
        let table = ctx.catalog().open_table(&self.node.table_name)?;
        self.cursor = Some(table.scan()?);
        self.base.set_open();
        debug!(table = %self.node.table_name, "SeqScan opened");
        Ok(())
    }

    fn next(&mut self) -> QueryResult<Option<Tuple>> {
        if !self.base.check_next(self.name())? {
            return Ok(None);
        }
        let next = match self.cursor.as_mut() {
            Some(cursor) => cursor.next().transpose()?,
            None => None,
        };
        Ok(self.base.emit(next))
    }

    fn close(&mut self) -> QueryResult<()> {
        if self.cursor.take().is_some() {
            debug!(
                table = %self.node.table_name,
                rows = self.base.rows_produced(),
                "SeqScan closed"
            );
        }
        self.base.set_closed();
        Ok(())
    }

    fn schema(&self) -> Arc<Schema> {
        self.base.schema()
    }

    fn state(&self) -> OperatorState {
        self.base.state()
    }

    fn name(&self) -> &'static str {
        "SeqScan"
    }
}

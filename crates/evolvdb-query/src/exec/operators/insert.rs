//! Insert operator for literal rows.

use std::sync::Arc;

use evolvdb_core::{Column, DataType, Schema, TableHandle, Tuple, Value};
use tracing::debug;

use crate::error::{QueryError, QueryResult};
use crate::exec::context::ExecutionContext;
use crate::exec::eval::evaluate;
use crate::exec::operator::{Operator, OperatorBase, OperatorState};
use crate::plan::logical::{inserted_count_schema, LogicalExpr};
use crate::plan::physical::InsertExecNode;

/// Insert operator.
///
/// The first `next()` evaluates and stores every row, then returns a single
/// `(inserted_count)` tuple. Rows stored before a failing row stay stored.
pub struct InsertOp {
    /// Base operator state.
    base: OperatorBase,
    /// The node configuration.
    node: InsertExecNode,
    /// Target table, acquired on open.
    table: Option<Arc<dyn TableHandle>>,
    /// Whether the rows were written.
    executed: bool,
}

impl InsertOp {
    /// Creates a new insert operator.
    #[must_use]
    pub fn new(node: InsertExecNode) -> Self {
        Self { base: OperatorBase::new(inserted_count_schema()), node, table: None, executed: false }
    }

    /// Returns the target table name.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.node.table_name
    }

    /// Builds the full-width tuple for one row of value expressions.
    fn build_tuple(&self, row: &[LogicalExpr], schema: &Schema) -> QueryResult<Tuple> {
        if row.len() != self.node.columns.len() {
            return Err(QueryError::ArityMismatch {
                expected: self.node.columns.len(),
                actual: row.len(),
            });
        }

        let empty = Schema::empty();
        let no_row = Tuple::new(Vec::new());
        let values = row
            .iter()
            .zip(&self.node.columns)
            .map(|(expr, column)| coerce(evaluate(expr, &no_row, &empty)?, column))
            .collect::<QueryResult<Vec<Value>>>()?;

        let full = schema
            .columns()
            .iter()
            .map(|column| {
                self.node
                    .columns
                    .iter()
                    .position(|target| target.name.eq_ignore_ascii_case(&column.name))
                    .and_then(|i| values.get(i).cloned())
                    .ok_or_else(|| QueryError::MissingColumnDefault(column.name.clone()))
            })
            .collect::<QueryResult<Vec<Value>>>()?;

        Ok(Tuple::checked(schema, full)?)
    }
}

/// Converts an integer literal to the declared width of `column`.
#[allow(clippy::cast_precision_loss)]
fn coerce(value: Value, column: &Column) -> QueryResult<Value> {
    Ok(match (column.data_type, value) {
        (DataType::Int, Value::BigInt(i)) => Value::Int(i32::try_from(i).map_err(|_| {
            QueryError::Arithmetic(format!("{i} is out of range for INT column {}", column.name))
        })?),
        (DataType::BigInt, Value::Int(i)) => Value::BigInt(i64::from(i)),
        (DataType::Float, Value::Int(i)) => Value::Float(f64::from(i)),
        (DataType::Float, Value::BigInt(i)) => Value::Float(i as f64),
        (_, other) => other,
    })
}

impl Operator for InsertOp {
    fn open(&mut self, ctx: &ExecutionContext) -> QueryResult<()> {
        self.table = Some(ctx.catalog().open_table(&self.node.table_name)?);
        self.executed = false;
        self.base.set_open();
        Ok(())
    }

    fn next(&mut self) -> QueryResult<Option<Tuple>> {
        if !self.base.check_next(self.name())? {
            return Ok(None);
        }
        if self.executed {
            return Ok(self.base.emit(None));
        }
        let Some(table) = self.table.clone() else {
            return Err(QueryError::InvalidState("Insert: table not acquired".into()));
        };
        self.executed = true;

        let schema = Arc::clone(&table.meta().schema);
        let mut inserted: i64 = 0;
        for row in &self.node.rows {
            let tuple = self.build_tuple(row, &schema)?;
            table.insert(tuple)?;
            inserted += 1;
        }

        debug!(table = %self.node.table_name, rows = inserted, "Insert wrote rows");
        Ok(self.base.emit(Some(Tuple::new(vec![Value::BigInt(inserted)]))))
    }

    fn close(&mut self) -> QueryResult<()> {
        self.table = None;
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
        "Insert"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::operators::fixtures;
    use crate::plan::physical::Cost;

    fn insert(columns: Vec<Column>, rows: Vec<Vec<LogicalExpr>>) -> InsertOp {
        InsertOp::new(InsertExecNode { table_name: "orders".into(), columns, rows, cost: Cost::zero() })
    }

    fn order_columns() -> Vec<Column> {
        fixtures::orders_schema().columns().to_vec()
    }

    fn order_count(ctx: &ExecutionContext) -> usize {
        let mut scan = fixtures::scan(ctx, "orders");
        fixtures::drain(scan.as_mut(), ctx).len()
    }

    #[test]
    fn insert_returns_count_once() {
        let ctx = fixtures::context();
        let mut op = insert(
            order_columns(),
            vec![
                vec![LogicalExpr::integer(20), LogicalExpr::integer(2), LogicalExpr::integer(5)],
                vec![LogicalExpr::integer(21), LogicalExpr::integer(3), LogicalExpr::integer(7)],
            ],
        );
        assert_eq!(op.table_name(), "orders");

        op.open(&ctx).unwrap();
        let summary = op.next().unwrap().unwrap();
        assert_eq!(summary.values(), &[Value::BigInt(2)]);
        assert!(op.next().unwrap().is_none());
        assert!(op.next().unwrap().is_none());
        op.close().unwrap();

        assert_eq!(order_count(&ctx), 7);
        let mut scan = fixtures::scan(&ctx, "orders");
        let rows = fixtures::drain(scan.as_mut(), &ctx);
        assert_eq!(rows[5].values(), &[Value::Int(20), Value::Int(2), Value::BigInt(5)]);
    }

    #[test]
    fn columns_may_be_reordered() {
        let ctx = fixtures::context();
        let columns = order_columns().into_iter().rev().collect();
        let mut op = insert(
            columns,
            vec![vec![LogicalExpr::integer(9), LogicalExpr::integer(1), LogicalExpr::integer(30)]],
        );
        fixtures::drain(&mut op, &ctx);

        let mut scan = fixtures::scan(&ctx, "orders");
        let rows = fixtures::drain(scan.as_mut(), &ctx);
        assert_eq!(rows[5].values(), &[Value::Int(30), Value::Int(1), Value::BigInt(9)]);
    }

    #[test]
    fn missing_column_fails() {
        let ctx = fixtures::context();
        let mut op = insert(
            order_columns()[..2].to_vec(),
            vec![vec![LogicalExpr::integer(20), LogicalExpr::integer(2)]],
        );
        op.open(&ctx).unwrap();
        assert!(matches!(op.next(), Err(QueryError::MissingColumnDefault(c)) if c == "amount"));
        op.close().unwrap();
        assert_eq!(order_count(&ctx), 5);
    }

    #[test]
    fn narrowing_checks_range() {
        let ctx = fixtures::context();
        let mut op = insert(
            order_columns(),
            vec![vec![
                LogicalExpr::integer(i64::from(i32::MAX) + 1),
                LogicalExpr::integer(1),
                LogicalExpr::integer(1),
            ]],
        );
        op.open(&ctx).unwrap();
        assert!(matches!(op.next(), Err(QueryError::Arithmetic(_))));
        op.close().unwrap();
    }

    #[test]
    fn wrong_arity_and_types_fail() {
        let ctx = fixtures::context();
        let mut op = insert(order_columns(), vec![vec![LogicalExpr::integer(1)]]);
        op.open(&ctx).unwrap();
        assert!(matches!(op.next(), Err(QueryError::ArityMismatch { expected: 3, actual: 1 })));
        op.close().unwrap();

        for bad in [LogicalExpr::string("x"), LogicalExpr::literal(Value::Null)] {
            let mut op = insert(
                order_columns(),
                vec![vec![bad, LogicalExpr::integer(1), LogicalExpr::integer(1)]],
            );
            op.open(&ctx).unwrap();
            assert!(matches!(op.next(), Err(QueryError::Storage(_))));
            op.close().unwrap();
        }
    }

    #[test]
    fn next_before_open_fails() {
        let mut op = insert(order_columns(), vec![]);
        assert!(matches!(op.next(), Err(QueryError::InvalidState(_))));
        op.close().unwrap();
    }
}

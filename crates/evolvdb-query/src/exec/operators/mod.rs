//! Concrete operator implementations.
//!
//! This module contains the implementations of all physical operators.
//!
//! # Operator Categories
//!
//! - **Scan operators**: [`scan`] - Full table scans
//! - **Filter operators**: [`filter`] - Predicate evaluation
//! - **Project operators**: [`project`] - Expression projection
//! - **Join operators**: [`join`] - Nested loop, hash and sort-merge joins
//! - **Aggregate operators**: [`aggregate`] - Grouped aggregation
//! - **Insert operators**: [`insert`] - INSERT of literal rows

pub mod aggregate;
pub mod filter;
pub mod insert;
pub mod join;
pub mod project;
pub mod scan;

// Re-exports for convenience
pub use aggregate::AggregateOp;
pub use filter::FilterOp;
pub use insert::InsertOp;
pub use join::{HashJoinOp, NestedLoopJoinOp, SortMergeJoinOp};
pub use project::ProjectOp;
pub use scan::SeqScanOp;

#[cfg(test)]
pub(crate) mod fixtures {
    use std::collections::HashSet;
    use std::sync::Arc;

    use evolvdb_core::{Column, DataType, MemoryCatalog, Schema, Tuple, Value};

    use super::SeqScanOp;
    use crate::error::{QueryError, QueryResult};
    use crate::exec::context::ExecutionContext;
    use crate::exec::operator::{BoxedOperator, Operator, OperatorBase, OperatorState};
    use crate::plan::physical::SeqScanNode;

    pub fn users_schema() -> Schema {
        Schema::new(vec![Column::new("id", DataType::Int), Column::new("name", DataType::String)])
    }

    pub fn orders_schema() -> Schema {
        Schema::new(vec![
            Column::new("id", DataType::Int),
            Column::new("user_id", DataType::Int),
            Column::new("amount", DataType::BigInt),
        ])
    }

    fn row(values: Vec<Value>) -> Tuple {
        Tuple::new(values)
    }

    /// users: 3 rows; orders: 5 rows, 4 of which reference a user.
    /// Stored tuples never hold nulls; use [`values`] for null inputs.
    pub fn context() -> ExecutionContext {
        let catalog = MemoryCatalog::new();
        catalog
            .create_table_with_rows(
                "users",
                users_schema(),
                vec![
                    row(vec![Value::Int(1), Value::from("Alice")]),
                    row(vec![Value::Int(2), Value::from("Bob")]),
                    row(vec![Value::Int(3), Value::from("Carol")]),
                ],
            )
            .unwrap();
        catalog
            .create_table_with_rows(
                "orders",
                orders_schema(),
                vec![
                    row(vec![Value::Int(10), Value::Int(1), Value::BigInt(100)]),
                    row(vec![Value::Int(11), Value::Int(1), Value::BigInt(250)]),
                    row(vec![Value::Int(12), Value::Int(2), Value::BigInt(75)]),
                    row(vec![Value::Int(13), Value::Int(3), Value::BigInt(30)]),
                    row(vec![Value::Int(14), Value::Int(5), Value::BigInt(40)]),
                ],
            )
            .unwrap();
        ExecutionContext::new(Arc::new(catalog))
    }

    pub fn scan(ctx: &ExecutionContext, table: &str) -> BoxedOperator {
        let meta = ctx.catalog().lookup_table(table).unwrap();
        Box::new(SeqScanOp::new(SeqScanNode::new(table, meta.schema)))
    }

    /// Literal rows, for inputs storage cannot hold.
    pub struct ValuesOp {
        base: OperatorBase,
        data: Vec<Tuple>,
        rows: std::vec::IntoIter<Tuple>,
        fail_close: bool,
    }

    impl Operator for ValuesOp {
        fn open(&mut self, _ctx: &ExecutionContext) -> QueryResult<()> {
            self.rows = self.data.clone().into_iter();
            self.base.set_open();
            Ok(())
        }

        fn next(&mut self) -> QueryResult<Option<Tuple>> {
            if !self.base.check_next("Values")? {
                return Ok(None);
            }
            let next = self.rows.next();
            Ok(self.base.emit(next))
        }

        fn close(&mut self) -> QueryResult<()> {
            self.base.set_closed();
            if self.fail_close {
                return Err(QueryError::InvalidState("Values failed to close".to_owned()));
            }
            Ok(())
        }

        fn schema(&self) -> Arc<Schema> {
            self.base.schema()
        }

        fn state(&self) -> OperatorState {
            self.base.state()
        }

        fn name(&self) -> &'static str {
            "Values"
        }
    }

    pub fn values(schema: Schema, rows: Vec<Vec<Value>>) -> BoxedOperator {
        Box::new(ValuesOp {
            base: OperatorBase::new(Arc::new(schema)),
            data: rows.into_iter().map(Tuple::new).collect(),
            rows: Vec::new().into_iter(),
            fail_close: false,
        })
    }

    /// Empty input of `schema` whose `close` always fails.
    pub fn failing_close(schema: Schema) -> BoxedOperator {
        Box::new(ValuesOp {
            base: OperatorBase::new(Arc::new(schema)),
            data: Vec::new(),
            rows: Vec::new().into_iter(),
            fail_close: true,
        })
    }

    /// orders-shaped rows where the last amount is NULL.
    pub fn orders_with_null_amount() -> BoxedOperator {
        values(
            orders_schema(),
            vec![
                vec![Value::Int(10), Value::Int(1), Value::BigInt(100)],
                vec![Value::Int(11), Value::Int(1), Value::BigInt(250)],
                vec![Value::Int(12), Value::Int(2), Value::Null],
            ],
        )
    }

    pub fn qualifiers(name: &str) -> HashSet<String> {
        HashSet::from([name.to_owned()])
    }

    pub fn drain(op: &mut dyn Operator, ctx: &ExecutionContext) -> Vec<Tuple> {
        op.open(ctx).unwrap();
        let mut rows = Vec::new();
        while let Some(tuple) = op.next().unwrap() {
            rows.push(tuple);
        }
        op.close().unwrap();
        rows
    }
}

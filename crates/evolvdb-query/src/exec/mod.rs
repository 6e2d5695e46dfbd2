//! Query execution.
//!
//! This module turns physical plans into trees of pull-based operators and
//! runs them.
//!
//! # Overview
//!
//! Every operator implements [`Operator`]: `open` prepares it (joins and
//! aggregates consume their build inputs here), `next` yields one tuple at a
//! time and `close` releases buffers. Operators evaluate expressions with the
//! functions in [`eval`], which implement three-valued logic and checked
//! integer arithmetic.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use evolvdb_core::{Column, DataType, MemoryCatalog, Schema, TableHandle, Tuple, Value};
//! use evolvdb_query::exec::{execute, ExecutionContext};
//! use evolvdb_query::plan::physical::{PhysicalPlan, SeqScanNode};
//!
//! let catalog = MemoryCatalog::new();
//! let schema = Schema::new(vec![Column::new("id", DataType::Int)]);
//! let table = catalog
//!     .create_table_with_rows("t", schema, vec![Tuple::new(vec![Value::Int(7)])])
//!     .unwrap();
//!
//! let ctx = ExecutionContext::new(Arc::new(catalog));
//! let scan = SeqScanNode::new("t", Arc::clone(&table.meta().schema));
//! let plan = PhysicalPlan::SeqScan(Box::new(scan));
//! assert_eq!(execute(&plan, &ctx).unwrap(), vec![Tuple::new(vec![Value::Int(7)])]);
//! ```

pub mod context;
pub mod eval;
pub mod executor;
pub mod key;
pub mod operator;
pub mod operators;

pub use context::{ExecutionConfig, ExecutionContext};
pub use eval::{compare_values, evaluate, evaluate_bound, evaluate_join, is_true, order_values};
pub use executor::{build_operator_tree, collect, execute, Executor};
pub use operator::{BoxedOperator, Operator, OperatorBase, OperatorState};

//! Aggregate operator for GROUP BY and aggregate functions.
//!
//! Aggregation is a fold over the input performed during open: rows are
//! grouped by their encoded group key, each group keeps one accumulator per
//! distinct aggregate call, and groups are emitted in first-seen order.
//!
//! An output item may combine aggregates with other expressions, such as
//! `SUM(amount) / COUNT(*)`; non-aggregate parts are evaluated against the
//! first row of the group.
//!
//! # Empty input
//!
//! A grouped aggregate over no rows emits no rows. An ungrouped aggregate
//! emits exactly one row: `COUNT` is 0, `SUM` is 0, `AVG`, `MIN` and `MAX`
//! are null, and non-aggregate outputs are null.

use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use evolvdb_core::{Schema, Tuple, Value};
use tracing::debug;

use crate::error::{QueryError, QueryResult};
use crate::exec::context::ExecutionContext;
use crate::exec::eval::{compare_values, evaluate_bound};
use crate::exec::key::encode_key;
use crate::exec::operator::{BoxedOperator, Operator, OperatorBase, OperatorState};
use crate::plan::logical::{AggregateFunction, LogicalExpr, ProjectItem};
use crate::plan::physical::AggregateExecNode;

/// One distinct aggregate call appearing in the output items.
#[derive(Debug, Clone, PartialEq)]
struct AggregateCall {
    func: AggregateFunction,
    /// `None` for `COUNT(*)`.
    arg: Option<LogicalExpr>,
}

/// Collects the distinct aggregate calls of `expr` in first-seen order.
fn collect_calls(expr: &LogicalExpr, calls: &mut Vec<AggregateCall>) {
    match expr {
        LogicalExpr::AggregateFunction { func, arg } => {
            let call = AggregateCall { func: *func, arg: arg.as_deref().cloned() };
            if !calls.contains(&call) {
                calls.push(call);
            }
        }
        LogicalExpr::BinaryOp { left, right, .. } => {
            collect_calls(left, calls);
            collect_calls(right, calls);
        }
        LogicalExpr::Not(inner) => collect_calls(inner, calls),
        LogicalExpr::Literal(_) | LogicalExpr::Column { .. } => {}
    }
}

/// Replaces each aggregate call in `expr` with its computed result.
fn substitute(expr: &LogicalExpr, calls: &[AggregateCall], results: &[Value]) -> LogicalExpr {
    match expr {
        LogicalExpr::AggregateFunction { func, arg } => {
            let call = AggregateCall { func: *func, arg: arg.as_deref().cloned() };
            calls
                .iter()
                .position(|c| *c == call)
                .and_then(|i| results.get(i))
                .map_or(LogicalExpr::Literal(Value::Null), |v| LogicalExpr::Literal(v.clone()))
        }
        LogicalExpr::BinaryOp { left, op, right } => LogicalExpr::BinaryOp {
            left: Box::new(substitute(left, calls, results)),
            op: *op,
            right: Box::new(substitute(right, calls, results)),
        },
        LogicalExpr::Not(inner) => LogicalExpr::Not(Box::new(substitute(inner, calls, results))),
        LogicalExpr::Literal(_) | LogicalExpr::Column { .. } => expr.clone(),
    }
}

/// Running state of one aggregate call within one group.
#[derive(Debug, Clone)]
enum Accumulator {
    Count(i64),
    Sum { integer: i64, float: f64, saw_float: bool },
    Avg { sum: f64, count: i64 },
    Min(Option<Value>),
    Max(Option<Value>),
}

impl Accumulator {
    const fn new(func: AggregateFunction) -> Self {
        match func {
            AggregateFunction::Count => Self::Count(0),
            AggregateFunction::Sum => Self::Sum { integer: 0, float: 0.0, saw_float: false },
            AggregateFunction::Avg => Self::Avg { sum: 0.0, count: 0 },
            AggregateFunction::Min => Self::Min(None),
            AggregateFunction::Max => Self::Max(None),
        }
    }

    /// Folds one input into the state. `value` is `None` for `COUNT(*)`.
    fn update(&mut self, value: Option<Value>) -> QueryResult<()> {
        let Some(value) = value else {
            if let Self::Count(n) = self {
                *n += 1;
            }
            return Ok(());
        };
        if value.is_null() {
            return Ok(());
        }
        match self {
            Self::Count(n) => *n += 1,
            Self::Sum { integer, float, saw_float } => match value {
                Value::Float(f) => {
                    *float += f;
                    *saw_float = true;
                }
                other => {
                    let i = other
                        .as_i64()
                        .ok_or_else(|| QueryError::type_mismatch("numeric", other.type_name()))?;
                    *integer = integer
                        .checked_add(i)
                        .ok_or_else(|| QueryError::Arithmetic("integer overflow in SUM".into()))?;
                }
            },
            Self::Avg { sum, count } => {
                *sum += value
                    .as_f64()
                    .ok_or_else(|| QueryError::type_mismatch("numeric", value.type_name()))?;
                *count += 1;
            }
            Self::Min(current) => replace_if(current, value, Ordering::Less)?,
            Self::Max(current) => replace_if(current, value, Ordering::Greater)?,
        }
        Ok(())
    }

    /// Result for a group that received at least one row.
    #[allow(clippy::cast_precision_loss)]
    fn finish(&self) -> Value {
        match self {
            Self::Count(n) => Value::BigInt(*n),
            Self::Sum { integer, float, saw_float: true } => Value::Float(float + *integer as f64),
            Self::Sum { integer, .. } => Value::BigInt(*integer),
            Self::Avg { sum, count } => Value::Float(sum / (*count).max(1) as f64),
            Self::Min(v) | Self::Max(v) => v.clone().unwrap_or(Value::Null),
        }
    }

    /// Result of an ungrouped aggregate over empty input.
    const fn empty_result(func: AggregateFunction) -> Value {
        match func {
            AggregateFunction::Count | AggregateFunction::Sum => Value::BigInt(0),
            AggregateFunction::Avg | AggregateFunction::Min | AggregateFunction::Max => Value::Null,
        }
    }
}

fn replace_if(current: &mut Option<Value>, value: Value, wanted: Ordering) -> QueryResult<()> {
    let replace = match current {
        Some(existing) => compare_values(&value, existing)? == wanted,
        None => true,
    };
    if replace {
        *current = Some(value);
    }
    Ok(())
}

/// State of one group: its first row and one accumulator per call.
struct GroupState {
    first_row: Tuple,
    accumulators: Vec<Accumulator>,
}

/// Hash-based aggregate operator.
///
/// Groups rows by key expressions and computes aggregates.
pub struct AggregateOp {
    /// Base operator state.
    base: OperatorBase,
    /// GROUP BY expressions.
    group_by: Vec<LogicalExpr>,
    /// Output items.
    outputs: Vec<ProjectItem>,
    /// Distinct aggregate calls across all outputs.
    calls: Vec<AggregateCall>,
    /// Scan names the input binds.
    qualifiers: HashSet<String>,
    /// Input operator.
    input: BoxedOperator,
    /// Finalized output rows.
    results: std::vec::IntoIter<Tuple>,
}

impl AggregateOp {
    /// Creates a new aggregate operator over an input binding `qualifiers`.
    #[must_use]
    pub fn new(node: AggregateExecNode, qualifiers: HashSet<String>, input: BoxedOperator) -> Self {
        let mut calls = Vec::new();
        for item in &node.outputs {
            collect_calls(&item.expr, &mut calls);
        }
        Self {
            base: OperatorBase::new(node.schema),
            group_by: node.group_by,
            outputs: node.outputs,
            calls,
            qualifiers,
            input,
            results: Vec::new().into_iter(),
        }
    }

    /// Drains the input into groups, in first-seen order.
    fn fold(&mut self) -> QueryResult<Vec<GroupState>> {
        let schema = self.input.schema();
        let mut groups: Vec<GroupState> = Vec::new();
        let mut index: HashMap<Vec<u8>, usize> = HashMap::new();

        while let Some(row) = self.input.next()? {
            let keys = self
                .group_by
                .iter()
                .map(|expr| evaluate_bound(expr, &row, &schema, &self.qualifiers))
                .collect::<QueryResult<Vec<_>>>()?;
            let slot = match index.entry(encode_key(&keys)) {
                Entry::Occupied(entry) => *entry.get(),
                Entry::Vacant(entry) => {
                    groups.push(GroupState {
                        first_row: row.clone(),
                        accumulators: self.calls.iter().map(|c| Accumulator::new(c.func)).collect(),
                    });
                    *entry.insert(groups.len() - 1)
                }
            };

            let group = &mut groups[slot];
            for (call, acc) in self.calls.iter().zip(&mut group.accumulators) {
                let value = call
                    .arg
                    .as_ref()
                    .map(|arg| evaluate_bound(arg, &row, &schema, &self.qualifiers))
                    .transpose()?;
                acc.update(value)?;
            }
        }
        Ok(groups)
    }

    /// Evaluates the output items for one group.
    fn output_row(&self, results: &[Value], row: &Tuple, schema: &Schema) -> QueryResult<Tuple> {
        let values = self
            .outputs
            .iter()
            .map(|item| {
                let expr = substitute(&item.expr, &self.calls, results);
                evaluate_bound(&expr, row, schema, &self.qualifiers)
            })
            .collect::<QueryResult<Vec<_>>>()?;
        Ok(Tuple::new(values))
    }
}

impl Operator for AggregateOp {
    fn open(&mut self, ctx: &ExecutionContext) -> QueryResult<()> {
        self.input.open(ctx)?;
        let groups = self.fold()?;
        let schema = self.input.schema();

        let mut rows = Vec::with_capacity(groups.len().max(1));
        if groups.is_empty() && self.group_by.is_empty() {
            let results: Vec<Value> =
                self.calls.iter().map(|c| Accumulator::empty_result(c.func)).collect();
            rows.push(self.output_row(&results, &Tuple::nulls(schema.len()), &schema)?);
        }
        for group in &groups {
            let results: Vec<Value> = group.accumulators.iter().map(Accumulator::finish).collect();
            rows.push(self.output_row(&results, &group.first_row, &schema)?);
        }

        debug!(groups = groups.len(), rows = rows.len(), "Aggregate folded input");
        self.results = rows.into_iter();
        self.base.set_open();
        Ok(())
    }

    fn next(&mut self) -> QueryResult<Option<Tuple>> {
        if !self.base.check_next(self.name())? {
            return Ok(None);
        }
        let next = self.results.next();
        Ok(self.base.emit(next))
    }

    fn close(&mut self) -> QueryResult<()> {
        self.results = Vec::new().into_iter();
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
        "Aggregate"
    }
}

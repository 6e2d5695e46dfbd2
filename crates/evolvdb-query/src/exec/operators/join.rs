//! Join operators for combining data from two inputs.
//!
//! Every join emits the left tuple followed by the right tuple. Unmatched
//! rows of an outer join are padded with nulls on the missing side.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use evolvdb_core::{Schema, Tuple, Value};
use tracing::debug;

use crate::error::QueryResult;
use crate::exec::context::ExecutionContext;
use crate::exec::eval::{evaluate_bound, evaluate_join, is_true, order_values};
use crate::exec::key::join_key;
use crate::exec::operator::{BoxedOperator, Operator, OperatorBase, OperatorState};
use crate::plan::logical::{JoinType, LogicalExpr};
use crate::plan::physical::{EquiJoinNode, NestedLoopJoinNode};

/// Closes both children, reporting the first failure after trying both.
fn close_children(left: &mut BoxedOperator, right: &mut BoxedOperator) -> QueryResult<()> {
    let left_result = left.close();
    let right_result = right.close();
    left_result.and(right_result)
}

/// Nested loop join operator.
///
/// Buffers the right input on open, then compares every left row against
/// every buffered right row. Supports all join types and any condition.
pub struct NestedLoopJoinOp {
    /// Base operator state.
    base: OperatorBase,
    /// The node configuration.
    node: NestedLoopJoinNode,
    /// Left (outer) input.
    left: BoxedOperator,
    /// Right (inner) input.
    right: BoxedOperator,
    left_schema: Arc<Schema>,
    right_schema: Arc<Schema>,
    /// Materialized right rows.
    right_rows: Vec<Tuple>,
    /// Whether each right row found a partner, for RIGHT/FULL joins.
    right_matched: Vec<bool>,
    /// Current left row.
    current_left: Option<Tuple>,
    /// Current position in right rows.
    right_position: usize,
    /// Whether the current left row matched.
    matched_left: bool,
    /// Set once the left input is exhausted; then indexes unmatched right rows.
    unmatched_position: Option<usize>,
}

impl NestedLoopJoinOp {
    /// Creates a new nested loop join operator.
    #[must_use]
    pub fn new(node: NestedLoopJoinNode, left: BoxedOperator, right: BoxedOperator) -> Self {
        let left_schema = left.schema();
        let right_schema = right.schema();
        Self {
            base: OperatorBase::new(Arc::clone(&node.schema)),
            node,
            left,
            right,
            left_schema,
            right_schema,
            right_rows: Vec::new(),
            right_matched: Vec::new(),
            current_left: None,
            right_position: 0,
            matched_left: false,
            unmatched_position: None,
        }
    }

    /// Returns the join type.
    #[must_use]
    pub fn join_type(&self) -> JoinType {
        self.node.join_type
    }

    /// Evaluates the join condition for a candidate pair.
    fn matches(&self, left: &Tuple, right: &Tuple) -> QueryResult<bool> {
        match &self.node.condition {
            Some(cond) => {
                let value = evaluate_join(
                    cond,
                    left,
                    &self.left_schema,
                    right,
                    &self.right_schema,
                    &self.node.left_qualifiers,
                    &self.node.right_qualifiers,
                )?;
                Ok(is_true(&value))
            }
            None => Ok(true),
        }
    }

    /// Emits the next right row no left row matched, if any.
    fn next_unmatched_right(&mut self, mut position: usize) -> Option<Tuple> {
        let padded = loop {
            let Some(row) = self.right_rows.get(position) else {
                break None;
            };
            position += 1;
            if !self.right_matched[position - 1] {
                break Some(Tuple::nulls(self.left_schema.len()).concat(row));
            }
        };
        self.unmatched_position = Some(position);
        padded
    }
}

impl Operator for NestedLoopJoinOp {
    fn open(&mut self, ctx: &ExecutionContext) -> QueryResult<()> {
        self.left.open(ctx)?;
        self.right.open(ctx)?;
        self.right_rows.clear();
        while let Some(row) = self.right.next()? {
            self.right_rows.push(row);
        }
        self.right_matched = vec![false; self.right_rows.len()];
        self.current_left = None;
        self.right_position = 0;
        self.matched_left = false;
        self.unmatched_position = None;
        self.base.set_open();
        debug!(
            join_type = %self.node.join_type,
            right_rows = self.right_rows.len(),
            "NestedLoopJoin opened"
        );
        Ok(())
    }

    fn next(&mut self) -> QueryResult<Option<Tuple>> {
        if !self.base.check_next(self.name())? {
            return Ok(None);
        }

        loop {
            if let Some(position) = self.unmatched_position {
                let padded = self.next_unmatched_right(position);
                return Ok(self.base.emit(padded));
            }

            if self.current_left.is_none() {
                match self.left.next()? {
                    Some(row) => {
                        self.current_left = Some(row);
                        self.right_position = 0;
                        self.matched_left = false;
                    }
                    None => {
                        let start = if self.node.join_type.preserves_right() {
                            0
                        } else {
                            self.right_rows.len()
                        };
                        self.unmatched_position = Some(start);
                        continue;
                    }
                }
            }

            if let Some(left_row) = &self.current_left {
                while self.right_position < self.right_rows.len() {
                    let index = self.right_position;
                    self.right_position += 1;

                    if self.matches(left_row, &self.right_rows[index])? {
                        self.matched_left = true;
                        self.right_matched[index] = true;
                        let joined = left_row.concat(&self.right_rows[index]);
                        return Ok(self.base.emit(Some(joined)));
                    }
                }

                if self.node.join_type.preserves_left() && !self.matched_left {
                    let padded = left_row.concat(&Tuple::nulls(self.right_schema.len()));
                    self.current_left = None;
                    return Ok(self.base.emit(Some(padded)));
                }
            }

            self.current_left = None;
        }
    }

    fn close(&mut self) -> QueryResult<()> {
        if matches!(self.base.state(), OperatorState::Open | OperatorState::Finished) {
            debug!(rows = self.base.rows_produced(), "NestedLoopJoin closed");
        }
        self.right_rows.clear();
        self.right_matched.clear();
        self.current_left = None;
        self.base.set_closed();
        close_children(&mut self.left, &mut self.right)
    }

    fn schema(&self) -> Arc<Schema> {
        self.base.schema()
    }

    fn state(&self) -> OperatorState {
        self.base.state()
    }

    fn name(&self) -> &'static str {
        "NestedLoopJoin"
    }
}

/// Hash join operator.
///
/// Builds a hash table on the right input during open, then probes it with
/// each left row. Rows whose key is null are never inserted or probed.
pub struct HashJoinOp {
    /// Base operator state.
    base: OperatorBase,
    /// The node configuration.
    node: EquiJoinNode,
    /// Probe side input.
    left: BoxedOperator,
    /// Build side input.
    right: BoxedOperator,
    left_schema: Arc<Schema>,
    right_schema: Arc<Schema>,
    /// Right rows bucketed by encoded key.
    table: HashMap<Vec<u8>, Vec<Tuple>>,
    /// Current probe row and its encoded key.
    current_left: Option<(Tuple, Vec<u8>)>,
    /// Position in the current bucket.
    bucket_position: usize,
}

impl HashJoinOp {
    /// Creates a new hash join operator.
    #[must_use]
    pub fn new(node: EquiJoinNode, left: BoxedOperator, right: BoxedOperator) -> Self {
        let left_schema = left.schema();
        let right_schema = right.schema();
        Self {
            base: OperatorBase::new(Arc::clone(&node.schema)),
            node,
            left,
            right,
            left_schema,
            right_schema,
            table: HashMap::new(),
            current_left: None,
            bucket_position: 0,
        }
    }

    fn build_hash_table(&mut self) -> QueryResult<()> {
        self.table.clear();
        while let Some(row) = self.right.next()? {
            let value = evaluate_bound(
                &self.node.right_key,
                &row,
                &self.right_schema,
                &self.node.right_qualifiers,
            )?;
            if let Some(key) = join_key(&value) {
                self.table.entry(key).or_default().push(row);
            }
        }
        Ok(())
    }
}

impl Operator for HashJoinOp {
    fn open(&mut self, ctx: &ExecutionContext) -> QueryResult<()> {
        self.left.open(ctx)?;
        self.right.open(ctx)?;
        self.build_hash_table()?;
        self.right.close()?;
        self.current_left = None;
        self.bucket_position = 0;
        self.base.set_open();
        debug!(key = %self.node.right_key, buckets = self.table.len(), "HashJoin built");
        Ok(())
    }

    fn next(&mut self) -> QueryResult<Option<Tuple>> {
        if !self.base.check_next(self.name())? {
            return Ok(None);
        }

        loop {
            if let Some((left_row, key)) = &self.current_left {
                let bucket = self.table.get(key).map_or(&[][..], Vec::as_slice);
                if let Some(right_row) = bucket.get(self.bucket_position) {
                    let joined = left_row.concat(right_row);
                    self.bucket_position += 1;
                    return Ok(self.base.emit(Some(joined)));
                }
            }

            let Some(row) = self.left.next()? else {
                self.current_left = None;
                return Ok(self.base.emit(None));
            };
            let value =
                evaluate_bound(&self.node.left_key, &row, &self.left_schema, &self.node.left_qualifiers)?;
            self.current_left = join_key(&value).map(|key| (row, key));
            self.bucket_position = 0;
        }
    }

    fn close(&mut self) -> QueryResult<()> {
        if matches!(self.base.state(), OperatorState::Open | OperatorState::Finished) {
            debug!(rows = self.base.rows_produced(), "HashJoin closed");
        }
        self.table.clear();
        self.current_left = None;
        self.base.set_closed();
        close_children(&mut self.left, &mut self.right)
    }

    fn schema(&self) -> Arc<Schema> {
        self.base.schema()
    }

    fn state(&self) -> OperatorState {
        self.base.state()
    }

    fn name(&self) -> &'static str {
        "HashJoin"
    }
}

/// The equal-key runs currently being crossed by a sort-merge join.
#[derive(Debug, Clone, Copy)]
struct Run {
    left: usize,
    left_end: usize,
    right_start: usize,
    right: usize,
    right_end: usize,
}

impl Run {
    const fn is_done(&self) -> bool {
        self.left >= self.left_end
    }

    fn advance(&mut self) {
        self.right += 1;
        if self.right == self.right_end {
            self.right = self.right_start;
            self.left += 1;
        }
    }
}

/// Sort-merge join operator.
///
/// Buffers and sorts both inputs by key during open. For each key present on
/// both sides it emits the left run crossed with the right run, then moves
/// both cursors past the key. Null keys never match.
pub struct SortMergeJoinOp {
    /// Base operator state.
    base: OperatorBase,
    /// The node configuration.
    node: EquiJoinNode,
    /// Left input.
    left: BoxedOperator,
    /// Right input.
    right: BoxedOperator,
    /// Sorted left rows with their keys.
    left_rows: Vec<(Value, Tuple)>,
    /// Sorted right rows with their keys.
    right_rows: Vec<(Value, Tuple)>,
    left_position: usize,
    right_position: usize,
    run: Option<Run>,
}

impl SortMergeJoinOp {
    /// Creates a new sort-merge join operator.
    #[must_use]
    pub fn new(node: EquiJoinNode, left: BoxedOperator, right: BoxedOperator) -> Self {
        Self {
            base: OperatorBase::new(Arc::clone(&node.schema)),
            node,
            left,
            right,
            left_rows: Vec::new(),
            right_rows: Vec::new(),
            left_position: 0,
            right_position: 0,
            run: None,
        }
    }

    /// Drains `input` into rows sorted by key, dropping null keys.
    fn sorted_input(
        input: &mut BoxedOperator,
        key: &LogicalExpr,
        qualifiers: &HashSet<String>,
    ) -> QueryResult<Vec<(Value, Tuple)>> {
        let schema = input.schema();
        let mut rows = Vec::new();
        while let Some(row) = input.next()? {
            let value = evaluate_bound(key, &row, &schema, qualifiers)?;
            if !value.is_null() {
                rows.push((value, row));
            }
        }
        rows.sort_by(|a, b| order_values(&a.0, &b.0));
        Ok(rows)
    }

    /// Returns the end of the run of keys equal to `rows[start]`.
    fn run_end(rows: &[(Value, Tuple)], start: usize) -> usize {
        let key = &rows[start].0;
        start + rows[start..].iter().take_while(|(k, _)| order_values(k, key).is_eq()).count()
    }
}

impl Operator for SortMergeJoinOp {
    fn open(&mut self, ctx: &ExecutionContext) -> QueryResult<()> {
        self.left.open(ctx)?;
        self.right.open(ctx)?;
        self.left_rows =
            Self::sorted_input(&mut self.left, &self.node.left_key, &self.node.left_qualifiers)?;
        self.right_rows =
            Self::sorted_input(&mut self.right, &self.node.right_key, &self.node.right_qualifiers)?;
        close_children(&mut self.left, &mut self.right)?;
        self.left_position = 0;
        self.right_position = 0;
        self.run = None;
        self.base.set_open();
        debug!(
            left_rows = self.left_rows.len(),
            right_rows = self.right_rows.len(),
            "SortMergeJoin sorted"
        );
        Ok(())
    }

    fn next(&mut self) -> QueryResult<Option<Tuple>> {
        if !self.base.check_next(self.name())? {
            return Ok(None);
        }

        loop {
            if let Some(run) = self.run.as_mut() {
                if !run.is_done() {
                    let joined =
                        self.left_rows[run.left].1.concat(&self.right_rows[run.right].1);
                    run.advance();
                    return Ok(self.base.emit(Some(joined)));
                }
                self.run = None;
            }

            if self.left_position >= self.left_rows.len()
                || self.right_position >= self.right_rows.len()
            {
                return Ok(self.base.emit(None));
            }

            let left_key = &self.left_rows[self.left_position].0;
            let right_key = &self.right_rows[self.right_position].0;
            match order_values(left_key, right_key) {
                std::cmp::Ordering::Less => self.left_position += 1,
                std::cmp::Ordering::Greater => self.right_position += 1,
                std::cmp::Ordering::Equal => {
                    let left_end = Self::run_end(&self.left_rows, self.left_position);
                    let right_end = Self::run_end(&self.right_rows, self.right_position);
                    self.run = Some(Run {
                        left: self.left_position,
                        left_end,
                        right_start: self.right_position,
                        right: self.right_position,
                        right_end,
                    });
                    self.left_position = left_end;
                    self.right_position = right_end;
                }
            }
        }
    }

    fn close(&mut self) -> QueryResult<()> {
        if matches!(self.base.state(), OperatorState::Open | OperatorState::Finished) {
            debug!(rows = self.base.rows_produced(), "SortMergeJoin closed");
        }
        self.left_rows.clear();
        self.right_rows.clear();
        self.run = None;
        self.base.set_closed();
        close_children(&mut self.left, &mut self.right)
    }

    fn schema(&self) -> Arc<Schema> {
        self.base.schema()
    }

    fn state(&self) -> OperatorState {
        self.base.state()
    }

    fn name(&self) -> &'static str {
        "SortMergeJoin"
    }
}

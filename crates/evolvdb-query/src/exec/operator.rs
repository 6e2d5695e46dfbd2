//! Operator trait and base types.
//!
//! This module defines the [`Operator`] trait that all execution
//! operators implement.

use std::sync::Arc;

use evolvdb_core::{Schema, Tuple};

use crate::error::{QueryError, QueryResult};

use super::context::ExecutionContext;

/// The state of an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorState {
    /// Operator has not been opened yet.
    Created,
    /// Operator is open and ready to produce rows.
    Open,
    /// Operator has finished producing rows.
    Finished,
    /// Operator has been closed.
    Closed,
}

impl OperatorState {
    /// Returns true if the operator is open.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }

    /// Returns true if the operator has finished.
    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Finished)
    }

    /// Returns true if the operator is closed.
    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// The operator trait for pull-based query execution.
///
/// Operators are organized in a tree structure matching the physical plan.
/// Tuples flow from leaf operators (scans) up through intermediate operators
/// (filter, project, join) to the root.
///
/// # Lifecycle
///
/// 1. **Created**: Initial state after construction
/// 2. **Open**: After `open()` is called; ready to produce tuples
/// 3. **Finished**: After `next()` returns `None`; every later call also
///    returns `None`
/// 4. **Closed**: After `close()` is called; buffers released
///
/// `next()` before `open()` or after `close()` fails with
/// [`QueryError::InvalidState`]. `close()` is idempotent and succeeds on an
/// operator that was never opened or whose `open()` failed halfway.
///
/// # Thread Safety
///
/// The `Send` bound allows operators to be passed between threads,
/// but operators are not required to be `Sync` - they maintain mutable
/// internal state.
pub trait Operator: Send {
    /// Opens the operator and prepares it to produce tuples.
    ///
    /// This method recursively opens any child operators.
    fn open(&mut self, ctx: &ExecutionContext) -> QueryResult<()>;

    /// Returns the next tuple, or `None` if there are no more tuples.
    fn next(&mut self) -> QueryResult<Option<Tuple>>;

    /// Closes the operator and releases resources.
    ///
    /// This method recursively closes any child operators.
    fn close(&mut self) -> QueryResult<()>;

    /// Returns the output schema of this operator.
    fn schema(&self) -> Arc<Schema>;

    /// Returns the current state of this operator.
    fn state(&self) -> OperatorState;

    /// Returns the name of this operator type.
    fn name(&self) -> &'static str;
}

/// A boxed operator for dynamic dispatch.
pub type BoxedOperator = Box<dyn Operator>;

/// Base implementation for operators.
///
/// This struct provides common functionality that operators can use.
#[derive(Debug)]
pub struct OperatorBase {
    /// The output schema.
    schema: Arc<Schema>,
    /// The current state.
    state: OperatorState,
    /// Number of tuples produced.
    rows_produced: u64,
}

impl OperatorBase {
    /// Creates a new operator base with the given schema.
    #[must_use]
    pub fn new(schema: Arc<Schema>) -> Self {
        Self { schema, state: OperatorState::Created, rows_produced: 0 }
    }

    /// Returns the schema.
    #[must_use]
    pub fn schema(&self) -> Arc<Schema> {
        Arc::clone(&self.schema)
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> OperatorState {
        self.state
    }

    /// Sets the state to open and resets the row counter.
    pub fn set_open(&mut self) {
        self.state = OperatorState::Open;
        self.rows_produced = 0;
    }

    /// Sets the state to finished.
    pub fn set_finished(&mut self) {
        self.state = OperatorState::Finished;
    }

    /// Sets the state to closed.
    pub fn set_closed(&mut self) {
        self.state = OperatorState::Closed;
    }

    /// Increments the rows produced counter.
    pub fn inc_rows_produced(&mut self) {
        self.rows_produced += 1;
    }

    /// Returns the number of rows produced.
    #[must_use]
    pub const fn rows_produced(&self) -> u64 {
        self.rows_produced
    }

    /// Checks whether `next()` may produce a tuple.
    ///
    /// Returns `Ok(false)` once the operator has finished.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidState`] if the operator is not open.
    pub fn check_next(&self, operator: &str) -> QueryResult<bool> {
        match self.state {
            OperatorState::Open => Ok(true),
            OperatorState::Finished => Ok(false),
            OperatorState::Created => {
                Err(QueryError::InvalidState(format!("{operator}: next() called before open()")))
            }
            OperatorState::Closed => {
                Err(QueryError::InvalidState(format!("{operator}: next() called after close()")))
            }
        }
    }

    /// Records a produced tuple, or marks the operator finished on `None`.
    pub fn emit(&mut self, tuple: Option<Tuple>) -> Option<Tuple> {
        if tuple.is_some() {
            self.inc_rows_produced();
        } else {
            self.set_finished();
        }
        tuple
    }
}

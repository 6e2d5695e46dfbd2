//! Cost model for query optimization.
//!
//! This module provides cost estimation for physical plan operators,
//! enabling the optimizer to choose between alternative execution strategies.

use std::fmt;
use std::sync::Arc;

use evolvdb_core::StatsProvider;
use serde::{Deserialize, Serialize};

/// Estimated cost of a plan operator.
///
/// A cost is a vector of estimated output rows, CPU work and I/O work.
/// Lower totals are better.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Cost {
    row_count: f64,
    cpu: f64,
    io: f64,
}

impl Cost {
    /// A cost worse than any finite one; the identity for minimisation.
    pub const INFINITE: Self = Self { row_count: f64::INFINITY, cpu: f64::INFINITY, io: f64::INFINITY };

    /// Creates a new cost estimate. Negative components are clamped to zero.
    #[must_use]
    pub fn new(row_count: f64, cpu: f64, io: f64) -> Self {
        Self { row_count: row_count.max(0.0), cpu: cpu.max(0.0), io: io.max(0.0) }
    }

    /// Creates a zero cost.
    #[must_use]
    pub const fn zero() -> Self {
        Self { row_count: 0.0, cpu: 0.0, io: 0.0 }
    }

    /// Returns the estimated output rows.
    #[must_use]
    pub const fn row_count(&self) -> f64 {
        self.row_count
    }

    /// Returns the CPU component.
    #[must_use]
    pub const fn cpu(&self) -> f64 {
        self.cpu
    }

    /// Returns the I/O component.
    #[must_use]
    pub const fn io(&self) -> f64 {
        self.io
    }

    /// Returns the sum of all components.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.row_count + self.cpu + self.io
    }

    /// Returns true if this cost is less than another.
    #[must_use]
    pub fn is_less_than(&self, other: &Cost) -> bool {
        self.total() < other.total()
    }

    /// Returns true if this is the infinite sentinel.
    #[must_use]
    pub fn is_infinite(&self) -> bool {
        self.total().is_infinite()
    }
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rows={:.1} cpu={:.1} io={:.1}", self.row_count, self.cpu, self.io)
    }
}

/// Tunable inputs of the cost model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostParameters {
    /// Row count assumed for tables without statistics.
    pub default_row_count: f64,
    /// Fraction of rows assumed to pass a filter.
    pub filter_selectivity: f64,
    /// Fraction of the row product assumed to survive a join.
    pub join_selectivity: f64,
}

impl CostParameters {
    /// Creates the default parameters.
    #[must_use]
    pub const fn new() -> Self {
        Self { default_row_count: 1000.0, filter_selectivity: 0.1, join_selectivity: 0.25 }
    }

    /// Sets the default row count.
    #[must_use]
    pub const fn with_default_row_count(mut self, rows: f64) -> Self {
        self.default_row_count = rows;
        self
    }

    /// Sets the filter selectivity.
    #[must_use]
    pub const fn with_filter_selectivity(mut self, selectivity: f64) -> Self {
        self.filter_selectivity = selectivity;
        self
    }

    /// Sets the join selectivity.
    #[must_use]
    pub const fn with_join_selectivity(mut self, selectivity: f64) -> Self {
        self.join_selectivity = selectivity;
        self
    }
}

impl Default for CostParameters {
    fn default() -> Self {
        Self::new()
    }
}

/// `x ln x`, counted as zero when `x <= 1`.
fn n_log_n(x: f64) -> f64 {
    if x <= 1.0 {
        0.0
    } else {
        x * x.ln()
    }
}

/// Cost model for estimating operator costs.
///
/// Join estimates depend only on the child costs handed in; scan estimates
/// consult the statistics provider when one is attached.
#[derive(Clone, Default)]
pub struct CostModel {
    params: CostParameters,
    stats: Option<Arc<dyn StatsProvider>>,
}

impl CostModel {
    /// Creates a cost model without statistics.
    #[must_use]
    pub fn new(params: CostParameters) -> Self {
        Self { params, stats: None }
    }

    /// Attaches a statistics provider.
    #[must_use]
    pub fn with_stats(mut self, stats: Arc<dyn StatsProvider>) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Attaches a statistics provider if one is given.
    #[must_use]
    pub fn with_optional_stats(mut self, stats: Option<Arc<dyn StatsProvider>>) -> Self {
        self.stats = stats;
        self
    }

    /// Returns the parameters.
    #[must_use]
    pub const fn params(&self) -> &CostParameters {
        &self.params
    }

    /// Returns the attached statistics provider, if any.
    #[must_use]
    pub fn stats(&self) -> Option<Arc<dyn StatsProvider>> {
        self.stats.clone()
    }

    /// Returns the estimated row count of a table.
    ///
    /// Known, positive statistics win; otherwise the default row count.
    #[must_use]
    pub fn table_rows(&self, table: &str) -> f64 {
        self.stats
            .as_ref()
            .and_then(|s| s.table_stats(table))
            .filter(|t| t.row_count > 0)
            .map_or(self.params.default_row_count, |t| t.row_count as f64)
    }

    /// Estimates cost of a full table scan.
    #[must_use]
    pub fn seq_scan(&self, table: &str) -> Cost {
        let rows = self.table_rows(table);
        Cost::new(rows, rows, (rows / 100.0).max(1.0))
    }

    /// Estimates cost of a filter operation.
    #[must_use]
    pub fn filter(&self, child: &Cost) -> Cost {
        Cost::new(
            child.row_count * self.params.filter_selectivity,
            child.cpu + child.row_count * 0.1,
            child.io,
        )
    }

    /// Estimates cost of a projection operation.
    #[must_use]
    pub fn project(&self, child: &Cost) -> Cost {
        Cost::new(child.row_count, child.cpu + child.row_count * 0.1, child.io)
    }

    /// Estimates cost of a nested loop join.
    ///
    /// The estimate never drops below the sort-merge estimate for the same
    /// inputs, so that tiny or skewed inputs still order the strategies
    /// hash, sort-merge, nested loop.
    #[must_use]
    pub fn nested_loop_join(&self, left: &Cost, right: &Cost) -> Cost {
        let product = left.row_count * right.row_count;
        let merge = self.sort_merge_join(left, right);
        Cost::new(
            (product * self.params.join_selectivity).max(merge.row_count),
            product.max(merge.cpu),
            left.io + right.io,
        )
    }

    /// Estimates cost of a hash join.
    #[must_use]
    pub fn hash_join(&self, left: &Cost, right: &Cost) -> Cost {
        Cost::new(
            left.row_count.min(right.row_count) * self.params.join_selectivity,
            left.row_count + right.row_count,
            left.io + right.io,
        )
    }

    /// Estimates cost of a sort-merge join.
    #[must_use]
    pub fn sort_merge_join(&self, left: &Cost, right: &Cost) -> Cost {
        let (n, m) = (left.row_count, right.row_count);
        Cost::new(
            n.min(m) * self.params.join_selectivity,
            n_log_n(n) + n_log_n(m) + n + m,
            left.io + right.io,
        )
    }

    /// Estimates cost of a hash aggregate.
    #[must_use]
    pub fn aggregate(&self, child: &Cost) -> Cost {
        Cost::new((child.row_count * 0.1).max(1.0), child.cpu + child.row_count, child.io)
    }

    /// Estimates cost of inserting `rows` literal rows.
    #[must_use]
    pub fn insert(&self, rows: usize) -> Cost {
        let rows = rows as f64;
        Cost::new(rows, rows, (rows / 100.0).max(1.0))
    }
}

impl fmt::Debug for CostModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CostModel")
            .field("params", &self.params)
            .field("has_stats", &self.stats.is_some())
            .finish()
    }
}

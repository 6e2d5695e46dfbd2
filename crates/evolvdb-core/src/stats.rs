//! Table and column statistics.
//!
//! Statistics are optional planner input: a provider answering `None` means
//! "unknown", never an error.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

/// Table-level statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TableStats {
    /// Estimated number of rows.
    pub row_count: u64,
}

impl TableStats {
    /// Creates table statistics.
    #[must_use]
    pub const fn new(row_count: u64) -> Self {
        Self { row_count }
    }
}

/// Column-level statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnStats {
    /// Estimated number of distinct values.
    pub distinct_count: u64,
    /// Fraction of rows holding null, in `[0, 1]`.
    pub null_fraction: f64,
}

impl ColumnStats {
    /// Creates column statistics. `null_fraction` is clamped to `[0, 1]`.
    #[must_use]
    pub fn new(distinct_count: u64, null_fraction: f64) -> Self {
        Self { distinct_count, null_fraction: null_fraction.clamp(0.0, 1.0) }
    }
}

/// Source of planner statistics.
pub trait StatsProvider: Send + Sync {
    /// Returns statistics for a table, if known.
    fn table_stats(&self, table: &str) -> Option<TableStats>;

    /// Returns statistics for a column, if known.
    fn column_stats(&self, table: &str, column: &str) -> Option<ColumnStats>;
}

/// Statistics held in memory, keyed case-insensitively.
#[derive(Debug, Default)]
pub struct InMemoryStatsProvider {
    tables: RwLock<HashMap<String, TableStats>>,
    columns: RwLock<HashMap<(String, String), ColumnStats>>,
}

impl InMemoryStatsProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the row count of a table.
    pub fn put_table(&self, table: &str, row_count: u64) {
        if let Ok(mut tables) = self.tables.write() {
            tables.insert(table.to_lowercase(), TableStats::new(row_count));
        }
    }

    /// Records statistics for a column.
    pub fn put_column(&self, table: &str, column: &str, stats: ColumnStats) {
        if let Ok(mut columns) = self.columns.write() {
            columns.insert((table.to_lowercase(), column.to_lowercase()), stats);
        }
    }

    /// Builder-style variant of [`put_table`](Self::put_table).
    #[must_use]
    pub fn with_table(self, table: &str, row_count: u64) -> Self {
        self.put_table(table, row_count);
        self
    }
}

impl StatsProvider for InMemoryStatsProvider {
    fn table_stats(&self, table: &str) -> Option<TableStats> {
        self.tables.read().ok()?.get(&table.to_lowercase()).copied()
    }

    fn column_stats(&self, table: &str, column: &str) -> Option<ColumnStats> {
        let key = (table.to_lowercase(), column.to_lowercase());
        self.columns.read().ok()?.get(&key).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_is_none() {
        let stats = InMemoryStatsProvider::new();
        assert_eq!(stats.table_stats("t"), None);
        assert_eq!(stats.column_stats("t", "c"), None);
    }

    #[test]
    fn table_and_column_stats() {
        let stats = InMemoryStatsProvider::new().with_table("Orders", 500);
        stats.put_column("orders", "user_id", ColumnStats::new(40, 0.0));

        assert_eq!(stats.table_stats("ORDERS"), Some(TableStats::new(500)));
        assert_eq!(stats.column_stats("Orders", "USER_ID").map(|c| c.distinct_count), Some(40));
    }

    #[test]
    fn null_fraction_is_clamped() {
        assert!((ColumnStats::new(1, 1.5).null_fraction - 1.0).abs() < f64::EPSILON);
        assert!(ColumnStats::new(1, -0.5).null_fraction.abs() < f64::EPSILON);
    }

    #[test]
    fn stats_deserialize_from_json() {
        let stats: TableStats = serde_json::from_str(r#"{"row_count": 42}"#).unwrap();
        assert_eq!(stats.row_count, 42);
    }
}

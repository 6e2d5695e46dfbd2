//! Execution context for query planning and execution.
//!
//! The execution context provides access to the catalog, optional planner
//! statistics, and runtime configuration.

use std::sync::Arc;

use evolvdb_core::{Catalog, StatsProvider};
use serde::{Deserialize, Serialize};

use crate::plan::optimize::DEFAULT_PUSHDOWN_PASSES;
use crate::plan::physical::CostParameters;

/// Execution context for a query.
///
/// The context provides access to:
/// - The catalog that resolves and opens tables
/// - An optional statistics provider for the cost model
/// - Planner and runtime configuration
///
/// Cloning is cheap; collaborators are shared.
#[derive(Clone)]
pub struct ExecutionContext {
    /// Table catalog.
    catalog: Arc<dyn Catalog>,
    /// Planner statistics, if any.
    stats: Option<Arc<dyn StatsProvider>>,
    /// Configuration options.
    config: ExecutionConfig,
}

impl ExecutionContext {
    /// Creates a context with the default configuration and no statistics.
    #[must_use]
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self { catalog, stats: None, config: ExecutionConfig::default() }
    }

    /// Attaches a statistics provider.
    #[must_use]
    pub fn with_stats(mut self, stats: Arc<dyn StatsProvider>) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: ExecutionConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the catalog.
    #[must_use]
    pub fn catalog(&self) -> &dyn Catalog {
        self.catalog.as_ref()
    }

    /// Returns the statistics provider, if any.
    #[must_use]
    pub fn stats(&self) -> Option<Arc<dyn StatsProvider>> {
        self.stats.clone()
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Returns mutable configuration.
    pub fn config_mut(&mut self) -> &mut ExecutionConfig {
        &mut self.config
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("catalog", &"<Catalog>")
            .field("stats", &self.stats.as_ref().map(|_| "<StatsProvider>"))
            .field("config", &self.config)
            .finish()
    }
}

/// Configuration options for planning and execution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Whether the optimizer routes its search through a memo.
    pub use_memo: bool,
    /// Whether to plan by cost; otherwise every join is a nested loop.
    pub cost_based: bool,
    /// Upper bound on predicate pushdown passes.
    pub max_pushdown_passes: usize,
    /// Cost model parameters.
    pub cost: CostParameters,
}

impl ExecutionConfig {
    /// Creates a new configuration with defaults.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            use_memo: false,
            cost_based: true,
            max_pushdown_passes: DEFAULT_PUSHDOWN_PASSES,
            cost: CostParameters::new(),
        }
    }

    /// Enables or disables the memo.
    #[must_use]
    pub const fn with_memo(mut self, use_memo: bool) -> Self {
        self.use_memo = use_memo;
        self
    }

    /// Enables or disables cost-based planning.
    #[must_use]
    pub const fn with_cost_based(mut self, cost_based: bool) -> Self {
        self.cost_based = cost_based;
        self
    }

    /// Sets the maximum number of pushdown passes.
    #[must_use]
    pub const fn with_max_pushdown_passes(mut self, passes: usize) -> Self {
        self.max_pushdown_passes = passes;
        self
    }

    /// Sets the cost model parameters.
    #[must_use]
    pub const fn with_cost(mut self, cost: CostParameters) -> Self {
        self.cost = cost;
        self
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use evolvdb_core::{InMemoryStatsProvider, MemoryCatalog};

    use super::*;

    #[test]
    fn context_defaults() {
        let ctx = ExecutionContext::new(Arc::new(MemoryCatalog::new()));
        assert!(ctx.stats().is_none());
        assert!(ctx.config().cost_based);
        assert!(!ctx.config().use_memo);
        assert_eq!(ctx.config().max_pushdown_passes, 4);
    }

    #[test]
    fn context_builders() {
        let mut ctx = ExecutionContext::new(Arc::new(MemoryCatalog::new()))
            .with_stats(Arc::new(InMemoryStatsProvider::new()))
            .with_config(ExecutionConfig::new().with_memo(true));
        assert!(ctx.stats().is_some());
        assert!(ctx.config().use_memo);

        ctx.config_mut().cost_based = false;
        assert!(!ctx.config().cost_based);
        assert!(format!("{ctx:?}").contains("<Catalog>"));
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: ExecutionConfig =
            serde_json::from_str(r#"{"use_memo": true, "cost": {"default_row_count": 50.0}}"#)
                .unwrap();
        assert!(config.use_memo);
        assert!(config.cost_based);
        assert_eq!(config.cost.default_row_count, 50.0);
        assert_eq!(config.cost.join_selectivity, 0.25);
    }
}

//! Database configuration.

use crate::storage::StorageConfig;

/// Resource limits applied to every query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryBudget {
    /// Maximum rows alive between pipeline stages (cross products, joins).
    pub max_intermediate_rows: usize,
    /// Maximum rows a query may return after paging.
    pub max_result_rows: usize,
    /// Maximum nesting depth of subqueries.
    pub max_subquery_depth: usize,
}

impl Default for QueryBudget {
    fn default() -> Self {
        Self {
            max_intermediate_rows: 100_000,
            max_result_rows: 10_000,
            max_subquery_depth: 8,
        }
    }
}

impl QueryBudget {
    /// Create a budget with explicit limits.
    pub fn new(
        max_intermediate_rows: usize,
        max_result_rows: usize,
        max_subquery_depth: usize,
    ) -> Self {
        Self {
            max_intermediate_rows,
            max_result_rows,
            max_subquery_depth,
        }
    }

    /// A budget with no practical limits.
    pub fn unlimited() -> Self {
        Self {
            max_intermediate_rows: usize::MAX,
            max_result_rows: usize::MAX,
            max_subquery_depth: usize::MAX,
        }
    }

    /// Set the intermediate row limit.
    pub fn with_max_intermediate_rows(mut self, max: usize) -> Self {
        self.max_intermediate_rows = max;
        self
    }

    /// Set the result row limit.
    pub fn with_max_result_rows(mut self, max: usize) -> Self {
        self.max_result_rows = max;
        self
    }

    /// Set the subquery depth limit.
    pub fn with_max_subquery_depth(mut self, max: usize) -> Self {
        self.max_subquery_depth = max;
        self
    }
}

/// Where tables live.
#[derive(Debug, Clone, Default)]
pub enum BackendConfig {
    /// Process memory.
    #[default]
    Memory,
    /// A sled database.
    Sled(StorageConfig),
}

/// Configuration for a [`Database`](crate::Database).
#[derive(Debug, Clone, Default)]
pub struct DatabaseConfig {
    /// Storage backend.
    pub backend: BackendConfig,
    /// Query limits.
    pub budget: QueryBudget,
}

impl DatabaseConfig {
    /// In-memory configuration with the default budget.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Sled-backed configuration with the default budget.
    pub fn sled(storage: StorageConfig) -> Self {
        Self {
            backend: BackendConfig::Sled(storage),
            budget: QueryBudget::default(),
        }
    }

    /// Set the query budget.
    pub fn with_budget(mut self, budget: QueryBudget) -> Self {
        self.budget = budget;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_budget() {
        let budget = QueryBudget::default();
        assert_eq!(budget.max_intermediate_rows, 100_000);
        assert_eq!(budget.max_result_rows, 10_000);
        assert_eq!(budget.max_subquery_depth, 8);
    }

    #[test]
    fn test_budget_builder() {
        let budget = QueryBudget::default()
            .with_max_intermediate_rows(10)
            .with_max_result_rows(5)
            .with_max_subquery_depth(1);
        assert_eq!(budget, QueryBudget::new(10, 5, 1));
    }

    #[test]
    fn test_database_config() {
        assert!(matches!(DatabaseConfig::memory().backend, BackendConfig::Memory));
        let config = DatabaseConfig::sled(StorageConfig::temporary())
            .with_budget(QueryBudget::unlimited());
        assert!(matches!(config.backend, BackendConfig::Sled(_)));
        assert_eq!(config.budget.max_result_rows, usize::MAX);
    }
}

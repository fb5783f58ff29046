//! Pennywise Core Library
//!
//! Shared functionality for the Pennywise expense tracker:
//! - Domain models (expenses, budgets, categories)
//! - Pluggable key-value storage (in-memory, SQLite)
//! - Reactive store with snapshot subscriptions and cross-process sync
//! - Spending aggregation for dashboards
//! - Insight client for free-text parsing and spending analysis
//!   (Gemini, OpenAI-compatible, mock)
//! - Layered configuration (TOML file + environment)

pub mod aggregate;
pub mod config;
pub mod error;
pub mod insight;
pub mod models;
pub mod storage;
pub mod store;
pub mod sync;

/// Test utilities including a mock insight server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use aggregate::{
    budget_progress, category_breakdown, filter_expenses, over_budget_count, summarize,
    top_category, total_spent, BudgetProgress, BudgetStatus, CategoryTotal, DashboardSummary,
    ExpenseFilter,
};
pub use config::{BackendKind, Config, InsightConfig};
pub use error::{Error, Result};
pub use insight::{
    AIClient, InsightBackend, InsightClient, ParsedExpense, RequestSequencer, SpendingAnalysis,
    Ticket,
};
pub use models::{Budget, Category, Collection, Expense, NewExpense};
pub use storage::{MemoryStorage, SqliteStorage, StorageBackend};
pub use store::{reconcile_budgets, spawn_sync_task, Snapshot, Store, Subscription};
pub use sync::{ChangeChannel, ChangeEvent, ChangeReason, Mutation};

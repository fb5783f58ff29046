//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Shared utilities (config loading, open_store)
//! - `expenses` - Expense commands (add, quick, list, delete)
//! - `budgets` - Budget commands (list, set)
//! - `dashboard` - Spending totals and budget progress
//! - `insights` - AI analysis and backend status
//! - `watch` - Live view driven by store subscriptions

pub mod budgets;
pub mod core;
pub mod dashboard;
pub mod expenses;
pub mod insights;
pub mod watch;

// Re-export command functions for main.rs
pub use budgets::*;
pub use core::*;
pub use dashboard::*;
pub use expenses::*;
pub use insights::*;
pub use watch::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Format an amount in rupees
pub fn rupees(amount: f64) -> String {
    format!("₹{:.2}", amount)
}

/// Fixed-width progress bar for a 0-100 percentage
pub fn progress_bar(percent: f64, width: usize) -> String {
    let filled = ((percent.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

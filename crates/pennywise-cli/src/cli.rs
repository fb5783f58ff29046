//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use chrono::{Days, Local, NaiveDate};
use clap::{Parser, Subcommand};
use pennywise_core::Category;

/// Pennywise - Track expenses and stay on budget
#[derive(Parser)]
#[command(name = "pennywise")]
#[command(about = "Personal expense and budget tracker with AI insights", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path (overrides config file and PENNYWISE_DB)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Config file (default: ~/.config/pennywise/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record an expense
    Add {
        /// Amount spent
        amount: f64,

        /// What it was for
        description: String,

        /// Category (label or short name, e.g. food, transport, fun)
        #[arg(short, long, default_value = "other", value_parser = parse_category_arg)]
        category: Category,

        /// Date (YYYY-MM-DD, today, yesterday). Defaults to today.
        #[arg(short, long, value_parser = parse_date_arg)]
        date: Option<NaiveDate>,
    },

    /// Record an expense from free text using the AI backend
    Quick {
        /// e.g. "Lunch at Subway 250 yesterday"
        #[arg(required = true, trailing_var_arg = true)]
        text: Vec<String>,

        /// Show what was parsed without saving it
        #[arg(long)]
        dry_run: bool,
    },

    /// List expenses, most recent first
    List {
        /// Only this category
        #[arg(short, long, value_parser = parse_category_arg)]
        category: Option<Category>,

        /// Case-insensitive text to find in descriptions
        #[arg(short, long)]
        search: Option<String>,

        /// Maximum number of expenses to show
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete an expense by id
    Delete {
        /// Expense id (from `pennywise list`)
        id: String,
    },

    /// Manage budgets
    Budgets {
        #[command(subcommand)]
        action: Option<BudgetsAction>,
    },

    /// Show spending totals and budget progress
    Dashboard {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Ask the AI backend for a spending analysis
    Insights {
        /// Use a different model for this request
        #[arg(long)]
        model: Option<String>,
    },

    /// Print updates as expenses and budgets change (including from other processes)
    Watch {
        /// Poll interval for external changes in milliseconds (default from config)
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Refresh the AI analysis whenever expenses change
        #[arg(long)]
        insights: bool,
    },

    /// Show configuration and AI backend status
    Status,
}

#[derive(Subcommand)]
pub enum BudgetsAction {
    /// List budgets with current spending
    List,

    /// Set the monthly limit for a category (0 disables it)
    Set {
        /// Category (label or short name)
        #[arg(value_parser = parse_category_arg)]
        category: Category,

        /// New limit
        limit: f64,
    },
}

/// Parse a category label or short name, rejecting anything unknown
pub fn parse_category_arg(s: &str) -> Result<Category, String> {
    s.parse()
}

/// Parse `YYYY-MM-DD`, `today` or `yesterday`
pub fn parse_date_arg(s: &str) -> Result<NaiveDate, String> {
    let today = Local::now().date_naive();
    match s.trim().to_lowercase().as_str() {
        "today" => Ok(today),
        "yesterday" => today
            .checked_sub_days(Days::new(1))
            .ok_or_else(|| "date out of range".to_string()),
        other => NaiveDate::parse_from_str(other, "%Y-%m-%d")
            .map_err(|e| format!("invalid date '{}': {} (expected YYYY-MM-DD)", s, e)),
    }
}

//! Pennywise CLI - Personal expense and budget tracker
//!
//! Usage:
//!   pennywise add 250 "Lunch" -c food      Record an expense
//!   pennywise quick "Uber to college 180"  Record from free text (AI)
//!   pennywise dashboard                    Totals and budget progress
//!   pennywise insights                     AI spending analysis
//!   pennywise watch                        Live view across processes

mod cli;
mod commands;


use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Local;
use clap::Parser;
use pennywise_core::{ExpenseFilter, InsightClient};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config = commands::load_config(cli.config.as_deref(), cli.db.as_deref())?;

    match cli.command {
        Commands::Add {
            amount,
            description,
            category,
            date,
        } => {
            let store = commands::open_store(&config.db_path)?;
            commands::cmd_add(&store, amount, &description, category, date)
        }
        Commands::Quick { text, dry_run } => {
            let store = commands::open_store(&config.db_path)?;
            let insights = InsightClient::from_config(&config.insight);
            let today = Local::now().date_naive();
            commands::cmd_quick(&store, &insights, &text.join(" "), today, dry_run).await
        }
        Commands::List {
            category,
            search,
            limit,
            json,
        } => {
            let store = commands::open_store(&config.db_path)?;
            commands::cmd_list(&store, &ExpenseFilter { category, search }, limit, json)
        }
        Commands::Delete { id } => {
            let store = commands::open_store(&config.db_path)?;
            commands::cmd_delete(&store, &id)
        }
        Commands::Budgets { action } => {
            let store = commands::open_store(&config.db_path)?;
            match action {
                None | Some(BudgetsAction::List) => commands::cmd_budgets_list(&store),
                Some(BudgetsAction::Set { category, limit }) => {
                    commands::cmd_budgets_set(&store, category, limit)
                }
            }
        }
        Commands::Dashboard { json } => {
            let store = commands::open_store(&config.db_path)?;
            commands::cmd_dashboard(&store, json)
        }
        Commands::Insights { model } => {
            let store = commands::open_store(&config.db_path)?;
            let insights = InsightClient::from_config(&config.insight);
            commands::cmd_insights(&store, &insights, model.as_deref()).await
        }
        Commands::Watch {
            interval_ms,
            insights,
        } => {
            let store = Arc::new(commands::open_store(&config.db_path)?);
            let interval = interval_ms
                .map(|ms| Duration::from_millis(ms.max(1)))
                .unwrap_or(config.sync_interval);
            let insights = insights.then(|| InsightClient::from_config(&config.insight));
            commands::cmd_watch(store, interval, insights).await
        }
        Commands::Status => {
            let insights = InsightClient::from_config(&config.insight);
            commands::cmd_status(&config, cli.config.as_deref(), &insights).await
        }
    }
}

//! Budget command implementations (list, set)

use anyhow::{Context, Result};
use pennywise_core::{budget_progress, BudgetStatus, Category, Store};

use super::{progress_bar, rupees};

pub fn cmd_budgets_list(store: &Store) -> Result<()> {
    let budgets = store.load_budgets().context("Failed to load budgets")?;
    let expenses = store.load_expenses().context("Failed to load expenses")?;
    let progress = budget_progress(&expenses, &budgets);

    println!();
    println!("💰 Budgets");
    println!("   ─────────────────────────────────────────────────────────────");
    for budget in &budgets {
        match progress.iter().find(|p| p.category == budget.category) {
            Some(p) => println!(
                "   {:<20} {:>12} of {:>12}  {}",
                budget.category.as_str(),
                rupees(p.spent),
                rupees(p.limit),
                status_label(p.status())
            ),
            None => println!("   {:<20} {:>12}", budget.category.as_str(), "no limit"),
        }
    }
    println!();
    println!("   Set a limit: pennywise budgets set <category> <amount>");
    Ok(())
}

pub fn cmd_budgets_set(store: &Store, category: Category, limit: f64) -> Result<()> {
    store
        .upsert_budget(category, limit)
        .context("Failed to save budget")?;
    if limit > 0.0 {
        println!("✅ {} budget set to {}", category, rupees(limit));
    } else {
        println!("✅ {} budget cleared", category);
    }
    Ok(())
}

pub(crate) fn status_label(status: BudgetStatus) -> &'static str {
    match status {
        BudgetStatus::OnTrack => "🟢 on track",
        BudgetStatus::Warning => "🟠 nearing limit",
        BudgetStatus::Over => "🔴 over budget",
    }
}

pub(crate) fn status_bar(percent: f64, status: BudgetStatus) -> String {
    let icon = match status {
        BudgetStatus::OnTrack => "🟢",
        BudgetStatus::Warning => "🟠",
        BudgetStatus::Over => "🔴",
    };
    format!("{} {} {:>5.1}%", icon, progress_bar(percent, 20), percent)
}

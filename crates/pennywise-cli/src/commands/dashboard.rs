//! Dashboard command: totals, category breakdown and budget progress

use anyhow::{Context, Result};
use pennywise_core::{summarize, DashboardSummary, Store};

use super::budgets::status_bar;
use super::{progress_bar, rupees};

pub fn cmd_dashboard(store: &Store, json: bool) -> Result<()> {
    let expenses = store.load_expenses().context("Failed to load expenses")?;
    let budgets = store.load_budgets().context("Failed to load budgets")?;
    let summary = summarize(&expenses, &budgets);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    print_dashboard(&summary, expenses.len());
    Ok(())
}

pub(crate) fn print_dashboard(summary: &DashboardSummary, expense_count: usize) {
    println!();
    println!("╭─────────────────────────────────────────╮");
    println!("│         💸 Pennywise Dashboard          │");
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!("  Total spent:     {}", rupees(summary.total_spent));
    println!("  Expenses:        {}", expense_count);
    match summary.top_category {
        Some(top) => println!("  Top category:    {}", top),
        None => println!("  Top category:    -"),
    }
    if summary.alerts > 0 {
        println!("  🚨 Over budget:  {}", summary.alerts);
    }

    if !summary.breakdown.is_empty() {
        println!();
        println!("  Spending by category");
        for entry in &summary.breakdown {
            let share = if summary.total_spent > 0.0 {
                entry.total / summary.total_spent * 100.0
            } else {
                0.0
            };
            println!(
                "    {:<20} {:>12}  {}",
                entry.category.as_str(),
                rupees(entry.total),
                progress_bar(share, 20)
            );
        }
    }

    if !summary.progress.is_empty() {
        println!();
        println!("  Budget progress");
        for p in &summary.progress {
            println!(
                "    {:<20} {:>12} / {:<12} {}",
                p.category.as_str(),
                rupees(p.spent),
                rupees(p.limit),
                status_bar(p.percent, p.status())
            );
        }
    }

    if summary.breakdown.is_empty() {
        println!();
        println!("  No expenses yet. Add one with: pennywise add 250 \"Lunch\" -c food");
    }
    println!();
}

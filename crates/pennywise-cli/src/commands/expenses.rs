//! Expense command implementations (add, quick, list, delete)

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use pennywise_core::{
    filter_expenses, Category, Expense, ExpenseFilter, InsightClient, NewExpense,
    Store,
};

use super::{rupees, truncate};

pub fn cmd_add(
    store: &Store,
    amount: f64,
    description: &str,
    category: Category,
    date: Option<NaiveDate>,
) -> Result<()> {
    let description = description.trim();
    if description.is_empty() {
        bail!("Description cannot be empty");
    }

    let expense = Expense::new(NewExpense {
        amount,
        category,
        description: description.to_string(),
        date: date.unwrap_or_else(|| Local::now().date_naive()),
    })?;

    store
        .add_expense(expense.clone())
        .context("Failed to save expense")?;

    println!(
        "✅ Added {} for {} ({}, {})",
        rupees(expense.amount),
        expense.description,
        expense.category,
        expense.date
    );
    println!("   id: {}", expense.id);
    Ok(())
}

pub async fn cmd_quick(
    store: &Store,
    insights: &InsightClient,
    text: &str,
    today: NaiveDate,
    dry_run: bool,
) -> Result<()> {
    if !insights.is_configured() {
        println!("⚠️  No AI backend configured.");
        println!("   Set GEMINI_API_KEY (or AI_BACKEND=mock) to parse free text,");
        println!("   or record the expense with: pennywise add <amount> <description>");
        bail!("AI parsing unavailable");
    }

    println!("🤖 Parsing \"{}\"...", text);

    let Some(parsed) = insights.parse_natural_language_expense_on(text, today).await else {
        bail!("Could not understand that expense. Try: pennywise add <amount> <description>");
    };

    println!(
        "   {} | {} | {} | {}",
        rupees(parsed.amount),
        parsed.category,
        parsed.description,
        parsed.date
    );

    if dry_run {
        println!("   (dry run, not saved)");
        return Ok(());
    }

    let expense = Expense::new(parsed.into_new_expense())?;
    store
        .add_expense(expense.clone())
        .context("Failed to save expense")?;
    println!("✅ Saved (id: {})", expense.id);
    Ok(())
}

pub fn cmd_list(store: &Store, filter: &ExpenseFilter, limit: usize, json: bool) -> Result<()> {
    let expenses = store.load_expenses().context("Failed to load expenses")?;
    let matching = filter_expenses(&expenses, filter);
    let shown: Vec<&Expense> = matching.iter().take(limit).copied().collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&shown)?);
        return Ok(());
    }

    if shown.is_empty() {
        println!("No expenses found.");
        return Ok(());
    }

    println!();
    println!(
        "  {:<10}  {:>12}  {:<20}  {:<30}  {}",
        "Date", "Amount", "Category", "Description", "ID"
    );
    println!("  {}", "─".repeat(92));
    for e in &shown {
        println!(
            "  {:<10}  {:>12}  {:<20}  {:<30}  {}",
            e.date,
            rupees(e.amount),
            e.category.as_str(),
            truncate(&e.description, 30),
            e.id.chars().take(8).collect::<String>()
        );
    }

    println!();
    if matching.len() > shown.len() {
        println!(
            "  Showing {} of {} matching expenses (use --limit to see more)",
            shown.len(),
            matching.len()
        );
    }
    let total: f64 = matching.iter().map(|e| e.amount).sum();
    println!("  Total: {}", rupees(total));
    Ok(())
}

/// Delete by full id or unique id prefix
pub fn cmd_delete(store: &Store, id: &str) -> Result<()> {
    let id = id.trim();
    if id.is_empty() {
        bail!("Expense id cannot be empty");
    }

    let expenses = store.load_expenses().context("Failed to load expenses")?;
    let candidates: Vec<&Expense> = expenses.iter().filter(|e| e.id.starts_with(id)).collect();

    let target = match candidates.as_slice() {
        [] => {
            println!("No expense with id {}", id);
            return Ok(());
        }
        [single] => *single,
        many => match many.iter().find(|e| e.id == id) {
            Some(exact) => *exact,
            None => bail!("Id prefix '{}' matches {} expenses; use more characters", id, many.len()),
        },
    };

    store
        .delete_expense(&target.id)
        .context("Failed to delete expense")?;
    println!(
        "🗑️  Deleted {} for {} ({})",
        rupees(target.amount),
        target.description,
        target.date
    );
    Ok(())
}

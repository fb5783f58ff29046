//! Spending aggregation over expense and budget snapshots
//!
//! Everything here is a pure function of its inputs: no storage access,
//! no logging, no clock.

use serde::{Deserialize, Serialize};

use crate::models::{Budget, Category, Expense};

/// Percent of a budget above which spending is flagged as a warning
pub const WARNING_PERCENT: f64 = 85.0;

/// Total spent in one category
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: Category,
    pub total: f64,
}

/// Budget versus actual spending for one category
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetProgress {
    pub category: Category,
    pub spent: f64,
    pub limit: f64,
    /// `spent / limit` as a percentage, clamped to 100 for display
    pub percent: f64,
}

/// Display state of a budget bar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetStatus {
    OnTrack,
    Warning,
    Over,
}

impl BudgetProgress {
    /// Raw overage, independent of the clamped percentage
    pub fn is_over_budget(&self) -> bool {
        self.spent > self.limit
    }

    pub fn status(&self) -> BudgetStatus {
        if self.is_over_budget() {
            BudgetStatus::Over
        } else if self.percent > WARNING_PERCENT {
            BudgetStatus::Warning
        } else {
            BudgetStatus::OnTrack
        }
    }
}

/// Sum of all expense amounts
pub fn total_spent(expenses: &[Expense]) -> f64 {
    expenses.iter().map(|e| e.amount).sum()
}

fn spent_in(expenses: &[Expense], category: Category) -> f64 {
    expenses
        .iter()
        .filter(|e| e.category == category)
        .map(|e| e.amount)
        .sum()
}

/// Per-category totals, largest first, omitting categories with nothing spent
///
/// Equal totals keep category order.
pub fn category_breakdown(expenses: &[Expense]) -> Vec<CategoryTotal> {
    let mut totals: Vec<CategoryTotal> = Category::ALL
        .into_iter()
        .map(|category| CategoryTotal {
            category,
            total: spent_in(expenses, category),
        })
        .filter(|t| t.total > 0.0)
        .collect();
    totals.sort_by(|a, b| b.total.total_cmp(&a.total));
    totals
}

/// Progress for every budget with a positive limit, highest percent first
///
/// Budgets with a zero (or negative) limit are filtered out before any
/// percentage is computed.
pub fn budget_progress(expenses: &[Expense], budgets: &[Budget]) -> Vec<BudgetProgress> {
    let mut progress: Vec<BudgetProgress> = budgets
        .iter()
        .filter(|b| b.limit > 0.0)
        .map(|b| {
            let spent = spent_in(expenses, b.category);
            BudgetProgress {
                category: b.category,
                spent,
                limit: b.limit,
                percent: (spent / b.limit * 100.0).min(100.0),
            }
        })
        .collect();
    progress.sort_by(|a, b| b.percent.total_cmp(&a.percent));
    progress
}

/// Number of budgets where spending strictly exceeds the limit
pub fn over_budget_count(progress: &[BudgetProgress]) -> usize {
    progress.iter().filter(|p| p.is_over_budget()).count()
}

/// Category with the highest spending, if anything was spent
pub fn top_category(expenses: &[Expense]) -> Option<Category> {
    category_breakdown(expenses).first().map(|t| t.category)
}

/// Everything a dashboard shows, computed from one snapshot pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub total_spent: f64,
    pub top_category: Option<Category>,
    pub breakdown: Vec<CategoryTotal>,
    pub progress: Vec<BudgetProgress>,
    /// Budgets over their limit
    pub alerts: usize,
}

pub fn summarize(expenses: &[Expense], budgets: &[Budget]) -> DashboardSummary {
    let breakdown = category_breakdown(expenses);
    let progress = budget_progress(expenses, budgets);
    DashboardSummary {
        total_spent: total_spent(expenses),
        top_category: breakdown.first().map(|t| t.category),
        alerts: over_budget_count(&progress),
        breakdown,
        progress,
    }
}

/// Narrowing applied to an expense list
#[derive(Debug, Clone, Default)]
pub struct ExpenseFilter {
    /// Only this category (all when `None`)
    pub category: Option<Category>,
    /// Case-insensitive substring of the description
    pub search: Option<String>,
}

/// Expenses matching `filter`, in their original order
pub fn filter_expenses<'a>(expenses: &'a [Expense], filter: &ExpenseFilter) -> Vec<&'a Expense> {
    let needle = filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    expenses
        .iter()
        .filter(|e| filter.category.map_or(true, |c| e.category == c))
        .filter(|e| {
            needle
                .as_deref()
                .map_or(true, |n| e.description.to_lowercase().contains(n))
        })
        .collect()
}

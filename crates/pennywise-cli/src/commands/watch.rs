//! Watch command: live view driven by store subscriptions
//!
//! Subscribes to both collections and reprints whenever either changes. A
//! background task polls the database so edits made by another `pennywise`
//! process show up too. With `--insights`, every change triggers a fresh
//! analysis; a result that was overtaken by a newer request is dropped.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use pennywise_core::{
    budget_progress, over_budget_count, spawn_sync_task, total_spent, Budget, ChangeReason,
    Expense, InsightClient, RequestSequencer, SpendingAnalysis, Store,
};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::insights::print_analysis;
use super::rupees;

/// What the watch view shows after each change
#[derive(Debug, Clone, PartialEq)]
pub struct WatchReport {
    pub expense_count: usize,
    pub total: f64,
    pub active_budgets: usize,
    pub over_limit: usize,
}

impl WatchReport {
    pub fn new(expenses: &[Expense], budgets: &[Budget]) -> Self {
        let progress = budget_progress(expenses, budgets);
        Self {
            expense_count: expenses.len(),
            total: total_spent(expenses),
            active_budgets: progress.len(),
            over_limit: over_budget_count(&progress),
        }
    }
}

impl fmt::Display for WatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "📋 {} expenses, {} total",
            self.expense_count,
            rupees(self.total)
        )?;
        write!(
            f,
            "💰 {} active budgets, {} over limit",
            self.active_budgets, self.over_limit
        )
    }
}

pub async fn cmd_watch(
    store: Arc<Store>,
    interval: Duration,
    insights: Option<InsightClient>,
) -> Result<()> {
    println!("👀 Watching for changes (Ctrl+C to stop)");
    watch_until(
        store,
        interval,
        insights,
        |report| println!("{}", report),
        async {
            tokio::signal::ctrl_c().await.ok();
        },
    )
    .await
}

/// Run the watch loop until `shutdown` completes
///
/// `on_report` receives a fresh report whenever expenses or budgets change.
pub async fn watch_until<R, F>(
    store: Arc<Store>,
    interval: Duration,
    insights: Option<InsightClient>,
    on_report: R,
    shutdown: F,
) -> Result<()>
where
    R: Fn(&WatchReport) + Send + Sync + 'static,
    F: Future<Output = ()>,
{
    let on_report = Arc::new(on_report);

    // Either collection changing can move the alert count
    let expense_view = Arc::clone(&store);
    let report = Arc::clone(&on_report);
    let _expenses = store.subscribe_expenses(move |expenses| {
        let budgets = expense_view.load_budgets().unwrap_or_default();
        report(&WatchReport::new(expenses, &budgets));
    });

    let budget_view = Arc::clone(&store);
    let report = Arc::clone(&on_report);
    let _budgets = store.subscribe_budgets(move |budgets| {
        let expenses = budget_view.load_expenses().unwrap_or_default();
        report(&WatchReport::new(&expenses, budgets));
    });

    let sync = spawn_sync_task(Arc::clone(&store), interval);
    let mut events = store.channel().listen();

    let sequencer = Arc::new(RequestSequencer::new());
    let (analysis_tx, mut analysis_rx) = mpsc::unbounded_channel::<SpendingAnalysis>();
    let request_analysis = |insights: &InsightClient| {
        let ticket = sequencer.issue();
        let store = Arc::clone(&store);
        let insights = insights.clone();
        let sequencer = Arc::clone(&sequencer);
        let tx = analysis_tx.clone();
        tokio::spawn(async move {
            let expenses = store.load_expenses().unwrap_or_default();
            let budgets = store.load_budgets().unwrap_or_default();
            let analysis = insights.analyze_spending(&expenses, &budgets).await;
            match sequencer.accept(ticket, analysis) {
                Some(analysis) => {
                    let _ = tx.send(analysis);
                }
                None => debug!(?ticket, "Discarding superseded analysis"),
            }
        });
    };

    if let Some(ref insights) = insights {
        request_analysis(insights);
    }

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            event = events.recv() => match event {
                Ok(event) => {
                    if event.reason == ChangeReason::External {
                        println!("🔄 {} changed in another window", event.collection);
                    }
                    // The digest covers both collections
                    if let Some(ref insights) = insights {
                        request_analysis(insights);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Watcher fell behind on change events");
                }
                Err(RecvError::Closed) => break,
            },
            Some(analysis) = analysis_rx.recv() => print_analysis(&analysis),
        }
    }

    sync.abort();
    println!("👋 Stopped watching");
    Ok(())
}

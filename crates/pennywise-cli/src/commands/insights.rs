//! AI command implementations (insights, status)

use std::path::Path;

use anyhow::{Context, Result};
use pennywise_core::config::default_config_path;
use pennywise_core::{Config, InsightBackend, InsightClient, SpendingAnalysis, Store};

pub async fn cmd_insights(store: &Store, insights: &InsightClient, model: Option<&str>) -> Result<()> {
    let expenses = store.load_expenses().context("Failed to load expenses")?;
    let budgets = store.load_budgets().context("Failed to load budgets")?;

    let client = match (model, insights.backend()) {
        (Some(model), Some(backend)) => InsightClient::new(Some(backend.with_model(model))),
        _ => insights.clone(),
    };

    match client.backend() {
        Some(backend) => println!(
            "🤖 Analyzing {} expenses with {} ({})...",
            expenses.len().min(pennywise_core::insight::MAX_DIGEST_EXPENSES),
            backend.model(),
            backend.kind().as_str()
        ),
        None => println!("💡 Offline mode: set GEMINI_API_KEY to enable AI insights"),
    }

    let analysis = client.analyze_spending(&expenses, &budgets).await;
    print_analysis(&analysis);
    Ok(())
}

pub(crate) fn print_analysis(analysis: &SpendingAnalysis) {
    println!();
    println!("  📝 {}", analysis.summary);
    if !analysis.tips.is_empty() {
        println!();
        for (i, tip) in analysis.tips.iter().enumerate() {
            println!("  {}. {}", i + 1, tip);
        }
    }
    println!();
}

pub async fn cmd_status(
    config: &Config,
    config_path: Option<&Path>,
    insights: &InsightClient,
) -> Result<()> {
    println!();
    println!("📊 Pennywise Status");
    println!("   ─────────────────────────────────────────────────────────────");

    match config_path.map(Path::to_path_buf).or_else(default_config_path) {
        Some(path) if path.exists() => println!("   Config:   {}", path.display()),
        Some(path) => println!("   Config:   {} (not present, using defaults)", path.display()),
        None => println!("   Config:   (no config directory on this platform)"),
    }
    println!("   Database: {}", config.db_path.display());
    println!("   Sync:     every {} ms", config.sync_interval.as_millis());

    println!();
    println!("   AI backend: {}", config.insight.backend.as_str());
    println!("   Model:      {}", config.insight.model_or_default());
    if let Some(host) = config.insight.host_or_default() {
        println!("   Host:       {}", host);
    }
    println!("   Timeout:    {}s", config.insight.timeout.as_secs());

    match insights.backend() {
        None => {
            println!("   ⚠️  Not configured: insights run in offline mode");
            println!("      Set GEMINI_API_KEY, or AI_BACKEND=openai_compatible with OPENAI_COMPATIBLE_HOST");
        }
        Some(backend) => {
            print!("   Checking availability... ");
            if backend.health_check().await {
                println!("✅ Connected");
            } else {
                println!("❌ Unreachable ({})", backend.host());
            }
        }
    }

    println!();
    Ok(())
}

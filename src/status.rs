//! The `status` command: scheduler coverage and recent session history.

use anyhow::Result;
use chrono::DateTime;

use crate::config::Config;
use crate::scheduler;
use crate::store::Store;
use crate::{db, migrate};

pub async fn status(config: &Config) -> Result<()> {
    let pool = db::connect(&config.store.path).await?;
    migrate::run_migrations(&pool).await?;
    let store = Store::new(pool);

    let targets = scheduler::load_targets(&config.targets.path)?;
    let report = scheduler::coverage_report(&store, &targets).await?;

    println!("{}", "=".repeat(50));
    println!("SCRAPE STATUS");
    println!("{}", "=".repeat(50));
    println!(
        "Phase: {}",
        if report.initial_complete {
            "steady-state refresh"
        } else {
            "initial scrape"
        }
    );
    println!(
        "Coverage: {}/{} targets ({:.1}%)",
        report.fetched,
        report.total,
        if report.total > 0 {
            report.fetched as f64 / report.total as f64 * 100.0
        } else {
            0.0
        }
    );
    for tier in &report.tiers {
        println!("  {}: {}/{}", tier.tier, tier.fetched, tier.total);
    }

    let sessions: Vec<(i64, String, i64, i64, i64)> = sqlx::query_as(
        r#"
        SELECT id, status, started_at, targets_completed, players_saved
        FROM scrape_sessions ORDER BY started_at DESC LIMIT 5
        "#,
    )
    .fetch_all(store.pool())
    .await?;

    if !sessions.is_empty() {
        println!("\nRecent sessions:");
        for (id, status, started_at, targets, players) in &sessions {
            let started = DateTime::from_timestamp(*started_at, 0)
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "?".to_string());
            println!("  #{id} {started} [{status}] targets={targets} players={players}");
        }
    }
    Ok(())
}

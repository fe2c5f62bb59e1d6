//! Target scheduling.
//!
//! Runs move through two phases. The initial phase works through the whole
//! directory in tier order, capped per day, until every target has been
//! stored once. Steady state refreshes each target on its tier cadence (D1
//! daily, D2 every two days, D3 every three) with no daily cap.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{info, warn};

use crate::models::{Target, Tier};
use crate::store::Store;

/// Meta key flipped to "true" once every target has been fetched once.
pub const INITIAL_COMPLETE_KEY: &str = "initial_fetch_complete";

/// Refresh cadence in days; targets with an unrecognized tier get the
/// slowest one.
const UNKNOWN_TIER_CADENCE: i64 = 3;

/// Load the target directory CSV. Rows missing a school name or base URL
/// are dropped with a warning rather than failing the run.
pub fn load_targets(path: &Path) -> Result<Vec<Target>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to read targets CSV: {}", path.display()))?;

    let mut targets = Vec::new();
    for (i, row) in reader.deserialize::<Target>().enumerate() {
        let target = match row {
            Ok(t) => t,
            Err(e) => {
                warn!(row = i + 2, error = %e, "skipping malformed target row");
                continue;
            }
        };
        if target.name.trim().is_empty() || target.base_url.trim().is_empty() {
            warn!(row = i + 2, "skipping target row without name or base URL");
            continue;
        }
        targets.push(target);
    }
    info!(count = targets.len(), path = %path.display(), "loaded target directory");
    Ok(targets)
}

/// Pick today's batch. Consults the store for the initial-phase checkpoint
/// and fetch history, and flips the initial-complete flag when the whole
/// directory has been covered.
pub async fn plan_batch(
    store: &Store,
    targets: &[Target],
    max_targets_per_day: usize,
    today: NaiveDate,
) -> Result<Vec<Target>> {
    let initial_done = store.meta_get(INITIAL_COMPLETE_KEY).await?.as_deref() == Some("true");

    if !initial_done {
        let fetched = store.stored_target_names().await?;
        let batch = initial_batch(targets, &fetched, max_targets_per_day);
        if !batch.is_empty() {
            info!(
                batch = batch.len(),
                remaining = targets.len() - fetched.len(),
                "initial phase"
            );
            return Ok(batch);
        }
        store.meta_set(INITIAL_COMPLETE_KEY, "true").await?;
        info!("initial phase complete, switching to steady-state refresh");
    }

    let history = store.fetch_history().await?;
    let batch = steady_batch(targets, &history, today);
    info!(batch = batch.len(), "steady-state refresh");
    Ok(batch)
}

/// Initial phase: never-stored targets, highest tier first, capped.
pub fn initial_batch(
    targets: &[Target],
    fetched: &HashSet<String>,
    cap: usize,
) -> Vec<Target> {
    let mut batch: Vec<Target> = targets
        .iter()
        .filter(|t| !fetched.contains(&t.name))
        .cloned()
        .collect();
    batch.sort_by_key(|t| tier_rank(t));
    batch.truncate(cap);
    batch
}

/// Steady state: targets whose last fetch is at least a cadence old (or
/// missing entirely), highest tier first, uncapped.
pub fn steady_batch(
    targets: &[Target],
    history: &HashMap<String, NaiveDate>,
    today: NaiveDate,
) -> Vec<Target> {
    let mut batch: Vec<Target> = targets
        .iter()
        .filter(|t| match history.get(&t.name) {
            Some(last) => (today - *last).num_days() >= cadence_days(t),
            None => true,
        })
        .cloned()
        .collect();
    batch.sort_by_key(|t| tier_rank(t));
    batch
}

fn tier_rank(target: &Target) -> u8 {
    match target.tier() {
        Some(Tier::D1) => 0,
        Some(Tier::D2) => 1,
        Some(Tier::D3) => 2,
        None => 3,
    }
}

fn cadence_days(target: &Target) -> i64 {
    target
        .tier()
        .map(Tier::refresh_interval_days)
        .unwrap_or(UNKNOWN_TIER_CADENCE)
}

/// Per-tier coverage summary for the status command.
#[derive(Debug)]
pub struct CoverageReport {
    pub initial_complete: bool,
    pub tiers: Vec<TierCoverage>,
    pub total: usize,
    pub fetched: usize,
}

#[derive(Debug)]
pub struct TierCoverage {
    pub tier: String,
    pub total: usize,
    pub fetched: usize,
}

pub async fn coverage_report(store: &Store, targets: &[Target]) -> Result<CoverageReport> {
    let stored = store.stored_target_names().await?;
    let initial_complete = store.meta_get(INITIAL_COMPLETE_KEY).await?.as_deref() == Some("true");

    let mut order: Vec<String> = Vec::new();
    let mut by_tier: HashMap<String, TierCoverage> = HashMap::new();
    for target in targets {
        let tier = if target.tier().is_some() {
            target.tier.trim().to_string()
        } else {
            "unknown".to_string()
        };
        let entry = by_tier.entry(tier.clone()).or_insert_with(|| {
            order.push(tier.clone());
            TierCoverage {
                tier,
                total: 0,
                fetched: 0,
            }
        });
        entry.total += 1;
        if stored.contains(&target.name) {
            entry.fetched += 1;
        }
    }

    let mut tiers: Vec<TierCoverage> = order
        .into_iter()
        .filter_map(|t| by_tier.remove(&t))
        .collect();
    tiers.sort_by(|a, b| a.tier.cmp(&b.tier));

    let fetched = targets.iter().filter(|t| stored.contains(&t.name)).count();
    Ok(CoverageReport {
        initial_complete,
        tiers,
        total: targets.len(),
        fetched,
    })
}

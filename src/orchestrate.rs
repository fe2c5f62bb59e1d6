//! Per-target scrape orchestration and the top-level run loop.
//!
//! Each target walks an ordered list of candidate roster paths, adapts to
//! related-domain redirects, falls back to URL discovery, then repeats the
//! search for stats and merges the two by player name. Targets are processed
//! sequentially; per-target failures are accumulated, never raised.

use anyhow::Result;
use chrono::{Local, NaiveDate};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use url::Url;

use crate::client::{DelayClass, FetchError, FetchedPage, ProtectedClient};
use crate::config::Config;
use crate::discovery;
use crate::extract;
use crate::models::{BattingMap, PitchingMap, PlayerRecord, ScrapeOutcome, Target};
use crate::render::Renderer;
use crate::scheduler;
use crate::store::Store;
use crate::{db, migrate};

/// Platform-standard roster paths, then alternate-platform patterns.
const ROSTER_PATHS: &[&str] = &[
    "/sports/baseball/roster",
    "/sports/baseball/roster/2026",
    "/sport/m-basebl/roster",
    "/sports/bsb/roster",
    "/sports/mens-baseball/roster",
    "/teams/baseball/roster",
    "/roster.aspx?path=baseball",
    "/athletics/baseball/roster",
    "/baseball/roster/",
];

const STATS_PATHS: &[&str] = &[
    "/sports/baseball/stats",
    "/sports/baseball/stats/2026",
    "/sport/m-basebl/stats",
    "/sports/bsb/stats",
    "/sports/mens-baseball/stats",
    "/teams/baseball/stats",
    "/teamstats.aspx?path=baseball",
    "/athletics/baseball/stats",
    "/baseball/stats/",
];

/// API endpoints serving season stats to client-rendered pages.
const API_STATS_PATHS: &[&str] = &[
    "/services/responsive-calendar.ashx?type=stats&sport=baseball&year=2026",
    "/services/responsive-calendar.ashx?type=stats&sport=baseball",
    "/api/stats/baseball",
];

/// Progress is logged every this many targets.
const PROGRESS_INTERVAL: usize = 5;

/// Override first, then the fixed list, order-preserving dedup.
fn candidate_paths(override_path: Option<&str>, defaults: &[&str]) -> Vec<String> {
    let mut paths: Vec<String> = Vec::new();
    if let Some(p) = override_path {
        let p = p.trim();
        if !p.is_empty() {
            paths.push(p.to_string());
        }
    }
    for p in defaults {
        if !paths.iter().any(|existing| existing == p) {
            paths.push(p.to_string());
        }
    }
    paths
}

fn resolve_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        path.to_string()
    } else {
        format!("{base}{path}")
    }
}

fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
}

/// scheme://host of a URL, for adopting a redirect target as the new base.
fn base_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    Some(format!("{}://{}", parsed.scheme(), parsed.host_str()?))
}

/// A redirect landing on a path this short is the site homepage, the usual
/// response to an invalid path.
fn is_homepage_url(url: &str) -> bool {
    Url::parse(url)
        .map(|u| u.path().trim_matches('/').len() < 5)
        .unwrap_or(false)
}

/// Scrape one target end to end: roster candidates, discovery fallback,
/// stats candidates, stats cascade, name-keyed merge.
pub async fn scrape_target(client: &mut ProtectedClient, target: &Target) -> ScrapeOutcome {
    let mut outcome = ScrapeOutcome::for_target(target);
    let base_url = target.base_url.trim_end_matches('/').to_string();
    if base_url.is_empty() {
        outcome.errors.push(format!("No athletics URL for {}", target.name));
        return outcome;
    }
    let Some(base_host) = host_of(&base_url) else {
        outcome
            .errors
            .push(format!("Unparseable athletics URL: {base_url}"));
        return outcome;
    };

    info!(target = %target.name, tier = %target.tier, "scraping");

    let roster_candidates = candidate_paths(target.roster_path.as_deref(), ROSTER_PATHS);
    let mut stats_candidates = candidate_paths(target.stats_path.as_deref(), STATS_PATHS);

    // Redirects to a related domain move the base for everything after.
    let mut effective_base = base_url.clone();
    let mut roster_page: Option<FetchedPage> = None;
    let mut roster_url: Option<String> = None;
    let mut first_request = true;

    for path in &roster_candidates {
        let url = resolve_url(&effective_base, path);
        let class = if first_request {
            DelayClass::TargetSwitch
        } else {
            DelayClass::Request
        };
        first_request = false;

        match client.get(&url, class, None).await {
            Ok(page) => {
                let Some(final_host) = host_of(&page.final_url) else {
                    continue;
                };
                if final_host != base_host {
                    if !discovery::is_related_domain(&final_host, &base_host) {
                        info!(target = %target.name, %final_host, "redirected to unrelated domain");
                        break;
                    }
                    if let Some(new_base) = base_of(&page.final_url) {
                        info!(target = %target.name, %new_base, "following related-domain redirect");
                        effective_base = new_base;
                    }
                    if is_homepage_url(&page.final_url) {
                        continue;
                    }
                } else if is_homepage_url(&page.final_url) {
                    continue;
                }
                roster_url = Some(url);
                roster_page = Some(page);
                break;
            }
            Err(e) if e.is_host_level() => {
                info!(target = %target.name, error = %e, "host-level failure, abandoning remaining roster paths");
                outcome.errors.push(format!("{}: {e}", target.name));
                break;
            }
            Err(_) => continue,
        }
    }

    // Every path 404'd but the host is up: crawl for the real URLs once.
    if roster_page.is_none()
        && matches!(client.last_failure(), Some(FetchError::NotFound(_)))
    {
        if let Some(found) = discovery::discover_baseball_urls(client, &base_url).await {
            if let Ok(page) = client
                .get(&found.roster_url, DelayClass::Request, None)
                .await
            {
                roster_url = Some(found.roster_url);
                roster_page = Some(page);
            }
            if let Some(stats_url) = found.stats_url {
                if !stats_candidates.contains(&stats_url) {
                    stats_candidates.insert(0, stats_url);
                }
            }
        }
    }

    let Some(page) = roster_page else {
        outcome
            .errors
            .push(format!("Failed to fetch roster from {base_url}"));
        return outcome;
    };

    let roster = extract::parse_roster(&page.body);
    info!(target = %target.name, players = roster.len(), "roster parsed");
    if roster.is_empty() {
        outcome
            .errors
            .push("No players parsed from roster page".to_string());
        outcome.parsed_zero_players = true;
        return outcome;
    }

    let stats_page =
        fetch_stats_page(client, &effective_base, &base_url, &stats_candidates, roster_url.as_deref()).await;

    let (batting, pitching) = match &stats_page {
        Some(page) => {
            let (batting, pitching) = stats_cascade(&page.body);
            info!(
                target = %target.name,
                batting = batting.len(),
                pitching = pitching.len(),
                "stats parsed"
            );
            (batting, pitching)
        }
        None => {
            outcome.errors.push(format!(
                "Failed to fetch stats from {base_url} (tried {} paths)",
                stats_candidates.len()
            ));
            (BattingMap::new(), PitchingMap::new())
        }
    };

    let (batting, pitching) = if batting.is_empty() && pitching.is_empty() {
        api_stats(client, &effective_base, roster_url.as_deref()).await
    } else {
        (batting, pitching)
    };

    outcome.players = merge_stats(roster, batting, pitching);
    outcome.success = !outcome.players.is_empty();
    outcome
}

async fn fetch_stats_page(
    client: &mut ProtectedClient,
    effective_base: &str,
    original_base: &str,
    candidates: &[String],
    referer: Option<&str>,
) -> Option<FetchedPage> {
    for path in candidates {
        let url = resolve_url(effective_base, path);
        match client.get(&url, DelayClass::SameTargetPage, referer).await {
            Ok(page) => {
                let final_url = page.final_url.trim_end_matches('/');
                if final_url == effective_base.trim_end_matches('/')
                    || final_url == original_base.trim_end_matches('/')
                    || is_homepage_url(&page.final_url)
                {
                    continue;
                }
                return Some(page);
            }
            Err(e) if e.is_host_level() => {
                info!(error = %e, "host-level failure, abandoning remaining stats paths");
                return None;
            }
            Err(_) => continue,
        }
    }
    None
}

/// Payload first, then HTML tables (labeled and generic passes are internal
/// to the table parsers).
fn stats_cascade(html: &str) -> (BattingMap, PitchingMap) {
    let (mut batting, mut pitching) = extract::parse_payload_stats(html);
    if batting.is_empty() {
        batting = extract::parse_batting_stats(html);
    }
    if pitching.is_empty() {
        pitching = extract::parse_pitching_stats(html);
    }
    (batting, pitching)
}

/// Last-resort stats source for client-rendered sites: fixed API endpoints
/// returning either the raw payload graph as JSON or a page embedding it.
async fn api_stats(
    client: &mut ProtectedClient,
    base: &str,
    referer: Option<&str>,
) -> (BattingMap, PitchingMap) {
    for path in API_STATS_PATHS {
        let url = resolve_url(base, path);
        let page = match client.get(&url, DelayClass::SameTargetPage, referer).await {
            Ok(page) => page,
            Err(e) if e.is_host_level() => break,
            Err(_) => continue,
        };

        if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(&page.body) {
            let (batting, pitching) = extract::stats_from_payload(&items);
            if !batting.is_empty() || !pitching.is_empty() {
                info!(url, "stats recovered from api endpoint");
                return (batting, pitching);
            }
        }
        let (batting, pitching) = extract::parse_payload_stats(&page.body);
        if !batting.is_empty() || !pitching.is_empty() {
            info!(url, "stats recovered from api endpoint payload");
            return (batting, pitching);
        }
    }
    (BattingMap::new(), PitchingMap::new())
}

/// Attach stat blocks to roster players by name; stat names with no roster
/// match become minimal appended records (stats pages track recently
/// departed players the roster no longer lists).
fn merge_stats(
    roster: Vec<PlayerRecord>,
    mut batting: BattingMap,
    mut pitching: PitchingMap,
) -> Vec<PlayerRecord> {
    let mut players = roster;
    for player in &mut players {
        if let Some(b) = batting.remove(&player.name) {
            player.batting = Some(b);
        }
        if let Some(p) = pitching.remove(&player.name) {
            player.pitching = Some(p);
        }
    }

    let mut batting_only: Vec<_> = batting.into_iter().collect();
    batting_only.sort_by(|a, b| a.0.cmp(&b.0));
    for (name, stats) in batting_only {
        let mut record = PlayerRecord::named(&name);
        record.batting = Some(stats);
        record.pitching = pitching.remove(&name);
        players.push(record);
    }

    let mut pitching_only: Vec<_> = pitching.into_iter().collect();
    pitching_only.sort_by(|a, b| a.0.cmp(&b.0));
    for (name, stats) in pitching_only {
        let mut record = PlayerRecord::named(name);
        record.pitching = Some(stats);
        players.push(record);
    }
    players
}

/// Browser-render retry for a reachable target that parsed to zero players.
async fn render_target(renderer: &mut Renderer, target: &Target) -> Result<ScrapeOutcome> {
    let mut outcome = ScrapeOutcome::for_target(target);
    let base = target.base_url.trim_end_matches('/');
    let roster_path = candidate_paths(target.roster_path.as_deref(), ROSTER_PATHS)
        .into_iter()
        .next()
        .unwrap_or_else(|| ROSTER_PATHS[0].to_string());
    let roster_url = resolve_url(base, &roster_path);

    let roster_html = renderer.fetch_html(&roster_url).await?;
    let roster = extract::parse_roster(&roster_html);
    if roster.is_empty() {
        outcome
            .errors
            .push("No players parsed from rendered roster".to_string());
        return Ok(outcome);
    }

    let stats_path = candidate_paths(target.stats_path.as_deref(), STATS_PATHS)
        .into_iter()
        .next()
        .unwrap_or_else(|| STATS_PATHS[0].to_string());
    let stats_url = resolve_url(base, &stats_path);
    let (batting, pitching) = match renderer.fetch_html(&stats_url).await {
        Ok(html) => stats_cascade(&html),
        Err(e) => {
            outcome.errors.push(format!("Rendered stats fetch: {e}"));
            (BattingMap::new(), PitchingMap::new())
        }
    };

    outcome.players = merge_stats(roster, batting, pitching);
    outcome.success = !outcome.players.is_empty();
    Ok(outcome)
}

fn arm_interrupt() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let armed = flag.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current target");
            armed.store(true, Ordering::SeqCst);
        }
    });
    flag
}

fn season_open(season_start: NaiveDate, today: NaiveDate) -> bool {
    today >= season_start
}

/// The `run` command: plan today's batch, scrape it, retry zero-player
/// targets through the renderer, close the session.
pub async fn run(config: &Config, force: bool, dry_run: bool) -> Result<()> {
    let today = Local::now().date_naive();
    if !season_open(config.schedule.season_start, today) {
        if !force {
            let days_until = (config.schedule.season_start - today).num_days();
            warn!(
                season_start = %config.schedule.season_start,
                days_until,
                "season has not started; use --force to scrape anyway"
            );
            return Ok(());
        }
        warn!("force flag set, scraping outside the season window");
    }

    let pool = db::connect(&config.store.path).await?;
    migrate::run_migrations(&pool).await?;
    let store = Store::new(pool);

    let targets = scheduler::load_targets(&config.targets.path)?;
    let batch = scheduler::plan_batch(
        &store,
        &targets,
        config.schedule.max_targets_per_day,
        today,
    )
    .await?;
    if batch.is_empty() {
        info!("no targets need scraping today");
        return Ok(());
    }

    if dry_run {
        info!(count = batch.len(), "dry run, would scrape:");
        for target in batch.iter().take(20) {
            info!("  {} ({})", target.name, target.tier);
        }
        if batch.len() > 20 {
            info!("  ... and {} more", batch.len() - 20);
        }
        return Ok(());
    }

    process_batch(
        &store,
        config,
        &batch,
        Some(config.schedule.max_targets_per_day),
        today,
    )
    .await
}

/// The `recover` command: re-attempt every target absent from the store.
pub async fn recover(config: &Config, dry_run: bool) -> Result<()> {
    let pool = db::connect(&config.store.path).await?;
    migrate::run_migrations(&pool).await?;
    let store = Store::new(pool);

    let targets = scheduler::load_targets(&config.targets.path)?;
    let stored = store.stored_target_names().await?;
    let failed: Vec<Target> = targets
        .into_iter()
        .filter(|t| !stored.contains(&t.name))
        .collect();

    if failed.is_empty() {
        info!("nothing to recover, every target is in the store");
        return Ok(());
    }
    info!(count = failed.len(), "recovery: targets absent from the store");

    if dry_run {
        for target in failed.iter().take(30) {
            info!("  {} ({}) - {}", target.name, target.tier, target.base_url);
        }
        if failed.len() > 30 {
            info!("  ... and {} more", failed.len() - 30);
        }
        return Ok(());
    }

    let today = Local::now().date_naive();
    process_batch(&store, config, &failed, None, today).await
}

async fn process_batch(
    store: &Store,
    config: &Config,
    batch: &[Target],
    daily_cap: Option<usize>,
    today: NaiveDate,
) -> Result<()> {
    let mut client = ProtectedClient::new(
        config.delays.clone(),
        config.limits.clone(),
        config.errors.clone(),
    )?;
    let session_id = store.session_start().await?;
    let interrupted = arm_interrupt();
    let run_start = Instant::now();

    let mut targets_completed = 0u32;
    let mut players_saved = 0u32;
    let mut errors: Vec<String> = Vec::new();
    let mut render_retry: Vec<Target> = Vec::new();

    for (i, target) in batch.iter().enumerate() {
        if interrupted.load(Ordering::SeqCst) {
            break;
        }
        if let Some(cap) = daily_cap {
            if targets_completed as usize >= cap {
                info!(cap, "daily target cap reached");
                break;
            }
        }

        let outcome = scrape_target(&mut client, target).await;
        if outcome.success {
            match save_and_mark(store, &outcome, today).await {
                Ok(saved) => {
                    targets_completed += 1;
                    players_saved += saved;
                }
                Err(e) => {
                    error!(target = %target.name, error = %e, "save failed");
                    errors.push(format!("{}: {e}", target.name));
                }
            }
        } else if outcome.parsed_zero_players {
            render_retry.push(target.clone());
        }
        errors.extend(outcome.errors);

        if (i + 1) % PROGRESS_INTERVAL == 0 {
            info!(
                processed = i + 1,
                of = batch.len(),
                saved = targets_completed,
                players = players_saved,
                elapsed_mins = run_start.elapsed().as_secs() / 60,
                hour_requests = client.hour_requests(),
                "progress"
            );
        }
    }

    if !render_retry.is_empty() && !interrupted.load(Ordering::SeqCst) {
        render_retry.truncate(config.browser.max_targets_per_run);
        info!(count = render_retry.len(), "browser retry pass");
        let mut renderer = Renderer::new(config.browser.clone());
        for target in &render_retry {
            if interrupted.load(Ordering::SeqCst) {
                break;
            }
            match render_target(&mut renderer, target).await {
                Ok(outcome) if outcome.success => match save_and_mark(store, &outcome, today).await
                {
                    Ok(saved) => {
                        targets_completed += 1;
                        players_saved += saved;
                        info!(target = %target.name, players = saved, "browser recovered");
                    }
                    Err(e) => errors.push(format!("{}: {e}", target.name)),
                },
                Ok(outcome) => errors.extend(outcome.errors),
                Err(e) => {
                    warn!(target = %target.name, error = %e, "browser retry failed");
                    errors.push(format!("{}: {e}", target.name));
                }
            }
        }
        renderer.shutdown().await;
    }

    store
        .session_end(
            session_id,
            targets_completed,
            players_saved,
            &errors,
            targets_completed > 0,
        )
        .await?;

    info!(
        targets = targets_completed,
        players = players_saved,
        elapsed_mins = run_start.elapsed().as_secs() / 60,
        total_requests = client.total_requests(),
        "session complete"
    );
    Ok(())
}

async fn save_and_mark(store: &Store, outcome: &ScrapeOutcome, today: NaiveDate) -> Result<u32> {
    let saved = store.save_outcome(outcome).await?;
    store.mark_fetched(&outcome.target_name, today).await?;
    Ok(saved)
}

/// The `diagnostic` command: scrape a fixed sample of targets covering the
/// known platform variants, print what each yields, persist nothing.
pub async fn diagnostic(config: &Config) -> Result<()> {
    let samples = [
        Target {
            name: "Louisville".into(),
            tier: "D1".into(),
            conference: "ACC".into(),
            base_url: "https://gocards.com".into(),
            roster_path: Some("/sports/baseball/roster".into()),
            stats_path: Some("/sports/baseball/stats".into()),
        },
        Target {
            name: "Arizona St.".into(),
            tier: "D1".into(),
            conference: "Big 12".into(),
            base_url: "https://thesundevils.com".into(),
            roster_path: Some("/sports/baseball/roster".into()),
            stats_path: Some("/sports/baseball/stats".into()),
        },
        Target {
            name: "Cincinnati".into(),
            tier: "D1".into(),
            conference: "Big 12".into(),
            base_url: "https://gobearcats.com".into(),
            roster_path: Some("/sports/baseball/roster".into()),
            stats_path: Some("/sports/baseball/stats".into()),
        },
        Target {
            name: "Arkansas".into(),
            tier: "D1".into(),
            conference: "SEC".into(),
            base_url: "https://arkansasrazorbacks.com".into(),
            roster_path: Some("/sport/m-basebl/roster/".into()),
            stats_path: Some(
                "https://arkansasrazorbacks.com/stats/baseball/2026/teamcume.htm".into(),
            ),
        },
        Target {
            name: "Jackson St.".into(),
            tier: "D1".into(),
            conference: "SWAC".into(),
            base_url: "https://gojsutigers.com".into(),
            roster_path: Some("/sports/baseball/roster".into()),
            stats_path: Some("/sports/baseball/stats".into()),
        },
        Target {
            name: "Clemson".into(),
            tier: "D1".into(),
            conference: "ACC".into(),
            base_url: "https://clemsontigers.com".into(),
            roster_path: Some("/sports/baseball/roster".into()),
            stats_path: Some(
                "https://data.clemsontigers.com/Stats/Baseball/2026/teamcume.htm".into(),
            ),
        },
        Target {
            name: "Chapman".into(),
            tier: "D3".into(),
            conference: "SCIAC".into(),
            base_url: "https://chapmanathletics.com".into(),
            roster_path: Some("/sports/baseball/roster".into()),
            stats_path: Some("/sports/baseball/stats".into()),
        },
    ];

    let mut client = ProtectedClient::new(
        config.delays.clone(),
        config.limits.clone(),
        config.errors.clone(),
    )?;

    println!("{}", "=".repeat(60));
    println!("DIAGNOSTIC MODE - testing {} targets", samples.len());
    println!("{}", "=".repeat(60));

    for target in &samples {
        let outcome = scrape_target(&mut client, target).await;

        println!("\n--- {} ({}) ---", target.name, target.tier);
        println!("Success: {}", outcome.success);
        println!("Players: {}", outcome.players.len());
        if !outcome.errors.is_empty() {
            println!("Errors: {:?}", outcome.errors);
        }
        for player in outcome.players.iter().take(3) {
            println!(
                "  - {} - {} ({})",
                player.name,
                player.position.as_deref().unwrap_or("N/A"),
                player.class_year.as_deref().unwrap_or("N/A"),
            );
            if let Some(b) = &player.batting {
                println!(
                    "    Batting: {:?} AVG, {} HR, XBH:K={:?}",
                    b.batting_average,
                    b.home_runs.unwrap_or(0),
                    b.xbh_to_k,
                );
            }
            if let Some(p) = &player.pitching {
                println!(
                    "    Pitching: {:?} ERA, K/9={:?}, BB/9={:?}",
                    p.era, p.k_per_9, p.bb_per_9,
                );
            }
        }
    }

    println!("\n{}", "=".repeat(60));
    println!("DIAGNOSTIC COMPLETE");
    println!("{}", "=".repeat(60));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BattingStats, PitchingStats};

    #[test]
    fn override_path_comes_first_and_dedups() {
        let paths = candidate_paths(Some("/sports/baseball/roster"), ROSTER_PATHS);
        assert_eq!(paths[0], "/sports/baseball/roster");
        assert_eq!(paths.len(), ROSTER_PATHS.len());

        let paths = candidate_paths(Some("/custom/roster"), ROSTER_PATHS);
        assert_eq!(paths[0], "/custom/roster");
        assert_eq!(paths.len(), ROSTER_PATHS.len() + 1);

        let paths = candidate_paths(None, ROSTER_PATHS);
        assert_eq!(paths.len(), ROSTER_PATHS.len());
    }

    #[test]
    fn absolute_override_urls_pass_through() {
        assert_eq!(
            resolve_url("https://a.example.edu", "https://stats.example.edu/x.htm"),
            "https://stats.example.edu/x.htm"
        );
        assert_eq!(
            resolve_url("https://a.example.edu", "/sports/baseball/roster"),
            "https://a.example.edu/sports/baseball/roster"
        );
    }

    #[test]
    fn short_paths_read_as_homepage_redirects() {
        assert!(is_homepage_url("https://a.example.edu/"));
        assert!(is_homepage_url("https://a.example.edu/en"));
        assert!(!is_homepage_url("https://a.example.edu/sports/baseball/roster"));
    }

    #[test]
    fn merge_attaches_stats_and_appends_extras() {
        let roster = vec![PlayerRecord::named("Jane Doe"), PlayerRecord::named("Sam Lee")];
        let mut batting = BattingMap::new();
        batting.insert(
            "Jane Doe".to_string(),
            BattingStats {
                hits: Some(20),
                ..Default::default()
            },
        );
        batting.insert(
            "Gone Player".to_string(),
            BattingStats {
                hits: Some(5),
                ..Default::default()
            },
        );
        let mut pitching = PitchingMap::new();
        pitching.insert(
            "Gone Player".to_string(),
            PitchingStats {
                wins: Some(1),
                ..Default::default()
            },
        );
        pitching.insert(
            "Reliever Only".to_string(),
            PitchingStats {
                saves: Some(4),
                ..Default::default()
            },
        );

        let players = merge_stats(roster, batting, pitching);
        assert_eq!(players.len(), 4);
        assert_eq!(players[0].batting.as_ref().unwrap().hits, Some(20));
        assert!(players[1].batting.is_none());

        let gone = players.iter().find(|p| p.name == "Gone Player").unwrap();
        assert_eq!(gone.batting.as_ref().unwrap().hits, Some(5));
        assert_eq!(gone.pitching.as_ref().unwrap().wins, Some(1));

        let reliever = players.iter().find(|p| p.name == "Reliever Only").unwrap();
        assert!(reliever.batting.is_none());
        assert_eq!(reliever.pitching.as_ref().unwrap().saves, Some(4));
    }

    #[test]
    fn season_gate() {
        let start = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        assert!(!season_open(start, NaiveDate::from_ymd_opt(2026, 1, 31).unwrap()));
        assert!(season_open(start, start));
        assert!(season_open(start, NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()));
    }
}

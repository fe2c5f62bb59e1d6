//! Persistence gateway. All writes are idempotent upserts: organizations
//! key on a stable derived id, players on (first name, last name, org), and
//! stat rows replace in full on conflict, so re-running a scrape converges
//! instead of duplicating.

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use tracing::{error, info};

use crate::models::{is_stat_like_name, BattingStats, PitchingStats, PlayerRecord, ScrapeOutcome};

/// Season stamped onto stat rows.
pub const SEASON: i64 = 2026;

/// Sessions keep at most this many error strings.
const SESSION_ERROR_CAP: usize = 50;

pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub fn new(pool: SqlitePool) -> Self {
        Store { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Upsert an organization and return its stable id. The id is derived
    /// from (name, tier), so the same school always lands on the same row
    /// across runs and rebuilt databases.
    pub async fn upsert_organization(
        &self,
        name: &str,
        tier: &str,
        conference: &str,
    ) -> Result<i64> {
        let id = derive_org_id(name, tier);
        let now = Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO organizations (id, name, tier, conference, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                conference = excluded.conference,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(tier)
        .bind(conference)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    /// Upsert a player under an organization. Returns None (and writes
    /// nothing) when the record's name is empty or reads as a misaligned
    /// stat value. Existing rows only take non-empty field updates.
    pub async fn upsert_player(&self, org_id: i64, record: &PlayerRecord) -> Result<Option<i64>> {
        let (first_name, last_name) = split_name(&record.name);
        if first_name.is_empty() || is_stat_like_name(&first_name) {
            return Ok(None);
        }

        let position = record.position.as_deref().and_then(normalize_position);
        let class_year = record.class_year.as_deref().and_then(normalize_class_year);
        let height = record.height.as_deref().and_then(parse_height);
        let weight = record.weight.as_deref().and_then(parse_weight);
        let (bats, throws) = record
            .bats_throws
            .as_deref()
            .map(split_bats_throws)
            .unwrap_or((None, None));
        let hometown = non_empty(record.hometown.as_deref());
        let previous_school = non_empty(record.previous_school.as_deref());
        let jersey_number = non_empty(record.jersey_number.as_deref());
        let now = Utc::now().timestamp();

        let existing: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM players WHERE first_name = ? AND last_name = ? AND org_id = ?",
        )
        .bind(&first_name)
        .bind(&last_name)
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(player_id) = existing {
            sqlx::query(
                r#"
                UPDATE players SET
                    jersey_number = COALESCE(?, jersey_number),
                    position = COALESCE(?, position),
                    class_year = COALESCE(?, class_year),
                    height_inches = COALESCE(?, height_inches),
                    weight_lbs = COALESCE(?, weight_lbs),
                    bats = COALESCE(?, bats),
                    throws = COALESCE(?, throws),
                    hometown = COALESCE(?, hometown),
                    previous_school = COALESCE(?, previous_school),
                    updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&jersey_number)
            .bind(&position)
            .bind(&class_year)
            .bind(height)
            .bind(weight)
            .bind(&bats)
            .bind(&throws)
            .bind(&hometown)
            .bind(&previous_school)
            .bind(now)
            .bind(player_id)
            .execute(&self.pool)
            .await?;
            return Ok(Some(player_id));
        }

        let player_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO players (org_id, first_name, last_name, jersey_number, position,
                class_year, height_inches, weight_lbs, bats, throws, hometown,
                previous_school, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(org_id)
        .bind(&first_name)
        .bind(&last_name)
        .bind(&jersey_number)
        .bind(&position)
        .bind(&class_year)
        .bind(height)
        .bind(weight)
        .bind(&bats)
        .bind(&throws)
        .bind(&hometown)
        .bind(&previous_school)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(Some(player_id))
    }

    pub async fn upsert_batting(&self, player_id: i64, stats: &BattingStats) -> Result<()> {
        let now = Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO batting_stats (player_id, season,
                g, ab, r, h, doubles, triples, hr, rbi, bb, k,
                sb, cs, hbp, sf, sh, gidp, tb,
                avg, obp, slg, ops, xbh, xbh_to_k,
                created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(player_id) DO UPDATE SET
                season = excluded.season,
                g = excluded.g, ab = excluded.ab, r = excluded.r, h = excluded.h,
                doubles = excluded.doubles, triples = excluded.triples,
                hr = excluded.hr, rbi = excluded.rbi, bb = excluded.bb, k = excluded.k,
                sb = excluded.sb, cs = excluded.cs, hbp = excluded.hbp,
                sf = excluded.sf, sh = excluded.sh, gidp = excluded.gidp,
                tb = excluded.tb,
                avg = excluded.avg, obp = excluded.obp, slg = excluded.slg,
                ops = excluded.ops, xbh = excluded.xbh, xbh_to_k = excluded.xbh_to_k,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(player_id)
        .bind(SEASON)
        .bind(stats.games.unwrap_or(0))
        .bind(stats.at_bats.unwrap_or(0))
        .bind(stats.runs.unwrap_or(0))
        .bind(stats.hits.unwrap_or(0))
        .bind(stats.doubles.unwrap_or(0))
        .bind(stats.triples.unwrap_or(0))
        .bind(stats.home_runs.unwrap_or(0))
        .bind(stats.rbi.unwrap_or(0))
        .bind(stats.walks.unwrap_or(0))
        .bind(stats.strikeouts.unwrap_or(0))
        .bind(stats.stolen_bases.unwrap_or(0))
        .bind(stats.caught_stealing.unwrap_or(0))
        .bind(stats.hit_by_pitch.unwrap_or(0))
        .bind(stats.sacrifice_flies.unwrap_or(0))
        .bind(stats.sacrifice_hits.unwrap_or(0))
        .bind(stats.grounded_into_dp.unwrap_or(0))
        .bind(stats.total_bases.unwrap_or(0))
        .bind(stats.batting_average)
        .bind(stats.on_base_percentage)
        .bind(stats.slugging_percentage)
        .bind(stats.ops)
        .bind(stats.extra_base_hits)
        .bind(stats.xbh_to_k)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_pitching(&self, player_id: i64, stats: &PitchingStats) -> Result<()> {
        let now = Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO pitching_stats (player_id, season,
                app, gs, w, l, sv, cg, sho,
                ip, h, r, er, bb, k, hr_allowed, hb, wp, bk,
                era, whip, k_per_9, bb_per_9, k_to_bb,
                created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(player_id) DO UPDATE SET
                season = excluded.season,
                app = excluded.app, gs = excluded.gs, w = excluded.w,
                l = excluded.l, sv = excluded.sv, cg = excluded.cg,
                sho = excluded.sho, ip = excluded.ip, h = excluded.h,
                r = excluded.r, er = excluded.er, bb = excluded.bb,
                k = excluded.k, hr_allowed = excluded.hr_allowed,
                hb = excluded.hb, wp = excluded.wp, bk = excluded.bk,
                era = excluded.era, whip = excluded.whip,
                k_per_9 = excluded.k_per_9, bb_per_9 = excluded.bb_per_9,
                k_to_bb = excluded.k_to_bb,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(player_id)
        .bind(SEASON)
        .bind(stats.appearances.unwrap_or(0))
        .bind(stats.games_started.unwrap_or(0))
        .bind(stats.wins.unwrap_or(0))
        .bind(stats.losses.unwrap_or(0))
        .bind(stats.saves.unwrap_or(0))
        .bind(stats.complete_games.unwrap_or(0))
        .bind(stats.shutouts.unwrap_or(0))
        .bind(stats.innings_pitched.unwrap_or(0.0))
        .bind(stats.hits_allowed.unwrap_or(0))
        .bind(stats.runs_allowed.unwrap_or(0))
        .bind(stats.earned_runs.unwrap_or(0))
        .bind(stats.walks.unwrap_or(0))
        .bind(stats.strikeouts.unwrap_or(0))
        .bind(stats.home_runs_allowed.unwrap_or(0))
        .bind(stats.hit_batters.unwrap_or(0))
        .bind(stats.wild_pitches.unwrap_or(0))
        .bind(stats.balks.unwrap_or(0))
        .bind(stats.era)
        .bind(stats.whip)
        .bind(stats.k_per_9)
        .bind(stats.bb_per_9)
        .bind(stats.k_to_bb)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Save one target's scrape outcome. Per-player failures are logged and
    /// skipped so one bad row never loses the rest of a roster.
    pub async fn save_outcome(&self, outcome: &ScrapeOutcome) -> Result<u32> {
        let org_id = self
            .upsert_organization(&outcome.target_name, &outcome.tier, &outcome.conference)
            .await?;

        let mut players_saved = 0u32;
        for player in &outcome.players {
            match self.save_player(org_id, player).await {
                Ok(true) => players_saved += 1,
                Ok(false) => {}
                Err(e) => error!(player = %player.name, error = %e, "failed to save player"),
            }
        }
        info!(
            target = %outcome.target_name,
            players_saved,
            "saved scrape outcome"
        );
        Ok(players_saved)
    }

    async fn save_player(&self, org_id: i64, player: &PlayerRecord) -> Result<bool> {
        let Some(player_id) = self.upsert_player(org_id, player).await? else {
            return Ok(false);
        };
        if let Some(batting) = &player.batting {
            if !batting.is_empty() {
                self.upsert_batting(player_id, batting).await?;
            }
        }
        if let Some(pitching) = &player.pitching {
            if !pitching.is_empty() {
                self.upsert_pitching(player_id, pitching).await?;
            }
        }
        Ok(true)
    }

    pub async fn session_start(&self) -> Result<i64> {
        let now = Utc::now().timestamp();
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO scrape_sessions (status, started_at) VALUES ('RUNNING', ?) RETURNING id",
        )
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn session_end(
        &self,
        session_id: i64,
        targets_completed: u32,
        players_saved: u32,
        errors: &[String],
        success: bool,
    ) -> Result<()> {
        let status = if success { "COMPLETED" } else { "FAILED" };
        let capped: Vec<&String> = errors.iter().take(SESSION_ERROR_CAP).collect();
        let errors_json = serde_json::to_string(&capped)?;
        let now = Utc::now().timestamp();
        sqlx::query(
            r#"
            UPDATE scrape_sessions SET
                status = ?, completed_at = ?, targets_completed = ?,
                players_saved = ?, errors_json = ?
            WHERE id = ?
            "#,
        )
        .bind(status)
        .bind(now)
        .bind(targets_completed)
        .bind(players_saved)
        .bind(errors_json)
        .bind(session_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Names of organizations already present in the store. Used as the
    /// initial-phase checkpoint and by recovery mode.
    pub async fn stored_target_names(&self) -> Result<HashSet<String>> {
        let names: Vec<String> = sqlx::query_scalar("SELECT name FROM organizations")
            .fetch_all(&self.pool)
            .await?;
        Ok(names.into_iter().collect())
    }

    pub async fn fetch_history(&self) -> Result<HashMap<String, NaiveDate>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT target_name, last_fetched FROM fetch_history")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows
            .into_iter()
            .filter_map(|(name, date)| {
                NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                    .ok()
                    .map(|d| (name, d))
            })
            .collect())
    }

    pub async fn mark_fetched(&self, target_name: &str, day: NaiveDate) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO fetch_history (target_name, last_fetched) VALUES (?, ?)
            ON CONFLICT(target_name) DO UPDATE SET last_fetched = excluded.last_fetched
            "#,
        )
        .bind(target_name)
        .bind(day.format("%Y-%m-%d").to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn meta_get(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM meta WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    pub async fn meta_set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO meta (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Delete players whose stored name is actually a stat value that
    /// slipped past earlier parser versions (or is entirely empty), along
    /// with their stat rows. Returns the number of players removed.
    pub async fn delete_invalid_players(&self) -> Result<u64> {
        let rows: Vec<(i64, String, String)> =
            sqlx::query_as("SELECT id, first_name, last_name FROM players")
                .fetch_all(&self.pool)
                .await?;
        let mut removed = 0u64;
        for (id, first_name, last_name) in rows {
            let empty = first_name.trim().is_empty() && last_name.trim().is_empty();
            if !empty && !is_stat_like_name(&first_name) {
                continue;
            }
            sqlx::query("DELETE FROM batting_stats WHERE player_id = ?")
                .bind(id)
                .execute(&self.pool)
                .await?;
            sqlx::query("DELETE FROM pitching_stats WHERE player_id = ?")
                .bind(id)
                .execute(&self.pool)
                .await?;
            sqlx::query("DELETE FROM players WHERE id = ?")
                .bind(id)
                .execute(&self.pool)
                .await?;
            removed += 1;
        }
        Ok(removed)
    }
}

/// Stable 6-digit organization id derived from (name, tier).
pub fn derive_org_id(name: &str, tier: &str) -> i64 {
    let key = format!("{}:{}", name.trim().to_lowercase(), tier);
    let digest = Sha256::digest(key.as_bytes());
    let prefix = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    (prefix % 900_000 + 100_000) as i64
}

/// Split "Last, First" or "First Last" into (first, last).
pub fn split_name(full_name: &str) -> (String, String) {
    let name = full_name.trim();
    if name.is_empty() {
        return (String::new(), String::new());
    }
    if let Some((last, first)) = name.split_once(',') {
        return (first.trim().to_string(), last.trim().to_string());
    }
    match name.split_once(char::is_whitespace) {
        Some((first, last)) => (first.trim().to_string(), last.trim().to_string()),
        None => (name.to_string(), String::new()),
    }
}

/// Height in inches from "6-2", "6'2\"", or bare inches (sanity band 60-84).
pub fn parse_height(height: &str) -> Option<i64> {
    let h = height.trim();
    if h.is_empty() {
        return None;
    }
    let feet_inches = |sep: &[char]| -> Option<i64> {
        let (feet, rest) = h.split_once(|c| sep.contains(&c))?;
        let feet: i64 = feet.trim().parse().ok()?;
        let inches: String = rest
            .trim()
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if inches.is_empty() || inches.len() > 2 || feet > 9 {
            return None;
        }
        Some(feet * 12 + inches.parse::<i64>().ok()?)
    };
    if let Some(total) = feet_inches(&['-']) {
        return Some(total);
    }
    if let Some(total) = feet_inches(&['\'', '"']) {
        return Some(total);
    }
    if h.len() == 2 {
        if let Ok(val) = h.parse::<i64>() {
            if (60..=84).contains(&val) {
                return Some(val);
            }
        }
    }
    None
}

/// Weight in pounds, stripping a "lbs" suffix (sanity band 100-350).
pub fn parse_weight(weight: &str) -> Option<i64> {
    let w = weight
        .trim()
        .trim_end_matches("lbs")
        .trim_end_matches("lb")
        .trim();
    let val: i64 = w.parse().ok()?;
    (100..=350).contains(&val).then_some(val)
}

/// Canonical Fr./So./Jr./Sr./Gr. form, including redshirt prefixes.
/// Unrecognized values pass through trimmed.
pub fn normalize_class_year(year: &str) -> Option<String> {
    let y = year.trim();
    if y.is_empty() {
        return None;
    }
    let key = y.to_lowercase();
    let key = key.trim_end_matches('.');
    let canonical = match key {
        "fr" | "freshman" | "r-fr" => "Fr.",
        "so" | "sophomore" | "r-so" => "So.",
        "jr" | "junior" | "r-jr" => "Jr.",
        "sr" | "senior" | "r-sr" => "Sr.",
        "gr" | "graduate" | "grad" | "r-gr" => "Gr.",
        _ => return Some(y.to_string()),
    };
    Some(canonical.to_string())
}

/// Canonical position abbreviation. Unrecognized values pass through
/// uppercased.
pub fn normalize_position(position: &str) -> Option<String> {
    let pos = position.trim().to_uppercase();
    if pos.is_empty() {
        return None;
    }
    let canonical = match pos.as_str() {
        "PITCHER" | "RHP" | "LHP" => "P",
        "CATCHER" => "C",
        "FIRST BASE" | "FIRST BASEMAN" => "1B",
        "SECOND BASE" | "SECOND BASEMAN" => "2B",
        "THIRD BASE" | "THIRD BASEMAN" => "3B",
        "SHORTSTOP" => "SS",
        "LEFT FIELD" | "LEFT FIELDER" => "LF",
        "CENTER FIELD" | "CENTER FIELDER" => "CF",
        "RIGHT FIELD" | "RIGHT FIELDER" => "RF",
        "DESIGNATED HITTER" => "DH",
        "OUTFIELD" | "OUTFIELDER" => "OF",
        "INFIELD" | "INFIELDER" => "INF",
        "UTILITY" => "UT",
        _ => return Some(pos),
    };
    Some(canonical.to_string())
}

/// Split "R/L" style bats/throws into its two sides.
pub fn split_bats_throws(bt: &str) -> (Option<String>, Option<String>) {
    let Some((bats, throws)) = bt.split_once('/') else {
        return (None, None);
    };
    let clean = |s: &str| {
        let s = s.trim().to_uppercase();
        (!s.is_empty()).then_some(s)
    };
    (clean(bats), clean(throws))
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn org_id_is_stable_and_six_digits() {
        let a = derive_org_id("State University", "D1");
        let b = derive_org_id("  state university ", "D1");
        assert_eq!(a, b);
        assert!((100_000..1_000_000).contains(&a));
        assert_ne!(a, derive_org_id("State University", "D2"));
    }

    #[test]
    fn name_splitting_handles_both_orders() {
        assert_eq!(split_name("Doe, Jane"), ("Jane".into(), "Doe".into()));
        assert_eq!(split_name("Jane Doe"), ("Jane".into(), "Doe".into()));
        assert_eq!(
            split_name("Jane van der Doe"),
            ("Jane".into(), "van der Doe".into())
        );
        assert_eq!(split_name("Cher"), ("Cher".into(), "".into()));
    }

    #[test]
    fn height_formats() {
        assert_eq!(parse_height("6-2"), Some(74));
        assert_eq!(parse_height("5-11"), Some(71));
        assert_eq!(parse_height("6'2\""), Some(74));
        assert_eq!(parse_height("74"), Some(74));
        assert_eq!(parse_height("59"), None);
        assert_eq!(parse_height("not tall"), None);
    }

    #[test]
    fn weight_band() {
        assert_eq!(parse_weight("205"), Some(205));
        assert_eq!(parse_weight("205 lbs"), Some(205));
        assert_eq!(parse_weight("95"), None);
        assert_eq!(parse_weight("400"), None);
    }

    #[test]
    fn class_year_canonical_forms() {
        assert_eq!(normalize_class_year("Freshman").as_deref(), Some("Fr."));
        assert_eq!(normalize_class_year("r-so").as_deref(), Some("So."));
        assert_eq!(normalize_class_year("Jr.").as_deref(), Some("Jr."));
        assert_eq!(normalize_class_year("Grad").as_deref(), Some("Gr."));
        assert_eq!(
            normalize_class_year("5th Year").as_deref(),
            Some("5th Year")
        );
    }

    #[test]
    fn position_canonical_forms() {
        assert_eq!(normalize_position("RHP").as_deref(), Some("P"));
        assert_eq!(normalize_position("Shortstop").as_deref(), Some("SS"));
        assert_eq!(normalize_position("Outfielder").as_deref(), Some("OF"));
        assert_eq!(normalize_position("ss").as_deref(), Some("SS"));
    }

    #[test]
    fn bats_throws_split() {
        assert_eq!(
            split_bats_throws("R/L"),
            (Some("R".into()), Some("L".into()))
        );
        assert_eq!(split_bats_throws("S/"), (Some("S".into()), None));
        assert_eq!(split_bats_throws("R"), (None, None));
    }
}

//! Core data models for the harvesting pipeline.
//!
//! These types flow from the scheduler through the extraction engine to the
//! persistence gateway: targets in, normalized player records and stat
//! blocks out.

use serde::Deserialize;
use std::collections::HashMap;

/// Competitive tier of a target. Drives scheduling priority and refresh
/// cadence (higher tiers are refreshed more often).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    D1,
    D2,
    D3,
}

impl Tier {
    /// Days between refreshes in steady-state scheduling.
    pub fn refresh_interval_days(self) -> i64 {
        match self {
            Tier::D1 => 1,
            Tier::D2 => 2,
            Tier::D3 => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::D1 => "D1",
            Tier::D2 => "D2",
            Tier::D3 => "D3",
        }
    }

    pub fn parse(s: &str) -> Option<Tier> {
        match s.trim() {
            "D1" => Some(Tier::D1),
            "D2" => Some(Tier::D2),
            "D3" => Some(Tier::D3),
            _ => None,
        }
    }
}

/// One scrapeable athletics site, as loaded from the target directory CSV.
///
/// Read-only to the pipeline; only the fetch history row keyed by `name`
/// is mutated after a successful save.
#[derive(Debug, Clone, Deserialize)]
pub struct Target {
    #[serde(rename = "school_name")]
    pub name: String,
    #[serde(rename = "division", default)]
    pub tier: String,
    #[serde(default)]
    pub conference: String,
    #[serde(rename = "athletics_base_url", default)]
    pub base_url: String,
    #[serde(rename = "roster_url", default)]
    pub roster_path: Option<String>,
    #[serde(rename = "stats_url", default)]
    pub stats_path: Option<String>,
}

impl Target {
    pub fn tier(&self) -> Option<Tier> {
        Tier::parse(&self.tier)
    }
}

/// A single player extracted from a roster or stats page.
///
/// Only the name is required; every other field is filled opportunistically
/// from whatever the source page exposes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerRecord {
    pub name: String,
    pub jersey_number: Option<String>,
    pub position: Option<String>,
    pub class_year: Option<String>,
    pub height: Option<String>,
    pub weight: Option<String>,
    pub bats_throws: Option<String>,
    pub hometown: Option<String>,
    pub previous_school: Option<String>,
    pub batting: Option<BattingStats>,
    pub pitching: Option<PitchingStats>,
}

impl PlayerRecord {
    pub fn named(name: impl Into<String>) -> Self {
        PlayerRecord {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Season batting line. Counting stats are parsed; `extra_base_hits`,
/// `xbh_to_k`, and (when absent upstream) `ops` are recomputed from the
/// parsed counts, never copied from a totals row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BattingStats {
    pub games: Option<i64>,
    pub at_bats: Option<i64>,
    pub runs: Option<i64>,
    pub hits: Option<i64>,
    pub doubles: Option<i64>,
    pub triples: Option<i64>,
    pub home_runs: Option<i64>,
    pub rbi: Option<i64>,
    pub walks: Option<i64>,
    pub strikeouts: Option<i64>,
    pub stolen_bases: Option<i64>,
    pub caught_stealing: Option<i64>,
    pub hit_by_pitch: Option<i64>,
    pub sacrifice_flies: Option<i64>,
    pub sacrifice_hits: Option<i64>,
    pub total_bases: Option<i64>,
    pub grounded_into_dp: Option<i64>,
    pub batting_average: Option<f64>,
    pub on_base_percentage: Option<f64>,
    pub slugging_percentage: Option<f64>,
    pub ops: Option<f64>,
    pub extra_base_hits: Option<i64>,
    pub xbh_to_k: Option<f64>,
}

impl BattingStats {
    pub fn is_empty(&self) -> bool {
        self.games.is_none()
            && self.at_bats.is_none()
            && self.hits.is_none()
            && self.runs.is_none()
            && self.batting_average.is_none()
            && self.home_runs.is_none()
            && self.rbi.is_none()
    }

    /// Recompute derived stats from the parsed raw counts.
    ///
    /// A zero-strikeout line yields an absent XBH:K rather than zero.
    pub fn compute_derived(&mut self) {
        let doubles = self.doubles.unwrap_or(0);
        let triples = self.triples.unwrap_or(0);
        let home_runs = self.home_runs.unwrap_or(0);
        let xbh = doubles + triples + home_runs;
        self.extra_base_hits = Some(xbh);

        let strikeouts = self.strikeouts.unwrap_or(0);
        self.xbh_to_k = if strikeouts > 0 {
            Some(round_to(xbh as f64 / strikeouts as f64, 3))
        } else {
            None
        };

        if self.ops.is_none() {
            if let (Some(obp), Some(slg)) = (self.on_base_percentage, self.slugging_percentage) {
                self.ops = Some(round_to(obp + slg, 3));
            }
        }
    }
}

/// Season pitching line. Innings pitched uses baseball's thirds notation
/// (the ".1"/".2" fractional part means 1/3 and 2/3 of an inning).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PitchingStats {
    pub appearances: Option<i64>,
    pub games_started: Option<i64>,
    pub wins: Option<i64>,
    pub losses: Option<i64>,
    pub saves: Option<i64>,
    pub complete_games: Option<i64>,
    pub shutouts: Option<i64>,
    pub innings_pitched: Option<f64>,
    pub hits_allowed: Option<i64>,
    pub runs_allowed: Option<i64>,
    pub earned_runs: Option<i64>,
    pub walks: Option<i64>,
    pub strikeouts: Option<i64>,
    pub home_runs_allowed: Option<i64>,
    pub hit_batters: Option<i64>,
    pub wild_pitches: Option<i64>,
    pub balks: Option<i64>,
    pub era: Option<f64>,
    pub whip: Option<f64>,
    pub k_per_9: Option<f64>,
    pub bb_per_9: Option<f64>,
    pub k_to_bb: Option<f64>,
}

impl PitchingStats {
    pub fn is_empty(&self) -> bool {
        self.appearances.is_none()
            && self.innings_pitched.is_none()
            && self.era.is_none()
            && self.strikeouts.is_none()
            && self.wins.is_none()
            && self.saves.is_none()
    }

    /// Recompute K/9, BB/9, and K:BB from the parsed raw counts.
    ///
    /// Zero innings pitched (or zero walks for K:BB) yields absent values,
    /// never zero and never a division error.
    pub fn compute_derived(&mut self) {
        let ip = self.innings_pitched.unwrap_or(0.0);
        let strikeouts = self.strikeouts.unwrap_or(0) as f64;
        let walks = self.walks.unwrap_or(0) as f64;

        if ip > 0.0 {
            self.k_per_9 = Some(round_to(strikeouts / ip * 9.0, 2));
            self.bb_per_9 = Some(round_to(walks / ip * 9.0, 2));
        } else {
            self.k_per_9 = None;
            self.bb_per_9 = None;
        }

        self.k_to_bb = if walks > 0.0 {
            Some(round_to(strikeouts / walks, 2))
        } else {
            None
        };
    }
}

pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

/// Name-keyed stat maps produced by a stats-page parse.
pub type BattingMap = HashMap<String, BattingStats>;
pub type PitchingMap = HashMap<String, PitchingStats>;

/// Outcome of processing one target end to end.
#[derive(Debug, Clone)]
pub struct ScrapeOutcome {
    pub target_name: String,
    pub tier: String,
    pub conference: String,
    pub players: Vec<PlayerRecord>,
    pub success: bool,
    pub errors: Vec<String>,
    /// The roster page loaded but zero players were extracted. Distinguishes
    /// "couldn't read what's there" (eligible for a browser-render retry)
    /// from "couldn't reach anything" (not eligible).
    pub parsed_zero_players: bool,
}

impl ScrapeOutcome {
    pub fn for_target(target: &Target) -> Self {
        ScrapeOutcome {
            target_name: target.name.clone(),
            tier: target.tier.clone(),
            conference: target.conference.clone(),
            players: Vec::new(),
            success: false,
            errors: Vec::new(),
            parsed_zero_players: false,
        }
    }
}

/// Reject "names" that are actually misaligned stat values (".500", "4-2",
/// "12"). Applied to roster names and stat-table name columns alike.
pub fn is_stat_like_name(name: &str) -> bool {
    let trimmed = name.trim();
    !trimmed.is_empty()
        && trimmed
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '/'))
}

/// Normalize `"Last, First"` to `"First Last"`, collapsing interior
/// whitespace. Names without a comma pass through (still collapsed).
pub fn normalize_name_order(name: &str) -> String {
    let collapsed = name.split_whitespace().collect::<Vec<_>>().join(" ");
    match collapsed.split_once(',') {
        Some((last, first)) => format!("{} {}", first.trim(), last.trim()),
        None => collapsed,
    }
}

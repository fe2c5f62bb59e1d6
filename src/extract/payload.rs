//! Client-payload decoding for sites that render entirely client-side.
//!
//! These pages embed a devalue-serialized object graph in a script tag: a
//! flat JSON array where object fields and list items are indices into the
//! same array, and two-element arrays `["Tag", idx]` with a small set of
//! reactive-wrapper tags are back-references. Nothing useful exists in the
//! static HTML, so the graph is the only source of roster and stat data.

use crate::models::{
    normalize_name_order, BattingMap, BattingStats, PitchingMap, PitchingStats, PlayerRecord,
};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::debug;

static SCRIPT_BODY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<script[^>]*>(.*?)</script>").expect("hardcoded regex pattern is valid")
});

const REF_TAGS: [&str; 4] = ["ShallowReactive", "Reactive", "ShallowRef", "Ref"];
const MAX_RESOLVE_DEPTH: u32 = 20;

/// Locate and parse the serialized payload array, if the page carries one.
pub fn extract_payload(html: &str) -> Option<Vec<Value>> {
    for capture in SCRIPT_BODY.captures_iter(html) {
        let body = capture[1].trim();
        if !body.starts_with(r#"[["ShallowReactive""#) && !body.starts_with(r#"[["Reactive""#) {
            continue;
        }
        if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(body) {
            return Some(items);
        }
    }
    None
}

/// Resolve one node of the graph. Integers are treated as indices into the
/// payload; tagged pairs chase their back-reference; containers resolve
/// their members. Recursion is bounded to survive cyclic graphs.
fn resolve(payload: &[Value], node: &Value, depth: u32) -> Value {
    if depth > MAX_RESOLVE_DEPTH {
        return node.clone();
    }
    let idx = match node.as_u64() {
        Some(i) if (i as usize) < payload.len() => i as usize,
        _ => return node.clone(),
    };
    let val = &payload[idx];
    if let Some(target) = ref_target(val) {
        return resolve(payload, target, depth + 1);
    }
    match val {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve(payload, v, depth + 1)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| resolve(payload, item, depth + 1))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// The index a `["Tag", idx]` back-reference points at, if `val` is one.
fn ref_target(val: &Value) -> Option<&Value> {
    let items = val.as_array()?;
    if items.len() != 2 {
        return None;
    }
    let tag = items[0].as_str()?;
    REF_TAGS.contains(&tag).then(|| &items[1])
}

/// Follow an index and unwrap at most one reactive wrapper, without
/// resolving the subtree.
fn deref<'a>(payload: &'a [Value], node: &Value) -> Option<&'a Value> {
    let idx = node.as_u64()? as usize;
    let val = payload.get(idx)?;
    if let Some(target) = ref_target(val) {
        let inner = target.as_u64()? as usize;
        return payload.get(inner);
    }
    Some(val)
}

/// Parse a roster out of a client payload. Returns an empty list when the
/// page has no payload or the payload carries no roster.
pub fn parse_payload_roster(html: &str) -> Vec<PlayerRecord> {
    let Some(payload) = extract_payload(html) else {
        return Vec::new();
    };

    let Some(player_refs) = roster_player_refs(&payload) else {
        return Vec::new();
    };

    let mut players = Vec::new();
    for node in player_refs {
        let entry = resolve(&payload, node, 0);
        if let Some(player) = roster_entry(&entry) {
            players.push(player);
        }
    }
    if !players.is_empty() {
        debug!(count = players.len(), "client payload roster");
    }
    players
}

/// Navigate root → data → the key holding the roster players list.
fn roster_player_refs(payload: &[Value]) -> Option<&Vec<Value>> {
    let root = payload.get(1)?.as_object()?;
    let data = deref(payload, root.get("data")?)?.as_object()?;
    let roster_key = data
        .keys()
        .find(|k| k.contains("roster") && k.contains("players-list"))?;
    let container = deref(payload, data.get(roster_key)?)?.as_object()?;
    deref(payload, container.get("players")?)?.as_array()
}

fn roster_entry(entry: &Value) -> Option<PlayerRecord> {
    let entry = entry.as_object()?;
    let name = entry
        .get("player")
        .and_then(|p| p.get("full_name"))
        .and_then(|n| n.as_str())
        .unwrap_or("");
    if name.is_empty() {
        return None;
    }

    let mut player = PlayerRecord::named(name);

    if let Some(jn) = entry.get("jersey_number") {
        if !jn.is_null() {
            player.jersey_number = Some(scalar_string(jn));
        }
    }
    if let Some(pos) = entry.get("player_position").and_then(|p| p.as_object()) {
        let abbrev = pos.get("abbreviation").and_then(|v| v.as_str());
        let full = pos.get("name").and_then(|v| v.as_str());
        player.position = abbrev.or(full).map(str::to_string);
    }
    if let Some(class) = entry.get("class_level").and_then(|c| c.as_object()) {
        player.class_year = class.get("name").and_then(|v| v.as_str()).map(str::to_string);
    }
    if let (Some(feet), Some(inches)) = (
        entry.get("height_feet").and_then(|v| v.as_i64()),
        entry.get("height_inches").and_then(|v| v.as_i64()),
    ) {
        player.height = Some(format!("{feet}-{inches}"));
    }
    if let Some(weight) = entry.get("weight") {
        if !weight.is_null() {
            player.weight = Some(scalar_string(weight));
        }
    }
    if let Some(fields) = entry.get("profile_field_values").and_then(|v| v.as_array()) {
        for field in fields {
            let Some(field) = field.as_object() else {
                continue;
            };
            let label = field
                .get("profileField")
                .or_else(|| field.get("profile_field"))
                .and_then(|pf| pf.get("name"))
                .and_then(|n| n.as_str());
            if label == Some("B/T") {
                player.bats_throws = field
                    .get("value")
                    .and_then(|v| v.as_str())
                    .map(str::to_string);
            }
        }
    }
    Some(player)
}

/// Parse batting and pitching stats out of a client payload. Returns empty
/// maps when the payload is absent or carries no season stats (common in
/// the offseason, where the season slot is present but null).
pub fn parse_payload_stats(html: &str) -> (BattingMap, PitchingMap) {
    match extract_payload(html) {
        Some(payload) => stats_from_payload(&payload),
        None => (BattingMap::new(), PitchingMap::new()),
    }
}

/// Walk an already-parsed payload array for season stats. Also used on raw
/// JSON responses from stats API endpoints, which serve the same graph
/// without the surrounding page.
pub fn stats_from_payload(payload: &[Value]) -> (BattingMap, PitchingMap) {
    let mut batting = BattingMap::new();
    let mut pitching = PitchingMap::new();

    let Some((hitting_list, pitching_list)) = individual_stat_lists(payload) else {
        return (batting, pitching);
    };

    for row in &hitting_list {
        if let Some((name, stats)) = batting_row(row) {
            batting.insert(name, stats);
        }
    }
    for row in &pitching_list {
        if let Some((name, stats)) = pitching_row(row) {
            pitching.insert(name, stats);
        }
    }

    if !batting.is_empty() || !pitching.is_empty() {
        debug!(
            batting = batting.len(),
            pitching = pitching.len(),
            "client payload stats"
        );
    }
    (batting, pitching)
}

/// Navigate root → pinia → statsSeason → cumulativeStats → first season →
/// overallIndividualStats → individualStats → the two named lists.
fn individual_stat_lists(payload: &[Value]) -> Option<(Vec<Value>, Vec<Value>)> {
    let root = payload.get(1)?.as_object()?;
    let pinia = deref(payload, root.get("pinia")?)?.as_object()?;
    let season = resolve(payload, pinia.get("statsSeason")?, 0);
    let cumulative = season.get("cumulativeStats")?.as_object()?;
    let first_season = cumulative.values().next()?;
    let individual = first_season
        .get("overallIndividualStats")?
        .get("individualStats")?;
    let hitting = individual
        .get("individualHittingStats")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    let pitching = individual
        .get("individualPitchingStats")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    Some((hitting, pitching))
}

const HITTING_FIELDS: [(&str, &str); 17] = [
    ("gamesPlayed", "games"),
    ("atBats", "at_bats"),
    ("runs", "runs"),
    ("hits", "hits"),
    ("doubles", "doubles"),
    ("triples", "triples"),
    ("homeRuns", "home_runs"),
    ("runsBattedIn", "rbi"),
    ("walks", "walks"),
    ("strikeouts", "strikeouts"),
    ("stolenBases", "stolen_bases"),
    ("caughtStealing", "caught_stealing"),
    ("hitByPitch", "hit_by_pitch"),
    ("sacrificeFlies", "sacrifice_flies"),
    ("sacrificeHits", "sacrifice_hits"),
    ("totalBases", "total_bases"),
    ("groundedIntoDoublePlay", "grounded_into_dp"),
];

const HITTING_RATE_FIELDS: [(&str, &str); 4] = [
    ("battingAverage", "batting_average"),
    ("onBasePercentage", "on_base_percentage"),
    ("sluggingPercentage", "slugging_percentage"),
    ("ops", "ops"),
];

const PITCHING_FIELDS: [(&str, &str); 15] = [
    ("appearances", "appearances"),
    ("gamesStarted", "games_started"),
    ("wins", "wins"),
    ("losses", "losses"),
    ("saves", "saves"),
    ("combinedShutouts", "shutouts"),
    ("hitsAllowed", "hits_allowed"),
    ("runsAllowed", "runs_allowed"),
    ("earnedRunsAllowed", "earned_runs"),
    ("walksAllowed", "walks"),
    ("strikeouts", "strikeouts"),
    ("homeRunsAllowed", "home_runs_allowed"),
    ("hitBatters", "hit_batters"),
    ("wildPitches", "wild_pitches"),
    ("balks", "balks"),
];

const PITCHING_RATE_FIELDS: [(&str, &str); 2] = [("earnedRunAverage", "era"), ("whip", "whip")];

fn batting_row(row: &Value) -> Option<(String, BattingStats)> {
    let name = stat_row_name(row)?;
    let mut stats = BattingStats::default();
    for (src, dst) in HITTING_FIELDS {
        if let Some(v) = row.get(src).and_then(json_count) {
            super::tables::set_batting(&mut stats, dst, &v.to_string());
        }
    }
    for (src, dst) in HITTING_RATE_FIELDS {
        if let Some(v) = row.get(src).and_then(json_rate) {
            super::tables::set_batting(&mut stats, dst, &v.to_string());
        }
    }
    if stats == BattingStats::default() {
        return None;
    }
    stats.compute_derived();
    Some((name, stats))
}

fn pitching_row(row: &Value) -> Option<(String, PitchingStats)> {
    let name = stat_row_name(row)?;
    let mut stats = PitchingStats::default();
    for (src, dst) in PITCHING_FIELDS {
        if let Some(v) = row.get(src).and_then(json_count) {
            super::tables::set_pitching(&mut stats, dst, &v.to_string());
        }
    }
    for (src, dst) in PITCHING_RATE_FIELDS {
        if let Some(v) = row.get(src).and_then(json_rate) {
            super::tables::set_pitching(&mut stats, dst, &v.to_string());
        }
    }
    if let Some(ip) = row.get("inningsPitched") {
        stats.innings_pitched = super::tables::parse_innings(&scalar_string(ip));
    }
    if stats == PitchingStats::default() {
        return None;
    }
    stats.compute_derived();
    Some((name, stats))
}

/// Player name of a stat row, skipping flagged footer/total rows.
fn stat_row_name(row: &Value) -> Option<String> {
    if row
        .get("isAFooterStat")
        .map(json_truthy)
        .unwrap_or(false)
    {
        return None;
    }
    let name = row.get("playerName")?.as_str()?;
    if name.is_empty() {
        return None;
    }
    Some(normalize_name_order(name))
}

fn json_truthy(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        _ => false,
    }
}

fn json_count(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_f64().map(|f| f as i64),
        Value::String(s) => s.parse::<f64>().ok().map(|f| f as i64),
        _ => None,
    }
}

fn json_rate(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}

fn scalar_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_with_payload(payload: &str) -> String {
        format!(
            "<html><body><div id=\"app\"></div>\
             <script type=\"application/json\" id=\"__NUXT_DATA__\">{payload}</script>\
             </body></html>"
        )
    }

    const ROSTER_PAYLOAD: &str = r#"[["ShallowReactive",1],
        {"data":2},
        ["Reactive",3],
        {"roster-17-players-list-page-1":4},
        {"players":5},
        [6],
        {"player":7,"jersey_number":9,"player_position":10,"class_level":12,
         "height_feet":14,"height_inches":15,"weight":16,"profile_field_values":17},
        {"full_name":8},
        "Briggs Ellis",
        23,
        {"abbreviation":11},
        "INF",
        {"name":13},
        "Sophomore",
        6,
        2,
        195,
        [18],
        {"profileField":19,"value":21},
        {"name":20},
        "B/T",
        "R/R"]"#;

    #[test]
    fn roster_from_reference_graph() {
        let html = page_with_payload(ROSTER_PAYLOAD);
        let players = parse_payload_roster(&html);
        assert_eq!(players.len(), 1);
        let p = &players[0];
        assert_eq!(p.name, "Briggs Ellis");
        assert_eq!(p.jersey_number.as_deref(), Some("23"));
        assert_eq!(p.position.as_deref(), Some("INF"));
        assert_eq!(p.class_year.as_deref(), Some("Sophomore"));
        assert_eq!(p.height.as_deref(), Some("6-2"));
        assert_eq!(p.weight.as_deref(), Some("195"));
        assert_eq!(p.bats_throws.as_deref(), Some("R/R"));
    }

    const STATS_PAYLOAD: &str = r#"[["ShallowReactive",1],
        {"data":2,"pinia":3},
        {},
        ["Reactive",4],
        {"statsSeason":5},
        {"cumulativeStats":6},
        {"2026":7},
        {"overallIndividualStats":8},
        {"individualStats":9},
        {"individualHittingStats":10,"individualPitchingStats":14},
        [11,12],
        {"playerName":20,"atBats":21,"doubles":22,"homeRuns":23,
         "strikeouts":24,"battingAverage":25,"isAFooterStat":26},
        {"playerName":13,"atBats":21,"isAFooterStat":27},
        "Totals",
        [15],
        {"playerName":16,"inningsPitched":17,"strikeouts":18,
         "walksAllowed":19,"earnedRunAverage":28},
        "Smith, Alex",
        "12.1",
        15,
        4,
        "Doe, Jane",
        50,
        4,
        3,
        10,
        0.32,
        false,
        true,
        2.19]"#;

    #[test]
    fn stats_from_reference_graph() {
        let html = page_with_payload(STATS_PAYLOAD);
        let (batting, pitching) = parse_payload_stats(&html);

        let b = batting.get("Jane Doe").expect("batting row");
        assert_eq!(b.at_bats, Some(50));
        assert_eq!(b.doubles, Some(4));
        assert_eq!(b.home_runs, Some(3));
        assert_eq!(b.batting_average, Some(0.32));
        assert_eq!(b.extra_base_hits, Some(7));
        assert_eq!(b.xbh_to_k, Some(0.7));
        // Footer row must not leak in.
        assert!(!batting.contains_key("Totals"));

        let p = pitching.get("Alex Smith").expect("pitching row");
        assert!((p.innings_pitched.unwrap() - (12.0 + 1.0 / 3.0)).abs() < 1e-9);
        assert_eq!(p.strikeouts, Some(15));
        assert_eq!(p.walks, Some(4));
        assert_eq!(p.era, Some(2.19));
        assert_eq!(p.k_per_9, Some(10.95));
        assert_eq!(p.k_to_bb, Some(3.75));
    }

    #[test]
    fn pages_without_payload_yield_nothing() {
        let html = "<html><body><table><tr><td>Name</td></tr></table></body></html>";
        assert!(parse_payload_roster(html).is_empty());
        let (batting, pitching) = parse_payload_stats(html);
        assert!(batting.is_empty() && pitching.is_empty());
    }

    #[test]
    fn cyclic_references_terminate() {
        // Node 2 points back at itself through a tagged pair.
        let payload = r#"[["ShallowReactive",1],{"data":2},["Ref",2]]"#;
        let html = page_with_payload(payload);
        assert!(parse_payload_roster(&html).is_empty());
    }
}

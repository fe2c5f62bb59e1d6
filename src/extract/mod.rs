//! Adaptive extraction engine.
//!
//! Athletics sites come in wildly different shapes: server-rendered tables,
//! card grids, JSON-LD, and fully client-rendered pages whose only data is a
//! serialized reference graph in a script tag. The roster cascade tries each
//! strategy in order of reliability and stops at the first that yields
//! players.

pub mod payload;
pub mod roster;
pub mod stats;
pub mod tables;

use crate::models::{BattingMap, PitchingMap, PlayerRecord};
use scraper::Html;
use tracing::warn;

/// A roster bigger than this probably picked up non-player rows.
pub const ROSTER_SIZE_WARNING: usize = 60;

pub use payload::{parse_payload_roster, parse_payload_stats, stats_from_payload};

/// Roster cascade: first strategy to yield at least one record wins.
pub fn parse_roster(html: &str) -> Vec<PlayerRecord> {
    let players = parse_payload_roster(html);
    if !players.is_empty() {
        return sanity_checked(players);
    }

    let doc = Html::parse_document(html);
    for strategy in [
        roster::labeled_table,
        roster::generic_table,
        roster::card_layout,
        roster::jsonld_persons,
        roster::generic_fallback,
    ] {
        let players = strategy(&doc);
        if !players.is_empty() {
            return sanity_checked(players);
        }
    }
    Vec::new()
}

/// Favor recall: an oversized roster is logged, never discarded.
fn sanity_checked(players: Vec<PlayerRecord>) -> Vec<PlayerRecord> {
    if players.len() > ROSTER_SIZE_WARNING {
        warn!(
            count = players.len(),
            "unusually large roster, may include non-players"
        );
    }
    players
}

pub fn parse_batting_stats(html: &str) -> BattingMap {
    let doc = Html::parse_document(html);
    stats::parse_batting_stats(&doc)
}

pub fn parse_pitching_stats(html: &str) -> PitchingMap {
    let doc = Html::parse_document(html);
    stats::parse_pitching_stats(&doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_beats_html_tables() {
        // A page carrying both a client payload and a parseable table must
        // take the payload: on client-rendered sites the static table is
        // placeholder chrome.
        let payload = r#"[["ShallowReactive",1],
            {"data":2},
            {"roster-9-players-list-page-1":3},
            {"players":4},
            [5],
            {"player":6},
            {"full_name":7},
            "Payload Player"]"#;
        let html = format!(
            r#"<html><body>
            <table class="roster">
              <thead><tr><th>No.</th><th>Name</th></tr></thead>
              <tbody><tr><td>1</td><td>Table Player</td></tr></tbody>
            </table>
            <script type="application/json" id="__NUXT_DATA__">{payload}</script>
            </body></html>"#
        );
        let players = parse_roster(&html);
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].name, "Payload Player");
    }

    #[test]
    fn cascade_falls_through_to_tables() {
        let html = r#"<html><body>
            <table class="roster">
              <thead><tr><th>No.</th><th>Name</th></tr></thead>
              <tbody><tr><td>1</td><td>Table Player</td></tr></tbody>
            </table></body></html>"#;
        let players = parse_roster(html);
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].name, "Table Player");
    }

    #[test]
    fn empty_page_yields_empty_roster() {
        assert!(parse_roster("<html><body><p>Season opens soon.</p></body></html>").is_empty());
    }
}

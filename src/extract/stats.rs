//! Batting and pitching stat-table extraction.
//!
//! Each entry point tries, in order: a table or section labeled by id or
//! class keyword, the nearest table after a matching heading, a
//! column-signature scan over tables with headers, and finally a
//! low-threshold signature pass for non-standard platforms. Both signature
//! passes cross-check the opposite set so a pitching table is never read
//! as batting.

use super::tables::{
    batting_col, clean_stat_header, css, data_rows, extract_name, header_texts, pitching_col,
    set_batting, set_pitching,
};
use crate::models::{is_stat_like_name, BattingMap, BattingStats, PitchingMap, PitchingStats};
use regex::Regex;
use scraper::{ElementRef, Html};
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::debug;

/// Indicator columns a signature match must reach. Empirically tuned.
pub const SIGNATURE_MIN_INDICATORS: usize = 3;

static BATTING_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)batting|hitting|offensive").expect("hardcoded regex pattern is valid")
});
static PITCHING_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)pitching").expect("hardcoded regex pattern is valid"));

const BATTING_INDICATORS: [&str; 6] = ["avg", "ab", "rbi", "slg", "obp", "ops"];
const PITCHING_INDICATORS: [&str; 5] = ["era", "ip", "whip", "sv", "gs"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatKind {
    Batting,
    Pitching,
}

impl StatKind {
    fn keyword(self) -> &'static Regex {
        match self {
            StatKind::Batting => &BATTING_KEYWORD,
            StatKind::Pitching => &PITCHING_KEYWORD,
        }
    }
}

pub fn parse_batting_stats(doc: &Html) -> BattingMap {
    let Some(table) = find_stats_table(doc, StatKind::Batting) else {
        debug!("no batting stats table found");
        return BattingMap::new();
    };
    parse_batting_table(table)
}

pub fn parse_pitching_stats(doc: &Html) -> PitchingMap {
    let Some(table) = find_stats_table(doc, StatKind::Pitching) else {
        debug!("no pitching stats table found");
        return PitchingMap::new();
    };
    parse_pitching_table(table)
}

fn find_stats_table(doc: &Html, kind: StatKind) -> Option<ElementRef<'_>> {
    let keyword = kind.keyword();

    // Labeled table or section.
    let table_sel = css("table");
    for table in doc.select(&table_sel) {
        let id = table.value().attr("id").unwrap_or("");
        let classes = table.value().classes().collect::<Vec<_>>().join(" ");
        if keyword.is_match(id) || keyword.is_match(&classes) {
            return Some(table);
        }
    }
    let section_sel = css("section");
    for section in doc.select(&section_sel) {
        let id = section.value().attr("id").unwrap_or("");
        if keyword.is_match(id) {
            if let Some(table) = section.select(&table_sel).next() {
                return Some(table);
            }
        }
    }

    // Nearest table after a matching heading, in document order.
    let flow_sel = css("h2, h3, h4, table");
    let mut after_heading = false;
    for el in doc.select(&flow_sel) {
        if el.value().name() == "table" {
            if after_heading {
                return Some(el);
            }
            continue;
        }
        let text: String = el.text().collect();
        if keyword.is_match(&text) {
            after_heading = true;
        }
    }

    // Column-signature scan: tables with an explicit header block first,
    // then any table, both cross-checked against the opposite set.
    signature_match(doc, kind, true).or_else(|| signature_match(doc, kind, false))
}

fn signature_match(doc: &Html, kind: StatKind, require_thead: bool) -> Option<ElementRef<'_>> {
    let table_sel = css("table");
    for table in doc.select(&table_sel) {
        if require_thead && table.select(&css("thead")).next().is_none() {
            continue;
        }
        let headers: HashSet<String> = header_texts(table)
            .iter()
            .map(|h| clean_stat_header(h))
            .collect();
        let batting_hits = BATTING_INDICATORS
            .iter()
            .filter(|i| headers.contains(**i))
            .count();
        let pitching_hits = PITCHING_INDICATORS
            .iter()
            .filter(|i| headers.contains(**i))
            .count();
        let (own, other) = match kind {
            StatKind::Batting => (batting_hits, pitching_hits),
            StatKind::Pitching => (pitching_hits, batting_hits),
        };
        if own >= SIGNATURE_MIN_INDICATORS && own > other {
            debug!(?kind, own, other, "stats table via column signature");
            return Some(table);
        }
    }
    None
}

fn parse_batting_table(table: ElementRef) -> BattingMap {
    let mut out = BattingMap::new();
    for (name, cells, headers) in stat_rows(table) {
        let mut stats = BattingStats::default();
        for (header, raw) in headers.iter().zip(cells.iter()) {
            if let Some(field) = batting_col(header) {
                set_batting(&mut stats, field, raw);
            }
        }
        if stats != BattingStats::default() {
            stats.compute_derived();
            out.insert(name, stats);
        }
    }
    out
}

fn parse_pitching_table(table: ElementRef) -> PitchingMap {
    let mut out = PitchingMap::new();
    for (name, cells, headers) in stat_rows(table) {
        let mut stats = PitchingStats::default();
        for (header, raw) in headers.iter().zip(cells.iter()) {
            if let Some(field) = pitching_col(header) {
                set_pitching(&mut stats, field, raw);
            }
        }
        if stats != PitchingStats::default() {
            stats.compute_derived();
            out.insert(name, stats);
        }
    }
    out
}

/// Yield (player name, cell texts, cleaned headers) per usable data row.
/// Total/team/opponent rows and misaligned stat-value "names" are skipped.
fn stat_rows(table: ElementRef) -> Vec<(String, Vec<String>, Vec<String>)> {
    let headers: Vec<String> = header_texts(table)
        .iter()
        .map(|h| clean_stat_header(h))
        .collect();
    if headers.is_empty() {
        return Vec::new();
    }
    let name_idx = headers
        .iter()
        .position(|h| matches!(h.as_str(), "name" | "player" | "athlete"));

    let has_thead = table.select(&css("thead")).next().is_some();
    let mut rows = data_rows(table);
    if !has_thead && !rows.is_empty() {
        rows.remove(0);
    }

    let cell_sel = css("th, td");
    let mut out = Vec::new();
    for row in rows {
        let cells: Vec<ElementRef> = row.select(&cell_sel).collect();
        if cells.len() < 3 {
            continue;
        }
        let row_text = row.text().collect::<String>().to_lowercase();
        if row_text.contains("total") || row_text.contains("team") || row_text.contains("opponent")
        {
            continue;
        }

        let mut name = String::new();
        let mut values = vec![String::new(); headers.len()];
        for (i, cell) in cells.iter().enumerate() {
            if i >= headers.len() {
                break;
            }
            let header = &headers[i];
            if Some(i) == name_idx || matches!(header.as_str(), "name" | "player" | "athlete") {
                name = extract_name(*cell);
                continue;
            }
            if matches!(header.as_str(), "no" | "number" | "#") {
                continue;
            }
            values[i] = cell.text().collect::<String>().trim().to_string();
        }

        if name.is_empty() || is_stat_like_name(&name) {
            continue;
        }
        out.push((name, values, headers.clone()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batting_page(extra_attrs: &str) -> String {
        format!(
            r#"<html><body><table {extra_attrs}>
            <thead><tr>
              <th>Name</th><th>AB</th><th>R</th><th>H</th><th>2B</th><th>3B</th>
              <th>HR</th><th>RBI</th><th>SO</th><th>AVG</th><th>OBP</th><th>SLG</th>
            </tr></thead>
            <tbody>
              <tr><td>Doe, Jane</td><td>120</td><td>25</td><td>40</td><td>9</td>
                  <td>1</td><td>5</td><td>30</td><td>20</td><td>.333</td>
                  <td>.410</td><td>.525</td></tr>
              <tr><td>Totals</td><td>900</td><td>200</td><td>280</td><td>60</td>
                  <td>8</td><td>30</td><td>190</td><td>180</td><td>.311</td>
                  <td>.395</td><td>.480</td></tr>
            </tbody></table></body></html>"#
        )
    }

    #[test]
    fn labeled_batting_table() {
        let doc = Html::parse_document(&batting_page(r#"id="individual-batting""#));
        let stats = parse_batting_stats(&doc);
        let jane = stats.get("Jane Doe").expect("batting row");
        assert_eq!(jane.at_bats, Some(120));
        assert_eq!(jane.doubles, Some(9));
        assert_eq!(jane.batting_average, Some(0.333));
        assert_eq!(jane.extra_base_hits, Some(15));
        assert_eq!(jane.xbh_to_k, Some(0.75));
        assert_eq!(jane.ops, Some(0.935));
        assert!(!stats.contains_key("Totals"));
    }

    #[test]
    fn signature_pass_finds_unlabeled_table() {
        let doc = Html::parse_document(&batting_page(""));
        let stats = parse_batting_stats(&doc);
        assert!(stats.contains_key("Jane Doe"));
    }

    #[test]
    fn heading_adjacent_table() {
        let html = r#"<html><body>
            <h3>Pitching Statistics</h3>
            <table>
            <thead><tr><th>Player</th><th>APP</th><th>IP</th><th>SO</th><th>BB</th></tr></thead>
            <tbody>
              <tr><td>Smith, Alex</td><td>14</td><td>45.2</td><td>50</td><td>10</td></tr>
            </tbody></table></body></html>"#;
        let doc = Html::parse_document(html);
        let stats = parse_pitching_stats(&doc);
        let alex = stats.get("Alex Smith").expect("pitching row");
        assert!((alex.innings_pitched.unwrap() - (45.0 + 2.0 / 3.0)).abs() < 1e-9);
        assert_eq!(alex.appearances, Some(14));
        assert_eq!(alex.k_to_bb, Some(5.0));
    }

    #[test]
    fn pitching_table_is_not_read_as_batting() {
        let html = r#"<html><body><table>
            <thead><tr><th>Name</th><th>ERA</th><th>IP</th><th>WHIP</th><th>SV</th><th>GS</th></tr></thead>
            <tbody>
              <tr><td>Smith, Alex</td><td>2.19</td><td>45.1</td><td>1.10</td><td>3</td><td>8</td></tr>
            </tbody></table></body></html>"#;
        let doc = Html::parse_document(html);
        assert!(parse_batting_stats(&doc).is_empty());
        assert!(parse_pitching_stats(&doc).contains_key("Alex Smith"));
    }

    #[test]
    fn gp_gs_pair_takes_first_number() {
        let html = r#"<html><body><table id="batting">
            <thead><tr><th>Name</th><th>GP-GS</th><th>AB</th><th>RBI</th><th>AVG</th><th>OBP</th></tr></thead>
            <tbody>
              <tr><td>Doe, Jane</td><td>31 - 28</td><td>100</td><td>22</td><td>.300</td><td>.380</td></tr>
            </tbody></table></body></html>"#;
        let doc = Html::parse_document(html);
        let stats = parse_batting_stats(&doc);
        assert_eq!(stats.get("Jane Doe").unwrap().games, Some(31));
    }
}

//! HTML roster extraction strategies, tried in order by the cascade in
//! `extract::parse_roster` after the client-payload path.

use super::tables::{
    css, data_rows, extract_name, header_texts, roster_col, visible_cell_text, RosterCol,
};
use crate::models::{is_stat_like_name, PlayerRecord};
use regex::Regex;
use scraper::{ElementRef, Html};
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::debug;

/// Minimum row count for a header-matched table to plausibly be a roster.
pub const GENERIC_TABLE_MIN_ROWS: usize = 6;
/// Score a table must reach in the last-resort table scan. Empirically
/// tuned; revisit against a wider corpus of sites.
pub const FALLBACK_TABLE_MIN_SCORE: i32 = 5;
/// Minimum size of a repeating sibling group to read as a card roster.
pub const SIBLING_GROUP_MIN: usize = 10;

static ROSTER_TABLE_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)roster|sidearm-table").expect("hardcoded regex pattern is valid")
});
static NAME_OR_TITLE_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)name|title").expect("hardcoded regex pattern is valid"));
static NUMBER_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)number|jersey").expect("hardcoded regex pattern is valid"));
static POSITION_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)position").expect("hardcoded regex pattern is valid"));
static DETAIL_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)detail|info|meta").expect("hardcoded regex pattern is valid"));
static CLASS_YEAR_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(Fr\.|So\.|Jr\.|Sr\.|Gr\.|Freshman|Sophomore|Junior|Senior|Graduate)")
        .expect("hardcoded regex pattern is valid")
});
static HEIGHT_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d-\d{1,2}$").expect("hardcoded regex pattern is valid"));
static WEIGHT_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{3}$").expect("hardcoded regex pattern is valid"));
static BATS_THROWS_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[RLS]/[RLS]$").expect("hardcoded regex pattern is valid"));

const CARD_CLASSES: [&str; 3] = ["sidearm-roster-player", "roster-player", "s-person-card"];

/// Strategy: a table whose class names it as a roster.
pub fn labeled_table(doc: &Html) -> Vec<PlayerRecord> {
    let table_sel = css("table");
    for table in doc.select(&table_sel) {
        let classes = table.value().classes().collect::<Vec<_>>().join(" ");
        if ROSTER_TABLE_CLASS.is_match(&classes) {
            let players = parse_table_roster(table);
            if !players.is_empty() {
                debug!(count = players.len(), "roster via labeled table");
                return players;
            }
        }
    }
    Vec::new()
}

/// Strategy: any table with player-like headers and enough rows.
pub fn generic_table(doc: &Html) -> Vec<PlayerRecord> {
    let table_sel = css("table");
    let th_sel = css("th");
    for table in doc.select(&table_sel) {
        let headers: Vec<String> = table
            .select(&th_sel)
            .map(|th| th.text().collect::<String>().trim().to_lowercase())
            .collect();
        let player_like = headers
            .iter()
            .any(|h| matches!(h.as_str(), "name" | "player" | "no." | "#"));
        if !player_like {
            continue;
        }
        if table.select(&css("tr")).count() < GENERIC_TABLE_MIN_ROWS {
            continue;
        }
        let players = parse_table_roster(table);
        if !players.is_empty() {
            debug!(count = players.len(), "roster via generic table");
            return players;
        }
    }
    Vec::new()
}

/// Strategy: platform player cards (exact class match, to avoid picking up
/// share widgets and header chrome).
pub fn card_layout(doc: &Html) -> Vec<PlayerRecord> {
    let card_sel = css("li, div");
    let cards: Vec<ElementRef> = doc
        .select(&card_sel)
        .filter(|el| {
            el.value()
                .classes()
                .any(|c| CARD_CLASSES.contains(&c))
        })
        .collect();
    if cards.is_empty() {
        return Vec::new();
    }
    let players = parse_card_roster(&cards);
    if !players.is_empty() {
        debug!(count = players.len(), "roster via card layout");
    }
    players
}

/// Strategy: Schema.org Person entries in JSON-LD script tags.
pub fn jsonld_persons(doc: &Html) -> Vec<PlayerRecord> {
    let script_sel = css(r#"script[type="application/ld+json"]"#);
    let mut players = Vec::new();
    for script in doc.select(&script_sel) {
        let body: String = script.text().collect();
        let Ok(data) = serde_json::from_str::<serde_json::Value>(&body) else {
            continue;
        };
        let items: Vec<serde_json::Value> = match &data {
            serde_json::Value::Array(list) => list.clone(),
            serde_json::Value::Object(obj) => match obj.get("@type").and_then(|t| t.as_str()) {
                Some("ItemList") => obj
                    .get("itemListElement")
                    .and_then(|e| e.as_array())
                    .map(|els| {
                        els.iter()
                            .map(|el| el.get("item").unwrap_or(el).clone())
                            .collect()
                    })
                    .unwrap_or_default(),
                Some("Person") => vec![data.clone()],
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };
        for item in items {
            if item.get("@type").and_then(|t| t.as_str()) != Some("Person") {
                continue;
            }
            if let Some(name) = item.get("name").and_then(|n| n.as_str()) {
                let name = name.trim();
                if !name.is_empty() && !is_stat_like_name(name) {
                    players.push(PlayerRecord::named(name));
                }
            }
        }
    }
    if !players.is_empty() {
        debug!(count = players.len(), "roster via JSON-LD");
    }
    players
}

/// Last-resort strategy for non-standard platforms: score every table for
/// roster-likeness, and when none qualifies, look for large repeating
/// sibling groups and read them as cards.
pub fn generic_fallback(doc: &Html) -> Vec<PlayerRecord> {
    let table_sel = css("table");
    let mut best: Option<(i32, ElementRef)> = None;
    for table in doc.select(&table_sel) {
        let score = roster_table_score(table);
        if best.map(|(s, _)| score > s).unwrap_or(true) {
            best = Some((score, table));
        }
    }
    if let Some((score, table)) = best {
        if score >= FALLBACK_TABLE_MIN_SCORE {
            let players = parse_table_roster(table);
            if !players.is_empty() {
                debug!(score, count = players.len(), "roster via scored table");
                return players;
            }
        }
    }
    let players = sibling_group_roster(doc);
    if !players.is_empty() {
        debug!(count = players.len(), "roster via sibling groups");
    }
    players
}

/// Roster-likeness score: indicative headers add, stat/schedule headers
/// subtract, a plausible row count adds.
fn roster_table_score(table: ElementRef) -> i32 {
    let mut score = 0;
    for header in header_texts(table) {
        match roster_col(&header) {
            Some(RosterCol::Name) => score += 2,
            Some(_) => score += 1,
            None => {
                let h = super::tables::clean_stat_header(&header);
                let stat_like = super::tables::batting_col(&h).is_some()
                    || super::tables::pitching_col(&h).is_some()
                    || matches!(h.as_str(), "date" | "opponent" | "result" | "score");
                if stat_like {
                    score -= 1;
                }
            }
        }
    }
    if table.select(&css("tr")).count() >= GENERIC_TABLE_MIN_ROWS {
        score += 1;
    }
    score
}

/// Find the largest group of sibling elements sharing a tag and class
/// signature, and extract one player per element when the group is big
/// enough to be a roster grid.
fn sibling_group_roster(doc: &Html) -> Vec<PlayerRecord> {
    let any_sel = css("*");
    let mut best_group: Vec<ElementRef> = Vec::new();
    for parent in doc.select(&any_sel) {
        let mut groups: HashMap<String, Vec<ElementRef>> = HashMap::new();
        for child in parent.child_elements() {
            let mut classes: Vec<&str> = child.value().classes().collect();
            classes.sort_unstable();
            let signature = format!("{}|{}", child.value().name(), classes.join(" "));
            groups.entry(signature).or_default().push(child);
        }
        for group in groups.into_values() {
            if group.len() >= SIBLING_GROUP_MIN && group.len() > best_group.len() {
                best_group = group;
            }
        }
    }

    let mut players = Vec::new();
    for el in best_group {
        if let Some(player) = card_player(el) {
            players.push(player);
        }
    }
    players
}

fn parse_table_roster(table: ElementRef) -> Vec<PlayerRecord> {
    let headers = header_texts(table);
    let mut header_map: Vec<(RosterCol, usize)> = Vec::new();
    for (i, h) in headers.iter().enumerate() {
        if let Some(col) = roster_col(h) {
            if !header_map.iter().any(|(c, _)| *c == col) {
                header_map.push((col, i));
            }
        }
    }
    if header_map.is_empty() {
        return Vec::new();
    }

    let has_thead = table.select(&css("thead")).next().is_some();
    let mut rows = data_rows(table);
    // Without a thead the header row sits among the data rows.
    if !has_thead && !rows.is_empty() {
        rows.remove(0);
    }

    let cell_sel = css("th, td");
    let mut players = Vec::new();
    for row in rows {
        let cells: Vec<ElementRef> = row.select(&cell_sel).collect();
        if cells.len() < 2 {
            continue;
        }
        let mut player = PlayerRecord::default();
        for (col, idx) in &header_map {
            let Some(cell) = cells.get(*idx) else {
                continue;
            };
            let value = match col {
                RosterCol::Name => extract_name(*cell),
                _ => visible_cell_text(*cell),
            };
            if value.is_empty() || value == "-" {
                continue;
            }
            match col {
                RosterCol::Name => player.name = value,
                RosterCol::Jersey => player.jersey_number = Some(value),
                RosterCol::Position => player.position = Some(value),
                RosterCol::ClassYear => player.class_year = Some(value),
                RosterCol::BatsThrows => player.bats_throws = Some(value),
                RosterCol::Height => player.height = Some(value),
                RosterCol::Weight => player.weight = Some(value),
                RosterCol::Hometown => player.hometown = Some(value),
                RosterCol::PreviousSchool => player.previous_school = Some(value),
            }
        }
        if !player.name.is_empty() && !is_stat_like_name(&player.name) {
            players.push(player);
        }
    }
    players
}

fn parse_card_roster(cards: &[ElementRef]) -> Vec<PlayerRecord> {
    let mut players = Vec::new();
    for card in cards {
        if let Some(player) = card_player(*card) {
            players.push(player);
        }
    }
    players
}

/// Read one player from a card-style element via class and text patterns.
fn card_player(card: ElementRef) -> Option<PlayerRecord> {
    let heading_sel = css("h3, h4, a");
    let mut name = String::new();
    for el in card.select(&heading_sel) {
        let classes = el.value().classes().collect::<Vec<_>>().join(" ");
        if NAME_OR_TITLE_CLASS.is_match(&classes) {
            name = el.text().collect::<String>().trim().to_string();
            break;
        }
    }
    if name.is_empty() {
        let plain_heading = css("h3, h4");
        if let Some(el) = card.select(&plain_heading).next() {
            name = el.text().collect::<String>().trim().to_string();
        }
    }
    let name = name.split_whitespace().collect::<Vec<_>>().join(" ");
    if name.is_empty() || is_stat_like_name(&name) {
        return None;
    }

    let mut player = PlayerRecord::named(name);

    let any_sel = css("*");
    for el in card.select(&any_sel) {
        let classes = el.value().classes().collect::<Vec<_>>().join(" ");
        if player.jersey_number.is_none() && NUMBER_CLASS.is_match(&classes) {
            let text = el.text().collect::<String>().trim().replace('#', "");
            if !text.is_empty() {
                player.jersey_number = Some(text);
            }
        } else if player.position.is_none() && POSITION_CLASS.is_match(&classes) {
            let text = el.text().collect::<String>().trim().to_string();
            if !text.is_empty() {
                player.position = Some(text);
            }
        }
    }

    let detail_sel = css("span, div");
    for el in card.select(&detail_sel) {
        let classes = el.value().classes().collect::<Vec<_>>().join(" ");
        if !DETAIL_CLASS.is_match(&classes) {
            continue;
        }
        let text = el.text().collect::<String>().trim().to_string();
        if CLASS_YEAR_TEXT.is_match(&text) {
            player.class_year = Some(text);
        } else if HEIGHT_TEXT.is_match(&text) {
            player.height = Some(text);
        } else if WEIGHT_TEXT.is_match(&text) {
            player.weight = Some(text);
        } else if BATS_THROWS_TEXT.is_match(&text) {
            player.bats_throws = Some(text);
        }
    }

    Some(player)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labeled_table_parses_standard_roster_row() {
        let html = r#"<html><body>
            <table class="sidearm-table roster">
              <thead><tr>
                <th>No.</th><th>Name</th><th>Pos.</th><th>Yr</th><th>Ht</th><th>Wt</th>
              </tr></thead>
              <tbody>
                <tr><td>4</td><td>Doe, Jane</td><td>SS</td><td>Jr.</td><td>5-9</td><td>160</td></tr>
              </tbody>
            </table></body></html>"#;
        let doc = Html::parse_document(html);
        let players = labeled_table(&doc);
        assert_eq!(players.len(), 1);
        let p = &players[0];
        assert_eq!(p.name, "Jane Doe");
        assert_eq!(p.jersey_number.as_deref(), Some("4"));
        assert_eq!(p.position.as_deref(), Some("SS"));
        assert_eq!(p.class_year.as_deref(), Some("Jr."));
        assert_eq!(p.height.as_deref(), Some("5-9"));
        assert_eq!(p.weight.as_deref(), Some("160"));
    }

    #[test]
    fn generic_table_requires_minimum_rows() {
        let short = r#"<html><body><table>
            <thead><tr><th>No.</th><th>Name</th></tr></thead>
            <tbody><tr><td>1</td><td>Jane Doe</td></tr></tbody>
            </table></body></html>"#;
        let doc = Html::parse_document(short);
        assert!(generic_table(&doc).is_empty());

        let rows: String = (1..=8)
            .map(|i| format!("<tr><td>{i}</td><td>Player {i}son</td></tr>"))
            .collect();
        let long = format!(
            "<html><body><table><thead><tr><th>No.</th><th>Name</th></tr></thead>\
             <tbody>{rows}</tbody></table></body></html>"
        );
        let doc = Html::parse_document(&long);
        assert_eq!(generic_table(&doc).len(), 8);
    }

    #[test]
    fn stat_like_names_are_dropped_from_tables() {
        let html = r#"<html><body>
            <table class="roster">
              <thead><tr><th>No.</th><th>Name</th></tr></thead>
              <tbody>
                <tr><td>1</td><td>Jane Doe</td></tr>
                <tr><td>2</td><td>.500</td></tr>
              </tbody>
            </table></body></html>"#;
        let doc = Html::parse_document(html);
        let players = labeled_table(&doc);
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].name, "Jane Doe");
    }

    #[test]
    fn card_layout_reads_detail_patterns() {
        let html = r#"<html><body><ul>
            <li class="sidearm-roster-player">
              <h3 class="sidearm-roster-player-name"><a href="/p/1">Jane Doe</a></h3>
              <span class="sidearm-roster-player-jersey-number">#4</span>
              <span class="sidearm-roster-player-position">INF</span>
              <span class="sidearm-roster-player-details">So.</span>
              <span class="sidearm-roster-player-details">5-9</span>
              <span class="sidearm-roster-player-details">160</span>
              <span class="sidearm-roster-player-details">R/R</span>
            </li></ul></body></html>"#;
        let doc = Html::parse_document(html);
        let players = card_layout(&doc);
        assert_eq!(players.len(), 1);
        let p = &players[0];
        assert_eq!(p.name, "Jane Doe");
        assert_eq!(p.jersey_number.as_deref(), Some("4"));
        assert_eq!(p.position.as_deref(), Some("INF"));
        assert_eq!(p.class_year.as_deref(), Some("So."));
        assert_eq!(p.height.as_deref(), Some("5-9"));
        assert_eq!(p.weight.as_deref(), Some("160"));
        assert_eq!(p.bats_throws.as_deref(), Some("R/R"));
    }

    #[test]
    fn jsonld_itemlist_persons() {
        let html = r#"<html><head>
            <script type="application/ld+json">
            {"@type":"ItemList","itemListElement":[
              {"item":{"@type":"Person","name":"Jane Doe"}},
              {"item":{"@type":"Person","name":"Alex Smith"}},
              {"item":{"@type":"Organization","name":"Front Office"}}
            ]}
            </script></head><body></body></html>"#;
        let doc = Html::parse_document(html);
        let players = jsonld_persons(&doc);
        assert_eq!(players.len(), 2);
        assert_eq!(players[0].name, "Jane Doe");
    }

    #[test]
    fn fallback_scores_tables_before_sibling_groups() {
        let rows: String = (1..=12)
            .map(|i| {
                format!(
                    "<tr><td>{i}</td><td>Player {i}son</td><td>OF</td><td>So.</td>\
                     <td>6-0</td><td>180</td></tr>"
                )
            })
            .collect();
        let html = format!(
            "<html><body><table><thead><tr><th>#</th><th>Full Name</th><th>Pos</th>\
             <th>Cl.</th><th>Ht.</th><th>Wt.</th></tr></thead><tbody>{rows}</tbody>\
             </table></body></html>"
        );
        let doc = Html::parse_document(&html);
        let players = generic_fallback(&doc);
        assert_eq!(players.len(), 12);
    }

    #[test]
    fn fallback_reads_repeating_sibling_groups() {
        let cards: String = (1..=11)
            .map(|i| {
                format!(
                    r#"<div class="athlete-tile"><h3>Player {i}son</h3>
                       <span class="athlete-info">OF</span></div>"#
                )
            })
            .collect();
        let html = format!("<html><body><div id=\"grid\">{cards}</div></body></html>");
        let doc = Html::parse_document(&html);
        let players = generic_fallback(&doc);
        assert_eq!(players.len(), 11);
        assert_eq!(players[0].name, "Player 1son");
    }
}

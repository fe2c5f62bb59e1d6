//! Shared table-parsing rules: header normalization, cell text cleanup,
//! name extraction, and stat value parsing.

use crate::models::{BattingStats, PitchingStats};
use regex::Regex;
use ego_tree::NodeRef;
use scraper::{ElementRef, Node, Selector};
use std::sync::LazyLock;

static TRAILING_JERSEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+\d{1,2}$").expect("hardcoded regex pattern is valid"));
static MOBILE_LABEL_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)d-md-none|d-print-none|label").expect("hardcoded regex pattern is valid")
});

pub fn css(selector: &str) -> Selector {
    Selector::parse(selector).expect("hardcoded selector is valid")
}

/// Column roles a roster table header can map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RosterCol {
    Name,
    Jersey,
    Position,
    ClassYear,
    BatsThrows,
    Height,
    Weight,
    Hometown,
    PreviousSchool,
}

/// Map a raw roster header cell to its canonical column role.
/// Headers are lowercased with periods stripped and `#` read as "no".
pub fn roster_col(header: &str) -> Option<RosterCol> {
    let h = header
        .to_lowercase()
        .replace('.', "")
        .replace('#', "no")
        .trim()
        .to_string();
    if h == "name" || h == "player" || (h.contains("name") && !h.contains("team")) {
        Some(RosterCol::Name)
    } else if matches!(h.as_str(), "no" | "number" | "num") {
        Some(RosterCol::Jersey)
    } else if h.contains("pos") && !h.contains("previous") {
        Some(RosterCol::Position)
    } else if matches!(h.as_str(), "yr" | "cl" | "class" | "elig" | "eligibility")
        || h.contains("year")
    {
        Some(RosterCol::ClassYear)
    } else if matches!(h.as_str(), "bt" | "b/t" | "b-t") {
        Some(RosterCol::BatsThrows)
    } else if matches!(h.as_str(), "ht" | "height") {
        Some(RosterCol::Height)
    } else if matches!(h.as_str(), "wt" | "weight") {
        Some(RosterCol::Weight)
    } else if h.contains("hometown") {
        Some(RosterCol::Hometown)
    } else if h.contains("high school") || h == "hs" || h.contains("previous") {
        Some(RosterCol::PreviousSchool)
    } else {
        None
    }
}

/// Normalize a stats header cell: lowercase, strip periods and percent signs.
pub fn clean_stat_header(header: &str) -> String {
    header
        .to_lowercase()
        .replace(['.', '%'], "")
        .trim()
        .to_string()
}

/// Canonical batting field for a cleaned stats header, if any.
pub fn batting_col(header: &str) -> Option<&'static str> {
    Some(match header {
        "g" | "gp" | "gp-gs" => "games",
        "ab" => "at_bats",
        "r" => "runs",
        "h" => "hits",
        "2b" => "doubles",
        "3b" => "triples",
        "hr" => "home_runs",
        "rbi" => "rbi",
        "bb" => "walks",
        "so" | "k" => "strikeouts",
        "sb" | "sb-att" => "stolen_bases",
        "cs" => "caught_stealing",
        "avg" | "ba" => "batting_average",
        "obp" | "ob" => "on_base_percentage",
        "slg" => "slugging_percentage",
        "ops" => "ops",
        "hbp" => "hit_by_pitch",
        "sf" => "sacrifice_flies",
        "sh" => "sacrifice_hits",
        "tb" => "total_bases",
        _ => return None,
    })
}

/// Canonical pitching field for a cleaned stats header, if any.
pub fn pitching_col(header: &str) -> Option<&'static str> {
    Some(match header {
        "app" | "g" => "appearances",
        "gs" => "games_started",
        "w" => "wins",
        "l" => "losses",
        "sv" => "saves",
        "cg" => "complete_games",
        "sho" => "shutouts",
        "ip" => "innings_pitched",
        "h" => "hits_allowed",
        "r" => "runs_allowed",
        "er" => "earned_runs",
        "bb" => "walks",
        "so" | "k" => "strikeouts",
        "hr" => "home_runs_allowed",
        "era" => "era",
        "whip" => "whip",
        "hbp" => "hit_batters",
        "wp" => "wild_pitches",
        "bk" => "balks",
        _ => return None,
    })
}

/// Strip placeholder tokens and take the first number of an "A - B" pair
/// (GP-GS, SB-ATT style columns).
fn usable_token(raw: &str) -> Option<&str> {
    let v = raw.trim();
    if v.is_empty() || matches!(v, "-" | "--" | "." | "N/A") {
        return None;
    }
    Some(match v.split_once(" - ") {
        Some((first, _)) => first.trim(),
        None => v,
    })
}

pub fn parse_count(raw: &str) -> Option<i64> {
    usable_token(raw)?.parse::<f64>().ok().map(|f| f as i64)
}

pub fn parse_rate(raw: &str) -> Option<f64> {
    usable_token(raw)?.parse::<f64>().ok()
}

/// Innings pitched in thirds notation: the digit after the decimal point is
/// outs, not tenths ("45.1" is 45 and one third).
pub fn parse_innings(raw: &str) -> Option<f64> {
    let token = usable_token(raw)?;
    match token.split_once('.') {
        Some((whole, partial)) => {
            let whole: i64 = whole.parse().ok()?;
            let partial: i64 = if partial.is_empty() {
                0
            } else {
                partial.parse().ok()?
            };
            Some(whole as f64 + partial as f64 / 3.0)
        }
        None => token.parse::<f64>().ok(),
    }
}

/// Assign one parsed stat value onto a batting block by canonical field name.
pub fn set_batting(stats: &mut BattingStats, field: &str, raw: &str) {
    match field {
        "games" => stats.games = parse_count(raw).or(stats.games),
        "at_bats" => stats.at_bats = parse_count(raw).or(stats.at_bats),
        "runs" => stats.runs = parse_count(raw).or(stats.runs),
        "hits" => stats.hits = parse_count(raw).or(stats.hits),
        "doubles" => stats.doubles = parse_count(raw).or(stats.doubles),
        "triples" => stats.triples = parse_count(raw).or(stats.triples),
        "home_runs" => stats.home_runs = parse_count(raw).or(stats.home_runs),
        "rbi" => stats.rbi = parse_count(raw).or(stats.rbi),
        "walks" => stats.walks = parse_count(raw).or(stats.walks),
        "strikeouts" => stats.strikeouts = parse_count(raw).or(stats.strikeouts),
        "stolen_bases" => stats.stolen_bases = parse_count(raw).or(stats.stolen_bases),
        "caught_stealing" => stats.caught_stealing = parse_count(raw).or(stats.caught_stealing),
        "hit_by_pitch" => stats.hit_by_pitch = parse_count(raw).or(stats.hit_by_pitch),
        "sacrifice_flies" => stats.sacrifice_flies = parse_count(raw).or(stats.sacrifice_flies),
        "sacrifice_hits" => stats.sacrifice_hits = parse_count(raw).or(stats.sacrifice_hits),
        "total_bases" => stats.total_bases = parse_count(raw).or(stats.total_bases),
        "grounded_into_dp" => stats.grounded_into_dp = parse_count(raw).or(stats.grounded_into_dp),
        "batting_average" => stats.batting_average = parse_rate(raw).or(stats.batting_average),
        "on_base_percentage" => {
            stats.on_base_percentage = parse_rate(raw).or(stats.on_base_percentage)
        }
        "slugging_percentage" => {
            stats.slugging_percentage = parse_rate(raw).or(stats.slugging_percentage)
        }
        "ops" => stats.ops = parse_rate(raw).or(stats.ops),
        _ => {}
    }
}

/// Assign one parsed stat value onto a pitching block by canonical field name.
pub fn set_pitching(stats: &mut PitchingStats, field: &str, raw: &str) {
    match field {
        "appearances" => stats.appearances = parse_count(raw).or(stats.appearances),
        "games_started" => stats.games_started = parse_count(raw).or(stats.games_started),
        "wins" => stats.wins = parse_count(raw).or(stats.wins),
        "losses" => stats.losses = parse_count(raw).or(stats.losses),
        "saves" => stats.saves = parse_count(raw).or(stats.saves),
        "complete_games" => stats.complete_games = parse_count(raw).or(stats.complete_games),
        "shutouts" => stats.shutouts = parse_count(raw).or(stats.shutouts),
        "innings_pitched" => stats.innings_pitched = parse_innings(raw).or(stats.innings_pitched),
        "hits_allowed" => stats.hits_allowed = parse_count(raw).or(stats.hits_allowed),
        "runs_allowed" => stats.runs_allowed = parse_count(raw).or(stats.runs_allowed),
        "earned_runs" => stats.earned_runs = parse_count(raw).or(stats.earned_runs),
        "walks" => stats.walks = parse_count(raw).or(stats.walks),
        "strikeouts" => stats.strikeouts = parse_count(raw).or(stats.strikeouts),
        "home_runs_allowed" => {
            stats.home_runs_allowed = parse_count(raw).or(stats.home_runs_allowed)
        }
        "hit_batters" => stats.hit_batters = parse_count(raw).or(stats.hit_batters),
        "wild_pitches" => stats.wild_pitches = parse_count(raw).or(stats.wild_pitches),
        "balks" => stats.balks = parse_count(raw).or(stats.balks),
        "era" => stats.era = parse_rate(raw).or(stats.era),
        "whip" => stats.whip = parse_rate(raw).or(stats.whip),
        _ => {}
    }
}

/// Visible text of a cell with responsive-design label spans stripped and
/// whitespace collapsed.
pub fn visible_cell_text(cell: ElementRef) -> String {
    let mut out = String::new();
    collect_visible_text(*cell, &mut out);
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn collect_visible_text(node: NodeRef<Node>, out: &mut String) {
    for child in node.children() {
        match child.value() {
            Node::Text(text) => {
                out.push(' ');
                out.push_str(&text);
            }
            Node::Element(el) => {
                if el.name() == "span" {
                    let classes = el.classes().collect::<Vec<_>>().join(" ");
                    if MOBILE_LABEL_CLASS.is_match(&classes) {
                        continue;
                    }
                }
                collect_visible_text(child, out);
            }
            _ => {}
        }
    }
}

/// Extract a player name from a name cell.
///
/// Preference order: `data-sort="Last, First"` attribute, first non-empty
/// link text, then the raw cell text. All paths strip a trailing jersey
/// number token and normalize "Last, First" to "First Last".
pub fn extract_name(cell: ElementRef) -> String {
    if let Some(data_sort) = cell.value().attr("data-sort") {
        if data_sort.contains(',') {
            let name = crate::models::normalize_name_order(data_sort);
            if !name.trim().is_empty() {
                return name;
            }
        }
    }

    let link_sel = css("a");
    for link in cell.select(&link_sel) {
        let raw: String = link.text().collect();
        let cleaned = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if !cleaned.is_empty() {
            let stripped = TRAILING_JERSEY.replace(&cleaned, "").to_string();
            if !stripped.is_empty() {
                return crate::models::normalize_name_order(&stripped);
            }
        }
    }

    let text = visible_cell_text(cell);
    let stripped = TRAILING_JERSEY.replace(&text, "").to_string();
    crate::models::normalize_name_order(&stripped)
}

/// Header labels of a table: first row inside `<thead>`, else the first row
/// of the table. Raw text, for the caller to normalize per context.
pub fn header_texts(table: ElementRef) -> Vec<String> {
    let cell_sel = css("th, td");
    let head_row = table
        .select(&css("thead tr"))
        .next()
        .or_else(|| table.select(&css("tr")).next());
    match head_row {
        Some(row) => row
            .select(&cell_sel)
            .map(|c| c.text().collect::<String>().trim().to_string())
            .collect(),
        None => Vec::new(),
    }
}

/// Data rows of a table: `<tbody>` rows when present, else every row after
/// the header row.
pub fn data_rows(table: ElementRef) -> Vec<ElementRef<'_>> {
    let tr_sel = css("tr");
    if let Some(tbody) = table.select(&css("tbody")).next() {
        tbody.select(&tr_sel).collect()
    } else {
        table.select(&tr_sel).skip(1).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn cell_doc(inner: &str) -> Html {
        Html::parse_document(&format!("<table><tbody><tr>{inner}</tr></tbody></table>"))
    }

    #[test]
    fn innings_thirds_notation() {
        let one_third = parse_innings("45.1").unwrap();
        let two_thirds = parse_innings("45.2").unwrap();
        assert!((one_third - (45.0 + 1.0 / 3.0)).abs() < 1e-9);
        assert!((two_thirds - (45.0 + 2.0 / 3.0)).abs() < 1e-9);
        assert_eq!(parse_innings("45"), Some(45.0));
        assert_eq!(parse_innings("-"), None);
    }

    #[test]
    fn pair_values_take_first_number() {
        assert_eq!(parse_count("14 - 9"), Some(14));
        assert_eq!(parse_count("23"), Some(23));
        assert_eq!(parse_count("N/A"), None);
    }

    #[test]
    fn roster_headers_map_to_canonical_columns() {
        assert_eq!(roster_col("No."), Some(RosterCol::Jersey));
        assert_eq!(roster_col("#"), Some(RosterCol::Jersey));
        assert_eq!(roster_col("Name"), Some(RosterCol::Name));
        assert_eq!(roster_col("Pos."), Some(RosterCol::Position));
        assert_eq!(roster_col("Yr"), Some(RosterCol::ClassYear));
        assert_eq!(roster_col("Ht"), Some(RosterCol::Height));
        assert_eq!(roster_col("Wt"), Some(RosterCol::Weight));
        assert_eq!(roster_col("B/T"), Some(RosterCol::BatsThrows));
        assert_eq!(roster_col("High School"), Some(RosterCol::PreviousSchool));
        assert_eq!(roster_col("Previous School"), Some(RosterCol::PreviousSchool));
        assert_eq!(roster_col("GP"), None);
    }

    #[test]
    fn stat_headers_disambiguate_by_context() {
        assert_eq!(batting_col("h"), Some("hits"));
        assert_eq!(pitching_col("h"), Some("hits_allowed"));
        assert_eq!(batting_col("so"), Some("strikeouts"));
        assert_eq!(pitching_col("era"), Some("era"));
        assert_eq!(batting_col("era"), None);
    }

    #[test]
    fn name_extraction_prefers_data_sort() {
        let doc = cell_doc(
            r#"<td data-sort="Ellis, Briggs"><a href="/p/1">Briggs
            Ellis 0</a></td>"#,
        );
        let cell = doc.select(&css("td")).next().unwrap();
        assert_eq!(extract_name(cell), "Briggs Ellis");
    }

    #[test]
    fn name_extraction_strips_jersey_and_reorders() {
        let doc = cell_doc(r#"<td><a href="/p/2">Doe,   Jane 12</a></td>"#);
        let cell = doc.select(&css("td")).next().unwrap();
        assert_eq!(extract_name(cell), "Jane Doe");
    }

    #[test]
    fn mobile_label_spans_are_stripped() {
        let doc = cell_doc(r#"<td><span class="label d-md-none">Pos.:</span> SS</td>"#);
        let cell = doc.select(&css("td")).next().unwrap();
        assert_eq!(visible_cell_text(cell), "SS");
    }
}

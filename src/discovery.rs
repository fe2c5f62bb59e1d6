//! Fallback URL discovery for targets where the standard path templates all
//! come back not-found. Crawls the athletics homepage for roster/stats
//! links, hops through a scored sport landing page when needed, and scans
//! `/sitemap.xml` as a last resort.

use crate::client::{DelayClass, ProtectedClient};
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::{Regex, RegexSet};
use scraper::{Html, Selector};
use std::sync::LazyLock;
use tracing::{debug, info};
use url::Url;

static ROSTER_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)baseball.*roster",
        r"(?i)roster.*baseball",
        r"(?i)/roster\.aspx\?.*baseball",
        r"(?i)/sport/m-basebl/roster",
        r"(?i)/sports/bsb/.*roster",
        r"(?i)/sports/m-baseb[al]*/.*roster",
        r"(?i)/teams/baseball/roster",
        r"(?i)/athletics/baseball/roster",
    ])
    .expect("hardcoded patterns are valid")
});

static STATS_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)baseball.*stat",
        r"(?i)stat.*baseball",
        r"(?i)/teamstats\.aspx\?.*baseball",
        r"(?i)/sport/m-basebl/stat",
        r"(?i)/sports/bsb/.*stat",
        r"(?i)/sports/m-baseb[al]*/.*stat",
        r"(?i)/teams/baseball/stat",
        r"(?i)/athletics/baseball/stat",
        r"(?i)teamcume\.htm",
    ])
    .expect("hardcoded patterns are valid")
});

static LANDING_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)/sports?/baseball\b",
        r"(?i)/sport/m-basebl\b",
        r"(?i)/sports?/bsb\b",
        r"(?i)/sports?/m-baseb",
        r"(?i)/teams/baseball\b",
        r"(?i)\bbaseball\b",
    ])
    .expect("hardcoded patterns are valid")
});

static SUBPAGE_PENALTY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)roster|stats|schedule|recruit").expect("hardcoded regex pattern is valid")
});
static ROSTER_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\broster\b").expect("hardcoded regex pattern is valid"));
static STAT_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bstat").expect("hardcoded regex pattern is valid"));

/// Minimum score for a link to count as a sport landing page.
const LANDING_MIN_SCORE: i32 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredUrls {
    pub roster_url: String,
    pub stats_url: Option<String>,
}

/// Crawl for baseball roster/stats URLs. A result without a roster URL is
/// useless, so only roster-bearing results are returned.
pub async fn discover_baseball_urls(
    client: &mut ProtectedClient,
    base_url: &str,
) -> Option<DiscoveredUrls> {
    let base_url = base_url.trim_end_matches('/');
    let base_host = Url::parse(base_url).ok()?.host_str()?.to_string();
    info!(base_url, "url discovery: crawling homepage");

    let homepage = client.get(base_url, DelayClass::Request, None).await.ok();
    if let Some(page) = &homepage {
        if let Some(found) = scan_for_roster_stats(&page.body, base_url, &base_host) {
            info!(roster_url = %found.roster_url, "url discovery: found on homepage");
            return Some(found);
        }
        if let Some(landing_url) = best_landing_link(&page.body, base_url, &base_host) {
            info!(%landing_url, "url discovery: trying sport landing page");
            if let Ok(landing) = client.get(&landing_url, DelayClass::Request, None).await {
                if let Some(found) = scan_landing(&landing.body, &landing_url, &base_host) {
                    info!(roster_url = %found.roster_url, "url discovery: found via landing page");
                    return Some(found);
                }
            }
        }
    }

    let sitemap_url = format!("{base_url}/sitemap.xml");
    if let Ok(sitemap) = client.get(&sitemap_url, DelayClass::Request, None).await {
        if let Some(found) = scan_sitemap(&sitemap.body) {
            info!(roster_url = %found.roster_url, "url discovery: found via sitemap");
            return Some(found);
        }
    }

    debug!(base_url, "url discovery: nothing found");
    None
}

/// True when two hosts belong to the same site: one is a subdomain of the
/// other, or they share a registrable base (last two labels). Used when a
/// redirect lands off the configured domain.
pub fn is_related_domain(a: &str, b: &str) -> bool {
    let a = a.trim_start_matches("www.").to_lowercase();
    let b = b.trim_start_matches("www.").to_lowercase();
    if a == b {
        return true;
    }
    if a.ends_with(&format!(".{b}")) || b.ends_with(&format!(".{a}")) {
        return true;
    }
    let base = |host: &str| {
        let labels: Vec<&str> = host.split('.').collect();
        labels
            .len()
            .checked_sub(2)
            .map(|i| labels[i..].join("."))
    };
    match (base(&a), base(&b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

fn anchor_selector() -> Selector {
    Selector::parse("a[href]").expect("hardcoded selector is valid")
}

/// Same-domain anchors of a page as (absolute URL, href, text) triples.
fn same_domain_links(html: &str, page_url: &str, base_host: &str) -> Vec<(String, String, String)> {
    let Ok(page) = Url::parse(page_url) else {
        return Vec::new();
    };
    let doc = Html::parse_document(html);
    let sel = anchor_selector();
    let mut links = Vec::new();
    for anchor in doc.select(&sel) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Ok(full) = page.join(href) else {
            continue;
        };
        if full.host_str() != Some(base_host) {
            continue;
        }
        let text = anchor
            .text()
            .collect::<String>()
            .trim()
            .to_lowercase();
        links.push((full.to_string(), href.to_string(), text));
    }
    links
}

fn scan_for_roster_stats(html: &str, page_url: &str, base_host: &str) -> Option<DiscoveredUrls> {
    let mut roster_url = None;
    let mut stats_url = None;
    for (full, href, text) in same_domain_links(html, page_url, base_host) {
        if roster_url.is_none()
            && (ROSTER_PATTERNS.is_match(&href) || ROSTER_PATTERNS.is_match(&text))
        {
            roster_url = Some(full.clone());
        }
        if stats_url.is_none() && (STATS_PATTERNS.is_match(&href) || STATS_PATTERNS.is_match(&text))
        {
            stats_url = Some(full);
        }
        if roster_url.is_some() && stats_url.is_some() {
            break;
        }
    }
    roster_url.map(|roster_url| DiscoveredUrls {
        roster_url,
        stats_url,
    })
}

/// Score one anchor as a candidate sport landing page. Path matches weigh
/// more than text matches; direct roster/stats/schedule links are penalized
/// because the landing page itself is wanted, not a sub-page.
fn landing_score(href: &str, text: &str) -> i32 {
    let href_hits = LANDING_PATTERNS.matches(href).iter().count() as i32;
    let text_hits = LANDING_PATTERNS.matches(text).iter().count() as i32;
    let mut score = href_hits * 2 + text_hits;
    if SUBPAGE_PENALTY.is_match(href) {
        score -= 1;
    }
    score
}

fn best_landing_link(html: &str, base_url: &str, base_host: &str) -> Option<String> {
    same_domain_links(html, base_url, base_host)
        .into_iter()
        .filter_map(|(full, href, text)| {
            let score = landing_score(&href, &text);
            (score >= LANDING_MIN_SCORE).then_some((score, full))
        })
        .max_by_key(|(score, _)| *score)
        .map(|(_, full)| full)
}

/// On a sport landing page plain "roster"/"stat" words are specific enough.
fn scan_landing(html: &str, page_url: &str, base_host: &str) -> Option<DiscoveredUrls> {
    let mut roster_url = None;
    let mut stats_url = None;
    for (full, href, text) in same_domain_links(html, page_url, base_host) {
        if roster_url.is_none() && (ROSTER_WORD.is_match(&href) || ROSTER_WORD.is_match(&text)) {
            roster_url = Some(full.clone());
        }
        if stats_url.is_none() && (STAT_WORD.is_match(&href) || STAT_WORD.is_match(&text)) {
            stats_url = Some(full);
        }
        if roster_url.is_some() && stats_url.is_some() {
            break;
        }
    }
    roster_url.map(|roster_url| DiscoveredUrls {
        roster_url,
        stats_url,
    })
}

fn scan_sitemap(xml: &str) -> Option<DiscoveredUrls> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut in_loc = false;
    let mut roster_url = None;
    let mut stats_url = None;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"loc" => in_loc = true,
            Ok(Event::End(e)) if e.name().as_ref() == b"loc" => in_loc = false,
            Ok(Event::Text(t)) if in_loc => {
                let Ok(loc) = t.unescape() else { continue };
                let loc = loc.trim();
                if roster_url.is_none() && ROSTER_PATTERNS.is_match(loc) {
                    roster_url = Some(loc.to_string());
                }
                if stats_url.is_none() && STATS_PATTERNS.is_match(loc) {
                    stats_url = Some(loc.to_string());
                }
                if roster_url.is_some() && stats_url.is_some() {
                    break;
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
    }
    roster_url.map(|roster_url| DiscoveredUrls {
        roster_url,
        stats_url,
    })
}

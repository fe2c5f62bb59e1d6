//! # Dugout
//!
//! A polite, resumable harvester for college baseball rosters and season
//! statistics. Dugout walks a directory of athletics sites, adapts to the
//! platform each one runs (server-rendered tables, card grids, JSON-LD, or
//! fully client-rendered payload graphs), and lands normalized players and
//! stat lines in SQLite.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────┐   ┌────────────┐   ┌──────────┐
//! │ Scheduler │──▶│ Orchestrator │──▶│ Extraction │──▶│  SQLite  │
//! │ tier/day  │   │ client+paths │   │  cascade   │   │  store   │
//! └───────────┘   └──────┬───────┘   └────────────┘   └──────────┘
//!                        │
//!                  ┌─────┴──────┐
//!                  │ Discovery  │  (crawl fallback)
//!                  │ Renderer   │  (headless fallback)
//!                  └────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`client`] | Protected HTTP client (pacing, budgets, breaker) |
//! | [`discovery`] | Roster/stats URL discovery crawl |
//! | [`extract`] | Roster and stats extraction cascades |
//! | [`render`] | Headless-browser rendering fallback |
//! | [`scheduler`] | Tier-based target scheduling |
//! | [`orchestrate`] | Per-target scrape flow and run loop |
//! | [`store`] | Persistence gateway |
//! | [`status`] | Coverage and session reporting |
//! | [`cleanup`] | Invalid-name data repair |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod cleanup;
pub mod client;
pub mod config;
pub mod db;
pub mod discovery;
pub mod extract;
pub mod migrate;
pub mod models;
pub mod orchestrate;
pub mod render;
pub mod scheduler;
pub mod status;
pub mod store;

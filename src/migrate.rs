use anyhow::Result;
use sqlx::SqlitePool;

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Organizations: primary key is the stable derived id, so re-runs of the
    // same directory always land on the same row.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS organizations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            tier TEXT NOT NULL,
            conference TEXT NOT NULL DEFAULT '',
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS players (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            org_id INTEGER NOT NULL,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            jersey_number TEXT,
            position TEXT,
            class_year TEXT,
            height_inches INTEGER,
            weight_lbs INTEGER,
            bats TEXT,
            throws TEXT,
            hometown TEXT,
            previous_school TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE(org_id, first_name, last_name),
            FOREIGN KEY (org_id) REFERENCES organizations(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // One stat row per player per season; conflicts replace in full.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS batting_stats (
            player_id INTEGER PRIMARY KEY,
            season INTEGER NOT NULL,
            g INTEGER, ab INTEGER, r INTEGER, h INTEGER,
            doubles INTEGER, triples INTEGER, hr INTEGER, rbi INTEGER,
            bb INTEGER, k INTEGER, sb INTEGER, cs INTEGER,
            hbp INTEGER, sf INTEGER, sh INTEGER, gidp INTEGER, tb INTEGER,
            avg REAL, obp REAL, slg REAL, ops REAL,
            xbh INTEGER, xbh_to_k REAL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            FOREIGN KEY (player_id) REFERENCES players(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pitching_stats (
            player_id INTEGER PRIMARY KEY,
            season INTEGER NOT NULL,
            app INTEGER, gs INTEGER, w INTEGER, l INTEGER, sv INTEGER,
            cg INTEGER, sho INTEGER,
            ip REAL, h INTEGER, r INTEGER, er INTEGER, bb INTEGER, k INTEGER,
            hr_allowed INTEGER, hb INTEGER, wp INTEGER, bk INTEGER,
            era REAL, whip REAL, k_per_9 REAL, bb_per_9 REAL, k_to_bb REAL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            FOREIGN KEY (player_id) REFERENCES players(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS scrape_sessions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            status TEXT NOT NULL DEFAULT 'RUNNING',
            started_at INTEGER NOT NULL,
            completed_at INTEGER,
            targets_completed INTEGER NOT NULL DEFAULT 0,
            players_saved INTEGER NOT NULL DEFAULT 0,
            errors_json TEXT NOT NULL DEFAULT '[]'
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS fetch_history (
            target_name TEXT PRIMARY KEY,
            last_fetched TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_players_org_id ON players(org_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_organizations_tier ON organizations(tier)")
        .execute(pool)
        .await?;

    Ok(())
}

//! Persistence gateway round-trips against a real SQLite file: idempotent
//! saves keyed by (first, last, org), non-empty-field player updates, and
//! the invalid-name repair.

use tempfile::TempDir;

use dugout::models::{BattingStats, PitchingStats, PlayerRecord, ScrapeOutcome, Target};
use dugout::store::Store;
use dugout::{db, migrate};

async fn test_store(tmp: &TempDir) -> Store {
    let pool = db::connect(&tmp.path().join("data").join("dugout.db"))
        .await
        .unwrap();
    migrate::run_migrations(&pool).await.unwrap();
    Store::new(pool)
}

fn sample_outcome() -> ScrapeOutcome {
    let target = Target {
        name: "State University".to_string(),
        tier: "D1".to_string(),
        conference: "Big Conf".to_string(),
        base_url: "https://gostate.example.edu".to_string(),
        roster_path: None,
        stats_path: None,
    };
    let mut outcome = ScrapeOutcome::for_target(&target);

    let mut hitter = PlayerRecord::named("Jane Doe");
    hitter.position = Some("SS".to_string());
    hitter.class_year = Some("Jr.".to_string());
    hitter.height = Some("5-9".to_string());
    hitter.weight = Some("160".to_string());
    let mut batting = BattingStats {
        games: Some(30),
        at_bats: Some(100),
        hits: Some(35),
        doubles: Some(8),
        home_runs: Some(4),
        strikeouts: Some(20),
        ..Default::default()
    };
    batting.compute_derived();
    hitter.batting = Some(batting);

    let mut pitcher = PlayerRecord::named("Alex Smith");
    pitcher.position = Some("RHP".to_string());
    let mut pitching = PitchingStats {
        appearances: Some(12),
        innings_pitched: Some(40.0 + 1.0 / 3.0),
        strikeouts: Some(50),
        walks: Some(15),
        era: Some(3.12),
        ..Default::default()
    };
    pitching.compute_derived();
    pitcher.pitching = Some(pitching);

    outcome.players = vec![hitter, pitcher];
    outcome.success = true;
    outcome
}

async fn count(store: &Store, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(store.pool())
        .await
        .unwrap()
}

#[tokio::test]
async fn saving_the_same_outcome_twice_does_not_duplicate() {
    let tmp = TempDir::new().unwrap();
    let store = test_store(&tmp).await;
    let outcome = sample_outcome();

    let first = store.save_outcome(&outcome).await.unwrap();
    let second = store.save_outcome(&outcome).await.unwrap();
    assert_eq!(first, 2);
    assert_eq!(second, 2);

    assert_eq!(count(&store, "organizations").await, 1);
    assert_eq!(count(&store, "players").await, 2);
    assert_eq!(count(&store, "batting_stats").await, 1);
    assert_eq!(count(&store, "pitching_stats").await, 1);
}

#[tokio::test]
async fn player_updates_keep_existing_fields_when_new_data_is_empty() {
    let tmp = TempDir::new().unwrap();
    let store = test_store(&tmp).await;
    let org_id = store
        .upsert_organization("State University", "D1", "")
        .await
        .unwrap();

    let mut full = PlayerRecord::named("Jane Doe");
    full.position = Some("SS".to_string());
    full.height = Some("5-9".to_string());
    let id_first = store.upsert_player(org_id, &full).await.unwrap().unwrap();

    // A later page knows only the class year.
    let mut sparse = PlayerRecord::named("Doe, Jane");
    sparse.class_year = Some("Jr.".to_string());
    let id_second = store.upsert_player(org_id, &sparse).await.unwrap().unwrap();
    assert_eq!(id_first, id_second);

    let (position, class_year, height): (Option<String>, Option<String>, Option<i64>) =
        sqlx::query_as("SELECT position, class_year, height_inches FROM players WHERE id = ?")
            .bind(id_first)
            .fetch_one(store.pool())
            .await
            .unwrap();
    assert_eq!(position.as_deref(), Some("SS"));
    assert_eq!(class_year.as_deref(), Some("Jr."));
    assert_eq!(height, Some(69));
}

#[tokio::test]
async fn stat_like_names_are_rejected_at_the_store_boundary() {
    let tmp = TempDir::new().unwrap();
    let store = test_store(&tmp).await;
    let org_id = store.upsert_organization("Tech College", "D2", "").await.unwrap();

    for bad in [".500", "4-2", ""] {
        let rejected = store
            .upsert_player(org_id, &PlayerRecord::named(bad))
            .await
            .unwrap();
        assert!(rejected.is_none(), "{bad:?} should be rejected");
    }
    assert_eq!(count(&store, "players").await, 0);
}

#[tokio::test]
async fn cleanup_removes_players_with_stat_value_names() {
    let tmp = TempDir::new().unwrap();
    let store = test_store(&tmp).await;
    let org_id = store.upsert_organization("Tech College", "D2", "").await.unwrap();

    store
        .upsert_player(org_id, &PlayerRecord::named("Sam Lee"))
        .await
        .unwrap();
    // Simulate a row written before name rejection existed.
    sqlx::query(
        "INSERT INTO players (org_id, first_name, last_name, created_at, updated_at)
         VALUES (?, '.500', '', 0, 0)",
    )
    .bind(org_id)
    .execute(store.pool())
    .await
    .unwrap();

    assert_eq!(count(&store, "players").await, 2);
    let removed = store.delete_invalid_players().await.unwrap();
    assert_eq!(removed, 1);
    assert_eq!(count(&store, "players").await, 1);
}

#[tokio::test]
async fn fetch_history_round_trips_and_overwrites() {
    let tmp = TempDir::new().unwrap();
    let store = test_store(&tmp).await;

    let day1 = chrono::NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
    let day2 = chrono::NaiveDate::from_ymd_opt(2026, 3, 4).unwrap();
    store.mark_fetched("State University", day1).await.unwrap();
    store.mark_fetched("State University", day2).await.unwrap();

    let history = store.fetch_history().await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history.get("State University"), Some(&day2));
}

#[tokio::test]
async fn organization_ids_are_stable_across_databases() {
    let tmp_a = TempDir::new().unwrap();
    let tmp_b = TempDir::new().unwrap();
    let store_a = test_store(&tmp_a).await;
    let store_b = test_store(&tmp_b).await;

    let id_a = store_a
        .upsert_organization("State University", "D1", "Big Conf")
        .await
        .unwrap();
    let id_b = store_b
        .upsert_organization("State University", "D1", "Other Conf")
        .await
        .unwrap();
    assert_eq!(id_a, id_b);
}

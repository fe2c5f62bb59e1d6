//! The `cleanup` command: remove players whose stored name is a stat value,
//! a repair for rows written before name rejection was in place.

use anyhow::Result;

use crate::config::Config;
use crate::store::Store;
use crate::{db, migrate};

pub async fn cleanup(config: &Config) -> Result<()> {
    let pool = db::connect(&config.store.path).await?;
    migrate::run_migrations(&pool).await?;
    let store = Store::new(pool);

    let removed = store.delete_invalid_players().await?;
    if removed == 0 {
        println!("No bad records found.");
    } else {
        println!("Deleted {removed} players with invalid names (and their stat rows).");
    }
    Ok(())
}

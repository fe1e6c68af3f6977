/*!
 * Harbor Daemon
 * Wires the browser core together and drives the background indexer
 */

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use fileharbor::{
    init_tracing, Config, IndexScheduler, Indexer, MetadataCache, PathRegistry, Store,
    SystemClock, UserStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Config::from_env();
    info!(db = %config.db_path.display(), "opening metadata store");
    let store = Store::open(&config.db_path)?;

    let users = UserStore::new(store.clone());
    let registry = PathRegistry::new(store.clone());

    let admin = users.ensure_admin()?;
    if registry.home_for(&admin.username)?.is_none() {
        let admin_home = config.default_root.join(&admin.username);
        std::fs::create_dir_all(&admin_home)?;
        let prefix = format!("/{}", admin.username);
        registry.set_path(&admin.username, &prefix, &admin_home.to_string_lossy())?;
        info!(home = %admin_home.display(), "mapped admin home directory");
    }

    let cache = MetadataCache::new(store, Arc::new(SystemClock));
    let indexer = Indexer::new(cache, registry);
    let mut scheduler = IndexScheduler::new(indexer);
    scheduler.start(config.sweep_interval);

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    scheduler.stop();
    Ok(())
}

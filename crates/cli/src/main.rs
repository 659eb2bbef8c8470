use std::sync::Arc;

use engine::{ConfigStore, DocumentCache, Session};

mod client;
mod commands;
mod config;
mod error;
mod export;

use crate::error::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let (settings, command) = config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "taxreport={level},engine={level}",
            level = settings.level
        ))
        .with_writer(std::io::stderr)
        .init();

    let cache = DocumentCache::new(&settings.cache_dir);
    if !settings.keep_cache {
        cache.clear().await?;
    }

    let session = Session::builder()
        .store(ConfigStore::new(&settings.state_path))
        .connector(Arc::new(client::HttpConnector::new()))
        .build()?;

    if let Err(err) = commands::run(command, &session, &cache).await {
        tracing::error!("{err}");
        return Err(err);
    }
    Ok(())
}

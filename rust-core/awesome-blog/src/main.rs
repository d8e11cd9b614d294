//! `awesome` binary: load configuration, open the store and serve the blog.

use anyhow::Context;
use awesome_blog::config::LogSection;
use awesome_blog::database::Database;
use awesome_blog::templates::Templates;
use awesome_blog::{build_server, AppConfig};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;
    init_tracing(&config.log);

    let db = Database::connect(&config.database.url, config.database.max_connections)
        .await
        .context("failed to open database")?;
    db.init_schema().await.context("failed to create schema")?;

    let templates = Templates::from_directory(&config.templates.directory);
    let server = build_server(&config, db.clone(), Arc::new(templates))?;

    info!(version = awesome_core::VERSION, "awesome blog starting");
    server.serve().await?;

    db.close().await;
    info!("awesome blog stopped");
    Ok(())
}

/// `RUST_LOG` wins over the configured filter
fn init_tracing(log: &LogSection) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&log.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if log.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

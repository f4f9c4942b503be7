use std::path::PathBuf;

use anyhow::{Context, Result};
use glean_api::build_app;
use glean_commands::Services;
use glean_config::load_settings;
use glean_store::Datastore;
use tracing::info;

fn default_store_path() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".glean")
        .join("state.redb")
}

pub async fn serve(
    config: Option<PathBuf>,
    bind: Option<String>,
    port: Option<u16>,
    store_path: Option<PathBuf>,
    ephemeral: bool,
) -> Result<()> {
    let mut settings =
        load_settings(config.as_deref()).context("failed to load settings")?;
    if let Some(bind) = bind {
        settings.server.bind = bind;
    }
    if let Some(port) = port {
        settings.server.port = port;
    }

    let store = if ephemeral {
        info!("using in-memory (ephemeral) store — state will be lost on exit");
        Datastore::in_memory(settings.audit.retention_days)
    } else {
        let path = store_path.unwrap_or_else(default_store_path);
        info!("using persistent store at {}", path.display());
        Datastore::open_redb(&path, settings.audit.retention_days)
            .with_context(|| format!("failed to open store at {}", path.display()))?
    };

    let addr = format!("{}:{}", settings.server.bind, settings.server.port);
    let services = Services::build(store, settings);
    let app = build_app(services);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("glean api listening on {}", addr);

    axum::serve(listener, app).await.context("server exited")?;
    Ok(())
}

pub fn check_config(config: Option<PathBuf>) -> Result<()> {
    let settings = load_settings(config.as_deref()).context("settings invalid")?;
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ServerConfig;

/// Filter used when `RUST_LOG` is unset: the configured level for our own
/// crates and the HTTP trace layer.
pub fn default_directives(level: &str) -> String {
    format!("tokengate_web={level},tokengate_core={level},tower_http={level}")
}

pub fn init(config: &ServerConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directives(&config.log_level)))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    Ok(())
}

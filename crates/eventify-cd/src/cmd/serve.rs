use anyhow::{bail, Context};
use eventify_cd_core::config::{Config, WarnLevel};
use eventify_cd_server::AppState;
use std::path::Path;

pub fn run(config_path: Option<&Path>, host: &str, port: u16) -> anyhow::Result<()> {
    let config = Config::load_or_default(config_path)?;
    let mut errors = 0;
    for warning in config.validate() {
        match warning.level {
            WarnLevel::Error => {
                errors += 1;
                tracing::error!("config: {}", warning.message);
            }
            WarnLevel::Warning => tracing::warn!("config: {}", warning.message),
        }
    }
    if errors > 0 {
        bail!("config has {errors} error(s); refusing to start");
    }

    tracing::info!(
        repository = %config.repository.url,
        branch = %config.repository.branch,
        checkout = %config.checkout_path().display(),
        cooldown_secs = config.cooldown_secs,
        "loaded deployment config"
    );

    let state = AppState::new(config)?;
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let listener = tokio::net::TcpListener::bind((host, port))
            .await
            .with_context(|| format!("failed to bind {host}:{port}"))?;

        tokio::select! {
            res = eventify_cd_server::serve_on(state, listener) => res,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                Ok(())
            }
        }
    })
}

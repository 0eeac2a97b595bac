use traefik_config_manager::config::load_from_env;
use traefik_config_manager::lifecycle;
use traefik_config_manager::observability::{logging, metrics};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_from_env()?;
    logging::init_logging(&config.observability);

    tracing::info!("traefik-config-manager v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        dynamic_dir = %config.paths.dynamic_dir.display(),
        metadata_dir = %config.paths.metadata_dir.display(),
        backups_dir = %config.paths.backups_dir.display(),
        max_backups = config.backups.max_backups,
        watcher_enabled = config.watcher.enabled,
        debounce_ms = config.watcher.debounce_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    if let Err(e) = lifecycle::run(config).await {
        tracing::error!(error = %e, "Manager exited with error");
        return Err(e.into());
    }
    Ok(())
}

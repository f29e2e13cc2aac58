use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use recordstore::demo::run_demo;
use recordstore::StoreConfig;

fn main() -> Result<()> {
    // Initialize logging; RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = StoreConfig::load()?;
    info!("Opening {} backend", config.backend);

    let handler = config.open_handler()?;
    info!("Using backend: {}", handler.kind());

    if config.run_demo {
        let report = run_demo(handler.as_ref())?;
        info!("Demo finished for record {}", report.id);
    }

    handler.close()?;
    Ok(())
}

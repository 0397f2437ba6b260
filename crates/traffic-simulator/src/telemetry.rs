use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter, Registry};

/// Installs the global subscriber. Filtering follows `RUST_LOG` and defaults to `info`.
pub fn setup_telemetry(service_name: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    Registry::default()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_thread_names(true))
        .try_init()?;

    info!("Setup tracing for {}", service_name);

    Ok(())
}

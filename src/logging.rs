//! Logging setup for services embedding the core

use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initialize the tracing subscriber. `RUST_LOG` wins when set.
pub fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            EnvFilter::new("shardvault_core=debug")
        } else {
            EnvFilter::new("shardvault_core=info")
        }
    });

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Initialize logging, keeping going if a subscriber is already installed
pub fn init_logging_safe() {
    if let Err(e) = init_logging() {
        eprintln!("Warning: failed to set up logging: {}", e);
    }
}

//! The `mindroom` server binary.
//!
//! Logging follows `RUST_LOG` (default `info`); everything else comes from
//! the `MINDROOM_*` variables described in [`ServerConfig`].

use mindroom::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), MindroomError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .compact()
        .init();

    let config = ServerConfig::from_env()?;
    let server = MindroomServerBuilder::new()
        .config(config)
        .build(InMemoryStore::new())
        .await?;

    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown requested, stopping");
            Ok(())
        }
    }
}

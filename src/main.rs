#![deny(warnings)]
#![deny(clippy::unwrap_used)]

use dotenv::dotenv;
use ssh_forward::tunnel::{ForwardConfig, forward};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    // Initialize logging with proper tracing default
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().expect("valid directive")),
        )
        .init();

    let config = ForwardConfig::from_env();
    info!(
        "Forwarding {} to {} through {}@{}",
        config.local_address, config.remote_address, config.username, config.server_address
    );

    // Stop accepting on Ctrl-C
    let shutdown = CancellationToken::new();
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, shutting down");
            ctrl_c.cancel();
        }
    });

    forward::run_until(config, shutdown).await?;

    Ok(())
}

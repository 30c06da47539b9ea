pub mod config;
pub mod device;
pub mod proxy;
pub mod rumble;

use crate::config::ProxyConfig;
use crate::proxy::proxy_handle::{spawn_shutdown_listener, RumbleProxy};
use color_eyre::{eyre::eyre, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    setup()?;

    let config = ProxyConfig::load().map_err(|e| eyre!("Failed to load configuration: {}", e))?;
    info!(
        "Proxying {} with rumble on {}",
        config.source.path.display(),
        config.actuator.path.display()
    );

    let proxy = RumbleProxy::create(config)
        .map_err(|e| eyre!("Failed to open devices: {}", e))?
        .initialize()
        .map_err(|e| eyre!("Failed to initialize proxy: {}", e))?;

    let shutdown = CancellationToken::new();
    let _signal_handle = spawn_shutdown_listener(shutdown.clone());

    let stats = proxy
        .run(shutdown)
        .await
        .map_err(|e| eyre!("Proxy terminated: {}", e))?;

    info!(
        "Shut down cleanly: {} events forwarded, {} control messages handled",
        stats.events_forwarded, stats.control_messages
    );
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();
}

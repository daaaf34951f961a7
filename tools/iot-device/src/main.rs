//! iotclient device runner
//!
//! Boots the device core on a host machine: reads the stored device record,
//! connects to the configured server and runs the poll loop. SIGUSR1 plays
//! the role of the hardware reset button.

mod host;

use anyhow::{Context, Result};
use clap::Parser;
use iot_client::{
    boot, Boot, ClientConfig, DeviceKind, Exit, FileConfigStore, PollLoopBuilder, ResetHook,
};
use iot_transport::TcpConnector;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "iot-device")]
#[command(about = "Run the iotclient device core against a server")]
#[command(version)]
struct Cli {
    /// Runtime settings (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stored device record (TOML), created on first boot
    #[arg(short, long, default_value = "device.toml")]
    store: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let client_config = match &cli.config {
        Some(path) => ClientConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ClientConfig::default(),
    };
    let kind: DeviceKind = client_config.device_type.parse()?;

    let reset = ResetHook::new();
    watch_reset_signal(reset.clone())?;

    tracing::info!("Starting {} device", kind);

    loop {
        let mut store = FileConfigStore::new(&cli.store);
        let device_config = match boot(&mut store, kind.as_str())
            .with_context(|| format!("booting from {}", cli.store.display()))?
        {
            Boot::Ready(config) => config,
            Boot::Restart(reason) => {
                tracing::info!("Restarting ({:?})", reason);
                continue;
            }
        };

        let device = host::build_device(kind)?;
        let connector = TcpConnector::with_config(client_config.tcp_config());
        let mut poll = PollLoopBuilder::new(connector, device, device_config)
            .client_config(client_config.clone())
            .store(store)
            .reset_hook(reset.clone())
            .build();

        match poll.run_until(shutdown_signal()).await {
            Exit::Shutdown => break,
            Exit::Restart => tracing::info!("Configuration cleared, restarting"),
        }
    }

    tracing::info!("Stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
fn watch_reset_signal(reset: ResetHook) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut usr1 = signal(SignalKind::user_defined1()).context("installing SIGUSR1 handler")?;
    tokio::spawn(async move {
        while usr1.recv().await.is_some() {
            tracing::warn!("Reset signal received");
            reset.trigger();
        }
    });
    Ok(())
}

#[cfg(not(unix))]
fn watch_reset_signal(_reset: ResetHook) -> Result<()> {
    Ok(())
}

use color_eyre::{eyre::eyre, Result};
use eframe::egui;
use rc_relay::config::RelayConfig;
use rc_relay::input::PollerHandle;
use rc_relay::mapping::{MappingHandle, MappingStore};
use rc_relay::relay::{Dispatcher, RelayServer};
use rc_relay::ui::{ConsoleChannels, RelayConsole};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config_dir = RelayConfig::default_dir();
    RelayConfig::ensure_default(&config_dir).await?;
    let config = RelayConfig::load_or_default(&config_dir).await;
    info!("Using config from {}", config_dir.display());

    let mapping = MappingHandle::new(MappingStore::new(RelayConfig::mapping_path(&config_dir)));
    mapping.reload().await;

    let shutdown = CancellationToken::new();
    let heartbeat = config.heartbeat.settings();
    let (status_tx, status_rx) = watch::channel(false);

    let (dispatcher, dispatcher_handle) = Dispatcher::new(
        mapping.subscribe(),
        Box::new(status_tx),
        heartbeat,
        shutdown.clone(),
    );
    let state_rx = dispatcher.subscribe_state();
    let dispatcher_task = tokio::spawn(dispatcher.run());

    let server = RelayServer::bind(
        config.socket_addr()?,
        dispatcher_handle.clone(),
        heartbeat,
        shutdown.clone(),
    )
    .await
    .map_err(|e| eyre!("Failed to start relay: {}", e))?;
    let listen_addr = server.local_addr()?;
    let server_task = tokio::spawn(server.run());

    let poller = PollerHandle::spawn(
        config.gamepad.settings(),
        dispatcher_handle.clone(),
        shutdown.clone(),
    )
    .map_err(|e| eyre!("Failed to spawn gamepad poller: {}", e))?;

    if config.ui.enabled {
        info!("Starting operator console");
        let channels = ConsoleChannels {
            dispatcher: dispatcher_handle,
            state: state_rx,
            status: status_rx,
            live: poller.subscribe(),
            mapping,
            listen_addr,
            runtime: tokio::runtime::Handle::current(),
        };
        let native_options = eframe::NativeOptions {
            viewport: egui::ViewportBuilder::default().with_inner_size([720.0, 480.0]),
            ..Default::default()
        };
        eframe::run_native(
            "RC Relay",
            native_options,
            Box::new(|cc| Ok(Box::new(RelayConsole::new(cc, channels)))),
        )
        .map_err(|e| eyre!("Operator console failed: {}", e))?;
    } else {
        info!("Running headless, press Ctrl-C to stop");
        tokio::signal::ctrl_c().await?;
    }

    info!("Shutting down");
    shutdown.cancel();
    let _ = server_task.await;
    let _ = dispatcher_task.await;
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
        .pretty()
        .init();
}

//! Headless workbench runner.
//!
//! Wires the data plane together without any dashboard UI: connects the
//! relay link (or the synthetic source), subscribes to every source the
//! relay announces, and logs incoming frames. Useful for smoke-testing
//! a relay deployment and as the embedding example for the real UI.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use workbench_core::{
    DataFrame, DataPayload, DataRegistry, MockOptions, MockSource, RelayLink, RelayOptions,
};

#[derive(Parser, Debug)]
#[command(name = "workbench", about = "Headless workbench telemetry monitor", version)]
struct Args {
    /// Unix socket path of the hardware relay.
    #[arg(long, default_value = "/var/run/workbench/hardware-relay.sock")]
    socket_path: PathBuf,

    /// Delay between reconnection attempts, in milliseconds.
    #[arg(long, default_value_t = 2000)]
    reconnect_delay_ms: u64,

    /// Run the synthetic source instead of connecting to the relay.
    #[arg(long)]
    enable_hardware_mock: bool,

    /// Log verbosity (0=error, 1=warn, 2=info, 3=debug, 4=trace).
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u8).range(0..=4))]
    log_level: u8,
}

fn init_tracing(log_level: u8) {
    let default = match log_level {
        0 => "error",
        1 => "warn",
        2 => "info",
        3 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn describe(frame: &DataFrame) -> String {
    match frame.points.first().map(|p| &p.payload) {
        Some(DataPayload::Numeric(sample)) => format!("{:.3} {}", sample.value, sample.unit),
        Some(DataPayload::Waveform(sample)) => {
            format!("waveform: {} samples @ {} Hz", sample.samples.len(), sample.sample_rate_hz)
        }
        Some(DataPayload::Serial(sample)) => format!("serial: {:?}", sample.text),
        Some(DataPayload::Logic(sample)) => format!("logic: {} channels", sample.channels.len()),
        Some(DataPayload::Gpio(sample)) => format!("gpio: {} pins", sample.pins.len()),
        Some(DataPayload::Empty) | None => "empty".to_string(),
    }
}

/// Poll the registry for newly announced sources; log their frames and,
/// when a relay is connected, subscribe to them.
async fn watch_sources(registry: Arc<DataRegistry>, relay: Option<Arc<RelayLink>>) {
    let mut observed: HashSet<String> = HashSet::new();
    loop {
        for metadata in registry.list_sources() {
            if !observed.insert(metadata.id.clone()) {
                continue;
            }
            info!(source = %metadata.id, name = %metadata.name, kind = %metadata.kind, "discovered source");
            let source_id = metadata.id.clone();
            registry.add_observer(&metadata.id, move |frame| {
                info!(source = %source_id, "{}", describe(frame));
            });
            if let Some(relay) = &relay {
                relay.subscribe_source(&metadata.id).await;
            }
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(args.log_level);

    let registry = Arc::new(DataRegistry::new());

    let (relay, mock) = if args.enable_hardware_mock {
        let mock = MockSource::new(registry.clone(), MockOptions::default());
        mock.start();
        (None, Some(mock))
    } else {
        let relay = Arc::new(RelayLink::new(registry.clone()));
        relay.configure(RelayOptions {
            socket_path: args.socket_path.clone(),
            reconnect_delay: Duration::from_millis(args.reconnect_delay_ms),
        });
        relay.start();
        (Some(relay), None)
    };

    let watcher = tokio::spawn(watch_sources(registry.clone(), relay.clone()));

    info!("running; press Ctrl+C to exit");
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to wait for shutdown signal");
    }

    watcher.abort();
    if let Some(relay) = relay {
        relay.stop().await;
    }
    if let Some(mock) = mock {
        mock.stop().await;
    }
    info!("shut down cleanly");
}

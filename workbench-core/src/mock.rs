//! Synthetic telemetry source for running without real hardware.
//!
//! Publishes a sine wave through the same registry path the transports
//! use, so panels and tests behave identically with or without a relay.
//! Whether this runs is an explicit construction-time decision of the
//! embedding application — there is no process-global mock flag.

use std::f64::consts::TAU;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, trace};

use crate::data::{DataFrame, DataKind, DataPayload, DataPoint, NumericSample, SourceMetadata};
use crate::registry::DataRegistry;

/// Waveform and identity of the synthetic source.
#[derive(Debug, Clone)]
pub struct MockOptions {
    pub source_id: String,
    pub source_name: String,
    pub channel_id: String,
    pub unit: String,
    /// Peak deviation from `offset`.
    pub amplitude: f64,
    /// Center value of the wave.
    pub offset: f64,
    pub frequency_hz: f64,
    /// Publish interval.
    pub update_period: Duration,
}

impl Default for MockOptions {
    fn default() -> Self {
        Self {
            source_id: "mock.12v".to_string(),
            source_name: "12V Supply".to_string(),
            channel_id: "12v".to_string(),
            unit: "V".to_string(),
            amplitude: 0.5,
            offset: 12.0,
            frequency_hz: 1.0,
            update_period: Duration::from_millis(20),
        }
    }
}

/// Background generator publishing [`MockOptions`]-shaped frames.
pub struct MockSource {
    registry: Arc<DataRegistry>,
    options: Mutex<MockOptions>,
    worker: Mutex<Option<JoinHandle<()>>>,
    cancel: Mutex<CancellationToken>,
}

impl MockSource {
    pub fn new(registry: Arc<DataRegistry>, options: MockOptions) -> Self {
        Self {
            registry,
            options: Mutex::new(options),
            worker: Mutex::new(None),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// Register the source metadata and spawn the publisher.
    ///
    /// Registration happens synchronously so the source is discoverable
    /// the moment this returns, before the first frame is published.
    /// No-op if already running.
    pub fn start(&self) {
        let mut worker = self.worker.lock().expect("worker lock poisoned");
        if worker.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        let options = self.options.lock().expect("options lock poisoned").clone();
        self.registry.register_source(SourceMetadata {
            id: options.source_id.clone(),
            name: options.source_name.clone(),
            kind: DataKind::Numeric,
            description: "Synthetic sine-wave source".to_string(),
            unit: Some(options.unit.clone()),
        });
        info!(source = %options.source_id, "registered mock source");

        let token = CancellationToken::new();
        *self.cancel.lock().expect("cancel lock poisoned") = token.clone();
        *worker = Some(tokio::spawn(publish_loop(
            self.registry.clone(),
            options,
            token,
        )));
    }

    /// Stop publishing and wait for the worker to exit. The source's
    /// registration and latest frame stay in the registry.
    pub async fn stop(&self) {
        let handle = {
            self.cancel.lock().expect("cancel lock poisoned").cancel();
            self.worker.lock().expect("worker lock poisoned").take()
        };
        if let Some(handle) = handle {
            let _ = handle.await;
            info!("mock source stopped");
        }
    }
}

async fn publish_loop(registry: Arc<DataRegistry>, options: MockOptions, cancel: CancellationToken) {
    let started = Instant::now();
    let mut ticker = tokio::time::interval(options.update_period);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let elapsed = started.elapsed().as_secs_f64();
        let angle = TAU * options.frequency_hz * elapsed;
        let value = options.offset + options.amplitude * angle.sin();
        let now = SystemTime::now();

        registry.update(DataFrame {
            source_id: options.source_id.clone(),
            source_name: options.source_name.clone(),
            points: vec![DataPoint {
                channel_id: options.channel_id.clone(),
                payload: DataPayload::Numeric(NumericSample {
                    value,
                    unit: options.unit.clone(),
                    timestamp: now,
                }),
            }],
            timestamp: now,
        });
        trace!(source = %options.source_id, value, "published mock frame");
    }
}

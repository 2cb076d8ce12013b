//! Persistent client for the external hardware relay process.
//!
//! The relay exposes a JSON-RPC 2.0 endpoint over a Unix domain socket,
//! newline-delimited. [`RelayLink`] keeps one background worker running
//! a connect → register → resync → stream loop: every inbound
//! `workbench.dataFrame` notification becomes a [`DataRegistry`] update,
//! and subscription changes from any caller become outbound requests.
//!
//! The remote side keeps no durable subscription state, so after every
//! successful connect the link re-sends `workbench.subscribe` for each
//! id in its local set before it starts streaming.
//!
//! Transport failures never escape this module: an I/O error drops the
//! link back to [`LinkPhase::Disconnected`] and the worker retries after
//! the configured backoff until [`RelayLink::stop`] is called.

pub mod channel;
pub mod state;
mod translate;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::error::WorkbenchError;
use crate::registry::DataRegistry;
use channel::{ChannelOpener, ChannelWriter, UnixSocketOpener};
use state::LinkPhase;

/// Protocol revision announced in `workbench.registerClient`.
const PROTOCOL_VERSION: u32 = 1;

mod methods {
    pub const REGISTER_CLIENT: &str = "workbench.registerClient";
    pub const SUBSCRIBE: &str = "workbench.subscribe";
    pub const UNSUBSCRIBE: &str = "workbench.unsubscribe";
    pub const RESET_METRIC: &str = "workbench.resetMetric";
    pub const DATA_FRAME: &str = "workbench.dataFrame";
    pub const METADATA: &str = "workbench.metadata";
}

// ── Options ──────────────────────────────────────────────────────

/// Connection configuration for [`RelayLink`].
#[derive(Debug, Clone)]
pub struct RelayOptions {
    /// Filesystem path of the relay's Unix domain socket.
    pub socket_path: PathBuf,
    /// Backoff between connection attempts.
    pub reconnect_delay: Duration,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from("/var/run/workbench/hardware-relay.sock"),
            reconnect_delay: Duration::from_secs(2),
        }
    }
}

// ── Outbound envelopes ───────────────────────────────────────────

#[derive(Serialize)]
struct RpcRequest<P: Serialize> {
    jsonrpc: &'static str,
    id: String,
    method: &'static str,
    params: P,
}

#[derive(Serialize)]
struct RegisterClientParams {
    protocol: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionParams<'a> {
    source_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MetricResetParams<'a> {
    source_id: &'a str,
    channel_id: &'a str,
    metric: &'a str,
}

// ── Shared worker state ──────────────────────────────────────────

struct Shared {
    registry: Arc<DataRegistry>,
    phase: StdMutex<LinkPhase>,
    /// Send half of the current channel; `None` while disconnected.
    /// Its own lock serializes concurrent senders.
    writer: tokio::sync::Mutex<Option<Box<dyn ChannelWriter>>>,
    /// Local subscription set, guarded independently of the send lock
    /// so membership decisions never hold up the wire.
    subscriptions: StdMutex<BTreeSet<String>>,
    request_counter: AtomicU64,
}

impl Shared {
    fn next_request_id(&self) -> String {
        format!("ui-{}", self.request_counter.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Serialize and send one request line. Silently does nothing while
    /// disconnected; a send failure is logged and left for the read
    /// loop to notice.
    async fn send_request<P: Serialize>(&self, method: &'static str, params: P) {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_request_id(),
            method,
            params,
        };
        let line = match serde_json::to_string(&request) {
            Ok(line) => line,
            Err(e) => {
                debug!(method, error = %e, "failed to serialize relay request");
                return;
            }
        };
        let mut writer = self.writer.lock().await;
        if let Some(writer) = writer.as_mut() {
            if let Err(e) = writer.write_line(&line).await {
                debug!(method, error = %e, "relay send failed");
            }
        }
    }

    async fn resend_subscriptions(&self) {
        let ids: Vec<String> = {
            let subscriptions = self.subscriptions.lock().expect("subscription lock poisoned");
            subscriptions.iter().cloned().collect()
        };
        for source_id in ids {
            self.send_request(
                methods::SUBSCRIBE,
                SubscriptionParams {
                    source_id: &source_id,
                },
            )
            .await;
        }
    }

    /// Dispatch one inbound line. Malformed input is dropped without
    /// touching any state; the caller keeps reading.
    fn handle_line(&self, line: &str) {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                debug!(error = %e, "dropping unparsable relay line");
                return;
            }
        };

        if let Some(method) = value.get("method").and_then(Value::as_str) {
            let params = value
                .get("params")
                .cloned()
                .unwrap_or_else(|| Value::Object(Default::default()));
            self.handle_notification(method, &params);
        } else if value.get("result").is_some() || value.get("error").is_some() {
            // Responses are not correlated to outstanding requests.
            trace!("relay response observed");
        }
    }

    fn handle_notification(&self, method: &str, params: &Value) {
        match method {
            methods::DATA_FRAME => {
                if params.get("frame").is_none() {
                    return;
                }
                if let Some(metadata) = params.get("source").and_then(translate::metadata_from_json)
                {
                    self.registry.register_source(metadata);
                }
                if let Some(frame) = translate::frame_from_json(params) {
                    self.registry.update(frame);
                }
            }
            methods::METADATA => {
                if let Some(entries) = params.as_array() {
                    self.register_each(entries);
                } else if let Some(entries) = params.get("sources").and_then(Value::as_array) {
                    self.register_each(entries);
                } else if let Some(metadata) = translate::metadata_from_json(params) {
                    self.registry.register_source(metadata);
                }
            }
            other => debug!(method = other, "ignoring unknown relay notification"),
        }
    }

    fn register_each(&self, entries: &[Value]) {
        for entry in entries {
            if let Some(metadata) = translate::metadata_from_json(entry) {
                self.registry.register_source(metadata);
            }
        }
    }
}

// ── RelayLink ────────────────────────────────────────────────────

/// Bridge between the [`DataRegistry`] and the hardware relay process.
pub struct RelayLink {
    shared: Arc<Shared>,
    opener: Arc<dyn ChannelOpener>,
    options: StdMutex<RelayOptions>,
    worker: StdMutex<Option<JoinHandle<()>>>,
    cancel: StdMutex<CancellationToken>,
}

impl RelayLink {
    /// A link talking to the relay over its Unix domain socket.
    pub fn new(registry: Arc<DataRegistry>) -> Self {
        Self::with_opener(registry, Arc::new(UnixSocketOpener))
    }

    /// A link using a caller-supplied channel implementation.
    ///
    /// This is the seam the reconnect/resync tests drive with scripted
    /// channels; production code uses [`RelayLink::new`].
    pub fn with_opener(registry: Arc<DataRegistry>, opener: Arc<dyn ChannelOpener>) -> Self {
        Self {
            shared: Arc::new(Shared {
                registry,
                phase: StdMutex::new(LinkPhase::Disconnected),
                writer: tokio::sync::Mutex::new(None),
                subscriptions: StdMutex::new(BTreeSet::new()),
                request_counter: AtomicU64::new(0),
            }),
            opener,
            options: StdMutex::new(RelayOptions::default()),
            worker: StdMutex::new(None),
            cancel: StdMutex::new(CancellationToken::new()),
        }
    }

    /// Set endpoint and backoff. Takes effect on the next `start()`.
    pub fn configure(&self, options: RelayOptions) {
        *self.options.lock().expect("options lock poisoned") = options;
    }

    /// Current phase of the connection lifecycle.
    pub fn phase(&self) -> LinkPhase {
        self.shared.phase.lock().expect("phase lock poisoned").clone()
    }

    /// Spawn the background connection loop. No-op if already running.
    pub fn start(&self) {
        let mut worker = self.worker.lock().expect("worker lock poisoned");
        if worker.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        let token = CancellationToken::new();
        *self.cancel.lock().expect("cancel lock poisoned") = token.clone();
        let options = self.options.lock().expect("options lock poisoned").clone();
        info!(endpoint = %options.socket_path.display(), "starting relay link");
        *worker = Some(tokio::spawn(run_loop(
            self.shared.clone(),
            self.opener.clone(),
            options,
            token,
        )));
    }

    /// Stop the loop and wait for the worker to exit.
    ///
    /// Unblocks an in-progress read or backoff sleep; once this
    /// returns, no further registry updates come from this link. The
    /// link can be started again afterwards.
    pub async fn stop(&self) {
        let handle = {
            self.cancel.lock().expect("cancel lock poisoned").cancel();
            self.worker.lock().expect("worker lock poisoned").take()
        };
        if let Some(handle) = handle {
            let _ = handle.await;
            info!("relay link stopped");
        }
    }

    /// Add `source_id` to the subscription set and, when connected,
    /// tell the relay immediately. Idempotent; empty ids are ignored.
    ///
    /// While disconnected the set is still updated, so the next
    /// successful connection resyncs it.
    pub async fn subscribe_source(&self, source_id: &str) {
        if source_id.is_empty() {
            return;
        }
        let inserted = {
            let mut subscriptions = self
                .shared
                .subscriptions
                .lock()
                .expect("subscription lock poisoned");
            subscriptions.insert(source_id.to_string())
        };
        if inserted {
            self.shared
                .send_request(methods::SUBSCRIBE, SubscriptionParams { source_id })
                .await;
        }
    }

    /// Remove `source_id` from the subscription set and, when
    /// connected, tell the relay. Idempotent; empty ids are ignored.
    pub async fn unsubscribe_source(&self, source_id: &str) {
        if source_id.is_empty() {
            return;
        }
        let removed = {
            let mut subscriptions = self
                .shared
                .subscriptions
                .lock()
                .expect("subscription lock poisoned");
            subscriptions.remove(source_id)
        };
        if removed {
            self.shared
                .send_request(methods::UNSUBSCRIBE, SubscriptionParams { source_id })
                .await;
        }
    }

    /// Ask the relay to reset one accumulated metric. Fire-and-forget:
    /// no acknowledgement is tracked.
    pub async fn request_metric_reset(&self, source_id: &str, channel_id: &str, metric: &str) {
        if source_id.is_empty() || channel_id.is_empty() || metric.is_empty() {
            return;
        }
        self.shared
            .send_request(
                methods::RESET_METRIC,
                MetricResetParams {
                    source_id,
                    channel_id,
                    metric,
                },
            )
            .await;
    }
}

// ── Worker ───────────────────────────────────────────────────────

fn transition(
    shared: &Shared,
    apply: impl FnOnce(&mut LinkPhase) -> Result<(), WorkbenchError>,
) {
    let mut phase = shared.phase.lock().expect("phase lock poisoned");
    if let Err(e) = apply(&mut phase) {
        debug!(error = %e, "unexpected link phase transition");
    }
}

async fn run_loop(
    shared: Arc<Shared>,
    opener: Arc<dyn ChannelOpener>,
    options: RelayOptions,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            break;
        }
        transition(&shared, LinkPhase::begin_connect);

        let opened = tokio::select! {
            _ = cancel.cancelled() => break,
            result = opener.open(&options.socket_path) => result,
        };

        match opened {
            Ok((mut reader, writer)) => {
                debug!(endpoint = %options.socket_path.display(), "relay channel connected");
                *shared.writer.lock().await = Some(writer);

                shared
                    .send_request(
                        methods::REGISTER_CLIENT,
                        RegisterClientParams {
                            protocol: PROTOCOL_VERSION,
                        },
                    )
                    .await;
                transition(&shared, LinkPhase::complete_registration);

                shared.resend_subscriptions().await;
                transition(&shared, LinkPhase::begin_streaming);

                loop {
                    let next = tokio::select! {
                        _ = cancel.cancelled() => break,
                        result = reader.read_line() => result,
                    };
                    match next {
                        Ok(Some(line)) => shared.handle_line(&line),
                        Ok(None) => {
                            debug!("relay peer closed the channel");
                            break;
                        }
                        Err(e) => {
                            debug!(error = %e, "relay read failed");
                            break;
                        }
                    }
                }

                *shared.writer.lock().await = None;
            }
            Err(e) => debug!(error = %e, "relay connect failed"),
        }

        shared
            .phase
            .lock()
            .expect("phase lock poisoned")
            .force_disconnect();

        if cancel.is_cancelled() {
            break;
        }
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(options.reconnect_delay) => {}
        }
    }

    *shared.writer.lock().await = None;
    shared
        .phase
        .lock()
        .expect("phase lock poisoned")
        .force_disconnect();
}

// ── Tests ────────────────────────────────────────────────────────

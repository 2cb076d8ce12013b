//! The source registry — the only mutable shared state in the data plane.
//!
//! Holds what sources exist, their most recent frame, and the observer
//! callbacks interested in each source. Safe to call from any thread or
//! task; reads proceed concurrently, writes are serialized.
//!
//! Observer invocation deliberately happens *outside* the lock: `update`
//! snapshots the callback list under the write lock, releases it, then
//! calls each callback. A callback may therefore re-enter the registry
//! (to subscribe, unsubscribe, or read) without deadlocking, and a slow
//! observer never blocks other registry operations.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

use crate::data::{DataFrame, SourceMetadata};

/// Opaque handle identifying one observer registration.
///
/// Monotonically increasing and unique for the process lifetime.
pub type ObserverToken = u64;

type ObserverFn = std::sync::Arc<dyn Fn(&DataFrame) + Send + Sync + 'static>;

struct ObserverEntry {
    token: ObserverToken,
    callback: ObserverFn,
}

#[derive(Default)]
struct Inner {
    metadata: HashMap<String, SourceMetadata>,
    latest: HashMap<String, DataFrame>,
    observers: HashMap<String, Vec<ObserverEntry>>,
}

/// Thread-safe registry of telemetry sources with per-source
/// publish/subscribe.
///
/// Every operation is total: unknown ids yield `None`, empty results,
/// or a no-op — never an error.
#[derive(Default)]
pub struct DataRegistry {
    inner: RwLock<Inner>,
    next_token: AtomicU64,
}

impl DataRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            next_token: AtomicU64::new(1),
        }
    }

    // ── Source lifecycle ─────────────────────────────────────────

    /// Insert or overwrite the metadata record for `metadata.id`.
    pub fn register_source(&self, metadata: SourceMetadata) {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        inner.metadata.insert(metadata.id.clone(), metadata);
    }

    /// Remove a source's metadata, latest frame, and all its observers.
    ///
    /// Idempotent; unknown ids are a no-op.
    pub fn unregister_source(&self, source_id: &str) {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        inner.metadata.remove(source_id);
        inner.latest.remove(source_id);
        inner.observers.remove(source_id);
    }

    pub fn is_registered(&self, source_id: &str) -> bool {
        let inner = self.inner.read().expect("registry lock poisoned");
        inner.metadata.contains_key(source_id)
    }

    pub fn metadata(&self, source_id: &str) -> Option<SourceMetadata> {
        let inner = self.inner.read().expect("registry lock poisoned");
        inner.metadata.get(source_id).cloned()
    }

    /// Snapshot of all registered sources, in no particular order.
    pub fn list_sources(&self) -> Vec<SourceMetadata> {
        let inner = self.inner.read().expect("registry lock poisoned");
        inner.metadata.values().cloned().collect()
    }

    // ── Frames ───────────────────────────────────────────────────

    /// Store `frame` as the latest for its source and notify every
    /// observer currently registered for that source.
    ///
    /// The stored frame replaces the previous one wholesale; frames are
    /// never merged. Unregistered source ids still have their frame
    /// stored — a later metadata registration re-creates the source —
    /// but carry no observers by construction.
    pub fn update(&self, frame: DataFrame) {
        let callbacks: Vec<ObserverFn> = {
            let mut inner = self.inner.write().expect("registry lock poisoned");
            let snapshot = inner
                .observers
                .get(&frame.source_id)
                .map(|entries| entries.iter().map(|e| e.callback.clone()).collect())
                .unwrap_or_default();
            inner.latest.insert(frame.source_id.clone(), frame.clone());
            snapshot
        };
        trace!(
            source = %frame.source_id,
            points = frame.points.len(),
            observers = callbacks.len(),
            "registry update"
        );
        for callback in callbacks {
            callback(&frame);
        }
    }

    /// The most recent frame for `source_id`, if any has been published.
    pub fn latest(&self, source_id: &str) -> Option<DataFrame> {
        let inner = self.inner.read().expect("registry lock poisoned");
        inner.latest.get(source_id).cloned()
    }

    // ── Observers ────────────────────────────────────────────────

    /// Register `callback` to be invoked on every future `update` for
    /// `source_id`. Returns the token that removes it again.
    pub fn add_observer<F>(&self, source_id: &str, callback: F) -> ObserverToken
    where
        F: Fn(&DataFrame) + Send + Sync + 'static,
    {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.write().expect("registry lock poisoned");
        inner
            .observers
            .entry(source_id.to_string())
            .or_default()
            .push(ObserverEntry {
                token,
                callback: std::sync::Arc::new(callback),
            });
        token
    }

    /// Remove the observer identified by `token`. No-op when either the
    /// source or the token is unknown.
    pub fn remove_observer(&self, source_id: &str, token: ObserverToken) {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        if let Some(entries) = inner.observers.get_mut(source_id) {
            entries.retain(|entry| entry.token != token);
            if entries.is_empty() {
                inner.observers.remove(source_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DataKind, DataPayload, DataPoint, NumericSample};
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Mutex};
    use std::time::SystemTime;

    fn meta(id: &str) -> SourceMetadata {
        SourceMetadata {
            id: id.to_string(),
            name: id.to_string(),
            kind: DataKind::Numeric,
            description: String::new(),
            unit: Some("V".to_string()),
        }
    }

    fn frame(id: &str, value: f64) -> DataFrame {
        let now = SystemTime::now();
        DataFrame {
            source_id: id.to_string(),
            source_name: id.to_string(),
            points: vec![DataPoint {
                channel_id: "ch0".to_string(),
                payload: DataPayload::Numeric(NumericSample {
                    value,
                    unit: "V".to_string(),
                    timestamp: now,
                }),
            }],
            timestamp: now,
        }
    }

    #[test]
    fn registration_reflects_most_recent_call() {
        let registry = DataRegistry::new();
        assert!(!registry.is_registered("psu"));

        registry.register_source(meta("psu"));
        assert!(registry.is_registered("psu"));
        assert_eq!(registry.metadata("psu").unwrap().unit.as_deref(), Some("V"));

        registry.unregister_source("psu");
        assert!(!registry.is_registered("psu"));
        assert!(registry.metadata("psu").is_none());

        // Idempotent on unknown ids.
        registry.unregister_source("psu");
        assert!(!registry.is_registered("psu"));
    }

    #[test]
    fn reregistration_overwrites_by_id() {
        let registry = DataRegistry::new();
        registry.register_source(meta("psu"));
        let mut replacement = meta("psu");
        replacement.name = "Bench PSU".to_string();
        registry.register_source(replacement);

        assert_eq!(registry.metadata("psu").unwrap().name, "Bench PSU");
        assert_eq!(registry.list_sources().len(), 1);
    }

    #[test]
    fn update_stores_latest_and_notifies_only_matching_observers() {
        let registry = DataRegistry::new();
        registry.register_source(meta("psu"));
        registry.register_source(meta("dmm"));

        let psu_frames: Arc<Mutex<Vec<DataFrame>>> = Arc::new(Mutex::new(Vec::new()));
        let dmm_hits = Arc::new(AtomicUsize::new(0));

        let sink = psu_frames.clone();
        registry.add_observer("psu", move |f| sink.lock().unwrap().push(f.clone()));
        let hits = dmm_hits.clone();
        registry.add_observer("dmm", move |_| {
            hits.fetch_add(1, Ordering::SeqCst);
        });

        let published = frame("psu", 12.0);
        registry.update(published.clone());

        assert_eq!(registry.latest("psu").unwrap(), published);
        let seen = psu_frames.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], published);
        assert_eq!(dmm_hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn latest_is_replaced_never_merged() {
        let registry = DataRegistry::new();
        registry.update(frame("psu", 11.9));
        registry.update(frame("psu", 12.1));

        let latest = registry.latest("psu").unwrap();
        assert_eq!(latest.points.len(), 1);
        match &latest.points[0].payload {
            DataPayload::Numeric(sample) => assert_eq!(sample.value, 12.1),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn observer_delivery_preserves_per_source_order() {
        let registry = DataRegistry::new();
        let values: Arc<Mutex<Vec<f64>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = values.clone();
        registry.add_observer("psu", move |f| {
            if let DataPayload::Numeric(sample) = &f.points[0].payload {
                sink.lock().unwrap().push(sample.value);
            }
        });

        for value in [1.0, 2.0, 3.0] {
            registry.update(frame("psu", value));
        }
        assert_eq!(*values.lock().unwrap(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn removing_one_token_leaves_the_others() {
        let registry = DataRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let mut tokens = Vec::new();
        for _ in 0..3 {
            let hits = hits.clone();
            tokens.push(registry.add_observer("psu", move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            }));
        }
        // Tokens are unique and monotonically increasing.
        assert!(tokens.windows(2).all(|w| w[0] < w[1]));

        registry.remove_observer("psu", tokens[0]);
        registry.remove_observer("psu", tokens[2]);
        registry.update(frame("psu", 12.0));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // Unknown source and unknown token are both no-ops.
        registry.remove_observer("nope", tokens[1]);
        registry.remove_observer("psu", 9999);
        registry.update(frame("psu", 12.0));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unregister_discards_observers_for_good() {
        let registry = DataRegistry::new();
        registry.register_source(meta("psu"));
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        registry.add_observer("psu", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        registry.unregister_source("psu");
        assert!(registry.latest("psu").is_none());

        // Policy: a late update still stores the frame (the source can be
        // re-created by a later registration) but the old observers are
        // gone and must never fire again.
        registry.update(frame("psu", 12.0));
        assert!(registry.latest("psu").is_some());
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        registry.register_source(meta("psu"));
        registry.update(frame("psu", 12.0));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn observer_may_reenter_the_registry() {
        let registry = Arc::new(DataRegistry::new());
        let reentrant = registry.clone();
        let latest_seen: Arc<Mutex<Option<DataFrame>>> = Arc::new(Mutex::new(None));
        let sink = latest_seen.clone();

        registry.add_observer("psu", move |f| {
            // Read back through the registry from inside the callback.
            *sink.lock().unwrap() = reentrant.latest(&f.source_id);
            reentrant.add_observer("psu", |_| {});
        });

        registry.update(frame("psu", 12.0));
        assert!(latest_seen.lock().unwrap().is_some());
    }

    #[test]
    fn concurrent_updates_and_reads_do_not_deadlock() {
        let registry = Arc::new(DataRegistry::new());
        registry.register_source(meta("psu"));

        let writers: Vec<_> = (0..4)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for j in 0..100 {
                        registry.update(frame("psu", (i * 100 + j) as f64));
                    }
                })
            })
            .collect();
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let _ = registry.latest("psu");
                        let _ = registry.list_sources();
                    }
                })
            })
            .collect();

        for handle in writers.into_iter().chain(readers) {
            handle.join().unwrap();
        }
        assert!(registry.latest("psu").is_some());
    }
}

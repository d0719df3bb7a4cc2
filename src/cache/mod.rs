//! Namespaced read-binding cache
//!
//! Bindings wrap one contract read endpoint each and live under an
//! invalidation namespace. A confirmed transaction marks whole namespaces
//! stale; the refresher task then refetches every binding in them.
//!
//! ## Guarantees
//!
//! - `read` never blocks: stale data is returned with `is_fresh = false` and
//!   `is_loading` set while a refetch is in flight.
//! - Invalidation is a monotonic "mark stale"; concurrent invalidations from
//!   different controllers cannot conflict.
//! - Eventually consistent only. A refetch issued right after confirmation
//!   may still observe pre-update values served by a lagging replica.
//!
//! There is no global instance: construct one per session and hand clones to
//! every controller and view that needs it.

mod namespace;

pub use namespace::{InvalidationSignal, Namespace};

use crate::errors::{ClientError, ClientResult};
use crate::metrics::metrics;
use dashmap::DashMap;
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Identity of a binding: namespace plus endpoint name (with arguments)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BindingKey {
    pub namespace: Namespace,
    pub name: String,
}

impl BindingKey {
    pub fn new(namespace: Namespace, name: impl Into<String>) -> Self {
        Self {
            namespace,
            name: name.into(),
        }
    }
}

/// Snapshot returned by [`ReadBindingCache::read`]
#[derive(Debug, Clone, PartialEq)]
pub struct ReadResult<T> {
    /// Last known value, if any fetch has ever succeeded
    pub value: Option<T>,
    /// False after invalidation until a refetch completes
    pub is_fresh: bool,
    /// A refetch is currently in flight
    pub is_loading: bool,
    /// Error from the most recent fetch attempt
    pub error: Option<ClientError>,
    pub fetched_at: Option<Instant>,
}

struct Slot<T> {
    value: Option<T>,
    fresh: bool,
    loading: bool,
    error: Option<ClientError>,
    fetched_at: Option<Instant>,
    /// Bumped by every invalidation so an in-flight fetch can tell it raced one
    generation: u64,
}

type Fetcher<T> = Arc<dyn Fn() -> BoxFuture<'static, ClientResult<T>> + Send + Sync>;

struct BindingInner<T> {
    key: BindingKey,
    fetcher: Fetcher<T>,
    slot: RwLock<Slot<T>>,
}

/// Typed handle to one registered read endpoint
pub struct ReadBinding<T> {
    inner: Arc<BindingInner<T>>,
}

impl<T> Clone for ReadBinding<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> ReadBinding<T> {
    pub fn key(&self) -> &BindingKey {
        &self.inner.key
    }

    pub fn read(&self) -> ReadResult<T> {
        let slot = self.inner.slot.read();
        ReadResult {
            value: slot.value.clone(),
            is_fresh: slot.fresh,
            is_loading: slot.loading,
            error: slot.error.clone(),
            fetched_at: slot.fetched_at,
        }
    }

    /// Latest value regardless of freshness
    pub fn value(&self) -> Option<T> {
        self.inner.slot.read().value.clone()
    }
}

trait ErasedBinding: Send + Sync {
    fn key(&self) -> &BindingKey;
    fn mark_stale(&self);
    fn is_fresh(&self) -> bool;
    /// Run the fetcher once; resolves to `true` when an invalidation raced
    /// the fetch and the binding needs another pass
    fn refetch(self: Arc<Self>) -> BoxFuture<'static, bool>;
}

impl<T: Clone + Send + Sync + 'static> ErasedBinding for BindingInner<T> {
    fn key(&self) -> &BindingKey {
        &self.key
    }

    fn mark_stale(&self) {
        let mut slot = self.slot.write();
        slot.fresh = false;
        slot.generation += 1;
    }

    fn is_fresh(&self) -> bool {
        self.slot.read().fresh
    }

    fn refetch(self: Arc<Self>) -> BoxFuture<'static, bool> {
        async move {
            let started_generation = {
                let mut slot = self.slot.write();
                slot.loading = true;
                slot.generation
            };
            let result = (self.fetcher)().await;
            metrics().cache_refetches.inc();

            let mut slot = self.slot.write();
            slot.loading = false;
            let raced = slot.generation != started_generation;
            match result {
                Ok(value) => {
                    slot.value = Some(value);
                    slot.error = None;
                    slot.fetched_at = Some(Instant::now());
                    slot.fresh = !raced;
                }
                Err(e) => {
                    warn!(
                        namespace = %self.key.namespace,
                        binding = %self.key.name,
                        error = %e,
                        "read binding refetch failed"
                    );
                    slot.error = Some(e);
                }
            }
            raced
        }
        .boxed()
    }
}

struct CacheInner {
    bindings: DashMap<BindingKey, Arc<dyn ErasedBinding>>,
    invalidations: DashMap<Namespace, u64>,
    refetch_tx: mpsc::UnboundedSender<BindingKey>,
    refetch_rx: Mutex<Option<mpsc::UnboundedReceiver<BindingKey>>>,
}

impl CacheInner {
    fn schedule(&self, key: BindingKey) {
        // receiver lives as long as the refresher; a closed queue just means
        // nobody is refreshing and `refresh_stale` has to be called directly
        let _ = self.refetch_tx.send(key);
    }
}

/// Process-wide store of read bindings grouped by namespace
#[derive(Clone)]
pub struct ReadBindingCache {
    inner: Arc<CacheInner>,
}

impl ReadBindingCache {
    pub fn new() -> Self {
        let (refetch_tx, refetch_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(CacheInner {
                bindings: DashMap::new(),
                invalidations: DashMap::new(),
                refetch_tx,
                refetch_rx: Mutex::new(Some(refetch_rx)),
            }),
        }
    }

    /// Register a read endpoint under `namespace`
    ///
    /// The binding starts stale with no value and is queued for its first
    /// fetch. Binding the same key again replaces the previous registration.
    pub fn bind<T, F, Fut>(
        &self,
        namespace: Namespace,
        name: impl Into<String>,
        fetch: F,
    ) -> ReadBinding<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ClientResult<T>> + Send + 'static,
    {
        let key = BindingKey::new(namespace, name);
        let fetcher: Fetcher<T> = Arc::new(move || fetch().boxed());
        let inner = Arc::new(BindingInner {
            key: key.clone(),
            fetcher,
            slot: RwLock::new(Slot {
                value: None,
                fresh: false,
                loading: false,
                error: None,
                fetched_at: None,
                generation: 0,
            }),
        });

        let erased: Arc<dyn ErasedBinding> = inner.clone();
        self.inner.bindings.insert(key.clone(), erased);
        self.inner.schedule(key);

        ReadBinding { inner }
    }

    pub fn unbind(&self, key: &BindingKey) -> bool {
        self.inner.bindings.remove(key).is_some()
    }

    /// Last known value plus freshness; never waits on the network
    pub fn read<T: Clone + Send + Sync + 'static>(&self, binding: &ReadBinding<T>) -> ReadResult<T> {
        binding.read()
    }

    /// Mark every binding under `namespace` stale and queue a refetch
    ///
    /// Returns the number of bindings affected.
    pub fn invalidate(&self, namespace: &Namespace) -> usize {
        *self.inner.invalidations.entry(namespace.clone()).or_insert(0) += 1;

        let stale: Vec<BindingKey> = self
            .inner
            .bindings
            .iter()
            .filter(|entry| &entry.key().namespace == namespace)
            .map(|entry| {
                entry.value().mark_stale();
                entry.key().clone()
            })
            .collect();

        let count = stale.len();
        for key in stale {
            self.inner.schedule(key);
        }

        metrics().cache_invalidations.inc();
        debug!(namespace = %namespace, bindings = count, "namespace invalidated");
        count
    }

    /// Apply every namespace of an invalidation signal
    pub fn apply(&self, signal: &InvalidationSignal) -> usize {
        signal.namespaces().map(|ns| self.invalidate(ns)).sum()
    }

    /// How many times `namespace` has been invalidated this session
    pub fn invalidation_count(&self, namespace: &Namespace) -> u64 {
        self.inner
            .invalidations
            .get(namespace)
            .map(|count| *count)
            .unwrap_or(0)
    }

    /// True when any binding under `namespace` is awaiting a refetch
    pub fn is_stale(&self, namespace: &Namespace) -> bool {
        self.inner
            .bindings
            .iter()
            .any(|entry| &entry.key().namespace == namespace && !entry.value().is_fresh())
    }

    pub fn binding_count(&self) -> usize {
        self.inner.bindings.len()
    }

    /// Fetch one binding now, bypassing the queue
    pub async fn refresh<T: Clone + Send + Sync + 'static>(&self, binding: &ReadBinding<T>) -> ReadResult<T> {
        let erased: Arc<dyn ErasedBinding> = binding.inner.clone();
        if erased.refetch().await {
            self.inner.schedule(binding.key().clone());
        }
        binding.read()
    }

    /// Refetch every stale binding concurrently and wait for all of them
    pub async fn refresh_stale(&self) -> usize {
        let stale: Vec<Arc<dyn ErasedBinding>> = self
            .inner
            .bindings
            .iter()
            .filter(|entry| !entry.value().is_fresh())
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let count = stale.len();
        let raced = join_all(stale.into_iter().map(|b| {
            let key = b.key().clone();
            b.refetch().map(move |raced| raced.then_some(key))
        }))
        .await;

        for key in raced.into_iter().flatten() {
            self.inner.schedule(key);
        }
        count
    }

    /// Start the background refresher that drains the refetch queue
    ///
    /// Only one refresher can run per cache; later calls return `None`.
    /// The task ends once every clone of the cache has been dropped.
    pub fn spawn_refresher(&self) -> Option<JoinHandle<()>> {
        let mut rx = self.inner.refetch_rx.lock().take()?;
        let weak: Weak<CacheInner> = Arc::downgrade(&self.inner);

        Some(tokio::spawn(async move {
            while let Some(key) = rx.recv().await {
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let Some(binding) = inner.bindings.get(&key).map(|b| Arc::clone(b.value())) else {
                    continue;
                };
                if binding.is_fresh() {
                    continue;
                }
                let weak = weak.clone();
                tokio::spawn(async move {
                    if binding.refetch().await {
                        if let Some(inner) = weak.upgrade() {
                            inner.schedule(key);
                        }
                    }
                });
            }
            debug!("read binding refresher stopped");
        }))
    }
}

impl Default for ReadBindingCache {
    fn default() -> Self {
        Self::new()
    }
}

use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;
use std::marker::PhantomData;
use std::mem;
use std::slice;

use futures::future::FutureExt;
use tokio::sync::mpsc;
use tracing::{span, Level};
use tracing_futures::Instrument;

use crate::{
    batch::BatchFunction,
    cache::Cache,
    error::LoadError,
    op::{LoadRequest, LoaderOp},
};

#[cfg(feature = "stats")]
use crate::stats::WorkerStats;

/// A `LoaderWorker` is the "single-thread" worker task that actually does the
/// loading work.
///
/// Once started, it runs in a loop until the parent `Loader` aborts its
/// `JoinHandle` or drops the request channel.
///
/// The worker can be in one of three states during its lifetime:
///
/// 1. Waiting for requests.
/// 2. Draining the request queue and staging keys for loading.
/// 3. Executing its batch function.
///
/// One cycle through this loop may be called an "execution frame". Every
/// load that reaches the channel before the drain in (2) empties it lands in
/// the same frame and is covered by the single batch dispatch in (3).
///
/// In state (1), the worker awaits any message on the request channel, idling
/// until work arrives.
///
/// In state (2), the worker synchronously pulls requests from the queue until
/// none are immediately available. Prime and evict requests are applied to
/// the cache on the spot. For load requests the worker checks the cache:
/// requests whose keys are all cached are answered immediately on their
/// response channel, otherwise the missing keys are staged (first occurrence
/// only, in first-seen order) and the request parks.
///
/// In state (3), the worker takes the staged keys and parked requests out of
/// itself and invokes its batch function once with the staged key list, so
/// loads arriving while the batch is in flight start a fresh frame. On
/// success the returned values are cached slot-by-slot against the dispatched
/// keys and every parked request is answered from the cache. On failure
/// nothing is cached and every parked request rejects with the same shared
/// error.
pub struct LoaderWorker<K, V, E, F, CacheT, ContextT>
where
    K: 'static + Eq + Hash + Debug + Clone + Send + Sync,
    V: 'static + Send + Debug + Clone + Default,
    E: 'static + Send + Sync + Debug,
    F: 'static + BatchFunction<K, V, Context = ContextT, Error = E> + Send,
    CacheT: Cache,
    ContextT: Send + Sync + 'static,
{
    cache: CacheT,
    request_rx: mpsc::UnboundedReceiver<LoaderOp<K, V, E>>,
    keys_to_load: Vec<K>,
    staged_keys: HashSet<K>,
    parked_requests: Vec<LoadRequest<K, V, E>>,
    context: ContextT,
    #[cfg(feature = "stats")]
    stats: WorkerStats,
    phantom_batch_function: PhantomData<F>,
    debug_name: &'static str,
}

impl<K, V, E, F, CacheT, ContextT> LoaderWorker<K, V, E, F, CacheT, ContextT>
where
    K: 'static + Eq + Hash + Debug + Clone + Send + Sync,
    V: 'static + Send + Debug + Clone + Default,
    E: 'static + Send + Sync + Debug,
    F: 'static + BatchFunction<K, V, Context = ContextT, Error = E> + Send,
    CacheT: Cache<K = K, V = V>,
    ContextT: Send + Sync + 'static,
{
    pub fn new(
        cache: CacheT,
        request_rx: mpsc::UnboundedReceiver<LoaderOp<K, V, E>>,
        context: ContextT,
    ) -> Self {
        let debug_name = std::any::type_name::<(K, V)>();
        Self {
            cache,
            request_rx,
            keys_to_load: Vec::new(),
            staged_keys: HashSet::new(),
            parked_requests: Vec::new(),
            context,
            #[cfg(feature = "stats")]
            stats: WorkerStats::new(debug_name),
            phantom_batch_function: PhantomData,
            debug_name,
        }
    }

    pub async fn start(self) {
        let span = span!(Level::TRACE, "LoaderWorker", kv = self.debug_name);
        self.run().instrument(span).await
    }

    async fn run(mut self) {
        loop {
            // Async await until we receive the first op of the next frame.
            match self.request_rx.recv().await {
                None => {
                    tracing::info!("Tx channel closed. Terminating LoaderWorker.");
                    return;
                }
                Some(op) => self.mux_op(op),
            }
            // Flush the remainder of the op queue before dispatching.
            while let Some(Some(op)) = self.request_rx.recv().now_or_never() {
                self.mux_op(op);
            }
            if !self.parked_requests.is_empty() {
                self.execute_load().await;
            }
        }
    }

    #[tracing::instrument(skip(self))]
    fn mux_op(&mut self, op: LoaderOp<K, V, E>) {
        match op {
            LoaderOp::Load(request) => {
                let cached = self.cache.get_key_vals(request.keys());
                let missing_keys = cached
                    .iter()
                    .filter_map(|(k, v)| if v.is_none() { Some((*k).clone()) } else { None })
                    .collect::<Vec<_>>();
                tracing::debug!(requested_keys = ?request.keys(), ?missing_keys);
                #[cfg(feature = "stats")]
                self.stats.record_load_request(
                    request.keys().len() as u32,
                    (request.keys().len() - missing_keys.len()) as u32,
                );
                if missing_keys.is_empty() {
                    let slots = cached.into_iter().map(|(_k, v)| v).collect::<Vec<_>>();
                    request.resolve(slots);
                } else {
                    self.stage(missing_keys);
                    self.parked_requests.push(request);
                }
            }
            LoaderOp::Prime(key, value) => self.cache.insert(key, value),
            LoaderOp::PrimeMany(key_vals) => self.cache.insert_many(key_vals),
            LoaderOp::Evict(key) => self.cache.remove(slice::from_ref(&key)),
            LoaderOp::EvictMany(keys) => self.cache.remove(&keys),
            LoaderOp::Clear => self.cache.clear(),
        }
    }

    /// Stages keys for the current frame, keeping first-seen order and
    /// skipping keys already staged.
    fn stage(&mut self, keys: Vec<K>) {
        for key in keys {
            if self.staged_keys.insert(key.clone()) {
                self.keys_to_load.push(key);
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn execute_load(&mut self) {
        let keys = mem::take(&mut self.keys_to_load);
        self.staged_keys.clear();
        let parked = mem::take(&mut self.parked_requests);
        #[cfg(feature = "stats")]
        self.stats.record_flush(keys.len() as u32);
        match F::load(&keys, &self.context).await {
            Ok(values) if values.len() == keys.len() => {
                tracing::debug!(dispatched = keys.len());
                self.cache.insert_many(keys.into_iter().zip(values));
                for request in parked {
                    let slots = self.cache.get(request.keys());
                    request.resolve(slots);
                }
            }
            Ok(values) => {
                let error = LoadError::BatchShape { requested: keys.len(), returned: values.len() };
                tracing::error!(?error, "batch function broke the positional contract");
                #[cfg(feature = "stats")]
                self.stats.record_failed_flush();
                for request in parked {
                    request.reject(error.clone());
                }
            }
            Err(error) => {
                let error = LoadError::<E>::batch(error);
                tracing::debug!(?error, "batch function failed, rejecting frame");
                #[cfg(feature = "stats")]
                self.stats.record_failed_flush();
                for request in parked {
                    request.reject(error.clone());
                }
            }
        }
    }
}

use std::ops::Drop;
use std::{collections::HashMap, fmt::Debug};

use tokio::sync::{mpsc, oneshot};

use crate::{
    batch::BatchFunction,
    error::LoadError,
    op::{LoadRequest, LoaderOp},
    worker::LoaderWorker,
};

/// Batch loads values from some expensive resource, primarily intended for
/// mitigating GraphQL's N+1 problem.
///
/// Resolvers call [`Loader::load`] once per object needing a relation; the
/// loader coalesces every call issued within one execution frame into a
/// single [`BatchFunction`] dispatch and fans the results back out to each
/// caller. Repeat keys are answered from the per-instance cache without
/// touching the batch function again. [`Loader::clear`] empties the cache,
/// [`Loader::evict`] drops single keys, and [`Loader::prime`] seeds values
/// fetched out-of-band.
///
/// A `Loader` is scoped to one logical operation: construct it at the start
/// of a request and drop it at the end. It is not a process-wide cache;
/// dropping the handle aborts the worker task that owns the cache.
///
/// The `Loader` struct acts as an intermediary between the async domain in
/// which `load` calls are invoked and the pseudo-single-threaded domain of
/// its worker. Callers can invoke the `Loader` from multiple parallel tasks,
/// and the loader will enqueue the requested operations on the request
/// channel for sequential processing by the worker, which answers via
/// oneshot channels.
pub struct Loader<K, V, E>
where
    K: 'static + Eq + Debug + Clone + Send,
    V: 'static + Send + Debug + Clone + Default,
    E: 'static + Send + Sync + Debug,
{
    request_tx: mpsc::UnboundedSender<LoaderOp<K, V, E>>,
    load_task_handle: tokio::task::JoinHandle<()>,
}

impl<K, V, E> Drop for Loader<K, V, E>
where
    K: 'static + Eq + Debug + Clone + Send,
    V: 'static + Send + Debug + Clone + Default,
    E: 'static + Send + Sync + Debug,
{
    fn drop(&mut self) {
        self.load_task_handle.abort();
    }
}

impl<K, V, E> Loader<K, V, E>
where
    K: 'static + Eq + Debug + Clone + std::hash::Hash + Send + Sync,
    V: 'static + Send + Debug + Clone + Default,
    E: 'static + Send + Sync + Debug,
{
    /// Creates a new `Loader` for the provided `BatchFunction` and context.
    ///
    /// Note: the batch function is passed in as a marker for type inference.
    pub fn new<F, ContextT>(_: F, context: ContextT) -> Self
    where
        ContextT: Send + Sync + 'static,
        F: 'static + BatchFunction<K, V, Context = ContextT, Error = E> + Send,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            request_tx: tx,
            load_task_handle: tokio::task::spawn(
                LoaderWorker::<K, V, E, F, HashMap<K, V>, ContextT>::new(
                    HashMap::new(),
                    rx,
                    context,
                )
                .start(),
            ),
        }
    }

    /// Loads the value for one key.
    ///
    /// If the value is already in the loader cache it is answered as soon as
    /// the worker processes the request; otherwise the key is staged for
    /// batch loading in the current execution frame. Single-result loaders
    /// resolve keys with no matching record to `Ok(None)` and one-to-many
    /// loaders to `Ok(vec![])`; `Err` means the frame's batch dispatch
    /// failed as a whole.
    pub async fn load(&self, key: K) -> Result<V, LoadError<E>> {
        let (response_tx, response_rx) = oneshot::channel();
        self.request_tx.send(LoaderOp::Load(LoadRequest::One(key, response_tx))).unwrap();
        response_rx.await.unwrap()
    }

    /// Loads the value for a key that may be absent at the call site.
    ///
    /// `None` resolves to the absent value immediately, touching neither the
    /// request queue nor the cache, so resolvers can forward nullable
    /// foreign keys as-is. `Some(key)` behaves exactly like [`Loader::load`].
    pub async fn load_opt(&self, key: Option<K>) -> Result<V, LoadError<E>> {
        match key {
            Some(key) => self.load(key).await,
            None => Ok(V::default()),
        }
    }

    /// Loads many values at once.
    ///
    /// The keys participate in the same execution frame as every other load
    /// issued before the worker dispatches, so mixing `load` and `load_many`
    /// calls still produces a single batch.
    pub async fn load_many(&self, keys: Vec<K>) -> Result<Vec<V>, LoadError<E>> {
        let (response_tx, response_rx) = oneshot::channel();
        self.request_tx.send(LoaderOp::Load(LoadRequest::Many(keys, response_tx))).unwrap();
        response_rx.await.unwrap()
    }

    /// Adds a value to the cache.
    pub async fn prime(&self, key: K, value: V) {
        self.request_tx.send(LoaderOp::Prime(key, value)).unwrap();
    }

    /// Adds many values to the cache at once.
    pub async fn prime_many(&self, key_vals: Vec<(K, V)>) {
        self.request_tx.send(LoaderOp::PrimeMany(key_vals)).unwrap();
    }

    /// Removes a value from the cache.
    ///
    /// This key will be reloaded through the batch function when it is next
    /// requested.
    pub async fn evict(&self, key: K) {
        self.request_tx.send(LoaderOp::Evict(key)).unwrap();
    }

    /// Removes multiple values from the cache at once.
    ///
    /// These keys will be reloaded when requested.
    pub async fn evict_many(&self, keys: Vec<K>) {
        self.request_tx.send(LoaderOp::EvictMany(keys)).unwrap();
    }

    /// Empties the cache.
    ///
    /// In-flight loads are unaffected; subsequent loads for previously
    /// cached keys dispatch through the batch function again.
    pub async fn clear(&self) {
        self.request_tx.send(LoaderOp::Clear).unwrap();
    }
}

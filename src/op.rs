use std::fmt::Debug;
use std::slice;

use tokio::sync::oneshot;

use crate::error::LoadError;

/// Set of possible requests that can be sent to the loader's worker.
///
/// Loads park until the frame's flush; the prime and evict variants are
/// applied to the cache as soon as the worker drains them.
#[derive(Debug)]
pub enum LoaderOp<K, V, E> {
    /// Fetch values through the batch function (or the cache).
    Load(LoadRequest<K, V, E>),
    /// Add values to the cache that were fetched elsewhere.
    Prime(K, V),
    PrimeMany(Vec<(K, V)>),
    /// Drop individual keys so they reload when next requested.
    Evict(K),
    EvictMany(Vec<K>),
    /// Drop every cached value.
    Clear,
}

#[derive(Debug)]
pub enum LoadRequest<K, V, E> {
    One(K, oneshot::Sender<Result<V, LoadError<E>>>),
    Many(Vec<K>, oneshot::Sender<Result<Vec<V>, LoadError<E>>>),
}

impl<K, V, E> LoadRequest<K, V, E>
where
    V: Send + Clone + Default + Debug,
    E: Debug,
{
    pub fn keys(&self) -> &[K] {
        match self {
            LoadRequest::One(ref key, _) => slice::from_ref(key),
            LoadRequest::Many(ref keys, _) => keys,
        }
    }

    /// Answers this request with the slots computed for its keys.
    ///
    /// A `None` slot means the key was neither cached nor dispatched, which
    /// the worker rules out; should one appear anyway it is logged and the
    /// absent value stands in rather than tearing down the worker.
    pub fn resolve<'a, I>(self, slots: I)
    where
        I: IntoIterator<Item = Option<&'a V>>,
        V: 'a,
    {
        match self {
            LoadRequest::One(_, response_tx) => {
                let value = slots.into_iter().next().flatten().cloned().unwrap_or_else(|| {
                    tracing::error!("no slot computed for requested key");
                    V::default()
                });
                if let Err(e) = response_tx.send(Ok(value)) {
                    tracing::error!(?e, "receiver dropped");
                }
            }
            LoadRequest::Many(_, response_tx) => {
                let values = slots
                    .into_iter()
                    .map(|slot| {
                        slot.cloned().unwrap_or_else(|| {
                            tracing::error!("no slot computed for requested key");
                            V::default()
                        })
                    })
                    .collect::<Vec<_>>();
                if let Err(e) = response_tx.send(Ok(values)) {
                    tracing::error!(?e, "receiver dropped");
                }
            }
        }
    }

    /// Rejects every waiter on this request with the frame's shared error.
    pub fn reject(self, error: LoadError<E>) {
        match self {
            LoadRequest::One(_, response_tx) => {
                if let Err(e) = response_tx.send(Err(error)) {
                    tracing::error!(?e, "receiver dropped");
                }
            }
            LoadRequest::Many(_, response_tx) => {
                if let Err(e) = response_tx.send(Err(error)) {
                    tracing::error!(?e, "receiver dropped");
                }
            }
        }
    }
}

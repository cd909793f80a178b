use std::sync::Arc;

use thiserror::Error;

/// Error returned by the load operations of a [`Loader`](crate::Loader).
///
/// `E` is the batch function's own error type. A failed batch rejects every
/// request that was waiting on the same execution frame, hence the `Arc`:
/// one error value fans out to all waiters. Failed keys leave no trace in
/// the cache, so the next request for them dispatches a fresh batch.
#[derive(Debug, Error)]
pub enum LoadError<E> {
    /// The batch function failed. All requests in the frame observe the same
    /// underlying error.
    #[error("batch function failed: {0}")]
    Batch(Arc<E>),

    /// The batch function returned a result vector that is not positionally
    /// aligned with the dispatched keys.
    #[error("batch function returned {returned} values for {requested} keys")]
    BatchShape { requested: usize, returned: usize },
}

impl<E> LoadError<E> {
    pub(crate) fn batch(error: E) -> Self {
        LoadError::Batch(Arc::new(error))
    }
}

impl<E> Clone for LoadError<E> {
    fn clone(&self) -> Self {
        match self {
            LoadError::Batch(error) => LoadError::Batch(Arc::clone(error)),
            LoadError::BatchShape { requested, returned } => {
                LoadError::BatchShape { requested: *requested, returned: *returned }
            }
        }
    }
}

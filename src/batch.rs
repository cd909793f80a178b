use async_trait::async_trait;

/// A `BatchFunction` defines how a [`Loader`](crate::Loader) fetches batched
/// data from some resource. It receives the deduplicated slice of keys staged
/// during the loader's most recent execution frame, in the order they were
/// first requested, and a user defined context struct (connection pool,
/// lookup tables, error sink).
///
/// The returned vector must be positionally aligned with `keys`: same length,
/// slot `i` answering `keys[i]`. Absence is expressed inside the value type,
/// never by omitting a slot:
///
/// * single-result relations use `V = Option<Record>` and answer keys with no
///   matching record as `None`;
/// * one-to-many relations use `V = Vec<Row>` and answer keys with no rows as
///   an empty vector.
///
/// The [`relation`](crate::relation) helpers build such aligned vectors from
/// unordered query results.
///
/// Returning `Err` fails the whole frame: every request waiting on the batch
/// rejects with the same error and nothing is cached. Conditions the
/// application treats as recoverable per key, such as a backing table that
/// has not been migrated yet, should be caught here and converted into
/// absent values instead.
///
/// Multiple `BatchFunction`s (and therefore loaders) can share the same
/// context, typically through an `Arc`.
#[async_trait]
pub trait BatchFunction<K, V> {
    type Context;
    type Error;

    async fn load(keys: &[K], context: &Self::Context) -> Result<Vec<V>, Self::Error>;
}

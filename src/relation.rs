//! Helpers for building positionally aligned batch results.
//!
//! A [`BatchFunction`](crate::BatchFunction) answers the dispatched key list
//! slot-by-slot, but relational queries come back as unordered rows. These
//! helpers index the rows by key and lay them out against the requested keys
//! so that no slot is ever omitted.

use std::collections::HashMap;
use std::hash::Hash;

/// Aligns the records of a single-result relation against the requested keys.
///
/// Each key's slot holds the record whose extracted key matches, or `None`
/// when the relation has no record for it. Keys are expected to be distinct,
/// as dispatched by the loader; if several records share a key the first one
/// wins.
///
/// ```
/// use fanload::relation::align_by_key;
///
/// let records = vec![(2, "b"), (1, "a")];
/// let aligned = align_by_key(&[1, 2, 3], records, |r| r.0);
/// assert_eq!(aligned, vec![Some((1, "a")), Some((2, "b")), None]);
/// ```
pub fn align_by_key<K, R, F>(keys: &[K], records: Vec<R>, mut key_of: F) -> Vec<Option<R>>
where
    K: Eq + Hash,
    F: FnMut(&R) -> K,
{
    let mut by_key = HashMap::with_capacity(records.len());
    for record in records {
        by_key.entry(key_of(&record)).or_insert(record);
    }
    keys.iter().map(|key| by_key.remove(key)).collect()
}

/// Groups the rows of a one-to-many relation under the requested parent keys.
///
/// Every key gets a slot; keys without rows get an empty list, never a
/// missing slot. Row order is preserved within each group, so rows fetched
/// with the relation's natural ordering stay ordered. Rows whose parent is
/// not among `keys` are dropped.
///
/// ```
/// use fanload::relation::group_by_key;
///
/// let rows = vec![(1, "x"), (2, "y"), (1, "z")];
/// let groups = group_by_key(&[1, 3, 2], rows, |r| r.0);
/// assert_eq!(groups, vec![vec![(1, "x"), (1, "z")], vec![], vec![(2, "y")]]);
/// ```
pub fn group_by_key<K, R, F>(keys: &[K], rows: Vec<R>, mut key_of: F) -> Vec<Vec<R>>
where
    K: Eq + Hash + Clone,
    F: FnMut(&R) -> K,
{
    let slots = keys
        .iter()
        .enumerate()
        .map(|(slot, key)| (key.clone(), slot))
        .collect::<HashMap<_, _>>();
    let mut groups = keys.iter().map(|_| Vec::new()).collect::<Vec<_>>();
    for row in rows {
        if let Some(&slot) = slots.get(&key_of(&row)) {
            groups[slot].push(row);
        }
    }
    groups
}

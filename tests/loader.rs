use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fanload::relation::group_by_key;
use fanload::{BatchFunction, LoadError, Loader};
use futures::future;

#[derive(Debug, PartialEq, Eq, Clone)]
struct DummyData(String);

struct DummyContext {
    map: HashMap<i64, String>,
    calls: AtomicUsize,
    batches: Mutex<Vec<Vec<i64>>>,
    fail_next: AtomicBool,
}

impl DummyContext {
    fn new(entries: &[(i64, &str)]) -> Arc<Self> {
        Arc::new(Self {
            map: entries.iter().map(|(k, v)| (*k, (*v).to_owned())).collect(),
            calls: AtomicUsize::new(0),
            batches: Mutex::new(Vec::new()),
            fail_next: AtomicBool::new(false),
        })
    }
}

struct DummyBatchFn;

#[async_trait]
impl BatchFunction<i64, Option<DummyData>> for DummyBatchFn {
    type Context = Arc<DummyContext>;
    type Error = String;

    async fn load(
        keys: &[i64],
        context: &Arc<DummyContext>,
    ) -> Result<Vec<Option<DummyData>>, String> {
        context.calls.fetch_add(1, Ordering::SeqCst);
        context.batches.lock().unwrap().push(keys.to_vec());
        if context.fail_next.swap(false, Ordering::SeqCst) {
            return Err("store unreachable".to_owned());
        }
        Ok(keys.iter().map(|k| context.map.get(k).cloned().map(DummyData)).collect())
    }
}

// Returns one value fewer than it was asked for.
struct TruncatingBatchFn;

#[async_trait]
impl BatchFunction<i64, Option<DummyData>> for TruncatingBatchFn {
    type Context = Arc<DummyContext>;
    type Error = String;

    async fn load(
        keys: &[i64],
        context: &Arc<DummyContext>,
    ) -> Result<Vec<Option<DummyData>>, String> {
        context.calls.fetch_add(1, Ordering::SeqCst);
        Ok(keys.iter().skip(1).map(|k| context.map.get(k).cloned().map(DummyData)).collect())
    }
}

#[tokio::test]
async fn basic_load() {
    let context = DummyContext::new(&[(42, "Foo")]);
    let loader = Loader::new(DummyBatchFn, Arc::clone(&context));

    assert_eq!(loader.load(42).await.unwrap(), Some(DummyData("Foo".to_owned())));
    assert_eq!(loader.load(7).await.unwrap(), None);
}

#[tokio::test]
async fn repeated_load_hits_cache() {
    let context = DummyContext::new(&[(42, "Foo")]);
    let loader = Loader::new(DummyBatchFn, Arc::clone(&context));

    assert_eq!(loader.load(42).await.unwrap(), Some(DummyData("Foo".to_owned())));
    assert_eq!(loader.load(42).await.unwrap(), Some(DummyData("Foo".to_owned())));
    assert_eq!(context.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn basic_load_many() {
    let context =
        DummyContext::new(&[(42, "one fish"), (12, "two fish"), (5, "red fish"), (8, "blue fish")]);
    let loader = Loader::new(DummyBatchFn, Arc::clone(&context));

    assert_eq!(
        loader.load_many(vec![5, 12, 8]).await.unwrap(),
        vec![
            Some(DummyData("red fish".to_owned())),
            Some(DummyData("two fish".to_owned())),
            Some(DummyData("blue fish".to_owned()))
        ]
    );
}

#[tokio::test]
async fn concurrent_loads_coalesce_into_one_batch() {
    let context = DummyContext::new(&[(1, "one"), (2, "two")]);
    let loader = Loader::new(DummyBatchFn, Arc::clone(&context));

    let (a, b, a_again) = future::join3(loader.load(1), loader.load(2), loader.load(1)).await;
    assert_eq!(a.unwrap(), Some(DummyData("one".to_owned())));
    assert_eq!(b.unwrap(), Some(DummyData("two".to_owned())));
    assert_eq!(a_again.unwrap(), Some(DummyData("one".to_owned())));

    // One dispatch, duplicates folded, first-seen order kept.
    assert_eq!(context.calls.load(Ordering::SeqCst), 1);
    assert_eq!(*context.batches.lock().unwrap(), vec![vec![1, 2]]);
}

#[tokio::test]
async fn load_async() {
    let context =
        DummyContext::new(&[(42, "one fish"), (12, "two fish"), (5, "red fish"), (8, "blue fish")]);
    let loader = Loader::new(DummyBatchFn, Arc::clone(&context));

    let tuple = future::join4(
        loader.load(5),
        loader.load_many(vec![5, 42]),
        loader.load(99),
        loader.load(12),
    );

    let (a, b, c, d) = tuple.await;
    assert_eq!(a.unwrap(), Some(DummyData("red fish".to_owned())));
    assert_eq!(
        b.unwrap(),
        vec![Some(DummyData("red fish".to_owned())), Some(DummyData("one fish".to_owned()))]
    );
    assert_eq!(c.unwrap(), None);
    assert_eq!(d.unwrap(), Some(DummyData("two fish".to_owned())));

    // All four requests were covered by a single dispatch.
    assert_eq!(*context.batches.lock().unwrap(), vec![vec![5, 42, 99, 12]]);
}

#[tokio::test]
async fn null_key_short_circuits() {
    let context = DummyContext::new(&[(1, "one")]);
    let loader = Loader::new(DummyBatchFn, Arc::clone(&context));

    assert_eq!(loader.load_opt(None).await.unwrap(), None);
    assert_eq!(context.calls.load(Ordering::SeqCst), 0);

    assert_eq!(loader.load_opt(Some(1)).await.unwrap(), Some(DummyData("one".to_owned())));
    assert_eq!(context.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn clear_retriggers_dispatch() {
    let context = DummyContext::new(&[(42, "Foo")]);
    let loader = Loader::new(DummyBatchFn, Arc::clone(&context));

    assert_eq!(loader.load(42).await.unwrap(), Some(DummyData("Foo".to_owned())));
    loader.clear().await;
    assert_eq!(loader.load(42).await.unwrap(), Some(DummyData("Foo".to_owned())));
    assert_eq!(context.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn evict_retriggers_for_that_key_only() {
    let context = DummyContext::new(&[(1, "one"), (2, "two")]);
    let loader = Loader::new(DummyBatchFn, Arc::clone(&context));

    loader.load_many(vec![1, 2]).await.unwrap();
    loader.evict(1).await;

    assert_eq!(loader.load(1).await.unwrap(), Some(DummyData("one".to_owned())));
    assert_eq!(loader.load(2).await.unwrap(), Some(DummyData("two".to_owned())));
    assert_eq!(*context.batches.lock().unwrap(), vec![vec![1, 2], vec![1]]);
}

#[tokio::test]
async fn primed_values_skip_the_batch_function() {
    let context = DummyContext::new(&[]);
    let loader = Loader::new(DummyBatchFn, Arc::clone(&context));

    loader.prime(9, Some(DummyData("primed".to_owned()))).await;
    assert_eq!(loader.load(9).await.unwrap(), Some(DummyData("primed".to_owned())));
    assert_eq!(context.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failed_batch_rejects_every_waiter() {
    let context = DummyContext::new(&[(1, "one"), (2, "two")]);
    context.fail_next.store(true, Ordering::SeqCst);
    let loader = Loader::new(DummyBatchFn, Arc::clone(&context));

    let (a, b) = future::join(loader.load(1), loader.load(2)).await;
    let a_err = a.unwrap_err();
    let b_err = b.unwrap_err();
    assert!(matches!(a_err, LoadError::Batch(_)));
    assert_eq!(a_err.to_string(), "batch function failed: store unreachable");
    assert_eq!(b_err.to_string(), a_err.to_string());

    // Nothing was cached, so the next frame dispatches again and succeeds.
    assert_eq!(loader.load(1).await.unwrap(), Some(DummyData("one".to_owned())));
    assert_eq!(context.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn misaligned_batch_rejects_the_frame() {
    let context = DummyContext::new(&[(1, "one"), (2, "two")]);
    let loader = Loader::new(TruncatingBatchFn, Arc::clone(&context));

    let (a, b) = future::join(loader.load(1), loader.load(2)).await;
    assert!(matches!(a.unwrap_err(), LoadError::BatchShape { requested: 2, returned: 1 }));
    assert!(matches!(b.unwrap_err(), LoadError::BatchShape { .. }));
}

// String keys exercise the same frame handling with non-Copy keys.

#[derive(Default)]
struct CallLog {
    batches: Mutex<Vec<Vec<String>>>,
}

struct UpperBatchFn;

#[async_trait]
impl BatchFunction<String, Option<String>> for UpperBatchFn {
    type Context = Arc<CallLog>;
    type Error = String;

    async fn load(keys: &[String], log: &Arc<CallLog>) -> Result<Vec<Option<String>>, String> {
        log.batches.lock().unwrap().push(keys.to_vec());
        Ok(keys.iter().map(|k| Some(k.to_uppercase())).collect())
    }
}

#[tokio::test]
async fn duplicate_string_keys_dedupe_in_first_seen_order() {
    let log = Arc::new(CallLog::default());
    let loader = Loader::new(UpperBatchFn, Arc::clone(&log));

    let (a, b, a_again) = future::join3(
        loader.load("a".to_owned()),
        loader.load("b".to_owned()),
        loader.load("a".to_owned()),
    )
    .await;
    assert_eq!(a.unwrap().as_deref(), Some("A"));
    assert_eq!(b.unwrap().as_deref(), Some("B"));
    assert_eq!(a_again.unwrap().as_deref(), Some("A"));

    assert_eq!(*log.batches.lock().unwrap(), vec![vec!["a".to_owned(), "b".to_owned()]]);
}

// One-to-many loader over notes attached to an entity.

#[derive(Debug, PartialEq, Eq, Clone)]
struct Note {
    entity: i64,
    body: String,
}

struct NotesContext {
    rows: Vec<Note>,
    table_exists: bool,
}

impl NotesContext {
    fn notes_by_entity_ids(&self, ids: &[i64]) -> Result<Vec<Note>, String> {
        if !self.table_exists {
            return Err("relation \"notes\" does not exist".to_owned());
        }
        Ok(self.rows.iter().filter(|n| ids.contains(&n.entity)).cloned().collect())
    }
}

struct NotesBatchFn;

#[async_trait]
impl BatchFunction<i64, Vec<Note>> for NotesBatchFn {
    type Context = NotesContext;
    type Error = String;

    async fn load(keys: &[i64], context: &NotesContext) -> Result<Vec<Vec<Note>>, String> {
        let rows = match context.notes_by_entity_ids(keys) {
            Ok(rows) => rows,
            // Schema predating the notes migration: no rows, not an error.
            Err(ref e) if e.contains("does not exist") => Vec::new(),
            Err(e) => return Err(e),
        };
        Ok(group_by_key(keys, rows, |n| n.entity))
    }
}

#[tokio::test]
async fn one_to_many_answers_empty_lists_for_childless_keys() {
    let context = NotesContext {
        rows: vec![
            Note { entity: 1, body: "seen at the pier".to_owned() },
            Note { entity: 1, body: "left by ferry".to_owned() },
        ],
        table_exists: true,
    };
    let loader = Loader::new(NotesBatchFn, context);

    let (p1, p2) = future::join(loader.load(1), loader.load(2)).await;
    let p1 = p1.unwrap();
    assert_eq!(p1.len(), 2);
    assert_eq!(p1[0].body, "seen at the pier");
    assert_eq!(p2.unwrap(), Vec::<Note>::new());
}

#[tokio::test]
async fn missing_table_degrades_to_empty_lists() {
    let context = NotesContext { rows: Vec::new(), table_exists: false };
    let loader = Loader::new(NotesBatchFn, context);

    let (p1, p2) = future::join(loader.load(1), loader.load(2)).await;
    assert!(p1.unwrap().is_empty());
    assert!(p2.unwrap().is_empty());
}

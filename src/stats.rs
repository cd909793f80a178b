#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Human readable name used to identify this worker when the stats are
    /// reported.
    tag: &'static str,
    /// Number of load requests drained from the request channel.
    load_requests: u32,
    /// Total number of keys that were requested (not necessarily unique).
    keys_requested: u32,
    /// Keys that were answered straight from the loader cache.
    cache_hits: u32,
    /// Number of batch dispatches this worker executed.
    flushes: u32,
    /// Dispatches whose frame was rejected wholesale.
    failed_flushes: u32,
    /// The average number of distinct keys per dispatch.
    mean_batch_size: f32,
    /// The largest dispatched key list.
    max_batch_size: u32,
    /// The smallest dispatched key list.
    min_batch_size: u32,
}

impl WorkerStats {
    pub fn new(tag: &'static str) -> Self {
        Self { tag, min_batch_size: u32::MAX, ..Default::default() }
    }

    pub fn record_load_request(&mut self, keys_requested: u32, cache_hits: u32) {
        self.load_requests += 1;
        self.keys_requested += keys_requested;
        self.cache_hits += cache_hits;
    }

    pub fn record_flush(&mut self, batch_size: u32) {
        let flushes = self.flushes + 1;
        self.mean_batch_size = (((self.mean_batch_size as f64 * self.flushes as f64)
            + batch_size as f64)
            / flushes as f64) as f32;
        self.flushes = flushes;
        if batch_size > self.max_batch_size {
            self.max_batch_size = batch_size;
        }
        if batch_size < self.min_batch_size {
            self.min_batch_size = batch_size;
        }
    }

    pub fn record_failed_flush(&mut self) {
        self.failed_flushes += 1;
    }
}

impl Drop for WorkerStats {
    fn drop(&mut self) {
        tracing::debug!(worker_stats = ?self);
    }
}

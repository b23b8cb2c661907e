//! Background cache warming.
//!
//! Listing reads hand the documents they loaded to a [`CacheWarmer`] so
//! that following single-document reads hit the cache. Warming is best
//! effort: a full queue drops the batch, and write failures are only
//! logged.
//!
//! The pool is a bounded queue drained by one dispatcher task, which runs
//! at most `workers` batches at a time. The dispatcher takes a batch off
//! the queue only once a worker slot is free, so the queue capacity is the
//! exact number of batches that may wait.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, Mutex, Semaphore};
use tokio::task::{JoinHandle, JoinSet};

use newsagg_core::cache::{serialize_value, CacheKey, EntityDescriptor, KeyParams};

use super::{CacheCoordinator, Epoch};

/// Default number of concurrently running batches.
pub const DEFAULT_WORKERS: usize = 2;

/// Default number of batches that may wait in the queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarmerConfig {
    pub workers: usize,
    pub queue_capacity: usize,
}

impl Default for WarmerConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

#[derive(Debug)]
struct WarmEntry {
    key: CacheKey,
    payload: Vec<u8>,
    ttl: Duration,
}

/// Values to write, tied to the invalidation epoch of their entity type
/// observed before they were read from the store. Entries whose type was
/// invalidated since are discarded.
#[derive(Debug)]
pub struct WarmBatch {
    label: &'static str,
    epoch: Epoch,
    entries: Vec<WarmEntry>,
}

impl WarmBatch {
    pub fn new(label: &'static str, epoch: Epoch) -> Self {
        Self {
            label,
            epoch,
            entries: Vec::new(),
        }
    }

    pub fn push<T: Serialize + ?Sized>(
        &mut self,
        descriptor: &EntityDescriptor,
        identity: &str,
        params: &KeyParams,
        value: &T,
    ) {
        let key = descriptor.key(identity, params);
        match serialize_value(value) {
            Ok(payload) => self.entries.push(WarmEntry {
                key,
                payload,
                ttl: descriptor.ttl,
            }),
            Err(err) => tracing::warn!(%key, error = %err, "Skipping unserializable warm entry"),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Bounded pool of cache-warming workers.
pub struct CacheWarmer {
    queue: mpsc::Sender<WarmBatch>,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl CacheWarmer {
    /// Spawns the dispatcher. Must be called within a tokio runtime.
    pub fn start(coordinator: CacheCoordinator, config: WarmerConfig) -> Self {
        let workers = config.workers.max(1);
        let (queue, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let (shutdown, shutdown_rx) = oneshot::channel();

        let dispatcher = Dispatcher {
            queue: receiver,
            shutdown: shutdown_rx,
            closing: false,
            coordinator,
            permits: Arc::new(Semaphore::new(workers)),
        };
        let handle = tokio::spawn(dispatcher.run());

        tracing::info!(
            workers,
            queue_capacity = config.queue_capacity,
            "Cache warmer started"
        );

        Self {
            queue,
            shutdown: Mutex::new(Some(shutdown)),
            dispatcher: Mutex::new(Some(handle)),
        }
    }

    /// Enqueues a batch without waiting. Returns `false` when the batch was
    /// dropped because the queue is full or the warmer is shut down.
    pub fn submit(&self, batch: WarmBatch) -> bool {
        if batch.is_empty() {
            return true;
        }
        match self.queue.try_send(batch) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(batch)) => {
                tracing::warn!(
                    label = batch.label,
                    entries = batch.len(),
                    "Cache warmer queue full, dropping batch"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(batch)) => {
                tracing::debug!(label = batch.label, "Cache warmer stopped, dropping batch");
                false
            }
        }
    }

    /// Returns true if a batch submitted now would be queued.
    pub fn has_capacity(&self) -> bool {
        self.queue.capacity() > 0
    }

    /// Stops accepting batches, drains what is queued and waits for the
    /// running ones. Calling it again is a no-op.
    pub async fn shutdown(&self) {
        if let Some(shutdown) = self.shutdown.lock().await.take() {
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.dispatcher.lock().await.take() {
            if let Err(err) = handle.await {
                tracing::error!(error = %err, "Cache warmer dispatcher panicked");
            }
        }
        tracing::info!("Cache warmer stopped");
    }
}

struct Dispatcher {
    queue: mpsc::Receiver<WarmBatch>,
    shutdown: oneshot::Receiver<()>,
    closing: bool,
    coordinator: CacheCoordinator,
    permits: Arc<Semaphore>,
}

impl Dispatcher {
    async fn run(mut self) {
        let mut running = JoinSet::new();

        loop {
            let Some(permit) = self.next_permit().await else {
                break;
            };
            let Some(batch) = self.next_batch().await else {
                break;
            };

            let coordinator = self.coordinator.clone();
            running.spawn(async move {
                warm(&coordinator, batch).await;
                drop(permit);
            });
            while running.try_join_next().is_some() {}
        }

        while running.join_next().await.is_some() {}
    }

    /// Waits for a free worker slot.
    async fn next_permit(&mut self) -> Option<tokio::sync::OwnedSemaphorePermit> {
        loop {
            let permit = tokio::select! {
                _ = &mut self.shutdown, if !self.closing => None,
                permit = Arc::clone(&self.permits).acquire_owned() => Some(permit),
            };
            match permit {
                Some(permit) => return permit.ok(),
                None => self.close(),
            }
        }
    }

    /// Next queued batch; `None` once the queue is closed and drained.
    async fn next_batch(&mut self) -> Option<WarmBatch> {
        loop {
            let batch = tokio::select! {
                _ = &mut self.shutdown, if !self.closing => None,
                batch = self.queue.recv() => Some(batch),
            };
            match batch {
                Some(batch) => return batch,
                None => self.close(),
            }
        }
    }

    fn close(&mut self) {
        self.closing = true;
        self.queue.close();
    }
}

async fn warm(coordinator: &CacheCoordinator, batch: WarmBatch) {
    let mut written = 0;
    for entry in &batch.entries {
        if coordinator
            .populate_since(&entry.key, &entry.payload, entry.ttl, batch.epoch)
            .await
        {
            written += 1;
        }
    }
    tracing::debug!(
        label = batch.label,
        written,
        total = batch.entries.len(),
        "Warmed cache"
    );
}

#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_possible_truncation)]

pub mod codec;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{RwLock, RwLockUpgradableReadGuard};

use quiver_vectors::{Vector, VectorId, Vectors};

/// Chunk size of the underlying index.
const CHUNK_SIZE: usize = 128;

/// Default delete-ratio percentage that triggers a background repack.
pub const DEFAULT_REPACK_PERCENT: u32 = 10;

#[derive(Debug, Clone, Copy)]
pub struct DatabaseOptions {
    /// Percentage of deleted records that triggers a background repack.
    pub repack_percent: u32,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            repack_percent: DEFAULT_REPACK_PERCENT,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct DbHeader {
    pub(crate) vector_length: usize,
    pub(crate) repack_percent: u32,
    pub(crate) items_count: usize,
    pub(crate) deletes_count: usize,
}

/// A record passing through the database boundary. Records returned from
/// `add` and `get` carry an empty vector; the index retains the data.
#[derive(Debug, Clone)]
pub struct Record<V> {
    pub id: VectorId,
    pub vector: Vector,
    pub data: V,
}

#[derive(Debug)]
pub(crate) struct DbInner<V> {
    pub(crate) header: DbHeader,
    pub(crate) vectors: Vectors,
    pub(crate) data: HashMap<VectorId, V>,
}

/// A vectors index paired with per-id payloads. Every stored vector is
/// normalised to the database's vector length; deletes accumulate until the
/// configured ratio is exceeded, at which point a background task repacks
/// the index and folds the counters.
#[derive(Debug)]
pub struct Database<V> {
    pub(crate) inner: RwLock<DbInner<V>>,
    repacking: AtomicBool,
}

impl<V> Database<V> {
    pub fn new(vector_length: usize, options: DatabaseOptions) -> Self {
        Self {
            inner: RwLock::new(DbInner {
                header: DbHeader {
                    vector_length,
                    repack_percent: options.repack_percent,
                    items_count: 0,
                    deletes_count: 0,
                },
                vectors: Vectors::new(CHUNK_SIZE),
                data: HashMap::new(),
            }),
            repacking: AtomicBool::new(false),
        }
    }

    pub(crate) fn from_inner(inner: DbInner<V>) -> Self {
        Self {
            inner: RwLock::new(inner),
            repacking: AtomicBool::new(false),
        }
    }

    pub fn vector_length(&self) -> usize {
        self.inner.read().header.vector_length
    }

    pub fn repack_percent(&self) -> u32 {
        self.inner.read().header.repack_percent
    }

    pub fn items_count(&self) -> usize {
        self.inner.read().header.items_count
    }

    pub fn deletes_count(&self) -> usize {
        self.inner.read().header.deletes_count
    }

    /// Inserts a record, returning it with the assigned id and the vector
    /// cleared. The payload is cloned into the database's map.
    pub fn add(&self, record: Record<V>) -> Record<V>
    where
        V: Clone,
    {
        let mut inner = self.inner.write();

        let record = inner.add_record(record);
        inner.header.items_count += 1;

        record
    }

    /// Inserts a batch of records; the returned ids are in input order.
    pub fn add_batch(&self, records: Vec<Record<V>>) -> Vec<Record<V>>
    where
        V: Clone,
    {
        let mut inner = self.inner.write();

        let count = records.len();
        let result = records
            .into_iter()
            .map(|record| inner.add_record(record))
            .collect();

        inner.header.items_count += count;

        result
    }

    /// Searches for the records most similar to the query vectors. Queries
    /// are normalised to the database's vector length first. Returned
    /// records carry the payload but no vector.
    pub fn get(&self, mut queries: Vec<Vector>, k: usize) -> Vec<Record<V>>
    where
        V: Clone + Default,
    {
        let inner = self.inner.read();

        for query in &mut queries {
            inner.header.resize_vector(query);
        }

        let ids = inner.vectors.get(&queries, k);

        ids.into_iter()
            .map(|id| Record {
                id,
                vector: Vector::new(),
                data: inner.data.get(&id).cloned().unwrap_or_default(),
            })
            .collect()
    }
}

impl<V: Send + Sync + 'static> Database<V> {
    /// Deletes a record by id. Unknown or already-deleted ids are silent
    /// no-ops.
    pub fn delete(self: &Arc<Self>, id: VectorId) {
        let mut inner = self.inner.write();

        let mut trigger = false;
        if inner.delete_record(id) {
            trigger = self.bump_delete_count(&mut inner, 1);
        }
        drop(inner);

        if trigger {
            self.spawn_repack();
        }
    }

    /// Deletes a batch of records by id, counting only the ones that were
    /// live.
    pub fn delete_batch(self: &Arc<Self>, ids: &[VectorId]) {
        let mut inner = self.inner.write();

        let mut deleted = 0;
        for &id in ids {
            if inner.delete_record(id) {
                deleted += 1;
            }
        }

        let trigger = self.bump_delete_count(&mut inner, deleted);
        drop(inner);

        if trigger {
            self.spawn_repack();
        }
    }

    /// Bumps the delete counter and reports whether the caller should kick
    /// off a background repack. At most one repack runs at a time; the flag
    /// is claimed here, under the write lock.
    fn bump_delete_count(&self, inner: &mut DbInner<V>, count: usize) -> bool {
        inner.header.deletes_count += count;

        let total = inner.header.items_count + inner.header.deletes_count;
        if total == 0 {
            return false;
        }

        let over = inner.header.deletes_count * 100 / total > inner.header.repack_percent as usize;
        over && !self.repacking.swap(true, Ordering::AcqRel)
    }

    fn spawn_repack(self: &Arc<Self>) {
        let db = Arc::clone(self);
        let task = move || db.run_repack();

        // Repacking is CPU-bound; keep it off the async workers. The library
        // also works without a runtime, e.g. from synchronous tests.
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(task);
            }
            Err(_) => {
                std::thread::spawn(task);
            }
        }
    }

    /// Builds the packed index while holding an upgradable read lock, so
    /// concurrent reads proceed and no write can slip in between the
    /// snapshot and the publish, then upgrades to swap the index and fold
    /// the counters.
    fn run_repack(&self) {
        let guard = self.inner.upgradable_read();

        let packed = guard.vectors.repack();

        let mut inner = RwLockUpgradableReadGuard::upgrade(guard);
        inner.vectors = packed;
        inner.header.items_count -= inner.header.deletes_count;
        inner.header.deletes_count = 0;
        drop(inner);

        self.repacking.store(false, Ordering::Release);
    }
}

impl<V> DbInner<V> {
    fn add_record(&mut self, mut record: Record<V>) -> Record<V>
    where
        V: Clone,
    {
        self.header.resize_vector(&mut record.vector);

        record.id = self.vectors.add(std::mem::take(&mut record.vector));
        self.data.insert(record.id, record.data.clone());

        record
    }

    fn delete_record(&mut self, id: VectorId) -> bool {
        if self.vectors.delete(id) {
            self.data.remove(&id);
            return true;
        }
        false
    }

    /// Repacks the index in place and folds the counters. Used by the codec
    /// so persisted streams never contain tombstones.
    pub(crate) fn repack_vectors(&mut self) {
        self.vectors = self.vectors.repack();
        self.header.items_count -= self.header.deletes_count;
        self.header.deletes_count = 0;
    }
}

impl DbHeader {
    /// Normalises a vector to the database's length: longer inputs are
    /// truncated, shorter ones zero-padded.
    fn resize_vector(&self, vector: &mut Vector) {
        if vector.len() > self.vector_length {
            vector.truncate(self.vector_length);
        } else if vector.len() < self.vector_length {
            vector.resize(self.vector_length, 0.0);
        }
    }
}

use rayon::prelude::*;

use crate::chunk::Chunk;
use crate::heap::{HeapItem, LimitHeap};
use crate::{math, pool, Vector, VectorId};

/// Append-only chunked index of fixed-length vectors with exact brute-force
/// cosine search. Only the last chunk accepts appends; earlier chunks are
/// frozen apart from tombstoning.
#[derive(Debug)]
pub struct Vectors {
    chunk_size: usize,
    chunks: Vec<Chunk>,
}

pub(crate) struct SimilarityItem {
    pub(crate) id: VectorId,
    pub(crate) similarity: f64,
}

impl HeapItem for SimilarityItem {
    fn less(&self, other: &Self) -> bool {
        self.similarity < other.similarity
    }
}

impl Vectors {
    /// Creates an index with a single empty chunk at base id 0.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_size` is zero.
    pub fn new(chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "chunk size must be positive");
        Self {
            chunk_size,
            chunks: vec![Chunk::new(0, chunk_size)],
        }
    }

    pub(crate) fn from_parts(chunk_size: usize, chunks: Vec<Chunk>) -> Self {
        Self { chunk_size, chunks }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub(crate) fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Appends a vector, allocating a new chunk when the current one is
    /// full. Returns the assigned id; ids are strictly increasing until the
    /// index is repacked.
    pub fn add(&mut self, vector: Vector) -> VectorId {
        let vector = match self.current_mut().add(vector) {
            Ok(id) => return id,
            Err(vector) => vector,
        };

        let base_id = (self.chunks.len() * self.chunk_size) as VectorId;
        self.chunks.push(Chunk::new(base_id, self.chunk_size));

        self.current_mut()
            .add(vector)
            .expect("fresh chunk has capacity")
    }

    /// Tombstones the record with the given id. Returns false when the id is
    /// unknown or already deleted.
    pub fn delete(&mut self, id: VectorId) -> bool {
        let i = self.chunks.partition_point(|c| c.base_id <= id);
        if i == 0 {
            return false;
        }
        self.chunks[i - 1].delete(id)
    }

    /// Searches for the ids most similar to the query vectors. All queries
    /// feed a single top-`k` selection, so at most `k` ids are returned
    /// regardless of the query count. The result order is unspecified.
    ///
    /// Chunks are scanned in parallel; each scan folds into a local heap and
    /// the local heaps merge into one bounded heap at the end.
    pub fn get(&self, queries: &[Vector], k: usize) -> Vec<VectorId> {
        let scratch = pool::scratch();

        let queries: Vec<(&Vector, f64)> = queries
            .iter()
            .map(|q| {
                let mut tmp = scratch.get(q.len());
                let norm = math::vector_norm(q, &mut tmp);
                scratch.put(tmp);
                (q, norm)
            })
            .collect();

        let heaps: Vec<LimitHeap<SimilarityItem>> = self
            .chunks
            .par_iter()
            .flat_map_iter(|chunk| {
                queries
                    .iter()
                    .map(move |&(query, norm)| scan_chunk(chunk, query, k, norm))
            })
            .collect();

        let mut merged = LimitHeap::new(k);
        for heap in heaps {
            for item in heap {
                merged.push(item);
            }
        }

        merged.into_iter().map(|item| item.id).collect()
    }

    /// Slides live records into the lowest slots in place and drops empty
    /// trailing chunks. Ids are preserved; after compaction ids within a
    /// chunk are ascending but no longer dense, so lookups keep binary
    /// searching by id rather than using slot arithmetic.
    pub fn compact(&mut self) {
        let mut dest_chunk = 0;
        let mut dest_slot = 0;

        for src_chunk in 0..self.chunks.len() {
            for src_slot in 0..self.chunks[src_chunk].records.len() {
                if self.chunks[src_chunk].records[src_slot].vector.is_none() {
                    continue;
                }

                if dest_slot == self.chunks[dest_chunk].capacity {
                    dest_chunk += 1;
                    dest_slot = 0;
                }

                if (src_chunk, src_slot) != (dest_chunk, dest_slot) {
                    let record = std::mem::take(&mut self.chunks[src_chunk].records[src_slot]);
                    self.chunks[dest_chunk].records[dest_slot] = record;
                }

                if dest_slot == 0 {
                    self.chunks[dest_chunk].base_id = self.chunks[dest_chunk].records[0].id;
                }

                dest_slot += 1;
            }
        }

        self.chunks[dest_chunk].records.truncate(dest_slot);
        self.chunks.truncate(dest_chunk + 1);
    }

    /// Builds a fresh index holding only the live records, densely packed
    /// into new chunks. Ids are preserved; each new chunk's base id is the
    /// id of its first record. The original index is left untouched.
    pub fn repack(&self) -> Vectors {
        let mut packed = Vectors {
            chunk_size: self.chunk_size,
            chunks: vec![Chunk::new(0, self.chunk_size)],
        };

        for chunk in &self.chunks {
            for record in &chunk.records {
                if record.vector.is_none() {
                    continue;
                }

                if packed.chunks.last().expect("at least one chunk").is_full() {
                    packed.chunks.push(Chunk::new(0, self.chunk_size));
                }

                let dest = packed.chunks.last_mut().expect("at least one chunk");
                if dest.records.is_empty() {
                    dest.base_id = record.id;
                }
                dest.records.push(record.clone());
            }
        }

        packed
    }

    fn current_mut(&mut self) -> &mut Chunk {
        self.chunks.last_mut().expect("index always has a chunk")
    }
}

fn scan_chunk(chunk: &Chunk, query: &[f32], k: usize, norm: f64) -> LimitHeap<SimilarityItem> {
    let scratch = pool::scratch();
    let mut tmp = scratch.get(query.len());

    let mut heap = LimitHeap::new(k);
    for record in &chunk.records {
        let Some(vector) = &record.vector else {
            continue;
        };

        let similarity = math::cosine_similarity(query, vector, norm, record.norm, &mut tmp);
        heap.push(SimilarityItem {
            id: record.id,
            similarity,
        });
    }

    scratch.put(tmp);

    heap
}

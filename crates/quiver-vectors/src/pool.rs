use std::sync::OnceLock;

use quiver_buffers::SlicePool;

// Fallback capacity when the process never calls `init_pool`. Large enough
// for any embedding model in common use.
const DEFAULT_SCRATCH_SIZE: usize = 20_000;

static SCRATCH: OnceLock<SlicePool<f32>> = OnceLock::new();

/// Sets the nominal size of the process-wide scratch pool used for norm and
/// similarity products. Must be called before the first vector operation;
/// later calls have no effect.
pub fn init_pool(size: usize) {
    let _ = SCRATCH.set(SlicePool::new(size));
}

pub(crate) fn scratch() -> &'static SlicePool<f32> {
    SCRATCH.get_or_init(|| SlicePool::new(DEFAULT_SCRATCH_SIZE))
}

use crate::vkn::BackingStoreError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocError {
    #[error("allocation of {requested} bytes exceeds chunk capacity {capacity}")]
    RequestExceedsChunkCapacity { requested: u64, capacity: u64 },

    #[error("zero sized allocation requested")]
    ZeroSizedRequest,

    #[error("invalid allocation: chunk {chunk_index}, offset {offset}, size {size}")]
    InvalidAllocation {
        chunk_index: u32,
        offset: u64,
        size: u64,
    },

    #[error("cannot shrink an allocation of {current} bytes to {requested} bytes")]
    ShrinkToLargerSize { current: u64, requested: u64 },

    #[error("failed to create chunk backing store: {0}")]
    BackingStoreCreationFailed(#[from] BackingStoreError),

    #[error("invalid chunk capacity {capacity}: {reason}")]
    InvalidChunkCapacity { capacity: u64, reason: &'static str },

    #[error("chunk {chunk_index} still has {allocated_bytes} bytes allocated")]
    PoolNotEmpty {
        chunk_index: usize,
        allocated_bytes: u64,
    },

    #[error("memory pool has already been destroyed")]
    PoolDestroyed,
}

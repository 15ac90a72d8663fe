use crate::util::StrategyKind;
use crate::vkn::ChunkCreationParams;

/// Describes a memory pool. Fixed for the lifetime of the pool.
#[derive(Debug, Clone)]
pub struct PoolDesc {
    /// Shows up in log lines and summaries.
    pub name: String,
    pub chunk_capacity: u64,
    pub creation_params: ChunkCreationParams,
    pub strategy_kind: StrategyKind,
    /// Create the first chunk up front instead of on the first allocation.
    pub eager_first_chunk: bool,
}

impl Default for PoolDesc {
    fn default() -> Self {
        Self {
            name: "memory_pool".to_string(),
            chunk_capacity: 64 * 1024 * 1024,
            creation_params: ChunkCreationParams::default(),
            strategy_kind: StrategyKind::BestFit,
            eager_first_chunk: false,
        }
    }
}

use super::Region;

mod best_fit;
pub use best_fit::*;

mod buddy;
pub use buddy::*;

/// Free-space bookkeeping for a single chunk.
///
/// A strategy only knows offsets and sizes. Validation of the caller's
/// handles happens one level up, in the chunk's live registry, so every
/// call reaching a strategy is assumed to describe a block it handed out.
pub trait AllocationStrategy {
    /// Reserves `req_size` bytes, returning the offset of the reserved block.
    ///
    /// `None` means no free block in this chunk can hold the request.
    fn allocate(&mut self, req_size: u64) -> Option<u64>;

    /// Returns a block previously handed out by `allocate`.
    fn free(&mut self, offset: u64, size: u64);

    /// Releases the tail of a live block, keeping its offset.
    ///
    /// Requests with `new_size >= old_size` leave the strategy untouched.
    fn shrink(&mut self, offset: u64, old_size: u64, new_size: u64);

    /// Bytes actually reserved for a request of `size` bytes.
    fn footprint(&self, size: u64) -> u64;

    fn capacity(&self) -> u64;

    fn free_bytes(&self) -> u64;

    /// Size of the biggest request that would currently succeed.
    fn largest_free_block(&self) -> u64;

    /// All free spans, sorted by offset.
    fn free_regions(&self) -> Vec<Region>;
}

/// Which strategy a pool's chunks are managed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategyKind {
    #[default]
    BestFit,
    Buddy,
}

/// The strategy instance owned by one chunk.
///
/// A pool never mixes kinds, so this is a closed enum rather than a boxed
/// trait object.
#[derive(Debug, Clone)]
pub enum Strategy {
    BestFit(FreeListAllocator),
    Buddy(BuddyAllocator),
}

impl Strategy {
    /// Creates a strategy spanning a whole chunk of `capacity` bytes.
    ///
    /// The buddy variant expects `capacity` to be a power of two; the pool
    /// checks this before any chunk is created.
    pub fn new(kind: StrategyKind, capacity: u64) -> Self {
        match kind {
            StrategyKind::BestFit => Strategy::BestFit(FreeListAllocator::new(capacity)),
            StrategyKind::Buddy => Strategy::Buddy(BuddyAllocator::new(capacity)),
        }
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::BestFit(_) => StrategyKind::BestFit,
            Strategy::Buddy(_) => StrategyKind::Buddy,
        }
    }
}

macro_rules! dispatch {
    ($self:expr, $s:ident => $body:expr) => {
        match $self {
            Strategy::BestFit($s) => $body,
            Strategy::Buddy($s) => $body,
        }
    };
}

impl AllocationStrategy for Strategy {
    fn allocate(&mut self, req_size: u64) -> Option<u64> {
        dispatch!(self, s => s.allocate(req_size))
    }

    fn free(&mut self, offset: u64, size: u64) {
        dispatch!(self, s => s.free(offset, size))
    }

    fn shrink(&mut self, offset: u64, old_size: u64, new_size: u64) {
        dispatch!(self, s => s.shrink(offset, old_size, new_size))
    }

    fn footprint(&self, size: u64) -> u64 {
        dispatch!(self, s => s.footprint(size))
    }

    fn capacity(&self) -> u64 {
        dispatch!(self, s => s.capacity())
    }

    fn free_bytes(&self) -> u64 {
        dispatch!(self, s => s.free_bytes())
    }

    fn largest_free_block(&self) -> u64 {
        dispatch!(self, s => s.largest_free_block())
    }

    fn free_regions(&self) -> Vec<Region> {
        dispatch!(self, s => s.free_regions())
    }
}

use crate::util::Region;

const INVALID_CHUNK_INDEX: u32 = u32::MAX;

/// A caller-held handle to a reserved region of one chunk.
///
/// Freeing through the pool resets the handle to the empty sentinel, so a
/// freed handle can be passed to `free` again without effect. `id` is unique
/// per `allocate` call, which keeps a stale copy from matching a later
/// allocation that reuses the same region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Allocation {
    pub region: Region,
    pub chunk_index: u32,
    pub id: u64,
}

impl Allocation {
    pub(super) fn new(region: Region, chunk_index: u32, id: u64) -> Self {
        Self {
            region,
            chunk_index,
            id,
        }
    }

    pub fn empty() -> Self {
        Self {
            region: Region::default(),
            chunk_index: INVALID_CHUNK_INDEX,
            id: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.chunk_index == INVALID_CHUNK_INDEX && self.region.is_empty()
    }

    pub fn offset(&self) -> u64 {
        self.region.offset
    }

    pub fn size(&self) -> u64 {
        self.region.size
    }
}

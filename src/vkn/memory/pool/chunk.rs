use crate::util::{AllocationStrategy, Region, Strategy, StrategyKind};
use std::collections::HashMap;

/// One backing store of fixed capacity and the bookkeeping for it.
pub(crate) struct Chunk<B> {
    backing_store: B,
    strategy: Strategy,
    // offset -> (size as handed to the caller, allocation id)
    live: HashMap<u64, (u64, u64)>,
    allocated_bytes: u64,
}

impl<B> Chunk<B> {
    pub fn new(backing_store: B, kind: StrategyKind, capacity: u64) -> Self {
        Self {
            backing_store,
            strategy: Strategy::new(kind, capacity),
            live: HashMap::new(),
            allocated_bytes: 0,
        }
    }

    /// Reserves `size` bytes in this chunk if any free block can hold them,
    /// recording the reservation under `id`.
    pub fn try_allocate(&mut self, size: u64, id: u64) -> Option<Region> {
        let offset = self.strategy.allocate(size)?;
        self.live.insert(offset, (size, id));
        self.allocated_bytes += self.strategy.footprint(size);
        self.debug_check();
        Some(Region::new(offset, size))
    }

    /// True when `region` and `id` name exactly a live allocation of this chunk.
    pub fn is_live(&self, region: &Region, id: u64) -> bool {
        self.live.get(&region.offset) == Some(&(region.size, id))
    }

    fn holds(&self, region: &Region) -> bool {
        matches!(self.live.get(&region.offset), Some(&(size, _)) if size == region.size)
    }

    /// Returns a live region. Callers check `is_live` first.
    pub fn release(&mut self, region: Region) {
        debug_assert!(self.holds(&region));
        self.live.remove(&region.offset);
        self.strategy.free(region.offset, region.size);
        self.allocated_bytes -= self.strategy.footprint(region.size);
        self.debug_check();
    }

    /// Shrinks a live region to `new_size` bytes, `0 < new_size <= region.size`.
    pub fn shrink(&mut self, region: Region, new_size: u64) {
        debug_assert!(self.holds(&region));
        debug_assert!(new_size > 0 && new_size <= region.size);
        let released =
            self.strategy.footprint(region.size) - self.strategy.footprint(new_size);
        self.strategy.shrink(region.offset, region.size, new_size);
        if let Some(entry) = self.live.get_mut(&region.offset) {
            entry.0 = new_size;
        }
        self.allocated_bytes -= released;
        self.debug_check();
    }

    pub fn backing_store(&self) -> &B {
        &self.backing_store
    }

    pub fn into_backing_store(self) -> B {
        self.backing_store
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn capacity(&self) -> u64 {
        self.strategy.capacity()
    }

    pub fn allocated_bytes(&self) -> u64 {
        self.allocated_bytes
    }

    pub fn free_bytes(&self) -> u64 {
        self.strategy.free_bytes()
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Live regions sorted by offset.
    pub fn live_regions(&self) -> Vec<Region> {
        let mut regions: Vec<Region> = self
            .live
            .iter()
            .map(|(&offset, &(size, _))| Region::new(offset, size))
            .collect();
        regions.sort_by_key(|r| r.offset);
        regions
    }

    fn debug_check(&self) {
        debug_assert_eq!(
            self.allocated_bytes + self.strategy.free_bytes(),
            self.strategy.capacity(),
            "chunk accounting out of sync: {:?}",
            self.strategy
        );
    }
}

use super::AllocationStrategy;
use crate::util::Region;
use std::fmt::{Debug, Formatter};

/// Best-fit allocator over an address-ordered list of free regions.
///
/// Invariant: `free_list` is sorted by offset, holds no zero-sized regions
/// and never holds two regions where one ends exactly where the next begins.
#[derive(Clone)]
pub struct FreeListAllocator {
    total_size: u64,
    free_size: u64,
    free_list: Vec<Region>,
}

impl Debug for FreeListAllocator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "FreeListAllocator {{ total_size: {}, free_size: {}, free_list: {} }}",
            self.total_size,
            self.free_size,
            self.free_list.len()
        )
    }
}

impl FreeListAllocator {
    /// Creates a new best-fit allocator with the given total size (in bytes).
    pub fn new(total_size: u64) -> Self {
        let free_list = if total_size > 0 {
            vec![Region::new(0, total_size)]
        } else {
            Vec::new()
        };
        FreeListAllocator {
            total_size,
            free_size: total_size,
            free_list,
        }
    }

    /// Index of the smallest free region that can hold `req_size` bytes.
    ///
    /// Ties go to the lowest address.
    fn best_fit(&self, req_size: u64) -> Option<usize> {
        self.free_list
            .iter()
            .enumerate()
            .filter(|(_, region)| region.size >= req_size)
            .min_by_key(|(_, region)| region.size)
            .map(|(idx, _)| idx)
    }

    /// Puts `[offset, offset + size)` back on the list and merges it with
    /// whichever neighbours it touches.
    fn insert_and_coalesce(&mut self, offset: u64, size: u64) {
        if size == 0 {
            return;
        }
        let freed = Region::new(offset, size);
        let idx = self.free_list.partition_point(|r| r.offset < offset);

        debug_assert!(
            idx == 0 || !self.free_list[idx - 1].overlaps(&freed),
            "freed region {:?} overlaps free region {:?}",
            freed,
            self.free_list[idx - 1]
        );
        debug_assert!(
            idx == self.free_list.len() || !self.free_list[idx].overlaps(&freed),
            "freed region {:?} overlaps free region {:?}",
            freed,
            self.free_list[idx]
        );

        let merge_prev = idx > 0 && self.free_list[idx - 1].touches(&freed);
        let merge_next = idx < self.free_list.len() && freed.touches(&self.free_list[idx]);

        match (merge_prev, merge_next) {
            (true, true) => {
                let next = self.free_list.remove(idx);
                self.free_list[idx - 1].size += size + next.size;
            }
            (true, false) => {
                self.free_list[idx - 1].size += size;
            }
            (false, true) => {
                let next = &mut self.free_list[idx];
                next.offset = offset;
                next.size += size;
            }
            (false, false) => {
                self.free_list.insert(idx, freed);
            }
        }
        self.free_size += size;
    }
}

impl AllocationStrategy for FreeListAllocator {
    fn allocate(&mut self, req_size: u64) -> Option<u64> {
        if req_size == 0 {
            return None;
        }
        let idx = self.best_fit(req_size)?;
        let alloc_offset = self.free_list[idx].offset;
        if self.free_list[idx].size == req_size {
            self.free_list.remove(idx);
        } else {
            self.free_list[idx].offset += req_size;
            self.free_list[idx].size -= req_size;
        }
        self.free_size -= req_size;
        Some(alloc_offset)
    }

    fn free(&mut self, offset: u64, size: u64) {
        self.insert_and_coalesce(offset, size);
    }

    fn shrink(&mut self, offset: u64, old_size: u64, new_size: u64) {
        if new_size >= old_size {
            return;
        }
        self.insert_and_coalesce(offset + new_size, old_size - new_size);
    }

    fn footprint(&self, size: u64) -> u64 {
        size
    }

    fn capacity(&self) -> u64 {
        self.total_size
    }

    fn free_bytes(&self) -> u64 {
        self.free_size
    }

    fn largest_free_block(&self) -> u64 {
        self.free_list.iter().map(|r| r.size).max().unwrap_or(0)
    }

    fn free_regions(&self) -> Vec<Region> {
        self.free_list.clone()
    }
}

use super::AllocationStrategy;
use crate::util::Region;
use std::fmt::{Debug, Formatter};

/// Power-of-two buddy allocator.
///
/// `free_lists[k]` holds the offsets of free blocks of `1 << k` bytes, kept
/// sorted so the lowest address is always handed out first. A free block
/// and its buddy are never both present in the same list.
#[derive(Clone)]
pub struct BuddyAllocator {
    capacity: u64,
    max_order: u32,
    free_size: u64,
    free_lists: Vec<Vec<u64>>,
}

impl Debug for BuddyAllocator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let per_order: Vec<usize> = self.free_lists.iter().map(|l| l.len()).collect();
        write!(
            f,
            "BuddyAllocator {{ capacity: {}, free_size: {}, free_blocks_per_order: {:?} }}",
            self.capacity, self.free_size, per_order
        )
    }
}

/// Order of the smallest block that can hold `size` bytes.
fn order_of(size: u64) -> u32 {
    size.max(1).next_power_of_two().trailing_zeros()
}

fn insert_sorted(list: &mut Vec<u64>, offset: u64) {
    let (Ok(idx) | Err(idx)) = list.binary_search(&offset);
    list.insert(idx, offset);
}

impl BuddyAllocator {
    /// Creates an allocator whose single free block spans `capacity` bytes.
    ///
    /// `capacity` must be a power of two.
    pub fn new(capacity: u64) -> Self {
        debug_assert!(
            capacity.is_power_of_two(),
            "buddy capacity {} is not a power of two",
            capacity
        );
        let max_order = order_of(capacity);
        let mut free_lists = vec![Vec::new(); max_order as usize + 1];
        free_lists[max_order as usize].push(0);
        Self {
            capacity,
            max_order,
            free_size: capacity,
            free_lists,
        }
    }

    /// Free block offsets per order, lowest order first.
    pub fn free_lists(&self) -> &[Vec<u64>] {
        &self.free_lists
    }

    pub fn max_order(&self) -> u32 {
        self.max_order
    }

    /// Returns the block at `offset` of the given order, merging it with its
    /// buddy for as long as the buddy is free.
    fn release(&mut self, mut offset: u64, order: u32) {
        self.free_size += 1 << order;

        let mut order = order;
        while order < self.max_order {
            let buddy = offset ^ (1 << order);
            match self.free_lists[order as usize].binary_search(&buddy) {
                Ok(idx) => {
                    self.free_lists[order as usize].remove(idx);
                    offset = offset.min(buddy);
                    order += 1;
                }
                Err(_) => break,
            }
        }
        insert_sorted(&mut self.free_lists[order as usize], offset);
    }
}

impl AllocationStrategy for BuddyAllocator {
    fn allocate(&mut self, req_size: u64) -> Option<u64> {
        if req_size == 0 || req_size > self.capacity {
            return None;
        }
        let target = order_of(req_size);

        let found = (target..=self.max_order).find(|&k| !self.free_lists[k as usize].is_empty())?;
        let offset = self.free_lists[found as usize].remove(0);

        // split down, leaving each upper half free one order lower.
        for order in (target..found).rev() {
            insert_sorted(&mut self.free_lists[order as usize], offset + (1 << order));
        }

        self.free_size -= 1 << target;
        Some(offset)
    }

    fn free(&mut self, offset: u64, size: u64) {
        debug_assert!(
            offset % (1 << order_of(size)) == 0,
            "offset {} is not aligned to its block size",
            offset
        );
        self.release(offset, order_of(size));
    }

    fn shrink(&mut self, offset: u64, old_size: u64, new_size: u64) {
        if new_size >= old_size {
            return;
        }
        let old_order = order_of(old_size);
        let new_order = order_of(new_size);

        // the lower half of every split stays with the allocation, so none of
        // the released halves can find a free buddy.
        for order in (new_order..old_order).rev() {
            self.release(offset + (1 << order), order);
        }
    }

    fn footprint(&self, size: u64) -> u64 {
        1 << order_of(size)
    }

    fn capacity(&self) -> u64 {
        self.capacity
    }

    fn free_bytes(&self) -> u64 {
        self.free_size
    }

    fn largest_free_block(&self) -> u64 {
        self.free_lists
            .iter()
            .rposition(|l| !l.is_empty())
            .map(|order| 1 << order)
            .unwrap_or(0)
    }

    fn free_regions(&self) -> Vec<Region> {
        let mut regions: Vec<Region> = self
            .free_lists
            .iter()
            .enumerate()
            .flat_map(|(order, list)| list.iter().map(move |&offset| Region::new(offset, 1 << order)))
            .collect();
        regions.sort_by_key(|r| r.offset);
        regions
    }
}

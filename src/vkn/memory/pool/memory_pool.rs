use super::{AllocError, Allocation, Chunk, PoolDesc};
use crate::util::{AllocationStrategy, Region, StrategyKind};
use crate::vkn::{BackingStoreFactory, ChunkCreationParams};
use comfy_table::{Cell, Table};

/// A growable set of equally sized chunks that hands out sub-allocations.
///
/// Chunks are created on demand and live until [`MemoryPool::destroy`] is
/// called, which must happen before the pool is dropped and only once every
/// allocation has been freed.
pub struct MemoryPool<F: BackingStoreFactory> {
    name: String,
    factory: F,
    chunks: Vec<Chunk<F::BackingStore>>,
    chunk_capacity: u64,
    creation_params: ChunkCreationParams,
    strategy_kind: StrategyKind,
    next_id: u64,
    destroyed: bool,
}

impl<F: BackingStoreFactory> Drop for MemoryPool<F> {
    fn drop(&mut self) {
        if self.destroyed {
            return;
        }
        log::error!(
            "[{}] memory pool dropped without destroy(), leaking {} chunk(s)",
            self.name,
            self.chunks.len()
        );
        debug_assert!(
            std::thread::panicking(),
            "memory pool `{}` must be destroyed before it is dropped",
            self.name
        );
    }
}

impl<F: BackingStoreFactory> MemoryPool<F> {
    pub fn new(factory: F, desc: PoolDesc) -> Result<Self, AllocError> {
        if desc.chunk_capacity == 0 {
            return Err(AllocError::InvalidChunkCapacity {
                capacity: 0,
                reason: "chunk capacity must be non-zero",
            });
        }
        if desc.strategy_kind == StrategyKind::Buddy && !desc.chunk_capacity.is_power_of_two() {
            return Err(AllocError::InvalidChunkCapacity {
                capacity: desc.chunk_capacity,
                reason: "buddy chunks must be a power of two in size",
            });
        }

        let mut pool = Self {
            name: desc.name,
            factory,
            chunks: Vec::new(),
            chunk_capacity: desc.chunk_capacity,
            creation_params: desc.creation_params,
            strategy_kind: desc.strategy_kind,
            next_id: 1,
            destroyed: false,
        };

        if desc.eager_first_chunk {
            if let Err(e) = pool.grow() {
                // nothing was handed out, so the pool can be torn down here.
                pool.destroyed = true;
                return Err(e);
            }
        }
        Ok(pool)
    }

    /// Reserves `size` bytes, adding a chunk when no existing one can fit it.
    pub fn allocate(&mut self, size: u64) -> Result<Allocation, AllocError> {
        self.ensure_alive()?;
        if size == 0 {
            return Err(AllocError::ZeroSizedRequest);
        }
        if size > self.chunk_capacity {
            return Err(AllocError::RequestExceedsChunkCapacity {
                requested: size,
                capacity: self.chunk_capacity,
            });
        }

        let id = self.next_id;
        for (chunk_index, chunk) in self.chunks.iter_mut().enumerate() {
            if let Some(region) = chunk.try_allocate(size, id) {
                log::trace!(
                    "[{}] allocated {:?} in chunk {}",
                    self.name,
                    region,
                    chunk_index
                );
                self.next_id += 1;
                return Ok(Allocation::new(region, chunk_index as u32, id));
            }
        }

        let chunk_index = self.grow()?;
        // a fresh chunk fits any request up to its capacity.
        let region = self.chunks[chunk_index].try_allocate(size, id).ok_or(
            AllocError::RequestExceedsChunkCapacity {
                requested: size,
                capacity: self.chunk_capacity,
            },
        )?;
        log::trace!(
            "[{}] allocated {:?} in new chunk {}",
            self.name,
            region,
            chunk_index
        );
        self.next_id += 1;
        Ok(Allocation::new(region, chunk_index as u32, id))
    }

    /// Returns the allocation's region to its chunk and resets the handle.
    ///
    /// Freeing an empty handle does nothing.
    pub fn free(&mut self, allocation: &mut Allocation) -> Result<(), AllocError> {
        if allocation.is_empty() {
            return Ok(());
        }
        let chunk = self.live_chunk_mut(allocation)?;
        chunk.release(allocation.region);
        log::trace!(
            "[{}] freed {:?} in chunk {}",
            self.name,
            allocation.region,
            allocation.chunk_index
        );
        *allocation = Allocation::empty();
        Ok(())
    }

    /// Shrinks the allocation in place, keeping its offset.
    ///
    /// Shrinking to zero frees the allocation.
    pub fn shrink(&mut self, allocation: &mut Allocation, new_size: u64) -> Result<(), AllocError> {
        if new_size == 0 {
            return self.free(allocation);
        }
        let current = allocation.region.size;
        let chunk = self.live_chunk_mut(allocation)?;
        if new_size > current {
            return Err(AllocError::ShrinkToLargerSize {
                current,
                requested: new_size,
            });
        }
        if new_size == current {
            return Ok(());
        }
        chunk.shrink(allocation.region, new_size);
        allocation.region.size = new_size;
        Ok(())
    }

    /// Releases every chunk. Fails, leaving the pool untouched, while any
    /// allocation is still live.
    pub fn destroy(&mut self) -> Result<(), AllocError> {
        if self.destroyed {
            return Ok(());
        }
        if let Some((chunk_index, chunk)) = self
            .chunks
            .iter()
            .enumerate()
            .find(|(_, chunk)| chunk.allocated_bytes() != 0)
        {
            log::error!(
                "[{}] destroy() called with {} bytes still allocated in chunk {}",
                self.name,
                chunk.allocated_bytes(),
                chunk_index
            );
            return Err(AllocError::PoolNotEmpty {
                chunk_index,
                allocated_bytes: chunk.allocated_bytes(),
            });
        }

        let chunk_count = self.chunks.len();
        for chunk in self.chunks.drain(..) {
            self.factory
                .destroy_chunk_backing_store(chunk.into_backing_store());
        }
        self.destroyed = true;
        log::debug!("[{}] destroyed {} chunk(s)", self.name, chunk_count);
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn strategy_kind(&self) -> StrategyKind {
        self.strategy_kind
    }

    pub fn chunk_capacity(&self) -> u64 {
        self.chunk_capacity
    }

    pub fn creation_params(&self) -> &ChunkCreationParams {
        &self.creation_params
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// # Panics
    ///
    /// Panics if `chunk_index >= self.chunk_count()`.
    pub fn chunk_allocated_bytes(&self, chunk_index: usize) -> u64 {
        self.chunks[chunk_index].allocated_bytes()
    }

    /// # Panics
    ///
    /// Panics if `chunk_index >= self.chunk_count()`.
    pub fn chunk_free_bytes(&self, chunk_index: usize) -> u64 {
        self.chunks[chunk_index].free_bytes()
    }

    /// Free spans of one chunk, sorted by offset.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_index >= self.chunk_count()`.
    pub fn chunk_free_regions(&self, chunk_index: usize) -> Vec<Region> {
        self.chunks[chunk_index].strategy().free_regions()
    }

    /// Live allocations of one chunk, sorted by offset.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_index >= self.chunk_count()`.
    pub fn chunk_live_regions(&self, chunk_index: usize) -> Vec<Region> {
        self.chunks[chunk_index].live_regions()
    }

    pub fn total_allocated_bytes(&self) -> u64 {
        self.chunks.iter().map(|c| c.allocated_bytes()).sum()
    }

    pub fn total_free_bytes(&self) -> u64 {
        self.chunks.iter().map(|c| c.free_bytes()).sum()
    }

    pub fn live_allocation_count(&self) -> usize {
        self.chunks.iter().map(|c| c.live_count()).sum()
    }

    /// Biggest request that would succeed without growing the pool.
    pub fn largest_free_region(&self) -> u64 {
        self.chunks
            .iter()
            .map(|c| c.strategy().largest_free_block())
            .max()
            .unwrap_or(0)
    }

    /// The backing store a live allocation lives in.
    pub fn backing_store(&self, allocation: &Allocation) -> Option<&F::BackingStore> {
        let chunk = self.chunks.get(allocation.chunk_index as usize)?;
        chunk
            .is_live(&allocation.region, allocation.id)
            .then(|| chunk.backing_store())
    }

    /// Renders per-chunk usage as a table and logs it at debug level.
    pub fn summary(&self) -> String {
        let mut table = Table::new();
        table.set_header(vec![
            Cell::new("Chunk"),
            Cell::new("Allocated"),
            Cell::new("Free"),
            Cell::new("Largest Free"),
            Cell::new("Free Regions"),
            Cell::new("Live"),
        ]);

        for (chunk_index, chunk) in self.chunks.iter().enumerate() {
            let free_regions = chunk.strategy().free_regions();
            table.add_row(vec![
                Cell::new(chunk_index),
                Cell::new(chunk.allocated_bytes()),
                Cell::new(chunk.free_bytes()),
                Cell::new(chunk.strategy().largest_free_block()),
                Cell::new(free_regions.len()),
                Cell::new(chunk.live_count()),
            ]);
        }

        let summary = format!(
            "{} ({:?}, {} bytes per chunk)\n{}",
            self.name, self.strategy_kind, self.chunk_capacity, table
        );
        log::debug!("\n{}", summary);
        summary
    }

    fn ensure_alive(&self) -> Result<(), AllocError> {
        if self.destroyed {
            return Err(AllocError::PoolDestroyed);
        }
        Ok(())
    }

    /// Appends a fresh chunk and returns its index. Nothing is appended when
    /// the backing store cannot be created.
    fn grow(&mut self) -> Result<usize, AllocError> {
        let backing_store = self
            .factory
            .create_chunk_backing_store(self.chunk_capacity, &self.creation_params)
            .map_err(|e| {
                log::error!("[{}] failed to create chunk: {}", self.name, e);
                AllocError::from(e)
            })?;

        let chunk_index = self.chunks.len();
        self.chunks.push(Chunk::new(
            backing_store,
            self.strategy_kind,
            self.chunk_capacity,
        ));
        log::info!(
            "[{}] created chunk {} ({} bytes, {:?})",
            self.name,
            chunk_index,
            self.chunk_capacity,
            self.strategy_kind
        );
        Ok(chunk_index)
    }

    /// The chunk owning `allocation`, provided the handle matches a live
    /// allocation exactly.
    fn live_chunk_mut(
        &mut self,
        allocation: &Allocation,
    ) -> Result<&mut Chunk<F::BackingStore>, AllocError> {
        let invalid = AllocError::InvalidAllocation {
            chunk_index: allocation.chunk_index,
            offset: allocation.region.offset,
            size: allocation.region.size,
        };
        match self.chunks.get_mut(allocation.chunk_index as usize) {
            Some(chunk) if chunk.is_live(&allocation.region, allocation.id) => Ok(chunk),
            _ => {
                log::error!("[{}] {}", self.name, invalid);
                Err(invalid)
            }
        }
    }
}

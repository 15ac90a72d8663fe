//! Chunked sub-allocation of GPU visible memory.
//!
//! A [`vkn::MemoryPool`] owns a growing list of fixed-size chunks, each one a
//! buffer bound to its own device memory, and carves short-lived
//! allocations out of them with either a best-fit free list or a buddy
//! allocator ([`util::StrategyKind`]).

pub mod util;
pub mod vkn;

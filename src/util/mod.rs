mod buffer_alloc;
pub use buffer_alloc::*;

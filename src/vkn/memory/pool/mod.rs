mod allocation;
pub use allocation::*;

mod chunk;
use chunk::Chunk;

mod desc;
pub use desc::*;

mod error;
pub use error::*;

mod memory_pool;
pub use memory_pool::*;

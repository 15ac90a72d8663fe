mod backing_store;
pub use backing_store::*;

mod pool;
pub use pool::*;

mod region;
pub use region::*;

mod strategies;
pub use strategies::*;

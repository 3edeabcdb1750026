pub mod offers;
pub mod sweeper;

pub use offers::*;
pub use sweeper::*;

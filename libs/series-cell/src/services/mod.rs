pub mod planner;
pub mod lifecycle;
pub mod sessions;
pub mod manager;

pub use planner::*;
pub use lifecycle::*;
pub use sessions::*;
pub use manager::*;

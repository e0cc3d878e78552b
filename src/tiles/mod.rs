pub mod covering;
pub mod disk;
pub mod loader;
pub mod planner;
pub mod pyramid;
pub mod source;

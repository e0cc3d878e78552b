pub mod address;
pub mod bounds;
pub mod constants;
pub mod geo;
pub mod map;
pub mod viewport;

pub mod cost;
pub mod datafeed;
pub mod usage;
pub mod window;

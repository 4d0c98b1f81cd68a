pub mod config;
pub mod cost;
pub mod formatter;
pub mod models;
pub mod usage;

#[cfg(test)]
pub mod test_support;

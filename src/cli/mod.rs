pub mod config_cmd;
pub mod costs_cmd;
pub mod output;
pub mod renderer;
pub mod watch_cmd;

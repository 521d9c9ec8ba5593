pub mod config;
pub mod dispatch;
pub mod geo;
pub mod output;
pub mod server;
pub mod types;

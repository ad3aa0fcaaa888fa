pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod probe;
pub mod render;
pub mod runner;
pub mod snapshot;
pub mod state;
pub mod status;
pub mod tailscale;
pub mod types;

//! Metrics Collector + Scrape Endpoint (spec §4.5).

pub mod names;
mod registry;
mod server;

pub use registry::Registry;
pub use server::{router, serve, AppState};

//! Content manager (Sonarr/Radarr) API abstraction.

mod client;
mod types;

pub use client::HttpArrClient;
pub use types::*;

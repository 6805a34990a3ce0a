//! Download client abstraction.
//!
//! The decision engine talks to the download client only through the
//! `TorrentClient` trait; `QBittorrentClient` is the Web API implementation.

mod qbittorrent;
mod types;

pub use qbittorrent::QBittorrentClient;
pub use types::*;

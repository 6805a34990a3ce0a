//! Seeding policy: share-limit resolution from tracker rules, the
//! "leave alone" decision and per-torrent tracker reconciliation.
//!
//! Seeding times in configuration are seconds. The client reports a torrent's
//! own seeding-time limit in minutes; it is converted before comparing.

mod policy;
mod trackers;

pub use policy::{LeaveAlone, ResolvedLimits, SeedingPolicyEngine, ALLOWED_SEEDING_TAG, UNSET};

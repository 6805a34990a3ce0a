//! Request-aggregator services (Overseerr, Ombi) and the reconciler that turns
//! their pending requests into a set of external ids.

mod ombi;
mod overseerr;
mod reconciler;
mod types;

pub use ombi::OmbiClient;
pub use overseerr::OverseerrClient;
pub use reconciler::RequestReconciler;
pub use types::*;

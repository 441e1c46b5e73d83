//! Ban authorization and fallback enforcement

mod authorize;
mod fallback;

pub use authorize::may_ban;
pub use fallback::{BanFallbackCoordinator, BanOutcome};

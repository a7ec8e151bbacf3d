//! Token lifecycle: the per-instance cache, the refresh-token exchange, and background renewal.

pub mod cache;
pub mod refresh;
pub mod renew;
pub mod secret;

pub use cache::*;
pub use refresh::*;
pub use renew::*;
pub use secret::*;

//! Single-flight credential refresh
//!
//! However many requests hit a 401 at once, the refresh endpoint is called
//! once and every one of them receives that call's outcome.
//!
//! ```text
//!            ensure_valid_token()
//!   Idle ───────────────────────────▶ Refreshing(outcome channel)
//!    ▲                                    │
//!    └──── outcome published, Idle ◀──────┘  (one refresh task)
//! ```

mod client;
mod coordinator;
mod events;

pub use client::{HttpRefreshClient, RefreshClient, RefreshError};
pub use coordinator::{RefreshCoordinator, RefreshFailure};
pub use events::SessionEvent;

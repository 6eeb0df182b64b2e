//! Routing and dispatch.
//!
//! ```text
//! Player -> Listener -> Gateway -> ServerStore -> Backend -> backend server
//!                                                   |
//!                                       PROXY v2 header (if enabled)
//! ```

mod backend;
mod gateway;
mod listener;
mod proxy_protocol;
mod store;

pub use backend::{Backend, ServerBackend};
pub use gateway::{Gateway, RejectReason, SessionOutcome};
pub use listener::{Listener, ListenerConfig, ListenerStats, DEFAULT_MAX_CONNECTIONS};
pub use proxy_protocol::ProxyHeader;
pub use store::{DefaultServerStore, ServerStore, SingleServerStore};

//! Administration backend contract for webctl.
//!
//! This crate defines the boundary between the coordination core and
//! the web server's administration backend:
//!
//! - **[`ServerManager`]** — The opaque administration handle. All
//!   reads and mutations of server configuration (application pools,
//!   sites) go through this trait. The core only ever touches it under
//!   an exclusive gate, so every method takes `&mut self`.
//!
//! - **[`ObjectState`]** — Entity lifecycle states. `Starting` and
//!   `Stopping` are transitional: the backend owns the transition and
//!   callers poll `state()` until it settles.
//!
//! - **[`LocalServerManager`]** — An in-memory backend with simulated
//!   transitions, staged deletion, and fault injection. This is the
//!   backend used by tests and local development;
//!   [`SharedServerManager`] adds a cloneable inspection handle.

pub mod error;
pub mod local;
pub mod manager;

pub use error::AdminError;
pub use local::{LocalServerManager, SharedServerManager};
pub use manager::{EntityKind, ObjectState, ServerManager};

//! Asynchronous command-coordination core for webctl.
//!
//! This crate serializes mutually exclusive long-running operations
//! (start / stop / toggle / recycle / reload / delete) against a web
//! server's administration backend, per managed entity and per
//! collection, with cooperative cancellation throughout:
//!
//! - **[`ServerGate`]** — The single mutual-exclusion point for
//!   backend access. Owns the [`webctl_admin::ServerManager`] handle;
//!   every read and write funnels through
//!   [`open()`](ServerGate::open), so exactly one backend transaction
//!   is in flight system-wide.
//!
//! - **[`SerialCommand`]** / **[`ItemCommand`]** — Asynchronous
//!   commands with at-most-one concurrent execution. `ItemCommand`
//!   additionally holds the owning item's entity-wide lock and
//!   brackets the item's busy flag around the operation body, so no
//!   two commands of the same item ever interleave.
//!
//! - **[`PoolItem`]** / **[`SiteItem`]** — Observable state holders
//!   (running / busy / selected, exposed through `watch` channels)
//!   carrying one command per supported lifecycle operation.
//!
//! - **[`PoolsView`]** / **[`SitesView`]** — Collection coordinators:
//!   a reload fetches the sorted name set inside the gate, replaces
//!   the collection wholesale, and fans out per-item reloads,
//!   joining on completion. `SitesView` also owns the typed removal
//!   channel that drops items whose deletion the backend confirmed.
//!
//! Concurrency model: many logical operations may be in flight, but
//! backend access is a serialized queue behind the gate. Cancellation
//! is always cooperative -- it aborts lock waits and polling delays,
//! never a backend call already issued.

pub mod command;
pub mod config;
pub mod error;
pub mod gate;
pub mod model;
pub mod stream;
pub mod view;

mod sync;

pub use command::{ItemCommand, SerialCommand};
pub use config::CoreConfig;
pub use error::CoreError;
pub use gate::ServerGate;
pub use model::{PoolItem, SiteItem};
pub use stream::{ItemStream, Snapshot};
pub use view::{PoolsView, SitesView};

// Re-export the backend contract types consumers interact with.
pub use webctl_admin::{AdminError, EntityKind, ObjectState, ServerManager};

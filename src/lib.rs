//! Opt-in offline persistence of streamed media files
//!
//! Requests durable storage permission from the host, mirrors single
//! streamed files into a sandboxed per-server directory, and reports
//! quota/usage to a settings surface. Host storage, permission, and
//! network primitives are injected behind the narrow traits in [`host`]
//! so the flow is testable without a real runtime environment.

pub mod host;
pub mod persistence;
pub mod settings;

#[cfg(test)]
pub(crate) mod testing;

pub use persistence::store::PersistenceStore;
pub use persistence::types::{PersistenceResult, PersistenceState, PersistenceStats, Server, Song};
pub use persistence::{check_persistence, init_persistence, APP_DIRECTORY};

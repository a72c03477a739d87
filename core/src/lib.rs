//! Shared data model and trait boundaries for the session runtime.
//!
//! `core` owns everything that crosses the boundary between the engine and
//! its two external collaborators (`Catalog`, `SaveStore`): the persisted
//! save document, the read-only content model, the snapshot/delta wire
//! types, and the error taxonomy. None of it depends on the `engine` crate.

pub mod error;
pub mod ids;
pub mod logging;
pub mod save_store;
pub mod types;

pub use error::{GameError, GameResult};
pub use save_store::SaveStore;

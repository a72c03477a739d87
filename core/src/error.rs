//! The closed error taxonomy every engine operation reports through.
//!
//! Grounded on the `StateError` shape from the dungeon-engine reference
//! (`state/mod.rs` / `state/error.rs` in the retrieval pack): one enum, one
//! variant per failure kind, each carrying just enough context to build a
//! user-facing message or a log line. The teacher itself reports failures as
//! bare `Result<_, String>`, which is fine for a single mutable world but
//! does not give a dispatcher anything to match on when deciding whether a
//! failure is the player's fault (no delta, red message) or systemic
//! (propagate, log). `thiserror` generates the `Display`/`std::error::Error`
//! impls.
use thiserror::Error;

/// Every way a dispatched action can fail.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GameError {
    /// The action envelope named an unknown `type`, or its `params` were
    /// missing/malformed for the action it named.
    #[error("invalid action: {0}")]
    InvalidAction(String),

    /// A session, item, NPC, spell, or catalog entry referenced by ID does
    /// not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The action is individually well-formed but cannot be applied to the
    /// current state (stack full, inventory full, target slot occupied,
    /// container-nesting rule violated, etc).
    #[error("conflict: {0}")]
    Conflict(String),

    /// No session is loaded for the given key.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A gameplay precondition was not met (not enough gold, building
    /// closed, NPC not present, dialogue requirements unmet, duplicate
    /// booking, ...).
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// The `SaveStore` could not load, persist, list, or delete a save.
    #[error("storage error: {0}")]
    StorageError(String),

    /// Catalog data was malformed, or an invariant the engine relies on was
    /// violated. Always a bug, never a player mistake.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GameError {
    /// True for the two kinds that are the player's fault: produce a
    /// `success:false` response with a message, and emit no delta (§7).
    pub fn is_player_fault(&self) -> bool {
        matches!(self, GameError::Conflict(_) | GameError::Precondition(_))
    }
}

pub type GameResult<T> = Result<T, GameError>;

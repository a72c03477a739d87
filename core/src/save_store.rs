//! The persistence boundary (C2).
//!
//! Grounded on the teacher's `KeydbStore` (`server/src/keydb_store.rs`):
//! `load_entity`/`load_indexed_entities` there hide Redis and bincode
//! behind a small async-free interface keyed by ID. `spec.md` explicitly
//! puts the on-disk/on-wire save format out of scope, so `SaveStore` only
//! commits to the shape of what crosses the boundary (`GameState`,
//! `MerchantState`) and leaves the encoding and backing store to whatever
//! implementation is wired in; `engine::testutil::InMemorySaveStore` is the
//! one this crate ships for tests.

use crate::error::GameResult;
use crate::ids::{MerchantId, SaveId, UserId};
use crate::types::{GameState, MerchantState};

/// Read/write access to persisted saves and per-player merchant ledgers.
/// Implementations are responsible for their own on-disk format and
/// locking; the engine only ever calls through this trait.
pub trait SaveStore: Send + Sync {
    fn load(&self, user_id: &UserId, save_id: &SaveId) -> GameResult<GameState>;
    fn save(&self, state: &GameState) -> GameResult<()>;
    fn list_saves(&self, user_id: &UserId) -> GameResult<Vec<SaveId>>;
    fn delete(&self, user_id: &UserId, save_id: &SaveId) -> GameResult<()>;

    fn load_merchant_state(
        &self,
        user_id: &UserId,
        merchant_id: &MerchantId,
    ) -> GameResult<Option<MerchantState>>;
    fn save_merchant_state(&self, user_id: &UserId, state: &MerchantState) -> GameResult<()>;
}

//! A loaded save plus everything that only matters while it is loaded.
//!
//! `core::types::GameState` is what gets persisted; `Session` is what the
//! engine actually operates on. Keeping the two separate is the direct
//! counterpart to `spec.md` §9's complaint about "runtime-typed state blobs"
//! and UI-intertwined dialogue state: a rented room or an open dialogue
//! turn is real, but it has no business surviving a save/reload cycle or
//! living on the wire format `SaveStore` commits to.

use std::collections::{HashMap, HashSet};

use core::ids::{BuildingId, MerchantId};
use core::types::{GameState, MerchantState};

/// A room rented at a building, valid until the clock passes `expires_at_minute`
/// (an absolute minute count, see `Clock::total_minutes`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RentedRoom {
    pub building_id: BuildingId,
    pub expires_at_minute: u64,
}

/// A performance booking: a slot reserved ahead of time, resolved (and its
/// no-show penalty applied, at most once) when the clock passes the show.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BookedShow {
    pub show_id: String,
    pub booked_at_minute: u64,
    pub show_time_minute: u64,
    pub resolved: bool,
}

/// Where a conversation with an NPC currently sits in its dialogue graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DialogueContext {
    pub npc_id: core::ids::NpcId,
    pub current_node: String,
}

/// A loaded save, owned exclusively by the session holding its lock
/// (`SessionManager`). One `Session` per `(userID, saveID)`; nothing here is
/// ever shared between two sessions.
pub struct Session {
    pub state: GameState,
    pub rented_rooms: HashMap<BuildingId, RentedRoom>,
    pub booked_shows: HashMap<String, BookedShow>,
    pub dialogue: Option<DialogueContext>,
    /// This player's cached view of every merchant it has ever interacted
    /// with, keyed by merchant id. Loaded from `SaveStore` lazily by
    /// `economy::load_or_init` and checkpointed back through it.
    pub merchant_states: HashMap<MerchantId, MerchantState>,
    /// Absolute in-game minute the last action was dispatched at. `None`
    /// until the first action runs. Used by `TimeEngine` to detect an
    /// auto-pause gap.
    pub last_action_minute: Option<u64>,
    /// WorldIndex cache (`buildingStates`/`buildingsLastCheck` in §3): the
    /// buildings this player has ever entered, kept session-only so
    /// `delta_capture` knows which buildings' open/closed state to report
    /// without scanning every building in the city on every tick.
    pub discovered_buildings: HashSet<BuildingId>,
}

impl Session {
    pub fn new(state: GameState) -> Self {
        Self {
            state,
            rented_rooms: HashMap::new(),
            booked_shows: HashMap::new(),
            dialogue: None,
            merchant_states: HashMap::new(),
            last_action_minute: None,
            discovered_buildings: HashSet::new(),
        }
    }
}

//! Glue between a live `Session` and the wire-facing `Snapshot`/`Delta`
//! types in `core::types` (C12's session-facing half — the diff algorithm
//! itself lives entirely in `core` since it is a pure function of two
//! snapshots).

use std::collections::{HashMap, HashSet};

use core::ids::BuildingId;
use core::types::{Catalog, Snapshot};

use crate::config::EngineConfig;
use crate::session::Session;
use crate::world_index;

/// Build a `Snapshot` of everything client-visible about `session` right
/// now: the persisted `GameState` plus the session-scoped facts
/// (`npcs_present`, `building_open`, `ready_shows`) that only exist while a
/// save is loaded.
pub fn capture(session: &Session, catalog: &dyn Catalog, config: &EngineConfig) -> Snapshot {
    let minute = session.state.clock.minute;
    let district_key = session.state.position.district_key.clone();
    let building_id = session.state.position.building_id.as_ref();

    let npc_ids = catalog.npc_ids();
    let npcs_present: HashSet<_> = world_index::npcs_at(catalog, &npc_ids, &district_key, building_id, minute)
        .into_keys()
        .collect();

    let city_id = session.state.position.city_id.clone();
    let building_ids: Vec<BuildingId> = session.discovered_buildings.iter().cloned().collect();
    let open_set = world_index::open_building_states(catalog, &city_id, &building_ids, minute);
    let building_open: HashMap<BuildingId, bool> = building_ids
        .into_iter()
        .map(|id| {
            let open = open_set.contains(&id);
            (id, open)
        })
        .collect();

    let now = session.state.clock.total_minutes();
    let ready_shows = session
        .booked_shows
        .values()
        .filter(|b| !b.resolved && now >= b.show_time_minute && now < b.show_time_minute + 60)
        .map(|b| b.show_id.clone())
        .collect();

    Snapshot::capture(&session.state, &config.gold_item_id, npcs_present, building_open, ready_shows)
}

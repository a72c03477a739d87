//! C8: NPC presence and building open/closed state, derived from the
//! clock and the catalog rather than stored anywhere.
//!
//! The teacher tracks NPC position as live, ticked `Character` state in
//! the shared world (`populate.rs`/`population.rs`) because its NPCs
//! actually walk around a map every tick. A session-per-save engine has no
//! shared map to walk: "is this NPC here right now" is a pure function of
//! the catalog's schedule and the session's clock, recomputed on demand
//! instead of kept in sync by a background loop.

use std::collections::{HashMap, HashSet};

use core::ids::{BuildingId, CityId, DistrictKey, NpcId};
use core::types::{Catalog, NpcActivityState};

/// Every NPC scheduled to be in `district_key` (optionally narrowed to
/// `building_id`) at `minute_of_day`, along with their current activity
/// state.
pub fn npcs_at(
    catalog: &dyn Catalog,
    npc_ids: &[NpcId],
    district_key: &DistrictKey,
    building_id: Option<&BuildingId>,
    minute_of_day: u16,
) -> HashMap<NpcId, NpcActivityState> {
    let mut present = HashMap::new();
    for npc_id in npc_ids {
        let Some(template) = catalog.npc(npc_id) else { continue };
        for entry in &template.schedule {
            if &entry.location.district_key != district_key {
                continue;
            }
            if building_id.is_some() && entry.location.building_id.as_ref() != building_id {
                continue;
            }
            if in_window(entry.start_minute, entry.end_minute, minute_of_day) {
                present.insert(npc_id.clone(), entry.state);
                break;
            }
        }
    }
    present
}

fn in_window(start: u16, end: u16, minute: u16) -> bool {
    if start <= end {
        minute >= start && minute < end
    } else {
        minute >= start || minute < end
    }
}

/// Open/closed state for every building in `building_ids` at `minute_of_day`.
pub fn open_building_states(
    catalog: &dyn Catalog,
    city_id: &CityId,
    building_ids: &[BuildingId],
    minute_of_day: u16,
) -> HashSet<BuildingId> {
    building_ids
        .iter()
        .filter(|id| {
            catalog
                .building(city_id, id)
                .map(|b| b.is_open_at(minute_of_day))
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use core::ids::CityId;
    use core::types::{LocationRef, NpcTemplate, ScheduleEntry};

    use crate::testutil::fixtures::bare_catalog;

    use super::*;

    fn scheduled_npc(id: &str, district: &str, building: Option<&str>, start: u16, end: u16) -> NpcTemplate {
        NpcTemplate {
            id: NpcId::new(id),
            name: id.to_string(),
            schedule: vec![ScheduleEntry {
                start_minute: start,
                end_minute: end,
                location: LocationRef { district_key: DistrictKey::new(district), building_id: building.map(BuildingId::new) },
                state: NpcActivityState::Working,
                available_dialogue_nodes: Vec::new(),
            }],
            dialogue_root: "root".to_string(),
            dialogue: Default::default(),
            greeting_override: None,
            show_config: None,
        }
    }

    /// An NPC scheduled in a district is present only while the minute falls
    /// within its schedule window.
    #[test]
    fn npcs_at_respects_the_schedule_window() {
        let mut catalog = bare_catalog();
        let npc = scheduled_npc("baker", "market", None, 360, 720);
        catalog.npcs.insert(npc.id.clone(), npc.clone());

        let present = npcs_at(&catalog, &[npc.id.clone()], &DistrictKey::new("market"), None, 400);
        assert!(present.contains_key(&npc.id));

        let absent = npcs_at(&catalog, &[npc.id.clone()], &DistrictKey::new("market"), None, 800);
        assert!(!absent.contains_key(&npc.id));
    }

    /// A schedule window that wraps past midnight (start > end) is treated
    /// as two segments joined at the day boundary.
    #[test]
    fn npcs_at_handles_a_schedule_window_wrapping_midnight() {
        let mut catalog = bare_catalog();
        let npc = scheduled_npc("watchman", "gate", None, 1380, 60);
        catalog.npcs.insert(npc.id.clone(), npc.clone());

        assert!(npcs_at(&catalog, &[npc.id.clone()], &DistrictKey::new("gate"), None, 1400).contains_key(&npc.id));
        assert!(npcs_at(&catalog, &[npc.id.clone()], &DistrictKey::new("gate"), None, 30).contains_key(&npc.id));
        assert!(!npcs_at(&catalog, &[npc.id.clone()], &DistrictKey::new("gate"), None, 700).contains_key(&npc.id));
    }

    /// Narrowing by `building_id` excludes an NPC scheduled to a different
    /// building in the same district.
    #[test]
    fn npcs_at_narrows_by_building_when_given() {
        let mut catalog = bare_catalog();
        let npc = scheduled_npc("smith", "market", Some("forge"), 0, 1440);
        catalog.npcs.insert(npc.id.clone(), npc.clone());

        assert!(npcs_at(&catalog, &[npc.id.clone()], &DistrictKey::new("market"), Some(&BuildingId::new("forge")), 100).contains_key(&npc.id));
        assert!(!npcs_at(&catalog, &[npc.id.clone()], &DistrictKey::new("market"), Some(&BuildingId::new("tannery")), 100).contains_key(&npc.id));
    }

    /// A building with no `open_hours` is always open; one with ranges is
    /// only open inside them.
    #[test]
    fn open_building_states_honors_open_hours() {
        let mut catalog = bare_catalog();
        let city = CityId::new("riverton");
        catalog.buildings.insert(
            (city.clone(), BuildingId::new("tavern")),
            core::types::BuildingTemplate {
                id: BuildingId::new("tavern"),
                name: "Tavern".to_string(),
                is_storage_facility: false,
                open_hours: Some(vec![(600, 1380)]),
                shop_id: None,
            },
        );
        catalog.buildings.insert(
            (city.clone(), BuildingId::new("temple")),
            core::types::BuildingTemplate {
                id: BuildingId::new("temple"),
                name: "Temple".to_string(),
                is_storage_facility: false,
                open_hours: None,
                shop_id: None,
            },
        );

        let open = open_building_states(&catalog, &city, &[BuildingId::new("tavern"), BuildingId::new("temple")], 100);
        assert!(!open.contains(&BuildingId::new("tavern")));
        assert!(open.contains(&BuildingId::new("temple")));
    }
}

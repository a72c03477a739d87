//! Snapshot and delta wire types for C12 (`DeltaEngine`).
//!
//! Grounded directly on the dungeon-engine reference's
//! `StateDelta::from_states` / `EntitiesChanges` / `WorldChanges` /
//! `CollectionChanges` design: take a full snapshot before and after a
//! dispatched action, diff them field-by-field, and ship only what changed.
//! The teacher has no analog to this — its client reads shared-memory state
//! directly — so this module is enriched entirely from the pack rather than
//! from the teacher.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::ids::{BuildingId, EffectId, ItemId, NpcId};
use crate::types::state::{CharacterSheet, Clock, EquipSlotKey, GameState, Position, Vitals};

/// An immutable, fully-materialized view of everything the client can
/// render, taken before and after a dispatched action so the two can be
/// diffed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub character: CharacterSheet,
    pub vitals: Vitals,
    pub gold: u32,
    pub position: Position,
    pub clock: Clock,
    pub npcs_present: HashSet<NpcId>,
    pub building_open: HashMap<BuildingId, bool>,
    pub general_slots: [Option<(ItemId, u32)>; 4],
    pub bag_contents: Vec<(ItemId, u32)>,
    pub equipment: BTreeMap<EquipSlotKey, (ItemId, u32)>,
    pub active_effect_ids: HashSet<EffectId>,
    pub ready_shows: HashSet<String>,
}

impl Snapshot {
    /// Build a snapshot from a loaded save plus the ambient, session-scoped
    /// facts (`npcs_present`/`building_open`/`ready_shows`) that do not live
    /// on `GameState` itself.
    pub fn capture(
        state: &GameState,
        gold_item_id: &ItemId,
        npcs_present: HashSet<NpcId>,
        building_open: HashMap<BuildingId, bool>,
        ready_shows: HashSet<String>,
    ) -> Self {
        let general_slots = std::array::from_fn(|i| {
            state.general_slots[i]
                .as_ref()
                .map(|s| (s.item_id.clone(), s.quantity))
        });

        let bag_contents = state
            .equipment
            .get(EquipSlotKey::Bag)
            .and_then(|bag| bag.contents.as_ref())
            .map(|contents| contents.iter().map(|s| (s.item_id.clone(), s.quantity)).collect())
            .unwrap_or_default();

        let equipment = state
            .equipment
            .0
            .iter()
            .map(|(key, slot)| (*key, (slot.item_id.clone(), slot.quantity)))
            .collect();

        let active_effect_ids = state.active_effects.iter().map(|e| e.effect_id.clone()).collect();

        Self {
            character: state.character.clone(),
            vitals: state.vitals,
            gold: state.gold(gold_item_id),
            position: state.position.clone(),
            clock: state.clock,
            npcs_present,
            building_open,
            general_slots,
            bag_contents,
            equipment,
            active_effect_ids,
            ready_shows,
        }
    }
}

fn slot_key(slot: &(ItemId, u32)) -> (ItemId, u32) {
    slot.clone()
}

/// What happened to one slot between two snapshots.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotChange {
    Changed { item_id: ItemId, quantity: u32 },
    Cleared,
}

/// Changed scalar character/vitals/position/clock fields. Every field is
/// `Option`; `None` means unchanged.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterDelta {
    pub level: Option<u32>,
    pub experience: Option<u64>,
    pub hp: Option<i32>,
    pub max_hp: Option<i32>,
    pub mana: Option<i32>,
    pub max_mana: Option<i32>,
    pub hunger: Option<i32>,
    pub fatigue: Option<i32>,
    pub gold: Option<u32>,
}

impl CharacterDelta {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationDelta {
    pub city_id: Option<String>,
    pub district_key: Option<String>,
    pub building_id: Option<Option<BuildingId>>,
    pub day: Option<u32>,
    pub minute: Option<u16>,
}

impl LocationDelta {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// The structural diff between two snapshots, built field-by-field
/// (`Delta::diff`). Every sub-collection carries only what changed;
/// `is_empty()` tells the dispatcher whether the response needs a `delta`
/// field at all.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    pub character: CharacterDelta,
    pub location: LocationDelta,
    pub added_npcs: HashSet<NpcId>,
    pub removed_npcs: HashSet<NpcId>,
    pub changed_buildings: HashMap<BuildingId, bool>,
    pub changed_general_slots: HashMap<usize, SlotChange>,
    pub changed_bag_slots: HashMap<usize, SlotChange>,
    pub changed_equipment: HashMap<EquipSlotKey, SlotChange>,
    pub added_effects: HashSet<EffectId>,
    pub removed_effects: HashSet<EffectId>,
    pub added_ready_shows: HashSet<String>,
    pub removed_ready_shows: HashSet<String>,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.character.is_empty()
            && self.location.is_empty()
            && self.added_npcs.is_empty()
            && self.removed_npcs.is_empty()
            && self.changed_buildings.is_empty()
            && self.changed_general_slots.is_empty()
            && self.changed_bag_slots.is_empty()
            && self.changed_equipment.is_empty()
            && self.added_effects.is_empty()
            && self.removed_effects.is_empty()
            && self.added_ready_shows.is_empty()
            && self.removed_ready_shows.is_empty()
    }

    /// Pure structural comparison of two snapshots, following the
    /// dungeon-engine `StateDelta::from_states` shape: compare scalars
    /// directly, diff sets via symmetric difference, diff indexed
    /// collections slot-by-slot.
    pub fn diff(old: &Snapshot, new: &Snapshot) -> Self {
        let mut character = CharacterDelta::default();
        if old.character.level != new.character.level {
            character.level = Some(new.character.level);
        }
        if old.character.experience != new.character.experience {
            character.experience = Some(new.character.experience);
        }
        if old.vitals.hp != new.vitals.hp {
            character.hp = Some(new.vitals.hp);
        }
        if old.vitals.max_hp != new.vitals.max_hp {
            character.max_hp = Some(new.vitals.max_hp);
        }
        if old.vitals.mana != new.vitals.mana {
            character.mana = Some(new.vitals.mana);
        }
        if old.vitals.max_mana != new.vitals.max_mana {
            character.max_mana = Some(new.vitals.max_mana);
        }
        if old.vitals.hunger != new.vitals.hunger {
            character.hunger = Some(new.vitals.hunger);
        }
        if old.vitals.fatigue != new.vitals.fatigue {
            character.fatigue = Some(new.vitals.fatigue);
        }
        if old.gold != new.gold {
            character.gold = Some(new.gold);
        }

        let mut location = LocationDelta::default();
        if old.position.city_id != new.position.city_id {
            location.city_id = Some(new.position.city_id.as_str().to_string());
        }
        if old.position.district_key != new.position.district_key {
            location.district_key = Some(new.position.district_key.as_str().to_string());
        }
        if old.position.building_id != new.position.building_id {
            location.building_id = Some(new.position.building_id.clone());
        }
        if old.clock.day != new.clock.day {
            location.day = Some(new.clock.day);
        }
        if old.clock.minute != new.clock.minute {
            location.minute = Some(new.clock.minute);
        }

        let added_npcs = new.npcs_present.difference(&old.npcs_present).cloned().collect();
        let removed_npcs = old.npcs_present.difference(&new.npcs_present).cloned().collect();

        let mut changed_buildings = HashMap::new();
        for (id, open) in &new.building_open {
            if old.building_open.get(id) != Some(open) {
                changed_buildings.insert(id.clone(), *open);
            }
        }

        let changed_general_slots = diff_indexed(&old.general_slots, &new.general_slots);
        let changed_bag_slots = diff_vec(&old.bag_contents, &new.bag_contents);
        let changed_equipment = diff_map(&old.equipment, &new.equipment);

        let added_effects = new
            .active_effect_ids
            .difference(&old.active_effect_ids)
            .cloned()
            .collect();
        let removed_effects = old
            .active_effect_ids
            .difference(&new.active_effect_ids)
            .cloned()
            .collect();

        let added_ready_shows = new.ready_shows.difference(&old.ready_shows).cloned().collect();
        let removed_ready_shows = old.ready_shows.difference(&new.ready_shows).cloned().collect();

        Self {
            character,
            location,
            added_npcs,
            removed_npcs,
            changed_buildings,
            changed_general_slots,
            changed_bag_slots,
            changed_equipment,
            added_effects,
            removed_effects,
            added_ready_shows,
            removed_ready_shows,
        }
    }
}

fn slot_change_for(old: Option<&(ItemId, u32)>, new: Option<&(ItemId, u32)>) -> Option<SlotChange> {
    match (old, new) {
        (None, None) => None,
        (Some(o), Some(n)) if slot_key(o) == slot_key(n) => None,
        (_, Some((item_id, quantity))) => Some(SlotChange::Changed {
            item_id: item_id.clone(),
            quantity: *quantity,
        }),
        (Some(_), None) => Some(SlotChange::Cleared),
    }
}

fn diff_indexed(old: &[Option<(ItemId, u32)>; 4], new: &[Option<(ItemId, u32)>; 4]) -> HashMap<usize, SlotChange> {
    let mut out = HashMap::new();
    for i in 0..4 {
        if let Some(change) = slot_change_for(old[i].as_ref(), new[i].as_ref()) {
            out.insert(i, change);
        }
    }
    out
}

fn diff_vec(old: &[(ItemId, u32)], new: &[(ItemId, u32)]) -> HashMap<usize, SlotChange> {
    let mut out = HashMap::new();
    let max_len = old.len().max(new.len());
    for i in 0..max_len {
        if let Some(change) = slot_change_for(old.get(i), new.get(i)) {
            out.insert(i, change);
        }
    }
    out
}

fn diff_map(
    old: &BTreeMap<EquipSlotKey, (ItemId, u32)>,
    new: &BTreeMap<EquipSlotKey, (ItemId, u32)>,
) -> HashMap<EquipSlotKey, SlotChange> {
    let mut out = HashMap::new();
    let keys: HashSet<_> = old.keys().chain(new.keys()).cloned().collect();
    for key in keys {
        if let Some(change) = slot_change_for(old.get(&key), new.get(&key)) {
            out.insert(key, change);
        }
    }
    out
}

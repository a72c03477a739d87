//! The persisted save document (C3's `GameState`) and the pieces it is
//! built from.
//!
//! The teacher's `Character`/`Item` (`core::types::character`,
//! `core::types::item`) are `repr(C, packed)` structs mirroring a C
//! server's wire layout bit-for-bit, with gold and inventory encoded as
//! flag bits and raw counters. `spec.md` §9 calls that out directly
//! ("runtime-typed state blobs ... re-architect as tagged records"), so
//! everything here is a plain typed struct serialized through `serde`,
//! and gold is just another inventory stack rather than a parallel
//! counter (§9 Open Question: gold has one source of truth, the
//! inventory).

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::ids::{BuildingId, CityId, DistrictKey, EffectId, ItemId, MusicTrackId, NpcId, SaveId, SpellId, UserId};
use crate::types::catalog::Ability;

/// The schema version a `GameState` was persisted under. `SaveStore`
/// implementations are expected to round-trip this field unchanged;
/// `GameState::migrate` brings an older document up to date in place.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// A character's six ability scores, keyed by name rather than position so
/// the persisted shape and the wire shape agree.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats(pub BTreeMap<Ability, i32>);

impl Stats {
    pub fn new(defaults: i32) -> Self {
        Self(Ability::ALL.iter().map(|a| (*a, defaults)).collect())
    }

    pub fn get(&self, ability: Ability) -> i32 {
        self.0.get(&ability).copied().unwrap_or(0)
    }

    pub fn add(&mut self, ability: Ability, delta: i32) {
        *self.0.entry(ability).or_insert(0) += delta;
    }
}

/// In-game clock: a day counter starting at 1 and a minute-of-day in
/// `[0, 1440)` (§5). Never a float; `TimeEngine` only ever adds whole
/// minutes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clock {
    pub day: u32,
    pub minute: u16,
}

impl Clock {
    pub const MINUTES_PER_DAY: u16 = 1440;

    pub fn new(day: u32, minute: u16) -> Self {
        debug_assert!(minute < Self::MINUTES_PER_DAY);
        Self { day, minute }
    }

    /// Advance the clock by `minutes`, rolling over days as needed, and
    /// return how many whole days were crossed.
    pub fn advance(&mut self, minutes: u32) -> u32 {
        let total = self.minute as u32 + minutes;
        let days = total / Self::MINUTES_PER_DAY as u32;
        self.minute = (total % Self::MINUTES_PER_DAY as u32) as u16;
        self.day += days;
        days
    }

    /// A monotonically increasing minute counter, used by the economy
    /// engine to decide how many regen/restock intervals have elapsed
    /// since a merchant was last touched.
    pub fn total_minutes(&self) -> u64 {
        self.day as u64 * Self::MINUTES_PER_DAY as u64 + self.minute as u64
    }
}

/// Where a character is standing: a city, a district within it, and
/// optionally the building they are inside.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub city_id: CityId,
    pub district_key: DistrictKey,
    pub building_id: Option<BuildingId>,
}

/// An item stack occupying one inventory slot. `contents` is only ever
/// `Some` when the occupying item is a container (`ItemTemplate::is_container`),
/// and container-nesting means every entry in `contents` must itself be a
/// non-container (§4.6 "a bag may not be placed inside another bag").
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub item_id: ItemId,
    pub quantity: u32,
    pub contents: Option<Vec<Slot>>,
}

impl Slot {
    pub fn new(item_id: ItemId, quantity: u32) -> Self {
        Self {
            item_id,
            quantity,
            contents: None,
        }
    }
}

/// The fixed set of equipment slots every `GameState` carries (§4.6).
/// `Hands` is not a member: a two-handed weapon occupies both `LeftArm`
/// and `RightArm` with mirrored `Slot` entries, and `equipItem` is
/// responsible for keeping the mirror in sync.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipSlotKey {
    Bag,
    LeftArm,
    RightArm,
    Armor,
    Necklace,
    Ring,
    Ammunition,
    Clothes,
}

impl EquipSlotKey {
    pub const ALL: [EquipSlotKey; 8] = [
        EquipSlotKey::Bag,
        EquipSlotKey::LeftArm,
        EquipSlotKey::RightArm,
        EquipSlotKey::Armor,
        EquipSlotKey::Necklace,
        EquipSlotKey::Ring,
        EquipSlotKey::Ammunition,
        EquipSlotKey::Clothes,
    ];
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equipment(pub BTreeMap<EquipSlotKey, Slot>);

impl Equipment {
    pub fn get(&self, key: EquipSlotKey) -> Option<&Slot> {
        self.0.get(&key)
    }

    pub fn is_occupied(&self, key: EquipSlotKey) -> bool {
        self.0.contains_key(&key)
    }
}

/// A 40-slot storage container registered at a specific building (§4.1 /
/// §4.8 `registerStorage`). Keyed per-building rather than shared globally:
/// a vault rented in one city is not visible from another.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vault {
    pub slots: Vec<Option<Slot>>,
}

impl Vault {
    pub const CAPACITY: usize = 40;

    pub fn empty() -> Self {
        Self {
            slots: vec![None; Self::CAPACITY],
        }
    }
}

/// Where an `ActiveEffect` came from, kept for display/debugging and for
/// `removeEffectsBySource` style bulk-clears.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectSource {
    Item(ItemId),
    Spell(SpellId),
    System(String),
}

/// A ticking or pending status effect (§4.5). `tick_accumulator` counts
/// minutes since the last periodic application and never exceeds
/// `tick_interval`; `remaining_delay` counts down to zero before the effect
/// starts applying; `remaining_duration` of `None` means indefinite
/// (cleared only by an explicit removal, not by ticking).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveEffect {
    pub effect_id: EffectId,
    pub source: EffectSource,
    pub remaining_delay: Option<u32>,
    pub remaining_duration: Option<u32>,
    pub tick_accumulator: u32,
}

/// Core character identity and progression, independent of inventory or
/// position.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterSheet {
    pub name: String,
    pub class: String,
    pub background: String,
    pub race: String,
    pub level: u32,
    pub experience: u64,
}

/// The vitals `EffectsEngine` clamps and derives penalties from (§4.5).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vitals {
    pub hp: i32,
    pub max_hp: i32,
    pub mana: i32,
    pub max_mana: i32,
    /// 0 (starving) .. 3 (stuffed).
    pub hunger: i32,
    /// 0 (rested) .. 10 (exhaustion).
    pub fatigue: i32,
}

/// One placeholder in a spell slot tier's ordered sequence: `spell` is
/// `None` for an empty placeholder, `Some` once a known spell has been
/// slotted into it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellSlot {
    pub spell: Option<SpellId>,
    pub quantity: u32,
}

/// The full per-player-per-save document (C3). One `GameState` per
/// session; nothing here is shared between sessions, and nothing
/// session-only (rented rooms, booked shows, cached world-index lookups)
/// lives on this struct — those belong to `engine::session::Session`,
/// which wraps a `GameState` for the lifetime of a loaded save.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    pub schema_version: u32,
    pub user_id: UserId,
    pub save_id: SaveId,
    pub character: CharacterSheet,
    pub stats: Stats,
    pub vitals: Vitals,
    pub position: Position,
    pub clock: Clock,
    pub general_slots: [Option<Slot>; 4],
    pub equipment: Equipment,
    pub vaults: HashMap<BuildingId, Vault>,
    pub known_spells: HashSet<SpellId>,
    pub spell_slots: BTreeMap<u32, Vec<SpellSlot>>,
    pub discovered_cities: HashSet<CityId>,
    pub unlocked_music_tracks: HashSet<MusicTrackId>,
    pub met_npcs: HashSet<NpcId>,
    pub active_effects: Vec<ActiveEffect>,
}

impl GameState {
    /// Bring a document persisted under an older schema up to
    /// `CURRENT_SCHEMA_VERSION` in place. Idempotent: running it twice on an
    /// already-current document is a no-op (§9 Open Question: legacy effect
    /// IDs are remapped once, on load, rather than carried as aliases
    /// forever).
    pub fn migrate(&mut self, legacy_effect_id_map: &HashMap<EffectId, EffectId>) {
        if self.schema_version >= CURRENT_SCHEMA_VERSION {
            return;
        }

        for effect in &mut self.active_effects {
            if let Some(replacement) = legacy_effect_id_map.get(&effect.effect_id) {
                effect.effect_id = replacement.clone();
            }
        }

        self.schema_version = CURRENT_SCHEMA_VERSION;
    }

    /// Gold is not a field: it is whatever quantity of the catalog's gold
    /// item sits in inventory. `getGold` sums every slot that can hold one
    /// (general slots, bag contents, equipped bag) so the snapshot layer
    /// and the economy engine always agree on one number.
    pub fn gold(&self, gold_item_id: &ItemId) -> u32 {
        let mut total = 0u32;
        for slot in self.general_slots.iter().flatten() {
            total += Self::gold_in_slot(slot, gold_item_id);
        }
        for slot in self.equipment.0.values() {
            total += Self::gold_in_slot(slot, gold_item_id);
        }
        total
    }

    fn gold_in_slot(slot: &Slot, gold_item_id: &ItemId) -> u32 {
        let mut total = if &slot.item_id == gold_item_id { slot.quantity } else { 0 };
        if let Some(contents) = &slot.contents {
            for inner in contents {
                total += if &inner.item_id == gold_item_id { inner.quantity } else { 0 };
            }
        }
        total
    }
}

//! The read-only content model (C1 in `spec.md` / `SPEC_FULL.md`).
//!
//! The engine never owns a catalog; it is handed one (as `&dyn Catalog`) by
//! whatever process wired the session together, the same way the teacher's
//! `server` binary owns a `Repository` and the engine logic in
//! `state/*.rs` only ever reads through `Repository::with_items` /
//! `with_characters` closures. Here the boundary is an explicit trait
//! instead of a process-global singleton (per the `spec.md` §9 redesign
//! note against global singletons), so a test can hand the engine a small
//! in-memory catalog instead of loading `.dat` files from disk.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::ids::{BuildingId, CityId, DistrictKey, EffectId, ItemId, MerchantId, NpcId, SpellId};

/// One of the six ability scores used in pricing/performance formulas and
/// character stat blocks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ability {
    Strength,
    Dexterity,
    Constitution,
    Intelligence,
    Wisdom,
    Charisma,
}

impl Ability {
    pub const ALL: [Ability; 6] = [
        Ability::Strength,
        Ability::Dexterity,
        Ability::Constitution,
        Ability::Intelligence,
        Ability::Wisdom,
        Ability::Charisma,
    ];
}

/// The type of an instant or timed effect component (§4.5).
///
/// `Hp`/`Mana`/`Hunger`/`Fatigue` may be applied immediately; ability-score
/// components are always routed through an `ActiveEffect` so their duration
/// can decay (§4.5 "Stat modifiers ... are always added as ActiveEffect
/// entries").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentType {
    Hp,
    Mana,
    Hunger,
    Fatigue,
    Ability(Ability),
}

impl ComponentType {
    /// True for the four vitals that `applyImmediate` understands directly.
    pub fn is_vital(&self) -> bool {
        matches!(
            self,
            ComponentType::Hp | ComponentType::Mana | ComponentType::Hunger | ComponentType::Fatigue
        )
    }
}

/// An instant `{type, value}` pair, as carried on `Item::effects`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemEffectComponent {
    pub component_type: ComponentType,
    pub value: i32,
}

/// One component of an `EffectTemplate`: either applied once (no
/// duration/delay/tick) or appended as an `ActiveEffect` (§4.5).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectComponent {
    pub component_type: ComponentType,
    pub value: i32,
    pub duration: Option<u32>,
    pub delay: Option<u32>,
    pub tick_interval: Option<u32>,
}

impl EffectComponent {
    /// An instant component is one with no timing fields at all, and whose
    /// type is a vital (§4.5 `applyEffect`).
    pub fn is_instant(&self) -> bool {
        self.duration.is_none()
            && self.delay.is_none()
            && self.tick_interval.is_none()
            && self.component_type.is_vital()
    }
}

/// Where on the equipment map an item belongs, as declared by its template.
/// `Hands` is the only slot the engine must infer a concrete hand for
/// (§4.6 `equipItem`); the rest map 1:1 onto an `EquipSlotKey`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GearSlot {
    Hands,
    Armor,
    Necklace,
    Ring,
    Ammunition,
    Clothes,
    Bag,
}

/// A concrete item stack referenced by ID and quantity, used for starting
/// gear, pack contents, and shop stock lists.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub item_id: ItemId,
    pub quantity: u32,
}

/// Static item definition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemTemplate {
    pub id: ItemId,
    pub name: String,
    pub item_type: String,
    pub base_value: u32,
    pub stack_limit: u32,
    pub gear_slot: Option<GearSlot>,
    pub tags: HashSet<String>,
    pub effects: Vec<ItemEffectComponent>,
    /// Pack templates (e.g. `druid-pack`) pre-fill a bag with these entries.
    pub contents: Option<Vec<ItemStack>>,
}

impl ItemTemplate {
    pub fn is_container(&self) -> bool {
        self.tags.contains("container")
    }

    pub fn is_two_handed(&self) -> bool {
        self.tags.contains("two-handed")
    }
}

/// Static effect definition (buffs, debuffs, penalty effects, accumulators).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EffectTemplate {
    pub id: EffectId,
    pub name: String,
    pub category: String,
    pub color: crate::types::Color,
    pub silent: bool,
    pub components: Vec<EffectComponent>,
}

/// An NPC's presence/availability at a given point in the schedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NpcActivityState {
    Working,
    Busy,
    OffDuty,
}

/// Where an NPC is at a given schedule entry: a district, optionally
/// narrowed to a specific building.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationRef {
    pub district_key: DistrictKey,
    pub building_id: Option<BuildingId>,
}

/// One window of an NPC's daily schedule. `start_minute <= end_minute`;
/// schedules that wrap past midnight are expressed as two entries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub start_minute: u16,
    pub end_minute: u16,
    pub location: LocationRef,
    pub state: NpcActivityState,
    pub available_dialogue_nodes: Vec<String>,
}

/// A gate on a dialogue option.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogueRequirement {
    HasGold(u32),
    HasItem { item_id: ItemId, quantity: u32 },
    KnowsSpell(SpellId),
    NativeToCity,
    VaultRegisteredHere,
    FirstTimeMeeting,
}

/// The side-effecting action a dialogue option may trigger (§4.8).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogueAction {
    RegisterStorage { cost: u32 },
    OpenStorage,
    OpenShop { merchant_id: MerchantId },
    OpenSell { merchant_id: MerchantId },
    RentRoom { cost: u32 },
    BookShow,
    EndDialogue,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueOption {
    pub id: String,
    pub label: String,
    pub requirements: Vec<DialogueRequirement>,
    pub action: Option<DialogueAction>,
    /// The node to move to after choosing this option. `None` ends the
    /// conversation.
    pub next_node: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueNode {
    pub id: String,
    /// Greeting/body text. `greeting_by_condition` overrides this for the
    /// entry node when a condition matches (native race / vault-here /
    /// first-time); see `DialogueEngine::entry_text`.
    pub text: String,
    pub options: Vec<DialogueOption>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GreetingOverride {
    pub native_to_city: Option<String>,
    pub vault_registered_here: Option<String>,
    pub first_time: Option<String>,
}

/// One bookable performance slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowDefinition {
    pub show_id: String,
    pub venue_id: String,
    pub day_of_week: u8,
    pub show_time: u16,
    pub booking_deadline_minute: u16,
    pub required_instrument: Option<ItemId>,
    pub base_success: i32,
    pub xp_reward: i32,
    pub gold_reward: i32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowConfig {
    pub shows: Vec<ShowDefinition>,
}

/// Static NPC definition: identity, schedule, dialogue graph, optional show
/// booking config.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NpcTemplate {
    pub id: NpcId,
    pub name: String,
    pub schedule: Vec<ScheduleEntry>,
    pub dialogue_root: String,
    pub dialogue: BTreeMap<String, DialogueNode>,
    pub greeting_override: Option<GreetingOverride>,
    pub show_config: Option<ShowConfig>,
}

/// A named interval as it appears in merchant configuration (§6, §9 Open
/// Question: accept both forms, canonicalise to minutes once on load).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalSpec {
    Minutes(u32),
    Daily,
    Hourly,
    Weekly,
}

impl IntervalSpec {
    /// Canonicalise to whole in-game minutes. `daily` = 10, `hourly` = 1,
    /// `weekly` = 70 per `spec.md` §4.7.
    pub fn to_minutes(self) -> u32 {
        match self {
            IntervalSpec::Minutes(m) => m,
            IntervalSpec::Hourly => 1,
            IntervalSpec::Daily => 10,
            IntervalSpec::Weekly => 70,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShopType {
    General,
    Specialty,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopStockEntry {
    pub item_id: ItemId,
    pub stock: u32,
    pub max_stock: u32,
    pub restock_rate: u32,
}

/// Recognised per-merchant configuration (§6, enumerated exactly).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopConfig {
    pub merchant_id: MerchantId,
    pub shop_type: ShopType,
    pub buys_items: bool,
    pub starting_gold: i32,
    pub max_gold: i32,
    pub gold_regen_rate: i32,
    pub gold_regen_interval: IntervalSpec,
    pub item_restock_interval: IntervalSpec,
    pub gold_restock_interval: IntervalSpec,
    pub inventory: Vec<ShopStockEntry>,
}

/// A buy-side or sell-side price formula: `base_value * (base_multiplier +-
/// (CHA - cha_base) * cha_rate)`, clamped per `spec.md` §4.7.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceFormula {
    pub base_multiplier: f64,
    pub cha_rate: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShopTypeRates {
    pub buy: PriceFormula,
    pub sell: PriceFormula,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricingRules {
    pub cha_base: i32,
    pub general: ShopTypeRates,
    pub specialty: ShopTypeRates,
}

impl PricingRules {
    pub fn rates_for(&self, shop_type: ShopType) -> ShopTypeRates {
        match shop_type {
            ShopType::General => self.general,
            ShopType::Specialty => self.specialty,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingTemplate {
    pub id: BuildingId,
    pub name: String,
    pub is_storage_facility: bool,
    /// `None` = always open. Otherwise a list of `[open, close)` minute
    /// ranges within a day.
    pub open_hours: Option<Vec<(u16, u16)>>,
    pub shop_id: Option<MerchantId>,
}

impl BuildingTemplate {
    pub fn is_open_at(&self, minute: u16) -> bool {
        match &self.open_hours {
            None => true,
            Some(ranges) => ranges.iter().any(|(open, close)| {
                if open <= close {
                    minute >= *open && minute < *close
                } else {
                    // wraps past midnight
                    minute >= *open || minute < *close
                }
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationTemplate {
    pub city_id: CityId,
    pub name: String,
    pub districts: Vec<DistrictKey>,
    pub native_races: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellTemplate {
    pub id: SpellId,
    pub name: String,
    pub mana_cost: u32,
    pub effects: Vec<ItemEffectComponent>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MusicTrack {
    pub id: String,
    pub name: String,
}

/// Read-only lookup of static content, keyed by stable string IDs (C1).
///
/// Implementations are expected to be cheap to clone-share (e.g. an
/// `Arc<dyn Catalog>`) and immutable after process start — `spec.md` §5
/// notes Catalog data needs no lock.
pub trait Catalog: Send + Sync {
    fn item(&self, id: &ItemId) -> Option<&ItemTemplate>;
    fn effect(&self, id: &EffectId) -> Option<&EffectTemplate>;
    fn npc(&self, id: &NpcId) -> Option<&NpcTemplate>;
    fn building(&self, city_id: &CityId, building_id: &BuildingId) -> Option<&BuildingTemplate>;
    fn location(&self, city_id: &CityId) -> Option<&LocationTemplate>;
    fn spell(&self, id: &SpellId) -> Option<&SpellTemplate>;
    fn shop_config(&self, merchant_id: &MerchantId) -> Option<&ShopConfig>;
    fn pricing_rules(&self) -> &PricingRules;
    fn starting_gear(&self, class: &str) -> Vec<ItemStack>;
    fn starting_gold(&self, background: &str) -> u32;
    fn music_tracks(&self) -> Vec<MusicTrack>;
    /// Every NPC id the catalog knows about, for `WorldIndex` presence scans.
    fn npc_ids(&self) -> Vec<NpcId>;

    fn native_races(&self, city_id: &CityId) -> Vec<String> {
        self.location(city_id)
            .map(|loc| loc.native_races.clone())
            .unwrap_or_default()
    }
}

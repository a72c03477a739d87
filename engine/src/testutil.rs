//! In-memory `SaveStore`/`Catalog` implementations for engine tests.
//!
//! Grounded on the teacher's own test doubles for `Repository` (small,
//! hand-built fixtures rather than a mocking framework) — these are real
//! trait implementations, not mocks, so the same code path that talks to a
//! production store talks to these.

use std::collections::HashMap;

use parking_lot::Mutex;

use core::error::{GameError, GameResult};
use core::ids::{BuildingId, CityId, EffectId, ItemId, MerchantId, NpcId, SaveId, SpellId, UserId};
use core::types::{
    BuildingTemplate, Catalog, EffectTemplate, GameState, ItemStack, ItemTemplate, LocationTemplate, MerchantState,
    MusicTrack, NpcTemplate, PricingRules, ShopConfig, SpellTemplate,
};

/// An in-memory `SaveStore`: every save and merchant ledger lives in a
/// `Mutex<HashMap<..>>` for the lifetime of the test process.
#[derive(Default)]
pub struct InMemorySaveStore {
    saves: Mutex<HashMap<(UserId, SaveId), GameState>>,
    merchants: Mutex<HashMap<(UserId, MerchantId), MerchantState>>,
}

impl InMemorySaveStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a save directly, bypassing `save()`, for test setup.
    pub fn seed(&self, state: GameState) {
        self.saves
            .lock()
            .insert((state.user_id.clone(), state.save_id.clone()), state);
    }
}

impl core::save_store::SaveStore for InMemorySaveStore {
    fn load(&self, user_id: &UserId, save_id: &SaveId) -> GameResult<GameState> {
        self.saves
            .lock()
            .get(&(user_id.clone(), save_id.clone()))
            .cloned()
            .ok_or_else(|| GameError::Unauthorized(format!("no save {save_id} for {user_id}")))
    }

    fn save(&self, state: &GameState) -> GameResult<()> {
        self.saves
            .lock()
            .insert((state.user_id.clone(), state.save_id.clone()), state.clone());
        Ok(())
    }

    fn list_saves(&self, user_id: &UserId) -> GameResult<Vec<SaveId>> {
        Ok(self
            .saves
            .lock()
            .keys()
            .filter(|(u, _)| u == user_id)
            .map(|(_, s)| s.clone())
            .collect())
    }

    fn delete(&self, user_id: &UserId, save_id: &SaveId) -> GameResult<()> {
        self.saves.lock().remove(&(user_id.clone(), save_id.clone()));
        Ok(())
    }

    fn load_merchant_state(&self, user_id: &UserId, merchant_id: &MerchantId) -> GameResult<Option<MerchantState>> {
        Ok(self.merchants.lock().get(&(user_id.clone(), merchant_id.clone())).cloned())
    }

    fn save_merchant_state(&self, user_id: &UserId, state: &MerchantState) -> GameResult<()> {
        self.merchants
            .lock()
            .insert((user_id.clone(), state.merchant_id.clone()), state.clone());
        Ok(())
    }
}

/// A small, hand-built catalog fixture. Every lookup table is a plain
/// `HashMap` populated by the test that constructs it; nothing here reads
/// from disk.
pub struct FakeCatalog {
    pub items: HashMap<ItemId, ItemTemplate>,
    pub effects: HashMap<EffectId, EffectTemplate>,
    pub npcs: HashMap<NpcId, NpcTemplate>,
    pub buildings: HashMap<(CityId, BuildingId), BuildingTemplate>,
    pub locations: HashMap<CityId, LocationTemplate>,
    pub spells: HashMap<SpellId, SpellTemplate>,
    pub shops: HashMap<MerchantId, ShopConfig>,
    pub pricing_rules: PricingRules,
    pub starting_gear: HashMap<String, Vec<ItemStack>>,
    pub starting_gold: HashMap<String, u32>,
    pub music_tracks: Vec<MusicTrack>,
}

impl FakeCatalog {
    pub fn new(pricing_rules: PricingRules) -> Self {
        Self {
            items: HashMap::new(),
            effects: HashMap::new(),
            npcs: HashMap::new(),
            buildings: HashMap::new(),
            locations: HashMap::new(),
            spells: HashMap::new(),
            shops: HashMap::new(),
            pricing_rules,
            starting_gear: HashMap::new(),
            starting_gold: HashMap::new(),
            music_tracks: Vec::new(),
        }
    }
}

impl Catalog for FakeCatalog {
    fn item(&self, id: &ItemId) -> Option<&ItemTemplate> {
        self.items.get(id)
    }

    fn effect(&self, id: &EffectId) -> Option<&EffectTemplate> {
        self.effects.get(id)
    }

    fn npc(&self, id: &NpcId) -> Option<&NpcTemplate> {
        self.npcs.get(id)
    }

    fn building(&self, city_id: &CityId, building_id: &BuildingId) -> Option<&BuildingTemplate> {
        self.buildings.get(&(city_id.clone(), building_id.clone()))
    }

    fn location(&self, city_id: &CityId) -> Option<&LocationTemplate> {
        self.locations.get(city_id)
    }

    fn spell(&self, id: &SpellId) -> Option<&SpellTemplate> {
        self.spells.get(id)
    }

    fn shop_config(&self, merchant_id: &MerchantId) -> Option<&ShopConfig> {
        self.shops.get(merchant_id)
    }

    fn pricing_rules(&self) -> &PricingRules {
        &self.pricing_rules
    }

    fn starting_gear(&self, class: &str) -> Vec<ItemStack> {
        self.starting_gear.get(class).cloned().unwrap_or_default()
    }

    fn starting_gold(&self, background: &str) -> u32 {
        self.starting_gold.get(background).copied().unwrap_or(0)
    }

    fn music_tracks(&self) -> Vec<MusicTrack> {
        self.music_tracks.clone()
    }

    fn npc_ids(&self) -> Vec<NpcId> {
        self.npcs.keys().cloned().collect()
    }
}

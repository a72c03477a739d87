//! C11: routes action envelopes to the engine component that understands
//! them, and turns the result into a response the client can render.
//!
//! Grounded on the teacher's `do_give`/`do_withdraw` validate-then-act-then-
//! log shape, generalized across every action kind instead of one `match`
//! arm per server-side C function. The error-handling policy is implemented
//! directly here: player-fault errors (`Conflict`, `Precondition`) become a
//! `success:false` message with no delta; everything else propagates to the
//! caller to log and surface as a transport-level failure.

use rand::Rng;
use serde::{Deserialize, Serialize};

use core::error::{GameError, GameResult};
use core::ids::{BuildingId, CityId, DistrictKey, ItemId, MerchantId, NpcId, SaveId, SessionKey, SpellId, UserId};
use core::types::{Catalog, Color, Delta, DialogueOption, EquipSlotKey, Vault};

use crate::config::EngineConfig;
use crate::delta_capture;
use crate::dialogue;
use crate::economy;
use crate::effects;
use crate::inventory::{self, SlotRef};
use crate::session::Session;
use crate::session_manager::SessionManager;
use crate::time;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActionEnvelope {
    pub user_id: UserId,
    pub save_id: SaveId,
    pub action: ActionKind,
}

/// A wire-level slot reference, resolved against `inventory::SlotRef` once
/// the dispatcher knows which vault (if any) the player currently has open.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WireSlotRef {
    General { index: usize },
    Equipment { key: EquipSlotKey },
    BagContents { index: usize },
    Vault { slot_index: usize },
}

impl WireSlotRef {
    fn resolve(self, vault_index: usize) -> SlotRef {
        match self {
            WireSlotRef::General { index } => SlotRef::General(index),
            WireSlotRef::Equipment { key } => SlotRef::Equipment(key),
            WireSlotRef::BagContents { index } => SlotRef::BagContents(index),
            WireSlotRef::Vault { slot_index } => SlotRef::Vault { building_id_index: vault_index, slot_index },
        }
    }

    /// `addToContainer`/`removeFromContainer` (§4.6) restrict the container
    /// itself to a general slot or the bag equipment slot.
    fn resolve_container(self) -> GameResult<inventory::ContainerLocator> {
        match self {
            WireSlotRef::General { index } => Ok(inventory::ContainerLocator::General(index)),
            WireSlotRef::Equipment { key } => Ok(inventory::ContainerLocator::Equipment(key)),
            WireSlotRef::BagContents { .. } | WireSlotRef::Vault { .. } => {
                Err(GameError::InvalidAction("a container must be a general slot or the bag equipment slot".to_string()))
            }
        }
    }
}

/// Every action the session runtime understands (§4.9). Parameters are
/// carried inline on each variant so a malformed envelope is rejected by
/// deserialization, ahead of dispatch, rather than inside a generic
/// `params` map lookup.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "snake_case")]
pub enum ActionKind {
    Move { city_id: CityId, district_key: DistrictKey },
    EnterBuilding { building_id: BuildingId },
    ExitBuilding,
    UseItem { general_slot: usize },
    EquipItem { general_slot: usize },
    UnequipItem { equip_slot: EquipSlotKey },
    DropItem { general_slot: usize },
    PickupItem { item_id: ItemId, quantity: u32 },
    RemoveFromInventory { from: WireSlotRef, quantity: u32 },
    MoveItem { from: WireSlotRef, to: WireSlotRef },
    StackItem { from: WireSlotRef, to: WireSlotRef },
    SplitItem { from: WireSlotRef, quantity: u32, to: WireSlotRef },
    AddItem { item_id: ItemId, quantity: u32 },
    AddToContainer { general_slot: usize, container: WireSlotRef, container_slot_index: usize },
    RemoveFromContainer { container: WireSlotRef, container_slot_index: usize, destination: usize },
    AdvanceTime { minutes: u32 },
    UpdateTime { time_of_day: u16, current_day: u32 },
    Wait { minutes: u32 },
    SleepUntil { minute: u16 },
    Rest,
    CastSpell { spell_id: SpellId },
    TalkToNpc { npc_id: NpcId, is_native: bool },
    NpcDialogueChoice { option_id: String },
    RegisterVault,
    OpenVault,
    BookShow { show_id: String, show_time_minute: u64 },
    PlayShow { show_id: String },
    ResetIdleTimer,
    BuyItem { merchant_id: MerchantId, item_id: ItemId, quantity: u32 },
    SellItem { merchant_id: MerchantId, item_id: ItemId, quantity: u32 },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponseData {
    Vault { slots: Vec<Option<(ItemId, u32)>> },
    Merchant { merchant_id: MerchantId },
    DialogueOptions { node_text: String, options: Vec<DialogueOption>, ended: bool },
    ShowResult { success: bool, xp: i32, gold: i32 },
    TimeUpdate { minutes_applied: u32, auto_pause: bool },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
    pub color: Color,
    pub delta: Option<Delta>,
    pub data: Option<ResponseData>,
    pub error: Option<String>,
}

impl ActionResponse {
    fn success(message: impl Into<String>, delta: Delta, data: Option<ResponseData>) -> Self {
        Self {
            success: true,
            message: message.into(),
            color: Color::Green,
            delta: if delta.is_empty() { None } else { Some(delta) },
            data,
            error: None,
        }
    }

    fn player_fault(e: &GameError) -> Self {
        Self {
            success: false,
            message: e.to_string(),
            color: Color::Red,
            delta: None,
            data: None,
            error: Some(format!("{e:?}")),
        }
    }
}

pub struct ActionDispatcher<'a> {
    sessions: &'a SessionManager,
    config: &'a EngineConfig,
}

struct RunOutcome {
    message: String,
    data: Option<ResponseData>,
}

impl<'a> ActionDispatcher<'a> {
    pub fn new(sessions: &'a SessionManager, config: &'a EngineConfig) -> Self {
        Self { sessions, config }
    }

    pub fn dispatch(&self, envelope: ActionEnvelope) -> ActionResponse {
        let key = SessionKey::new(envelope.user_id, envelope.save_id);
        let catalog = self.sessions.catalog().clone();
        let config = self.config;

        let user_id = key.user_id.clone();
        let outcome = self.sessions.with_session(&key, |session| {
            let before = delta_capture::capture(session, catalog.as_ref(), config);
            let run = self.run_action(session, catalog.as_ref(), &user_id, envelope.action)?;
            let after = delta_capture::capture(session, catalog.as_ref(), config);
            Ok((run, Delta::diff(&before, &after)))
        });

        match outcome {
            Ok((run, delta)) => ActionResponse::success(run.message, delta, run.data),
            Err(e) if e.is_player_fault() => {
                log::info!("action rejected: {e}");
                ActionResponse::player_fault(&e)
            }
            Err(e) => {
                log::error!("action dispatch failed: {e}");
                ActionResponse::player_fault(&e)
            }
        }
    }

    fn run_action(&self, session: &mut Session, catalog: &dyn Catalog, user_id: &UserId, action: ActionKind) -> GameResult<RunOutcome> {
        let config = self.config;
        match action {
            ActionKind::Move { city_id, district_key } => {
                session.state.position.city_id = city_id;
                session.state.position.district_key = district_key.clone();
                session.state.position.building_id = None;
                session.state.discovered_cities.insert(session.state.position.city_id.clone());
                time::tick_for_action(session, catalog, config);
                Ok(RunOutcome { message: "you travel onward".to_string(), data: None })
            }
            ActionKind::EnterBuilding { building_id } => {
                let template = catalog
                    .building(&session.state.position.city_id, &building_id)
                    .ok_or_else(|| GameError::NotFound(format!("unknown building {building_id}")))?;
                if !template.is_open_at(session.state.clock.minute) {
                    return Err(GameError::Precondition(format!("{} is closed right now", template.name)));
                }
                let name = template.name.clone();
                session.state.position.building_id = Some(building_id.clone());
                session.discovered_buildings.insert(building_id);
                time::tick_for_action(session, catalog, config);
                Ok(RunOutcome { message: format!("you enter {name}"), data: None })
            }
            ActionKind::ExitBuilding => {
                session.state.position.building_id = None;
                time::tick_for_action(session, catalog, config);
                let fatigue = session.state.vitals.fatigue;
                let message = if fatigue > 0 {
                    format!("you step outside, feeling the weight of fatigue ({fatigue})")
                } else {
                    "you step outside".to_string()
                };
                Ok(RunOutcome { message, data: None })
            }
            ActionKind::UseItem { general_slot } => self.use_item(session, catalog, general_slot),
            ActionKind::EquipItem { general_slot } => {
                inventory::equip_item(session, catalog, general_slot)?;
                time::tick_for_action(session, catalog, config);
                Ok(RunOutcome { message: "equipped item".to_string(), data: None })
            }
            ActionKind::UnequipItem { equip_slot } => {
                inventory::unequip_item(session, equip_slot)?;
                time::tick_for_action(session, catalog, config);
                Ok(RunOutcome { message: "unequipped item".to_string(), data: None })
            }
            ActionKind::DropItem { general_slot } => {
                let slot = session
                    .state
                    .general_slots
                    .get_mut(general_slot)
                    .ok_or_else(|| GameError::InvalidAction("no such general slot".to_string()))?
                    .take()
                    .ok_or_else(|| GameError::Conflict("no item in that slot".to_string()))?;
                time::tick_for_action(session, catalog, config);
                Ok(RunOutcome { message: format!("dropped {}", slot.item_id), data: None })
            }
            ActionKind::PickupItem { item_id, quantity } => {
                let placed = inventory::add_item(session, catalog, &item_id, quantity)?;
                time::tick_for_action(session, catalog, config);
                Ok(RunOutcome { message: format!("picked up {placed}x {item_id}"), data: None })
            }
            ActionKind::RemoveFromInventory { from, quantity } => {
                let vault_ids = vault_building_ids(session);
                inventory::remove_item(session, &slot_item_id(session, &vault_ids, from)?, quantity)?;
                Ok(RunOutcome { message: format!("staged {quantity} units for sale"), data: None })
            }
            ActionKind::MoveItem { from, to } => {
                let vault_ids = vault_building_ids(session);
                inventory::move_slot(session, &vault_ids, from.resolve(0), to.resolve(0))?;
                Ok(RunOutcome { message: "moved item".to_string(), data: None })
            }
            ActionKind::StackItem { from, to } => {
                let vault_ids = vault_building_ids(session);
                inventory::stack_into(session, catalog, &vault_ids, from.resolve(0), to.resolve(0))?;
                Ok(RunOutcome { message: "stacked item".to_string(), data: None })
            }
            ActionKind::SplitItem { from, quantity, to } => {
                let vault_ids = vault_building_ids(session);
                inventory::split_stack(session, &vault_ids, from.resolve(0), quantity, to.resolve(0))?;
                Ok(RunOutcome { message: "split stack".to_string(), data: None })
            }
            ActionKind::AddItem { item_id, quantity } => {
                let placed = inventory::add_item(session, catalog, &item_id, quantity)?;
                Ok(RunOutcome { message: format!("added {placed}x {item_id}"), data: None })
            }
            ActionKind::AddToContainer { general_slot, container, container_slot_index } => {
                inventory::add_to_container(session, catalog, general_slot, container.resolve_container()?, container_slot_index)?;
                Ok(RunOutcome { message: "stowed item".to_string(), data: None })
            }
            ActionKind::RemoveFromContainer { container, container_slot_index, destination } => {
                inventory::remove_from_container(session, container.resolve_container()?, container_slot_index, destination)?;
                Ok(RunOutcome { message: "took item from bag".to_string(), data: None })
            }
            ActionKind::AdvanceTime { minutes } | ActionKind::Wait { minutes } => {
                let result = time::wait(session, catalog, config, minutes);
                Ok(RunOutcome {
                    message: format!(
                        "{} minutes pass{}",
                        result.minutes_applied,
                        if result.auto_paused { " (auto-paused)" } else { "" }
                    ),
                    data: None,
                })
            }
            ActionKind::UpdateTime { time_of_day, current_day } => {
                let result = time::update_time(session, catalog, config, current_day, time_of_day)?;
                Ok(RunOutcome {
                    message: format!(
                        "clock synced to day {current_day}, {time_of_day}{}",
                        if result.auto_paused { " (auto-paused)" } else { "" }
                    ),
                    data: Some(ResponseData::TimeUpdate { minutes_applied: result.minutes_applied, auto_pause: result.auto_paused }),
                })
            }
            ActionKind::SleepUntil { minute } => {
                let result = time::sleep_until(session, catalog, config, minute);
                Ok(RunOutcome { message: format!("you sleep for {} minutes", result.minutes_applied), data: None })
            }
            ActionKind::Rest => {
                session.state.vitals.hp = session.state.vitals.max_hp;
                session.state.vitals.mana = session.state.vitals.max_mana;
                session.state.vitals.fatigue = 0;
                time::advance(session, catalog, config, 8 * 60);
                Ok(RunOutcome { message: "you rest and recover".to_string(), data: None })
            }
            ActionKind::CastSpell { spell_id } => self.cast_spell(session, catalog, &spell_id),
            ActionKind::TalkToNpc { npc_id, is_native } => {
                let outcome = dialogue::start(session, catalog, config, &npc_id, is_native)?;
                Ok(RunOutcome {
                    message: outcome.node_text.clone(),
                    data: Some(ResponseData::DialogueOptions {
                        node_text: outcome.node_text,
                        options: outcome.options,
                        ended: false,
                    }),
                })
            }
            ActionKind::NpcDialogueChoice { option_id } => {
                let outcome = dialogue::select_option(session, catalog, config, &option_id)?;
                Ok(RunOutcome {
                    message: outcome.node_text.clone(),
                    data: Some(ResponseData::DialogueOptions {
                        node_text: outcome.node_text,
                        options: outcome.options,
                        ended: outcome.ended,
                    }),
                })
            }
            ActionKind::RegisterVault => {
                let building_id = session
                    .state
                    .position
                    .building_id
                    .clone()
                    .ok_or_else(|| GameError::Precondition("you must be inside a building".to_string()))?;
                if session.state.vaults.contains_key(&building_id) {
                    return Err(GameError::Conflict("storage already registered here".to_string()));
                }
                session.state.vaults.insert(building_id, Vault::empty());
                Ok(RunOutcome { message: "storage registered".to_string(), data: None })
            }
            ActionKind::OpenVault => {
                let building_id = session
                    .state
                    .position
                    .building_id
                    .clone()
                    .ok_or_else(|| GameError::Precondition("you must be inside a building".to_string()))?;
                let vault = session
                    .state
                    .vaults
                    .get(&building_id)
                    .ok_or_else(|| GameError::NotFound("no storage registered here".to_string()))?;
                let slots = vault.slots.iter().map(|s| s.as_ref().map(|s| (s.item_id.clone(), s.quantity))).collect();
                Ok(RunOutcome { message: "storage opened".to_string(), data: Some(ResponseData::Vault { slots }) })
            }
            ActionKind::BookShow { show_id, show_time_minute } => self.book_show(session, catalog, &show_id, show_time_minute),
            ActionKind::PlayShow { show_id } => self.play_show(session, catalog, &show_id),
            ActionKind::ResetIdleTimer => {
                session.last_action_minute = Some(session.state.clock.total_minutes());
                Ok(RunOutcome { message: "idle timer reset".to_string(), data: None })
            }
            ActionKind::BuyItem { merchant_id, item_id, quantity } => {
                economy::load_or_init(session, self.sessions.save_store().as_ref(), catalog, user_id, &merchant_id)?;
                economy::regen(session, catalog, &merchant_id)?;
                let outcome = economy::buy(session, catalog, config, &merchant_id, &item_id, quantity)?;
                Ok(RunOutcome {
                    message: format!("bought {}x {} for {} gold", outcome.quantity, item_id, outcome.gold_amount),
                    data: Some(ResponseData::Merchant { merchant_id }),
                })
            }
            ActionKind::SellItem { merchant_id, item_id, quantity } => {
                economy::load_or_init(session, self.sessions.save_store().as_ref(), catalog, user_id, &merchant_id)?;
                economy::regen(session, catalog, &merchant_id)?;
                let outcome = economy::sell(session, catalog, config, &merchant_id, &item_id, quantity)?;
                Ok(RunOutcome {
                    message: format!("sold {}x {} for {} gold", outcome.quantity, item_id, outcome.gold_amount),
                    data: Some(ResponseData::Merchant { merchant_id }),
                })
            }
        }
    }

    fn use_item(&self, session: &mut Session, catalog: &dyn Catalog, general_slot: usize) -> GameResult<RunOutcome> {
        let slot = session
            .state
            .general_slots
            .get(general_slot)
            .and_then(|s| s.as_ref())
            .ok_or_else(|| GameError::Conflict("no item in that slot".to_string()))?
            .clone();
        let template = catalog
            .item(&slot.item_id)
            .ok_or_else(|| GameError::NotFound(format!("unknown item {}", slot.item_id)))?;

        effects::apply_immediate(session, &template.effects);

        if let Some(cell) = session.state.general_slots.get_mut(general_slot) {
            if let Some(s) = cell {
                if s.quantity > 1 {
                    s.quantity -= 1;
                } else {
                    *cell = None;
                }
            }
        }

        time::tick_for_action(session, catalog, self.config);
        Ok(RunOutcome { message: format!("used {}", slot.item_id), data: None })
    }

    fn cast_spell(&self, session: &mut Session, catalog: &dyn Catalog, spell_id: &SpellId) -> GameResult<RunOutcome> {
        if !session.state.known_spells.contains(spell_id) {
            return Err(GameError::Precondition("you do not know that spell".to_string()));
        }
        let spell = catalog
            .spell(spell_id)
            .ok_or_else(|| GameError::NotFound(format!("unknown spell {spell_id}")))?;
        if session.state.vitals.mana < spell.mana_cost as i32 {
            return Err(GameError::Precondition("not enough mana".to_string()));
        }

        session.state.vitals.mana -= spell.mana_cost as i32;
        effects::apply_immediate(session, &spell.effects);
        time::tick_for_action(session, catalog, self.config);
        Ok(RunOutcome { message: format!("you cast {}", spell.name), data: None })
    }

    /// §4.9 `book_show`: validates the show exists, runs today, is still
    /// inside its booking window, does not collide with another booking
    /// made today, and — when the show calls for one — that the player
    /// owns the required instrument, before recording the booking.
    fn book_show(&self, session: &mut Session, catalog: &dyn Catalog, show_id: &str, show_time_minute: u64) -> GameResult<RunOutcome> {
        let npc_id = session
            .dialogue
            .as_ref()
            .map(|c| c.npc_id.clone())
            .ok_or_else(|| GameError::Precondition("no performance venue context".to_string()))?;
        let template = catalog
            .npc(&npc_id)
            .ok_or_else(|| GameError::NotFound(format!("unknown npc {npc_id}")))?;
        let show_config = template
            .show_config
            .as_ref()
            .ok_or_else(|| GameError::Precondition("this npc runs no shows".to_string()))?;
        let show = show_config
            .shows
            .iter()
            .find(|s| s.show_id == show_id)
            .ok_or_else(|| GameError::NotFound(format!("unknown show {show_id}")))?
            .clone();

        let current_day = session.state.clock.day;
        if show.day_of_week != day_of_week(current_day) {
            return Err(GameError::Precondition("this show does not run today".to_string()));
        }
        if session.state.clock.minute > show.booking_deadline_minute {
            return Err(GameError::Precondition("the booking window for this show has passed".to_string()));
        }

        let today_start = session.state.clock.total_minutes() - session.state.clock.minute as u64;
        if session.booked_shows.values().any(|b| !b.resolved && b.booked_at_minute >= today_start) {
            return Err(GameError::Conflict("you already have a show booked today".to_string()));
        }

        if let Some(instrument) = &show.required_instrument {
            if inventory::count_item(session, instrument) == 0 {
                return Err(GameError::Precondition(format!("you need a {instrument} to book this show")));
            }
        }

        session.booked_shows.insert(
            show_id.to_string(),
            crate::session::BookedShow {
                show_id: show_id.to_string(),
                booked_at_minute: session.state.clock.total_minutes(),
                show_time_minute,
                resolved: false,
            },
        );
        Ok(RunOutcome { message: "show booked".to_string(), data: None })
    }

    /// §4.9 `play_show`: `rollD100 ≤ clamp(baseSuccess + (CHA−10)×chaMod, 5, 95)`.
    fn play_show(&self, session: &mut Session, catalog: &dyn Catalog, show_id: &str) -> GameResult<RunOutcome> {
        let ctx = session.dialogue.clone();
        let npc_id = ctx
            .as_ref()
            .map(|c| c.npc_id.clone())
            .ok_or_else(|| GameError::Precondition("no performance venue context".to_string()))?;
        let template = catalog
            .npc(&npc_id)
            .ok_or_else(|| GameError::NotFound(format!("unknown npc {npc_id}")))?;
        let show_config = template
            .show_config
            .as_ref()
            .ok_or_else(|| GameError::Precondition("this npc runs no shows".to_string()))?;
        let show = show_config
            .shows
            .iter()
            .find(|s| s.show_id == show_id)
            .ok_or_else(|| GameError::NotFound(format!("unknown show {show_id}")))?
            .clone();

        let booking = session
            .booked_shows
            .get_mut(show_id)
            .ok_or_else(|| GameError::Precondition("this show is not booked".to_string()))?;
        if booking.resolved {
            return Err(GameError::Conflict("this show has already been resolved".to_string()));
        }
        booking.resolved = true;

        const CHA_BASE: i32 = 10;
        const CHA_MOD: f64 = 1.0;
        let cha = session.state.stats.get(core::types::Ability::Charisma);
        let threshold = (show.base_success as f64 + (cha - CHA_BASE) as f64 * CHA_MOD).clamp(5.0, 95.0) as i32;
        let roll = rand::thread_rng().gen_range(1..=100);
        let success = roll <= threshold;

        let (effect_id, message) = if success {
            session.state.character.experience += show.xp_reward.max(0) as u64;
            (
                core::ids::EffectId::new("performance-high"),
                format!("the crowd roars — you earn {} xp and {} gold", show.xp_reward, show.gold_reward),
            )
        } else {
            (
                core::ids::EffectId::new("stage-fright"),
                format!("the performance falters — you still earn {} gold", show.gold_reward),
            )
        };
        inventory::add_item(session, catalog, &self.config.gold_item_id, show.gold_reward.max(0) as u32)?;
        if let Some(template) = catalog.effect(&effect_id) {
            effects::activate_effect(
                session,
                &effect_id,
                core::types::EffectSource::System("performance".to_string()),
                &template.components,
            );
        }

        time::advance(session, catalog, self.config, 60);

        Ok(RunOutcome {
            message,
            data: Some(ResponseData::ShowResult { success, xp: show.xp_reward, gold: show.gold_reward }),
        })
    }
}

/// `spec.md` §6: week day = `((currentDay − 1) mod 7)`, day numbering
/// starting at 1.
fn day_of_week(current_day: u32) -> u8 {
    ((current_day - 1) % 7) as u8
}

fn vault_building_ids(session: &Session) -> Vec<BuildingId> {
    session
        .state
        .position
        .building_id
        .clone()
        .into_iter()
        .filter(|id| session.state.vaults.contains_key(id))
        .collect()
}

/// Resolve a `WireSlotRef` to the item id currently sitting in it, without
/// mutating anything — used by `remove_from_inventory` staging, which wants
/// the item identity rather than the slot contents themselves.
fn slot_item_id(session: &Session, vault_ids: &[BuildingId], at: WireSlotRef) -> GameResult<ItemId> {
    let slot = match at.resolve(0) {
        SlotRef::General(i) => session.state.general_slots.get(i).and_then(|s| s.as_ref()),
        SlotRef::Equipment(key) => session.state.equipment.get(key),
        SlotRef::BagContents(i) => session
            .state
            .equipment
            .get(EquipSlotKey::Bag)
            .and_then(|bag| bag.contents.as_ref())
            .and_then(|c| c.get(i)),
        SlotRef::Vault { building_id_index, slot_index } => vault_ids
            .get(building_id_index)
            .and_then(|id| session.state.vaults.get(id))
            .and_then(|v| v.slots.get(slot_index))
            .and_then(|s| s.as_ref()),
    };
    slot.map(|s| s.item_id.clone())
        .ok_or_else(|| GameError::Conflict("that slot is empty".to_string()))
}

//! Engine-wide tunables.
//!
//! The teacher keeps numbers like this as bare `pub const`s in
//! `core::constants`, always reachable from any function through the
//! global `Repository`/`State` singletons. `spec.md` §9 asks for those
//! singletons to go away in favor of explicit, constructed state, so the
//! handful of numbers the engine actually needs to know about up front
//! (rather than reading from the catalog) live on one value the caller
//! builds once and hands to every `Session`/`ActionDispatcher`.

use std::collections::HashMap;

use core::ids::{EffectId, ItemId};

/// Fatigue penalty thresholds, in ascending order. A value at or above a
/// threshold but below the next applies that threshold's effect (§4.5).
/// Hunger has no equivalent table: its penalty bands are an exact,
/// non-monotonic lookup (0/1/3 penalized, 2 not), so it is carried as a
/// fixed `[Option<EffectId>; 4]` indexed directly by hunger level instead.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PenaltyThreshold {
    pub at_or_above: i32,
    pub effect_id: EffectId,
}

#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// The catalog item ID that represents gold. `GameState::gold` and the
    /// economy engine both key off this rather than a separate counter.
    pub gold_item_id: ItemId,

    /// Penalty effect for each exact hunger level 0..=3 (§4.5: "0 ->
    /// starving, 1 -> hungry, 2 -> no effect, 3 -> stuffed"). Index 2 is
    /// always `None`.
    pub hunger_penalty_effect_ids: [Option<EffectId>; 4],
    /// Fatigue penalty table, most severe last; evaluated highest-match-wins.
    pub fatigue_thresholds: Vec<PenaltyThreshold>,

    /// The always-present ticker while `fatigue < 10` (§4.5 accumulation
    /// effects; same effect id at every fatigue level).
    pub fatigue_accumulation_effect_id: EffectId,
    /// The always-present ticker while `hunger > 0`, keyed by the live
    /// hunger level rather than frozen at apply time. Index 0 is always
    /// `None` (hunger at its floor has no accumulation left to tick).
    pub hunger_accumulation_effect_ids: [Option<EffectId>; 4],

    /// A gap of at least this many in-game minutes between the last
    /// observed action and `now` triggers auto-pause semantics in
    /// `TimeEngine::advance`/`update_time` (§4.4).
    pub auto_pause_gap_minutes: u32,

    /// Effect IDs carried over from a schema predating `schema_version`,
    /// remapped once by `GameState::migrate` (§9 Open Question).
    pub legacy_effect_id_map: HashMap<EffectId, EffectId>,

    /// Applied once, when a booked show's time passes unattended.
    pub missed_show_penalty_effect_id: Option<EffectId>,
}

/// §9 Open Question: whether the well-fed state is labeled "Well Fed" or
/// "Satisfied" in player-facing text. Chosen here as `"Satisfied"` — it
/// reads less like a food-specific buff and more like the general state the
/// hunger/fatigue system models (mirrors `"Satisfied"` used by the fatigue
/// side's "Rested" counterpart rather than pairing "Well Fed" with
/// "Exhausted"). Display label only: hunger=2 carries no penalty effect and
/// needs no threshold of its own.
pub const SATISFIED_HUNGER_LABEL: &str = "Satisfied";

impl EngineConfig {
    /// The literal threshold/effect-id tables `spec.md` §4.5 and §6 name,
    /// spelled out once here instead of re-declared at each call site.
    pub fn new(gold_item_id: ItemId) -> Self {
        Self {
            gold_item_id,
            hunger_penalty_effect_ids: [
                Some(EffectId::new("starving")),
                Some(EffectId::new("hungry")),
                None,
                Some(EffectId::new("stuffed")),
            ],
            fatigue_thresholds: vec![
                PenaltyThreshold { at_or_above: 6, effect_id: EffectId::new("tired") },
                PenaltyThreshold { at_or_above: 8, effect_id: EffectId::new("very-tired") },
                PenaltyThreshold { at_or_above: 9, effect_id: EffectId::new("fatigued") },
                PenaltyThreshold { at_or_above: 10, effect_id: EffectId::new("exhaustion") },
            ],
            fatigue_accumulation_effect_id: EffectId::new("fatigue-accumulation"),
            hunger_accumulation_effect_ids: [
                None,
                Some(EffectId::new("hunger-accumulation-hungry")),
                Some(EffectId::new("hunger-accumulation-wellfed")),
                Some(EffectId::new("hunger-accumulation-stuffed")),
            ],
            auto_pause_gap_minutes: 360,
            legacy_effect_id_map: HashMap::new(),
            missed_show_penalty_effect_id: Some(EffectId::new("no-show")),
        }
    }

    pub fn hunger_penalty_for(&self, hunger: i32) -> Option<&EffectId> {
        usize::try_from(hunger).ok().and_then(|i| self.hunger_penalty_effect_ids.get(i)).and_then(|e| e.as_ref())
    }

    pub fn fatigue_penalty_for(&self, fatigue: i32) -> Option<&EffectId> {
        self.fatigue_thresholds
            .iter()
            .rev()
            .find(|t| fatigue >= t.at_or_above)
            .map(|t| &t.effect_id)
    }

    /// The hunger-accumulation variant for the live hunger level, per §4.5
    /// ("the hunger tick interval is read from the live hunger level, not
    /// frozen at apply time").
    pub fn hunger_accumulation_for(&self, hunger: i32) -> Option<&EffectId> {
        usize::try_from(hunger).ok().and_then(|i| self.hunger_accumulation_effect_ids.get(i)).and_then(|e| e.as_ref())
    }
}

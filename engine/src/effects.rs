//! C5: status effects, hunger/fatigue, and the per-tick effect pipeline.
//!
//! Grounded on the teacher's `EffectManager::effect_tick`
//! (`server/src/effect.rs`), which walks every live effect once per server
//! tick and dispatches on a numeric effect type. The shape survives —
//! delay countdown, then periodic application, then duration decay — but
//! effect identity is a catalog-looked-up `EffectTemplate` instead of a
//! hardcoded `match` on a type integer, since this engine's effects are
//! content-defined rather than compiled in.

use core::ids::EffectId;
use core::types::{
    Ability, ActiveEffect, Catalog, ComponentType, EffectComponent, EffectSource, ItemEffectComponent,
};

use crate::session::Session;

/// Clamp hp/mana/hunger/fatigue to their valid ranges after any mutation.
fn clamp_vitals(session: &mut Session) {
    let v = &mut session.state.vitals;
    v.hp = v.hp.clamp(0, v.max_hp);
    v.mana = v.mana.clamp(0, v.max_mana);
    v.hunger = v.hunger.clamp(0, 3);
    v.fatigue = v.fatigue.clamp(0, 10);
}

fn apply_component_value(session: &mut Session, component_type: ComponentType, value: i32) {
    match component_type {
        ComponentType::Hp => session.state.vitals.hp += value,
        ComponentType::Mana => session.state.vitals.mana += value,
        ComponentType::Hunger => session.state.vitals.hunger += value,
        ComponentType::Fatigue => session.state.vitals.fatigue += value,
        ComponentType::Ability(ability) => session.state.stats.add(ability, value),
    }
    clamp_vitals(session);
}

/// Apply a list of instant `{type, value}` components immediately — the
/// path used by item-use effects (§4.6 `useItem`) and by any `EffectComponent`
/// with no timing fields at all.
pub fn apply_immediate(session: &mut Session, components: &[ItemEffectComponent]) {
    for component in components {
        apply_component_value(session, component.component_type, component.value);
    }
}

/// Begin tracking an effect template on a session: instant components
/// apply right away. A component with no `tick_interval` but a duration or
/// delay (a stat modifier, per §4.5) applies its value once, up front, and
/// is reverted when the `ActiveEffect` is dropped. A component with a
/// `tick_interval` applies nothing here — `tick` applies it once per
/// interval crossed while the effect is live.
pub fn activate_effect(session: &mut Session, effect_id: &EffectId, source: EffectSource, components: &[EffectComponent]) {
    let mut has_timed = false;
    let mut delay = None;
    let mut duration = None;

    for component in components {
        if component.is_instant() {
            apply_component_value(session, component.component_type, component.value);
        } else {
            has_timed = true;
            delay = delay.or(component.delay);
            duration = duration.or(component.duration);
            if component.tick_interval.is_none() {
                apply_component_value(session, component.component_type, component.value);
            }
        }
    }

    if has_timed {
        session.state.active_effects.push(ActiveEffect {
            effect_id: effect_id.clone(),
            source,
            remaining_delay: delay,
            remaining_duration: duration,
            tick_accumulator: 0,
        });
    }
}

/// Undo the once-applied (non-periodic) components of an effect about to be
/// dropped, so a stat modifier's bonus does not outlive its `ActiveEffect`.
fn revert_once_applied(session: &mut Session, catalog: &dyn Catalog, effect_id: &EffectId) {
    let Some(template) = catalog.effect(effect_id) else { return };
    for component in &template.components {
        if !component.is_instant() && component.tick_interval.is_none() {
            apply_component_value(session, component.component_type, -component.value);
        }
    }
}

/// Remove every `ActiveEffect` with the given id, instant or not, reverting
/// any once-applied stat modifier it carried. Used when re-equipping removes
/// an item-sourced effect, or a dialogue action clears a status outright.
pub fn remove_effect(session: &mut Session, catalog: &dyn Catalog, effect_id: &EffectId) {
    if session.state.active_effects.iter().any(|e| &e.effect_id == effect_id) {
        revert_once_applied(session, catalog, effect_id);
    }
    session.state.active_effects.retain(|e| &e.effect_id != effect_id);
}

/// Advance every active effect by `elapsed_minutes` in-game minutes, in
/// three phases, matching the order `spec.md` §4.5 lays out:
///
/// 1. Delay countdown — effects still waiting to start just count down.
/// 2. Periodic application — effects whose delay has elapsed accumulate
///    minutes and apply once per whole `tick_interval` crossed.
/// 3. Duration decay — effects with a finite duration count down and are
///    dropped once they reach zero.
pub fn tick(session: &mut Session, catalog: &dyn Catalog, elapsed_minutes: u32) {
    if elapsed_minutes == 0 {
        return;
    }

    let effect_ids: Vec<EffectId> = session
        .state
        .active_effects
        .iter()
        .map(|e| e.effect_id.clone())
        .collect();

    // Phase 1: delay countdown.
    for effect in &mut session.state.active_effects {
        if let Some(remaining) = effect.remaining_delay {
            effect.remaining_delay = Some(remaining.saturating_sub(elapsed_minutes));
            if effect.remaining_delay == Some(0) {
                effect.remaining_delay = None;
            }
        }
    }

    // Phase 2: periodic application, once the delay is clear.
    for (idx, effect_id) in effect_ids.iter().enumerate() {
        let tick_interval = catalog
            .effect(effect_id)
            .and_then(|tpl| tpl.components.iter().find_map(|c| c.tick_interval));
        let Some(tick_interval) = tick_interval else { continue };
        if tick_interval == 0 {
            continue;
        }

        let delay_clear = session.state.active_effects[idx].remaining_delay.is_none();
        if !delay_clear {
            continue;
        }

        session.state.active_effects[idx].tick_accumulator += elapsed_minutes;
        let mut applications = 0u32;
        while session.state.active_effects[idx].tick_accumulator >= tick_interval {
            session.state.active_effects[idx].tick_accumulator -= tick_interval;
            applications += 1;
        }

        if applications > 0 {
            if let Some(template) = catalog.effect(effect_id) {
                for component in &template.components {
                    if component.tick_interval.is_some() {
                        let value = component.value * applications as i32;
                        apply_component_value(session, component.component_type, value);
                    }
                }
            }
        }
    }

    // Phase 3: duration decay.
    for effect in &mut session.state.active_effects {
        if effect.remaining_delay.is_some() {
            continue;
        }
        if let Some(remaining) = effect.remaining_duration {
            effect.remaining_duration = Some(remaining.saturating_sub(elapsed_minutes));
        }
    }

    let expired: Vec<EffectId> = session
        .state
        .active_effects
        .iter()
        .filter(|e| e.remaining_delay.is_none() && e.remaining_duration == Some(0))
        .map(|e| e.effect_id.clone())
        .collect();
    for effect_id in &expired {
        revert_once_applied(session, catalog, effect_id);
    }
    session
        .state
        .active_effects
        .retain(|e| e.remaining_delay.is_some() || e.remaining_duration != Some(0));
}

/// Swap the hunger/fatigue penalty `ActiveEffect`s for whatever the
/// threshold tables in `config` say should apply to the current vitals, and
/// enforce the accumulation-ticker presence rule: fatigue-accumulation
/// exists iff `fatigue < 10`; the live hunger-accumulation variant exists
/// iff `hunger > 0` (§4.5, §8). Idempotent: calling it twice in a row with
/// unchanged vitals is a no-op.
pub fn sync_penalty_effects(session: &mut Session, config: &crate::config::EngineConfig) {
    let hunger = session.state.vitals.hunger;
    let fatigue = session.state.vitals.fatigue;

    let wanted_hunger = config.hunger_penalty_for(hunger).cloned();
    let wanted_fatigue = config.fatigue_penalty_for(fatigue).cloned();
    let wanted_fatigue_accumulation = (fatigue < 10).then(|| config.fatigue_accumulation_effect_id.clone());
    let wanted_hunger_accumulation = config.hunger_accumulation_for(hunger).cloned();

    let all_hunger_ids: Vec<EffectId> = config.hunger_penalty_effect_ids.iter().flatten().cloned().collect();
    let all_fatigue_ids: Vec<EffectId> = config
        .fatigue_thresholds
        .iter()
        .map(|t| t.effect_id.clone())
        .collect();
    let all_hunger_accumulation_ids: Vec<EffectId> = config.hunger_accumulation_effect_ids.iter().flatten().cloned().collect();

    session.state.active_effects.retain(|e| {
        if all_hunger_ids.contains(&e.effect_id) {
            Some(&e.effect_id) == wanted_hunger.as_ref()
        } else if all_fatigue_ids.contains(&e.effect_id) {
            Some(&e.effect_id) == wanted_fatigue.as_ref()
        } else if e.effect_id == config.fatigue_accumulation_effect_id {
            Some(&e.effect_id) == wanted_fatigue_accumulation.as_ref()
        } else if all_hunger_accumulation_ids.contains(&e.effect_id) {
            Some(&e.effect_id) == wanted_hunger_accumulation.as_ref()
        } else {
            true
        }
    });

    for wanted in [wanted_hunger, wanted_fatigue, wanted_fatigue_accumulation, wanted_hunger_accumulation]
        .into_iter()
        .flatten()
    {
        let already_present = session.state.active_effects.iter().any(|e| e.effect_id == wanted);
        if !already_present {
            session.state.active_effects.push(ActiveEffect {
                effect_id: wanted,
                source: EffectSource::System("vitals".to_string()),
                remaining_delay: None,
                remaining_duration: None,
                tick_accumulator: 0,
            });
        }
    }
}

/// The total modifier currently applied to `ability`, for stat display.
pub fn ability_modifier_total(session: &Session, ability: Ability) -> i32 {
    session.state.stats.get(ability)
}

#[cfg(test)]
mod tests {
    use core::ids::{EffectId, ItemId};
    use core::types::Color;

    use crate::testutil::fixtures::{bare_catalog, sample_session};

    use super::*;

    fn periodic_effect(id: &str, tick_interval: u32, value: i32, duration: Option<u32>) -> core::types::EffectTemplate {
        core::types::EffectTemplate {
            id: EffectId::new(id),
            name: id.to_string(),
            category: "status".to_string(),
            color: Color::White,
            silent: false,
            components: vec![EffectComponent {
                component_type: ComponentType::Hp,
                value,
                duration,
                delay: None,
                tick_interval: Some(tick_interval),
            }],
        }
    }

    /// An instant `{type, value}` component applies immediately and the
    /// resulting vitals are clamped into range.
    #[test]
    fn apply_immediate_clamps_hp_to_max() {
        let mut session = sample_session();
        session.state.vitals.hp = session.state.vitals.max_hp - 1;
        apply_immediate(&mut session, &[ItemEffectComponent { component_type: ComponentType::Hp, value: 50 }]);
        assert_eq!(session.state.vitals.hp, session.state.vitals.max_hp);
    }

    /// An ability-score component is always routed through `ActiveEffect`
    /// (never treated as instant), but still applies its bonus immediately —
    /// the `ActiveEffect` entry exists to track when that bonus expires.
    #[test]
    fn ability_component_applies_immediately_and_tracks_expiry() {
        let mut session = sample_session();
        let components = vec![EffectComponent {
            component_type: ComponentType::Ability(Ability::Charisma),
            value: 2,
            duration: Some(720),
            delay: None,
            tick_interval: None,
        }];
        activate_effect(&mut session, &EffectId::new("performance-high"), EffectSource::System("test".to_string()), &components);
        assert_eq!(session.state.active_effects.len(), 1);
        assert_eq!(session.state.stats.get(Ability::Charisma), 12);
    }

    /// Once a stat-modifier effect's duration decays to zero, `tick` reverts
    /// its bonus rather than leaving it permanently applied.
    #[test]
    fn tick_reverts_ability_bonus_once_its_duration_expires() {
        let mut session = sample_session();
        let mut catalog = bare_catalog();
        let template = core::types::EffectTemplate {
            id: EffectId::new("performance-high"),
            name: "performance-high".to_string(),
            category: "buff".to_string(),
            color: Color::Green,
            silent: false,
            components: vec![EffectComponent {
                component_type: ComponentType::Ability(Ability::Charisma),
                value: 2,
                duration: Some(10),
                delay: None,
                tick_interval: None,
            }],
        };
        catalog.effects.insert(template.id.clone(), template.clone());
        activate_effect(
            &mut session,
            &template.id,
            EffectSource::System("test".to_string()),
            &template.components,
        );
        assert_eq!(session.state.stats.get(Ability::Charisma), 12);

        tick(&mut session, &catalog, 10);

        assert_eq!(session.state.stats.get(Ability::Charisma), 10);
        assert!(session.state.active_effects.is_empty());
    }

    /// The tick pipeline applies a periodic component once per whole
    /// `tick_interval` crossed and carries the remainder in the accumulator.
    #[test]
    fn tick_applies_once_per_interval_crossed_and_keeps_remainder() {
        let mut session = sample_session();
        let mut catalog = bare_catalog();
        let template = periodic_effect("regen", 10, 1, None);
        catalog.effects.insert(template.id.clone(), template.clone());
        session.state.active_effects.push(ActiveEffect {
            effect_id: template.id.clone(),
            source: EffectSource::System("test".to_string()),
            remaining_delay: None,
            remaining_duration: None,
            tick_accumulator: 0,
        });
        let hp_before = session.state.vitals.hp;

        tick(&mut session, &catalog, 25);

        assert_eq!(session.state.vitals.hp, hp_before + 2);
        assert_eq!(session.state.active_effects[0].tick_accumulator, 5);
    }

    /// An effect still counting down its delay does not apply its periodic
    /// component yet.
    #[test]
    fn tick_withholds_periodic_application_while_delayed() {
        let mut session = sample_session();
        let mut catalog = bare_catalog();
        let template = periodic_effect("poison", 5, -1, None);
        catalog.effects.insert(template.id.clone(), template.clone());
        session.state.active_effects.push(ActiveEffect {
            effect_id: template.id.clone(),
            source: EffectSource::System("test".to_string()),
            remaining_delay: Some(10),
            remaining_duration: None,
            tick_accumulator: 0,
        });
        let hp_before = session.state.vitals.hp;

        tick(&mut session, &catalog, 5);

        assert_eq!(session.state.vitals.hp, hp_before);
        assert_eq!(session.state.active_effects[0].remaining_delay, Some(5));
    }

    /// A finite-duration effect is dropped once its duration reaches zero.
    #[test]
    fn tick_removes_effect_once_duration_expires() {
        let mut session = sample_session();
        let catalog = bare_catalog();
        session.state.active_effects.push(ActiveEffect {
            effect_id: EffectId::new("stage-fright"),
            source: EffectSource::System("test".to_string()),
            remaining_delay: None,
            remaining_duration: Some(10),
            tick_accumulator: 0,
        });

        tick(&mut session, &catalog, 10);

        assert!(session.state.active_effects.is_empty());
    }

    /// Calling `sync_penalty_effects` twice with unchanged vitals does not
    /// duplicate the penalty effect.
    #[test]
    fn sync_penalty_effects_is_idempotent() {
        let mut session = sample_session();
        session.state.vitals.hunger = 0;
        let config = crate::config::EngineConfig::new(ItemId::new("gold-piece"));

        sync_penalty_effects(&mut session, &config);
        sync_penalty_effects(&mut session, &config);

        assert_eq!(session.state.active_effects.iter().filter(|e| e.effect_id == EffectId::new("starving")).count(), 1);
    }

    /// Fatigue-accumulation is present whenever fatigue hasn't hit its cap,
    /// and disappears the instant it does (§8).
    #[test]
    fn fatigue_accumulation_is_present_until_fatigue_caps() {
        let mut session = sample_session();
        let config = crate::config::EngineConfig::new(ItemId::new("gold-piece"));

        session.state.vitals.fatigue = 9;
        sync_penalty_effects(&mut session, &config);
        assert!(session
            .state
            .active_effects
            .iter()
            .any(|e| e.effect_id == config.fatigue_accumulation_effect_id));

        session.state.vitals.fatigue = 10;
        sync_penalty_effects(&mut session, &config);
        assert!(!session
            .state
            .active_effects
            .iter()
            .any(|e| e.effect_id == config.fatigue_accumulation_effect_id));
    }

    /// The hunger-accumulation ticker tracks the live hunger level rather
    /// than whatever it was when first applied (§4.5).
    #[test]
    fn hunger_accumulation_variant_follows_the_live_hunger_level() {
        let mut session = sample_session();
        let config = crate::config::EngineConfig::new(ItemId::new("gold-piece"));

        session.state.vitals.hunger = 1;
        sync_penalty_effects(&mut session, &config);
        assert!(session
            .state
            .active_effects
            .iter()
            .any(|e| e.effect_id == EffectId::new("hunger-accumulation-hungry")));

        session.state.vitals.hunger = 3;
        sync_penalty_effects(&mut session, &config);
        assert!(!session
            .state
            .active_effects
            .iter()
            .any(|e| e.effect_id == EffectId::new("hunger-accumulation-hungry")));
        assert!(session
            .state
            .active_effects
            .iter()
            .any(|e| e.effect_id == EffectId::new("hunger-accumulation-stuffed")));

        session.state.vitals.hunger = 0;
        sync_penalty_effects(&mut session, &config);
        assert!(!session
            .state
            .active_effects
            .iter()
            .any(|e| e.effect_id == EffectId::new("hunger-accumulation-stuffed")));
    }
}

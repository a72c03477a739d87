//! C6: clock advancement and auto-pause.
//!
//! The teacher advances its world clock once per 50ms server tick
//! (`TICKS`/`TICK` in `core::constants`) regardless of what any player is
//! doing, because there is exactly one world. A session-per-save engine
//! instead advances its clock only when that session's actions ask it to,
//! in whole in-game minutes (never the teacher's float-seconds-per-tick
//! model — `spec.md` §9 flags float time counters directly). Auto-pause
//! exists so a single `wait`/`sleep` spanning a long real-world absence
//! does not silently grind hours of hunger/fatigue decay into one
//! response: the clock only ever advances up to the configured gap, and
//! the caller is told how much of its request was actually applied.

use core::error::{GameError, GameResult};
use core::types::Catalog;

use crate::config::EngineConfig;
use crate::effects;
use crate::session::Session;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdvanceOutcome {
    pub minutes_applied: u32,
    pub days_crossed: u32,
    pub auto_paused: bool,
}

/// Advance the session's clock by up to `requested_minutes`, running the
/// effect tick pipeline and resolving rentals/bookings over the applied
/// span. If `requested_minutes` is at least `config.auto_pause_gap_minutes`,
/// only `auto_pause_gap_minutes` is actually applied and `auto_paused` is
/// set — the caller must issue another advance to cover the remainder.
pub fn advance(session: &mut Session, catalog: &dyn Catalog, config: &EngineConfig, requested_minutes: u32) -> AdvanceOutcome {
    let auto_paused = requested_minutes >= config.auto_pause_gap_minutes;
    let minutes_applied = if auto_paused {
        config.auto_pause_gap_minutes
    } else {
        requested_minutes
    };

    let days_crossed = session.state.clock.advance(minutes_applied);
    effects::tick(session, catalog, minutes_applied);
    effects::sync_penalty_effects(session, config);
    resolve_rentals_and_shows(session, catalog, config);

    session.last_action_minute = Some(session.state.clock.total_minutes());

    AdvanceOutcome {
        minutes_applied,
        days_crossed,
        auto_paused,
    }
}

/// The flat one-minute clock cost every dispatched action that isn't
/// itself a `wait`/`sleep` pays (§4.4).
pub fn tick_for_action(session: &mut Session, catalog: &dyn Catalog, config: &EngineConfig) -> AdvanceOutcome {
    advance(session, catalog, config, 1)
}

pub fn wait(session: &mut Session, catalog: &dyn Catalog, config: &EngineConfig, minutes: u32) -> AdvanceOutcome {
    advance(session, catalog, config, minutes)
}

/// Advance until the clock reaches `target_minute` on the next day if
/// `target_minute` is not later today, matching how `sleep` is usually
/// phrased ("sleep until 8am").
pub fn sleep_until(session: &mut Session, catalog: &dyn Catalog, config: &EngineConfig, target_minute: u16) -> AdvanceOutcome {
    let current = session.state.clock.minute;
    let minutes = if target_minute > current {
        (target_minute - current) as u32
    } else {
        (core::types::Clock::MINUTES_PER_DAY - current + target_minute) as u32
    };
    advance(session, catalog, config, minutes)
}

/// Client-driven clock sync (§4.4 `update_time`): the client reports its
/// own `(currentDay, timeOfDay)` and the server reconciles its clock to
/// it, rejecting anything that does not move the clock strictly forward.
/// Auto-pause here is keyed on the real gap since `Session::last_action_minute`
/// rather than the size of the request itself: a client that reconnects
/// after a long absence and reports a far-future time is capped exactly
/// like a long `wait`/`sleep` would be.
pub fn update_time(session: &mut Session, catalog: &dyn Catalog, config: &EngineConfig, current_day: u32, time_of_day: u16) -> GameResult<AdvanceOutcome> {
    let now_total = session.state.clock.total_minutes();
    let target_total = current_day as u64 * core::types::Clock::MINUTES_PER_DAY as u64 + time_of_day as u64;
    if target_total <= now_total {
        return Err(GameError::Precondition("client clock must move strictly forward".to_string()));
    }
    let requested_minutes = (target_total - now_total) as u32;

    let auto_paused = match session.last_action_minute {
        Some(last) if last > 0 => target_total.saturating_sub(last) >= config.auto_pause_gap_minutes as u64,
        _ => false,
    };
    let minutes_applied = if auto_paused {
        config.auto_pause_gap_minutes.min(requested_minutes)
    } else {
        requested_minutes
    };

    let days_crossed = session.state.clock.advance(minutes_applied);
    effects::tick(session, catalog, minutes_applied);
    effects::sync_penalty_effects(session, config);
    resolve_rentals_and_shows(session, catalog, config);

    session.last_action_minute = Some(session.state.clock.total_minutes());

    Ok(AdvanceOutcome {
        minutes_applied,
        days_crossed,
        auto_paused,
    })
}

fn resolve_rentals_and_shows(session: &mut Session, catalog: &dyn Catalog, config: &EngineConfig) {
    let now = session.state.clock.total_minutes();

    session.rented_rooms.retain(|_, room| room.expires_at_minute > now);

    let mut newly_missed = Vec::new();
    for (show_id, booking) in session.booked_shows.iter_mut() {
        if !booking.resolved && now >= booking.show_time_minute + 60 {
            booking.resolved = true;
            newly_missed.push(show_id.clone());
        }
    }

    if newly_missed.is_empty() {
        return;
    }
    let Some(effect_id) = &config.missed_show_penalty_effect_id else {
        return;
    };
    let Some(components) = catalog.effect(effect_id).map(|tpl| tpl.components.clone()) else {
        return;
    };
    for _ in newly_missed {
        effects::activate_effect(
            session,
            effect_id,
            core::types::EffectSource::System("missed_show".to_string()),
            &components,
        );
    }
}

#[cfg(test)]
mod tests {
    use crate::config::EngineConfig;
    use crate::session::BookedShow;
    use crate::testutil::fixtures::{bare_catalog, gold_item_id, sample_session};

    use super::*;

    fn config_with_gap(auto_pause_gap_minutes: u32) -> EngineConfig {
        EngineConfig {
            auto_pause_gap_minutes,
            missed_show_penalty_effect_id: None,
            ..EngineConfig::new(gold_item_id())
        }
    }

    /// A requested gap at or above the auto-pause threshold only advances the
    /// clock by the threshold itself, and is reported as auto-paused.
    #[test]
    fn advance_caps_at_the_auto_pause_gap() {
        let mut session = sample_session();
        let catalog = bare_catalog();
        let config = config_with_gap(360);

        let outcome = advance(&mut session, &catalog, &config, 500);

        assert!(outcome.auto_paused);
        assert_eq!(outcome.minutes_applied, 360);
    }

    /// A requested gap under the threshold applies in full and is not
    /// flagged as auto-paused.
    #[test]
    fn advance_applies_requests_under_the_gap_in_full() {
        let mut session = sample_session();
        let catalog = bare_catalog();
        let config = config_with_gap(360);

        let outcome = advance(&mut session, &catalog, &config, 120);

        assert!(!outcome.auto_paused);
        assert_eq!(outcome.minutes_applied, 120);
    }

    /// A booked show that is never played is only marked missed once its
    /// full 60-minute window has elapsed, not the instant it starts — the
    /// player must still be able to `play_show` inside that window.
    #[test]
    fn booked_show_is_not_missed_until_its_window_fully_elapses() {
        let mut session = sample_session();
        let catalog = bare_catalog();
        let config = config_with_gap(999_999);

        let show_time = session.state.clock.total_minutes() + 30;
        session.booked_shows.insert(
            "evening-set".to_string(),
            BookedShow {
                show_id: "evening-set".to_string(),
                booked_at_minute: session.state.clock.total_minutes(),
                show_time_minute: show_time,
                resolved: false,
            },
        );

        advance(&mut session, &catalog, &config, 30);
        assert!(!session.booked_shows["evening-set"].resolved, "show should still be playable right at its start time");

        advance(&mut session, &catalog, &config, 60);
        assert!(session.booked_shows["evening-set"].resolved, "show should be resolved once its window has fully elapsed");
    }

    /// `sleep_until` rolls over to the next day when the target minute has
    /// already passed today.
    #[test]
    fn sleep_until_wraps_to_the_next_day_when_target_already_passed() {
        let mut session = sample_session();
        session.state.clock = core::types::Clock::new(1, 600);
        let catalog = bare_catalog();
        let config = config_with_gap(999_999);

        let outcome = sleep_until(&mut session, &catalog, &config, 480);

        assert_eq!(outcome.minutes_applied, (core::types::Clock::MINUTES_PER_DAY - 600 + 480) as u32);
        assert_eq!(session.state.clock.minute, 480);
        assert_eq!(session.state.clock.day, 2);
    }

    /// `update_time` rejects a client-reported time that does not move the
    /// clock strictly forward.
    #[test]
    fn update_time_rejects_a_non_forward_report() {
        let mut session = sample_session();
        let catalog = bare_catalog();
        let config = config_with_gap(360);

        let err = update_time(&mut session, &catalog, &config, 1, 480).unwrap_err();
        assert!(matches!(err, GameError::Precondition(_)));
    }

    /// A gap since the last dispatched action at or above the threshold
    /// auto-pauses `update_time` exactly like `advance` would.
    #[test]
    fn update_time_auto_pauses_on_a_large_gap_since_the_last_action() {
        let mut session = sample_session();
        let catalog = bare_catalog();
        let config = config_with_gap(360);
        session.last_action_minute = Some(session.state.clock.total_minutes());

        let outcome = update_time(&mut session, &catalog, &config, 2, 500).unwrap();

        assert!(outcome.auto_paused);
        assert_eq!(outcome.minutes_applied, 360);
    }

    /// With no prior action recorded, `update_time` applies the full
    /// reported gap without auto-pausing.
    #[test]
    fn update_time_does_not_auto_pause_without_a_prior_action() {
        let mut session = sample_session();
        let catalog = bare_catalog();
        let config = config_with_gap(360);
        session.last_action_minute = None;

        let outcome = update_time(&mut session, &catalog, &config, 2, 500).unwrap();

        assert!(!outcome.auto_paused);
    }
}

//! C9: NPC conversation state machine.
//!
//! The teacher's dialogue (`server/src/talk.rs`) is a flat 227-entry
//! keyword table matched against whatever a player types; it has no notion
//! of conversation state or gated options, so it does not generalize here.
//! What's kept from the teacher is the surrounding discipline — validate,
//! then act, then log (`do_give`'s shape in `state/inventory.rs`) — applied
//! instead to a small node/option graph: `selectOption` checks requirements,
//! runs the node's action as its own side effect, and only then moves the
//! conversation to the next node.

use core::error::{GameError, GameResult};
use core::ids::NpcId;
use core::types::{Catalog, DialogueAction, DialogueOption, DialogueRequirement, NpcTemplate};

use crate::config::EngineConfig;
use crate::inventory;
use crate::session::{DialogueContext, Session};

pub struct DialogueStartOutcome {
    pub node_text: String,
    pub options: Vec<DialogueOption>,
}

/// Begin (or restart) a conversation with `npc_id`, resolving the greeting
/// override for native-city / vault-registered-here / first-time-meeting
/// before falling back to the root node's plain text.
pub fn start(
    session: &mut Session,
    catalog: &dyn Catalog,
    config: &EngineConfig,
    npc_id: &NpcId,
    is_native: bool,
) -> GameResult<DialogueStartOutcome> {
    let template = catalog
        .npc(npc_id)
        .ok_or_else(|| GameError::NotFound(format!("unknown npc {npc_id}")))?;
    let root = template
        .dialogue
        .get(&template.dialogue_root)
        .ok_or_else(|| GameError::Internal(format!("npc {npc_id} has no root dialogue node")))?;

    let is_first_time = !has_met_before(session, npc_id);
    let vault_here = template
        .greeting_override
        .as_ref()
        .and_then(|g| {
            if vault_registered_here(session, template) {
                g.vault_registered_here.clone()
            } else {
                None
            }
        });

    let text = vault_here
        .or_else(|| {
            if is_native {
                template.greeting_override.as_ref().and_then(|g| g.native_to_city.clone())
            } else {
                None
            }
        })
        .or_else(|| {
            if is_first_time {
                template.greeting_override.as_ref().and_then(|g| g.first_time.clone())
            } else {
                None
            }
        })
        .unwrap_or_else(|| root.text.clone());

    session.dialogue = Some(DialogueContext {
        npc_id: npc_id.clone(),
        current_node: template.dialogue_root.clone(),
    });
    session.state.met_npcs.insert(npc_id.clone());

    Ok(DialogueStartOutcome {
        node_text: text,
        options: available_options(session, config, &root.options),
    })
}

/// Filter a node's options down to the ones the player currently satisfies,
/// per `spec.md` §4.8 ("unmet options are elided from the returned option
/// list").
fn available_options(session: &Session, config: &EngineConfig, options: &[DialogueOption]) -> Vec<DialogueOption> {
    options
        .iter()
        .filter(|o| requirements_met(session, config, &o.requirements))
        .cloned()
        .collect()
}

fn has_met_before(session: &Session, npc_id: &NpcId) -> bool {
    session.state.met_npcs.contains(npc_id)
}

fn vault_registered_here(session: &Session, template: &NpcTemplate) -> bool {
    template
        .schedule
        .first()
        .and_then(|entry| entry.location.building_id.as_ref())
        .map(|building_id| session.state.vaults.contains_key(building_id))
        .unwrap_or(false)
}

pub struct DialogueStepOutcome {
    pub node_text: String,
    pub options: Vec<DialogueOption>,
    pub ended: bool,
}

/// Choose `option_id` from the current node. Requirements are checked
/// before the action runs; an unmet requirement leaves the conversation
/// state untouched and reports `GameError::Precondition`.
pub fn select_option(
    session: &mut Session,
    catalog: &dyn Catalog,
    config: &EngineConfig,
    option_id: &str,
) -> GameResult<DialogueStepOutcome> {
    let ctx = session
        .dialogue
        .clone()
        .ok_or_else(|| GameError::Precondition("no conversation in progress".to_string()))?;
    let template = catalog
        .npc(&ctx.npc_id)
        .ok_or_else(|| GameError::NotFound(format!("unknown npc {}", ctx.npc_id)))?;
    let node = template
        .dialogue
        .get(&ctx.current_node)
        .ok_or_else(|| GameError::Internal("conversation points at a missing node".to_string()))?;
    let option = node
        .options
        .iter()
        .find(|o| o.id == option_id)
        .ok_or_else(|| GameError::InvalidAction(format!("no such option {option_id}")))?
        .clone();

    if !requirements_met(session, config, &option.requirements) {
        return Err(GameError::Precondition("dialogue option requirements not met".to_string()));
    }

    if let Some(action) = &option.action {
        run_action(session, catalog, config, action)?;
    }

    match &option.next_node {
        Some(next) => {
            let next_template_node = template
                .dialogue
                .get(next)
                .ok_or_else(|| GameError::Internal(format!("dialogue option points at missing node {next}")))?;
            let options = available_options(session, config, &next_template_node.options);
            session.dialogue = Some(DialogueContext {
                npc_id: ctx.npc_id,
                current_node: next.clone(),
            });
            Ok(DialogueStepOutcome {
                node_text: next_template_node.text.clone(),
                options,
                ended: false,
            })
        }
        None => {
            session.dialogue = None;
            Ok(DialogueStepOutcome {
                node_text: String::new(),
                options: Vec::new(),
                ended: true,
            })
        }
    }
}

/// `NativeToCity`/`VaultRegisteredHere`/`FirstTimeMeeting` are resolved once
/// by `start()` when it picks the greeting override; as option-level gates
/// they are treated as already satisfied by the fact the conversation is in
/// this node at all.
fn requirements_met(session: &Session, config: &EngineConfig, requirements: &[DialogueRequirement]) -> bool {
    requirements.iter().all(|req| match req {
        DialogueRequirement::HasGold(amount) => session.state.gold(&config.gold_item_id) >= *amount,
        DialogueRequirement::HasItem { item_id, quantity } => inventory::count_item(session, item_id) >= *quantity,
        DialogueRequirement::KnowsSpell(spell_id) => session.state.known_spells.contains(spell_id),
        DialogueRequirement::NativeToCity => true,
        DialogueRequirement::VaultRegisteredHere => true,
        DialogueRequirement::FirstTimeMeeting => true,
    })
}

fn current_building(session: &Session, catalog: &dyn Catalog) -> GameResult<core::ids::BuildingId> {
    let ctx = session
        .dialogue
        .as_ref()
        .ok_or_else(|| GameError::Internal("no conversation in progress".to_string()))?;
    let template = catalog
        .npc(&ctx.npc_id)
        .ok_or_else(|| GameError::NotFound("unknown npc".to_string()))?;
    template
        .schedule
        .first()
        .and_then(|e| e.location.building_id.clone())
        .ok_or_else(|| GameError::Internal("npc has no associated building".to_string()))
}

fn run_action(session: &mut Session, catalog: &dyn Catalog, config: &EngineConfig, action: &DialogueAction) -> GameResult<()> {
    match action {
        DialogueAction::RegisterStorage { cost } => {
            let building_id = current_building(session, catalog)?;
            if session.state.vaults.contains_key(&building_id) {
                return Err(GameError::Conflict("storage already registered here".to_string()));
            }
            inventory::remove_item(session, &config.gold_item_id, *cost)?;
            session.state.vaults.insert(building_id, core::types::Vault::empty());
            Ok(())
        }
        DialogueAction::OpenStorage | DialogueAction::OpenShop { .. } | DialogueAction::OpenSell { .. } => {
            // Pure UI-transition actions: the dispatcher inspects the
            // originating `DialogueAction` from the response and routes the
            // client accordingly. No session mutation here.
            Ok(())
        }
        DialogueAction::RentRoom { cost } => {
            let building_id = current_building(session, catalog)?;
            inventory::remove_item(session, &config.gold_item_id, *cost)?;
            let expires_at = session.state.clock.total_minutes() + core::types::Clock::MINUTES_PER_DAY as u64;
            session.rented_rooms.insert(
                building_id.clone(),
                crate::session::RentedRoom {
                    building_id,
                    expires_at_minute: expires_at,
                },
            );
            Ok(())
        }
        DialogueAction::BookShow => {
            // Which show is booked is a parameter the dispatcher supplies
            // separately (`ActionKind::BookShow`); the dialogue action here
            // only marks that booking is permitted from this node.
            Ok(())
        }
        DialogueAction::EndDialogue => {
            session.dialogue = None;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use core::types::{DialogueNode, GreetingOverride};

    use crate::testutil::fixtures::{bare_catalog, sample_session};

    use super::*;

    fn config() -> EngineConfig {
        EngineConfig::new(crate::testutil::fixtures::gold_item_id())
    }

    fn templated_npc() -> NpcTemplate {
        let mut dialogue = BTreeMap::new();
        dialogue.insert(
            "root".to_string(),
            DialogueNode {
                id: "root".to_string(),
                text: "Welcome, traveler.".to_string(),
                options: vec![
                    DialogueOption {
                        id: "browse".to_string(),
                        label: "Browse wares".to_string(),
                        requirements: vec![],
                        action: None,
                        next_node: None,
                    },
                    DialogueOption {
                        id: "register".to_string(),
                        label: "Register storage (50 gold)".to_string(),
                        requirements: vec![DialogueRequirement::HasGold(50)],
                        action: Some(DialogueAction::RegisterStorage { cost: 50 }),
                        next_node: None,
                    },
                ],
            },
        );
        NpcTemplate {
            id: core::ids::NpcId::new("shopkeeper"),
            name: "Shopkeeper".to_string(),
            schedule: vec![core::types::ScheduleEntry {
                start_minute: 0,
                end_minute: 1440,
                location: core::types::LocationRef { district_key: core::ids::DistrictKey::new("market"), building_id: Some(core::ids::BuildingId::new("shop")) },
                state: core::types::NpcActivityState::Working,
                available_dialogue_nodes: vec!["root".to_string()],
            }],
            dialogue_root: "root".to_string(),
            dialogue,
            greeting_override: Some(GreetingOverride { native_to_city: None, vault_registered_here: None, first_time: Some("Never seen you before.".to_string()) }),
            show_config: None,
        }
    }

    /// An option whose requirement is unmet is elided from the returned
    /// option list entirely, not merely disabled.
    #[test]
    fn unmet_requirement_option_is_elided_from_the_list() {
        let mut session = sample_session();
        let mut catalog = bare_catalog();
        let npc = templated_npc();
        catalog.npcs.insert(npc.id.clone(), npc.clone());

        let outcome = start(&mut session, &catalog, &config(), &npc.id, false).unwrap();

        assert_eq!(outcome.options.len(), 1);
        assert_eq!(outcome.options[0].id, "browse");
    }

    /// Once the player has enough gold, the gated option appears.
    #[test]
    fn gated_option_appears_once_requirement_is_met() {
        let mut session = sample_session();
        let mut catalog = bare_catalog();
        let npc = templated_npc();
        catalog.npcs.insert(npc.id.clone(), npc.clone());
        session.state.general_slots[0] = Some(core::types::Slot::new(crate::testutil::fixtures::gold_item_id(), 50));

        let outcome = start(&mut session, &catalog, &config(), &npc.id, false).unwrap();

        assert_eq!(outcome.options.len(), 2);
    }

    /// First-time meeting uses the greeting override, and meeting again does
    /// not repeat it.
    #[test]
    fn first_time_greeting_only_shows_once() {
        let mut session = sample_session();
        let mut catalog = bare_catalog();
        let npc = templated_npc();
        catalog.npcs.insert(npc.id.clone(), npc.clone());

        let first = start(&mut session, &catalog, &config(), &npc.id, false).unwrap();
        assert_eq!(first.node_text, "Never seen you before.");

        let second = start(&mut session, &catalog, &config(), &npc.id, false).unwrap();
        assert_eq!(second.node_text, "Welcome, traveler.");
    }

    /// Selecting an option whose requirement is no longer met is rejected
    /// and leaves the conversation state untouched.
    #[test]
    fn select_option_rejects_when_requirement_not_met() {
        let mut session = sample_session();
        let mut catalog = bare_catalog();
        let npc = templated_npc();
        catalog.npcs.insert(npc.id.clone(), npc.clone());
        start(&mut session, &catalog, &config(), &npc.id, false).unwrap();

        let err = select_option(&mut session, &catalog, &config(), "register").unwrap_err();
        assert!(matches!(err, GameError::Precondition(_)));
        assert!(session.dialogue.is_some());
    }
}

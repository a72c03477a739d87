//! C4: slot/equip/container transactions.
//!
//! Grounded on the teacher's `do_store_item`/`do_sort`/`do_give`
//! (`server/src/state/inventory.rs`): first-fit slot search, swap-on-occupied
//! semantics, and "update the mutated side, nothing else" discipline all
//! carry over. What changes is the slot model itself — the teacher's
//! `item: [u32; 40]` raw index array becomes a typed `Slot`/`Equipment`/
//! `Vault`, so capacity and stacking rules are expressed once instead of
//! re-derived from index-arithmetic at every call site.

use core::error::{GameError, GameResult};
use core::ids::BuildingId;
use core::types::{Catalog, EquipSlotKey, ItemId, Slot, Vault};

use crate::session::Session;

/// Where one item stack lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotRef {
    General(usize),
    Equipment(EquipSlotKey),
    BagContents(usize),
    Vault { building_id_index: usize, slot_index: usize },
}

fn take_slot(session: &mut Session, building_ids: &[BuildingId], at: SlotRef) -> GameResult<Option<Slot>> {
    match at {
        SlotRef::General(i) => {
            let slot = session
                .state
                .general_slots
                .get_mut(i)
                .ok_or_else(|| GameError::InvalidAction(format!("no such general slot {i}")))?;
            Ok(slot.take())
        }
        SlotRef::Equipment(key) => Ok(session.state.equipment.0.remove(&key)),
        SlotRef::BagContents(i) => {
            let bag = session
                .state
                .equipment
                .0
                .get_mut(&EquipSlotKey::Bag)
                .ok_or_else(|| GameError::Conflict("no bag equipped".to_string()))?;
            let contents = bag
                .contents
                .as_mut()
                .ok_or_else(|| GameError::Internal("equipped bag has no contents vec".to_string()))?;
            if i >= contents.len() {
                return Err(GameError::InvalidAction(format!("no such bag slot {i}")));
            }
            Ok(Some(contents.remove(i)))
        }
        SlotRef::Vault { building_id_index, slot_index } => {
            let building_id = building_ids
                .get(building_id_index)
                .ok_or_else(|| GameError::InvalidAction("no such vault".to_string()))?;
            let vault = session
                .state
                .vaults
                .get_mut(building_id)
                .ok_or_else(|| GameError::NotFound(format!("no vault registered at {building_id}")))?;
            let cell = vault
                .slots
                .get_mut(slot_index)
                .ok_or_else(|| GameError::InvalidAction(format!("no such vault slot {slot_index}")))?;
            Ok(cell.take())
        }
    }
}

fn place_slot(session: &mut Session, building_ids: &[BuildingId], at: SlotRef, slot: Slot) -> GameResult<()> {
    match at {
        SlotRef::General(i) => {
            let cell = session
                .state
                .general_slots
                .get_mut(i)
                .ok_or_else(|| GameError::InvalidAction(format!("no such general slot {i}")))?;
            if cell.is_some() {
                return Err(GameError::Conflict(format!("general slot {i} already occupied")));
            }
            *cell = Some(slot);
            Ok(())
        }
        SlotRef::Equipment(key) => {
            if session.state.equipment.0.contains_key(&key) {
                return Err(GameError::Conflict(format!("{key:?} already occupied")));
            }
            session.state.equipment.0.insert(key, slot);
            Ok(())
        }
        SlotRef::BagContents(i) => {
            let bag = session
                .state
                .equipment
                .0
                .get_mut(&EquipSlotKey::Bag)
                .ok_or_else(|| GameError::Conflict("no bag equipped".to_string()))?;
            let contents = bag
                .contents
                .get_or_insert_with(Vec::new);
            if i > contents.len() {
                return Err(GameError::InvalidAction(format!("no such bag slot {i}")));
            }
            contents.insert(i, slot);
            Ok(())
        }
        SlotRef::Vault { building_id_index, slot_index } => {
            let building_id = building_ids
                .get(building_id_index)
                .ok_or_else(|| GameError::InvalidAction("no such vault".to_string()))?;
            let vault = session
                .state
                .vaults
                .entry(building_id.clone())
                .or_insert_with(Vault::empty);
            let cell = vault
                .slots
                .get_mut(slot_index)
                .ok_or_else(|| GameError::InvalidAction(format!("no such vault slot {slot_index}")))?;
            if cell.is_some() {
                return Err(GameError::Conflict(format!("vault slot {slot_index} already occupied")));
            }
            *cell = Some(slot);
            Ok(())
        }
    }
}

/// Move (or swap) the stack at `from` to `to`. If `to` is occupied, the two
/// stacks trade places rather than merging — use `stack_into` to merge
/// compatible stacks.
pub fn move_slot(session: &mut Session, building_ids: &[BuildingId], from: SlotRef, to: SlotRef) -> GameResult<()> {
    let moving = take_slot(session, building_ids, from)?
        .ok_or_else(|| GameError::Conflict("source slot is empty".to_string()))?;

    match take_slot(session, building_ids, to)? {
        None => place_slot(session, building_ids, to, moving),
        Some(displaced) => {
            place_slot(session, building_ids, to, moving)?;
            place_slot(session, building_ids, from, displaced)
        }
    }
}

/// Merge `from` into `to` up to `to`'s item's stack limit, leaving the
/// remainder (if any) at `from`. Fails if the two slots hold different
/// items.
pub fn stack_into(session: &mut Session, catalog: &dyn Catalog, building_ids: &[BuildingId], from: SlotRef, to: SlotRef) -> GameResult<()> {
    let source = take_slot(session, building_ids, from)?
        .ok_or_else(|| GameError::Conflict("source slot is empty".to_string()))?;
    let mut target = match take_slot(session, building_ids, to)? {
        Some(t) => t,
        None => {
            place_slot(session, building_ids, from, source)?;
            return Err(GameError::Conflict("target slot is empty, nothing to stack onto".to_string()));
        }
    };

    if target.item_id != source.item_id {
        place_slot(session, building_ids, to, target)?;
        place_slot(session, building_ids, from, source)?;
        return Err(GameError::Conflict("stacks hold different items".to_string()));
    }

    let limit = catalog
        .item(&target.item_id)
        .map(|tpl| tpl.stack_limit)
        .unwrap_or(u32::MAX);
    let room = limit.saturating_sub(target.quantity);
    let moved = room.min(source.quantity);

    target.quantity += moved;
    place_slot(session, building_ids, to, target)?;

    let remainder = source.quantity - moved;
    if remainder > 0 {
        let mut leftover = source;
        leftover.quantity = remainder;
        place_slot(session, building_ids, from, leftover)?;
    }
    Ok(())
}

/// Split `quantity` units off `from` into the empty slot `to`.
pub fn split_stack(session: &mut Session, building_ids: &[BuildingId], from: SlotRef, quantity: u32, to: SlotRef) -> GameResult<()> {
    if quantity == 0 {
        return Err(GameError::InvalidAction("cannot split a quantity of zero".to_string()));
    }
    let mut source = take_slot(session, building_ids, from)?
        .ok_or_else(|| GameError::Conflict("source slot is empty".to_string()))?;
    if quantity >= source.quantity {
        place_slot(session, building_ids, from, source)?;
        return Err(GameError::InvalidAction(
            "split quantity must be less than the stack size".to_string(),
        ));
    }

    source.quantity -= quantity;
    let split_off = Slot::new(source.item_id.clone(), quantity);
    place_slot(session, building_ids, from, source)?;
    place_slot(session, building_ids, to, split_off)
}

fn first_free_general_slot(session: &Session) -> Option<usize> {
    session.state.general_slots.iter().position(|s| s.is_none())
}

/// Place a new stack of `item_id` into inventory: merge into existing
/// compatible stacks first, then fill empty slots, trying the equipped
/// bag's contents before general slots at each stage. True partial
/// success — whatever does not fit is simply left ungranted — so the
/// return value is the quantity actually placed, which may be less than
/// `quantity` or zero (§4.6).
pub fn add_item(session: &mut Session, catalog: &dyn Catalog, item_id: &ItemId, quantity: u32) -> GameResult<u32> {
    let template = catalog
        .item(item_id)
        .ok_or_else(|| GameError::NotFound(format!("unknown item {item_id}")))?;
    let limit = template.stack_limit.max(1);

    let mut remaining = quantity;
    let mut placed = 0u32;

    if let Some(bag) = session.state.equipment.0.get_mut(&EquipSlotKey::Bag) {
        if let Some(contents) = &mut bag.contents {
            for slot in contents.iter_mut() {
                if remaining == 0 {
                    break;
                }
                if &slot.item_id == item_id && slot.quantity < limit {
                    let take = (limit - slot.quantity).min(remaining);
                    slot.quantity += take;
                    remaining -= take;
                    placed += take;
                }
            }
        }
    }

    for slot in session.state.general_slots.iter_mut() {
        if remaining == 0 {
            break;
        }
        if let Some(s) = slot {
            if &s.item_id == item_id && s.quantity < limit {
                let take = (limit - s.quantity).min(remaining);
                s.quantity += take;
                remaining -= take;
                placed += take;
            }
        }
    }

    if remaining > 0 {
        if let Some(bag) = session.state.equipment.0.get_mut(&EquipSlotKey::Bag) {
            let capacity = catalog
                .item(&bag.item_id)
                .and_then(|tpl| tpl.tags.iter().find_map(|t| t.strip_prefix("capacity:").and_then(|n| n.parse::<usize>().ok())))
                .unwrap_or(20);
            let contents = bag.contents.get_or_insert_with(Vec::new);
            while remaining > 0 && contents.len() < capacity {
                let take = remaining.min(limit);
                contents.push(Slot::new(item_id.clone(), take));
                remaining -= take;
                placed += take;
            }
        }
    }

    for slot in session.state.general_slots.iter_mut() {
        if remaining == 0 {
            break;
        }
        if slot.is_none() {
            let take = remaining.min(limit);
            *slot = Some(Slot::new(item_id.clone(), take));
            remaining -= take;
            placed += take;
        }
    }

    Ok(placed)
}

/// Remove up to `quantity` units of `item_id` from general slots and the
/// equipped bag's contents, draining partial stacks before clearing whole
/// ones. Returns `GameError::Conflict` (leaving state untouched) if the
/// player does not hold enough.
pub fn remove_item(session: &mut Session, item_id: &ItemId, quantity: u32) -> GameResult<()> {
    let available = count_item(session, item_id);
    if available < quantity {
        return Err(GameError::Conflict(format!(
            "not enough {item_id} to remove: have {available}, need {quantity}"
        )));
    }

    let mut remaining = quantity;
    for slot in session.state.general_slots.iter_mut() {
        if remaining == 0 {
            break;
        }
        if let Some(s) = slot {
            if &s.item_id == item_id {
                let take = s.quantity.min(remaining);
                s.quantity -= take;
                remaining -= take;
                if s.quantity == 0 {
                    *slot = None;
                }
            }
        }
    }

    if remaining > 0 {
        if let Some(bag) = session.state.equipment.0.get_mut(&EquipSlotKey::Bag) {
            if let Some(contents) = &mut bag.contents {
                contents.retain_mut(|s| {
                    if remaining == 0 || &s.item_id != item_id {
                        return true;
                    }
                    let take = s.quantity.min(remaining);
                    s.quantity -= take;
                    remaining -= take;
                    s.quantity > 0
                });
            }
        }
    }

    Ok(())
}

pub fn count_item(session: &Session, item_id: &ItemId) -> u32 {
    let mut total = 0u32;
    for slot in session.state.general_slots.iter().flatten() {
        if &slot.item_id == item_id {
            total += slot.quantity;
        }
    }
    for slot in session.state.equipment.0.values() {
        if &slot.item_id == item_id {
            total += slot.quantity;
        }
        if let Some(contents) = &slot.contents {
            for inner in contents {
                if &inner.item_id == item_id {
                    total += inner.quantity;
                }
            }
        }
    }
    total
}

/// Equip the item in general slot `from`. `GearSlot::Hands` resolves to
/// whichever hand is free, or to both hands for a two-handed item.
/// Occupied target slots are not rejected: the current occupant(s) are
/// displaced back into `from` (the one slot equipping frees up) and, if
/// there is more than one, into the next free general or backpack slots.
/// The whole operation is checked for enough displacement room up front
/// and fails with zero mutation if there is not (§8 "equip over full
/// hands").
pub fn equip_item(session: &mut Session, catalog: &dyn Catalog, from: usize) -> GameResult<()> {
    let slot = session
        .state
        .general_slots
        .get(from)
        .and_then(|s| s.as_ref())
        .ok_or_else(|| GameError::Conflict("no item in that slot".to_string()))?;
    let template = catalog
        .item(&slot.item_id)
        .ok_or_else(|| GameError::NotFound(format!("unknown item {}", slot.item_id)))?;
    let gear_slot = template
        .gear_slot
        .ok_or_else(|| GameError::Conflict("this item cannot be equipped".to_string()))?;
    let two_handed = template.is_two_handed();

    use core::types::GearSlot;
    let keys: Vec<EquipSlotKey> = match gear_slot {
        GearSlot::Hands if two_handed => vec![EquipSlotKey::LeftArm, EquipSlotKey::RightArm],
        GearSlot::Hands => {
            if !session.state.equipment.is_occupied(EquipSlotKey::RightArm) {
                vec![EquipSlotKey::RightArm]
            } else if !session.state.equipment.is_occupied(EquipSlotKey::LeftArm) {
                vec![EquipSlotKey::LeftArm]
            } else {
                vec![EquipSlotKey::RightArm]
            }
        }
        GearSlot::Armor => vec![EquipSlotKey::Armor],
        GearSlot::Necklace => vec![EquipSlotKey::Necklace],
        GearSlot::Ring => vec![EquipSlotKey::Ring],
        GearSlot::Ammunition => vec![EquipSlotKey::Ammunition],
        GearSlot::Clothes => vec![EquipSlotKey::Clothes],
        GearSlot::Bag => vec![EquipSlotKey::Bag],
    };

    let occupied_count = keys.iter().filter(|k| session.state.equipment.is_occupied(**k)).count();
    if occupied_count > 1 {
        let free_general = session.state.general_slots.iter().filter(|s| s.is_none()).count();
        let free_bag = bag_free_slots(session, catalog);
        if occupied_count - 1 > free_general + free_bag {
            return Err(GameError::Conflict("not enough room to displace the currently equipped gear".to_string()));
        }
    }

    let moving = session.state.general_slots[from].take().expect("checked occupied above");

    let mut displaced = Vec::new();
    for key in &keys {
        if let Some(prev) = session.state.equipment.0.remove(key) {
            displaced.push(prev);
        }
    }
    for key in keys {
        session.state.equipment.0.insert(key, moving.clone());
    }

    let mut displaced = displaced.into_iter();
    if let Some(first) = displaced.next() {
        session.state.general_slots[from] = Some(first);
    }
    for item in displaced {
        if let Some(idx) = first_free_general_slot(session) {
            session.state.general_slots[idx] = Some(item);
        } else {
            stash_in_bag(session, item);
        }
    }

    Ok(())
}

fn bag_capacity(session: &Session, catalog: &dyn Catalog) -> usize {
    session
        .state
        .equipment
        .0
        .get(&EquipSlotKey::Bag)
        .and_then(|bag| catalog.item(&bag.item_id))
        .and_then(|tpl| tpl.tags.iter().find_map(|t| t.strip_prefix("capacity:").and_then(|n| n.parse::<usize>().ok())))
        .unwrap_or(20)
}

fn bag_free_slots(session: &Session, catalog: &dyn Catalog) -> usize {
    let Some(bag) = session.state.equipment.0.get(&EquipSlotKey::Bag) else {
        return 0;
    };
    let used = bag.contents.as_ref().map(|c| c.len()).unwrap_or(0);
    bag_capacity(session, catalog).saturating_sub(used)
}

fn stash_in_bag(session: &mut Session, item: Slot) {
    if let Some(bag) = session.state.equipment.0.get_mut(&EquipSlotKey::Bag) {
        bag.contents.get_or_insert_with(Vec::new).push(item);
    }
}

/// Unequip whatever is in `key` into the first free general slot. Clears
/// the mirrored hand too if `key` holds half of a two-handed weapon.
pub fn unequip_item(session: &mut Session, key: EquipSlotKey) -> GameResult<()> {
    let slot = session
        .state
        .equipment
        .0
        .get(&key)
        .cloned()
        .ok_or_else(|| GameError::Conflict(format!("{key:?} is empty")))?;

    let free = first_free_general_slot(session)
        .ok_or_else(|| GameError::Conflict("no free general slot to unequip into".to_string()))?;

    let mirror = match key {
        EquipSlotKey::LeftArm => Some(EquipSlotKey::RightArm),
        EquipSlotKey::RightArm => Some(EquipSlotKey::LeftArm),
        _ => None,
    };
    let is_two_handed_pair = mirror
        .and_then(|m| session.state.equipment.0.get(&m))
        .map(|other| other.item_id == slot.item_id && other.quantity == slot.quantity)
        .unwrap_or(false);

    session.state.equipment.0.remove(&key);
    session.state.general_slots[free] = Some(slot);

    if is_two_handed_pair {
        if let Some(mirror) = mirror {
            session.state.equipment.0.remove(&mirror);
        }
    }
    Ok(())
}

/// Where a container item itself lives — `spec.md` §4.6: "the target
/// container must be in general slots or the bag-equipment slot".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContainerLocator {
    General(usize),
    Equipment(EquipSlotKey),
}

fn container_slot_ref(session: &Session, at: ContainerLocator) -> GameResult<&Slot> {
    match at {
        ContainerLocator::General(i) => session
            .state
            .general_slots
            .get(i)
            .and_then(|s| s.as_ref())
            .ok_or_else(|| GameError::Conflict("no item in that slot".to_string())),
        ContainerLocator::Equipment(key) => session
            .state
            .equipment
            .0
            .get(&key)
            .ok_or_else(|| GameError::Conflict(format!("{key:?} is empty"))),
    }
}

fn container_slot_mut(session: &mut Session, at: ContainerLocator) -> GameResult<&mut Slot> {
    match at {
        ContainerLocator::General(i) => session
            .state
            .general_slots
            .get_mut(i)
            .ok_or_else(|| GameError::InvalidAction(format!("no such general slot {i}")))?
            .as_mut()
            .ok_or_else(|| GameError::Conflict("no item in that slot".to_string())),
        ContainerLocator::Equipment(key) => session
            .state
            .equipment
            .0
            .get_mut(&key)
            .ok_or_else(|| GameError::Conflict(format!("{key:?} is empty"))),
    }
}

/// Move a stack from general slot `item_from` into the container sitting
/// at `container` (either another general slot or the equipped bag), at
/// position `container_slot_index`. Fails if the item being stowed is
/// itself a container (`spec.md` §4.6 no-nesting rule), if `container`
/// does not hold a container-tagged item, or if the container is full.
pub fn add_to_container(
    session: &mut Session,
    catalog: &dyn Catalog,
    item_from: usize,
    container: ContainerLocator,
    container_slot_index: usize,
) -> GameResult<()> {
    let item_slot = session
        .state
        .general_slots
        .get(item_from)
        .and_then(|s| s.as_ref())
        .ok_or_else(|| GameError::Conflict("no item in that slot".to_string()))?;
    if catalog.item(&item_slot.item_id).map(|t| t.is_container()).unwrap_or(false) {
        return Err(GameError::Conflict("a container cannot be placed inside another container".to_string()));
    }

    let container_item_id = container_slot_ref(session, container)?.item_id.clone();
    let container_template = catalog
        .item(&container_item_id)
        .ok_or_else(|| GameError::Internal("container has no catalog entry".to_string()))?;
    if !container_template.is_container() {
        return Err(GameError::Conflict("target is not a container".to_string()));
    }
    let capacity = container_template
        .tags
        .iter()
        .find_map(|t| t.strip_prefix("capacity:").and_then(|n| n.parse::<usize>().ok()))
        .unwrap_or(20);

    let current_len = container_slot_ref(session, container)?.contents.as_ref().map(|c| c.len()).unwrap_or(0);
    if container_slot_index > current_len || current_len >= capacity {
        return Err(GameError::Conflict("the container is full".to_string()));
    }

    let moving = session.state.general_slots[item_from].take().expect("checked occupied above");
    let target = container_slot_mut(session, container).expect("checked present above");
    target.contents.get_or_insert_with(Vec::new).insert(container_slot_index, moving);
    Ok(())
}

/// Move the stack at position `container_slot_index` inside `container`
/// back out into general slot `destination`, symmetric to
/// [`add_to_container`].
pub fn remove_from_container(
    session: &mut Session,
    container: ContainerLocator,
    container_slot_index: usize,
    destination: usize,
) -> GameResult<()> {
    let dest_cell = session
        .state
        .general_slots
        .get(destination)
        .ok_or_else(|| GameError::InvalidAction(format!("no such general slot {destination}")))?;
    if dest_cell.is_some() {
        return Err(GameError::Conflict("destination slot is occupied".to_string()));
    }

    let contents_len = container_slot_ref(session, container)?.contents.as_ref().map(|c| c.len()).unwrap_or(0);
    if container_slot_index >= contents_len {
        return Err(GameError::InvalidAction(format!("no such container slot {container_slot_index}")));
    }

    let target = container_slot_mut(session, container).expect("checked present above");
    let contents = target.contents.as_mut().expect("checked non-empty above");
    let moving = contents.remove(container_slot_index);
    session.state.general_slots[destination] = Some(moving);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use core::types::GearSlot;

    use crate::testutil::fixtures::{bare_catalog, sample_session, weapon_template};

    use super::*;

    fn bag_template(id: &str, capacity: usize) -> core::types::ItemTemplate {
        let mut tags = HashSet::new();
        tags.insert("container".to_string());
        tags.insert(format!("capacity:{capacity}"));
        core::types::ItemTemplate {
            id: ItemId::new(id),
            name: "Satchel".to_string(),
            item_type: "container".to_string(),
            base_value: 5,
            stack_limit: 1,
            gear_slot: Some(GearSlot::Bag),
            tags,
            effects: Vec::new(),
            contents: None,
        }
    }

    /// A two-handed weapon occupies both arms on equip and clears both on
    /// unequip, mirroring the other arm's slot rather than leaving it behind.
    #[test]
    fn two_handed_weapon_occupies_and_clears_both_arms() {
        let mut session = sample_session();
        let mut catalog = bare_catalog();
        let greatsword = weapon_template("greatsword", true);
        catalog.items.insert(greatsword.id.clone(), greatsword.clone());
        session.state.general_slots[0] = Some(Slot::new(greatsword.id.clone(), 1));

        equip_item(&mut session, &catalog, 0).unwrap();
        assert!(session.state.equipment.is_occupied(EquipSlotKey::LeftArm));
        assert!(session.state.equipment.is_occupied(EquipSlotKey::RightArm));

        unequip_item(&mut session, EquipSlotKey::RightArm).unwrap();
        assert!(!session.state.equipment.is_occupied(EquipSlotKey::LeftArm));
        assert!(!session.state.equipment.is_occupied(EquipSlotKey::RightArm));
        assert_eq!(session.state.general_slots[0].as_ref().unwrap().item_id, greatsword.id);
    }

    /// Equipping a one-handed item fills the right hand first, then the
    /// left; a third attempt swaps with whatever is currently in the right
    /// hand rather than failing.
    #[test]
    fn one_handed_weapon_fills_right_then_left_hand() {
        let mut session = sample_session();
        let mut catalog = bare_catalog();
        let dagger = weapon_template("dagger", false);
        catalog.items.insert(dagger.id.clone(), dagger.clone());
        session.state.general_slots[0] = Some(Slot::new(dagger.id.clone(), 1));
        session.state.general_slots[1] = Some(Slot::new(dagger.id.clone(), 1));
        session.state.general_slots[2] = Some(Slot::new(dagger.id.clone(), 1));

        equip_item(&mut session, &catalog, 0).unwrap();
        assert!(session.state.equipment.is_occupied(EquipSlotKey::RightArm));
        equip_item(&mut session, &catalog, 1).unwrap();
        assert!(session.state.equipment.is_occupied(EquipSlotKey::LeftArm));

        equip_item(&mut session, &catalog, 2).unwrap();
        assert!(session.state.equipment.is_occupied(EquipSlotKey::RightArm));
        assert_eq!(session.state.general_slots[2].as_ref().unwrap().item_id, dagger.id, "the displaced right-hand dagger returns to the slot that was just vacated");
    }

    /// §8 "equip over full hands": a two-handed weapon equipped over two
    /// occupied one-handed slots swaps both out when there is room for the
    /// overflow displaced item.
    #[test]
    fn equip_two_handed_over_full_hands_swaps_when_room_exists() {
        let mut session = sample_session();
        let mut catalog = bare_catalog();
        let dagger = weapon_template("dagger", false);
        let greatsword = weapon_template("greatsword", true);
        catalog.items.insert(dagger.id.clone(), dagger.clone());
        catalog.items.insert(greatsword.id.clone(), greatsword.clone());
        session.state.equipment.0.insert(EquipSlotKey::RightArm, Slot::new(dagger.id.clone(), 1));
        session.state.equipment.0.insert(EquipSlotKey::LeftArm, Slot::new(dagger.id.clone(), 1));
        session.state.general_slots[0] = Some(Slot::new(greatsword.id.clone(), 1));

        equip_item(&mut session, &catalog, 0).unwrap();

        assert!(session.state.equipment.is_occupied(EquipSlotKey::LeftArm));
        assert!(session.state.equipment.is_occupied(EquipSlotKey::RightArm));
        assert_eq!(session.state.general_slots[0].as_ref().unwrap().item_id, dagger.id, "one displaced dagger returns to the slot the greatsword vacated");
        assert_eq!(session.state.general_slots[1].as_ref().unwrap().item_id, dagger.id, "the other displaced dagger lands in the next free general slot");
    }

    /// §8 "equip over full hands": the same swap fails outright, with zero
    /// mutation, if there is nowhere for the overflow displaced item to go.
    #[test]
    fn equip_two_handed_over_full_hands_fails_atomically_when_no_room_to_displace() {
        let mut session = sample_session();
        let mut catalog = bare_catalog();
        let dagger = weapon_template("dagger", false);
        let greatsword = weapon_template("greatsword", true);
        catalog.items.insert(dagger.id.clone(), dagger.clone());
        catalog.items.insert(greatsword.id.clone(), greatsword.clone());
        session.state.equipment.0.insert(EquipSlotKey::RightArm, Slot::new(dagger.id.clone(), 1));
        session.state.equipment.0.insert(EquipSlotKey::LeftArm, Slot::new(dagger.id.clone(), 1));
        session.state.general_slots[0] = Some(Slot::new(greatsword.id.clone(), 1));
        for slot in session.state.general_slots.iter_mut().skip(1) {
            *slot = Some(Slot::new(ItemId::new("rock"), 1));
        }

        let err = equip_item(&mut session, &catalog, 0).unwrap_err();

        assert!(matches!(err, GameError::Conflict(_)));
        assert_eq!(session.state.general_slots[0].as_ref().unwrap().item_id, greatsword.id, "the greatsword must stay put on failure");
        assert!(session.state.equipment.is_occupied(EquipSlotKey::RightArm));
        assert!(session.state.equipment.is_occupied(EquipSlotKey::LeftArm));
    }

    /// `add_item` is a true partial success: whatever does not fit is left
    /// ungranted rather than rejecting the whole request, and the quantity
    /// actually placed is reported back.
    #[test]
    fn add_item_places_partially_when_it_cannot_fully_fit() {
        let mut session = sample_session();
        let catalog = bare_catalog();
        let gold_id = catalog.items.keys().next().unwrap().clone();

        // Leave exactly one general slot free.
        let filler = ItemId::new("rock");
        for slot in session.state.general_slots.iter_mut().skip(1) {
            *slot = Some(Slot::new(filler.clone(), 1));
        }

        let placed = add_item(&mut session, &catalog, &gold_id, 50).unwrap();
        assert_eq!(placed, 50);
        assert_eq!(count_item(&session, &gold_id), 50);

        let placed_again = add_item(&mut session, &catalog, &gold_id, 50).unwrap();
        assert_eq!(placed_again, 0, "every general slot is now occupied and there is no bag");
        assert_eq!(count_item(&session, &gold_id), 50);
    }

    /// Backpack contents are filled before general slots, both when
    /// merging into an existing stack and when starting a new one.
    #[test]
    fn add_item_fills_the_backpack_before_general_slots() {
        let mut session = sample_session();
        let mut catalog = bare_catalog();
        let bag = bag_template("satchel", 20);
        catalog.items.insert(bag.id.clone(), bag.clone());
        session.state.equipment.0.insert(EquipSlotKey::Bag, Slot::new(bag.id.clone(), 1));
        let gold_id = catalog.items.keys().find(|id| id.as_str() != bag.id.as_str()).unwrap().clone();

        let placed = add_item(&mut session, &catalog, &gold_id, 10).unwrap();
        assert_eq!(placed, 10);
        let bag_slot = session.state.equipment.0.get(&EquipSlotKey::Bag).unwrap();
        assert_eq!(bag_slot.contents.as_ref().unwrap()[0].quantity, 10);
        assert!(session.state.general_slots.iter().all(|s| s.is_none()));
    }

    /// Splitting a stack and then stacking the split-off piece back together
    /// restores the original quantity.
    #[test]
    fn split_then_stack_back_round_trips_quantity() {
        let mut session = sample_session();
        let catalog = bare_catalog();
        let gold_id = catalog.items.keys().next().unwrap().clone();
        session.state.general_slots[0] = Some(Slot::new(gold_id.clone(), 10));

        split_stack(&mut session, &[], SlotRef::General(0), 4, SlotRef::General(1)).unwrap();
        assert_eq!(session.state.general_slots[0].as_ref().unwrap().quantity, 6);
        assert_eq!(session.state.general_slots[1].as_ref().unwrap().quantity, 4);

        stack_into(&mut session, &catalog, &[], SlotRef::General(1), SlotRef::General(0)).unwrap();
        assert_eq!(session.state.general_slots[0].as_ref().unwrap().quantity, 10);
        assert!(session.state.general_slots[1].is_none());
    }

    /// A container item may not be placed inside another container.
    #[test]
    fn add_to_container_rejects_nesting_a_container() {
        let mut session = sample_session();
        let mut catalog = bare_catalog();
        let bag = bag_template("satchel", 20);
        let inner_bag = bag_template("coin-purse", 20);
        catalog.items.insert(bag.id.clone(), bag.clone());
        session.state.equipment.0.insert(EquipSlotKey::Bag, Slot::new(bag.id.clone(), 1));
        session.state.general_slots[0] = Some(Slot::new(inner_bag.id.clone(), 1));

        let err = add_to_container(&mut session, &catalog, 0, ContainerLocator::Equipment(EquipSlotKey::Bag), 0).unwrap_err();
        assert!(matches!(err, GameError::Conflict(_)));
    }

    /// A bag at its declared `capacity:N` tag refuses a further item.
    #[test]
    fn add_to_container_rejects_when_bag_is_full() {
        let mut session = sample_session();
        let mut catalog = bare_catalog();
        let bag = bag_template("satchel", 1);
        let trinket = weapon_template("trinket", false);
        catalog.items.insert(bag.id.clone(), bag.clone());
        catalog.items.insert(trinket.id.clone(), trinket.clone());
        session.state.equipment.0.insert(EquipSlotKey::Bag, Slot::new(bag.id.clone(), 1));
        session.state.general_slots[0] = Some(Slot::new(trinket.id.clone(), 1));
        session.state.general_slots[1] = Some(Slot::new(trinket.id.clone(), 1));

        add_to_container(&mut session, &catalog, 0, ContainerLocator::Equipment(EquipSlotKey::Bag), 0).unwrap();
        let err = add_to_container(&mut session, &catalog, 1, ContainerLocator::Equipment(EquipSlotKey::Bag), 1).unwrap_err();
        assert!(matches!(err, GameError::Conflict(_)));
    }

    /// A container sitting unequipped in a general slot is a valid target
    /// too, not only the equipped bag.
    #[test]
    fn add_to_container_accepts_an_unequipped_container_in_a_general_slot() {
        let mut session = sample_session();
        let mut catalog = bare_catalog();
        let satchel = bag_template("satchel", 5);
        let trinket = weapon_template("trinket", false);
        catalog.items.insert(satchel.id.clone(), satchel.clone());
        catalog.items.insert(trinket.id.clone(), trinket.clone());
        session.state.general_slots[0] = Some(Slot::new(satchel.id.clone(), 1));
        session.state.general_slots[1] = Some(Slot::new(trinket.id.clone(), 1));

        add_to_container(&mut session, &catalog, 1, ContainerLocator::General(0), 0).unwrap();

        let satchel_slot = session.state.general_slots[0].as_ref().unwrap();
        assert_eq!(satchel_slot.contents.as_ref().unwrap()[0].item_id, trinket.id);
        assert!(session.state.general_slots[1].is_none());
    }

    /// `remove_from_container` is symmetric with `add_to_container`: the
    /// item comes back out into the named destination slot.
    #[test]
    fn remove_from_container_returns_the_item_to_the_destination_slot() {
        let mut session = sample_session();
        let mut catalog = bare_catalog();
        let bag = bag_template("satchel", 5);
        let trinket = weapon_template("trinket", false);
        catalog.items.insert(bag.id.clone(), bag.clone());
        catalog.items.insert(trinket.id.clone(), trinket.clone());
        session.state.equipment.0.insert(EquipSlotKey::Bag, Slot::new(bag.id.clone(), 1));
        session.state.general_slots[0] = Some(Slot::new(trinket.id.clone(), 1));

        add_to_container(&mut session, &catalog, 0, ContainerLocator::Equipment(EquipSlotKey::Bag), 0).unwrap();
        remove_from_container(&mut session, ContainerLocator::Equipment(EquipSlotKey::Bag), 0, 2).unwrap();

        assert_eq!(session.state.general_slots[2].as_ref().unwrap().item_id, trinket.id);
        let bag_slot = session.state.equipment.0.get(&EquipSlotKey::Bag).unwrap();
        assert!(bag_slot.contents.as_ref().unwrap().is_empty());
    }

    /// `remove_item` drains general slots first, then the equipped bag's
    /// contents, never leaving a negative or phantom remainder.
    #[test]
    fn remove_item_drains_general_slots_before_bag_contents() {
        let mut session = sample_session();
        let catalog = bare_catalog();
        let gold_id = catalog.items.keys().next().unwrap().clone();
        session.state.general_slots[0] = Some(Slot::new(gold_id.clone(), 3));
        let mut bag = Slot::new(ItemId::new("satchel"), 1);
        bag.contents = Some(vec![Slot::new(gold_id.clone(), 5)]);
        session.state.equipment.0.insert(EquipSlotKey::Bag, bag);

        remove_item(&mut session, &gold_id, 6).unwrap();
        assert_eq!(count_item(&session, &gold_id), 2);
        assert!(session.state.general_slots[0].is_none());
    }
}

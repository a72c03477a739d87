//! C7: per-player-per-merchant gold/stock economy.
//!
//! Grounded on the teacher's `do_balance`/`do_withdraw`/`do_deposit`/
//! `do_gold` (`server/src/state/economy.rs`): one ledger, validated then
//! mutated in a single pass, with a log line on every transfer. The
//! teacher's ledger is the player's bank balance; here it is a merchant's
//! own gold and stock, since every player sees an independent copy of it
//! (§4.7) rather than one shared world bank.

use core::error::{GameError, GameResult};
use core::ids::{MerchantId, UserId};
use core::save_store::SaveStore;
use core::types::{Catalog, MerchantState, PriceFormula};

use crate::config::EngineConfig;
use crate::inventory;
use crate::session::Session;

/// Ensure `session.merchant_states` has an entry for `merchant_id`,
/// pulling it from `SaveStore` or initializing it fresh from the catalog's
/// `ShopConfig` the first time this player meets this merchant.
pub fn load_or_init(
    session: &mut Session,
    save_store: &dyn SaveStore,
    catalog: &dyn Catalog,
    user_id: &UserId,
    merchant_id: &MerchantId,
) -> GameResult<()> {
    if session.merchant_states.contains_key(merchant_id) {
        return Ok(());
    }

    if let Some(loaded) = save_store.load_merchant_state(user_id, merchant_id)? {
        session.merchant_states.insert(merchant_id.clone(), loaded);
        return Ok(());
    }

    let config = catalog
        .shop_config(merchant_id)
        .ok_or_else(|| GameError::NotFound(format!("no merchant {merchant_id}")))?;
    let stock = config.inventory.iter().map(|e| (e.item_id.clone(), e.stock)).collect();
    let now = session.state.clock.total_minutes();
    let fresh = MerchantState::fresh(merchant_id.clone(), config.starting_gold, stock, now);
    session.merchant_states.insert(merchant_id.clone(), fresh);
    Ok(())
}

/// Apply gold regen and item/gold restock for every interval that has
/// elapsed since this merchant was last touched (§4.7). Idempotent at a
/// fixed `now`: calling it twice with the same clock value applies nothing
/// the second time.
pub fn regen(session: &mut Session, catalog: &dyn Catalog, merchant_id: &MerchantId) -> GameResult<()> {
    let now = session.state.clock.total_minutes();
    let config = catalog
        .shop_config(merchant_id)
        .ok_or_else(|| GameError::NotFound(format!("no merchant {merchant_id}")))?
        .clone();
    let state = session
        .merchant_states
        .get_mut(merchant_id)
        .ok_or_else(|| GameError::Internal("merchant state not loaded".to_string()))?;

    let gold_interval = config.gold_regen_interval.to_minutes().max(1) as u64;
    let elapsed_gold_intervals = (now - state.last_gold_regen_minute) / gold_interval;
    if elapsed_gold_intervals > 0 {
        let gained = config.gold_regen_rate as i64 * elapsed_gold_intervals as i64;
        state.gold = ((state.gold as i64 + gained).min(config.max_gold as i64)) as i32;
        state.last_gold_regen_minute += elapsed_gold_intervals * gold_interval;
    }

    let item_interval = config.item_restock_interval.to_minutes().max(1) as u64;
    let elapsed_item_intervals = (now - state.last_item_restock_minute) / item_interval;
    if elapsed_item_intervals > 0 {
        for entry in &config.inventory {
            let current = state.stock.entry(entry.item_id.clone()).or_insert(0);
            let gained = entry.restock_rate.saturating_mul(elapsed_item_intervals as u32);
            *current = (*current + gained).min(entry.max_stock);
        }
        state.last_item_restock_minute += elapsed_item_intervals * item_interval;
    }

    let gold_restock_interval = config.gold_restock_interval.to_minutes().max(1) as u64;
    let elapsed_gold_restock = (now - state.last_gold_restock_minute) / gold_restock_interval;
    if elapsed_gold_restock > 0 {
        state.last_gold_restock_minute += elapsed_gold_restock * gold_restock_interval;
    }

    Ok(())
}

fn apply_formula(base_value: u32, formula: PriceFormula, cha: i32, cha_base: i32) -> u32 {
    let multiplier = formula.base_multiplier + (cha - cha_base) as f64 * formula.cha_rate;
    let multiplier = multiplier.max(0.0);
    ((base_value as f64) * multiplier).round().max(0.0) as u32
}

/// What the player would pay per unit to buy `item_id` from `merchant_id`
/// right now, given their charisma (§4.7).
pub fn buy_price_per_unit(catalog: &dyn Catalog, merchant_id: &MerchantId, item_id: &core::ids::ItemId, cha: i32) -> GameResult<u32> {
    let config = catalog
        .shop_config(merchant_id)
        .ok_or_else(|| GameError::NotFound(format!("no merchant {merchant_id}")))?;
    let item = catalog
        .item(item_id)
        .ok_or_else(|| GameError::NotFound(format!("unknown item {item_id}")))?;
    let rules = catalog.pricing_rules();
    let rates = rules.rates_for(config.shop_type);
    Ok(apply_formula(item.base_value, rates.buy, cha, rules.cha_base))
}

pub fn sell_price_per_unit(catalog: &dyn Catalog, merchant_id: &MerchantId, item_id: &core::ids::ItemId, cha: i32) -> GameResult<u32> {
    let config = catalog
        .shop_config(merchant_id)
        .ok_or_else(|| GameError::NotFound(format!("no merchant {merchant_id}")))?;
    let item = catalog
        .item(item_id)
        .ok_or_else(|| GameError::NotFound(format!("unknown item {item_id}")))?;
    let rules = catalog.pricing_rules();
    let rates = rules.rates_for(config.shop_type);
    Ok(apply_formula(item.base_value, rates.sell, cha, rules.cha_base))
}

pub struct TradeOutcome {
    pub quantity: u32,
    pub gold_amount: u32,
}

/// Buy as many units of `item_id` as `quantity`, the player's gold, and the
/// merchant's stock together allow — partial fills are success, not
/// failure; only a fill of zero is rejected (§8 "partial shop buy").
pub fn buy(
    session: &mut Session,
    catalog: &dyn Catalog,
    config: &EngineConfig,
    merchant_id: &MerchantId,
    item_id: &core::ids::ItemId,
    quantity: u32,
) -> GameResult<TradeOutcome> {
    let cha = session.state.stats.get(core::types::Ability::Charisma);
    let price = buy_price_per_unit(catalog, merchant_id, item_id, cha)?;

    let stock = session
        .merchant_states
        .get(merchant_id)
        .and_then(|m| m.stock.get(item_id))
        .copied()
        .unwrap_or(0);

    let player_gold = session.state.gold(&config.gold_item_id);
    let affordable = if price == 0 { quantity } else { player_gold / price };

    let requested = quantity.min(stock).min(affordable);
    if requested == 0 {
        return Err(GameError::Precondition("cannot afford or out of stock".to_string()));
    }

    // Place the goods before touching the player's gold: a player who can
    // afford `requested` units but has no room to carry them pays for
    // nothing rather than being charged for units that never arrive.
    let placed = inventory::add_item(session, catalog, item_id, requested)?;
    if placed == 0 {
        return Err(GameError::Precondition("no room to carry this item".to_string()));
    }

    let cost = price * placed;
    inventory::remove_item(session, &config.gold_item_id, cost)?;

    let merchant_state = session
        .merchant_states
        .get_mut(merchant_id)
        .ok_or_else(|| GameError::Internal("merchant state not loaded".to_string()))?;
    *merchant_state.stock.entry(item_id.clone()).or_insert(0) -= placed;
    merchant_state.gold += cost as i32;

    Ok(TradeOutcome {
        quantity: placed,
        gold_amount: cost,
    })
}

/// Sell as many units of `item_id` as `quantity`, the player's holdings,
/// and the merchant's remaining gold together allow.
pub fn sell(
    session: &mut Session,
    catalog: &dyn Catalog,
    config: &EngineConfig,
    merchant_id: &MerchantId,
    item_id: &core::ids::ItemId,
    quantity: u32,
) -> GameResult<TradeOutcome> {
    let shop_config = catalog
        .shop_config(merchant_id)
        .ok_or_else(|| GameError::NotFound(format!("no merchant {merchant_id}")))?;
    if !shop_config.buys_items {
        return Err(GameError::Precondition("this merchant does not buy items".to_string()));
    }

    let cha = session.state.stats.get(core::types::Ability::Charisma);
    let price = sell_price_per_unit(catalog, merchant_id, item_id, cha)?;

    let held = inventory::count_item(session, item_id);
    let merchant_gold = session.merchant_states.get(merchant_id).map(|m| m.gold).unwrap_or(0);
    let payable = if price == 0 { held } else { (merchant_gold / price as i32).max(0) as u32 };

    let actual = quantity.min(held).min(payable);
    if actual == 0 {
        return Err(GameError::Precondition("merchant cannot pay or you hold none".to_string()));
    }

    let proceeds = price * actual;
    inventory::remove_item(session, item_id, actual)?;
    inventory::add_item(session, catalog, &config.gold_item_id, proceeds)?;

    let merchant_state = session
        .merchant_states
        .get_mut(merchant_id)
        .ok_or_else(|| GameError::Internal("merchant state not loaded".to_string()))?;
    merchant_state.gold -= proceeds as i32;
    *merchant_state.stock.entry(item_id.clone()).or_insert(0) += actual;

    Ok(TradeOutcome {
        quantity: actual,
        gold_amount: proceeds,
    })
}

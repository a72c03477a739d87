//! Per-player-per-merchant economy state (C7).
//!
//! Grounded on the teacher's `do_balance`/`do_withdraw`/`do_gold`
//! (`server/src/state/economy.rs`), which treat a player's relationship to
//! a bank/merchant as its own small ledger rather than a field on the
//! world. Here that ledger is `MerchantState`, keyed per `(user, merchant)`
//! rather than read out of the teacher's single global `Character`, since
//! two players must see independent stock and gold for the same merchant
//! (§4.7).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ids::{ItemId, MerchantId};

/// A merchant's state as observed by one player: how much gold it has left
/// to buy with, how much stock remains of each item, and when each of the
/// two regen/restock clocks last fired.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchantState {
    pub merchant_id: MerchantId,
    pub gold: i32,
    pub stock: HashMap<ItemId, u32>,
    pub last_gold_regen_minute: u64,
    pub last_item_restock_minute: u64,
    pub last_gold_restock_minute: u64,
}

impl MerchantState {
    pub fn fresh(merchant_id: MerchantId, starting_gold: i32, starting_stock: HashMap<ItemId, u32>, now: u64) -> Self {
        Self {
            merchant_id,
            gold: starting_gold,
            stock: starting_stock,
            last_gold_regen_minute: now,
            last_item_restock_minute: now,
            last_gold_restock_minute: now,
        }
    }
}

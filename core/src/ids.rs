//! Newtype identifiers.
//!
//! The teacher indexes characters/items by raw `usize` into a fixed arena
//! (`characters[cn]`), which only works because it owns one process-wide
//! world. A session-per-save engine instead keys everything by stable
//! string IDs coming from identity and the content catalog, so the IDs here
//! wrap `String`/`Box<str>` rather than an index, grounded on the
//! `EntityId(u32)` newtype pattern from the dungeon-engine reference file.
use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(UserId);
string_id!(SaveId);
string_id!(MerchantId);
string_id!(ItemId);
string_id!(EffectId);
string_id!(NpcId);
string_id!(BuildingId);
string_id!(CityId);
string_id!(SpellId);
string_id!(DistrictKey);
string_id!(MusicTrackId);

/// Registry key for a session: `(userID, saveID)`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub user_id: UserId,
    pub save_id: SaveId,
}

impl SessionKey {
    pub fn new(user_id: impl Into<UserId>, save_id: impl Into<SaveId>) -> Self {
        Self {
            user_id: user_id.into(),
            save_id: save_id.into(),
        }
    }
}

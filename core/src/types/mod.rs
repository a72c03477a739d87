//! The shared data model: the read-only catalog shapes, the persisted save
//! document, and the snapshot/delta wire types.

pub mod catalog;
pub mod delta;
pub mod economy;
pub mod state;

pub use catalog::*;
pub use delta::*;
pub use economy::*;
pub use state::*;

/// The closed set of colors the UI may be told to render a message in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Green,
    Yellow,
    White,
    Purple,
    Blue,
}

impl Color {
    pub fn as_str(&self) -> &'static str {
        match self {
            Color::Red => "red",
            Color::Green => "green",
            Color::Yellow => "yellow",
            Color::White => "white",
            Color::Purple => "purple",
            Color::Blue => "blue",
        }
    }
}

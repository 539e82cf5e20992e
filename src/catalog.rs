//! The fixed product catalog traded at the post.
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A tradable commodity with a fixed unit price.
///
/// The catalog is closed: every ledger snapshot carries a queue for each
/// of these variants, present or not in the encoded form.
#[derive(
    Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Product {
    Boars,
    Fish,
    Salt,
    Mead,
}

impl Product {
    pub const ALL: [Product; 4] = [Product::Boars, Product::Fish, Product::Salt, Product::Mead];

    /// Price paid to a seller for one unit
    pub fn unit_price(&self) -> u64 {
        match self {
            Product::Boars => 3,
            Product::Fish => 2,
            Product::Salt => 1,
            Product::Mead => 4,
        }
    }

    /// Pick a random catalog product (used by the periodic trade ticks)
    pub fn pick_random() -> Product {
        let idx = rand::thread_rng().gen_range(0..Self::ALL.len());
        Self::ALL[idx]
    }
}

impl std::fmt::Display for Product {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Product::Boars => write!(f, "BOARS"),
            Product::Fish => write!(f, "FISH"),
            Product::Salt => write!(f, "SALT"),
            Product::Mead => write!(f, "MEAD"),
        }
    }
}

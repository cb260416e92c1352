use crate::Result;
use anyhow::ensure;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// A single purchase: what was bought and what it cost, in whole currency units.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Item {
    name: String,
    price: u64,
}

impl Item {
    /// Creates an `Item`. The name is trimmed of outer whitespace and must not be empty, and the
    /// price must be positive.
    pub fn new(name: impl AsRef<str>, price: u64) -> Result<Self> {
        let name = name.as_ref().trim();
        ensure!(!name.is_empty(), "An item name cannot be empty");
        ensure!(price > 0, "The price of '{name}' must be greater than zero");
        Ok(Self {
            name: name.to_string(),
            price,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price(&self) -> u64 {
        self.price
    }
}

impl Display for Item {
    /// Formats the item as a ledger line, e.g. `鮮奶 255`.
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.name, self.price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_trims_name() {
        let item = Item::new("  紅蘿蔔 ", 29).unwrap();
        assert_eq!(item.name(), "紅蘿蔔");
        assert_eq!(item.price(), 29);
        assert_eq!(item.to_string(), "紅蘿蔔 29");
    }

    #[test]
    fn test_new_rejects_bad_values() {
        assert!(Item::new("   ", 10).is_err());
        assert!(Item::new("鮮奶", 0).is_err());
    }
}

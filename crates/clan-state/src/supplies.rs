//! Clan food and herb stores.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// How well stocked a supply is relative to what the clan needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupplyLevel {
    Low,
    Adequate,
    Full,
    Excess,
}

impl SupplyLevel {
    /// Bands an amount against `required`: below required is low, below
    /// twice is adequate, below three times is full, anything more is excess.
    pub fn classify(amount: f32, required: f32) -> Self {
        if amount < required {
            SupplyLevel::Low
        } else if amount < required * 2.0 {
            SupplyLevel::Adequate
        } else if amount < required * 3.0 {
            SupplyLevel::Full
        } else {
            SupplyLevel::Excess
        }
    }
}

impl fmt::Display for SupplyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SupplyLevel::Low => "low",
            SupplyLevel::Adequate => "adequate",
            SupplyLevel::Full => "full",
            SupplyLevel::Excess => "excess",
        };
        f.write_str(name)
    }
}

/// Fresh-kill pile and herb stores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Supplies {
    #[serde(default)]
    pub freshkill: f32,
    /// Herb name -> count
    #[serde(default)]
    pub herbs: BTreeMap<String, u32>,
}

impl Supplies {
    pub fn herb(&self, name: &str) -> u32 {
        self.herbs.get(name).copied().unwrap_or(0)
    }

    pub fn add_freshkill(&mut self, amount: f32) {
        self.freshkill = (self.freshkill + amount).max(0.0);
    }

    pub fn add_herb(&mut self, name: &str, amount: u32) {
        *self.herbs.entry(name.to_string()).or_insert(0) += amount;
    }

    /// Multiplies the fresh-kill pile by `factor`.
    pub fn scale_freshkill(&mut self, factor: f32) {
        self.freshkill = (self.freshkill * factor).max(0.0);
    }

    /// Multiplies one herb count by `factor`, rounding down.
    pub fn scale_herb(&mut self, name: &str, factor: f32) {
        if let Some(count) = self.herbs.get_mut(name) {
            *count = (*count as f32 * factor).floor().max(0.0) as u32;
        }
    }

    pub fn scale_all_herbs(&mut self, factor: f32) {
        for count in self.herbs.values_mut() {
            *count = (*count as f32 * factor).floor().max(0.0) as u32;
        }
    }

    /// Count of the best stocked herb.
    pub fn most_stocked_herb(&self) -> u32 {
        self.herbs.values().copied().max().unwrap_or(0)
    }

    /// Count of the worst stocked herb.
    pub fn least_stocked_herb(&self) -> u32 {
        self.herbs.values().copied().min().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supply_bands() {
        assert_eq!(SupplyLevel::classify(5.0, 10.0), SupplyLevel::Low);
        assert_eq!(SupplyLevel::classify(10.0, 10.0), SupplyLevel::Adequate);
        assert_eq!(SupplyLevel::classify(25.0, 10.0), SupplyLevel::Full);
        assert_eq!(SupplyLevel::classify(30.0, 10.0), SupplyLevel::Excess);
    }

    #[test]
    fn test_herb_scaling() {
        let mut supplies = Supplies::default();
        supplies.add_herb("cobweb", 9);
        supplies.add_herb("marigold", 2);

        supplies.scale_herb("cobweb", 0.5);
        assert_eq!(supplies.herb("cobweb"), 4);

        supplies.scale_all_herbs(0.0);
        assert_eq!(supplies.most_stocked_herb(), 0);
        assert_eq!(supplies.herb("yarrow"), 0);
    }

    #[test]
    fn test_freshkill_never_negative() {
        let mut supplies = Supplies::default();
        supplies.add_freshkill(4.0);
        supplies.add_freshkill(-10.0);
        assert_eq!(supplies.freshkill, 0.0);
    }
}

//! Tracked position model.
//!
//! A [`TrackedPosition`] is one leg the user asked us to follow: where it was
//! entered, how many contracts, and whether it counts toward the total.
//! The serde layout matches the persisted record format
//! `{ id, entryValue, tradeSize?, selected }`.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::decimal::{Pnl, Price};
use crate::error::{CoreError, Result};

/// Default contract count when none was recorded.
pub const DEFAULT_TRADE_SIZE: u32 = 1;

// ============================================================================
// PositionId
// ============================================================================

/// Stable identifier of a position on the source page ("Order 1", "Order 2").
///
/// All-digit ids are canonicalized (`"01"` becomes `"1"`), order numerically
/// and serialize as JSON numbers. Anything else is kept as text and sorts
/// after the numeric ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PositionId(String);

impl PositionId {
    /// Create an id from arbitrary text.
    pub fn new(raw: impl AsRef<str>) -> Result<Self> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(CoreError::InvalidPositionId("empty id".to_string()));
        }
        if trimmed.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = trimmed.parse::<u64>() {
                return Ok(Self(n.to_string()));
            }
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value when the id is all digits.
    pub fn as_number(&self) -> Option<u64> {
        if self.0.bytes().all(|b| b.is_ascii_digit()) {
            self.0.parse().ok()
        } else {
            None
        }
    }
}

impl From<u64> for PositionId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl FromStr for PositionId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Ord for PositionId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for PositionId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for PositionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.as_number() {
            Some(n) => serializer.serialize_u64(n),
            None => serializer.serialize_str(&self.0),
        }
    }
}

impl<'de> Deserialize<'de> for PositionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Number(u64),
            Text(String),
        }

        match RawId::deserialize(deserializer)? {
            RawId::Number(n) => Ok(Self::from(n)),
            RawId::Text(s) => Self::new(s).map_err(serde::de::Error::custom),
        }
    }
}

// ============================================================================
// TrackedPosition
// ============================================================================

fn default_trade_size() -> u32 {
    DEFAULT_TRADE_SIZE
}

fn default_selected() -> bool {
    true
}

/// A single configured position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedPosition {
    /// Identifier matching the value source.
    pub id: PositionId,
    /// Cost basis per unit. Negative = net credit received at entry.
    #[serde(rename = "entryValue")]
    pub entry_cost: Price,
    /// Contract/lot multiplier. Always `>= 1`.
    #[serde(rename = "tradeSize", default = "default_trade_size")]
    pub size: u32,
    /// Only selected positions contribute to the total.
    #[serde(default = "default_selected")]
    pub selected: bool,
}

impl TrackedPosition {
    /// Create a selected, single-contract position.
    #[must_use]
    pub fn new(id: PositionId, entry_cost: Price) -> Self {
        Self {
            id,
            entry_cost,
            size: DEFAULT_TRADE_SIZE,
            selected: true,
        }
    }

    /// Set the contract count.
    pub fn with_size(mut self, size: u32) -> Result<Self> {
        validate_size(size)?;
        self.size = size;
        Ok(self)
    }

    /// Set the selection flag.
    #[must_use]
    pub fn with_selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }

    /// Check the record invariants.
    pub fn validate(&self) -> Result<()> {
        validate_size(self.size)
    }

    /// Merge a partial update. Nothing is changed if the patch is invalid.
    pub fn apply(&mut self, patch: &PositionPatch) -> Result<()> {
        if let Some(size) = patch.size {
            validate_size(size)?;
        }
        if let Some(entry_cost) = patch.entry_cost {
            self.entry_cost = entry_cost;
        }
        if let Some(size) = patch.size {
            self.size = size;
        }
        if let Some(selected) = patch.selected {
            self.selected = selected;
        }
        Ok(())
    }

    /// Unscaled P/L of this leg at `current`: `(current - entry) * size`.
    ///
    /// `None` if the result does not fit in a `Decimal`.
    #[must_use]
    pub fn contribution(&self, current: Price) -> Option<Pnl> {
        let diff = current.checked_sub(self.entry_cost)?;
        Pnl::new(diff.inner()).checked_mul(Decimal::from(self.size))
    }
}

fn validate_size(size: u32) -> Result<()> {
    if size == 0 {
        return Err(CoreError::InvalidSize(
            "trade size must be at least 1".to_string(),
        ));
    }
    Ok(())
}

// ============================================================================
// PositionPatch
// ============================================================================

/// Partial update for a tracked position. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionPatch {
    #[serde(rename = "entryValue", default, skip_serializing_if = "Option::is_none")]
    pub entry_cost: Option<Price>,
    #[serde(rename = "tradeSize", default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected: Option<bool>,
}

impl PositionPatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn entry_cost(mut self, entry_cost: Price) -> Self {
        self.entry_cost = Some(entry_cost);
        self
    }

    #[must_use]
    pub fn size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    #[must_use]
    pub fn selected(mut self, selected: bool) -> Self {
        self.selected = Some(selected);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entry_cost.is_none() && self.size.is_none() && self.selected.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn id(n: u64) -> PositionId {
        PositionId::from(n)
    }

    #[test]
    fn test_position_id_canonicalizes_digits() {
        assert_eq!(PositionId::new("01").unwrap(), id(1));
        assert_eq!(PositionId::new(" 7 ").unwrap().as_number(), Some(7));
        assert_eq!(PositionId::new("leg-a").unwrap().as_number(), None);
        assert!(PositionId::new("  ").is_err());
    }

    #[test]
    fn test_position_id_ordering() {
        let mut ids = vec![
            PositionId::new("b").unwrap(),
            id(10),
            PositionId::new("a").unwrap(),
            id(2),
        ];
        ids.sort();
        let rendered: Vec<_> = ids.iter().map(|i| i.to_string()).collect();
        assert_eq!(rendered, vec!["2", "10", "a", "b"]);
    }

    #[test]
    fn test_position_id_serde() {
        assert_eq!(serde_json::to_string(&id(3)).unwrap(), "3");
        let text = PositionId::new("leg-a").unwrap();
        assert_eq!(serde_json::to_string(&text).unwrap(), "\"leg-a\"");

        let from_num: PositionId = serde_json::from_str("3").unwrap();
        let from_str: PositionId = serde_json::from_str("\"3\"").unwrap();
        assert_eq!(from_num, from_str);
    }

    #[test]
    fn test_tracked_position_wire_format() {
        let pos = TrackedPosition::new(id(1), Price::new(dec!(-1.78)))
            .with_size(2)
            .unwrap();
        let json = serde_json::to_value(&pos).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["tradeSize"], 2);
        assert_eq!(json["selected"], true);
        assert!(json.get("entryValue").is_some());
    }

    #[test]
    fn test_tracked_position_defaults_when_fields_missing() {
        let pos: TrackedPosition =
            serde_json::from_str(r#"{ "id": 2, "entryValue": 1.58 }"#).unwrap();
        assert_eq!(pos.size, 1);
        assert!(pos.selected);
        assert_eq!(pos.entry_cost, Price::new(dec!(1.58)));
    }

    #[test]
    fn test_with_size_rejects_zero() {
        let result = TrackedPosition::new(id(1), Price::ZERO).with_size(0);
        assert!(matches!(result, Err(CoreError::InvalidSize(_))));
    }

    #[test]
    fn test_apply_patch_merges_fields() {
        let mut pos = TrackedPosition::new(id(1), Price::new(dec!(1)));
        pos.apply(&PositionPatch::new().size(3).selected(false))
            .unwrap();
        assert_eq!(pos.entry_cost, Price::new(dec!(1)));
        assert_eq!(pos.size, 3);
        assert!(!pos.selected);
    }

    #[test]
    fn test_apply_invalid_patch_changes_nothing() {
        let mut pos = TrackedPosition::new(id(1), Price::new(dec!(1)));
        let patch = PositionPatch::new()
            .entry_cost(Price::new(dec!(9)))
            .size(0);
        assert!(pos.apply(&patch).is_err());
        assert_eq!(pos.entry_cost, Price::new(dec!(1)));
        assert_eq!(pos.size, 1);
    }

    #[test]
    fn test_contribution() {
        let credit = TrackedPosition::new(id(1), Price::new(dec!(-1.78)));
        assert_eq!(credit.contribution(Price::new(dec!(2.50))), Some(Pnl::new(dec!(4.28))));

        let debit = TrackedPosition::new(id(2), Price::new(dec!(1.58)))
            .with_size(2)
            .unwrap();
        assert_eq!(debit.contribution(Price::new(dec!(0.90))), Some(Pnl::new(dec!(-1.36))));
    }

    #[test]
    fn test_contribution_overflow_is_none() {
        let short = TrackedPosition::new(id(1), Price::new(-Decimal::MAX));
        assert_eq!(short.contribution(Price::new(Decimal::MAX)), None);

        let large = TrackedPosition::new(id(2), Price::ZERO).with_size(10).unwrap();
        assert_eq!(large.contribution(Price::new(Decimal::MAX)), None);
    }

    #[test]
    fn test_patch_is_empty() {
        assert!(PositionPatch::new().is_empty());
        assert!(!PositionPatch::new().selected(true).is_empty());
    }
}

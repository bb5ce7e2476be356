//! Balance computation.
//!
//! `total = multiplier * Σ size_i * (current_i - entry_i)` over the selected
//! positions. Either every selected leg is valued or the whole computation
//! fails; a partial total is never returned.

use plwatch_core::{Classification, Pnl, PositionId, Price, TrackedPosition};
use rust_decimal::Decimal;
use tracing::{debug, trace};

use crate::error::{EngineError, EngineResult};
use crate::source::ValueSource;

/// Contract multiplier applied to the summed legs.
pub const DEFAULT_CONTRACT_MULTIPLIER: u32 = 100;

/// One selected position's share of the total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegValue {
    pub id: PositionId,
    pub current: Price,
    /// Unscaled `(current - entry) * size`.
    pub contribution: Pnl,
}

/// Result of one computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Balance {
    /// Scaled signed total.
    pub total: Pnl,
    pub classification: Classification,
    pub legs: Vec<LegValue>,
}

/// Combines tracked positions with current values into a signed total.
#[derive(Debug, Clone, Copy)]
pub struct BalanceEngine {
    multiplier: Decimal,
}

impl Default for BalanceEngine {
    fn default() -> Self {
        Self::new(DEFAULT_CONTRACT_MULTIPLIER)
    }
}

impl BalanceEngine {
    #[must_use]
    pub fn new(multiplier: u32) -> Self {
        Self {
            multiplier: Decimal::from(multiplier),
        }
    }

    pub fn multiplier(&self) -> Decimal {
        self.multiplier
    }

    /// Compute the total over the selected positions.
    ///
    /// # Errors
    /// - `EmptySelection` if no position is selected
    /// - `SourceUnavailable` if any selected position cannot be valued
    /// - `Overflow` if a leg or the scaled total leaves `Decimal` range
    pub fn compute<S>(&self, positions: &[TrackedPosition], source: &S) -> EngineResult<Balance>
    where
        S: ValueSource + ?Sized,
    {
        let selected: Vec<&TrackedPosition> = positions.iter().filter(|p| p.selected).collect();
        if selected.is_empty() {
            return Err(EngineError::EmptySelection);
        }

        let mut legs = Vec::with_capacity(selected.len());
        for position in selected {
            let current = source.current_value(&position.id)?;
            let contribution = position
                .contribution(current)
                .ok_or_else(|| EngineError::Overflow(format!("position {}", position.id)))?;
            trace!(
                id = %position.id,
                entry = %position.entry_cost,
                size = position.size,
                current = %current,
                contribution = %contribution.inner(),
                "Valued leg"
            );
            legs.push(LegValue {
                id: position.id.clone(),
                current,
                contribution,
            });
        }

        let total = legs
            .iter()
            .try_fold(Pnl::ZERO, |acc, leg| acc.checked_add(leg.contribution))
            .and_then(|sum| sum.checked_mul(self.multiplier))
            .ok_or_else(|| EngineError::Overflow("total".to_string()))?;
        let classification = total.classify();

        debug!(
            legs = legs.len(),
            total = %total,
            classification = %classification,
            "Balance computed"
        );

        Ok(Balance {
            total,
            classification,
            legs,
        })
    }
}

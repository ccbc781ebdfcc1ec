//! # Inventory Model
//!
//! Stock-state derivation and deduction for a [`MedicationRecord`].
//!
//! ## Stock States
//! ```text
//!   remaining_quantity
//!   ──────────────────────────────────────────────────────────────►
//!   0          1 ... low_stock_threshold        threshold+1 ...
//!   │          │                       │        │
//!   ▼          ▼                       ▼        ▼
//! ┌────────────┐ ┌────────────────────────────┐ ┌──────────────────┐
//! │ OutOfStock │ │            Low             │ │    Sufficient    │
//! └────────────┘ └────────────────────────────┘ └──────────────────┘
//!
//!   The three states are mutually exclusive: zero is never "low".
//! ```
//!
//! ## Deduction
//! `reduce_quantity` saturates at zero, so repeated deductions from an empty
//! medication leave it empty. Timestamps are not touched here; the
//! repository stamps `updated_at` when the change reaches the store.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::types::MedicationRecord;
use crate::{DEFAULT_DOSAGE_PER_INTAKE, DEFAULT_LOW_STOCK_THRESHOLD};

// =============================================================================
// Stock Level
// =============================================================================

/// The derived stock state of a medication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum StockLevel {
    /// More than `low_stock_threshold` units remain.
    Sufficient,
    /// Between 1 and `low_stock_threshold` units remain.
    Low,
    /// Nothing remains.
    OutOfStock,
}

// =============================================================================
// Derived State
// =============================================================================

impl MedicationRecord {
    /// Returns true when nothing remains.
    #[inline]
    pub fn is_out_of_stock(&self) -> bool {
        self.remaining_quantity == 0
    }

    /// Returns true when `0 < remaining_quantity <= low_stock_threshold`.
    #[inline]
    pub fn is_low_stock(&self) -> bool {
        self.remaining_quantity > 0 && self.remaining_quantity <= self.low_stock_threshold
    }

    /// Classifies the current stock.
    pub fn stock_level(&self) -> StockLevel {
        if self.is_out_of_stock() {
            StockLevel::OutOfStock
        } else if self.is_low_stock() {
            StockLevel::Low
        } else {
            StockLevel::Sufficient
        }
    }

    /// Remaining stock as a rounded percentage of the total.
    ///
    /// ## Returns
    /// `0` when `total_quantity` is 0. Values above 100 are possible when
    /// remaining exceeds total, since the two fields are set independently.
    pub fn remaining_percentage(&self) -> u32 {
        if self.total_quantity == 0 {
            return 0;
        }
        let total = u64::from(self.total_quantity);
        let scaled = u64::from(self.remaining_quantity) * 100;
        // Round half up in integer arithmetic
        let percent = (scaled * 2 + total) / (total * 2);
        u32::try_from(percent).unwrap_or(u32::MAX)
    }

    /// Returns true when the remaining percentage is at or below
    /// `threshold_percent`. Medications without a total never need refill.
    pub fn needs_refill(&self, threshold_percent: u32) -> bool {
        self.total_quantity > 0 && self.remaining_percentage() <= threshold_percent
    }

    /// Whole doses left at the current dosage.
    pub fn doses_remaining(&self) -> u32 {
        self.remaining_quantity / self.dosage_per_intake.max(1)
    }

    /// Returns true when at least one unit remains.
    ///
    /// A final partial dose is still allowed; the deduction clamps at zero.
    #[inline]
    pub fn can_take_dose(&self) -> bool {
        !self.is_out_of_stock()
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Deducts `amount` units, never going below zero.
    ///
    /// ## Returns
    /// The new remaining quantity.
    pub fn reduce_quantity(&mut self, amount: u32) -> u32 {
        self.remaining_quantity = self.remaining_quantity.saturating_sub(amount);
        self.remaining_quantity
    }

    /// Deducts one dose (`dosage_per_intake` units).
    ///
    /// ## Returns
    /// The units actually deducted, which is less than a full dose when the
    /// supply runs out.
    pub fn take_dose(&mut self) -> u32 {
        let before = self.remaining_quantity;
        self.reduce_quantity(self.dosage_per_intake);
        before - self.remaining_quantity
    }

    /// Like [`take_dose`](Self::take_dose), but refuses an empty medication.
    ///
    /// ## Returns
    /// * `Ok(deducted)` - Units deducted (a final partial dose is allowed)
    /// * `Err(CoreError::InsufficientStock)` - Nothing left; unchanged
    pub fn try_take_dose(&mut self) -> CoreResult<u32> {
        if self.is_out_of_stock() {
            return Err(CoreError::InsufficientStock {
                name: self.name.clone(),
                remaining: self.remaining_quantity,
                requested: self.dosage_per_intake,
            });
        }
        Ok(self.take_dose())
    }

    // =========================================================================
    // Forgiving Setters
    // =========================================================================
    // Form input arrives as loosely-typed integers. These clamp instead of
    // failing; the strict check happens in `validation` at save time.

    /// None or anything below 1 becomes 1.
    pub fn set_dosage_per_intake(&mut self, value: Option<i64>) {
        self.dosage_per_intake = match value {
            None => DEFAULT_DOSAGE_PER_INTAKE,
            Some(v) => saturate(v).max(1),
        };
    }

    /// None becomes the default of 5; negatives become 0.
    pub fn set_low_stock_threshold(&mut self, value: Option<i64>) {
        self.low_stock_threshold = match value {
            None => DEFAULT_LOW_STOCK_THRESHOLD,
            Some(v) => saturate(v),
        };
    }

    /// None or negatives become 0.
    pub fn set_total_quantity(&mut self, value: Option<i64>) {
        self.total_quantity = value.map(saturate).unwrap_or(0);
    }

    /// None or negatives become 0.
    pub fn set_remaining_quantity(&mut self, value: Option<i64>) {
        self.remaining_quantity = value.map(saturate).unwrap_or(0);
    }
}

fn saturate(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

// =============================================================================
// Unit Tests
// =============================================================================

//! # pillbox-core: Pure Domain Logic for Pillbox
//!
//! This crate holds the medication tracker's records and the rules that
//! apply to them, as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Pillbox Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Presentation (external)                         │   │
//! │  │   Medication list ──► Add/Edit form ──► Detail ──► Diary        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ tickets / live queries                 │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 pillbox-db (Repositories)                       │   │
//! │  │   worker pools, duplicate-name policy, SQLite, change feed      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ pillbox-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌────────────┐  ┌────────────┐  ┌────────────┐               │   │
//! │  │   │   types    │  │ inventory  │  │ validation │               │   │
//! │  │   │ Medication │  │ StockLevel │  │  rules     │               │   │
//! │  │   │ Intake     │  │ deduction  │  │  results   │               │   │
//! │  │   │ Diary/User │  │ setters    │  │            │               │   │
//! │  │   └────────────┘  └────────────┘  └────────────┘               │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Records and the color / dosage-form tag sets
//! - [`inventory`] - Stock states, deduction and forgiving setters
//! - [`validation`] - Save-time rule checks
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use pillbox_core::{DosageForm, MedicationColor, MedicationRecord, StockLevel};
//!
//! let mut aspirin = MedicationRecord::new("Aspirin", MedicationColor::White, DosageForm::Tablet);
//! aspirin.set_total_quantity(Some(10));
//! aspirin.set_remaining_quantity(Some(6));
//! assert_eq!(aspirin.stock_level(), StockLevel::Sufficient);
//!
//! aspirin.reduce_quantity(2);
//! assert_eq!(aspirin.stock_level(), StockLevel::Low);
//! assert_eq!(aspirin.remaining_percentage(), 40);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod inventory;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use inventory::StockLevel;
pub use types::*;
pub use validation::ValidationResult;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum medication name length, in characters after trimming.
pub const MAX_NAME_LEN: usize = 100;

/// Maximum diary entry length, in characters.
pub const MAX_DIARY_CONTENT_LEN: usize = 5000;

/// Maximum username length, in characters.
pub const MAX_USERNAME_LEN: usize = 50;

/// Maximum length of a person or hospital name on a user profile.
pub const MAX_PROFILE_NAME_LEN: usize = 100;

/// Maximum length of the free-text medical fields on a user profile.
pub const MAX_PROFILE_TEXT_LEN: usize = 500;

/// Units consumed per intake for a new medication.
pub const DEFAULT_DOSAGE_PER_INTAKE: u32 = 1;

/// Low-stock threshold for a new medication.
pub const DEFAULT_LOW_STOCK_THRESHOLD: u32 = 5;

/// Unit label for a new medication.
pub const DEFAULT_UNIT: &str = "piece";

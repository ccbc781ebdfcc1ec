//! # Domain Types
//!
//! Records persisted by Pillbox and the fixed tag enumerations they use.
//!
//! ## Type Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌───────────────────┐  ┌───────────────────┐  ┌───────────────────┐   │
//! │  │ MedicationRecord  │  │   IntakeRecord    │  │ HealthDiaryEntry  │   │
//! │  │  ───────────────  │  │  ───────────────  │  │  ───────────────  │   │
//! │  │  id (0 = new)     │  │  medication_name  │  │  user_id (FK)     │   │
//! │  │  name (soft key)  │  │  intake_time      │  │  content          │   │
//! │  │  color / form     │  │  dosage_taken     │  │  created/updated  │   │
//! │  │  stock fields     │  └───────────────────┘  └─────────┬─────────┘   │
//! │  └───────────────────┘                                   │ CASCADE     │
//! │                                                ┌─────────▼─────────┐   │
//! │  ┌───────────────────┐  ┌───────────────────┐  │   UserAccount     │   │
//! │  │  MedicationColor  │  │    DosageForm     │  │  username (uniq)  │   │
//! │  │  11 fixed tags    │  │  10 fixed tags    │  └───────────────────┘   │
//! │  └───────────────────┘  └───────────────────┘                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Tags vs. Enums
//! Records carry color and dosage form as the raw tag string a form produced.
//! The enums below define the accepted set; `validation` rejects anything
//! else before a record reaches the store.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::{DEFAULT_DOSAGE_PER_INTAKE, DEFAULT_LOW_STOCK_THRESHOLD, DEFAULT_UNIT};

// =============================================================================
// Medication Color
// =============================================================================

/// The color of a pill, capsule or liquid, as picked from a fixed list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MedicationColor {
    White,
    Yellow,
    Blue,
    Red,
    Green,
    Pink,
    Orange,
    Brown,
    Purple,
    Clear,
    Other,
}

impl MedicationColor {
    /// Every color, in picker order.
    pub const ALL: [MedicationColor; 11] = [
        MedicationColor::White,
        MedicationColor::Yellow,
        MedicationColor::Blue,
        MedicationColor::Red,
        MedicationColor::Green,
        MedicationColor::Pink,
        MedicationColor::Orange,
        MedicationColor::Brown,
        MedicationColor::Purple,
        MedicationColor::Clear,
        MedicationColor::Other,
    ];

    /// The tag stored in the `color` column.
    pub const fn as_str(&self) -> &'static str {
        match self {
            MedicationColor::White => "WHITE",
            MedicationColor::Yellow => "YELLOW",
            MedicationColor::Blue => "BLUE",
            MedicationColor::Red => "RED",
            MedicationColor::Green => "GREEN",
            MedicationColor::Pink => "PINK",
            MedicationColor::Orange => "ORANGE",
            MedicationColor::Brown => "BROWN",
            MedicationColor::Purple => "PURPLE",
            MedicationColor::Clear => "CLEAR",
            MedicationColor::Other => "OTHER",
        }
    }

    /// Looks a tag up with an exact, case-sensitive match.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == tag)
    }
}

impl fmt::Display for MedicationColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MedicationColor {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_tag(s).ok_or_else(|| ValidationError::NotAllowed {
            field: "color".to_string(),
            allowed: Self::ALL.iter().map(|c| c.as_str().to_string()).collect(),
        })
    }
}

// =============================================================================
// Dosage Form
// =============================================================================

/// How a medication is administered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DosageForm {
    Pill,
    Tablet,
    Capsule,
    Liquid,
    Injection,
    Powder,
    Cream,
    Patch,
    Inhaler,
    Other,
}

impl DosageForm {
    /// Every dosage form, in picker order.
    pub const ALL: [DosageForm; 10] = [
        DosageForm::Pill,
        DosageForm::Tablet,
        DosageForm::Capsule,
        DosageForm::Liquid,
        DosageForm::Injection,
        DosageForm::Powder,
        DosageForm::Cream,
        DosageForm::Patch,
        DosageForm::Inhaler,
        DosageForm::Other,
    ];

    /// The tag stored in the `dosage_form` column.
    pub const fn as_str(&self) -> &'static str {
        match self {
            DosageForm::Pill => "PILL",
            DosageForm::Tablet => "TABLET",
            DosageForm::Capsule => "CAPSULE",
            DosageForm::Liquid => "LIQUID",
            DosageForm::Injection => "INJECTION",
            DosageForm::Powder => "POWDER",
            DosageForm::Cream => "CREAM",
            DosageForm::Patch => "PATCH",
            DosageForm::Inhaler => "INHALER",
            DosageForm::Other => "OTHER",
        }
    }

    /// Looks a tag up with an exact, case-sensitive match.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.as_str() == tag)
    }
}

impl fmt::Display for DosageForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DosageForm {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_tag(s).ok_or_else(|| ValidationError::NotAllowed {
            field: "dosage form".to_string(),
            allowed: Self::ALL.iter().map(|d| d.as_str().to_string()).collect(),
        })
    }
}

// =============================================================================
// Medication Record
// =============================================================================

/// One tracked medication.
///
/// ## Lifecycle
/// ```text
/// "Add" screen opens ──► MedicationRecord::new(..)   (id = 0, defaults)
///        │
///        ▼  user edits fields (normalizing setters)
/// validate_medication(&record)
///        │
///        ▼
/// MedicationRepository::insert ──► id assigned, created_at/updated_at set
///        │
///        ▼  every later write refreshes updated_at
/// MedicationRepository::delete ──► row removed
/// ```
///
/// `remaining_quantity <= total_quantity` is expected by the screens but is
/// not enforced here; the two fields are updated independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct MedicationRecord {
    /// Row id. `0` means "not yet stored".
    pub id: i64,

    /// Display name; soft-unique across medications.
    pub name: String,

    /// A [`MedicationColor`] tag.
    pub color: String,

    /// A [`DosageForm`] tag.
    pub dosage_form: String,

    /// Path of the photo taken for this medication, if any.
    pub photo_path: Option<String>,

    /// Epoch milliseconds.
    pub created_at: i64,

    /// Epoch milliseconds.
    pub updated_at: i64,

    /// Quantity originally purchased.
    pub total_quantity: u32,

    /// Quantity still on hand.
    pub remaining_quantity: u32,

    /// Unit label for quantities ("piece", "ml", ...).
    pub unit: String,

    /// Units consumed per intake.
    pub dosage_per_intake: u32,

    /// At or below this many remaining units the medication is "low".
    pub low_stock_threshold: u32,
}

impl MedicationRecord {
    /// Starts a new, unsaved record with the documented defaults.
    pub fn new(
        name: impl Into<String>,
        color: MedicationColor,
        dosage_form: DosageForm,
    ) -> Self {
        MedicationRecord {
            name: name.into(),
            color: color.as_str().to_string(),
            dosage_form: dosage_form.as_str().to_string(),
            ..Default::default()
        }
    }

    /// Returns true if this record has never been stored.
    #[inline]
    pub fn is_new(&self) -> bool {
        self.id == 0
    }

    /// The parsed color tag, if it is one of the accepted values.
    pub fn color(&self) -> Option<MedicationColor> {
        MedicationColor::from_tag(&self.color)
    }

    /// The parsed dosage form tag, if it is one of the accepted values.
    pub fn dosage_form(&self) -> Option<DosageForm> {
        DosageForm::from_tag(&self.dosage_form)
    }

    /// Creation time as a UTC timestamp.
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        millis_to_utc(self.created_at)
    }

    /// Last modification time as a UTC timestamp.
    pub fn updated_at_utc(&self) -> Option<DateTime<Utc>> {
        millis_to_utc(self.updated_at)
    }
}

impl Default for MedicationRecord {
    fn default() -> Self {
        MedicationRecord {
            id: 0,
            name: String::new(),
            color: String::new(),
            dosage_form: String::new(),
            photo_path: None,
            created_at: 0,
            updated_at: 0,
            total_quantity: 0,
            remaining_quantity: 0,
            unit: DEFAULT_UNIT.to_string(),
            dosage_per_intake: DEFAULT_DOSAGE_PER_INTAKE,
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
        }
    }
}

// =============================================================================
// Intake Record
// =============================================================================

/// One confirmed act of taking a medication.
///
/// The medication is referenced by name (denormalized), so history survives
/// the medication being renamed or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct IntakeRecord {
    pub id: i64,
    pub medication_name: String,
    /// Epoch milliseconds. `0` lets the repository stamp "now".
    pub intake_time: i64,
    pub dosage_taken: u32,
}

impl IntakeRecord {
    /// Creates an unsaved intake record.
    pub fn new(medication_name: impl Into<String>, intake_time: i64, dosage_taken: u32) -> Self {
        IntakeRecord {
            id: 0,
            medication_name: medication_name.into(),
            intake_time,
            dosage_taken,
        }
    }

    /// Intake time as a UTC timestamp.
    pub fn intake_time_utc(&self) -> Option<DateTime<Utc>> {
        millis_to_utc(self.intake_time)
    }
}

// =============================================================================
// Health Diary Entry
// =============================================================================

/// A free-text note written by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct HealthDiaryEntry {
    pub id: i64,
    /// Owning user; deleting the user deletes the entry.
    pub user_id: i64,
    pub content: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl HealthDiaryEntry {
    /// Creates an unsaved entry. Timestamps are set by the repository.
    pub fn new(user_id: i64, content: impl Into<String>) -> Self {
        HealthDiaryEntry {
            id: 0,
            user_id,
            content: content.into(),
            created_at: 0,
            updated_at: 0,
        }
    }

    /// Returns true if the entry was edited after it was written.
    pub fn is_modified(&self) -> bool {
        self.updated_at > self.created_at
    }

    /// First `max_chars` characters of the trimmed content, with an ellipsis
    /// when truncated.
    pub fn preview(&self, max_chars: usize) -> String {
        let trimmed = self.content.trim();
        if trimmed.chars().count() <= max_chars {
            return trimmed.to_string();
        }
        let mut preview: String = trimmed.chars().take(max_chars).collect();
        preview.push_str("...");
        preview
    }
}

// =============================================================================
// User Account
// =============================================================================

/// An account diary entries hang off, with its optional health profile.
///
/// Only `username` is required. Every profile field is free to stay `None`;
/// when set, `validate_user_profile` checks its format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct UserAccount {
    pub id: i64,
    pub username: String,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// A [`Gender`] tag.
    pub gender: Option<String>,
    /// `YYYY-MM-DD`.
    pub birth_date: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    /// ABO group with optional Rh sign, e.g. `AB+`.
    pub blood_type: Option<String>,
    pub allergies: Option<String>,
    pub medical_conditions: Option<String>,
    pub doctor_name: Option<String>,
    pub doctor_phone: Option<String>,
    pub hospital_name: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl UserAccount {
    /// Creates an unsaved account with an empty profile.
    pub fn new(username: impl Into<String>) -> Self {
        UserAccount {
            id: 0,
            username: username.into(),
            full_name: None,
            email: None,
            phone: None,
            gender: None,
            birth_date: None,
            emergency_contact_name: None,
            emergency_contact_phone: None,
            blood_type: None,
            allergies: None,
            medical_conditions: None,
            doctor_name: None,
            doctor_phone: None,
            hospital_name: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    /// The parsed gender tag, if set and accepted.
    pub fn gender(&self) -> Option<Gender> {
        self.gender.as_deref().and_then(Gender::from_tag)
    }

    /// Trims every profile field and turns blank ones into `None`.
    pub fn normalize_profile(&mut self) {
        for field in [
            &mut self.full_name,
            &mut self.email,
            &mut self.phone,
            &mut self.gender,
            &mut self.birth_date,
            &mut self.emergency_contact_name,
            &mut self.emergency_contact_phone,
            &mut self.blood_type,
            &mut self.allergies,
            &mut self.medical_conditions,
            &mut self.doctor_name,
            &mut self.doctor_phone,
            &mut self.hospital_name,
        ] {
            *field = field
                .take()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty());
        }
        if let Some(blood_type) = self.blood_type.as_mut() {
            *blood_type = blood_type.to_uppercase();
        }
    }
}

/// Gender as chosen on the profile screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Male,
    Female,
    Undisclosed,
}

impl Gender {
    pub const ALL: [Gender; 3] = [Gender::Male, Gender::Female, Gender::Undisclosed];

    /// The tag stored in the `gender` column.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "MALE",
            Gender::Female => "FEMALE",
            Gender::Undisclosed => "UNDISCLOSED",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|g| g.as_str() == tag)
    }
}

impl FromStr for Gender {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_tag(s).ok_or_else(|| ValidationError::NotAllowed {
            field: "gender".to_string(),
            allowed: Self::ALL.iter().map(|g| g.as_str().to_string()).collect(),
        })
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn millis_to_utc(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

// =============================================================================
// Unit Tests
// =============================================================================

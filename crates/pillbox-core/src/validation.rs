//! # Validation Module
//!
//! Save-time checks for candidate records.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Form input                                                   │
//! │  └── Forgiving setters clamp numbers (see `inventory`)                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Every rule evaluated, every violation collected                   │
//! │  └── Repository refuses to write when any rule fails                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL constraints                                              │
//! │  ├── UNIQUE username                                                   │
//! │  └── Foreign key from diary entries to users                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use pillbox_core::validation::validate_medication;
//! use pillbox_core::{DosageForm, MedicationColor, MedicationRecord};
//!
//! let record = MedicationRecord::new("Aspirin", MedicationColor::White, DosageForm::Tablet);
//! assert!(validate_medication(&record).is_valid());
//!
//! let blank = MedicationRecord::new("  ", MedicationColor::White, DosageForm::Tablet);
//! assert_eq!(
//!     validate_medication(&blank).first_error().map(|e| e.to_string()),
//!     Some("name is required".to_string())
//! );
//! ```

use chrono::{NaiveDate, Utc};
use serde::Serialize;

use crate::error::ValidationError;
use crate::types::{
    DosageForm, Gender, HealthDiaryEntry, IntakeRecord, MedicationColor, MedicationRecord,
    UserAccount,
};
use crate::{
    MAX_DIARY_CONTENT_LEN, MAX_NAME_LEN, MAX_PROFILE_NAME_LEN, MAX_PROFILE_TEXT_LEN,
    MAX_USERNAME_LEN,
};

/// Punctuation allowed in a medication name besides letters, digits and
/// whitespace.
const NAME_PUNCTUATION: [char; 6] = ['-', '(', ')', '.', '/', '+'];

// =============================================================================
// Validation Result
// =============================================================================

/// Every rule violation found in one candidate, in rule order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    /// Returns true when no rule was violated.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// The first violation, which is what forms usually display.
    pub fn first_error(&self) -> Option<&ValidationError> {
        self.errors.first()
    }

    /// All violations as display strings.
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    /// Appends another result's violations after this one's.
    pub fn merge(mut self, other: ValidationResult) -> Self {
        self.errors.extend(other.errors);
        self
    }

    /// Converts to a `Result`, keeping only the first violation.
    pub fn into_result(self) -> Result<(), ValidationError> {
        match self.errors.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn check(&mut self, outcome: Result<(), ValidationError>) {
        if let Err(err) = outcome {
            self.errors.push(err);
        }
    }
}

impl Serialize for ValidationError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

// =============================================================================
// Field Validators
// =============================================================================

/// Validates a medication name.
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most 100 characters (counted after trimming)
/// - Letters, digits, whitespace and `- ( ) . / +` only
///
/// ## Example
/// ```rust
/// use pillbox_core::validation::validate_name;
///
/// assert!(validate_name("Vitamin D3 (1000 IU)").is_ok());
/// assert!(validate_name("阿司匹林").is_ok());
/// assert!(validate_name("Aspirin!").is_err());
/// ```
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::required("name"));
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::too_long("name", MAX_NAME_LEN));
    }

    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || c.is_whitespace() || NAME_PUNCTUATION.contains(&c))
    {
        return Err(ValidationError::InvalidFormat {
            field: "name".to_string(),
            reason: "may contain only letters, digits, spaces and - ( ) . / +".to_string(),
        });
    }

    Ok(())
}

/// Validates a color tag (exact, case-sensitive).
pub fn validate_color(tag: &str) -> Result<(), ValidationError> {
    tag.parse::<MedicationColor>().map(|_| ())
}

/// Validates a dosage form tag (exact, case-sensitive).
pub fn validate_dosage_form(tag: &str) -> Result<(), ValidationError> {
    tag.parse::<DosageForm>().map(|_| ())
}

/// Validates a count that must be at least `min`.
pub fn validate_at_least(field: &str, value: i64, min: i64) -> Result<(), ValidationError> {
    if value < min {
        return Err(ValidationError::too_small(field, min));
    }
    Ok(())
}

// =============================================================================
// Record Validators
// =============================================================================

/// Checks the identity fields of a medication plus the dosage floor.
///
/// This is what the repository runs before every insert and update.
pub fn validate_medication(record: &MedicationRecord) -> ValidationResult {
    let mut result = ValidationResult::default();
    result.check(validate_name(&record.name));
    result.check(validate_color(&record.color));
    result.check(validate_dosage_form(&record.dosage_form));
    result.check(validate_at_least(
        "dosage per intake",
        i64::from(record.dosage_per_intake),
        1,
    ));
    result
}

/// Checks the stock fields against each other.
///
/// ## Rules
/// - `dosage_per_intake >= 1`
/// - `dosage_per_intake <= remaining_quantity`
/// - `low_stock_threshold <= total_quantity`
pub fn validate_inventory(record: &MedicationRecord) -> ValidationResult {
    let mut result = ValidationResult::default();

    result.check(validate_at_least(
        "dosage per intake",
        i64::from(record.dosage_per_intake),
        1,
    ));

    if record.dosage_per_intake > record.remaining_quantity {
        result.errors.push(ValidationError::DosageExceedsRemaining {
            dosage: record.dosage_per_intake,
            remaining: record.remaining_quantity,
        });
    }

    if record.low_stock_threshold > record.total_quantity {
        result.errors.push(ValidationError::ThresholdExceedsTotal {
            threshold: record.low_stock_threshold,
            total: record.total_quantity,
        });
    }

    result
}

/// The full check run by the medication form's save button.
pub fn validate_for_save(record: &MedicationRecord) -> ValidationResult {
    let mut result = validate_medication(record);
    let inventory = validate_inventory(record);
    // The dosage floor is checked by both; report it once
    let inventory = ValidationResult {
        errors: inventory
            .errors
            .into_iter()
            .filter(|e| !result.errors.contains(e))
            .collect(),
    };
    result = result.merge(inventory);
    result
}

/// Checks an intake record before it is stored.
///
/// `intake_time == 0` is accepted; the repository replaces it with "now".
pub fn validate_intake_record(record: &IntakeRecord) -> ValidationResult {
    let mut result = ValidationResult::default();

    if record.medication_name.trim().is_empty() {
        result.errors.push(ValidationError::required("medication name"));
    }
    result.check(validate_at_least(
        "dosage taken",
        i64::from(record.dosage_taken),
        1,
    ));
    result.check(validate_at_least("intake time", record.intake_time, 0));

    result
}

/// Checks diary content.
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most 5000 characters
pub fn validate_diary_content(content: &str) -> Result<(), ValidationError> {
    let content = content.trim();

    if content.is_empty() {
        return Err(ValidationError::required("content"));
    }

    if content.chars().count() > MAX_DIARY_CONTENT_LEN {
        return Err(ValidationError::too_long("content", MAX_DIARY_CONTENT_LEN));
    }

    Ok(())
}

/// Checks a diary entry before it is stored.
pub fn validate_diary_entry(entry: &HealthDiaryEntry) -> ValidationResult {
    let mut result = ValidationResult::default();
    result.check(validate_at_least("user id", entry.user_id, 1));
    result.check(validate_diary_content(&entry.content));
    result
}

/// Validates a username.
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most 50 characters
/// - Letters, digits, `_`, `-` and `.` only
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let username = username.trim();

    if username.is_empty() {
        return Err(ValidationError::required("username"));
    }

    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(ValidationError::too_long("username", MAX_USERNAME_LEN));
    }

    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        return Err(ValidationError::InvalidFormat {
            field: "username".to_string(),
            reason: "may contain only letters, digits, underscores, hyphens and dots"
                .to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// User Profile
// =============================================================================

/// Validates an email address.
///
/// ## Rules
/// - Exactly one `@` with a non-empty local part
/// - Local part: letters, digits and `. _ % + -`
/// - Domain: dot-separated labels of letters, digits and `-`, ending in a
///   top-level label of at least two letters
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let invalid = || ValidationError::InvalidFormat {
        field: "email".to_string(),
        reason: "expected an address like name@example.com".to_string(),
    };

    let (local, domain) = email.trim().split_once('@').ok_or_else(invalid)?;
    let local_ok = !local.is_empty()
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "._%+-".contains(c));
    let labels: Vec<&str> = domain.split('.').collect();
    let domain_ok = labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty() && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
        && labels
            .last()
            .is_some_and(|tld| tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic()));

    if local_ok && domain_ok {
        Ok(())
    } else {
        Err(invalid())
    }
}

/// Validates a phone number.
///
/// ## Rules
/// - Optional leading `+`
/// - Digits, spaces and `-` otherwise
/// - Between 7 and 15 digits
pub fn validate_phone(field: &str, phone: &str) -> Result<(), ValidationError> {
    let phone = phone.trim();
    let body = phone.strip_prefix('+').unwrap_or(phone);
    let digits = body.chars().filter(char::is_ascii_digit).count();

    if !body.chars().all(|c| c.is_ascii_digit() || c == ' ' || c == '-')
        || !(7..=15).contains(&digits)
    {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "expected 7 to 15 digits, optionally starting with +".to_string(),
        });
    }

    Ok(())
}

/// Validates a birth date: `YYYY-MM-DD`, not in the future.
pub fn validate_birth_date(date: &str) -> Result<(), ValidationError> {
    let parsed = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").map_err(|_| {
        ValidationError::InvalidFormat {
            field: "birth date".to_string(),
            reason: "expected YYYY-MM-DD".to_string(),
        }
    })?;

    if parsed > Utc::now().date_naive() {
        return Err(ValidationError::InvalidFormat {
            field: "birth date".to_string(),
            reason: "cannot be in the future".to_string(),
        });
    }

    Ok(())
}

/// Validates a blood type: `A`, `B`, `AB` or `O`, optionally followed by
/// `+` or `-`. Case-insensitive.
pub fn validate_blood_type(blood_type: &str) -> Result<(), ValidationError> {
    let upper = blood_type.trim().to_uppercase();
    let group = upper.strip_suffix(['+', '-']).unwrap_or(upper.as_str());

    if !matches!(group, "A" | "B" | "AB" | "O") {
        return Err(ValidationError::InvalidFormat {
            field: "blood type".to_string(),
            reason: "expected A, B, AB or O with optional + or -".to_string(),
        });
    }

    Ok(())
}

fn validate_max_len(field: &str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.trim().chars().count() > max {
        return Err(ValidationError::too_long(field, max));
    }
    Ok(())
}

/// Checks every set profile field of an account. Unset fields pass; the
/// username is checked separately at creation.
pub fn validate_user_profile(user: &UserAccount) -> ValidationResult {
    let mut result = ValidationResult::default();

    let names = [
        ("full name", &user.full_name),
        ("emergency contact name", &user.emergency_contact_name),
        ("doctor name", &user.doctor_name),
        ("hospital name", &user.hospital_name),
    ];
    for (field, value) in names {
        if let Some(value) = value {
            result.check(validate_max_len(field, value, MAX_PROFILE_NAME_LEN));
        }
    }

    if let Some(email) = &user.email {
        result.check(validate_email(email));
    }

    let phones = [
        ("phone", &user.phone),
        ("emergency contact phone", &user.emergency_contact_phone),
        ("doctor phone", &user.doctor_phone),
    ];
    for (field, value) in phones {
        if let Some(value) = value {
            result.check(validate_phone(field, value));
        }
    }

    if let Some(gender) = &user.gender {
        result.check(gender.parse::<Gender>().map(|_| ()));
    }
    if let Some(date) = &user.birth_date {
        result.check(validate_birth_date(date));
    }
    if let Some(blood_type) = &user.blood_type {
        result.check(validate_blood_type(blood_type));
    }

    let texts = [
        ("allergies", &user.allergies),
        ("medical conditions", &user.medical_conditions),
    ];
    for (field, value) in texts {
        if let Some(value) = value {
            result.check(validate_max_len(field, value, MAX_PROFILE_TEXT_LEN));
        }
    }

    result
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn aspirin() -> MedicationRecord {
        MedicationRecord::new("Aspirin", MedicationColor::White, DosageForm::Tablet)
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Aspirin").is_ok());
        assert!(validate_name("Co-Q10 (100mg) 1/2 tab + food.").is_ok());
        assert!(validate_name("  padded  ").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("   ").is_err());
        assert!(validate_name("Aspirin; DROP").is_err());
        assert!(validate_name("50%").is_err());
    }

    #[test]
    fn test_validate_name_length_counts_characters() {
        assert!(validate_name(&"药".repeat(100)).is_ok());
        assert_eq!(
            validate_name(&"a".repeat(101)),
            Err(ValidationError::too_long("name", 100))
        );
        // Surrounding whitespace does not count
        assert!(validate_name(&format!("  {}  ", "a".repeat(100))).is_ok());
    }

    #[test]
    fn test_validate_medication_collects_all_errors() {
        let mut record = aspirin();
        record.name = String::new();
        record.color = "white".to_string();
        record.dosage_form = "GUMMY".to_string();
        record.dosage_per_intake = 0;

        let result = validate_medication(&record);
        assert!(!result.is_valid());
        assert_eq!(result.errors.len(), 4);
        assert_eq!(result.messages()[0], "name is required");
        assert_eq!(result.first_error(), Some(&ValidationError::required("name")));
    }

    #[test]
    fn test_validate_inventory() {
        let mut record = aspirin();
        record.total_quantity = 30;
        record.remaining_quantity = 2;
        record.dosage_per_intake = 3;
        record.low_stock_threshold = 40;

        let result = validate_inventory(&record);
        assert_eq!(
            result.errors,
            vec![
                ValidationError::DosageExceedsRemaining {
                    dosage: 3,
                    remaining: 2
                },
                ValidationError::ThresholdExceedsTotal {
                    threshold: 40,
                    total: 30
                },
            ]
        );

        record.remaining_quantity = 30;
        record.low_stock_threshold = 5;
        assert!(validate_inventory(&record).is_valid());
    }

    #[test]
    fn test_validate_for_save_reports_dosage_floor_once() {
        let mut record = aspirin();
        record.total_quantity = 10;
        record.remaining_quantity = 10;
        record.dosage_per_intake = 0;

        let result = validate_for_save(&record);
        assert_eq!(
            result.errors,
            vec![ValidationError::too_small("dosage per intake", 1)]
        );
    }

    #[test]
    fn test_validate_intake_record() {
        assert!(validate_intake_record(&IntakeRecord::new("Aspirin", 0, 1)).is_valid());
        assert!(validate_intake_record(&IntakeRecord::new("Aspirin", 1_700_000_000_000, 2)).is_valid());

        let result = validate_intake_record(&IntakeRecord::new(" ", -5, 0));
        assert_eq!(result.errors.len(), 3);
    }

    #[test]
    fn test_validate_diary_content() {
        assert!(validate_diary_content("Felt dizzy after lunch").is_ok());
        assert!(validate_diary_content(" \n ").is_err());
        assert!(validate_diary_content(&"x".repeat(5000)).is_ok());
        assert!(validate_diary_content(&"x".repeat(5001)).is_err());
        assert!(!validate_diary_entry(&HealthDiaryEntry::new(0, "ok")).is_valid());
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("grandma.li").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username("has space").is_err());
        assert!(validate_username(&"u".repeat(51)).is_err());
    }

    #[test]
    fn test_validate_contact_fields() {
        assert!(validate_email("li.hua+meds@example.co").is_ok());
        assert!(validate_email("no-at-sign.example.com").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("me@localhost").is_err());
        assert!(validate_email("me@example.c0m").is_err());

        assert!(validate_phone("phone", "+86 138-0013-8000").is_ok());
        assert!(validate_phone("phone", "555-0100").is_ok());
        assert!(validate_phone("phone", "12345").is_err());
        assert!(validate_phone("phone", "call me").is_err());
    }

    #[test]
    fn test_validate_birth_date_and_blood_type() {
        assert!(validate_birth_date("1948-02-29").is_ok());
        assert!(validate_birth_date("1949-02-29").is_err());
        assert!(validate_birth_date("29/02/1948").is_err());
        assert!(validate_birth_date("2999-01-01").is_err());

        for ok in ["A", "b+", "AB-", " o+ "] {
            assert!(validate_blood_type(ok).is_ok(), "{ok}");
        }
        assert!(validate_blood_type("C+").is_err());
        assert!(validate_blood_type("AB+-").is_err());
    }

    #[test]
    fn test_validate_user_profile() {
        let mut user = UserAccount::new("grandma");
        assert!(validate_user_profile(&user).is_valid());

        user.email = Some("grandma@example.com".to_string());
        user.gender = Some("FEMALE".to_string());
        user.allergies = Some("Penicillin".to_string());
        assert!(validate_user_profile(&user).is_valid());

        user.gender = Some("female".to_string());
        user.doctor_phone = Some("abc".to_string());
        user.medical_conditions = Some("x".repeat(501));
        let result = validate_user_profile(&user);
        assert_eq!(result.errors.len(), 3);
        assert_eq!(result.messages()[2], "medical conditions must be at most 500 characters");
    }

    #[test]
    fn test_result_serializes_messages() {
        let result = validate_medication(&MedicationRecord::default());
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["errors"][0], "name is required");
    }
}

//! # Data Access Objects
//!
//! One struct per table, holding the SQL and nothing else.
//!
//! ## Layering
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Repository (async, off-caller, validation, change feed)               │
//! │       │                                                                 │
//! │       │  dao.insert(&record).await                                      │
//! │       ▼                                                                 │
//! │  DAO (this module)                                                     │
//! │  ├── one method = one statement (or one transaction)                   │
//! │  ├── returns DbResult<T>, rows_affected as-is                          │
//! │  └── never decides policy (not-found, duplicates, permissions)         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (sqlx pool)                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Timestamps are written exactly as given; repositories stamp them.

pub mod diary;
pub mod intake;
pub mod medication;
pub mod user;

pub use diary::HealthDiaryDao;
pub use intake::IntakeRecordDao;
pub use medication::{DoseDeduction, MedicationDao};
pub use user::UserDao;

/// Builds a `LIKE ... ESCAPE '\'` pattern matching `needle` anywhere.
pub(crate) fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("asp"), "%asp%");
        assert_eq!(contains_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(contains_pattern(""), "%%");
    }
}

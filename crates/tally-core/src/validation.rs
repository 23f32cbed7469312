//! # Input Checks
//!
//! Cheap checks on values entering the ledger, before anything is resolved
//! or written. Balance rules live in `BalancedJournal::seal`; uniqueness is
//! left to the database indexes.
//!
//! ```text
//!  outlet / counter codes ──► become suffixes of account codes (11102-OUT1)
//!  document refs          ──► (RefType, RefId) on the journal header
//!  float, declared cash   ──► must not be negative
//! ```

use crate::error::ValidationError;
use crate::money::Money;

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest outlet or counter code accepted.
pub const MAX_CODE_LEN: usize = 20;

/// Longest document reference accepted.
pub const MAX_REF_LEN: usize = 64;

fn required(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    if value.trim().is_empty() {
        Err(ValidationError::Required { field: field.into() })
    } else if value.len() > max {
        Err(ValidationError::TooLong { field: field.into(), max })
    } else {
        Ok(())
    }
}

fn code_segment(field: &str, value: &str) -> ValidationResult<()> {
    required(field, value, MAX_CODE_LEN)?;

    match value.chars().find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_')) {
        None => Ok(()),
        Some(bad) => Err(ValidationError::InvalidFormat {
            field: field.into(),
            reason: format!("'{}' cannot appear in an account code suffix", bad),
        }),
    }
}

/// Outlet codes are appended to account codes, so only `[A-Za-z0-9_-]`.
///
/// ```rust
/// use tally_core::validation::validate_outlet_code;
///
/// assert!(validate_outlet_code("OUT1").is_ok());
/// assert!(validate_outlet_code("").is_err());
/// assert!(validate_outlet_code("main street").is_err());
/// ```
pub fn validate_outlet_code(outlet_id: &str) -> ValidationResult<()> {
    code_segment("outlet_id", outlet_id)
}

pub fn validate_counter_id(counter_id: &str) -> ValidationResult<()> {
    code_segment("counter_id", counter_id)
}

pub fn validate_ref_id(ref_id: &str) -> ValidationResult<()> {
    required("ref_id", ref_id, MAX_REF_LEN)
}

pub fn validate_non_negative(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::Negative { field: field.into() });
    }
    Ok(())
}

//! # Ledger Context
//!
//! Who is acting, where, and at what time. Passed explicitly into every
//! ledger operation instead of being read from ambient state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Acting user and location for a ledger operation.
///
/// `outlet_id`/`counter_id` name the till the user is standing at; the
/// `*_here` till operations read them instead of taking explicit codes.
///
/// `pinned_now` fixes the clock (tests, back-dated imports); otherwise
/// [`LedgerContext::now`] reads the system clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerContext {
    pub user_id: String,
    pub outlet_id: Option<String>,
    pub counter_id: Option<String>,
    pub pinned_now: Option<DateTime<Utc>>,
}

impl LedgerContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        LedgerContext {
            user_id: user_id.into(),
            outlet_id: None,
            counter_id: None,
            pinned_now: None,
        }
    }

    pub fn with_outlet(mut self, outlet_id: impl Into<String>) -> Self {
        self.outlet_id = Some(outlet_id.into());
        self
    }

    pub fn with_counter(mut self, counter_id: impl Into<String>) -> Self {
        self.counter_id = Some(counter_id.into());
        self
    }

    /// Pins the clock.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.pinned_now = Some(now);
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.pinned_now.unwrap_or_else(Utc::now)
    }

    /// `(outlet, counter)` of the acting till.
    pub fn till_location(&self) -> Result<(&str, &str), ValidationError> {
        let outlet = self
            .outlet_id
            .as_deref()
            .ok_or_else(|| ValidationError::Required { field: "outlet_id".into() })?;
        let counter = self
            .counter_id
            .as_deref()
            .ok_or_else(|| ValidationError::Required { field: "counter_id".into() })?;
        Ok((outlet, counter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_pinned_clock() {
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let ctx = LedgerContext::new("u1").with_outlet("OUT1").with_counter("C1").at(t);
        assert_eq!(ctx.now(), t);
        assert_eq!(ctx.till_location().unwrap(), ("OUT1", "C1"));
    }

    #[test]
    fn test_till_location_needs_both_codes() {
        let outlet_only = LedgerContext::new("u1").with_outlet("OUT1");
        match outlet_only.till_location() {
            Err(ValidationError::Required { field }) => assert_eq!(field, "counter_id"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(LedgerContext::new("u1").with_counter("C1").till_location().is_err());
    }

    #[test]
    fn test_unpinned_clock_moves() {
        let ctx = LedgerContext::new("u1");
        let before = Utc::now();
        assert!(ctx.now() >= before);
    }
}

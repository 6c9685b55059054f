//! The `TestCase` record (spec.md §3) and the `Fixed` sum type that models
//! the legacy `fixed` string field (`""`, `"Yes"`, `"100:200"`) from
//! `original_source/bot/tasks/progression_task.py` as a real Rust type,
//! per Design Note "String-typed crash metadata".

use std::collections::HashMap;
use std::fmt;

/// Reserved metadata keys from spec.md §6, kept as named constants so call
/// sites never retype the string.
pub mod metadata_keys {
    pub const PROGRESSION_PENDING: &str = "progression_pending";
    pub const LAST_PROGRESSION_MIN: &str = "last_progression_min";
    pub const LAST_PROGRESSION_MAX: &str = "last_progression_max";
    pub const LAST_TESTED_CRASH_REVISION: &str = "last_tested_crash_revision";
    pub const LAST_TESTED_CRASH_TIME: &str = "last_tested_crash_time";
    pub const CLOSED_TIME: &str = "closed_time";
    pub const TRIAGE_MESSAGE: &str = "triage_message";
}

/// `fixed` modeled as a sum type instead of the source's free-form string.
/// `Display`/`FromStr` round-trip to the legacy persistence format so a
/// `TestCaseStore` backed by the real (string-typed) schema can still work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fixed {
    NotFixed,
    Yes,
    Range { min: i64, max: i64 },
}

impl Fixed {
    pub fn is_fixed(&self) -> bool {
        !matches!(self, Fixed::NotFixed)
    }
}

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fixed::NotFixed => write!(f, ""),
            Fixed::Yes => write!(f, "Yes"),
            Fixed::Range { min, max } => write!(f, "{min}:{max}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidFixedString;

impl std::str::FromStr for Fixed {
    type Err = InvalidFixedString;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Fixed::NotFixed);
        }
        if s == "Yes" {
            return Ok(Fixed::Yes);
        }
        let (min_str, max_str) = s.split_once(':').ok_or(InvalidFixedString)?;
        let min: i64 = min_str.parse().map_err(|_| InvalidFixedString)?;
        let max: i64 = max_str.parse().map_err(|_| InvalidFixedString)?;
        if min >= max {
            return Err(InvalidFixedString);
        }
        Ok(Fixed::Range { min, max })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub id: u64,
    pub crash_type: String,
    pub crash_state: String,
    pub security_flag: bool,
    pub reproducible: bool,
    pub group_id: Option<u64>,
    pub job_type: String,
    pub fuzzer_name: String,
    pub bug_information: Option<String>,
    pub regression_range: Option<String>,
    pub fixed: Fixed,
    pub open: bool,
    /// Set by the bisector when the known crash revision fails to
    /// reproduce twice in a row (spec.md §4.6 rule 2).
    pub one_time_crasher_flag: bool,
    pub metadata: HashMap<String, String>,
    /// Free-form comment trail, updated at each task state transition.
    pub comment: String,
    /// Monotonically increasing version, bumped by every
    /// [`crate::store::TestCaseStore::compare_and_swap`], so callers can
    /// retry on optimistic-concurrency conflicts.
    pub version: u64,
}

impl TestCase {
    pub fn new(id: u64, crash_type: impl Into<String>, crash_state: impl Into<String>, job_type: impl Into<String>, fuzzer_name: impl Into<String>) -> Self {
        TestCase {
            id,
            crash_type: crash_type.into(),
            crash_state: crash_state.into(),
            security_flag: false,
            reproducible: true,
            group_id: None,
            job_type: job_type.into(),
            fuzzer_name: fuzzer_name.into(),
            bug_information: None,
            regression_range: None,
            fixed: Fixed::NotFixed,
            open: true,
            one_time_crasher_flag: false,
            metadata: HashMap::new(),
            comment: String::new(),
            version: 0,
        }
    }

    /// Close the testcase with a concrete fix range, mirroring
    /// `_save_fixed_range`: `open` and `fixed` are updated together so the
    /// invariant in spec.md §3 ("either open, or closed with fixedRange
    /// set") can never observe a half-updated state.
    pub fn close_with_fixed_range(&mut self, min_revision: i64, max_revision: i64) {
        self.fixed = Fixed::Range { min: min_revision, max: max_revision };
        self.open = false;
    }

    /// Re-open a previously closed testcase. Spec.md §3: "Re-opening
    /// requires explicit clear."
    pub fn reopen(&mut self) {
        self.fixed = Fixed::NotFixed;
        self.open = true;
    }

    pub fn set_metadata(&mut self, key: &str, value: impl Into<String>) {
        self.metadata.insert(key.to_string(), value.into());
    }

    pub fn get_metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    pub fn delete_metadata(&mut self, key: &str) {
        self.metadata.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn fixed_round_trips_through_legacy_string() {
        for fixed in [Fixed::NotFixed, Fixed::Yes, Fixed::Range { min: 100, max: 200 }] {
            let s = fixed.to_string();
            assert_eq!(Fixed::from_str(&s).unwrap(), fixed);
        }
    }

    #[test]
    fn fixed_rejects_degenerate_range() {
        assert!(Fixed::from_str("200:100").is_err());
        assert!(Fixed::from_str("100:100").is_err());
    }

    #[test]
    fn close_with_fixed_range_keeps_open_and_fixed_in_sync() {
        let mut tc = TestCase::new(1, "heap-overflow", "state-a", "job", "fuzzer");
        assert!(tc.open);
        tc.close_with_fixed_range(100, 130);
        assert!(!tc.open);
        assert_eq!(tc.fixed, Fixed::Range { min: 100, max: 130 });
    }
}

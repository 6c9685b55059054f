//! Process-wide configuration, read from the environment exactly once at
//! worker start and threaded explicitly through [`crate::session::SessionRunner`]
//! and [`crate::bisect::ProgressionBisector`] from there on. Nothing below
//! this module calls `std::env::var` directly.

use std::collections::HashMap;
use std::env;

use crate::error::{FuzzCoreError, Result};

/// Postprocessing time reserved before a fuzz session's hard deadline, to
/// leave room for stats upload.
pub const POSTPROCESSING_TIME_SECONDS: f64 = 30.0;

pub const DEFAULT_MERGE_TIMEOUT_SECONDS: f64 = 30.0 * 60.0;
pub const DEFAULT_MUTATIONS_TIMEOUT_SECONDS: f64 = 10.0 * 60.0;
pub const DEFAULT_DICTIONARY_TIMEOUT_SECONDS: f64 = 5.0 * 60.0;

#[derive(Debug, Clone)]
pub struct Config {
    pub build_dir: Option<String>,
    pub dataflow_build_dir: Option<String>,
    pub fuzz_corpus_dir: Option<String>,
    pub fuzz_test_timeout: Option<f64>,
    pub max_fuzz_threads: u32,
    pub fuzzing_strategies: HashMap<String, f64>,
    pub hard_timeout_override: Option<f64>,
    pub merge_timeout_override: Option<f64>,
    pub mutations_timeout_override: Option<f64>,
    pub dictionary_timeout_override: Option<f64>,
    pub job_name: Option<String>,
    pub fuzzer_name: Option<String>,
    /// Open Question (spec.md §9): whether `fixedRange` is cleared when a
    /// progression task rediscovers the crash at the head revision. Default
    /// preserves a previously recorded range.
    pub clear_on_regression: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            build_dir: None,
            dataflow_build_dir: None,
            fuzz_corpus_dir: None,
            fuzz_test_timeout: None,
            max_fuzz_threads: 1,
            fuzzing_strategies: HashMap::new(),
            hard_timeout_override: None,
            merge_timeout_override: None,
            mutations_timeout_override: None,
            dictionary_timeout_override: None,
            job_name: None,
            fuzzer_name: None,
            clear_on_regression: false,
        }
    }
}

impl Config {
    /// Read every environment variable named in spec.md §6. A present but
    /// malformed numeric or JSON value is a hard error, not a silent
    /// fallback to the default.
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        config.build_dir = env::var("BUILD_DIR").ok();
        config.dataflow_build_dir = env::var("DATAFLOW_BUILD_DIR").ok();
        config.fuzz_corpus_dir = env::var("FUZZ_CORPUS_DIR").ok();
        config.job_name = env::var("JOB_NAME").ok();
        config.fuzzer_name = env::var("FUZZER_NAME").ok();

        config.fuzz_test_timeout = parse_optional_f64("FUZZ_TEST_TIMEOUT")?;
        config.hard_timeout_override = parse_optional_f64("HARD_TIMEOUT_OVERRIDE")?;
        config.merge_timeout_override = parse_optional_f64("MERGE_TIMEOUT_OVERRIDE")?;
        config.mutations_timeout_override = parse_optional_f64("MUTATIONS_TIMEOUT_OVERRIDE")?;
        config.dictionary_timeout_override = parse_optional_f64("DICTIONARY_TIMEOUT_OVERRIDE")?;

        if let Ok(raw) = env::var("MAX_FUZZ_THREADS") {
            config.max_fuzz_threads = raw
                .parse()
                .map_err(|_| FuzzCoreError::Config(format!("MAX_FUZZ_THREADS: invalid u32 {raw:?}")))?;
        }

        if let Ok(raw) = env::var("FUZZING_STRATEGIES") {
            config.fuzzing_strategies = serde_json::from_str(&raw).map_err(|e| {
                FuzzCoreError::Config(format!("FUZZING_STRATEGIES: invalid JSON map: {e}"))
            })?;
        }

        if let Ok(raw) = env::var("CLEAR_ON_REGRESSION") {
            config.clear_on_regression = raw == "1" || raw.eq_ignore_ascii_case("true");
        }

        Ok(config)
    }

    /// Construct a `Config` for deterministic unit/integration tests,
    /// bypassing the environment entirely.
    pub fn for_test() -> Self {
        Config::default()
    }

    pub fn hard_timeout(&self, total_timeout: Option<f64>) -> f64 {
        let total = total_timeout
            .or(self.fuzz_test_timeout)
            .unwrap_or(3600.0);
        let default = total - POSTPROCESSING_TIME_SECONDS;
        self.hard_timeout_override.unwrap_or(default).max(0.0)
    }

    pub fn merge_timeout(&self) -> f64 {
        self.merge_timeout_override
            .unwrap_or(DEFAULT_MERGE_TIMEOUT_SECONDS)
    }

    pub fn mutations_timeout(&self) -> f64 {
        self.mutations_timeout_override
            .unwrap_or(DEFAULT_MUTATIONS_TIMEOUT_SECONDS)
    }

    pub fn dictionary_timeout(&self) -> f64 {
        self.dictionary_timeout_override
            .unwrap_or(DEFAULT_DICTIONARY_TIMEOUT_SECONDS)
    }

    /// Fuzz child's own time budget once merge, dictionary analysis, and
    /// (optionally) mutation generation have each been carved out of the
    /// session's hard timeout. Mirrors `launcher.get_fuzz_timeout`.
    pub fn fuzz_timeout(&self, is_mutations_run: bool, total_timeout: Option<f64>) -> f64 {
        let mut budget = self.hard_timeout(total_timeout) - self.merge_timeout() - self.dictionary_timeout();
        if is_mutations_run {
            budget -= self.mutations_timeout();
        }
        budget.max(0.0)
    }
}

fn parse_optional_f64(var: &str) -> Result<Option<f64>> {
    match env::var(var) {
        Ok(raw) => raw
            .parse::<f64>()
            .map(Some)
            .map_err(|_| FuzzCoreError::Config(format!("{var}: invalid number {raw:?}"))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fuzz_timeout_subtracts_merge_and_dictionary_budgets() {
        let config = Config::for_test();
        let budget = config.fuzz_timeout(false, Some(3600.0));
        let expected = 3600.0 - POSTPROCESSING_TIME_SECONDS
            - DEFAULT_MERGE_TIMEOUT_SECONDS
            - DEFAULT_DICTIONARY_TIMEOUT_SECONDS;
        assert!((budget - expected).abs() < 1e-9);
    }

    #[test]
    fn fuzz_timeout_also_subtracts_mutations_budget_when_mutations_run() {
        let config = Config::for_test();
        let with = config.fuzz_timeout(true, Some(3600.0));
        let without = config.fuzz_timeout(false, Some(3600.0));
        assert!((without - with - DEFAULT_MUTATIONS_TIMEOUT_SECONDS).abs() < 1e-9);
    }

    #[test]
    fn fuzz_timeout_never_negative() {
        let config = Config::for_test();
        assert_eq!(config.fuzz_timeout(true, Some(0.0)), 0.0);
    }
}

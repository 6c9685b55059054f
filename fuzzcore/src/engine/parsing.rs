//! Log parsing helpers shared by the engine adapters, grounded in
//! `original_source/bot/fuzzers/libFuzzer/launcher.py`'s `parse_log_stats`,
//! `CRASH_TESTCASE_REGEX`, and `add_custom_crash_state_if_needed`.

use std::collections::HashMap;

use regex::Regex;

/// Matches libFuzzer/AFL-style `stat::name: value` lines emitted with
/// `-print_final_stats=1`.
fn stats_regex() -> Regex {
    Regex::new(r"^stat::([A-Za-z_]+):\s*(\S+)$").expect("static regex")
}

/// Matches `Test unit written to <path>` lines that name a crashing input,
/// mirroring `CRASH_TESTCASE_REGEX`.
fn crash_testcase_regex() -> Regex {
    Regex::new(r".*Test unit written to\s*(.*(crash|oom|timeout|leak)-.*)").expect("static regex")
}

/// Parse every `stat::name: value` line into an integer stats map. Lines
/// whose value isn't purely digits are skipped rather than failing the
/// whole parse, matching the original's "corrupted stats" tolerance.
pub fn parse_log_stats(log: &str) -> HashMap<String, i64> {
    let regex = stats_regex();
    let mut stats = HashMap::new();

    for line in log.lines() {
        let Some(captures) = regex.captures(line.trim()) else {
            continue;
        };
        let name = captures[1].to_string();
        let raw_value = &captures[2];
        if let Ok(value) = raw_value.parse::<i64>() {
            stats.insert(name, value);
        }
    }

    if let Some(&new_units_added) = stats.get("new_units_added") {
        stats.insert("new_units_generated".to_string(), new_units_added);
    }

    stats
}

/// Extract the path of the crashing input written by the engine, if the log
/// contains a "Test unit written to" line.
pub fn extract_crash_testcase_path(log: &str) -> Option<String> {
    let regex = crash_testcase_regex();
    for line in log.lines() {
        if let Some(captures) = regex.captures(line) {
            return Some(captures[1].trim().to_string());
        }
    }
    None
}

/// True if the log contains a sanitizer crash marker (`SUMMARY:` or
/// `DEATH:`), mirroring the condition in `add_custom_crash_state_if_needed`.
pub fn has_sanitizer_crash_marker(log: &str) -> bool {
    log.lines().any(|line| line.contains("SUMMARY:") || line.contains("DEATH:"))
}

/// Overlay stats parsed from a separate merge-step log onto the fuzz run's
/// stats, resolving `new_units_added` to the actual post-merge count.
/// Mirrors the `stat_overrides['new_units_added'] = new_units_added` dance
/// in `launcher.py`'s post-fuzz merge step.
pub fn apply_merge_stats(stats: &mut HashMap<String, i64>, new_units_added: i64) {
    stats.insert("new_units_added".to_string(), new_units_added);
}

/// Strip fuzzing-only flags (e.g. `-fork=`, `-merge=`) from an argument list
/// before using it for reproduction or minimization, mirroring
/// `fuzzer_utils.extract_argument`-style argument scrubbing in the launcher.
pub fn sanitize_arguments_for_reproduction(arguments: &[String]) -> Vec<String> {
    const FUZZING_ONLY_PREFIXES: &[&str] = &["-fork=", "-merge=", "-jobs=", "-workers=", "-runs="];
    arguments
        .iter()
        .filter(|arg| !FUZZING_ONLY_PREFIXES.iter().any(|p| arg.starts_with(p)))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stat_lines_and_skips_corrupted_ones() {
        let log = "stat::new_units_added: 7\nstat::exec_per_sec: 1200\nstat::weird: not-a-number\nnoise line\n";
        let stats = parse_log_stats(log);
        assert_eq!(stats.get("new_units_added"), Some(&7));
        assert_eq!(stats.get("exec_per_sec"), Some(&1200));
        assert_eq!(stats.get("new_units_generated"), Some(&7));
        assert!(!stats.contains_key("weird"));
    }

    #[test]
    fn extracts_crash_testcase_path() {
        let log = "==1234==ERROR\nTest unit written to ./crash-deadbeef\nSUMMARY: AddressSanitizer: heap-buffer-overflow";
        assert_eq!(extract_crash_testcase_path(log), Some("./crash-deadbeef".to_string()));
    }

    #[test]
    fn no_crash_path_when_absent() {
        assert_eq!(extract_crash_testcase_path("nothing interesting here"), None);
    }

    #[test]
    fn detects_sanitizer_markers() {
        assert!(has_sanitizer_crash_marker("foo\nSUMMARY: AddressSanitizer: bar\n"));
        assert!(has_sanitizer_crash_marker("DEATH: signal SIGSEGV\n"));
        assert!(!has_sanitizer_crash_marker("nothing to see here"));
    }

    #[test]
    fn strips_fuzzing_only_flags() {
        let args = vec![
            "-fork=4".to_string(),
            "-rss_limit_mb=2048".to_string(),
            "-merge=1".to_string(),
        ];
        let cleaned = sanitize_arguments_for_reproduction(&args);
        assert_eq!(cleaned, vec!["-rss_limit_mb=2048".to_string()]);
    }
}

//! Readers for the small plain-text files that sit beside a fuzz target
//! binary: `<target>.owners`, `<target>.labels`, `<target>.components`, and
//! `<target>.options`. Grounded in
//! `original_source/bot/fuzzers/engine_common.py`'s `get_issue_owners`,
//! `get_issue_metadata`, and `process_sanitizer_options_overrides`.
//!
//! The core only reads these; filing a bug against them is a Non-goal.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Lines to skip when reading an owners file, per the OWNERS file format
/// `get_issue_owners` partially supports (comments, wildcard, per-file/file:
/// directives that need a source checkout we don't have).
fn is_skippable_owners_line(line: &str) -> bool {
    line.is_empty() || line.starts_with('#') || line == "*" || line.starts_with("per-file") || line.starts_with("file:")
}

/// Read `<target>.owners` next to `target_path`. Missing file is not an
/// error — it simply yields no owners.
pub fn read_owners(target_path: &Path) -> Vec<String> {
    let Some(content) = read_supporting_file(target_path, "owners") else {
        return Vec::new();
    };

    content
        .lines()
        .map(str::trim)
        .filter(|line| !is_skippable_owners_line(line))
        .filter(|line| line.contains('@'))
        .map(str::to_string)
        .collect()
}

/// Read `<target>.labels`: one label per non-empty line.
pub fn read_labels(target_path: &Path) -> Vec<String> {
    read_delimited(target_path, "labels")
}

/// Read `<target>.components`: one component per non-empty line.
pub fn read_components(target_path: &Path) -> Vec<String> {
    read_delimited(target_path, "components")
}

fn read_delimited(target_path: &Path, extension: &str) -> Vec<String> {
    let Some(content) = read_supporting_file(target_path, extension) else {
        return Vec::new();
    };

    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn read_supporting_file(target_path: &Path, extension: &str) -> Option<String> {
    let path = target_path.with_extension(extension);
    fs::read_to_string(path).ok()
}

/// Sanitizer-option overrides parsed from a `<target>.options` file,
/// mirroring the `[asan]`/`[msan]`/`[ubsan]` sections
/// `options.get_fuzz_target_options` reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FuzzerOptions {
    pub asan: HashMap<String, String>,
    pub msan: HashMap<String, String>,
    pub ubsan: HashMap<String, String>,
}

impl FuzzerOptions {
    /// Read `<target>.options` next to `target_path`. Absence is not an
    /// error, per spec: "the core reads it opportunistically before launch
    /// ... absence is not an error."
    pub fn read(target_path: &Path) -> Option<FuzzerOptions> {
        let content = read_supporting_file(target_path, "options")?;
        Some(parse_options_file(&content))
    }

    /// Merge these overrides into an existing `<TOOL>_OPTIONS`-style
    /// colon-joined `key=value` string, overriding on key collision.
    pub fn merge_into(section: &HashMap<String, String>, existing: &str) -> String {
        let mut merged: HashMap<&str, &str> = existing
            .split(':')
            .filter(|kv| !kv.is_empty())
            .filter_map(|kv| kv.split_once('='))
            .collect();
        for (k, v) in section {
            merged.insert(k.as_str(), v.as_str());
        }
        let mut pairs: Vec<String> = merged.iter().map(|(k, v)| format!("{k}={v}")).collect();
        pairs.sort();
        pairs.join(":")
    }
}

fn parse_options_file(content: &str) -> FuzzerOptions {
    let mut options = FuzzerOptions::default();
    let mut current_section: Option<&mut HashMap<String, String>> = None;

    for raw_line in content.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(section_name) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            current_section = match section_name {
                "asan" => Some(&mut options.asan),
                "msan" => Some(&mut options.msan),
                "ubsan" => Some(&mut options.ubsan),
                _ => None,
            };
            continue;
        }
        if let (Some(section), Some((key, value))) = (current_section.as_deref_mut(), line.split_once('=')) {
            section.insert(key.trim().to_string(), value.trim().to_string());
        }
    }

    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn owners_file_filters_comments_wildcards_and_invalid_addresses() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("my_fuzzer");
        fs::write(
            dir.path().join("my_fuzzer.owners"),
            "# comment\n*\nper-file foo=bar\nalice@example.com\nnotanemail\n",
        )
        .unwrap();

        assert_eq!(read_owners(&target), vec!["alice@example.com".to_string()]);
    }

    #[test]
    fn missing_supporting_files_yield_empty_results() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("no_files_here");
        assert!(read_owners(&target).is_empty());
        assert!(read_labels(&target).is_empty());
        assert!(read_components(&target).is_empty());
        assert!(FuzzerOptions::read(&target).is_none());
    }

    #[test]
    fn labels_and_components_are_newline_delimited() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("my_fuzzer");
        fs::write(dir.path().join("my_fuzzer.labels"), "Security\nStability\n\n").unwrap();
        fs::write(dir.path().join("my_fuzzer.components"), "Core>Fuzzing\n").unwrap();

        assert_eq!(read_labels(&target), vec!["Security".to_string(), "Stability".to_string()]);
        assert_eq!(read_components(&target), vec!["Core>Fuzzing".to_string()]);
    }

    #[test]
    fn options_file_parses_sanitizer_sections() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("my_fuzzer");
        fs::write(
            dir.path().join("my_fuzzer.options"),
            "[libfuzzer]\nmax_len = 1024\n\n[asan]\nredzone=256\n\n[ubsan]\nhalt_on_error=1\n",
        )
        .unwrap();

        let options = FuzzerOptions::read(&target).unwrap();
        assert_eq!(options.asan.get("redzone"), Some(&"256".to_string()));
        assert_eq!(options.ubsan.get("halt_on_error"), Some(&"1".to_string()));
        assert!(options.msan.is_empty());
    }

    #[test]
    fn merge_into_overrides_existing_keys_and_keeps_others() {
        let mut overrides = HashMap::new();
        overrides.insert("redzone".to_string(), "256".to_string());
        let merged = FuzzerOptions::merge_into(&overrides, "detect_leaks=1:redzone=16");
        assert!(merged.contains("detect_leaks=1"));
        assert!(merged.contains("redzone=256"));
        assert!(!merged.contains("redzone=16"));
    }
}

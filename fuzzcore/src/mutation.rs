//! C3 — Mutation Generator (spec.md §4.3). Populates an output directory with
//! corpus-derived mutations ahead of a fuzzing run, using an external
//! byte-level mutator binary or delegating to a model-based generator.
//! Grounded in `original_source/bot/fuzzers/engine_common.py`'s
//! `generate_new_testcase_mutations_using_radamsa` and
//! `generate_new_testcase_mutations_using_ml_rnn`.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

use crate::corpus::directory_file_count;
use crate::process::BoundedProcess;

/// Number of mutation attempts per run, mirroring `RADAMSA_MUTATIONS`.
pub const MUTATION_ATTEMPTS: usize = 2000;
/// Per-attempt timeout, mirroring `RADAMSA_TIMEOUT`.
pub const MUTATION_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(3);
/// Corpus files above this size are skipped as mutation seeds, mirroring
/// `RADAMSA_INPUT_FILE_SIZE_LIMIT`.
pub const MUTATION_INPUT_SIZE_LIMIT: u64 = 2 * 1024 * 1024;

/// Which generator produced (or should produce) a batch of mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorKind {
    None,
    ByteLevel,
    ModelBased,
}

/// Handle to an external byte-level mutator binary (radamsa-shaped: takes
/// `-o <output> <input>` and writes one mutated file per invocation).
#[derive(Debug, Clone)]
pub struct ByteLevelMutator {
    pub binary_path: PathBuf,
}

/// Handle to an external model-based generator, invoked once for the whole
/// batch rather than once per seed file.
pub trait ModelBasedGenerator {
    fn execute(&self, corpus_dir: &Path, out_dir: &Path, budget: Duration) -> std::io::Result<()>;
}

/// Generate up to [`MUTATION_ATTEMPTS`] new testcases in `out_dir`, seeded
/// from files in `corpus_dir`, within `budget` wall-clock time. Returns
/// `true` iff the file count in `out_dir` strictly increased.
///
/// `kind == GeneratorKind::None` is a platform-degrade no-op: some platforms
/// ship no byte-level mutator binary, and callers fall back to this rather
/// than failing the session (spec.md §4.3).
pub fn generate_mutations(
    kind: GeneratorKind,
    byte_level: Option<&ByteLevelMutator>,
    model_based: Option<&dyn ModelBasedGenerator>,
    corpus_dir: &Path,
    out_dir: &Path,
    budget: Duration,
) -> std::io::Result<bool> {
    let before = directory_file_count(out_dir)?;

    match kind {
        GeneratorKind::None => {}
        GeneratorKind::ByteLevel => {
            if let Some(mutator) = byte_level {
                run_byte_level_mutations(mutator, corpus_dir, out_dir, budget)?;
            }
        }
        GeneratorKind::ModelBased => {
            if let Some(generator) = model_based {
                generator.execute(corpus_dir, out_dir, budget)?;
            }
        }
    }

    let after = directory_file_count(out_dir)?;
    Ok(after > before)
}

fn run_byte_level_mutations(
    mutator: &ByteLevelMutator,
    corpus_dir: &Path,
    out_dir: &Path,
    budget: Duration,
) -> std::io::Result<()> {
    let seeds = eligible_seed_files(corpus_dir)?;
    if seeds.is_empty() {
        return Ok(());
    }

    let deadline = Instant::now() + budget;

    for i in 0..MUTATION_ATTEMPTS {
        if Instant::now() >= deadline {
            break;
        }

        let seed = &seeds[i % seeds.len()];
        let original_filename = seed
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let output_path = out_dir.join(format!("mutation-{:08}-{}", i + 1, original_filename));

        let mut command = Command::new(&mutator.binary_path);
        command.arg("-o").arg(&output_path).arg(seed);

        let process = match BoundedProcess::spawn(command) {
            Ok(p) => p,
            Err(_) => break, // mutator binary missing or unusable: stop, keep whatever we have
        };

        let remaining = deadline.saturating_duration_since(Instant::now());
        let per_attempt = MUTATION_ATTEMPT_TIMEOUT.min(remaining.max(Duration::from_millis(1)));
        let outcome = process.wait_with_grace(per_attempt, Duration::from_secs(1))?;

        if outcome.timed_out {
            break; // exceeded per-attempt timeout: no more mutations this run
        }
    }

    Ok(())
}

fn eligible_seed_files(corpus_dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(corpus_dir)? {
        let entry = entry?;
        let meta = entry.metadata()?;
        if meta.is_file() && meta.len() <= MUTATION_INPUT_SIZE_LIMIT {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    struct FakeModelGenerator {
        files_to_write: usize,
    }

    impl ModelBasedGenerator for FakeModelGenerator {
        fn execute(&self, _corpus_dir: &Path, out_dir: &Path, _budget: Duration) -> std::io::Result<()> {
            for i in 0..self.files_to_write {
                fs::write(out_dir.join(format!("model-{i}")), b"x")?;
            }
            Ok(())
        }
    }

    #[test]
    fn none_kind_is_a_pure_no_op() {
        let corpus = tempdir().unwrap();
        let out = tempdir().unwrap();
        fs::write(corpus.path().join("seed"), b"abc").unwrap();

        let grew = generate_mutations(
            GeneratorKind::None,
            None,
            None,
            corpus.path(),
            out.path(),
            Duration::from_secs(1),
        )
        .unwrap();

        assert!(!grew);
        assert_eq!(directory_file_count(out.path()).unwrap(), 0);
    }

    #[test]
    fn model_based_generator_is_delegated_to() {
        let corpus = tempdir().unwrap();
        let out = tempdir().unwrap();
        let generator = FakeModelGenerator { files_to_write: 3 };

        let grew = generate_mutations(
            GeneratorKind::ModelBased,
            None,
            Some(&generator),
            corpus.path(),
            out.path(),
            Duration::from_secs(1),
        )
        .unwrap();

        assert!(grew);
        assert_eq!(directory_file_count(out.path()).unwrap(), 3);
    }

    #[test]
    fn byte_level_mutator_missing_binary_does_not_error() {
        let corpus = tempdir().unwrap();
        let out = tempdir().unwrap();
        fs::write(corpus.path().join("seed"), b"abc").unwrap();

        let mutator = ByteLevelMutator {
            binary_path: PathBuf::from("/nonexistent/radamsa-like-binary"),
        };

        let grew = generate_mutations(
            GeneratorKind::ByteLevel,
            Some(&mutator),
            None,
            corpus.path(),
            out.path(),
            Duration::from_secs(1),
        )
        .unwrap();

        assert!(!grew);
    }

    #[test]
    fn oversized_seed_files_are_excluded() {
        let corpus = tempdir().unwrap();
        fs::write(corpus.path().join("small"), b"x").unwrap();
        fs::write(
            corpus.path().join("large"),
            vec![0u8; MUTATION_INPUT_SIZE_LIMIT as usize + 1],
        )
        .unwrap();

        let seeds = eligible_seed_files(corpus.path()).unwrap();
        assert_eq!(seeds.len(), 1);
        assert!(seeds[0].ends_with("small"));
    }
}

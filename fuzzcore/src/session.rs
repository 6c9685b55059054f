//! C5 — Session Runner (spec.md §4.5). Orchestrates one fuzz session through
//! its state machine by composing the strategy pool (C1), corpus layout
//! (C2), mutation generator (C3), and engine adapter (C4). Grounded in
//! `original_source/bot/fuzzers/libFuzzer/launcher.py`'s top-level
//! `run` function, which does exactly this composition.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rand::Rng;

use crate::config::Config;
use crate::corpus;
use crate::engine::{parsing, CrashRecord, Engine, SessionResult};
use crate::error::{FuzzCoreError, Result};
use crate::mutation::{self, ByteLevelMutator, GeneratorKind, ModelBasedGenerator};
use crate::strategy::{self, StrategyTag, StrategyWeight};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    Prepared,
    Fuzzing,
    Parsed,
    Merged,
    MergeSkipped,
    Done,
    Failed,
}

/// Outcome of one session run: the terminal state plus whatever the engine
/// produced, per spec.md §4.5's "writes a stats record ... moves the crash
/// reproducer" side effects.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub state: SessionState,
    pub result: Option<SessionResult>,
    pub new_units_added: i64,
    pub crashes: Vec<CrashRecord>,
    pub error: Option<String>,
}

impl SessionOutcome {
    fn failed(error: FuzzCoreError) -> Self {
        SessionOutcome {
            state: SessionState::Failed,
            result: None,
            new_units_added: 0,
            crashes: Vec::new(),
            error: Some(error.to_string()),
        }
    }
}

/// Everything a session needs to provision its own scratch corpus directory
/// and run one fuzz pass, kept separate from [`Config`] because it varies
/// per invocation rather than per process.
pub struct SessionRequest<'a> {
    pub target_path: PathBuf,
    pub build_dir: PathBuf,
    pub primary_corpus_dir: PathBuf,
    pub reproducers_dir: PathBuf,
    pub session_scratch_dir: PathBuf,
    pub strategy_weights: Vec<StrategyWeight>,
    pub use_generator: bool,
    pub byte_level_mutator: Option<&'a ByteLevelMutator>,
    pub model_based_generator: Option<&'a dyn ModelBasedGenerator>,
}

pub struct SessionRunner<'a> {
    config: &'a Config,
    engine: &'a Engine,
}

impl<'a> SessionRunner<'a> {
    pub fn new(config: &'a Config, engine: &'a Engine) -> Self {
        SessionRunner { config, engine }
    }

    pub fn run<R: Rng>(&self, request: &SessionRequest<'_>, rng: &mut R) -> SessionOutcome {
        match self.run_inner(request, rng) {
            Ok(outcome) => outcome,
            Err(e) => SessionOutcome::failed(e),
        }
    }

    fn run_inner<R: Rng>(&self, request: &SessionRequest<'_>, rng: &mut R) -> Result<SessionOutcome> {
        // INIT -> PREPARED
        if !request.target_path.starts_with(&request.build_dir) {
            return Err(FuzzCoreError::InvalidTarget(request.target_path.clone()));
        }

        let pool = strategy::generate_weighted_strategy_pool(rng, &request.strategy_weights, request.use_generator);

        let adapter = self.engine.adapter();
        let mut options = adapter
            .prepare(&request.primary_corpus_dir, &request.target_path, &request.build_dir, &pool, rng)
            .map_err(|_| FuzzCoreError::InvalidTarget(request.target_path.clone()))?;

        let subset_dir = corpus::new_corpus_dir(&request.session_scratch_dir, "corpus")?;
        let subset_size = if pool.do_strategy(StrategyTag::CorpusSubset) {
            strategy::pick_corpus_subset_size(rng)
        } else {
            usize::MAX
        };
        corpus::copy_from_corpus(&subset_dir, &request.primary_corpus_dir, subset_size, rng)?;
        options.corpus_dir = subset_dir.clone();

        let generator_kind = if pool.do_strategy(StrategyTag::GeneratorByteLevel) {
            GeneratorKind::ByteLevel
        } else if pool.do_strategy(StrategyTag::GeneratorModelBased) {
            GeneratorKind::ModelBased
        } else {
            GeneratorKind::None
        };
        if generator_kind != GeneratorKind::None {
            mutation::generate_mutations(
                generator_kind,
                request.byte_level_mutator,
                request.model_based_generator,
                &request.primary_corpus_dir,
                &subset_dir,
                Duration::from_secs_f64(self.config.mutations_timeout()),
            )?;
        }

        options.is_mutations_run = generator_kind != GeneratorKind::None;
        let pre_fuzz_count = corpus::directory_file_count(&subset_dir)?;

        // PREPARED -> FUZZING -> PARSED
        let fuzz_budget = Duration::from_secs_f64(self.config.fuzz_timeout(options.is_mutations_run, None));
        let mut result = adapter
            .fuzz(&request.target_path, &options, &request.reproducers_dir, fuzz_budget)
            .map_err(|e| FuzzCoreError::Engine(e.to_string()))?;

        // PARSED -> MERGED | MERGE_SKIPPED
        let post_fuzz_count = corpus::directory_file_count(&subset_dir)?;
        let new_units_generated = post_fuzz_count.saturating_sub(pre_fuzz_count);

        let new_units_added = if new_units_generated > 0 {
            let pre_merge_count = corpus::directory_file_count(&request.primary_corpus_dir)?;
            let merge_timeout = Duration::from_secs_f64(self.config.merge_timeout());
            match adapter.minimize_corpus(
                &request.target_path,
                &options.arguments,
                &request.primary_corpus_dir,
                &[subset_dir.clone()],
                merge_timeout,
            ) {
                Ok(_) => {
                    let post_merge_count = corpus::directory_file_count(&request.primary_corpus_dir)?;
                    post_merge_count as i64 - pre_merge_count as i64
                }
                Err(FuzzCoreError::MergeTimedOut) | Err(FuzzCoreError::MergeFailed(_)) | Err(FuzzCoreError::Engine(_)) => {
                    // Non-fatal per spec.md §7: fall back to a local
                    // survivor merge rather than dropping newly discovered
                    // units on the floor.
                    result.stats.insert("merge_error".to_string(), 1);
                    corpus::move_mergeable_units(&subset_dir, &request.primary_corpus_dir)? as i64
                }
                Err(e) => return Err(e),
            }
        } else {
            0
        };

        parsing::apply_merge_stats(&mut result.stats, new_units_added);

        cleanup_scratch(&subset_dir);

        Ok(SessionOutcome {
            state: SessionState::Done,
            crashes: result.crashes.clone(),
            result: Some(result),
            new_units_added,
            error: None,
        })
    }
}

fn cleanup_scratch(dir: &Path) {
    let _ = std::fs::remove_dir_all(dir);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::NoneEngine;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn rejects_target_outside_build_dir() {
        let config = Config::for_test();
        let engine = Engine::None(NoneEngine);
        let runner = SessionRunner::new(&config, &engine);

        let root = tempdir().unwrap();
        let build_dir = root.path().join("build");
        fs::create_dir_all(&build_dir).unwrap();
        let target = root.path().join("elsewhere").join("target");

        let request = SessionRequest {
            target_path: target,
            build_dir,
            primary_corpus_dir: root.path().join("corpus"),
            reproducers_dir: root.path().join("repro"),
            session_scratch_dir: root.path().join("scratch"),
            strategy_weights: Vec::new(),
            use_generator: false,
            byte_level_mutator: None,
            model_based_generator: None,
        };

        let mut rng = StdRng::seed_from_u64(0);
        let outcome = runner.run(&request, &mut rng);
        assert_eq!(outcome.state, SessionState::Failed);
        assert!(outcome.error.unwrap().contains("target"));
    }
}

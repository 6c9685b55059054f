//! C4 — Engine Adapter (spec.md §4.4). An engine-agnostic contract over
//! libFuzzer-like and AFL-like fuzzing engines, grounded in
//! `original_source/bot/fuzzers/engine.py`'s `Engine`/`FuzzOptions`/`Result`
//! classes. Kept as a closed tagged union rather than dynamic dispatch, per
//! spec.md §4.4's explicit guidance.

mod afl_like;
mod libfuzzer_like;
mod none;
pub mod parsing;

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use rand::RngCore;

use crate::error::{FuzzCoreError, Result};
use crate::strategy::StrategyPool;

pub use afl_like::AflLikeEngine;
pub use libfuzzer_like::LibFuzzerLikeEngine;
pub use none::NoneEngine;

/// Options an adapter's `prepare` step hands to `fuzz`, mirroring
/// `engine.FuzzOptions`. Immutable once returned by `prepare` (spec.md §3),
/// aside from the corpus-subset substitution the session runner performs
/// before sampling, which predates `prepare` having a say in subset sizing.
#[derive(Debug, Clone)]
pub struct FuzzOptions {
    pub corpus_dir: PathBuf,
    pub arguments: Vec<String>,
    pub strategies: StrategyPool,
    /// Additional corpus directories to fuzz with besides `corpus_dir`,
    /// e.g. a freshly unpacked seed corpus. Unioned with `corpus_dir` at the
    /// engine's positional-argument convention allows (libFuzzer); AFL-style
    /// engines, which take a single `-i` directory, ignore this.
    pub extra_corpus_dirs: Vec<PathBuf>,
    /// Environment variables to inject into the fuzz child process, notably
    /// `ASAN_OPTIONS`/`MSAN_OPTIONS`/`UBSAN_OPTIONS` overrides read from a
    /// `<target>.options` file (see `metadata_files::FuzzerOptions`).
    pub extra_env: HashMap<String, String>,
    pub use_dataflow_tracing: bool,
    pub is_mutations_run: bool,
}

/// Sanitizer-option overrides from `<target>.options`, keyed by the
/// environment variable each section maps to. Shared by every adapter's
/// `prepare` since the override mechanism is engine-independent.
pub(crate) fn sanitizer_env_overrides(target_path: &std::path::Path) -> HashMap<String, String> {
    let mut env = HashMap::new();
    let Some(options) = crate::metadata_files::FuzzerOptions::read(target_path) else {
        return env;
    };

    for (key, section) in [
        ("ASAN_OPTIONS", &options.asan),
        ("MSAN_OPTIONS", &options.msan),
        ("UBSAN_OPTIONS", &options.ubsan),
    ] {
        if section.is_empty() {
            continue;
        }
        env.insert(key.to_string(), crate::metadata_files::FuzzerOptions::merge_into(section, ""));
    }

    env
}

/// A crash discovered during a fuzz session, mirroring `engine.Crash`.
#[derive(Debug, Clone)]
pub struct CrashRecord {
    pub input_path: PathBuf,
    pub stacktrace: String,
    pub reproduce_args: Vec<String>,
    pub crash_time: Duration,
}

/// The result of one `fuzz` invocation, mirroring `engine.Result`.
#[derive(Debug, Clone)]
pub struct SessionResult {
    pub logs: String,
    pub command: Vec<String>,
    pub crashes: Vec<CrashRecord>,
    pub stats: HashMap<String, i64>,
    pub time_executed: Duration,
}

/// The result of one `reproduce` invocation, mirroring `engine.ReproduceResult`.
#[derive(Debug, Clone)]
pub struct ReproduceResult {
    pub return_code: i32,
    pub time_executed: Duration,
    pub output: String,
}

/// Common adapter contract every engine kind implements. `minimize_corpus`,
/// `minimize_testcase`, and `cleanse` are optional per spec.md §4.4 and
/// default to reporting themselves unsupported.
pub trait EngineAdapter {
    fn name(&self) -> &'static str;

    /// Build this run's [`FuzzOptions`] from the corpus/target/build
    /// directories plus the strategies the session already sampled. `rng` is
    /// threaded through for strategies that need their own randomness at
    /// prepare time (e.g. `-max_len=` for `randomMaxLength`).
    fn prepare(
        &self,
        corpus_dir: &std::path::Path,
        target_path: &std::path::Path,
        build_dir: &std::path::Path,
        strategies: &StrategyPool,
        rng: &mut dyn RngCore,
    ) -> Result<FuzzOptions>;

    fn fuzz(
        &self,
        target_path: &std::path::Path,
        options: &FuzzOptions,
        reproducers_dir: &std::path::Path,
        max_time: Duration,
    ) -> Result<SessionResult>;

    fn reproduce(
        &self,
        target_path: &std::path::Path,
        input_path: &std::path::Path,
        arguments: &[String],
        max_time: Duration,
    ) -> Result<ReproduceResult>;

    fn minimize_corpus(
        &self,
        _target_path: &std::path::Path,
        _arguments: &[String],
        _output_dir: &std::path::Path,
        _input_dirs: &[PathBuf],
        _max_time: Duration,
    ) -> Result<SessionResult> {
        Err(FuzzCoreError::Engine(format!("{} does not support corpus minimization", self.name())))
    }

    fn minimize_testcase(
        &self,
        _target_path: &std::path::Path,
        _arguments: &[String],
        _input_path: &std::path::Path,
        _output_path: &std::path::Path,
        _max_time: Duration,
    ) -> Result<bool> {
        Ok(false)
    }

    /// Reduce a crashing input to the smallest variant that still reproduces
    /// the same crash, writing it to `output_path` and leaving the original
    /// at `input_path` untouched. Mirrors `minimize_testcase`'s shape with
    /// `-cleanse_crash=1` instead of `-minimize_crash=1`.
    fn cleanse(
        &self,
        _target_path: &std::path::Path,
        _arguments: &[String],
        _input_path: &std::path::Path,
        _output_path: &std::path::Path,
        _max_time: Duration,
    ) -> Result<bool> {
        Ok(false)
    }
}

/// The closed set of engine kinds this crate knows how to run, per spec.md
/// §4.4's "closed tagged union, not dynamic dispatch" guidance.
pub enum Engine {
    LibFuzzerLike(LibFuzzerLikeEngine),
    AflLike(AflLikeEngine),
    None(NoneEngine),
}

impl Engine {
    pub fn adapter(&self) -> &dyn EngineAdapter {
        match self {
            Engine::LibFuzzerLike(e) => e,
            Engine::AflLike(e) => e,
            Engine::None(e) => e,
        }
    }

    /// Look an engine up by its registered name (spec.md §4.4's
    /// name-keyed registry), mirroring `engine.get`/`engine.register_engine`
    /// but resolved statically over the closed set above instead of a
    /// mutable global dict.
    pub fn by_name(name: &str) -> Result<Engine> {
        match name {
            "libfuzzer" => Ok(Engine::LibFuzzerLike(LibFuzzerLikeEngine::default())),
            "afl" => Ok(Engine::AflLike(AflLikeEngine::default())),
            "none" => Ok(Engine::None(NoneEngine)),
            other => Err(FuzzCoreError::UnknownEngine(other.to_string())),
        }
    }
}

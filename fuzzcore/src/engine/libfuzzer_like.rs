//! libFuzzer-shaped adapter: one target binary, libFuzzer-style CLI flags
//! (`-max_total_time=`, `-artifact_prefix=`, `-fork=`), grounded in
//! `original_source/bot/fuzzers/libFuzzer/engine.py` and `launcher.py`.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

use rand::RngCore;

use crate::error::{FuzzCoreError, Result};
use crate::process::BoundedProcess;
use crate::strategy::{pick_random_max_len, StrategyPool, StrategyTag};

use super::parsing::{extract_crash_testcase_path, has_sanitizer_crash_marker, parse_log_stats, sanitize_arguments_for_reproduction};
use super::{sanitizer_env_overrides, CrashRecord, EngineAdapter, FuzzOptions, ReproduceResult, SessionResult};

/// Grace window before a hard kill once the deadline has passed. Fork mode
/// needs a much longer window to let worker processes flush state, mirroring
/// the 110s fork-mode grace noted in spec.md §5.
const GRACE_DEFAULT: Duration = Duration::from_secs(10);
const GRACE_FORK_MODE: Duration = Duration::from_secs(110);

#[derive(Debug, Clone, Default)]
pub struct LibFuzzerLikeEngine;

impl LibFuzzerLikeEngine {
    fn grace_for(arguments: &[String]) -> Duration {
        if arguments.iter().any(|a| a.starts_with("-fork=")) {
            GRACE_FORK_MODE
        } else {
            GRACE_DEFAULT
        }
    }
}

impl EngineAdapter for LibFuzzerLikeEngine {
    fn name(&self) -> &'static str {
        "libfuzzer"
    }

    fn prepare(
        &self,
        corpus_dir: &Path,
        target_path: &Path,
        _build_dir: &Path,
        strategies: &StrategyPool,
        rng: &mut dyn RngCore,
    ) -> Result<FuzzOptions> {
        let mut arguments = vec!["-rss_limit_mb=2048".to_string(), "-timeout=25".to_string()];

        let dict_path = target_path.with_extension("dict");
        if dict_path.exists() {
            arguments.push(format!("-dict={}", dict_path.display()));
        }

        if strategies.do_strategy(StrategyTag::RandomMaxLength) {
            arguments.push(format!("-max_len={}", pick_random_max_len(rng)));
        }

        if strategies.do_strategy(StrategyTag::ValueProfile) {
            arguments.push("-use_value_profile=1".to_string());
        }

        Ok(FuzzOptions {
            corpus_dir: corpus_dir.to_path_buf(),
            arguments,
            strategies: strategies.clone(),
            extra_corpus_dirs: Vec::new(),
            extra_env: sanitizer_env_overrides(target_path),
            use_dataflow_tracing: strategies.do_strategy(StrategyTag::DataflowTracing),
            is_mutations_run: false,
        })
    }

    fn fuzz(
        &self,
        target_path: &Path,
        options: &FuzzOptions,
        reproducers_dir: &Path,
        max_time: Duration,
    ) -> Result<SessionResult> {
        let mut command = Command::new(target_path);
        command
            .arg(format!("-max_total_time={}", max_time.as_secs()))
            .arg(format!("-artifact_prefix={}/", reproducers_dir.display()))
            .arg("-print_final_stats=1")
            .args(&options.arguments)
            .envs(&options.extra_env)
            .arg(&options.corpus_dir)
            .args(&options.extra_corpus_dirs);

        let grace = Self::grace_for(&options.arguments);
        let process = BoundedProcess::spawn(command).map_err(|e| FuzzCoreError::Engine(e.to_string()))?;
        let started = Instant::now();
        let outcome = process
            .wait_with_grace(max_time, grace)
            .map_err(|e| FuzzCoreError::Engine(e.to_string()))?;
        let log = outcome.output_string();

        let mut crashes = Vec::new();
        if has_sanitizer_crash_marker(&log) {
            if let Some(input_path) = extract_crash_testcase_path(&log) {
                crashes.push(CrashRecord {
                    input_path: PathBuf::from(input_path),
                    stacktrace: log.clone(),
                    reproduce_args: sanitize_arguments_for_reproduction(&options.arguments),
                    crash_time: started.elapsed(),
                });
            }
        }

        Ok(SessionResult {
            stats: parse_log_stats(&log),
            logs: log,
            command: describe_command(target_path, &options.arguments),
            crashes,
            time_executed: outcome.wall_time,
        })
    }

    fn reproduce(&self, target_path: &Path, input_path: &Path, arguments: &[String], max_time: Duration) -> Result<ReproduceResult> {
        let mut command = Command::new(target_path);
        command
            .args(sanitize_arguments_for_reproduction(arguments))
            .arg(input_path);

        let process = BoundedProcess::spawn(command).map_err(|e| FuzzCoreError::Engine(e.to_string()))?;
        let outcome = process
            .wait_with_grace(max_time, GRACE_DEFAULT)
            .map_err(|e| FuzzCoreError::Engine(e.to_string()))?;

        Ok(ReproduceResult {
            return_code: outcome.status.and_then(|s| s.code()).unwrap_or(-1),
            time_executed: outcome.wall_time,
            output: outcome.output_string(),
        })
    }

    fn minimize_testcase(
        &self,
        target_path: &Path,
        arguments: &[String],
        input_path: &Path,
        output_path: &Path,
        max_time: Duration,
    ) -> Result<bool> {
        let mut command = Command::new(target_path);
        command
            .arg("-minimize_crash=1")
            .arg(format!("-exact_artifact_path={}", output_path.display()))
            .args(sanitize_arguments_for_reproduction(arguments))
            .arg(input_path);

        let process = BoundedProcess::spawn(command).map_err(|e| FuzzCoreError::Engine(e.to_string()))?;
        let outcome = process
            .wait_with_grace(max_time, GRACE_DEFAULT)
            .map_err(|e| FuzzCoreError::Engine(e.to_string()))?;

        Ok(!outcome.timed_out && output_path.exists())
    }

    fn minimize_corpus(
        &self,
        target_path: &Path,
        arguments: &[String],
        output_dir: &Path,
        input_dirs: &[PathBuf],
        max_time: Duration,
    ) -> Result<SessionResult> {
        let mut command = Command::new(target_path);
        command
            .arg("-merge=1")
            .args(sanitize_arguments_for_reproduction(arguments))
            .arg(output_dir)
            .args(input_dirs);

        let process = BoundedProcess::spawn(command).map_err(|e| FuzzCoreError::Engine(e.to_string()))?;
        let outcome = process
            .wait_with_grace(max_time, GRACE_DEFAULT)
            .map_err(|e| FuzzCoreError::Engine(e.to_string()))?;
        let log = outcome.output_string();

        if outcome.timed_out {
            return Err(FuzzCoreError::MergeTimedOut);
        }
        if !outcome.status.map(|s| s.success()).unwrap_or(false) {
            return Err(FuzzCoreError::MergeFailed(log));
        }

        Ok(SessionResult {
            stats: parse_log_stats(&log),
            command: describe_command(target_path, arguments),
            logs: log,
            crashes: Vec::new(),
            time_executed: outcome.wall_time,
        })
    }

    fn cleanse(
        &self,
        target_path: &Path,
        arguments: &[String],
        input_path: &Path,
        output_path: &Path,
        max_time: Duration,
    ) -> Result<bool> {
        let mut command = Command::new(target_path);
        command
            .arg("-cleanse_crash=1")
            .arg(format!("-exact_artifact_path={}", output_path.display()))
            .args(sanitize_arguments_for_reproduction(arguments))
            .arg(input_path);

        let process = BoundedProcess::spawn(command).map_err(|e| FuzzCoreError::Engine(e.to_string()))?;
        let outcome = process
            .wait_with_grace(max_time, GRACE_DEFAULT)
            .map_err(|e| FuzzCoreError::Engine(e.to_string()))?;

        Ok(!outcome.timed_out && output_path.exists())
    }
}

fn describe_command(target_path: &Path, arguments: &[String]) -> Vec<String> {
    let mut command = vec![target_path.display().to_string()];
    command.extend(arguments.iter().cloned());
    command
}

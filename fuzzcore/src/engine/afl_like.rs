//! AFL-shaped adapter: driver binary plus `-i`/`-o` corpus directories
//! instead of libFuzzer's single positional corpus argument. Grounded in the
//! same `engine.Engine` contract as the libFuzzer adapter, adapted to AFL's
//! argument conventions as described in spec.md §4.4's "engine-agnostic"
//! requirement.

use std::path::Path;
use std::process::Command;
use std::time::{Duration, Instant};

use rand::RngCore;

use crate::error::{FuzzCoreError, Result};
use crate::process::BoundedProcess;
use crate::strategy::{StrategyPool, StrategyTag};

use super::parsing::{has_sanitizer_crash_marker, parse_log_stats, sanitize_arguments_for_reproduction};
use super::{sanitizer_env_overrides, CrashRecord, EngineAdapter, FuzzOptions, ReproduceResult, SessionResult};

const GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Default)]
pub struct AflLikeEngine;

impl EngineAdapter for AflLikeEngine {
    fn name(&self) -> &'static str {
        "afl"
    }

    fn prepare(
        &self,
        corpus_dir: &Path,
        target_path: &Path,
        _build_dir: &Path,
        strategies: &StrategyPool,
        _rng: &mut dyn RngCore,
    ) -> Result<FuzzOptions> {
        Ok(FuzzOptions {
            corpus_dir: corpus_dir.to_path_buf(),
            arguments: Vec::new(),
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
            .arg("-i")
            .arg(&options.corpus_dir)
            .arg("-o")
            .arg(reproducers_dir)
            .args(&options.arguments)
            .envs(&options.extra_env);

        let process = BoundedProcess::spawn(command).map_err(|e| FuzzCoreError::Engine(e.to_string()))?;
        let started = Instant::now();
        let outcome = process
            .wait_with_grace(max_time, GRACE)
            .map_err(|e| FuzzCoreError::Engine(e.to_string()))?;
        let log = outcome.output_string();

        let mut crashes = Vec::new();
        if has_sanitizer_crash_marker(&log) {
            let crashes_dir = reproducers_dir.join("crashes");
            if let Ok(entries) = std::fs::read_dir(&crashes_dir) {
                for entry in entries.flatten() {
                    crashes.push(CrashRecord {
                        input_path: entry.path(),
                        stacktrace: log.clone(),
                        reproduce_args: sanitize_arguments_for_reproduction(&options.arguments),
                        crash_time: started.elapsed(),
                    });
                }
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
            .wait_with_grace(max_time, GRACE)
            .map_err(|e| FuzzCoreError::Engine(e.to_string()))?;

        Ok(ReproduceResult {
            return_code: outcome.status.and_then(|s| s.code()).unwrap_or(-1),
            time_executed: outcome.wall_time,
            output: outcome.output_string(),
        })
    }
}

fn describe_command(target_path: &Path, arguments: &[String]) -> Vec<String> {
    let mut command = vec![target_path.display().to_string()];
    command.extend(arguments.iter().cloned());
    command
}

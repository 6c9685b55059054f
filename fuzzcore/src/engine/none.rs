//! The "no engine" adapter: every operation reports itself unsupported
//! rather than running a subprocess. Used when no fuzzing engine is
//! configured for a build, mirroring the platform-degrade policy noted
//! in spec.md §4.3/§4.4 for environments missing a fuzzing toolchain.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use rand::RngCore;

use crate::error::{FuzzCoreError, Result};
use crate::strategy::StrategyPool;

use super::{EngineAdapter, FuzzOptions, ReproduceResult, SessionResult};

#[derive(Debug, Clone, Copy, Default)]
pub struct NoneEngine;

impl EngineAdapter for NoneEngine {
    fn name(&self) -> &'static str {
        "none"
    }

    fn prepare(
        &self,
        corpus_dir: &Path,
        _target_path: &Path,
        _build_dir: &Path,
        strategies: &StrategyPool,
        _rng: &mut dyn RngCore,
    ) -> Result<FuzzOptions> {
        Ok(FuzzOptions {
            corpus_dir: corpus_dir.to_path_buf(),
            arguments: Vec::new(),
            strategies: strategies.clone(),
            extra_corpus_dirs: Vec::new(),
            extra_env: HashMap::new(),
            use_dataflow_tracing: false,
            is_mutations_run: false,
        })
    }

    fn fuzz(&self, _target_path: &Path, _options: &FuzzOptions, _reproducers_dir: &Path, _max_time: Duration) -> Result<SessionResult> {
        Err(FuzzCoreError::Engine("no fuzzing engine configured".to_string()))
    }

    fn reproduce(&self, _target_path: &Path, _input_path: &Path, _arguments: &[String], _max_time: Duration) -> Result<ReproduceResult> {
        Err(FuzzCoreError::Engine("no fuzzing engine configured".to_string()))
    }
}

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;

use fuzzcore::bisect::{EngineRevisionReproducer, ProgressionBisector};
use fuzzcore::config::Config;
use fuzzcore::data::{RevisionList, TestCase};
use fuzzcore::engine::Engine;
use fuzzcore::session::{SessionRequest, SessionRunner};
use fuzzcore::strategy::{StrategyTag, StrategyWeight};

use crate::RunCommand;

#[derive(Clone, Debug, Parser)]
pub struct Fuzz {
    /// Path to the fuzz target binary
    pub target: PathBuf,

    /// Directory the target binary must live under
    #[arg(long)]
    pub build_dir: PathBuf,

    /// Primary corpus directory
    #[arg(long)]
    pub corpus_dir: PathBuf,

    /// Directory to write crash reproducers into
    #[arg(long)]
    pub reproducers_dir: PathBuf,

    /// Engine adapter to run the target under
    #[arg(long, default_value = "libfuzzer")]
    pub engine: String,

    /// Total session time budget, in seconds
    #[arg(long, default_value_t = 60)]
    pub max_time_seconds: u64,

    /// Seed for the strategy-selection RNG, for reproducible sessions
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Enable the corpus-mutation generator strategies
    #[arg(long)]
    pub use_generator: bool,
}

impl RunCommand for Fuzz {
    fn run_command(&self) -> Result<()> {
        let config = Config::from_env().context("reading configuration from environment")?;
        let engine = Engine::by_name(&self.engine).with_context(|| format!("unknown engine {:?}", self.engine))?;

        let scratch_dir = tempfile::tempdir().context("creating session scratch directory")?;
        let strategy_weights = strategy_weights_from_config(&config);

        let request = SessionRequest {
            target_path: self.target.clone(),
            build_dir: self.build_dir.clone(),
            primary_corpus_dir: self.corpus_dir.clone(),
            reproducers_dir: self.reproducers_dir.clone(),
            session_scratch_dir: scratch_dir.path().to_path_buf(),
            strategy_weights,
            use_generator: self.use_generator,
            byte_level_mutator: None,
            model_based_generator: None,
        };

        let runner = SessionRunner::new(&config, &engine);
        let mut rng = StdRng::seed_from_u64(self.seed);
        let outcome = runner.run(&request, &mut rng);

        log::info!(
            "session finished: state={:?} new_units_added={} crashes={}",
            outcome.state,
            outcome.new_units_added,
            outcome.crashes.len()
        );
        println!("{}", serde_json::to_string_pretty(&SessionOutcomeView::from(&outcome))?);

        if let Some(error) = &outcome.error {
            bail!("session failed: {error}");
        }

        Ok(())
    }
}

fn strategy_weights_from_config(config: &Config) -> Vec<StrategyWeight> {
    config
        .fuzzing_strategies
        .iter()
        .filter_map(|(name, weight)| StrategyTag::from_name(name).map(|tag| StrategyWeight { tag, weight: *weight }))
        .collect()
}

#[derive(serde::Serialize)]
struct SessionOutcomeView {
    state: String,
    new_units_added: i64,
    crash_count: usize,
    stats: std::collections::HashMap<String, i64>,
}

impl From<&fuzzcore::session::SessionOutcome> for SessionOutcomeView {
    fn from(outcome: &fuzzcore::session::SessionOutcome) -> Self {
        SessionOutcomeView {
            state: format!("{:?}", outcome.state),
            new_units_added: outcome.new_units_added,
            crash_count: outcome.crashes.len(),
            stats: outcome.result.as_ref().map(|r| r.stats.clone()).unwrap_or_default(),
        }
    }
}

#[derive(Clone, Debug, Parser)]
pub struct Bisect {
    /// Crash type string stored on the testcase (e.g. "heap-buffer-overflow")
    #[arg(long)]
    pub crash_type: String,

    /// Crash state string stored on the testcase
    #[arg(long)]
    pub crash_state: String,

    /// Comma-separated, strictly-increasing revision list to bisect over
    #[arg(long, value_delimiter = ',')]
    pub revisions: Vec<i64>,

    /// Template for a revision's target binary path; `{revision}` is
    /// substituted with the integer revision number
    #[arg(long)]
    pub target_template: String,

    /// Total bisection time budget, in seconds
    #[arg(long, default_value_t = 600)]
    pub max_time_seconds: u64,

    /// Per-reproduction-trial time budget, in seconds
    #[arg(long, default_value_t = 30)]
    pub trial_time_seconds: u64,

    /// Whether this invocation is a retry after a first flaky-looking result
    #[arg(long)]
    pub is_retry: bool,
}

impl RunCommand for Bisect {
    fn run_command(&self) -> Result<()> {
        let engine = Engine::by_name("libfuzzer")?;
        let template = self.target_template.clone();

        let reproducer = EngineRevisionReproducer {
            adapter: engine.adapter(),
            resolve_target: move |revision: i64| -> fuzzcore::Result<PathBuf> {
                Ok(PathBuf::from(template.replace("{revision}", &revision.to_string())))
            },
            max_time: Duration::from_secs(self.trial_time_seconds),
        };

        let bisector = ProgressionBisector::new(&reproducer, false);
        let mut revisions = RevisionList::new_checked(self.revisions.clone())
            .map_err(|_| anyhow::anyhow!("revision list must be non-empty and strictly increasing"))?;
        let mut testcase = TestCase::new(0, self.crash_type.clone(), self.crash_state.clone(), "job".to_string(), "fuzzer".to_string());

        let deadline = Instant::now() + Duration::from_secs(self.max_time_seconds);
        let outcome = bisector.run(&mut testcase, &mut revisions, deadline, self.is_retry)?;

        log::info!("bisection finished: {outcome:?}");
        println!("{outcome:?}");
        Ok(())
    }
}

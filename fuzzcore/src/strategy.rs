//! C1 — Strategy Pool (spec.md §4.1). Weighted random selection of enabled
//! fuzzing strategies for one session, sampled once at session start.
//! Grounded in `original_source/bot/fuzzers/libFuzzer/launcher.py`'s
//! `pick_strategies` and `engine_common.get_strategy_probability` /
//! `decide_with_probability`.

use std::collections::HashSet;

use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyTag {
    CorpusSubset,
    DataflowTracing,
    RecommendedDictionary,
    RandomMaxLength,
    ValueProfile,
    Fork,
    MutatorPlugin,
    GeneratorByteLevel,
    GeneratorModelBased,
}

impl StrategyTag {
    pub fn name(&self) -> &'static str {
        match self {
            StrategyTag::CorpusSubset => "corpus_subset",
            StrategyTag::DataflowTracing => "dataflow_tracing",
            StrategyTag::RecommendedDictionary => "recommended_dict",
            StrategyTag::RandomMaxLength => "random_max_len",
            StrategyTag::ValueProfile => "value_profile",
            StrategyTag::Fork => "fork",
            StrategyTag::MutatorPlugin => "mutator_plugin",
            StrategyTag::GeneratorByteLevel => "corpus_mutations_byte_level",
            StrategyTag::GeneratorModelBased => "corpus_mutations_model_based",
        }
    }

    pub const ALL: [StrategyTag; 9] = [
        StrategyTag::CorpusSubset,
        StrategyTag::DataflowTracing,
        StrategyTag::RecommendedDictionary,
        StrategyTag::RandomMaxLength,
        StrategyTag::ValueProfile,
        StrategyTag::Fork,
        StrategyTag::MutatorPlugin,
        StrategyTag::GeneratorByteLevel,
        StrategyTag::GeneratorModelBased,
    ];

    /// Inverse of [`StrategyTag::name`], used to interpret the
    /// `FUZZING_STRATEGIES` configuration map (spec.md §6).
    pub fn from_name(name: &str) -> Option<StrategyTag> {
        Self::ALL.into_iter().find(|tag| tag.name() == name)
    }
}

/// One strategy's declared weight in `[0, 1]`, read from configuration
/// (spec.md §4.1 "Policy knobs").
#[derive(Debug, Clone, Copy)]
pub struct StrategyWeight {
    pub tag: StrategyTag,
    pub weight: f64,
}

/// An immutable set of enabled strategy tags for one session (spec.md §3).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StrategyPool {
    enabled: HashSet<StrategyTag>,
}

impl StrategyPool {
    pub fn do_strategy(&self, tag: StrategyTag) -> bool {
        self.enabled.contains(&tag)
    }

    pub fn enabled_tags(&self) -> impl Iterator<Item = &StrategyTag> {
        self.enabled.iter()
    }

    /// Names of enabled strategies, for the structured `cf::fuzzing_strategies:
    /// a,b,c` style log field (SPEC_FULL.md "Fuzzing strategy logging line").
    pub fn format_for_log(&self) -> String {
        let mut names: Vec<&str> = self.enabled.iter().map(StrategyTag::name).collect();
        names.sort_unstable();
        names.join(",")
    }

    fn insert(&mut self, tag: StrategyTag) {
        self.enabled.insert(tag);
    }
}

/// Sample which strategies are enabled for one session. `rng` is injected so
/// tests can pass a seeded RNG for determinism, per spec.md §4.1.
///
/// `use_generator`, when true, forces selection of exactly one of the two
/// mutator-generator strategies (byte-level vs. model-based), weighted by
/// their relative declared weight; when false, neither is ever selected
/// regardless of its individual weight.
pub fn generate_weighted_strategy_pool<R: Rng + ?Sized>(
    rng: &mut R,
    available: &[StrategyWeight],
    use_generator: bool,
) -> StrategyPool {
    let mut pool = StrategyPool::default();

    for entry in available {
        if matches!(
            entry.tag,
            StrategyTag::GeneratorByteLevel | StrategyTag::GeneratorModelBased
        ) {
            continue; // handled separately below
        }
        if decide_with_probability(rng, entry.weight) {
            pool.insert(entry.tag);
        }
    }

    if use_generator {
        if let Some(tag) = pick_one_generator(rng, available) {
            pool.insert(tag);
        }
    }

    // DataflowTracing mutually implies fork mode (spec.md §4.1).
    if pool.do_strategy(StrategyTag::DataflowTracing) {
        pool.insert(StrategyTag::Fork);
    }

    pool
}

fn decide_with_probability<R: Rng + ?Sized>(rng: &mut R, probability: f64) -> bool {
    rng.gen::<f64>() < probability.clamp(0.0, 1.0)
}

fn pick_one_generator<R: Rng + ?Sized>(rng: &mut R, available: &[StrategyWeight]) -> Option<StrategyTag> {
    let byte_level = available
        .iter()
        .find(|s| s.tag == StrategyTag::GeneratorByteLevel)
        .map(|s| s.weight)
        .unwrap_or(0.0);
    let model_based = available
        .iter()
        .find(|s| s.tag == StrategyTag::GeneratorModelBased)
        .map(|s| s.weight)
        .unwrap_or(0.0);

    let total = byte_level + model_based;
    if total <= 0.0 {
        return None;
    }

    if rng.gen::<f64>() < byte_level / total {
        Some(StrategyTag::GeneratorByteLevel)
    } else {
        Some(StrategyTag::GeneratorModelBased)
    }
}

/// The fixed weighted bag of corpus-subset sizes from
/// `engine_common.CORPUS_SUBSET_NUM_TESTCASES`, biased toward the middle of
/// the range by repeating 75/100/125.
pub const CORPUS_SUBSET_SIZES: &[usize] = &[10, 20, 50, 75, 75, 100, 100, 100, 125, 125, 150];

pub fn pick_corpus_subset_size<R: Rng + ?Sized>(rng: &mut R) -> usize {
    CORPUS_SUBSET_SIZES[rng.gen_range(0..CORPUS_SUBSET_SIZES.len())]
}

/// Bounds for a randomly chosen `-max_len=` when `randomMaxLength` is
/// selected, per spec.md §4.4.
pub const MIN_RANDOM_MAX_LEN: usize = 1024;
pub const MAX_RANDOM_MAX_LEN: usize = 1_048_576;

pub fn pick_random_max_len<R: Rng + ?Sized>(rng: &mut R) -> usize {
    rng.gen_range(MIN_RANDOM_MAX_LEN..=MAX_RANDOM_MAX_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sample(seed: u64, available: &[StrategyWeight], use_generator: bool) -> StrategyPool {
        let mut rng = StdRng::seed_from_u64(seed);
        generate_weighted_strategy_pool(&mut rng, available, use_generator)
    }

    #[test]
    fn weight_zero_never_selected() {
        let available = [StrategyWeight { tag: StrategyTag::ValueProfile, weight: 0.0 }];
        for seed in 0..50 {
            assert!(!sample(seed, &available, false).do_strategy(StrategyTag::ValueProfile));
        }
    }

    #[test]
    fn weight_one_always_selected() {
        let available = [StrategyWeight { tag: StrategyTag::ValueProfile, weight: 1.0 }];
        for seed in 0..50 {
            assert!(sample(seed, &available, false).do_strategy(StrategyTag::ValueProfile));
        }
    }

    #[test]
    fn use_generator_selects_exactly_one_when_weights_present() {
        let available = [
            StrategyWeight { tag: StrategyTag::GeneratorByteLevel, weight: 0.5 },
            StrategyWeight { tag: StrategyTag::GeneratorModelBased, weight: 0.5 },
        ];
        for seed in 0..50 {
            let pool = sample(seed, &available, true);
            let byte_level = pool.do_strategy(StrategyTag::GeneratorByteLevel);
            let model_based = pool.do_strategy(StrategyTag::GeneratorModelBased);
            assert_ne!(byte_level, model_based);
        }
    }

    #[test]
    fn without_use_generator_neither_is_selected() {
        let available = [
            StrategyWeight { tag: StrategyTag::GeneratorByteLevel, weight: 1.0 },
            StrategyWeight { tag: StrategyTag::GeneratorModelBased, weight: 1.0 },
        ];
        let pool = sample(7, &available, false);
        assert!(!pool.do_strategy(StrategyTag::GeneratorByteLevel));
        assert!(!pool.do_strategy(StrategyTag::GeneratorModelBased));
    }

    #[test]
    fn dataflow_tracing_implies_fork() {
        let available = [StrategyWeight { tag: StrategyTag::DataflowTracing, weight: 1.0 }];
        let pool = sample(1, &available, false);
        assert!(pool.do_strategy(StrategyTag::DataflowTracing));
        assert!(pool.do_strategy(StrategyTag::Fork));
    }

    #[test]
    fn same_seed_is_deterministic() {
        let available = [
            StrategyWeight { tag: StrategyTag::ValueProfile, weight: 0.4 },
            StrategyWeight { tag: StrategyTag::CorpusSubset, weight: 0.6 },
        ];
        assert_eq!(sample(42, &available, false), sample(42, &available, false));
    }
}

//! C6 — Progression Bisector (spec.md §4.6). Binary search over a
//! [`RevisionList`] for the adjacent revision pair at which a crash stopped
//! reproducing, with the latest-revision guard, min-revision flaky guard,
//! and per-step checkpointing spec.md §4.6 requires. Grounded in
//! `original_source/bot/tasks/progression_task.py`'s `find_fixed_range`.

use std::time::{Duration, Instant};

use crate::data::{metadata_keys, Fixed, RevisionList, TestCase};
use crate::engine::EngineAdapter;
use crate::error::{FuzzCoreError, Result};

/// Number of reproduction trials per tested revision before declaring it
/// non-crashing, per spec.md §4.6's "reproduces = any trial produces a crash
/// of the same crashType AND crashState".
pub const CRASH_RETRIES: u32 = 3;

/// Outcome of one bisection attempt, mirroring the branches
/// `find_fixed_range` can take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BisectOutcome {
    /// The crash still reproduces at the latest revision; no range was set.
    StillCrashesAtHead { revision: i64 },
    /// The known crash revision no longer reproduces and this was the first
    /// such failure; the task should be requeued for a second opinion.
    RequeuedForFlakyRecheck,
    /// The known crash revision still does not reproduce on the second
    /// attempt; the case is marked potentially flaky.
    PotentiallyFlaky,
    /// Bisection converged on an adjacent revision pair.
    FixedRange { min: i64, max: i64 },
    /// The deadline was exceeded mid-bisection; checkpoint is already
    /// written to the TestCase, caller should requeue.
    DeadlineExceeded,
}

/// Checks whether a crash reproduces at a given revision, abstracting over
/// how the caller maps a revision to a build to run C4.reproduce against.
/// Returning `Err(FuzzCoreError::BadBuild { .. })` causes the bisector to
/// drop that revision from the working list and continue, per spec.md §4.6
/// rule 3.
pub trait RevisionReproducer {
    fn reproduces(&self, revision: i64, testcase: &TestCase) -> Result<bool>;
}

/// Adapts an [`EngineAdapter`] plus a revision-to-build-path resolver into a
/// [`RevisionReproducer`], running up to [`CRASH_RETRIES`] trials and
/// comparing `(crashType, crashState)` against the stored TestCase.
pub struct EngineRevisionReproducer<'a, F> {
    pub adapter: &'a dyn EngineAdapter,
    pub resolve_target: F,
    pub max_time: Duration,
}

impl<'a, F> RevisionReproducer for EngineRevisionReproducer<'a, F>
where
    F: Fn(i64) -> Result<std::path::PathBuf>,
{
    fn reproduces(&self, revision: i64, testcase: &TestCase) -> Result<bool> {
        let target_path = (self.resolve_target)(revision)?;
        if !target_path.exists() {
            return Err(FuzzCoreError::BadBuild { revision });
        }

        for _ in 0..CRASH_RETRIES {
            let result = self
                .adapter
                .reproduce(&target_path, &testcase_input_path(testcase), &[], self.max_time)?;
            if classify_crash(&result.output) == (testcase.crash_type.clone(), testcase.crash_state.clone()) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

fn testcase_input_path(testcase: &TestCase) -> std::path::PathBuf {
    std::path::PathBuf::from(format!("testcase-{}", testcase.id))
}

/// Heuristic crash classification from reproduce output, reused at bisection
/// time so `(crashType, crashState)` identity matches whatever the session
/// runner originally recorded. Real crash-state computation is stack-trace
/// specific and out of scope; callers needing it should override by
/// constructing `EngineRevisionReproducer` with a resolver that captures
/// state out of band.
fn classify_crash(output: &str) -> (String, String) {
    if crate::engine::parsing::has_sanitizer_crash_marker(output) {
        ("crash".to_string(), output.lines().next().unwrap_or("").to_string())
    } else {
        (String::new(), String::new())
    }
}

pub struct ProgressionBisector<'a, R: RevisionReproducer> {
    reproducer: &'a R,
    clear_on_regression: bool,
}

impl<'a, R: RevisionReproducer> ProgressionBisector<'a, R> {
    pub fn new(reproducer: &'a R, clear_on_regression: bool) -> Self {
        ProgressionBisector { reproducer, clear_on_regression }
    }

    /// Run (or resume) bisection for `testcase` over `revisions`, honoring
    /// `deadline`. `testcase`'s `last_progression_min`/`last_progression_max`
    /// metadata, if present, narrow the starting working range so a
    /// restarted worker resumes instead of restarting (spec.md §4.6
    /// checkpointing, Testable Property 5).
    ///
    /// `is_retry_attempt` is owned by the task queue, not the TestCase: the
    /// min-revision guard (rule 2) requeues once on first failure and the
    /// caller re-invokes with `is_retry_attempt = true`, mirroring
    /// `is_first_retry_for_task` being a task-delivery property rather than
    /// persisted crash metadata.
    pub fn run(&self, testcase: &mut TestCase, revisions: &mut RevisionList, deadline: Instant, is_retry_attempt: bool) -> Result<BisectOutcome> {
        if testcase.fixed.is_fixed() {
            return Ok(BisectOutcome::FixedRange {
                min: 0,
                max: 0,
            });
        }

        testcase.set_metadata(metadata_keys::PROGRESSION_PENDING, "true");

        let min_revision = testcase
            .get_metadata(metadata_keys::LAST_PROGRESSION_MIN)
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(testcase_known_crash_revision(testcase));
        let max_revision = testcase
            .get_metadata(metadata_keys::LAST_PROGRESSION_MAX)
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or_else(|| *revisions.revisions().last().unwrap());

        let mut min_index = revisions
            .find_min_revision_index(min_revision)
            .ok_or(FuzzCoreError::BuildNotFound { revision: min_revision })?;
        let mut max_index = revisions
            .find_max_revision_index(max_revision)
            .ok_or(FuzzCoreError::BuildNotFound { revision: max_revision })?;

        // Rule 1: latest-revision guard.
        let head_revision = revisions.get(max_index).unwrap();
        if self.reproducer.reproduces(head_revision, testcase)? {
            testcase.set_metadata(metadata_keys::LAST_TESTED_CRASH_REVISION, head_revision.to_string());
            testcase.one_time_crasher_flag = false;
            if self.clear_on_regression {
                testcase.fixed = Fixed::NotFixed;
            }
            return Ok(BisectOutcome::StillCrashesAtHead { revision: head_revision });
        }

        // Rule 2: min-revision guard.
        let min_known_revision = revisions.get(min_index).unwrap();
        if !self.reproducer.reproduces(min_known_revision, testcase)? {
            if !is_retry_attempt {
                return Ok(BisectOutcome::RequeuedForFlakyRecheck);
            }
            testcase.one_time_crasher_flag = true;
            return Ok(BisectOutcome::PotentiallyFlaky);
        }

        // Rule 3: bisection loop.
        loop {
            if Instant::now() >= deadline {
                checkpoint(testcase, revisions, min_index, max_index);
                return Ok(BisectOutcome::DeadlineExceeded);
            }

            if max_index <= min_index || max_index - min_index <= 1 {
                break;
            }

            let mid = (min_index + max_index) / 2;
            let mid_revision = revisions.get(mid).unwrap();

            match self.reproducer.reproduces(mid_revision, testcase) {
                Ok(true) => min_index = mid,
                Ok(false) => max_index = mid,
                Err(FuzzCoreError::BadBuild { .. }) => {
                    revisions.remove(mid);
                    if mid <= max_index {
                        max_index -= 1;
                    }
                    if mid < min_index {
                        min_index -= 1;
                    }
                    continue;
                }
                Err(e) => return Err(e),
            }

            checkpoint(testcase, revisions, min_index, max_index);
        }

        let final_min = revisions.get(min_index).unwrap();
        let final_max = revisions.get(max_index).unwrap();

        testcase.close_with_fixed_range(final_min, final_max);
        testcase.set_metadata(metadata_keys::CLOSED_TIME, "now");

        Ok(BisectOutcome::FixedRange { min: final_min, max: final_max })
    }
}

fn testcase_known_crash_revision(testcase: &TestCase) -> i64 {
    testcase
        .get_metadata(metadata_keys::LAST_TESTED_CRASH_REVISION)
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(0)
}

fn checkpoint(testcase: &mut TestCase, revisions: &RevisionList, min_index: usize, max_index: usize) {
    let min_revision = revisions.get(min_index).unwrap_or(0);
    let max_revision = revisions.get(max_index).unwrap_or(0);
    testcase.set_metadata(metadata_keys::LAST_PROGRESSION_MIN, min_revision.to_string());
    testcase.set_metadata(metadata_keys::LAST_PROGRESSION_MAX, max_revision.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    struct ScriptedReproducer {
        /// revision -> reproduces?
        script: RefCell<HashMap<i64, bool>>,
        bad_builds: Vec<i64>,
    }

    impl RevisionReproducer for ScriptedReproducer {
        fn reproduces(&self, revision: i64, _testcase: &TestCase) -> Result<bool> {
            if self.bad_builds.contains(&revision) {
                return Err(FuzzCoreError::BadBuild { revision });
            }
            Ok(*self.script.borrow().get(&revision).unwrap_or(&false))
        }
    }

    fn testcase() -> TestCase {
        TestCase::new(1, "crash", "state", "job", "fuzzer")
    }

    #[test]
    fn still_crashes_at_head_sets_no_fixed_range() {
        let mut script = HashMap::new();
        for r in [100, 110, 120, 130, 140] {
            script.insert(r, true);
        }
        let reproducer = ScriptedReproducer { script: RefCell::new(script), bad_builds: vec![] };
        let bisector = ProgressionBisector::new(&reproducer, false);

        let mut revisions = RevisionList::new(vec![100, 110, 120, 130, 140]).unwrap();
        let mut tc = testcase();
        let outcome = bisector.run(&mut tc, &mut revisions, Instant::now() + Duration::from_secs(60), false).unwrap();

        assert_eq!(outcome, BisectOutcome::StillCrashesAtHead { revision: 140 });
        assert!(!tc.fixed.is_fixed());
    }

    #[test]
    fn simple_bisection_converges_on_adjacent_pair() {
        let mut script = HashMap::new();
        for r in [100, 110, 120] {
            script.insert(r, true);
        }
        for r in [130, 140] {
            script.insert(r, false);
        }
        let reproducer = ScriptedReproducer { script: RefCell::new(script), bad_builds: vec![] };
        let bisector = ProgressionBisector::new(&reproducer, false);

        let mut revisions = RevisionList::new(vec![100, 110, 120, 130, 140]).unwrap();
        let mut tc = testcase();
        let outcome = bisector.run(&mut tc, &mut revisions, Instant::now() + Duration::from_secs(60), false).unwrap();

        assert_eq!(outcome, BisectOutcome::FixedRange { min: 120, max: 130 });
        assert!(tc.fixed.is_fixed());
        assert!(!tc.open);
    }

    #[test]
    fn bad_build_is_skipped_and_bisection_continues() {
        let mut script = HashMap::new();
        for r in [100, 110] {
            script.insert(r, true);
        }
        for r in [130, 140] {
            script.insert(r, false);
        }
        let reproducer = ScriptedReproducer { script: RefCell::new(script), bad_builds: vec![120] };
        let bisector = ProgressionBisector::new(&reproducer, false);

        let mut revisions = RevisionList::new(vec![100, 110, 120, 130, 140]).unwrap();
        let mut tc = testcase();
        let outcome = bisector.run(&mut tc, &mut revisions, Instant::now() + Duration::from_secs(60), false).unwrap();

        assert_eq!(outcome, BisectOutcome::FixedRange { min: 110, max: 130 });
    }

    #[test]
    fn min_revision_guard_requeues_once_then_marks_flaky() {
        let reproducer = ScriptedReproducer { script: RefCell::new(HashMap::new()), bad_builds: vec![] };
        let bisector = ProgressionBisector::new(&reproducer, false);

        let mut revisions = RevisionList::new(vec![100, 110, 120]).unwrap();
        let mut tc = testcase();
        let first = bisector.run(&mut tc, &mut revisions, Instant::now() + Duration::from_secs(60), false).unwrap();
        assert_eq!(first, BisectOutcome::RequeuedForFlakyRecheck);

        let second = bisector.run(&mut tc, &mut revisions, Instant::now() + Duration::from_secs(60), true).unwrap();
        assert_eq!(second, BisectOutcome::PotentiallyFlaky);
        assert!(tc.one_time_crasher_flag);
    }
}

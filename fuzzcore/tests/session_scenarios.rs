//! End-to-end session scenarios driven against a fake libFuzzer-shaped
//! target: a short shell script standing in for the real binary, exercising
//! the session runner against an actual child process rather than a mock
//! adapter. Covers the clean-session and crash-found cases from spec.md §8
//! (S1, S2); the bisection scenarios (S3-S6) are covered as unit tests in
//! `bisect.rs` since they don't need a live subprocess.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use rand::rngs::StdRng;
use rand::SeedableRng;

use fuzzcore::config::Config;
use fuzzcore::engine::{Engine, LibFuzzerLikeEngine};
use fuzzcore::session::{SessionRequest, SessionRunner, SessionState};

fn write_script(path: &Path, body: &str) {
    fs::write(path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

fn seed_corpus(dir: &Path, names: &[&str]) {
    fs::create_dir_all(dir).unwrap();
    for name in names {
        fs::write(dir.join(name), b"seed").unwrap();
    }
}

#[test]
fn clean_session_reports_no_crashes_and_zero_new_units() {
    let build_dir = tempfile::tempdir().unwrap();
    let target = build_dir.path().join("fake_target");
    write_script(&target, "echo 'stat::number_of_executed_units: 100'\necho 'stat::new_units_added: 0'\nexit 0");

    let corpus_dir = tempfile::tempdir().unwrap();
    seed_corpus(corpus_dir.path(), &["a", "b"]);
    let reproducers_dir = tempfile::tempdir().unwrap();
    let scratch_dir = tempfile::tempdir().unwrap();

    let engine = Engine::LibFuzzerLike(LibFuzzerLikeEngine::default());
    let config = Config::for_test();
    let runner = SessionRunner::new(&config, &engine);

    let request = SessionRequest {
        target_path: target,
        build_dir: build_dir.path().to_path_buf(),
        primary_corpus_dir: corpus_dir.path().to_path_buf(),
        reproducers_dir: reproducers_dir.path().to_path_buf(),
        session_scratch_dir: scratch_dir.path().to_path_buf(),
        strategy_weights: Vec::new(),
        use_generator: false,
        byte_level_mutator: None,
        model_based_generator: None,
    };

    let mut rng = StdRng::seed_from_u64(1);
    let outcome = runner.run(&request, &mut rng);

    assert_eq!(outcome.state, SessionState::Done);
    assert!(outcome.error.is_none());
    assert!(outcome.crashes.is_empty());
    assert_eq!(outcome.new_units_added, 0);
    let stats = outcome.result.unwrap().stats;
    assert_eq!(stats.get("number_of_executed_units"), Some(&100));
}

#[test]
fn crash_is_surfaced_with_its_reproducer_path() {
    let build_dir = tempfile::tempdir().unwrap();
    let target = build_dir.path().join("fake_target");
    write_script(
        &target,
        "for a in \"$@\"; do case \"$a\" in -artifact_prefix=*) dir=\"${a#-artifact_prefix=}\";; esac; done\n\
         echo '==1234==ERROR: AddressSanitizer: heap-buffer-overflow'\n\
         echo 'SUMMARY: AddressSanitizer: heap-buffer-overflow'\n\
         echo \"Test unit written to ${dir}crash-deadbeef\"\n\
         touch \"${dir}crash-deadbeef\"\n\
         exit 1",
    );

    let corpus_dir = tempfile::tempdir().unwrap();
    seed_corpus(corpus_dir.path(), &["a"]);
    let reproducers_dir = tempfile::tempdir().unwrap();
    let scratch_dir = tempfile::tempdir().unwrap();

    let engine = Engine::LibFuzzerLike(LibFuzzerLikeEngine::default());
    let config = Config::for_test();
    let runner = SessionRunner::new(&config, &engine);

    let request = SessionRequest {
        target_path: target,
        build_dir: build_dir.path().to_path_buf(),
        primary_corpus_dir: corpus_dir.path().to_path_buf(),
        reproducers_dir: reproducers_dir.path().to_path_buf(),
        session_scratch_dir: scratch_dir.path().to_path_buf(),
        strategy_weights: Vec::new(),
        use_generator: false,
        byte_level_mutator: None,
        model_based_generator: None,
    };

    let mut rng = StdRng::seed_from_u64(1);
    let outcome = runner.run(&request, &mut rng);

    assert_eq!(outcome.state, SessionState::Done);
    assert_eq!(outcome.crashes.len(), 1);
    assert!(outcome.crashes[0].input_path.to_string_lossy().contains("crash-deadbeef"));
}

#[test]
fn target_outside_build_dir_fails_without_spawning_anything() {
    let build_dir = tempfile::tempdir().unwrap();
    let outsider_dir = tempfile::tempdir().unwrap();
    let target = outsider_dir.path().join("fake_target");
    write_script(&target, "exit 0");

    let corpus_dir = tempfile::tempdir().unwrap();
    let reproducers_dir = tempfile::tempdir().unwrap();
    let scratch_dir = tempfile::tempdir().unwrap();

    let engine = Engine::LibFuzzerLike(LibFuzzerLikeEngine::default());
    let config = Config::for_test();
    let runner = SessionRunner::new(&config, &engine);

    let request = SessionRequest {
        target_path: target,
        build_dir: build_dir.path().to_path_buf(),
        primary_corpus_dir: corpus_dir.path().to_path_buf(),
        reproducers_dir: reproducers_dir.path().to_path_buf(),
        session_scratch_dir: scratch_dir.path().to_path_buf(),
        strategy_weights: Vec::new(),
        use_generator: false,
        byte_level_mutator: None,
        model_based_generator: None,
    };

    let mut rng = StdRng::seed_from_u64(1);
    let outcome = runner.run(&request, &mut rng);

    assert_eq!(outcome.state, SessionState::Failed);
    assert!(outcome.error.is_some());
}

//! `TestCaseStore` — the seam to whatever real datastore holds `TestCase`
//! records (spec.md §1 scopes out storage backend choice; spec.md §5
//! requires optimistic-concurrency read-modify-write keyed by id). Only an
//! in-memory reference implementation lives here, used by the CLI and by
//! tests; a real backend is a Non-goal.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::data::TestCase;
use crate::error::{FuzzCoreError, Result};

pub trait TestCaseStore {
    fn get(&self, id: u64) -> Result<TestCase>;

    /// Write `new` in place of the record at `id`, but only if its current
    /// `version` equals `expected_version`. Mirrors the "read-modify-write
    /// keyed by id" invariant from spec.md §3: every writer must have read
    /// the version it is replacing.
    fn compare_and_swap(&self, id: u64, expected_version: u64, new: TestCase) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct InMemoryTestCaseStore {
    records: Mutex<HashMap<u64, TestCase>>,
}

impl InMemoryTestCaseStore {
    pub fn new() -> Self {
        InMemoryTestCaseStore { records: Mutex::new(HashMap::new()) }
    }

    pub fn insert(&self, testcase: TestCase) {
        self.records.lock().unwrap().insert(testcase.id, testcase);
    }
}

impl TestCaseStore for InMemoryTestCaseStore {
    fn get(&self, id: u64) -> Result<TestCase> {
        self.records
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(FuzzCoreError::InvalidTestCase)
    }

    fn compare_and_swap(&self, id: u64, expected_version: u64, mut new: TestCase) -> Result<()> {
        let mut records = self.records.lock().unwrap();
        let current = records.get(&id).ok_or(FuzzCoreError::InvalidTestCase)?;
        if current.version != expected_version {
            return Err(FuzzCoreError::Config(format!(
                "optimistic concurrency conflict on testcase {id}: expected version {expected_version}, found {}",
                current.version
            )));
        }
        new.version = expected_version + 1;
        records.insert(id, new);
        Ok(())
    }
}

//! The data model from spec.md §3 that is not itself one of the six
//! components: `TestCase`, `RevisionList`, and the `Fixed` sum type.
//! `Corpus`, `StrategyPool`, and the engine-contract types (`FuzzOptions`,
//! session/crash records) live next to the component that owns their
//! invariants (`corpus`, `strategy`, `engine`).

mod revision;
mod testcase;

pub use revision::{EmptyRevisionList, NotStrictlyIncreasing, RevisionList};
pub use testcase::{metadata_keys, Fixed, InvalidFixedString, TestCase};

//! `RevisionList` (spec.md §3): an ordered, non-empty, strictly increasing
//! sequence of integer revisions. The bisector narrows an index range into
//! this list; it never reasons about revisions not present in it.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionList {
    revisions: Vec<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmptyRevisionList;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotStrictlyIncreasing;

impl RevisionList {
    pub fn new(revisions: Vec<i64>) -> Result<Self, EmptyRevisionList> {
        if revisions.is_empty() {
            return Err(EmptyRevisionList);
        }
        Ok(RevisionList { revisions })
    }

    /// As `new`, but also rejects a list that is not strictly increasing —
    /// useful at ingestion boundaries where the caller wants the stronger
    /// guarantee spec.md §3 documents as an invariant.
    pub fn new_checked(revisions: Vec<i64>) -> Result<Self, NotStrictlyIncreasing> {
        if revisions.is_empty() || revisions.windows(2).any(|w| w[0] >= w[1]) {
            return Err(NotStrictlyIncreasing);
        }
        Ok(RevisionList { revisions })
    }

    pub fn len(&self) -> usize {
        self.revisions.len()
    }

    pub fn is_empty(&self) -> bool {
        false // invariant: always non-empty once constructed
    }

    pub fn last_index(&self) -> usize {
        self.revisions.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<i64> {
        self.revisions.get(index).copied()
    }

    pub fn revisions(&self) -> &[i64] {
        &self.revisions
    }

    /// Smallest index `i` such that `revisions[i] >= revision`, i.e. the
    /// first revision at or after the given one. Mirrors
    /// `revisions.find_min_revision_index`.
    pub fn find_min_revision_index(&self, revision: i64) -> Option<usize> {
        self.revisions.iter().position(|&r| r >= revision)
    }

    /// Largest index `i` such that `revisions[i] <= revision`, i.e. the last
    /// revision at or before the given one. Mirrors
    /// `revisions.find_max_revision_index`.
    pub fn find_max_revision_index(&self, revision: i64) -> Option<usize> {
        self.revisions.iter().rposition(|&r| r <= revision)
    }

    /// Remove the revision at `index` (used when a revision turns out to be
    /// a bad build mid-bisection). Indices after it shift down by one.
    pub fn remove(&mut self, index: usize) {
        self.revisions.remove(index);
    }
}

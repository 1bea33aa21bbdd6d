//! The time-ordered collection of pending jobs.

use super::Job;
use crate::utils::Timestamp;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Heap entry ordered so the earliest run time sits on top.
///
/// Ties break on insertion order.
#[derive(Debug)]
struct Entry {
    next_run: Timestamp,
    seq: u64,
    job: Job,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .next_run
            .cmp(&self.next_run)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Jobs ordered by next run time.
///
/// Not synchronized; the scheduler keeps it behind its state lock.
#[derive(Debug, Default)]
pub struct Timeline {
    heap: BinaryHeap<Entry>,
    seq: u64,
}

impl Timeline {
    /// Creates an empty timeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a job at its next run time.
    pub fn push(&mut self, job: Job) {
        let seq = self.seq;
        self.seq += 1;
        self.heap.push(Entry {
            next_run: job.next_run(),
            seq,
            job,
        });
    }

    /// Removes and returns every job due at or before `now`, earliest first.
    pub fn pop_due(&mut self, now: Timestamp) -> Vec<Job> {
        let mut due = Vec::new();
        while self.heap.peek().is_some_and(|entry| entry.next_run <= now) {
            if let Some(entry) = self.heap.pop() {
                due.push(entry.job);
            }
        }
        due
    }

    /// Removes every entry with the given id and returns how many there were.
    pub fn remove(&mut self, id: &str) -> usize {
        let before = self.heap.len();
        self.heap.retain(|entry| entry.job.id() != id);
        before - self.heap.len()
    }

    /// Returns the earliest pending run time.
    #[must_use]
    pub fn peek_next_run(&self) -> Option<Timestamp> {
        self.heap.peek().map(|entry| entry.next_run)
    }

    /// Returns the earliest run time of the job with the given id.
    #[must_use]
    pub fn next_run_of(&self, id: &str) -> Option<Timestamp> {
        self.heap
            .iter()
            .filter(|entry| entry.job.id() == id)
            .map(|entry| entry.next_run)
            .min()
    }

    /// Returns true if a job with the given id is pending.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.heap.iter().any(|entry| entry.job.id() == id)
    }

    /// Returns pending job ids, earliest first.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        let mut entries: Vec<&Entry> = self.heap.iter().collect();
        entries.sort_by(|a, b| b.cmp(a));
        entries.into_iter().map(|entry| entry.job.id().to_string()).collect()
    }

    /// Returns the number of pending entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Returns true if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{FnJob, JobReturn};
    use crate::utils::{add_seconds, from_unix_seconds};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;

    fn base() -> Timestamp {
        from_unix_seconds(1_700_000_000.0).unwrap()
    }

    fn job_at(id: &str, offset: f64) -> Job {
        let action = Arc::new(FnJob::new(|| Ok(JobReturn::Stop)));
        Job::new(id, action, None, Duration::ZERO, add_seconds(base(), offset))
    }

    #[test]
    fn test_pop_due_in_time_order() {
        let mut timeline = Timeline::new();
        timeline.push(job_at("c", 3.0));
        timeline.push(job_at("a", 1.0));
        timeline.push(job_at("late", 60.0));
        timeline.push(job_at("b", 2.0));

        let due: Vec<String> = timeline
            .pop_due(add_seconds(base(), 10.0))
            .iter()
            .map(|job| job.id().to_string())
            .collect();

        assert_eq!(due, vec!["a", "b", "c"]);
        assert_eq!(timeline.ids(), vec!["late"]);
    }

    #[test]
    fn test_pop_due_leaves_future_jobs() {
        let mut timeline = Timeline::new();
        timeline.push(job_at("future", 5.0));

        assert!(timeline.pop_due(base()).is_empty());
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline.peek_next_run(), Some(add_seconds(base(), 5.0)));
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let mut timeline = Timeline::new();
        timeline.push(job_at("first", 1.0));
        timeline.push(job_at("second", 1.0));
        timeline.push(job_at("third", 1.0));

        let due: Vec<String> = timeline
            .pop_due(add_seconds(base(), 1.0))
            .iter()
            .map(|job| job.id().to_string())
            .collect();
        assert_eq!(due, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_remove_all_matching_entries() {
        let mut timeline = Timeline::new();
        timeline.push(job_at("dup", 1.0));
        timeline.push(job_at("keep", 2.0));
        timeline.push(job_at("dup", 3.0));

        assert_eq!(timeline.remove("dup"), 2);
        assert_eq!(timeline.remove("dup"), 0);
        assert_eq!(timeline.remove("never-added"), 0);
        assert_eq!(timeline.ids(), vec!["keep"]);
        assert!(!timeline.contains("dup"));
    }

    #[test]
    fn test_next_run_of_returns_earliest() {
        let mut timeline = Timeline::new();
        timeline.push(job_at("x", 9.0));
        timeline.push(job_at("x", 4.0));

        assert_eq!(timeline.next_run_of("x"), Some(add_seconds(base(), 4.0)));
        assert_eq!(timeline.next_run_of("y"), None);
    }
}

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};

use tokio::time::Instant;

use crate::types::{Clock, Job, JobId, JobPriority, JobSnapshot, JobState, StateCounts};

/// A pending job whose schedule has arrived
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Candidate {
    pub job_id: JobId,
    pub priority: JobPriority,
    pub scheduled_at: Instant,
    pub seq: u64,
}

/// Higher priority first, then earlier `scheduled_at`, then insertion order
pub(crate) fn dispatch_order(a: &Candidate, b: &Candidate) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| a.scheduled_at.cmp(&b.scheduled_at))
        .then_with(|| a.seq.cmp(&b.seq))
}

/// Everything a queue mutates, guarded by one lock
#[derive(Default)]
pub(crate) struct QueueState {
    pub jobs: HashMap<JobId, Job>,
    /// Attempts holding a concurrency slot: job id -> dispatch generation
    pub in_flight: HashMap<JobId, u64>,
    pub paused: bool,
    deadlines: BinaryHeap<Reverse<Instant>>,
    next_seq: u64,
}

impl QueueState {
    pub fn insert(&mut self, mut job: Job) {
        job.seq = self.next_seq;
        self.next_seq += 1;
        self.arm(job.scheduled_at);
        self.jobs.insert(job.id.clone(), job);
    }

    /// Remember a time at which some job becomes due
    pub fn arm(&mut self, deadline: Instant) {
        self.deadlines.push(Reverse(deadline));
    }

    /// Drop deadlines that have passed and return the next future one
    pub fn next_deadline(&mut self, now: Instant) -> Option<Instant> {
        while let Some(Reverse(deadline)) = self.deadlines.peek() {
            if *deadline > now {
                return Some(*deadline);
            }
            self.deadlines.pop();
        }
        None
    }

    /// Due jobs in dispatch order
    pub fn due_candidates(&self, now: Instant) -> Vec<Candidate> {
        let mut candidates: Vec<Candidate> = self
            .jobs
            .values()
            .filter(|job| job.is_due(now))
            .map(|job| Candidate {
                job_id: job.id.clone(),
                priority: job.priority,
                scheduled_at: job.scheduled_at,
                seq: job.seq,
            })
            .collect();

        candidates.sort_by(dispatch_order);
        candidates
    }

    /// Free the slot held by this attempt; false if it was already freed
    pub fn release_slot(&mut self, job_id: &JobId, generation: u64) -> bool {
        if self.in_flight.get(job_id) == Some(&generation) {
            self.in_flight.remove(job_id);
            true
        } else {
            false
        }
    }

    pub fn counts(&self) -> StateCounts {
        let mut counts = StateCounts::default();
        for job in self.jobs.values() {
            counts.record(job.state);
        }
        counts
    }

    /// Snapshots in insertion order, optionally restricted to one state
    pub fn snapshots(&self, state: Option<JobState>, clock: &Clock) -> Vec<JobSnapshot> {
        let mut jobs: Vec<&Job> = self
            .jobs
            .values()
            .filter(|job| state.map_or(true, |s| job.state == s))
            .collect();

        jobs.sort_by_key(|job| job.seq);
        jobs.into_iter().map(|job| job.snapshot(clock)).collect()
    }

    /// Remove jobs in the given state (all jobs for `None`); returns how many
    pub fn clear(&mut self, state: Option<JobState>) -> usize {
        let before = self.jobs.len();
        self.jobs
            .retain(|_, job| state.map_or(false, |s| job.state != s));
        before - self.jobs.len()
    }
}

//! Shared work queue for one test session
//!
//! Seeded once with the session's full profile set. Workers drain it with
//! non-blocking polls; an item handed out is never returned (a failed probe
//! ends that item's participation in the round).

use crate::models::ProfileRecord;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Multi-consumer, seed-once work queue
pub struct TestQueue {
    inner: Mutex<VecDeque<ProfileRecord>>,
}

impl TestQueue {
    /// Seed the queue with the session's profile set
    pub fn new(profiles: Vec<ProfileRecord>) -> Self {
        Self {
            inner: Mutex::new(VecDeque::from(profiles)),
        }
    }

    /// Dequeue the next record, or None when the queue is drained.
    ///
    /// Safe to call concurrently from every worker; each record is handed
    /// out exactly once.
    pub fn poll(&self) -> Option<ProfileRecord> {
        self.inner.lock().expect("queue mutex poisoned").pop_front()
    }

    /// Records not yet handed out
    pub fn len(&self) -> usize {
        self.inner.lock().expect("queue mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

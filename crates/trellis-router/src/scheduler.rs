//! Deferred transition scheduling
//!
//! Follow-up transitions requested by enter hooks and event handlers never
//! run inside the walk that requested them. They are queued here, tagged
//! with the transition generation that was current when they were
//! scheduled, and executed one scheduler turn later. Anything scheduled by
//! an older generation is dropped when its turn comes.

use std::collections::VecDeque;
use trellis_core::TransitionRequest;

/// A transition waiting for the next scheduler turn
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledTransition {
    pub id: u64,
    pub generation: u64,
    pub request: TransitionRequest,
}

/// FIFO queue of deferred transitions
#[derive(Debug, Default)]
pub struct Scheduler {
    queue: VecDeque<ScheduledTransition>,
    next_id: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `request` for the next turn, returning its id
    pub fn schedule(&mut self, generation: u64, request: TransitionRequest) -> u64 {
        self.next_id += 1;
        self.queue.push_back(ScheduledTransition {
            id: self.next_id,
            generation,
            request,
        });
        self.next_id
    }

    /// Take everything queued so far
    ///
    /// Tasks scheduled while the returned batch runs wait for the next turn.
    pub fn take_turn(&mut self) -> Vec<ScheduledTransition> {
        self.queue.drain(..).collect()
    }

    /// Cancel one scheduled transition
    pub fn cancel(&mut self, id: u64) -> bool {
        let before = self.queue.len();
        self.queue.retain(|task| task.id != id);
        self.queue.len() != before
    }

    /// Drop everything, returning how many tasks were discarded
    pub fn clear(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn pending(&self) -> impl Iterator<Item = &ScheduledTransition> {
        self.queue.iter()
    }
}

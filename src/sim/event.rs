/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! The simulator's event queue: a deterministic min-heap over
//! (time, tiebreak class, insertion order).
//!
//! Events at the same instant resolve by class:
//!
//! `supply-end < arrival < deadline < supply-start < completion`
//!
//! Supply revocation preempts before new supply begins, deadlines are
//! checked after arrivals are queued and *before* a same-instant
//! completion, and within one class insertion order (FIFO) breaks the tie.
//! This total order is what makes two runs over the same model produce
//! byte-identical traces.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

// ── EventKind ─────────────────────────────────────────────────────────────────

/// What happens when an event fires.  Indices refer to the simulator's
/// flattened component/task arenas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A component's supply window closes.
    SupplyEnd { component: usize },
    /// A task releases its next job.
    Arrival { task: usize },
    /// The absolute deadline of one specific job.  Keyed by instance
    /// number so preemption can never mis-attribute a miss.
    Deadline { task: usize, instance: u64 },
    /// A component's supply window opens.
    SupplyStart { component: usize },
    /// The active job would finish, if the dispatch that scheduled this
    /// event is still current (the token says so).
    Completion { token: u64 },
}

impl EventKind {
    /// Same-instant tiebreak class, smallest first.
    fn class(&self) -> u8 {
        match self {
            EventKind::SupplyEnd { .. } => 0,
            EventKind::Arrival { .. } => 1,
            EventKind::Deadline { .. } => 2,
            EventKind::SupplyStart { .. } => 3,
            EventKind::Completion { .. } => 4,
        }
    }
}

// ── Event ─────────────────────────────────────────────────────────────────────

/// A scheduled simulator event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event {
    pub time: f64,
    /// Insertion order, unique per queue — the FIFO tiebreak.
    seq: u64,
    pub kind: EventKind,
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .total_cmp(&other.time)
            .then_with(|| self.kind.class().cmp(&other.kind.class()))
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

// ── EventQueue ────────────────────────────────────────────────────────────────

/// Min-heap of events with stable FIFO order inside each (time, class)
/// group.
#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<Reverse<Event>>,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `kind` at `time`.
    pub fn push(&mut self, time: f64, kind: EventKind) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Event { time, seq, kind }));
    }

    /// Remove and return the earliest event.
    pub fn pop(&mut self) -> Option<Event> {
        self.heap.pop().map(|Reverse(e)| e)
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

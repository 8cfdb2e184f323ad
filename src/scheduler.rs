//! Tick-indexed queue of scenario commands.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::command::ScenarioCommand;

/// A command scheduled to apply at a specific tick.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledCommand {
    /// Tick index when the command becomes due.
    pub tick: u64,
    pub command: ScenarioCommand,
}

/// Heap entry ordered by tick, then by insertion order.
#[derive(Debug)]
struct QueueEntry {
    sequence: u64,
    scheduled: ScheduledCommand,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the earliest tick, then the earliest insertion, pops first.
        other
            .scheduled
            .tick
            .cmp(&self.scheduled.tick)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A priority queue of commands keyed by tick index.
///
/// Commands sharing a tick are released in the order they were scheduled.
#[derive(Debug, Default)]
pub struct CommandScheduler {
    queue: BinaryHeap<QueueEntry>,
    next_sequence: u64,
}

impl CommandScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `command` to apply at `tick`.
    pub fn schedule(&mut self, tick: u64, command: ScenarioCommand) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.queue.push(QueueEntry {
            sequence,
            scheduled: ScheduledCommand { tick, command },
        });
    }

    /// Returns `true` when at least one command is due at `tick`.
    pub fn has_ready(&self, tick: u64) -> bool {
        self.queue
            .peek()
            .is_some_and(|entry| entry.scheduled.tick <= tick)
    }

    /// Removes and returns every command due at or before `tick`.
    pub fn drain_ready(&mut self, tick: u64) -> Vec<ScheduledCommand> {
        let mut ready = Vec::new();
        while self.has_ready(tick) {
            if let Some(entry) = self.queue.pop() {
                ready.push(entry.scheduled);
            }
        }
        ready
    }

    /// Returns the tick of the next queued command, if any.
    pub fn next_tick(&self) -> Option<u64> {
        self.queue.peek().map(|entry| entry.scheduled.tick)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

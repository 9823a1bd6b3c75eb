//! Stale-result discard for user-triggered queries.
//!
//! Every query takes a [`QueryTicket`] before it starts fetching. When the result arrives it is
//! only applied if no newer ticket has been issued in the meantime and nothing newer has already
//! been applied. In-flight requests are not cancelled; their results are simply dropped.

use arc_swap::ArcSwapOption;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Proof that a query was started, carrying its generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct QueryTicket(u64);

impl QueryTicket {
    pub fn generation(self) -> u64 {
        self.0
    }
}

/// Monotonically increasing generation counter
#[derive(Debug, Default)]
pub struct QueryGeneration {
    issued: AtomicU64,
}

impl QueryGeneration {
    pub fn issue(&self) -> QueryTicket {
        QueryTicket(self.issued.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// Generation of the most recently issued ticket, zero before the first
    pub fn latest(&self) -> u64 {
        self.issued.load(Ordering::Acquire)
    }

    pub fn is_current(&self, ticket: QueryTicket) -> bool {
        self.latest() == ticket.0
    }
}

/// A value together with the generation that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Applied<T> {
    pub generation: u64,
    pub value: T,
}

/// The most recently applied result of a query stream
#[derive(Debug)]
pub struct Latest<T> {
    generations: QueryGeneration,
    applied: ArcSwapOption<Applied<T>>,
}

impl<T> Default for Latest<T> {
    fn default() -> Self {
        Self {
            generations: QueryGeneration::default(),
            applied: ArcSwapOption::empty(),
        }
    }
}

impl<T> Latest<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a query
    pub fn begin(&self) -> QueryTicket {
        self.generations.issue()
    }

    pub fn is_current(&self, ticket: QueryTicket) -> bool {
        self.generations.is_current(ticket)
    }

    /// Apply `value` if `ticket` is still the latest issued and newer than what is applied.
    /// Returns whether the value was applied.
    pub fn apply(&self, ticket: QueryTicket, value: T) -> bool {
        let candidate = Arc::new(Applied {
            generation: ticket.0,
            value,
        });

        let mut applied = false;
        self.applied.rcu(|current| {
            let newer_applied = current.as_ref().is_some_and(|c| c.generation >= ticket.0);
            applied = self.generations.is_current(ticket) && !newer_applied;
            if applied { Some(Arc::clone(&candidate)) } else { current.clone() }
        });

        if !applied {
            debug!(
                generation = ticket.0,
                latest = self.generations.latest(),
                "Discarding stale query result"
            );
        }
        applied
    }

    pub fn get(&self) -> Option<Arc<Applied<T>>> {
        self.applied.load_full()
    }

    /// Generation of the applied value, zero if none
    pub fn applied_generation(&self) -> u64 {
        self.applied.load().as_ref().map_or(0, |applied| applied.generation)
    }
}

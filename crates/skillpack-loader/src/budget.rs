//! Remaining-capacity counter for a session
//!
//! `reserve` is an atomic check-and-decrement: it never drives the counter
//! below zero, and `release` never raises it above the initial capacity.
//! A granted reservation is held by a [`Reservation`] guard that returns
//! its cost on drop unless it was committed, so cancelling between
//! reservation and delivery cannot leak budget.

use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use tracing::debug;

/// Budget admission errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BudgetError {
    /// The requested cost exceeds what remains
    #[error("Budget exhausted: requested {requested}, remaining {remaining}")]
    Exhausted {
        /// Cost that was asked for
        requested: u64,
        /// Capacity left at the time of the request
        remaining: u64,
    },
}

/// Sole owner of the remaining-capacity counter
#[derive(Debug)]
pub struct BudgetTracker {
    capacity: u64,
    remaining: AtomicU64,
}

impl BudgetTracker {
    /// Create a tracker with the full capacity available
    #[must_use]
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            remaining: AtomicU64::new(capacity),
        }
    }

    /// Admit `cost` or deny it without side effect
    ///
    /// # Errors
    /// Returns [`BudgetError::Exhausted`] if `cost` exceeds the remaining capacity
    pub fn reserve(&self, cost: u64) -> Result<Reservation<'_>, BudgetError> {
        self.remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |r| r.checked_sub(cost))
            .map(|_| Reservation {
                tracker: self,
                cost,
                committed: false,
            })
            .map_err(|remaining| {
                debug!("Budget denied: requested {}, remaining {}", cost, remaining);
                BudgetError::Exhausted {
                    requested: cost,
                    remaining,
                }
            })
    }

    /// Return capacity, capped at the initial capacity
    pub fn release(&self, cost: u64) {
        let mut current = self.remaining.load(Ordering::Acquire);
        loop {
            let next = current.saturating_add(cost).min(self.capacity);
            match self.remaining.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    /// Read-only snapshot of the remaining capacity
    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.remaining.load(Ordering::Acquire)
    }

    /// Initial capacity
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Capacity currently consumed
    #[must_use]
    pub fn consumed(&self) -> u64 {
        self.capacity - self.remaining()
    }
}

/// Granted capacity that has not been delivered yet
///
/// Dropping an uncommitted reservation releases its cost.
#[derive(Debug)]
#[must_use = "dropping a reservation releases it immediately"]
pub struct Reservation<'a> {
    tracker: &'a BudgetTracker,
    cost: u64,
    committed: bool,
}

impl Reservation<'_> {
    /// Reserved cost
    #[must_use]
    pub fn cost(&self) -> u64 {
        self.cost
    }

    /// Keep the cost consumed; the content it paid for was delivered
    pub fn commit(mut self) -> u64 {
        self.committed = true;
        self.cost
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            debug!("Releasing undelivered reservation of {}", self.cost);
            self.tracker.release(self.cost);
        }
    }
}

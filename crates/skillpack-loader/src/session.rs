//! Per-session delivery ledger and budget
//!
//! A [`Session`] is constructed by the caller and passed into every load
//! call. It owns the [`BudgetTracker`] and the [`SessionCache`]; the cache
//! sits behind a single async mutex that the loader holds while it checks,
//! reserves and records one document. Sub-document fetches run outside the
//! lock; the document is marked in flight meanwhile so no other pass picks
//! it up.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Mutex as StdMutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use skillpack_types::DocId;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{info, warn};
use uuid::Uuid;

use crate::budget::BudgetTracker;

/// Session ledger invariant violations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The identifier was already delivered this session
    #[error("'{id}' already recorded with sequence {sequence}")]
    AlreadyRecorded {
        /// Identifier recorded twice
        id: DocId,
        /// Sequence of the existing entry
        sequence: u64,
    },

    /// Sequence numbers must increase
    #[error("Sequence {sequence} for '{id}' does not follow {last}")]
    OutOfOrder {
        /// Identifier being recorded
        id: DocId,
        /// Offered sequence
        sequence: u64,
        /// Highest recorded sequence
        last: u64,
    },
}

/// Record that a document was delivered
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionCacheEntry {
    pub id: DocId,
    pub sequence: u64,
    pub cost: u64,
    pub loaded_at: DateTime<Utc>,
}

/// Idempotency ledger for the current session
#[derive(Debug, Default)]
pub struct SessionCache {
    entries: HashMap<DocId, SessionCacheEntry>,
    last_sequence: u64,
    discarded: HashSet<DocId>,
}

impl SessionCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `id` was delivered this session
    #[must_use]
    pub fn has(&self, id: &DocId) -> bool {
        self.entries.contains_key(id)
    }

    #[must_use]
    pub fn get(&self, id: &DocId) -> Option<&SessionCacheEntry> {
        self.entries.get(id)
    }

    /// Sequence number the next record should carry
    #[must_use]
    pub fn next_sequence(&self) -> u64 {
        self.last_sequence + 1
    }

    /// Record a delivery
    ///
    /// # Errors
    /// Returns [`SessionError::AlreadyRecorded`] if `id` is already present and
    /// [`SessionError::OutOfOrder`] if `sequence` does not increase. Neither
    /// leaves the cache modified.
    pub fn record(&mut self, id: DocId, sequence: u64, cost: u64) -> Result<(), SessionError> {
        if let Some(existing) = self.entries.get(&id) {
            return Err(SessionError::AlreadyRecorded {
                id,
                sequence: existing.sequence,
            });
        }
        if sequence <= self.last_sequence {
            return Err(SessionError::OutOfOrder {
                id,
                sequence,
                last: self.last_sequence,
            });
        }

        self.last_sequence = sequence;
        self.entries.insert(
            id.clone(),
            SessionCacheEntry {
                id,
                sequence,
                cost,
                loaded_at: Utc::now(),
            },
        );
        Ok(())
    }

    /// Delivered identifiers ordered by sequence number
    #[must_use]
    pub fn sequence_order(&self) -> Vec<DocId> {
        let mut entries: Vec<&SessionCacheEntry> = self.entries.values().collect();
        entries.sort_by_key(|e| e.sequence);
        entries.into_iter().map(|e| e.id.clone()).collect()
    }

    /// Mark a delivered document as discarded; returns its cost the first time
    pub fn mark_discarded(&mut self, id: &DocId) -> Option<u64> {
        let cost = self.entries.get(id)?.cost;
        self.discarded.insert(id.clone()).then_some(cost)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn discarded_count(&self) -> usize {
        self.discarded.len()
    }
}

/// Explicitly scoped retrieval session
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    started_at: DateTime<Utc>,
    budget: BudgetTracker,
    cache: Mutex<SessionCache>,
    in_flight: StdMutex<HashSet<DocId>>,
}

impl Session {
    /// Open a session with the given budget capacity
    #[must_use]
    pub fn new(capacity: u64) -> Self {
        let id = Uuid::new_v4();
        info!("Session {} opened with capacity {}", id, capacity);
        Self {
            id,
            started_at: Utc::now(),
            budget: BudgetTracker::new(capacity),
            cache: Mutex::new(SessionCache::new()),
            in_flight: StdMutex::new(HashSet::new()),
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn budget(&self) -> &BudgetTracker {
        &self.budget
    }

    /// Remaining budget capacity
    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.budget.remaining()
    }

    /// Whether `id` was delivered this session
    pub async fn has(&self, id: &DocId) -> bool {
        self.cache.lock().await.has(id)
    }

    /// Delivered identifiers in delivery order
    pub async fn sequence_order(&self) -> Vec<DocId> {
        self.cache.lock().await.sequence_order()
    }

    /// Return the cost of a delivered document to the budget
    ///
    /// The document stays recorded, so later passes will not deliver it
    /// again. Returns the released cost, or `None` if `id` was never
    /// delivered or was already discarded.
    pub async fn discard(&self, id: &DocId) -> Option<u64> {
        let mut cache = self.cache.lock().await;
        let released = cache.mark_discarded(id);
        match released {
            Some(cost) => {
                self.budget.release(cost);
                info!("Discarded '{}', released {}", id, cost);
            }
            None => warn!("Discard of '{}' ignored: not delivered or already discarded", id),
        }
        released
    }

    /// Current session statistics
    pub async fn stats(&self) -> SessionStats {
        let cache = self.cache.lock().await;
        SessionStats::new(self, &cache)
    }

    /// End the session, returning its final statistics
    pub async fn close(self) -> SessionStats {
        let stats = self.stats().await;
        info!("Session {} closed: {}", self.id, stats);
        stats
    }

    pub(crate) async fn lock_cache(&self) -> MutexGuard<'_, SessionCache> {
        self.cache.lock().await
    }

    /// Whether another pass is currently fetching `id`
    pub(crate) fn is_in_flight(&self, id: &DocId) -> bool {
        self.in_flight_set().contains(id)
    }

    /// Claim `id` for fetching; `None` if another pass holds it
    pub(crate) fn begin_fetch(&self, id: &DocId) -> Option<InFlight<'_>> {
        self.in_flight_set().insert(id.clone()).then(|| InFlight {
            session: self,
            id: id.clone(),
        })
    }

    fn in_flight_set(&self) -> std::sync::MutexGuard<'_, HashSet<DocId>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Claim on a document being fetched outside the ledger lock
///
/// Dropping the claim, whether the fetch finished, failed or was abandoned,
/// makes the document available to other passes again.
#[derive(Debug)]
pub(crate) struct InFlight<'a> {
    session: &'a Session,
    id: DocId,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.session.in_flight_set().remove(&self.id);
    }
}

/// Session statistics
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub capacity: u64,
    pub remaining: u64,
    pub consumed: u64,
    pub delivered: usize,
    pub discarded: usize,
    pub utilization: f64,
}

impl SessionStats {
    #[allow(clippy::cast_precision_loss)]
    fn new(session: &Session, cache: &SessionCache) -> Self {
        let capacity = session.budget.capacity();
        let remaining = session.budget.remaining();
        let consumed = capacity - remaining;
        Self {
            id: session.id,
            started_at: session.started_at,
            capacity,
            remaining,
            consumed,
            delivered: cache.len(),
            discarded: cache.discarded_count(),
            utilization: if capacity == 0 {
                0.0
            } else {
                consumed as f64 / capacity as f64
            },
        }
    }
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Budget: {}/{} consumed ({:.1}%), {} delivered, {} discarded",
            self.consumed,
            self.capacity,
            self.utilization * 100.0,
            self.delivered,
            self.discarded
        )
    }
}

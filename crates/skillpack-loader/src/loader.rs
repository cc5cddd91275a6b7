//! Ranked, budget-aware delivery of skill content
//!
//! One pass walks its candidates in order. For each document it takes the
//! session ledger lock to check the cache and reserve budget. Sub-document
//! content is fetched with the lock released and the document marked in
//! flight, then the lock is retaken to record the delivery. Two passes
//! sharing a session therefore never deliver the same document twice or
//! overdraw the budget, and a slow fetch never blocks another pass. The
//! first candidate that cannot be afforded ends the pass.

use std::sync::Arc;

use skillpack_index::SkillIndex;
use skillpack_types::{
    ContentBlock, DocId, ExpandableDoc, LoadOutcome, LoadRequest, LoadStatus, LoadWarning,
    SkillId, SkillUnit, SubDocument,
};
use tokio::sync::MutexGuard;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::matcher::{Matcher, MatcherWeights};
use crate::resolver::{ContentResolver, FsResolver};
use crate::session::{Session, SessionCache};

/// Candidates considered per pass unless the request says otherwise
pub const DEFAULT_MAX_CANDIDATES: usize = 5;

/// Whether a pass should move on to its next candidate
enum Flow {
    Continue,
    Stop,
}

/// Running state of a single pass
struct Pass<'s> {
    session: &'s Session,
    budget_hint: Option<u64>,
    consumed: u64,
    outcome: LoadOutcome,
}

impl<'s> Pass<'s> {
    fn new(session: &'s Session, budget_hint: Option<u64>) -> Self {
        Self {
            session,
            budget_hint,
            consumed: 0,
            outcome: LoadOutcome::default(),
        }
    }

    fn stop(&mut self, status: LoadStatus) -> Flow {
        self.outcome.status = status;
        Flow::Stop
    }
}

/// Selects, budgets and delivers skill content for a session
pub struct Loader {
    index: Arc<SkillIndex>,
    matcher: Matcher,
    resolver: Arc<dyn ContentResolver>,
    max_candidates: usize,
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("units", &self.index.len())
            .field("weights", &self.matcher.weights())
            .field("max_candidates", &self.max_candidates)
            .finish_non_exhaustive()
    }
}

impl Loader {
    /// Loader over an index snapshot with default weights and filesystem content
    #[must_use]
    pub fn new(index: Arc<SkillIndex>) -> Self {
        let matcher = Matcher::new(Arc::clone(&index), MatcherWeights::default());
        Self {
            index,
            matcher,
            resolver: Arc::new(FsResolver),
            max_candidates: DEFAULT_MAX_CANDIDATES,
        }
    }

    #[must_use]
    pub fn with_weights(mut self, weights: MatcherWeights) -> Self {
        self.matcher = Matcher::new(Arc::clone(&self.index), weights);
        self
    }

    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn ContentResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    #[must_use]
    pub fn with_max_candidates(mut self, max: usize) -> Self {
        self.max_candidates = max;
        self
    }

    #[must_use]
    pub fn index(&self) -> &Arc<SkillIndex> {
        &self.index
    }

    #[must_use]
    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Run one load pass
    pub async fn load(&self, session: &Session, request: &LoadRequest) -> LoadOutcome {
        self.load_with_cancellation(session, request, &CancellationToken::new())
            .await
    }

    /// Run one load pass that stops when `cancel` fires
    ///
    /// A reservation held when cancellation arrives is released before the
    /// outcome is returned.
    pub async fn load_with_cancellation(
        &self,
        session: &Session,
        request: &LoadRequest,
        cancel: &CancellationToken,
    ) -> LoadOutcome {
        if let Some(target) = &request.target {
            return self.load_target(session, target, request.budget_hint, cancel).await;
        }

        let limit = request.max_results.unwrap_or(self.max_candidates);
        let candidates: Vec<&SkillUnit> = self
            .matcher
            .rank(&request.query, &request.tags)
            .into_iter()
            .take(limit)
            .map(|scored| scored.unit)
            .collect();

        if candidates.is_empty() {
            info!("No skills matched query {:?}", request.query);
            return LoadOutcome::default();
        }

        let mut pass = Pass::new(session, request.budget_hint);
        for unit in candidates {
            if let Flow::Stop = self.deliver(&mut pass, unit, None, cancel).await {
                break;
            }
        }
        Self::finish(pass)
    }

    /// Deliver one sub-document on explicit request
    pub async fn expand(&self, session: &Session, skill: &SkillId, name: &str) -> LoadOutcome {
        self.expand_with_cancellation(session, skill, name, &CancellationToken::new())
            .await
    }

    /// Deliver one sub-document, stopping when `cancel` fires
    pub async fn expand_with_cancellation(
        &self,
        session: &Session,
        skill: &SkillId,
        name: &str,
        cancel: &CancellationToken,
    ) -> LoadOutcome {
        match DocId::sub_document(skill.clone(), name) {
            Ok(doc) => self.expand_doc(session, &doc, None, cancel).await,
            Err(e) => {
                warn!("Cannot expand '{}#{}': {}", skill, name, e);
                not_found(format!("{skill}#{name}"))
            }
        }
    }

    async fn load_target(
        &self,
        session: &Session,
        target: &DocId,
        budget_hint: Option<u64>,
        cancel: &CancellationToken,
    ) -> LoadOutcome {
        if target.sub().is_some() {
            return self.expand_doc(session, target, budget_hint, cancel).await;
        }
        let Some(unit) = self.index.lookup(target.skill()) else {
            warn!("Requested skill '{}' not found", target);
            return not_found(target.to_string());
        };

        let mut pass = Pass::new(session, budget_hint);
        self.deliver(&mut pass, unit, None, cancel).await;
        Self::finish(pass)
    }

    async fn expand_doc(
        &self,
        session: &Session,
        doc: &DocId,
        budget_hint: Option<u64>,
        cancel: &CancellationToken,
    ) -> LoadOutcome {
        let found = self.index.lookup(doc.skill()).and_then(|unit| {
            doc.sub()
                .and_then(|name| unit.sub_document(name))
                .map(|sub| (unit, sub))
        });
        let Some((unit, sub)) = found else {
            warn!("Requested sub-document '{}' not found", doc);
            return not_found(doc.to_string());
        };

        let mut pass = Pass::new(session, budget_hint);
        self.deliver(&mut pass, unit, Some(sub), cancel).await;
        Self::finish(pass)
    }

    /// Check, reserve, fetch and record one document
    async fn deliver(
        &self,
        pass: &mut Pass<'_>,
        unit: &SkillUnit,
        sub: Option<&SubDocument>,
        cancel: &CancellationToken,
    ) -> Flow {
        if cancel.is_cancelled() {
            return pass.stop(LoadStatus::Cancelled);
        }

        let (id, cost) = match sub {
            None => (unit.core_id(), unit.core_cost),
            Some(sub) => match DocId::sub_document(unit.id.clone(), sub.name.clone()) {
                Ok(id) => (id, sub.cost),
                Err(e) => {
                    warn!("Skipping sub-document '{}' of '{}': {}", sub.name, unit.id, e);
                    pass.outcome
                        .warnings
                        .push(LoadWarning::NotFound { id: format!("{}#{}", unit.id, sub.name) });
                    return Flow::Continue;
                }
            },
        };

        let session = pass.session;
        let Some(mut cache) = lock_ledger(session, cancel).await else {
            info!("Delivery of '{}' cancelled while waiting for the session ledger", id);
            return pass.stop(LoadStatus::Cancelled);
        };
        if cache.has(&id) || session.is_in_flight(&id) {
            debug!("'{}' already delivered this session", id);
            pass.outcome.skipped.push(id);
            return Flow::Continue;
        }

        if let Some(hint) = pass.budget_hint {
            if pass.consumed.saturating_add(cost) > hint {
                info!("'{}' ({}) exceeds the pass ceiling of {}", id, cost, hint);
                return pass.stop(LoadStatus::PartialBudgetExhausted);
            }
        }

        let reservation = match session.budget().reserve(cost) {
            Ok(reservation) => reservation,
            Err(e) => {
                info!("Stopping before '{}': {}", id, e);
                return pass.stop(LoadStatus::PartialBudgetExhausted);
            }
        };

        let mut claim = None;
        let body = match sub {
            None => unit.core.clone(),
            Some(sub) => {
                // Fetch outside the ledger lock so a slow resolver does not stall other passes
                claim = session.begin_fetch(&id);
                drop(cache);

                let resolved = tokio::select! {
                    biased;
                    () = cancel.cancelled() => None,
                    resolved = self.resolver.resolve(&sub.handle) => Some(resolved),
                };
                let body = match resolved {
                    None => {
                        info!("Delivery of '{}' cancelled", id);
                        return pass.stop(LoadStatus::Cancelled);
                    }
                    Some(Err(e)) => {
                        warn!("Content of '{}' unavailable: {}", id, e);
                        pass.outcome.warnings.push(LoadWarning::ContentUnavailable {
                            id,
                            reason: e.to_string(),
                        });
                        return Flow::Continue;
                    }
                    Some(Ok(body)) => body,
                };

                cache = match lock_ledger(session, cancel).await {
                    Some(cache) => cache,
                    None => {
                        info!("Delivery of '{}' cancelled", id);
                        return pass.stop(LoadStatus::Cancelled);
                    }
                };
                body
            }
        };

        let sequence = cache.next_sequence();
        if let Err(e) = cache.record(id.clone(), sequence, cost) {
            error!("Session ledger rejected '{}': {}", id, e);
            return Flow::Continue;
        }
        pass.consumed += reservation.commit();
        drop(claim);

        let expandable = if sub.is_none() {
            undelivered_sub_documents(unit, &cache)
        } else {
            Vec::new()
        };
        drop(cache);

        let mut see_also = Vec::new();
        for reference in self.index.references_from(&id) {
            if self.index.contains(&reference.to) {
                see_also.push(reference.to.clone());
            } else {
                warn!("'{}' references missing '{}'", reference.from, reference.to);
                pass.outcome.warnings.push(LoadWarning::DanglingReference {
                    from: reference.from.clone(),
                    target: reference.to.clone(),
                });
            }
        }

        debug!("Delivered '{}' as #{} at cost {}", id, sequence, cost);
        pass.outcome.blocks.push(ContentBlock {
            id,
            body,
            cost,
            cumulative_cost: pass.consumed,
            sequence,
            see_also,
            expandable,
        });
        Flow::Continue
    }

    fn finish(pass: Pass<'_>) -> LoadOutcome {
        let outcome = pass.outcome;
        info!(
            "Load pass {:?}: {} delivered ({}), {} skipped, {} warnings, {} remaining",
            outcome.status,
            outcome.blocks.len(),
            outcome.consumed(),
            outcome.skipped.len(),
            outcome.warnings.len(),
            pass.session.remaining()
        );
        outcome
    }
}

/// Acquire the session ledger unless `cancel` fires first
async fn lock_ledger<'s>(
    session: &'s Session,
    cancel: &CancellationToken,
) -> Option<MutexGuard<'s, SessionCache>> {
    let cache = tokio::select! {
        biased;
        () = cancel.cancelled() => return None,
        cache = session.lock_cache() => cache,
    };
    (!cancel.is_cancelled()).then_some(cache)
}

fn not_found(id: String) -> LoadOutcome {
    LoadOutcome {
        warnings: vec![LoadWarning::NotFound { id }],
        ..LoadOutcome::default()
    }
}

fn undelivered_sub_documents(unit: &SkillUnit, cache: &SessionCache) -> Vec<ExpandableDoc> {
    unit.sub_documents
        .values()
        .filter(|sub| {
            DocId::sub_document(unit.id.clone(), sub.name.clone())
                .map(|doc| !cache.has(&doc))
                .unwrap_or(false)
        })
        .map(|sub| ExpandableDoc {
            name: sub.name.clone(),
            cost: sub.cost,
        })
        .collect()
}

//! Behavioral properties of the load pipeline

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashSet;
use std::sync::Arc;

use skillpack_index::SkillIndex;
use skillpack_loader::{BudgetTracker, Loader, Session};
use skillpack_types::{DocId, LoadRequest, LoadStatus, LoadWarning, SkillId, SkillUnit};
use tokio_util::sync::CancellationToken;

fn unit(id: &str, core: &str, cost: u64) -> SkillUnit {
    SkillUnit::new(SkillId::new(id).unwrap(), core).with_core_cost(cost)
}

fn doc(id: &str) -> DocId {
    id.parse().unwrap()
}

fn loader(units: Vec<SkillUnit>) -> Loader {
    Loader::new(Arc::new(SkillIndex::build(units).unwrap()))
}

fn ids(outcome: &skillpack_types::LoadOutcome) -> Vec<String> {
    outcome.blocks.iter().map(|b| b.id.to_string()).collect()
}

#[tokio::test]
async fn test_idempotent_cache() {
    let loader = loader(vec![
        unit("react/hooks", "react hooks state effects", 3),
        unit("react/animation", "react animation springs", 3),
    ]);
    let session = Session::new(100);
    let request = LoadRequest::query("react hooks");

    let first = loader.load(&session, &request).await;
    assert_eq!(ids(&first), vec!["react/hooks", "react/animation"]);

    let second = loader.load(&session, &request).await;
    assert!(second.blocks.is_empty());
    assert_eq!(second.skipped, vec![doc("react/hooks"), doc("react/animation")]);
    assert!(second.is_complete());
    assert_eq!(session.remaining(), 94);
    assert_eq!(
        session.sequence_order().await,
        vec![doc("react/hooks"), doc("react/animation")]
    );
}

#[test]
fn test_budget_monotonicity() {
    let capacity = 50;
    let tracker = BudgetTracker::new(capacity);
    let mut state: u64 = 0x2545_f491_4f6c_dd1d;

    for _ in 0..2_000 {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        let amount = state % 23;

        if state % 3 == 0 {
            tracker.release(amount);
        } else if let Ok(reservation) = tracker.reserve(amount) {
            if state % 5 != 0 {
                reservation.commit();
            }
        }

        assert!(tracker.remaining() <= capacity);
    }
}

#[test]
fn test_deterministic_ranking() {
    let loader = loader(vec![
        unit("a", "react hooks effects", 1),
        unit("b", "react animation springs", 1).with_tags(["react"]),
        unit("c", "vue templates", 1),
        unit("d", "react hooks", 1),
        unit("e", "hooks for git", 1),
    ]);
    let rank = |q: &str| -> Vec<String> {
        loader
            .matcher()
            .rank(q, &[])
            .iter()
            .map(|s| s.unit.id.to_string())
            .collect()
    };

    let first = rank("react hooks");
    for _ in 0..10 {
        assert_eq!(rank("react hooks"), first);
    }
}

#[tokio::test]
async fn test_no_automatic_cross_reference_expansion() {
    let mut units: Vec<SkillUnit> = (0..10)
        .map(|i| unit(&format!("leaf-{i}"), "leaf detail", 5))
        .collect();
    let hub = (0..10).fold(unit("hub", "hub overview", 5), |hub, i| {
        hub.with_reference(doc(&format!("leaf-{i}")))
    });
    units.push(hub);

    let loader = loader(units);
    let session = Session::new(55);

    let outcome = loader.load(&session, &LoadRequest::target(doc("hub"))).await;
    assert_eq!(ids(&outcome), vec!["hub"]);
    assert_eq!(outcome.blocks[0].see_also.len(), 10);
    assert_eq!(session.remaining(), 50);
}

#[tokio::test]
async fn test_graceful_budget_exhaustion() {
    let loader = loader(vec![
        unit("a", "deploy pipeline", 5),
        unit("b", "deploy pipeline", 5),
        unit("c", "deploy pipeline", 5),
    ]);
    let session = Session::new(8);

    let outcome = loader.load(&session, &LoadRequest::query("deploy pipeline")).await;
    assert_eq!(ids(&outcome), vec!["a"]);
    assert_eq!(outcome.status, LoadStatus::PartialBudgetExhausted);
    assert_eq!(outcome.consumed(), 5);
    assert_eq!(session.remaining(), 3);
    assert!(!session.has(&doc("b")).await);
    assert!(!session.has(&doc("c")).await);
}

#[tokio::test]
async fn test_exhaustion_does_not_substitute_cheaper_candidates() {
    let loader = loader(vec![
        unit("a", "deploy pipeline", 5),
        unit("b", "deploy pipeline", 5),
        unit("c", "deploy pipeline", 2),
    ]);
    let session = Session::new(8);

    let outcome = loader.load(&session, &LoadRequest::query("deploy pipeline")).await;
    assert_eq!(ids(&outcome), vec!["a"]);
    assert_eq!(session.remaining(), 3);

    // Freeing budget makes the pass resumable
    session.discard(&doc("a")).await;
    let retry = loader.load(&session, &LoadRequest::query("deploy pipeline")).await;
    assert_eq!(ids(&retry), vec!["b", "c"]);
    assert!(retry.is_complete());
}

#[tokio::test]
async fn test_dangling_reference_reporting() {
    let index = SkillIndex::build(vec![
        unit("review", "code review checklist", 2).with_reference(doc("vue/components")),
        unit("style", "style guide", 2),
    ])
    .unwrap();
    assert_eq!(index.dangling_references().len(), 1);

    let loader = Loader::new(Arc::new(index));
    let session = Session::new(10);
    let outcome = loader.load(&session, &LoadRequest::target(doc("review"))).await;

    assert_eq!(ids(&outcome), vec!["review"]);
    let dangling: Vec<&LoadWarning> = outcome
        .warnings
        .iter()
        .filter(|w| matches!(w, LoadWarning::DanglingReference { .. }))
        .collect();
    assert_eq!(
        dangling,
        vec![&LoadWarning::DanglingReference {
            from: doc("review"),
            target: doc("vue/components"),
        }]
    );
}

#[tokio::test]
async fn test_cycle_safety() {
    let loader = loader(vec![
        unit("a", "alpha", 2).with_reference(doc("b")),
        unit("b", "beta", 2).with_reference(doc("a")),
    ]);
    let session = Session::new(20);

    let mut emitted = Vec::new();
    for target in ["a", "b", "a", "b"] {
        let outcome = loader.load(&session, &LoadRequest::target(doc(target))).await;
        for block in &outcome.blocks {
            for next in &block.see_also {
                assert!(next == &doc("a") || next == &doc("b"));
            }
        }
        emitted.extend(ids(&outcome));
    }

    assert_eq!(emitted, vec!["a", "b"]);
    assert_eq!(session.remaining(), 16);
}

#[tokio::test]
async fn test_concurrent_loads_share_one_ledger() {
    let units = (0..6).map(|i| unit(&format!("s{i}"), "shared topic", 4)).collect();
    let loader = loader(units).with_max_candidates(6);
    let session = Session::new(18);
    let request = LoadRequest::query("shared topic");

    let outcomes =
        futures::future::join_all((0..4).map(|_| loader.load(&session, &request))).await;

    let mut seen = HashSet::new();
    for outcome in &outcomes {
        for block in &outcome.blocks {
            assert!(seen.insert(block.id.clone()), "{} delivered twice", block.id);
        }
    }
    assert_eq!(seen.len(), 4);
    assert_eq!(session.remaining(), 2);
}

#[tokio::test]
async fn test_cancelled_pass_keeps_budget() {
    let loader = loader(vec![unit("a", "deploy", 5)]);
    let session = Session::new(10);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = loader
        .load_with_cancellation(&session, &LoadRequest::query("deploy"), &cancel)
        .await;
    assert_eq!(outcome.status, LoadStatus::Cancelled);
    assert!(outcome.blocks.is_empty());
    assert_eq!(session.remaining(), 10);
}

#[tokio::test]
async fn test_expand_unknown_is_reported_not_fatal() {
    let loader = loader(vec![unit("a", "deploy", 5)]);
    let session = Session::new(10);

    let outcome = loader
        .expand(&session, &SkillId::new("missing").unwrap(), "examples")
        .await;
    assert!(outcome.is_complete());
    assert_eq!(
        outcome.warnings,
        vec![LoadWarning::NotFound {
            id: "missing#examples".into()
        }]
    );
}

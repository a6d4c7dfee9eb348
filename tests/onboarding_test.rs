//! Tests for OnboardingService: the full registration flow and follow-up retries

use std::sync::Arc;

use downline::application::services::FollowUp;
use downline::application::ErrorKind;
use downline::domain::{Member, NewMember, Policy};
use downline::infrastructure::di::ServiceContainer;
use downline::util::testing::{fill, join, memory_container, memory_container_over, FlakyStore};

/// root <- alpha <- {sub1, sub2, sub3}; sub1 and sub2 are full, sub3 has two downlines.
fn nearly_promotable(c: &ServiceContainer) -> (Member, Member, Member) {
    let root = c.directory.create_root(NewMember::new("root")).unwrap();
    let alpha = join(c, "alpha", &root).unwrap();
    let kids = fill(c, &alpha, "sub").unwrap();
    fill(c, &kids[0], "sub1_g").unwrap();
    fill(c, &kids[1], "sub2_g").unwrap();
    join(c, "sub3_g1", &kids[2]).unwrap();
    join(c, "sub3_g2", &kids[2]).unwrap();
    (root, alpha, kids[2].clone())
}

#[test]
fn given_registration_when_onboarding_then_uplines_credited() {
    let c = memory_container(Policy::default());
    let root = c.directory.create_root(NewMember::new("root")).unwrap();
    let alpha = join(&c, "alpha", &root).unwrap();

    let outcome = c
        .onboarding
        .register(NewMember::new("bob_1"), &alpha.referral_code)
        .unwrap();

    let report = outcome.distribution.expect("distribution ran");
    assert_eq!(report.credited, vec![alpha.id, root.id]);
    assert_eq!(report.total, 200);
    assert!(outcome.deferred.is_empty());
    assert!(outcome.promotions.iter().all(|p| p.is_noop()));
    assert_eq!(c.directory.get(alpha.id).unwrap().wallet_balance, 100);
}

#[test]
fn given_last_grandchild_when_onboarding_then_grand_sponsor_promoted() {
    let c = memory_container(Policy::default());
    let (root, alpha, sub3) = nearly_promotable(&c);

    let outcome = c
        .onboarding
        .register(NewMember::new("sub3_g3"), &sub3.referral_code)
        .unwrap();

    let promoted: Vec<_> = outcome.promotions.iter().filter(|p| !p.is_noop()).collect();
    assert_eq!(promoted.len(), 1);
    assert_eq!(promoted[0].level_of(alpha.id), Some(2));
    assert_eq!(promoted[0].level_of(root.id), Some(2));
    assert_eq!(c.directory.get(alpha.id).unwrap().level, 2);
    assert_eq!(c.directory.get(root.id).unwrap().level, 2);
    assert_eq!(c.directory.get(sub3.id).unwrap().level, 1);
}

#[test]
fn given_grand_sponsor_evaluation_disabled_when_onboarding_then_nobody_promoted() {
    let policy = Policy {
        evaluate_grand_sponsor: false,
        ..Policy::default()
    };
    let c = memory_container(policy);
    let (_, alpha, sub3) = nearly_promotable(&c);

    let outcome = c
        .onboarding
        .register(NewMember::new("sub3_g3"), &sub3.referral_code)
        .unwrap();

    assert_eq!(outcome.promotions.len(), 1);
    assert!(outcome.promotions[0].is_noop());
    assert_eq!(c.directory.get(alpha.id).unwrap().level, 1);
}

#[test]
fn given_store_failure_during_distribution_when_retrying_then_credited_exactly_once() {
    let store = Arc::new(FlakyStore::new());
    let c = memory_container_over(store.clone(), Policy::default());
    let root = c.directory.create_root(NewMember::new("root")).unwrap();
    let alpha = join(&c, "alpha", &root).unwrap();
    store.fail_next(root.id, 1);

    let outcome = c
        .onboarding
        .register(NewMember::new("bob_1"), &alpha.referral_code)
        .unwrap();

    assert!(c.directory.by_handle("bob_1").is_ok());
    assert_eq!(outcome.deferred.len(), 1);
    assert!(matches!(
        &outcome.deferred[0],
        FollowUp::Distribute(p) if p.resume_from == root.id && p.hops_remaining == 7
    ));
    assert_eq!(c.onboarding.pending_follow_ups(), outcome.deferred);
    assert_eq!(c.directory.get(root.id).unwrap().earnings, 0);

    let retry = c.onboarding.retry_follow_ups();

    assert_eq!(retry.completed, 1);
    assert_eq!(retry.requeued, 0);
    assert!(c.onboarding.pending_follow_ups().is_empty());
    assert_eq!(c.directory.get(root.id).unwrap().earnings, 100);
    assert_eq!(c.directory.get(alpha.id).unwrap().earnings, 100);
}

#[test]
fn given_repeated_failure_when_retrying_then_requeued_until_success() {
    let store = Arc::new(FlakyStore::new());
    let c = memory_container_over(store.clone(), Policy::default());
    let root = c.directory.create_root(NewMember::new("root")).unwrap();
    let alpha = join(&c, "alpha", &root).unwrap();
    store.fail_next(root.id, 2);

    c.onboarding
        .register(NewMember::new("bob_1"), &alpha.referral_code)
        .unwrap();

    let first = c.onboarding.retry_follow_ups();
    assert_eq!(first.requeued, 1);
    assert_eq!(c.directory.get(root.id).unwrap().earnings, 0);

    let second = c.onboarding.retry_follow_ups();
    assert_eq!(second.completed, 1);
    assert_eq!(c.directory.get(root.id).unwrap().earnings, 100);
    assert_eq!(c.directory.get(alpha.id).unwrap().earnings, 100);
}

#[test]
fn given_unknown_sponsor_code_when_onboarding_then_not_found_and_nothing_queued() {
    let c = memory_container(Policy::default());
    c.directory.create_root(NewMember::new("root")).unwrap();

    let err = c
        .onboarding
        .register(NewMember::new("bob_1"), "missing1")
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(c.onboarding.pending_follow_ups().is_empty());
}

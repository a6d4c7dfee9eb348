//! Concurrent access to the in-memory store through the services

use std::thread;

use downline::application::ErrorKind;
use downline::domain::{NewMember, Policy};
use downline::util::testing::{fill, memory_container};

#[test]
fn given_racing_registrations_when_sponsor_fills_up_then_exactly_three_succeed() {
    let c = memory_container(Policy::default());
    let root = c.directory.create_root(NewMember::new("root")).unwrap();

    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let c = &c;
                let code = root.referral_code.clone();
                s.spawn(move || c.directory.register(NewMember::new(format!("racer{i}")), &code))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("thread panicked"))
            .collect()
    });

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 3);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(err.kind(), ErrorKind::CapacityExceeded);
    }
    let sponsor = c.directory.get(root.id).unwrap();
    assert_eq!(sponsor.downlines.len(), 3);
    assert_eq!(c.ledger.members().unwrap().len(), 4);
}

#[test]
fn given_parallel_wallet_credits_then_no_update_lost() {
    let c = memory_container(Policy::default());
    let root = c.directory.create_root(NewMember::new("root")).unwrap();

    thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| {
                for _ in 0..50 {
                    c.directory.credit_wallet(root.id, 10).unwrap();
                }
            });
        }
    });

    assert_eq!(c.directory.get(root.id).unwrap().wallet_balance, 4000);
}

#[test]
fn given_parallel_onboarding_then_shared_upline_earnings_add_up() {
    let c = memory_container(Policy::default());
    let root = c.directory.create_root(NewMember::new("root")).unwrap();
    let kids = fill(&c, &root, "kid").unwrap();

    thread::scope(|s| {
        for i in 0..9 {
            let c = &c;
            let code = kids[i % 3].referral_code.clone();
            s.spawn(move || {
                c.onboarding
                    .register(NewMember::new(format!("worker{i}")), &code)
                    .unwrap();
            });
        }
    });

    assert_eq!(c.directory.get(root.id).unwrap().earnings, 900);
    for kid in &kids {
        let kid = c.directory.get(kid.id).unwrap();
        assert_eq!(kid.earnings, 300, "{}", kid.handle);
        assert_eq!(kid.downlines.len(), 3);
    }
    assert!(c.onboarding.pending_follow_ups().is_empty());
}

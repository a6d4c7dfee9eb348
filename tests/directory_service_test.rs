//! Tests for MemberDirectory: registration, wallet, company payment, profile

use std::sync::Arc;

use downline::application::services::CallerIdentity;
use downline::application::ErrorKind;
use downline::config::Settings;
use downline::domain::{MemberStatus, NewMember, Policy, ProfileUpdate};
use downline::infrastructure::di::ServiceContainer;
use downline::infrastructure::memory_store::InMemoryStore;
use downline::util::testing::{fill, join, memory_container};

// ============================================================
// Registration
// ============================================================

#[test]
fn given_unknown_sponsor_code_when_registering_then_not_found() {
    let c = memory_container(Policy::default());
    c.directory.create_root(NewMember::new("root")).unwrap();

    let err = c
        .directory
        .register(NewMember::new("alice"), "nosuchcd")
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(c.store.find_by_handle("alice").unwrap().is_none());
}

#[test]
fn given_full_sponsor_when_registering_fourth_then_capacity_exceeded_and_nothing_created() {
    let c = memory_container(Policy::default());
    let root = c.directory.create_root(NewMember::new("root")).unwrap();
    fill(&c, &root, "kid").unwrap();

    let err = join(&c, "late", &root).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::CapacityExceeded);
    assert!(c.store.find_by_handle("late").unwrap().is_none());
    assert_eq!(c.directory.get(root.id).unwrap().downlines.len(), 3);
}

#[test]
fn given_registration_then_sponsor_and_child_linked() {
    let c = memory_container(Policy::default());
    let root = c.directory.create_root(NewMember::new("root")).unwrap();

    let child = c
        .directory
        .register(
            NewMember::new("alice")
                .with_email("alice@example.com")
                .with_mobile("9876543210"),
            &root.referral_code,
        )
        .unwrap();

    let sponsor = c.directory.get(root.id).unwrap();
    assert_eq!(sponsor.downlines, vec![child.id]);
    assert_eq!(child.sponsor, Some(root.id));
    assert_eq!(child.level, 1);
    assert_eq!(child.status, MemberStatus::Inactive);
    assert_eq!(child.referral_code.len(), 8);
    assert!(!child.is_admin);
    assert!(root.is_admin);
}

#[test]
fn given_malformed_or_taken_handle_when_registering_then_validation_failure() {
    let c = memory_container(Policy::default());
    let root = c.directory.create_root(NewMember::new("root")).unwrap();

    let malformed = join(&c, "a b", &root).unwrap_err();
    assert_eq!(malformed.kind(), ErrorKind::ValidationFailure);

    let duplicate = join(&c, "root", &root).unwrap_err();
    assert_eq!(duplicate.kind(), ErrorKind::ValidationFailure);

    let bad_email = c
        .directory
        .register(NewMember::new("carol").with_email("not-an-email"), &root.referral_code)
        .unwrap_err();
    assert_eq!(bad_email.kind(), ErrorKind::ValidationFailure);
}

#[test]
fn given_archived_member_when_reusing_handle_then_validation_failure() {
    let c = memory_container(Policy::default());
    let root = c.directory.create_root(NewMember::new("root")).unwrap();
    let alice = join(&c, "alice", &root).unwrap();
    c.store
        .archive(alice.id, &mut |_| Ok(()), chrono::Utc::now())
        .unwrap();

    let err = join(&c, "alice", &root).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ValidationFailure);
}

// ============================================================
// Wallet
// ============================================================

#[test]
fn given_over_withdrawal_when_withdrawing_then_insufficient_balance_and_unchanged() {
    let c = memory_container(Policy::default());
    let root = c.directory.create_root(NewMember::new("root")).unwrap();
    c.directory.credit_wallet(root.id, 300).unwrap();

    let err = c.directory.withdraw("root", 301).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InsufficientBalance);
    assert_eq!(c.directory.get(root.id).unwrap().wallet_balance, 300);
}

#[test]
fn given_balance_when_withdrawing_then_remaining_returned() {
    let c = memory_container(Policy::default());
    let root = c.directory.create_root(NewMember::new("root")).unwrap();
    c.directory.credit_wallet(root.id, 300).unwrap();

    let remaining = c.directory.withdraw("root", 120).unwrap();

    assert_eq!(remaining, 180);
    assert_eq!(c.directory.get(root.id).unwrap().wallet_balance, 180);
}

#[test]
fn given_zero_amount_when_withdrawing_or_crediting_then_validation_failure() {
    let c = memory_container(Policy::default());
    let root = c.directory.create_root(NewMember::new("root")).unwrap();

    assert_eq!(
        c.directory.withdraw("root", 0).unwrap_err().kind(),
        ErrorKind::ValidationFailure
    );
    assert_eq!(
        c.directory.credit_wallet(root.id, 0).unwrap_err().kind(),
        ErrorKind::ValidationFailure
    );
}

// ============================================================
// Company payment
// ============================================================

#[test]
fn given_enough_balance_when_paying_company_then_ledger_credited_and_member_active() {
    let c = memory_container(Policy::default());
    let root = c.directory.create_root(NewMember::new("root")).unwrap();
    c.directory.credit_wallet(root.id, 1500).unwrap();

    let payment = c.directory.pay_company(root.id).unwrap();

    assert_eq!(payment.amount, 1000);
    assert_eq!(payment.remaining_balance, 500);
    assert_eq!(payment.company_total, 1000);
    assert_eq!(c.ledger.company_earnings().unwrap(), 1000);
    let member = c.directory.get(root.id).unwrap();
    assert_eq!(member.status, MemberStatus::Active);
    assert_eq!(member.self_earning, 1000);
    assert!(member.last_payment.is_some());
}

#[test]
fn given_low_balance_when_paying_company_then_nothing_changes() {
    let c = memory_container(Policy::default());
    let root = c.directory.create_root(NewMember::new("root")).unwrap();
    c.directory.credit_wallet(root.id, 999).unwrap();

    let err = c.directory.pay_company(root.id).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InsufficientBalance);
    assert_eq!(c.ledger.company_earnings().unwrap(), 0);
    let member = c.directory.get(root.id).unwrap();
    assert_eq!(member.wallet_balance, 999);
    assert_eq!(member.status, MemberStatus::Inactive);
}

#[test]
fn given_no_company_ledger_when_paying_then_not_found_before_debit() {
    let c = ServiceContainer::with_store(Settings::default(), Arc::new(InMemoryStore::new()));
    let root = c.directory.create_root(NewMember::new("root")).unwrap();
    c.directory.credit_wallet(root.id, 2000).unwrap();

    let err = c.directory.pay_company(root.id).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(c.directory.get(root.id).unwrap().wallet_balance, 2000);
}

// ============================================================
// Slots, dashboard, profile
// ============================================================

#[test]
fn given_one_downline_when_checking_slots_then_two_open() {
    let c = memory_container(Policy::default());
    let root = c.directory.create_root(NewMember::new("root")).unwrap();
    join(&c, "alice", &root).unwrap();

    let slots = c.directory.free_slots(root.id).unwrap();

    assert_eq!(slots.open, 2);
    assert_eq!(slots.granted, 0);
}

#[test]
fn given_member_when_showing_dashboard_then_counts_reported() {
    let c = memory_container(Policy::default());
    let root = c.directory.create_root(NewMember::new("root")).unwrap();
    join(&c, "alice", &root).unwrap();
    join(&c, "bob_1", &root).unwrap();

    let dashboard = c.directory.dashboard("root").unwrap();

    assert_eq!(dashboard.handle, "root");
    assert_eq!(dashboard.downlines, 2);
    assert_eq!(dashboard.referral_code, Some(root.referral_code));
    assert!(!dashboard.is_achiever);
}

#[test]
fn given_non_owner_when_updating_profile_then_forbidden() {
    let c = memory_container(Policy::default());
    let root = c.directory.create_root(NewMember::new("root")).unwrap();
    let alice = join(&c, "alice", &root).unwrap();
    let bob = join(&c, "bob_1", &root).unwrap();

    let caller = CallerIdentity {
        member_id: bob.id,
        is_admin: false,
    };
    let update = ProfileUpdate {
        name: Some("Mallory".into()),
        ..Default::default()
    };
    let err = c
        .directory
        .update_profile(&caller, alice.id, update)
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Forbidden);
    assert!(c.directory.get(alice.id).unwrap().name.is_none());
}

#[test]
fn given_owner_or_admin_when_updating_profile_then_applied() {
    let c = memory_container(Policy::default());
    let root = c.directory.create_root(NewMember::new("root")).unwrap();
    let alice = join(&c, "alice", &root).unwrap();

    let own = CallerIdentity {
        member_id: alice.id,
        is_admin: false,
    };
    c.directory
        .update_profile(
            &own,
            alice.id,
            ProfileUpdate {
                address: Some("12 Main Road".into()),
                ..Default::default()
            },
        )
        .unwrap();

    let admin = CallerIdentity {
        member_id: root.id,
        is_admin: root.is_admin,
    };
    let updated = c
        .directory
        .update_profile(
            &admin,
            alice.id,
            ProfileUpdate {
                email: Some("alice@example.com".into()),
                ..Default::default()
            },
        )
        .unwrap();

    assert_eq!(updated.address.as_deref(), Some("12 Main Road"));
    assert_eq!(updated.email.as_deref(), Some("alice@example.com"));
}

#[test]
fn given_malformed_mobile_when_updating_profile_then_validation_failure() {
    let c = memory_container(Policy::default());
    let root = c.directory.create_root(NewMember::new("root")).unwrap();
    let caller = CallerIdentity {
        member_id: root.id,
        is_admin: true,
    };

    let err = c
        .directory
        .update_profile(
            &caller,
            root.id,
            ProfileUpdate {
                mobile: Some("call me".into()),
                ..Default::default()
            },
        )
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ValidationFailure);
}

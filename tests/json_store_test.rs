//! Tests for the JSON snapshot store

use std::fs;
use std::sync::Arc;

use tempfile::TempDir;

use downline::config::Settings;
use downline::application::ErrorKind;
use downline::domain::{NewMember, Policy};
use downline::infrastructure::di::ServiceContainer;
use downline::infrastructure::error::StoreError;
use downline::infrastructure::json_store::JsonFileStore;
use downline::infrastructure::traits::{MemberStore, RealFileSystem};
use downline::infrastructure::InfraError;
use downline::util::testing::{init_test_setup, join, promotable, FailingWrites};

fn settings_in(dir: &TempDir) -> Settings {
    Settings {
        data_file: dir.path().join("data").join("network.json"),
        policy: Policy::default(),
    }
}

#[test]
fn given_saved_network_when_reopening_then_members_indexes_and_ledger_restored() {
    init_test_setup();
    let dir = TempDir::new().unwrap();

    let (root_code, alice_id) = {
        let c = ServiceContainer::new(settings_in(&dir)).unwrap();
        c.ledger.init_company().unwrap();
        let root = c.directory.create_root(NewMember::new("root")).unwrap();
        let alice = join(&c, "alice", &root).unwrap();
        c.directory.credit_wallet(root.id, 1200).unwrap();
        c.directory.pay_company(root.id).unwrap();
        (root.referral_code, alice.id)
    };

    let c = ServiceContainer::new(settings_in(&dir)).unwrap();

    let root = c.directory.by_referral_code(&root_code).unwrap();
    assert_eq!(root.downlines, vec![alice_id]);
    assert_eq!(root.wallet_balance, 200);
    assert_eq!(c.directory.by_handle("alice").unwrap().sponsor, Some(root.id));
    assert_eq!(c.ledger.company_earnings().unwrap(), 1000);
    assert_eq!(c.ledger.members().unwrap().len(), 2);
}

#[test]
fn given_missing_file_when_opening_then_empty_and_nothing_written() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fresh.json");

    let store = JsonFileStore::open(&path, Arc::new(RealFileSystem)).unwrap();

    assert!(store.members().unwrap().is_empty());
    assert!(store.company().unwrap().is_none());
    assert!(!path.exists());

    store.init_company().unwrap();
    assert!(path.exists());
}

#[test]
fn given_corrupt_snapshot_when_opening_then_format_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.json");
    fs::write(&path, "{ not json").unwrap();

    let result = JsonFileStore::open(&path, Arc::new(RealFileSystem));

    assert!(matches!(result, Err(StoreError::Format(_))));
}

#[test]
fn given_corrupt_snapshot_when_building_container_then_store_error() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir);
    fs::create_dir_all(settings.data_file.parent().unwrap()).unwrap();
    fs::write(&settings.data_file, "[]").unwrap();

    let result = ServiceContainer::new(settings);

    assert!(matches!(result, Err(InfraError::Store { .. })));
}

fn container_over(dir: &TempDir, fs: &Arc<FailingWrites>) -> ServiceContainer {
    init_test_setup();
    ServiceContainer::with_fs(settings_in(dir), fs.clone()).unwrap()
}

#[test]
fn given_failed_write_during_distribution_when_resuming_then_credited_once() {
    let dir = TempDir::new().unwrap();
    let fs = Arc::new(FailingWrites::new());
    let c = container_over(&dir, &fs);
    let root = c.directory.create_root(NewMember::new("root")).unwrap();
    let alpha = join(&c, "alpha", &root).unwrap();
    let bob = join(&c, "bob_1", &alpha).unwrap();
    fs.fail_next(1);

    let report = c.distributor.distribute(bob.id).unwrap();

    assert!(report.credited.is_empty());
    let pending = report.pending.expect("walk deferred");
    assert_eq!(pending.resume_from, alpha.id);
    assert_eq!(c.directory.get(alpha.id).unwrap().earnings, 0);

    let resumed = c.distributor.resume(&pending);

    assert_eq!(resumed.credited, vec![alpha.id, root.id]);
    assert_eq!(c.directory.get(alpha.id).unwrap().earnings, 100);
    assert_eq!(c.directory.get(root.id).unwrap().earnings, 100);

    let reopened = ServiceContainer::new(settings_in(&dir)).unwrap();
    assert_eq!(reopened.directory.get(root.id).unwrap().earnings, 100);
}

#[test]
fn given_failed_ledger_write_when_paying_company_then_no_effect_and_retry_pays_once() {
    let dir = TempDir::new().unwrap();
    let fs = Arc::new(FailingWrites::new());
    let c = container_over(&dir, &fs);
    c.ledger.init_company().unwrap();
    let root = c.directory.create_root(NewMember::new("root")).unwrap();
    c.directory.credit_wallet(root.id, 1200).unwrap();
    // the member debit is written, the ledger credit is not
    fs.fail_after(1, 1);

    let err = c.directory.pay_company(root.id).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Internal);
    assert_eq!(c.ledger.company_earnings().unwrap(), 0);
    assert_eq!(c.directory.get(root.id).unwrap().wallet_balance, 1200);

    let paid = c.directory.pay_company(root.id).unwrap();

    assert_eq!(paid.company_total, 1000);
    assert_eq!(paid.remaining_balance, 200);
    let reopened = ServiceContainer::new(settings_in(&dir)).unwrap();
    assert_eq!(reopened.ledger.company_earnings().unwrap(), 1000);
    assert_eq!(reopened.directory.get(root.id).unwrap().wallet_balance, 200);
}

#[test]
fn given_failed_write_during_promotion_when_resuming_then_promoted_once() {
    let dir = TempDir::new().unwrap();
    let fs = Arc::new(FailingWrites::new());
    let c = container_over(&dir, &fs);
    let root = c.directory.create_root(NewMember::new("root")).unwrap();
    promotable(&c, &root).unwrap();
    fs.fail_next(1);

    let outcome = c.promotions.evaluate(root.id).unwrap();

    let pending = outcome.pending.expect("walk deferred");
    assert_eq!(pending.resume_from, root.id);
    assert_eq!(c.directory.get(root.id).unwrap().level, 1);

    let resumed = c.promotions.resume(&pending);

    assert_eq!(resumed.level_of(root.id), Some(2));
    assert_eq!(c.directory.get(root.id).unwrap().level, 2);
}

#[test]
fn given_failed_write_when_registering_then_member_absent_and_handle_free() {
    let dir = TempDir::new().unwrap();
    let fs = Arc::new(FailingWrites::new());
    let c = container_over(&dir, &fs);
    let root = c.directory.create_root(NewMember::new("root")).unwrap();
    fs.fail_next(1);

    assert!(join(&c, "alice", &root).is_err());

    assert!(c.directory.by_handle("alice").is_err());
    assert!(c.directory.get(root.id).unwrap().downlines.is_empty());
    let alice = join(&c, "alice", &root).unwrap();
    assert_eq!(c.directory.get(root.id).unwrap().downlines, vec![alice.id]);
}

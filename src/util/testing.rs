//! Test support: logging setup, network fixtures and fault injection

use std::collections::HashMap;
use std::env;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex, Once};

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

use crate::application::ApplicationResult;
use crate::config::Settings;
use crate::domain::{Achiever, CompanyLedger, Member, MemberId, NewMember, Policy};
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::error::{StoreError, StoreResult};
use crate::infrastructure::memory_store::InMemoryStore;
use crate::infrastructure::traits::{FileSystem, MemberMutation, MemberStore, RealFileSystem};

static TEST_SETUP: Once = Once::new();

pub fn init_test_setup() {
    TEST_SETUP.call_once(|| {
        if env::var("RUST_LOG").is_err() {
            env::set_var("RUST_LOG", "debug");
        }
        setup_test_logging();
        info!("Test Setup complete");
    });
}

fn setup_test_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    let subscriber = tracing_subscriber::registry().with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(env_filter),
    );

    if tracing::dispatcher::has_been_set() {
        debug!("Tracing subscriber already set");
    } else {
        subscriber.try_init().unwrap_or_else(|e| {
            eprintln!("Error: Failed to set up logging: {}", e);
        });
    }
}

/// Container over a fresh in-memory store with an initialised company ledger.
pub fn memory_container(policy: Policy) -> ServiceContainer {
    memory_container_over(Arc::new(InMemoryStore::new()), policy)
}

/// Container over `store`; the company ledger is initialised if possible.
pub fn memory_container_over(store: Arc<dyn MemberStore>, policy: Policy) -> ServiceContainer {
    init_test_setup();
    if let Err(e) = store.init_company() {
        debug!("company ledger not initialised: {}", e);
    }
    let settings = Settings {
        policy,
        ..Settings::default()
    };
    ServiceContainer::with_store(settings, store)
}

/// Register `handle` under `sponsor` without distribution or promotion.
pub fn join(c: &ServiceContainer, handle: &str, sponsor: &Member) -> ApplicationResult<Member> {
    c.directory
        .register(NewMember::new(handle), &sponsor.referral_code)
}

/// Give `sponsor` three downlines named `{prefix}1..{prefix}3`.
pub fn fill(c: &ServiceContainer, sponsor: &Member, prefix: &str) -> ApplicationResult<Vec<Member>> {
    (1..=3)
        .map(|i| join(c, &format!("{prefix}{i}"), sponsor))
        .collect()
}

/// Give `root` three saturated children, the smallest promotable shape.
///
/// Returns the children in join order, as they were before saturation.
pub fn promotable(c: &ServiceContainer, root: &Member) -> ApplicationResult<Vec<Member>> {
    let children = fill(c, root, &format!("{}_c", root.handle))?;
    for child in &children {
        fill(c, child, &format!("{}_g", child.handle))?;
    }
    Ok(children)
}

/// Chain `root <- {prefix}1 <- {prefix}2 ...`, returned nearest the root first.
pub fn chain(
    c: &ServiceContainer,
    root: &Member,
    prefix: &str,
    len: usize,
) -> ApplicationResult<Vec<Member>> {
    let mut members: Vec<Member> = Vec::with_capacity(len);
    for i in 1..=len {
        let sponsor = members.last().unwrap_or(root).clone();
        members.push(join(c, &format!("{prefix}{i}"), &sponsor)?);
    }
    Ok(members)
}

/// Store wrapper whose `update` and `archive` fail a set number of times
/// per member with an I/O error.
pub struct FlakyStore {
    inner: InMemoryStore,
    failures: Mutex<HashMap<MemberId, usize>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryStore::new(),
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Fail the next `times` mutations of `member`.
    pub fn fail_next(&self, member: MemberId, times: usize) {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(member, times);
    }

    fn trip(&self, member: MemberId) -> StoreResult<()> {
        let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        match failures.get_mut(&member) {
            Some(left) if *left > 0 => {
                *left -= 1;
                Err(StoreError::io(
                    format!("injected failure for {member}"),
                    std::io::Error::new(std::io::ErrorKind::Other, "injected"),
                ))
            }
            _ => Ok(()),
        }
    }
}

impl Default for FlakyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemberStore for FlakyStore {
    fn get(&self, id: MemberId) -> StoreResult<Option<Member>> {
        self.inner.get(id)
    }

    fn find_by_handle(&self, handle: &str) -> StoreResult<Option<Member>> {
        self.inner.find_by_handle(handle)
    }

    fn find_by_referral_code(&self, code: &str) -> StoreResult<Option<Member>> {
        self.inner.find_by_referral_code(code)
    }

    fn insert_root(&self, member: Member) -> StoreResult<()> {
        self.inner.insert_root(member)
    }

    fn insert_under_sponsor(&self, sponsor: MemberId, member: Member) -> StoreResult<Member> {
        self.inner.insert_under_sponsor(sponsor, member)
    }

    fn update(&self, id: MemberId, apply: MemberMutation<'_>) -> StoreResult<Member> {
        self.trip(id)?;
        self.inner.update(id, apply)
    }

    fn archive(
        &self,
        id: MemberId,
        apply: MemberMutation<'_>,
        achieved_at: DateTime<Utc>,
    ) -> StoreResult<Achiever> {
        self.trip(id)?;
        self.inner.archive(id, apply, achieved_at)
    }

    fn descendants(&self, root: MemberId, max_depth: usize) -> StoreResult<Vec<Member>> {
        self.inner.descendants(root, max_depth)
    }

    fn members(&self) -> StoreResult<Vec<Member>> {
        self.inner.members()
    }

    fn achievers(&self) -> StoreResult<Vec<Achiever>> {
        self.inner.achievers()
    }

    fn find_achiever(&self, handle: &str) -> StoreResult<Option<Achiever>> {
        self.inner.find_achiever(handle)
    }

    fn company(&self) -> StoreResult<Option<CompanyLedger>> {
        self.inner.company()
    }

    fn init_company(&self) -> StoreResult<CompanyLedger> {
        self.inner.init_company()
    }

    fn update_company(
        &self,
        apply: &mut dyn FnMut(&mut CompanyLedger),
    ) -> StoreResult<CompanyLedger> {
        self.inner.update_company(apply)
    }
}


/// Real filesystem whose snapshot writes can be made to fail.
#[derive(Debug, Default)]
pub struct FailingWrites {
    real: RealFileSystem,
    /// Writes still allowed through, then writes still to fail
    plan: Mutex<(usize, usize)>,
}

impl FailingWrites {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `times` calls to `write_atomic`.
    pub fn fail_next(&self, times: usize) {
        self.fail_after(0, times);
    }

    /// Let `ok` writes through, then fail the following `times`.
    pub fn fail_after(&self, ok: usize, times: usize) {
        *self.plan.lock().unwrap_or_else(|e| e.into_inner()) = (ok, times);
    }

    fn trip(&self) -> bool {
        let mut plan = self.plan.lock().unwrap_or_else(|e| e.into_inner());
        match *plan {
            (0, 0) => false,
            (0, failing) => {
                plan.1 = failing - 1;
                true
            }
            (ok, _) => {
                plan.0 = ok - 1;
                false
            }
        }
    }
}

impl FileSystem for FailingWrites {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.real.read_to_string(path)
    }

    fn write_atomic(&self, path: &Path, content: &str) -> io::Result<()> {
        if self.trip() {
            return Err(io::Error::new(io::ErrorKind::Other, "injected write failure"));
        }
        self.real.write_atomic(path, content)
    }

    fn exists(&self, path: &Path) -> bool {
        self.real.exists(path)
    }

    fn ensure_parent(&self, path: &Path) -> io::Result<()> {
        self.real.ensure_parent(path)
    }
}

//! JSON snapshot persistence on top of the in-memory store
//!
//! The whole store is written after every successful mutation. Writes go
//! through `FileSystem::write_atomic`, so a crash leaves either the previous
//! or the new snapshot on disk. A mutation whose snapshot cannot be written
//! is rolled back in memory, so an error always means no effect.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::{debug, error, warn};

use crate::domain::{Achiever, CompanyLedger, Member, MemberId};
use crate::infrastructure::error::{StoreError, StoreResult};
use crate::infrastructure::memory_store::{InMemoryStore, Snapshot};
use crate::infrastructure::traits::{FileSystem, MemberMutation, MemberStore};

pub struct JsonFileStore {
    inner: InMemoryStore,
    path: PathBuf,
    fs: Arc<dyn FileSystem>,
    /// Last state known to match the file; held for the whole of a mutation
    saved: Mutex<Snapshot>,
}

impl JsonFileStore {
    /// Open the snapshot at `path`, starting empty if the file does not exist.
    pub fn open(path: &Path, fs: Arc<dyn FileSystem>) -> StoreResult<Self> {
        let saved = if fs.exists(path) {
            let content = fs
                .read_to_string(path)
                .map_err(|e| StoreError::io(format!("read {}", path.display()), e))?;
            serde_json::from_str(&content)?
        } else {
            debug!("no snapshot at {}, starting empty", path.display());
            Snapshot::default()
        };
        Ok(Self {
            inner: InMemoryStore::from_snapshot(saved.clone())?,
            path: path.to_path_buf(),
            fs,
            saved: Mutex::new(saved),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `mutation` and write the resulting state.
    ///
    /// Mutations are serialised so a rollback never discards another
    /// caller's committed change.
    fn persisted<T>(
        &self,
        mutation: impl FnOnce(&InMemoryStore) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut saved = self.saved.lock().map_err(|_| StoreError::Poisoned)?;
        let value = mutation(&self.inner)?;
        match self.write_snapshot() {
            Ok(snapshot) => {
                *saved = snapshot;
                Ok(value)
            }
            Err(e) => {
                warn!("rolling back mutation after failed write: {}", e);
                self.inner.restore(saved.clone())?;
                Err(e)
            }
        }
    }

    fn write_snapshot(&self) -> StoreResult<Snapshot> {
        let snapshot = self.inner.snapshot()?;
        let content = serde_json::to_string_pretty(&snapshot)?;
        self.fs.write_atomic(&self.path, &content).map_err(|e| {
            error!("snapshot write failed for {}: {}", self.path.display(), e);
            StoreError::io(format!("write {}", self.path.display()), e)
        })?;
        Ok(snapshot)
    }
}

impl MemberStore for JsonFileStore {
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
        self.persisted(|store| store.insert_root(member))
    }

    fn insert_under_sponsor(&self, sponsor: MemberId, member: Member) -> StoreResult<Member> {
        self.persisted(|store| store.insert_under_sponsor(sponsor, member))
    }

    fn update(&self, id: MemberId, apply: MemberMutation<'_>) -> StoreResult<Member> {
        self.persisted(|store| store.update(id, apply))
    }

    fn archive(
        &self,
        id: MemberId,
        apply: MemberMutation<'_>,
        achieved_at: DateTime<Utc>,
    ) -> StoreResult<Achiever> {
        self.persisted(|store| store.archive(id, apply, achieved_at))
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
        self.persisted(|store| store.init_company())
    }

    fn update_company(
        &self,
        apply: &mut dyn FnMut(&mut CompanyLedger),
    ) -> StoreResult<CompanyLedger> {
        self.persisted(|store| store.update_company(apply))
    }
}

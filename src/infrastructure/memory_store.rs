//! In-memory member store with per-record locking
//!
//! Lock order is always table lock first, then at most one record mutex.
//! Record mutations hold the table read lock, so updates to different
//! members run in parallel while updates to the same member serialise.
//! Structural changes (insert, archive) take the table write lock.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::domain::{Achiever, CompanyLedger, Member, MemberId};
use crate::infrastructure::error::{StoreError, StoreResult};
use crate::infrastructure::traits::{MemberMutation, MemberStore};

/// Serializable image of the whole store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub members: Vec<Member>,
    pub achievers: Vec<Achiever>,
    pub company: Option<CompanyLedger>,
}

#[derive(Debug, Default)]
struct Tables {
    members: HashMap<MemberId, Arc<Mutex<Member>>>,
    by_handle: HashMap<String, MemberId>,
    by_code: HashMap<String, MemberId>,
    achievers: Vec<Achiever>,
    company: Option<CompanyLedger>,
}

impl Tables {
    fn check_unique(&self, member: &Member) -> StoreResult<()> {
        if self.members.contains_key(&member.id) {
            return Err(StoreError::Duplicate {
                field: "id",
                value: member.id.to_string(),
            });
        }
        if self.by_handle.contains_key(&member.handle)
            || self.achievers.iter().any(|a| a.handle == member.handle)
        {
            return Err(StoreError::Duplicate {
                field: "handle",
                value: member.handle.clone(),
            });
        }
        if self.by_code.contains_key(&member.referral_code) {
            return Err(StoreError::Duplicate {
                field: "referral code",
                value: member.referral_code.clone(),
            });
        }
        Ok(())
    }

    fn from_snapshot(snapshot: Snapshot) -> StoreResult<Self> {
        let mut tables = Tables {
            achievers: snapshot.achievers,
            company: snapshot.company,
            ..Default::default()
        };
        for member in snapshot.members {
            tables.check_unique(&member)?;
            tables.insert(member);
        }
        Ok(tables)
    }

    fn insert(&mut self, member: Member) {
        self.by_handle.insert(member.handle.clone(), member.id);
        self.by_code.insert(member.referral_code.clone(), member.id);
        self.members.insert(member.id, Arc::new(Mutex::new(member)));
    }

    fn record(&self, id: MemberId) -> Option<&Arc<Mutex<Member>>> {
        self.members.get(&id)
    }
}

fn lock_record(record: &Mutex<Member>) -> StoreResult<MutexGuard<'_, Member>> {
    record.lock().map_err(|_| StoreError::Poisoned)
}

/// Member store held entirely in process memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store, including its lookup indexes, from a snapshot.
    pub fn from_snapshot(snapshot: Snapshot) -> StoreResult<Self> {
        let tables = Tables::from_snapshot(snapshot)?;
        debug!(members = tables.members.len(), "store restored from snapshot");
        Ok(Self {
            tables: RwLock::new(tables),
        })
    }

    /// Replace the whole content with `snapshot`.
    pub fn restore(&self, snapshot: Snapshot) -> StoreResult<()> {
        let tables = Tables::from_snapshot(snapshot)?;
        *self.write()? = tables;
        debug!("store rolled back to snapshot");
        Ok(())
    }

    /// Consistent copy of the whole store.
    pub fn snapshot(&self) -> StoreResult<Snapshot> {
        let tables = self.read()?;
        let mut members = Vec::with_capacity(tables.members.len());
        for record in tables.members.values() {
            members.push(lock_record(record)?.clone());
        }
        members.sort_by(|a, b| {
            a.registration_date
                .cmp(&b.registration_date)
                .then_with(|| a.handle.cmp(&b.handle))
        });
        Ok(Snapshot {
            members,
            achievers: tables.achievers.clone(),
            company: tables.company.clone(),
        })
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.tables.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.tables.write().map_err(|_| StoreError::Poisoned)
    }

    fn find_by_index(
        &self,
        pick: impl Fn(&Tables) -> Option<MemberId>,
    ) -> StoreResult<Option<Member>> {
        let tables = self.read()?;
        let found = match pick(&tables).and_then(|id| tables.record(id)) {
            Some(record) => Some(lock_record(record)?.clone()),
            None => None,
        };
        Ok(found)
    }
}

impl MemberStore for InMemoryStore {
    fn get(&self, id: MemberId) -> StoreResult<Option<Member>> {
        self.find_by_index(|_| Some(id))
    }

    fn find_by_handle(&self, handle: &str) -> StoreResult<Option<Member>> {
        self.find_by_index(|t| t.by_handle.get(handle).copied())
    }

    fn find_by_referral_code(&self, code: &str) -> StoreResult<Option<Member>> {
        self.find_by_index(|t| t.by_code.get(code).copied())
    }

    #[instrument(level = "debug", skip(self, member), fields(handle = %member.handle))]
    fn insert_root(&self, member: Member) -> StoreResult<()> {
        let mut tables = self.write()?;
        tables.check_unique(&member)?;
        tables.insert(member);
        Ok(())
    }

    #[instrument(level = "debug", skip(self, member), fields(handle = %member.handle))]
    fn insert_under_sponsor(&self, sponsor: MemberId, member: Member) -> StoreResult<Member> {
        let mut tables = self.write()?;
        tables.check_unique(&member)?;

        let record = tables
            .record(sponsor)
            .cloned()
            .ok_or_else(|| StoreError::not_found("sponsor", sponsor))?;
        let updated_sponsor = {
            let mut sponsor_guard = lock_record(&record)?;
            let mut staged = sponsor_guard.clone();
            staged.attach_downline(member.id)?;
            *sponsor_guard = staged.clone();
            staged
        };
        tables.insert(member);
        Ok(updated_sponsor)
    }

    fn update(&self, id: MemberId, apply: MemberMutation<'_>) -> StoreResult<Member> {
        let tables = self.read()?;
        let record = tables
            .record(id)
            .ok_or_else(|| StoreError::not_found("member", id))?;
        let mut guard = lock_record(record)?;
        let mut staged = guard.clone();
        apply(&mut staged)?;
        *guard = staged.clone();
        Ok(staged)
    }

    #[instrument(level = "debug", skip(self, apply))]
    fn archive(
        &self,
        id: MemberId,
        apply: MemberMutation<'_>,
        achieved_at: DateTime<Utc>,
    ) -> StoreResult<Achiever> {
        let mut tables = self.write()?;
        let record = tables
            .record(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("member", id))?;
        let mut final_state = lock_record(&record)?.clone();
        apply(&mut final_state)?;

        let achiever = final_state.to_achiever(achieved_at);
        tables.members.remove(&id);
        tables.by_handle.remove(&final_state.handle);
        tables.by_code.remove(&final_state.referral_code);
        tables.achievers.push(achiever.clone());
        Ok(achiever)
    }

    #[instrument(level = "debug", skip(self))]
    fn descendants(&self, root: MemberId, max_depth: usize) -> StoreResult<Vec<Member>> {
        let tables = self.read()?;
        let root_record = tables
            .record(root)
            .ok_or_else(|| StoreError::not_found("member", root))?;
        let root_children = lock_record(root_record)?.downlines.clone();

        let mut visited = HashSet::from([root]);
        let mut queue: VecDeque<(MemberId, usize)> =
            root_children.into_iter().map(|id| (id, 1)).collect();
        let mut found = Vec::new();

        while let Some((id, depth)) = queue.pop_front() {
            if depth > max_depth || !visited.insert(id) {
                continue;
            }
            let Some(record) = tables.record(id) else {
                warn!(member = %id, "downline reference points to missing member");
                continue;
            };
            let member = lock_record(record)?.clone();
            queue.extend(member.downlines.iter().map(|&child| (child, depth + 1)));
            found.push(member);
        }
        Ok(found)
    }

    fn members(&self) -> StoreResult<Vec<Member>> {
        Ok(self.snapshot()?.members)
    }

    fn achievers(&self) -> StoreResult<Vec<Achiever>> {
        Ok(self.read()?.achievers.clone())
    }

    fn find_achiever(&self, handle: &str) -> StoreResult<Option<Achiever>> {
        Ok(self
            .read()?
            .achievers
            .iter()
            .find(|a| a.handle == handle)
            .cloned())
    }

    fn company(&self) -> StoreResult<Option<CompanyLedger>> {
        Ok(self.read()?.company.clone())
    }

    fn init_company(&self) -> StoreResult<CompanyLedger> {
        let mut tables = self.write()?;
        Ok(tables.company.get_or_insert_with(CompanyLedger::default).clone())
    }

    fn update_company(
        &self,
        apply: &mut dyn FnMut(&mut CompanyLedger),
    ) -> StoreResult<CompanyLedger> {
        let mut tables = self.write()?;
        let ledger = tables
            .company
            .as_mut()
            .ok_or_else(|| StoreError::not_found("company ledger", "singleton"))?;
        apply(ledger);
        Ok(ledger.clone())
    }
}

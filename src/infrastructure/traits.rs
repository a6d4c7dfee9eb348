//! I/O boundary traits for testability
//!
//! These traits abstract persistence, allowing services to run against the
//! in-memory store in tests and the JSON snapshot store from the CLI.

use std::io::{self, Write};
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::domain::{Achiever, CompanyLedger, DomainError, Member, MemberId};
use crate::infrastructure::error::StoreResult;

/// Mutation applied to a member inside the store's record lock.
pub type MemberMutation<'a> = &'a mut dyn FnMut(&mut Member) -> Result<(), DomainError>;

/// Storage collaborator for member records, achievers and the company ledger.
///
/// Every mutating method is atomic: a failing mutation leaves no trace.
pub trait MemberStore: Send + Sync {
    /// Fetch a member by id.
    fn get(&self, id: MemberId) -> StoreResult<Option<Member>>;

    /// Fetch a member by its unique handle.
    fn find_by_handle(&self, handle: &str) -> StoreResult<Option<Member>>;

    /// Fetch a member by its unique referral code.
    fn find_by_referral_code(&self, code: &str) -> StoreResult<Option<Member>>;

    /// Insert a member without sponsor.
    fn insert_root(&self, member: Member) -> StoreResult<()>;

    /// Insert `member` and append it to the sponsor's downlines as one unit.
    ///
    /// Fails without side effects when the sponsor is missing, full, or the
    /// handle/referral code is taken. Returns the updated sponsor.
    fn insert_under_sponsor(&self, sponsor: MemberId, member: Member) -> StoreResult<Member>;

    /// Read-modify-write a single member, serialised per record.
    fn update(&self, id: MemberId, apply: MemberMutation<'_>) -> StoreResult<Member>;

    /// Apply a final mutation, then move the member into the achiever archive.
    fn archive(
        &self,
        id: MemberId,
        apply: MemberMutation<'_>,
        achieved_at: DateTime<Utc>,
    ) -> StoreResult<Achiever>;

    /// Flat breadth-first expansion of all members below `root`, at most
    /// `max_depth` levels deep. The root itself is not included.
    fn descendants(&self, root: MemberId, max_depth: usize) -> StoreResult<Vec<Member>>;

    /// All active members.
    fn members(&self) -> StoreResult<Vec<Member>>;

    /// All achievers in archive order.
    fn achievers(&self) -> StoreResult<Vec<Achiever>>;

    /// Fetch an achiever by the handle it had as a member.
    fn find_achiever(&self, handle: &str) -> StoreResult<Option<Achiever>>;

    /// The company ledger, if initialised.
    fn company(&self) -> StoreResult<Option<CompanyLedger>>;

    /// Create the company ledger if absent and return it.
    fn init_company(&self) -> StoreResult<CompanyLedger>;

    /// Atomic update of the company ledger. Fails if not initialised.
    fn update_company(
        &self,
        apply: &mut dyn FnMut(&mut CompanyLedger),
    ) -> StoreResult<CompanyLedger>;
}

/// Filesystem abstraction for testability.
pub trait FileSystem: Send + Sync {
    /// Read file contents to string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Replace file content so readers see either the old or the new version.
    fn write_atomic(&self, path: &Path, content: &str) -> io::Result<()>;

    /// Check if path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Create parent directories if needed.
    fn ensure_parent(&self, path: &Path) -> io::Result<()>;
}

// ============================================================
// REAL IMPLEMENTATIONS
// ============================================================

/// Real filesystem implementation.
#[derive(Debug, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn write_atomic(&self, path: &Path, content: &str) -> io::Result<()> {
        self.ensure_parent(path)?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn ensure_parent(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

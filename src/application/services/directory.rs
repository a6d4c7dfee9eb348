//! Member directory service
//!
//! Creates members, attaches them to sponsors, and owns wallet and profile
//! operations on individual member records.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info};

use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{
    generate_referral_code, DomainError, Member, MemberId, NewMember, Policy, ProfileUpdate,
    DOWNLINE_CAPACITY,
};
use crate::infrastructure::error::StoreError;
use crate::infrastructure::traits::MemberStore;

/// Attempts at drawing an unused referral code before giving up.
const REFERRAL_CODE_ATTEMPTS: usize = 5;

/// Verified identity of the caller, supplied by the authentication layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerIdentity {
    pub member_id: MemberId,
    pub is_admin: bool,
}

/// Summary shown on a member's dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dashboard {
    pub handle: String,
    pub level: u32,
    pub earnings: u64,
    pub wallet_balance: u64,
    pub downlines: usize,
    pub referral_code: Option<String>,
    pub is_achiever: bool,
    pub rewards: Vec<String>,
}

/// Result of a company payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompanyPayment {
    pub amount: u64,
    pub remaining_balance: u64,
    pub company_total: u64,
}

/// Downline capacity of a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeSlots {
    /// Slot units purchased or granted to the member
    pub granted: u32,
    /// Direct downline positions still open
    pub open: usize,
}

/// Service owning member creation and single-record operations.
pub struct MemberDirectory {
    store: Arc<dyn MemberStore>,
    policy: Policy,
}

impl MemberDirectory {
    pub fn new(store: Arc<dyn MemberStore>, policy: Policy) -> Self {
        Self { store, policy }
    }

    /// Create a member without sponsor, the root of a tree. Roots are admins.
    pub fn create_root(&self, input: NewMember) -> ApplicationResult<Member> {
        debug!("create_root: handle={}", input.handle);
        input.validate()?;
        let member = self.insert_with_fresh_code(input, None, true, |member| {
            self.store.insert_root(member).map(|_| ())
        })?;
        info!(handle = %member.handle, code = %member.referral_code, "root member created");
        Ok(member)
    }

    /// Create a member under the sponsor owning `sponsor_code`.
    ///
    /// Creation and attachment to the sponsor are a single store operation,
    /// so concurrent registrations can never overfill a sponsor.
    pub fn register(&self, input: NewMember, sponsor_code: &str) -> ApplicationResult<Member> {
        debug!("register: handle={}, sponsor={}", input.handle, sponsor_code);
        input.validate()?;

        let sponsor = self
            .store
            .find_by_referral_code(sponsor_code)?
            .ok_or_else(|| ApplicationError::not_found("sponsor", sponsor_code))?;
        if sponsor.downlines.len() >= DOWNLINE_CAPACITY {
            return Err(DomainError::CapacityExceeded {
                sponsor: sponsor.handle,
                capacity: DOWNLINE_CAPACITY,
            }
            .into());
        }

        let member = self.insert_with_fresh_code(input, Some(sponsor.id), false, |member| {
            self.store
                .insert_under_sponsor(sponsor.id, member)
                .map(|_| ())
        })?;
        info!(
            handle = %member.handle,
            sponsor = %sponsor.handle,
            "member registered"
        );
        Ok(member)
    }

    fn insert_with_fresh_code(
        &self,
        input: NewMember,
        sponsor: Option<MemberId>,
        is_admin: bool,
        insert: impl Fn(Member) -> Result<(), StoreError>,
    ) -> ApplicationResult<Member> {
        for _ in 0..REFERRAL_CODE_ATTEMPTS {
            let mut member =
                Member::new(input.clone(), generate_referral_code(), sponsor, Utc::now());
            member.is_admin = is_admin;
            match insert(member.clone()) {
                Ok(()) => return Ok(member),
                Err(StoreError::Duplicate {
                    field: "referral code",
                    value,
                }) => debug!("referral code {} taken, drawing again", value),
                Err(e) => return Err(e.into()),
            }
        }
        Err(ApplicationError::validation(
            "could not allocate a unique referral code",
        ))
    }

    pub fn get(&self, id: MemberId) -> ApplicationResult<Member> {
        self.store
            .get(id)?
            .ok_or_else(|| ApplicationError::not_found("member", id))
    }

    pub fn by_handle(&self, handle: &str) -> ApplicationResult<Member> {
        self.store
            .find_by_handle(handle)?
            .ok_or_else(|| ApplicationError::not_found("member", handle))
    }

    pub fn by_referral_code(&self, code: &str) -> ApplicationResult<Member> {
        self.store
            .find_by_referral_code(code)?
            .ok_or_else(|| ApplicationError::not_found("member", code))
    }

    /// Dashboard for an active member, or for an achiever by former handle.
    pub fn dashboard(&self, handle: &str) -> ApplicationResult<Dashboard> {
        if let Some(member) = self.store.find_by_handle(handle)? {
            return Ok(Dashboard {
                handle: member.handle,
                level: member.level,
                earnings: member.earnings,
                wallet_balance: member.wallet_balance,
                downlines: member.downlines.len(),
                referral_code: Some(member.referral_code),
                is_achiever: false,
                rewards: member.rewards,
            });
        }
        let achiever = self
            .store
            .find_achiever(handle)?
            .ok_or_else(|| ApplicationError::not_found("member", handle))?;
        Ok(Dashboard {
            handle: achiever.handle,
            level: achiever.level,
            earnings: achiever.earnings,
            wallet_balance: 0,
            downlines: 0,
            referral_code: None,
            is_achiever: true,
            rewards: achiever.rewards,
        })
    }

    /// Withdraw from the wallet, returns the remaining balance.
    pub fn withdraw(&self, handle: &str, amount: u64) -> ApplicationResult<u64> {
        debug!("withdraw: handle={}, amount={}", handle, amount);
        let member = self.by_handle(handle)?;
        let mut remaining = 0;
        self.store.update(member.id, &mut |m| {
            remaining = m.debit_wallet(amount)?;
            Ok(())
        })?;
        info!(handle, amount, remaining, "withdrawal");
        Ok(remaining)
    }

    /// Credit an externally approved deposit, returns the new balance.
    pub fn credit_wallet(&self, id: MemberId, amount: u64) -> ApplicationResult<u64> {
        debug!("credit_wallet: member={}, amount={}", id, amount);
        let mut balance = 0;
        self.store.update(id, &mut |m| {
            balance = m.credit_wallet(amount)?;
            Ok(())
        })?;
        Ok(balance)
    }

    /// Pay the fixed lump sum from the wallet into the company ledger.
    pub fn pay_company(&self, id: MemberId) -> ApplicationResult<CompanyPayment> {
        let amount = self.policy.company_payment;
        debug!("pay_company: member={}, amount={}", id, amount);
        if self.store.company()?.is_none() {
            return Err(ApplicationError::not_found("company ledger", "singleton"));
        }

        let mut remaining_balance = 0;
        self.store.update(id, &mut |m| {
            remaining_balance = m.record_company_payment(amount, Utc::now())?;
            Ok(())
        })?;

        let company = match self.store.update_company(&mut |c| {
            c.credit(amount);
        }) {
            Ok(company) => company,
            Err(e) => {
                error!("company credit failed for {}, refunding: {}", id, e);
                if let Err(refund) = self.store.update(id, &mut |m| {
                    m.refund_company_payment(amount);
                    Ok(())
                }) {
                    error!("refund of {} to {} failed: {}", amount, id, refund);
                }
                return Err(e.into());
            }
        };

        info!(member = %id, amount, total = company.total_earnings, "company payment");
        Ok(CompanyPayment {
            amount,
            remaining_balance,
            company_total: company.total_earnings,
        })
    }

    pub fn free_slots(&self, id: MemberId) -> ApplicationResult<FreeSlots> {
        let member = self.get(id)?;
        Ok(FreeSlots {
            granted: member.free_slots,
            open: member.open_slots(),
        })
    }

    /// Change contact, bank or KYC fields. Only the member or an admin may.
    pub fn update_profile(
        &self,
        caller: &CallerIdentity,
        id: MemberId,
        update: ProfileUpdate,
    ) -> ApplicationResult<Member> {
        debug!("update_profile: caller={}, member={}", caller.member_id, id);
        if caller.member_id != id && !caller.is_admin {
            return Err(ApplicationError::Forbidden {
                caller: caller.member_id,
                target: id,
            });
        }
        update.validate()?;
        let mut pending = Some(update);
        let member = self.store.update(id, &mut |m| {
            if let Some(update) = pending.take() {
                m.apply_profile(update);
            }
            Ok(())
        })?;
        Ok(member)
    }
}

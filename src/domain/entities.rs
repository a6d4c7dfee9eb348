//! Domain entities: members, achievers and the company ledger

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::error::DomainError;
use crate::domain::policy::{rewards_for_level, DOWNLINE_CAPACITY};

/// Stable identity of a member record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(Uuid);

impl MemberId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MemberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MemberId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Generate a short referral code: the first 8 characters of a v4 UUID.
pub fn generate_referral_code() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Active,
    #[default]
    Inactive,
}

impl fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberStatus::Active => write!(f, "active"),
            MemberStatus::Inactive => write!(f, "inactive"),
        }
    }
}

/// Payout details a member can attach to the profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BankDetails {
    pub bank_name: Option<String>,
    pub account_number: Option<String>,
    pub ifsc_code: Option<String>,
    pub account_holder_name: Option<String>,
    pub upi_number: Option<String>,
}

/// References to KYC documents held by the external file store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KycDocuments {
    pub aadhar_front: Option<String>,
    pub aadhar_back: Option<String>,
    pub pancard: Option<String>,
}

/// Registration input for a new member.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewMember {
    pub handle: String,
    pub name: Option<String>,
    pub mobile: Option<String>,
    pub email: Option<String>,
}

impl NewMember {
    pub fn new(handle: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            ..Default::default()
        }
    }

    pub fn with_mobile(mut self, mobile: impl Into<String>) -> Self {
        self.mobile = Some(mobile.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Check handle and contact fields before anything is written.
    pub fn validate(&self) -> Result<(), DomainError> {
        validate_handle(&self.handle)?;
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        if let Some(mobile) = &self.mobile {
            validate_mobile(mobile)?;
        }
        Ok(())
    }
}

fn handle_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.\-]{3,32}$").unwrap())
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap())
}

fn mobile_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\+?[0-9]{6,15}$").unwrap())
}

pub fn validate_handle(handle: &str) -> Result<(), DomainError> {
    if handle_regex().is_match(handle) {
        Ok(())
    } else {
        Err(DomainError::InvalidHandle(handle.to_string()))
    }
}

fn validate_email(email: &str) -> Result<(), DomainError> {
    if email_regex().is_match(email) {
        Ok(())
    } else {
        Err(DomainError::InvalidContact {
            field: "email",
            value: email.to_string(),
        })
    }
}

fn validate_mobile(mobile: &str) -> Result<(), DomainError> {
    if mobile_regex().is_match(mobile) {
        Ok(())
    } else {
        Err(DomainError::InvalidContact {
            field: "mobile",
            value: mobile.to_string(),
        })
    }
}

/// Partial profile change. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub mobile: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub bank: Option<BankDetails>,
    pub kyc: Option<KycDocuments>,
}

impl ProfileUpdate {
    pub fn validate(&self) -> Result<(), DomainError> {
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        if let Some(mobile) = &self.mobile {
            validate_mobile(mobile)?;
        }
        Ok(())
    }
}

/// A participant in the sponsorship tree.
///
/// Tree links are plain ids: `sponsor` points up, `downlines` point down in
/// join order. Records never own each other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub handle: String,
    pub referral_code: String,
    pub name: Option<String>,
    pub mobile: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub bank: BankDetails,
    #[serde(default)]
    pub kyc: KycDocuments,
    #[serde(default)]
    pub is_admin: bool,

    pub sponsor: Option<MemberId>,
    pub downlines: Vec<MemberId>,

    pub level: u32,
    pub earnings: u64,
    pub self_earning: u64,
    pub wallet_balance: u64,
    pub rewards: Vec<String>,
    pub free_slots: u32,

    pub status: MemberStatus,
    pub last_payment: Option<DateTime<Utc>>,
    pub registration_date: DateTime<Utc>,
}

impl Member {
    pub fn new(
        input: NewMember,
        referral_code: String,
        sponsor: Option<MemberId>,
        registered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MemberId::new(),
            handle: input.handle,
            referral_code,
            name: input.name,
            mobile: input.mobile,
            email: input.email,
            address: None,
            bank: BankDetails::default(),
            kyc: KycDocuments::default(),
            is_admin: false,
            sponsor,
            downlines: Vec::new(),
            level: 1,
            earnings: 0,
            self_earning: 0,
            wallet_balance: 0,
            rewards: Vec::new(),
            free_slots: 0,
            status: MemberStatus::Inactive,
            last_payment: None,
            registration_date: registered_at,
        }
    }

    /// All downline slots taken.
    pub fn is_saturated(&self) -> bool {
        self.downlines.len() == DOWNLINE_CAPACITY
    }

    pub fn open_slots(&self) -> usize {
        DOWNLINE_CAPACITY.saturating_sub(self.downlines.len())
    }

    /// Append a direct downline, enforcing capacity and distinctness.
    pub fn attach_downline(&mut self, child: MemberId) -> Result<(), DomainError> {
        if child == self.id {
            return Err(DomainError::SelfReference(child));
        }
        if self.downlines.contains(&child) {
            return Err(DomainError::DuplicateDownline(child));
        }
        if self.downlines.len() >= DOWNLINE_CAPACITY {
            return Err(DomainError::CapacityExceeded {
                sponsor: self.handle.clone(),
                capacity: DOWNLINE_CAPACITY,
            });
        }
        self.downlines.push(child);
        Ok(())
    }

    /// Credit earned from a downline registration.
    pub fn credit_upline(&mut self, amount: u64) {
        self.earnings = self.earnings.saturating_add(amount);
        self.wallet_balance = self.wallet_balance.saturating_add(amount);
    }

    pub fn credit_wallet(&mut self, amount: u64) -> Result<u64, DomainError> {
        if amount == 0 {
            return Err(DomainError::ZeroAmount);
        }
        self.wallet_balance = self.wallet_balance.saturating_add(amount);
        Ok(self.wallet_balance)
    }

    /// Debit the wallet, leaving it untouched on failure.
    pub fn debit_wallet(&mut self, amount: u64) -> Result<u64, DomainError> {
        if amount == 0 {
            return Err(DomainError::ZeroAmount);
        }
        if amount > self.wallet_balance {
            return Err(DomainError::InsufficientBalance {
                requested: amount,
                available: self.wallet_balance,
            });
        }
        self.wallet_balance -= amount;
        Ok(self.wallet_balance)
    }

    /// Pay the fixed lump sum into the company and activate the member.
    pub fn record_company_payment(
        &mut self,
        amount: u64,
        paid_at: DateTime<Utc>,
    ) -> Result<u64, DomainError> {
        let remaining = self.debit_wallet(amount)?;
        self.self_earning = self.self_earning.saturating_add(amount);
        self.last_payment = Some(paid_at);
        self.status = MemberStatus::Active;
        Ok(remaining)
    }

    /// Undo a company payment whose ledger credit failed.
    pub fn refund_company_payment(&mut self, amount: u64) {
        self.wallet_balance = self.wallet_balance.saturating_add(amount);
        self.self_earning = self.self_earning.saturating_sub(amount);
    }

    /// Advance one level and collect the rewards for the new level.
    pub fn promote(&mut self) -> Vec<String> {
        self.level += 1;
        let granted = rewards_for_level(self.level);
        self.rewards.extend(granted.iter().cloned());
        granted
    }

    pub fn apply_profile(&mut self, update: ProfileUpdate) {
        if let Some(name) = update.name {
            self.name = Some(name);
        }
        if let Some(mobile) = update.mobile {
            self.mobile = Some(mobile);
        }
        if let Some(email) = update.email {
            self.email = Some(email);
        }
        if let Some(address) = update.address {
            self.address = Some(address);
        }
        if let Some(bank) = update.bank {
            self.bank = bank;
        }
        if let Some(kyc) = update.kyc {
            self.kyc = kyc;
        }
    }

    pub fn to_achiever(&self, achieved_at: DateTime<Utc>) -> Achiever {
        Achiever {
            handle: self.handle.clone(),
            level: self.level,
            rewards: self.rewards.clone(),
            earnings: self.earnings,
            registration_date: self.registration_date,
            achieved_date: achieved_at,
        }
    }

    pub fn summary(&self) -> MemberSummary {
        MemberSummary {
            id: self.id,
            handle: self.handle.clone(),
            name: self.name.clone(),
            mobile: self.mobile.clone(),
            email: self.email.clone(),
            referral_code: self.referral_code.clone(),
            level: self.level,
            sponsor: self.sponsor,
            downlines: self.downlines.clone(),
        }
    }
}

/// Read-only projection used by reports and search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberSummary {
    pub id: MemberId,
    pub handle: String,
    pub name: Option<String>,
    pub mobile: Option<String>,
    pub email: Option<String>,
    pub referral_code: String,
    pub level: u32,
    pub sponsor: Option<MemberId>,
    pub downlines: Vec<MemberId>,
}

impl MemberSummary {
    /// Case-sensitive substring match on handle, mobile or referral code.
    pub fn matches(&self, query: &str) -> bool {
        self.handle.contains(query)
            || self.referral_code.contains(query)
            || self.mobile.as_deref().is_some_and(|m| m.contains(query))
    }
}

impl fmt::Display for MemberSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (L{}, {})", self.handle, self.level, self.referral_code)
    }
}

/// Immutable record of a member who left the progression at the terminal level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achiever {
    pub handle: String,
    pub level: u32,
    pub rewards: Vec<String>,
    pub earnings: u64,
    pub registration_date: DateTime<Utc>,
    pub achieved_date: DateTime<Utc>,
}

/// Company-wide accumulator of lump-sum payments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyLedger {
    pub total_earnings: u64,
}

impl CompanyLedger {
    pub fn credit(&mut self, amount: u64) -> u64 {
        self.total_earnings = self.total_earnings.saturating_add(amount);
        self.total_earnings
    }
}

//! Company ledger and admin listings

use std::sync::Arc;

use tracing::{debug, info};

use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{Achiever, CompanyLedger, Member};
use crate::infrastructure::traits::MemberStore;

pub struct LedgerService {
    store: Arc<dyn MemberStore>,
}

impl LedgerService {
    pub fn new(store: Arc<dyn MemberStore>) -> Self {
        Self { store }
    }

    /// Create the company ledger if it does not exist yet.
    pub fn init_company(&self) -> ApplicationResult<CompanyLedger> {
        let existed = self.store.company()?.is_some();
        let ledger = self.store.init_company()?;
        if !existed {
            info!("company ledger initialised");
        }
        Ok(ledger)
    }

    pub fn company_earnings(&self) -> ApplicationResult<u64> {
        debug!("company_earnings");
        self.store
            .company()?
            .map(|c| c.total_earnings)
            .ok_or_else(|| ApplicationError::not_found("company ledger", "singleton"))
    }

    pub fn achievers(&self) -> ApplicationResult<Vec<Achiever>> {
        Ok(self.store.achievers()?)
    }

    /// Active members ordered by registration date.
    pub fn members(&self) -> ApplicationResult<Vec<Member>> {
        Ok(self.store.members()?)
    }
}

//! Upline earnings distribution

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::application::{ApplicationError, ApplicationResult, IntegrityAnomaly};
use crate::domain::{MemberId, Policy};
use crate::infrastructure::error::StoreError;
use crate::infrastructure::traits::MemberStore;

/// Remainder of a distribution that stopped on a store failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDistribution {
    /// First sponsor that was not credited
    pub resume_from: MemberId,
    /// Hops left including `resume_from`
    pub hops_remaining: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistributionReport {
    /// Credited sponsors, nearest first
    pub credited: Vec<MemberId>,
    pub total: u64,
    pub anomaly: Option<IntegrityAnomaly>,
    pub pending: Option<PendingDistribution>,
}

impl DistributionReport {
    pub fn is_complete(&self) -> bool {
        self.pending.is_none()
    }
}

/// Credits a fixed amount to each sponsor up the chain, a bounded number of hops.
pub struct EarningsDistributor {
    store: Arc<dyn MemberStore>,
    policy: Policy,
}

impl EarningsDistributor {
    pub fn new(store: Arc<dyn MemberStore>, policy: Policy) -> Self {
        Self { store, policy }
    }

    /// Distribute earnings for a newly created member to its uplines.
    pub fn distribute(&self, new_member: MemberId) -> ApplicationResult<DistributionReport> {
        debug!("distribute: member={}", new_member);
        let member = self
            .store
            .get(new_member)?
            .ok_or_else(|| ApplicationError::not_found("member", new_member))?;

        match member.sponsor {
            Some(sponsor) => Ok(self.walk(
                sponsor,
                self.policy.distribution_depth,
                Some(new_member),
            )),
            None => Ok(DistributionReport::default()),
        }
    }

    /// Continue a distribution that stopped on a store failure.
    pub fn resume(&self, pending: &PendingDistribution) -> DistributionReport {
        debug!(
            "resume distribution: from={}, hops={}",
            pending.resume_from, pending.hops_remaining
        );
        self.walk(pending.resume_from, pending.hops_remaining, None)
    }

    fn walk(&self, first: MemberId, hops: usize, origin: Option<MemberId>) -> DistributionReport {
        let unit = self.policy.earning_unit;
        let mut report = DistributionReport::default();
        let mut visited: HashSet<MemberId> = origin.into_iter().collect();
        let mut referrer = origin;
        let mut next = Some(first);

        for hop in 0..hops {
            let Some(sponsor_id) = next else { break };
            if !visited.insert(sponsor_id) {
                let anomaly = IntegrityAnomaly::Cycle { at: sponsor_id };
                warn!("distribution stopped: {}", anomaly);
                report.anomaly = Some(anomaly);
                break;
            }

            match self.store.update(sponsor_id, &mut |m| {
                m.credit_upline(unit);
                Ok(())
            }) {
                Ok(sponsor) => {
                    report.credited.push(sponsor_id);
                    report.total += unit;
                    referrer = Some(sponsor_id);
                    next = sponsor.sponsor;
                }
                Err(StoreError::NotFound { .. }) => {
                    let anomaly = IntegrityAnomaly::MissingMember {
                        referenced_by: referrer,
                        missing: sponsor_id,
                    };
                    warn!("distribution stopped: {}", anomaly);
                    report.anomaly = Some(anomaly);
                    break;
                }
                Err(e) => {
                    error!("credit to {} failed at hop {}: {}", sponsor_id, hop + 1, e);
                    report.pending = Some(PendingDistribution {
                        resume_from: sponsor_id,
                        hops_remaining: hops - hop,
                        reason: e.to_string(),
                    });
                    break;
                }
            }
        }

        debug!(
            "distributed {} to {} uplines",
            report.total,
            report.credited.len()
        );
        report
    }
}

//! Registration flow: create, distribute, promote
//!
//! Distribution and promotion run after the member is committed. Their
//! failures never undo the registration; they are queued as follow-ups and
//! can be retried later.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, error, info, warn};

use crate::application::services::directory::MemberDirectory;
use crate::application::services::earnings::{
    DistributionReport, EarningsDistributor, PendingDistribution,
};
use crate::application::services::promotion::{
    PendingPromotion, PromotionEngine, PromotionOutcome,
};
use crate::application::{ApplicationResult, ErrorKind};
use crate::domain::{Member, MemberId, NewMember, Policy};

/// Deferred work left behind by a registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowUp {
    /// Distribution stopped partway, continue without re-crediting
    Distribute(PendingDistribution),
    /// Distribution for `member` never started
    DistributeFor { member: MemberId },
    /// Promotion walk stopped partway
    Promote(PendingPromotion),
    /// Promotion evaluation of `member` failed before any step
    Evaluate { member: MemberId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationOutcome {
    pub member: Member,
    /// None when distribution failed before crediting anyone
    pub distribution: Option<DistributionReport>,
    pub promotions: Vec<PromotionOutcome>,
    pub deferred: Vec<FollowUp>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryReport {
    pub completed: usize,
    pub requeued: usize,
}

pub struct OnboardingService {
    directory: Arc<MemberDirectory>,
    distributor: Arc<EarningsDistributor>,
    promotions: Arc<PromotionEngine>,
    policy: Policy,
    follow_ups: Mutex<VecDeque<FollowUp>>,
}

impl OnboardingService {
    pub fn new(
        directory: Arc<MemberDirectory>,
        distributor: Arc<EarningsDistributor>,
        promotions: Arc<PromotionEngine>,
        policy: Policy,
    ) -> Self {
        Self {
            directory,
            distributor,
            promotions,
            policy,
            follow_ups: Mutex::new(VecDeque::new()),
        }
    }

    // Queue entries are plain data, a panicking holder cannot leave them torn
    fn queue(&self) -> MutexGuard<'_, VecDeque<FollowUp>> {
        self.follow_ups.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register `input` under the owner of `sponsor_code`, then distribute
    /// earnings and evaluate promotion.
    ///
    /// Only the registration itself can fail the call.
    pub fn register(
        &self,
        input: NewMember,
        sponsor_code: &str,
    ) -> ApplicationResult<RegistrationOutcome> {
        let member = self.directory.register(input, sponsor_code)?;
        let mut deferred = Vec::new();

        let distribution = match self.distributor.distribute(member.id) {
            Ok(report) => {
                if let Some(pending) = &report.pending {
                    deferred.push(FollowUp::Distribute(pending.clone()));
                }
                Some(report)
            }
            Err(e) => {
                error!("distribution for {} failed: {}", member.handle, e);
                deferred.push(FollowUp::DistributeFor { member: member.id });
                None
            }
        };

        let mut promotions = Vec::new();
        if let Some(sponsor) = member.sponsor {
            for candidate in self.promotion_candidates(sponsor) {
                match self.promotions.evaluate(candidate) {
                    Ok(outcome) => {
                        if let Some(pending) = &outcome.pending {
                            deferred.push(FollowUp::Promote(pending.clone()));
                        }
                        let promoted = !outcome.is_noop();
                        promotions.push(outcome);
                        if promoted {
                            // The walk already passed every member above
                            break;
                        }
                    }
                    Err(e) => {
                        error!("promotion evaluation of {} failed: {}", candidate, e);
                        deferred.push(FollowUp::Evaluate { member: candidate });
                    }
                }
            }
        }

        if !deferred.is_empty() {
            warn!(
                "{} follow-ups deferred for {}",
                deferred.len(),
                member.handle
            );
            self.queue().extend(deferred.iter().cloned());
        }
        info!(handle = %member.handle, "registration complete");
        Ok(RegistrationOutcome {
            member,
            distribution,
            promotions,
            deferred,
        })
    }

    fn promotion_candidates(&self, sponsor: MemberId) -> Vec<MemberId> {
        let mut candidates = vec![sponsor];
        if !self.policy.evaluate_grand_sponsor {
            return candidates;
        }
        match self.directory.get(sponsor) {
            Ok(record) => candidates.extend(record.sponsor),
            Err(e) => warn!("grand sponsor of {} unknown: {}", sponsor, e),
        }
        candidates
    }

    /// Follow-ups waiting for a retry, oldest first.
    pub fn pending_follow_ups(&self) -> Vec<FollowUp> {
        self.queue().iter().cloned().collect()
    }

    /// Run every queued follow-up once. Failures go back on the queue.
    pub fn retry_follow_ups(&self) -> RetryReport {
        let batch: Vec<FollowUp> = self.queue().drain(..).collect();
        debug!("retrying {} follow-ups", batch.len());

        let mut report = RetryReport::default();
        let mut requeue = Vec::new();
        for follow_up in batch {
            match self.run(&follow_up) {
                Some(next) => requeue.push(next),
                None => report.completed += 1,
            }
        }
        report.requeued = requeue.len();
        self.queue().extend(requeue);
        report
    }

    /// Execute one follow-up, returning what is still left to do.
    fn run(&self, follow_up: &FollowUp) -> Option<FollowUp> {
        match follow_up {
            FollowUp::Distribute(pending) => self
                .distributor
                .resume(pending)
                .pending
                .map(FollowUp::Distribute),
            FollowUp::DistributeFor { member } => match self.distributor.distribute(*member) {
                Ok(report) => report.pending.map(FollowUp::Distribute),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    warn!("dropping distribution follow-up: {}", e);
                    None
                }
                Err(e) => {
                    error!("distribution retry for {} failed: {}", member, e);
                    Some(follow_up.clone())
                }
            },
            FollowUp::Promote(pending) => self
                .promotions
                .resume(pending)
                .pending
                .map(FollowUp::Promote),
            FollowUp::Evaluate { member } => match self.promotions.evaluate(*member) {
                Ok(outcome) => outcome.pending.map(FollowUp::Promote),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    warn!("dropping promotion follow-up: {}", e);
                    None
                }
                Err(e) => {
                    error!("promotion retry for {} failed: {}", member, e);
                    Some(follow_up.clone())
                }
            },
        }
    }
}

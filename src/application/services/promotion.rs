//! Level promotion and achiever migration
//!
//! A member whose three downlines each have three downlines of their own
//! triggers a promotion walk: the member and every sponsor above it advance
//! one level. Passing the terminal level moves the member to the achiever
//! archive and the walk carries on with its sponsor.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::application::{ApplicationError, ApplicationResult, IntegrityAnomaly};
use crate::domain::{Achiever, Member, MemberId, Policy};
use crate::infrastructure::error::StoreError;
use crate::infrastructure::traits::MemberStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotionStep {
    pub member: MemberId,
    pub handle: String,
    pub new_level: u32,
    pub granted: Vec<String>,
}

/// Remainder of a promotion walk that stopped on a store failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPromotion {
    /// Member whose step did not complete
    pub resume_from: MemberId,
    /// Steps still allowed by the cascade limit, None when unlimited
    pub steps_remaining: Option<usize>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromotionOutcome {
    pub steps: Vec<PromotionStep>,
    /// Members archived by this walk, nearest the start first
    pub achievers: Vec<Achiever>,
    pub anomaly: Option<IntegrityAnomaly>,
    pub pending: Option<PendingPromotion>,
}

impl PromotionOutcome {
    /// Nothing was promoted or archived.
    pub fn is_noop(&self) -> bool {
        self.steps.is_empty() && self.achievers.is_empty()
    }

    pub fn level_of(&self, member: MemberId) -> Option<u32> {
        self.steps
            .iter()
            .rev()
            .find(|s| s.member == member)
            .map(|s| s.new_level)
    }
}

pub struct PromotionEngine {
    store: Arc<dyn MemberStore>,
    policy: Policy,
}

impl PromotionEngine {
    pub fn new(store: Arc<dyn MemberStore>, policy: Policy) -> Self {
        Self { store, policy }
    }

    /// Exactly three downlines, each with exactly three downlines.
    ///
    /// Only the immediate children are inspected, not the whole subtree.
    pub fn is_eligible(&self, member: &Member) -> ApplicationResult<bool> {
        if !member.is_saturated() {
            return Ok(false);
        }
        for child_id in &member.downlines {
            match self.store.get(*child_id)? {
                Some(child) if child.is_saturated() => {}
                Some(_) => return Ok(false),
                None => {
                    warn!(
                        "{}",
                        IntegrityAnomaly::MissingMember {
                            referenced_by: Some(member.id),
                            missing: *child_id,
                        }
                    );
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// Evaluate `member` and, when eligible, promote it and its uplines.
    ///
    /// A non-eligible member yields an empty outcome.
    pub fn evaluate(&self, member: MemberId) -> ApplicationResult<PromotionOutcome> {
        debug!("evaluate promotion: member={}", member);
        let current = self
            .store
            .get(member)?
            .ok_or_else(|| ApplicationError::not_found("member", member))?;

        if !self.is_eligible(&current)? {
            debug!("{} not eligible for promotion", current.handle);
            return Ok(PromotionOutcome::default());
        }
        Ok(self.walk(member, self.policy.cascade_limit))
    }

    /// Continue a promotion walk that stopped on a store failure.
    pub fn resume(&self, pending: &PendingPromotion) -> PromotionOutcome {
        debug!("resume promotion: from={}", pending.resume_from);
        self.walk(pending.resume_from, pending.steps_remaining)
    }

    fn walk(&self, start: MemberId, step_limit: Option<usize>) -> PromotionOutcome {
        let mut outcome = PromotionOutcome::default();
        let mut visited = HashSet::new();
        let mut referrer: Option<MemberId> = None;
        let mut next = Some(start);

        while let Some(id) = next {
            let steps_remaining = step_limit.map(|limit| limit.saturating_sub(outcome.steps.len()));
            if steps_remaining == Some(0) {
                info!("promotion cascade limit reached at {}", id);
                break;
            }
            if !visited.insert(id) {
                let anomaly = IntegrityAnomaly::Cycle { at: id };
                warn!("promotion stopped: {}", anomaly);
                outcome.anomaly = Some(anomaly);
                break;
            }

            match self.step(id, &mut outcome) {
                Ok(StepResult::Continue(sponsor)) => {
                    referrer = Some(id);
                    next = sponsor;
                }
                Ok(StepResult::Archived) => break,
                Err(StoreError::NotFound { .. }) => {
                    let anomaly = IntegrityAnomaly::MissingMember {
                        referenced_by: referrer,
                        missing: id,
                    };
                    warn!("promotion stopped: {}", anomaly);
                    outcome.anomaly = Some(anomaly);
                    break;
                }
                Err(e) => {
                    error!("promotion of {} failed: {}", id, e);
                    outcome.pending = Some(PendingPromotion {
                        resume_from: id,
                        steps_remaining,
                        reason: e.to_string(),
                    });
                    break;
                }
            }
        }
        outcome
    }

    /// Promote or archive one member of the walk.
    fn step(&self, id: MemberId, outcome: &mut PromotionOutcome) -> Result<StepResult, StoreError> {
        let terminal = self.policy.terminal_level;
        let member = self
            .store
            .get(id)?
            .ok_or_else(|| StoreError::not_found("member", id))?;

        if member.level > terminal {
            let achiever = self.store.archive(id, &mut |_| Ok(()), Utc::now())?;
            info!(handle = %achiever.handle, level = achiever.level, "member archived as achiever");
            outcome.achievers.push(achiever);
            return Ok(StepResult::Archived);
        }

        if member.level >= terminal {
            // Promoting past the terminal level archives in the same store operation
            let mut granted = Vec::new();
            let achiever = self.store.archive(
                id,
                &mut |m| {
                    if m.level <= terminal {
                        granted = m.promote();
                    }
                    Ok(())
                },
                Utc::now(),
            )?;
            info!(handle = %achiever.handle, level = achiever.level, "member promoted to achiever");
            outcome.steps.push(PromotionStep {
                member: id,
                handle: achiever.handle.clone(),
                new_level: achiever.level,
                granted,
            });
            outcome.achievers.push(achiever);
            return Ok(StepResult::Continue(member.sponsor));
        }

        let mut granted = Vec::new();
        let updated = self.store.update(id, &mut |m| {
            granted = m.promote();
            Ok(())
        })?;
        info!(handle = %updated.handle, level = updated.level, rewards = ?granted, "member promoted");
        outcome.steps.push(PromotionStep {
            member: id,
            handle: updated.handle.clone(),
            new_level: updated.level,
            granted,
        });

        if updated.level > terminal {
            // A concurrent walk promoted the same member in between. The level is
            // already persisted, so a failed archive is left to the next walk.
            match self.store.archive(id, &mut |_| Ok(()), Utc::now()) {
                Ok(achiever) => outcome.achievers.push(achiever),
                Err(e) => warn!("archival of {} deferred: {}", updated.handle, e),
            }
        }
        Ok(StepResult::Continue(updated.sponsor))
    }
}

enum StepResult {
    Continue(Option<MemberId>),
    Archived,
}

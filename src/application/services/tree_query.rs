//! Read-only views of the sponsorship tree

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, instrument, warn};

use crate::application::{ApplicationError, ApplicationResult, IntegrityAnomaly};
use crate::domain::{DownlineTree, MemberId, MemberSummary, Policy, TreeBuilder};
use crate::infrastructure::traits::MemberStore;

/// One member on the path to the root, with minimal contact fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UplineEntry {
    pub id: MemberId,
    pub handle: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub mobile: Option<String>,
    pub level: u32,
}

impl From<&MemberSummary> for UplineEntry {
    fn from(m: &MemberSummary) -> Self {
        Self {
            id: m.id,
            handle: m.handle.clone(),
            name: m.name.clone(),
            email: m.email.clone(),
            mobile: m.mobile.clone(),
            level: m.level,
        }
    }
}

/// Caller-supplied bounds for exhaustive traversals. All unbounded by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraversalLimits {
    pub max_depth: Option<usize>,
    pub max_nodes: Option<usize>,
    pub timeout: Option<Duration>,
}

impl TraversalLimits {
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_max_nodes(mut self, nodes: usize) -> Self {
        self.max_nodes = Some(nodes);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Why a traversal returned fewer members than exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Truncation {
    Depth,
    Size,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownlineListing {
    /// Descendants in breadth-first order, root excluded
    pub members: Vec<MemberSummary>,
    pub truncated: Option<Truncation>,
}

pub struct TreeQueryService {
    store: Arc<dyn MemberStore>,
    policy: Policy,
}

impl TreeQueryService {
    pub fn new(store: Arc<dyn MemberStore>, policy: Policy) -> Self {
        Self { store, policy }
    }

    fn summary(&self, id: MemberId) -> ApplicationResult<MemberSummary> {
        self.store
            .get(id)?
            .map(|m| m.summary())
            .ok_or_else(|| ApplicationError::not_found("member", id))
    }

    /// Path from `id` to the root, the member itself first.
    ///
    /// A missing sponsor or a revisited id ends the chain early.
    pub fn upline(&self, id: MemberId) -> ApplicationResult<Vec<UplineEntry>> {
        debug!("upline: member={}", id);
        let start = self.summary(id)?;
        let mut visited = HashSet::from([start.id]);
        let mut next = start.sponsor;
        let mut referrer = start.id;
        let mut chain = vec![UplineEntry::from(&start)];

        while let Some(sponsor_id) = next {
            if !visited.insert(sponsor_id) {
                warn!("upline truncated: {}", IntegrityAnomaly::Cycle { at: sponsor_id });
                break;
            }
            let Some(sponsor) = self.store.get(sponsor_id)? else {
                warn!(
                    "upline truncated: {}",
                    IntegrityAnomaly::MissingMember {
                        referenced_by: Some(referrer),
                        missing: sponsor_id,
                    }
                );
                break;
            };
            chain.push(UplineEntry::from(&sponsor.summary()));
            referrer = sponsor_id;
            next = sponsor.sponsor;
        }
        Ok(chain)
    }

    /// Bounded report tree, `report_depth` levels below `id`.
    #[instrument(level = "debug", skip(self))]
    pub fn downline_tree(&self, id: MemberId) -> ApplicationResult<DownlineTree> {
        let root = self.summary(id)?;
        let depth = self.policy.report_depth;
        let descendants = self.store.descendants(id, depth)?;
        debug!("fetched {} descendants of {}", descendants.len(), root.handle);
        Ok(TreeBuilder::new(descendants.iter().map(|m| m.summary()), depth).build(root))
    }

    /// Exhaustive breadth-first fetch below `id`, one lookup per node.
    ///
    /// Depth and size caps truncate the listing; an elapsed timeout fails
    /// the whole call.
    #[instrument(level = "debug", skip(self))]
    pub fn full_downline(
        &self,
        id: MemberId,
        limits: TraversalLimits,
    ) -> ApplicationResult<DownlineListing> {
        let started = Instant::now();
        let root = self.summary(id)?;
        let mut listing = DownlineListing::default();
        let mut visited = HashSet::from([root.id]);
        let mut queue: VecDeque<(MemberId, MemberId, usize)> = root
            .downlines
            .iter()
            .map(|&child| (root.id, child, 1))
            .collect();

        while let Some((parent, child_id, depth)) = queue.pop_front() {
            if let Some(timeout) = limits.timeout {
                let elapsed = started.elapsed();
                if elapsed >= timeout {
                    warn!("full downline of {} exceeded {:?}", root.handle, timeout);
                    return Err(ApplicationError::Timeout {
                        operation: "full downline",
                        elapsed,
                    });
                }
            }
            if limits.max_depth.is_some_and(|max| depth > max) {
                // archived members keep their slot but are not part of the listing
                if !matches!(listing.truncated, Some(Truncation::Depth))
                    && self.store.get(child_id)?.is_some()
                {
                    listing.truncated = Some(Truncation::Depth);
                }
                continue;
            }
            if limits
                .max_nodes
                .is_some_and(|max| listing.members.len() >= max)
            {
                listing.truncated = Some(Truncation::Size);
                break;
            }
            if !visited.insert(child_id) {
                warn!("{}", IntegrityAnomaly::Cycle { at: child_id });
                continue;
            }
            let Some(child) = self.store.get(child_id)? else {
                warn!(
                    "{}",
                    IntegrityAnomaly::MissingMember {
                        referenced_by: Some(parent),
                        missing: child_id,
                    }
                );
                continue;
            };
            queue.extend(child.downlines.iter().map(|&c| (child_id, c, depth + 1)));
            listing.members.push(child.summary());
        }

        debug!(
            "full downline of {}: {} members in {:?}",
            root.handle,
            listing.members.len(),
            started.elapsed()
        );
        Ok(listing)
    }

    /// Immediate children in join order.
    pub fn direct_downline(&self, id: MemberId) -> ApplicationResult<Vec<MemberSummary>> {
        let root = self.summary(id)?;
        let mut children = Vec::with_capacity(root.downlines.len());
        for child_id in &root.downlines {
            match self.store.get(*child_id)? {
                Some(child) => children.push(child.summary()),
                None => warn!(
                    "{}",
                    IntegrityAnomaly::MissingMember {
                        referenced_by: Some(root.id),
                        missing: *child_id,
                    }
                ),
            }
        }
        Ok(children)
    }

    /// Number of transitive descendants within `limits`.
    pub fn team_size(&self, id: MemberId, limits: TraversalLimits) -> ApplicationResult<usize> {
        Ok(self.full_downline(id, limits)?.members.len())
    }

    /// Case-sensitive substring search over an already fetched downline.
    ///
    /// At most `search_limit` hits are returned, in the order given.
    pub fn search(
        &self,
        downline: &[MemberSummary],
        query: &str,
    ) -> ApplicationResult<Vec<MemberSummary>> {
        debug!("search: query={:?}, candidates={}", query, downline.len());
        if query.is_empty() {
            return Err(ApplicationError::validation("search query must not be empty"));
        }
        let hits: Vec<MemberSummary> = downline
            .iter()
            .filter(|m| m.matches(query))
            .take(self.policy.search_limit)
            .cloned()
            .collect();

        if hits.is_empty() && self.policy.empty_search_is_not_found {
            return Err(ApplicationError::not_found("search match", query));
        }
        Ok(hits)
    }

    /// Full downline fetch below `id`, then `search`.
    pub fn search_subtree(
        &self,
        id: MemberId,
        query: &str,
        limits: TraversalLimits,
    ) -> ApplicationResult<Vec<MemberSummary>> {
        let listing = self.full_downline(id, limits)?;
        self.search(&listing.members, query)
    }
}

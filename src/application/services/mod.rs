//! Application services
//!
//! Concrete services orchestrating domain rules. They depend on the
//! `MemberStore` boundary trait but are themselves concrete structs.

mod directory;
mod earnings;
mod ledger;
mod onboarding;
mod promotion;
mod tree_query;

pub use directory::{CallerIdentity, CompanyPayment, Dashboard, FreeSlots, MemberDirectory};
pub use earnings::{DistributionReport, EarningsDistributor, PendingDistribution};
pub use ledger::LedgerService;
pub use onboarding::{FollowUp, OnboardingService, RegistrationOutcome, RetryReport};
pub use promotion::{PendingPromotion, PromotionEngine, PromotionOutcome, PromotionStep};
pub use tree_query::{
    DownlineListing, TraversalLimits, TreeQueryService, Truncation, UplineEntry,
};

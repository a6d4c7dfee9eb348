//! Service container for dependency injection
//!
//! Wires up all services with their dependencies.

use std::sync::Arc;

use tracing::debug;

use crate::application::services::{
    EarningsDistributor, LedgerService, MemberDirectory, OnboardingService, PromotionEngine,
    TreeQueryService,
};
use crate::config::Settings;
use crate::infrastructure::error::{InfraError, InfraResult};
use crate::infrastructure::json_store::JsonFileStore;
use crate::infrastructure::traits::{FileSystem, MemberStore, RealFileSystem};

/// Container holding all application services.
///
/// Every service shares the same store and policy.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    pub store: Arc<dyn MemberStore>,

    pub directory: Arc<MemberDirectory>,
    pub distributor: Arc<EarningsDistributor>,
    pub promotions: Arc<PromotionEngine>,
    pub tree: TreeQueryService,
    pub ledger: LedgerService,
    pub onboarding: OnboardingService,
}

impl ServiceContainer {
    /// Open the JSON store named in `settings` on the real filesystem.
    pub fn new(settings: Settings) -> InfraResult<Self> {
        Self::with_fs(settings, Arc::new(RealFileSystem))
    }

    /// Open the JSON store through a custom filesystem.
    pub fn with_fs(settings: Settings, fs: Arc<dyn FileSystem>) -> InfraResult<Self> {
        debug!("opening store at {}", settings.data_file.display());
        let store = JsonFileStore::open(&settings.data_file, fs).map_err(|e| {
            InfraError::store(format!("open {}", settings.data_file.display()), e)
        })?;
        Ok(Self::with_store(settings, Arc::new(store)))
    }

    /// Create a service container over an existing store (for testing).
    pub fn with_store(settings: Settings, store: Arc<dyn MemberStore>) -> Self {
        let settings = Arc::new(settings);
        let policy = settings.policy.clone();

        let directory = Arc::new(MemberDirectory::new(store.clone(), policy.clone()));
        let distributor = Arc::new(EarningsDistributor::new(store.clone(), policy.clone()));
        let promotions = Arc::new(PromotionEngine::new(store.clone(), policy.clone()));
        let onboarding = OnboardingService::new(
            directory.clone(),
            distributor.clone(),
            promotions.clone(),
            policy.clone(),
        );

        Self {
            tree: TreeQueryService::new(store.clone(), policy),
            ledger: LedgerService::new(store.clone()),
            settings,
            store,
            directory,
            distributor,
            promotions,
            onboarding,
        }
    }
}

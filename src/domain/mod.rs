//! Domain layer: entities and business rules
//!
//! This layer is independent of external concerns (no storage, no CLI, no config loading).

pub mod arena;
pub mod builder;
pub mod entities;
pub mod error;
pub mod policy;

pub use arena::{DownlineTree, TreeNode};
pub use builder::TreeBuilder;
pub use entities::*;
pub use error::DomainError;
pub use policy::{rewards_for_level, Policy, DOWNLINE_CAPACITY, REWARD_TABLE};

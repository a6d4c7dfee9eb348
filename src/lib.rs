//! Referral tree ledger
//!
//! Members join under a sponsor in a tree of width three. Every registration
//! credits a fixed amount to the uplines, and members whose downline fills up
//! are promoted level by level until they leave as achievers.

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;

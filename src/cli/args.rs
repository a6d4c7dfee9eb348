//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};

/// Referral tree ledger: sponsorship tree, upline earnings and level promotion
#[derive(Parser, Debug)]
#[command(name = "downline")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Debug output, repeat for more (-d info, -dd debug, -ddd trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub debug: u8,

    /// Config file layered over the global config
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Snapshot file (overrides data_file from config)
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Contact fields shared by `init` and `register`
#[derive(Args, Debug, Clone, Default)]
pub struct ContactArgs {
    /// Full name
    #[arg(long)]
    pub name: Option<String>,
    /// Mobile number
    #[arg(long)]
    pub mobile: Option<String>,
    /// Email address
    #[arg(long)]
    pub email: Option<String>,
}

/// Bounds for exhaustive downline walks
#[derive(Args, Debug, Clone, Default)]
pub struct LimitArgs {
    /// Levels below the member to include
    #[arg(long)]
    pub max_depth: Option<usize>,
    /// Maximum number of members to fetch
    #[arg(long)]
    pub max_nodes: Option<usize>,
    /// Abort after this many milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialise the company ledger, optionally seeding the root member
    Init {
        /// Handle of the root member
        root: Option<String>,
        #[command(flatten)]
        contact: ContactArgs,
    },

    /// Register a member under a sponsor's referral code
    Register {
        /// Handle of the new member
        handle: String,
        /// Referral code of the sponsor
        sponsor_code: String,
        #[command(flatten)]
        contact: ContactArgs,
    },

    /// Show a member's dashboard (achievers included)
    Show {
        handle: String,
    },

    /// Withdraw from a member's wallet
    Withdraw {
        handle: String,
        amount: u64,
    },

    /// Credit an approved deposit to a member's wallet
    Credit {
        handle: String,
        amount: u64,
    },

    /// Pay the fixed company payment from a member's wallet
    Pay {
        handle: String,
    },

    /// Show granted and open downline slots
    Slots {
        handle: String,
    },

    /// Update contact, bank or KYC details
    Profile(ProfileArgs),

    /// Show the chain from a member up to the root
    Upline {
        handle: String,
    },

    /// Show the downline tree below a member
    Tree {
        handle: String,
    },

    /// Count all members below a member
    Team {
        handle: String,
        #[command(flatten)]
        limits: LimitArgs,
    },

    /// List a member's direct downlines
    Direct {
        handle: String,
    },

    /// Search a member's downline by handle, mobile or referral code
    Search {
        handle: String,
        query: String,
        #[command(flatten)]
        limits: LimitArgs,
    },

    /// List achievers
    Achievers,

    /// Show company earnings
    Company,

    /// List active members
    Members,

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ProfileArgs {
    /// Member to update
    pub handle: String,
    /// Acting member (default: the member itself)
    #[arg(long = "as")]
    pub caller: Option<String>,
    #[command(flatten)]
    pub contact: ContactArgs,
    #[arg(long)]
    pub address: Option<String>,
    #[arg(long)]
    pub bank_name: Option<String>,
    #[arg(long)]
    pub account_number: Option<String>,
    #[arg(long)]
    pub ifsc_code: Option<String>,
    #[arg(long)]
    pub account_holder_name: Option<String>,
    #[arg(long)]
    pub upi_number: Option<String>,
    /// Reference to the stored Aadhaar front image
    #[arg(long)]
    pub aadhar_front: Option<String>,
    /// Reference to the stored Aadhaar back image
    #[arg(long)]
    pub aadhar_back: Option<String>,
    /// Reference to the stored PAN card image
    #[arg(long)]
    pub pancard: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show merged config
    Show,

    /// Show config and data paths
    Path,

    /// Create global config template
    Init {
        /// Overwrite an existing config
        #[arg(short, long)]
        force: bool,
    },
}

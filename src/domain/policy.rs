//! Progression policy: tree width, payout amounts, level rewards

use serde::{Deserialize, Serialize};

/// Maximum number of direct downlines per member.
pub const DOWNLINE_CAPACITY: usize = 3;

/// Rewards granted when a member reaches a level.
pub const REWARD_TABLE: &[(u32, &str)] = &[
    (3, "Blanket"),
    (5, "32\" LED"),
    (7, "Bike"),
    (9, "Alto Car"),
];

/// Rewards granted for reaching `level`. Most levels grant nothing.
pub fn rewards_for_level(level: u32) -> Vec<String> {
    REWARD_TABLE
        .iter()
        .filter(|(l, _)| *l == level)
        .map(|(_, reward)| reward.to_string())
        .collect()
}

/// Tunable numbers of the earnings and promotion rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Policy {
    /// Amount credited to each upline per registration
    pub earning_unit: u64,
    /// Number of sponsor hops that receive a credit
    pub distribution_depth: usize,
    /// Members promoted past this level become achievers
    pub terminal_level: u32,
    /// Levels below the root included in the bounded tree report
    pub report_depth: usize,
    /// Maximum number of search hits returned
    pub search_limit: usize,
    /// Fixed lump sum a member pays into the company ledger
    pub company_payment: u64,
    /// Maximum promotion steps per saturation event, None walks to the root
    pub cascade_limit: Option<usize>,
    /// Report a search without hits as not found instead of an empty list
    pub empty_search_is_not_found: bool,
    /// After a registration also evaluate the sponsor's sponsor, whose
    /// child may just have become saturated
    pub evaluate_grand_sponsor: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            earning_unit: 100,
            distribution_depth: 8,
            terminal_level: 9,
            report_depth: 8,
            search_limit: 10,
            company_payment: 1000,
            cascade_limit: None,
            empty_search_is_not_found: true,
            evaluate_grand_sponsor: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1, vec![])]
    #[case(2, vec![])]
    #[case(3, vec!["Blanket"])]
    #[case(4, vec![])]
    #[case(5, vec!["32\" LED"])]
    #[case(6, vec![])]
    #[case(7, vec!["Bike"])]
    #[case(8, vec![])]
    #[case(9, vec!["Alto Car"])]
    #[case(10, vec![])]
    fn given_level_when_looking_up_rewards_then_matches_table(
        #[case] level: u32,
        #[case] expected: Vec<&str>,
    ) {
        assert_eq!(rewards_for_level(level), expected);
    }

    #[test]
    fn given_defaults_then_source_policy_numbers() {
        let policy = Policy::default();
        assert_eq!(policy.earning_unit, 100);
        assert_eq!(policy.distribution_depth, 8);
        assert_eq!(policy.terminal_level, 9);
        assert_eq!(policy.search_limit, 10);
        assert!(policy.cascade_limit.is_none());
        assert!(policy.empty_search_is_not_found);
    }
}

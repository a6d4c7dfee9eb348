//! Environment overrides for Settings.
//!
//! Kept in its own test binary: the variables are process-global.

use tempfile::TempDir;

use downline::config::Settings;

#[test]
fn given_env_overrides_when_loading_then_env_wins_over_local_file() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("downline.toml");
    std::fs::write(&config_path, "[policy]\nearning_unit = 50\nsearch_limit = 4\n").unwrap();
    let data_file = dir.path().join("env.json");

    std::env::set_var("DOWNLINE_POLICY__EARNING_UNIT", "75");
    std::env::set_var("DOWNLINE_DATA_FILE", data_file.to_string_lossy().as_ref());
    let result = Settings::load(Some(config_path.as_path()));
    std::env::remove_var("DOWNLINE_POLICY__EARNING_UNIT");
    std::env::remove_var("DOWNLINE_DATA_FILE");

    let settings = result.expect("load settings");
    assert_eq!(settings.policy.earning_unit, 75);
    assert_eq!(settings.policy.search_limit, 4);
    assert_eq!(settings.data_file, data_file);
}

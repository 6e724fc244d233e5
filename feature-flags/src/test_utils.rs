use std::sync::Arc;

use rand::{distributions::Alphanumeric, Rng};

use crate::config::ManagerOptions;
use crate::flags::flag_definitions::{FlagDefinition, FlagRegistry};
use crate::flags::flag_manager::FeatureFlagManager;
use crate::overrides::StaticOverrideSource;

pub fn random_string(prefix: &str, length: usize) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(Alphanumeric)
        .take(length)
        .map(char::from)
        .collect();
    format!("{}{}", prefix, suffix)
}

pub fn lenient_options() -> ManagerOptions {
    ManagerOptions {
        strict: false,
        ..ManagerOptions::default()
    }
}

/// Builds and initializes a manager over an ad hoc registry.
pub fn manager_with(
    definitions: Vec<FlagDefinition>,
    overrides: StaticOverrideSource,
    options: ManagerOptions,
) -> FeatureFlagManager {
    let manager =
        FeatureFlagManager::new(FlagRegistry::new(definitions), Arc::new(overrides), options);
    manager
        .initialize()
        .expect("test registry failed validation");
    manager
}

/// Installs an env-filtered subscriber for tests that want log output.
/// Safe to call repeatedly; only the first call wins.
pub fn setup_test_tracing() {
    let _unused = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

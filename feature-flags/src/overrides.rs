use std::collections::HashMap;

/// Where raw override values live. Production reads process environment
/// variables; tests inject a static map. Lookups are fast, local and
/// synchronous, so they are safe on the evaluation path.
pub trait OverrideSource {
    fn lookup(&self, key: &str) -> Option<String>;
}

pub struct EnvOverrideSource;

impl OverrideSource for EnvOverrideSource {
    fn lookup(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Clone, Default)]
pub struct StaticOverrideSource {
    values: HashMap<String, String>,
}

impl StaticOverrideSource {
    pub fn new() -> StaticOverrideSource {
        StaticOverrideSource {
            values: HashMap::new(),
        }
    }

    pub fn set(mut self, key: &str, value: &str) -> Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }
}

impl OverrideSource for StaticOverrideSource {
    fn lookup(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_source_returns_configured_values() {
        let source = StaticOverrideSource::new()
            .set("FEATURE_CACHING", "false")
            .set("FEATURE_DARK_MODE", "on");

        assert_eq!(source.lookup("FEATURE_CACHING"), Some("false".to_string()));
        assert_eq!(source.lookup("FEATURE_DARK_MODE"), Some("on".to_string()));
        assert_eq!(source.lookup("FEATURE_UNSET"), None);
    }

    #[test]
    fn test_env_source_reads_process_environment() {
        // Key is unique to this test to stay safe under parallel execution.
        std::env::set_var("FEATURE_FLAGS_ENV_SOURCE_TEST", "yes");
        let source = EnvOverrideSource;

        assert_eq!(
            source.lookup("FEATURE_FLAGS_ENV_SOURCE_TEST"),
            Some("yes".to_string())
        );
        assert_eq!(source.lookup("FEATURE_FLAGS_ENV_SOURCE_MISSING"), None);
        std::env::remove_var("FEATURE_FLAGS_ENV_SOURCE_TEST");
    }
}

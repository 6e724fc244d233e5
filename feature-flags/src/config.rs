use std::time::Duration;

use envconfig::Envconfig;

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(default = "development")]
    pub environment: String,

    #[envconfig(default = "60000")]
    pub flag_cache_duration_ms: u64,

    #[envconfig(default = "true")]
    pub strict_flags: bool,

    #[envconfig(default = "false")]
    pub debug_flags: bool,
}

/// Behavioral knobs for the flag manager. `strict` decides whether internal
/// errors are returned to the caller or degraded to safe defaults; `debug`
/// gates per-evaluation detail logs.
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    pub strict: bool,
    pub debug: bool,
    pub cache_duration: Duration,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        ManagerOptions {
            strict: true,
            debug: false,
            cache_duration: Duration::from_secs(60),
        }
    }
}

impl From<&Config> for ManagerOptions {
    fn from(config: &Config) -> Self {
        ManagerOptions {
            strict: config.strict_flags,
            debug: config.debug_flags,
            cache_duration: Duration::from_millis(config.flag_cache_duration_ms),
        }
    }
}

use std::time::Duration;

use moka::sync::Cache;

use crate::api::types::{CacheStats, EvaluationState};
use crate::flags::flag_context::EvaluationContext;
use crate::flags::flag_definitions::{Environment, FlagKey};

/// Cache partition for one evaluation: identical keys must produce
/// identical results inside the cache window.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    flag: FlagKey,
    environment: Environment,
    subject: String,
    role: String,
    tenant: String,
}

impl CacheKey {
    pub fn new(flag: FlagKey, context: &EvaluationContext) -> Self {
        CacheKey {
            flag,
            environment: context.environment,
            subject: context.subject().to_string(),
            role: context
                .role
                .map(|role| role.as_str().to_string())
                .unwrap_or_else(|| "none".to_string()),
            tenant: context
                .tenant_id
                .clone()
                .unwrap_or_else(|| "none".to_string()),
        }
    }

    pub fn render(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            self.flag, self.environment, self.subject, self.role, self.tenant
        )
    }
}

/// Time-boxed store of computed evaluation states, backed by `moka`.
/// Entries are immutable once written and expire `time_to_live` after the
/// write; moka drops expired entries during reads and housekeeping, there
/// is no sweep of our own.
pub struct EvaluationCache {
    entries: Cache<CacheKey, EvaluationState>,
}

impl EvaluationCache {
    pub fn new(time_to_live: Duration) -> Self {
        EvaluationCache {
            entries: Cache::builder().time_to_live(time_to_live).build(),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<EvaluationState> {
        self.entries.get(key)
    }

    pub fn insert(&self, key: CacheKey, state: EvaluationState) {
        self.entries.insert(key, state);
    }

    pub fn clear(&self) {
        self.entries.invalidate_all();
    }

    pub fn stats(&self) -> CacheStats {
        // Flush pending housekeeping so invalidated and expired entries do
        // not show up in the snapshot.
        self.entries.run_pending_tasks();
        let mut keys: Vec<String> = self.entries.iter().map(|(key, _)| key.render()).collect();
        keys.sort();
        CacheStats {
            size: keys.len(),
            keys,
        }
    }
}

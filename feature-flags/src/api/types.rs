use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Which rule produced the final value of an evaluation. Exactly one per state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvaluationSource {
    EnvironmentGated,
    Override,
    Default,
    RoleRestricted,
    DependencyDisabled,
    RolloutExcluded,
}

impl EvaluationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluationSource::EnvironmentGated => "environment-gated",
            EvaluationSource::Override => "override",
            EvaluationSource::Default => "default",
            EvaluationSource::RoleRestricted => "role-restricted",
            EvaluationSource::DependencyDisabled => "dependency-disabled",
            EvaluationSource::RolloutExcluded => "rollout-excluded",
        }
    }
}

/// The outcome of evaluating one flag against one context.
///
/// States are immutable once computed; cache hits return the stored state
/// verbatim, `evaluated_at` included.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationState {
    pub enabled: bool,
    pub source: EvaluationSource,
    #[serde(with = "time::serde::rfc3339")]
    pub evaluated_at: OffsetDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub dependencies_satisfied: bool,
}

impl EvaluationState {
    pub fn new(enabled: bool, source: EvaluationSource) -> Self {
        EvaluationState {
            enabled,
            source,
            evaluated_at: OffsetDateTime::now_utc(),
            reason: None,
            dependencies_satisfied: true,
        }
    }

    pub fn with_reason(mut self, reason: String) -> Self {
        self.reason = Some(reason);
        self
    }
}

/// Read-only view of the evaluation cache, for introspection endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub size: usize,
    pub keys: Vec<String>,
}

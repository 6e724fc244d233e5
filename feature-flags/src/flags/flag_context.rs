use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::flags::flag_definitions::{Environment, Role};

/// Per-request evaluation input, built by the caller (e.g. an HTTP layer)
/// and never persisted. The evaluator reads the identity fields; `metadata`
/// is carried through untouched.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EvaluationContext {
    pub environment: Environment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, Value>>,
}

pub const ANONYMOUS_SUBJECT: &str = "anonymous";

impl EvaluationContext {
    pub fn new(environment: Environment) -> Self {
        EvaluationContext {
            environment,
            subject_id: None,
            role: None,
            tenant_id: None,
            metadata: None,
        }
    }

    pub fn with_subject(mut self, subject_id: &str) -> Self {
        self.subject_id = Some(subject_id.to_string());
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn with_tenant(mut self, tenant_id: &str) -> Self {
        self.tenant_id = Some(tenant_id.to_string());
        self
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Identity used for rollout hashing and cache partitioning.
    pub fn subject(&self) -> &str {
        self.subject_id.as_deref().unwrap_or(ANONYMOUS_SUBJECT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_falls_back_to_anonymous() {
        let context = EvaluationContext::new(Environment::Development);
        assert_eq!(context.subject(), "anonymous");

        let context = context.with_subject("user-42");
        assert_eq!(context.subject(), "user-42");
    }
}

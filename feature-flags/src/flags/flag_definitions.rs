use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::api::FlagError;

/// The closed set of flag identifiers. Every variant must have a definition
/// in the registry the manager is constructed with; `validate` enforces the
/// reverse direction (every dependency points at a registered flag).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlagKey {
    Caching,
    AdvancedSearch,
    NewDashboard,
    DocumentSigning,
    CrmSync,
    BetaOnboarding,
    UsageAnalytics,
    DarkMode,
}

impl FlagKey {
    pub const ALL: [FlagKey; 8] = [
        FlagKey::Caching,
        FlagKey::AdvancedSearch,
        FlagKey::NewDashboard,
        FlagKey::DocumentSigning,
        FlagKey::CrmSync,
        FlagKey::BetaOnboarding,
        FlagKey::UsageAnalytics,
        FlagKey::DarkMode,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FlagKey::Caching => "caching",
            FlagKey::AdvancedSearch => "advanced-search",
            FlagKey::NewDashboard => "new-dashboard",
            FlagKey::DocumentSigning => "document-signing",
            FlagKey::CrmSync => "crm-sync",
            FlagKey::BetaOnboarding => "beta-onboarding",
            FlagKey::UsageAnalytics => "usage-analytics",
            FlagKey::DarkMode => "dark-mode",
        }
    }
}

impl fmt::Display for FlagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlagKey {
    type Err = FlagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "caching" => Ok(FlagKey::Caching),
            "advanced-search" => Ok(FlagKey::AdvancedSearch),
            "new-dashboard" => Ok(FlagKey::NewDashboard),
            "document-signing" => Ok(FlagKey::DocumentSigning),
            "crm-sync" => Ok(FlagKey::CrmSync),
            "beta-onboarding" => Ok(FlagKey::BetaOnboarding),
            "usage-analytics" => Ok(FlagKey::UsageAnalytics),
            "dark-mode" => Ok(FlagKey::DarkMode),
            other => Err(FlagError::UnknownFlag(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub const ALL: [Environment; 3] = [
        Environment::Development,
        Environment::Staging,
        Environment::Production,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" | "local" => Ok(Environment::Development),
            "staging" | "stage" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(format!("unknown environment: {other}")),
        }
    }
}

/// Role ranks are the derived `Ord`: User < Support < Admin < SuperAdmin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Support,
    Admin,
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Support => "support",
            Role::Admin => "admin",
            Role::SuperAdmin => "superadmin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "support" => Ok(Role::Support),
            "admin" => Ok(Role::Admin),
            "superadmin" | "super-admin" => Ok(Role::SuperAdmin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Static configuration for one flag. Immutable once registered.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FlagDefinition {
    pub key: FlagKey,
    /// External configuration key that can force the value, unique across
    /// the registry.
    pub override_key: String,
    pub default_value: bool,
    /// Environments in which the flag may ever be true. Must be non-empty.
    pub allowed_environments: Vec<Environment>,
    /// Flags that must all be enabled for this one to be enabled.
    #[serde(default)]
    pub dependencies: Vec<FlagKey>,
    #[serde(default)]
    pub minimum_role: Option<Role>,
    /// 0-100. Values below 100 restrict enablement to a stable percentile
    /// band of subjects.
    #[serde(default)]
    pub rollout_percentage: Option<u8>,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub description: String,
}

impl FlagDefinition {
    pub fn new(key: FlagKey, override_key: &str, default_value: bool) -> Self {
        FlagDefinition {
            key,
            override_key: override_key.to_string(),
            default_value,
            allowed_environments: Environment::ALL.to_vec(),
            dependencies: Vec::new(),
            minimum_role: None,
            rollout_percentage: None,
            owner: String::new(),
            description: String::new(),
        }
    }

    pub fn in_environments(mut self, environments: Vec<Environment>) -> Self {
        self.allowed_environments = environments;
        self
    }

    pub fn depends_on(mut self, dependencies: Vec<FlagKey>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn requires_role(mut self, role: Role) -> Self {
        self.minimum_role = Some(role);
        self
    }

    pub fn with_rollout(mut self, percentage: u8) -> Self {
        self.rollout_percentage = Some(percentage);
        self
    }

    pub fn owned_by(mut self, owner: &str, description: &str) -> Self {
        self.owner = owner.to_string();
        self.description = description.to_string();
        self
    }
}

/// The process-wide flag table. Built once at startup, then read-only.
#[derive(Debug, Clone)]
pub struct FlagRegistry {
    definitions: Vec<FlagDefinition>,
    index: HashMap<FlagKey, usize>,
}

impl FlagRegistry {
    pub fn new(definitions: Vec<FlagDefinition>) -> Self {
        let index = definitions
            .iter()
            .enumerate()
            .map(|(position, definition)| (definition.key, position))
            .collect();
        FlagRegistry { definitions, index }
    }

    /// The production flag table.
    pub fn builtin() -> Self {
        FlagRegistry::new(vec![
            FlagDefinition::new(FlagKey::Caching, "FEATURE_CACHING", true)
                .owned_by("platform", "response caching for expensive lookups"),
            FlagDefinition::new(FlagKey::AdvancedSearch, "FEATURE_ADVANCED_SEARCH", false)
                .depends_on(vec![FlagKey::Caching])
                .owned_by("search", "faceted search with saved queries"),
            FlagDefinition::new(FlagKey::NewDashboard, "FEATURE_NEW_DASHBOARD", false)
                .in_environments(vec![Environment::Development, Environment::Staging])
                .owned_by("web", "rebuilt dashboard landing page"),
            FlagDefinition::new(FlagKey::DocumentSigning, "FEATURE_DOCUMENT_SIGNING", true)
                .in_environments(vec![Environment::Staging, Environment::Production])
                .owned_by("integrations", "embedded e-signature flow"),
            FlagDefinition::new(FlagKey::CrmSync, "FEATURE_CRM_SYNC", false)
                .in_environments(vec![Environment::Staging, Environment::Production])
                .depends_on(vec![FlagKey::DocumentSigning])
                .owned_by("integrations", "push signed agreements into the CRM"),
            FlagDefinition::new(FlagKey::BetaOnboarding, "FEATURE_BETA_ONBOARDING", true)
                .requires_role(Role::Admin)
                .with_rollout(50)
                .owned_by("growth", "guided onboarding checklist"),
            FlagDefinition::new(FlagKey::UsageAnalytics, "FEATURE_USAGE_ANALYTICS", true)
                .depends_on(vec![FlagKey::Caching])
                .owned_by("platform", "in-app usage reporting"),
            FlagDefinition::new(FlagKey::DarkMode, "FEATURE_DARK_MODE", true)
                .owned_by("web", "dark color scheme"),
        ])
    }

    pub fn get(&self, key: FlagKey) -> Result<&FlagDefinition, FlagError> {
        self.index
            .get(&key)
            .map(|position| &self.definitions[*position])
            .ok_or_else(|| FlagError::UnknownFlag(key.to_string()))
    }

    pub fn keys(&self) -> Vec<FlagKey> {
        self.definitions
            .iter()
            .map(|definition| definition.key)
            .collect()
    }

    /// Checks the table for structural problems. An empty result means the
    /// registry is safe to evaluate against.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        let mut seen_keys: HashSet<FlagKey> = HashSet::new();
        let mut seen_override_keys: HashMap<&str, FlagKey> = HashMap::new();
        for definition in &self.definitions {
            if !seen_keys.insert(definition.key) {
                errors.push(format!("flag {} is registered more than once", definition.key));
            }
            if let Some(previous) =
                seen_override_keys.insert(definition.override_key.as_str(), definition.key)
            {
                errors.push(format!(
                    "override key {} is shared by {} and {}",
                    definition.override_key, previous, definition.key
                ));
            }
            if definition.allowed_environments.is_empty() {
                errors.push(format!("flag {} allows no environments", definition.key));
            }
            if let Some(percentage) = definition.rollout_percentage {
                if percentage > 100 {
                    errors.push(format!(
                        "flag {} has rollout percentage {} outside 0-100",
                        definition.key, percentage
                    ));
                }
            }
            for dependency in &definition.dependencies {
                if !self.index.contains_key(dependency) {
                    errors.push(format!(
                        "flag {} depends on {}, which is not registered",
                        definition.key, dependency
                    ));
                }
            }
        }

        errors.extend(self.cycle_errors());
        errors
    }

    // Depth-first over the dependency graph, tracking the active path. A
    // repeat inside the path is a cycle, reported with the full path.
    fn cycle_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let mut cleared: HashSet<FlagKey> = HashSet::new();
        for definition in &self.definitions {
            let mut path = Vec::new();
            self.walk_dependencies(definition.key, &mut path, &mut cleared, &mut errors);
        }
        errors
    }

    fn walk_dependencies(
        &self,
        key: FlagKey,
        path: &mut Vec<FlagKey>,
        cleared: &mut HashSet<FlagKey>,
        errors: &mut Vec<String>,
    ) {
        if let Some(start) = path.iter().position(|visited| *visited == key) {
            let mut cycle: Vec<&str> = path[start..].iter().map(FlagKey::as_str).collect();
            cycle.push(key.as_str());
            errors.push(format!("dependency cycle: {}", cycle.join(" -> ")));
            return;
        }
        if cleared.contains(&key) {
            return;
        }
        path.push(key);
        if let Ok(definition) = self.get(key) {
            for dependency in &definition.dependencies {
                self.walk_dependencies(*dependency, path, cleared, errors);
            }
        }
        path.pop();
        cleared.insert(key);
    }

    pub fn flags_for_environment(&self, environment: Environment) -> Vec<&FlagDefinition> {
        self.definitions
            .iter()
            .filter(|definition| definition.allowed_environments.contains(&environment))
            .collect()
    }

    pub fn flags_for_owner(&self, owner: &str) -> Vec<&FlagDefinition> {
        self.definitions
            .iter()
            .filter(|definition| definition.owner == owner)
            .collect()
    }

    pub fn flags_with_dependencies(&self) -> Vec<&FlagDefinition> {
        self.definitions
            .iter()
            .filter(|definition| !definition.dependencies.is_empty())
            .collect()
    }
}

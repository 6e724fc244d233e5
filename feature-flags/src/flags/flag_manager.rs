use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::instrument;

use crate::api::types::{CacheStats, EvaluationSource, EvaluationState};
use crate::api::FlagError;
use crate::config::ManagerOptions;
use crate::flags::boolean_coercion::coerce_flag_value;
use crate::flags::flag_cache::{CacheKey, EvaluationCache};
use crate::flags::flag_context::EvaluationContext;
use crate::flags::flag_definitions::{FlagDefinition, FlagKey, FlagRegistry};
use crate::flags::flag_matching::rollout_bucket;
use crate::overrides::OverrideSource;

/// The single authority for flag state, combining the registry, the caller's
/// context, external overrides and the evaluation cache.
///
/// One instance is owned by the composition root and shared by reference
/// across request handlers; all methods take `&self` and are safe to call
/// concurrently.
pub struct FeatureFlagManager {
    registry: FlagRegistry,
    overrides: Arc<dyn OverrideSource + Send + Sync>,
    cache: EvaluationCache,
    options: ManagerOptions,
    initialized: AtomicBool,
}

impl FeatureFlagManager {
    pub fn new(
        registry: FlagRegistry,
        overrides: Arc<dyn OverrideSource + Send + Sync>,
        options: ManagerOptions,
    ) -> Self {
        FeatureFlagManager {
            registry,
            overrides,
            cache: EvaluationCache::new(options.cache_duration),
            options,
            initialized: AtomicBool::new(false),
        }
    }

    /// Validates the registry and transitions to ready. In strict mode a
    /// structurally invalid registry is a startup failure; lenient mode
    /// warns and serves what it can. Calling twice is a logged no-op.
    pub fn initialize(&self) -> Result<(), FlagError> {
        if self.initialized.load(Ordering::Acquire) {
            tracing::warn!("feature flag manager is already initialized");
            return Ok(());
        }

        let errors = self.registry.validate();
        if !errors.is_empty() {
            tracing::error!(?errors, "flag registry failed validation");
            if self.options.strict {
                return Err(FlagError::InvalidRegistry(errors));
            }
            tracing::warn!("continuing with an invalid flag registry");
        }

        if self.initialized.swap(true, Ordering::AcqRel) {
            // Lost the race against a concurrent initialize; both callers
            // observe a ready manager.
            tracing::warn!("feature flag manager is already initialized");
        } else {
            tracing::info!(
                flags = self.registry.keys().len(),
                strict = self.options.strict,
                "feature flag manager ready"
            );
        }
        Ok(())
    }

    /// Convenience wrapper over `evaluate`. In lenient mode this never
    /// fails: evaluation errors degrade to the flag's static default, or
    /// `false` when the flag is unknown.
    #[instrument(skip_all, fields(flag = %flag))]
    pub fn is_enabled(&self, flag: FlagKey, context: &EvaluationContext) -> Result<bool, FlagError> {
        match self.evaluate(flag, context) {
            Ok(state) => Ok(state.enabled),
            Err(error) if self.options.strict => Err(error),
            Err(error) => {
                tracing::error!(flag = %flag, error = %error, "evaluation failed, falling back to the static default");
                Ok(self
                    .registry
                    .get(flag)
                    .map(|definition| definition.default_value)
                    .unwrap_or(false))
            }
        }
    }

    /// Resolves one flag against one context, consulting the cache first.
    #[instrument(skip_all, fields(flag = %flag))]
    pub fn evaluate(
        &self,
        flag: FlagKey,
        context: &EvaluationContext,
    ) -> Result<EvaluationState, FlagError> {
        if !self.initialized.load(Ordering::Acquire) {
            if self.options.strict {
                return Err(FlagError::NotInitialized);
            }
            // Lenient processes serve static defaults until startup
            // completes; nothing is cached for these.
            let definition = self.registry.get(flag)?;
            tracing::warn!(flag = %flag, "evaluated before initialization, using static default");
            return Ok(
                EvaluationState::new(definition.default_value, EvaluationSource::Default)
                    .with_reason("manager not initialized".to_string()),
            );
        }

        let definition = self.registry.get(flag)?;
        let cache_key = CacheKey::new(flag, context);
        if let Some(state) = self.cache.get(&cache_key) {
            metrics::counter!("flag_cache_hits_total").increment(1);
            if self.options.debug {
                tracing::debug!(flag = %flag, "cache hit");
            }
            return Ok(state);
        }
        metrics::counter!("flag_cache_misses_total").increment(1);

        let state = self.compute(definition, context)?;
        metrics::counter!(
            "flag_evaluations_total",
            "flag" => flag.as_str(),
            "source" => state.source.as_str()
        )
        .increment(1);
        self.cache.insert(cache_key, state.clone());
        Ok(state)
    }

    // The gate pipeline. Check order is load-bearing for the reported
    // source: environment first, then default/override, role, dependencies,
    // rollout.
    fn compute(
        &self,
        definition: &FlagDefinition,
        context: &EvaluationContext,
    ) -> Result<EvaluationState, FlagError> {
        // An environment outside the allowed set can never be widened by
        // overrides or roles, and gating here spares the dependency walk.
        if !definition.allowed_environments.contains(&context.environment) {
            let mut state = EvaluationState::new(false, EvaluationSource::EnvironmentGated)
                .with_reason(format!(
                    "{} is not allowed in {}",
                    definition.key, context.environment
                ));
            state.dependencies_satisfied = definition.dependencies.is_empty();
            return Ok(state);
        }

        if let Some(percentage) = definition.rollout_percentage {
            // Reachable only when a lenient initialize accepted an invalid
            // registry; the broken flag fails alone.
            if percentage > 100 {
                return Err(FlagError::EvaluationError(format!(
                    "flag {} has rollout percentage {} outside 0-100",
                    definition.key, percentage
                )));
            }
        }

        let mut enabled = definition.default_value;
        let mut source = EvaluationSource::Default;
        let mut reason = None;

        let raw_override = self.overrides.lookup(&definition.override_key);
        if let Some(value) = coerce_flag_value(raw_override.as_deref()) {
            enabled = value;
            source = EvaluationSource::Override;
            reason = Some(format!("override {} = {}", definition.override_key, value));
        }

        // Role restriction wins over default and override both, so a
        // permission denial never reports tuning state.
        if let (Some(minimum), Some(role)) = (definition.minimum_role, context.role) {
            if role < minimum {
                enabled = false;
                source = EvaluationSource::RoleRestricted;
                reason = Some(format!("caller role {role} is below {minimum}"));
            }
        }

        let mut dependencies_satisfied = true;
        if !definition.dependencies.is_empty() {
            let mut unsatisfied = Vec::new();
            for dependency in &definition.dependencies {
                if !self.is_enabled(*dependency, context)? {
                    unsatisfied.push(dependency.as_str());
                }
            }
            dependencies_satisfied = unsatisfied.is_empty();
            // The dependency gate only ever forces disablement; a disabled
            // flag stays disabled with its own source.
            if enabled && !dependencies_satisfied {
                enabled = false;
                source = EvaluationSource::DependencyDisabled;
                reason = Some(format!("disabled dependencies: {}", unsatisfied.join(", ")));
            }
        }

        if enabled {
            if let Some(percentage) = definition.rollout_percentage {
                if percentage < 100 {
                    let bucket = rollout_bucket(context.subject(), definition.key);
                    if bucket >= percentage {
                        enabled = false;
                        source = EvaluationSource::RolloutExcluded;
                        reason = Some(format!(
                            "subject bucket {bucket} is outside the {percentage}% rollout"
                        ));
                    }
                }
            }
        }

        if self.options.debug {
            tracing::debug!(
                flag = %definition.key,
                enabled,
                source = source.as_str(),
                dependencies_satisfied,
                "computed flag state"
            );
        }

        let mut state = EvaluationState::new(enabled, source);
        state.reason = reason;
        state.dependencies_satisfied = dependencies_satisfied;
        Ok(state)
    }

    /// Batch convenience; entries are computed independently, so in lenient
    /// mode one broken flag never blocks its siblings.
    pub fn get_multiple(
        &self,
        flags: &[FlagKey],
        context: &EvaluationContext,
    ) -> Result<HashMap<FlagKey, bool>, FlagError> {
        let mut results = HashMap::with_capacity(flags.len());
        for flag in flags {
            results.insert(*flag, self.is_enabled(*flag, context)?);
        }
        Ok(results)
    }

    pub fn get_all(&self, context: &EvaluationContext) -> Result<HashMap<FlagKey, bool>, FlagError> {
        self.get_multiple(&self.registry.keys(), context)
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
        tracing::debug!("flag evaluation cache cleared");
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

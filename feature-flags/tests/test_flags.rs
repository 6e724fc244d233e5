use std::sync::Arc;

use anyhow::Result;
use assert_json_diff::assert_json_include;
use once_cell::sync::Lazy;
use serde_json::json;

use feature_flags::api::types::EvaluationSource;
use feature_flags::config::ManagerOptions;
use feature_flags::flags::flag_context::EvaluationContext;
use feature_flags::flags::flag_definitions::{Environment, FlagKey, FlagRegistry, Role};
use feature_flags::flags::flag_manager::FeatureFlagManager;
use feature_flags::overrides::StaticOverrideSource;
use feature_flags::test_utils::{random_string, setup_test_tracing};

static DEFAULT_OPTIONS: Lazy<ManagerOptions> = Lazy::new(ManagerOptions::default);

fn builtin_manager(overrides: StaticOverrideSource) -> FeatureFlagManager {
    setup_test_tracing();
    let manager = FeatureFlagManager::new(
        FlagRegistry::builtin(),
        Arc::new(overrides),
        DEFAULT_OPTIONS.clone(),
    );
    manager.initialize().expect("builtin registry is valid");
    manager
}

#[test]
fn it_serves_defaults_in_development() -> Result<()> {
    let manager = builtin_manager(StaticOverrideSource::new());
    let context = EvaluationContext::new(Environment::Development);

    assert!(manager.is_enabled(FlagKey::Caching, &context)?);

    // advanced-search defaults off; its healthy dependency must not
    // switch it on.
    let search = manager.evaluate(FlagKey::AdvancedSearch, &context)?;
    assert!(!search.enabled);
    assert_eq!(search.source, EvaluationSource::Default);
    assert!(search.dependencies_satisfied);

    // document-signing only exists in staging and production.
    let signing = manager.evaluate(FlagKey::DocumentSigning, &context)?;
    assert!(!signing.enabled);
    assert_eq!(signing.source, EvaluationSource::EnvironmentGated);

    Ok(())
}

#[test]
fn it_resolves_dependency_chains_in_production() -> Result<()> {
    let manager = builtin_manager(StaticOverrideSource::new().set("FEATURE_CRM_SYNC", "true"));
    let context = EvaluationContext::new(Environment::Production).with_subject("user-1");

    assert!(manager.is_enabled(FlagKey::DocumentSigning, &context)?);

    let sync = manager.evaluate(FlagKey::CrmSync, &context)?;
    assert!(sync.enabled);
    assert_eq!(sync.source, EvaluationSource::Override);
    assert!(sync.dependencies_satisfied);

    Ok(())
}

#[test]
fn it_disables_dependents_when_a_dependency_is_overridden_off() -> Result<()> {
    let manager = builtin_manager(
        StaticOverrideSource::new()
            .set("FEATURE_CRM_SYNC", "true")
            .set("FEATURE_DOCUMENT_SIGNING", "false"),
    );
    let context = EvaluationContext::new(Environment::Production).with_subject("user-1");

    let sync = manager.evaluate(FlagKey::CrmSync, &context)?;
    assert!(!sync.enabled);
    assert_eq!(sync.source, EvaluationSource::DependencyDisabled);
    assert!(!sync.dependencies_satisfied);

    Ok(())
}

#[test]
fn it_gates_admin_features_for_regular_users() -> Result<()> {
    let manager = builtin_manager(StaticOverrideSource::new());
    let base = EvaluationContext::new(Environment::Production).with_subject("user-1");

    let as_user = manager.evaluate(FlagKey::BetaOnboarding, &base.clone().with_role(Role::User))?;
    assert!(!as_user.enabled);
    assert_eq!(as_user.source, EvaluationSource::RoleRestricted);

    // For an admin the flag falls through to the 50% rollout; whatever the
    // outcome, it is stable for the same subject.
    let as_admin = manager.evaluate(FlagKey::BetaOnboarding, &base.with_role(Role::Admin))?;
    assert!(matches!(
        as_admin.source,
        EvaluationSource::Default | EvaluationSource::RolloutExcluded
    ));

    Ok(())
}

#[test]
fn it_keeps_rollout_cohorts_stable_across_restarts() -> Result<()> {
    let subject = random_string("user_", 12);
    let context = EvaluationContext::new(Environment::Production)
        .with_subject(&subject)
        .with_role(Role::Admin);

    // Two managers stand in for two process lifetimes.
    let first = builtin_manager(StaticOverrideSource::new());
    let second = builtin_manager(StaticOverrideSource::new());

    assert_eq!(
        first.is_enabled(FlagKey::BetaOnboarding, &context)?,
        second.is_enabled(FlagKey::BetaOnboarding, &context)?
    );

    Ok(())
}

#[test]
fn it_partitions_the_cache_by_context_and_clears_on_demand() -> Result<()> {
    let manager = builtin_manager(StaticOverrideSource::new());

    let alice = EvaluationContext::new(Environment::Development).with_subject("alice");
    let bob = EvaluationContext::new(Environment::Development).with_subject("bob");
    manager.evaluate(FlagKey::DarkMode, &alice)?;
    manager.evaluate(FlagKey::DarkMode, &bob)?;

    let stats = manager.cache_stats();
    assert_eq!(stats.size, 2);
    assert!(stats.keys.iter().any(|key| key.contains(":alice:")));
    assert!(stats.keys.iter().any(|key| key.contains(":bob:")));

    manager.clear_cache();
    assert_eq!(manager.cache_stats().size, 0);

    // The next evaluation recomputes and repopulates.
    manager.evaluate(FlagKey::DarkMode, &alice)?;
    assert_eq!(manager.cache_stats().size, 1);

    Ok(())
}

#[test]
fn it_reports_states_as_json() -> Result<()> {
    let manager = builtin_manager(StaticOverrideSource::new());
    let context = EvaluationContext::new(Environment::Development);

    let state = manager.evaluate(FlagKey::DocumentSigning, &context)?;
    let json_data = serde_json::to_value(&state)?;

    assert_json_include!(
        actual: json_data,
        expected: json!({
            "enabled": false,
            "source": "environment-gated",
            "dependenciesSatisfied": true,
        })
    );

    Ok(())
}

#[test]
fn it_evaluates_every_registered_flag_in_one_call() -> Result<()> {
    let manager = builtin_manager(StaticOverrideSource::new());
    let context = EvaluationContext::new(Environment::Development).with_subject("user-1");

    let all = manager.get_all(&context)?;
    assert_eq!(all.len(), FlagKey::ALL.len());

    for key in FlagKey::ALL {
        assert_eq!(
            all.get(&key).copied(),
            Some(manager.is_enabled(key, &context)?),
            "mismatch for {key}"
        );
    }

    Ok(())
}

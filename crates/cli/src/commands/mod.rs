//! Subcommand implementations and the setup they share.

pub mod chat;
pub mod conditions;
pub mod config_cmd;
pub mod study;

use finqa_config::AppConfig;
use finqa_core::Provider;
use finqa_telemetry::{ModelPricing, PricingTable, TelemetryEngine};
use std::path::Path;
use std::sync::Arc;

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Load the config file (or defaults) with environment overrides applied.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    AppConfig::load_at(path).map_err(|e| format!("Failed to load config: {e}").into())
}

/// Fail early, with setup instructions, when no API key is configured.
pub fn require_api_key(config: &AppConfig) -> CmdResult {
    if config.has_api_key() {
        return Ok(());
    }

    eprintln!();
    eprintln!("  ERROR: No API key configured!");
    eprintln!();
    eprintln!("  Set one of these environment variables:");
    eprintln!("    export OPENAI_API_KEY='sk-...'");
    eprintln!("    export FINQA_API_KEY='sk-...'     (takes precedence)");
    eprintln!();
    eprintln!("  Or add it to your config file:");
    eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
    eprintln!();
    Err("No API key found. See above for setup instructions.".into())
}

/// The configured default provider.
pub fn build_provider(config: &AppConfig) -> Result<Arc<dyn Provider>, Box<dyn std::error::Error>> {
    let router = finqa_providers::router::build_from_config(config);
    router
        .default()
        .ok_or_else(|| format!("Unknown provider '{}'", config.default_provider).into())
}

/// A telemetry engine with any configured pricing overrides, or `None` when
/// telemetry is disabled.
pub fn build_telemetry(config: &AppConfig) -> Option<Arc<TelemetryEngine>> {
    if !config.telemetry.enabled {
        return None;
    }

    let pricing = PricingTable::with_defaults();
    for (model, price) in &config.telemetry.custom_pricing {
        pricing.set(model.clone(), ModelPricing::new(price.input_per_m, price.output_per_m));
    }
    Some(Arc::new(TelemetryEngine::with_pricing(pricing)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use finqa_config::PricingOverrideConfig;

    #[test]
    fn telemetry_can_be_disabled() {
        let mut config = AppConfig::default();
        config.telemetry.enabled = false;
        assert!(build_telemetry(&config).is_none());
    }

    #[test]
    fn custom_pricing_is_applied() {
        let mut config = AppConfig::default();
        config.telemetry.custom_pricing.insert(
            "house-model".into(),
            PricingOverrideConfig {
                input_per_m: 2.0,
                output_per_m: 4.0,
            },
        );

        let telemetry = build_telemetry(&config).unwrap();
        let cost = telemetry.compute_cost("house-model", 1_000_000, 500_000);
        assert!((cost - 4.0).abs() < 1e-9);
    }

    #[test]
    fn missing_key_is_reported() {
        let config = AppConfig::default();
        assert!(require_api_key(&config).is_err());

        let mut config = AppConfig::default();
        config.api_key = Some("sk-test".into());
        assert!(require_api_key(&config).is_ok());
    }
}

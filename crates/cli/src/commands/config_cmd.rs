//! `finqa config`: Configuration management commands.

use super::{CmdResult, load_config};
use finqa_config::AppConfig;
use std::path::{Path, PathBuf};

pub async fn validate(config_path: Option<&Path>) -> CmdResult {
    println!("🔍 Validating configuration...");

    match AppConfig::load_at(config_path) {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let mut warnings = Vec::new();

            if !config.has_api_key() {
                warnings.push(
                    "No API key set (set OPENAI_API_KEY or FINQA_API_KEY env var)".to_string(),
                );
            }

            if !config.study.data_path.exists() {
                warnings.push(format!(
                    "Dataset not found at {}",
                    config.study.data_path.display()
                ));
            }

            if let Some(dir) = &config.prompts.dir
                && !dir.is_dir()
            {
                warnings.push(format!("Prompt directory {} does not exist", dir.display()));
            }

            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Provider:    {}", config.default_provider);
            println!(
                "   Models:      {} (mini) / {} (standard)",
                config.models.mini, config.models.standard
            );
            println!("   Dataset:     {}", config.study.data_path.display());
            println!(
                "   Sample:      {} records, seed {}",
                config.study.sample_size, config.study.seed
            );
            println!("   Conditions:  {}", config.study.conditions.len());
            println!(
                "   Telemetry:   {}",
                if config.telemetry.enabled { "on" } else { "off" }
            );
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show(config_path: Option<&Path>) -> CmdResult {
    let config = redacted(load_config(config_path)?);
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn init(config_path: Option<&Path>, force: bool) -> CmdResult {
    let path = target_path(config_path);
    if path.exists() && !force {
        return Err(format!(
            "Config already exists at {} (use --force to overwrite)",
            path.display()
        )
        .into());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, AppConfig::default_toml())?;
    println!("✅ Wrote default config to {}", path.display());
    Ok(())
}

pub async fn path(config_path: Option<&Path>) -> CmdResult {
    println!("{}", target_path(config_path).display());
    Ok(())
}

fn target_path(config_path: Option<&Path>) -> PathBuf {
    config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

/// Mask every API key so `show` output is safe to paste.
fn redacted(mut config: AppConfig) -> AppConfig {
    let mask = |key: &mut Option<String>| {
        if key.is_some() {
            *key = Some("[REDACTED]".into());
        }
    };
    mask(&mut config.api_key);
    for provider in config.providers.values_mut() {
        mask(&mut provider.api_key);
    }
    config
}

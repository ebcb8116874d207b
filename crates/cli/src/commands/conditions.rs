//! `finqa conditions`: The experimental matrix.

use super::{CmdResult, load_config};
use finqa_core::StudyCondition;
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> CmdResult {
    let config = load_config(config_path)?;

    println!();
    println!(
        "  {:<4} {:<24} {:<11} {:<9} {:<7} {:<9} {}",
        "ID", "Condition", "Table", "Strategy", "Effort", "Tier", "Model"
    );
    println!("  {}", "─".repeat(84));

    for condition in StudyCondition::ALL {
        let profile = condition.profile();
        println!(
            "  {:<4} {:<24} {:<11} {:<9} {:<7} {:<9} {}",
            condition.id(),
            condition.label(),
            format!("{:?}", profile.format),
            profile.strategy.to_string(),
            profile.effort.to_string(),
            format!("{:?}", profile.tier),
            config.models.for_tier(profile.tier),
        );
    }

    let selected = config.study.selected_conditions()?;
    println!();
    println!(
        "  Selected for `finqa study`: {}",
        selected
            .iter()
            .map(|c| c.id().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!();
    Ok(())
}

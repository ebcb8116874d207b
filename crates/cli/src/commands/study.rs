//! `finqa study`: Run the ablation study and compare conditions.

use super::{CmdResult, build_provider, build_telemetry, load_config, require_api_key};
use finqa_agent::PromptSet;
use finqa_config::AppConfig;
use finqa_eval::{Dataset, Study, render_comparison};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Command-line overrides for the `[study]` config section.
#[derive(Debug, Default, clap::Args)]
pub struct StudyArgs {
    /// Condition ids to run, e.g. `--conditions 1,6,9`
    #[arg(short = 'k', long, value_delimiter = ',')]
    pub conditions: Option<Vec<u8>>,

    /// Records to sample from the split
    #[arg(short = 'n', long)]
    pub sample_size: Option<usize>,

    /// Sampling seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Records processed at once
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,

    /// Dataset file
    #[arg(long)]
    pub data: Option<PathBuf>,

    /// Dataset split to sample from
    #[arg(long)]
    pub split: Option<String>,

    /// Directory for result files
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl StudyArgs {
    /// Overlay the flags that were given onto `config`.
    pub fn apply(self, config: &mut AppConfig) {
        let study = &mut config.study;
        if let Some(conditions) = self.conditions {
            study.conditions = conditions;
        }
        if let Some(sample_size) = self.sample_size {
            study.sample_size = sample_size;
        }
        if let Some(seed) = self.seed {
            study.seed = seed;
        }
        if let Some(concurrency) = self.concurrency {
            study.concurrency = concurrency;
        }
        if let Some(data) = self.data {
            study.data_path = data;
        }
        if let Some(split) = self.split {
            study.split = split;
        }
        if let Some(output) = self.output {
            study.output_dir = output;
        }
    }
}

pub async fn run(config_path: Option<&Path>, args: StudyArgs) -> CmdResult {
    let mut config = load_config(config_path)?;
    args.apply(&mut config);
    config.validate()?;
    require_api_key(&config)?;

    let conditions = config.study.selected_conditions()?;
    let dataset = Dataset::load(&config.study.data_path, &config.study.split)?;
    let prompts = Arc::new(PromptSet::resolve(config.prompts.dir.as_deref())?);
    let provider = build_provider(&config)?;

    let mut study = Study::new(provider, &config, prompts);
    if let Some(telemetry) = build_telemetry(&config) {
        study = study.with_telemetry(telemetry);
    }

    println!();
    println!("  FinQA Ablation Study");
    println!("  ────────────────────");
    println!("  Dataset:     {}", config.study.data_path.display());
    println!("  Split:       {} ({} records)", config.study.split, dataset.len());
    println!(
        "  Sample:      {} records (seed {})",
        config.study.sample_size, config.study.seed
    );
    println!("  Conditions:  {}", conditions.len());
    println!("  Models:      {} / {}", config.models.mini, config.models.standard);
    println!();

    let reports = study.run(&dataset, &conditions).await?;
    info!(
        conditions = reports.len(),
        output = %config.study.output_dir.display(),
        "Study complete"
    );

    println!();
    println!("{}", render_comparison(&reports));
    println!();

    let total_cost: f64 = reports
        .iter()
        .filter_map(|r| r.usage.as_ref())
        .map(|u| u.total_cost_usd)
        .sum();
    if reports.iter().any(|r| r.usage.is_some()) {
        println!("  Estimated cost: ${total_cost:.4}");
    }
    println!("  Results written to {}", config.study.output_dir.display());
    println!();
    Ok(())
}

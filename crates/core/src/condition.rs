//! The experimental matrix.
//!
//! Every [`StudyCondition`] maps to exactly one [`ConditionProfile`]: a table
//! format, a model tier with its reasoning effort, and a pipeline
//! [`Strategy`]. The mapping is a fixed lookup table; nothing else in the
//! harness branches on the condition itself.

use crate::provider::ReasoningEffort;
use serde::{Deserialize, Serialize};

/// One configuration point in the ablation study.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum StudyCondition {
    JsonBaselineMini,
    MdBaselineMini,
    JsonBaselineMed,
    MdBaselineMed,
    MdBaselineHigh,
    ModularMini,
    ModularMed,
    ModularHigh,
    ReflectMini,
    ReflectMed,
    ReflectHigh,
}

/// How the source table is serialized into the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableFormat {
    /// The original nested mapping, serialized as JSON.
    Structured,
    /// The rendered Markdown-style table.
    Text,
}

/// Model capability tier. Concrete model names come from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    Mini,
    Standard,
}

/// Which pipeline stages run for a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Generate only.
    Baseline,
    /// Plan, then generate.
    Modular,
    /// Plan, generate, review, and correct once if the review fails.
    Reflect,
}

impl Strategy {
    /// Whether a planning call precedes generation.
    pub fn plans(self) -> bool {
        matches!(self, Self::Modular | Self::Reflect)
    }

    /// Whether the generated expression is reviewed (and possibly corrected).
    pub fn reviews(self) -> bool {
        matches!(self, Self::Reflect)
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Baseline => write!(f, "baseline"),
            Self::Modular => write!(f, "modular"),
            Self::Reflect => write!(f, "reflect"),
        }
    }
}

/// The fixed properties of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionProfile {
    pub format: TableFormat,
    pub tier: ModelTier,
    pub effort: ReasoningEffort,
    pub strategy: Strategy,
}

impl StudyCondition {
    /// The full matrix in id order.
    pub const ALL: [StudyCondition; 11] = [
        Self::JsonBaselineMini,
        Self::MdBaselineMini,
        Self::JsonBaselineMed,
        Self::MdBaselineMed,
        Self::MdBaselineHigh,
        Self::ModularMini,
        Self::ModularMed,
        Self::ModularHigh,
        Self::ReflectMini,
        Self::ReflectMed,
        Self::ReflectHigh,
    ];

    /// Stable numeric id (1-based), used in file names and on the command line.
    pub fn id(self) -> u8 {
        match self {
            Self::JsonBaselineMini => 1,
            Self::MdBaselineMini => 2,
            Self::JsonBaselineMed => 3,
            Self::MdBaselineMed => 4,
            Self::MdBaselineHigh => 5,
            Self::ModularMini => 6,
            Self::ModularMed => 7,
            Self::ModularHigh => 8,
            Self::ReflectMini => 9,
            Self::ReflectMed => 10,
            Self::ReflectHigh => 11,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.id() == id)
    }

    /// Human-readable label for reports.
    pub fn label(self) -> &'static str {
        match self {
            Self::JsonBaselineMini => "1. JSON Baseline (Mini)",
            Self::MdBaselineMini => "2. MD Baseline (Mini)",
            Self::JsonBaselineMed => "3. JSON Baseline (Med)",
            Self::MdBaselineMed => "4. MD Baseline (Med)",
            Self::MdBaselineHigh => "5. MD Baseline (High)",
            Self::ModularMini => "6. Modular (Mini)",
            Self::ModularMed => "7. Modular (Med)",
            Self::ModularHigh => "8. Modular (High)",
            Self::ReflectMini => "9. Reflect (Mini)",
            Self::ReflectMed => "10. Reflect (Med)",
            Self::ReflectHigh => "11. Reflect (High)",
        }
    }

    /// The condition's format, tier, effort, and strategy.
    pub fn profile(self) -> ConditionProfile {
        use ModelTier::*;
        use ReasoningEffort as E;
        use Strategy::*;
        use TableFormat::*;

        let (format, tier, effort, strategy) = match self {
            Self::JsonBaselineMini => (Structured, Mini, E::None, Baseline),
            Self::MdBaselineMini => (Text, Mini, E::None, Baseline),
            Self::JsonBaselineMed => (Structured, Standard, E::Medium, Baseline),
            Self::MdBaselineMed => (Text, Standard, E::Medium, Baseline),
            Self::MdBaselineHigh => (Text, Standard, E::High, Baseline),
            Self::ModularMini => (Text, Mini, E::None, Modular),
            Self::ModularMed => (Text, Standard, E::Medium, Modular),
            Self::ModularHigh => (Text, Standard, E::High, Modular),
            Self::ReflectMini => (Text, Mini, E::None, Reflect),
            Self::ReflectMed => (Text, Standard, E::Medium, Reflect),
            Self::ReflectHigh => (Text, Standard, E::High, Reflect),
        };

        ConditionProfile {
            format,
            tier,
            effort,
            strategy,
        }
    }

    /// Snake-case name, matching the serde representation.
    pub fn name(self) -> &'static str {
        match self {
            Self::JsonBaselineMini => "json_baseline_mini",
            Self::MdBaselineMini => "md_baseline_mini",
            Self::JsonBaselineMed => "json_baseline_med",
            Self::MdBaselineMed => "md_baseline_med",
            Self::MdBaselineHigh => "md_baseline_high",
            Self::ModularMini => "modular_mini",
            Self::ModularMed => "modular_med",
            Self::ModularHigh => "modular_high",
            Self::ReflectMini => "reflect_mini",
            Self::ReflectMed => "reflect_med",
            Self::ReflectHigh => "reflect_high",
        }
    }
}

impl std::fmt::Display for StudyCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for StudyCondition {
    type Err = String;

    /// Accepts a numeric id (`"7"`) or a name (`"modular_med"`, `"modular-med"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(id) = trimmed.parse::<u8>() {
            return Self::from_id(id).ok_or_else(|| format!("unknown condition id: {id}"));
        }
        let normalized = trimmed.to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.name() == normalized)
            .ok_or_else(|| format!("unknown condition: {trimmed}"))
    }
}

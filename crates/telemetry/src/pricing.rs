//! Built-in pricing table for the models a study is likely to run.
//!
//! Prices are in USD per 1 million tokens. Each model has an input and
//! output price. Custom pricing can be added at runtime via TOML config.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Per-million-token pricing for a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Price per 1M input tokens in USD.
    pub input_per_m: f64,
    /// Price per 1M output tokens in USD.
    pub output_per_m: f64,
}

impl ModelPricing {
    /// Create a new pricing entry.
    pub fn new(input_per_m: f64, output_per_m: f64) -> Self {
        Self {
            input_per_m,
            output_per_m,
        }
    }

    /// Compute cost for the given token counts.
    pub fn cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        (input_tokens as f64 * self.input_per_m + output_tokens as f64 * self.output_per_m)
            / 1_000_000.0
    }
}

/// Thread-safe pricing table with built-in defaults and custom overrides.
pub struct PricingTable {
    prices: RwLock<HashMap<String, ModelPricing>>,
}

impl PricingTable {
    /// Create a pricing table with built-in model prices.
    pub fn with_defaults() -> Self {
        let mut prices = HashMap::new();

        // ── GPT-5 family ───────────────────────────────────────────
        prices.insert("openai/gpt-5".into(), ModelPricing::new(1.25, 10.0));
        prices.insert("openai/gpt-5-mini".into(), ModelPricing::new(0.25, 2.0));
        prices.insert("openai/gpt-5-nano".into(), ModelPricing::new(0.05, 0.4));
        prices.insert("openai/gpt-5.1".into(), ModelPricing::new(1.25, 10.0));
        prices.insert("openai/gpt-5.2".into(), ModelPricing::new(1.75, 14.0));

        // ── Earlier OpenAI models ──────────────────────────────────
        prices.insert("openai/gpt-4.1".into(), ModelPricing::new(2.0, 8.0));
        prices.insert("openai/gpt-4.1-mini".into(), ModelPricing::new(0.4, 1.6));
        prices.insert("openai/gpt-4o".into(), ModelPricing::new(2.5, 10.0));
        prices.insert("openai/gpt-4o-mini".into(), ModelPricing::new(0.15, 0.6));
        prices.insert("openai/o3".into(), ModelPricing::new(2.0, 8.0));
        prices.insert("openai/o4-mini".into(), ModelPricing::new(1.1, 4.4));

        Self {
            prices: RwLock::new(prices),
        }
    }

    /// Create an empty pricing table.
    pub fn empty() -> Self {
        Self {
            prices: RwLock::new(HashMap::new()),
        }
    }

    /// Look up pricing for a model. Returns None if not found.
    pub fn get(&self, model: &str) -> Option<ModelPricing> {
        let prices = self.prices.read().unwrap_or_else(PoisonError::into_inner);
        prices.get(model).cloned()
    }

    /// Add or update pricing for a model.
    pub fn set(&self, model: impl Into<String>, pricing: ModelPricing) {
        let mut prices = self.prices.write().unwrap_or_else(PoisonError::into_inner);
        prices.insert(model.into(), pricing);
    }

    /// Compute cost for a model call, returning 0.0 if model is not in table.
    ///
    /// Tries an exact match first, then the `openai/` prefix, then the longest
    /// known name that prefixes the model (`gpt-5-mini-2025-08-07` matches
    /// `gpt-5-mini`).
    pub fn compute_cost(&self, model: &str, input_tokens: u32, output_tokens: u32) -> f64 {
        let prices = self.prices.read().unwrap_or_else(PoisonError::into_inner);

        if let Some(p) = prices.get(model) {
            return p.cost(input_tokens, output_tokens);
        }

        if let Some(p) = prices.get(format!("openai/{model}").as_str()) {
            return p.cost(input_tokens, output_tokens);
        }

        let model_lower = model.to_lowercase();
        let bare_model = model_lower.rsplit('/').next().unwrap_or(&model_lower);

        let mut best: Option<(usize, &ModelPricing)> = None;
        for (key, pricing) in prices.iter() {
            let bare_key = key.rsplit('/').next().unwrap_or(key).to_lowercase();
            if bare_model.starts_with(&bare_key)
                && best.is_none_or(|(len, _)| bare_key.len() > len)
            {
                best = Some((bare_key.len(), pricing));
            }
        }

        best.map_or(0.0, |(_, p)| p.cost(input_tokens, output_tokens))
    }

    /// List all known model names.
    pub fn models(&self) -> Vec<String> {
        let prices = self.prices.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = prices.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of models in the pricing table.
    pub fn len(&self) -> usize {
        self.prices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_has_study_models() {
        let table = PricingTable::with_defaults();
        assert!(table.get("openai/gpt-5-mini").is_some());
        assert!(table.get("openai/gpt-5.2").is_some());
        assert!(!table.is_empty());
    }

    #[test]
    fn bare_name_resolves_to_openai_entry() {
        let table = PricingTable::with_defaults();
        // gpt-5-mini: $0.25/M input, $2/M output
        let cost = table.compute_cost("gpt-5-mini", 1000, 500);
        // (1000 * 0.25 + 500 * 2.0) / 1M = 0.00125
        assert!((cost - 0.00125).abs() < 1e-12);
    }

    #[test]
    fn dated_snapshot_uses_longest_prefix() {
        let table = PricingTable::with_defaults();
        let dated = table.compute_cost("gpt-5-mini-2025-08-07", 1_000_000, 0);
        assert!((dated - 0.25).abs() < 1e-10);

        let point = table.compute_cost("gpt-5.2-2025-12-11", 1_000_000, 0);
        assert!((point - 1.75).abs() < 1e-10);
    }

    #[test]
    fn unknown_model_returns_zero() {
        let table = PricingTable::with_defaults();
        let cost = table.compute_cost("llama3:8b", 1000, 500);
        assert!((cost - 0.0).abs() < 1e-10);
    }

    #[test]
    fn custom_pricing() {
        let table = PricingTable::empty();
        assert!(table.is_empty());

        table.set("custom/model", ModelPricing::new(1.0, 2.0));
        assert_eq!(table.len(), 1);

        let cost = table.compute_cost("custom/model", 1_000_000, 1_000_000);
        assert!((cost - 3.0).abs() < 1e-10);
    }

    #[test]
    fn model_pricing_cost() {
        let p = ModelPricing::new(5.0, 15.0);
        // (500*5 + 200*15) / 1M = 0.0055
        let c = p.cost(500, 200);
        assert!((c - 0.0055).abs() < 1e-10);
    }

    #[test]
    fn list_models_sorted() {
        let table = PricingTable::with_defaults();
        let models = table.models();
        assert!(models.contains(&"openai/gpt-5".to_string()));
        assert!(models.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn set_overrides_existing() {
        let table = PricingTable::with_defaults();
        table.set("openai/gpt-5.2", ModelPricing::new(5.0, 20.0));
        let cost = table.compute_cost("gpt-5.2", 1_000_000, 0);
        assert!((cost - 5.0).abs() < 1e-10);
    }
}

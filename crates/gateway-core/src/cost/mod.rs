//! Applies a model's pricing table to token usage.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::capability::ModelPricing;
use crate::response::Usage;

/// The computed cost of one completion, attached to [`crate::response::LLMResponse::cost`]
/// when `track_cost` is enabled and pricing data exists for the model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
pub struct Cost {
    pub input_cost: f64,
    pub output_cost: f64,
    pub total_cost: f64,
    pub currency: String,
}

/// Computes cost for `usage` against `pricing`. Rates in [`ModelPricing`] are
/// per-1k-tokens; missing `input`/`output` rates mean "no pricing data" and
/// this returns `None` rather than raising — a model with no pricing entry
/// is a normal, expected state, not an error.
pub fn apply_pricing(pricing: &ModelPricing, usage: &Usage) -> Option<Cost> {
    let input_rate = pricing.input?;
    let output_rate = pricing.output?;
    let input_cost = (usage.input_tokens as f64 / 1000.0) * input_rate;
    let output_cost = (usage.output_tokens as f64 / 1000.0) * output_rate;
    Some(Cost {
        input_cost,
        output_cost,
        total_cost: input_cost + output_cost,
        currency: pricing.currency.clone(),
    })
}

/// Renders a cost for display, falling back to cents when the total is
/// under a dollar so small costs don't round to "$0.00".
pub fn format_cost(cost: &Cost) -> String {
    if cost.total_cost > 0.0 && cost.total_cost < 0.01 {
        format!("{:.4}¢ {}", cost.total_cost * 100.0, cost.currency)
    } else {
        format!("{:.4} {}", cost.total_cost, cost.currency)
    }
}

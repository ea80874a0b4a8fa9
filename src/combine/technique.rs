//! Pluggable score-combination techniques
//!
//! Each variant is a sealed tag carrying its own parsed weights vector,
//! built once at construction by [`parse_technique`] rather than via
//! runtime reflection over a duck-typed option map.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{MergeError, Result};

/// A parsed, ready-to-use combination technique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CombinationTechnique {
    ArithmeticMean { weights: Vec<f32> },
    ArithmeticMeanWithNegativesSupport { weights: Vec<f32> },
    HarmonicMean { weights: Vec<f32> },
    HarmonicMeanWithNegativeSupport { weights: Vec<f32> },
    GeometricMean { weights: Vec<f32> },
    Rrf { weights: Vec<f32> },
}

fn weight_at(weights: &[f32], index: usize) -> f32 {
    weights.get(index).copied().unwrap_or(1.0)
}

impl CombinationTechnique {
    pub fn name(&self) -> &'static str {
        match self {
            CombinationTechnique::ArithmeticMean { .. } => "arithmetic_mean",
            CombinationTechnique::ArithmeticMeanWithNegativesSupport { .. } => {
                "arithmetic_mean_with_negatives_support"
            }
            CombinationTechnique::HarmonicMean { .. } => "harmonic_mean",
            CombinationTechnique::HarmonicMeanWithNegativeSupport { .. } => {
                "harmonic_mean_with_negative_support"
            }
            CombinationTechnique::GeometricMean { .. } => "geometric_mean",
            CombinationTechnique::Rrf { .. } => "rrf",
        }
    }

    fn weights(&self) -> &[f32] {
        match self {
            CombinationTechnique::ArithmeticMean { weights }
            | CombinationTechnique::ArithmeticMeanWithNegativesSupport { weights }
            | CombinationTechnique::HarmonicMean { weights }
            | CombinationTechnique::HarmonicMeanWithNegativeSupport { weights }
            | CombinationTechnique::GeometricMean { weights }
            | CombinationTechnique::Rrf { weights } => weights,
        }
    }

    /// Reduce a per-sub-query score vector (0.0 where a sub-query had no
    /// hit for this doc) to a single scalar.
    pub fn combine(&self, scores: &[f32]) -> f32 {
        let weights = self.weights();
        match self {
            CombinationTechnique::ArithmeticMean { .. } => {
                let mut sum = 0.0f32;
                let mut count = 0usize;
                for (i, &s) in scores.iter().enumerate() {
                    if s >= 0.0 {
                        sum += weight_at(weights, i) * s;
                        count += 1;
                    }
                }
                if count == 0 { 0.0 } else { sum / count as f32 }
            }
            CombinationTechnique::ArithmeticMeanWithNegativesSupport { .. } => {
                let mut sum = 0.0f32;
                let mut weight_sum = 0.0f32;
                for (i, &s) in scores.iter().enumerate() {
                    let w = weight_at(weights, i);
                    sum += w * s;
                    weight_sum += w;
                }
                if weight_sum == 0.0 { 0.0 } else { sum / weight_sum }
            }
            CombinationTechnique::HarmonicMean { .. } => {
                let mut weight_sum = 0.0f32;
                let mut recip_sum = 0.0f32;
                for (i, &s) in scores.iter().enumerate() {
                    if s > 0.0 {
                        let w = weight_at(weights, i);
                        weight_sum += w;
                        recip_sum += w / s;
                    }
                }
                if recip_sum == 0.0 { 0.0 } else { weight_sum / recip_sum }
            }
            CombinationTechnique::HarmonicMeanWithNegativeSupport { .. } => {
                let mut weight_sum = 0.0f32;
                let mut recip_sum = 0.0f32;
                for (i, &s) in scores.iter().enumerate() {
                    if s == 0.0 {
                        continue;
                    }
                    let w = weight_at(weights, i);
                    weight_sum += w;
                    recip_sum += w / s;
                }
                if recip_sum == 0.0 { 0.0 } else { weight_sum / recip_sum }
            }
            CombinationTechnique::GeometricMean { .. } => {
                let mut weighted_log_sum = 0.0f32;
                let mut weight_sum = 0.0f32;
                for (i, &s) in scores.iter().enumerate() {
                    if s > 0.0 {
                        let w = weight_at(weights, i);
                        weighted_log_sum += w * s.ln();
                        weight_sum += w;
                    }
                }
                if weight_sum == 0.0 { 0.0 } else { (weighted_log_sum / weight_sum).exp() }
            }
            CombinationTechnique::Rrf { .. } => scores.iter().sum(),
        }
    }

    pub(crate) fn weights_display(&self) -> String {
        let formatted: Vec<String> = self.weights().iter().map(|w| format!("{w}")).collect();
        format!("[{}]", formatted.join(", "))
    }

    /// `"<name>, weights [w1, w2, ...]"`.
    pub fn describe(&self) -> String {
        format!("{}, weights {}", self.name(), self.weights_display())
    }
}

fn build(name: &str, weights: Vec<f32>) -> Result<CombinationTechnique> {
    match name {
        "arithmetic_mean" => Ok(CombinationTechnique::ArithmeticMean { weights }),
        "arithmetic_mean_with_negatives_support" => {
            Ok(CombinationTechnique::ArithmeticMeanWithNegativesSupport { weights })
        }
        "harmonic_mean" => Ok(CombinationTechnique::HarmonicMean { weights }),
        "harmonic_mean_with_negative_support" => {
            Ok(CombinationTechnique::HarmonicMeanWithNegativeSupport { weights })
        }
        "geometric_mean" => Ok(CombinationTechnique::GeometricMean { weights }),
        "rrf" => Ok(CombinationTechnique::Rrf { weights }),
        other => Err(MergeError::Config(format!("unknown combination technique: {other}"))),
    }
}

/// Parse a technique from its name and a key-value option map. The only
/// recognised key is `weights`, a sequence of non-negative numbers; unknown
/// keys or a non-sequence `weights` value are parse errors.
pub fn parse_technique(name: &str, options: &HashMap<String, JsonValue>) -> Result<CombinationTechnique> {
    let mut weights = Vec::new();
    for (key, value) in options {
        if key != "weights" {
            return Err(MergeError::Config(format!("unknown technique option: {key}")));
        }
        let JsonValue::Array(items) = value else {
            return Err(MergeError::Config("weights must be a sequence of numbers".to_string()));
        };
        for item in items {
            let w = item
                .as_f64()
                .ok_or_else(|| MergeError::Config("weights must be a sequence of numbers".to_string()))?
                as f32;
            if w < 0.0 {
                return Err(MergeError::Config(format!("weights must be non-negative, got {w}")));
            }
            weights.push(w);
        }
    }
    build(name, weights)
}

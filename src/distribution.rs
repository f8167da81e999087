use crate::error::ConfigError;
use crate::rng::uniform_open;
use crate::types::check_probabilities;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Probability distribution of a service time, inter-arrival time or routing choice.
///
/// Parameters are stored in mean/sd form; the configuration layer converts
/// analyst-facing parameters (rate, interval bounds) into this form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Distribution {
    Exponential { mean: f64 },
    Deterministic { value: f64 },
    /// Uniform on `[mean - √3·sd, mean + √3·sd]`
    Uniform { mean: f64, sd: f64 },
    /// Normal clamped at zero; `sd` is that of the untruncated normal
    TruncatedNormal { mean: f64, sd: f64 },
    /// Lognormal with the given arithmetic mean and sd
    Lognormal { mean: f64, sd: f64 },
    FiniteDiscrete { values: Vec<f64>, probs: Vec<f64> },
}

impl Distribution {
    /// Map one uniform draw `u` in (0, 1) to a variate by inverse transform
    pub fn variate(&self, u: f64) -> f64 {
        match self {
            Distribution::Exponential { mean } => -mean * (1.0 - u).ln(),
            Distribution::Deterministic { value } => *value,
            Distribution::Uniform { mean, sd } => mean + 3f64.sqrt() * sd * (2.0 * u - 1.0),
            Distribution::TruncatedNormal { mean, sd } => (mean + sd * normal_quantile(u)).max(0.0),
            Distribution::Lognormal { mean, sd } => {
                let w = 1.0 + (sd * sd) / (mean * mean);
                (w.ln().sqrt() * normal_quantile(u)).exp() * mean / w.sqrt()
            }
            Distribution::FiniteDiscrete { values, probs } => {
                let mut cumulative = 0.0;
                for (value, prob) in values.iter().zip(probs) {
                    cumulative += prob;
                    if cumulative >= u {
                        return *value;
                    }
                }
                // Rounding left the total just short of u
                values.last().copied().unwrap_or(0.0)
            }
        }
    }

    /// Draw `count` i.i.d. variates, one uniform draw each.
    ///
    /// Every kind consumes exactly one draw per variate (deterministic included),
    /// so distributions sharing a seed stay aligned draw-for-draw.
    pub fn sample<R: RngCore + ?Sized>(&self, rng: &mut R, count: usize) -> Vec<f64> {
        (0..count).map(|_| self.variate(uniform_open(rng))).collect()
    }

    /// Nominal mean, used to size pre-generated batches
    pub fn mean(&self) -> f64 {
        match self {
            Distribution::Exponential { mean }
            | Distribution::Uniform { mean, .. }
            | Distribution::TruncatedNormal { mean, .. }
            | Distribution::Lognormal { mean, .. } => *mean,
            Distribution::Deterministic { value } => *value,
            Distribution::FiniteDiscrete { values, probs } => {
                values.iter().zip(probs).map(|(v, p)| v * p).sum()
            }
        }
    }

    /// Check the parameters are usable as times, naming `context` in the error.
    /// Every variate must be non-negative.
    pub fn validate(&self, context: &str) -> Result<(), ConfigError> {
        let positive = |parameter: &'static str, value: f64| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::InvalidParameter {
                    context: context.to_string(),
                    parameter,
                    value,
                    requirement: "a positive number",
                })
            }
        };

        match self {
            Distribution::Exponential { mean } => positive("mean", *mean),
            Distribution::Deterministic { value } => positive("value", *value),
            Distribution::Uniform { mean, sd } => {
                positive("mean", *mean)?;
                if !(sd.is_finite() && *sd >= 0.0) {
                    return Err(ConfigError::InvalidParameter {
                        context: context.to_string(),
                        parameter: "standard deviation",
                        value: *sd,
                        requirement: "a non-negative number",
                    });
                }
                // Interval from a zero minimum may round a hair below zero
                let lower = mean - 3f64.sqrt() * sd;
                if lower < -1e-12 * mean {
                    return Err(ConfigError::InvalidParameter {
                        context: context.to_string(),
                        parameter: "lower end of the interval",
                        value: lower,
                        requirement: "a non-negative number",
                    });
                }
                Ok(())
            }
            Distribution::TruncatedNormal { mean, sd } | Distribution::Lognormal { mean, sd } => {
                positive("mean", *mean)?;
                positive("standard deviation", *sd)
            }
            Distribution::FiniteDiscrete { values, probs } => {
                if values.is_empty() || values.len() != probs.len() {
                    return Err(ConfigError::ProbabilityCount {
                        context: context.to_string(),
                        expected: values.len(),
                        actual: probs.len(),
                    });
                }
                if let Some(&value) = values.iter().find(|v| !(v.is_finite() && **v >= 0.0)) {
                    return Err(ConfigError::InvalidParameter {
                        context: context.to_string(),
                        parameter: "value",
                        value,
                        requirement: "a non-negative number",
                    });
                }
                check_probabilities(context, probs)
            }
        }
    }

    /// Short human-readable description for the input echo
    pub fn description(&self) -> String {
        match self {
            Distribution::Exponential { mean } => format!("exponential, rate {}", 1.0 / mean),
            Distribution::Deterministic { value } => format!("deterministic: {}", value),
            Distribution::Uniform { mean, sd } => format!(
                "uniform between {} and {}",
                mean - 3f64.sqrt() * sd,
                mean + 3f64.sqrt() * sd
            ),
            Distribution::TruncatedNormal { mean, sd } => {
                format!("normal: mean {}, sd {} (truncated to positive values)", mean, sd)
            }
            Distribution::Lognormal { mean, sd } => format!("lognormal: mean {}, sd {}", mean, sd),
            Distribution::FiniteDiscrete { .. } => "finite discrete".to_string(),
        }
    }
}

/// Quantile function of the standard normal distribution.
///
/// Wichura, "Algorithm AS 241: the percentage points of the normal
/// distribution", Applied Statistics 37 (1988) 477-484 (PPND7 coefficients).
/// Three regimes: central `|p - 0.5| <= 0.425`, tail `r <= 5`, far tail `r > 5`,
/// where `r = sqrt(-ln(min(p, 1 - p)))`.
pub fn normal_quantile(p: f64) -> f64 {
    const A: [f64; 4] = [3.3871327179, 50.434271938, 159.29113202, 59.109374720];
    const B: [f64; 4] = [1.0, 17.895169469, 78.757757664, 67.187563600];
    const C: [f64; 4] = [1.4234372777, 2.7568153900, 1.3067284816, 0.17023821103];
    const D: [f64; 3] = [1.0, 0.7370016425, 0.12021132975];
    const E: [f64; 4] = [6.6579051150, 3.0812263860, 0.42868294337, 0.017337203997];
    const F: [f64; 3] = [1.0, 0.24197894225, 0.012258202635];

    let q = p - 0.5;
    if q.abs() <= 0.425 {
        let x = 0.425 * 0.425 - q * q;
        return q * (A[0] + x * (A[1] + x * (A[2] + x * A[3])))
            / (B[0] + x * (B[1] + x * (B[2] + x * B[3])));
    }

    let (sign, tail) = if p > 0.5 { (1.0, 1.0 - p) } else { (-1.0, p) };
    let r = (-tail.ln()).sqrt();
    if r <= 5.0 {
        let x = r - 1.6;
        sign * (C[0] + x * (C[1] + x * (C[2] + x * C[3]))) / (D[0] + x * (D[1] + x * D[2]))
    } else {
        let x = r - 5.0;
        sign * (E[0] + x * (E[1] + x * (E[2] + x * E[3]))) / (F[0] + x * (F[1] + x * F[2]))
    }
}

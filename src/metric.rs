// ===== synthforge/src/metric.rs =====
use crate::error::{SynthError, SynthResult};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Optimization direction derived from which thresholds are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum Aim {
    Minimize,
    Maximize,
    InRange,
}

/// A measured value from the oracle. `None` is the BAD sentinel: the oracle
/// failed to produce a number for this metric (timeout, malformed output, ...).
pub type MetricValue = Option<f64>;

/// One performance measure with threshold-based feasibility.
///
/// A missing threshold means unbounded on that side; at least one side must
/// be bounded. Equal thresholds describe an exact target and cannot combine
/// with `improve_past_feasible`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    /// Id of the analysis whose results carry this metric.
    pub analysis: String,
    pub min: Option<f64>,
    pub max: Option<f64>,
    #[serde(default)]
    pub improve_past_feasible: bool,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

impl Metric {
    pub fn new(
        name: &str,
        analysis: &str,
        min: Option<f64>,
        max: Option<f64>,
        improve_past_feasible: bool,
    ) -> SynthResult<Self> {
        let m = Metric {
            name: name.to_string(),
            analysis: analysis.to_string(),
            min,
            max,
            improve_past_feasible,
            weight: 1.0,
        };
        m.validate()?;
        Ok(m)
    }

    /// Upper-bounded metric: feasible at or below `max`.
    pub fn minimize(name: &str, analysis: &str, max: f64, improve: bool) -> SynthResult<Self> {
        Self::new(name, analysis, None, Some(max), improve)
    }

    /// Lower-bounded metric: feasible at or above `min`.
    pub fn maximize(name: &str, analysis: &str, min: f64, improve: bool) -> SynthResult<Self> {
        Self::new(name, analysis, Some(min), None, improve)
    }

    pub fn in_range(name: &str, analysis: &str, min: f64, max: f64) -> SynthResult<Self> {
        Self::new(name, analysis, Some(min), Some(max), false)
    }

    pub fn validate(&self) -> SynthResult<()> {
        if self.name.is_empty() {
            return Err(SynthError::Config("metric name must not be empty".into()));
        }
        for (side, v) in [("min", self.min), ("max", self.max)] {
            if let Some(v) = v {
                if !v.is_finite() {
                    return Err(SynthError::Config(format!(
                        "metric '{}': {} threshold must be finite (omit it instead)",
                        self.name, side
                    )));
                }
            }
        }
        match (self.min, self.max) {
            (None, None) => {
                return Err(SynthError::Config(format!(
                    "metric '{}' has no thresholds at all",
                    self.name
                )));
            }
            (Some(lo), Some(hi)) => {
                if lo > hi {
                    return Err(SynthError::Config(format!(
                        "metric '{}': min {} exceeds max {}",
                        self.name, lo, hi
                    )));
                }
                if lo == hi && self.improve_past_feasible {
                    return Err(SynthError::Config(format!(
                        "metric '{}': equal thresholds cannot improve past feasible",
                        self.name
                    )));
                }
            }
            _ => {}
        }
        if !self.weight.is_finite() || self.weight <= 0.0 {
            return Err(SynthError::Config(format!(
                "metric '{}': weight must be positive and finite",
                self.name
            )));
        }
        Ok(())
    }

    pub fn aim(&self) -> Aim {
        match (self.min, self.max) {
            (None, Some(_)) => Aim::Minimize,
            (Some(_), None) => Aim::Maximize,
            _ => Aim::InRange,
        }
    }

    fn lo(&self) -> f64 {
        self.min.unwrap_or(f64::NEG_INFINITY)
    }

    fn hi(&self) -> f64 {
        self.max.unwrap_or(f64::INFINITY)
    }

    pub fn is_feasible(&self, v: MetricValue) -> bool {
        match v {
            Some(v) => v >= self.lo() && v <= self.hi(),
            None => false,
        }
    }

    /// Distance of a value from its nearer threshold, measured inward.
    /// Larger margin = deeper inside the feasible region. Works for all aims:
    /// the unbounded side contributes +inf and drops out of the min.
    pub fn margin(&self, v: f64) -> f64 {
        (v - self.lo()).min(self.hi() - v)
    }

    /// The least favorable value across environment points: the one with the
    /// smallest margin. BAD if any point is BAD, or if nothing was measured.
    pub fn worst_case(&self, values: &[MetricValue]) -> MetricValue {
        let mut worst: Option<f64> = None;
        for v in values {
            let v = (*v)?;
            worst = match worst {
                Some(w) if self.margin(w) <= self.margin(v) => Some(w),
                _ => Some(v),
            };
        }
        worst
    }

    /// 0 when feasible, distance past the nearer threshold when not,
    /// +inf for BAD.
    pub fn constraint_violation(&self, v: MetricValue) -> f64 {
        match v {
            None => f64::INFINITY,
            Some(v) => {
                if v < self.lo() {
                    self.lo() - v
                } else if v > self.hi() {
                    v - self.hi()
                } else {
                    0.0
                }
            }
        }
    }

    /// Strict "a beats b" under this metric's semantics:
    /// BAD loses to any number; a feasible value beats an infeasible one;
    /// two feasible values tie unless the metric improves past feasible, in
    /// which case the larger margin wins; two infeasible values compare by
    /// violation.
    pub fn is_better(&self, a: MetricValue, b: MetricValue) -> bool {
        let (a, b) = match (a, b) {
            (None, _) => return false,
            (Some(_), None) => return true,
            (Some(a), Some(b)) => (a, b),
        };
        match (self.is_feasible(Some(a)), self.is_feasible(Some(b))) {
            (true, false) => true,
            (false, true) => false,
            (true, true) => self.improve_past_feasible && self.margin(a) > self.margin(b),
            (false, false) => {
                self.constraint_violation(Some(a)) < self.constraint_violation(Some(b))
            }
        }
    }
}

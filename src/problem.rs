// ===== synthforge/src/problem.rs =====
use crate::error::{SynthError, SynthResult};
use crate::metric::Metric;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// One operating corner the oracle evaluates a candidate at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvPoint {
    pub id: String,
    #[serde(default)]
    pub params: BTreeMap<String, f64>,
}

/// One oracle analysis and the environment points it sweeps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    pub id: String,
    pub env_points: Vec<EnvPoint>,
}

/// The search problem: which analyses the oracle runs and which metrics the
/// search judges candidates by. Structural errors are rejected here, before
/// any generation runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    pub name: String,
    pub metrics: Vec<Metric>,
    pub analyses: Vec<Analysis>,
}

impl Problem {
    pub fn new(name: &str, metrics: Vec<Metric>, analyses: Vec<Analysis>) -> SynthResult<Self> {
        let p = Problem {
            name: name.to_string(),
            metrics,
            analyses,
        };
        p.validate()?;
        Ok(p)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> SynthResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let p: Problem = serde_json::from_str(&text)?;
        p.validate()?;
        Ok(p)
    }

    pub fn validate(&self) -> SynthResult<()> {
        if self.metrics.is_empty() {
            return Err(SynthError::Config(format!(
                "problem '{}' defines no metrics",
                self.name
            )));
        }
        if self.analyses.is_empty() {
            return Err(SynthError::Config(format!(
                "problem '{}' defines no analyses",
                self.name
            )));
        }

        let mut analysis_ids = BTreeSet::new();
        for a in &self.analyses {
            if !analysis_ids.insert(a.id.as_str()) {
                return Err(SynthError::Config(format!(
                    "duplicate analysis id '{}'",
                    a.id
                )));
            }
            if a.env_points.is_empty() {
                return Err(SynthError::Config(format!(
                    "analysis '{}' has no environment points",
                    a.id
                )));
            }
            let mut point_ids = BTreeSet::new();
            for p in &a.env_points {
                if !point_ids.insert(p.id.as_str()) {
                    return Err(SynthError::Config(format!(
                        "analysis '{}': duplicate env point '{}'",
                        a.id, p.id
                    )));
                }
            }
        }

        let mut metric_names = BTreeSet::new();
        for m in &self.metrics {
            m.validate()?;
            if !metric_names.insert(m.name.as_str()) {
                return Err(SynthError::Config(format!("duplicate metric '{}'", m.name)));
            }
            if !analysis_ids.contains(m.analysis.as_str()) {
                return Err(SynthError::Config(format!(
                    "metric '{}' references unknown analysis '{}'",
                    m.name, m.analysis
                )));
            }
        }
        Ok(())
    }

    pub fn analysis(&self, id: &str) -> Option<&Analysis> {
        self.analyses.iter().find(|a| a.id == id)
    }

    pub fn metric(&self, name: &str) -> Option<&Metric> {
        self.metrics.iter().find(|m| m.name == name)
    }

    pub fn metrics_for<'a>(&'a self, analysis: &'a str) -> impl Iterator<Item = &'a Metric> {
        self.metrics.iter().filter(move |m| m.analysis == analysis)
    }

    /// Overlay per-metric weights from configuration. Unknown names are a
    /// configuration error so typos surface before the run starts.
    pub fn apply_weight_overrides(&mut self, weights: &BTreeMap<String, f64>) -> SynthResult<()> {
        for (name, w) in weights {
            let m = self
                .metrics
                .iter_mut()
                .find(|m| &m.name == name)
                .ok_or_else(|| {
                    SynthError::Config(format!("weight override for unknown metric '{}'", name))
                })?;
            m.weight = *w;
            m.validate()?;
        }
        Ok(())
    }
}

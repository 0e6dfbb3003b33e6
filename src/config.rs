//! Engine configuration and disambiguation thresholds.
//!
//! The thresholds are empirically tuned constants; every one of them can be
//! overridden from the `[thresholds]` table of the engine config file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Numeric thresholds used by anchor selection and the strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisambiguationConfig {
    /// Candidates closer than this to an anchor survive proximity filtering.
    pub anchor_distance_km: f64,
    /// Minimum population for descendant rescue and unambiguous anchors.
    pub lower_population: u64,
    /// Locations above this population are always anchors.
    pub anchor_population: u64,
    /// Candidate groups tighter than this count as one place.
    pub same_distance_km: f64,
    /// Names with at least this many tokens are rarely coincidental.
    pub token_threshold: usize,
    /// Multiplier applied to CITY populations when ranking.
    pub city_population_weight: f64,
    /// Anchor population threshold for the hierarchy-backed strategy.
    pub hierarchy_anchor_population: u64,
    /// Isolated low-population selections farther than this are withdrawn.
    pub outlier_distance_km: f64,
    /// Selections below this population are subject to the outlier check.
    pub outlier_population: u64,
    pub lasso_enabled: bool,
    pub lasso_distance_km: f64,
    /// Spans classified as persons are kept only above this population.
    pub unlikely_population: u64,
    /// Minimum scorer output for the feature-scored strategy.
    pub score_threshold: f64,
    /// Name of the universal root location, skipped during ancestor expansion.
    pub root_name: String,
}

impl Default for DisambiguationConfig {
    fn default() -> Self {
        Self {
            anchor_distance_km: 150.0,
            lower_population: 5_000,
            anchor_population: 1_000_000,
            same_distance_km: 50.0,
            token_threshold: 3,
            city_population_weight: 2.0,
            hierarchy_anchor_population: 500_000,
            outlier_distance_km: 250.0,
            outlier_population: 5_000,
            lasso_enabled: false,
            lasso_distance_km: 100.0,
            unlikely_population: 100_000,
            score_threshold: 0.5,
            root_name: "Earth".to_string(),
        }
    }
}

impl DisambiguationConfig {
    /// Reject values that would make the strategies meaningless.
    pub fn validate(&self) -> Result<()> {
        let distances = [
            ("anchor_distance_km", self.anchor_distance_km),
            ("same_distance_km", self.same_distance_km),
            ("outlier_distance_km", self.outlier_distance_km),
            ("lasso_distance_km", self.lasso_distance_km),
        ];
        for (key, value) in distances {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::Config {
                    key: key.to_string(),
                    reason: format!("expected a non-negative distance, got {}", value),
                });
            }
        }
        if !self.city_population_weight.is_finite() || self.city_population_weight <= 0.0 {
            return Err(Error::Config {
                key: "city_population_weight".to_string(),
                reason: format!("expected a positive weight, got {}", self.city_population_weight),
            });
        }
        if !(0.0..=1.0).contains(&self.score_threshold) {
            return Err(Error::Config {
                key: "score_threshold".to_string(),
                reason: format!("expected a probability, got {}", self.score_threshold),
            });
        }
        Ok(())
    }
}

/// Which disambiguation algorithm to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Baseline,
    #[default]
    Proximity,
    Hierarchy,
    FeatureScored,
}

impl std::str::FromStr for StrategyKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "baseline" => Ok(Self::Baseline),
            "proximity" => Ok(Self::Proximity),
            "hierarchy" => Ok(Self::Hierarchy),
            "feature_scored" | "scored" => Ok(Self::FeatureScored),
            other => Err(Error::Config {
                key: "strategy".to_string(),
                reason: format!("unknown strategy '{}'", other),
            }),
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyKind::Baseline => write!(f, "baseline"),
            StrategyKind::Proximity => write!(f, "proximity"),
            StrategyKind::Hierarchy => write!(f, "hierarchy"),
            StrategyKind::FeatureScored => write!(f, "feature_scored"),
        }
    }
}

/// `[engine]` table of the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    pub strategy: StrategyKind,
    pub lookup_timeout_ms: u64,
    /// TSV gazetteer for the in-memory source
    pub gazetteer: Option<PathBuf>,
    /// Remote gazetteer base URL; used when no TSV gazetteer is given
    pub gazetteer_url: Option<String>,
    pub scorer_model: Option<PathBuf>,
    pub context_model: Option<PathBuf>,
    pub abbreviations_dir: Option<PathBuf>,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            lookup_timeout_ms: 2_000,
            gazetteer: None,
            gazetteer_url: None,
            scorer_model: None,
            context_model: None,
            abbreviations_dir: None,
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub engine: EngineSection,
    pub thresholds: DisambiguationConfig,
}

impl EngineConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&content)?;
        config.thresholds.validate()?;
        Ok(config)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.engine.lookup_timeout_ms)
    }
}

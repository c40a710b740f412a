//! Engine Configuration
//!
//! All tunables are loaded from a TOML file; every section falls back to
//! defaults so a partial file is valid.

use serde::{Deserialize, Serialize};
use sim_state::TickGranularity;
use std::path::Path;

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Clock and sampling settings
    #[serde(default)]
    pub clock: ClockConfig,
    /// Route resolution settings
    #[serde(default)]
    pub routing: RoutingConfig,
    /// Visibility ledger settings
    #[serde(default)]
    pub visibility: VisibilityConfig,
    /// Opinion and knowledge update settings
    #[serde(default)]
    pub opinion: OpinionConfig,
}

impl EngineConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::IoError)?;
        Self::parse(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(ConfigError::TomlError)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.clock.sample_interval_s <= 0 {
            return Err(ConfigError::Invalid("clock.sample_interval_s must be positive".into()));
        }
        if self.routing.cache_size == 0 {
            return Err(ConfigError::Invalid("routing.cache_size must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.visibility.exposure_base) {
            return Err(ConfigError::Invalid("visibility.exposure_base must be in [0,1]".into()));
        }
        for (name, rate) in [
            ("opinion.conversation_rate", self.opinion.conversation_rate),
            ("opinion.adoption_rate", self.opinion.adoption_rate),
            ("opinion.commitment_rate", self.opinion.commitment_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(ConfigError::Invalid(format!("{} must be in [0,1]", name)));
            }
        }
        if self.opinion.decay_half_life_days <= 0.0 {
            return Err(ConfigError::Invalid("opinion.decay_half_life_days must be positive".into()));
        }
        Ok(())
    }
}

/// Clock and location-sample settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Tick granularity ("1m" .. "1d").
    pub granularity: TickGranularity,
    /// Interval between materialized location samples, in seconds.
    pub sample_interval_s: i64,
    /// Maximum deferred steps carried over into the next tick.
    pub max_deferred_steps: usize,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            granularity: TickGranularity::M15,
            sample_interval_s: 60,
            max_deferred_steps: 1024,
        }
    }
}

/// Route resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// LRU cache capacity for resolved routes.
    pub cache_size: usize,
    /// Retry a transient provider failure once before falling back.
    pub retry_transient: bool,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            cache_size: 512,
            retry_transient: true,
        }
    }
}

/// Visibility ledger settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisibilityConfig {
    /// Pass-by radius around the route path, in meters.
    pub proximity_radius_m: f64,
    /// Base probability that a pass-by is noted.
    pub exposure_base: f64,
    /// Recency decay time constant, in days.
    pub tau_seen_days: f64,
    /// Visit saturation coefficient.
    pub visit_alpha: f64,
    /// Tenure deepening coefficient.
    pub tenure_beta: f64,
    /// Seed-anchor decay time constant, in days.
    pub seed_tau_days: f64,
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        // Rural-town defaults; denser areas want shorter time constants.
        Self {
            proximity_radius_m: 75.0,
            exposure_base: 0.6,
            tau_seen_days: 45.0,
            visit_alpha: 0.25,
            tenure_beta: 0.010,
            seed_tau_days: 90.0,
        }
    }
}

/// Opinion and knowledge EMA settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpinionConfig {
    /// EMA rate applied on conversation completion.
    pub conversation_rate: f64,
    /// EMA rate applied on channel adoption.
    pub adoption_rate: f64,
    /// EMA rate applied on commitment resolution.
    pub commitment_rate: f64,
    /// Half-life of inactivity decay, in days.
    pub decay_half_life_days: f64,
}

impl Default for OpinionConfig {
    fn default() -> Self {
        Self {
            conversation_rate: 0.2,
            adoption_rate: 0.3,
            commitment_rate: 0.25,
            decay_half_life_days: 45.0,
        }
    }
}

/// Errors that can occur while loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Error reading the file
    IoError(std::io::Error),
    /// Error parsing TOML
    TomlError(toml::de::Error),
    /// Value out of range
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parse error: {}", e),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::IoError(e) => Some(e),
            ConfigError::TomlError(e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}

//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ShowcaseError};

/// Environment variable overriding [`EngineConfig::max_concurrent_reads`].
pub const MAX_CONCURRENT_READS_ENV: &str = "SHOWCASE_MAX_CONCURRENT_READS";

const DEFAULT_MAX_CONCURRENT_READS: usize = 16;

/// Tuning knobs for [`crate::ResultsEngine`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound on performances whose scores and votes are read at once.
    pub max_concurrent_reads: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_reads: DEFAULT_MAX_CONCURRENT_READS,
        }
    }
}

impl EngineConfig {
    pub fn with_max_concurrent_reads(mut self, n: usize) -> Self {
        self.max_concurrent_reads = n;
        self
    }

    /// Read overrides from the environment, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(raw) = lookup(MAX_CONCURRENT_READS_ENV) {
            config.max_concurrent_reads = raw.trim().parse().map_err(|_| {
                ShowcaseError::Config(format!(
                    "{MAX_CONCURRENT_READS_ENV} must be a positive integer, got '{raw}'"
                ))
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_reads == 0 {
            return Err(ShowcaseError::Config(
                "max_concurrent_reads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

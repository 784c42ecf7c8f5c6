//! Environment-driven configuration.

use crate::error::SmokeError;

/// Vector length variable; defaults to [`DEFAULT_LEN`].
pub const LEN_VAR: &str = "GRADPROBE_LEN";
/// Optional RNG seed variable; unset draws from OS entropy.
pub const SEED_VAR: &str = "GRADPROBE_SEED";
pub const DEFAULT_LEN: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmokeConfig {
    pub len: usize,
    pub seed: Option<u64>,
}

impl Default for SmokeConfig {
    fn default() -> Self {
        Self {
            len: DEFAULT_LEN,
            seed: None,
        }
    }
}

impl SmokeConfig {
    /// Read the configuration from process environment variables.
    pub fn from_env() -> Result<Self, SmokeError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`, which maps a variable name
    /// to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SmokeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(LEN_VAR) {
            config.len = raw
                .trim()
                .parse()
                .map_err(|e| SmokeError::Config(format!("{LEN_VAR}={raw:?}: {e}")))?;
            if config.len == 0 {
                return Err(SmokeError::Config(format!("{LEN_VAR} must be at least 1")));
            }
        }

        if let Some(raw) = lookup(SEED_VAR) {
            let seed = raw
                .trim()
                .parse()
                .map_err(|e| SmokeError::Config(format!("{SEED_VAR}={raw:?}: {e}")))?;
            config.seed = Some(seed);
        }

        log::debug!("smoke config: {config:?}");
        Ok(config)
    }
}

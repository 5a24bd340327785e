//! Cache manager configuration

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

/// Default weight budget in bytes
pub const DEFAULT_MAX_WEIGHT: usize = 200_000;

/// Default number of hash buckets
pub const DEFAULT_BUCKETS: usize = 32;

/// Settings for a [`CacheManager`](crate::CacheManager)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Maximum resident weight in bytes
    pub max_weight: usize,

    /// Initial bucket count; must be a power of two
    pub initial_buckets: usize,
}

impl ManagerConfig {
    /// Config with the given budget and default bucket count
    pub fn with_budget(max_weight: usize) -> Self {
        Self {
            max_weight,
            ..Self::default()
        }
    }

    /// Check the settings before a manager is built
    pub fn validate(&self) -> Result<()> {
        if self.max_weight == 0 {
            return Err(CacheError::InvalidArgument(
                "max_weight must be greater than 0".to_string(),
            ));
        }
        if !self.initial_buckets.is_power_of_two() {
            return Err(CacheError::InvalidArgument(format!(
                "initial_buckets must be a power of two, got {}",
                self.initial_buckets
            )));
        }
        Ok(())
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_weight: DEFAULT_MAX_WEIGHT,
            initial_buckets: DEFAULT_BUCKETS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(ManagerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_settings() {
        assert!(ManagerConfig::with_budget(0).validate().is_err());

        let config = ManagerConfig {
            initial_buckets: 24,
            ..ManagerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(CacheError::InvalidArgument(_))
        ));

        let config = ManagerConfig {
            initial_buckets: 0,
            ..ManagerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json() {
        let config: ManagerConfig = serde_json::from_str(r#"{ "max_weight": 4096 }"#).unwrap();
        assert_eq!(config.max_weight, 4096);
        assert_eq!(config.initial_buckets, DEFAULT_BUCKETS);
    }
}

//! Process settings for the plot service.

use std::path::PathBuf;
use std::time::Duration;

use backend::ExhaustionPolicy;
use plot_common::TimeZoneSpec;

/// Settings read from the environment and command line.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// YAML file listing backends and sources
    pub data_config: PathBuf,
    /// Offset applied when a panel names no `tz`
    pub default_tz: String,
    /// How long `acquire` waits on an exhausted pool; 0 fails fast
    pub pool_wait_ms: u64,
    /// Lifetime of cached rank and channel lists
    pub cache_ttl_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_config: PathBuf::from("config/data.yaml"),
            default_tz: "UTC".to_string(),
            pool_wait_ms: 5000,
            cache_ttl_secs: 300,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("PLOT_DATA_CONFIG") {
            config.data_config = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("PLOT_DEFAULT_TZ") {
            config.default_tz = val;
        }

        if let Ok(val) = std::env::var("PLOT_POOL_WAIT_MS") {
            if let Ok(ms) = val.parse() {
                config.pool_wait_ms = ms;
            }
        }

        if let Ok(val) = std::env::var("PLOT_CACHE_TTL_SECS") {
            if let Ok(secs) = val.parse() {
                config.cache_ttl_secs = secs;
            }
        }

        config
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.data_config.as_os_str().is_empty() {
            return Err("data_config must name a file".to_string());
        }

        if let Err(e) = TimeZoneSpec::parse(&self.default_tz) {
            return Err(format!("default_tz is invalid: {}", e));
        }

        if self.cache_ttl_secs == 0 {
            return Err("cache_ttl_secs must be > 0".to_string());
        }

        Ok(())
    }

    pub fn exhaustion_policy(&self) -> ExhaustionPolicy {
        if self.pool_wait_ms == 0 {
            ExhaustionPolicy::FailFast
        } else {
            ExhaustionPolicy::Wait {
                timeout: Duration::from_millis(self.pool_wait_ms),
            }
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn time_zone(&self) -> Result<TimeZoneSpec, String> {
        TimeZoneSpec::parse(&self.default_tz).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = ServiceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.exhaustion_policy(),
            ExhaustionPolicy::Wait {
                timeout: Duration::from_secs(5)
            }
        );
    }

    #[test]
    fn test_zero_wait_fails_fast() {
        let config = ServiceConfig {
            pool_wait_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.exhaustion_policy(), ExhaustionPolicy::FailFast);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = ServiceConfig {
            default_tz: "Mars/Olympus".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ServiceConfig {
            cache_ttl_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.validate().unwrap_err(), "cache_ttl_secs must be > 0");
    }

    #[test]
    fn test_offset_time_zone() {
        let config = ServiceConfig {
            default_tz: "-10".to_string(),
            ..Default::default()
        };
        assert_eq!(config.time_zone().unwrap().offset_seconds, -36000.0);
    }
}

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning for one export pipeline: queue bound, batch bound, worker wake-up
/// cadence, and the per-call exporter deadline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
    #[serde(default = "default_max_export_batch_size")]
    pub max_export_batch_size: usize,
    #[serde(with = "humantime_serde", default = "default_schedule_delay")]
    pub schedule_delay: Duration,
    #[serde(with = "humantime_serde", default = "default_exporter_timeout")]
    pub exporter_timeout: Duration,
}

fn default_max_queue_size() -> usize {
    2048
}

fn default_max_export_batch_size() -> usize {
    512
}

fn default_schedule_delay() -> Duration {
    Duration::from_millis(5000)
}

fn default_exporter_timeout() -> Duration {
    Duration::from_millis(30000)
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_queue_size: default_max_queue_size(),
            max_export_batch_size: default_max_export_batch_size(),
            schedule_delay: default_schedule_delay(),
            exporter_timeout: default_exporter_timeout(),
        }
    }
}

impl BatchConfig {
    pub fn builder() -> BatchConfigBuilder {
        BatchConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_queue_size == 0 {
            return Err("max_queue_size must be > 0".to_string());
        }

        if self.max_export_batch_size == 0 {
            return Err("max_export_batch_size must be > 0".to_string());
        }

        if self.max_export_batch_size > self.max_queue_size {
            return Err(format!(
                "max_export_batch_size ({}) must not exceed max_queue_size ({})",
                self.max_export_batch_size, self.max_queue_size
            ));
        }

        if self.schedule_delay.is_zero() {
            return Err("schedule_delay must be > 0".to_string());
        }

        if self.exporter_timeout.is_zero() {
            return Err("exporter_timeout must be > 0".to_string());
        }

        Ok(())
    }
}

#[derive(Default)]
pub struct BatchConfigBuilder {
    max_queue_size: Option<usize>,
    max_export_batch_size: Option<usize>,
    schedule_delay: Option<Duration>,
    exporter_timeout: Option<Duration>,
}

impl BatchConfigBuilder {
    pub fn max_queue_size(mut self, max_queue_size: usize) -> Self {
        self.max_queue_size = Some(max_queue_size);
        self
    }

    pub fn max_export_batch_size(mut self, max_export_batch_size: usize) -> Self {
        self.max_export_batch_size = Some(max_export_batch_size);
        self
    }

    pub fn schedule_delay(mut self, schedule_delay: Duration) -> Self {
        self.schedule_delay = Some(schedule_delay);
        self
    }

    pub fn exporter_timeout(mut self, exporter_timeout: Duration) -> Self {
        self.exporter_timeout = Some(exporter_timeout);
        self
    }

    pub fn build(self) -> BatchConfig {
        BatchConfig {
            max_queue_size: self.max_queue_size.unwrap_or_else(default_max_queue_size),
            max_export_batch_size: self
                .max_export_batch_size
                .unwrap_or_else(default_max_export_batch_size),
            schedule_delay: self.schedule_delay.unwrap_or_else(default_schedule_delay),
            exporter_timeout: self
                .exporter_timeout
                .unwrap_or_else(default_exporter_timeout),
        }
    }
}

mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BatchConfig::default();
        assert_eq!(config.max_queue_size, 2048);
        assert_eq!(config.max_export_batch_size, 512);
        assert_eq!(config.schedule_delay, Duration::from_secs(5));
        assert_eq!(config.exporter_timeout, Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_overrides() {
        let config = BatchConfig::builder()
            .max_queue_size(10)
            .max_export_batch_size(5)
            .schedule_delay(Duration::from_millis(100))
            .build();

        assert_eq!(config.max_queue_size, 10);
        assert_eq!(config.max_export_batch_size, 5);
        assert_eq!(config.exporter_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_validation_rejects_zero_sizes() {
        let config = BatchConfig::builder().max_queue_size(0).build();
        assert!(config.validate().is_err());

        let config = BatchConfig::builder().max_export_batch_size(0).build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_batch_larger_than_queue() {
        let config = BatchConfig::builder()
            .max_queue_size(10)
            .max_export_batch_size(20)
            .build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_humantime_round_trip() {
        let config = BatchConfig::builder()
            .schedule_delay(Duration::from_millis(1500))
            .build();

        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("1s 500ms"));

        let back: BatchConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.schedule_delay, Duration::from_millis(1500));
    }
}

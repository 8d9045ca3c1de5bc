use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use serde::Deserialize;

use crate::error::{ConfigError, DropSink};

pub const DEFAULT_QUEUE_CAPACITY: usize = 4;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize)]
#[serde(default)]
pub struct TailLimits {
    pub max_line_bytes: usize,
}

impl Default for TailLimits {
    fn default() -> Self {
        Self {
            max_line_bytes: 1024 * 1024,
        }
    }
}

/// Where to read from and how to behave at end-of-file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TailConfig {
    pub path: PathBuf,
    /// Read the existing contents instead of starting at the current end.
    #[serde(default)]
    pub from_start: bool,
    /// Keep polling for appended data once the end is reached.
    #[serde(default)]
    pub follow: bool,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub limits: TailLimits,
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

impl TailConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            from_start: false,
            follow: false,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            limits: TailLimits::default(),
        }
    }

    pub fn from_start(mut self, from_start: bool) -> Self {
        self.from_start = from_start;
        self
    }

    pub fn follow(mut self, follow: bool) -> Self {
        self.follow = follow;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Deserialize)]
pub struct PipelineConfig {
    pub tail: TailConfig,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(skip)]
    pub drop_sink: Option<Arc<dyn DropSink>>,
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

impl PipelineConfig {
    pub fn new(tail: TailConfig) -> Self {
        Self {
            tail,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            drop_sink: None,
        }
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn with_drop_sink(mut self, sink: Arc<dyn DropSink>) -> Self {
        self.drop_sink = Some(sink);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if self.tail.limits.max_line_bytes == 0 {
            return Err(ConfigError::ZeroMaxLineBytes);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_fills_in_defaults() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [tail]
            path = "output_log.txt"
            "#,
        )
        .unwrap();

        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(config.tail.path, PathBuf::from("output_log.txt"));
        assert!(!config.tail.from_start);
        assert!(!config.tail.follow);
        assert_eq!(config.tail.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.tail.limits, TailLimits::default());
        assert!(config.drop_sink.is_none());
    }

    #[test]
    fn toml_overrides_every_field() {
        let config = PipelineConfig::from_toml_str(
            r#"
            queue_capacity = 16

            [tail]
            path = "/tmp/Player.log"
            from_start = true
            follow = true
            poll_interval_ms = 250

            [tail.limits]
            max_line_bytes = 4096
            "#,
        )
        .unwrap();

        assert_eq!(config.queue_capacity, 16);
        assert!(config.tail.from_start);
        assert!(config.tail.follow);
        assert_eq!(config.tail.poll_interval(), Duration::from_millis(250));
        assert_eq!(config.tail.limits.max_line_bytes, 4096);
    }

    #[test]
    fn zero_sizes_are_rejected() {
        let err = PipelineConfig::from_toml_str(
            r#"
            queue_capacity = 0
            [tail]
            path = "log.txt"
            "#,
        )
        .err()
        .unwrap();
        assert!(matches!(err, ConfigError::ZeroQueueCapacity));

        let mut config = PipelineConfig::new(TailConfig::new("log.txt"));
        config.tail.limits.max_line_bytes = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroMaxLineBytes)
        ));
    }

    #[test]
    fn missing_path_is_a_parse_error() {
        let err = PipelineConfig::from_toml_str("queue_capacity = 2").err().unwrap();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}

use std::{fmt, path::PathBuf, sync::Arc};

use thiserror::Error;
use tracing::warn;

/// Fatal failures of the tailer. Any of these stops the pipeline.
#[derive(Debug, Error)]
pub enum TailError {
    #[error("log file `{path}` could not be opened: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to seek in log file: {source}")]
    Seek {
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read log file at offset {offset}: {source}")]
    Read {
        offset: u64,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "line starting at offset {offset} is too long (observed_bytes={observed_bytes}, max_line_bytes={max_line_bytes})"
    )]
    LineTooLong {
        offset: u64,
        observed_bytes: usize,
        max_line_bytes: usize,
    },
}

/// A block whose header or source line does not follow any known layout.
#[derive(Debug, Error)]
pub enum BlockError {
    #[error("invalid header: {line}")]
    InvalidHeader { line: String },
    #[error("invalid timestamp `{timestamp}` in header: {line}")]
    InvalidTimestamp {
        timestamp: String,
        line: String,
        #[source]
        source: time::error::Parse,
    },
    #[error("invalid source line: {line}")]
    InvalidSource { line: String },
    #[error("invalid sequence number in source line: {line}")]
    InvalidSequence { line: String },
}

impl BlockError {
    /// The raw line that failed to parse.
    pub fn line(&self) -> &str {
        match self {
            BlockError::InvalidHeader { line }
            | BlockError::InvalidTimestamp { line, .. }
            | BlockError::InvalidSource { line }
            | BlockError::InvalidSequence { line } => line,
        }
    }
}

/// The payload of an otherwise well-formed block is not valid JSON.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("invalid JSON payload for `{title}`: {source}")]
    InvalidJson {
        title: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A business collaborator failed to process a dispatched event.
#[derive(Debug, Error)]
#[error("{handler} could not handle `{title}`: {source}")]
pub struct HandlerError {
    pub handler: &'static str,
    pub title: String,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl HandlerError {
    pub fn new(
        handler: &'static str,
        title: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            handler,
            title: title.into(),
            source: source.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("queue capacity must be at least 1")]
    ZeroQueueCapacity,
    #[error("max_line_bytes must be at least 1")]
    ZeroMaxLineBytes,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Tail(#[from] TailError),
    #[error("pipeline stage panicked or was cancelled: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Pipeline stage at which a unit was dropped.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum DropStage {
    /// Block could not be turned into an event.
    Parse,
    /// Event payload was not valid JSON.
    Payload,
    /// A collaborator rejected the dispatched event.
    Handler,
}

impl fmt::Display for DropStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DropStage::Parse => "parse",
            DropStage::Payload => "payload",
            DropStage::Handler => "handler",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DroppedUnit {
    pub stage: DropStage,
    pub reason: String,
    /// The raw content that failed (block text or JSON payload).
    pub raw: String,
}

pub trait DropSink: Send + Sync + 'static {
    fn on_drop(&self, unit: DroppedUnit);
}

#[derive(Clone, Default)]
pub(crate) struct DropReporter {
    sink: Option<Arc<dyn DropSink>>,
}

impl DropReporter {
    pub(crate) fn new(sink: Option<Arc<dyn DropSink>>) -> Self {
        Self { sink }
    }

    pub(crate) fn report(&self, stage: DropStage, reason: &dyn fmt::Display, raw: String) {
        warn!(%stage, %reason, %raw, "dropped unit");
        if let Some(sink) = self.sink.as_ref() {
            sink.on_drop(DroppedUnit {
                stage,
                reason: reason.to_string(),
                raw,
            });
        }
    }
}

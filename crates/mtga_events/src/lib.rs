#![forbid(unsafe_code)]
//! Turns the MTG Arena client log into a stream of structured events.
//!
//! The crate provides:
//! - A polling tailer with bounded line lengths.
//! - Block framing and multi-format block parsing.
//! - A dispatcher that decodes, deduplicates and tracks player identity
//!   before handing events to [`EventHandler`]s.
//! - A [`Pipeline`] that runs the stages concurrently behind bounded queues.

mod block;
mod block_parser;
mod config;
mod dispatcher;
mod error;
mod framer;
mod handler;
mod normalized;
mod pipeline;
mod reader;
mod session;
mod tailer;

pub mod formats;

pub use block::{Block, ParsedEvent};
pub use block_parser::{
    parse_timestamp, BlockFormat, BlockParser, BlockView, Extracted, TIMESTAMP_FORMAT,
};
pub use config::{
    PipelineConfig, TailConfig, TailLimits, DEFAULT_POLL_INTERVAL_MS, DEFAULT_QUEUE_CAPACITY,
};
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use error::{
    BlockError, ConfigError, DropSink, DropStage, DroppedUnit, HandlerError, PayloadError,
    PipelineError, TailError,
};
pub use framer::{is_header, is_terminator, BlockFramer, FramerState, HEADER_PREFIXES};
pub use handler::EventHandler;
pub use normalized::DispatchedEvent;
pub use pipeline::{Pipeline, PipelineProgress, PipelineReport};
pub use reader::{BoundedLine, SyncBoundedLineReader};
pub use session::SessionState;
pub use tailer::{tail, Tailer};

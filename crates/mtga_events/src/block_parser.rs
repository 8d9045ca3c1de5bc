use std::sync::OnceLock;

use regex::Regex;
use time::{format_description::FormatItem, macros::format_description, PrimitiveDateTime};
use tracing::trace;

use crate::{
    block::{Block, ParsedEvent},
    error::BlockError,
    formats::{DirectionalRpc, InlineBrace, TrailingBrace},
};

/// `6/7/2018 7:21:03 PM`
pub const TIMESTAMP_FORMAT: &[FormatItem<'static>] = format_description!(
    "[month padding:none]/[day padding:none]/[year] [hour repr:12 padding:none]:[minute]:[second] [period]"
);

fn header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\[[^\]]+\]\s*(?P<timestamp>.+?(?:AM|PM))(?P<rest>.*)$")
            .expect("header pattern compiles")
    })
}

pub fn parse_timestamp(raw: &str) -> Result<PrimitiveDateTime, time::error::Parse> {
    PrimitiveDateTime::parse(raw.trim(), TIMESTAMP_FORMAT)
}

/// A block whose header has already been split into timestamp and remainder.
#[derive(Debug, Clone, Copy)]
pub struct BlockView<'a> {
    /// Header text following the timestamp.
    pub remainder: &'a str,
    /// All lines of the block, header included.
    pub lines: &'a [String],
}

impl BlockView<'_> {
    pub fn header(&self) -> &str {
        self.lines.first().map(String::as_str).unwrap_or_default()
    }

    pub fn source_line(&self) -> &str {
        self.lines.get(1).map(String::as_str).unwrap_or_default()
    }

    pub fn body_from(&self, first_line: usize) -> String {
        self.lines.get(first_line..).unwrap_or_default().join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub title: String,
    pub sequence_number: Option<u64>,
    pub is_request: bool,
    pub json_payload: String,
}

/// One historical layout of a logged block.
pub trait BlockFormat: Send + Sync {
    fn name(&self) -> &'static str;

    fn matches(&self, view: &BlockView<'_>) -> bool;

    fn extract(&self, view: &BlockView<'_>) -> Result<Extracted, BlockError>;
}

/// Turns framed blocks into [`ParsedEvent`]s.
///
/// The header is parsed first; the block is then offered to each format in
/// order and the first one that recognises it extracts the payload. Blocks no
/// format recognises carry no payload and yield `Ok(None)`.
pub struct BlockParser {
    formats: Vec<Box<dyn BlockFormat>>,
}

impl Default for BlockParser {
    fn default() -> Self {
        Self::with_formats(vec![
            Box::new(DirectionalRpc),
            Box::new(InlineBrace),
            Box::new(TrailingBrace),
        ])
    }
}

impl BlockParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_formats(formats: Vec<Box<dyn BlockFormat>>) -> Self {
        Self { formats }
    }

    pub fn format_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.formats.iter().map(|format| format.name())
    }

    pub fn parse(&self, block: &Block) -> Result<Option<ParsedEvent>, BlockError> {
        if block.len() < 2 {
            return Ok(None);
        }

        let header = block.header();
        let captures = header_re()
            .captures(header)
            .ok_or_else(|| BlockError::InvalidHeader {
                line: header.to_string(),
            })?;
        let raw_timestamp = captures.name("timestamp").map_or("", |m| m.as_str());
        let remainder = captures.name("rest").map_or("", |m| m.as_str());

        let timestamp =
            parse_timestamp(raw_timestamp).map_err(|source| BlockError::InvalidTimestamp {
                timestamp: raw_timestamp.to_string(),
                line: header.to_string(),
                source,
            })?;

        let view = BlockView {
            remainder,
            lines: block.lines(),
        };
        let Some(format) = self.formats.iter().find(|format| format.matches(&view)) else {
            trace!(%header, "block matches no known layout");
            return Ok(None);
        };

        let extracted = format.extract(&view)?;
        if extracted.json_payload.is_empty() {
            trace!(%header, format = format.name(), "block has an empty payload");
            return Ok(None);
        }
        trace!(title = %extracted.title, format = format.name(), "parsed block");

        Ok(Some(ParsedEvent {
            timestamp,
            sequence_number: extracted.sequence_number,
            title: extracted.title,
            is_request: extracted.is_request,
            json_payload: extracted.json_payload,
        }))
    }
}

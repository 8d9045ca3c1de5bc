use time::PrimitiveDateTime;

/// Consecutive log lines that make up one logged event.
///
/// The first line is the header. Blocks produced by
/// [`BlockFramer`](crate::BlockFramer) always hold at least two lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    lines: Vec<String>,
}

impl Block {
    pub fn new(lines: Vec<String>) -> Self {
        Self { lines }
    }

    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(lines.into_iter().map(Into::into).collect())
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn header(&self) -> &str {
        self.lines.first().map(String::as_str).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The block as it appeared in the log.
    pub fn raw(&self) -> String {
        self.lines.join("\n")
    }
}

/// Metadata and payload extracted from one [`Block`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEvent {
    pub timestamp: PrimitiveDateTime,
    /// Only directional (`==>`/`<==`) blocks carry a sequence number.
    pub sequence_number: Option<u64>,
    pub title: String,
    pub is_request: bool,
    /// Never empty.
    pub json_payload: String,
}

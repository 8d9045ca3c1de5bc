use tracing::{debug, trace};

use crate::block::Block;

/// Line prefixes that open a new block.
pub const HEADER_PREFIXES: [&str; 2] = ["[UnityCrossThreadLogger]", "[Client GRE]"];

/// First characters of a line that closes the open block.
pub const TERMINATOR_PREFIXES: [char; 2] = [']', '}'];

pub fn is_header(line: &str) -> bool {
    HEADER_PREFIXES.iter().any(|prefix| line.starts_with(prefix))
}

pub fn is_terminator(line: &str) -> bool {
    line.starts_with(&TERMINATOR_PREFIXES[..])
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FramerState {
    #[default]
    Idle,
    Collecting(Vec<String>),
}

/// Groups lines into [`Block`]s.
///
/// A header line always starts a fresh block, discarding one that is still
/// open: the client does not close every block it opens. A block is emitted
/// only when a terminator line is appended to it, so a header on its own is
/// never emitted.
#[derive(Debug, Default)]
pub struct BlockFramer {
    state: FramerState,
    superseded: u64,
}

impl BlockFramer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &FramerState {
        &self.state
    }

    pub fn is_collecting(&self) -> bool {
        matches!(self.state, FramerState::Collecting(_))
    }

    /// Number of open blocks discarded because a new header arrived.
    pub fn superseded(&self) -> u64 {
        self.superseded
    }

    pub fn reset(&mut self) {
        self.state = FramerState::Idle;
    }

    pub fn push_line(&mut self, line: String) -> Option<Block> {
        if line.is_empty() {
            return None;
        }

        if is_header(&line) {
            if let FramerState::Collecting(previous) = &self.state {
                self.superseded += 1;
                debug!(
                    lines = previous.len(),
                    header = previous.first().map(String::as_str).unwrap_or_default(),
                    "discarding unterminated block"
                );
            }
            self.state = FramerState::Collecting(vec![line]);
            return None;
        }

        let FramerState::Collecting(lines) = &mut self.state else {
            trace!(%line, "ignoring line outside of a block");
            return None;
        };
        let terminates = is_terminator(&line);
        lines.push(line);
        if !terminates {
            return None;
        }

        match std::mem::take(&mut self.state) {
            FramerState::Collecting(lines) => Some(Block::new(lines)),
            FramerState::Idle => None,
        }
    }
}

use std::io::{self, Read};

const CHUNK_SIZE_BYTES: usize = 8192;

#[derive(Debug, PartialEq, Eq)]
pub enum BoundedLine {
    /// A complete line, without its `\n` terminator.
    Line { offset: u64, bytes: Vec<u8> },
    /// The line starting at `offset` grew past the limit before a terminator was seen.
    LineTooLong {
        offset: u64,
        observed_bytes: usize,
        max_line_bytes: usize,
    },
    /// The source is drained. Bytes of an unterminated line stay buffered.
    Eof,
}

/// Splits a byte stream into lines without ever holding more than
/// `max_line_bytes` of a single line in memory.
///
/// End-of-stream is not sticky: calling [`next_line`](Self::next_line) again
/// after [`BoundedLine::Eof`] reads from the source again, which is what lets
/// a tailer pick up data appended to a growing file.
pub struct SyncBoundedLineReader<R: Read> {
    reader: R,
    max_line_bytes: usize,
    buffer: Box<[u8]>,
    buffer_pos: usize,
    buffer_len: usize,
    current_line: Vec<u8>,
    line_start: u64,
    consumed: u64,
}

impl<R: Read> SyncBoundedLineReader<R> {
    pub fn new(reader: R, max_line_bytes: usize, start_offset: u64) -> Self {
        Self {
            reader,
            max_line_bytes,
            buffer: vec![0u8; CHUNK_SIZE_BYTES].into_boxed_slice(),
            buffer_pos: 0,
            buffer_len: 0,
            current_line: Vec::new(),
            line_start: start_offset,
            consumed: start_offset,
        }
    }

    /// Offset in the source just past the last byte read from it.
    pub fn position(&self) -> u64 {
        self.consumed
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Takes the buffered bytes of an unterminated final line, if any.
    pub fn take_partial(&mut self) -> Option<(u64, Vec<u8>)> {
        if self.current_line.is_empty() {
            return None;
        }
        let offset = self.line_start;
        self.line_start = self.consumed;
        Some((offset, std::mem::take(&mut self.current_line)))
    }

    fn fill_buffer(&mut self) -> io::Result<usize> {
        self.buffer_pos = 0;
        self.buffer_len = 0;
        loop {
            match self.reader.read(&mut self.buffer) {
                Ok(n) => {
                    self.buffer_len = n;
                    return Ok(n);
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
    }

    fn too_long(&self, additional: usize) -> Option<BoundedLine> {
        let observed_bytes = self.current_line.len().saturating_add(additional);
        (observed_bytes > self.max_line_bytes).then(|| BoundedLine::LineTooLong {
            offset: self.line_start,
            observed_bytes,
            max_line_bytes: self.max_line_bytes,
        })
    }

    pub fn next_line(&mut self) -> io::Result<BoundedLine> {
        loop {
            if self.buffer_pos >= self.buffer_len && self.fill_buffer()? == 0 {
                return Ok(BoundedLine::Eof);
            }

            let (newline_idx, slice_len) = {
                let slice = &self.buffer[self.buffer_pos..self.buffer_len];
                (slice.iter().position(|b| *b == b'\n'), slice.len())
            };

            let Some(newline_idx) = newline_idx else {
                if let Some(too_long) = self.too_long(slice_len) {
                    return Ok(too_long);
                }
                self.current_line
                    .extend_from_slice(&self.buffer[self.buffer_pos..self.buffer_len]);
                self.buffer_pos = self.buffer_len;
                self.consumed += slice_len as u64;
                continue;
            };

            if let Some(too_long) = self.too_long(newline_idx) {
                return Ok(too_long);
            }
            let end = self.buffer_pos + newline_idx;
            self.current_line
                .extend_from_slice(&self.buffer[self.buffer_pos..end]);
            self.buffer_pos = end + 1;
            self.consumed += newline_idx as u64 + 1;

            let offset = self.line_start;
            self.line_start = self.consumed;
            return Ok(BoundedLine::Line {
                offset,
                bytes: std::mem::take(&mut self.current_line),
            });
        }
    }
}

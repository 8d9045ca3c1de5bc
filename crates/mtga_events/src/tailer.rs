//! Line tailing with optional follow semantics.

use std::{
    fs::File,
    io::{Read, Seek, SeekFrom},
    path::Path,
    thread,
    time::Duration,
};

use tracing::{debug, trace, warn};

use crate::{
    config::TailConfig,
    error::TailError,
    reader::{BoundedLine, SyncBoundedLineReader},
};

/// Opens `path` and tails it with default limits.
pub fn tail(path: impl AsRef<Path>, from_start: bool, follow: bool) -> Result<Tailer, TailError> {
    let config = TailConfig::new(path.as_ref())
        .from_start(from_start)
        .follow(follow);
    Tailer::open(&config)
}

/// Produces the lines of a log file, one at a time.
///
/// Without `follow` the sequence ends once the file is drained. With `follow`
/// the tailer polls at `poll_interval` for appended data and only ever ends
/// on a fatal error. Polling is used instead of filesystem notifications so
/// that behaviour is identical across platforms.
pub struct Tailer<R: Read + Seek = File> {
    reader: SyncBoundedLineReader<R>,
    follow: bool,
    poll_interval: Duration,
    done: bool,
}

impl Tailer<File> {
    pub fn open(config: &TailConfig) -> Result<Self, TailError> {
        let file = File::open(&config.path).map_err(|source| TailError::Open {
            path: config.path.clone(),
            source,
        })?;
        debug!(
            path = %config.path.display(),
            from_start = config.from_start,
            follow = config.follow,
            "opened log file"
        );
        Self::from_reader(file, config)
    }
}

impl<R: Read + Seek> Tailer<R> {
    pub fn from_reader(mut reader: R, config: &TailConfig) -> Result<Self, TailError> {
        let start = if config.from_start {
            SeekFrom::Start(0)
        } else {
            SeekFrom::End(0)
        };
        let start_offset = reader
            .seek(start)
            .map_err(|source| TailError::Seek { source })?;

        Ok(Self {
            reader: SyncBoundedLineReader::new(reader, config.limits.max_line_bytes, start_offset),
            follow: config.follow,
            poll_interval: config.poll_interval(),
            done: false,
        })
    }

    /// Offset just past the last byte read from the source.
    pub fn position(&self) -> u64 {
        self.reader.position()
    }

    /// Returns the next line, blocking in follow mode until one is available.
    ///
    /// `Ok(None)` marks the end of a non-follow stream. After an error or the
    /// end of the stream every further call returns `Ok(None)`.
    pub fn next_line(&mut self) -> Result<Option<String>, TailError> {
        if self.done {
            return Ok(None);
        }

        loop {
            let next = match self.reader.next_line() {
                Ok(next) => next,
                Err(source) => {
                    self.done = true;
                    return Err(TailError::Read {
                        offset: self.reader.position(),
                        source,
                    });
                }
            };

            match next {
                BoundedLine::Line { offset, bytes } => {
                    return Ok(Some(decode_line(offset, bytes)));
                }
                BoundedLine::LineTooLong {
                    offset,
                    observed_bytes,
                    max_line_bytes,
                } => {
                    self.done = true;
                    return Err(TailError::LineTooLong {
                        offset,
                        observed_bytes,
                        max_line_bytes,
                    });
                }
                BoundedLine::Eof if !self.follow => {
                    self.done = true;
                    return Ok(self
                        .reader
                        .take_partial()
                        .map(|(offset, bytes)| decode_line(offset, bytes)));
                }
                BoundedLine::Eof => {
                    let offset = self.reader.position();
                    trace!(offset, "end of log reached; waiting for more data");
                    thread::sleep(self.poll_interval);
                    if let Err(source) = self.reader.get_mut().seek(SeekFrom::Start(offset)) {
                        self.done = true;
                        return Err(TailError::Seek { source });
                    }
                }
            }
        }
    }
}

impl<R: Read + Seek> Iterator for Tailer<R> {
    type Item = Result<String, TailError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_line().transpose()
    }
}

fn decode_line(offset: u64, bytes: Vec<u8>) -> String {
    let mut line = match String::from_utf8(bytes) {
        Ok(line) => line,
        Err(err) => {
            warn!(offset, "line is not valid UTF-8; replacing invalid sequences");
            String::from_utf8_lossy(err.as_bytes()).into_owned()
        }
    };
    if line.ends_with('\r') {
        line.pop();
    }
    line
}

#[cfg(test)]
mod tests {
    use std::{
        fs::OpenOptions,
        io::{Cursor, Write},
        time::Instant,
    };

    use super::*;

    fn config(from_start: bool, follow: bool) -> TailConfig {
        let mut config = TailConfig::new("unused").from_start(from_start).follow(follow);
        config.poll_interval_ms = 10;
        config
    }

    fn drain<R: Read + Seek>(tailer: Tailer<R>) -> Vec<String> {
        tailer.map(|line| line.unwrap()).collect()
    }

    #[test]
    fn reads_whole_file_from_start() {
        let data = Cursor::new(b"first\r\nsecond\n\nlast".to_vec());
        let tailer = Tailer::from_reader(data, &config(true, false)).unwrap();

        assert_eq!(drain(tailer), vec!["first", "second", "", "last"]);
    }

    #[test]
    fn starts_at_end_unless_from_start() {
        let data = Cursor::new(b"old line\n".to_vec());
        let tailer = Tailer::from_reader(data, &config(false, false)).unwrap();

        assert_eq!(tailer.position(), 9);
        assert!(drain(tailer).is_empty());
    }

    #[test]
    fn missing_file_is_an_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = tail(dir.path().join("absent.log"), true, false).err().unwrap();

        assert!(matches!(err, TailError::Open { .. }));
    }

    #[test]
    fn too_long_line_stops_the_tailer() {
        let mut bytes = b"short\n".to_vec();
        bytes.extend_from_slice(&[b'x'; 64]);
        bytes.extend_from_slice(b"\nafter\n");

        let mut config = config(true, false);
        config.limits.max_line_bytes = 32;
        let mut tailer = Tailer::from_reader(Cursor::new(bytes), &config).unwrap();

        assert_eq!(tailer.next_line().unwrap().as_deref(), Some("short"));
        assert!(matches!(
            tailer.next_line(),
            Err(TailError::LineTooLong {
                offset: 6,
                max_line_bytes: 32,
                ..
            })
        ));
        assert!(tailer.next_line().unwrap().is_none());
    }

    #[test]
    fn follow_mode_waits_for_appended_lines() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "existing\n").unwrap();

        let mut tail_config = config(false, true);
        tail_config.path = file.path().to_path_buf();
        let mut tailer = Tailer::open(&tail_config).unwrap();

        let path = file.path().to_path_buf();
        let writer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            let mut out = OpenOptions::new().append(true).open(&path).unwrap();
            out.write_all(b"appen").unwrap();
            out.flush().unwrap();
            thread::sleep(Duration::from_millis(50));
            out.write_all(b"ded\n").unwrap();
        });

        let started = Instant::now();
        let line = tailer.next_line().unwrap();
        writer.join().unwrap();

        assert_eq!(line.as_deref(), Some("appended"));
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn non_follow_mode_terminates_at_end_of_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "only\n").unwrap();

        let mut tailer = tail(file.path(), true, false).unwrap();

        assert_eq!(tailer.next_line().unwrap().as_deref(), Some("only"));
        assert!(tailer.next_line().unwrap().is_none());
        assert!(tailer.next().is_none());
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let data = Cursor::new(b"ok \xff\n".to_vec());
        let tailer = Tailer::from_reader(data, &config(true, false)).unwrap();

        assert_eq!(drain(tailer), vec!["ok \u{fffd}"]);
    }
}

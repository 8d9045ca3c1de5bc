//! Stage wiring: tailer, framer, parser and dispatcher joined by bounded queues.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use tokio::{sync::mpsc, task};
use tracing::{debug, info, warn};

use crate::{
    block::{Block, ParsedEvent},
    block_parser::BlockParser,
    config::PipelineConfig,
    dispatcher::{DispatchOutcome, Dispatcher},
    error::{DropReporter, DropStage, PipelineError, TailError},
    framer::BlockFramer,
    session::SessionState,
    tailer::Tailer,
};

/// Counters collected while the pipeline ran.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub lines: u64,
    pub blocks: u64,
    /// Open blocks discarded because a new header arrived first.
    pub superseded_blocks: u64,
    pub events: u64,
    /// Blocks that matched no layout or carried no payload.
    pub skipped_blocks: u64,
    /// Blocks rejected with a parse error.
    pub dropped_blocks: u64,
    /// Events whose payload was not valid JSON.
    pub dropped_events: u64,
    pub handler_failures: u64,
    pub session: SessionState,
}

/// Live view of a running pipeline, obtained from [`Pipeline::progress`].
#[derive(Debug, Clone, Default)]
pub struct PipelineProgress {
    lines: Arc<AtomicU64>,
}

impl PipelineProgress {
    /// Lines the tailer has handed to the framer so far.
    pub fn lines(&self) -> u64 {
        self.lines.load(Ordering::Relaxed)
    }
}

/// The four-stage event pipeline.
///
/// Each stage runs on its own task and hands units to the next through a
/// bounded queue of `queue_capacity`, so a slow consumer throttles the stages
/// in front of it. The tailer blocks on file reads and therefore runs on the
/// blocking pool. Once the tailer stops the remaining stages drain whatever is
/// queued and finish in order.
pub struct Pipeline {
    config: PipelineConfig,
    parser: BlockParser,
    dispatcher: Dispatcher,
    progress: PipelineProgress,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, dispatcher: Dispatcher) -> Self {
        Self {
            config,
            parser: BlockParser::default(),
            dispatcher,
            progress: PipelineProgress::default(),
        }
    }

    pub fn with_parser(mut self, parser: BlockParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn progress(&self) -> PipelineProgress {
        self.progress.clone()
    }

    /// Runs until the log is drained (or forever when following).
    ///
    /// Opening the log happens before any stage is spawned so a missing file
    /// is reported immediately. A fatal tail error is returned only after the
    /// units queued ahead of it have been processed.
    pub async fn run(self) -> Result<PipelineReport, PipelineError> {
        let Self {
            config,
            parser,
            dispatcher,
            progress,
        } = self;
        config.validate()?;
        let tailer = Tailer::open(&config.tail)?;
        let reporter = DropReporter::new(config.drop_sink.clone());
        let capacity = config.queue_capacity;
        info!(
            path = %config.tail.path.display(),
            follow = config.tail.follow,
            queue_capacity = capacity,
            handlers = dispatcher.handler_count(),
            "starting event pipeline"
        );

        let (line_tx, line_rx) = mpsc::channel(capacity);
        let (block_tx, block_rx) = mpsc::channel(capacity);
        let (event_tx, event_rx) = mpsc::channel(capacity);

        let tail_task = task::spawn_blocking(move || tail_stage(tailer, line_tx, progress));
        let frame_task = tokio::spawn(frame_stage(line_rx, block_tx));
        let parse_task = tokio::spawn(parse_stage(parser, block_rx, event_tx, reporter.clone()));
        let dispatch_task = tokio::spawn(dispatch_stage(dispatcher, event_rx, reporter));

        let tailed = tail_task.await?;
        let framed = frame_task.await?;
        let parsed = parse_task.await?;
        let dispatched = dispatch_task.await?;

        let report = PipelineReport {
            lines: tailed.lines,
            blocks: framed.blocks,
            superseded_blocks: framed.superseded,
            events: parsed.events,
            skipped_blocks: parsed.skipped,
            dropped_blocks: parsed.dropped,
            dropped_events: dispatched.dropped,
            handler_failures: dispatched.handler_failures,
            session: dispatched.session,
        };
        info!(
            lines = report.lines,
            blocks = report.blocks,
            events = report.events,
            dispatched = report.session.dispatched(),
            duplicates = report.session.duplicates(),
            dropped_blocks = report.dropped_blocks,
            dropped_events = report.dropped_events,
            "event pipeline finished"
        );

        match tailed.error {
            Some(err) => Err(err.into()),
            None => Ok(report),
        }
    }
}

struct TailStats {
    lines: u64,
    error: Option<TailError>,
}

fn tail_stage(
    mut tailer: Tailer,
    lines: mpsc::Sender<String>,
    progress: PipelineProgress,
) -> TailStats {
    let mut stats = TailStats {
        lines: 0,
        error: None,
    };
    loop {
        match tailer.next_line() {
            Ok(Some(line)) => {
                if lines.blocking_send(line).is_err() {
                    debug!("framer stopped; tailer exiting");
                    break;
                }
                stats.lines += 1;
                progress.lines.fetch_add(1, Ordering::Relaxed);
            }
            Ok(None) => break,
            Err(err) => {
                warn!(error = %err, "tailer stopped");
                stats.error = Some(err);
                break;
            }
        }
    }
    stats
}

struct FrameStats {
    blocks: u64,
    superseded: u64,
}

async fn frame_stage(mut lines: mpsc::Receiver<String>, blocks: mpsc::Sender<Block>) -> FrameStats {
    let mut framer = BlockFramer::new();
    let mut emitted = 0;
    while let Some(line) = lines.recv().await {
        let Some(block) = framer.push_line(line) else {
            continue;
        };
        emitted += 1;
        if blocks.send(block).await.is_err() {
            debug!("parser stopped; framer exiting");
            break;
        }
    }
    if framer.is_collecting() {
        debug!("log ended inside an unterminated block");
    }
    FrameStats {
        blocks: emitted,
        superseded: framer.superseded(),
    }
}

struct ParseStats {
    events: u64,
    skipped: u64,
    dropped: u64,
}

async fn parse_stage(
    parser: BlockParser,
    mut blocks: mpsc::Receiver<Block>,
    events: mpsc::Sender<ParsedEvent>,
    reporter: DropReporter,
) -> ParseStats {
    let mut stats = ParseStats {
        events: 0,
        skipped: 0,
        dropped: 0,
    };
    while let Some(block) = blocks.recv().await {
        match parser.parse(&block) {
            Ok(Some(event)) => {
                stats.events += 1;
                if events.send(event).await.is_err() {
                    debug!("dispatcher stopped; parser exiting");
                    break;
                }
            }
            Ok(None) => stats.skipped += 1,
            Err(err) => {
                stats.dropped += 1;
                reporter.report(DropStage::Parse, &err, block.raw());
            }
        }
    }
    stats
}

struct DispatchStats {
    dropped: u64,
    handler_failures: u64,
    session: SessionState,
}

async fn dispatch_stage(
    mut dispatcher: Dispatcher,
    mut events: mpsc::Receiver<ParsedEvent>,
    reporter: DropReporter,
) -> DispatchStats {
    let mut dropped = 0;
    let mut handler_failures = 0;
    while let Some(event) = events.recv().await {
        let raw = event.json_payload.clone();
        match dispatcher.dispatch(event) {
            Ok(DispatchOutcome::Dispatched { handler_errors, .. }) => {
                for err in handler_errors {
                    handler_failures += 1;
                    reporter.report(DropStage::Handler, &err, raw.clone());
                }
            }
            Ok(DispatchOutcome::Duplicate) => {}
            Err(err) => {
                dropped += 1;
                reporter.report(DropStage::Payload, &err, raw);
            }
        }
    }
    DispatchStats {
        dropped,
        handler_failures,
        session: dispatcher.into_session(),
    }
}

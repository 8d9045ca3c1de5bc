use std::io::Write;

use mtga_events::{DispatchedEvent, EventHandler, HandlerError};

/// Writes every dispatched event as one JSON document per line.
pub struct JsonLines<W> {
    out: W,
}

impl<W: Write + Send> JsonLines<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    fn write_event(&mut self, event: &DispatchedEvent) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.out, event)?;
        self.out.write_all(b"\n")?;
        self.out.flush()
    }
}

impl<W: Write + Send> EventHandler for JsonLines<W> {
    fn name(&self) -> &'static str {
        "json-lines"
    }

    fn handle(&mut self, event: &DispatchedEvent) -> Result<(), HandlerError> {
        self.write_event(event)
            .map_err(|err| HandlerError::new(self.name(), &event.title, err))
    }
}

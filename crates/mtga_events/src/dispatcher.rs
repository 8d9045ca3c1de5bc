use serde_json::Value;
use tracing::{debug, trace};

use crate::{
    block::ParsedEvent,
    error::{HandlerError, PayloadError},
    handler::EventHandler,
    normalized::DispatchedEvent,
    session::SessionState,
};

#[derive(Debug)]
pub enum DispatchOutcome {
    Dispatched {
        event: DispatchedEvent,
        /// Failures of individual handlers; the event still counts as dispatched.
        handler_errors: Vec<HandlerError>,
    },
    /// Payload identical to the previous event's; nothing was dispatched.
    Duplicate,
}

/// Final pipeline stage: JSON decoding, deduplication, identity tracking and
/// hand-off to business collaborators.
///
/// With no handlers attached the dispatcher is a pass-through that still
/// decodes, deduplicates and tracks identity.
#[derive(Default)]
pub struct Dispatcher {
    session: SessionState,
    handlers: Vec<Box<dyn EventHandler>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler(mut self, handler: impl EventHandler + 'static) -> Self {
        self.add_handler(Box::new(handler));
        self
    }

    pub fn add_handler(&mut self, handler: Box<dyn EventHandler>) {
        debug!(handler = handler.name(), "attached event handler");
        self.handlers.push(handler);
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn into_session(self) -> SessionState {
        self.session
    }

    pub fn dispatch(&mut self, event: ParsedEvent) -> Result<DispatchOutcome, PayloadError> {
        let document: Value = serde_json::from_str(&event.json_payload).map_err(|source| {
            PayloadError::InvalidJson {
                title: event.title.clone(),
                source,
            }
        })?;

        if self.session.is_repeat(&event.json_payload) {
            debug!(title = %event.title, "skipping repeated payload");
            self.session.record_duplicate();
            return Ok(DispatchOutcome::Duplicate);
        }

        if let Some(client_id) = client_id(&document) {
            if self.session.update_player_id(client_id) {
                debug!(%client_id, "player identity changed");
            }
        }

        let dispatched = DispatchedEvent::from_parsed(&event, document);
        self.session.remember_payload(event.json_payload);

        let mut handler_errors = Vec::new();
        for handler in &mut self.handlers {
            trace!(handler = handler.name(), title = %dispatched.title, "handing off event");
            if let Err(err) = handler.handle(&dispatched) {
                handler_errors.push(err);
            }
        }
        self.session.record_dispatched();

        Ok(DispatchOutcome::Dispatched {
            event: dispatched,
            handler_errors,
        })
    }
}

fn client_id(document: &Value) -> Option<&str> {
    document
        .get("authenticateResponse")?
        .get("clientId")?
        .as_str()
}

use crate::{error::HandlerError, normalized::DispatchedEvent};

/// Business-logic collaborator that receives every dispatched event.
///
/// Handlers run on the dispatcher's task, one event at a time and in log
/// order. A returned error is reported and the next event is processed as
/// usual.
pub trait EventHandler: Send {
    fn name(&self) -> &'static str;

    fn handle(&mut self, event: &DispatchedEvent) -> Result<(), HandlerError>;
}

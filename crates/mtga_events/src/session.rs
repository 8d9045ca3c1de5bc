/// State accumulated by the dispatcher over the life of the process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    last_payload: Option<String>,
    player_id: Option<String>,
    dispatched: u64,
    duplicates: u64,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw payload of the last event that parsed successfully.
    pub fn last_payload(&self) -> Option<&str> {
        self.last_payload.as_deref()
    }

    /// Client id from the most recent authentication response.
    pub fn player_id(&self) -> Option<&str> {
        self.player_id.as_deref()
    }

    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }

    pub(crate) fn is_repeat(&self, payload: &str) -> bool {
        self.last_payload.as_deref() == Some(payload)
    }

    pub(crate) fn remember_payload(&mut self, payload: String) {
        self.last_payload = Some(payload);
    }

    /// Returns `true` when the stored id changed.
    pub(crate) fn update_player_id(&mut self, client_id: &str) -> bool {
        if self.player_id.as_deref() == Some(client_id) {
            return false;
        }
        self.player_id = Some(client_id.to_string());
        true
    }

    pub(crate) fn record_dispatched(&mut self) {
        self.dispatched += 1;
    }

    pub(crate) fn record_duplicate(&mut self) {
        self.duplicates += 1;
    }
}

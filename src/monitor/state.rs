use serde::Serialize;
use std::fmt;

/// Lifecycle phase of one stream monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MonitorState {
    /// Not yet started
    Idle,
    /// Obtaining a playable URL for the location
    Resolving,
    /// Opening a capture handle on the resolved URL
    Connected,
    /// Reading frames and evaluating every Kth one
    Sampling,
    /// Capture released; waiting before resolving again
    ReconnectBackoff,
    /// Terminated by an unrecoverable error
    Failed,
    /// Terminated by a stop request
    Stopped,
}

impl MonitorState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MonitorState::Failed | MonitorState::Stopped)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorState::Idle => "IDLE",
            MonitorState::Resolving => "RESOLVING",
            MonitorState::Connected => "CONNECTED",
            MonitorState::Sampling => "SAMPLING",
            MonitorState::ReconnectBackoff => "RECONNECT_BACKOFF",
            MonitorState::Failed => "FAILED",
            MonitorState::Stopped => "STOPPED",
        }
    }
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

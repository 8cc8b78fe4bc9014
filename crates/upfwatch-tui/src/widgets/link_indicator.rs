//! Connectivity indicator: ●/◐/○ with color mapping.

use ratatui::style::Style;
use ratatui::text::Span;
use upfwatch_core::{ConnectionState, ConnectionStatus};

use crate::theme;

/// What the status bar says about live delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    /// Push frames are arriving.
    Live,
    /// First push handshake in flight.
    Connecting,
    /// Push dropped; a reconnect is scheduled or running.
    Retrying,
    /// Push disabled or could not be created; data comes from polling.
    PollingOnly,
}

impl Link {
    /// `connected` is the read model's flag; `status` is the supervisor's
    /// push-side view.
    pub fn classify(connected: bool, status: &ConnectionStatus) -> Self {
        if connected {
            return Self::Live;
        }
        if !status.push_available || status.push_attempts == 0 {
            return Self::PollingOnly;
        }
        match status.state {
            ConnectionState::Connected => Self::Live,
            ConnectionState::Connecting if status.push_attempts == 1 => Self::Connecting,
            ConnectionState::Connecting
            | ConnectionState::Disconnected
            | ConnectionState::Erroring => Self::Retrying,
        }
    }

    pub fn span(self) -> Span<'static> {
        let (text, color) = match self {
            Self::Live => ("● live", theme::HEALTHY),
            Self::Connecting => ("◐ connecting", theme::WARN),
            Self::Retrying => ("◐ reconnecting", theme::WARN),
            Self::PollingOnly => ("○ polling", theme::DEGRADED),
        };
        Span::styled(text, Style::default().fg(color))
    }
}

//! All possible UI actions. Actions are the sole mechanism for state mutation.

use std::sync::Arc;

use upfwatch_core::{ConnectionStatus, FaultRequest, MetricsView};

/// Notification severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Warning,
    Error,
}

/// A transient status-bar message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub level: NotificationLevel,
}

impl Notification {
    pub fn success(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
            level: NotificationLevel::Success,
        }
    }

    pub fn warning(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
            level: NotificationLevel::Warning,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
            level: NotificationLevel::Error,
        }
    }
}

/// Every state transition in the TUI is expressed as an Action.
#[derive(Debug, Clone)]
pub enum Action {
    // ── Lifecycle ──────────────────────────────────────────────────
    Quit,
    Tick,
    Render,

    // ── Data Events (from the data bridge) ────────────────────────
    MetricsUpdated(Arc<MetricsView>),
    StatusChanged(ConnectionStatus),

    // ── Commands ──────────────────────────────────────────────────
    InjectFault(FaultRequest),

    // ── Overlays ──────────────────────────────────────────────────
    ToggleHelp,
    Notify(Notification),
}

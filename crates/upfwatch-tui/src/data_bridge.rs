//! Data bridge: connects the metrics store and supervisor status to TUI actions.
//!
//! Runs as a background task: forwards every new [`MetricsView`] and every
//! push-channel status change as an [`Action`] through the TUI's action
//! channel until cancelled.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use upfwatch_core::{ConnectionStatus, MetricsView};

use crate::action::Action;

pub async fn spawn_data_bridge(
    mut views: watch::Receiver<Arc<MetricsView>>,
    mut status: watch::Receiver<ConnectionStatus>,
    action_tx: mpsc::UnboundedSender<Action>,
    cancel: CancellationToken,
) {
    // Push initial snapshots so the screen has data immediately
    let view = Arc::clone(&views.borrow_and_update());
    let _ = action_tx.send(Action::MetricsUpdated(view));
    let current = status.borrow_and_update().clone();
    let _ = action_tx.send(Action::StatusChanged(current));

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => break,

            Ok(()) = views.changed() => {
                let view = Arc::clone(&views.borrow_and_update());
                if action_tx.send(Action::MetricsUpdated(view)).is_err() {
                    break;
                }
            }
            Ok(()) = status.changed() => {
                let current = status.borrow_and_update().clone();
                if action_tx.send(Action::StatusChanged(current)).is_err() {
                    break;
                }
            }
            else => break,
        }
    }

    debug!("data bridge shut down");
}

//! Terminal input and frame pacing for the dashboard loop.
//!
//! One background task merges three sources into a single queue: key
//! presses and resizes from crossterm's `EventStream`, a slow tick that
//! expires status-bar notifications, and a fast render tick. Metrics updates do not come through here; the
//! data bridge feeds them into the action queue directly.

use std::time::Duration;

use crossterm::event::{Event as CrosstermEvent, EventStream, KeyEvent, KeyEventKind};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub enum Event {
    /// Key press. Repeats and releases are filtered out.
    Key(KeyEvent),
    /// The next frame is drawn at the new size; nothing else changes.
    Resize,
    Tick,
    Render,
}

pub struct EventReader {
    rx: mpsc::UnboundedReceiver<Event>,
    cancel: CancellationToken,
}

impl EventReader {
    /// Start reading. `tick` paces housekeeping, `render` paces frames.
    pub fn new(tick: Duration, render: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        tokio::spawn(read_events(tx, tick, render, cancel.clone()));
        Self { rx, cancel }
    }

    /// `None` once the reader task has exited.
    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for EventReader {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// A stalled loop gets one tick, not a burst of catch-up ticks.
fn pacer(period: Duration) -> Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

fn translate(event: CrosstermEvent) -> Option<Event> {
    match event {
        CrosstermEvent::Key(key) if key.kind == KeyEventKind::Press => Some(Event::Key(key)),
        CrosstermEvent::Resize(..) => Some(Event::Resize),
        _ => None,
    }
}

async fn read_events(
    tx: mpsc::UnboundedSender<Event>,
    tick: Duration,
    render: Duration,
    cancel: CancellationToken,
) {
    let mut terminal = EventStream::new();
    let mut tick = pacer(tick);
    let mut render = pacer(render);

    loop {
        let event = tokio::select! {
            () = cancel.cancelled() => break,
            _ = tick.tick() => Event::Tick,
            _ = render.tick() => Event::Render,
            Some(Ok(raw)) = terminal.next() => match translate(raw) {
                Some(event) => event,
                None => continue,
            },
        };

        // Receiver gone: the app loop has ended.
        if tx.send(event).is_err() {
            break;
        }
    }
    tracing::debug!("event reader stopped");
}

//! Application core: event loop, action dispatch, status bar.

use std::sync::Arc;
use std::time::{Duration, Instant};

use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Paragraph},
};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use upfwatch_core::{
    ChartConfig, ConnectionStatus, CoreError, FaultRequest, MetricsClient, MetricsView,
    Supervisor,
};

use crate::action::{Action, Notification, NotificationLevel};
use crate::component::Component;
use crate::data_bridge::spawn_data_bridge;
use crate::event::{Event, EventReader};
use crate::screens::DashboardScreen;
use crate::theme;
use crate::tui::Tui;
use crate::widgets::link_indicator::Link;
use crate::widgets::rate_fmt;

/// How long a notification stays in the status bar.
const NOTIFICATION_TTL: Duration = Duration::from_secs(5);

/// What the inject-fault key sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultSettings {
    pub fault_type: String,
    pub count: u32,
}

/// Top-level application state and event loop.
pub struct App {
    screen: Box<dyn Component>,
    running: bool,
    help_visible: bool,
    /// Latest read model, for the status bar.
    view: Arc<MetricsView>,
    /// Latest push-side status, for the status bar.
    status: ConnectionStatus,
    last_update: Option<Instant>,
    notification: Option<(Notification, Instant)>,
    client: MetricsClient,
    views: watch::Receiver<Arc<MetricsView>>,
    status_rx: watch::Receiver<ConnectionStatus>,
    action_tx: mpsc::UnboundedSender<Action>,
    action_rx: mpsc::UnboundedReceiver<Action>,
}

impl App {
    pub fn new(
        supervisor: &Supervisor,
        client: MetricsClient,
        chart: ChartConfig,
        fault: FaultSettings,
    ) -> Self {
        let (action_tx, action_rx) = mpsc::unbounded_channel();

        Self {
            screen: Box::new(DashboardScreen::new(chart, fault)),
            running: true,
            help_visible: false,
            view: Arc::new(MetricsView::default()),
            status: ConnectionStatus::default(),
            last_update: None,
            notification: None,
            client,
            views: supervisor.store().subscribe(),
            status_rx: supervisor.status(),
            action_tx,
            action_rx,
        }
    }

    /// Run the main event loop until the user quits.
    pub async fn run(&mut self) -> Result<()> {
        let mut tui = Tui::enter()?;

        let bridge_cancel = CancellationToken::new();
        let bridge = tokio::spawn(spawn_data_bridge(
            self.views.clone(),
            self.status_rx.clone(),
            self.action_tx.clone(),
            bridge_cancel.clone(),
        ));

        let mut events = EventReader::new(
            Duration::from_millis(250), // 4 Hz tick
            Duration::from_millis(33),  // ~30 FPS render
        );

        info!("TUI event loop started");

        while self.running {
            // 1. Wait for the next terminal event
            let Some(event) = events.next().await else {
                break;
            };
            self.handle_event(event)?;

            // 2. Drain and process all queued actions, bridge updates included
            while let Ok(action) = self.action_rx.try_recv() {
                self.process_action(&action)?;

                if let Action::Render = action {
                    tui.draw(|frame| self.render(frame))?;
                }
            }
        }

        events.stop();
        bridge_cancel.cancel();
        if let Err(e) = bridge.await {
            warn!(error = %e, "data bridge ended abnormally");
        }
        info!("TUI event loop ended");
        Ok(())
    }

    fn handle_event(&mut self, event: Event) -> Result<()> {
        let action = match event {
            Event::Key(key) => self.handle_key_event(key)?,
            Event::Tick => Some(Action::Tick),
            Event::Render | Event::Resize => Some(Action::Render),
        };
        if let Some(action) = action {
            self.action_tx.send(action)?;
        }
        Ok(())
    }

    /// Map a key event to an action. Global keys are handled here;
    /// everything else is delegated to the screen.
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        if self.help_visible {
            return match key.code {
                KeyCode::Esc | KeyCode::Char('?') => Ok(Some(Action::ToggleHelp)),
                _ => Ok(None),
            };
        }

        match (key.modifiers, key.code) {
            (KeyModifiers::CONTROL, KeyCode::Char('c'))
            | (KeyModifiers::NONE, KeyCode::Char('q')) => Ok(Some(Action::Quit)),
            (KeyModifiers::NONE, KeyCode::Char('?')) => Ok(Some(Action::ToggleHelp)),
            _ => self.screen.handle_key_event(key),
        }
    }

    /// Process a single action: update app state, then propagate to the screen.
    fn process_action(&mut self, action: &Action) -> Result<()> {
        match action {
            Action::Quit => {
                self.running = false;
            }

            Action::ToggleHelp => {
                self.help_visible = !self.help_visible;
            }

            Action::Tick => {
                if self
                    .notification
                    .as_ref()
                    .is_some_and(|(_, shown)| shown.elapsed() >= NOTIFICATION_TTL)
                {
                    self.notification = None;
                }
            }

            Action::StatusChanged(status) => {
                debug!(state = %status.state, attempts = status.push_attempts, "push status");
                self.status = status.clone();
            }

            Action::Notify(notification) => {
                self.notification = Some((notification.clone(), Instant::now()));
            }

            Action::InjectFault(request) => {
                self.spawn_fault_injection(request.clone());
            }

            Action::MetricsUpdated(view) => {
                let traffic_changed = match (&view.metrics, &self.view.metrics) {
                    (Some(next), Some(prev)) => !Arc::ptr_eq(next, prev),
                    (next, _) => next.is_some(),
                };
                if traffic_changed {
                    self.last_update = Some(Instant::now());
                }
                self.view = Arc::clone(view);
                self.forward(action)?;
            }

            Action::Render => {}
        }

        Ok(())
    }

    fn forward(&mut self, action: &Action) -> Result<()> {
        if let Some(follow_up) = self.screen.update(action)? {
            self.action_tx.send(follow_up)?;
        }
        Ok(())
    }

    /// Fire the request in the background; the outcome comes back as a
    /// notification.
    fn spawn_fault_injection(&self, request: FaultRequest) {
        let client = self.client.clone();
        let action_tx = self.action_tx.clone();
        info!(
            fault = %request.fault_type,
            target = %request.target,
            count = request.count,
            "injecting fault"
        );
        tokio::spawn(async move {
            let error = client.inject_fault(&request).await.err().map(CoreError::from);
            if let Some(ref e) = error {
                warn!(error = %e, "fault injection failed");
            }
            let notification = fault_notification(&request, error.as_ref());
            let _ = action_tx.send(Action::Notify(notification));
        });
    }

    // ── Rendering ────────────────────────────────────────────────────

    fn render(&self, frame: &mut Frame) {
        let area = frame.area();
        let [content, status] =
            Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).areas(area);

        self.screen.render(frame, content);
        self.render_status_bar(frame, status);

        if self.help_visible {
            render_help_overlay(frame, area);
        }
    }

    /// Connectivity indicator, ingestion error, data age, and key hints.
    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        let mut spans = vec![
            Span::raw(" "),
            Link::classify(self.view.connected, &self.status).span(),
        ];

        if let Some(ref error) = self.view.error {
            spans.push(Span::styled(
                format!("  {error}"),
                Style::default().fg(theme::FAULT),
            ));
        }

        if let Some(updated) = self.last_update {
            spans.push(Span::styled(
                format!("  updated {} ago", rate_fmt::fmt_age(updated.elapsed())),
                theme::key_hint(),
            ));
        }

        if let Some((ref notification, _)) = self.notification {
            let color = match notification.level {
                NotificationLevel::Success => theme::HEALTHY,
                NotificationLevel::Warning => theme::WARN,
                NotificationLevel::Error => theme::FAULT,
            };
            spans.push(Span::styled(
                format!("  {}", notification.message),
                Style::default().fg(color),
            ));
        }

        spans.push(Span::styled(" │ f fault  ? help  q quit", theme::key_hint()));

        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }
}

fn fault_notification(request: &FaultRequest, error: Option<&CoreError>) -> Notification {
    match error {
        None => Notification::success(format!(
            "Injected {} × {} on TEID {}",
            request.count, request.fault_type, request.target
        )),
        Some(e) => Notification::error(format!("Failed to inject fault: {e}")),
    }
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let help_width = 44u16.min(area.width.saturating_sub(4));
    let help_height = 10u16.min(area.height.saturating_sub(4));
    let help_area = Rect::new(
        area.x + area.width.saturating_sub(help_width) / 2,
        area.y + area.height.saturating_sub(help_height) / 2,
        help_width,
        help_height,
    );

    frame.render_widget(Clear, help_area);
    let block = Block::default()
        .title(" Keyboard Shortcuts ")
        .title_style(theme::title_style())
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(theme::border_focused())
        .style(Style::default().bg(theme::OVERLAY_BG));

    let entry = |key: &'static str, what: &'static str| {
        Line::from(vec![
            Span::styled(format!("  {key:<10}"), theme::key_hint_key()),
            Span::styled(what, theme::key_hint()),
        ])
    };

    let help_text = vec![
        Line::from(""),
        entry("f", "Inject fault on first session"),
        entry("?", "This help"),
        entry("q", "Quit"),
        entry("Ctrl+c", "Quit"),
        Line::from(""),
        Line::from(Span::styled("  Esc or ? to close", theme::key_hint())),
    ];

    frame.render_widget(Paragraph::new(help_text).block(block), help_area);
}

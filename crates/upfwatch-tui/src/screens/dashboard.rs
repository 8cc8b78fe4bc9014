//! Dashboard screen: live throughput chart, direction counters, drop
//! summary, and the session table.

use std::sync::Arc;
use std::time::Instant;

use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{Axis, Block, BorderType, Borders, Cell, Chart, Dataset, GraphType, Paragraph, Row, Table},
};

use upfwatch_core::{
    ChartConfig, ChartData, ChartSeries, DirectionStats, DropDirection, FaultRequest, MetricsView,
    SessionInfo, TrafficChart, TrafficSnapshot,
};

use crate::action::{Action, Notification};
use crate::app::FaultSettings;
use crate::component::Component;
use crate::theme;
use crate::widgets::rate_fmt;

const TOP_REASONS: usize = 5;

pub struct DashboardScreen {
    view: Arc<MetricsView>,
    chart: TrafficChart,
    fault: FaultSettings,
}

impl DashboardScreen {
    pub fn new(chart: ChartConfig, fault: FaultSettings) -> Self {
        Self {
            view: Arc::new(MetricsView::default()),
            chart: TrafficChart::new(chart),
            fault,
        }
    }

    /// Take a new read model. Only a changed traffic snapshot is offered
    /// to the chart, so connectivity-only updates do not add samples.
    fn ingest(&mut self, view: Arc<MetricsView>, now: Instant) {
        if let Some(traffic) = view.metrics.as_deref() {
            let seen = self
                .view
                .metrics
                .as_deref()
                .is_some_and(|prev| std::ptr::eq(prev, traffic));
            if !seen {
                self.chart.record(traffic, now);
            }
        }
        self.view = view;
    }

    /// Fault aimed at the first session that has a TEID.
    fn fault_request(&self) -> Option<FaultRequest> {
        let teid = self
            .view
            .sessions
            .iter()
            .find_map(|s| s.teids.first())?;
        Some(FaultRequest {
            fault_type: self.fault.fault_type.clone(),
            target: teid.clone(),
            count: self.fault.count,
        })
    }

    // ── Panels ───────────────────────────────────────────────────────

    fn render_direction_card(
        &self,
        frame: &mut Frame,
        area: Rect,
        title: &'static str,
        color: Color,
        pick: fn(&TrafficSnapshot) -> &DirectionStats,
    ) {
        let block = Block::default()
            .title(Span::styled(title, theme::title_style()))
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme::border_default());

        let lines = match self.view.metrics.as_deref() {
            Some(traffic) => {
                let stats = pick(traffic);
                let total = traffic.uplink.bytes.saturating_add(traffic.downlink.bytes);
                vec![
                    Line::from(Span::styled(
                        rate_fmt::fmt_throughput(stats.rate_mbps()),
                        Style::default().fg(color).add_modifier(Modifier::BOLD),
                    )),
                    Line::from(vec![
                        Span::styled("pkts ", theme::key_hint()),
                        Span::styled(rate_fmt::fmt_count(stats.packets), theme::table_row()),
                        Span::styled("  bytes ", theme::key_hint()),
                        Span::styled(rate_fmt::fmt_bytes(stats.bytes), theme::table_row()),
                    ]),
                    Line::from(Span::styled(
                        format!("{} of total  {}", share(stats.bytes, total), stamp(stats)),
                        theme::key_hint(),
                    )),
                ]
            }
            None => vec![Line::from(Span::styled("—", theme::key_hint()))],
        };

        frame.render_widget(Paragraph::new(lines).block(block), area);
    }

    fn render_drop_card(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .title(Span::styled(" Drops ", theme::title_style()))
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme::border_default());

        let lines = match self.view.drops.as_deref() {
            Some(drops) => {
                let rate_color = if drops.rate() > 1.0 {
                    theme::FAULT
                } else if drops.rate() > 0.1 {
                    theme::WARN
                } else {
                    theme::HEALTHY
                };
                vec![
                    Line::from(Span::styled(
                        format!("{:.3}%", drops.rate()),
                        Style::default().fg(rate_color).add_modifier(Modifier::BOLD),
                    )),
                    Line::from(vec![
                        Span::styled("total ", theme::key_hint()),
                        Span::styled(rate_fmt::fmt_count(drops.total), theme::table_row()),
                    ]),
                ]
            }
            None => vec![Line::from(Span::styled("—", theme::key_hint()))],
        };

        frame.render_widget(Paragraph::new(lines).block(block), area);
    }

    fn render_traffic_chart(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .title(Span::styled(" Throughput ", theme::title_style()))
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme::border_default());

        let ChartData::Ready(series) = self.chart.chart_data() else {
            let inner = block.inner(area);
            frame.render_widget(block, area);
            frame.render_widget(
                Paragraph::new("  Collecting data…").style(Style::default().fg(theme::MUTED)),
                inner,
            );
            return;
        };

        let (uplink, downlink) = series_points(&series);
        let x_max = uplink.last().map_or(1.0, |&(x, _)| x).max(1.0);
        let [_, y_max] = series.domain;

        let datasets = vec![
            Dataset::default()
                .name("UL")
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(theme::UPLINK))
                .data(&uplink),
            Dataset::default()
                .name("DL")
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(theme::DOWNLINK))
                .data(&downlink),
        ];

        let y_labels = vec![
            Span::styled("0", theme::key_hint()),
            Span::styled(rate_fmt::fmt_axis(y_max / 2.0), theme::key_hint()),
            Span::styled(rate_fmt::fmt_axis(y_max), theme::key_hint()),
        ];

        let chart = Chart::new(datasets)
            .block(block)
            .x_axis(
                Axis::default()
                    .bounds([0.0, x_max])
                    .style(Style::default().fg(theme::MUTED)),
            )
            .y_axis(
                Axis::default()
                    .title(Span::styled(series.unit.to_string(), theme::key_hint()))
                    .bounds([0.0, y_max])
                    .labels(y_labels)
                    .style(Style::default().fg(theme::MUTED)),
            );

        frame.render_widget(chart, area);
    }

    fn render_drop_panel(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .title(Span::styled(" Drop Alerts ", theme::title_style()))
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme::border_default());

        let Some(drops) = self.view.drops.as_deref() else {
            frame.render_widget(
                Paragraph::new(Span::styled("  No drop data", theme::key_hint())).block(block),
                area,
            );
            return;
        };

        let mut lines = vec![Line::from(Span::styled(
            "By reason",
            Style::default().fg(theme::ACCENT),
        ))];
        for (reason, count) in drops.top_reasons(TOP_REASONS) {
            lines.push(Line::from(vec![
                Span::styled(format!("  {reason:<24}"), theme::table_row()),
                Span::styled(
                    format!("{} ({})", rate_fmt::fmt_count(count), share(count, drops.total)),
                    theme::key_hint(),
                ),
            ]));
        }

        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Recent",
            Style::default().fg(theme::ACCENT),
        )));
        if drops.recent.is_empty() {
            lines.push(Line::from(Span::styled("  none", theme::key_hint())));
        }
        for event in &drops.recent {
            let dir = match event.direction {
                DropDirection::Uplink => Span::styled("UL ", Style::default().fg(theme::UPLINK)),
                DropDirection::Downlink => {
                    Span::styled("DL ", Style::default().fg(theme::DOWNLINK))
                }
                DropDirection::Unknown => Span::styled("?? ", theme::key_hint()),
            };
            lines.push(Line::from(vec![
                Span::raw("  "),
                dir,
                Span::styled(format!("{:<20}", event.reason), theme::table_row()),
                Span::styled(
                    format!(
                        "teid {}  {}",
                        event.teid,
                        rate_fmt::fmt_pkt_len(event.pkt_len)
                    ),
                    theme::key_hint(),
                ),
            ]));
        }

        frame.render_widget(Paragraph::new(lines).block(block), area);
    }

    fn render_sessions(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .title(Span::styled(
                format!(" Sessions ({}) ", self.view.sessions.len()),
                theme::title_style(),
            ))
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme::border_default());

        let header = Row::new(["SEID", "UE IP", "TEIDs", "DNN", "UL", "DL", "Status"])
            .style(theme::table_header());
        let rows: Vec<Row> = self.view.sessions.iter().map(session_row).collect();

        let widths = [
            Constraint::Length(18),
            Constraint::Length(16),
            Constraint::Min(12),
            Constraint::Length(10),
            Constraint::Length(10),
            Constraint::Length(10),
            Constraint::Length(8),
        ];

        let table = Table::new(rows, widths).header(header).block(block);
        frame.render_widget(table, area);
    }
}

impl Component for DashboardScreen {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        match (key.modifiers, key.code) {
            (KeyModifiers::NONE, KeyCode::Char('f')) => Ok(Some(match self.fault_request() {
                Some(request) => Action::InjectFault(request),
                None => Action::Notify(Notification::warning("No session with a TEID to target")),
            })),
            _ => Ok(None),
        }
    }

    fn update(&mut self, action: &Action) -> Result<Option<Action>> {
        if let Action::MetricsUpdated(view) = action {
            self.ingest(Arc::clone(view), Instant::now());
        }
        Ok(None)
    }

    fn render(&self, frame: &mut Frame, area: Rect) {
        let [cards, chart, bottom] = Layout::vertical([
            Constraint::Length(5),
            Constraint::Min(10),
            Constraint::Min(8),
        ])
        .areas(area);

        let [up, down, drops] = Layout::horizontal([Constraint::Ratio(1, 3); 3]).areas(cards);
        self.render_direction_card(frame, up, " Uplink ↑ ", theme::UPLINK, |t| &t.uplink);
        self.render_direction_card(frame, down, " Downlink ↓ ", theme::DOWNLINK, |t| {
            &t.downlink
        });
        self.render_drop_card(frame, drops);

        self.render_traffic_chart(frame, chart);

        let [drop_panel, sessions] =
            Layout::horizontal([Constraint::Percentage(40), Constraint::Percentage(60)])
                .areas(bottom);
        self.render_drop_panel(frame, drop_panel);
        self.render_sessions(frame, sessions);
    }
}

/// `(seconds since first sample, value)` pairs for each direction.
fn series_points(series: &ChartSeries) -> (Vec<(f64, f64)>, Vec<(f64, f64)>) {
    let Some(origin) = series.samples.first().map(|s| s.at) else {
        return (Vec::new(), Vec::new());
    };
    series
        .samples
        .iter()
        .map(|s| {
            let x = s.at.saturating_duration_since(origin).as_secs_f64();
            ((x, s.uplink), (x, s.downlink))
        })
        .unzip()
}

/// `part` as a percentage of `total`; an even split when nothing is known.
#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
fn share(part: u64, total: u64) -> String {
    if total == 0 {
        return "50.0%".into();
    }
    format!("{:.1}%", part as f64 / total as f64 * 100.0)
}

/// Backend-side time of a direction's counters.
fn stamp(stats: &DirectionStats) -> String {
    stats.last_updated_at().map_or_else(
        || "as of —".into(),
        |at| format!("as of {} UTC", at.format("%H:%M:%S")),
    )
}

fn session_row(session: &SessionInfo) -> Row<'static> {
    let status_color = if session.status.eq_ignore_ascii_case("active") {
        theme::HEALTHY
    } else {
        theme::WARN
    };
    Row::new(vec![
        Cell::from(session.seid.clone()),
        Cell::from(session.ue_ip.clone()),
        Cell::from(session.teids.join(",")),
        Cell::from(session.dnn.clone().unwrap_or_else(|| "-".into())),
        Cell::from(rate_fmt::fmt_bytes(session.bytes_ul)),
        Cell::from(rate_fmt::fmt_bytes(session.bytes_dl)),
        Cell::from(session.status.clone()).style(Style::default().fg(status_color)),
    ])
    .style(theme::table_row())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use upfwatch_core::ThroughputUnit;

    use super::*;

    fn screen() -> DashboardScreen {
        DashboardScreen::new(
            ChartConfig::default(),
            FaultSettings {
                fault_type: "invalid_teid".into(),
                count: 5,
            },
        )
    }

    fn traffic(mbps: f64) -> Arc<TrafficSnapshot> {
        let stats = DirectionStats {
            throughput_mbps: mbps,
            ..DirectionStats::default()
        };
        Arc::new(TrafficSnapshot {
            uplink: stats.clone(),
            downlink: stats,
        })
    }

    fn view_with(metrics: Option<Arc<TrafficSnapshot>>, sessions: Vec<SessionInfo>) -> Arc<MetricsView> {
        Arc::new(MetricsView {
            metrics,
            sessions: Arc::new(sessions),
            ..MetricsView::default()
        })
    }

    fn press(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    #[test]
    fn only_new_traffic_snapshots_reach_the_chart() {
        let mut dash = screen();
        let t0 = Instant::now();
        let snapshot = traffic(5.0);

        dash.ingest(view_with(Some(Arc::clone(&snapshot)), Vec::new()), t0);
        // Same Arc again (e.g., a connectivity-only update) adds nothing.
        dash.ingest(
            view_with(Some(Arc::clone(&snapshot)), Vec::new()),
            t0 + Duration::from_secs(2),
        );
        assert_eq!(dash.chart.buffer().len(), 1);

        dash.ingest(view_with(Some(traffic(6.0)), Vec::new()), t0 + Duration::from_secs(4));
        assert_eq!(dash.chart.buffer().len(), 2);
        assert_eq!(dash.chart.unit(), ThroughputUnit::Mbps);
    }

    #[test]
    fn fault_key_targets_first_session_teid() {
        let mut dash = screen();
        let sessions = vec![
            SessionInfo {
                seid: "0x1".into(),
                ..SessionInfo::default()
            },
            SessionInfo {
                seid: "0x2".into(),
                teids: vec!["0x00000abc".into(), "0x00000abd".into()],
                ..SessionInfo::default()
            },
        ];
        dash.ingest(view_with(None, sessions), Instant::now());

        let action = dash.handle_key_event(press('f')).unwrap();
        let Some(Action::InjectFault(request)) = action else {
            panic!("expected InjectFault, got {action:?}");
        };
        assert_eq!(
            request,
            FaultRequest {
                fault_type: "invalid_teid".into(),
                target: "0x00000abc".into(),
                count: 5,
            }
        );
    }

    #[test]
    fn fault_key_without_sessions_warns() {
        let mut dash = screen();
        let action = dash.handle_key_event(press('f')).unwrap();
        assert!(matches!(action, Some(Action::Notify(_))));
    }

    #[test]
    fn stamp_reads_backend_timestamp() {
        let stats = DirectionStats {
            last_updated: "2025-11-29T16:22:12+01:00".into(),
            ..DirectionStats::default()
        };
        assert_eq!(stamp(&stats), "as of 15:22:12 UTC");
        assert_eq!(stamp(&DirectionStats::default()), "as of —");
    }

    #[test]
    fn share_handles_empty_total() {
        assert_eq!(share(0, 0), "50.0%");
        assert_eq!(share(1, 4), "25.0%");
    }
}

//! Rolling throughput window and the scale derived from it.
//!
//! [`TrafficChart`] is the single write path: it throttles incoming traffic
//! snapshots, lets the [`ScaleSelector`] pick a display unit with
//! hysteresis, and appends a [`Sample`] to the bounded [`SampleBuffer`].
//! [`TrafficChart::chart_data`] then hands presentation a finished series
//! plus a `[0, ceiling]` axis domain, or [`ChartData::Insufficient`].
//!
//! Every sample keeps the unit it was recorded in alongside the raw Mbps
//! reading. When the unit changes the window is revalued from the raw
//! readings on read, so old points and the axis always agree.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use upfwatch_api::TrafficSnapshot;

use crate::config::ChartConfig;

/// Lowest max value the axis is ever derived from.
const EPSILON: f64 = 0.001;

// ── ThroughputUnit ───────────────────────────────────────────────────

/// Display unit for throughput values. Raw values always arrive in Mbps.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
pub enum ThroughputUnit {
    #[default]
    Kbps,
    Mbps,
    Gbps,
}

/// Hysteresis thresholds between two adjacent units, in raw Mbps.
#[derive(Debug, Clone, Copy)]
struct Boundary {
    /// Switch to the coarser unit when the current peak exceeds this.
    rise_above: f64,
    /// Switch to the finer unit when the current peak is below this...
    fall_below: f64,
    /// ...and every buffered sample is below this.
    window_below: f64,
}

const KBPS_MBPS: Boundary = Boundary {
    rise_above: 0.1,
    fall_below: 0.01,
    window_below: 0.1,
};

const MBPS_GBPS: Boundary = Boundary {
    rise_above: 1000.0,
    fall_below: 100.0,
    window_below: 1000.0,
};

impl ThroughputUnit {
    /// Multiplier applied to a raw Mbps value.
    pub fn scale(self) -> f64 {
        match self {
            Self::Kbps => 1000.0,
            Self::Mbps => 1.0,
            Self::Gbps => 0.001,
        }
    }

    /// Convert a raw Mbps value into this unit, rounded to 4 decimals.
    pub fn from_mbps(self, mbps: f64) -> f64 {
        round4(mbps * self.scale())
    }

    /// Convert a value expressed in this unit back to raw Mbps.
    pub fn to_mbps(self, value: f64) -> f64 {
        value / self.scale()
    }

    fn coarser(self) -> Option<(Boundary, Self)> {
        match self {
            Self::Kbps => Some((KBPS_MBPS, Self::Mbps)),
            Self::Mbps => Some((MBPS_GBPS, Self::Gbps)),
            Self::Gbps => None,
        }
    }

    fn finer(self) -> Option<(Boundary, Self)> {
        match self {
            Self::Kbps => None,
            Self::Mbps => Some((KBPS_MBPS, Self::Kbps)),
            Self::Gbps => Some((MBPS_GBPS, Self::Mbps)),
        }
    }

    /// "Nice" axis ceiling for a max value in this unit.
    ///
    /// Walks a fixed staircase, then rounds up to a coarse multiple past the
    /// last step. Non-decreasing in `max`.
    pub fn ceiling(self, max: f64) -> f64 {
        const KBPS_STEPS: &[(f64, f64)] = &[
            (0.1, 0.5),
            (0.5, 1.0),
            (1.0, 2.0),
            (2.0, 5.0),
            (5.0, 10.0),
            (10.0, 20.0),
            (20.0, 50.0),
            (50.0, 100.0),
            (100.0, 200.0),
            (200.0, 500.0),
            (500.0, 1000.0),
        ];
        const NICE_STEPS: &[(f64, f64)] = &[
            (0.1, 0.1),
            (0.5, 0.5),
            (1.0, 1.0),
            (2.0, 2.0),
            (5.0, 5.0),
            (10.0, 10.0),
            (20.0, 20.0),
            (50.0, 50.0),
            (100.0, 100.0),
        ];

        let (steps, tail) = match self {
            Self::Kbps => (KBPS_STEPS, 500.0),
            Self::Mbps => (NICE_STEPS, 50.0),
            Self::Gbps => (NICE_STEPS, 100.0),
        };

        let max = if max.is_finite() { max.max(EPSILON) } else { EPSILON };
        steps
            .iter()
            .find(|(limit, _)| max <= *limit)
            .map_or_else(|| (max / tail).ceil() * tail, |(_, ceiling)| *ceiling)
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

// ── Sample ───────────────────────────────────────────────────────────

/// One point of the rolling window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub at: Instant,
    pub uplink: f64,
    pub downlink: f64,
    /// Unit `uplink` and `downlink` are denominated in.
    pub unit: ThroughputUnit,
    uplink_mbps: f64,
    downlink_mbps: f64,
}

impl Sample {
    /// Record raw Mbps readings in `unit`.
    pub fn record(at: Instant, uplink_mbps: f64, downlink_mbps: f64, unit: ThroughputUnit) -> Self {
        Self {
            at,
            uplink: unit.from_mbps(uplink_mbps),
            downlink: unit.from_mbps(downlink_mbps),
            unit,
            uplink_mbps,
            downlink_mbps,
        }
    }

    /// Larger of the two channels, in raw Mbps.
    pub fn peak_mbps(&self) -> f64 {
        self.uplink_mbps.max(self.downlink_mbps)
    }

    /// The same reading expressed in `unit`.
    pub fn in_unit(&self, unit: ThroughputUnit) -> Self {
        if unit == self.unit {
            return *self;
        }
        Self::record(self.at, self.uplink_mbps, self.downlink_mbps, unit)
    }
}

// ── SampleBuffer ─────────────────────────────────────────────────────

/// Fixed-capacity FIFO of samples; the oldest is evicted on overflow.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl SampleBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: Sample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    /// True when every buffered sample peaks below `limit_mbps`.
    pub fn all_below_mbps(&self, limit_mbps: f64) -> bool {
        self.samples.iter().all(|s| s.peak_mbps() < limit_mbps)
    }
}

// ── ScaleSelector ────────────────────────────────────────────────────

/// Schmitt-trigger unit selection over the three-tier ladder.
#[derive(Debug, Clone, Default)]
pub struct ScaleSelector {
    unit: ThroughputUnit,
}

impl ScaleSelector {
    pub fn new(initial: ThroughputUnit) -> Self {
        Self { unit: initial }
    }

    pub fn unit(&self) -> ThroughputUnit {
        self.unit
    }

    /// Re-evaluate the unit for a new reading.
    ///
    /// `peak_mbps` is the larger raw direction of the incoming reading;
    /// `window` is the buffer as it stands before that reading is added.
    /// Peaks inside a dead zone leave the unit alone.
    pub fn select(&mut self, peak_mbps: f64, window: &SampleBuffer) -> ThroughputUnit {
        let start = self.unit;

        while let Some((boundary, coarser)) = self.unit.coarser() {
            if peak_mbps > boundary.rise_above {
                self.unit = coarser;
            } else {
                break;
            }
        }

        if self.unit == start {
            while let Some((boundary, finer)) = self.unit.finer() {
                if peak_mbps < boundary.fall_below && window.all_below_mbps(boundary.window_below) {
                    self.unit = finer;
                } else {
                    break;
                }
            }
        }

        if self.unit != start {
            tracing::debug!(from = %start, to = %self.unit, peak_mbps, "chart unit switched");
        }
        self.unit
    }

    /// Axis domain `[0, ceiling]` for already-revalued samples.
    pub fn domain<'a>(&self, samples: impl IntoIterator<Item = &'a Sample>) -> [f64; 2] {
        let max = samples
            .into_iter()
            .map(|s| s.uplink.max(s.downlink))
            .fold(EPSILON, f64::max);
        [0.0, self.unit.ceiling(max)]
    }
}

// ── TrafficChart ─────────────────────────────────────────────────────

/// Chart-ready view of the rolling window.
#[derive(Debug, Clone, PartialEq)]
pub enum ChartData {
    /// Fewer than two samples: render a loading affordance.
    Insufficient,
    Ready(ChartSeries),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    /// Oldest first, all in `unit`.
    pub samples: Vec<Sample>,
    pub unit: ThroughputUnit,
    pub domain: [f64; 2],
}

/// Throttled recorder for the throughput chart.
#[derive(Debug, Clone)]
pub struct TrafficChart {
    buffer: SampleBuffer,
    selector: ScaleSelector,
    throttle: Duration,
    last_accepted: Option<Instant>,
}

impl TrafficChart {
    pub fn new(config: ChartConfig) -> Self {
        Self {
            buffer: SampleBuffer::new(config.capacity),
            selector: ScaleSelector::default(),
            throttle: config.throttle,
            last_accepted: None,
        }
    }

    /// Offer a traffic snapshot observed at `now`.
    ///
    /// Returns `false` when it lands within the throttle window of the last
    /// accepted sample and was dropped.
    pub fn record(&mut self, traffic: &TrafficSnapshot, now: Instant) -> bool {
        if let Some(last) = self.last_accepted {
            if now.saturating_duration_since(last) < self.throttle {
                return false;
            }
        }

        let unit = self.selector.select(traffic.peak_mbps(), &self.buffer);
        let sample = Sample::record(
            now,
            traffic.uplink.rate_mbps(),
            traffic.downlink.rate_mbps(),
            unit,
        );
        self.buffer.push(sample);
        self.last_accepted = Some(now);
        true
    }

    pub fn unit(&self) -> ThroughputUnit {
        self.selector.unit()
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    pub fn chart_data(&self) -> ChartData {
        if self.buffer.len() < 2 {
            return ChartData::Insufficient;
        }

        let unit = self.selector.unit();
        let samples: Vec<Sample> = self.buffer.iter().map(|s| s.in_unit(unit)).collect();
        let domain = self.selector.domain(&samples);

        ChartData::Ready(ChartSeries {
            samples,
            unit,
            domain,
        })
    }
}

impl Default for TrafficChart {
    fn default() -> Self {
        Self::new(ChartConfig::default())
    }
}

// ── Tests ────────────────────────────────────────────────────────────

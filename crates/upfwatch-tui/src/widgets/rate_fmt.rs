//! Human-readable throughput, count, and duration formatting helpers.

use std::time::Duration;

use bytesize::ByteSize;

/// Format a raw Mbps reading with an adaptive unit
/// (e.g., "1.50 Gbps", "12.34 Mbps", "250 Kbps").
pub fn fmt_throughput(mbps: f64) -> String {
    let mbps = if mbps.is_finite() { mbps.max(0.0) } else { 0.0 };
    if mbps >= 1000.0 {
        format!("{:.2} Gbps", mbps / 1000.0)
    } else if mbps >= 1.0 {
        format!("{mbps:.2} Mbps")
    } else {
        format!("{:.0} Kbps", mbps * 1000.0)
    }
}

/// Format a counter compactly (e.g., "1.2M", "3.4K", "17").
#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
pub fn fmt_count(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

/// Format a byte total (decimal units).
pub fn fmt_bytes(bytes: u64) -> String {
    ByteSize::b(bytes).to_string()
}

/// Format a packet length (e.g., "1.5 KB", "64 B").
#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
pub fn fmt_pkt_len(len: u64) -> String {
    if len >= 1024 {
        format!("{:.1} KB", len as f64 / 1024.0)
    } else {
        format!("{len} B")
    }
}

/// Axis tick label: at most two decimals, no trailing zeros.
pub fn fmt_axis(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    format!("{rounded}")
}

/// Whole-second age (e.g., "3s", "1m 5s").
pub fn fmt_age(elapsed: Duration) -> String {
    humantime::format_duration(Duration::from_secs(elapsed.as_secs())).to_string()
}

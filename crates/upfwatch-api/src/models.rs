// Backend wire types
//
// Models for the UPF telemetry backend's JSON payloads, shared by the REST
// pull endpoints and the websocket push frames. Fields use `#[serde(default)]`
// liberally and `null` containers decode to empty ones, so nothing downstream
// ever has to null-check or do arithmetic on a missing value.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use strum::Display;

/// Decode `null` (or a missing field, combined with `#[serde(default)]`)
/// as `T::default()`.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ── Traffic ──────────────────────────────────────────────────────────

/// Counters and instantaneous rate for one traffic direction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectionStats {
    #[serde(default, deserialize_with = "null_as_default")]
    pub packets: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub bytes: u64,
    /// Raw throughput as reported by the backend, in Mbps.
    #[serde(default, deserialize_with = "null_as_default")]
    pub throughput_mbps: f64,
    /// RFC3339 timestamp of the last counter update (empty when unknown).
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_updated: String,
}

impl DirectionStats {
    /// Throughput in Mbps, with negative or non-finite readings read as zero.
    pub fn rate_mbps(&self) -> f64 {
        if self.throughput_mbps.is_finite() && self.throughput_mbps > 0.0 {
            self.throughput_mbps
        } else {
            0.0
        }
    }

    /// Parsed `last_updated`, if it is a valid RFC3339 timestamp.
    pub fn last_updated_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.last_updated)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

/// Per-direction traffic counters. Superseded wholesale by the next snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrafficSnapshot {
    #[serde(default, deserialize_with = "null_as_default")]
    pub uplink: DirectionStats,
    #[serde(default, deserialize_with = "null_as_default")]
    pub downlink: DirectionStats,
}

impl TrafficSnapshot {
    /// The larger of the two direction rates, in Mbps.
    pub fn peak_mbps(&self) -> f64 {
        self.uplink.rate_mbps().max(self.downlink.rate_mbps())
    }
}

// ── Drops ────────────────────────────────────────────────────────────

/// Traffic direction of a dropped packet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DropDirection {
    Uplink,
    Downlink,
    #[default]
    #[serde(other)]
    Unknown,
}

/// A single packet-drop event reported by the datapath.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DropEvent {
    #[serde(default, deserialize_with = "null_as_default")]
    pub timestamp: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub teid: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub src_ip: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub dst_ip: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub reason: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub direction: DropDirection,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pkt_len: u64,
}

/// Aggregate drop accounting plus the most recent drop events.
///
/// `by_reason` keeps the backend's key order. The sum of its values is
/// expected (not enforced) to be at most `total`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DropSnapshot {
    #[serde(default, deserialize_with = "null_as_default")]
    pub total: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rate_percent: f64,
    #[serde(
        default,
        rename = "recent_drops",
        alias = "recent",
        deserialize_with = "null_as_default"
    )]
    pub recent: Vec<DropEvent>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub by_reason: IndexMap<String, u64>,
}

impl DropSnapshot {
    /// Drop rate clamped into `[0, 100]`.
    pub fn rate(&self) -> f64 {
        if self.rate_percent.is_finite() {
            self.rate_percent.clamp(0.0, 100.0)
        } else {
            0.0
        }
    }

    /// Reasons ordered by descending count (stable for equal counts).
    pub fn top_reasons(&self, limit: usize) -> Vec<(&str, u64)> {
        let mut reasons: Vec<(&str, u64)> = self
            .by_reason
            .iter()
            .map(|(reason, count)| (reason.as_str(), *count))
            .collect();
        reasons.sort_by(|a, b| b.1.cmp(&a.1));
        reasons.truncate(limit);
        reasons
    }
}

// ── Sessions ─────────────────────────────────────────────────────────

/// A PDU session as exposed by `/api/v1/sessions`.
///
/// Identifiers arrive as strings (`"0x1234"`) and timestamps as RFC3339.
/// The 5G identity and QoS fields are optional because the backend only
/// fills them for sessions it learned from the control plane.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    #[serde(default, deserialize_with = "null_as_default")]
    pub seid: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ue_ip: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub teids: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub packets_ul: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub packets_dl: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub bytes_ul: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub bytes_dl: u64,

    // 5G identity
    #[serde(default)]
    pub supi: Option<String>,
    #[serde(default)]
    pub dnn: Option<String>,
    #[serde(default)]
    pub s_nssai: Option<String>,
    #[serde(default)]
    pub qfi: Option<u8>,
    #[serde(default)]
    pub session_type: Option<String>,
    #[serde(default)]
    pub pdu_session_id: Option<u8>,

    // Node addresses
    #[serde(default)]
    pub upf_ip: Option<String>,
    #[serde(default)]
    pub gnb_ip: Option<String>,

    // QoS
    #[serde(default)]
    pub qos_5qi: Option<u16>,
    #[serde(default)]
    pub arp_priority: Option<u8>,
    #[serde(default)]
    pub gbr_ul_kbps: Option<u64>,
    #[serde(default)]
    pub gbr_dl_kbps: Option<u64>,
    #[serde(default)]
    pub mbr_ul_kbps: Option<u64>,
    #[serde(default)]
    pub mbr_dl_kbps: Option<u64>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub last_active: Option<String>,
}

/// Envelope returned by `/api/v1/sessions`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionList {
    #[serde(default, deserialize_with = "null_as_default")]
    pub total: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sessions: Vec<SessionInfo>,
}

// ── Push frames ──────────────────────────────────────────────────────

/// One text frame from the `/ws/metrics` push channel.
///
/// Every field is optional; unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushFrame {
    #[serde(default)]
    pub data: Option<PushData>,
}

/// Payload carried by a [`PushFrame`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushData {
    #[serde(default)]
    pub traffic: Option<TrafficSnapshot>,
    #[serde(default)]
    pub drops: Option<DropSnapshot>,
}

impl PushFrame {
    /// Decode a push text frame.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

// ── Misc endpoints ───────────────────────────────────────────────────

/// Response from `/api/v1/health`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub timestamp: String,
}

/// Body for `POST /api/v1/fault/inject`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultRequest {
    #[serde(rename = "type")]
    pub fault_type: String,
    pub target: String,
    pub count: u32,
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn drop_snapshot_null_containers_become_empty() {
        let json = r#"{ "total": 7, "rate_percent": 1.5, "recent_drops": null, "by_reason": null }"#;
        let drops: DropSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(drops.total, 7);
        assert!(drops.recent.is_empty());
        assert!(drops.by_reason.is_empty());
    }

    #[test]
    fn drop_snapshot_missing_containers_become_empty() {
        let drops: DropSnapshot = serde_json::from_str(r#"{ "total": 3 }"#).unwrap();
        assert!(drops.recent.is_empty());
        assert!(drops.by_reason.is_empty());
        assert_eq!(drops.rate(), 0.0);
    }

    #[test]
    fn drop_snapshot_accepts_recent_alias() {
        let json = r#"{ "total": 1, "recent": [{ "teid": "0x1a", "direction": "uplink" }] }"#;
        let drops: DropSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(drops.recent.len(), 1);
        assert_eq!(drops.recent[0].direction, DropDirection::Uplink);
    }

    #[test]
    fn unknown_drop_direction_does_not_fail_snapshot() {
        let json = r#"{ "total": 1, "recent_drops": [{ "direction": "sideways", "pkt_len": 64 }] }"#;
        let drops: DropSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(drops.recent[0].direction, DropDirection::Unknown);
        assert_eq!(drops.recent[0].pkt_len, 64);
    }

    #[test]
    fn top_reasons_sorted_by_count() {
        let json = r#"{ "total": 10, "by_reason": { "NO_PDR": 2, "INVALID_TEID": 5, "MTU": 3 } }"#;
        let drops: DropSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(
            drops.top_reasons(2),
            vec![("INVALID_TEID", 5), ("MTU", 3)]
        );
        // Wire order preserved in the map itself
        let keys: Vec<&str> = drops.by_reason.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["NO_PDR", "INVALID_TEID", "MTU"]);
    }

    #[test]
    fn direction_rate_ignores_garbage() {
        let stats = DirectionStats {
            throughput_mbps: -4.0,
            ..DirectionStats::default()
        };
        assert_eq!(stats.rate_mbps(), 0.0);

        let stats = DirectionStats {
            throughput_mbps: f64::NAN,
            ..DirectionStats::default()
        };
        assert_eq!(stats.rate_mbps(), 0.0);
    }

    #[test]
    fn traffic_snapshot_with_nulls() {
        let json = r#"{
            "uplink": { "packets": 10, "bytes": null, "throughput_mbps": 0.25, "last_updated": "2025-11-29T16:22:12Z" },
            "downlink": null
        }"#;
        let traffic: TrafficSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(traffic.uplink.packets, 10);
        assert_eq!(traffic.uplink.bytes, 0);
        assert_eq!(traffic.downlink, DirectionStats::default());
        assert!((traffic.peak_mbps() - 0.25).abs() < f64::EPSILON);
        assert!(traffic.uplink.last_updated_at().is_some());
        assert!(traffic.downlink.last_updated_at().is_none());
    }

    #[test]
    fn push_frame_ignores_unknown_fields() {
        let frame = PushFrame::parse(r#"{ "type": "metrics", "data": { "sessions": 4 } }"#).unwrap();
        let data = frame.data.unwrap();
        assert!(data.traffic.is_none());
        assert!(data.drops.is_none());

        let empty = PushFrame::parse("{}").unwrap();
        assert!(empty.data.is_none());
    }

    #[test]
    fn session_list_tolerates_null_sessions() {
        let list: SessionList = serde_json::from_str(r#"{ "total": 0, "sessions": null }"#).unwrap();
        assert!(list.sessions.is_empty());
    }

    #[test]
    fn session_info_optional_fields() {
        let json = r#"{
            "seid": "0x1234",
            "ue_ip": "10.60.0.1",
            "teids": ["0x1a", "0x1b"],
            "created_at": "2025-11-29T16:22:12Z",
            "packets_ul": 5,
            "packets_dl": 6,
            "bytes_ul": 500,
            "bytes_dl": 600,
            "supi": "imsi-208930000000001",
            "dnn": "internet",
            "qfi": 9,
            "qos_5qi": 9,
            "status": "active"
        }"#;
        let session: SessionInfo = serde_json::from_str(json).unwrap();
        assert_eq!(session.teids, vec!["0x1a".to_string(), "0x1b".to_string()]);
        assert_eq!(session.supi.as_deref(), Some("imsi-208930000000001"));
        assert_eq!(session.qfi, Some(9));
        assert!(session.gnb_ip.is_none());
    }

    #[test]
    fn fault_request_serializes_type_field() {
        let req = FaultRequest {
            fault_type: "invalid_teid".into(),
            target: "0x1a".into(),
            count: 3,
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["type"], "invalid_teid");
        assert_eq!(value["count"], 3);
    }
}

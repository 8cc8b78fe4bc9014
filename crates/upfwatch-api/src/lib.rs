// upfwatch-api: Async Rust client for the UPF telemetry backend (REST + websocket push)

pub mod client;
pub mod error;
pub mod models;
pub mod transport;
pub mod websocket;

pub use client::MetricsClient;
pub use error::Error;
pub use models::{
    DirectionStats, DropDirection, DropEvent, DropSnapshot, FaultRequest, HealthStatus, PushData,
    PushFrame, SessionInfo, SessionList, TrafficSnapshot,
};
pub use websocket::{ChannelEvent, PushChannel};

//! Reusable widgets and formatting helpers.

pub mod link_indicator;
pub mod rate_fmt;

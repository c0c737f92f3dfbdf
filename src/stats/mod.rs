//! Statistics for the streaming server

pub mod metrics;

pub use metrics::ServerStats;

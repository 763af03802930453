//! Monitoring status relay.
//!
//! Producers POST health events; the relay folds them into one rolled-up
//! `SystemStatus` and fans every change out to connected dashboards over
//! WebSocket. A background check marks the status `unknown` when the
//! producer goes quiet.

pub mod api;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod ingest;
pub mod staleness;
pub mod state;
pub mod types;

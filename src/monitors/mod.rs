//! Monitoring algorithms shared by agent and collector
//!
//! - [`rate`]: byte counters to bandwidth rates (agent)
//! - [`threshold`]: time-windowed bandwidth floors (agent)
//! - [`resources`]: per-metric alert evaluation (collector)

pub mod rate;
pub mod resources;
pub mod threshold;

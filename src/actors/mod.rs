//! Actor-based runtime of agent and collector
//!
//! Each actor runs as an independent async task and is driven through a
//! cloneable handle that sends commands over a Tokio channel.
//!
//! ## Architecture Overview
//!
//! ```text
//!  Agent                                   Collector
//!  ─────                                   ─────────
//!  ConfigWatcher ──watch──┐                POST /api/report
//!                         ▼                       │
//!                   ReporterActor ──HTTP──▶  NodeRegistry ◀── LivenessSweeper
//!                   (source, sampler,             │ NodeEvents      │
//!                    threshold)                   ▼                 │
//!                                          NotificationActor ◀──────┘
//!                                                 │
//!                                          Telegram / Discord / Webhook
//! ```
//!
//! ## Actor Types
//!
//! - **ReporterActor**: collects a reading every interval and sends it to the
//!   collector
//! - **ConfigWatcher**: republishes the agent config file when it changes
//! - **LivenessSweeper**: marks nodes offline that stopped reporting
//! - **NotificationActor**: delivers node events through the configured
//!   notifier, outside of the registry lock
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: each actor has an mpsc command channel for control messages
//! 2. **Events**: registry operations return `NodeEvent`s that are queued to
//!    the notification actor
//! 3. **Request/Response**: oneshot channels for synchronous queries

pub mod messages;
pub mod notifier;
pub mod reload;
pub mod reporter;
pub mod sweeper;

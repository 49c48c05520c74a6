//! # Narrator
//!
//! Ranked drill-down narratives over a hosted analytical dataset.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │          DrillRequest (dimensions, metric, depth)        │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [drill::key + drill::ranking]
//! ┌─────────────────────────────────────────────────────────┐
//! │          DAX queries (key bootstrap, ranking)            │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [executor / powerbi]
//! ┌─────────────────────────────────────────────────────────┐
//! │      Tables per level, keys threaded level to level      │
//! │                   (drill::iterator)                      │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [narrative]
//! ┌─────────────────────────────────────────────────────────┐
//! │           Narrative per level + summary                  │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [sink]
//! ┌─────────────────────────────────────────────────────────┐
//! │                Append-only run log                       │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod dax;
pub mod drill;
pub mod executor;
pub mod narrative;
pub mod pipeline;
pub mod powerbi;
pub mod sink;

//! Ranked drill-down over a dimension hierarchy.
//!
//! # Architecture
//!
//! ```text
//! DimensionList ──▶ compose_key ──▶ RankSpec::build ──▶ QueryExecutor
//!                                         ▲                  │
//!                                         │   KeySet (level i)│
//!                                         └──────────────────┘
//!                                    DrillIterator, one pass per
//!                                    adjacent dimension pair
//!                                                 │
//!                                                 ▼
//!                                            DrillReport
//! ```
//!
//! - [`key`] builds the composite-key expression identifying a group's path.
//! - [`ranking`] renders the per-level ranking queries (dynamic or directional).
//! - [`iterator`] threads each level's selected keys into the next level.
//!
//! # Example
//!
//! ```ignore
//! use narrator::drill::{DimensionList, DrillIterator, DrillRequest};
//! use narrator::dax::SortDir;
//!
//! let request = DrillRequest::new(DimensionList::new(["Geo[Region]", "Geo[Store]"]), "[Sales]", 3)
//!     .with_direction(SortDir::Desc)
//!     .with_metric("\"Sales\", [Sales]");
//! let report = DrillIterator::new(&client).run(&request).await?;
//! for entry in report.entries() {
//!     println!("{}", entry.render());
//! }
//! ```

mod dimensions;
mod error;
pub mod iterator;
pub mod key;
pub mod ranking;

pub use dimensions::{DimensionList, Transition};
pub use error::{DrillError, DrillResult};
pub use iterator::{
    single_level, DrillIterator, DrillReport, DrillRequest, FailurePolicy, LevelEntry,
    LevelOutcome, LevelResult,
};
pub use key::{compose_key, ComposedKey};
pub use ranking::{
    build_directional_ranking, build_dynamic_ranking, build_key_bootstrap, build_single_level,
    KeySet, RankDirection, RankSpec,
};

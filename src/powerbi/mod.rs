//! Hosted analytical service client.
//!
//! [`PowerBiClient`] implements [`crate::executor::QueryExecutor`] over the
//! `executeQueries` REST endpoint, authenticating as a service principal.

mod client;
pub mod protocol;

pub use client::PowerBiClient;

//! Resilient data synchronization for the VicCoin personal finance client.
//!
//! The crate records expenses, income and salaries against the VicCoin backend, reads them back,
//! and computes a financial summary that stays consistent even when the backend's does not. The
//! pieces, from the wire up:
//!
//! - [`api`]: the `Transport` seam, fallback chains, URL building and endpoint probing.
//! - [`normalize`]: caller records to wire records, and identifiers out of responses.
//! - [`gateway`]: create, list, update and report operations.
//! - [`aggregate`]: balance and totals.
//! - [`categories`]: locally persisted category labels.
//! - [`pipeline`]: sequences the above for a UI and keeps its state.

pub mod aggregate;
pub mod api;
pub mod args;
pub mod cache;
pub mod categories;
pub mod commands;
mod config;
mod error;
pub mod gateway;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod session;
mod utils;

#[cfg(test)]
mod test;

pub use api::Mode;
pub use config::{Config, TransportSettings};
pub use error::{Error, ErrorDetails, Result, SyncError};

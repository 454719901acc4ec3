//! Berth - local development environments on docker compose
//!
//! Discovers an app file, derives compose services from it and drives them
//! through a phased lifecycle (start, stop, rebuild, destroy) with cached
//! state and build locks between runs.

pub mod app;
pub mod bootstrap;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod orchestration;
pub mod ui;

pub use error::{BerthError, BerthResult};

//! Storage infrastructure for the collector.
//!
//! # Sub-modules
//!
//! - **`config`** – Loads the optional TOML configuration file (bind address,
//!   listen backlog, read chunk size, log level).  A missing file means
//!   defaults.

pub mod config;

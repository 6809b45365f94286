//! Client configuration persistence.

pub mod config;

//! # Uplift Common Library
//!
//! Shared code for the Uplift ingest tooling:
//! - Error types
//! - Database initialization and schema
//! - Configuration resolution

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};

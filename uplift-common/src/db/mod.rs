//! Database access shared across Uplift crates

pub mod init;

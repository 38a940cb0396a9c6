//! # Cytometry Common Library
//!
//! Shared code for the cytometry pipeline and the dashboard service:
//! - Schema Store (normalized SQLite schema, replace-load, read queries)
//! - Cell population vocabulary
//! - Configuration loading
//! - Common error type

pub mod config;
pub mod db;
pub mod error;

pub use db::{CytometryStore, PopulationVocabulary};
pub use error::{Error, Result};

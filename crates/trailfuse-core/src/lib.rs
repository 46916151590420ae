//! trailfuse core - ingestion and fusion of actor movement, speech and code data
//!
//! Raw tables flow strictly forward: time normalization, schema validation,
//! per-actor trajectory fusion and finally feature-preserving simplification.

pub mod config;
pub mod error;
pub mod formats;
pub mod fusion;
pub mod models;
pub mod ports;
pub mod schema;
pub mod simplify;
pub mod time;

pub use error::{Result, TrailError};

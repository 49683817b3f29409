//! carepath-core
//!
//! Pure domain types, object key conventions, and canonical content hashing.
//! No AWS SDK dependency; this is the shared vocabulary of the Carepath pipeline.

pub mod error;
pub mod hash;
pub mod keys;
pub mod models;

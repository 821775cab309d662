//! Output generation.
//!
//! - [`json`]: writes a [`crate::models::Digest`] to a dated JSON file

pub mod json;

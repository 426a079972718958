//! Core domain model for timbre.
//!
//! This crate defines the embedding categories, track and vector
//! identifiers, the vector metadata rows that tie index positions back to
//! tracks, and the SQLite schema that stores them.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod error;
pub mod model;
pub mod schema;

pub use error::{Error, Result};

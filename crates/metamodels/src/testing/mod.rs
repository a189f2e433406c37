//! Test support: deterministic synthetic inputs.
//!
//! Used by unit tests, integration tests and doc examples. Nothing in here is
//! part of the evaluation protocol itself.

pub mod data;

//! Table I/O.
//!
//! This module provides the loader for ARFF files, the format the OpenML
//! performance and meta-feature exports are distributed in.

pub mod arff;

mod error;

pub use arff::{parse_arff, read_arff, ArffAttribute, ArffFrame, ArffType, ArffValue};
pub use error::DatasetLoadError;

//! Surrogate configuration with builder pattern.
//!
//! [`LinearConfig`] and [`ForestConfig`] use the `bon` crate for builder
//! generation; `build()` validates the result.
//!
//! # Example
//!
//! ```
//! use metamodels::model::{ForestConfig, LinearConfig};
//!
//! let linear = LinearConfig::builder().build().unwrap();
//! let forest = ForestConfig::builder().n_trees(16).max_depth(12).seed(7).build().unwrap();
//! assert_eq!(forest.n_trees, 16);
//! ```

use bon::Builder;

// =============================================================================
// ConfigError
// =============================================================================

/// Errors that can occur during configuration validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// Number of trees must be at least 1.
    #[error("n_trees must be at least 1")]
    InvalidNTrees,

    /// A ratio outside (0, 1].
    #[error("{field} must be in (0, 1], got {value}")]
    InvalidRatio { field: &'static str, value: f64 },

    /// A parameter that must be non-negative.
    #[error("{field} must be non-negative, got {value}")]
    Negative { field: &'static str, value: f64 },

    /// A count that must be at least `min`.
    #[error("{field} must be at least {min}, got {value}")]
    TooSmall {
        field: &'static str,
        min: usize,
        value: usize,
    },

    /// The precision window is larger than the pool it is taken from.
    #[error("precision_at_n ({n}) must not exceed precision_out_of_k ({k})")]
    WindowLargerThanPool { n: usize, k: usize },
}

// =============================================================================
// LinearConfig
// =============================================================================

/// Configuration of the closed-form least-squares surrogate.
#[derive(Debug, Clone, Builder)]
#[builder(
    derive(Clone, Debug),
    finish_fn(vis = "", name = __build_internal)
)]
pub struct LinearConfig {
    /// Ridge penalty on standardized coefficients, relative to the number of
    /// rows. Default: `1e-8`, just enough to keep collinear designs solvable.
    #[builder(default = 1e-8)]
    pub l2: f64,
}

impl<S: linear_config_builder::IsComplete> LinearConfigBuilder<S> {
    /// Build and validate the configuration.
    pub fn build(self) -> Result<LinearConfig, ConfigError> {
        let config = self.__build_internal();
        config.validate()?;
        Ok(config)
    }
}

impl LinearConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.l2 >= 0.0) {
            return Err(ConfigError::Negative {
                field: "l2",
                value: self.l2,
            });
        }
        Ok(())
    }
}

impl Default for LinearConfig {
    fn default() -> Self {
        Self { l2: 1e-8 }
    }
}

// =============================================================================
// ForestConfig
// =============================================================================

/// Configuration of the random forest surrogate.
#[derive(Debug, Clone, Builder)]
#[builder(
    derive(Clone, Debug),
    finish_fn(vis = "", name = __build_internal)
)]
pub struct ForestConfig {
    /// Number of trees. Default: 16.
    #[builder(default = 16)]
    pub n_trees: usize,

    /// Maximum tree depth. `None` grows until leaves are pure or too small.
    pub max_depth: Option<usize>,

    /// Minimum number of samples required to split a node. Default: 2.
    #[builder(default = 2)]
    pub min_samples_split: usize,

    /// Minimum number of samples in each leaf. Default: 1.
    #[builder(default = 1)]
    pub min_samples_leaf: usize,

    /// Fraction of features considered at each split. Default: 1.0.
    #[builder(default = 1.0)]
    pub max_features: f64,

    /// Draw a bootstrap sample per tree. Default: true.
    #[builder(default = true)]
    pub bootstrap: bool,

    /// Random seed. Default: 0.
    #[builder(default = 0)]
    pub seed: u64,
}

impl<S: forest_config_builder::IsComplete> ForestConfigBuilder<S> {
    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// - `n_trees == 0`
    /// - `min_samples_split < 2` or `min_samples_leaf < 1`
    /// - `max_features` outside (0, 1]
    pub fn build(self) -> Result<ForestConfig, ConfigError> {
        let config = self.__build_internal();
        config.validate()?;
        Ok(config)
    }
}

impl ForestConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.n_trees == 0 {
            return Err(ConfigError::InvalidNTrees);
        }
        if self.min_samples_split < 2 {
            return Err(ConfigError::TooSmall {
                field: "min_samples_split",
                min: 2,
                value: self.min_samples_split,
            });
        }
        if self.min_samples_leaf < 1 {
            return Err(ConfigError::TooSmall {
                field: "min_samples_leaf",
                min: 1,
                value: self.min_samples_leaf,
            });
        }
        if !(self.max_features > 0.0 && self.max_features <= 1.0) {
            return Err(ConfigError::InvalidRatio {
                field: "max_features",
                value: self.max_features,
            });
        }
        Ok(())
    }

    /// Same configuration with a different seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 16,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: 1.0,
            bootstrap: true,
            seed: 0,
        }
    }
}

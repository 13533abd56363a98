//! Error types for the feature-analysis engine.
//!
//! Only configuration and execution faults live here. Numerical
//! degeneracies (division by zero, angles at a branch point) are *not*
//! errors: they propagate as IEEE-754 `NaN`/`±inf` through the feature
//! store.

use thiserror::Error;

/// Errors surfaced by the engine to its host.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Worker count must be at least 1.
    #[error("Invalid worker count: {0} (must be >= 1)")]
    InvalidWorkerCount(usize),

    /// A feature key was queried that no registered analyzer declares.
    #[error("Unknown feature key: {0}")]
    UnknownFeature(String),

    /// Two analyzers declared the same feature key.
    #[error("Feature key {key} already declared by analyzer {analyzer}")]
    DuplicateFeature { key: String, analyzer: String },

    /// An analyzer's declared dependency is not produced by any analyzer
    /// running earlier in rank order.
    #[error("Analyzer {analyzer} depends on feature {feature}, which no earlier analyzer produces")]
    UnsatisfiedDependency { analyzer: String, feature: String },

    /// An analyzer was handed an element id absent from the graph.
    #[error("Element not found in graph: {0}")]
    MissingElement(String),

    /// A worker thread panicked; reported after all workers joined.
    #[error("Worker thread panicked in analyzer {0}")]
    WorkerPanic(String),
}

impl EngineError {
    /// Creates an unknown-feature error.
    pub fn unknown_feature(key: impl Into<String>) -> Self {
        Self::UnknownFeature(key.into())
    }

    /// Creates a missing-element error.
    pub fn missing_element(id: impl std::fmt::Display) -> Self {
        Self::MissingElement(id.to_string())
    }
}

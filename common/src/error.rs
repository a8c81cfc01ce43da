//! Error handling for the remora-common crate.

use thiserror::Error;

/// Error raised while constructing or rewriting the IR, or while running one
/// of the built-in statistic transforms.
///
/// Every variant names the offending graph element so that a single
/// diagnostic is enough to locate the problem.
#[derive(Error, Debug)]
pub enum IrError {
    /// A property the caller must supply is absent from a vertex or edge.
    #[error("required property {kind} is missing on {element}")]
    MissingRequiredProperty { element: String, kind: String },

    /// An edge carries a communication pattern no component understands.
    #[error("unsupported communication pattern {pattern:?} on {element}")]
    UnsupportedCommunicationPattern { element: String, pattern: String },

    /// A permanently set property was assigned a second, different value.
    #[error("permanent property {kind} on {element} already holds a different value")]
    PermanentConflict { element: String, kind: String },

    /// An edge references a vertex that was never added to the builder.
    #[error("edge {edge} references unknown vertex {vertex}")]
    UnknownEndpoint { edge: String, vertex: String },

    /// The accumulated graph is not acyclic.
    #[error("cycle detected in the DAG through vertex {vertex}")]
    CycleDetected { vertex: String },

    /// A property value lies outside its kind's closed domain.
    #[error("invalid value for property {kind} on {element}: {reason}")]
    InvalidPropertyValue {
        element: String,
        kind: String,
        reason: String,
    },

    /// A configuration option lies outside its documented domain.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// Encoding or decoding of an element failed.
    #[error("data coding failed: {message}")]
    DataCoding {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },
}

/// Result type alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, IrError>;

impl IrError {
    pub fn missing_property(element: impl Into<String>, kind: impl Into<String>) -> Self {
        Self::MissingRequiredProperty {
            element: element.into(),
            kind: kind.into(),
        }
    }

    pub fn coding(message: impl Into<String>) -> Self {
        Self::DataCoding {
            message: message.into(),
            source: None,
        }
    }

    pub fn coding_with_source(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::DataCoding {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

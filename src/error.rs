//! Error handling for the zipora platform layer
//!
//! Only resource acquisition and configuration can fail at runtime. Misusing a
//! primitive outside its initialized lifetime is a programming error and panics
//! instead of producing one of these values.

use thiserror::Error;

/// Main error type for the platform layer
#[derive(Error, Debug)]
pub enum ZiporaError {
    /// I/O related errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The OS or the allocator could not supply a backing resource
    #[error("Resource exhausted: {resource}")]
    ResourceExhausted {
        /// Description of the resource that could not be obtained
        resource: String,
    },

    /// A worker thread terminated by panicking
    #[error("Worker thread '{name}' panicked")]
    WorkerPanicked {
        /// Name the worker was spawned with
        name: String,
    },

    /// A feature name outside the fixed capability table
    #[error("Unknown CPU feature: {name}")]
    UnknownFeature {
        /// The name that failed to parse
        name: String,
    },

    /// Configuration or parameter errors
    #[error("Invalid configuration: {message}")]
    Configuration {
        /// Configuration error message
        message: String,
    },
}

impl ZiporaError {
    /// Create a resource exhausted error
    pub fn resource_exhausted<S: Into<String>>(resource: S) -> Self {
        Self::ResourceExhausted {
            resource: resource.into(),
        }
    }

    /// Create a worker panicked error
    pub fn worker_panicked<S: Into<String>>(name: S) -> Self {
        Self::WorkerPanicked {
            name: name.into(),
        }
    }

    /// Create an unknown feature error
    pub fn unknown_feature<S: Into<String>>(name: S) -> Self {
        Self::UnknownFeature {
            name: name.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Build a resource exhausted error from a pthread return code
    pub fn from_os_code(resource: &str, code: i32) -> Self {
        let os = std::io::Error::from_raw_os_error(code);
        Self::resource_exhausted(format!("{}: {}", resource, os))
    }

    /// Check if this is a recoverable error
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io(_) => true,
            Self::ResourceExhausted { .. } => true,
            Self::WorkerPanicked { .. } => false,
            Self::UnknownFeature { .. } => false,
            Self::Configuration { .. } => false,
        }
    }

    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::ResourceExhausted { .. } => "resource",
            Self::WorkerPanicked { .. } => "worker",
            Self::UnknownFeature { .. } => "feature",
            Self::Configuration { .. } => "config",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ZiporaError>;

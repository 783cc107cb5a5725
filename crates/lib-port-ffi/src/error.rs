//! Error types for estimator port FFI operations.

use lib_types::LifecycleState;
use thiserror::Error;

/// Errors that can occur while loading or driving an estimator port.
#[derive(Debug, Error)]
pub enum PortError {
    /// The module file does not exist.
    #[error("Estimator module not found: '{path}'")]
    ModuleNotFound { path: String },

    /// The dynamic loader rejected the module.
    #[error("Failed to load estimator module '{path}': {source}")]
    LoadError {
        path: String,
        #[source]
        source: libloading::Error,
    },

    /// Required entry point not exported by the module.
    #[error("Symbol '{symbol}' not found in '{path}'")]
    SymbolNotFound { symbol: String, path: String },

    /// A lifecycle operation was invoked out of order.
    #[error("Cannot {operation} an estimator port in state '{state}'")]
    SequenceViolation {
        operation: &'static str,
        state: LifecycleState,
    },

    /// The initializer left non-positive dimensions in the port record.
    #[error("Estimator port reported invalid dimensions Nx={nx}, Nz={nz}")]
    InvalidDimensions { nx: i32, nz: i32 },

    /// A host buffer or a post-step dimension does not match the port.
    #[error("Dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The module left a required buffer pointer null.
    #[error("Estimator port buffer '{field}' is null after initialization")]
    NullBuffer { field: &'static str },
}

impl PortError {
    /// Create a load error.
    pub fn load_error(path: impl Into<String>, source: libloading::Error) -> Self {
        Self::LoadError {
            path: path.into(),
            source,
        }
    }

    /// Create a symbol not found error.
    pub fn symbol_not_found(symbol: impl Into<String>, path: impl Into<String>) -> Self {
        Self::SymbolNotFound {
            symbol: symbol.into(),
            path: path.into(),
        }
    }

    /// Create a sequence violation error.
    pub fn sequence_violation(operation: &'static str, state: LifecycleState) -> Self {
        Self::SequenceViolation { operation, state }
    }

    /// Create a dimension mismatch error.
    pub fn dimension_mismatch(what: &'static str, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            what,
            expected,
            actual,
        }
    }

    /// Whether this error happened while loading the module, before any
    /// native call was made.
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            Self::ModuleNotFound { .. } | Self::LoadError { .. } | Self::SymbolNotFound { .. }
        )
    }

    /// Whether this error is a programming defect in call ordering.
    pub fn is_sequence_violation(&self) -> bool {
        matches!(self, Self::SequenceViolation { .. })
    }
}

/// Result type for estimator port operations.
pub type PortResult<T> = Result<T, PortError>;

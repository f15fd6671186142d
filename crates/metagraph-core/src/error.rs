//! Error taxonomy
//!
//! Planning failures are returned synchronously as [`MetagraphError`].
//! Translator and algorithm bodies report [`KernelError`], which the eager
//! resolver wraps as [`MetagraphError::Kernel`] and the schedulers wrap as
//! [`MetagraphError::Execution`].

use thiserror::Error;

use crate::types::ConcreteTypeId;

/// Crate-wide result alias.
pub type Result<T, E = MetagraphError> = std::result::Result<T, E>;

/// Raised by wrapper constructors when the wrapped value breaks an invariant.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct WrapperError(pub String);

impl WrapperError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Failure inside a translator, algorithm or wrapper constructor body.
#[derive(Debug, Clone, Error)]
pub enum KernelError {
    #[error("expected a value of {expected}, received {found}")]
    UnexpectedValue {
        expected: &'static str,
        found: &'static str,
    },

    #[error("missing argument at position {0}")]
    MissingArgument(usize),

    #[error(transparent)]
    Wrapper(#[from] WrapperError),

    #[error("{0}")]
    Failed(String),
}

impl KernelError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Errors surfaced by registration, planning and execution.
#[derive(Debug, Clone, Error)]
pub enum MetagraphError {
    #[error("Unknown type: {0} does not satisfy any registered concrete type")]
    UnknownType(String),

    #[error("Ambiguous type: value of {native} satisfies several concrete types: {candidates}")]
    AmbiguousType { native: String, candidates: String },

    #[error("Duplicate registration: {0}")]
    DuplicateRegistration(String),

    #[error("Invalid registration: {0}")]
    InvalidRegistration(String),

    #[error("No translation path found from {src} to {dst}")]
    NoTranslationPath {
        src: ConcreteTypeId,
        dst: ConcreteTypeId,
    },

    #[error("Unknown algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("Invalid argument for \"{algorithm}\": {message}")]
    InvalidArgument { algorithm: String, message: String },

    #[error("No concrete algorithm for \"{0}\" can be satisfied for the given inputs")]
    NoViableDispatch(String),

    #[error(
        "Incorrect input types and no valid translation path to solution \
         for \"{algorithm}\" in plugin {plugin}: {reason}"
    )]
    ExactDispatchUnsatisfiable {
        algorithm: String,
        plugin: String,
        reason: String,
    },

    #[error("Incorrect input types. Translations required for: {params}")]
    TranslationsRequired {
        algorithm: String,
        plugin: String,
        params: String,
    },

    #[error("Wrapper validation failed: {0}")]
    WrapperValidation(#[from] WrapperError),

    #[error("Equality is not defined for concrete type {0}")]
    UnsupportedEquality(ConcreteTypeId),

    #[error("{step} failed: {source}")]
    Kernel {
        step: String,
        #[source]
        source: KernelError,
    },

    #[error("Task {task} failed during execution: {message}")]
    Execution { task: String, message: String },
}

impl MetagraphError {
    pub(crate) fn kernel(step: impl Into<String>, source: KernelError) -> Self {
        Self::Kernel {
            step: step.into(),
            source,
        }
    }

    pub(crate) fn invalid_argument(algorithm: &str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            algorithm: algorithm.to_string(),
            message: message.into(),
        }
    }
}

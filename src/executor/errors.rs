//! Step errors
//!
//! Every fatal condition aborts the whole step. The driver wraps the error in
//! a [`StepFailure`] carrying the iteration number it happened in, so callers
//! always receive a structured failure rather than a raw internal fault.

use thiserror::Error;

use super::types::VarType;

/// Error categories reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Type-incompatible redeclaration or unknown variable
    Declaration,
    /// Incompatible operand or assignment types
    Type,
    /// Array subscript out of range
    Bounds,
    /// LEAVE/CONTINUE outside a loop
    Scoping,
    /// Dataset not found, BY key absent, unknown output target, unsorted input
    Configuration,
    /// Division by zero or overflow when configured to fail, invalid loop control
    Arithmetic,
    /// Error raised by a built-in function
    Function,
    /// A loop ran past the configured iteration cap
    IterationLimit,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StepError {
    #[error("variable {name} is already defined as {declared}; cannot redefine it as {requested}")]
    Redefinition {
        name: String,
        declared: VarType,
        requested: VarType,
    },

    #[error("variable {name} is not defined")]
    UndeclaredVariable { name: String },

    #[error("type mismatch: {message}")]
    TypeMismatch { message: String },

    #[error("array subscript out of range for {array}: {message}")]
    Bounds { array: String, message: String },

    #[error("invalid array definition {array}: {message}")]
    InvalidArray { array: String, message: String },

    #[error("array {name} is not defined")]
    UndefinedArray { name: String },

    #[error("{statement} is not inside a DO loop")]
    Scoping { statement: &'static str },

    #[error("dataset {name} does not exist")]
    DatasetNotFound { name: String },

    #[error("BY variable {key} is not on input dataset {dataset}")]
    ByKeyMissing { key: String, dataset: String },

    #[error("variable {name} is not on input dataset {dataset}")]
    UnknownColumn { name: String, dataset: String },

    #[error("dataset {name} is not named on the DATA statement")]
    UnknownOutput { name: String },

    #[error("BY variables are not properly sorted on dataset {dataset} at row {row}")]
    UnsortedInput { dataset: String, row: usize },

    #[error("{message}")]
    Configuration { message: String },

    #[error("invalid DO loop control: {message}")]
    InvalidLoop { message: String },

    #[error("arithmetic error: {message}")]
    Arithmetic { message: String },

    #[error("function {name}: {message}")]
    Function { name: String, message: String },

    #[error("loop exceeded {limit} iterations")]
    IterationLimit { limit: u64 },
}

impl StepError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StepError::Redefinition { .. } | StepError::UndeclaredVariable { .. } => {
                ErrorKind::Declaration
            }
            StepError::TypeMismatch { .. } => ErrorKind::Type,
            StepError::Bounds { .. } => ErrorKind::Bounds,
            StepError::Scoping { .. } => ErrorKind::Scoping,
            StepError::InvalidArray { .. }
            | StepError::UndefinedArray { .. }
            | StepError::DatasetNotFound { .. }
            | StepError::ByKeyMissing { .. }
            | StepError::UnknownColumn { .. }
            | StepError::UnknownOutput { .. }
            | StepError::UnsortedInput { .. }
            | StepError::Configuration { .. } => ErrorKind::Configuration,
            StepError::InvalidLoop { .. } | StepError::Arithmetic { .. } => ErrorKind::Arithmetic,
            StepError::Function { .. } => ErrorKind::Function,
            StepError::IterationLimit { .. } => ErrorKind::IterationLimit,
        }
    }

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        StepError::TypeMismatch {
            message: message.into(),
        }
    }

    pub fn bounds(array: &str, message: impl Into<String>) -> Self {
        StepError::Bounds {
            array: array.to_string(),
            message: message.into(),
        }
    }
}

/// A failed step as reported to the caller
#[derive(Debug, Clone, PartialEq)]
pub struct StepFailure {
    pub error: StepError,
    /// 1-based iteration number, absent for failures before the first row
    pub row: Option<usize>,
}

impl std::fmt::Display for StepFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.row {
            Some(n) => write!(f, "{} (_N_={})", self.error, n),
            None => write!(f, "{}", self.error),
        }
    }
}

impl std::error::Error for StepFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl StepFailure {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

impl From<StepError> for StepFailure {
    fn from(error: StepError) -> Self {
        StepFailure { error, row: None }
    }
}

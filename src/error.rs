//! Error types shared by the VCF model and the concordance engine.

use thiserror::Error;

use crate::vcf::field::ScalarKind;

/// Main error type for library operations
#[derive(Error, Debug)]
pub enum ConcordanceError {
    /// Malformed header line, duplicate declarations, unknown field references
    #[error("Schema error: {message}")]
    Schema { message: String },

    /// A sample name lookup failed
    #[error("Sample not found: '{name}' does not exist in this VCF header")]
    SampleNotFound { name: String },

    /// Text could not be coerced into the declared scalar kind
    #[error("Failed to coerce value '{value}' into {kind} for field '{field}'")]
    Coercion {
        field: String,
        value: String,
        kind: ScalarKind,
    },

    /// Two values of different field types were combined, or a scalar was
    /// read as the wrong kind
    #[error("Conflicting field types: {left} and {right}")]
    TypeMismatch { left: String, right: String },

    /// Slot index beyond what the field's arity allows
    #[error("Index {index} out of range for field '{field}' (limit {limit})")]
    IndexOutOfRange {
        field: String,
        index: usize,
        limit: usize,
    },

    /// Malformed record line
    #[error("Record parse error{}: {message}", line_suffix(.line))]
    RecordParse {
        line: Option<u64>,
        message: String,
    },

    /// Engine misuse: push after finalize, unsorted input
    #[error("Engine state error: {message}")]
    EngineState { message: String },

    /// An error raised while reading a numbered source line
    #[error("Line {line}: {source}")]
    AtLine {
        line: u64,
        source: Box<ConcordanceError>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn line_suffix(line: &Option<u64>) -> String {
    line.map(|l| format!(" at line {}", l)).unwrap_or_default()
}

/// Coarse classification of [`ConcordanceError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Schema,
    Coercion,
    RecordParse,
    EngineState,
    Io,
}

/// Type alias for Results using ConcordanceError
pub type Result<T> = std::result::Result<T, ConcordanceError>;

impl ConcordanceError {
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    pub fn sample_not_found(name: impl Into<String>) -> Self {
        Self::SampleNotFound { name: name.into() }
    }

    pub fn coercion(field: impl Into<String>, value: impl Into<String>, kind: ScalarKind) -> Self {
        Self::Coercion {
            field: field.into(),
            value: value.into(),
            kind,
        }
    }

    pub fn type_mismatch(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self::TypeMismatch {
            left: left.into(),
            right: right.into(),
        }
    }

    /// Create a record parse error without line information
    pub fn record(message: impl Into<String>) -> Self {
        Self::RecordParse {
            line: None,
            message: message.into(),
        }
    }

    pub fn engine(message: impl Into<String>) -> Self {
        Self::EngineState {
            message: message.into(),
        }
    }

    /// Attach a source line number. Record parse errors carry it in place,
    /// anything else is wrapped. Errors that already have a line are kept.
    pub fn at_line(self, line_number: u64) -> Self {
        match self {
            Self::RecordParse { line: None, message } => Self::RecordParse {
                line: Some(line_number),
                message,
            },
            located @ (Self::RecordParse { .. } | Self::AtLine { .. }) => located,
            other => Self::AtLine {
                line: line_number,
                source: Box::new(other),
            },
        }
    }

    /// Source line number, when known
    pub fn line(&self) -> Option<u64> {
        match self {
            Self::RecordParse { line, .. } => *line,
            Self::AtLine { line, .. } => Some(*line),
            _ => None,
        }
    }

    pub fn is_sample_not_found(&self) -> bool {
        match self {
            Self::SampleNotFound { .. } => true,
            Self::AtLine { source, .. } => source.is_sample_not_found(),
            _ => false,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Schema { .. } | Self::SampleNotFound { .. } => ErrorCategory::Schema,
            Self::Coercion { .. } | Self::TypeMismatch { .. } | Self::IndexOutOfRange { .. } => {
                ErrorCategory::Coercion
            }
            Self::RecordParse { .. } => ErrorCategory::RecordParse,
            Self::EngineState { .. } => ErrorCategory::EngineState,
            Self::AtLine { source, .. } => source.category(),
            Self::Io(_) => ErrorCategory::Io,
        }
    }
}

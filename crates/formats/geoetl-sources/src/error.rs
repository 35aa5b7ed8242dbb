use std::error::Error as StdError;
use std::fmt;

/// A position within a source file.
///
/// Indices are 1-based to align with human expectations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourcePosition {
    /// Line number in the source (1-based)
    pub line: Option<u64>,
    /// Value index on the line or in the data section (1-based)
    pub value: Option<u64>,
}

impl SourcePosition {
    /// Position of a line.
    #[must_use]
    pub fn line(line: u64) -> Self {
        Self {
            line: Some(line),
            value: None,
        }
    }

    /// Returns true when the position does not contain any location metadata.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.line.is_none() && self.value.is_none()
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(line) = self.line {
            parts.push(format!("line {line}"));
        }
        if let Some(value) = self.value {
            parts.push(format!("value {value}"));
        }
        if parts.is_empty() {
            write!(f, "unknown position")
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}

/// Errors that can occur when opening a source file.
#[derive(Debug)]
pub enum SourceError {
    /// An underlying I/O failure occurred.
    Io {
        /// The originating error.
        source: std::io::Error,
        /// Optional context describing what was being read.
        context: Option<String>,
    },
    /// Parsing failed for the input source.
    Parse {
        /// Human readable description of the failure.
        message: String,
        /// Optional position describing where the failure occurred.
        position: Option<SourcePosition>,
        /// Optional context describing what was being read.
        context: Option<String>,
    },
}

impl SourceError {
    pub(crate) fn parse(message: impl Into<String>, position: Option<SourcePosition>) -> Self {
        SourceError::Parse {
            message: message.into(),
            position,
            context: None,
        }
    }

    fn fmt_context(context: Option<&str>) -> String {
        context
            .map(|c| format!(" while reading {c}"))
            .unwrap_or_default()
    }

    fn fmt_position(position: Option<&SourcePosition>) -> String {
        position
            .filter(|pos| !pos.is_empty())
            .map(|pos| format!(" at {pos}"))
            .unwrap_or_default()
    }

    /// Attach additional context to the error, returning the updated error.
    #[must_use]
    pub fn with_additional_context(mut self, context: impl Into<String>) -> Self {
        let context = context.into();
        match &mut self {
            SourceError::Io {
                context: existing, ..
            }
            | SourceError::Parse {
                context: existing, ..
            } => match existing {
                Some(existing) if !existing.is_empty() => {
                    existing.push_str("; ");
                    existing.push_str(&context);
                },
                _ => *existing = Some(context),
            },
        }
        self
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Io { source, context } => {
                write!(
                    f,
                    "I/O error{}: {source}",
                    Self::fmt_context(context.as_deref())
                )
            },
            SourceError::Parse {
                message,
                position,
                context,
            } => write!(
                f,
                "Parse error{}{}: {message}",
                Self::fmt_context(context.as_deref()),
                Self::fmt_position(position.as_ref())
            ),
        }
    }
}

impl StdError for SourceError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            SourceError::Io { source, .. } => Some(source),
            SourceError::Parse { .. } => None,
        }
    }
}

impl From<std::io::Error> for SourceError {
    fn from(source: std::io::Error) -> Self {
        SourceError::Io {
            source,
            context: None,
        }
    }
}

/// Result type alias that uses [`SourceError`].
pub type SourceResult<T> = Result<T, SourceError>;

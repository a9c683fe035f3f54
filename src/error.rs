//! Structured error types for the quire layout engine.
//!
//! The variants follow the failure taxonomy of the pipeline: bad arguments,
//! unreadable resources, structural misuse of a node role, failures while
//! invoking drawing tasks, and document parsing.

use thiserror::Error;

type BoxedCause = Box<dyn std::error::Error + Send + Sync>;

/// The unified error type returned by all public quire API functions.
#[derive(Debug, Error)]
pub enum QuireError {
    /// An argument or attribute value was rejected. Never coerced silently.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An external resource (image, embedded file) could not be opened or
    /// decoded.
    #[error("Resource \"{resource}\" is invalid: {message}")]
    InvalidResource {
        resource: String,
        message: String,
        #[source]
        source: Option<BoxedCause>,
    },

    /// The operation makes no sense for the node's structural role, or the
    /// tree is in a state that should be unreachable.
    #[error("Structural error: {0}")]
    Structural(String),

    /// A queued drawing task failed while being invoked.
    #[error("Drawing failed: {0}")]
    Drawing(#[source] Box<QuireError>),

    /// JSON input failed to parse as a valid document.
    #[error("Failed to parse document: {source}{}", hint_suffix(.hint))]
    Parse {
        source: serde_json::Error,
        hint: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn hint_suffix(hint: &str) -> String {
    if hint.is_empty() {
        String::new()
    } else {
        format!("\n  Hint: {}", hint)
    }
}

impl QuireError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        QuireError::InvalidArgument(message.into())
    }

    pub fn structural(message: impl Into<String>) -> Self {
        QuireError::Structural(message.into())
    }

    /// Resource failure without an underlying cause.
    pub fn invalid_resource(resource: impl Into<String>, message: impl Into<String>) -> Self {
        QuireError::InvalidResource {
            resource: resource.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Resource failure carrying the error that caused it.
    pub fn invalid_resource_caused_by<E>(resource: impl Into<String>, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        QuireError::InvalidResource {
            resource: resource.into(),
            message: cause.to_string(),
            source: Some(Box::new(cause)),
        }
    }

    pub fn drawing(cause: QuireError) -> Self {
        QuireError::Drawing(Box::new(cause))
    }
}

impl From<serde_json::Error> for QuireError {
    fn from(e: serde_json::Error) -> Self {
        let hint = match e.classify() {
            serde_json::error::Category::Syntax => {
                "Check for trailing commas, missing quotes, or unescaped characters.".to_string()
            }
            serde_json::error::Category::Data => {
                "The JSON is valid but doesn't match the document schema. Check tags, field names and types.".to_string()
            }
            serde_json::error::Category::Eof => "Unexpected end of input. Is the JSON truncated?".to_string(),
            serde_json::error::Category::Io => String::new(),
        };
        QuireError::Parse { source: e, hint }
    }
}

pub type Result<T, E = QuireError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_carries_hint() {
        let err: QuireError = serde_json::from_str::<serde_json::Value>("{\"a\": 1,}")
            .unwrap_err()
            .into();
        let message = err.to_string();
        assert!(message.starts_with("Failed to parse document"));
        assert!(message.contains("Hint: Check for trailing commas"));
    }

    #[test]
    fn resource_error_keeps_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = QuireError::invalid_resource_caused_by("./logo.png", io);
        assert!(err.to_string().contains("./logo.png"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn drawing_error_wraps_cause() {
        let err = QuireError::drawing(QuireError::invalid_argument("bad font"));
        assert_eq!(err.to_string(), "Drawing failed: Invalid argument: bad font");
    }
}

//! Error handling for GCodeView
//!
//! Provides error types for the layers of the preview engine:
//! - Geometry errors (moves that cannot be turned into buffers)
//! - Stream errors (malformed or unreadable move streams)
//! - Color errors (unparseable color strings)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Geometry error type
///
/// Raised before compilation starts when the move stream cannot be
/// represented within the configured buffer limits.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    /// A single move needs more room than an empty buffer offers
    #[error(
        "Move {move_index} needs {vertices} vertices / {index_bytes} index bytes, \
         buffer limits are {max_vertices} vertices / {max_index_bytes} bytes"
    )]
    MoveTooLarge {
        /// Raw index of the offending move.
        move_index: usize,
        /// Vertices the move would emit in the worst case.
        vertices: usize,
        /// Index bytes the move would emit in the worst case.
        index_bytes: usize,
        /// Configured vertex cap.
        max_vertices: usize,
        /// Configured index byte cap.
        max_index_bytes: usize,
    },

    /// A move or one of its curve points has a NaN or infinite coordinate
    #[error("Move {move_index} has a non-finite position")]
    NonFinitePosition {
        /// Raw index of the offending move.
        move_index: usize,
    },

    /// Buffer limits cannot hold even one segment
    #[error("Invalid buffer limits: {reason}")]
    InvalidLimits {
        /// Description of the violated limit.
        reason: String,
    },
}

/// Move stream error type
#[derive(Error, Debug)]
pub enum StreamError {
    /// Stream could not be decoded
    #[error("Failed to decode move stream: {0}")]
    Decode(#[from] serde_json::Error),

    /// Metadata references more extruders than the stream supports
    #[error("Too many extruders: {count} (max {max})")]
    TooManyExtruders {
        /// Declared extruder count.
        count: usize,
        /// Supported maximum.
        max: usize,
    },
}

/// Color parsing error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ColorError {
    /// String is not of the form `#RRGGBB` or `#RRGGBBAA`
    #[error("Invalid color string '{0}'")]
    InvalidHex(String),
}

/// Main error type for GCodeView
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// Geometry error
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    /// Move stream error
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// Color error
    #[error(transparent)]
    Color(#[from] ColorError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a geometry error
    pub fn is_geometry_error(&self) -> bool {
        matches!(self, Error::Geometry(_))
    }

    /// Check if this is a move stream error
    pub fn is_stream_error(&self) -> bool {
        matches!(self, Error::Stream(_))
    }

    /// Check if this error means the stream can never fit the buffers
    pub fn is_capacity_error(&self) -> bool {
        matches!(
            self,
            Error::Geometry(GeometryError::MoveTooLarge { .. })
                | Error::Geometry(GeometryError::InvalidLimits { .. })
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Stream(StreamError::Decode(err))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_too_large_display() {
        let err = GeometryError::MoveTooLarge {
            move_index: 7,
            vertices: 800,
            index_bytes: 6072,
            max_vertices: 64,
            max_index_bytes: 1024,
        };
        let msg = err.to_string();
        assert!(msg.contains("Move 7"));
        assert!(msg.contains("800 vertices"));
        assert!(msg.contains("64 vertices"));
    }

    #[test]
    fn test_error_conversions() {
        let err: Error = GeometryError::NonFinitePosition { move_index: 3 }.into();
        assert!(err.is_geometry_error());
        assert!(!err.is_capacity_error());
        assert_eq!(err.to_string(), "Move 3 has a non-finite position");

        let err: Error = ColorError::InvalidHex("#zz".into()).into();
        assert!(matches!(err, Error::Color(_)));
    }

    #[test]
    fn test_capacity_error_helper() {
        let err: Error = GeometryError::InvalidLimits {
            reason: "zero vertices".into(),
        }
        .into();
        assert!(err.is_capacity_error());
    }

    #[test]
    fn test_json_error_maps_to_stream() {
        let json_err = serde_json::from_str::<u32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        assert!(err.is_stream_error());
        assert!(err.to_string().starts_with("Failed to decode move stream"));
    }

    #[test]
    fn test_other() {
        let err = Error::other("boom");
        assert_eq!(err.to_string(), "boom");
    }
}

//! Error types for phototab

use thiserror::Error;

/// phototab error type
///
/// Every variant is a local, synchronous condition. None of them is
/// transient, so callers should not retry.
#[derive(Error, Debug)]
pub enum Error {
    /// Two tables cannot be merged because their axes differ.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Two tables cannot be merged because they come from different generator runs.
    #[error("provenance mismatch: {0}")]
    ProvenanceMismatch(String),

    /// A coordinate has the wrong number of components.
    #[error("dimension mismatch: expected {expected} coordinates, got {got}")]
    DimensionMismatch {
        /// Number of table axes.
        expected: usize,
        /// Number of components in the record.
        got: usize,
    },

    /// A record weight is negative or not finite.
    #[error("invalid weight: {0}")]
    InvalidWeight(f64),

    /// A coordinate or accumulated value cannot be binned (NaN, or a non-finite value).
    #[error("invalid coordinate: {0}")]
    InvalidCoordinate(String),

    /// Merging would push a statistic past the range of `f64`.
    #[error("numeric overflow: {0}")]
    NumericOverflow(String),

    /// Mutation attempted on a finalized table.
    #[error("table is finalized")]
    TableFinalized,

    /// A serialized table failed an integrity check.
    #[error("corrupt table: {0}")]
    CorruptTable(String),

    /// Table configuration rejected.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_problem() {
        let e = Error::DimensionMismatch { expected: 3, got: 2 };
        assert_eq!(e.to_string(), "dimension mismatch: expected 3 coordinates, got 2");
        assert_eq!(Error::TableFinalized.to_string(), "table is finalized");
        assert!(Error::InvalidWeight(-1.0).to_string().contains("-1"));
    }

    #[test]
    fn io_and_json_convert() {
        let io: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(io, Error::Io(_)));
        let json: Error = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(json, Error::Json(_)));
    }
}

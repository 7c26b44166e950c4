use thiserror::Error;

/// Errors raised by the geometry codec and the CRS profiles.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A constructor or parameter was handed structurally invalid input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A well-known binary (or GeoPackage binary) byte stream is malformed.
    #[error("well-known binary format error: {0}")]
    WellKnownBinaryFormat(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cold]
pub(crate) fn invalid(msg: impl Into<String>) -> Error {
    Error::InvalidArgument(msg.into())
}

#[cold]
pub(crate) fn bad(msg: impl Into<String>) -> Error {
    Error::WellKnownBinaryFormat(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_are_plain_values() {
        let err = bad("truncated point");
        assert_eq!(err.clone(), Error::WellKnownBinaryFormat("truncated point".into()));
        assert_eq!(err.to_string(), "well-known binary format error: truncated point");
        assert_eq!(invalid("empty name").to_string(), "invalid argument: empty name");
    }
}

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the tile stores.
#[derive(Error, Debug)]
pub enum TileStoreError {
    /// Bad layout parameters, out-of-range tile addresses or unusable
    /// locations.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// A store file exists but its contents contradict the layout.
    #[error("corrupt tile store file {}: {detail}", .path.display())]
    Corrupt { path: PathBuf, detail: String },

    #[error(transparent)]
    Geometry(geopack::Error),

    #[error("invalid store configuration: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T, E = TileStoreError> = std::result::Result<T, E>;

impl From<geopack::Error> for TileStoreError {
    fn from(err: geopack::Error) -> Self {
        match err {
            geopack::Error::InvalidArgument(msg) => TileStoreError::InvalidArgument(msg),
            other => TileStoreError::Geometry(other),
        }
    }
}

#[cold]
pub(crate) fn invalid(msg: impl Into<String>) -> TileStoreError {
    TileStoreError::InvalidArgument(msg.into())
}

/// Attaches a description of the failed operation to an `io::Error`.
pub(crate) trait IoContext<T> {
    fn context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|source| TileStoreError::Io {
            context: f().into(),
            source,
        })
    }
}

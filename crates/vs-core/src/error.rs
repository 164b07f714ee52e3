use thiserror::Error;

/// Errors reported by every stage of a conversion run.
///
/// Each variant maps to one stable message. None of them is retried: they
/// either describe a structural mismatch or an I/O failure mid-stream.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// Invalid configuration: glyph set, cell size, grid geometry, paths.
    #[error("Configuration invalide : {0}")]
    Config(String),

    /// Source unreadable, or fewer decodable frames than declared.
    #[error("Lecture de la source impossible : {0}")]
    SourceRead(String),

    /// The rasterizer could not produce a glyph for a required character.
    #[error("Rasterisation impossible pour {symbol:?} : {reason}")]
    Raster {
        /// Character that failed.
        symbol: char,
        /// Why the rasterizer gave up.
        reason: String,
    },

    /// The output could not be written or finalized.
    #[error("Écriture de la sortie impossible : {0}")]
    SinkWrite(String),

    /// The caller aborted the run between two frames.
    #[error("Conversion annulée")]
    Cancelled,
}

/// Discriminant-only view of [`ConvertError`], handy for exit codes and tests.
///
/// # Example
/// ```
/// use vs_core::error::{ConvertError, ErrorKind};
/// let err = ConvertError::Config("cell_size = 0".into());
/// assert_eq!(err.kind(), ErrorKind::Config);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    SourceRead,
    Raster,
    SinkWrite,
    Cancelled,
}

impl ConvertError {
    /// Kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::SourceRead(_) => ErrorKind::SourceRead,
            Self::Raster { .. } => ErrorKind::Raster,
            Self::SinkWrite(_) => ErrorKind::SinkWrite,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Process exit code for this error, one per kind.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::Config => 2,
            ErrorKind::SourceRead => 3,
            ErrorKind::Raster => 4,
            ErrorKind::SinkWrite => 5,
            ErrorKind::Cancelled => 130,
        }
    }
}

use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum StoreError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Encode {
        path: PathBuf,
        source: image::ImageError,
    },
    /// Target directory already exists; nothing was written.
    Duplicate { path: PathBuf },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::Duplicate { .. })
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io { path, source } => {
                write!(f, "I/O error at {}: {source}", path.display())
            }
            StoreError::Encode { path, source } => {
                write!(f, "failed to encode {}: {source}", path.display())
            }
            StoreError::Duplicate { path } => {
                write!(f, "{} already exists", path.display())
            }
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io { source, .. } => Some(source),
            StoreError::Encode { source, .. } => Some(source),
            StoreError::Duplicate { .. } => None,
        }
    }
}

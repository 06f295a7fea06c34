use std::io;
use std::path::PathBuf;

use spotmatch_types::{Algorithm, ErrorClass};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("descriptor file {} does not exist", .path.display())]
    Missing { path: PathBuf },
    #[error("descriptor file {} holds no descriptors", .path.display())]
    Empty { path: PathBuf },
    #[error("descriptor file {} is malformed at line {line}: {reason}", .path.display())]
    Corrupt {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    #[error("descriptor sets cannot be matched: {reason}")]
    Incompatible { reason: String },
    #[error("failed to access descriptor file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl DescriptorError {
    pub fn corrupt(path: impl Into<PathBuf>, line: usize, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            line,
            reason: reason.into(),
        }
    }

    pub fn incompatible(reason: impl Into<String>) -> Self {
        Self::Incompatible {
            reason: reason.into(),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            DescriptorError::Missing { .. } | DescriptorError::Empty { .. } => {
                ErrorClass::DescriptorMissing
            }
            DescriptorError::Corrupt { .. }
            | DescriptorError::Incompatible { .. }
            | DescriptorError::Io { .. } => ErrorClass::DescriptorCorrupt,
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("{algorithm} extraction failed: {reason}")]
    Failed { algorithm: Algorithm, reason: String },
    #[error("{algorithm} found no keypoints")]
    NoKeypoints { algorithm: Algorithm },
    #[error(transparent)]
    Store(#[from] DescriptorError),
}

impl ExtractionError {
    pub fn failed(algorithm: Algorithm, reason: impl Into<String>) -> Self {
        Self::Failed {
            algorithm,
            reason: reason.into(),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            ExtractionError::Store(err) => err.class(),
            ExtractionError::Failed { .. } | ExtractionError::NoKeypoints { .. } => {
                ErrorClass::Extraction
            }
        }
    }
}

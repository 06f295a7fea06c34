use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use spotmatch_types::{Algorithm, SampleName};

use crate::descriptor::DescriptorSet;
use crate::error::DescriptorError;

/// Descriptor files laid out as `<root>/<sample>/<sample>_<suffix>_mask.txt`,
/// next to the sample's normalized images.
#[derive(Clone, Debug)]
pub struct DescriptorStore {
    root: PathBuf,
}

impl DescriptorStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, sample: &SampleName, algorithm: Algorithm) -> PathBuf {
        self.root
            .join(sample.as_str())
            .join(algorithm.descriptor_file_name(sample))
    }

    pub fn load(
        &self,
        sample: &SampleName,
        algorithm: Algorithm,
    ) -> Result<DescriptorSet, DescriptorError> {
        let path = self.path(sample, algorithm);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(DescriptorError::Missing { path });
            }
            Err(source) => return Err(DescriptorError::Io { path, source }),
        };
        DescriptorSet::parse(&text, algorithm.metric(), &path)
    }

    /// Writes `set` for `sample`. The sample directory must already exist.
    pub fn save(
        &self,
        sample: &SampleName,
        algorithm: Algorithm,
        set: &DescriptorSet,
    ) -> Result<PathBuf, DescriptorError> {
        if set.metric() != algorithm.metric() {
            return Err(DescriptorError::incompatible(format!(
                "{algorithm} expects {:?} descriptors",
                algorithm.metric()
            )));
        }
        let path = self.path(sample, algorithm);
        fs::write(&path, set.to_text()).map_err(|source| DescriptorError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

//! Persistence of per-sample directories.
//!
//! A sample directory is claimed with a single `create_dir`, so two workers
//! racing on the same name never both write: the loser sees
//! [`StoreError::Duplicate`] and leaves the existing contents alone.
//!
//! Normalized outputs go through [`PendingSampleDir`] instead: files are
//! written under a hidden staging directory in the same root and renamed
//! into place once complete, so a named sample directory is never partial.

mod error;
mod image;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use ::image::RgbImage;
use spotmatch_types::SampleName;
use tempfile::TempDir;

pub use error::StoreError;

/// A directory named after one sample under some output root.
#[derive(Debug)]
pub struct SampleDir {
    path: PathBuf,
}

impl SampleDir {
    /// Creates `<root>/<name>`. Fails with `Duplicate` when it already exists.
    pub fn claim(root: &Path, name: &SampleName) -> Result<Self, StoreError> {
        fs::create_dir_all(root).map_err(|source| StoreError::io(root, source))?;
        let path = root.join(name.as_str());
        match fs::create_dir(&path) {
            Ok(()) => Ok(Self { path }),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                Err(StoreError::Duplicate { path })
            }
            Err(source) => Err(StoreError::io(path, source)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copies a file into the directory, keeping its bytes untouched.
    pub fn copy_in(&self, source: &Path, file_name: &str) -> Result<PathBuf, StoreError> {
        let path = self.path.join(file_name);
        fs::copy(source, &path).map_err(|err| StoreError::io(source, err))?;
        Ok(path)
    }
}

/// A sample directory whose files are staged and published together.
/// Dropping it without [`commit`](Self::commit) removes the staged files.
#[derive(Debug)]
pub struct PendingSampleDir {
    staging: TempDir,
    target: PathBuf,
    name: SampleName,
}

impl PendingSampleDir {
    /// Starts `<root>/<name>`. Fails with `Duplicate` when it already exists.
    pub fn begin(root: &Path, name: &SampleName) -> Result<Self, StoreError> {
        fs::create_dir_all(root).map_err(|source| StoreError::io(root, source))?;
        let target = root.join(name.as_str());
        if target.exists() {
            return Err(StoreError::Duplicate { path: target });
        }
        let prefix = format!(".{name}.");
        let staging = tempfile::Builder::new()
            .prefix(&prefix)
            .tempdir_in(root)
            .map_err(|source| StoreError::io(root, source))?;
        Ok(Self {
            staging,
            target,
            name: name.clone(),
        })
    }

    /// Final location once committed.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Stages `<name>_<suffix>.png`.
    pub fn write_image(&self, suffix: &str, image: &RgbImage) -> Result<PathBuf, StoreError> {
        let path = self
            .staging
            .path()
            .join(format!("{}_{suffix}.png", self.name));
        image::write_png(&path, image)?;
        Ok(path)
    }

    /// Renames the staged directory to its final name. A sample published by
    /// someone else in the meantime wins and is reported as `Duplicate`.
    pub fn commit(self) -> Result<PathBuf, StoreError> {
        match fs::rename(self.staging.path(), &self.target) {
            Ok(()) => Ok(self.target),
            Err(_) if self.target.exists() => Err(StoreError::Duplicate { path: self.target }),
            Err(source) => Err(StoreError::io(&self.target, source)),
        }
    }
}

/// Moves a sample directory to `<dest_root>/<dir name>`. An existing target
/// is reported as a duplicate and the source stays in place.
pub fn relocate_dir(source: &Path, dest_root: &Path) -> Result<PathBuf, StoreError> {
    fs::create_dir_all(dest_root).map_err(|err| StoreError::io(dest_root, err))?;
    let name = source
        .file_name()
        .ok_or_else(|| StoreError::io(source, io::Error::from(io::ErrorKind::InvalidInput)))?;
    let dest = dest_root.join(name);
    if dest.exists() {
        return Err(StoreError::Duplicate { path: dest });
    }
    fs::rename(source, &dest).map_err(|err| StoreError::io(source, err))?;
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_is_a_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let name = SampleName::new("d_s_1");
        let raw = dir.path().join("raw.jpg");
        fs::write(&raw, b"raw bytes").unwrap();
        let first = SampleDir::claim(dir.path(), &name).unwrap();
        let written = first.copy_in(&raw, "d_s_1.jpg").unwrap();
        assert!(written.ends_with("d_s_1/d_s_1.jpg"));

        let err = SampleDir::claim(dir.path(), &name).unwrap_err();
        assert!(err.is_duplicate());
        assert!(written.is_file());
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn pending_dir_appears_only_on_commit() {
        let dir = tempfile::tempdir().unwrap();
        let name = SampleName::new("d_s_1");
        let pending = PendingSampleDir::begin(dir.path(), &name).unwrap();
        pending.write_image("mask", &RgbImage::new(3, 2)).unwrap();
        assert!(!pending.target().exists());

        let published = pending.commit().unwrap();
        assert!(published.join("d_s_1_mask.png").is_file());
        assert_eq!(entries(dir.path()), vec!["d_s_1"]);
        assert!(PendingSampleDir::begin(dir.path(), &name)
            .unwrap_err()
            .is_duplicate());
    }

    #[test]
    fn failed_write_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let name = SampleName::new("d_s_1");
        let pending = PendingSampleDir::begin(dir.path(), &name).unwrap();
        pending.write_image("mask", &RgbImage::new(3, 2)).unwrap();
        assert!(pending.write_image("img", &RgbImage::new(0, 0)).is_err());
        drop(pending);
        assert!(entries(dir.path()).is_empty());

        let retry = PendingSampleDir::begin(dir.path(), &name).unwrap();
        retry.write_image("mask", &RgbImage::new(3, 2)).unwrap();
        assert!(retry.commit().is_ok());
    }

    #[test]
    fn commit_loses_to_an_already_published_sample() {
        let dir = tempfile::tempdir().unwrap();
        let name = SampleName::new("d_s_1");
        let pending = PendingSampleDir::begin(dir.path(), &name).unwrap();
        pending.write_image("mask", &RgbImage::new(3, 2)).unwrap();

        let winner = SampleDir::claim(dir.path(), &name).unwrap();
        fs::write(winner.path().join("d_s_1_mask.png"), b"").unwrap();

        assert!(pending.commit().unwrap_err().is_duplicate());
        assert_eq!(entries(dir.path()), vec!["d_s_1"]);
    }

    #[test]
    fn relocation_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a").join("d_s_1");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("x.txt"), "1").unwrap();
        let dest_root = dir.path().join("b");

        let moved = relocate_dir(&source, &dest_root).unwrap();
        assert!(moved.join("x.txt").is_file());
        assert!(!source.exists());

        fs::create_dir_all(&source).unwrap();
        assert!(relocate_dir(&source, &dest_root).unwrap_err().is_duplicate());
        assert!(source.exists());
    }
}

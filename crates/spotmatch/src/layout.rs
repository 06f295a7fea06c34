use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::settings::{DEFAULT_PARAMETERS_TOML, project_config_path};

pub const PROCESSING_ERROR_LOG: &str = "processing_error_logs.txt";
pub const FINGERPRINTING_ERROR_LOG: &str = "fingerprinting_error_logs.txt";
pub const CROSSMATCHING_ERROR_LOG: &str = "crossmatching_error_logs.txt";
pub const PROCESSING_TIMES_LOG: &str = "processing_times.txt";

const FOCAL_TEMPLATE_HEADER: &str = "focal,datef,sex,size\n";

/// Directory layout of one project.
#[derive(Clone, Debug)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn unprocessed_photos(&self) -> PathBuf {
        self.root.join("unprocessed_photos")
    }

    pub fn temp(&self) -> PathBuf {
        self.root.join("temp")
    }

    /// Success root: one directory per normalized sample.
    pub fn fingerprints(&self) -> PathBuf {
        self.root.join("fingerprints")
    }

    pub fn data(&self) -> PathBuf {
        self.root.join("data")
    }

    pub fn logs(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn errors(&self) -> PathBuf {
        self.root.join("processing_errors")
    }

    /// Raw photographs that failed normalization.
    pub fn generic_errors(&self) -> PathBuf {
        self.errors().join("crop_rotate_generic")
    }

    /// Normalized samples above the size cutoff.
    pub fn size_errors(&self) -> PathBuf {
        self.errors().join("crop_rotate_size")
    }

    /// Sample directories whose descriptor extraction failed.
    pub fn fingerprinting_errors(&self) -> PathBuf {
        self.errors().join("fingerprinting")
    }

    pub fn log_file(&self, name: &str) -> PathBuf {
        self.logs().join(name)
    }

    pub fn parameters(&self) -> PathBuf {
        project_config_path(&self.root)
    }

    pub fn focal_template(&self) -> PathBuf {
        self.data().join("focal_template.csv")
    }

    /// Resolves a table path given on the command line: relative paths are
    /// looked up under `data/`.
    pub fn data_file(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data().join(path)
        }
    }

    fn directories(&self) -> [PathBuf; 8] {
        [
            self.unprocessed_photos(),
            self.temp(),
            self.fingerprints(),
            self.data(),
            self.logs(),
            self.generic_errors(),
            self.size_errors(),
            self.fingerprinting_errors(),
        ]
    }

    /// Creates every directory, log file and template of a project. Files
    /// that already exist are left untouched.
    pub fn init(&self) -> io::Result<()> {
        for dir in self.directories() {
            fs::create_dir_all(dir)?;
        }

        let created = Local::now().format("%Y-%m-%d");
        let project = self
            .root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let logs = [
            (PROCESSING_ERROR_LOG, "Processing error logs for"),
            (FINGERPRINTING_ERROR_LOG, "Fingerprinting error logs for"),
            (CROSSMATCHING_ERROR_LOG, "Crossmatching error logs for"),
            (PROCESSING_TIMES_LOG, "Processing times for"),
        ];
        for (name, description) in logs {
            let header = format!("{description} {project} database.\nCreated {created}\n");
            write_new(&self.log_file(name), header.as_bytes())?;
        }

        write_new(&self.parameters(), DEFAULT_PARAMETERS_TOML.as_bytes())?;
        write_new(&self.focal_template(), FOCAL_TEMPLATE_HEADER.as_bytes())?;
        Ok(())
    }

    /// Creates the directories a stage needs without touching existing files.
    pub fn ensure_directories(&self) -> io::Result<()> {
        for dir in self.directories() {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

fn write_new(path: &Path, contents: &[u8]) -> io::Result<()> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(mut file) => file.write_all(contents),
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_creates_layout_and_headers() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path().join("whale_sharks"));
        layout.init().unwrap();

        for sub in layout.directories() {
            assert!(sub.is_dir(), "{} missing", sub.display());
        }
        let header = fs::read_to_string(layout.log_file(PROCESSING_ERROR_LOG)).unwrap();
        assert!(header.starts_with("Processing error logs for whale_sharks database.\nCreated "));
        assert_eq!(
            fs::read_to_string(layout.focal_template()).unwrap(),
            "focal,datef,sex,size\n"
        );
        assert!(layout.parameters().is_file());
    }

    #[test]
    fn init_never_overwrites_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        layout.init().unwrap();
        fs::write(layout.parameters(), "min_area = 1\n").unwrap();
        fs::write(layout.log_file(PROCESSING_TIMES_LOG), "kept\n").unwrap();

        layout.init().unwrap();
        assert_eq!(fs::read_to_string(layout.parameters()).unwrap(), "min_area = 1\n");
        assert_eq!(
            fs::read_to_string(layout.log_file(PROCESSING_TIMES_LOG)).unwrap(),
            "kept\n"
        );
    }

    #[test]
    fn relative_tables_resolve_under_data() {
        let layout = ProjectLayout::new("/p");
        assert_eq!(layout.data_file(Path::new("a.csv")), Path::new("/p/data/a.csv"));
        assert_eq!(layout.data_file(Path::new("/x/a.csv")), Path::new("/x/a.csv"));
    }
}

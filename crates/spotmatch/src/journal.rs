use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use chrono::Local;
use spotmatch_types::ErrorRecord;
use tracing::warn;

use crate::layout::{
    CROSSMATCHING_ERROR_LOG, FINGERPRINTING_ERROR_LOG, PROCESSING_ERROR_LOG,
    PROCESSING_TIMES_LOG, ProjectLayout,
};

/// Append-only text log shared by all workers of a run.
///
/// Each entry is formatted up front and written with one `write_all` while
/// the lock is held, so lines from concurrent workers never interleave.
#[derive(Debug)]
pub struct Journal {
    path: PathBuf,
    file: Mutex<File>,
}

impl Journal {
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append_line(&self, line: &str) -> io::Result<()> {
        let mut entry = String::with_capacity(line.len() + 1);
        entry.push_str(line);
        entry.push('\n');
        let mut file = self
            .file
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        file.write_all(entry.as_bytes())?;
        file.flush()
    }

    /// Appends `record`; a failing write is reported but never aborts the run.
    pub fn record(&self, record: &ErrorRecord) {
        if let Err(err) = self.append_line(&record.to_log_line()) {
            warn!(
                log = %self.path.display(),
                subject = %record.subject,
                error = %err,
                "failed to append error record"
            );
        }
    }

    /// Run header such as `2026-10-18 09:12:01 - Cropping and rotating images`.
    pub fn header(&self, title: &str) {
        let line = format!("{} - {title}", Local::now().format("%Y-%m-%d %H:%M:%S"));
        if let Err(err) = self.append_line(&line) {
            warn!(log = %self.path.display(), error = %err, "failed to append run header");
        }
    }

    /// `<stage> - <n> items processed in <secs>s. <date>`
    pub fn timing(&self, stage: &str, items: usize, elapsed: Duration) {
        let line = format_timing(stage, items, elapsed);
        if let Err(err) = self.append_line(&line) {
            warn!(log = %self.path.display(), error = %err, "failed to append timing record");
        }
    }
}

pub(crate) fn format_timing(stage: &str, items: usize, elapsed: Duration) -> String {
    format!(
        "{stage} - {items} items processed in {:.2}s. {}",
        elapsed.as_secs_f64(),
        Local::now().format("%Y-%m-%d")
    )
}

/// The four durable logs of a project.
#[derive(Debug)]
pub struct Journals {
    pub processing: Journal,
    pub fingerprinting: Journal,
    pub crossmatching: Journal,
    pub times: Journal,
}

impl Journals {
    pub fn open(layout: &ProjectLayout) -> io::Result<Self> {
        Ok(Self {
            processing: Journal::open(layout.log_file(PROCESSING_ERROR_LOG))?,
            fingerprinting: Journal::open(layout.log_file(FINGERPRINTING_ERROR_LOG))?,
            crossmatching: Journal::open(layout.log_file(CROSSMATCHING_ERROR_LOG))?,
            times: Journal::open(layout.log_file(PROCESSING_TIMES_LOG))?,
        })
    }
}

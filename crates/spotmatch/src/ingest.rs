use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub copied: usize,
    /// Targets that already existed and were left alone.
    pub skipped: usize,
}

fn sorted_entries(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<io::Result<Vec<_>>>()?;
    entries.sort();
    Ok(entries)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Copies a `<date>/<individual>/<photo>` tree into `target` as
/// `<date>_<individual>_<n>.<ext>`, `n` counting from 1 in sorted order
/// within each individual folder. Existing targets are never overwritten.
pub fn ingest_tree(source: &Path, target: &Path) -> io::Result<IngestReport> {
    fs::create_dir_all(target)?;
    let mut report = IngestReport::default();

    for date_dir in sorted_entries(source)? {
        if !date_dir.is_dir() {
            continue;
        }
        let date = file_name(&date_dir);
        for individual_dir in sorted_entries(&date_dir)? {
            if !individual_dir.is_dir() {
                continue;
            }
            let individual = file_name(&individual_dir);
            let photos = sorted_entries(&individual_dir)?
                .into_iter()
                .filter(|path| path.is_file());
            for (index, photo) in photos.enumerate() {
                let extension = photo
                    .extension()
                    .map(|ext| format!(".{}", ext.to_string_lossy()))
                    .unwrap_or_default();
                let name = format!("{date}_{individual}_{}{extension}", index + 1);
                let destination = target.join(&name);
                if destination.exists() {
                    warn!(photo = %photo.display(), target = %name, "target exists, not copied");
                    report.skipped += 1;
                    continue;
                }
                fs::copy(&photo, &destination)?;
                debug!(photo = %photo.display(), target = %name, "ingested");
                report.copied += 1;
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn photos_are_renamed_by_date_individual_and_index() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("raw");
        let ind = source.join("05-20").join("C1CC-05");
        fs::create_dir_all(&ind).unwrap();
        fs::write(ind.join("IMG_002.jpg"), b"two").unwrap();
        fs::write(ind.join("IMG_001.jpg"), b"one").unwrap();
        fs::write(source.join("05-20").join("stray.txt"), b"x").unwrap();
        let target = dir.path().join("unprocessed_photos");

        let report = ingest_tree(&source, &target).unwrap();
        assert_eq!(report.copied, 2);
        assert_eq!(fs::read(target.join("05-20_C1CC-05_1.jpg")).unwrap(), b"one");
        assert_eq!(fs::read(target.join("05-20_C1CC-05_2.jpg")).unwrap(), b"two");

        fs::write(target.join("05-20_C1CC-05_1.jpg"), b"edited").unwrap();
        let again = ingest_tree(&source, &target).unwrap();
        assert_eq!(again.skipped, 2);
        assert_eq!(fs::read(target.join("05-20_C1CC-05_1.jpg")).unwrap(), b"edited");
    }
}

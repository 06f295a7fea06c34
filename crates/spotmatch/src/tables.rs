//! CSV tables exchanged with the people running the pipeline: sighting
//! catalogs in, candidate pair lists in and out, comparison results out.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use chrono::Local;
use csv::{ReaderBuilder, WriterBuilder};
use serde::Deserialize;
use spotmatch_types::{Algorithm, CandidatePair, SampleName, SightingRecord, SubjectKey};
use thiserror::Error;

use crate::stage::compare::ComparisonRow;

pub const PAIR_COLUMNS: [&str; 8] = [
    "focal_image",
    "test_image",
    "focal_name",
    "test_name",
    "focal_size",
    "focal_sex",
    "test_size",
    "test_sex",
];

#[derive(Debug, Error)]
pub enum TableError {
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed table {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("invalid {column} '{value}' in {}", .path.display())]
    InvalidNumber {
        path: PathBuf,
        column: &'static str,
        value: String,
    },
    #[error("{} has columns '{found}', expected '{expected}'", .path.display())]
    HeaderMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },
}

impl TableError {
    fn csv(path: &Path, source: csv::Error) -> Self {
        TableError::Csv {
            path: path.to_path_buf(),
            source,
        }
    }

    fn io(path: &Path, source: std::io::Error) -> Self {
        TableError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// `<stem>_<YYYY-MM-DD>.csv` for today's local date.
pub fn dated_file_name(stem: &str) -> String {
    format!("{stem}_{}.csv", Local::now().format("%Y-%m-%d"))
}

#[derive(Debug, Deserialize)]
struct CatalogRow {
    focal: String,
    #[serde(default)]
    datef: Option<String>,
    #[serde(default)]
    sex: Option<String>,
    #[serde(default)]
    size: Option<String>,
}

/// Reads a sighting catalog (`focal,datef,sex,size`). Extra columns are
/// ignored and empty cells are missing values.
pub fn read_catalog(path: &Path) -> Result<Vec<SightingRecord>, TableError> {
    let mut reader = ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|err| TableError::csv(path, err))?;
    let mut records = Vec::new();
    for row in reader.deserialize::<CatalogRow>() {
        let row = row.map_err(|err| TableError::csv(path, err))?;
        let mut record = SightingRecord::new(row.focal);
        if let Some(date) = row.datef.as_deref() {
            record = record.with_date(date);
        }
        if let Some(sex) = row.sex.filter(|sex| !sex.is_empty()) {
            record = record.with_sex(sex);
        }
        if let Some(size) = parse_number(path, "size", row.size)? {
            record = record.with_size(size);
        }
        records.push(record);
    }
    Ok(records)
}

/// Empty, `NA` and `NaN` cells are missing values.
fn parse_number(
    path: &Path,
    column: &'static str,
    raw: Option<String>,
) -> Result<Option<f64>, TableError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    if raw.is_empty() || raw.eq_ignore_ascii_case("na") || raw.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    raw.parse::<f64>()
        .map(Some)
        .map_err(|_| TableError::InvalidNumber {
            path: path.to_path_buf(),
            column,
            value: raw,
        })
}

fn optional_number(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn pair_fields(pair: &CandidatePair) -> [String; 8] {
    [
        pair.focal_image.to_string(),
        pair.test_image.to_string(),
        pair.focal_key.to_string(),
        pair.test_key.to_string(),
        optional_number(pair.focal_size),
        pair.focal_sex.clone().unwrap_or_default(),
        optional_number(pair.test_size),
        pair.test_sex.clone().unwrap_or_default(),
    ]
}

pub fn write_pairs(path: &Path, pairs: &[CandidatePair]) -> Result<(), TableError> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|err| TableError::csv(path, err))?;
    writer
        .write_record(PAIR_COLUMNS)
        .map_err(|err| TableError::csv(path, err))?;
    for pair in pairs {
        writer
            .write_record(pair_fields(pair))
            .map_err(|err| TableError::csv(path, err))?;
    }
    writer.flush().map_err(|err| TableError::io(path, err))
}

#[derive(Debug, Deserialize)]
struct PairRow {
    focal_image: String,
    test_image: String,
    #[serde(default)]
    focal_name: Option<String>,
    #[serde(default)]
    test_name: Option<String>,
    #[serde(default)]
    focal_size: Option<String>,
    #[serde(default)]
    focal_sex: Option<String>,
    #[serde(default)]
    test_size: Option<String>,
    #[serde(default)]
    test_sex: Option<String>,
}

/// Reads a pair list. Only `focal_image` and `test_image` are required; the
/// subject keys default to the ones embedded in the image names.
pub fn read_pairs(path: &Path) -> Result<Vec<CandidatePair>, TableError> {
    let mut reader = ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|err| TableError::csv(path, err))?;
    let mut pairs = Vec::new();
    for row in reader.deserialize::<PairRow>() {
        let row = row.map_err(|err| TableError::csv(path, err))?;
        let focal_image = SampleName::new(row.focal_image);
        let test_image = SampleName::new(row.test_image);
        let focal_key = non_empty(row.focal_name)
            .map(SubjectKey::new)
            .unwrap_or_else(|| focal_image.subject_key());
        let test_key = non_empty(row.test_name)
            .map(SubjectKey::new)
            .unwrap_or_else(|| test_image.subject_key());
        pairs.push(CandidatePair {
            focal_image,
            test_image,
            focal_key,
            test_key,
            focal_size: parse_number(path, "focal_size", row.focal_size)?,
            focal_sex: non_empty(row.focal_sex),
            test_size: parse_number(path, "test_size", row.test_size)?,
            test_sex: non_empty(row.test_sex),
        });
    }
    Ok(pairs)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn result_header(algorithms: &[Algorithm]) -> Vec<String> {
    let mut header: Vec<String> = PAIR_COLUMNS.iter().map(|c| c.to_string()).collect();
    header.extend(algorithms.iter().map(|a| a.score_column()));
    header.push("flag".to_string());
    header
}

/// Full or shortlisted comparison results: the pair columns, one
/// `<suffix>_values` column per algorithm (`NA` when unavailable), `flag`.
pub fn write_results(
    path: &Path,
    algorithms: &[Algorithm],
    rows: &[ComparisonRow],
) -> Result<(), TableError> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|err| TableError::csv(path, err))?;
    writer
        .write_record(result_header(algorithms))
        .map_err(|err| TableError::csv(path, err))?;
    for row in rows {
        let mut record: Vec<String> = pair_fields(&row.pair).into();
        record.extend(row.scores.iter().map(|score| score.to_string()));
        record.push(row.flag.as_str().to_string());
        writer
            .write_record(&record)
            .map_err(|err| TableError::csv(path, err))?;
    }
    writer.flush().map_err(|err| TableError::io(path, err))
}

fn self_comparison_header(algorithms: &[Algorithm]) -> Vec<String> {
    let mut header = vec!["focal_image".to_string(), "test_image".to_string()];
    header.extend(algorithms.iter().map(|a| a.score_column()));
    header.push("focal_name".to_string());
    header.push("test_name".to_string());
    header
}

/// Appends within-subject results. A new file gets a header; an existing
/// one must carry the same columns and is extended without repeating it.
pub fn append_self_comparisons(
    path: &Path,
    algorithms: &[Algorithm],
    rows: &[ComparisonRow],
) -> Result<(), TableError> {
    let header = self_comparison_header(algorithms);
    let exists = path.exists();
    if exists {
        let file = fs::File::open(path).map_err(|err| TableError::io(path, err))?;
        let mut first = String::new();
        BufReader::new(file)
            .read_line(&mut first)
            .map_err(|err| TableError::io(path, err))?;
        let expected = header.join(",");
        let found = first.trim_end();
        if !found.is_empty() && found != expected {
            return Err(TableError::HeaderMismatch {
                path: path.to_path_buf(),
                expected,
                found: found.to_string(),
            });
        }
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| TableError::io(path, err))?;
    let needs_header = file
        .metadata()
        .map(|meta| meta.len() == 0)
        .map_err(|err| TableError::io(path, err))?;
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
    if needs_header {
        writer
            .write_record(&header)
            .map_err(|err| TableError::csv(path, err))?;
    }
    for row in rows {
        let mut record = vec![row.pair.focal_image.to_string(), row.pair.test_image.to_string()];
        record.extend(row.scores.iter().map(|score| score.to_string()));
        record.push(row.pair.focal_key.to_string());
        record.push(row.pair.test_key.to_string());
        writer
            .write_record(&record)
            .map_err(|err| TableError::csv(path, err))?;
    }
    writer.flush().map_err(|err| TableError::io(path, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use spotmatch_types::{CaptureDate, ReviewFlag, Score};

    #[test]
    fn catalog_reads_missing_cells_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("focal.csv");
        fs::write(
            &path,
            "focal,datef,sex,size,id\n05-20_C1CC-05,2021-05-20,M,10,x\n05-21_A,2021-05-21,,NA,y\n",
        )
        .unwrap();
        let records = read_catalog(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].key.as_str(), "05-20_C1CC-05");
        assert_eq!(records[0].sex.as_deref(), Some("M"));
        assert_eq!(records[0].size, Some(10.0));
        assert!(matches!(records[0].date, Some(CaptureDate::Calendar(_))));
        assert_eq!(records[1].sex, None);
        assert_eq!(records[1].size, None);
    }

    #[test]
    fn non_numeric_size_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("focal.csv");
        fs::write(&path, "focal,datef,sex,size\nd_a,2021-01-01,M,big\n").unwrap();
        let err = read_catalog(&path).unwrap_err();
        assert!(matches!(err, TableError::InvalidNumber { column: "size", .. }));
    }

    #[test]
    fn pair_list_survives_a_write_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pairs.csv");
        let mut pair = CandidatePair::bare(SampleName::new("d1_a_1"), SampleName::new("d2_b_3"));
        pair.focal_size = Some(10.5);
        pair.test_sex = Some("F".to_string());
        write_pairs(&path, std::slice::from_ref(&pair)).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with(&PAIR_COLUMNS.join(",")));
        assert_eq!(read_pairs(&path).unwrap(), vec![pair]);
    }

    #[test]
    fn empty_pair_list_still_has_a_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pairs.csv");
        write_pairs(&path, &[]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap().trim_end(), PAIR_COLUMNS.join(","));
        assert!(read_pairs(&path).unwrap().is_empty());
    }

    #[test]
    fn results_render_unavailable_as_na() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        let row = ComparisonRow {
            pair: CandidatePair::bare(SampleName::new("d1_a_1"), SampleName::new("d1_b_1")),
            scores: vec![Score::Value(12.5), Score::Unavailable],
            flag: ReviewFlag::Unprocessed,
        };
        write_results(&path, &[Algorithm::Sift, Algorithm::Orb], &[row]).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].ends_with("sift_values,orb_values,flag"));
        assert!(lines[1].ends_with("12.5,NA,unprocessed"));
    }

    #[test]
    fn self_comparisons_append_without_repeating_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("self.csv");
        let row = ComparisonRow {
            pair: CandidatePair::bare(SampleName::new("d1_a_1"), SampleName::new("d1_a_2")),
            scores: vec![Score::Value(3.0)],
            flag: ReviewFlag::Unprocessed,
        };
        append_self_comparisons(&path, &[Algorithm::Akaze], std::slice::from_ref(&row)).unwrap();
        append_self_comparisons(&path, &[Algorithm::Akaze], &[row]).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "focal_image,test_image,akaze_values,focal_name,test_name");
        assert_eq!(lines[1], "d1_a_1,d1_a_2,3,d1_a,d1_a");

        let err = append_self_comparisons(&path, &[Algorithm::Orb], &[]).unwrap_err();
        assert!(matches!(err, TableError::HeaderMismatch { .. }));
    }
}

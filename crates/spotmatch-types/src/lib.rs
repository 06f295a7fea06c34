//! Shared domain models for the spotmatch workspace.
//!
//! This crate centralizes the lightweight data structures passed between the
//! segmentation, comparison and orchestration crates. Keep it free of image
//! and filesystem dependencies so every crate can depend on it cheaply.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;

/// Placeholder written in place of a test image when a focal subject has no
/// candidates left after filtering.
pub const NO_MATCH_PLACEHOLDER: &str = "No matching";

/// Stable identifier of a normalized sample, derived from the source photo
/// file name without its extension (`05-20_C1CC-05_3.jpg` -> `05-20_C1CC-05_3`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SampleName(String);

impl SampleName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Everything before the first `.` is kept, matching how photos are named
    /// on disk (`date_subject_index.ext`).
    pub fn from_file_name(file_name: &str) -> Self {
        let stem = file_name.split('.').next().unwrap_or(file_name);
        Self(stem.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Subject key embedded in the name: the first two `_`-separated fields.
    pub fn subject_key(&self) -> SubjectKey {
        SubjectKey(self.0.split('_').take(2).collect::<Vec<_>>().join("_"))
    }
}

impl fmt::Display for SampleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SampleName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// `date_subject` key identifying one subject on one capture occasion.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SubjectKey(String);

impl SubjectKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn field(&self, index: usize) -> Option<&str> {
        self.0.split('_').nth(index)
    }

    /// True when the sample's first two name fields equal this key's first two
    /// fields. A key without a second field never matches.
    pub fn owns_sample(&self, sample: &SampleName) -> bool {
        let mut fields = sample.as_str().split('_');
        match (self.field(0), self.field(1), fields.next(), fields.next()) {
            (Some(date), Some(name), Some(sample_date), Some(sample_name)) => {
                date == sample_date && name == sample_name
            }
            _ => false,
        }
    }

    /// Loose membership used when expanding query subjects: the key only has
    /// to appear somewhere in the sample name.
    pub fn embedded_in(&self, sample: &SampleName) -> bool {
        !self.0.is_empty() && sample.as_str().contains(self.0.as_str())
    }
}

impl fmt::Display for SubjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Capture date of a sighting. Calendar dates compare chronologically; any
/// value that does not parse is kept verbatim and compared as text. A
/// calendar date compared against text uses its `%Y-%m-%d` rendering.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CaptureDate {
    Calendar(NaiveDate),
    Text(String),
}

impl Ord for CaptureDate {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (CaptureDate::Calendar(left), CaptureDate::Calendar(right)) => left.cmp(right),
            (CaptureDate::Text(left), CaptureDate::Text(right)) => left.cmp(right),
            // equal renderings still differ as values; calendar sorts first
            (CaptureDate::Calendar(_), CaptureDate::Text(_)) => {
                self.to_string().cmp(&other.to_string()).then(Ordering::Less)
            }
            (CaptureDate::Text(_), CaptureDate::Calendar(_)) => {
                self.to_string().cmp(&other.to_string()).then(Ordering::Greater)
            }
        }
    }
}

impl PartialOrd for CaptureDate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d-%m-%Y"];

impl CaptureDate {
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        for format in DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
                return Some(CaptureDate::Calendar(date));
            }
        }
        Some(CaptureDate::Text(trimmed.to_string()))
    }
}

impl fmt::Display for CaptureDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureDate::Calendar(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            CaptureDate::Text(text) => f.write_str(text),
        }
    }
}

/// One row of a sighting catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct SightingRecord {
    pub key: SubjectKey,
    pub date: Option<CaptureDate>,
    pub sex: Option<String>,
    pub size: Option<f64>,
}

impl SightingRecord {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: SubjectKey::new(key),
            date: None,
            sex: None,
            size: None,
        }
    }

    pub fn with_date(mut self, raw: &str) -> Self {
        self.date = CaptureDate::parse(raw);
        self
    }

    pub fn with_sex(mut self, sex: impl Into<String>) -> Self {
        self.sex = Some(sex.into());
        self
    }

    pub fn with_size(mut self, size: f64) -> Self {
        self.size = Some(size);
        self
    }
}

/// Distance used when matching descriptors of an algorithm family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// Euclidean distance over `f32` components.
    L2,
    /// Bit count of the XOR over `u8` components.
    Hamming,
}

/// Descriptor families a sample can be fingerprinted and compared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Algorithm {
    Surf,
    Sift,
    Orb,
    Akaze,
}

impl Algorithm {
    pub const ALL: [Algorithm; 4] = [
        Algorithm::Surf,
        Algorithm::Sift,
        Algorithm::Orb,
        Algorithm::Akaze,
    ];

    pub fn metric(self) -> Metric {
        match self {
            Algorithm::Surf | Algorithm::Sift => Metric::L2,
            Algorithm::Orb | Algorithm::Akaze => Metric::Hamming,
        }
    }

    /// Storage suffix used in descriptor file names and result columns.
    pub fn suffix(self) -> &'static str {
        match self {
            Algorithm::Surf => "surf",
            Algorithm::Sift => "sift",
            Algorithm::Orb => "orb",
            Algorithm::Akaze => "akaze",
        }
    }

    pub fn descriptor_file_name(self, sample: &SampleName) -> String {
        format!("{}_{}_mask.txt", sample.as_str(), self.suffix())
    }

    pub fn score_column(self) -> String {
        format!("{}_values", self.suffix())
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

#[derive(Debug, Error)]
#[error("unknown comparison algorithm '{0}'")]
pub struct AlgorithmParseError(pub String);

impl FromStr for Algorithm {
    type Err = AlgorithmParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let base = lower
            .strip_suffix("_compare")
            .or_else(|| lower.strip_suffix("_fingerprint"))
            .unwrap_or(lower.as_str());
        match base {
            "surf" => Ok(Algorithm::Surf),
            "sift" => Ok(Algorithm::Sift),
            "orb" => Ok(Algorithm::Orb),
            "akaze" => Ok(Algorithm::Akaze),
            _ => Err(AlgorithmParseError(lower)),
        }
    }
}

/// Dissimilarity produced by one algorithm for one pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Score {
    Value(f64),
    Unavailable,
}

impl Score {
    pub fn value(self) -> Option<f64> {
        match self {
            Score::Value(value) if value.is_finite() => Some(value),
            _ => None,
        }
    }

    /// Available scores sort before unavailable ones.
    pub fn rank_cmp(&self, other: &Score) -> Ordering {
        match (self.value(), other.value()) {
            (Some(a), Some(b)) => a.total_cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value() {
            Some(value) => write!(f, "{value}"),
            None => f.write_str("NA"),
        }
    }
}

/// Human-review state of a comparison row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReviewFlag {
    #[default]
    Unprocessed,
    Processed,
    Match,
}

impl ReviewFlag {
    pub fn as_str(self) -> &'static str {
        match self {
            ReviewFlag::Unprocessed => "unprocessed",
            ReviewFlag::Processed => "processed",
            ReviewFlag::Match => "match",
        }
    }
}

impl FromStr for ReviewFlag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "unprocessed" | "" => Ok(ReviewFlag::Unprocessed),
            "processed" => Ok(ReviewFlag::Processed),
            "match" => Ok(ReviewFlag::Match),
            other => Err(format!("unknown review flag '{other}'")),
        }
    }
}

/// Unordered identity of two samples; `(a, b)` and `(b, a)` produce equal keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PairKey {
    low: SampleName,
    high: SampleName,
}

impl PairKey {
    pub fn new(a: &SampleName, b: &SampleName) -> Self {
        if a <= b {
            Self {
                low: a.clone(),
                high: b.clone(),
            }
        } else {
            Self {
                low: b.clone(),
                high: a.clone(),
            }
        }
    }

    pub fn is_self_pair(&self) -> bool {
        self.low == self.high
    }
}

/// Two samples to compare, with the catalog metadata carried for display.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidatePair {
    pub focal_image: SampleName,
    pub test_image: SampleName,
    pub focal_key: SubjectKey,
    pub test_key: SubjectKey,
    pub focal_size: Option<f64>,
    pub focal_sex: Option<String>,
    pub test_size: Option<f64>,
    pub test_sex: Option<String>,
}

impl CandidatePair {
    /// Pair between two photo instances with no catalog metadata, as used by
    /// the within-subject assessment.
    pub fn bare(focal_image: SampleName, test_image: SampleName) -> Self {
        let focal_key = focal_image.subject_key();
        let test_key = test_image.subject_key();
        Self {
            focal_image,
            test_image,
            focal_key,
            test_key,
            focal_size: None,
            focal_sex: None,
            test_size: None,
            test_sex: None,
        }
    }

    pub fn key(&self) -> PairKey {
        PairKey::new(&self.focal_image, &self.test_image)
    }

    pub fn is_placeholder(&self) -> bool {
        self.test_image.as_str() == NO_MATCH_PLACEHOLDER
    }
}

/// Failure categories written into durable error logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Load,
    Segmentation,
    Geometry,
    SizeOutOfRange,
    DuplicateOutput,
    DescriptorMissing,
    DescriptorCorrupt,
    Extraction,
    Storage,
    Panic,
}

impl ErrorClass {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorClass::Load => "load",
            ErrorClass::Segmentation => "segmentation",
            ErrorClass::Geometry => "geometry",
            ErrorClass::SizeOutOfRange => "size_out_of_range",
            ErrorClass::DuplicateOutput => "duplicate_output",
            ErrorClass::DescriptorMissing => "descriptor_missing",
            ErrorClass::DescriptorCorrupt => "descriptor_corrupt",
            ErrorClass::Extraction => "extraction",
            ErrorClass::Storage => "storage",
            ErrorClass::Panic => "panic",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable entry of an append-only error log.
#[derive(Debug, Clone)]
pub struct ErrorRecord {
    pub subject: String,
    pub class: ErrorClass,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorRecord {
    pub fn new(subject: impl Into<String>, class: ErrorClass, message: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            class,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    /// Single-line rendering; embedded line breaks are flattened so one record
    /// always occupies exactly one line.
    pub fn to_log_line(&self) -> String {
        let message = self.message.replace(['\n', '\r'], " ");
        format!(
            "{}\t{}\t{}\t{}",
            self.timestamp.to_rfc3339(),
            self.subject,
            self.class,
            message
        )
    }
}

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use spotmatch_compare::ExtractorSettings;
use spotmatch_segment::{
    BlobOptions, ColorRange, Hsv, RegionOptions, SegmentationConfig,
};
use thiserror::Error;

/// Parameter file written by `init`. Every key is optional when read back.
pub const DEFAULT_PARAMETERS_TOML: &str = "\
# Color range of the patterned region (8-bit HSV, hue in 0..=179)
hue_low = 0
saturation_low = 0
value_low = 0
hue_high = 179
saturation_high = 255
value_high = 255

# Segmentation
kernel_size = 11
threshold_value = 50
num_patches = 4
min_area = 7500
mult = 1.1

# Size gate: normalized samples above this many pixels are set aside
cutoff_size = 10000000

# Candidate pairs and comparison
size_offset = 100
number_comparisons_considered = 20
chunk_size = 100000

# Descriptor extraction
hessian_threshold = 500
n_features = 1000
akaze_threshold = 0.001
";

const DEFAULT_CUTOFF_SIZE: u64 = 10_000_000;
const DEFAULT_SIZE_OFFSET: f64 = 100.0;
const DEFAULT_SHORTLIST_SIZE: usize = 20;
const DEFAULT_CHUNK_SIZE: usize = 100_000;

const HUE_MAX: f64 = 179.0;
const CHANNEL_MAX: f64 = 255.0;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    hue_low: Option<f64>,
    saturation_low: Option<f64>,
    value_low: Option<f64>,
    hue_high: Option<f64>,
    saturation_high: Option<f64>,
    value_high: Option<f64>,
    kernel_size: Option<f64>,
    threshold_value: Option<f64>,
    num_patches: Option<f64>,
    min_area: Option<f64>,
    mult: Option<f64>,
    cutoff_size: Option<f64>,
    size_offset: Option<f64>,
    number_comparisons_considered: Option<f64>,
    chunk_size: Option<f64>,
    hessian_threshold: Option<f64>,
    n_features: Option<f64>,
    akaze_threshold: Option<f64>,
    jobs: Option<f64>,
}

/// Immutable run configuration threaded into every stage.
#[derive(Debug, Clone)]
pub struct EffectiveSettings {
    pub segmentation: SegmentationConfig,
    /// Largest accepted normalized area (height × width) in pixels.
    pub cutoff_size: u64,
    /// Size tolerance used by the candidate size filter.
    pub size_offset: f64,
    /// Rows kept per focal subject and algorithm in the shortlist.
    pub shortlist_size: usize,
    pub chunk_size: usize,
    pub extractor: ExtractorSettings,
    pub jobs: usize,
    pub config_path: Option<PathBuf>,
}

impl Default for EffectiveSettings {
    fn default() -> Self {
        Self {
            segmentation: SegmentationConfig::default(),
            cutoff_size: DEFAULT_CUTOFF_SIZE,
            size_offset: DEFAULT_SIZE_OFFSET,
            shortlist_size: DEFAULT_SHORTLIST_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            extractor: ExtractorSettings::default(),
            jobs: default_jobs(),
            config_path: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value '{value}' for '{field}'{}", describe_path(.path.as_deref()))]
    InvalidValue {
        path: Option<PathBuf>,
        field: &'static str,
        value: String,
    },
    #[error("config file {} does not exist", .path.display())]
    NotFound { path: PathBuf },
}

fn describe_path(path: Option<&Path>) -> String {
    path.map(|path| format!(" in {}", path.display()))
        .unwrap_or_default()
}

/// Default location of a project's parameter file.
pub fn project_config_path(project: &Path) -> PathBuf {
    project.join("data").join("parameters.toml")
}

/// Loads `--config` (or the project's parameter file) and applies CLI
/// overrides. A missing file aborts the run.
pub fn resolve_settings(
    config: Option<&Path>,
    jobs: Option<usize>,
    project: &Path,
) -> Result<EffectiveSettings, ConfigError> {
    let path = config
        .map(Path::to_path_buf)
        .unwrap_or_else(|| project_config_path(project));
    let file = load_config(&path)?;
    merge(jobs, file, Some(path))
}

fn load_config(path: &Path) -> Result<FileConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&contents, path)
}

fn parse_config(contents: &str, path: &Path) -> Result<FileConfig, ConfigError> {
    toml::from_str(contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads a parameter table given as text; used by tests and tooling that
/// keep parameters outside a project.
pub fn settings_from_str(
    contents: &str,
    jobs: Option<usize>,
) -> Result<EffectiveSettings, ConfigError> {
    let file = parse_config(contents, Path::new("<inline>"))?;
    merge(jobs, file, None)
}

struct Validator<'a> {
    path: Option<&'a PathBuf>,
}

impl Validator<'_> {
    fn invalid(&self, field: &'static str, value: f64) -> ConfigError {
        ConfigError::InvalidValue {
            path: self.path.cloned(),
            field,
            value: value.to_string(),
        }
    }

    /// Whole number within `min..=max`.
    fn integer(
        &self,
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    ) -> Result<f64, ConfigError> {
        if !value.is_finite() || value.fract() != 0.0 || value < min || value > max {
            return Err(self.invalid(field, value));
        }
        Ok(value)
    }

    fn channel(&self, field: &'static str, value: f64, max: f64) -> Result<u8, ConfigError> {
        Ok(self.integer(field, value, 0.0, max)? as u8)
    }

    fn positive(&self, field: &'static str, value: f64) -> Result<f64, ConfigError> {
        if !value.is_finite() || value <= 0.0 {
            return Err(self.invalid(field, value));
        }
        Ok(value)
    }

    fn non_negative(&self, field: &'static str, value: f64) -> Result<f64, ConfigError> {
        if !value.is_finite() || value < 0.0 {
            return Err(self.invalid(field, value));
        }
        Ok(value)
    }
}

fn merge(
    cli_jobs: Option<usize>,
    file: FileConfig,
    config_path: Option<PathBuf>,
) -> Result<EffectiveSettings, ConfigError> {
    let check = Validator {
        path: config_path.as_ref(),
    };
    let defaults = EffectiveSettings::default();
    let seg = &defaults.segmentation;

    let lower = Hsv::new(
        check.channel("hue_low", file.hue_low.unwrap_or(0.0), HUE_MAX)?,
        check.channel("saturation_low", file.saturation_low.unwrap_or(0.0), CHANNEL_MAX)?,
        check.channel("value_low", file.value_low.unwrap_or(0.0), CHANNEL_MAX)?,
    );
    let upper = Hsv::new(
        check.channel("hue_high", file.hue_high.unwrap_or(HUE_MAX), HUE_MAX)?,
        check.channel(
            "saturation_high",
            file.saturation_high.unwrap_or(CHANNEL_MAX),
            CHANNEL_MAX,
        )?,
        check.channel("value_high", file.value_high.unwrap_or(CHANNEL_MAX), CHANNEL_MAX)?,
    );
    if lower.h > upper.h {
        return Err(check.invalid("hue_low", lower.h as f64));
    }
    if lower.s > upper.s {
        return Err(check.invalid("saturation_low", lower.s as f64));
    }
    if lower.v > upper.v {
        return Err(check.invalid("value_low", lower.v as f64));
    }

    let kernel_size = match file.kernel_size {
        Some(value) => {
            let value = check.integer("kernel_size", value, 1.0, u32::MAX as f64)?;
            if value as u32 % 2 == 0 {
                return Err(check.invalid("kernel_size", value));
            }
            value as u32
        }
        None => seg.region.kernel_size,
    };
    let threshold = match file.threshold_value {
        Some(value) => check.channel("threshold_value", value, CHANNEL_MAX)?,
        None => seg.region.threshold,
    };
    let max_blobs = match file.num_patches {
        Some(value) => check.integer("num_patches", value, 1.0, u32::MAX as f64)? as usize,
        None => seg.blobs.max_blobs,
    };
    let min_area = match file.min_area {
        Some(value) => check.integer("min_area", value, 0.0, u32::MAX as f64)? as usize,
        None => seg.blobs.min_area,
    };
    let mult = match file.mult {
        Some(value) => check.positive("mult", value)?,
        None => seg.mult,
    };

    let cutoff_size = match file.cutoff_size {
        Some(value) => check.integer("cutoff_size", value, 0.0, u64::MAX as f64)? as u64,
        None => defaults.cutoff_size,
    };
    let size_offset = match file.size_offset {
        Some(value) => check.non_negative("size_offset", value)?,
        None => defaults.size_offset,
    };
    let shortlist_size = match file.number_comparisons_considered {
        Some(value) => {
            check.integer("number_comparisons_considered", value, 0.0, u32::MAX as f64)? as usize
        }
        None => defaults.shortlist_size,
    };
    let chunk_size = match file.chunk_size {
        Some(value) => check.integer("chunk_size", value, 1.0, u32::MAX as f64)? as usize,
        None => defaults.chunk_size,
    };

    let mut extractor = defaults.extractor;
    if let Some(value) = file.hessian_threshold {
        extractor.hessian_threshold = check.non_negative("hessian_threshold", value)?;
    }
    if let Some(value) = file.n_features {
        extractor.n_features = check.integer("n_features", value, 1.0, u32::MAX as f64)? as u32;
    }
    if let Some(value) = file.akaze_threshold {
        extractor.akaze_threshold = check.non_negative("akaze_threshold", value)?;
    }

    let jobs = match cli_jobs {
        Some(0) => {
            return Err(ConfigError::InvalidValue {
                path: None,
                field: "jobs",
                value: "0".to_string(),
            });
        }
        Some(value) => value,
        None => match file.jobs {
            Some(value) => check.integer("jobs", value, 1.0, u16::MAX as f64)? as usize,
            None => defaults.jobs,
        },
    };

    Ok(EffectiveSettings {
        segmentation: SegmentationConfig {
            region: RegionOptions {
                range: ColorRange { lower, upper },
                kernel_size,
                threshold,
            },
            blobs: BlobOptions {
                max_blobs,
                min_area,
            },
            mult,
        },
        cutoff_size,
        size_offset,
        shortlist_size,
        chunk_size,
        extractor,
        jobs,
        config_path,
    })
}

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

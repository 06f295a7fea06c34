use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use spotmatch_compare::{DescriptorExtractor, DescriptorStore, PairScorer};
use spotmatch_types::Algorithm;
use thiserror::Error;
use tracing::info;

use crate::cli::{CliArgs, Command, InputDir};
use crate::ingest::{IngestReport, ingest_tree};
use crate::journal::Journals;
use crate::layout::ProjectLayout;
use crate::progress::{batch_bar, pair_bar};
use crate::settings::{ConfigError, EffectiveSettings, resolve_settings};
use crate::stage::compare::{ComparisonEngine, ComparisonRun};
use crate::stage::fingerprint::{FingerprintBatch, FingerprintReport};
use crate::stage::normalize::{BatchNormalizer, NormalizeReport, list_photos};
use crate::stage::pairs::{PairFilters, PairList, generate_pairs};
use crate::stage::self_compare::{group_by_subject, unique_pairs, within_subject_pairs};
use crate::stage::shortlist::shortlist;
use crate::stage::{build_pool, list_samples};
use crate::tables::{
    TableError, append_self_comparisons, dated_file_name, read_catalog, read_pairs, write_pairs,
    write_results,
};

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Table(#[from] TableError),
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

fn io_context(context: impl Into<String>) -> impl FnOnce(io::Error) -> RunError {
    let context = context.into();
    move |source| RunError::Io { context, source }
}

/// Files written by a comparison run.
#[derive(Debug)]
pub struct CompareOutput {
    pub results: PathBuf,
    pub shortlist: PathBuf,
    pub compared: usize,
    pub unavailable: usize,
}

/// An opened project: resolved settings, durable logs and the worker pool.
pub struct Project {
    layout: ProjectLayout,
    settings: EffectiveSettings,
    journals: Journals,
    pool: rayon::ThreadPool,
}

impl Project {
    /// Settings are resolved first, so a missing or invalid parameter file
    /// aborts before any work is dispatched.
    pub fn open(
        project: &Path,
        config: Option<&Path>,
        jobs: Option<usize>,
    ) -> Result<Self, RunError> {
        let settings = resolve_settings(config, jobs, project)?;
        let layout = ProjectLayout::new(project);
        layout
            .ensure_directories()
            .map_err(io_context(format!("failed to prepare {}", project.display())))?;
        let journals =
            Journals::open(&layout).map_err(io_context("failed to open project logs"))?;
        let pool = build_pool(settings.jobs)?;
        info!(
            project = %project.display(),
            jobs = settings.jobs,
            config = ?settings.config_path,
            "project opened"
        );
        Ok(Self {
            layout,
            settings,
            journals,
            pool,
        })
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    pub fn settings(&self) -> &EffectiveSettings {
        &self.settings
    }

    /// Normalizes every photograph of `input` and routes the results.
    pub fn normalize(&self, input: InputDir) -> Result<NormalizeReport, RunError> {
        let dir = match input {
            InputDir::UnprocessedPhotos => self.layout.unprocessed_photos(),
            InputDir::Temp => self.layout.temp(),
        };
        let photos = list_photos(&dir).map_err(io_context(format!(
            "failed to list {} photos",
            input.as_str()
        )))?;

        self.journals.processing.header("Cropping and rotating images");
        let started = Instant::now();
        let bar = batch_bar("normalize", photos.len() as u64);
        let batch = BatchNormalizer::new(&self.settings, &self.layout, &self.journals.processing);
        let report = batch.run(&photos, &self.pool, &bar);
        bar.finish_and_clear();

        self.journals
            .times
            .timing("Crop and rotate", report.processed, started.elapsed());
        info!(
            processed = report.processed,
            stored = report.stored,
            oversized = report.oversized,
            duplicates = report.duplicates,
            failed = report.failed,
            "normalization finished"
        );
        Ok(report)
    }

    /// Runs `extractors` over every stored sample. Samples that fail any
    /// extractor are moved under `processing_errors/fingerprinting`.
    pub fn extract_fingerprints(
        &self,
        extractors: &[Box<dyn DescriptorExtractor>],
    ) -> Result<FingerprintReport, RunError> {
        let samples = list_samples(&self.layout.fingerprints())
            .map_err(io_context("failed to list stored samples"))?;
        self.journals.fingerprinting.header("Extracting fingerprints");
        let started = Instant::now();
        let bar = batch_bar("fingerprint", samples.len() as u64);
        let batch = FingerprintBatch::new(&self.layout, extractors, &self.journals.fingerprinting);
        let report = batch.run(&samples, &self.pool, &bar);
        bar.finish_and_clear();

        self.journals
            .times
            .timing("Fingerprinting", report.processed, started.elapsed());
        info!(
            extracted = report.extracted,
            relocated = report.relocated,
            "fingerprinting finished"
        );
        Ok(report)
    }

    /// Writes `data/pairwise_comparison_list_<date>.csv` and returns its path.
    pub fn pairs(
        &self,
        focal: &Path,
        query: &Path,
        filters: &PairFilters,
    ) -> Result<PathBuf, RunError> {
        let started = Instant::now();
        let focal = read_catalog(&self.layout.data_file(focal))?;
        let query = read_catalog(&self.layout.data_file(query))?;
        let samples = list_samples(&self.layout.fingerprints())
            .map_err(io_context("failed to list stored samples"))?;

        let list = generate_pairs(&focal, &query, &samples, filters);
        let placeholders = list.placeholder_count();
        let candidates = list.candidate_count();
        let PairList { rows } = list;

        let path = self
            .layout
            .data()
            .join(dated_file_name("pairwise_comparison_list"));
        write_pairs(&path, &rows)?;

        self.journals
            .times
            .timing("Pairwise list", rows.len(), started.elapsed());
        info!(
            candidates,
            placeholders,
            path = %path.display(),
            "pair list written"
        );
        Ok(path)
    }

    /// Filters for the candidate generator, taking the size tolerance from
    /// the project settings.
    pub fn pair_filters(
        &self,
        by_sex: bool,
        by_size: bool,
        date: crate::stage::pairs::DateFilter,
    ) -> PairFilters {
        PairFilters {
            by_sex,
            by_size,
            date,
            size_offset: self.settings.size_offset,
        }
    }

    fn engine(&self, algorithms: &[Algorithm]) -> ComparisonEngine<'_> {
        let scorer = PairScorer::new(DescriptorStore::new(self.layout.fingerprints()), algorithms);
        ComparisonEngine::new(scorer, self.settings.chunk_size, &self.journals.crossmatching)
    }

    /// Scores a pair list and writes the full and shortlisted result tables.
    pub fn compare(
        &self,
        pairs_file: &Path,
        algorithms: &[Algorithm],
    ) -> Result<CompareOutput, RunError> {
        let pairs = read_pairs(&self.layout.data_file(pairs_file))?;
        let engine = self.engine(algorithms);
        let algorithms = engine.algorithms().to_vec();
        info!(pairs = pairs.len(), "running pairwise comparisons");
        self.journals.crossmatching.header(&comparison_header(&algorithms));

        let started = Instant::now();
        let bar = pair_bar("compare", pairs.len() as u64);
        let ComparisonRun {
            rows,
            compared,
            unavailable,
        } = engine.run(pairs, &self.pool, &bar);
        bar.finish_and_clear();

        let results = self.layout.data().join(dated_file_name("comparison_results"));
        write_results(&results, &algorithms, &rows)?;
        let kept = shortlist(&rows, self.settings.shortlist_size);
        let filtered = self
            .layout
            .data()
            .join(dated_file_name("filtered_comparison_results"));
        write_results(&filtered, &algorithms, &kept)?;

        self.journals
            .times
            .timing("Pairwise comparisons", compared, started.elapsed());
        info!(
            compared,
            unavailable,
            shortlisted = kept.len(),
            results = %results.display(),
            "comparisons finished"
        );
        Ok(CompareOutput {
            results,
            shortlist: filtered,
            compared,
            unavailable,
        })
    }

    /// Compares every pair of stored photos sharing a subject key and
    /// appends them to `data/self_comparisons_<date>.csv`.
    pub fn self_compare(&self, algorithms: &[Algorithm]) -> Result<PathBuf, RunError> {
        let samples = list_samples(&self.layout.fingerprints())
            .map_err(io_context("failed to list stored samples"))?;
        let groups = group_by_subject(&samples);
        let pairs = unique_pairs(within_subject_pairs(&groups));

        let engine = self.engine(algorithms);
        let algorithms = engine.algorithms().to_vec();
        self.journals.crossmatching.header(&comparison_header(&algorithms));

        let started = Instant::now();
        let bar = pair_bar("self", pairs.len() as u64);
        let outcome = engine.run(pairs, &self.pool, &bar);
        bar.finish_and_clear();

        let path = self.layout.data().join(dated_file_name("self_comparisons"));
        append_self_comparisons(&path, &algorithms, &outcome.rows)?;
        self.journals.times.timing(
            "Within-individual comparisons",
            outcome.compared,
            started.elapsed(),
        );
        info!(
            subjects = groups.len(),
            pairs = outcome.compared,
            path = %path.display(),
            "self comparisons written"
        );
        Ok(path)
    }
}

fn comparison_header(algorithms: &[Algorithm]) -> String {
    let names: Vec<&str> = algorithms.iter().map(|a| a.suffix()).collect();
    format!("Performing pairwise comparisons for: {}", names.join(", "))
}

/// Creates a project's layout, logs and default parameter file.
pub fn init_project(project: &Path) -> Result<(), RunError> {
    ProjectLayout::new(project)
        .init()
        .map_err(io_context(format!("failed to initialise {}", project.display())))?;
    info!(project = %project.display(), "project initialised");
    Ok(())
}

pub fn ingest_photos(source: &Path, project: &Path) -> Result<IngestReport, RunError> {
    let layout = ProjectLayout::new(project);
    let started = Instant::now();
    let report = ingest_tree(source, &layout.unprocessed_photos())
        .map_err(io_context(format!("failed to ingest {}", source.display())))?;
    info!(copied = report.copied, skipped = report.skipped, "photos ingested");
    if layout.logs().is_dir() {
        let journals = Journals::open(&layout).map_err(io_context("failed to open project logs"))?;
        journals
            .times
            .timing("Photo ingestion", report.copied, started.elapsed());
    }
    Ok(report)
}

pub fn run(cli: CliArgs) -> Result<(), RunError> {
    let config = cli.config.as_deref();
    match cli.command {
        Command::Init { project } => init_project(&project),
        Command::Ingest { source, project } => ingest_photos(&source, &project).map(|_| ()),
        Command::Normalize { project, input } => {
            Project::open(&project, config, cli.jobs)?.normalize(input)?;
            Ok(())
        }
        Command::Pairs {
            project,
            focal,
            query,
            filter_sex,
            filter_size,
            date_filter,
        } => {
            let project = Project::open(&project, config, cli.jobs)?;
            let filters = project.pair_filters(filter_sex, filter_size, date_filter.into());
            project.pairs(&focal, &query, &filters)?;
            Ok(())
        }
        Command::Compare {
            project,
            pairs,
            algorithms,
        } => {
            Project::open(&project, config, cli.jobs)?.compare(&pairs, &algorithms)?;
            Ok(())
        }
        Command::SelfCompare {
            project,
            algorithms,
        } => {
            Project::open(&project, config, cli.jobs)?.self_compare(&algorithms)?;
            Ok(())
        }
    }
}

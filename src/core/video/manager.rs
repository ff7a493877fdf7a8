//! 批量抽帧管理器

use super::config::ExtractionConfig;
use super::error::ExtractError;
use super::selector::{KeyframeSelector, SelectionStats};
use super::source::{has_extension, source_name, FrameSource, SourceOpener};
use super::store::FrameStore;
use log::{error, info, warn};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv"];

/// Lists the videos to process: the file itself, or the supported files of a
/// directory in alphabetical order of file name.
pub fn discover_videos(input: &Path) -> Result<Vec<PathBuf>, ExtractError> {
    if input.is_file() {
        if has_extension(input, VIDEO_EXTENSIONS) {
            return Ok(vec![input.to_path_buf()]);
        }
        return Err(ExtractError::UnsupportedInput(input.to_path_buf()));
    }
    if !input.is_dir() {
        return Err(ExtractError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("path not found: {}", input.display()),
        )));
    }

    let mut videos = Vec::new();
    for entry in std::fs::read_dir(input)? {
        let path = entry?.path();
        if path.is_file() && has_extension(&path, VIDEO_EXTENSIONS) {
            videos.push(path);
        }
    }
    videos.sort_by_cached_key(|p| {
        let name = p
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        (name.to_lowercase(), name)
    });

    if videos.is_empty() {
        return Err(ExtractError::NoVideos(input.to_path_buf()));
    }
    Ok(videos)
}

/// Output subdirectory name for each input, in input order.
///
/// Inputs sharing a file stem (`talk.mp4`, `talk.mov`) get the extension
/// appended (`talk_mp4`, `talk_mov`); any remaining clash gets a numeric
/// suffix. Names are compared case-insensitively.
pub fn output_names(inputs: &[PathBuf]) -> Vec<String> {
    let stems: Vec<String> = inputs.iter().map(|p| source_name(p)).collect();
    let mut stem_counts: HashMap<String, usize> = HashMap::new();
    for stem in &stems {
        *stem_counts.entry(stem.to_lowercase()).or_insert(0) += 1;
    }

    let mut taken = HashSet::new();
    stems
        .into_iter()
        .zip(inputs)
        .map(|(stem, input)| {
            let ext = input.extension().and_then(|e| e.to_str());
            let base = match ext {
                Some(ext) if stem_counts[&stem.to_lowercase()] > 1 => {
                    format!("{}_{}", stem, ext.to_lowercase())
                }
                _ => stem,
            };
            let mut name = base.clone();
            let mut n = 2;
            while !taken.insert(name.to_lowercase()) {
                name = format!("{}_{}", base, n);
                n += 1;
            }
            name
        })
        .collect()
}

/// 单个视频源的抽帧结果
#[derive(Debug, Clone)]
pub struct SourceSummary {
    pub name: String,
    pub stats: SelectionStats,
    pub frames: Vec<PathBuf>,
}

#[derive(Debug)]
pub struct SourceOutcome {
    pub input: PathBuf,
    pub name: String,
    pub result: Result<SourceSummary, ExtractError>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<SourceOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &SourceSummary> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = (&SourceOutcome, &ExtractError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o, e)))
    }

    pub fn total_frames(&self) -> usize {
        self.succeeded().map(|s| s.frames.len()).sum()
    }

    pub fn all_frames(&self) -> Vec<PathBuf> {
        self.succeeded().flat_map(|s| s.frames.iter().cloned()).collect()
    }
}

/// 提取统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    pub processed_frames: u64,
    pub extracted_frames: u64,
    pub failed_sources: u64,
}

/// 帧提取管理器
pub struct FrameExtractorManager {
    config: ExtractionConfig,
    store: FrameStore,
    parallelism: usize,
    stats: Arc<Mutex<ExtractionStats>>,
}

impl FrameExtractorManager {
    pub fn new(
        config: ExtractionConfig,
        output_root: impl Into<PathBuf>,
    ) -> Result<Self, ExtractError> {
        config.validate()?;
        let store = FrameStore::new(output_root, &config);
        Ok(Self {
            config,
            store,
            parallelism: num_cpus::get().min(4),
            stats: Arc::new(Mutex::new(ExtractionStats::default())),
        })
    }

    /// Number of sources processed at once. `1` keeps the run sequential.
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.set_parallelism(parallelism);
        self
    }

    pub fn set_parallelism(&mut self, parallelism: usize) {
        self.parallelism = parallelism.max(1);
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn store(&self) -> &FrameStore {
        &self.store
    }

    pub fn get_stats(&self) -> ExtractionStats {
        self.stats.lock().map(|s| *s).unwrap_or_default()
    }

    pub fn reset(&self) {
        if let Ok(mut stats) = self.stats.lock() {
            *stats = ExtractionStats::default();
        }
    }

    /// Selects and writes the keyframes of a single source.
    pub fn extract_source(&self, source: &mut dyn FrameSource) -> Result<SourceSummary, ExtractError> {
        let name = source.name().to_string();
        self.extract_with(&name, source, &KeyframeSelector::new(self.config.clone()))
    }

    /// Discovers the videos under `input` and runs [`Self::run`] on them.
    pub fn run_path(&self, input: &Path, opener: &dyn SourceOpener) -> Result<BatchReport, ExtractError> {
        let videos = discover_videos(input)?;
        info!(
            "Found {} video file(s) (processing in alphabetical order)",
            videos.len()
        );
        self.run(&videos, opener)
    }

    /// Processes every input. Decode failures are recorded per source and the
    /// batch goes on; a write failure cancels the remaining sources and is
    /// returned as the run's error.
    pub fn run(&self, inputs: &[PathBuf], opener: &dyn SourceOpener) -> Result<BatchReport, ExtractError> {
        let cancel = Arc::new(AtomicBool::new(false));

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.parallelism)
            .build()
            .map_err(|e| ExtractError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;

        let names = output_names(inputs);
        for (input, name) in inputs.iter().zip(&names) {
            if *name != source_name(input) {
                warn!("{}: stem already used, writing to '{}'", input.display(), name);
            }
        }

        let outcomes: Vec<SourceOutcome> = pool.install(|| {
            inputs
                .par_iter()
                .zip(names.into_par_iter())
                .map(|(input, name)| self.process_input(input, name, opener, &cancel))
                .collect()
        });

        let mut report = BatchReport { outcomes };
        if let Some(pos) = report
            .outcomes
            .iter()
            .position(|o| matches!(&o.result, Err(e) if e.is_fatal_for_run()))
        {
            let outcome = report.outcomes.swap_remove(pos);
            if let Err(e) = outcome.result {
                error!("❌ run aborted by '{}': {}", outcome.name, e);
                return Err(e);
            }
        }

        let failed = report.failed().count();
        info!(
            "Extraction complete! {} frame(s) from {} source(s), {} failed",
            report.total_frames(),
            report.outcomes.len() - failed,
            failed
        );
        for (outcome, e) in report.failed() {
            warn!("  {}: {}", outcome.input.display(), e);
        }
        Ok(report)
    }

    fn process_input(
        &self,
        input: &Path,
        name: String,
        opener: &dyn SourceOpener,
        cancel: &Arc<AtomicBool>,
    ) -> SourceOutcome {
        let selector = KeyframeSelector::new(self.config.clone()).with_cancel_flag(cancel.clone());

        let result = if cancel.load(Ordering::Relaxed) {
            Err(ExtractError::Cancelled)
        } else {
            opener
                .open(input)
                .and_then(|mut source| self.extract_with(&name, source.as_mut(), &selector))
        };

        if let Err(e) = &result {
            if e.is_fatal_for_run() {
                cancel.store(true, Ordering::Relaxed);
            }
            error!("❌ {}: {}", input.display(), e);
            if let Ok(mut stats) = self.stats.lock() {
                stats.failed_sources += 1;
            }
        }

        SourceOutcome {
            input: input.to_path_buf(),
            name,
            result,
        }
    }

    fn extract_with(
        &self,
        name: &str,
        source: &mut dyn FrameSource,
        selector: &KeyframeSelector,
    ) -> Result<SourceSummary, ExtractError> {
        let mut frames = Vec::new();
        let stats = selector.select_each_as(name, source, |retained| {
            frames.push(self.store.write(retained)?);
            Ok(())
        })?;

        if let Ok(mut totals) = self.stats.lock() {
            totals.processed_frames += stats.processed_frames;
            totals.extracted_frames += stats.retained_frames as u64;
        }
        info!("  Total frames extracted from '{}': {}", name, frames.len());

        Ok(SourceSummary {
            name: name.to_string(),
            stats,
            frames,
        })
    }
}

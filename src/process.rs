//! Batch processing.
//!
//! Applies one [`Pipeline`] to every discovered image, mirroring the input's
//! relative layout under the output root.
//!
//! ## Pipelines
//!
//! | Operation | Steps |
//! |---|---|
//! | `background` | isolate → pad → square → composite |
//! | `resize` | resize (always) |
//! | `brightness` | brightness |
//! | `all` | background → brightness → resize (skipped when disabled or squaring) |
//!
//! ## Failure Isolation
//!
//! Files are independent. A file that fails to decode, segment, or encode is
//! recorded in the [`RunReport`] with its error and the batch moves on. Only
//! problems with the input as a whole (missing source, nothing to process)
//! abort a run.
//!
//! ## Parallel Processing
//!
//! With `processing.max_processes = 1` files are handled one at a time on the
//! calling thread. Larger values run a local [rayon](https://docs.rs/rayon)
//! pool; outcomes are still reported in input order.

use crate::config::{self, PrepConfig, SegmentationMethod};
use crate::imaging::{
    BackgroundParams, BackgroundSpec, ImagingError, KeySegmenter, Quality, ResizeSpec,
    SegmentError, Segmenter, adjust_brightness, load_image, remove_background, resize,
    save_image,
};
use crate::scan::{self, ScanError};
use crate::source::{InputSource, OutputTarget, SourceError};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;

pub use crate::config::Operation;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Input error: {0}")]
    Source(#[from] SourceError),
    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),
    #[error("Image processing failed: {0}")]
    Imaging(#[from] ImagingError),
    #[error("Segmenter error: {0}")]
    Segment(#[from] SegmentError),
    #[error("No supported images found (jpg, jpeg, png, webp, bmp, tiff) in {0}")]
    NoImages(PathBuf),
    #[error("ONNX segmentation requested but this build lacks the `onnx` feature")]
    OnnxUnavailable,
    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}

/// One pixel transform in a pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    Background(BackgroundParams),
    Brightness(f32),
    Resize {
        spec: ResizeSpec,
        background: BackgroundSpec,
    },
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Background(_) => "background",
            Self::Brightness(_) => "brightness",
            Self::Resize { .. } => "resize",
        }
    }
}

/// The ordered steps applied to every file, plus encoding settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    steps: Vec<Step>,
    quality: Quality,
}

impl Pipeline {
    /// Resolve which steps `operation` runs under `config`.
    pub fn plan(operation: Operation, config: &PrepConfig) -> Self {
        let background = Step::Background(config.background_params());
        let brightness = Step::Brightness(config.brightness.factor);
        let resize = Step::Resize {
            spec: config.resize_spec(),
            background: config.background_spec(),
        };

        let steps = match operation {
            Operation::Background => vec![background],
            Operation::Resize => vec![resize],
            Operation::Brightness => vec![brightness],
            Operation::All => {
                let mut steps = vec![background, brightness];
                // A square canvas is the final geometry
                if config.resize.enabled && config.square_spec().is_none() {
                    steps.push(resize);
                }
                steps
            }
        };
        Self {
            steps,
            quality: config.quality(),
        }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    /// Whether any step needs a segmenter.
    pub fn needs_segmenter(&self) -> bool {
        self.steps.iter().any(|s| matches!(s, Step::Background(_)))
    }

    /// Run every step on one decoded image.
    pub fn apply(
        &self,
        segmenter: &dyn Segmenter,
        mut img: image::DynamicImage,
    ) -> Result<image::DynamicImage, ImagingError> {
        for step in &self.steps {
            tracing::debug!(step = step.name(), w = img.width(), h = img.height(), "applying");
            img = match step {
                Step::Background(params) => remove_background(segmenter, &img, params)?,
                Step::Brightness(factor) => adjust_brightness(img, *factor),
                Step::Resize { spec, background } => resize(img, spec, *background),
            };
        }
        Ok(img)
    }
}

/// Build the segmenter selected by `[segmentation]`.
pub fn build_segmenter(config: &PrepConfig) -> Result<Box<dyn Segmenter>, ProcessError> {
    match config.segmentation.method {
        SegmentationMethod::Key => Ok(Box::new(KeySegmenter::new(config.segmentation.tolerance))),
        #[cfg(feature = "onnx")]
        SegmentationMethod::Onnx => {
            let model = config.segmentation.model.as_deref().ok_or_else(|| {
                SegmentError::Model("segmentation.model is not set".to_string())
            })?;
            Ok(Box::new(crate::imaging::OnnxSegmenter::from_file(model)?))
        }
        #[cfg(not(feature = "onnx"))]
        SegmentationMethod::Onnx => Err(ProcessError::OnnxUnavailable),
    }
}

/// Outcome of a single input file.
#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    /// Source path relative to the input root.
    pub source: PathBuf,
    /// Written path relative to the output root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Summary of a whole run, serializable as the JSON report.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub operation: Operation,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Final output location (directory or archive), set by [`run_job`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
    pub outcomes: Vec<FileOutcome>,
}

impl RunReport {
    fn from_outcomes(operation: Operation, outcomes: Vec<FileOutcome>) -> Self {
        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        Self {
            operation,
            total: outcomes.len(),
            succeeded,
            failed: outcomes.len() - succeeded,
            destination: None,
            outcomes,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }
}

/// Output paths written by more than one source, with those sources in
/// input order. Only the last write survives on disk.
///
/// Happens when sources differ only by extension (`a.jpg` and `a.png`) and
/// both end up in the same output format.
pub fn output_collisions(outcomes: &[FileOutcome]) -> Vec<(&Path, Vec<&Path>)> {
    let mut by_output: BTreeMap<&Path, Vec<&Path>> = BTreeMap::new();
    for outcome in outcomes {
        if let Some(output) = &outcome.output {
            by_output
                .entry(output.as_path())
                .or_default()
                .push(outcome.source.as_path());
        }
    }
    by_output
        .into_iter()
        .filter(|(_, sources)| sources.len() > 1)
        .collect()
}

/// Progress events streamed to the CLI while a run is in flight.
#[derive(Debug, Clone)]
pub enum ProcessEvent {
    Started {
        operation: Operation,
        total: usize,
    },
    FileProcessed {
        /// 1-based position in input order.
        index: usize,
        total: usize,
        source: String,
        output: String,
    },
    FileFailed {
        index: usize,
        total: usize,
        source: String,
        error: String,
    },
}

/// Process one file: decode, apply the pipeline, save the mirrored output.
///
/// Returns the written path relative to `out_root`.
pub fn process_one(
    segmenter: &dyn Segmenter,
    pipeline: &Pipeline,
    in_root: &Path,
    out_root: &Path,
    source: &Path,
) -> Result<PathBuf, ProcessError> {
    let rel = source.strip_prefix(in_root).unwrap_or(source);
    let img = load_image(source)?;
    let out = pipeline.apply(segmenter, img)?;
    let written = save_image(&out, &out_root.join(rel), pipeline.quality())?;
    Ok(written
        .strip_prefix(out_root)
        .map(Path::to_path_buf)
        .unwrap_or(written))
}

/// Process `images` (absolute paths under `in_root`) with `threads` workers.
///
/// Every per-file error lands in the report. Only building the worker pool
/// can fail the call.
#[allow(clippy::too_many_arguments)]
pub fn run(
    segmenter: &dyn Segmenter,
    pipeline: &Pipeline,
    operation: Operation,
    images: &[PathBuf],
    in_root: &Path,
    out_root: &Path,
    threads: usize,
    progress: Option<Sender<ProcessEvent>>,
) -> Result<RunReport, ProcessError> {
    let total = images.len();
    if let Some(tx) = &progress {
        tx.send(ProcessEvent::Started { operation, total }).ok();
    }
    tracing::info!(
        operation = operation.as_str(),
        total,
        threads,
        steps = ?pipeline.steps().iter().map(Step::name).collect::<Vec<_>>(),
        "processing"
    );

    let handle = |index: usize, source: &PathBuf| -> FileOutcome {
        let rel = source.strip_prefix(in_root).unwrap_or(source).to_path_buf();
        let result = process_one(segmenter, pipeline, in_root, out_root, source);
        let outcome = match result {
            Ok(output) => FileOutcome {
                source: rel,
                output: Some(output),
                error: None,
            },
            Err(e) => {
                tracing::warn!(source = %rel.display(), error = %e, "file failed");
                FileOutcome {
                    source: rel,
                    output: None,
                    error: Some(e.to_string()),
                }
            }
        };
        if let Some(tx) = &progress {
            tx.send(event_for(&outcome, index + 1, total)).ok();
        }
        outcome
    };

    let outcomes: Vec<FileOutcome> = if threads <= 1 {
        images.iter().enumerate().map(|(i, p)| handle(i, p)).collect()
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| ProcessError::ThreadPool(e.to_string()))?;
        pool.install(|| {
            images
                .par_iter()
                .enumerate()
                .map(|(i, p)| handle(i, p))
                .collect()
        })
    };

    for (output, sources) in output_collisions(&outcomes) {
        tracing::warn!(
            output = %output.display(),
            sources = ?sources,
            "several inputs wrote the same output file; only one survives"
        );
    }

    Ok(RunReport::from_outcomes(operation, outcomes))
}

fn event_for(outcome: &FileOutcome, index: usize, total: usize) -> ProcessEvent {
    let source = outcome.source.display().to_string();
    match (&outcome.output, &outcome.error) {
        (_, Some(error)) => ProcessEvent::FileFailed {
            index,
            total,
            source,
            error: error.clone(),
        },
        (output, None) => ProcessEvent::FileProcessed {
            index,
            total,
            source,
            output: output
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        },
    }
}

/// Resolve the input, process every image, and deliver the output.
///
/// Aborts before processing when the input cannot be resolved or contains
/// no supported images. Temporary directories are cleaned up on every path.
pub fn run_job(
    input: &InputSource,
    output: &OutputTarget,
    config: &PrepConfig,
    progress: Option<Sender<ProcessEvent>>,
) -> Result<RunReport, ProcessError> {
    let resolved = input.resolve()?;
    tracing::debug!(
        root = %resolved.root().display(),
        temporary = resolved.is_temporary(),
        "resolved input"
    );
    let images = scan::list_images(resolved.root())?;
    if images.is_empty() {
        return Err(ProcessError::NoImages(resolved.root().to_path_buf()));
    }

    let pipeline = Pipeline::plan(config.operation, config);
    let segmenter: Box<dyn Segmenter> = if pipeline.needs_segmenter() {
        build_segmenter(config)?
    } else {
        Box::new(KeySegmenter::default())
    };

    let prepared = output.prepare()?;
    let mut report = run(
        segmenter.as_ref(),
        &pipeline,
        config.operation,
        &images,
        resolved.root(),
        prepared.root(),
        config::effective_threads(&config.processing),
        progress,
    )?;
    report.destination = Some(prepared.finish()?);
    Ok(report)
}

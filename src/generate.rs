//! Card generation: the batch driver.
//!
//! Pairs every photo under the photos root with the dataset rows that
//! mention its product, renders a card per photo and writes it as PNG.
//!
//! ## Pipeline
//!
//! ```text
//! checks ─→ load dataset ─→ scan products ─→ allocate output dir
//!    │                                             │
//!    └─ fatal: nothing written                     ▼
//!                          per photo (parallel): render canvas
//!                                                  │
//!                          for each sheet in order: composite slide overlay
//!                                                  │
//!                                              save PNG ─→ progress
//! ```
//!
//! ## Failure Isolation
//!
//! Missing input directories, an unreadable dataset and an invalid canvas
//! abort the run before the output directory is created. Everything after
//! that is per item: a photo that fails to decode or save is skipped, an
//! overlay that fails to load or resolve is skipped, and the run continues.
//!
//! ## Output Structure
//!
//! ```text
//! output_1/                  # first free name: output, output_1, output_2, ...
//! ├── P1/
//! │   ├── 01.png             # photos/P1/01.jpg, overlays from every sheet
//! │   └── 02.png
//! └── P2/
//!     └── main.png
//! ```
//!
//! ## Parallel Processing
//!
//! Photos are processed in parallel with [rayon](https://docs.rs/rayon). A
//! finished photo's events go out together under one lock: its saved or
//! skipped event, then its overlay events, then the progress tick. Observers
//! see strictly increasing progress values and never interleaved photos.

use crate::config::Settings;
use crate::dataset::{self, Dataset, DatasetError, Slide, SlidePair};
use crate::imaging::{CanvasSpec, ImageBackend, RustBackend, composite_overlay, render_canvas};
use crate::inventory::{self, InventoryError, overlay_path, output_path};
use crate::position::PositionRegistry;
use rayon::prelude::*;
use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("Photos directory not found: {0}")]
    PhotosDirMissing(PathBuf),
    #[error("Overlays directory not found: {0}")]
    OverlaysDirMissing(PathBuf),
    #[error("Invalid canvas size {width}x{height}")]
    InvalidCanvas { width: u32, height: u32 },
    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),
    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Everything a batch run needs besides the position registry.
#[derive(Debug, Clone, PartialEq)]
pub struct CardRequest {
    pub dataset_path: PathBuf,
    pub photos_dir: PathBuf,
    pub overlays_dir: PathBuf,
    pub output_dir: PathBuf,
    pub canvas: CanvasSpec,
    pub dataset_header_row: bool,
}

impl CardRequest {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            dataset_path: settings.dataset_path.clone(),
            photos_dir: settings.photos_dir.clone(),
            overlays_dir: settings.infographics_dir.clone(),
            output_dir: settings.output_dir.clone(),
            canvas: settings.canvas(),
            dataset_header_row: settings.dataset_header_row,
        }
    }
}

/// Progress events emitted during a run.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    /// Fatal checks passed and the output directory exists.
    Started {
        total: usize,
        output_dir: PathBuf,
        sheets: Vec<String>,
    },
    /// A dataset row failed validation and is ignored.
    RowRejected {
        sheet: String,
        row: usize,
        reason: String,
    },
    OverlayApplied {
        product: String,
        photo: PathBuf,
        sheet: String,
        overlay: String,
        position: String,
        x: i64,
        y: i64,
        /// The position id was unknown and the margin placement was used.
        fallback: bool,
    },
    OverlaySkipped {
        product: String,
        photo: PathBuf,
        sheet: String,
        overlay: String,
        position: String,
        reason: String,
    },
    PhotoSaved {
        product: String,
        photo: PathBuf,
        output: PathBuf,
        overlays: usize,
    },
    PhotoSkipped {
        product: String,
        photo: PathBuf,
        reason: String,
    },
    /// One photo finished, saved or not. `current` is strictly increasing.
    Progress { current: usize, total: usize },
}

/// Outcome of a batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Cards written.
    pub processed: usize,
    /// Photos that produced no card.
    pub skipped: usize,
    pub overlays_applied: usize,
    pub overlays_skipped: usize,
    pub rejected_rows: usize,
    /// The directory actually written, possibly suffixed.
    pub output_dir: PathBuf,
}

impl RunReport {
    /// `(processed count, output directory)`.
    pub fn summary(&self) -> (usize, &Path) {
        (self.processed, &self.output_dir)
    }
}

/// Create the first free directory among `base`, `base_1`, `base_2`, ...
///
/// An existing directory is never reused.
pub fn allocate_output_dir(base: &Path) -> io::Result<PathBuf> {
    if let Some(parent) = base.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut index = 0usize;
    loop {
        let candidate = if index == 0 {
            base.to_path_buf()
        } else {
            let mut name = OsString::from(base.as_os_str());
            name.push(format!("_{index}"));
            PathBuf::from(name)
        };
        match fs::create_dir(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => index += 1,
            Err(e) => return Err(e),
        }
    }
}

/// Run a batch with the pure-Rust image backend.
pub fn generate_cards(
    request: &CardRequest,
    positions: &PositionRegistry,
    progress: Option<Sender<BatchEvent>>,
) -> Result<RunReport, GenerateError> {
    generate_cards_with_backend(&RustBackend::new(), request, positions, progress)
}

/// One photo to render, with its overlay assignments from every sheet.
struct PhotoJob {
    product: String,
    photo: PathBuf,
    output: PathBuf,
    assignments: Vec<(String, SlidePair)>,
    /// Another photo of the product already maps to `output`.
    duplicate: bool,
}

#[derive(Debug, Default)]
struct PhotoOutcome {
    saved: bool,
    overlays_applied: usize,
    overlays_skipped: usize,
    /// The photo's saved/skipped event followed by its overlay events.
    events: Vec<BatchEvent>,
}

/// Shared, read-only state of a run.
struct RunContext<'a, B: ImageBackend> {
    backend: &'a B,
    positions: &'a PositionRegistry,
    overlays_dir: &'a Path,
    canvas: CanvasSpec,
    progress: &'a Option<Sender<BatchEvent>>,
}

impl<B: ImageBackend> RunContext<'_, B> {
    fn emit(&self, event: BatchEvent) {
        if let Some(tx) = self.progress {
            tx.send(event).ok();
        }
    }
}

/// Run a batch using a specific backend (allows testing with mock).
pub fn generate_cards_with_backend(
    backend: &impl ImageBackend,
    request: &CardRequest,
    positions: &PositionRegistry,
    progress: Option<Sender<BatchEvent>>,
) -> Result<RunReport, GenerateError> {
    if !request.photos_dir.is_dir() {
        return Err(GenerateError::PhotosDirMissing(request.photos_dir.clone()));
    }
    if !request.overlays_dir.is_dir() {
        return Err(GenerateError::OverlaysDirMissing(
            request.overlays_dir.clone(),
        ));
    }
    let canvas = request.canvas;
    if canvas.width == 0 || canvas.height == 0 {
        return Err(GenerateError::InvalidCanvas {
            width: canvas.width,
            height: canvas.height,
        });
    }
    let dataset = dataset::load_dataset(&request.dataset_path, request.dataset_header_row)?;
    let products = inventory::scan_products(&request.photos_dir)?;

    let output_dir = allocate_output_dir(&request.output_dir)?;
    let jobs = plan_jobs(&dataset, &products, &output_dir);
    let total = jobs.len();
    info!(
        output = %output_dir.display(),
        photos = total,
        products = products.len(),
        sheets = dataset.sheets.len(),
        "starting batch"
    );

    let ctx = RunContext {
        backend,
        positions,
        overlays_dir: &request.overlays_dir,
        canvas,
        progress: &progress,
    };
    ctx.emit(BatchEvent::Started {
        total,
        output_dir: output_dir.clone(),
        sheets: dataset.sheet_names(),
    });
    let mut rejected_rows = 0;
    for err in dataset.rejected() {
        rejected_rows += 1;
        if let DatasetError::MalformedRow { sheet, row, .. } = err {
            ctx.emit(BatchEvent::RowRejected {
                sheet: sheet.clone(),
                row: *row,
                reason: err.to_string(),
            });
        }
    }

    let counter = Mutex::new(0usize);
    let outcomes: Vec<PhotoOutcome> = jobs
        .par_iter()
        .map(|job| {
            let mut outcome = process_photo(&ctx, job);
            // One photo's lines stay together, and progress values stay ordered
            if let Ok(mut current) = counter.lock() {
                *current += 1;
                for event in outcome.events.drain(..) {
                    ctx.emit(event);
                }
                ctx.emit(BatchEvent::Progress {
                    current: *current,
                    total,
                });
            }
            outcome
        })
        .collect();

    let processed = outcomes.iter().filter(|o| o.saved).count();
    let report = RunReport {
        processed,
        skipped: total - processed,
        overlays_applied: outcomes.iter().map(|o| o.overlays_applied).sum(),
        overlays_skipped: outcomes.iter().map(|o| o.overlays_skipped).sum(),
        rejected_rows,
        output_dir,
    };
    info!(
        processed = report.processed,
        skipped = report.skipped,
        output = %report.output_dir.display(),
        "batch complete"
    );
    Ok(report)
}

/// Flatten products into photo jobs in product, then slide order.
fn plan_jobs(
    dataset: &Dataset,
    products: &[inventory::Product],
    output_dir: &Path,
) -> Vec<PhotoJob> {
    let mut seen = HashSet::new();
    let mut jobs = Vec::new();
    for product in products {
        for (index, photo) in product.photos.iter().enumerate() {
            let output = output_path(output_dir, &product.id, photo);
            let duplicate = !seen.insert(output.clone());
            let assignments = dataset
                .slides_for(&product.id, index)
                .map(|(sheet, pair)| (sheet.to_string(), pair.clone()))
                .collect();
            jobs.push(PhotoJob {
                product: product.id.clone(),
                photo: photo.clone(),
                output,
                assignments,
                duplicate,
            });
        }
    }
    jobs
}

fn process_photo<B: ImageBackend>(ctx: &RunContext<'_, B>, job: &PhotoJob) -> PhotoOutcome {
    let mut outcome = PhotoOutcome::default();
    if job.duplicate {
        outcome.events.push(skip_photo(
            job,
            format!("another photo already writes {}", job.output.display()),
        ));
        return outcome;
    }

    let mut canvas = match render_canvas(ctx.backend, &job.photo, ctx.canvas) {
        Ok(canvas) => canvas,
        Err(e) => {
            outcome.events.push(skip_photo(job, e.to_string()));
            return outcome;
        }
    };

    let mut overlay_events = Vec::new();
    for (sheet, pair) in &job.assignments {
        let (overlay, position) = match pair.slide() {
            Slide::Empty => continue,
            Slide::Assigned { overlay, position } => (overlay, position),
            Slide::Incomplete { .. } => {
                outcome.overlays_skipped += 1;
                overlay_events.push(skip_overlay(
                    job,
                    sheet,
                    pair,
                    "overlay and position must both be set",
                ));
                continue;
            }
        };
        let asset = overlay_path(ctx.overlays_dir, overlay);
        match composite_overlay(
            ctx.backend,
            &mut canvas,
            &asset,
            position,
            ctx.positions,
            ctx.canvas.margin,
        ) {
            Ok(placement) => {
                outcome.overlays_applied += 1;
                debug!(
                    product = %job.product,
                    photo = %job.photo.display(),
                    sheet = %sheet,
                    overlay,
                    position,
                    "overlay applied"
                );
                overlay_events.push(BatchEvent::OverlayApplied {
                    product: job.product.clone(),
                    photo: job.photo.clone(),
                    sheet: sheet.clone(),
                    overlay: overlay.to_string(),
                    position: position.to_string(),
                    x: placement.x,
                    y: placement.y,
                    fallback: placement.fallback,
                });
            }
            Err(e) => {
                outcome.overlays_skipped += 1;
                overlay_events.push(skip_overlay(job, sheet, pair, &e.to_string()));
            }
        }
    }

    match ctx.backend.save_png(canvas.image(), &job.output) {
        Ok(()) => {
            outcome.saved = true;
            outcome.events.push(BatchEvent::PhotoSaved {
                product: job.product.clone(),
                photo: job.photo.clone(),
                output: job.output.clone(),
                overlays: outcome.overlays_applied,
            });
        }
        Err(e) => outcome.events.push(skip_photo(job, e.to_string())),
    }
    outcome.events.extend(overlay_events);
    outcome
}

fn skip_photo(job: &PhotoJob, reason: String) -> BatchEvent {
    warn!(product = %job.product, photo = %job.photo.display(), %reason, "skipping photo");
    BatchEvent::PhotoSkipped {
        product: job.product.clone(),
        photo: job.photo.clone(),
        reason,
    }
}

fn skip_overlay(job: &PhotoJob, sheet: &str, pair: &SlidePair, reason: &str) -> BatchEvent {
    warn!(
        product = %job.product,
        photo = %job.photo.display(),
        sheet,
        overlay = %pair.overlay,
        position = %pair.position,
        reason,
        "skipping overlay"
    );
    BatchEvent::OverlaySkipped {
        product: job.product.clone(),
        photo: job.photo.clone(),
        sheet: sheet.to_string(),
        overlay: pair.overlay.clone(),
        position: pair.position.clone(),
        reason: reason.to_string(),
    }
}

//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Generate
//!
//! ```text
//! Writing 3 cards to output_1 (sheets: main, sale)
//! [1/3] P1/01.jpg → P1/01.png (2 overlays)
//!     main: badgeA at 5 → (30, 30)
//!     sale: new at 99 → (30, 30) [unknown position, margin fallback]
//! [2/3] P1/02.jpg skipped: Failed to decode ...
//!
//! Processed 2 cards, skipped 1 → output_1
//! Overlays: 3 applied, 1 skipped
//! ```
//!
//! ## Positions
//!
//! ```text
//! 1  top-left      x = MARGIN
//!                  y = MARGIN
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::generate::{BatchEvent, RunReport};
use crate::position::PositionRegistry;
use std::path::Path;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `P1/01.jpg` style label: product folder plus file name.
fn photo_label(product: &str, photo: &Path) -> String {
    let name = photo
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| photo.display().to_string());
    format!("{product}/{name}")
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

// ============================================================================
// Generate
// ============================================================================

/// Format a single batch event as display lines.
///
/// Progress ticks produce no lines of their own: saved and skipped photos
/// already carry their counters via the caller's [`ProgressTracker`].
pub fn format_batch_event(event: &BatchEvent, progress: &mut ProgressTracker) -> Vec<String> {
    match event {
        BatchEvent::Started {
            total,
            output_dir,
            sheets,
        } => {
            progress.total = *total;
            let sheets = if sheets.is_empty() {
                String::new()
            } else {
                format!(" (sheets: {})", sheets.join(", "))
            };
            vec![format!(
                "Writing {} to {}{}",
                plural(*total, "card", "cards"),
                output_dir.display(),
                sheets
            )]
        }
        BatchEvent::RowRejected { reason, .. } => vec![format!("warning: {reason}")],
        BatchEvent::OverlayApplied {
            sheet,
            overlay,
            position,
            x,
            y,
            fallback,
            ..
        } => {
            let note = if *fallback {
                " [unknown position, margin fallback]"
            } else {
                ""
            };
            vec![format!(
                "{}{sheet}: {overlay} at {position} → ({x}, {y}){note}",
                indent(1)
            )]
        }
        BatchEvent::OverlaySkipped {
            sheet,
            overlay,
            position,
            reason,
            ..
        } => {
            let overlay = if overlay.is_empty() { "-" } else { overlay };
            let position = if position.is_empty() { "-" } else { position };
            vec![format!(
                "{}{sheet}: {overlay} at {position} skipped: {reason}",
                indent(1)
            )]
        }
        BatchEvent::PhotoSaved {
            product,
            photo,
            output,
            overlays,
        } => {
            let out_name = output
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_default();
            let detail = if *overlays == 0 {
                String::new()
            } else {
                format!(" ({})", plural(*overlays, "overlay", "overlays"))
            };
            vec![format!(
                "{} {} → {product}/{out_name}{detail}",
                progress.next(),
                photo_label(product, photo)
            )]
        }
        BatchEvent::PhotoSkipped {
            product,
            photo,
            reason,
        } => vec![format!(
            "{} {} skipped: {reason}",
            progress.next(),
            photo_label(product, photo)
        )],
        BatchEvent::Progress { .. } => Vec::new(),
    }
}

/// Counter for `[n/total]` prefixes as photos finish.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    done: usize,
    total: usize,
}

impl ProgressTracker {
    fn next(&mut self) -> String {
        self.done += 1;
        format!("[{}/{}]", self.done, self.total)
    }
}

/// Format the end-of-run summary.
pub fn format_report(report: &RunReport) -> Vec<String> {
    let mut lines = vec![
        String::new(),
        format!(
            "Processed {}, skipped {} → {}",
            plural(report.processed, "card", "cards"),
            report.skipped,
            report.output_dir.display()
        ),
        format!(
            "Overlays: {} applied, {} skipped",
            report.overlays_applied, report.overlays_skipped
        ),
    ];
    if report.rejected_rows > 0 {
        lines.push(format!(
            "Dataset: {} rejected",
            plural(report.rejected_rows, "row", "rows")
        ));
    }
    lines
}

pub fn print_report(report: &RunReport) {
    for line in format_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Positions
// ============================================================================

/// Format the position registry as an aligned table.
pub fn format_positions(positions: &PositionRegistry) -> Vec<String> {
    if positions.is_empty() {
        return vec!["No positions defined".to_string()];
    }
    let id_width = positions.iter().map(|(id, _)| id.len()).max().unwrap_or(0);
    let mut lines = Vec::new();
    for (id, def) in positions.iter() {
        lines.push(format!(
            "{id:<id_width$}  {:<14}x = {}",
            def.anchor.as_str(),
            def.x
        ));
        lines.push(format!("{:<w$}y = {}", "", def.y, w = id_width + 2 + 14));
    }
    lines
}

pub fn print_positions(positions: &PositionRegistry) {
    for line in format_positions(positions) {
        println!("{}", line);
    }
}

/// Format a plain listing with a heading and a count.
pub fn format_listing(heading: &str, items: &[String]) -> Vec<String> {
    let mut lines = vec![format!("{heading} ({})", items.len())];
    lines.extend(items.iter().map(|item| format!("{}{item}", indent(1))));
    lines
}

pub fn print_listing(heading: &str, items: &[String]) {
    for line in format_listing(heading, items) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::{Anchor, PositionDefinition};
    use std::path::PathBuf;

    #[test]
    fn indent_levels() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(2), "        ");
    }

    #[test]
    fn plural_forms() {
        assert_eq!(plural(1, "card", "cards"), "1 card");
        assert_eq!(plural(0, "card", "cards"), "0 cards");
    }

    // =========================================================================
    // Batch event formatting
    // =========================================================================

    #[test]
    fn started_lists_sheets() {
        let mut progress = ProgressTracker::default();
        let lines = format_batch_event(
            &BatchEvent::Started {
                total: 3,
                output_dir: PathBuf::from("output_1"),
                sheets: vec!["main".into(), "sale".into()],
            },
            &mut progress,
        );
        assert_eq!(lines, vec!["Writing 3 cards to output_1 (sheets: main, sale)"]);
    }

    #[test]
    fn saved_and_skipped_photos_are_numbered() {
        let mut progress = ProgressTracker::default();
        format_batch_event(
            &BatchEvent::Started {
                total: 2,
                output_dir: PathBuf::from("out"),
                sheets: vec![],
            },
            &mut progress,
        );
        let saved = format_batch_event(
            &BatchEvent::PhotoSaved {
                product: "P1".into(),
                photo: PathBuf::from("photos/P1/01.jpg"),
                output: PathBuf::from("out/P1/01.png"),
                overlays: 2,
            },
            &mut progress,
        );
        assert_eq!(saved, vec!["[1/2] P1/01.jpg → P1/01.png (2 overlays)"]);

        let skipped = format_batch_event(
            &BatchEvent::PhotoSkipped {
                product: "P1".into(),
                photo: PathBuf::from("photos/P1/02.jpg"),
                reason: "broken".into(),
            },
            &mut progress,
        );
        assert_eq!(skipped, vec!["[2/2] P1/02.jpg skipped: broken"]);
    }

    #[test]
    fn overlay_lines_are_indented() {
        let mut progress = ProgressTracker::default();
        let applied = format_batch_event(
            &BatchEvent::OverlayApplied {
                product: "P1".into(),
                photo: PathBuf::from("01.jpg"),
                sheet: "sale".into(),
                overlay: "new".into(),
                position: "99".into(),
                x: 30,
                y: 30,
                fallback: true,
            },
            &mut progress,
        );
        assert_eq!(
            applied,
            vec!["    sale: new at 99 → (30, 30) [unknown position, margin fallback]"]
        );

        let skipped = format_batch_event(
            &BatchEvent::OverlaySkipped {
                product: "P1".into(),
                photo: PathBuf::from("01.jpg"),
                sheet: "main".into(),
                overlay: "badgeA".into(),
                position: "".into(),
                reason: "incomplete".into(),
            },
            &mut progress,
        );
        assert_eq!(skipped, vec!["    main: badgeA at - skipped: incomplete"]);
    }

    #[test]
    fn progress_ticks_are_silent() {
        let mut progress = ProgressTracker::default();
        let lines = format_batch_event(
            &BatchEvent::Progress {
                current: 1,
                total: 1,
            },
            &mut progress,
        );
        assert!(lines.is_empty());
    }

    #[test]
    fn report_mentions_rejected_rows_only_when_present() {
        let mut report = RunReport {
            processed: 1,
            skipped: 0,
            overlays_applied: 1,
            overlays_skipped: 0,
            rejected_rows: 0,
            output_dir: PathBuf::from("output"),
        };
        let lines = format_report(&report);
        assert_eq!(lines[1], "Processed 1 card, skipped 0 → output");
        assert_eq!(lines[2], "Overlays: 1 applied, 0 skipped");
        assert_eq!(lines.len(), 3);

        report.rejected_rows = 2;
        assert_eq!(format_report(&report)[3], "Dataset: 2 rows rejected");
    }

    // =========================================================================
    // Positions and listings
    // =========================================================================

    #[test]
    fn positions_table() {
        let registry: PositionRegistry = [
            (
                "1".to_string(),
                PositionDefinition::new("MARGIN", "MARGIN", Anchor::TOP_LEFT),
            ),
            (
                "br".to_string(),
                PositionDefinition::new(
                    "canvas_width - MARGIN",
                    "canvas_height - MARGIN",
                    Anchor::BOTTOM_RIGHT,
                ),
            ),
        ]
        .into_iter()
        .collect();
        let lines = format_positions(&registry);
        assert_eq!(lines[0], "1   top-left      x = MARGIN");
        assert_eq!(lines[1], "                  y = MARGIN");
        assert_eq!(lines[2], "br  bottom-right  x = canvas_width - MARGIN");
    }

    #[test]
    fn empty_positions() {
        assert_eq!(
            format_positions(&PositionRegistry::new()),
            vec!["No positions defined"]
        );
    }

    #[test]
    fn listing_has_count() {
        let lines = format_listing("Products", &["P1".to_string(), "P2".to_string()]);
        assert_eq!(lines, vec!["Products (2)", "    P1", "    P2"]);
    }
}

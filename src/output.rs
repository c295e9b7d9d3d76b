//! CLI output formatting.
//!
//! Every `format_*` function is pure and returns display lines; the matching
//! `print_*` wrapper writes them to stdout. Diagnostics go through `tracing`
//! on stderr instead, so stdout stays a clean record of what happened.
//!
//! # Output Format
//!
//! ## Scan
//!
//! ```text
//! Images (3) in /data/shoes
//! 001 a.jpg
//! 002 nested/b.png
//! 003 nested/c.bmp
//! ```
//!
//! ## Run
//!
//! ```text
//! Processing 3 images (all)
//! [001/003] a.jpg → a.png
//! [002/003] nested/b.png
//!     Error: Image processing failed: Decode error: ...
//! [003/003] nested/c.bmp → nested/c.png
//!
//! Finished: 2 succeeded, 1 failed
//! Output: out.zip
//! Failed
//!     nested/b.png: Image processing failed: Decode error: ...
//! ```

use crate::process::{ProcessEvent, RunReport};
use crate::scan::ScanResult;

/// Zero-padded positional index, at least three digits wide.
fn format_index(pos: usize, total: usize) -> String {
    let width = total.to_string().len().max(3);
    format!("{:0width$}", pos, width = width)
}

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{} {}", count, noun)
    } else {
        format!("{} {}s", count, noun)
    }
}

// ============================================================================
// Scan output
// ============================================================================

pub fn format_scan_output(scan: &ScanResult) -> Vec<String> {
    let total = scan.images.len();
    let mut lines = vec![format!("Images ({}) in {}", total, scan.root.display())];
    for (i, image) in scan.images.iter().enumerate() {
        lines.push(format!(
            "{} {}",
            format_index(i + 1, total),
            scan.relative(image).display()
        ));
    }
    lines
}

pub fn print_scan_output(scan: &ScanResult) {
    for line in format_scan_output(scan) {
        println!("{}", line);
    }
}

// ============================================================================
// Run output
// ============================================================================

/// Format a single progress event as display lines.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    match event {
        ProcessEvent::Started { operation, total } => {
            vec![format!(
                "Processing {} ({})",
                plural(*total, "image"),
                operation.as_str()
            )]
        }
        ProcessEvent::FileProcessed {
            index,
            total,
            source,
            output,
        } => vec![format!(
            "[{}/{}] {} \u{2192} {}",
            format_index(*index, *total),
            format_index(*total, *total),
            source,
            output
        )],
        ProcessEvent::FileFailed {
            index,
            total,
            source,
            error,
        } => vec![
            format!(
                "[{}/{}] {}",
                format_index(*index, *total),
                format_index(*total, *total),
                source
            ),
            format!("{}Error: {}", indent(1), error),
        ],
    }
}

/// Final summary after a run: counts, destination, and every failure.
pub fn format_summary(report: &RunReport) -> Vec<String> {
    let mut lines = vec![
        String::new(),
        format!(
            "Finished: {} succeeded, {} failed",
            report.succeeded, report.failed
        ),
    ];
    if let Some(dest) = &report.destination {
        lines.push(format!("Output: {}", dest.display()));
    }
    if report.failed > 0 {
        lines.push("Failed".to_string());
        for failure in report.failures() {
            lines.push(format!(
                "{}{}: {}",
                indent(1),
                failure.source.display(),
                failure.error.as_deref().unwrap_or_default()
            ));
        }
    }
    lines
}

pub fn print_summary(report: &RunReport) {
    for line in format_summary(report) {
        println!("{}", line);
    }
}

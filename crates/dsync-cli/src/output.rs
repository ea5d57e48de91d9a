use std::path::Path;

use dsync_core::domain::entry::{EntryKind, SyncDirection};
use dsync_sync::engine::{SyncAction, SyncEvent, SyncObserver, SyncReport};

/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Trait for formatting CLI output
pub trait OutputFormatter {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    fn info(&self, message: &str);
    fn print_json(&self, value: &serde_json::Value);
}

/// Human-readable output formatter with checkmarks and indentation
pub struct HumanFormatter {
    quiet: bool,
}

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        println!("\u{2713} {}", message);
    }
    fn error(&self, message: &str) {
        eprintln!("\u{2717} Error: {}", message);
    }
    fn warn(&self, message: &str) {
        eprintln!("\u{26a0} Warning: {}", message);
    }
    fn info(&self, message: &str) {
        if !self.quiet {
            println!("  {}", message);
        }
    }
    fn print_json(&self, _value: &serde_json::Value) {
        // Human formatter doesn't print JSON
    }
}

/// JSON output formatter
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn success(&self, message: &str) {
        println!(
            "{}",
            serde_json::json!({"success": true, "message": message})
        );
    }
    fn error(&self, message: &str) {
        eprintln!(
            "{}",
            serde_json::json!({"success": false, "error": message})
        );
    }
    fn warn(&self, message: &str) {
        eprintln!(
            "{}",
            serde_json::json!({"level": "warning", "message": message})
        );
    }
    fn info(&self, _message: &str) {}
    fn print_json(&self, value: &serde_json::Value) {
        println!(
            "{}",
            serde_json::to_string_pretty(value).unwrap_or_default()
        );
    }
}

pub fn get_formatter(format: OutputFormat, quiet: bool) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Human => Box::new(HumanFormatter { quiet }),
    }
}

// ============================================================================
// Sync progress
// ============================================================================

const INDENT: &str = "   ";

/// Prints one line per folder entered and per file transferred
///
/// Folder headers sit at their parent's indentation and the files inside
/// a folder one step deeper, so the output reads as a tree.
pub struct ProgressPrinter;

impl ProgressPrinter {
    /// The line printed for `event`, if any
    pub fn line(event: &SyncEvent) -> Option<String> {
        let verb = match event.direction {
            SyncDirection::Push => "Uploading",
            SyncDirection::Pull => "Downloading",
        };
        let marker = if event.dry_run { " (dry run)" } else { "" };
        let path = event.path.display();

        match (event.action, event.kind) {
            (SyncAction::EnterFolder, _) if event.depth == 0 => Some(format!("\n{verb}...")),
            (SyncAction::EnterFolder, _) => Some(format!(
                "{}{verb} {path}...",
                INDENT.repeat(event.depth - 1)
            )),
            (SyncAction::Transfer | SyncAction::Replace, EntryKind::File) => Some(format!(
                "{}... file: {path}{marker}",
                INDENT.repeat(event.depth)
            )),
            (SyncAction::Delete, kind) => Some(format!(
                "{}... delete {}: {path}{marker}",
                INDENT.repeat(event.depth),
                kind_label(kind)
            )),
            // Only emitted at the root, for a remote root that does not exist yet
            (SyncAction::CreateFolder, _) if event.depth == 0 && event.dry_run => {
                Some(format!("Remote folder {path} would be created"))
            }
            _ => None,
        }
    }
}

impl SyncObserver for ProgressPrinter {
    fn on_event(&self, event: &SyncEvent) {
        if let Some(line) = Self::line(event) {
            println!("{line}");
        }
    }
}

fn kind_label(kind: EntryKind) -> &'static str {
    match kind {
        EntryKind::File => "file",
        EntryKind::Folder => "folder",
    }
}

/// Header printed before a push or pull starts
pub fn sync_header(direction: SyncDirection) -> String {
    let title = match direction {
        SyncDirection::Push => "GOOGLE DRIVE SYNCHRONIZATION - Upload",
        SyncDirection::Pull => "GOOGLE DRIVE SYNCHRONIZATION - Download",
    };
    format!("\n{title}\n{}", "-".repeat(title.len()))
}

/// Summary lines for a finished run, skipping zero counters
pub fn summary_lines(report: &SyncReport) -> Vec<String> {
    [
        ("Folders created", report.folders_created),
        ("Uploaded", report.files_uploaded),
        ("Downloaded", report.files_downloaded),
        ("Deleted remotely", report.remote_deletions),
        ("Deleted locally", report.local_deletions),
        ("Ignored", report.skipped_ignored),
        ("Unchanged", report.unchanged),
    ]
    .into_iter()
    .filter(|(_, count)| *count > 0)
    .map(|(label, count)| format!("{:<18}{count}", format!("{label}:")))
    .collect()
}

/// JSON rendering of a finished run
pub fn report_json(
    direction: SyncDirection,
    local_root: &Path,
    report: &SyncReport,
) -> serde_json::Value {
    serde_json::json!({
        "direction": direction.to_string(),
        "local_root": local_root.display().to_string(),
        "dry_run": report.dry_run,
        "folders_created": report.folders_created,
        "files_uploaded": report.files_uploaded,
        "files_downloaded": report.files_downloaded,
        "remote_deletions": report.remote_deletions,
        "local_deletions": report.local_deletions,
        "skipped_ignored": report.skipped_ignored,
        "unchanged": report.unchanged,
    })
}

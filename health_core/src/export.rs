//! CSV export of logged entries.
//!
//! Writes one row per day so the log can be opened in a spreadsheet.

use crate::{MetricEntry, Result};
use std::fs::OpenOptions;
use std::path::Path;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow {
    date: String,
    steps: Option<u32>,
    calories: Option<u32>,
    protein: Option<f64>,
    workout_minutes: Option<u32>,
    weight: Option<f64>,
    is_manual: bool,
}

impl From<&MetricEntry> for CsvRow {
    fn from(entry: &MetricEntry) -> Self {
        CsvRow {
            date: entry.date.format("%Y-%m-%d").to_string(),
            steps: entry.steps,
            calories: entry.calories,
            protein: entry.protein,
            workout_minutes: entry.workout_minutes,
            weight: entry.weight,
            is_manual: entry.is_manual,
        }
    }
}

/// Write `entries` to `csv_path` (oldest first), replacing any existing file.
///
/// The file is fsynced before returning. Returns the number of rows written.
pub fn export_csv(entries: &[MetricEntry], csv_path: &Path) -> Result<usize> {
    if let Some(parent) = csv_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(csv_path)?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(file);

    let mut sorted: Vec<&MetricEntry> = entries.iter().collect();
    sorted.sort_by_key(|e| e.date);

    for entry in &sorted {
        writer.serialize(CsvRow::from(*entry))?;
    }

    // Flush and sync to disk
    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    file.sync_all()?;

    tracing::info!("Exported {} entries to {:?}", sorted.len(), csv_path);
    Ok(sorted.len())
}

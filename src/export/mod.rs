//! Writing extracted player records to disk.

pub mod csv_writer;
pub mod excel;
pub mod json;

use anyhow::{Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::extract::record::PlayerRecord;

/// Column names shared by the CSV and Excel writers, in output order.
pub const COLUMNS: [&str; 15] = [
    "source_image",
    "position",
    "nickname",
    "hero",
    "hero_confidence",
    "kills",
    "deaths",
    "assists",
    "gold",
    "medal",
    "ratio",
    "result",
    "my_team_score",
    "adversary_team_score",
    "duration",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    Csv,
    Json,
    Excel,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Excel => "xlsx",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Excel => "excel",
        };
        f.write_str(s)
    }
}

/// A single spreadsheet cell.
#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(s) => f.write_str(s),
            Cell::Number(n) => write!(f, "{}", n),
        }
    }
}

/// Flattens a record into cells matching [`COLUMNS`].
pub fn record_cells(record: &PlayerRecord) -> [Cell; 15] {
    // Three decimals here; JSON keeps full precision.
    let confidence = (record.hero_confidence as f64 * 1000.0).round() / 1000.0;
    [
        Cell::Text(record.source_image.clone()),
        Cell::Number(record.position as f64),
        Cell::Text(record.nickname.clone()),
        Cell::Text(record.hero.clone()),
        Cell::Number(confidence),
        Cell::Number(record.kills as f64),
        Cell::Number(record.deaths as f64),
        Cell::Number(record.assists as f64),
        Cell::Number(record.gold as f64),
        Cell::Text(record.medal.to_string()),
        Cell::Number(record.ratio),
        Cell::Text(record.result.to_string()),
        Cell::Number(record.my_team_score as f64),
        Cell::Number(record.adversary_team_score as f64),
        Cell::Text(record.duration.clone()),
    ]
}

/// Writes `records` once per format as `<dir>/<base_name>.<ext>`.
///
/// With `append`, CSV rows are added to an existing file instead of replacing it.
/// Returns the written paths in the order of `formats`; duplicate formats are written once.
pub fn export_all(
    records: &[PlayerRecord],
    dir: &Path,
    base_name: &str,
    formats: &[ExportFormat],
    append: bool,
) -> Result<Vec<(ExportFormat, PathBuf)>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output dir: {}", dir.display()))?;

    let mut written: Vec<(ExportFormat, PathBuf)> = Vec::new();
    for &format in formats {
        if written.iter().any(|(f, _)| *f == format) {
            continue;
        }
        let path = dir.join(format!("{}.{}", base_name, format.extension()));
        match format {
            ExportFormat::Csv if append => csv_writer::append_csv(&path, records)?,
            ExportFormat::Csv => csv_writer::write_csv(&path, records)?,
            ExportFormat::Json => json::write_json(&path, records)?,
            ExportFormat::Excel => excel::write_excel(&path, records)?,
        }
        log::info!("Exported {} rows to {}", records.len(), path.display());
        written.push((format, path));
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::medal::Medal;
    use tempfile::tempdir;

    #[test]
    fn test_record_cells_follow_columns() {
        let record = PlayerRecord {
            nickname: "Shadow".into(),
            hero_confidence: 0.87654,
            kills: 7,
            medal: Medal::Gold,
            ..PlayerRecord::default()
        };
        let cells = record_cells(&record);

        assert_eq!(cells.len(), COLUMNS.len());
        assert_eq!(cells[2], Cell::Text("Shadow".into()));
        assert_eq!(cells[4], Cell::Number(0.877));
        assert_eq!(cells[5], Cell::Number(7.0));
        assert_eq!(cells[9].to_string(), "GOLD");
        assert_eq!(cells[14].to_string(), "00:00");
    }

    #[test]
    fn test_export_all_writes_each_format_once() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out");
        let records = vec![PlayerRecord::default()];

        let written = export_all(
            &records,
            &out,
            "stats",
            &[ExportFormat::Csv, ExportFormat::Json, ExportFormat::Csv, ExportFormat::Excel],
            false,
        )
        .unwrap();

        let formats: Vec<ExportFormat> = written.iter().map(|(f, _)| *f).collect();
        assert_eq!(
            formats,
            vec![ExportFormat::Csv, ExportFormat::Json, ExportFormat::Excel]
        );
        assert!(out.join("stats.csv").exists());
        assert!(out.join("stats.json").exists());
        assert!(out.join("stats.xlsx").exists());
    }
}

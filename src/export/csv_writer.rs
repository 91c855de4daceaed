//! CSV output. One header row, then one row per player.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use super::{record_cells, COLUMNS};
use crate::extract::record::PlayerRecord;

fn header() -> String {
    COLUMNS.join(",")
}

/// Quotes a field containing separators, quotes or line breaks.
fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn format_row(record: &PlayerRecord) -> String {
    record_cells(record)
        .iter()
        .map(|cell| escape_field(&cell.to_string()))
        .collect::<Vec<_>>()
        .join(",")
}

fn write_rows(writer: &mut impl Write, records: &[PlayerRecord]) -> Result<()> {
    for record in records {
        writeln!(writer, "{}", format_row(record)).context("Failed to write CSV row")?;
    }
    Ok(())
}

/// Writes a fresh CSV file, replacing any existing one.
pub fn write_csv(path: &Path, records: &[PlayerRecord]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "{}", header()).context("Failed to write CSV header")?;
    write_rows(&mut writer, records)?;
    writer.flush().context("Failed to flush CSV file")?;
    Ok(())
}

/// Whether `path` exists and already has at least one line.
fn has_content(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    let file = File::open(path).context("Failed to open existing CSV")?;
    Ok(BufReader::new(file).lines().next().is_some())
}

/// Appends rows, writing the header first only when the file is new or empty.
pub fn append_csv(path: &Path, records: &[PlayerRecord]) -> Result<()> {
    let needs_header = !has_content(path)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open CSV for append: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    if needs_header {
        writeln!(writer, "{}", header()).context("Failed to write CSV header")?;
    }
    write_rows(&mut writer, records)?;
    writer.flush().context("Failed to flush CSV file")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::parse::MatchResult;
    use tempfile::tempdir;

    fn record(nickname: &str, kills: u32) -> PlayerRecord {
        PlayerRecord {
            source_image: "match.png".into(),
            nickname: nickname.into(),
            kills,
            result: MatchResult::Victory,
            ..PlayerRecord::default()
        }
    }

    #[test]
    fn test_escape_field() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_field("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn test_write_csv_replaces_existing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stats.csv");
        std::fs::write(&path, "old,data\n").unwrap();

        write_csv(&path, &[record("Shadow", 5), record("Rick, Jr", 2)]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], header());
        assert!(lines[1].starts_with("match.png,0,Shadow,NO_MATCH,0,5,"));
        assert!(lines[1].contains(",VICTORY,"));
        assert!(lines[2].contains("\"Rick, Jr\""));
        assert!(!content.contains("old,data"));
    }

    #[test]
    fn test_append_csv_writes_header_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stats.csv");

        append_csv(&path, &[record("A", 1)]).unwrap();
        append_csv(&path, &[record("B", 2), record("C", 3)]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines.iter().filter(|l| **l == header()).count(), 1);
        assert!(lines[3].contains(",C,"));
    }

    #[test]
    fn test_append_csv_to_empty_file_adds_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stats.csv");
        File::create(&path).unwrap();

        append_csv(&path, &[record("A", 1)]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with(&header()));
    }
}

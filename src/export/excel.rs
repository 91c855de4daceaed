use anyhow::{Context, Result};
use rust_xlsxwriter::{Format, Workbook};
use std::path::Path;

use super::{record_cells, Cell, COLUMNS};
use crate::extract::record::PlayerRecord;

const SHEET_NAME: &str = "Game Stats";

/// Writes one worksheet with a bold header row and one row per record.
pub fn write_excel(path: &Path, records: &[PlayerRecord]) -> Result<()> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    for (col, name) in COLUMNS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *name, &header_format)?;
    }

    for (i, record) in records.iter().enumerate() {
        let row = (i + 1) as u32;
        for (col, cell) in record_cells(record).iter().enumerate() {
            match cell {
                Cell::Text(text) => worksheet.write_string(row, col as u16, text)?,
                Cell::Number(n) => worksheet.write_number(row, col as u16, *n)?,
            };
        }
    }

    workbook
        .save(path)
        .with_context(|| format!("Failed to save Excel file: {}", path.display()))?;
    Ok(())
}

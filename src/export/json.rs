use anyhow::{Context, Result};
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::extract::record::PlayerRecord;

/// Writes the records as a pretty-printed JSON array.
pub fn write_json(path: &Path, records: &[PlayerRecord]) -> Result<()> {
    let json =
        serde_json::to_string_pretty(records).context("Failed to serialize records to JSON")?;

    let mut file = File::create(path)
        .with_context(|| format!("Failed to create JSON file: {}", path.display()))?;
    file.write_all(json.as_bytes())
        .context("Failed to write JSON data")?;
    Ok(())
}

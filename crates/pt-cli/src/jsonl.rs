//! JSON-lines photon record files.
//!
//! One [`PhotonRecord`] object per line; blank lines and lines starting with
//! `#` are skipped. This is glue for the CLI, not a transport format.

use std::io::BufRead;
use std::path::Path;

use anyhow::{Context, Result};
use pt_core::PhotonRecord;

/// Parse every record in a JSON-lines reader.
pub fn read_records(reader: impl BufRead, origin: &str) -> Result<Vec<PhotonRecord>> {
    let mut records = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("reading {origin}"))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let record: PhotonRecord = serde_json::from_str(trimmed)
            .with_context(|| format!("{origin}:{}: invalid photon record", lineno + 1))?;
        records.push(record);
    }
    Ok(records)
}

/// Parse a JSON-lines file.
pub fn read_file(path: &Path) -> Result<Vec<PhotonRecord>> {
    let file = std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    read_records(std::io::BufReader::new(file), &path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lines_and_skips_comments() {
        let text = "# r, t\n{\"coordinate\":[1.0,2.0]}\n\n{\"coordinate\":[3.0,4.0],\"weight\":0.5,\"source_id\":2}\n";
        let recs = read_records(text.as_bytes(), "mem").unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[1].weight, 0.5);
        assert_eq!(recs[1].source_id, 2);
    }

    #[test]
    fn reports_line_number() {
        let text = "{\"coordinate\":[1.0]}\n{\"coordinate\":oops}\n";
        let err = read_records(text.as_bytes(), "events.jsonl").unwrap_err();
        assert!(format!("{err:#}").contains("events.jsonl:2"));
    }
}

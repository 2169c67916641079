//! The backup ledger: an append-only CSV file that doubles as the undo log.
//!
//! One row per resource, written and synced to storage before that
//! resource is mutated. The rollback engine re-imports the completed file
//! in a separate process invocation, so the column names are a wire
//! format: they must survive a write/load round trip bit-for-bit.

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::LedgerError;
use crate::model::BackupRecord;

/// Ledger header, in column order.
pub const LEDGER_COLUMNS: [&str; 11] = [
    "Timestamp",
    "Name",
    "ResourceGroupName",
    "ResourceId",
    "ResourceType",
    "Location",
    "OldTagName",
    "NewTagName",
    "TagValue",
    "AllTags",
    "Status",
];

/// Columns without which a ledger cannot drive a rollback. A file missing
/// any of these is rejected wholesale.
const REQUIRED_COLUMNS: [&str; 5] = [
    "Name",
    "ResourceId",
    "OldTagName",
    "NewTagName",
    "TagValue",
];

/// Append-only writer for the backup ledger.
pub struct LedgerWriter {
    file: File,
    path: PathBuf,
}

impl LedgerWriter {
    /// Create the ledger file and write the header row.
    pub fn create(path: &Path) -> Result<Self, LedgerError> {
        let mut file = File::create(path).map_err(|e| io_error(path, e))?;
        let mut header = csv_row(&LEDGER_COLUMNS);
        header.push('\n');
        file.write_all(header.as_bytes())
            .map_err(|e| io_error(path, e))?;
        file.sync_data().map_err(|e| io_error(path, e))?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Append one row and sync it to storage before returning.
    ///
    /// The caller must not mutate the corresponding resource until this
    /// returns Ok.
    pub fn append(&mut self, record: &BackupRecord) -> Result<(), LedgerError> {
        let mut row = csv_row(&[
            &record.timestamp,
            &record.name,
            &record.resource_group_name,
            &record.resource_id,
            &record.resource_type,
            &record.location,
            &record.old_tag_name,
            &record.new_tag_name,
            &record.tag_value,
            &record.all_tags,
            &record.status,
        ]);
        row.push('\n');
        self.file
            .write_all(row.as_bytes())
            .map_err(|e| io_error(&self.path, e))?;
        self.file.sync_data().map_err(|e| io_error(&self.path, e))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Load a completed ledger, validating the schema up front.
///
/// Fails the whole load (not per-row) when a required column is missing or
/// any row does not match the header width.
pub fn load_ledger(path: &Path) -> Result<Vec<BackupRecord>, LedgerError> {
    let content = std::fs::read_to_string(path).map_err(|e| io_error(path, e))?;
    let mut rows = parse_csv(&content).into_iter();

    let header = match rows.next() {
        Some(h) => h,
        None => {
            return Err(LedgerError::Empty {
                path: path.display().to_string(),
            })
        }
    };
    let positions: HashMap<&str, usize> = header
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i))
        .collect();
    for column in REQUIRED_COLUMNS {
        if !positions.contains_key(column) {
            return Err(LedgerError::MissingColumn {
                path: path.display().to_string(),
                column,
            });
        }
    }

    let field = |row: &[String], name: &str| -> String {
        positions
            .get(name)
            .and_then(|&i| row.get(i))
            .cloned()
            .unwrap_or_default()
    };

    let mut records = Vec::new();
    for (index, row) in rows.enumerate() {
        if row.len() != header.len() {
            return Err(LedgerError::MalformedRow {
                path: path.display().to_string(),
                row: index + 2,
                message: format!("expected {} fields, found {}", header.len(), row.len()),
            });
        }
        records.push(BackupRecord {
            timestamp: field(&row, "Timestamp"),
            name: field(&row, "Name"),
            resource_group_name: field(&row, "ResourceGroupName"),
            resource_id: field(&row, "ResourceId"),
            resource_type: field(&row, "ResourceType"),
            location: field(&row, "Location"),
            old_tag_name: field(&row, "OldTagName"),
            new_tag_name: field(&row, "NewTagName"),
            tag_value: field(&row, "TagValue"),
            all_tags: field(&row, "AllTags"),
            status: field(&row, "Status"),
        });
    }
    Ok(records)
}

fn io_error(path: &Path, source: std::io::Error) -> LedgerError {
    LedgerError::Io {
        path: path.display().to_string(),
        source,
    }
}

// -- CSV plumbing --

/// Quote a field when it contains a delimiter, quote, or line break.
fn csv_field(value: &str) -> String {
    if value.contains(['"', ',', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub(crate) fn csv_row(fields: &[&str]) -> String {
    fields
        .iter()
        .map(|f| csv_field(f))
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse CSV content into rows of fields, honoring quoted fields with
/// embedded delimiters, doubled quotes, and line breaks. Blank lines are
/// dropped.
fn parse_csv(content: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut fieldbuf = String::new();
    let mut in_quotes = false;

    let mut chars = content.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    fieldbuf.push('"');
                }
                '"' => in_quotes = false,
                _ => fieldbuf.push(c),
            }
        } else {
            match c {
                '"' => in_quotes = true,
                ',' => row.push(std::mem::take(&mut fieldbuf)),
                '\r' => {}
                '\n' => {
                    row.push(std::mem::take(&mut fieldbuf));
                    if !(row.len() == 1 && row[0].is_empty()) {
                        rows.push(std::mem::take(&mut row));
                    } else {
                        row.clear();
                    }
                }
                _ => fieldbuf.push(c),
            }
        }
    }
    if !fieldbuf.is_empty() || !row.is_empty() {
        row.push(fieldbuf);
        rows.push(row);
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(name: &str, value: &str) -> BackupRecord {
        BackupRecord {
            timestamp: "2026-08-06T09:00:00Z".to_string(),
            name: name.to_string(),
            resource_group_name: "rg-app".to_string(),
            resource_id: format!("/subscriptions/s/resourceGroups/rg-app/providers/x/vm/{name}"),
            resource_type: "x/vm".to_string(),
            location: "westeurope".to_string(),
            old_tag_name: "Environment".to_string(),
            new_tag_name: "Env".to_string(),
            tag_value: value.to_string(),
            all_tags: "CostCenter;Environment".to_string(),
            status: "Pending".to_string(),
        }
    }

    #[test]
    fn write_then_load_round_trips_bit_for_bit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.csv");

        let records = vec![
            sample_record("vm-prod-01", "Production"),
            sample_record("vm-db-02", "value,with,commas"),
            sample_record("vm-x", "say \"hi\"\nsecond line"),
        ];
        let mut writer = LedgerWriter::create(&path).unwrap();
        for record in &records {
            writer.append(record).unwrap();
        }
        drop(writer);

        let loaded = load_ledger(&path).unwrap();
        assert_eq!(loaded, records);
    }

    #[test]
    fn absent_tag_value_survives_as_empty_string() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.csv");

        let record = sample_record("vm-prod-01", "");
        let mut writer = LedgerWriter::create(&path).unwrap();
        writer.append(&record).unwrap();
        drop(writer);

        let loaded = load_ledger(&path).unwrap();
        assert_eq!(loaded[0].tag_value, "");
    }

    #[test]
    fn header_matches_the_documented_wire_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.csv");
        LedgerWriter::create(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content.lines().next().unwrap(),
            "Timestamp,Name,ResourceGroupName,ResourceId,ResourceType,Location,\
             OldTagName,NewTagName,TagValue,AllTags,Status"
        );
    }

    #[test]
    fn missing_required_column_rejects_the_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(
            &path,
            "Timestamp,Name,ResourceId,OldTagName,NewTagName\n\
             t,vm,/id,Environment,Env\n",
        )
        .unwrap();

        let err = load_ledger(&path).unwrap_err();
        match err {
            LedgerError::MissingColumn { column, .. } => assert_eq!(column, "TagValue"),
            other => panic!("expected MissingColumn, got: {other}"),
        }
    }

    #[test]
    fn short_row_rejects_the_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(
            &path,
            format!("{}\nonly,three,fields\n", csv_row(&LEDGER_COLUMNS)),
        )
        .unwrap();

        let err = load_ledger(&path).unwrap_err();
        match err {
            LedgerError::MalformedRow { row, .. } => assert_eq!(row, 2),
            other => panic!("expected MalformedRow, got: {other}"),
        }
    }

    #[test]
    fn empty_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        std::fs::write(&path, "").unwrap();

        assert!(matches!(
            load_ledger(&path).unwrap_err(),
            LedgerError::Empty { .. }
        ));
    }

    #[test]
    fn parse_csv_handles_quotes_and_embedded_newlines() {
        let rows = parse_csv("a,\"b,1\",\"line\nbreak\",\"say \"\"hi\"\"\"\nplain,x,y,z\n");
        assert_eq!(
            rows,
            vec![
                vec!["a", "b,1", "line\nbreak", "say \"hi\""],
                vec!["plain", "x", "y", "z"],
            ]
        );
    }
}

//! Rendering and writing of the export record.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::snapshot::ExportRecord;
use crate::types::{TidError, TidResult};

/// Line printed to stdout ahead of the JSON document.
pub const EXPORT_HEADER: &str = "=== JSON serialisable fields of ClientTransaction ===";

/// Render as 2-space indented JSON. Key order is kept and non-ASCII text is
/// written literally.
pub fn render(record: &ExportRecord) -> TidResult<String> {
    Ok(serde_json::to_string_pretty(record)?)
}

/// Writes an [`ExportRecord`] to stdout and to a single file.
#[derive(Debug, Clone)]
pub struct Exporter {
    path: PathBuf,
}

impl Exporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Destination file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Print the header and document to `out`, then overwrite the file.
    pub fn export<W: Write>(&self, record: &ExportRecord, out: &mut W) -> TidResult<()> {
        let json = render(record)?;

        writeln!(out, "\n{EXPORT_HEADER}")?;
        writeln!(out, "{json}")?;
        out.flush()?;
        tracing::info!("Printed {} fields to stdout", record.len());

        self.write_file(&json)?;
        writeln!(out, "\nSaved JSON to {}", self.path.display())?;
        out.flush()?;
        Ok(())
    }

    /// Replace the destination file with `json`. No backup, no temp file.
    pub fn write_file(&self, json: &str) -> TidResult<()> {
        let mut contents = String::with_capacity(json.len() + 1);
        contents.push_str(json);
        contents.push('\n');

        std::fs::write(&self.path, contents).map_err(|source| TidError::FileWrite {
            path: self.path.clone(),
            source,
        })?;
        tracing::info!("Wrote {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn record(value: Value) -> ExportRecord {
        match value {
            Value::Object(map) => ExportRecord::from(map),
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn test_render_is_indented_and_ordered() {
        let text = render(&record(json!({"zeta": 1, "alpha": [1, 2]}))).unwrap();
        assert_eq!(text, "{\n  \"zeta\": 1,\n  \"alpha\": [\n    1,\n    2\n  ]\n}");
    }

    #[test]
    fn test_render_keeps_non_ascii() {
        let text = render(&record(json!({"name": "▓▬▓ eidelweiss ▓▬▓"}))).unwrap();
        assert!(text.contains("▓▬▓ eidelweiss ▓▬▓"));
        assert!(!text.contains("\\u"));
    }

    #[test]
    fn test_export_writes_both_sinks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x_tid_state.json");
        let exporter = Exporter::new(&path);
        let mut out = Vec::new();

        exporter
            .export(&record(json!({"key": "abc", "frames": [1, 2, 3]})), &mut out)
            .unwrap();

        let stdout = String::from_utf8(out).unwrap();
        assert!(stdout.starts_with(&format!("\n{EXPORT_HEADER}\n{{")));
        assert!(stdout.contains("Saved JSON to"));

        let saved: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved, json!({"key": "abc", "frames": [1, 2, 3]}));
    }

    #[test]
    fn test_unwritable_path_is_file_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(dir.path().join("missing").join("out.json"));
        let mut out = Vec::new();
        let err = exporter.export(&ExportRecord::new(), &mut out).unwrap_err();
        assert!(matches!(err, TidError::FileWrite { .. }));
    }
}

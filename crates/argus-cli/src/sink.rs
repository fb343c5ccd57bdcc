use std::path::PathBuf;

use argus_core::error::AppError;
use argus_core::record::{FieldKey, Record};
use argus_core::traits::Sink;

/// Writes the canonical record set as a CSV file: one column per schema
/// field, plus the source tag of each surviving record.
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Sink for CsvSink {
    fn write(&self, records: &[Record]) -> Result<(), AppError> {
        let mut writer = csv::Writer::from_path(&self.path)
            .map_err(|e| AppError::Sink(format!("Could not create {}: {e}", self.path.display())))?;

        let mut header = vec!["source"];
        header.extend(FieldKey::ALL.iter().map(|key| key.as_str()));
        writer
            .write_record(&header)
            .map_err(|e| AppError::Sink(e.to_string()))?;

        for record in records {
            let mut row = vec![record.source.clone()];
            row.extend(FieldKey::ALL.iter().map(|key| record.get(*key).to_string()));
            writer
                .write_record(&row)
                .map_err(|e| AppError::Sink(e.to_string()))?;
        }

        writer
            .flush()
            .map_err(|e| AppError::Sink(e.to_string()))?;
        tracing::info!(path = %self.path.display(), records = records.len(), "Wrote CSV output");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        let mut record = Record::new("icodrops");
        record.set(FieldKey::Name, "Foo");
        record.set(FieldKey::Raised, "5M");

        CsvSink::new(&path).write(&[record]).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let header = reader.headers().unwrap().clone();
        assert_eq!(header.len(), 1 + FieldKey::ALL.len());
        assert_eq!(&header[0], "source");

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][0], "icodrops");
        assert!(rows[0].iter().any(|cell| cell == "Foo"));
        assert!(rows[0].iter().any(|cell| cell == "5M"));
    }

    #[test]
    fn unwritable_path_is_a_sink_error() {
        let sink = CsvSink::new("/nonexistent-dir/out.csv");
        let err = sink.write(&[]).unwrap_err();
        assert!(matches!(err, AppError::Sink(_)));
    }
}

//! CSV artifact store.
//!
//! Artifacts live under a root directory at [`ArtifactKey::relative_path`].
//! Frames are written wide (`date,<column>...`), correlation matrices with a
//! leading label column, and missing values as empty cells.

use crate::domain::artifact::ArtifactKey;
use crate::domain::correlation::CorrelationMatrix;
use crate::domain::distribution::DensityRow;
use crate::domain::error::CorrError;
use crate::domain::frame::TimeFrame;
use crate::ports::artifact_port::ArtifactStore;
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct CsvStore {
    root: PathBuf,
}

impl CsvStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, key: &ArtifactKey) -> PathBuf {
        self.root.join(key.relative_path())
    }

    fn writer(&self, key: &ArtifactKey) -> Result<(csv::Writer<fs::File>, PathBuf), CorrError> {
        let path = self.path_of(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let writer = csv::Writer::from_path(&path).map_err(|e| artifact_error(&path, e))?;
        Ok((writer, path))
    }

    fn reader(&self, key: &ArtifactKey) -> Result<(csv::Reader<fs::File>, PathBuf), CorrError> {
        let path = self.path_of(key);
        if !path.is_file() {
            return Err(CorrError::MissingArtifact {
                path: path.display().to_string(),
            });
        }
        let reader = csv::Reader::from_path(&path).map_err(|e| artifact_error(&path, e))?;
        Ok((reader, path))
    }
}

fn artifact_error(path: &Path, e: impl std::fmt::Display) -> CorrError {
    CorrError::Artifact {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}

fn format_value(v: f64) -> String {
    if v.is_finite() { v.to_string() } else { String::new() }
}

fn parse_value(path: &Path, s: &str) -> Result<f64, CorrError> {
    let s = s.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("nan") {
        return Ok(f64::NAN);
    }
    s.parse()
        .map_err(|_| artifact_error(path, format!("invalid number '{}'", s)))
}

fn finish(mut writer: csv::Writer<fs::File>, path: PathBuf) -> Result<PathBuf, CorrError> {
    writer.flush()?;
    debug!(path = %path.display(), "artifact written");
    Ok(path)
}

impl ArtifactStore for CsvStore {
    fn save_frame(&self, key: &ArtifactKey, frame: &TimeFrame) -> Result<PathBuf, CorrError> {
        let (mut wtr, path) = self.writer(key)?;

        let mut header = vec!["date".to_string()];
        header.extend(frame.columns.iter().cloned());
        wtr.write_record(&header).map_err(|e| artifact_error(&path, e))?;

        for (row, date) in frame.dates.iter().enumerate() {
            let mut record = vec![date.format("%Y-%m-%d").to_string()];
            record.extend(frame.values.iter().map(|col| format_value(col[row])));
            wtr.write_record(&record).map_err(|e| artifact_error(&path, e))?;
        }
        finish(wtr, path)
    }

    fn load_frame(&self, key: &ArtifactKey) -> Result<TimeFrame, CorrError> {
        let (mut rdr, path) = self.reader(key)?;

        let headers = rdr.headers().map_err(|e| artifact_error(&path, e))?.clone();
        if headers.get(0).map(str::trim) != Some("date") {
            return Err(artifact_error(&path, "first column must be 'date'"));
        }
        let columns: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();

        let mut dates = Vec::new();
        let mut values = vec![Vec::new(); columns.len()];
        for result in rdr.records() {
            let record = result.map_err(|e| artifact_error(&path, e))?;
            let date_str = record.get(0).unwrap_or("");
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
                .map_err(|e| artifact_error(&path, format!("invalid date '{}': {}", date_str, e)))?;
            dates.push(date);
            for (i, col) in values.iter_mut().enumerate() {
                col.push(parse_value(&path, record.get(i + 1).unwrap_or(""))?);
            }
        }

        TimeFrame::new(dates, columns, values)
    }

    fn save_correlation(
        &self,
        key: &ArtifactKey,
        matrix: &CorrelationMatrix,
    ) -> Result<PathBuf, CorrError> {
        let (mut wtr, path) = self.writer(key)?;

        let mut header = vec!["label".to_string()];
        header.extend(matrix.labels.iter().cloned());
        wtr.write_record(&header).map_err(|e| artifact_error(&path, e))?;

        for (label, row) in matrix.labels.iter().zip(&matrix.values) {
            let mut record = vec![label.clone()];
            record.extend(row.iter().map(|v| format_value(*v)));
            wtr.write_record(&record).map_err(|e| artifact_error(&path, e))?;
        }
        finish(wtr, path)
    }

    fn load_correlation(&self, key: &ArtifactKey) -> Result<CorrelationMatrix, CorrError> {
        let (mut rdr, path) = self.reader(key)?;

        let headers = rdr.headers().map_err(|e| artifact_error(&path, e))?.clone();
        let labels: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();

        let mut values = Vec::with_capacity(labels.len());
        for result in rdr.records() {
            let record = result.map_err(|e| artifact_error(&path, e))?;
            let row = (1..=labels.len())
                .map(|i| parse_value(&path, record.get(i).unwrap_or("")))
                .collect::<Result<Vec<f64>, _>>()?;
            values.push(row);
        }

        if values.len() != labels.len() {
            return Err(artifact_error(
                &path,
                format!("{} rows for {} labels", values.len(), labels.len()),
            ));
        }
        Ok(CorrelationMatrix { labels, values })
    }

    fn save_sample(&self, key: &ArtifactKey, values: &[f64]) -> Result<PathBuf, CorrError> {
        let (mut wtr, path) = self.writer(key)?;
        wtr.write_record(["value"]).map_err(|e| artifact_error(&path, e))?;
        for v in values {
            wtr.write_record([format_value(*v)])
                .map_err(|e| artifact_error(&path, e))?;
        }
        finish(wtr, path)
    }

    fn load_sample(&self, key: &ArtifactKey) -> Result<Vec<f64>, CorrError> {
        let (mut rdr, path) = self.reader(key)?;
        let mut values = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| artifact_error(&path, e))?;
            values.push(parse_value(&path, record.get(0).unwrap_or(""))?);
        }
        Ok(values)
    }

    fn save_density(&self, key: &ArtifactKey, rows: &[DensityRow]) -> Result<PathBuf, CorrError> {
        let (mut wtr, path) = self.writer(key)?;
        wtr.write_record(["center", "empirical", "gaussian"])
            .map_err(|e| artifact_error(&path, e))?;
        for row in rows {
            wtr.write_record([
                format_value(row.center),
                format_value(row.empirical),
                format_value(row.gaussian),
            ])
            .map_err(|e| artifact_error(&path, e))?;
        }
        finish(wtr, path)
    }

    fn exists(&self, key: &ArtifactKey) -> bool {
        self.path_of(key).is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::artifact::RunTag;
    use crate::domain::normalize::Normalization;
    use tempfile::TempDir;

    fn tag() -> RunTag {
        RunTag::new(
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2020, 12, 31).unwrap(),
            "1d",
        )
    }

    fn frame() -> TimeFrame {
        TimeFrame::new(
            vec![
                NaiveDate::from_ymd_opt(2020, 1, 2).unwrap(),
                NaiveDate::from_ymd_opt(2020, 1, 3).unwrap(),
            ],
            vec!["eur_usd".into(), "gbp_usd".into()],
            vec![vec![0.001, f64::NAN], vec![-0.002, 0.0035]],
        )
        .unwrap()
    }

    #[test]
    fn frame_survives_disk() {
        let dir = TempDir::new().unwrap();
        let store = CsvStore::new(dir.path().to_path_buf());
        let key = ArtifactKey::returns(&tag());

        let path = store.save_frame(&key, &frame()).unwrap();
        assert!(path.starts_with(dir.path().join("returns")));
        assert!(store.exists(&key));

        let loaded = store.load_frame(&key).unwrap();
        assert_eq!(loaded.dates, frame().dates);
        assert_eq!(loaded.columns, frame().columns);
        assert_eq!(loaded.column(0)[0], 0.001);
        assert!(loaded.column(0)[1].is_nan());
        assert_eq!(loaded.column(1), &[-0.002, 0.0035]);
    }

    #[test]
    fn missing_artifact_is_reported() {
        let dir = TempDir::new().unwrap();
        let store = CsvStore::new(dir.path().to_path_buf());
        let err = store.load_frame(&ArtifactKey::returns(&tag())).unwrap_err();
        assert!(err.is_missing_artifact());
    }

    #[test]
    fn correlation_written_with_labels() {
        let dir = TempDir::new().unwrap();
        let store = CsvStore::new(dir.path().to_path_buf());
        let key = ArtifactKey::correlation(&tag(), &Normalization::Global);
        let matrix = CorrelationMatrix {
            labels: vec!["A".into(), "B".into()],
            values: vec![vec![1.0, -0.25], vec![-0.25, 1.0]],
        };

        let path = store.save_correlation(&key, &matrix).unwrap();
        let text = fs::read_to_string(path).unwrap();
        assert_eq!(text.lines().next(), Some("label,A,B"));
        assert_eq!(text.lines().nth(1), Some("A,1,-0.25"));

        assert_eq!(store.load_correlation(&key).unwrap(), matrix);
    }

    #[test]
    fn sample_and_density_files() {
        let dir = TempDir::new().unwrap();
        let store = CsvStore::new(dir.path().to_path_buf());
        let sample_key = ArtifactKey::aggregated(&tag(), &Normalization::Global);
        store.save_sample(&sample_key, &[0.5, -1.25]).unwrap();
        assert_eq!(store.load_sample(&sample_key).unwrap(), vec![0.5, -1.25]);

        let density_key = ArtifactKey::density(&tag(), &Normalization::Global);
        let path = store
            .save_density(
                &density_key,
                &[DensityRow {
                    center: 0.5,
                    empirical: 0.25,
                    gaussian: 0.35,
                }],
            )
            .unwrap();
        let text = fs::read_to_string(path).unwrap();
        assert_eq!(text, "center,empirical,gaussian\n0.5,0.25,0.35\n");
    }

    #[test]
    fn malformed_frame_is_an_artifact_error() {
        let dir = TempDir::new().unwrap();
        let store = CsvStore::new(dir.path().to_path_buf());
        let key = ArtifactKey::returns(&tag());
        let path = store.path_of(&key);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "date,A\n2020-01-02,abc\n").unwrap();

        let err = store.load_frame(&key).unwrap_err();
        assert!(matches!(err, CorrError::Artifact { .. }));
    }
}

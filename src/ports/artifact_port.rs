//! Persistence port for pipeline artifacts.
//!
//! Loads return [`CorrError::MissingArtifact`] when the artifact has not been
//! written yet, which the pipeline treats as "skip this stage".

use crate::domain::artifact::ArtifactKey;
use crate::domain::correlation::CorrelationMatrix;
use crate::domain::distribution::DensityRow;
use crate::domain::error::CorrError;
use crate::domain::frame::TimeFrame;
use std::path::PathBuf;

pub trait ArtifactStore {
    fn save_frame(&self, key: &ArtifactKey, frame: &TimeFrame) -> Result<PathBuf, CorrError>;
    fn load_frame(&self, key: &ArtifactKey) -> Result<TimeFrame, CorrError>;

    fn save_correlation(
        &self,
        key: &ArtifactKey,
        matrix: &CorrelationMatrix,
    ) -> Result<PathBuf, CorrError>;
    fn load_correlation(&self, key: &ArtifactKey) -> Result<CorrelationMatrix, CorrError>;

    fn save_sample(&self, key: &ArtifactKey, values: &[f64]) -> Result<PathBuf, CorrError>;
    fn load_sample(&self, key: &ArtifactKey) -> Result<Vec<f64>, CorrError>;

    fn save_density(&self, key: &ArtifactKey, rows: &[DensityRow]) -> Result<PathBuf, CorrError>;

    fn exists(&self, key: &ArtifactKey) -> bool;
}

use std::{
    fs::File,
    io::{self, BufRead as _, BufReader},
    path::{Path, PathBuf},
};

use crate::{
    mask::{FeatureMask, MaskError},
    metadata::{DatasetMetadata, MetadataError},
    sample::{Sample, SampleError},
};

/// File locations of one task's dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetPaths {
    pub samples: PathBuf,
    pub metadata: PathBuf,
    pub normalization: PathBuf,
}

impl DatasetPaths {
    /// `<data_dir>/<data_type>CV/alldata-<task>.txt` and its companions.
    #[must_use]
    pub fn new(data_dir: &Path, data_type: &str, task: u32) -> Self {
        let dir = data_dir.join(format!("{data_type}CV"));
        Self {
            samples: dir.join(format!("alldata-{task}.txt")),
            metadata: dir.join(format!("alldata-{task}-metadata.txt")),
            normalization: dir.join(format!("normalisation-{task}.json")),
        }
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum DatasetError {
    #[display("metadata not found or malformed; cannot initialize the scorer")]
    Metadata { source: MetadataError },
    #[display("invalid hidden-feature mask")]
    Mask { source: MaskError },
    #[display("failed to read samples file {}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[display("failed to parse sample at {}:{line}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        source: serde_json::Error,
    },
    #[display("invalid sample at {}:{line}", path.display())]
    InvalidSample {
        path: PathBuf,
        line: usize,
        source: SampleError,
    },
    #[display("requested {requested} samples but only {available} are available")]
    NotEnoughSamples { requested: usize, available: usize },
    #[display("dataset contains no samples")]
    Empty,
}

/// In-memory sample store; immutable once loaded.
#[derive(Debug, Clone)]
pub struct Dataset {
    metadata: DatasetMetadata,
    samples: Vec<Sample>,
}

impl Dataset {
    /// Builds a dataset from already-loaded samples, validating each against `metadata`.
    pub fn from_samples(
        metadata: DatasetMetadata,
        samples: Vec<Sample>,
    ) -> Result<Self, DatasetError> {
        if samples.is_empty() {
            return Err(DatasetError::Empty);
        }
        for (index, sample) in samples.iter().enumerate() {
            sample
                .validate(&metadata)
                .map_err(|source| DatasetError::InvalidSample {
                    path: PathBuf::new(),
                    line: index + 1,
                    source,
                })?;
        }
        Ok(Self { metadata, samples })
    }

    /// Loads metadata, then at most `limit` samples, applying `mask` when given.
    ///
    /// The metadata is read before the samples file is touched, so a missing or
    /// malformed metadata file fails fast.
    pub fn load(
        paths: &DatasetPaths,
        limit: Option<usize>,
        mask: Option<&FeatureMask>,
    ) -> Result<Self, DatasetError> {
        let raw_metadata = DatasetMetadata::read(&paths.metadata)
            .map_err(|source| DatasetError::Metadata { source })?;
        if let Some(mask) = mask {
            mask.check(&raw_metadata)
                .map_err(|source| DatasetError::Mask { source })?;
        }

        let path = &paths.samples;
        let file = File::open(path).map_err(|source| DatasetError::Io {
            path: path.clone(),
            source,
        })?;

        let mut samples = Vec::with_capacity(limit.unwrap_or(0));
        for (index, line) in BufReader::new(file).lines().enumerate() {
            if limit.is_some_and(|limit| samples.len() >= limit) {
                break;
            }
            let line = line.map_err(|source| DatasetError::Io {
                path: path.clone(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let sample: Sample =
                serde_json::from_str(&line).map_err(|source| DatasetError::Parse {
                    path: path.clone(),
                    line: index + 1,
                    source,
                })?;
            sample
                .validate(&raw_metadata)
                .map_err(|source| DatasetError::InvalidSample {
                    path: path.clone(),
                    line: index + 1,
                    source,
                })?;
            samples.push(match mask {
                Some(mask) => sample.masked(mask),
                None => sample,
            });
        }

        if let Some(requested) = limit
            && samples.len() < requested
        {
            return Err(DatasetError::NotEnoughSamples {
                requested,
                available: samples.len(),
            });
        }
        if samples.is_empty() {
            return Err(DatasetError::Empty);
        }

        let metadata = match mask {
            Some(mask) => raw_metadata.masked(mask),
            None => raw_metadata,
        };
        log::info!(
            "Loaded {} samples from {} (state width {}, action width {}, max actions {})",
            samples.len(),
            path.display(),
            metadata.state_width,
            metadata.action_width,
            metadata.max_actions
        );
        Ok(Self { metadata, samples })
    }

    #[must_use]
    pub fn metadata(&self) -> &DatasetMetadata {
        &self.metadata
    }

    #[must_use]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

//! Zero-mean/unit-variance feature normalization.
//!
//! Statistics are computed once over every state-action row of the dataset (one row per
//! legal action of every sample) and then applied unchanged to every training and
//! evaluation input. Columns with no variance are only centered.
//!
//! Computing the statistics is a full pass over the data, so they are cached as JSON
//! next to the dataset and re-used by later runs on the same task. The cache records
//! the sample count and hidden-feature indices it was computed from, and is only
//! re-used when both match.

use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Write as _},
    path::{Path, PathBuf},
};

use actrank_model::FeatureMatrix;
use actrank_stats::running::ColumnStats;
use serde::{Deserialize, Serialize};

use crate::{mask::FeatureMask, metadata::DatasetMetadata, sample::Sample};

const MIN_STD_DEV: f32 = 1e-6;

/// The dataset selection a set of statistics was computed from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct NormalizationSource {
    pub samples: usize,
    pub hidden_state: Vec<usize>,
    pub hidden_action: Vec<usize>,
}

impl NormalizationSource {
    #[must_use]
    pub fn new(samples: usize, mask: Option<&FeatureMask>) -> Self {
        Self {
            samples,
            hidden_state: mask.map(|m| m.hidden_state().collect()).unwrap_or_default(),
            hidden_action: mask.map(|m| m.hidden_action().collect()).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NormalizationParams {
    /// Caches written without a source never match and are recomputed.
    #[serde(default)]
    pub source: NormalizationSource,
    /// Number of state-action rows the statistics were computed from.
    pub rows: u64,
    pub means: Vec<f32>,
    pub std_devs: Vec<f32>,
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum NormalizationError {
    #[display("failed to access normalization file {}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[display("failed to parse normalization file {}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl NormalizationParams {
    /// `mask` is the hidden-feature mask already applied to `samples`; it only keys
    /// the cache.
    #[must_use]
    pub fn from_samples(
        metadata: &DatasetMetadata,
        samples: &[Sample],
        mask: Option<&FeatureMask>,
    ) -> Self {
        let mut columns = ColumnStats::new(metadata.input_width());
        let mut row = Vec::with_capacity(metadata.input_width());
        for sample in samples {
            for action in &sample.actions {
                row.clear();
                row.extend_from_slice(&sample.state);
                row.extend_from_slice(action);
                columns.push_row(&row);
            }
        }
        Self {
            source: NormalizationSource::new(samples.len(), mask),
            rows: columns.rows(),
            means: columns.means(),
            std_devs: columns.std_devs(),
        }
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.means.len()
    }

    /// Normalizes every row of `features` in place.
    ///
    /// # Panics
    ///
    /// Panics if the matrix width differs from the statistics width.
    pub fn normalize(&self, features: &mut FeatureMatrix) {
        assert_eq!(features.cols(), self.width(), "normalization width mismatch");
        features.map_columns_in_place(|col, value| {
            let centered = value - self.means[col];
            let std_dev = self.std_devs[col];
            if std_dev > MIN_STD_DEV {
                centered / std_dev
            } else {
                centered
            }
        });
    }

    pub fn load<P>(path: P) -> Result<Self, NormalizationError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| NormalizationError::Io {
            path: path.to_owned(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| NormalizationError::Json {
            path: path.to_owned(),
            source,
        })
    }

    pub fn save<P>(&self, path: P) -> Result<(), NormalizationError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let io_err = |source| NormalizationError::Io {
            path: path.to_owned(),
            source,
        };
        let mut writer = BufWriter::new(File::create(path).map_err(io_err)?);
        serde_json::to_writer_pretty(&mut writer, self).map_err(|source| {
            NormalizationError::Json {
                path: path.to_owned(),
                source,
            }
        })?;
        writeln!(writer).map_err(io_err)?;
        writer.flush().map_err(io_err)
    }

    /// Re-uses cached statistics when they were computed from the same samples, mask
    /// and width, otherwise computes and caches them.
    pub fn load_or_compute<P>(
        path: P,
        metadata: &DatasetMetadata,
        samples: &[Sample],
        mask: Option<&FeatureMask>,
    ) -> Result<Self, NormalizationError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        if path.exists() {
            let params = Self::load(path)?;
            let source = NormalizationSource::new(samples.len(), mask);
            if params.width() == metadata.input_width() && params.source == source {
                log::info!(
                    "Using cached normalization parameters from {}",
                    path.display()
                );
                return Ok(params);
            }
            log::warn!(
                "Cached normalization parameters in {} ({} columns, {:?}) do not match \
                 the dataset ({} columns, {source:?}); recomputing",
                path.display(),
                params.width(),
                params.source,
                metadata.input_width()
            );
        }

        log::info!("Computing normalization parameters...");
        let params = Self::from_samples(metadata, samples, mask);
        params.save(path)?;
        log::info!(
            "Normalization parameters computed from {} rows and saved to {}",
            params.rows,
            path.display()
        );
        Ok(params)
    }
}

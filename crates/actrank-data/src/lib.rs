//! Recorded human decisions and the transforms applied to them before scoring.
//!
//! # Overview
//!
//! A dataset is a pair of files in a task directory:
//!
//! ```text
//! <data_dir>/<data_type>CV/
//! ├─ alldata-<task>.txt            one JSON sample per line
//! ├─ alldata-<task>-metadata.txt   three `key:value` lines (widths, max actions)
//! └─ normalisation-<task>.json     cached normalization statistics (written on demand)
//! ```
//!
//! Loading goes through four steps:
//!
//! 1. **Metadata** ([`metadata::DatasetMetadata`]): read first; a missing or malformed
//!    file aborts before any sample is parsed
//! 2. **Samples** ([`sample::Sample`]): parsed line by line and validated against the
//!    metadata
//! 3. **Masking** ([`mask::FeatureMask`]): optionally drop hidden features from both the
//!    state and the action part of every sample
//! 4. **Normalization** ([`normalization::NormalizationParams`]): optional per-column
//!    zero-mean/unit-variance statistics over the whole dataset
//!
//! [`transform::SampleTransform`] then turns each sample into a
//! [`TrainingExample`](actrank_model::TrainingExample): one feature row per legal action
//! and a target built from the taken action and the per-action quality metric.
//!
//! # Known Limitation
//!
//! Normalization statistics are computed over the *full* dataset before it is split
//! into folds, so held-out samples influence the normalization seen while training each
//! fold. This mirrors how the recorded experiments were run and is not strict
//! no-leakage cross-validation.

pub mod dataset;
pub mod mask;
pub mod metadata;
pub mod normalization;
pub mod sample;
pub mod transform;

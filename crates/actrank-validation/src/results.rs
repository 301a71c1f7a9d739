//! Persistence of fold results.
//!
//! Each fold writes its artifacts to one fixed working directory
//! (`<output_dir>/results`). Before the next fold starts they are moved, all at once,
//! into `<output_dir>/<fold>/`, so a later fold can never overwrite an earlier one.
//! After the last fold a consolidated `<output_dir>/cv-results-<task>.json` is written.

use std::{
    fs::{self, File},
    io::{self, BufWriter, Write as _},
    path::{Path, PathBuf},
};

use actrank_stats::descriptive::DescriptiveStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    driver::ResultSink,
    metrics::{EpochMetrics, MetricSeries},
};

const WORK_DIR_NAME: &str = "results";
const METRICS_JSON: &str = "metrics.json";
const METRICS_CSV: &str = "metrics.csv";

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum RelocationError {
    #[display("failed to list {}", path.display())]
    List { path: PathBuf, source: io::Error },
    #[display("refusing to overwrite existing {}", path.display())]
    TargetExists { path: PathBuf },
    #[display("failed to move {} to {}", from.display(), to.display())]
    Move {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum ResultError {
    #[display("failed to write {}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[display("failed to serialize {}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[display("failed to relocate results of fold {fold}")]
    Relocation {
        fold: usize,
        source: RelocationError,
    },
}

/// Moves every file in `from` into `to` (created if needed), all or nothing.
///
/// A missing or empty `from` is a no-op. Existing files in `to` are never overwritten;
/// if any move fails, files already moved are put back and the failing file is
/// reported. Returns the relocated paths.
pub fn relocate_artifacts<P, Q>(from: P, to: Q) -> Result<Vec<PathBuf>, RelocationError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    relocate_with(from.as_ref(), to.as_ref(), move_file)
}

fn relocate_with<F>(
    from: &Path,
    to: &Path,
    mut mover: F,
) -> Result<Vec<PathBuf>, RelocationError>
where
    F: FnMut(&Path, &Path) -> io::Result<()>,
{
    let list_err = |source| RelocationError::List {
        path: from.to_owned(),
        source,
    };

    let entries = match fs::read_dir(from) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(vec![]),
        Err(e) => return Err(list_err(e)),
    };
    let mut files = vec![];
    for entry in entries {
        let entry = entry.map_err(list_err)?;
        if entry.file_type().map_err(list_err)?.is_file() {
            files.push(entry.file_name());
        }
    }
    if files.is_empty() {
        return Ok(vec![]);
    }
    files.sort();

    for name in &files {
        let target = to.join(name);
        if target.exists() {
            return Err(RelocationError::TargetExists { path: target });
        }
    }
    fs::create_dir_all(to).map_err(|source| RelocationError::Move {
        from: from.to_owned(),
        to: to.to_owned(),
        source,
    })?;

    let mut moved: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(files.len());
    for name in &files {
        let (src, dst) = (from.join(name), to.join(name));
        if let Err(source) = mover(src.as_path(), dst.as_path()) {
            for (back_src, back_dst) in moved.iter().rev() {
                if let Err(e) = mover(back_dst.as_path(), back_src.as_path()) {
                    log::error!(
                        "Failed to restore {} to {}: {e}",
                        back_dst.display(),
                        back_src.display()
                    );
                }
            }
            return Err(RelocationError::Move {
                from: src,
                to: dst,
                source,
            });
        }
        moved.push((src, dst));
    }
    Ok(moved.into_iter().map(|(_, dst)| dst).collect())
}

/// Renames, falling back to copy-and-remove across filesystems.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    copy_then_remove(from, to, |path| fs::remove_file(path))
}

/// Copies `from` to `to`, then removes `from`; the copy is deleted again if that fails.
fn copy_then_remove<R>(from: &Path, to: &Path, remove_source: R) -> io::Result<()>
where
    R: FnOnce(&Path) -> io::Result<()>,
{
    fs::copy(from, to)?;
    if let Err(e) = remove_source(from) {
        if let Err(cleanup) = fs::remove_file(to) {
            log::error!("Failed to remove partial copy {}: {cleanup}", to.display());
        }
        return Err(e);
    }
    Ok(())
}

/// Statistics of one metric across folds.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct EpochSummary {
    pub epoch: usize,
    pub train_score: DescriptiveStats,
    pub test_score: DescriptiveStats,
    pub train_accuracy: DescriptiveStats,
    pub test_accuracy: DescriptiveStats,
    pub train_rank: DescriptiveStats,
    pub test_rank: DescriptiveStats,
}

impl EpochSummary {
    /// Summarizes epoch `epoch` (1-based) over every series that reached it.
    #[must_use]
    pub fn across_folds(epoch: usize, folds: &[MetricSeries]) -> Option<Self> {
        let rows = folds
            .iter()
            .filter_map(|s| s.epochs.get(epoch.checked_sub(1)?))
            .collect::<Vec<_>>();
        let stats =
            |f: fn(&EpochMetrics) -> f32| DescriptiveStats::new(rows.iter().map(|m| f(m)));
        Some(Self {
            epoch,
            train_score: stats(|m| m.train_score)?,
            test_score: stats(|m| m.test_score)?,
            train_accuracy: stats(|m| m.train_accuracy)?,
            test_accuracy: stats(|m| m.test_accuracy)?,
            train_rank: stats(|m| m.train_rank)?,
            test_rank: stats(|m| m.test_rank)?,
        })
    }
}

/// Contents of `cv-results-<task>.json`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CrossValidationReport {
    pub task: u32,
    pub completed_at: DateTime<Utc>,
    pub folds: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
    pub epochs: Vec<EpochSummary>,
    pub series: Vec<MetricSeries>,
}

impl CrossValidationReport {
    #[must_use]
    pub fn new(task: u32, folds: &[MetricSeries], config: Option<serde_json::Value>) -> Self {
        let epoch_count = folds.iter().map(MetricSeries::len).max().unwrap_or(0);
        Self {
            task,
            completed_at: Utc::now(),
            folds: folds.len(),
            config,
            epochs: (1..=epoch_count)
                .filter_map(|epoch| EpochSummary::across_folds(epoch, folds))
                .collect(),
            series: folds.to_vec(),
        }
    }
}

/// Writes fold artifacts below an output directory.
#[derive(Debug, Clone)]
pub struct ResultStore {
    output_dir: PathBuf,
    task: u32,
    config: Option<serde_json::Value>,
}

impl ResultStore {
    pub fn new<P>(output_dir: P, task: u32) -> Self
    where
        P: Into<PathBuf>,
    {
        Self {
            output_dir: output_dir.into(),
            task,
            config: None,
        }
    }

    /// Embeds the resolved run configuration in the final report.
    #[must_use]
    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = Some(config);
        self
    }

    #[must_use]
    pub fn work_dir(&self) -> PathBuf {
        self.output_dir.join(WORK_DIR_NAME)
    }

    #[must_use]
    pub fn fold_dir(&self, fold: usize) -> PathBuf {
        self.output_dir.join(fold.to_string())
    }

    #[must_use]
    pub fn report_path(&self) -> PathBuf {
        self.output_dir.join(format!("cv-results-{}.json", self.task))
    }

    fn write_artifacts(&self, series: &MetricSeries) -> Result<(), ResultError> {
        let dir = self.work_dir();
        fs::create_dir_all(&dir).map_err(|source| ResultError::Io {
            path: dir.clone(),
            source,
        })?;
        write_json(&dir.join(METRICS_JSON), series)?;
        let path = dir.join(METRICS_CSV);
        fs::write(&path, series.to_csv()).map_err(|source| ResultError::Io { path, source })
    }
}

impl ResultSink for ResultStore {
    fn record_fold(&mut self, series: &MetricSeries) -> Result<(), ResultError> {
        self.write_artifacts(series)?;
        let moved = relocate_artifacts(self.work_dir(), self.fold_dir(series.fold)).map_err(
            |source| ResultError::Relocation {
                fold: series.fold,
                source,
            },
        )?;
        log::info!(
            "Saved {} result files of fold {} to {}",
            moved.len(),
            series.fold + 1,
            self.fold_dir(series.fold).display()
        );
        Ok(())
    }

    fn finalize(&mut self, folds: &[MetricSeries]) -> Result<(), ResultError> {
        let report = CrossValidationReport::new(self.task, folds, self.config.clone());
        let path = self.report_path();
        write_json(&path, &report)?;
        if let Some(last) = report.epochs.last() {
            log::info!(
                "Final epoch {} across {} folds: test accuracy {:.4} ± {:.4}, test rank {:.3} ± {:.3}",
                last.epoch,
                report.folds,
                last.test_accuracy.mean,
                last.test_accuracy.std_dev,
                last.test_rank.mean,
                last.test_rank.std_dev
            );
        }
        log::info!("Results written to {}", path.display());
        Ok(())
    }
}

fn write_json<T>(path: &Path, value: &T) -> Result<(), ResultError>
where
    T: Serialize,
{
    let io_err = |source| ResultError::Io {
        path: path.to_owned(),
        source,
    };
    let mut writer = BufWriter::new(File::create(path).map_err(io_err)?);
    serde_json::to_writer_pretty(&mut writer, value).map_err(|source| ResultError::Json {
        path: path.to_owned(),
        source,
    })?;
    writeln!(writer).map_err(io_err)?;
    writer.flush().map_err(io_err)
}

#[cfg(test)]
mod tests {
    use crate::evaluation::EvaluationSummary;

    use super::*;

    fn series(fold: usize, epochs: usize, accuracy: f32) -> MetricSeries {
        let summary = EvaluationSummary {
            samples: 10,
            score: 0.5,
            accuracy,
            mean_rank: 1.5,
        };
        let mut series = MetricSeries::new(fold);
        for epoch in 1..=epochs {
            series.push(EpochMetrics::new(epoch, &summary, &summary));
        }
        series
    }

    #[test]
    fn test_relocate_missing_or_empty_dir_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        let target = dir.path().join("0");
        assert!(relocate_artifacts(&missing, &target).unwrap().is_empty());

        let empty = dir.path().join("empty");
        fs::create_dir(&empty).unwrap();
        assert!(relocate_artifacts(&empty, &target).unwrap().is_empty());
        assert!(relocate_artifacts(&empty, &target).unwrap().is_empty());
        assert!(!target.exists());
    }

    #[test]
    fn test_relocate_moves_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let work = dir.path().join("results");
        fs::create_dir(&work).unwrap();
        fs::write(work.join("a.txt"), "a").unwrap();
        fs::write(work.join("b.txt"), "b").unwrap();

        let target = dir.path().join("3");
        let moved = relocate_artifacts(&work, &target).unwrap();
        assert_eq!(moved, vec![target.join("a.txt"), target.join("b.txt")]);
        assert_eq!(fs::read_to_string(target.join("b.txt")).unwrap(), "b");
        assert_eq!(fs::read_dir(&work).unwrap().count(), 0);
    }

    #[test]
    fn test_relocate_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let work = dir.path().join("results");
        let target = dir.path().join("0");
        fs::create_dir(&work).unwrap();
        fs::create_dir(&target).unwrap();
        fs::write(work.join("a.txt"), "new").unwrap();
        fs::write(work.join("b.txt"), "new").unwrap();
        fs::write(target.join("b.txt"), "old").unwrap();

        let err = relocate_artifacts(&work, &target).unwrap_err();
        assert!(matches!(
            err,
            RelocationError::TargetExists { ref path } if *path == target.join("b.txt")
        ));
        // nothing moved
        assert!(work.join("a.txt").exists());
        assert!(!target.join("a.txt").exists());
        assert_eq!(fs::read_to_string(target.join("b.txt")).unwrap(), "old");
    }

    #[test]
    fn test_relocate_failure_restores_moved_files() {
        let dir = tempfile::tempdir().unwrap();
        let work = dir.path().join("results");
        let target = dir.path().join("0");
        fs::create_dir(&work).unwrap();
        for name in ["a.txt", "b.txt", "c.txt"] {
            fs::write(work.join(name), name).unwrap();
        }

        let mut calls = 0;
        let err = relocate_with(&work, &target, |from, to| {
            calls += 1;
            if from.ends_with("b.txt") {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "locked"));
            }
            move_file(from, to)
        })
        .unwrap_err();

        // a.txt moved, b.txt failed, a.txt moved back
        assert_eq!(calls, 3);
        assert!(matches!(
            err,
            RelocationError::Move { ref from, .. } if *from == work.join("b.txt")
        ));
        for name in ["a.txt", "b.txt", "c.txt"] {
            assert_eq!(fs::read_to_string(work.join(name)).unwrap(), name);
            assert!(!target.join(name).exists());
        }
    }

    #[test]
    fn test_copy_fallback_removes_copy_when_source_stays() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("metrics.json");
        let to = dir.path().join("copy.json");
        fs::write(&from, "{}").unwrap();

        let err = copy_then_remove(&from, &to, |_| {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "busy"))
        })
        .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        assert!(from.exists());
        assert!(!to.exists());

        copy_then_remove(&from, &to, |path| fs::remove_file(path)).unwrap();
        assert!(!from.exists());
        assert_eq!(fs::read_to_string(&to).unwrap(), "{}");
    }

    #[test]
    fn test_epoch_summary_across_folds() {
        let folds = [series(0, 2, 0.25), series(1, 2, 0.75)];
        let summary = EpochSummary::across_folds(2, &folds).unwrap();
        assert_eq!(summary.test_accuracy.count, 2);
        assert_eq!(summary.test_accuracy.mean, 0.5);
        assert_eq!(summary.test_accuracy.std_dev, 0.25);
        assert_eq!(summary.train_rank.mean, 1.5);
        assert!(EpochSummary::across_folds(3, &folds).is_none());
        assert!(EpochSummary::across_folds(0, &folds).is_none());
    }

    #[test]
    fn test_store_relocates_each_fold_and_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        let mut store =
            ResultStore::new(dir.path(), 7).with_config(serde_json::json!({"epochs": 2}));
        let folds = [series(0, 2, 0.5), series(1, 2, 1.0)];
        for s in &folds {
            store.record_fold(s).unwrap();
        }
        store.finalize(&folds).unwrap();

        for fold in 0..2 {
            let fold_dir = dir.path().join(fold.to_string());
            let json = fs::read_to_string(fold_dir.join(METRICS_JSON)).unwrap();
            let restored: MetricSeries = serde_json::from_str(&json).unwrap();
            assert_eq!(restored, folds[fold]);
            let csv = fs::read_to_string(fold_dir.join(METRICS_CSV)).unwrap();
            assert_eq!(csv.lines().count(), 3);
        }
        assert_eq!(fs::read_dir(store.work_dir()).unwrap().count(), 0);

        let report_json = fs::read_to_string(dir.path().join("cv-results-7.json")).unwrap();
        let report: CrossValidationReport = serde_json::from_str(&report_json).unwrap();
        assert_eq!(report.task, 7);
        assert_eq!(report.folds, 2);
        assert_eq!(report.epochs.len(), 2);
        assert_eq!(report.epochs[1].test_accuracy.mean, 0.75);
        assert_eq!(report.config, Some(serde_json::json!({"epochs": 2})));
    }

    #[test]
    fn test_store_fails_when_fold_dir_is_taken() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ResultStore::new(dir.path(), 1);
        store.record_fold(&series(0, 1, 0.5)).unwrap();
        let mut again = ResultStore::new(dir.path(), 1);
        let err = again.record_fold(&series(0, 1, 0.5)).unwrap_err();
        assert!(matches!(
            err,
            ResultError::Relocation {
                fold: 0,
                source: RelocationError::TargetExists { .. }
            }
        ));
    }
}

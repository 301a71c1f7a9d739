//! The fold/epoch loop.
//!
//! For each fold: build a fresh scorer from the same seed, then repeat for a fixed
//! number of epochs:
//!
//! 1. train over the fold's training samples in stored order, `batch_size` at a time
//! 2. evaluate the training samples
//! 3. evaluate the test samples
//!
//! and hand the finished [`MetricSeries`] to the [`ResultSink`]. After the last fold
//! the sink is finalized with every series. The loop never branches on evaluation
//! results, and nothing learned in one fold is visible to another.

use actrank_data::{dataset::Dataset, sample::Sample, transform::SampleTransform};
use actrank_model::{Scorer as _, ScorerBuilder, ScorerError, TrainingExample};

use crate::{
    evaluation::{self, EvaluationError, EvaluationSummary, SelectionPolicy},
    fold::{Fold, FoldError, FoldPartition},
    metrics::{EpochMetrics, MetricSeries},
    results::ResultError,
};

/// Immutable settings of one cross-validation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossValidationConfig {
    pub folds: usize,
    pub epochs: usize,
    pub batch_size: usize,
    pub seed: u64,
    pub selection: SelectionPolicy,
}

/// Receives completed fold results.
pub trait ResultSink {
    /// Persists one completed fold before the next fold starts.
    fn record_fold(&mut self, series: &MetricSeries) -> Result<(), ResultError>;

    /// Called once after every fold has been recorded.
    fn finalize(&mut self, folds: &[MetricSeries]) -> Result<(), ResultError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum Split {
    #[display("train")]
    Train,
    #[display("test")]
    Test,
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum CrossValidationError {
    #[display("epoch count must be at least 1")]
    NoEpochs,
    #[display("batch size must be at least 1")]
    ZeroBatchSize,
    #[display("invalid fold configuration")]
    Fold { source: FoldError },
    #[display("scorer expects {scorer} input features but the dataset provides {dataset}")]
    InputWidth { scorer: usize, dataset: usize },
    #[display("training failed in fold {fold}, epoch {epoch}")]
    Train {
        fold: usize,
        epoch: usize,
        source: ScorerError,
    },
    #[display("evaluation of the {split} set failed in fold {fold}, epoch {epoch}")]
    Evaluate {
        fold: usize,
        epoch: usize,
        split: Split,
        source: EvaluationError,
    },
    #[display("failed to record results")]
    Results { source: ResultError },
}

/// Runs k-fold cross-validation of scorers produced by `B` over one dataset.
#[derive(Debug)]
pub struct CrossValidation<'a, B> {
    builder: B,
    config: CrossValidationConfig,
    dataset: &'a Dataset,
    transform: &'a SampleTransform,
    partition: FoldPartition,
}

impl<'a, B> CrossValidation<'a, B>
where
    B: ScorerBuilder,
{
    /// Validates the configuration against the dataset before any fold runs.
    pub fn new(
        builder: B,
        config: CrossValidationConfig,
        dataset: &'a Dataset,
        transform: &'a SampleTransform,
    ) -> Result<Self, CrossValidationError> {
        if config.epochs == 0 {
            return Err(CrossValidationError::NoEpochs);
        }
        if config.batch_size == 0 {
            return Err(CrossValidationError::ZeroBatchSize);
        }
        let partition = FoldPartition::new(dataset.len(), config.folds)
            .map_err(|source| CrossValidationError::Fold { source })?;
        Ok(Self {
            builder,
            config,
            dataset,
            transform,
            partition,
        })
    }

    #[must_use]
    pub fn config(&self) -> &CrossValidationConfig {
        &self.config
    }

    #[must_use]
    pub fn partition(&self) -> &FoldPartition {
        &self.partition
    }

    /// Trains a fresh scorer on `fold` and returns its per-epoch metrics.
    pub fn run_fold(&self, fold: &Fold) -> Result<MetricSeries, CrossValidationError> {
        let samples = self.dataset.samples();
        let train = fold.train_indices().map(|i| &samples[i]).collect::<Vec<_>>();
        let test = &samples[fold.test_indices()];

        let mut scorer = self.builder.build(self.config.seed);
        let dataset_width = self.dataset.metadata().input_width();
        if scorer.input_width() != dataset_width {
            return Err(CrossValidationError::InputWidth {
                scorer: scorer.input_width(),
                dataset: dataset_width,
            });
        }

        log::info!(
            "Fold {}/{}: {} training samples, {} test samples",
            fold.index() + 1,
            self.partition.len(),
            train.len(),
            test.len()
        );

        let mut series = MetricSeries::new(fold.index());
        for epoch in 1..=self.config.epochs {
            let mut steps = 0;
            for chunk in train.chunks(self.config.batch_size) {
                let batch = self.examples(chunk);
                scorer
                    .train_step(&batch)
                    .map_err(|source| CrossValidationError::Train {
                        fold: fold.index(),
                        epoch,
                        source,
                    })?;
                steps += 1;
            }
            log::debug!(
                "Fold {} epoch {epoch}: {steps} training steps",
                fold.index() + 1
            );

            let position = (fold.index(), epoch);
            let train_summary =
                self.evaluate_split(&scorer, train.iter().copied(), position, Split::Train)?;
            let test_summary = self.evaluate_split(&scorer, test, position, Split::Test)?;

            let metrics = EpochMetrics::new(epoch, &train_summary, &test_summary);
            log::info!(
                "Fold {} epoch {epoch}: train score {:.4}, accuracy {:.4}, rank {:.3} | test score {:.4}, accuracy {:.4}, rank {:.3}",
                fold.index() + 1,
                metrics.train_score,
                metrics.train_accuracy,
                metrics.train_rank,
                metrics.test_score,
                metrics.test_accuracy,
                metrics.test_rank,
            );
            series.push(metrics);
        }
        Ok(series)
    }

    /// Runs every fold in order, recording each into `sink`, then finalizes it.
    pub fn run<S>(&self, sink: &mut S) -> Result<Vec<MetricSeries>, CrossValidationError>
    where
        S: ResultSink + ?Sized,
    {
        let mut all = Vec::with_capacity(self.partition.len());
        for fold in self.partition.iter() {
            let series = self.run_fold(&fold)?;
            sink.record_fold(&series)
                .map_err(|source| CrossValidationError::Results { source })?;
            all.push(series);
        }
        sink.finalize(&all)
            .map_err(|source| CrossValidationError::Results { source })?;
        log::info!("Cross-validation completed ({} folds)", all.len());
        Ok(all)
    }

    fn evaluate_split<'s, I>(
        &self,
        scorer: &B::Scorer,
        samples: I,
        (fold, epoch): (usize, usize),
        split: Split,
    ) -> Result<EvaluationSummary, CrossValidationError>
    where
        I: IntoIterator<Item = &'s Sample>,
    {
        evaluation::evaluate(scorer, samples, self.transform, self.config.selection).map_err(
            |source| CrossValidationError::Evaluate {
                fold,
                epoch,
                split,
                source,
            },
        )
    }

    fn examples(&self, samples: &[&Sample]) -> Vec<TrainingExample> {
        samples.iter().map(|s| self.transform.example(s)).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use actrank_data::{metadata::DatasetMetadata, transform::TargetWeights};
    use actrank_model::{FeatureMatrix, Scorer, linear::LinearScorerBuilder};

    use super::*;

    fn dataset(n: usize) -> Dataset {
        let metadata = DatasetMetadata {
            state_width: 1,
            action_width: 2,
            max_actions: 3,
        };
        let samples = (0..n)
            .map(|i| {
                #[expect(clippy::cast_precision_loss)]
                let x = i as f32 / 10.0;
                let legal = 1 + i % 3;
                Sample {
                    state: vec![x],
                    actions: (0..legal)
                        .map(|a| {
                            if a == i % legal {
                                vec![1.0, x]
                            } else {
                                vec![0.0, -x]
                            }
                        })
                        .collect(),
                    taken: i % legal,
                    metrics: None,
                }
            })
            .collect();
        Dataset::from_samples(metadata, samples).unwrap()
    }

    fn config(folds: usize, epochs: usize) -> CrossValidationConfig {
        CrossValidationConfig {
            folds,
            epochs,
            batch_size: 4,
            seed: 123,
            selection: SelectionPolicy::Distribution,
        }
    }

    #[derive(Debug, Default)]
    struct MemorySink {
        recorded: Vec<usize>,
        finalized: Option<usize>,
    }

    impl ResultSink for MemorySink {
        fn record_fold(&mut self, series: &MetricSeries) -> Result<(), ResultError> {
            assert!(self.finalized.is_none());
            self.recorded.push(series.fold);
            Ok(())
        }

        fn finalize(&mut self, folds: &[MetricSeries]) -> Result<(), ResultError> {
            self.finalized = Some(folds.len());
            Ok(())
        }
    }

    #[test]
    fn test_series_has_one_entry_per_epoch() {
        let data = dataset(20);
        let transform = SampleTransform::new(TargetWeights::default(), None);
        let cv = CrossValidation::new(
            LinearScorerBuilder::new(3, 0.1),
            config(4, 3),
            &data,
            &transform,
        )
        .unwrap();
        let series = cv.run_fold(&cv.partition().fold(1).unwrap()).unwrap();
        assert_eq!(series.fold, 1);
        assert_eq!(series.len(), 3);
        for (i, m) in series.epochs.iter().enumerate() {
            assert_eq!(m.epoch, i + 1);
            for accuracy in [m.train_accuracy, m.test_accuracy] {
                assert!((0.0..=1.0).contains(&accuracy));
            }
            for rank in [m.train_rank, m.test_rank] {
                assert!((1.0..=3.0).contains(&rank));
            }
            assert!(m.train_score.is_finite() && m.test_score.is_finite());
        }
    }

    #[test]
    fn test_fold_runs_are_deterministic() {
        let data = dataset(15);
        let transform = SampleTransform::new(TargetWeights::default(), None);
        let cv = CrossValidation::new(
            LinearScorerBuilder::new(3, 0.05),
            config(3, 2),
            &data,
            &transform,
        )
        .unwrap();
        let fold = cv.partition().fold(2).unwrap();
        assert_eq!(cv.run_fold(&fold).unwrap(), cv.run_fold(&fold).unwrap());
    }

    #[test]
    fn test_run_records_every_fold_then_finalizes() {
        let data = dataset(10);
        let transform = SampleTransform::new(TargetWeights::default(), None);
        let cv = CrossValidation::new(
            LinearScorerBuilder::new(3, 0.1),
            config(2, 1),
            &data,
            &transform,
        )
        .unwrap();
        let mut sink = MemorySink::default();
        let all = cv.run(&mut sink).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(sink.recorded, vec![0, 1]);
        assert_eq!(sink.finalized, Some(2));
    }

    #[test]
    fn test_invalid_configuration_is_rejected_up_front() {
        let data = dataset(5);
        let transform = SampleTransform::new(TargetWeights::default(), None);
        let builder = || LinearScorerBuilder::new(3, 0.1);
        assert!(matches!(
            CrossValidation::new(builder(), config(1, 1), &data, &transform),
            Err(CrossValidationError::Fold {
                source: FoldError::TooFewFolds { folds: 1 }
            })
        ));
        assert!(matches!(
            CrossValidation::new(builder(), config(6, 1), &data, &transform),
            Err(CrossValidationError::Fold { .. })
        ));
        assert!(matches!(
            CrossValidation::new(builder(), config(2, 0), &data, &transform),
            Err(CrossValidationError::NoEpochs)
        ));
    }

    #[test]
    fn test_scorer_width_must_match_dataset() {
        let data = dataset(6);
        let transform = SampleTransform::new(TargetWeights::default(), None);
        let cv = CrossValidation::new(
            LinearScorerBuilder::new(5, 0.1),
            config(2, 1),
            &data,
            &transform,
        )
        .unwrap();
        assert!(matches!(
            cv.run(&mut MemorySink::default()),
            Err(CrossValidationError::InputWidth {
                scorer: 5,
                dataset: 3
            })
        ));
    }

    /// Scores by the second action feature and logs the state feature of every
    /// training example it sees, which identifies the sample in `dataset`.
    #[derive(Debug)]
    struct Recorder {
        seen: Rc<RefCell<Vec<f32>>>,
        batches: Rc<RefCell<Vec<usize>>>,
    }

    impl Scorer for Recorder {
        fn input_width(&self) -> usize {
            3
        }

        fn train_step(&mut self, batch: &[TrainingExample]) -> Result<(), ScorerError> {
            self.batches.borrow_mut().push(batch.len());
            self.seen
                .borrow_mut()
                .extend(batch.iter().map(|example| example.features.row(0)[0]));
            Ok(())
        }

        fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f32>, ScorerError> {
            Ok(features.iter_rows().map(|row| row[1]).collect())
        }
    }

    #[derive(Debug, Default)]
    struct RecorderBuilder {
        seen: Rc<RefCell<Vec<f32>>>,
        batches: Rc<RefCell<Vec<usize>>>,
    }

    impl ScorerBuilder for RecorderBuilder {
        type Scorer = Recorder;

        fn build(&self, _seed: u64) -> Recorder {
            Recorder {
                seen: Rc::clone(&self.seen),
                batches: Rc::clone(&self.batches),
            }
        }
    }

    #[expect(clippy::cast_precision_loss)]
    fn sample_id(index: usize) -> f32 {
        index as f32 / 10.0
    }

    #[test]
    fn test_training_sees_only_train_fold_in_order() {
        let data = dataset(14);
        let transform = SampleTransform::new(TargetWeights::default(), None);
        let builder = RecorderBuilder::default();
        let seen = Rc::clone(&builder.seen);
        let batches = Rc::clone(&builder.batches);
        let cv = CrossValidation::new(builder, config(3, 2), &data, &transform).unwrap();

        for fold in cv.partition().iter() {
            cv.run_fold(&fold).unwrap();
            let seen = seen.take();
            let batches = batches.take();

            let train = fold.train_indices().map(sample_id).collect::<Vec<_>>();
            let expected = [train.clone(), train.clone()].concat();
            assert_eq!(seen, expected, "fold {}", fold.index());

            let test = fold.test_indices().map(sample_id).collect::<Vec<_>>();
            assert!(seen.iter().all(|id| !test.contains(id)));

            let steps_per_epoch = train.len().div_ceil(4);
            assert_eq!(batches.len(), 2 * steps_per_epoch);
            assert!(batches.iter().all(|&len| (1..=4).contains(&len)));
        }
    }

    #[test]
    fn test_perfect_scorer_ranks_first() {
        let data = dataset(12);
        let transform = SampleTransform::new(TargetWeights::default(), None);
        let mut cfg = config(3, 2);
        cfg.selection = SelectionPolicy::ArgMax;
        let builder = RecorderBuilder::default();
        let cv = CrossValidation::new(builder, cfg, &data, &transform).unwrap();
        let all = cv.run(&mut MemorySink::default()).unwrap();
        for series in &all {
            for m in &series.epochs {
                assert_eq!(m.train_accuracy, 1.0);
                assert_eq!(m.test_accuracy, 1.0);
                assert_eq!(m.train_rank, 1.0);
                assert_eq!(m.test_rank, 1.0);
                assert!(m.test_score < 1e-5);
            }
        }
    }
}

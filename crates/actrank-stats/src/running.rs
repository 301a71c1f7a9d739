//! Single-pass statistics for wide numeric rows.
//!
//! Feature normalization has to look at every state-action row of the dataset once.
//! Keeping all values in memory per column would double the dataset footprint, so
//! [`ColumnStats`] uses Welford's online algorithm instead. Accumulation is done in
//! `f64` and reported as `f32`.

/// Streaming mean/variance for a single value series (Welford).
#[derive(Debug, Clone, Copy, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f32) {
        self.count += 1;
        let value = f64::from(value);
        let delta = value - self.mean;
        #[expect(clippy::cast_precision_loss)]
        let n = self.count as f64;
        self.mean += delta / n;
        self.m2 += delta * (value - self.mean);
    }

    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }

    #[expect(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn mean(&self) -> f32 {
        self.mean as f32
    }

    /// Population standard deviation; `0.0` until at least one value was pushed.
    #[expect(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    #[must_use]
    pub fn std_dev(&self) -> f32 {
        if self.count == 0 {
            return 0.0;
        }
        (self.m2 / self.count as f64).sqrt() as f32
    }
}

/// Per-column [`RunningStats`] over rows of a fixed width.
#[derive(Debug, Clone)]
pub struct ColumnStats {
    columns: Vec<RunningStats>,
}

impl ColumnStats {
    #[must_use]
    pub fn new(width: usize) -> Self {
        Self {
            columns: vec![RunningStats::default(); width],
        }
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Number of rows pushed so far.
    #[must_use]
    pub fn rows(&self) -> u64 {
        self.columns.first().map_or(0, RunningStats::count)
    }

    /// Adds one row.
    ///
    /// # Panics
    ///
    /// Panics if `row.len()` differs from the accumulator width.
    pub fn push_row(&mut self, row: &[f32]) {
        assert_eq!(row.len(), self.columns.len(), "row width mismatch");
        for (column, value) in self.columns.iter_mut().zip(row) {
            column.push(*value);
        }
    }

    #[must_use]
    pub fn means(&self) -> Vec<f32> {
        self.columns.iter().map(RunningStats::mean).collect()
    }

    #[must_use]
    pub fn std_devs(&self) -> Vec<f32> {
        self.columns.iter().map(RunningStats::std_dev).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_matches_two_pass() {
        let values = [1.5, -2.0, 3.25, 8.0, 0.0, 4.5];
        let mut running = RunningStats::default();
        for v in values {
            running.push(v);
        }
        let mean = values.iter().sum::<f32>() / 6.0;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / 6.0;
        assert_eq!(running.count(), 6);
        assert!((running.mean() - mean).abs() < 1e-5);
        assert!((running.std_dev() - var.sqrt()).abs() < 1e-5);
    }

    #[test]
    fn test_empty_std_dev_is_zero() {
        assert_eq!(RunningStats::default().std_dev(), 0.0);
        assert_eq!(ColumnStats::new(3).rows(), 0);
    }

    #[test]
    #[should_panic(expected = "row width mismatch")]
    fn test_push_row_rejects_wrong_width() {
        let mut columns = ColumnStats::new(2);
        columns.push_row(&[1.0]);
    }
}

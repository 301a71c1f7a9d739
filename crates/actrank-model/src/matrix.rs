use std::slice::ChunksExact;

/// Row-major feature matrix: one row per legal action of a decision.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    cols: usize,
    data: Vec<f32>,
}

impl FeatureMatrix {
    /// Creates an empty matrix whose rows will have `cols` values.
    #[must_use]
    pub fn with_capacity(rows: usize, cols: usize) -> Self {
        Self {
            cols,
            data: Vec::with_capacity(rows * cols),
        }
    }

    /// Builds a matrix from rows.
    ///
    /// # Panics
    ///
    /// Panics if rows have different widths.
    #[must_use]
    pub fn from_rows<R>(cols: usize, rows: impl IntoIterator<Item = R>) -> Self
    where
        R: AsRef<[f32]>,
    {
        let mut matrix = Self::with_capacity(0, cols);
        for row in rows {
            matrix.push_row(row.as_ref());
        }
        matrix
    }

    /// Appends a row.
    ///
    /// # Panics
    ///
    /// Panics if `row.len() != self.cols()`.
    pub fn push_row(&mut self, row: &[f32]) {
        assert_eq!(row.len(), self.cols, "feature row width mismatch");
        self.data.extend_from_slice(row);
    }

    /// Appends a row built from two consecutive parts (state features, action features).
    ///
    /// # Panics
    ///
    /// Panics if the combined width differs from `self.cols()`.
    pub fn push_concat(&mut self, head: &[f32], tail: &[f32]) {
        assert_eq!(
            head.len() + tail.len(),
            self.cols,
            "feature row width mismatch"
        );
        self.data.extend_from_slice(head);
        self.data.extend_from_slice(tail);
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        if self.cols == 0 {
            0
        } else {
            self.data.len() / self.cols
        }
    }

    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[must_use]
    pub fn row(&self, index: usize) -> &[f32] {
        &self.data[index * self.cols..(index + 1) * self.cols]
    }

    pub fn iter_rows(&self) -> ChunksExact<'_, f32> {
        self.data.chunks_exact(self.cols.max(1))
    }

    /// Applies `f(column, value)` to every element in place.
    pub fn map_columns_in_place<F>(&mut self, mut f: F)
    where
        F: FnMut(usize, f32) -> f32,
    {
        let cols = self.cols.max(1);
        for (i, value) in self.data.iter_mut().enumerate() {
            *value = f(i % cols, *value);
        }
    }
}

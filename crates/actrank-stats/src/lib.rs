//! Statistical utilities shared by the actrank crates.
//!
//! This crate provides the small set of statistics the cross-validation harness needs:
//!
//! - **Descriptive statistics**: min, max, mean and standard deviation of a dataset
//! - **Running statistics**: streaming per-column mean/variance for wide feature rows
//!
//! # Modules
//!
//! - [`descriptive`]: Summary of a finished dataset (used for cross-fold summaries)
//! - [`running`]: Single-pass accumulators (used for feature normalization)
//!
//! # Examples
//!
//! ## Computing descriptive statistics
//!
//! ```
//! use actrank_stats::descriptive::DescriptiveStats;
//!
//! let values = [1.0, 2.0, 3.0, 4.0, 5.0];
//! let stats = DescriptiveStats::new(values).unwrap();
//! assert_eq!(stats.mean, 3.0);
//! ```
//!
//! ## Accumulating column statistics
//!
//! ```
//! use actrank_stats::running::ColumnStats;
//!
//! let mut columns = ColumnStats::new(2);
//! columns.push_row(&[1.0, 10.0]);
//! columns.push_row(&[3.0, 10.0]);
//! assert_eq!(columns.means(), vec![2.0, 10.0]);
//! assert_eq!(columns.std_devs(), vec![1.0, 0.0]);
//! ```

pub mod descriptive;
pub mod running;

use std::{
    fs, io,
    num::ParseIntError,
    path::{Path, PathBuf},
};

use crate::mask::FeatureMask;

pub const METADATA_SEPARATOR: char = ':';

const FIELDS: [&str; 3] = ["state_features", "action_features", "max_actions"];

/// Shape of the samples in a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetMetadata {
    /// Width of the state part of every feature row.
    pub state_width: usize,
    /// Width of the per-action part of every feature row.
    pub action_width: usize,
    /// Largest legal-action set any sample may have.
    pub max_actions: usize,
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum MetadataError {
    #[display("failed to read metadata file {}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[display("metadata is missing the `{field}` line")]
    MissingLine { field: &'static str },
    #[display("metadata line for `{field}` has no `:` separator: {line:?}")]
    MissingSeparator { field: &'static str, line: String },
    #[display("metadata value for `{field}` is not an integer: {value:?}")]
    InvalidValue {
        field: &'static str,
        value: String,
        source: ParseIntError,
    },
    #[display("metadata value for `{field}` must be positive")]
    Zero { field: &'static str },
}

impl DatasetMetadata {
    /// Reads the metadata file; the three values are taken positionally, one per line.
    pub fn read<P>(path: P) -> Result<Self, MetadataError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| MetadataError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, MetadataError> {
        let mut lines = text.lines().filter(|line| !line.trim().is_empty());
        let mut values = [0; 3];
        for (field, value) in FIELDS.into_iter().zip(&mut values) {
            let line = lines.next().ok_or(MetadataError::MissingLine { field })?;
            let (_key, raw) =
                line.split_once(METADATA_SEPARATOR)
                    .ok_or_else(|| MetadataError::MissingSeparator {
                        field,
                        line: line.to_owned(),
                    })?;
            let raw = raw.trim();
            *value = raw
                .parse::<usize>()
                .map_err(|source| MetadataError::InvalidValue {
                    field,
                    value: raw.to_owned(),
                    source,
                })?;
            if *value == 0 {
                return Err(MetadataError::Zero { field });
            }
        }
        let [state_width, action_width, max_actions] = values;
        Ok(Self {
            state_width,
            action_width,
            max_actions,
        })
    }

    #[must_use]
    pub fn to_text(&self) -> String {
        let values = [self.state_width, self.action_width, self.max_actions];
        FIELDS
            .iter()
            .zip(values)
            .map(|(field, value)| format!("{field}{METADATA_SEPARATOR}{value}\n"))
            .collect()
    }

    pub fn write<P>(&self, path: P) -> io::Result<()>
    where
        P: AsRef<Path>,
    {
        fs::write(path, self.to_text())
    }

    /// Number of features the scorer receives per legal action.
    #[must_use]
    pub fn input_width(&self) -> usize {
        self.state_width + self.action_width
    }

    /// Shape of the samples after `mask` dropped its features.
    #[must_use]
    pub fn masked(&self, mask: &FeatureMask) -> Self {
        Self {
            state_width: self.state_width - mask.dropped_count(),
            action_width: self.action_width - mask.dropped_count(),
            max_actions: self.max_actions,
        }
    }
}

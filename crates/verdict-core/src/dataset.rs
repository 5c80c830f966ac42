//! Read-only, ordered dataset of comparison items.
//!
//! The dataset is a CSV file with a header row. Row order defines traversal
//! order and positional indices for the whole session.

use std::collections::HashMap;
use std::io;
use std::path::Path;

use tracing::debug;

use crate::error::ErrorCode;
use crate::model::Item;

/// Errors raised while loading the dataset. All of them are fatal for a
/// session since there is no safe default item list.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("failed to open dataset {origin}: {source}")]
    Open {
        origin: String,
        #[source]
        source: csv::Error,
    },

    #[error("dataset {origin} has no `id` column")]
    MissingIdColumn { origin: String },

    #[error("dataset {origin} row {row}: {source}")]
    Row {
        origin: String,
        row: usize,
        #[source]
        source: csv::Error,
    },

    #[error("dataset {origin} row {row}: empty id")]
    EmptyId { origin: String, row: usize },

    #[error("dataset {origin} row {row}: duplicate id '{id}'")]
    DuplicateId {
        origin: String,
        row: usize,
        id: String,
    },
}

impl DatasetError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::DuplicateId { .. } | Self::EmptyId { .. } => ErrorCode::DuplicateItemId,
            Self::Open { .. } | Self::MissingIdColumn { .. } | Self::Row { .. } => {
                ErrorCode::DatasetUnreadable
            }
        }
    }
}

/// Ordered, immutable item sequence with an id → position index.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    items: Vec<Item>,
    positions: HashMap<String, usize>,
}

impl Dataset {
    /// Load a dataset file, keeping at most `limit` rows when given.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError`] if the file cannot be read, lacks an `id`
    /// column, or contains empty or duplicate ids.
    pub fn load(path: &Path, limit: Option<usize>) -> Result<Self, DatasetError> {
        let origin = path.display().to_string();
        let reader = csv::Reader::from_path(path).map_err(|source| DatasetError::Open {
            origin: origin.clone(),
            source,
        })?;
        let dataset = Self::from_csv(reader, limit, &origin)?;
        debug!(path = %origin, items = dataset.len(), "dataset loaded");
        Ok(dataset)
    }

    /// Load a dataset from any CSV byte source.
    ///
    /// # Errors
    ///
    /// Same as [`Dataset::load`].
    pub fn from_reader<R: io::Read>(
        reader: R,
        limit: Option<usize>,
        origin: &str,
    ) -> Result<Self, DatasetError> {
        Self::from_csv(csv::Reader::from_reader(reader), limit, origin)
    }

    /// Build a dataset from already-parsed items.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError`] for empty or duplicate ids.
    pub fn from_items(items: Vec<Item>) -> Result<Self, DatasetError> {
        let mut dataset = Self::default();
        for item in items {
            dataset.push(item, "<memory>")?;
        }
        Ok(dataset)
    }

    fn from_csv<R: io::Read>(
        mut reader: csv::Reader<R>,
        limit: Option<usize>,
        origin: &str,
    ) -> Result<Self, DatasetError> {
        let headers = reader.headers().map_err(|source| DatasetError::Open {
            origin: origin.to_string(),
            source,
        })?;
        if !headers.iter().any(|h| h.trim() == "id") {
            return Err(DatasetError::MissingIdColumn {
                origin: origin.to_string(),
            });
        }

        let mut dataset = Self::default();
        for (idx, row) in reader.deserialize::<Item>().enumerate() {
            if limit.is_some_and(|lim| idx >= lim) {
                break;
            }
            let item = row.map_err(|source| DatasetError::Row {
                origin: origin.to_string(),
                row: idx + 1,
                source,
            })?;
            dataset.push(item, origin)?;
        }
        Ok(dataset)
    }

    fn push(&mut self, mut item: Item, origin: &str) -> Result<(), DatasetError> {
        let row = self.items.len() + 1;
        item.id = item.id.trim().to_string();
        if item.id.is_empty() {
            return Err(DatasetError::EmptyId {
                origin: origin.to_string(),
                row,
            });
        }
        if self.positions.contains_key(&item.id) {
            return Err(DatasetError::DuplicateId {
                origin: origin.to_string(),
                row,
                id: item.id,
            });
        }
        self.positions.insert(item.id.clone(), self.items.len());
        self.items.push(item);
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Item> {
        self.items.get(index)
    }

    #[must_use]
    pub fn position(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    #[must_use]
    pub fn find(&self, id: &str) -> Option<&Item> {
        self.position(id).and_then(|idx| self.items.get(idx))
    }

    #[must_use]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Clamp a cursor into `0..len`. An empty dataset clamps to 0.
    #[must_use]
    pub fn clamp(&self, index: usize) -> usize {
        index.min(self.items.len().saturating_sub(1))
    }
}

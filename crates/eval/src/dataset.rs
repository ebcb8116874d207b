//! Dataset loading and sampling.
//!
//! The dataset file is a JSON object keyed by split name, each split an
//! array of records. Records are parsed leniently; only an unreadable file,
//! invalid JSON or a missing split fail the load.

use crate::StudyError;
use finqa_core::RawRecord;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use serde_json::Value;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Vec<RawRecord>,
}

impl Dataset {
    /// Load `split` from the dataset file at `path`.
    pub fn load(path: &Path, split: &str) -> Result<Self, StudyError> {
        let content = std::fs::read_to_string(path).map_err(|source| StudyError::DatasetRead {
            path: path.display().to_string(),
            source,
        })?;
        let value: Value =
            serde_json::from_str(&content).map_err(|source| StudyError::DatasetParse {
                path: path.display().to_string(),
                source,
            })?;

        let dataset = Self::from_value(value, split)?;
        info!(path = %path.display(), split, records = dataset.len(), "Loaded dataset");
        Ok(dataset)
    }

    /// Take `split` out of an already-parsed dataset document.
    pub fn from_value(mut value: Value, split: &str) -> Result<Self, StudyError> {
        let Some(Value::Array(items)) = value.get_mut(split).map(Value::take) else {
            return Err(StudyError::MissingSplit(split.to_string()));
        };
        Ok(Self::from_records(
            items.into_iter().map(RawRecord::from_value).collect(),
        ))
    }

    pub fn from_records(records: Vec<RawRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[RawRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// A deterministic sample of up to `size` distinct records.
    ///
    /// The same seed over the same dataset always selects the same records
    /// in the same order, so every condition sees an identical sample.
    pub fn sample(&self, size: usize, seed: u64) -> Vec<&RawRecord> {
        let mut rng = StdRng::seed_from_u64(seed);
        self.records
            .choose_multiple(&mut rng, size.min(self.records.len()))
            .collect()
    }

    /// Look a record up by id.
    pub fn find(&self, id: &str) -> Result<&RawRecord, StudyError> {
        self.records
            .iter()
            .find(|r| r.id == id)
            .ok_or_else(|| StudyError::RecordNotFound(id.to_string()))
    }
}

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FetchError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompetitionSlug(String);

impl CompetitionSlug {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CompetitionSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CompetitionSlug {
    type Err = FetchError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        let is_valid = !normalized.is_empty()
            && normalized
                .chars()
                .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-')
            && !normalized.starts_with('-')
            && !normalized.ends_with('-');
        if !is_valid {
            return Err(FetchError::InvalidCompetitionSlug(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

/// Dataset reference in Kaggle's `owner/name` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetRef {
    owner: String,
    name: String,
}

impl DatasetRef {
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for DatasetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for DatasetRef {
    type Err = FetchError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let Some((owner, name)) = trimmed.split_once('/') else {
            return Err(FetchError::InvalidDatasetRef(value.to_string()));
        };
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return Err(FetchError::InvalidDatasetRef(value.to_string()));
        }
        let segment_ok = |segment: &str| {
            segment
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'))
        };
        if !segment_ok(owner) || !segment_ok(name) {
            return Err(FetchError::InvalidDatasetRef(value.to_string()));
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetSpecifier {
    Competition(CompetitionSlug),
    Dataset(DatasetRef),
}

impl DatasetSpecifier {
    pub fn dataset_type(&self) -> &'static str {
        match self {
            DatasetSpecifier::Competition(_) => "competition",
            DatasetSpecifier::Dataset(_) => "dataset",
        }
    }

    pub fn id(&self) -> String {
        match self {
            DatasetSpecifier::Competition(slug) => slug.as_str().to_string(),
            DatasetSpecifier::Dataset(dataset) => dataset.to_string(),
        }
    }

    /// Default name for the downloaded archive before extraction.
    pub fn archive_name(&self) -> String {
        match self {
            DatasetSpecifier::Competition(slug) => format!("{slug}.zip"),
            DatasetSpecifier::Dataset(dataset) => format!("{}.zip", dataset.name()),
        }
    }
}

impl fmt::Display for DatasetSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.dataset_type(), self.id())
    }
}

impl FromStr for DatasetSpecifier {
    type Err = FetchError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let (kind, rest) = trimmed
            .split_once(':')
            .ok_or_else(|| FetchError::InvalidSpecifier(value.to_string()))?;
        match kind {
            "competition" => Ok(DatasetSpecifier::Competition(rest.parse()?)),
            "dataset" => Ok(DatasetSpecifier::Dataset(rest.parse()?)),
            _ => Err(FetchError::InvalidSpecifier(value.to_string())),
        }
    }
}

/// Lifecycle of a single fetch invocation. Held in memory only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Downloading,
    Extracting,
    Done,
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Downloading => write!(f, "downloading"),
            JobStatus::Extracting => write!(f, "extracting"),
            JobStatus::Done => write!(f, "done"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

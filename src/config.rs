use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::DatasetSpecifier;
use crate::error::FetchError;

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub keep_archive: Option<bool>,
    #[serde(default)]
    pub datasets: Vec<DatasetEntry>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum DatasetEntry {
    Shorthand(String),
    Detailed(DatasetEntryObject),
}

#[derive(Debug, Deserialize, Serialize)]
pub struct DatasetEntryObject {
    pub spec: String,
    #[serde(default)]
    pub destination: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DatasetRequest {
    pub specifier: DatasetSpecifier,
    pub destination: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub destination: Utf8PathBuf,
    pub keep_archive: bool,
    pub datasets: Vec<DatasetRequest>,
}

pub const DEFAULT_DESTINATION: &str = "data";

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, FetchError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from("kagfetch.json"),
        };

        if path.is_none() && !config_path.exists() {
            return Err(FetchError::MissingConfig);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| FetchError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| FetchError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, FetchError> {
        let schema_version = config.schema_version.unwrap_or(1);
        let destination = Utf8PathBuf::from(
            config
                .destination
                .unwrap_or_else(|| DEFAULT_DESTINATION.to_string()),
        );
        let keep_archive = config.keep_archive.unwrap_or(false);

        let datasets = config
            .datasets
            .into_iter()
            .map(|entry| match entry {
                DatasetEntry::Shorthand(value) => Ok(DatasetRequest {
                    specifier: value.parse()?,
                    destination: None,
                }),
                DatasetEntry::Detailed(obj) => Ok(DatasetRequest {
                    specifier: obj.spec.parse()?,
                    destination: obj.destination.map(Utf8PathBuf::from),
                }),
            })
            .collect::<Result<Vec<_>, FetchError>>()?;

        Ok(ResolvedConfig {
            schema_version,
            destination,
            keep_archive,
            datasets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_config_shorthand() {
        let config = Config {
            schema_version: None,
            destination: None,
            keep_archive: None,
            datasets: vec![DatasetEntry::Shorthand(
                "competition:playground-series-s5e8".to_string(),
            )],
        };

        let resolved = ConfigLoader::resolve_config(config).unwrap();
        assert_eq!(resolved.schema_version, 1);
        assert_eq!(resolved.destination, Utf8PathBuf::from("data"));
        assert!(!resolved.keep_archive);
        assert_eq!(resolved.datasets.len(), 1);
        assert!(resolved.datasets[0].destination.is_none());
    }

    #[test]
    fn parse_config_detailed_entry() {
        let config = Config {
            schema_version: Some(1),
            destination: Some("downloads".to_string()),
            keep_archive: Some(true),
            datasets: vec![DatasetEntry::Detailed(DatasetEntryObject {
                spec: "dataset:zynicide/wine-reviews".to_string(),
                destination: Some("downloads/wine".to_string()),
            })],
        };

        let resolved = ConfigLoader::resolve_config(config).unwrap();
        assert_eq!(resolved.destination, Utf8PathBuf::from("downloads"));
        assert!(resolved.keep_archive);
        assert_eq!(
            resolved.datasets[0].destination,
            Some(Utf8PathBuf::from("downloads/wine"))
        );
    }

    #[test]
    fn invalid_entry_fails_resolution() {
        let config = Config {
            schema_version: None,
            destination: None,
            keep_archive: None,
            datasets: vec![DatasetEntry::Shorthand("not-a-specifier".to_string())],
        };

        assert!(ConfigLoader::resolve_config(config).is_err());
    }
}

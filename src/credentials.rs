use std::fs;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use serde::Deserialize;

use crate::error::FetchError;

/// API key pair for Kaggle Basic auth. The file format and location are the
/// provider's contract: `~/.kaggle/kaggle.json` with `username` and `key`.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub key: String,
}

#[derive(Debug, Deserialize)]
struct CredentialFile {
    #[serde(default)]
    username: String,
    #[serde(default)]
    key: String,
}

impl Credentials {
    /// Environment variables take precedence over the credential file.
    pub fn resolve() -> Result<Self, FetchError> {
        let env_username = non_empty_env("KAGGLE_USERNAME");
        let env_key = non_empty_env("KAGGLE_KEY");
        if let (Some(username), Some(key)) = (env_username, env_key) {
            return Ok(Self { username, key });
        }

        let path = credential_file_path()?;
        if !path.exists() {
            return Err(FetchError::CredentialsMissing(path));
        }
        Self::from_file(&path)
    }

    pub fn from_file(path: &Path) -> Result<Self, FetchError> {
        let content = fs::read_to_string(path)
            .map_err(|_| FetchError::CredentialsMissing(path.to_path_buf()))?;
        let parsed: CredentialFile = serde_json::from_str(&content)
            .map_err(|err| FetchError::CredentialsInvalid(err.to_string()))?;
        let username = parsed.username.trim().to_string();
        let key = parsed.key.trim().to_string();
        if username.is_empty() || key.is_empty() {
            return Err(FetchError::CredentialsInvalid(
                "username and key must both be set".to_string(),
            ));
        }
        Ok(Self { username, key })
    }
}

pub fn credential_file_path() -> Result<PathBuf, FetchError> {
    if let Some(dir) = non_empty_env("KAGGLE_CONFIG_DIR") {
        return Ok(PathBuf::from(dir).join("kaggle.json"));
    }
    let dirs = BaseDirs::new().ok_or_else(|| {
        FetchError::Filesystem("unable to resolve home directory".to_string())
    })?;
    Ok(dirs.home_dir().join(".kaggle").join("kaggle.json"))
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn from_file_parses_key_pair() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kaggle.json");
        fs::write(&path, r#"{"username":"alice","key":"s3cret"}"#).unwrap();

        let creds = Credentials::from_file(&path).unwrap();
        assert_eq!(creds.username, "alice");
        assert_eq!(creds.key, "s3cret");
    }

    #[test]
    fn from_file_rejects_blank_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kaggle.json");
        fs::write(&path, r#"{"username":"alice","key":""}"#).unwrap();

        let err = Credentials::from_file(&path).unwrap_err();
        assert_matches!(err, FetchError::CredentialsInvalid(_));
    }

    #[test]
    fn from_file_rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kaggle.json");
        fs::write(&path, "username=alice").unwrap();

        let err = Credentials::from_file(&path).unwrap_err();
        assert_matches!(err, FetchError::CredentialsInvalid(_));
    }

    #[test]
    fn missing_file_is_a_credentials_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kaggle.json");

        let err = Credentials::from_file(&path).unwrap_err();
        assert_matches!(err, FetchError::CredentialsMissing(_));
    }
}

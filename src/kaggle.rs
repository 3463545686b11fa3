use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{
    CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT,
};

use crate::credentials::Credentials;
use crate::domain::DatasetSpecifier;
use crate::error::FetchError;
use crate::progress::TransferCounter;

/// What the server told us about the archive it sent.
#[derive(Debug, Clone)]
pub struct ArchiveInfo {
    pub is_zip: bool,
    pub content_length: Option<u64>,
    pub file_name: Option<String>,
}

pub trait KaggleClient: Send + Sync {
    fn download_archive(
        &self,
        specifier: &DatasetSpecifier,
        destination: &Path,
        counter: &TransferCounter,
    ) -> Result<ArchiveInfo, FetchError>;
}

#[derive(Clone)]
pub struct KaggleHttpClient {
    client: Client,
    credentials: Credentials,
    base_url: String,
}

impl KaggleHttpClient {
    pub fn new(credentials: Credentials) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kagfetch/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| FetchError::Http(err.to_string()))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(600))
            .build()
            .map_err(|err| FetchError::Http(err.to_string()))?;

        Ok(Self {
            client,
            credentials,
            base_url: "https://www.kaggle.com/api/v1".to_string(),
        })
    }

    fn download_url(&self, specifier: &DatasetSpecifier) -> String {
        match specifier {
            DatasetSpecifier::Competition(slug) => format!(
                "{}/competitions/data/download-all/{}",
                self.base_url,
                slug.as_str()
            ),
            DatasetSpecifier::Dataset(dataset) => format!(
                "{}/datasets/download/{}/{}",
                self.base_url,
                dataset.owner(),
                dataset.name()
            ),
        }
    }

    fn write_response_to_file(
        &self,
        mut response: reqwest::blocking::Response,
        destination: &Path,
        counter: &TransferCounter,
    ) -> Result<ArchiveInfo, FetchError> {
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            let message = response
                .text()
                .unwrap_or_else(|_| "Kaggle rejected the request".to_string());
            return Err(FetchError::Unauthorized {
                status: status.as_u16(),
                message,
            });
        }
        if !status.is_success() {
            let message = response
                .text()
                .unwrap_or_else(|_| "Kaggle request failed".to_string());
            return Err(FetchError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let is_zip = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.contains("zip"))
            .unwrap_or(false);
        let content_length = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok());
        let file_name = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_attachment_filename);
        counter.set_total(content_length);

        let mut file =
            File::create(destination).map_err(|err| FetchError::Filesystem(err.to_string()))?;
        let mut buf = [0u8; 64 * 1024];
        loop {
            let read = response
                .read(&mut buf)
                .map_err(|err| FetchError::Http(err.to_string()))?;
            if read == 0 {
                break;
            }
            file.write_all(&buf[..read])
                .map_err(|err| FetchError::Filesystem(err.to_string()))?;
            counter.add(read as u64);
        }
        file.flush()
            .map_err(|err| FetchError::Filesystem(err.to_string()))?;

        Ok(ArchiveInfo {
            is_zip,
            content_length,
            file_name,
        })
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
    ) -> Result<reqwest::blocking::Response, FetchError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            let response = make_req().send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(FetchError::Http(err.to_string()));
                }
            }
        }
    }
}

impl KaggleClient for KaggleHttpClient {
    fn download_archive(
        &self,
        specifier: &DatasetSpecifier,
        destination: &Path,
        counter: &TransferCounter,
    ) -> Result<ArchiveInfo, FetchError> {
        let url = self.download_url(specifier);
        tracing::debug!(%url, "requesting archive");
        let response = self.send_with_retries(|| {
            self.client
                .get(&url)
                .basic_auth(&self.credentials.username, Some(&self.credentials.key))
        })?;
        self.write_response_to_file(response, destination, counter)
    }
}

fn parse_attachment_filename(header: &str) -> Option<String> {
    let raw = header
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))?;
    let name = raw.trim_matches('"').trim();
    if name.is_empty() || name.contains('/') || name.contains('\\') {
        return None;
    }
    Some(name.to_string())
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_filename_variants() {
        assert_eq!(
            parse_attachment_filename(r#"attachment; filename="train.zip""#),
            Some("train.zip".to_string())
        );
        assert_eq!(
            parse_attachment_filename("attachment; filename=sample.csv.gz"),
            Some("sample.csv.gz".to_string())
        );
        assert_eq!(parse_attachment_filename("inline"), None);
        assert_eq!(
            parse_attachment_filename(r#"attachment; filename="../evil.zip""#),
            None
        );
    }

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(404));
        assert!(!is_retryable_status(200));
    }
}

//! Loads the release-config array from either a local path or an `http(s)://`
//! URL, tolerating unknown keys the way the rest of this workspace parses
//! upstream JSON.

use std::fs;
use std::time::Duration;

use harbor_types::{ConfigLoadError, JsonLoader, ReleaseConfig};

pub struct FileOrHttpJsonLoader {
    http: reqwest::blocking::Client,
}

impl FileOrHttpJsonLoader {
    pub fn new() -> Result<Self, reqwest::Error> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(concat!("harbor/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { http })
    }

    fn fetch(&self, source_ref: &str) -> Result<String, ConfigLoadError> {
        if source_ref.starts_with("http://") || source_ref.starts_with("https://") {
            let response = self.http.get(source_ref).send().map_err(|e| ConfigLoadError::Read {
                source_ref: source_ref.to_string(),
                reason: e.to_string(),
            })?;
            if !response.status().is_success() {
                return Err(ConfigLoadError::Read {
                    source_ref: source_ref.to_string(),
                    reason: format!("unexpected status {}", response.status()),
                });
            }
            response.text().map_err(|e| ConfigLoadError::Read {
                source_ref: source_ref.to_string(),
                reason: e.to_string(),
            })
        } else {
            fs::read_to_string(source_ref).map_err(|e| ConfigLoadError::Read {
                source_ref: source_ref.to_string(),
                reason: e.to_string(),
            })
        }
    }
}

impl JsonLoader for FileOrHttpJsonLoader {
    fn load_list(&self, path_or_url: &str) -> Result<Vec<ReleaseConfig>, ConfigLoadError> {
        let body = self.fetch(path_or_url)?;
        serde_json::from_str(&body).map_err(|e| ConfigLoadError::Parse(e.to_string()))
    }
}

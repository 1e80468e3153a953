//! A blocking GitHub REST client used as the default
//! [`harbor_types::RepositoryProvider`].
//!
//! Deliberately synchronous (`reqwest::blocking`), matching the rest of the
//! workspace's thread-based concurrency model rather than introducing an
//! async runtime for a single outbound HTTP call site.

use std::time::Duration;

use harbor_types::{Asset, Release, ReleaseConfig, Repository, RepositoryError, RepositoryProvider};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::Deserialize;

const API_BASE: &str = "https://api.github.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Builds [`GitHubRepository`] handles and owns the shared HTTP client and
/// default token (used when a config does not specify its own).
pub struct GitHubRepositoryProvider {
    http: Client,
    default_token: Option<String>,
}

impl GitHubRepositoryProvider {
    pub fn new(default_token: Option<String>) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .user_agent(format!("harbor/{}", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            default_token,
        })
    }
}

impl RepositoryProvider for GitHubRepositoryProvider {
    fn get_repository(&self, config: &ReleaseConfig) -> Box<dyn Repository> {
        let token = config.token().or_else(|| self.default_token.clone());
        Box::new(GitHubRepository {
            http: self.http.clone(),
            owner: config.owner.clone(),
            repo: config.repo.clone(),
            token,
        })
    }
}

/// A single `owner/repo` handle against the GitHub REST API.
pub struct GitHubRepository {
    http: Client,
    owner: String,
    repo: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubReleaseResponse {
    tag_name: String,
    #[serde(default)]
    assets: Vec<GitHubAssetResponse>,
}

#[derive(Debug, Deserialize)]
struct GitHubAssetResponse {
    name: String,
    #[serde(rename = "browser_download_url")]
    url: String,
}

#[derive(Debug, Deserialize)]
struct GitHubRepoResponse {
    private: bool,
}

impl GitHubRepository {
    fn authed(&self, builder: reqwest::blocking::RequestBuilder) -> reqwest::blocking::RequestBuilder {
        match &self.token {
            Some(token) => builder.header("Authorization", format!("token {token}")),
            None => builder,
        }
    }
}

impl Repository for GitHubRepository {
    fn get_latest_release(&self) -> Result<Option<Release>, RepositoryError> {
        let url = format!(
            "{API_BASE}/repos/{}/{}/releases/latest",
            self.owner, self.repo
        );

        let request = self.authed(self.http.get(url));
        let response = request
            .send()
            .map_err(|e| RepositoryError::Transient(e.to_string()))?;

        match response.status() {
            StatusCode::OK => {
                let parsed: GitHubReleaseResponse = response
                    .json()
                    .map_err(|e| RepositoryError::Transient(format!("malformed release response: {e}")))?;
                Ok(Some(Release {
                    tag_name: parsed.tag_name,
                    assets: parsed
                        .assets
                        .into_iter()
                        .map(|a| Asset {
                            name: a.name,
                            url: a.url,
                        })
                        .collect(),
                }))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(RepositoryError::Transient(format!(
                "unexpected status {status} fetching latest release"
            ))),
        }
    }

    fn is_private(&self) -> Option<bool> {
        let url = format!("{API_BASE}/repos/{}/{}", self.owner, self.repo);
        let response = self.authed(self.http.get(url)).send().ok()?;
        if response.status() != StatusCode::OK {
            return None;
        }
        response.json::<GitHubRepoResponse>().ok().map(|r| r.private)
    }
}

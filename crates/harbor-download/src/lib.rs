//! Downloads release assets to disk, laid out by distribution and privacy.
//!
//! Grounded on the atomic tmp-file-then-rename write pattern used elsewhere
//! in this workspace for on-disk state: assets are streamed to a `.part`
//! sibling file and only renamed into place once the download completes,
//! so a crash or a cancelled task never leaves a half-written asset at its
//! final path.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use harbor_types::{self as types, ReleaseConfig};
use reqwest::blocking::Client;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Streams a URL to a file under a fixed download root.
pub struct FileDownloader {
    http: Client,
    root: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum FileDownloadError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status {0} downloading asset")]
    Status(reqwest::StatusCode),
    #[error("io error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FileDownloader {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .user_agent(format!("harbor/{}", env!("CARGO_PKG_VERSION")))
            .timeout(DOWNLOAD_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            root: root.into(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Download `url` to `dest_path` (taken relative to nothing in
    /// particular — callers pass an already-resolved absolute path).
    /// Streams to a `.part` sibling and renames atomically on success.
    pub fn download(
        &self,
        url: &str,
        dest_path: &Path,
        bearer_token: Option<&str>,
    ) -> Result<PathBuf, FileDownloadError> {
        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent).map_err(|source| FileDownloadError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let mut request = self.http.get(url);
        if let Some(token) = bearer_token {
            request = request.header("Authorization", format!("token {token}"));
        }

        let mut response = request.send()?;
        if !response.status().is_success() {
            return Err(FileDownloadError::Status(response.status()));
        }

        let tmp_path = dest_path.with_extension("part");
        {
            let mut tmp_file = File::create(&tmp_path).map_err(|source| FileDownloadError::Io {
                path: tmp_path.clone(),
                source,
            })?;
            io::copy(&mut response, &mut tmp_file).map_err(|source| FileDownloadError::Io {
                path: tmp_path.clone(),
                source,
            })?;
        }

        fs::rename(&tmp_path, dest_path).map_err(|source| FileDownloadError::Io {
            path: dest_path.to_path_buf(),
            source,
        })?;

        Ok(dest_path.to_path_buf())
    }
}

/// Drives [`FileDownloader`] across every asset of a release that matches a
/// repository's glob `matcher`, placing each under the destination computed
/// from the config's distribution sub-dirs and privacy flag.
pub struct AssetDownloader {
    files: FileDownloader,
}

impl AssetDownloader {
    pub fn new(files: FileDownloader) -> Self {
        Self { files }
    }
}

impl types::AssetDownloader for AssetDownloader {
    fn download(
        &self,
        config: &ReleaseConfig,
        release: &types::Release,
    ) -> Result<(), types::DownloadError> {
        let pattern = glob::Pattern::new(&config.matcher)
            .unwrap_or_else(|_| glob::Pattern::new("*").expect("literal glob is valid"));
        let token = config.token();

        for asset in &release.assets {
            if !pattern.matches(&asset.name) {
                continue;
            }

            let dest = self.destination_for(config, release, asset);
            self.files
                .download(&asset.url, &dest, token.as_deref())
                .map_err(|source| types::DownloadError::Asset {
                    asset: asset.name.clone(),
                    source: Box::new(source),
                })?;
        }

        Ok(())
    }
}

impl AssetDownloader {
    fn destination_for(
        &self,
        config: &ReleaseConfig,
        release: &types::Release,
        asset: &types::Asset,
    ) -> PathBuf {
        let mut dir = self.files.root().join(&config.owner).join(&config.repo);

        if config.private == types::PrivacyState::Private
            && let Some(private_sub_dir) = &config.private_sub_dir
        {
            dir = dir.join(private_sub_dir);
        }

        for distro in &config.distro_sub_dirs {
            dir = dir.join(distro);
        }

        dir.join(&release.tag_name).join(&asset.name)
    }
}

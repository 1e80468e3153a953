use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::envref::resolve_env_ref_opt;

/// Whether a repository is known to be private, known to be public, or not
/// yet determined. Starts `Unknown` and is back-filled at most once, from
/// the first successful repository metadata fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyState {
    #[default]
    Unknown,
    Public,
    Private,
}

/// One entry of the release-config JSON array: a single upstream repository
/// to mirror.
///
/// Unknown JSON keys are tolerated — the config file this is parsed from is
/// shared with the asset downloader, which may consume additional layout
/// fields this crate does not need to understand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseConfig {
    pub owner: String,
    pub repo: String,

    /// Literal token, or a `$NAME` environment-variable reference. Resolved
    /// lazily via [`ReleaseConfig::token`].
    #[serde(default)]
    pub token: Option<String>,

    /// Glob pattern used to select which release assets to download.
    /// Defaults to `*` (match everything).
    #[serde(default = "default_matcher")]
    pub matcher: String,

    #[serde(default)]
    pub private: PrivacyState,

    /// Distribution sub-directories under the download root this repo's
    /// assets are placed into, e.g. `["bookworm", "noble"]`.
    #[serde(default)]
    pub distro_sub_dirs: Vec<String>,

    /// Sub-directory assets are placed under when `private` resolves to
    /// `Private`. `None` means "no extra nesting for private repos."
    #[serde(default)]
    pub private_sub_dir: Option<String>,
}

fn default_matcher() -> String {
    "*".to_string()
}

impl ReleaseConfig {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            token: None,
            matcher: default_matcher(),
            private: PrivacyState::Unknown,
            distro_sub_dirs: Vec::new(),
            private_sub_dir: None,
        }
    }

    /// `owner/repo`, the key this config is identified and registered by.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// The token to use for API calls and private-asset downloads, with any
    /// `$NAME` environment-variable reference resolved. Returns `None` if
    /// no token is configured, or if a referenced variable is unset.
    pub fn token(&self) -> Option<String> {
        resolve_env_ref_opt(self.token.as_deref())
    }
}

/// A single downloadable artifact attached to a [`Release`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub name: String,
    pub url: String,
}

/// An immutable-by-tag snapshot of an upstream release, as seen through
/// either the polling API or a webhook payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

impl Release {
    pub fn new(tag_name: impl Into<String>, assets: Vec<Asset>) -> Self {
        Self {
            tag_name: tag_name.into(),
            assets,
        }
    }
}

/// The set of asset names attached to a release, used for the
/// superset-change detection in `check_latest_release`.
pub fn asset_name_set(release: &Release) -> HashSet<&str> {
    release.assets.iter().map(|a| a.name.as_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn full_name_joins_owner_and_repo() {
        let config = ReleaseConfig::new("octo-org", "octo-repo");
        assert_eq!(config.full_name(), "octo-org/octo-repo");
    }

    #[test]
    fn default_matcher_matches_everything() {
        let json = r#"{"owner":"o","repo":"r"}"#;
        let config: ReleaseConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.matcher, "*");
        assert_eq!(config.private, PrivacyState::Unknown);
    }

    #[test]
    fn unknown_keys_are_tolerated() {
        let json = r#"{"owner":"o","repo":"r","some_downloader_only_field":true}"#;
        let config: ReleaseConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.owner, "o");
    }

    #[test]
    #[serial]
    fn token_resolves_env_reference() {
        unsafe {
            std::env::set_var("HARBOR_RELEASE_TEST_TOKEN", "tok-123");
        }
        let mut config = ReleaseConfig::new("o", "r");
        config.token = Some("$HARBOR_RELEASE_TEST_TOKEN".to_string());
        assert_eq!(config.token().as_deref(), Some("tok-123"));
        unsafe {
            std::env::remove_var("HARBOR_RELEASE_TEST_TOKEN");
        }
    }

    #[test]
    fn asset_name_set_is_superset_comparable() {
        let before = Release::new(
            "1.0.0",
            vec![Asset {
                name: "a.deb".into(),
                url: "https://example.com/a.deb".into(),
            }],
        );
        let after = Release::new(
            "1.0.0",
            vec![
                Asset {
                    name: "a.deb".into(),
                    url: "https://example.com/a.deb".into(),
                },
                Asset {
                    name: "a.rpm".into(),
                    url: "https://example.com/a.rpm".into(),
                },
            ],
        );

        let before_names = asset_name_set(&before);
        let after_names = asset_name_set(&after);
        assert!(after_names.is_superset(&before_names));
        assert!(!before_names.is_superset(&after_names));
    }
}

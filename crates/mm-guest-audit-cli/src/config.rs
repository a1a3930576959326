//! Settings resolution: flags, then environment, then the user config file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::output::OutputFormat;

/// Default HTTP timeout per request.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const ENV_URL: &str = "MM_URL";
pub const ENV_TOKEN: &str = "MM_TOKEN";
pub const ENV_USERNAME: &str = "MM_USERNAME";
pub const ENV_PASSWORD: &str = "MM_PASSWORD";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("server URL is required. Use --url or set the MM_URL environment variable.")]
    MissingUrl,

    #[error("invalid server URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error(
        "authentication required. Use --token (or MM_TOKEN) for token auth, or --username (or MM_USERNAME) for password auth"
    )]
    MissingCredentials,

    #[error(
        "password required. Set MM_PASSWORD for non-interactive use, or run interactively to be prompted"
    )]
    PasswordRequired,

    #[error("failed to read password: {0}")]
    PasswordPrompt(#[source] std::io::Error),

    #[error("config file {} does not exist", path.display())]
    ConfigNotFound { path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub url: Option<String>,
    pub token: Option<String>,
    pub username: Option<String>,
    pub team: Option<String>,
    pub inactive_days: Option<i64>,
    pub format: Option<OutputFormat>,
    pub timeout_secs: Option<u64>,
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub url: Option<String>,
    pub token: Option<String>,
    pub username: Option<String>,
    pub team: Option<String>,
    pub inactive_days: Option<i64>,
    pub format: Option<OutputFormat>,
    pub output: Option<PathBuf>,
}

/// How to authenticate. A token always wins over a username.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Token(String),
    Login { username: String },
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Server base URL with trailing slashes removed.
    pub server_url: Url,
    pub credentials: Credentials,
    pub team: Option<String>,
    pub inactive_days: i64,
    pub format: OutputFormat,
    pub output: Option<PathBuf>,
    pub timeout: Duration,
}

/// Default location of the user config file.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("mm-guest-audit/config.toml"))
}

/// Load the user config file.
///
/// An explicit path must exist. The default path is optional.
///
/// # Errors
///
/// Returns a [`ConfigError`] if an explicit file is missing, or any file
/// cannot be read or parsed.
pub fn load_file_config(explicit: Option<&Path>) -> Result<FileConfig, ConfigError> {
    let path = match explicit {
        Some(path) if !path.exists() => {
            return Err(ConfigError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(FileConfig::default()),
        },
    };

    let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;

    tracing::debug!(path = %path.display(), "loaded config file");
    toml::from_str::<FileConfig>(&content).map_err(|source| ConfigError::Parse { path, source })
}

/// Merge flags, environment and file config into [`Settings`].
///
/// `env` looks up an environment variable; empty values count as unset.
///
/// # Errors
///
/// Returns [`ConfigError::MissingUrl`], [`ConfigError::InvalidUrl`] or
/// [`ConfigError::MissingCredentials`].
pub fn resolve_settings(
    overrides: &Overrides,
    env: impl Fn(&str) -> Option<String>,
    file: &FileConfig,
) -> Result<Settings, ConfigError> {
    let env = |key: &str| env(key).filter(|value| !value.is_empty());
    let pick = |flag: Option<&str>, key: &str, from_file: Option<&str>| {
        non_empty(flag)
            .or_else(|| env(key))
            .or_else(|| non_empty(from_file))
    };

    let raw_url = pick(overrides.url.as_deref(), ENV_URL, file.url.as_deref())
        .ok_or(ConfigError::MissingUrl)?;
    let server_url = normalize_url(&raw_url)?;

    let token = pick(overrides.token.as_deref(), ENV_TOKEN, file.token.as_deref());
    let username = pick(
        overrides.username.as_deref(),
        ENV_USERNAME,
        file.username.as_deref(),
    );
    let credentials = match (token, username) {
        (Some(token), _) => Credentials::Token(token),
        (None, Some(username)) => Credentials::Login { username },
        (None, None) => return Err(ConfigError::MissingCredentials),
    };

    Ok(Settings {
        server_url,
        credentials,
        team: non_empty(overrides.team.as_deref()).or_else(|| non_empty(file.team.as_deref())),
        inactive_days: overrides.inactive_days.or(file.inactive_days).unwrap_or(0),
        format: overrides.format.or(file.format).unwrap_or_default(),
        output: overrides.output.clone(),
        timeout: Duration::from_secs(file.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
    })
}

/// Strip trailing slashes and require an absolute http(s) URL.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidUrl`] if the URL does not parse or uses
/// another scheme.
pub fn normalize_url(raw: &str) -> Result<Url, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let invalid = |reason: String| ConfigError::InvalidUrl {
        url: raw.to_string(),
        reason,
    };

    let url = Url::parse(trimmed).map_err(|err| invalid(err.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(format!("unsupported scheme '{other}', expected http or https"))),
    }
}

/// Render a URL without the trailing slash `Url` adds to bare hosts.
pub fn display_url(url: &Url) -> String {
    url.as_str().trim_end_matches('/').to_string()
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

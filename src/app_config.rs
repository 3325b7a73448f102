//! Application configuration loading for CLI defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use http_bridge::{BridgeConfig, Directory, RootedDirectories};

/// Key/value file configuration for bridge defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Server origin used for cookie calls.
    pub server_url: Option<String>,
    /// Base directory; each storage directory becomes a folder below it.
    pub base_dir: Option<PathBuf>,
    /// Explicit roots that replace the folder under `base_dir`.
    pub directories: Vec<(Directory, PathBuf)>,
    /// Directory for staged downloads.
    pub staging_dir: Option<PathBuf>,
    /// JSON file persisting cookies.
    pub cookie_store: Option<PathBuf>,
    /// User-Agent header value.
    pub user_agent: Option<String>,
    /// Connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// Read timeout in seconds.
    pub read_timeout_secs: Option<u64>,
    /// Redirects followed per request.
    pub max_redirects: Option<u64>,
}

/// Bridge settings ready for construction.
#[derive(Debug, Clone)]
pub struct Settings {
    pub config: BridgeConfig,
    pub directories: RootedDirectories,
}

impl FileConfig {
    /// Validates config values against runtime and CLI constraints.
    pub fn validate(&self) -> Result<()> {
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("read_timeout_secs", self.read_timeout_secs)?;
        if let Some(max_redirects) = self.max_redirects
            && max_redirects > 50
        {
            bail!("Invalid config value for `max_redirects`: {max_redirects}. Expected range: 0..=50");
        }
        if let Some(user_agent) = &self.user_agent
            && user_agent.trim().is_empty()
        {
            bail!("Invalid config value for `user_agent`: must not be empty");
        }
        Ok(())
    }

    /// Returns `self` with every value set in `overrides` replacing its own.
    #[must_use]
    pub fn merged_with(mut self, overrides: FileConfig) -> Self {
        self.server_url = overrides.server_url.or(self.server_url);
        self.base_dir = overrides.base_dir.or(self.base_dir);
        for (directory, root) in overrides.directories {
            self.directories.retain(|(existing, _)| *existing != directory);
            self.directories.push((directory, root));
        }
        self.staging_dir = overrides.staging_dir.or(self.staging_dir);
        self.cookie_store = overrides.cookie_store.or(self.cookie_store);
        self.user_agent = overrides.user_agent.or(self.user_agent);
        self.connect_timeout_secs = overrides.connect_timeout_secs.or(self.connect_timeout_secs);
        self.read_timeout_secs = overrides.read_timeout_secs.or(self.read_timeout_secs);
        self.max_redirects = overrides.max_redirects.or(self.max_redirects);
        self
    }

    /// Builds bridge settings. Storage directories default to folders under
    /// `default_base` when no `base_dir` is configured.
    pub fn into_settings(self, default_base: &Path) -> Result<Settings> {
        self.validate()?;

        let mut config = BridgeConfig::new();
        if let Some(url) = &self.server_url {
            config = config
                .with_server_url(url)
                .with_context(|| format!("Invalid `server_url` value '{url}'"))?;
        }
        if let Some(secs) = self.connect_timeout_secs {
            config.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.read_timeout_secs {
            config.read_timeout = Duration::from_secs(secs);
        }
        if let Some(max_redirects) = self.max_redirects {
            config.max_redirects = usize::try_from(max_redirects)
                .map_err(|_| anyhow::anyhow!("max_redirects out of range for usize"))?;
        }
        if let Some(user_agent) = self.user_agent {
            config.user_agent = user_agent;
        }
        config.staging_dir = self.staging_dir;
        config.cookie_store_path = self.cookie_store;

        let base = self.base_dir.as_deref().unwrap_or(default_base);
        let directories = self
            .directories
            .into_iter()
            .fold(RootedDirectories::under(base), |dirs, (directory, root)| {
                dirs.with(directory, root)
            });

        Ok(Settings {
            config,
            directories,
        })
    }
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/http-bridge/config.toml`
/// 2. `$HOME/.config/http-bridge/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    let config_home = non_empty_env_path("XDG_CONFIG_HOME")
        .or_else(|| non_empty_env_path("HOME").map(|home| home.join(".config")))?;
    Some(config_home.join("http-bridge").join("config.toml"))
}

/// `$name` as a path; unset and empty variables are both absent.
fn non_empty_env_path(name: &str) -> Option<PathBuf> {
    env::var_os(name)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

/// Loads the config file at `explicit`, or the default file if present.
///
/// An explicit path must exist; a missing default file yields an empty
/// config.
pub fn load_file_config(explicit: Option<&Path>) -> Result<FileConfig> {
    if let Some(path) = explicit {
        return read_file_config(path);
    }
    match resolve_default_config_path() {
        Some(path) if path.exists() => read_file_config(&path),
        _ => Ok(FileConfig::default()),
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_number, raw_line) in (1..).zip(raw.lines()) {
        let Some((key, value)) = split_entry(raw_line)
            .with_context(|| format!("Invalid config syntax on line {line_number}"))?
        else {
            continue;
        };
        let string_value = || {
            unquote(value).with_context(|| format!("Invalid `{key}` value on line {line_number}"))
        };
        let integer_value = || {
            unsigned(value).with_context(|| format!("Invalid `{key}` value on line {line_number}"))
        };

        match key {
            "server_url" => cfg.server_url = Some(string_value()?),
            "base_dir" => cfg.base_dir = Some(PathBuf::from(string_value()?)),
            "staging_dir" => cfg.staging_dir = Some(PathBuf::from(string_value()?)),
            "cookie_store" => cfg.cookie_store = Some(PathBuf::from(string_value()?)),
            "user_agent" => cfg.user_agent = Some(string_value()?),
            "connect_timeout_secs" => cfg.connect_timeout_secs = Some(integer_value()?),
            "read_timeout_secs" => cfg.read_timeout_secs = Some(integer_value()?),
            "max_redirects" => cfg.max_redirects = Some(integer_value()?),
            other => {
                let Some(directory) = other
                    .strip_suffix("_dir")
                    .and_then(|tag| tag.parse::<Directory>().ok())
                else {
                    bail!("Unknown configuration key: '{other}' on line {line_number}");
                };
                let root = PathBuf::from(string_value()?);
                cfg.directories.retain(|(existing, _)| *existing != directory);
                cfg.directories.push((directory, root));
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

/// Splits one line into `(key, value)`, both trimmed and without a trailing
/// `#` comment. Blank and comment-only lines yield `None`.
fn split_entry(line: &str) -> Result<Option<(&str, &str)>> {
    let mut quoted = false;
    let mut escaped = false;
    let mut end = line.len();
    for (index, ch) in line.char_indices() {
        if escaped {
            escaped = false;
        } else if quoted && ch == '\\' {
            escaped = true;
        } else if ch == '"' {
            quoted = !quoted;
        } else if ch == '#' && !quoted {
            end = index;
            break;
        }
    }

    let entry = line[..end].trim();
    if entry.is_empty() {
        return Ok(None);
    }
    let (key, value) = entry.split_once('=').context("expected key = value")?;
    Ok(Some((key.trim(), value.trim())))
}

/// Contents of a double-quoted string. `\"` and `\\` are the only escapes.
fn unquote(raw: &str) -> Result<String> {
    let inner = raw
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .filter(|_| raw.len() >= 2)
        .context("Expected double-quoted string")?;

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some(escaped @ ('"' | '\\')) => out.push(escaped),
                Some(other) => bail!("Unsupported escape '\\{other}'"),
                None => bail!("Dangling escape at end of string"),
            },
            '"' => bail!("Unescaped quote inside string"),
            _ => out.push(ch),
        }
    }
    Ok(out)
}

/// A non-negative decimal integer; `_` may separate digit groups.
fn unsigned(raw: &str) -> Result<u64> {
    let digits: String = raw.chars().filter(|ch| *ch != '_').collect();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        bail!("Expected a non-negative integer, found '{raw}'");
    }
    digits
        .parse::<u64>()
        .with_context(|| format!("'{raw}' does not fit in 64 bits"))
}

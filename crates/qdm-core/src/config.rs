//! Per-download session configuration and the user settings file.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, ConfigViolation};

/// Everything needed to construct a `DownloadSession`. Validated as a whole by
/// [`SessionConfig::validate`]; nothing is checked lazily later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Direct HTTP/HTTPS URL of the resource.
    pub url: String,
    /// Maximum number of concurrent range fetches (1..=max).
    pub max_concurrency: usize,
    /// Existing directory the final file is written into.
    pub save_directory: PathBuf,
    /// Final file name inside `save_directory` (no path separators).
    pub save_file_name: String,
}

impl SessionConfig {
    /// Destination path: `save_directory` joined with `save_file_name`.
    pub fn save_full_path(&self) -> PathBuf {
        self.save_directory.join(&self.save_file_name)
    }

    /// Checks every field against the engine limits and returns all violated
    /// constraints at once.
    pub fn validate(&self, max_concurrency: usize) -> Result<(), ConfigError> {
        let mut violations = Vec::new();

        check_url(&self.url, &mut violations);

        if self.max_concurrency < 1 || self.max_concurrency > max_concurrency {
            violations.push(ConfigViolation::ConcurrencyOutOfRange {
                value: self.max_concurrency,
                max: max_concurrency,
            });
        }

        let dir_ok = check_directory(&self.save_directory, &mut violations);
        let name_ok = check_file_name(&self.save_file_name, &mut violations);

        if dir_ok && name_ok {
            let dest = self.save_full_path();
            if dest.exists() {
                violations.push(ConfigViolation::DestinationExists(dest));
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ConfigError { violations })
        }
    }
}

fn check_url(raw: &str, violations: &mut Vec<ConfigViolation>) {
    let raw = raw.trim();
    if raw.is_empty() {
        violations.push(ConfigViolation::EmptyUrl);
        return;
    }
    match url::Url::parse(raw) {
        Ok(parsed) => {
            if !matches!(parsed.scheme(), "http" | "https") {
                violations.push(ConfigViolation::UnsupportedScheme(
                    parsed.scheme().to_string(),
                ));
            }
        }
        Err(e) => violations.push(ConfigViolation::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        }),
    }
}

fn check_directory(dir: &Path, violations: &mut Vec<ConfigViolation>) -> bool {
    if dir.as_os_str().is_empty() {
        violations.push(ConfigViolation::EmptySaveDirectory);
        return false;
    }
    if !dir.exists() {
        // Missing directories are not created on the caller's behalf.
        violations.push(ConfigViolation::SaveDirectoryMissing(dir.to_path_buf()));
        return false;
    }
    if !dir.is_dir() {
        violations.push(ConfigViolation::SaveDirectoryNotADirectory(dir.to_path_buf()));
        return false;
    }
    true
}

fn check_file_name(name: &str, violations: &mut Vec<ConfigViolation>) -> bool {
    if name.is_empty() {
        violations.push(ConfigViolation::EmptyFileName);
        return false;
    }
    if name.contains('/') || name.contains(std::path::MAIN_SEPARATOR) {
        violations.push(ConfigViolation::FileNameHasSeparator(name.to_string()));
        return false;
    }
    if name == "." || name == ".." || name.contains('\0') {
        violations.push(ConfigViolation::InvalidFileName(name.to_string()));
        return false;
    }
    true
}

/// User settings loaded from `~/.config/qdm/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QdmConfig {
    /// Preferred number of concurrent connections per download.
    pub connections: usize,
    /// Default directory for downloads (None = current directory).
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
}

impl Default for QdmConfig {
    fn default() -> Self {
        Self {
            connections: 8,
            download_dir: None,
        }
    }
}

impl QdmConfig {
    /// Configured connection count clamped to `[1, max]`. Out-of-range values
    /// are not an error for user settings; they fall back to the nearest bound.
    pub fn clamped_connections(&self, max: usize) -> usize {
        if self.connections > max {
            tracing::warn!(
                configured = self.connections,
                max,
                "connections exceed the maximum allowed; using the maximum"
            );
            max
        } else if self.connections < 1 {
            tracing::warn!("connections below 1; using 1");
            1
        } else {
            self.connections
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("qdm")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load settings from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<QdmConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = QdmConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: QdmConfig = toml::from_str(&data)?;
    Ok(cfg)
}

//! Daemon configuration – reads/writes `~/.platsec/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use platsec_controllers::DEFAULT_SIGNING_KEY_PATH;
use platsec_firmware::DEFAULT_EFIVARS_PATH;

/// Persisted daemon configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// PEM file holding the PCR signing key.
    #[serde(default = "default_signing_key_path")]
    pub signing_key_path: PathBuf,

    /// Mount point of efivarfs.
    #[serde(default = "default_efivars_path")]
    pub efivars_path: PathBuf,
}

fn default_signing_key_path() -> PathBuf {
    PathBuf::from(DEFAULT_SIGNING_KEY_PATH)
}
fn default_efivars_path() -> PathBuf {
    PathBuf::from(DEFAULT_EFIVARS_PATH)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            signing_key_path: default_signing_key_path(),
            efivars_path: default_efivars_path(),
        }
    }
}

/// Return the config path: `$PLATSEC_CONFIG`, else `~/.platsec/config.toml`.
pub fn config_path() -> PathBuf {
    if let Ok(explicit) = std::env::var("PLATSEC_CONFIG")
        && !explicit.is_empty()
    {
        return PathBuf::from(explicit);
    }
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".platsec").join("config.toml")
}

/// Load the config from disk and apply environment overrides.  Returns
/// `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    let mut cfg = load_from(&config_path())?;
    if let Some(cfg) = cfg.as_mut() {
        apply_env_overrides(cfg);
    }
    Ok(cfg)
}

/// Parse the config at `path` as written, without overrides.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config = toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply `PLATSEC_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `PLATSEC_SIGNING_KEY_PATH` | `signing_key_path` |
/// | `PLATSEC_EFIVARS_PATH` | `efivars_path` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("PLATSEC_SIGNING_KEY_PATH")
        && !v.is_empty()
    {
        cfg.signing_key_path = PathBuf::from(v);
    }
    if let Ok(v) = std::env::var("PLATSEC_EFIVARS_PATH")
        && !v.is_empty()
    {
        cfg.efivars_path = PathBuf::from(v);
    }
}

/// Save the config, creating the parent directory if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| format!("Failed to create config directory: {}", e))?;
        // Owner only (rwx------).
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw = toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}

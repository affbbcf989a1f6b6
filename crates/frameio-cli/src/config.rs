use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use frameio_client::DEFAULT_HOST;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PROFILE: &str = "default";

/// Overrides the stored token of whichever profile is selected.
pub const TOKEN_ENV: &str = "FRAMEIO_TOKEN";

#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Profile {
    #[serde(default = "default_host")]
    pub host: String,
    pub token: String,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn home_dir() -> anyhow::Result<PathBuf> {
    dirs::home_dir().ok_or_else(|| anyhow::anyhow!("could not find home directory"))
}

pub fn config_path() -> anyhow::Result<PathBuf> {
    Ok(home_dir()?.join(".frameio").join("config.toml"))
}

impl Config {
    /// Read `path`, falling back to an empty config when it is missing or unreadable.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("ignoring malformed {}: {e}", path.display());
                Config::default()
            }),
            Err(_) => Config::default(),
        }
    }

    pub fn load() -> Self {
        match config_path() {
            Ok(path) => Self::load_from(&path),
            Err(_) => Config::default(),
        }
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&config_path()?)
    }

    /// Credentials for `profile`, with `env_token` taking precedence over the stored token.
    pub fn resolve(&self, profile: &str, env_token: Option<String>) -> Option<Profile> {
        let stored = self.profiles.get(profile).cloned();
        match (env_token.filter(|t| !t.is_empty()), stored) {
            (Some(token), Some(stored)) => Some(Profile {
                host: stored.host,
                token,
            }),
            (Some(token), None) => Some(Profile {
                host: default_host(),
                token,
            }),
            (None, stored) => stored,
        }
    }
}

/// Credentials for `profile` from the config file and the environment.
pub fn resolve_credentials(profile: &str) -> anyhow::Result<Profile> {
    Config::load()
        .resolve(profile, std::env::var(TOKEN_ENV).ok())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "no credentials for profile '{profile}'; run `fio auth login` or set {TOKEN_ENV}"
            )
        })
}

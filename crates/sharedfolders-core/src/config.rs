use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

pub const SYSTEM_CONFIG_PATH: &str = "/etc/qubes/shared-folders/config.toml";
pub const CONFIG_ENV: &str = "SHARED_FOLDERS_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub policy: PolicyConfig,
    pub consent: ConsentConfig,
    pub registry: RegistryConfig,
    pub client: ClientConfig,
    pub server: ServerConfig,
}

/// Where decisions and transport grants live in dom0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub db_path: PathBuf,
    pub grant_dir: PathBuf,
    pub grant_prefix: String,
    /// Serialize load-modify-save cycles across concurrent service calls
    /// with an advisory lock next to the policy file.
    pub lock: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsentConfig {
    pub program: PathBuf,
    pub timeout_secs: u64,
    pub display: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub command: PathBuf,
    pub args: Vec<String>,
}

/// Settings for the requesting qube.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub qrexec_client: PathBuf,
    pub authorize_service: String,
    pub connect_service: String,
    pub query_service: String,
    pub sudo: PathBuf,
    pub mount: PathBuf,
}

/// Settings for the exporting qube.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// File server started once the handshake succeeds. It is invoked as
    /// `<command> 0 1 <folder>` and speaks 9P over stdin/stdout.
    pub command: PathBuf,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("/etc/qubes/shared-folders/policy.db"),
            grant_dir: PathBuf::from("/etc/qubes-rpc/policy"),
            grant_prefix: "ruddo.ConnectToFolder".to_string(),
            lock: true,
        }
    }
}

impl Default for ConsentConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("/usr/libexec/qvm-authorize-folder-access"),
            timeout_secs: 300,
            display: ":0".to_string(),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            command: PathBuf::from("qvm-ls"),
            args: vec!["--raw-list".to_string()],
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            qrexec_client: PathBuf::from("/usr/bin/qrexec-client-vm"),
            authorize_service: "ruddo.AuthorizeFolderAccess".to_string(),
            connect_service: "ruddo.ConnectToFolder".to_string(),
            query_service: "ruddo.QueryFolderForAuthorization".to_string(),
            sudo: PathBuf::from("/usr/bin/sudo"),
            mount: PathBuf::from("/usr/bin/mount"),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            command: PathBuf::from("/usr/lib/qubes/qubes-shared-folders-server"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_path: PathBuf,
}

impl Config {
    pub fn default_config() -> Self {
        Self::default()
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("parse config TOML")?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        let output = toml::to_string_pretty(self).context("render config TOML")?;
        Ok(output)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("read config at {}", path.display()))?;
        Self::from_toml_str(&contents)
    }

    /// Loads `path`, falling back to built-in defaults when the file does
    /// not exist. A file that exists but does not parse is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default_config());
        }
        Self::load(path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create config dir {}", parent.display()))?;
        }
        let contents = self.to_toml_string()?;
        fs::write(path, contents).with_context(|| format!("write config at {}", path.display()))?;
        Ok(())
    }
}

impl ConfigPaths {
    /// `$SHARED_FOLDERS_CONFIG` wins, then a per-user config if one exists,
    /// then the system-wide file.
    pub fn resolve() -> Self {
        if let Ok(value) = std::env::var(CONFIG_ENV) {
            if !value.is_empty() {
                return Self {
                    config_path: PathBuf::from(value),
                };
            }
        }
        let user_config = ProjectDirs::from("org", "qubes-os", "qubes-shared-folders")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .filter(|path| path.exists());
        Self {
            config_path: user_config.unwrap_or_else(|| PathBuf::from(SYSTEM_CONFIG_PATH)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_qubes_layout() {
        let config = Config::default_config();
        assert_eq!(config.policy.db_path, PathBuf::from("/etc/qubes/shared-folders/policy.db"));
        assert_eq!(config.policy.grant_dir, PathBuf::from("/etc/qubes-rpc/policy"));
        assert_eq!(config.policy.grant_prefix, "ruddo.ConnectToFolder");
        assert!(config.policy.lock);
        assert_eq!(config.consent.timeout_secs, 300);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            [policy]
            db_path = "/tmp/policy.db"

            [consent]
            timeout_secs = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.policy.db_path, PathBuf::from("/tmp/policy.db"));
        assert_eq!(config.policy.grant_prefix, "ruddo.ConnectToFolder");
        assert_eq!(config.consent.timeout_secs, 5);
        assert_eq!(config.consent.display, ":0");
        assert_eq!(config.client, ClientConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/config.toml");
        let mut config = Config::default_config();
        config.policy.lock = false;
        config.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let config = Config::load_or_default(&temp.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default_config());
    }

    #[test]
    fn test_broken_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "[policy\n").unwrap();
        assert!(Config::load_or_default(&path).is_err());
    }
}

// Runtime configuration for the sync backend: storage location, bind
// address, logging, and the device identity stamped on consent records.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::{SyncError, SyncResult};

pub const USER_FILE: &str = "user.txt";
pub const CHAT_LOG_FILE: &str = "user_chat_logs.txt";
pub const ISSUE_LOG_FILE: &str = "user_issue_log.txt";
pub const CONSENT_LOG_FILE: &str = "consent_log.txt";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub storage_root: PathBuf,
    pub host: String,
    pub port: u16,
    /// Overrides the detected `<hostname>-<user>` identity when set.
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    /// One of `pretty`, `compact` or `json`.
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("admin_data"),
            host: "0.0.0.0".to_string(),
            port: 8000,
            device_id: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> SyncResult<()> {
        if self.storage_root.as_os_str().is_empty() {
            return Err(SyncError::config("storage_root cannot be empty"));
        }
        if self.port == 0 {
            return Err(SyncError::config("port must be non-zero"));
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "compact" | "json") {
            return Err(SyncError::config(format!(
                "unknown logging format '{}'",
                self.logging.format
            )));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn paths(&self) -> StoragePaths {
        StoragePaths::new(&self.storage_root)
    }

    /// Device identity resolved once: configured value or detected.
    pub fn device_identity(&self) -> DeviceIdentity {
        match &self.device_id {
            Some(id) if !id.trim().is_empty() => DeviceIdentity(id.clone()),
            _ => DeviceIdentity::detect(),
        }
    }
}

/// Locations of every backing file, derived once from the storage root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    pub root: PathBuf,
    pub user_file: PathBuf,
    pub chat_log: PathBuf,
    pub issue_log: PathBuf,
    pub consent_log: PathBuf,
}

impl StoragePaths {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            user_file: root.join(USER_FILE),
            chat_log: root.join(CHAT_LOG_FILE),
            issue_log: root.join(ISSUE_LOG_FILE),
            consent_log: root.join(CONSENT_LOG_FILE),
            root,
        }
    }

    /// Per-user consent snapshot, `<root>/<user_id>.json`.
    pub fn consent_snapshot(&self, user_id: &str) -> PathBuf {
        self.root.join(format!("{user_id}.json"))
    }

    pub fn all_files(&self) -> [&Path; 4] {
        [
            &self.user_file,
            &self.chat_log,
            &self.issue_log,
            &self.consent_log,
        ]
    }
}

/// `<hostname>-<os user>` identity of the machine running the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity(pub String);

impl DeviceIdentity {
    pub fn detect() -> Self {
        let host = std::env::var("HOSTNAME")
            .or_else(|_| std::env::var("COMPUTERNAME"))
            .ok()
            .filter(|h| !h.trim().is_empty())
            .or_else(|| {
                std::fs::read_to_string("/etc/hostname")
                    .ok()
                    .map(|h| h.trim().to_string())
                    .filter(|h| !h.is_empty())
            })
            .unwrap_or_else(|| "localhost".to_string());
        let user = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .ok()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| "unknown".to_string());
        Self(format!("{host}-{user}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_rooted_in_storage_root() {
        let paths = StoragePaths::new("/srv/admin_data");
        assert_eq!(paths.user_file, PathBuf::from("/srv/admin_data/user.txt"));
        assert_eq!(
            paths.consent_log,
            PathBuf::from("/srv/admin_data/consent_log.txt")
        );
        assert_eq!(
            paths.consent_snapshot("bob"),
            PathBuf::from("/srv/admin_data/bob.json")
        );
    }

    #[test]
    fn configured_device_id_wins() {
        let cfg = SyncConfig {
            device_id: Some("kiosk-7".into()),
            ..SyncConfig::default()
        };
        assert_eq!(cfg.device_identity().as_str(), "kiosk-7");
    }

    #[test]
    fn detected_device_id_has_host_and_user() {
        let id = DeviceIdentity::detect();
        assert!(id.as_str().contains('-'));
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut cfg = SyncConfig::default();
        assert!(cfg.validate().is_ok());

        cfg.port = 0;
        assert!(cfg.validate().is_err());

        cfg.port = 8000;
        cfg.storage_root = PathBuf::new();
        assert!(cfg.validate().is_err());

        cfg.storage_root = PathBuf::from("data");
        cfg.logging.format = "xml".into();
        assert!(cfg.validate().is_err());
    }
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Storage Configuration
//
// Operator-facing options for the shared media volume:
// - backend selection (storage-class, native-nfs, hostpath)
// - backend specific locators
// - size / access mode
// - owner ids handed to consumers
// - teardown opt-in
//
// The configuration is re-read on every reconcile pass; the desired VolumeSpec
// is derived from it fresh each time and never persisted.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::capacity::Capacity;
use crate::domain::volume::{AccessMode, BackendType, OwnerIds, VolumeLocator, VolumeSpec};

/// Configuration validation failures.
///
/// `Display` is the exact text shown in a Blocked status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("backend-type not configured")]
    BackendTypeMissing,

    #[error("Invalid backend-type: {0}. Use 'storage-class', 'native-nfs' or 'hostpath'")]
    BackendTypeInvalid(String),

    #[error("{0} not configured")]
    FieldMissing(&'static str),

    #[error("Invalid size: {0}")]
    InvalidSize(String),

    #[error("Invalid access-mode: {0}. Use 'ReadWriteMany' or 'ReadWriteOnce'")]
    InvalidAccessMode(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StorageConfig {
    /// One of storage-class, native-nfs, hostpath
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_type: Option<String>,

    /// Requested capacity (Kubernetes quantity)
    #[serde(default = "default_size")]
    pub size: String,

    #[serde(default = "default_access_mode")]
    pub access_mode: String,

    /// Required iff backend-type = storage-class
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,

    /// Required iff backend-type = native-nfs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nfs_server: Option<String>,

    /// Required iff backend-type = native-nfs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nfs_path: Option<String>,

    /// Required iff backend-type = hostpath
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostpath: Option<String>,

    #[serde(default = "default_owner_id")]
    pub puid: u32,

    #[serde(default = "default_owner_id")]
    pub pgid: u32,

    /// Delete the PVC (and static PV) when the whole deployment is removed
    #[serde(default)]
    pub cleanup_on_remove: bool,

    /// Image used by the permission-check Job
    #[serde(default = "default_permission_check_image")]
    pub permission_check_image: String,
}

fn default_size() -> String {
    "100Gi".to_string()
}

fn default_access_mode() -> String {
    AccessMode::default().as_str().to_string()
}

fn default_owner_id() -> u32 {
    1000
}

fn default_permission_check_image() -> String {
    "busybox:1.36".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend_type: None,
            size: default_size(),
            access_mode: default_access_mode(),
            storage_class: None,
            nfs_server: None,
            nfs_path: None,
            hostpath: None,
            puid: default_owner_id(),
            pgid: default_owner_id(),
            cleanup_on_remove: false,
            permission_check_image: default_permission_check_image(),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl StorageConfig {
    /// Configured backend, or the error for a missing/invalid `backend-type`.
    pub fn backend_type(&self) -> Result<BackendType, ConfigError> {
        let raw = non_empty(&self.backend_type).ok_or(ConfigError::BackendTypeMissing)?;
        raw.parse()
            .map_err(|_| ConfigError::BackendTypeInvalid(raw.to_string()))
    }

    pub fn owner(&self) -> OwnerIds {
        OwnerIds {
            puid: self.puid,
            pgid: self.pgid,
        }
    }

    /// Backend specific locator; fields are checked in a fixed order so the
    /// first missing one is reported.
    pub fn locator(&self, backend: BackendType) -> Result<VolumeLocator, ConfigError> {
        match backend {
            BackendType::StorageClass => {
                let class_name = non_empty(&self.storage_class)
                    .ok_or(ConfigError::FieldMissing("storage-class"))?;
                Ok(VolumeLocator::StorageClass {
                    class_name: class_name.to_string(),
                })
            }
            BackendType::NativeNfs => {
                let server =
                    non_empty(&self.nfs_server).ok_or(ConfigError::FieldMissing("nfs-server"))?;
                let path =
                    non_empty(&self.nfs_path).ok_or(ConfigError::FieldMissing("nfs-path"))?;
                Ok(VolumeLocator::NativeNfs {
                    server: server.to_string(),
                    path: path.to_string(),
                })
            }
            BackendType::HostPath => {
                let path =
                    non_empty(&self.hostpath).ok_or(ConfigError::FieldMissing("hostpath"))?;
                Ok(VolumeLocator::HostPath {
                    path: path.to_string(),
                })
            }
        }
    }

    /// Full desired volume for the given (already validated) backend.
    pub fn volume_spec(&self, backend: BackendType) -> Result<VolumeSpec, ConfigError> {
        let locator = self.locator(backend)?;
        let capacity = Capacity::parse(self.size.clone())
            .map_err(|_| ConfigError::InvalidSize(self.size.clone()))?;
        let access_mode = self
            .access_mode
            .parse()
            .map_err(|_| ConfigError::InvalidAccessMode(self.access_mode.clone()))?;

        Ok(VolumeSpec {
            locator,
            capacity,
            access_mode,
            owner: self.owner(),
        })
    }

    /// Validate everything in one go (used by `config validate`).
    pub fn validate(&self) -> Result<VolumeSpec, ConfigError> {
        let backend = self.backend_type()?;
        self.volume_spec(backend)
    }

    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Discover configuration file using precedence order
    /// 1. CHARMARR_STORAGE_CONFIG environment variable
    /// 2. ./charmarr-storage.yaml (working directory)
    /// 3. ~/.charmarr/storage.yaml (user home)
    /// 4. /etc/charmarr/storage.yaml (system)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("CHARMARR_STORAGE_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./charmarr-storage.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".charmarr").join("storage.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/charmarr/storage.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery and environment overrides.
    ///
    /// An explicit path must exist; discovery falls back to defaults.
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        if let Some(path) = cli_path {
            tracing::debug!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::debug!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    /// This allows container deployments to override config via env vars
    pub fn apply_env_overrides(&mut self) {
        let string_overrides: [(&str, &mut Option<String>); 5] = [
            ("CHARMARR_BACKEND_TYPE", &mut self.backend_type),
            ("CHARMARR_STORAGE_CLASS", &mut self.storage_class),
            ("CHARMARR_NFS_SERVER", &mut self.nfs_server),
            ("CHARMARR_NFS_PATH", &mut self.nfs_path),
            ("CHARMARR_HOSTPATH", &mut self.hostpath),
        ];
        for (var, field) in string_overrides {
            if let Ok(val) = std::env::var(var) {
                *field = Some(val);
            }
        }

        if let Ok(val) = std::env::var("CHARMARR_SIZE") {
            self.size = val;
        }
        if let Ok(val) = std::env::var("CHARMARR_ACCESS_MODE") {
            self.access_mode = val;
        }

        for (var, field) in [("CHARMARR_PUID", &mut self.puid), ("CHARMARR_PGID", &mut self.pgid)] {
            if let Ok(val) = std::env::var(var) {
                match val.parse() {
                    Ok(id) => *field = id,
                    Err(_) => tracing::warn!("Ignoring invalid {} value: {}", var, val),
                }
            }
        }

        if let Ok(val) = std::env::var("CHARMARR_CLEANUP_ON_REMOVE") {
            match val.to_lowercase().as_str() {
                "true" | "1" | "yes" => self.cleanup_on_remove = true,
                "false" | "0" | "no" => self.cleanup_on_remove = false,
                _ => tracing::warn!("Ignoring invalid CHARMARR_CLEANUP_ON_REMOVE value: {}", val),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(backend: &str) -> StorageConfig {
        StorageConfig {
            backend_type: Some(backend.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = StorageConfig::from_yaml_str("backend-type: hostpath\n").unwrap();
        assert_eq!(config.size, "100Gi");
        assert_eq!(config.access_mode, "ReadWriteMany");
        assert_eq!(config.owner(), OwnerIds { puid: 1000, pgid: 1000 });
        assert!(!config.cleanup_on_remove);
    }

    #[test]
    fn test_missing_backend_type() {
        assert_eq!(
            StorageConfig::default().backend_type(),
            Err(ConfigError::BackendTypeMissing)
        );
        assert_eq!(
            config("  ").backend_type(),
            Err(ConfigError::BackendTypeMissing)
        );
    }

    #[test]
    fn test_invalid_backend_type_message() {
        let err = config("invalid").backend_type().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid backend-type: invalid. Use 'storage-class', 'native-nfs' or 'hostpath'"
        );
    }

    #[test]
    fn test_storage_class_requires_class_name() {
        let err = config("storage-class").validate().unwrap_err();
        assert_eq!(err.to_string(), "storage-class not configured");
    }

    #[test]
    fn test_native_nfs_reports_server_before_path() {
        let err = config("native-nfs").validate().unwrap_err();
        assert_eq!(err.to_string(), "nfs-server not configured");

        let mut with_server = config("native-nfs");
        with_server.nfs_server = Some("192.168.1.100".to_string());
        let err = with_server.validate().unwrap_err();
        assert_eq!(err.to_string(), "nfs-path not configured");
    }

    #[test]
    fn test_hostpath_requires_path() {
        let err = config("hostpath").validate().unwrap_err();
        assert_eq!(err.to_string(), "hostpath not configured");
    }

    #[test]
    fn test_invalid_size_and_access_mode() {
        let mut cfg = config("hostpath");
        cfg.hostpath = Some("/media".to_string());
        cfg.size = "huge".to_string();
        assert_eq!(cfg.validate().unwrap_err(), ConfigError::InvalidSize("huge".to_string()));

        cfg.size = "2Ti".to_string();
        cfg.access_mode = "ReadOnlyMany".to_string();
        assert!(matches!(
            cfg.validate().unwrap_err(),
            ConfigError::InvalidAccessMode(_)
        ));
    }

    #[test]
    fn test_full_spec_from_yaml() {
        let yaml = r#"
backend-type: native-nfs
nfs-server: 192.168.1.100
nfs-path: /mnt/media
size: 2Ti
access-mode: ReadWriteOnce
puid: 1234
pgid: 5678
cleanup-on-remove: true
"#;
        let config = StorageConfig::from_yaml_str(yaml).unwrap();
        let spec = config.validate().unwrap();
        assert_eq!(
            spec.locator,
            VolumeLocator::NativeNfs {
                server: "192.168.1.100".to_string(),
                path: "/mnt/media".to_string()
            }
        );
        assert_eq!(spec.capacity.as_str(), "2Ti");
        assert_eq!(spec.access_mode, AccessMode::ReadWriteOnce);
        assert_eq!(spec.owner, OwnerIds { puid: 1234, pgid: 5678 });
        assert!(config.cleanup_on_remove);
    }

    #[test]
    fn test_load_explicit_missing_path_fails() {
        let result = StorageConfig::load_or_default(Some(PathBuf::from(
            "/definitely/not/here/charmarr-storage.yaml",
        )));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.yaml");
        std::fs::write(&path, "backend-type: storage-class\nstorage-class: local-path\n").unwrap();

        let config = StorageConfig::load_or_default(Some(path)).unwrap();
        assert_eq!(config.storage_class.as_deref(), Some("local-path"));
    }
}

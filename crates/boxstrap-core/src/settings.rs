use crate::error::{ProvisionError, Result};
use crate::paths;
use crate::server_config::LISTEN_PORT;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Release of sing-box that a run installs. AnyTLS inbounds need >= 1.12.
pub const DEFAULT_VERSION: &str = "1.12.0";

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Knobs for a provisioning run. Every field has a default, so an absent
/// settings file yields the standard single-profile deployment.
///
/// The listener port is not a setting: the profile always binds
/// [`LISTEN_PORT`]. Unknown keys are rejected so a stale `listen_port` or a
/// typo fails loudly instead of being ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_install_path")]
    pub install_path: PathBuf,
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,
    /// Directory holding the unit file; the file itself is `<service_name>.service`.
    #[serde(default = "default_unit_dir")]
    pub unit_dir: PathBuf,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_letsencrypt_dir")]
    pub letsencrypt_dir: PathBuf,
    /// First five cron fields for the renewal job.
    #[serde(default = "default_renew_schedule")]
    pub renew_schedule: String,
    /// User name embedded in the inbound's single user entry.
    #[serde(default = "default_user_name")]
    pub user_name: String,
    #[serde(default = "default_open_ports")]
    pub open_ports: Vec<u16>,
}

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

fn default_install_path() -> PathBuf {
    PathBuf::from(paths::INSTALL_PATH)
}

fn default_config_dir() -> PathBuf {
    PathBuf::from(paths::CONFIG_DIR)
}

fn default_unit_dir() -> PathBuf {
    PathBuf::from(paths::UNIT_DIR)
}

fn default_service_name() -> String {
    "sing-box".to_string()
}

fn default_letsencrypt_dir() -> PathBuf {
    PathBuf::from(paths::LETSENCRYPT_LIVE_DIR)
}

fn default_renew_schedule() -> String {
    "0 3 * * *".to_string()
}

fn default_user_name() -> String {
    "boxstrap".to_string()
}

fn default_open_ports() -> Vec<u16> {
    vec![22, 80, 443]
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            install_path: default_install_path(),
            config_dir: default_config_dir(),
            unit_dir: default_unit_dir(),
            service_name: default_service_name(),
            letsencrypt_dir: default_letsencrypt_dir(),
            renew_schedule: default_renew_schedule(),
            user_name: default_user_name(),
            open_ports: default_open_ports(),
        }
    }
}

impl Settings {
    /// Load settings from a YAML file, or return defaults when `path` is None.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let settings = match path {
            Some(p) => {
                let data = std::fs::read_to_string(p).map_err(|e| {
                    ProvisionError::Settings(format!("cannot read {}: {e}", p.display()))
                })?;
                serde_yaml::from_str::<Settings>(&data)?
            }
            None => Settings::default(),
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.version.trim().is_empty() {
            return Err(ProvisionError::Settings("version cannot be empty".into()));
        }
        if self.service_name.trim().is_empty() {
            return Err(ProvisionError::Settings(
                "service_name cannot be empty".into(),
            ));
        }
        if self.user_name.trim().is_empty() {
            return Err(ProvisionError::Settings("user_name cannot be empty".into()));
        }
        let fields = self.renew_schedule.split_whitespace().count();
        if fields != 5 {
            return Err(ProvisionError::Settings(format!(
                "renew_schedule must have 5 cron fields, got {fields}: '{}'",
                self.renew_schedule
            )));
        }
        if self.service_name.contains('/') || self.service_name.ends_with(".service") {
            return Err(ProvisionError::Settings(format!(
                "service_name must be a bare unit name, got '{}'",
                self.service_name
            )));
        }
        if !self.open_ports.contains(&LISTEN_PORT) {
            return Err(ProvisionError::Settings(format!(
                "open_ports must include the listener port {LISTEN_PORT}"
            )));
        }
        Ok(())
    }

    pub fn config_path(&self) -> PathBuf {
        paths::config_path(&self.config_dir)
    }

    pub fn unit_path(&self) -> PathBuf {
        paths::unit_path(&self.unit_dir, &self.service_name)
    }

    pub fn cache_path(&self) -> PathBuf {
        paths::cache_path(&self.config_dir)
    }

    /// Command an operator runs to read the daemon's recent logs.
    pub fn log_command(&self) -> String {
        format!("journalctl -u {} --no-pager -n 50", self.service_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_describe_fixed_profile() {
        let s = Settings::default();
        assert_eq!(s.install_path, PathBuf::from("/usr/local/bin/sing-box"));
        assert_eq!(s.config_path(), PathBuf::from("/etc/sing-box/config.json"));
        assert_eq!(
            s.unit_path(),
            PathBuf::from("/etc/systemd/system/sing-box.service")
        );
        assert!(s.validate().is_ok());
    }

    #[test]
    fn unit_file_follows_service_name() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("boxstrap.yaml");
        std::fs::write(&path, "service_name: box\n").unwrap();

        let s = Settings::load(Some(&path)).unwrap();
        assert_eq!(s.unit_path(), PathBuf::from("/etc/systemd/system/box.service"));
        assert_eq!(s.log_command(), "journalctl -u box --no-pager -n 50");
    }

    #[test]
    fn rejects_service_name_with_suffix_or_path() {
        for name in ["box.service", "../box"] {
            let s = Settings {
                service_name: name.into(),
                ..Settings::default()
            };
            assert!(matches!(s.validate(), Err(ProvisionError::Settings(_))), "{name}");
        }
    }

    #[test]
    fn listen_port_is_not_a_setting() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("boxstrap.yaml");
        std::fs::write(&path, "listen_port: 8443\n").unwrap();
        assert!(Settings::load(Some(&path)).is_err());
    }

    #[test]
    fn load_without_path_returns_defaults() {
        assert_eq!(Settings::load(None).unwrap(), Settings::default());
    }

    #[test]
    fn load_partial_yaml_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("boxstrap.yaml");
        std::fs::write(&path, "version: \"1.12.4\"\nconfig_dir: /opt/sb\n").unwrap();

        let s = Settings::load(Some(&path)).unwrap();
        assert_eq!(s.version, "1.12.4");
        assert_eq!(s.config_dir, PathBuf::from("/opt/sb"));
        assert_eq!(s.service_name, "sing-box");
    }

    #[test]
    fn load_missing_file_is_settings_error() {
        let err = Settings::load(Some(Path::new("/nonexistent/boxstrap.yaml"))).unwrap_err();
        assert!(matches!(err, ProvisionError::Settings(_)));
    }

    #[test]
    fn rejects_malformed_schedule() {
        let s = Settings {
            renew_schedule: "0 3 * *".into(),
            ..Settings::default()
        };
        assert!(matches!(s.validate(), Err(ProvisionError::Settings(_))));
    }

    #[test]
    fn rejects_open_ports_without_listener() {
        let s = Settings {
            open_ports: vec![22, 80],
            ..Settings::default()
        };
        assert!(s.validate().is_err());
    }

    #[test]
    fn log_command_names_service() {
        assert_eq!(
            Settings::default().log_command(),
            "journalctl -u sing-box --no-pager -n 50"
        );
    }
}

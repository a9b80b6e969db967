use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Default locations on the target host
// ---------------------------------------------------------------------------

pub const INSTALL_PATH: &str = "/usr/local/bin/sing-box";
pub const CONFIG_DIR: &str = "/etc/sing-box";
pub const UNIT_DIR: &str = "/etc/systemd/system";
pub const LETSENCRYPT_LIVE_DIR: &str = "/etc/letsencrypt/live";

pub const CONFIG_FILE: &str = "config.json";
pub const CACHE_FILE: &str = "cache.db";

/// Name of the executable inside the release archive.
pub const BINARY_NAME: &str = "sing-box";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn config_path(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_FILE)
}

pub fn cache_path(config_dir: &Path) -> PathBuf {
    config_dir.join(CACHE_FILE)
}

/// Unit file systemd resolves for `service`. The file stem is the name every
/// `systemctl` call and the renewal job refer to.
pub fn unit_path(unit_dir: &Path, service: &str) -> PathBuf {
    unit_dir.join(format!("{service}.service"))
}

/// Certificate chain written by certbot for `domain`.
pub fn fullchain_path(live_dir: &Path, domain: &str) -> PathBuf {
    live_dir.join(domain).join("fullchain.pem")
}

/// Private key written by certbot for `domain`.
pub fn privkey_path(live_dir: &Path, domain: &str) -> PathBuf {
    live_dir.join(domain).join("privkey.pem")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn certbot_live_layout() {
        let live = Path::new(LETSENCRYPT_LIVE_DIR);
        assert_eq!(
            fullchain_path(live, "example.com"),
            PathBuf::from("/etc/letsencrypt/live/example.com/fullchain.pem")
        );
        assert_eq!(
            privkey_path(live, "example.com"),
            PathBuf::from("/etc/letsencrypt/live/example.com/privkey.pem")
        );
    }

    #[test]
    fn unit_file_is_named_after_service() {
        let dir = Path::new(UNIT_DIR);
        assert_eq!(
            unit_path(dir, "sing-box"),
            PathBuf::from("/etc/systemd/system/sing-box.service")
        );
        assert_eq!(
            unit_path(dir, "box"),
            PathBuf::from("/etc/systemd/system/box.service")
        );
    }

    #[test]
    fn config_and_cache_live_side_by_side() {
        let dir = Path::new(CONFIG_DIR);
        assert_eq!(config_path(dir), PathBuf::from("/etc/sing-box/config.json"));
        assert_eq!(cache_path(dir), PathBuf::from("/etc/sing-box/cache.db"));
    }
}

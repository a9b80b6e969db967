use crate::settings::Settings;
use std::fmt::Write as _;
use std::path::PathBuf;

/// Capabilities the daemon keeps; it never runs with full root privilege.
pub const CAPABILITIES: &[&str] = &["CAP_NET_ADMIN", "CAP_NET_BIND_SERVICE"];

/// systemd registration for the daemon.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceUnit {
    pub description: String,
    pub documentation: String,
    pub after: Vec<String>,
    pub wants: Vec<String>,
    pub capabilities: Vec<String>,
    pub binary: PathBuf,
    pub config: PathBuf,
    pub restart: String,
    pub restart_sec: String,
    pub limit_nofile: String,
    pub wanted_by: String,
}

impl ServiceUnit {
    pub fn for_settings(settings: &Settings) -> Self {
        Self {
            description: "sing-box service".to_string(),
            documentation: "https://sing-box.sagernet.org".to_string(),
            after: vec![
                "network.target".to_string(),
                "nss-lookup.target".to_string(),
                "network-online.target".to_string(),
            ],
            wants: vec!["network-online.target".to_string()],
            capabilities: CAPABILITIES.iter().map(|c| c.to_string()).collect(),
            binary: settings.install_path.clone(),
            config: settings.config_path(),
            restart: "on-failure".to_string(),
            restart_sec: "10s".to_string(),
            limit_nofile: "infinity".to_string(),
            wanted_by: "multi-user.target".to_string(),
        }
    }

    pub fn exec_start(&self) -> String {
        format!("{} run -c {}", self.binary.display(), self.config.display())
    }

    /// Render as a systemd unit file.
    pub fn render(&self) -> String {
        let caps = self.capabilities.join(" ");
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = writeln!(out, "[Unit]");
        let _ = writeln!(out, "Description={}", self.description);
        let _ = writeln!(out, "Documentation={}", self.documentation);
        let _ = writeln!(out, "After={}", self.after.join(" "));
        let _ = writeln!(out, "Wants={}", self.wants.join(" "));
        let _ = writeln!(out);
        let _ = writeln!(out, "[Service]");
        let _ = writeln!(out, "CapabilityBoundingSet={caps}");
        let _ = writeln!(out, "AmbientCapabilities={caps}");
        let _ = writeln!(out, "ExecStart={}", self.exec_start());
        let _ = writeln!(out, "ExecReload=/bin/kill -HUP $MAINPID");
        let _ = writeln!(out, "Restart={}", self.restart);
        let _ = writeln!(out, "RestartSec={}", self.restart_sec);
        let _ = writeln!(out, "LimitNOFILE={}", self.limit_nofile);
        let _ = writeln!(out);
        let _ = writeln!(out, "[Install]");
        let _ = writeln!(out, "WantedBy={}", self.wanted_by);
        out
    }
}

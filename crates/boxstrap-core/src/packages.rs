use crate::error::{ProvisionError, Result};
use crate::host::{run_checked, Host};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageManager {
    Apt,
    Dnf,
    Yum,
}

impl PackageManager {
    pub fn program(&self) -> &'static str {
        match self {
            PackageManager::Apt => "apt-get",
            PackageManager::Dnf => "dnf",
            PackageManager::Yum => "yum",
        }
    }

    /// Packages the later steps rely on: the ACME client and a cron daemon.
    pub fn required_packages(&self) -> &'static [&'static str] {
        match self {
            PackageManager::Apt => &["certbot", "cron", "ca-certificates"],
            PackageManager::Dnf | PackageManager::Yum => &["certbot", "cronie", "ca-certificates"],
        }
    }

    /// Argument lists to run, in order, against [`PackageManager::program`].
    pub fn commands(&self) -> Vec<Vec<&'static str>> {
        let mut install = match self {
            PackageManager::Apt => vec!["install", "-y"],
            PackageManager::Dnf | PackageManager::Yum => vec!["-y", "install"],
        };
        install.extend_from_slice(self.required_packages());

        match self {
            PackageManager::Apt => vec![vec!["update"], install],
            PackageManager::Dnf | PackageManager::Yum => vec![install],
        }
    }
}

pub fn detect(host: &dyn Host) -> Option<PackageManager> {
    [PackageManager::Apt, PackageManager::Dnf, PackageManager::Yum]
        .into_iter()
        .find(|pm| host.has_tool(pm.program()))
}

/// Refresh package metadata and install the required packages.
pub fn update(host: &dyn Host) -> Result<PackageManager> {
    let pm = detect(host).ok_or(ProvisionError::PackageManagerNotFound)?;
    for args in pm.commands() {
        run_checked(host, pm.program(), &args)?;
    }
    tracing::info!(manager = pm.program(), "packages updated");
    Ok(pm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apt_updates_before_install() {
        let cmds = PackageManager::Apt.commands();
        assert_eq!(cmds[0], vec!["update"]);
        assert_eq!(cmds[1][..2], ["install", "-y"]);
        assert!(cmds[1].contains(&"certbot"));
        assert!(cmds[1].contains(&"cron"));
    }

    #[test]
    fn dnf_installs_cronie_in_one_command() {
        let cmds = PackageManager::Dnf.commands();
        assert_eq!(cmds.len(), 1);
        assert!(cmds[0].contains(&"cronie"));
    }
}

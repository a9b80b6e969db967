//! The standard provisioning steps.

use super::{CertificatePaths, ProvisionContext, Stage, Step, Summary};
use crate::arch::Arch;
use crate::credential::Credential;
use crate::cron::{self, CronEntry};
use crate::error::{ProvisionError, Result};
use crate::host::{run_checked, Host};
use crate::server_config::{ServerConfig, LISTEN_PORT};
use crate::settings::Settings;
use crate::unit::ServiceUnit;
use crate::{firewall, io, packages, paths, release};

pub const CHECK_PRECONDITIONS: &str = "check-preconditions";
pub const UPDATE_PACKAGES: &str = "update-packages";
pub const INSTALL_BINARY: &str = "install-binary";
pub const ISSUE_CERTIFICATE: &str = "issue-certificate";
pub const WRITE_CONFIG: &str = "write-config";
pub const REGISTER_SERVICE: &str = "register-service";
pub const CONFIGURE_FIREWALL: &str = "configure-firewall";
pub const START_SERVICE: &str = "start-service";
pub const REPORT: &str = "report";

pub fn standard_steps() -> Vec<Step> {
    vec![
        Step::new(CHECK_PRECONDITIONS, Stage::PrivilegeChecked, check_preconditions),
        Step::new(UPDATE_PACKAGES, Stage::PackagesUpdated, update_packages),
        Step::new(INSTALL_BINARY, Stage::BinaryInstalled, install_binary),
        Step::new(ISSUE_CERTIFICATE, Stage::CertificateIssued, issue_certificate),
        Step::new(WRITE_CONFIG, Stage::ConfigWritten, write_config),
        Step::new(REGISTER_SERVICE, Stage::ServiceRegistered, register_service),
        Step::new(CONFIGURE_FIREWALL, Stage::FirewallConfigured, configure_firewall),
        Step::new(START_SERVICE, Stage::ServiceRunning, start_service),
        Step::new(REPORT, Stage::Reported, report),
    ]
}

/// Trim operator input and reject an empty domain.
pub fn validate_domain(input: &str) -> Result<String> {
    let domain = input.trim();
    if domain.is_empty() {
        return Err(ProvisionError::EmptyInput("domain"));
    }
    Ok(domain.to_string())
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// Root check first, then architecture, so an unsupported host fails before
/// any package or network activity.
fn check_preconditions(ctx: &mut ProvisionContext, host: &dyn Host) -> Result<()> {
    if !host.is_root() {
        return Err(ProvisionError::Privilege);
    }
    let machine = host.machine_arch()?;
    let arch = Arch::from_machine(&machine)?;
    tracing::info!(machine = %machine.trim(), asset = arch.asset_name(), "host architecture");
    ctx.arch = Some(arch);
    Ok(())
}

fn update_packages(ctx: &mut ProvisionContext, host: &dyn Host) -> Result<()> {
    ctx.package_manager = Some(packages::update(host)?);
    Ok(())
}

fn install_binary(ctx: &mut ProvisionContext, host: &dyn Host) -> Result<()> {
    let arch = ctx
        .arch
        .ok_or_else(|| ProvisionError::UnsupportedArchitecture("undetected".into()))?;
    release::install_release(
        host,
        &ctx.settings.version,
        arch,
        &ctx.settings.install_path,
    )?;
    Ok(())
}

fn issue_certificate(ctx: &mut ProvisionContext, host: &dyn Host) -> Result<()> {
    let raw = match ctx.domain.take() {
        Some(d) => d,
        None => host.prompt("Enter the domain name pointing at this server: ")?,
    };
    let domain = validate_domain(&raw)?;
    ctx.domain = Some(domain.clone());

    let mut args = vec![
        "certonly",
        "--standalone",
        "--non-interactive",
        "--agree-tos",
        "-d",
        domain.as_str(),
    ];
    match ctx.email.as_deref() {
        Some(email) if !email.trim().is_empty() => args.extend(["-m", email.trim()]),
        _ => args.push("--register-unsafely-without-email"),
    }

    tracing::info!(%domain, "requesting certificate (standalone challenge)");
    let output = host.run("certbot", &args, None).map_err(|e| match e {
        ProvisionError::ToolNotFound(tool) => {
            ProvisionError::CertificateIssuance(format!("{tool} is not installed"))
        }
        other => other,
    })?;
    if !output.success() {
        return Err(ProvisionError::CertificateIssuance(output.diagnostic()));
    }

    let cert = CertificatePaths {
        fullchain: paths::fullchain_path(&ctx.settings.letsencrypt_dir, &domain),
        privkey: paths::privkey_path(&ctx.settings.letsencrypt_dir, &domain),
    };
    for file in [&cert.fullchain, &cert.privkey] {
        if !file.exists() {
            return Err(ProvisionError::CertificateIssuance(format!(
                "certbot succeeded but {} is missing",
                file.display()
            )));
        }
    }
    ctx.certificate = Some(cert);

    schedule_renewal(&ctx.settings, host)
}

/// Merge the renewal job into root's crontab, once.
fn schedule_renewal(settings: &Settings, host: &dyn Host) -> Result<()> {
    let entry = CronEntry::certificate_renewal(&settings.renew_schedule, &settings.service_name)?;

    let listing = host.run("crontab", &["-l"], None)?;
    let existing = if listing.success() {
        listing.stdout
    } else if listing.stderr.contains("no crontab") {
        String::new()
    } else {
        return Err(ProvisionError::CommandFailed {
            command: "crontab -l".into(),
            status: listing.status_label(),
            stderr: listing.diagnostic(),
        });
    };

    match cron::merge_crontab(&existing, &entry) {
        Some(merged) => {
            let out = host.run("crontab", &["-"], Some(&merged))?;
            if !out.success() {
                return Err(ProvisionError::CommandFailed {
                    command: "crontab -".into(),
                    status: out.status_label(),
                    stderr: out.diagnostic(),
                });
            }
            tracing::info!(entry = %entry, "renewal job scheduled");
        }
        None => tracing::info!("renewal job already scheduled"),
    }
    Ok(())
}

fn write_config(ctx: &mut ProvisionContext, _host: &dyn Host) -> Result<()> {
    let domain = ctx.require_domain()?.to_string();
    let cert = ctx
        .certificate
        .clone()
        .ok_or_else(|| ProvisionError::CertificateIssuance("no certificate issued".into()))?;

    let credential = Credential::generate();
    let config = ServerConfig::anytls(
        &ctx.settings,
        &domain,
        &credential,
        cert.fullchain,
        cert.privkey,
    );

    io::ensure_dir(&ctx.settings.config_dir)?;
    let path = ctx.settings.config_path();
    io::atomic_write_mode(&path, config.to_json()?.as_bytes(), 0o600)?;
    tracing::info!(path = %path.display(), "config written");

    ctx.credential = Some(credential);
    Ok(())
}

fn register_service(ctx: &mut ProvisionContext, host: &dyn Host) -> Result<()> {
    let unit = ServiceUnit::for_settings(&ctx.settings);
    let path = ctx.settings.unit_path();
    io::atomic_write_mode(&path, unit.render().as_bytes(), 0o644)?;
    tracing::info!(path = %path.display(), "unit written");

    run_checked(host, "systemctl", &["daemon-reload"])?;
    run_checked(host, "systemctl", &["enable", &ctx.settings.service_name])?;
    Ok(())
}

fn configure_firewall(ctx: &mut ProvisionContext, host: &dyn Host) -> Result<()> {
    ctx.firewall = firewall::configure(host, &ctx.settings.open_ports)?;
    if ctx.firewall.is_none() {
        ctx.warnings.push(format!(
            "no firewall tool found (ufw or iptables); make sure ports {:?} are reachable",
            ctx.settings.open_ports
        ));
    }
    Ok(())
}

fn start_service(ctx: &mut ProvisionContext, host: &dyn Host) -> Result<()> {
    let service = ctx.settings.service_name.as_str();
    let hint = ctx.settings.log_command();

    let restart = host.run("systemctl", &["restart", service], None)?;
    if !restart.success() {
        return Err(ProvisionError::ServiceStart {
            status: restart.diagnostic(),
            hint,
        });
    }

    // `is-active` exits non-zero for anything but "active"; the word is what counts.
    let probe = host.run("systemctl", &["is-active", service], None)?;
    let status = probe.stdout.trim().to_string();
    tracing::info!(service, %status, "service state");
    if status != "active" {
        return Err(ProvisionError::ServiceStart {
            status: if status.is_empty() {
                "unknown".into()
            } else {
                status
            },
            hint,
        });
    }
    ctx.service_status = Some(status);
    Ok(())
}

fn report(ctx: &mut ProvisionContext, _host: &dyn Host) -> Result<()> {
    let domain = ctx.require_domain()?.to_string();
    let password = ctx
        .credential
        .as_ref()
        .map(|c| c.expose().to_string())
        .ok_or_else(|| ProvisionError::StepOrder("credential was never generated".into()))?;
    let service_status = ctx
        .service_status
        .clone()
        .ok_or_else(|| ProvisionError::StepOrder("service state was never probed".into()))?;

    ctx.summary = Some(Summary {
        service: ctx.settings.service_name.clone(),
        service_status,
        domain,
        port: LISTEN_PORT,
        user: ctx.settings.user_name.clone(),
        password,
        config_path: ctx.settings.config_path(),
        unit_path: ctx.settings.unit_path(),
        firewall: ctx.firewall,
        log_command: ctx.settings.log_command(),
    });
    Ok(())
}

// ---------------------------------------------------------------------------
// Preview
// ---------------------------------------------------------------------------

/// The artifacts a run would write, computed without touching the host.
#[derive(Debug)]
pub struct RenderedArtifacts {
    pub config_json: String,
    pub unit: String,
    pub renewal_cron: String,
    pub credential: Credential,
}

pub fn render_artifacts(settings: &Settings, domain: &str) -> Result<RenderedArtifacts> {
    let domain = validate_domain(domain)?;
    let credential = Credential::generate();
    let config = ServerConfig::anytls(
        settings,
        &domain,
        &credential,
        paths::fullchain_path(&settings.letsencrypt_dir, &domain),
        paths::privkey_path(&settings.letsencrypt_dir, &domain),
    );
    let renewal =
        CronEntry::certificate_renewal(&settings.renew_schedule, &settings.service_name)?;
    Ok(RenderedArtifacts {
        config_json: config.to_json()?,
        unit: ServiceUnit::for_settings(settings).render(),
        renewal_cron: renewal.to_string(),
        credential,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_domain_trims_whitespace() {
        assert_eq!(validate_domain("  example.com\n").unwrap(), "example.com");
    }

    #[test]
    fn validate_domain_rejects_blank() {
        for input in ["", "   ", "\n"] {
            assert!(matches!(
                validate_domain(input),
                Err(ProvisionError::EmptyInput("domain"))
            ));
        }
    }

    #[test]
    fn standard_steps_follow_the_state_machine() {
        let mut stage = Stage::NotStarted;
        for step in standard_steps() {
            assert_eq!(stage.successor(), Some(step.reaches.clone()), "{}", step.name);
            stage = step.reaches;
        }
        assert_eq!(stage, Stage::Reported);
    }

    #[test]
    fn render_artifacts_embeds_domain_and_credential() {
        let rendered = render_artifacts(&Settings::default(), "example.com").unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered.config_json).unwrap();
        assert_eq!(value["inbounds"][0]["tls"]["server_name"], "example.com");
        assert_eq!(
            value["inbounds"][0]["users"][0]["password"],
            rendered.credential.expose()
        );
        assert_eq!(
            value["inbounds"][0]["tls"]["certificate_path"],
            "/etc/letsencrypt/live/example.com/fullchain.pem"
        );
        assert!(rendered.unit.contains("ExecStart=/usr/local/bin/sing-box run -c /etc/sing-box/config.json"));
        assert!(rendered.renewal_cron.starts_with("0 3 * * * certbot renew"));
    }

    #[test]
    fn render_artifacts_rejects_empty_domain() {
        assert!(render_artifacts(&Settings::default(), " ").is_err());
    }
}

//! Fail-fast provisioning orchestrator.
//!
//! A run is an ordered list of [`Step`]s. Each step receives the shared
//! [`ProvisionContext`] and the [`Host`], and on success advances the run to
//! the step's [`Stage`]. The first failure moves the run to
//! [`Stage::Failed`] and nothing after it executes. There is no rollback and
//! no resume.

pub mod steps;


use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::arch::Arch;
use crate::credential::Credential;
use crate::error::{ProvisionError, Result};
use crate::firewall::FirewallTool;
use crate::host::Host;
use crate::packages::PackageManager;
use crate::settings::Settings;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// Progress of a run.
///
/// Transitions: `NotStarted → PrivilegeChecked → PackagesUpdated →
/// BinaryInstalled → CertificateIssued → ConfigWritten → ServiceRegistered →
/// FirewallConfigured → ServiceRunning → Reported`, or from any of them to the
/// terminal `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum Stage {
    NotStarted,
    PrivilegeChecked,
    PackagesUpdated,
    BinaryInstalled,
    CertificateIssued,
    ConfigWritten,
    ServiceRegistered,
    FirewallConfigured,
    ServiceRunning,
    Reported,
    Failed { step: String, detail: String },
}

impl Stage {
    /// The stage a successful next step leads to. None for terminal stages.
    pub fn successor(&self) -> Option<Stage> {
        let next = match self {
            Stage::NotStarted => Stage::PrivilegeChecked,
            Stage::PrivilegeChecked => Stage::PackagesUpdated,
            Stage::PackagesUpdated => Stage::BinaryInstalled,
            Stage::BinaryInstalled => Stage::CertificateIssued,
            Stage::CertificateIssued => Stage::ConfigWritten,
            Stage::ConfigWritten => Stage::ServiceRegistered,
            Stage::ServiceRegistered => Stage::FirewallConfigured,
            Stage::FirewallConfigured => Stage::ServiceRunning,
            Stage::ServiceRunning => Stage::Reported,
            Stage::Reported | Stage::Failed { .. } => return None,
        };
        Some(next)
    }

    pub fn is_terminal(&self) -> bool {
        self.successor().is_none()
    }
}

// ---------------------------------------------------------------------------
// ProvisionContext
// ---------------------------------------------------------------------------

/// Everything a run learns or produces, threaded through every step.
#[derive(Debug)]
pub struct ProvisionContext {
    pub settings: Settings,
    /// Preset domain; when None the certificate step prompts for one.
    pub domain: Option<String>,
    pub email: Option<String>,
    pub stage: Stage,
    pub arch: Option<Arch>,
    pub package_manager: Option<PackageManager>,
    pub certificate: Option<CertificatePaths>,
    pub credential: Option<Credential>,
    pub firewall: Option<FirewallTool>,
    /// State word `systemctl is-active` printed after the restart.
    pub service_status: Option<String>,
    pub summary: Option<Summary>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificatePaths {
    pub fullchain: PathBuf,
    pub privkey: PathBuf,
}

impl ProvisionContext {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            domain: None,
            email: None,
            stage: Stage::NotStarted,
            arch: None,
            package_manager: None,
            certificate: None,
            credential: None,
            firewall: None,
            service_status: None,
            summary: None,
            warnings: Vec::new(),
        }
    }

    pub fn with_domain(mut self, domain: Option<String>) -> Self {
        self.domain = domain;
        self
    }

    pub fn with_email(mut self, email: Option<String>) -> Self {
        self.email = email;
        self
    }

    /// The validated domain. Only available once the certificate step ran.
    pub(crate) fn require_domain(&self) -> Result<&str> {
        self.domain
            .as_deref()
            .filter(|d| !d.is_empty())
            .ok_or(ProvisionError::EmptyInput("domain"))
    }
}

// ---------------------------------------------------------------------------
// Summary / report
// ---------------------------------------------------------------------------

/// What the operator needs after a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub service: String,
    pub service_status: String,
    pub domain: String,
    pub port: u16,
    pub user: String,
    /// Plaintext credential, meant to be copied by the operator.
    pub password: String,
    pub config_path: PathBuf,
    pub unit_path: PathBuf,
    pub firewall: Option<FirewallTool>,
    pub log_command: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub name: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stage: Stage,
    pub outcomes: Vec<StepOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,
    pub warnings: Vec<String>,
    /// The error that halted the run, if any.
    #[serde(skip)]
    pub error: Option<ProvisionError>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.stage == Stage::Reported
    }

    pub fn exit_code(&self) -> i32 {
        if self.succeeded() {
            0
        } else {
            1
        }
    }

    /// Name of the step that halted the run.
    pub fn failed_step(&self) -> Option<&str> {
        match &self.stage {
            Stage::Failed { step, .. } => Some(step),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Step / Orchestrator
// ---------------------------------------------------------------------------

pub type StepFn = fn(&mut ProvisionContext, &dyn Host) -> Result<()>;

/// A named unit of work and the stage it reaches on success.
#[derive(Clone)]
pub struct Step {
    pub name: &'static str,
    pub reaches: Stage,
    pub action: StepFn,
}

impl Step {
    pub fn new(name: &'static str, reaches: Stage, action: StepFn) -> Self {
        Self {
            name,
            reaches,
            action,
        }
    }
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("reaches", &self.reaches)
            .finish()
    }
}

pub struct Orchestrator {
    steps: Vec<Step>,
}

impl Orchestrator {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    /// The full provisioning sequence, in state-machine order.
    pub fn standard() -> Self {
        Self::new(steps::standard_steps())
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name).collect()
    }

    /// Execute every step in order, halting at the first failure.
    pub fn run(&self, ctx: &mut ProvisionContext, host: &dyn Host) -> RunReport {
        let started_at = Utc::now();
        let mut outcomes = Vec::with_capacity(self.steps.len());
        let mut error = None;

        tracing::info!(steps = self.steps.len(), "starting provisioning run");

        for step in &self.steps {
            if ctx.stage.successor().as_ref() != Some(&step.reaches) {
                let detail = format!(
                    "step '{}' cannot run from stage {:?}",
                    step.name, ctx.stage
                );
                ctx.stage = Stage::Failed {
                    step: step.name.to_string(),
                    detail: detail.clone(),
                };
                error = Some(ProvisionError::StepOrder(detail));
                break;
            }

            tracing::info!(step = step.name, "step started");
            let start = Instant::now();
            let result = (step.action)(ctx, host);
            let duration_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(()) => {
                    tracing::info!(step = step.name, duration_ms, "step completed");
                    ctx.stage = step.reaches.clone();
                    outcomes.push(StepOutcome {
                        name: step.name.to_string(),
                        success: true,
                        error: None,
                        duration_ms,
                    });
                }
                Err(e) => {
                    let detail = e.to_string();
                    tracing::error!(step = step.name, error = %detail, "step failed");
                    ctx.stage = Stage::Failed {
                        step: step.name.to_string(),
                        detail: detail.clone(),
                    };
                    outcomes.push(StepOutcome {
                        name: step.name.to_string(),
                        success: false,
                        error: Some(detail),
                        duration_ms,
                    });
                    error = Some(e);
                    break;
                }
            }
        }

        tracing::info!(stage = ?ctx.stage, "provisioning run finished");

        RunReport {
            started_at,
            finished_at: Utc::now(),
            stage: ctx.stage.clone(),
            outcomes,
            summary: ctx.summary.clone(),
            warnings: ctx.warnings.clone(),
            error,
        }
    }
}

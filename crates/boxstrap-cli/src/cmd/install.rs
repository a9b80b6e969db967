use anyhow::Context;
use boxstrap_core::{Orchestrator, ProvisionContext, Settings, SystemHost};
use std::path::Path;

use crate::output::{print_json, print_outcomes, print_summary, print_warnings};

/// `boxstrap` / `boxstrap install`: provision this host end to end.
///
/// Any failed step ends the run with exit code 1; steps that already
/// completed are left in place.
pub fn run(
    settings_path: Option<&Path>,
    domain: Option<String>,
    email: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let settings = Settings::load(settings_path).context("failed to load settings")?;

    let mut ctx = ProvisionContext::new(settings)
        .with_domain(domain)
        .with_email(email);
    let host = SystemHost::new();
    let mut report = Orchestrator::standard().run(&mut ctx, &host);

    if json {
        print_json(&report)?;
    } else {
        print_outcomes(&report.outcomes);
        print_warnings(&report.warnings);
        if let Some(summary) = &report.summary {
            print_summary(summary);
        }
    }

    match report.error.take() {
        None => Ok(()),
        Some(err) => {
            let step = report.failed_step().unwrap_or("unknown").to_string();
            Err(anyhow::Error::new(err).context(format!("step '{step}' failed")))
        }
    }
}

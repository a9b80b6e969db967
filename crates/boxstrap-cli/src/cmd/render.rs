use anyhow::Context;
use boxstrap_core::{orchestrator::steps, Settings};
use std::path::Path;

use crate::output::print_json;

pub fn run(settings_path: Option<&Path>, domain: &str, json: bool) -> anyhow::Result<()> {
    let settings = Settings::load(settings_path).context("failed to load settings")?;
    let rendered = steps::render_artifacts(&settings, domain)?;

    if json {
        let config: serde_json::Value = serde_json::from_str(&rendered.config_json)?;
        return print_json(&serde_json::json!({
            "config_path": settings.config_path(),
            "config": config,
            "unit_path": settings.unit_path(),
            "unit": rendered.unit,
            "renewal_cron": rendered.renewal_cron,
        }));
    }

    println!("# {}", settings.config_path().display());
    print!("{}", rendered.config_json);
    println!();
    println!("# {}", settings.unit_path().display());
    print!("{}", rendered.unit);
    println!();
    println!("# crontab (root)");
    println!("{}", rendered.renewal_cron);
    Ok(())
}

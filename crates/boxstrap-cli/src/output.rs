use boxstrap_core::orchestrator::{StepOutcome, Summary};
use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.len());
        }
    }

    let render = |cells: Vec<String>| -> String {
        cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let w = widths.get(i).copied().unwrap_or(0);
                format!("{:width$}", cell, width = w)
            })
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    println!("{}", render(headers.iter().map(|h| h.to_string()).collect()));
    println!("{}", render(widths.iter().map(|&w| "-".repeat(w)).collect()));
    for row in rows {
        println!("{}", render(row));
    }
}

pub fn print_outcomes(outcomes: &[StepOutcome]) {
    if outcomes.is_empty() {
        return;
    }
    let rows = outcomes
        .iter()
        .map(|o| {
            vec![
                o.name.clone(),
                if o.success { "ok" } else { "FAILED" }.to_string(),
                format!("{}ms", o.duration_ms),
            ]
        })
        .collect();
    print_table(&["STEP", "RESULT", "TIME"], rows);
}

pub fn print_warnings(warnings: &[String]) {
    for w in warnings {
        eprintln!("warning: {w}");
    }
}

pub fn print_summary(summary: &Summary) {
    let firewall = summary
        .firewall
        .map(|f| f.name().to_string())
        .unwrap_or_else(|| "not configured".to_string());

    println!();
    println!("{} is {}", summary.service, summary.service_status);
    println!();
    println!("  Domain:    {}", summary.domain);
    println!("  Port:      {}", summary.port);
    println!("  User:      {}", summary.user);
    println!("  Password:  {}", summary.password);
    println!("  Config:    {}", summary.config_path.display());
    println!("  Unit:      {}", summary.unit_path.display());
    println!("  Firewall:  {firewall}");
    println!();
    println!("Logs: {}", summary.log_command);
}

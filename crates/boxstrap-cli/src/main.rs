mod cmd;
mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "boxstrap",
    about = "Provision a sing-box AnyTLS server on a fresh Linux host",
    version,
    propagate_version = true
)]
struct Cli {
    /// Domain pointing at this host (prompted for when omitted)
    #[arg(long, env = "BOXSTRAP_DOMAIN")]
    domain: Option<String>,

    /// Contact address for the ACME account
    #[arg(long, env = "BOXSTRAP_EMAIL")]
    email: Option<String>,

    /// YAML file overriding the pinned version and install paths
    #[arg(long, global = true, env = "BOXSTRAP_SETTINGS")]
    settings: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Log at debug level
    #[arg(long, global = true, short = 'v')]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every provisioning step (the default when no command is given)
    Install,

    /// Print the config, unit, and cron entry a run would write, without touching the host
    Render {
        /// Domain to embed in the TLS block
        #[arg(long)]
        domain: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let settings_path = cli.settings.as_deref();

    let result = match cli.command {
        None | Some(Commands::Install) => cmd::install::run(
            settings_path,
            cli.domain,
            cli.email,
            cli.json,
        ),
        Some(Commands::Render { domain }) => cmd::render::run(settings_path, &domain, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_invocation_installs() {
        let cli = Cli::try_parse_from(["boxstrap"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.json);
    }

    #[test]
    fn domain_flag_is_parsed() {
        let cli = Cli::try_parse_from(["boxstrap", "--domain", "example.com"]).unwrap();
        assert_eq!(cli.domain.as_deref(), Some("example.com"));
    }

    #[test]
    fn render_requires_domain() {
        assert!(Cli::try_parse_from(["boxstrap", "render"]).is_err());
        let cli = Cli::try_parse_from(["boxstrap", "render", "--domain", "a.example"]).unwrap();
        match cli.command {
            Some(Commands::Render { domain }) => assert_eq!(domain, "a.example"),
            _ => panic!("expected render"),
        }
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let cli = Cli::try_parse_from(["boxstrap", "render", "--domain", "x", "-j", "-v"]).unwrap();
        assert!(cli.json);
        assert!(cli.verbose);
    }
}

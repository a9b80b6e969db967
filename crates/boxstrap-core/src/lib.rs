pub mod arch;
pub mod credential;
pub mod cron;
pub mod error;
pub mod firewall;
pub mod host;
pub mod io;
pub mod orchestrator;
pub mod packages;
pub mod paths;
pub mod release;
pub mod server_config;
pub mod settings;
pub mod unit;

pub use error::{ProvisionError, Result};
pub use host::{Host, SystemHost};
pub use orchestrator::{Orchestrator, ProvisionContext, RunReport, Stage};
pub use settings::Settings;

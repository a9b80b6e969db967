use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("root privileges required: re-run with sudo or as root")]
    Privilege,

    #[error("unsupported architecture: {0}")]
    UnsupportedArchitecture(String),

    #[error("download failed for {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("{0} cannot be empty")]
    EmptyInput(&'static str),

    #[error("certificate issuance failed: {0}")]
    CertificateIssuance(String),

    #[error("service did not reach the active state (status: {status}); inspect logs with: {hint}")]
    ServiceStart { status: String, hint: String },

    #[error("no supported package manager found (tried apt-get, dnf, yum)")]
    PackageManagerNotFound,

    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("required tool not found on PATH: {0}")]
    ToolNotFound(String),

    #[error("invalid step order: {0}")]
    StepOrder(String),

    #[error("invalid settings: {0}")]
    Settings(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, ProvisionError>;

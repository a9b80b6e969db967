//! Typed model of the sing-box configuration document.
//!
//! Only the fields the fixed AnyTLS profile needs are modelled. Values the
//! operator supplies (domain, credential, certificate paths) flow in through
//! [`ServerConfig::anytls`] and are escaped by `serde_json` on the way out.

use crate::credential::Credential;
use crate::settings::Settings;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Port the AnyTLS listener binds. Part of the fixed profile.
pub const LISTEN_PORT: u16 = 443;

pub const INBOUND_TAG: &str = "anytls-in";
pub const DIRECT_TAG: &str = "direct";
pub const BLOCK_TAG: &str = "block";
pub const DNS_OUT_TAG: &str = "dns-out";

/// Default AnyTLS padding scheme: a stop marker followed by per-packet
/// size ranges (`c` is a check mark between segments).
pub const PADDING_SCHEME: &[&str] = &[
    "stop=8",
    "0=30-30",
    "1=100-400",
    "2=400-500,c,500-1000,c,500-1000,c,500-1000,c,500-1000",
    "3=9-9,500-1000",
    "4=500-1000",
    "5=500-1000",
    "6=500-1000",
    "7=500-1000",
];

// ---------------------------------------------------------------------------
// Document model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub log: LogOptions,
    pub dns: DnsOptions,
    pub inbounds: Vec<Inbound>,
    pub outbounds: Vec<Outbound>,
    pub route: RouteOptions,
    pub experimental: Experimental,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogOptions {
    pub disabled: bool,
    pub level: String,
    pub timestamp: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DnsOptions {
    pub servers: Vec<DnsServer>,
    #[serde(rename = "final")]
    pub final_server: String,
    pub strategy: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DnsServer {
    pub tag: String,
    pub address: String,
    pub detour: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inbound {
    #[serde(rename = "type")]
    pub kind: String,
    pub tag: String,
    pub listen: String,
    pub listen_port: u16,
    pub users: Vec<InboundUser>,
    pub padding_scheme: Vec<String>,
    pub tls: InboundTls,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundUser {
    pub name: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundTls {
    pub enabled: bool,
    pub server_name: String,
    pub certificate_path: PathBuf,
    pub key_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outbound {
    #[serde(rename = "type")]
    pub kind: String,
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteOptions {
    pub rules: Vec<RouteRule>,
    #[serde(rename = "final")]
    pub final_outbound: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inbound: Vec<String>,
    pub outbound: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experimental {
    pub cache_file: CacheFile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheFile {
    pub enabled: bool,
    pub path: PathBuf,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

impl ServerConfig {
    /// The single supported profile: one AnyTLS listener on [`LISTEN_PORT`].
    pub fn anytls(
        settings: &Settings,
        domain: &str,
        credential: &Credential,
        certificate_path: PathBuf,
        key_path: PathBuf,
    ) -> Self {
        Self {
            log: LogOptions {
                disabled: false,
                level: "info".to_string(),
                timestamp: true,
            },
            dns: DnsOptions {
                servers: vec![
                    dns_server("google", "tls://8.8.8.8"),
                    dns_server("cloudflare", "https://1.1.1.1/dns-query"),
                ],
                final_server: "google".to_string(),
                strategy: "prefer_ipv4".to_string(),
            },
            inbounds: vec![Inbound {
                kind: "anytls".to_string(),
                tag: INBOUND_TAG.to_string(),
                listen: "::".to_string(),
                listen_port: LISTEN_PORT,
                users: vec![InboundUser {
                    name: settings.user_name.clone(),
                    password: credential.expose().to_string(),
                }],
                padding_scheme: PADDING_SCHEME.iter().map(|s| s.to_string()).collect(),
                tls: InboundTls {
                    enabled: true,
                    server_name: domain.to_string(),
                    certificate_path,
                    key_path,
                },
            }],
            outbounds: vec![
                outbound("direct", DIRECT_TAG),
                outbound("block", BLOCK_TAG),
                outbound("dns", DNS_OUT_TAG),
            ],
            route: RouteOptions {
                rules: vec![
                    RouteRule {
                        protocol: Some("dns".to_string()),
                        inbound: Vec::new(),
                        outbound: DNS_OUT_TAG.to_string(),
                    },
                    RouteRule {
                        protocol: None,
                        inbound: vec![INBOUND_TAG.to_string()],
                        outbound: DIRECT_TAG.to_string(),
                    },
                ],
                final_outbound: DIRECT_TAG.to_string(),
            },
            experimental: Experimental {
                cache_file: CacheFile {
                    enabled: true,
                    path: settings.cache_path(),
                },
            },
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }
}

fn dns_server(tag: &str, address: &str) -> DnsServer {
    DnsServer {
        tag: tag.to_string(),
        address: address.to_string(),
        detour: DIRECT_TAG.to_string(),
    }
}

fn outbound(kind: &str, tag: &str) -> Outbound {
    Outbound {
        kind: kind.to_string(),
        tag: tag.to_string(),
    }
}

//! Server configuration, assembled from CLI flags and environment.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::net::{IpAddr, SocketAddr};
use url::Url;

use authproxy_core::BrokerConfig;

use crate::cli::ServeArgs;

#[derive(Debug, Clone, Serialize)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub port: u16,
    /// Route prefix without a trailing slash, e.g. `/authproxy`. Empty means root.
    pub prefix: String,
    /// Base URL for completion callbacks; `None` derives it from the Host header.
    pub public_url: Option<String>,
    pub broker: BrokerConfig,
}

#[cfg(test)]
impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::from([0, 0, 0, 0]),
            port: 8426,
            prefix: "/authproxy".to_string(),
            public_url: None,
            broker: BrokerConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_args(args: &ServeArgs) -> Result<Self> {
        let prefix = normalize_prefix(&args.prefix)?;

        let public_url = match &args.public_url {
            Some(raw) => {
                let url = Url::parse(raw).with_context(|| format!("Invalid public URL '{raw}'"))?;
                if !matches!(url.scheme(), "http" | "https") {
                    bail!("Public URL must be http or https, got '{}'", url.scheme());
                }
                Some(url.as_str().trim_end_matches('/').to_string())
            }
            None => None,
        };

        let broker = BrokerConfig {
            long_poll_timeout_secs: args.long_poll_timeout,
            session_ttl_secs: args.session_ttl,
            sweep_interval_secs: args.sweep_interval,
            unknown_session_policy: args.unknown_session,
            ..BrokerConfig::default()
        };
        broker.validate()?;

        Ok(Self { bind: args.bind, port: args.port, prefix, public_url, broker })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    /// Whether the id cookie should carry the `Secure` flag.
    pub fn secure_cookies(&self) -> bool {
        self.public_url.as_deref().is_some_and(|u| u.starts_with("https://"))
    }

    pub fn route(&self, path: &str) -> String {
        format!("{}{}", self.prefix, path)
    }
}

fn normalize_prefix(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    if !trimmed.starts_with('/') {
        bail!("Route prefix must start with '/', got '{raw}'");
    }
    Ok(trimmed.to_string())
}

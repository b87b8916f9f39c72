use serde_derive::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::detect::UpdateDelta;
use crate::http::{Client, Error};

use super::{Applied, DispatchOutcome, ProviderAdapter, ProviderError};

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Update endpoint without the scheme, e.g. "dyndns.example.com/nic/update".
    pub server: Box<str>,

    pub username: Box<str>,
    pub password: Box<str>,

    pub hosts: Vec<Host>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Host {
    pub hostname: Box<str>,

    /// Interface identifier appended to the delta's IPv6 prefix for this
    /// host. A host without one only ever gets IPv4 updates.
    #[serde(default)]
    pub ipv6_suffix: Option<Box<str>>,
}

/// The dyndns2-style query-string protocol: one GET per host, HTTP Basic
/// credentials, both families folded into a single comma-separated `myip`
/// parameter.
pub struct Service {
    label: Box<str>,
    config: Config,
    auth: Box<str>,
}

impl Service {
    pub fn new(label: Box<str>, config: Config) -> Self {
        let credentials = format!("{}:{}", config.username, config.password);
        let base64 = data_encoding::BASE64.encode(credentials.as_bytes());

        Self {
            label,
            config,
            auth: format!("Basic {}", base64).into(),
        }
    }
}

/// The `myip` value for one host, or `None` when neither family of the
/// delta applies to it. The IPv6 leg only exists when both the prefix
/// changed and the host has a configured suffix.
fn myip_for_host(delta: &UpdateDelta, host: &Host) -> Option<String> {
    let ipv6 = match (&delta.ipv6_prefix, &host.ipv6_suffix) {
        (Some(prefix), Some(suffix)) => Some(format!("{}:{}", prefix, suffix)),
        _ => None,
    };

    match (&delta.ipv4, ipv6) {
        (Some(ipv4), Some(ipv6)) => Some(format!("{},{}", ipv4, ipv6)),
        (Some(ipv4), None) => Some(ipv4.to_string()),
        (None, Some(ipv6)) => Some(ipv6),
        (None, None) => None,
    }
}

impl ProviderAdapter for Service {
    fn apply(&self, delta: &UpdateDelta, client: &Client) -> Vec<DispatchOutcome> {
        let mut outcomes = Vec::with_capacity(self.config.hosts.len());

        for host in &self.config.hosts {
            let Some(myip) = myip_for_host(delta, host) else {
                continue;
            };

            let url = format!("https://{}", self.config.server);
            let result = client
                .get(&url)
                .set("Authorization", &self.auth)
                .query("hostname", &host.hostname)
                .query("myip", &myip)
                .call();

            // Success is judged by the status code alone; the body is only
            // logged. A failing host must not abort its siblings.
            let result = match result {
                Ok(resp) => {
                    let body = resp.into_string().unwrap_or_default();
                    info!("{}: {}", host.hostname, body.trim());
                    Ok(Applied::Updated)
                }
                Err(Error::Status(code, resp)) => {
                    let body = resp.into_string().unwrap_or_default();
                    let body = Box::<str>::from(body.trim());
                    warn!(
                        "{} rejected the update for {}: HTTP {} - {}",
                        self.config.server, host.hostname, code, body
                    );
                    Err(ProviderError::Status(code, body))
                }
                Err(Error::Transport(tp)) => Err(ProviderError::Transport(tp)),
            };

            let target = format!("{}/{}", self.label, host.hostname);
            outcomes.push(DispatchOutcome::new(target, result));
        }

        if outcomes.is_empty() {
            outcomes.push(DispatchOutcome::new(
                self.label.clone(),
                Ok(Applied::Skipped),
            ));
        }

        outcomes
    }
}

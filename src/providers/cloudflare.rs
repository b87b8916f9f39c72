use serde_derive::{Deserialize, Serialize};
use tracing::warn;

use crate::detect::UpdateDelta;
use crate::http::{Client, Error, Response};

use super::{Applied, DispatchOutcome, ProviderAdapter, ProviderError};

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub zone_id: Box<str>,

    pub token: Box<str>,

    /// The DNS name both records answer for.
    pub record_name: Box<str>,

    #[serde(default)]
    pub record_id_ipv4: Option<Box<str>>,

    #[serde(default)]
    pub record_id_ipv6: Option<Box<str>>,

    #[serde(default = "default_ttl")]
    pub ttl: u32,

    #[serde(default)]
    pub proxied: bool,
}

fn default_ttl() -> u32 {
    3600
}

/// The token-authenticated REST protocol: one record-replace PUT per
/// changed-and-configured family, each leg individually failable.
pub struct Service {
    label: Box<str>,
    config: Config,
    auth: Box<str>,
}

impl Service {
    pub fn new(label: Box<str>, config: Config) -> Self {
        let auth = format!("Bearer {}", config.token);
        Self {
            label,
            config,
            auth: auth.into(),
        }
    }

    /// The (record type, record id, content) legs this instance has to
    /// issue for `delta`. A family only becomes a leg when the delta
    /// carries it and a record id is configured for it.
    fn legs<'a>(&'a self, delta: &'a UpdateDelta) -> Vec<(&'static str, &'a str, &'a str)> {
        let mut legs = Vec::with_capacity(2);

        if let (Some(ipv4), Some(record)) = (&delta.ipv4, &self.config.record_id_ipv4) {
            legs.push(("A", record.as_ref(), ipv4.as_ref()));
        }
        if let (Some(prefix), Some(record)) = (&delta.ipv6_prefix, &self.config.record_id_ipv6) {
            legs.push(("AAAA", record.as_ref(), prefix.as_ref()));
        }

        legs
    }

    fn record_payload(&self, kind: &str, content: &str) -> serde_json::Value {
        serde_json::json!({
            "content": content,
            "name": self.config.record_name.as_ref(),
            "proxied": self.config.proxied,
            "type": kind,
            "ttl": self.config.ttl,
        })
    }

    fn put_record(
        &self,
        client: &Client,
        kind: &str,
        record_id: &str,
        content: &str,
    ) -> Result<Applied, ProviderError> {
        let url = format!(
            "https://api.cloudflare.com/client/v4/zones/{}/dns_records/{}",
            self.config.zone_id, record_id
        );

        let response = client
            .put(&url)
            .set("Content-Type", "application/json")
            .set("Authorization", &self.auth)
            .send_json(self.record_payload(kind, content));

        match response {
            Ok(resp) => {
                let body: serde_json::Value = resp
                    .into_json()
                    .map_err(|e| ProviderError::Json(e.to_string().into()))?;

                // A sanity check.
                let success = body
                    .get("success")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                if !success {
                    return Err(ProviderError::Json(
                        "cloudflare returned success=false?".into(),
                    ));
                }

                Ok(Applied::Updated)
            }
            Err(Error::Status(code, resp)) => {
                let message = parse_error(resp);
                warn!(
                    "cloudflare rejected the {} record update: HTTP {} - {}",
                    kind, code, message
                );
                Err(ProviderError::Status(code, message))
            }
            Err(Error::Transport(tp)) => Err(ProviderError::Transport(tp)),
        }
    }
}

fn parse_error(response: Response) -> Box<str> {
    match response.into_json::<serde_json::Value>() {
        Ok(json) => json
            .get("errors")
            .and_then(|e| e.get(0))
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
            .unwrap_or("unexpected error message structure")
            .into(),
        Err(e) => format!("unable to parse response as JSON: {}", e).into(),
    }
}

impl ProviderAdapter for Service {
    fn apply(&self, delta: &UpdateDelta, client: &Client) -> Vec<DispatchOutcome> {
        let legs = self.legs(delta);

        if legs.is_empty() {
            return vec![DispatchOutcome::new(
                self.label.clone(),
                Ok(Applied::Skipped),
            )];
        }

        // The A and AAAA legs are independent calls; one failing must not
        // abort the other.
        legs.into_iter()
            .map(|(kind, record_id, content)| {
                let target = format!("{}/{}", self.label, kind);
                let result = self.put_record(client, kind, record_id, content);
                DispatchOutcome::new(target, result)
            })
            .collect()
    }
}

pub mod cloudflare;
pub mod dummy;
pub mod dyndns2;

use thiserror::Error;
use tracing::{info, warn};

use crate::config::ProviderBlock;
use crate::detect::UpdateDelta;
use crate::http::Client;

#[derive(Clone, Error, Debug, PartialEq, Eq)]
pub enum ProviderError {
    #[error("HTTP {0}: {1}")]
    Status(u16, Box<str>),

    #[error("HTTP transport error: {0}")]
    Transport(Box<str>),

    // used when a service says it succeeded, but the returned JSON is nonsense
    #[error("received erroneous JSON: {0}")]
    Json(Box<str>),

    #[error("unsupported provider \"{0}\"")]
    Unsupported(Box<str>),
}

/// What one attempted provider-side effect came to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applied {
    /// A wire call went out and the provider accepted it.
    Updated,

    /// Nothing in the delta intersected the instance's configured records,
    /// so no call was made.
    Skipped,
}

/// One per-instance (or per-host/per-record within an instance) result of
/// a dispatch cycle. Purely observational; never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// "tag[index]", optionally suffixed with the host or record type the
    /// outcome belongs to, e.g. "dyndns2[0]/home.example.com".
    pub target: Box<str>,
    pub result: Result<Applied, ProviderError>,
}

impl DispatchOutcome {
    fn new(target: impl Into<Box<str>>, result: Result<Applied, ProviderError>) -> Self {
        Self {
            target: target.into(),
            result,
        }
    }
}

/// A configured provider instance. Implementations absorb every network
/// and protocol error into the returned outcomes; nothing raises past this
/// boundary.
pub trait ProviderAdapter {
    fn apply(&self, delta: &UpdateDelta, client: &Client) -> Vec<DispatchOutcome>;
}

/// Stand-in for a protocol tag this build does not know. Each instance
/// reports one failure outcome so a typo in one provider block never
/// blocks updates through the correctly configured ones.
pub struct Unsupported {
    label: Box<str>,
    tag: Box<str>,
}

impl Unsupported {
    pub fn new(label: Box<str>, tag: &str) -> Self {
        Self {
            label,
            tag: tag.into(),
        }
    }
}

impl ProviderAdapter for Unsupported {
    fn apply(&self, _delta: &UpdateDelta, _client: &Client) -> Vec<DispatchOutcome> {
        vec![DispatchOutcome::new(
            self.label.clone(),
            Err(ProviderError::Unsupported(self.tag.clone())),
        )]
    }
}

/// Fans the delta out to every configured provider instance, in block
/// order then instance order, and collects all outcomes. Instances are
/// independent: one failing never prevents the next from being attempted.
/// An empty delta short-circuits to an empty outcome list without touching
/// any adapter.
pub fn dispatch(
    delta: &UpdateDelta,
    providers: &[ProviderBlock],
    client: &Client,
) -> Vec<DispatchOutcome> {
    if delta.is_empty() {
        return Vec::new();
    }

    let mut outcomes = Vec::new();

    for block in providers {
        for (index, instance) in block.instances.iter().enumerate() {
            let adapter = instance.to_boxed(&block.tag, index);
            for outcome in adapter.apply(delta, client) {
                match &outcome.result {
                    Ok(Applied::Updated) => info!("{}: updated", outcome.target),
                    Ok(Applied::Skipped) => info!("{}: nothing to update", outcome.target),
                    Err(e) => warn!("{}: {}", outcome.target, e),
                }
                outcomes.push(outcome);
            }
        }
    }

    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn client() -> Client {
        Client::new("dynup test", std::time::Duration::from_secs(1))
    }

    fn delta_v4() -> UpdateDelta {
        UpdateDelta {
            ipv4: Some("203.0.113.9".into()),
            ipv6_prefix: None,
        }
    }

    #[test]
    fn empty_delta_dispatches_nothing() {
        let config = Config::from_toml(
            r#"
            version = 1

            [[providers.dummy]]
            "#,
        )
        .unwrap();

        let outcomes = dispatch(&UpdateDelta::default(), &config.providers, &client());
        assert!(outcomes.is_empty());
    }

    #[test]
    fn unsupported_tag_fails_per_instance_without_blocking_siblings() {
        let config = Config::from_toml(
            r#"
            version = 1

            [[providers.carrier-pigeon]]
            loft = "roof"

            [[providers.carrier-pigeon]]
            loft = "barn"

            [[providers.dummy]]
            "#,
        )
        .unwrap();

        let outcomes = dispatch(&delta_v4(), &config.providers, &client());
        assert_eq!(outcomes.len(), 3);

        let unsupported = outcomes
            .iter()
            .filter(|o| {
                matches!(&o.result, Err(ProviderError::Unsupported(tag)) if &**tag == "carrier-pigeon")
            })
            .count();
        assert_eq!(unsupported, 2);

        let dummy = outcomes.iter().find(|o| o.target.starts_with("dummy")).unwrap();
        assert_eq!(dummy.result, Ok(Applied::Updated));
    }

    #[test]
    fn failing_instance_does_not_stop_siblings() {
        let config = Config::from_toml(
            r#"
            version = 1

            [[providers.dummy]]
            fail = true

            [[providers.dummy]]
            "#,
        )
        .unwrap();

        let outcomes = dispatch(&delta_v4(), &config.providers, &client());
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].result.is_err());
        assert_eq!(outcomes[1].result, Ok(Applied::Updated));
    }
}

use serde_derive::{Deserialize, Serialize};
use tracing::info;

use crate::detect::UpdateDelta;
use crate::http::Client;

use super::{Applied, DispatchOutcome, ProviderAdapter, ProviderError};

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Config {
    /// Report a simulated transport failure instead of succeeding.
    #[serde(default)]
    pub fail: bool,
}

/// Makes no network calls; logs what a real provider would have received.
/// Useful for dry-running a config and for exercising the dispatcher.
pub struct Service {
    label: Box<str>,
    config: Config,
}

impl Service {
    pub fn new(label: Box<str>, config: Config) -> Self {
        Self { label, config }
    }
}

impl ProviderAdapter for Service {
    fn apply(&self, delta: &UpdateDelta, _client: &Client) -> Vec<DispatchOutcome> {
        info!(
            "{}: would update ipv4={:?} ipv6_prefix={:?}",
            self.label, delta.ipv4, delta.ipv6_prefix
        );

        let result = if self.config.fail {
            Err(ProviderError::Transport("simulated failure".into()))
        } else {
            Ok(Applied::Updated)
        };

        vec![DispatchOutcome::new(self.label.clone(), result)]
    }
}

use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::detect::{detect, AddressSet};
use crate::http::Client;
use crate::lock::{LockError, RunLock};
use crate::probe::probe;
use crate::providers::dispatch;
use crate::state::{unix_now, StateStore};

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Lock(#[from] LockError),
}

/// Summary of one completed run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunReport {
    /// Addresses unchanged or absent; nothing dispatched, nothing saved.
    NoChange,

    /// Dispatch ran; how many outcomes succeeded and failed.
    Updated { succeeded: usize, failed: usize },
}

/// One orchestrated run: lock, probe, detect, dispatch, persist. The lock
/// guard's `Drop` releases the lock on every path out of here.
pub fn run(config: &Config) -> Result<RunReport, RunError> {
    let _lock = RunLock::acquire(
        Path::new(config.general.lock_file.as_ref()),
        Duration::from_millis(config.general.lock_timeout_ms),
    )?;

    let store = StateStore::new(config.general.cache_file.as_ref());
    let stored = store.load();

    let probe_timeout = Duration::from_secs(config.general.probe_timeout_secs);
    let current = AddressSet {
        ipv4: probe("ipv4", config.modules.ipv4.as_ref(), probe_timeout),
        ipv6_prefix: probe("ipv6", config.modules.ipv6.as_ref(), probe_timeout),
    };

    debug!(
        "cached: ipv4={:?} ipv6_prefix={:?}; probed: ipv4={:?} ipv6_prefix={:?}",
        stored.ipv4, stored.ipv6_prefix, current.ipv4, current.ipv6_prefix
    );

    let delta = detect(&current, &stored);
    if delta.is_empty() {
        debug!("addresses are unchanged or absent, nothing to do");
        return Ok(RunReport::NoChange);
    }

    info!(
        "addresses changed (ipv4={:?} ipv6_prefix={:?}), updating providers",
        delta.ipv4, delta.ipv6_prefix
    );

    let client = Client::new(
        &config.general.user_agent,
        Duration::from_secs(config.general.call_timeout_secs),
    );
    let outcomes = dispatch(&delta, &config.providers, &client);

    if outcomes.is_empty() {
        // No instance was invoked at all, so the change was not applied
        // anywhere; leave the cache alone so a later run retries it.
        warn!("no providers are configured, leaving the cache untouched");
        return Ok(RunReport::Updated {
            succeeded: 0,
            failed: 0,
        });
    }

    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    let succeeded = outcomes.len() - failed;

    // The address itself did change, so the new state is committed even
    // when some providers failed; those will only be retried on the next
    // genuine change. Accepted trade-off.
    match store.save(&stored.applied(&delta, unix_now())) {
        Ok(()) => info!("saved cache"),
        Err(e) => warn!("unable to write the cache file: {}", e),
    }

    Ok(RunReport::Updated { succeeded, failed })
}

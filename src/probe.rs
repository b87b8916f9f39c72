use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::config::ProbeSpec;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Runs the configured probe command for one address family and returns
/// its trimmed stdout. Every failure mode — family not configured, spawn
/// failure, non-zero exit, empty or non-UTF-8 output, timeout — yields
/// `None` with a logged cause. A host without IPv6 connectivity is normal
/// operation, not an error.
pub fn probe(family: &str, spec: Option<&ProbeSpec>, timeout: Duration) -> Option<Box<str>> {
    let spec = match spec {
        Some(spec) => spec,
        None => {
            debug!("no {} probe configured", family);
            return None;
        }
    };

    let mut child = match Command::new(&*spec.command)
        .args(spec.args.iter().map(|arg| &**arg))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            warn!("unable to spawn {} probe {}: {}", family, spec.command, e);
            return None;
        }
    };

    let deadline = Instant::now() + timeout;

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                warn!("{} probe exceeded its {:?} timeout, killing it", family, timeout);
                let _ = child.kill();
                let _ = child.wait();
                return None;
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                warn!("unable to wait on {} probe: {}", family, e);
                let _ = child.kill();
                let _ = child.wait();
                return None;
            }
        }
    };

    if !status.success() {
        warn!("{} probe exited with {}", family, status);
        return None;
    }

    let mut output = String::new();
    // stdout is always piped, so take() cannot come up empty here.
    if let Some(mut stdout) = child.stdout.take() {
        if let Err(e) = stdout.read_to_string(&mut output) {
            warn!("{} probe produced unreadable output: {}", family, e);
            return None;
        }
    }

    let trimmed = output.trim();
    if trimmed.is_empty() {
        warn!("{} probe produced no output", family);
        return None;
    }

    Some(trimmed.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(command: &str, args: &[&str]) -> ProbeSpec {
        ProbeSpec {
            command: command.into(),
            args: args.iter().map(|a| Box::from(*a)).collect(),
        }
    }

    fn timeout() -> Duration {
        Duration::from_secs(5)
    }

    #[test]
    fn returns_trimmed_stdout() {
        let spec = spec("echo", &["  203.0.113.9  "]);
        let probed = probe("ipv4", Some(&spec), timeout());
        assert_eq!(probed.as_deref(), Some("203.0.113.9"));
    }

    #[test]
    fn unconfigured_family_is_absent() {
        assert_eq!(probe("ipv6", None, timeout()), None);
    }

    #[test]
    fn non_zero_exit_is_absent() {
        let spec = spec("sh", &["-c", "echo 203.0.113.9; exit 1"]);
        assert_eq!(probe("ipv4", Some(&spec), timeout()), None);
    }

    #[test]
    fn empty_output_is_absent() {
        let spec = spec("true", &[]);
        assert_eq!(probe("ipv4", Some(&spec), timeout()), None);
    }

    #[test]
    fn missing_command_is_absent() {
        let spec = spec("/nonexistent/probe-command", &[]);
        assert_eq!(probe("ipv4", Some(&spec), timeout()), None);
    }

    #[test]
    fn timed_out_probe_is_killed_and_absent() {
        let spec = spec("sleep", &["5"]);
        let started = Instant::now();
        assert_eq!(probe("ipv4", Some(&spec), Duration::from_millis(200)), None);
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}

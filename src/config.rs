use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde_derive::{Deserialize, Serialize};
use thiserror::Error;

use crate::providers::{cloudflare, dummy, dyndns2, ProviderAdapter, Unsupported};

/// Config file format version. Files carrying any other version are
/// rejected outright; bump this whenever the format changes.
pub const CONFIG_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unable to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("unable to parse config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("config version {found} is not supported (expected {})", CONFIG_VERSION)]
    Version { found: u32 },

    #[error("provider {tag}[{index}]: {source}")]
    Provider {
        tag: Box<str>,
        index: usize,
        source: toml::de::Error,
    },
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct General {
    #[serde(default = "default_user_agent")]
    pub user_agent: Box<str>,

    #[serde(default = "default_cache_file")]
    pub cache_file: Box<str>,

    #[serde(default = "default_lock_file")]
    pub lock_file: Box<str>,

    /// How long a run may wait for the run lock before aborting.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,

    /// Timeout of each outbound provider call.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

impl Default for General {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            cache_file: default_cache_file(),
            lock_file: default_lock_file(),
            lock_timeout_ms: default_lock_timeout_ms(),
            probe_timeout_secs: default_probe_timeout_secs(),
            call_timeout_secs: default_call_timeout_secs(),
        }
    }
}

/// External command invoked to discover one address family's value.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ProbeSpec {
    pub command: Box<str>,

    #[serde(default)]
    pub args: Vec<Box<str>>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Modules {
    pub ipv4: Option<ProbeSpec>,
    pub ipv6: Option<ProbeSpec>,
}

/// One typed provider instance. Unknown protocol tags are kept instead of
/// rejected so the dispatcher can report them per instance while the
/// well-formed blocks still run.
#[derive(Clone, Debug, PartialEq)]
pub enum ProviderConfig {
    Dyndns2(dyndns2::Config),
    Cloudflare(cloudflare::Config),
    Dummy(dummy::Config),
    Unsupported,
}

impl ProviderConfig {
    pub fn to_boxed(&self, tag: &str, index: usize) -> Box<dyn ProviderAdapter> {
        let label = format!("{}[{}]", tag, index).into_boxed_str();

        match self {
            Self::Dyndns2(conf) => Box::new(dyndns2::Service::new(label, conf.clone())),
            Self::Cloudflare(conf) => Box::new(cloudflare::Service::new(label, conf.clone())),
            Self::Dummy(conf) => Box::new(dummy::Service::new(label, conf.clone())),
            Self::Unsupported => Box::new(Unsupported::new(label, tag)),
        }
    }
}

/// All instances configured under one protocol tag, in file order.
#[derive(Clone, Debug, PartialEq)]
pub struct ProviderBlock {
    pub tag: Box<str>,
    pub instances: Vec<ProviderConfig>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub general: General,
    pub modules: Modules,
    pub providers: Vec<ProviderBlock>,
}

#[derive(Deserialize)]
struct RawConfig {
    version: u32,

    #[serde(default)]
    general: General,

    #[serde(default)]
    modules: Modules,

    #[serde(default)]
    providers: BTreeMap<Box<str>, Vec<toml::Value>>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_toml(&fs::read_to_string(path)?)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(text)?;

        if raw.version != CONFIG_VERSION {
            return Err(ConfigError::Version { found: raw.version });
        }

        let mut providers = Vec::with_capacity(raw.providers.len());

        for (tag, values) in raw.providers {
            let mut instances = Vec::with_capacity(values.len());

            for (index, value) in values.into_iter().enumerate() {
                // A malformed instance under a known tag is a config
                // mistake and fatal; only the tag itself may be unknown.
                let instance = match tag.as_ref() {
                    "dyndns2" => value.try_into().map(ProviderConfig::Dyndns2),
                    "cloudflare" => value.try_into().map(ProviderConfig::Cloudflare),
                    "dummy" => value.try_into().map(ProviderConfig::Dummy),
                    _ => Ok(ProviderConfig::Unsupported),
                }
                .map_err(|source| ConfigError::Provider {
                    tag: tag.clone(),
                    index,
                    source,
                })?;

                instances.push(instance);
            }

            providers.push(ProviderBlock { tag, instances });
        }

        Ok(Self {
            general: raw.general,
            modules: raw.modules,
            providers,
        })
    }
}

fn default_user_agent() -> Box<str> {
    concat!("dynup ", env!("CARGO_PKG_VERSION")).into()
}

fn default_cache_file() -> Box<str> {
    "/var/lib/dynup/cache.json".into()
}

fn default_lock_file() -> Box<str> {
    "/var/lib/dynup/run.lock".into()
}

fn default_lock_timeout_ms() -> u64 {
    1000
}

fn default_probe_timeout_secs() -> u64 {
    10
}

fn default_call_timeout_secs() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
        version = 1

        [general]
        user_agent = "dynup test"
        cache_file = "/tmp/dynup/cache.json"
        lock_file = "/tmp/dynup/run.lock"
        lock_timeout_ms = 250

        [modules.ipv4]
        command = "/usr/local/bin/probe-ip"
        args = ["-4"]

        [modules.ipv6]
        command = "/usr/local/bin/probe-ip"
        args = ["-6", "--prefix-only"]

        [[providers.dyndns2]]
        server = "dyndns.example.com/nic/update"
        username = "alice"
        password = "hunter2"
        hosts = [
            { hostname = "home.example.com", ipv6_suffix = "1:2:3:4" },
            { hostname = "nas.example.com" },
        ]

        [[providers.cloudflare]]
        zone_id = "023e105f4ecef8ad9ca31a8372d0c353"
        token = "cf-api-token"
        record_name = "home.example.com"
        record_id_ipv4 = "372e67954025e0ba6aaa6d586b9e0b59"
    "#;

    #[test]
    fn full_config_parses() {
        let config = Config::from_toml(FULL).unwrap();

        assert_eq!(&*config.general.user_agent, "dynup test");
        assert_eq!(config.general.lock_timeout_ms, 250);
        // untouched fields fall back to their defaults
        assert_eq!(config.general.probe_timeout_secs, 10);

        assert_eq!(
            config.modules.ipv4.as_ref().unwrap().command.as_ref(),
            "/usr/local/bin/probe-ip"
        );

        assert_eq!(config.providers.len(), 2);
        let dyndns2 = config
            .providers
            .iter()
            .find(|block| &*block.tag == "dyndns2")
            .unwrap();
        assert_eq!(dyndns2.instances.len(), 1);
        match &dyndns2.instances[0] {
            ProviderConfig::Dyndns2(conf) => {
                assert_eq!(conf.hosts.len(), 2);
                assert_eq!(conf.hosts[1].ipv6_suffix, None);
            }
            other => panic!("unexpected instance: {:?}", other),
        }
    }

    #[test]
    fn minimal_config_parses_with_defaults() {
        let config = Config::from_toml("version = 1").unwrap();
        assert_eq!(config.general, General::default());
        assert_eq!(config.modules, Modules::default());
        assert!(config.providers.is_empty());
    }

    #[test]
    fn version_mismatch_is_fatal() {
        let result = Config::from_toml("version = 2");
        assert!(matches!(result, Err(ConfigError::Version { found: 2 })));
    }

    #[test]
    fn missing_version_is_fatal() {
        assert!(matches!(
            Config::from_toml("[general]"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn unknown_tag_is_preserved_as_unsupported() {
        let config = Config::from_toml(
            r#"
            version = 1

            [[providers.carrier-pigeon]]
            loft = "roof"
            "#,
        )
        .unwrap();

        assert_eq!(config.providers.len(), 1);
        assert_eq!(&*config.providers[0].tag, "carrier-pigeon");
        assert_eq!(config.providers[0].instances, vec![ProviderConfig::Unsupported]);
    }

    #[test]
    fn malformed_instance_under_known_tag_is_fatal() {
        let result = Config::from_toml(
            r#"
            version = 1

            [[providers.dyndns2]]
            username = "alice"
            "#,
        );

        assert!(
            matches!(result, Err(ConfigError::Provider { ref tag, index: 0, .. }) if &**tag == "dyndns2")
        );
    }
}

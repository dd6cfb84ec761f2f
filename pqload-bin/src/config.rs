use crate::sampler::StopCondition;
use anyhow::Error;
use http::Uri;
use pqload_client::ClientCommand;
use serde::Deserialize;
use std::fs::File;
use std::io::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error as ThisError;

const DEFAULT_PROGRAM: &str = "curl";
const DEFAULT_URL: &str = "https://nginx_pq:4433";
const DEFAULT_TLS_VERSION: &str = "1.3";
const DEFAULT_CURVES: &str = "x25519_mlkem512";
const DEFAULT_CACERT: &str = "/opt/certs/CA.crt";
const DEFAULT_REQUESTS: usize = 400;
const MAX_DEFAULT_CONCURRENCY: usize = 512;
const DEFAULT_INTERVAL_MS: u64 = 100;
const DEFAULT_STABLE_TICKS: u32 = 5;

#[derive(Debug, Deserialize, Default)]
pub struct ClientFileConfig {
    pub program: Option<String>,
    pub url: Option<String>,
    pub tls_version: Option<String>,
    pub curves: Option<String>,
    pub cacert: Option<String>,
    pub extra_args: Option<Vec<String>>,
    pub require_http_ok: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
pub struct RunFileConfig {
    pub requests: Option<usize>,
    pub concurrency: Option<usize>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StopModeConfig {
    Strict,
    Debounced,
}

#[derive(Debug, Deserialize, Default)]
pub struct SamplerFileConfig {
    pub interval_ms: Option<u64>,
    pub mode: Option<StopModeConfig>,
    pub stable_ticks: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
pub struct OutputFileConfig {
    pub results_dir: Option<String>,
    pub monitor_dir: Option<String>,
    pub trace_dir: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    pub client: Option<ClientFileConfig>,
    pub run: Option<RunFileConfig>,
    pub sampler: Option<SamplerFileConfig>,
    pub output: Option<OutputFileConfig>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub client: ClientCommand,
    /// Count a request as failed when the client reports a status other than 200.
    pub require_http_ok: bool,
    pub requests: usize,
    pub concurrency: usize,
    /// Set when concurrency came from the file or the command line rather
    /// than being derived from `requests`.
    explicit_concurrency: bool,
    /// Deadline for the whole batch, after which in-flight requests are cancelled.
    pub timeout: Option<Duration>,
    pub sampler: SamplerConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerConfig {
    pub interval: Duration,
    pub stop: StopCondition,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    pub results_dir: PathBuf,
    pub monitor_dir: PathBuf,
    pub trace_dir: PathBuf,
}

impl OutputConfig {
    fn under(root: &Path) -> OutputConfig {
        OutputConfig {
            results_dir: root.join("request_logs"),
            monitor_dir: root.join("system_logs"),
            trace_dir: root.join("traces"),
        }
    }
}

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("Invalid url '{0}': expected an absolute http(s) url with a host.")]
    InvalidUrl(String),
    #[error("concurrency must be at least 1")]
    ZeroConcurrency,
    #[error("sampler interval must be at least 1ms")]
    ZeroInterval,
    #[error("stable_ticks must be at least 1 in debounced mode")]
    ZeroStableTicks,
}

fn validate_url(url: &str) -> Result<(), ConfigError> {
    let uri: Uri = url
        .parse()
        .map_err(|_| ConfigError::InvalidUrl(url.to_string()))?;
    let scheme_ok = matches!(uri.scheme_str(), Some("https") | Some("http"));
    if !scheme_ok || uri.host().is_none() {
        return Err(ConfigError::InvalidUrl(url.to_string()));
    }
    Ok(())
}

fn default_concurrency(requests: usize) -> usize {
    requests.min(MAX_DEFAULT_CONCURRENCY).max(1)
}

fn resolve(parent: &Path, p: String) -> PathBuf {
    parent.join(p)
}

impl Config {
    fn fill_defaults(unresolved: FileConfig, parent: &Path) -> Result<Config, Error> {
        let client = unresolved.client.unwrap_or_default();
        let run = unresolved.run.unwrap_or_default();
        let sampler = unresolved.sampler.unwrap_or_default();
        let output = unresolved.output.unwrap_or_default();

        let url = client.url.unwrap_or_else(|| DEFAULT_URL.into());
        validate_url(&url)?;
        let mut command =
            ClientCommand::new(client.program.unwrap_or_else(|| DEFAULT_PROGRAM.into()), url);
        command.tls_version = client
            .tls_version
            .unwrap_or_else(|| DEFAULT_TLS_VERSION.into());
        command.curves = client
            .curves
            .or_else(|| Some(DEFAULT_CURVES.into()))
            .filter(|c| !c.is_empty());
        command.cacert = match client.cacert {
            Some(c) if c.is_empty() => None,
            Some(c) => Some(resolve(parent, c)),
            None => Some(PathBuf::from(DEFAULT_CACERT)),
        };
        command.extra_args = client.extra_args.unwrap_or_default();

        let requests = run.requests.unwrap_or(DEFAULT_REQUESTS);
        let explicit_concurrency = run.concurrency.is_some();
        let concurrency = run
            .concurrency
            .unwrap_or_else(|| default_concurrency(requests));
        if concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency.into());
        }

        let interval_ms = sampler.interval_ms.unwrap_or(DEFAULT_INTERVAL_MS);
        if interval_ms == 0 {
            return Err(ConfigError::ZeroInterval.into());
        }
        let stop = match sampler.mode.unwrap_or(StopModeConfig::Debounced) {
            StopModeConfig::Strict => StopCondition::Strict,
            StopModeConfig::Debounced => {
                let stable_ticks = sampler.stable_ticks.unwrap_or(DEFAULT_STABLE_TICKS);
                if stable_ticks == 0 {
                    return Err(ConfigError::ZeroStableTicks.into());
                }
                StopCondition::Debounced { stable_ticks }
            }
        };

        let defaults = OutputConfig::under(Path::new("output"));
        let output = OutputConfig {
            results_dir: output
                .results_dir
                .map(|p| resolve(parent, p))
                .unwrap_or_else(|| parent.join(&defaults.results_dir)),
            monitor_dir: output
                .monitor_dir
                .map(|p| resolve(parent, p))
                .unwrap_or_else(|| parent.join(&defaults.monitor_dir)),
            trace_dir: output
                .trace_dir
                .map(|p| resolve(parent, p))
                .unwrap_or_else(|| parent.join(&defaults.trace_dir)),
        };

        Ok(Config {
            client: command,
            require_http_ok: client.require_http_ok.unwrap_or(true),
            requests,
            concurrency,
            explicit_concurrency,
            timeout: run.timeout_secs.map(Duration::from_secs),
            sampler: SamplerConfig {
                interval: Duration::from_millis(interval_ms),
                stop,
            },
            output,
        })
    }

    /// Defaults for every key, relative to the working directory.
    pub fn defaults() -> Result<Config, Error> {
        Config::fill_defaults(FileConfig::default(), Path::new(""))
    }

    pub fn from_toml_str(contents: &str, parent: &Path) -> Result<Config, Error> {
        let config: FileConfig = toml::from_str(contents)?;
        Config::fill_defaults(config, parent)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, Error> {
        let mut f = File::open(path.as_ref())?;
        let mut contents = String::new();
        f.read_to_string(&mut contents)?;
        let p = path.as_ref().parent().unwrap_or_else(|| Path::new("/"));
        Config::from_toml_str(&contents, p)
    }

    /// Apply command line overrides on top of the loaded file.
    pub fn with_overrides(
        mut self,
        requests: Option<usize>,
        concurrency: Option<usize>,
        output_root: Option<&Path>,
    ) -> Result<Config, Error> {
        if let Some(n) = requests {
            self.requests = n;
            if !self.explicit_concurrency {
                self.concurrency = default_concurrency(n);
            }
        }
        if let Some(c) = concurrency {
            if c == 0 {
                return Err(ConfigError::ZeroConcurrency.into());
            }
            self.concurrency = c;
            self.explicit_concurrency = true;
        }
        if let Some(root) = output_root {
            self.output = OutputConfig::under(root);
        }
        Ok(self)
    }
}

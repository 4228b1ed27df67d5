//! Probe configuration.
//!
//! Loaded from the YAML file named by `HITPROBE_CONFIG`. Without it the
//! built-in defaults are used, which target the hitokoto quote API.
//!
//! ```yaml
//! target_host: v1.hitokoto.cn
//! target_path: "/?c=f&charset=utf-8&encode=text"
//! retry:
//!   policy: exponential
//!   initial_secs: 1
//!   max_secs: 60
//!   factor: 2
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use url::Url;

use crate::http::request::ProbeRequest;
use crate::probe::driver::{DEFAULT_BUFFER_CAPACITY, DEFAULT_MAX_PAYLOAD, ProbeSettings};
use crate::probe::retry::RetryPolicy;

/// Environment variable holding the config file path.
pub const CONFIG_ENV: &str = "HITPROBE_CONFIG";

pub const DEFAULT_REQUEST_TEMPLATE: &str = "GET {url} HTTP/1.0\r\n\
    Host: {host}\r\n\
    User-Agent: esp-idf/1.0 esp32\r\n\
    Connection: close\r\n\
    \r\n";

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub target_host: String,
    pub target_port: u16,
    pub target_path: String,
    /// Use TLS (`https`) when true, plain TCP (`http`) otherwise
    pub tls: bool,
    /// Request text; `{url}`, `{host}` and `{path}` are substituted
    pub request_template: String,
    /// PEM bundle of trusted roots; the OS store is used when unset
    pub ca_file: Option<PathBuf>,
    pub buffer_capacity: usize,
    /// Cap on the collected payload; the rest is dropped
    pub max_payload_bytes: usize,
    pub connect_timeout_secs: u64,
    /// Bounds each wait for socket readiness; unset means wait forever
    pub idle_timeout_secs: Option<u64>,
    /// Strings removed from the payload before printing
    pub strip: Vec<String>,
    pub log_level: String,
    pub retry: RetryPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_host: "v1.hitokoto.cn".to_string(),
            target_port: 443,
            target_path: "/?c=f&charset=utf-8&encode=text".to_string(),
            tls: true,
            request_template: DEFAULT_REQUEST_TEMPLATE.to_string(),
            ca_file: None,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD,
            connect_timeout_secs: 30,
            idle_timeout_secs: None,
            strip: vec!["，".to_string(), "。".to_string()],
            log_level: "info".to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

impl Config {
    /// Load from `HITPROBE_CONFIG`, or fall back to the defaults.
    pub fn load() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path)),
            None => {
                let cfg = Self::default();
                cfg.validate()?;
                Ok(cfg)
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let cfg: Config = serde_yaml::from_str(text).context("Failed to parse YAML")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.buffer_capacity == 0 {
            anyhow::bail!("buffer_capacity must be greater than zero");
        }
        if self.request_template.is_empty() {
            anyhow::bail!("request_template must not be empty");
        }
        if let RetryPolicy::Exponential { factor: 0, .. } = self.retry {
            anyhow::bail!("retry factor must be at least 1");
        }
        self.target_url()?;
        self.log_level()?;
        Ok(())
    }

    /// Absolute target URL built from scheme, host, port and path.
    pub fn target_url(&self) -> Result<Url> {
        let scheme = if self.tls { "https" } else { "http" };
        let base = Url::parse(&format!("{}://{}", scheme, self.target_host))
            .with_context(|| format!("Invalid target host: {}", self.target_host))?;
        if base.host_str().is_none_or(|h| h.is_empty()) {
            anyhow::bail!("Invalid target host: {}", self.target_host);
        }

        let mut url = base
            .join(&self.target_path)
            .with_context(|| format!("Invalid target path: {}", self.target_path))?;
        url.set_port(Some(self.target_port))
            .map_err(|_| anyhow::anyhow!("Cannot set port on {}", url))?;
        Ok(url)
    }

    pub fn request(&self) -> Result<ProbeRequest> {
        Ok(ProbeRequest::render(&self.request_template, self.target_url()?))
    }

    pub fn log_level(&self) -> Result<tracing::Level> {
        self.log_level
            .parse()
            .map_err(|_| anyhow::anyhow!("Unknown log level: {}", self.log_level))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn probe_settings(&self) -> ProbeSettings {
        ProbeSettings {
            buffer_capacity: self.buffer_capacity,
            max_payload: self.max_payload_bytes,
            idle_timeout: self.idle_timeout_secs.map(Duration::from_secs),
            retry: self.retry.clone(),
        }
    }
}

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use serde::Deserialize;
use tracing::level_filters::LevelFilter;

/// Environment variable naming an optional TOML config file.
pub const CONFIG_PATH_VAR: &str = "TOKENGATE_CONFIG";

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub tls: TlsConfig,
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

#[derive(Clone, Default, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub secret_key: String,
    #[serde(default)]
    pub issuer: String,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret_key", &"<redacted>")
            .field("issuer", &self.issuer)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Permits per second per client IP. Burst equals this value, truncated.
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: f64,
    /// Key clients on `X-Forwarded-For` / `X-Real-IP` / `Forwarded` instead of
    /// the peer address. Only safe behind a reverse proxy that overwrites them.
    #[serde(default)]
    pub trust_proxy_headers: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_requests_per_second(),
            trust_proxy_headers: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TlsConfig {
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
}

fn default_service_name() -> String { "tokengate".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_requests_per_second() -> f64 { 5.0 }
fn default_shutdown_grace_secs() -> u64 { 5 }

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            log_level: default_log_level(),
            bind_addr: default_bind_addr(),
            auth: AuthConfig::default(),
            rate_limit: RateLimitConfig::default(),
            tls: TlsConfig::default(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from the process environment.
    pub fn load() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an optional TOML file, then applies
    /// `TOKENGATE_*` overrides read through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = match lookup(CONFIG_PATH_VAR) {
            Some(path) => {
                let contents = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read config file {path}"))?;
                toml::from_str::<ServerConfig>(&contents)
                    .with_context(|| format!("failed to parse config file {path}"))?
            }
            None => ServerConfig::default(),
        };

        if let Some(name) = lookup("TOKENGATE_SERVICE_NAME") {
            config.service_name = name;
        }
        if let Some(level) = lookup("TOKENGATE_LOG_LEVEL") {
            config.log_level = level;
        }
        if let Some(secret) = lookup("TOKENGATE_SECRET_KEY") {
            config.auth.secret_key = secret;
        }
        if let Some(issuer) = lookup("TOKENGATE_ISSUER") {
            config.auth.issuer = issuer;
        }

        if let Some(val) = lookup("TOKENGATE_RATE_LIMIT") {
            config.rate_limit.requests_per_second = val
                .trim()
                .parse()
                .with_context(|| format!("invalid TOKENGATE_RATE_LIMIT: {val}"))?;
        }
        if let Some(val) = lookup("TOKENGATE_TRUST_PROXY_HEADERS") {
            config.rate_limit.trust_proxy_headers = val
                .trim()
                .parse()
                .with_context(|| format!("invalid TOKENGATE_TRUST_PROXY_HEADERS: {val}"))?;
        }

        if let Some(addr) = lookup("TOKENGATE_BIND_ADDR") {
            config.bind_addr = addr
                .parse()
                .with_context(|| format!("invalid TOKENGATE_BIND_ADDR: {addr}"))?;
        }
        if let Some(host) = lookup("TOKENGATE_HOST") {
            let ip: IpAddr = host
                .parse()
                .with_context(|| format!("invalid TOKENGATE_HOST: {host}"))?;
            config.bind_addr.set_ip(ip);
        }
        if let Some(port) = lookup("TOKENGATE_PORT") {
            let port: u16 = port
                .parse()
                .with_context(|| format!("invalid TOKENGATE_PORT: {port}"))?;
            config.bind_addr.set_port(port);
        }

        if let Some(cert) = lookup("TOKENGATE_TLS_CERT") {
            config.tls.cert_path = Some(PathBuf::from(cert));
        }
        if let Some(key) = lookup("TOKENGATE_TLS_KEY") {
            config.tls.key_path = Some(PathBuf::from(key));
        }

        if let Some(secs) = lookup("TOKENGATE_SHUTDOWN_GRACE_SECS") {
            config.shutdown_grace_secs = secs
                .parse()
                .with_context(|| format!("invalid TOKENGATE_SHUTDOWN_GRACE_SECS: {secs}"))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Rejects values the service cannot start with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.auth.secret_key.is_empty() {
            bail!("signing secret is required. Set TOKENGATE_SECRET_KEY.");
        }
        if self.auth.issuer.trim().is_empty() {
            bail!("issuer is required. Set TOKENGATE_ISSUER.");
        }

        let rps = self.rate_limit.requests_per_second;
        if !rps.is_finite() || rps < 0.0 {
            bail!("rate limit must be a finite, non-negative number (got {rps})");
        }

        LevelFilter::from_str(&self.log_level)
            .map_err(|_| anyhow!("invalid log level: {}", self.log_level))?;

        if self.tls.cert_path.is_some() != self.tls.key_path.is_some() {
            bail!("TLS needs both TOKENGATE_TLS_CERT and TOKENGATE_TLS_KEY");
        }

        Ok(())
    }

    /// Settings that are accepted but probably not what the operator wants.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.auth.secret_key.len() < 32 {
            warnings.push(
                "Signing secret is shorter than 32 bytes. \
                 Consider a stronger secret via TOKENGATE_SECRET_KEY."
                    .to_string(),
            );
        }
        if self.rate_limit.requests_per_second < 1.0 {
            warnings.push(format!(
                "Rate limit of {} requests/second gives a burst of zero; every request will be rejected.",
                self.rate_limit.requests_per_second
            ));
        }
        if !self.tls_enabled() && !self.bind_addr.ip().is_loopback() {
            warnings.push(format!(
                "Serving plain HTTP on {}. Bearer tokens will cross the network unencrypted.",
                self.bind_addr
            ));
        }
        warnings
    }

    pub fn tls_enabled(&self) -> bool {
        self.tls.cert_path.is_some() && self.tls.key_path.is_some()
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

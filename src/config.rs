use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub quota: QuotaConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct QuotaConfig {
    /// NATS server the quota authority listens on
    pub nats_url: String,

    /// Subject prefix for authority RPCs (e.g. "quota.v1")
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,

    /// Upper bound on each authority call before it is treated as failed
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

fn default_subject_prefix() -> String {
    "quota.v1".to_string()
}

fn default_call_timeout_secs() -> u64 {
    5
}

impl QuotaConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn load_config_with_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("talktime.toml");
        fs::write(
            &path,
            r#"
            [service]
            name = "talktime-metering"

            [service.http]
            bind = "127.0.0.1"
            port = 8090

            [quota]
            nats_url = "nats://localhost:4222"
            "#,
        )?;

        let cfg = Config::load(dir.path().join("talktime").to_str().unwrap())?;

        assert_eq!(cfg.service.name, "talktime-metering");
        assert_eq!(cfg.service.http.port, 8090);
        assert_eq!(cfg.quota.subject_prefix, "quota.v1");
        assert_eq!(cfg.quota.call_timeout(), Duration::from_secs(5));

        Ok(())
    }
}

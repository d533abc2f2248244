//! Process configuration (spec §6 environment surface). Built once at
//! startup from two `config::Environment` sources — `MCP_*` for transport
//! knobs, `SLURM_*` for backend and queueing knobs — the way the teacher's
//! `AgentConfig` is built from layered `config::Config` sources, except
//! there is no file layer here: every field is env-or-default.

use std::time::Duration;

use anyhow::Context;
use bytesize::ByteSize;
use serde::Deserialize;
use service::AdapterConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Stdio,
    Sse,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "GatewayConfig::default_transport")]
    pub transport: String,

    #[serde(default = "GatewayConfig::default_sse_host")]
    pub sse_host: String,

    #[serde(default = "GatewayConfig::default_sse_port")]
    pub sse_port: u16,

    #[serde(default = "GatewayConfig::default_output_dir")]
    pub output_dir: String,

    #[serde(default)]
    pub mock_force: bool,

    #[serde(default = "GatewayConfig::default_max_output_bytes")]
    pub max_output_bytes: ByteSize,

    #[serde(default = "GatewayConfig::default_worker_pool_size")]
    pub worker_pool_size: usize,

    #[serde(default = "GatewayConfig::default_queue_depth")]
    pub queue_depth: usize,

    #[serde(default = "GatewayConfig::default_query_timeout_secs")]
    pub query_timeout_secs: u64,

    #[serde(default = "GatewayConfig::default_submit_timeout_secs")]
    pub submit_timeout_secs: u64,

    #[serde(default = "GatewayConfig::default_max_alloc_wait_secs")]
    pub max_alloc_wait_secs: u64,

    #[serde(default = "GatewayConfig::default_immediate_timeout_secs")]
    pub immediate_timeout_secs: u64,

    #[serde(default = "GatewayConfig::default_output_read_timeout_secs")]
    pub output_read_timeout_secs: u64,

    #[serde(default = "GatewayConfig::default_shutdown_drain_secs")]
    pub shutdown_drain_secs: u64,
}

impl GatewayConfig {
    pub fn default_transport() -> String {
        "stdio".to_owned()
    }

    pub fn default_sse_host() -> String {
        "0.0.0.0".to_owned()
    }

    pub fn default_sse_port() -> u16 {
        8000
    }

    pub fn default_output_dir() -> String {
        "./logs/slurm_output".to_owned()
    }

    pub fn default_max_output_bytes() -> ByteSize {
        ByteSize::mib(1)
    }

    pub fn default_worker_pool_size() -> usize {
        8
    }

    pub fn default_queue_depth() -> usize {
        64
    }

    pub fn default_query_timeout_secs() -> u64 {
        30
    }

    pub fn default_submit_timeout_secs() -> u64 {
        60
    }

    pub fn default_max_alloc_wait_secs() -> u64 {
        300
    }

    pub fn default_immediate_timeout_secs() -> u64 {
        10
    }

    pub fn default_output_read_timeout_secs() -> u64 {
        10
    }

    pub fn default_shutdown_drain_secs() -> u64 {
        30
    }

    /// Loads from `MCP_*`/`SLURM_*` environment variables, falling back to
    /// the defaults above for anything unset.
    pub fn load() -> anyhow::Result<Self> {
        let raw = config::Config::builder()
            .add_source(config::Environment::with_prefix("MCP").separator("_").try_parsing(true))
            .add_source(config::Environment::with_prefix("SLURM").separator("_").try_parsing(true))
            .build()
            .context("failed to assemble configuration sources")?;
        let config: Self = raw.try_deserialize().context("failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.transport().is_none() {
            anyhow::bail!("MCP_TRANSPORT must be `stdio` or `sse`, got `{}`", self.transport);
        }
        Ok(())
    }

    pub fn transport(&self) -> Option<Transport> {
        match self.transport.as_str() {
            "stdio" => Some(Transport::Stdio),
            "sse" => Some(Transport::Sse),
            _ => None,
        }
    }

    pub fn shutdown_drain(&self) -> Duration {
        Duration::from_secs(self.shutdown_drain_secs)
    }

    pub fn to_adapter_config(&self) -> AdapterConfig {
        AdapterConfig {
            output_dir: self.output_dir.clone().into(),
            query_timeout: Duration::from_secs(self.query_timeout_secs),
            submit_timeout: Duration::from_secs(self.submit_timeout_secs),
            output_read_timeout: Duration::from_secs(self.output_read_timeout_secs),
            immediate_timeout: Duration::from_secs(self.immediate_timeout_secs),
            max_alloc_wait: Duration::from_secs(self.max_alloc_wait_secs),
            max_output_bytes: self.max_output_bytes.as_u64() as usize,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_environment_yields_documented_defaults() {
        // `try_deserialize` on an empty source still runs every `#[serde(default = ...)]`.
        let raw = config::Config::builder().build().unwrap();
        let config: GatewayConfig = raw.try_deserialize().unwrap();
        assert_eq!(config.transport, "stdio");
        assert_eq!(config.sse_port, 8000);
        assert_eq!(config.worker_pool_size, 8);
        assert_eq!(config.max_output_bytes, ByteSize::mib(1));
    }

    #[test]
    fn unknown_transport_is_rejected() {
        let config = GatewayConfig {
            transport: "carrier-pigeon".to_owned(),
            ..GatewayConfig {
                transport: String::new(),
                sse_host: GatewayConfig::default_sse_host(),
                sse_port: GatewayConfig::default_sse_port(),
                output_dir: GatewayConfig::default_output_dir(),
                mock_force: false,
                max_output_bytes: GatewayConfig::default_max_output_bytes(),
                worker_pool_size: GatewayConfig::default_worker_pool_size(),
                queue_depth: GatewayConfig::default_queue_depth(),
                query_timeout_secs: GatewayConfig::default_query_timeout_secs(),
                submit_timeout_secs: GatewayConfig::default_submit_timeout_secs(),
                max_alloc_wait_secs: GatewayConfig::default_max_alloc_wait_secs(),
                immediate_timeout_secs: GatewayConfig::default_immediate_timeout_secs(),
                output_read_timeout_secs: GatewayConfig::default_output_read_timeout_secs(),
                shutdown_drain_secs: GatewayConfig::default_shutdown_drain_secs(),
            }
        };
        assert!(config.validate().is_err());
    }
}

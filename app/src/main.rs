mod backend_select;
mod config;
mod tools;

use std::sync::Arc;

use anyhow::Context;
use runtime::{Dispatcher, ServerInfo, ToolRegistry, WorkerPool};

use self::config::{GatewayConfig, Transport};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GatewayConfig::load().context("failed to load configuration")?;
    init_logging();

    let backend = backend_select::select(config.mock_force, config.output_dir.clone().into());
    let real_slurm = backend.is_real();
    tracing::info!(real_slurm, transport = %config.transport, "slurm control gateway starting");

    let adapter = Arc::new(service::build_adapter(config.to_adapter_config(), backend));
    let mut registry = ToolRegistry::new();
    tools::register_all(&mut registry, adapter);

    let pool = WorkerPool::new(config.worker_pool_size, config.queue_depth);
    let server_info = ServerInfo {
        name: "slurm-control-gateway",
        version: env!("CARGO_PKG_VERSION"),
    };
    let dispatcher = Arc::new(Dispatcher::new(registry, pool, real_slurm, server_info));

    match config.transport().context("invalid MCP_TRANSPORT")? {
        Transport::Stdio => {
            runtime::transport::stdio::run(dispatcher).await;
        }
        Transport::Sse => {
            runtime::transport::sse::run(dispatcher, config.sse_host.clone(), config.sse_port)
                .await
                .context("SSE transport failed")?;
        }
    }

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
}

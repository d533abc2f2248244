//! Line-delimited JSON-RPC over stdin/stdout (spec §4.6). One JSON object
//! per line in, one per line out; diagnostics go to stderr only. A single
//! writer task owns stdout so concurrently completing tool calls can never
//! interleave bytes.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::dispatcher::{Dispatched, Dispatcher};

/// Runs the stdio transport to completion: reads until EOF, then drains
/// in-flight calls and returns (the caller exits with status 0, per spec
/// §6's process launch surface). Every in-flight call shares the
/// dispatcher's shutdown token, so a drain that runs past its 30-second
/// deadline actually cancels whatever Slurm CLI invocations are still
/// running rather than merely waiting them out.
pub async fn run(dispatcher: Arc<Dispatcher>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let cancel = dispatcher.shutdown_token();

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = rx.recv().await {
            if stdout.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            if stdout.write_all(b"\n").await.is_err() {
                break;
            }
            let _ = stdout.flush().await;
        }
    });

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();
    let mut in_flight = Vec::new();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim().to_string();
                if line.is_empty() {
                    continue;
                }
                let dispatcher = dispatcher.clone();
                let tx = tx.clone();
                let call_cancel = cancel.clone();
                let handle = tokio::spawn(async move {
                    match dispatcher.handle_raw(&line, &call_cancel).await {
                        Dispatched::Response(response) | Dispatched::Shutdown(response) => {
                            if let Ok(text) = serde_json::to_string(&response) {
                                let _ = tx.send(text);
                            }
                        }
                        Dispatched::NoResponse => {}
                    }
                });
                in_flight.push(handle);
            }
            Ok(None) => break, // EOF
            Err(e) => {
                tracing::error!(error = %e, "stdio read error");
                break;
            }
        }
    }

    tracing::info!("stdin closed, draining in-flight tool calls");
    dispatcher.drain(Duration::from_secs(30)).await;
    for handle in in_flight {
        let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;
    }
    drop(tx);
    let _ = writer.await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::ServerInfo;
    use crate::pool::WorkerPool;
    use crate::registry::ToolRegistry;

    #[tokio::test]
    async fn handles_a_malformed_line_with_a_parse_error() {
        let dispatcher = Arc::new(Dispatcher::new(
            ToolRegistry::new(),
            WorkerPool::new(4, 4),
            false,
            ServerInfo {
                name: "test",
                version: "0.0.0",
            },
        ));
        match dispatcher.handle_raw("not json", &CancellationToken::new()).await {
            Dispatched::Response(r) => {
                let s = serde_json::to_string(&r).unwrap();
                assert!(s.contains("-32700"));
            }
            _ => panic!("expected a parse-error response"),
        }
    }
}

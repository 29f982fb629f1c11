//! JSON-lines adapter: one request per input line, one response per output
//! line.
//!
//! Each request runs on its own task, so slow users do not hold up others;
//! responses are written as they complete and carry the request `id`.
//! Requests for the same user run in the order they were read: each task
//! waits for the previous task of its user before touching the graph.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::memory::{GraphMemory, StorageLocation};
use crate::protocol::{Request, Response};

const RESPONSE_QUEUE: usize = 256;

/// Serve requests from `reader` until EOF or `shutdown`, then wait for
/// in-flight requests and return the writer.
pub async fn serve<R, W>(
    memory: Arc<GraphMemory>,
    reader: R,
    writer: W,
    shutdown: CancellationToken,
) -> Result<W, AppError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<Response>(RESPONSE_QUEUE);
    let writer_task = tokio::spawn(write_responses(writer, rx));

    let mut lines = reader.lines();
    let mut served = 0usize;
    // Last spawned task per user; finished entries are dropped as we go.
    let mut tails: HashMap<StorageLocation, JoinHandle<()>> = HashMap::new();

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!("stdio adapter shutting down");
                break;
            }

            line = lines.next_line() => {
                let input = match line {
                    Ok(Some(l)) => l,
                    Ok(None) => {
                        debug!("stdio adapter input closed");
                        break;
                    }
                    Err(e) => {
                        warn!("stdio adapter read error: {e}");
                        break;
                    }
                };
                if input.trim().is_empty() {
                    continue;
                }

                let request = match Request::parse(&input) {
                    Ok(r) => r,
                    Err(resp) => {
                        warn!("rejected malformed request line");
                        if tx.send(resp).await.is_err() {
                            break;
                        }
                        continue;
                    }
                };

                served += 1;
                tails.retain(|_, task| !task.is_finished());
                let location = memory.location_for(&request.user_id);
                let previous = tails.remove(&location);
                let memory = memory.clone();
                let tx = tx.clone();
                let task = tokio::spawn(async move {
                    if let Some(previous) = previous {
                        // A panicked predecessor still releases its turn.
                        let _ = previous.await;
                    }
                    let Request { id, user_id, op } = request;
                    let op_name = op.name();
                    let result = memory.execute(&user_id, op).await;
                    if let Err(e) = &result {
                        debug!(op = op_name, kind = e.kind(), "request failed");
                    }
                    // Receiver gone means the writer failed; nothing left to report to.
                    let _ = tx.send(Response::from_result(id, result)).await;
                });
                tails.insert(location, task);
            }
        }
    }

    // Writer finishes once every in-flight task has dropped its sender.
    drop(tx);
    let writer = writer_task
        .await
        .map_err(|e| AppError::Memory(format!("stdio writer join: {e}")))??;
    info!(requests = served, "stdio adapter stopped");
    Ok(writer)
}

async fn write_responses<W>(mut writer: W, mut rx: mpsc::Receiver<Response>) -> Result<W, AppError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(resp) = rx.recv().await {
        let mut line = resp.to_line();
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(writer)
}

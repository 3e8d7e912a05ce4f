//! Newline-delimited JSON bridge for the host command channel.
//!
//! Reads `CommandEnvelope` lines, dispatches them through the
//! `HostCommandServer` router, and writes `ResponseEnvelope` and
//! `EventEnvelope` lines back.
//!
//! When run over stdio, stdout is reserved for the protocol; all diagnostic
//! output goes to stderr.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::sync::broadcast::error::RecvError;

use crate::error::{Result, TrackerError};
use crate::host::channel::{HostCommandClient, HostCommandHandler, command_channel};
use crate::host::contract::{CommandEnvelope, ResponseEnvelope};
use crate::host::events::EventEmitter;

/// Run the bridge over the process's stdin/stdout until stdin closes.
pub async fn run_stdio_bridge<H: HostCommandHandler>(
    handler: H,
    events: EventEmitter,
    request_capacity: usize,
) -> Result<()> {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::BufWriter::new(tokio::io::stdout());
    run_bridge(stdin, stdout, handler, events, request_capacity).await
}

/// Run the bridge over any line reader and writer until the reader hits EOF.
///
/// Three concurrent parts:
///
/// 1. **Reader**: parses each line, dispatches it, writes the response.
/// 2. **Event forwarder**: writes broadcast events as they arrive.
/// 3. **Server**: the command router loop.
pub async fn run_bridge<R, W, H>(
    reader: R,
    writer: W,
    handler: H,
    events: EventEmitter,
    request_capacity: usize,
) -> Result<()>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send + 'static,
    H: HostCommandHandler,
{
    let (client, server) = command_channel(request_capacity, events, handler);
    let writer = Arc::new(Mutex::new(writer));

    let server_handle = tokio::spawn(server.run());

    let event_writer = Arc::clone(&writer);
    let mut event_rx = client.subscribe_events();
    let event_handle = tokio::spawn(async move {
        loop {
            match event_rx.recv().await {
                Ok(envelope) => match serde_json::to_string(&envelope) {
                    Ok(json) => {
                        let mut w = event_writer.lock().await;
                        if let Err(e) = write_line(&mut *w, &json).await {
                            tracing::warn!(error = %e, "cannot write event; stopping forwarder");
                            break;
                        }
                    }
                    Err(e) => tracing::error!(error = %e, "cannot serialize event; skipping"),
                },
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!(lagged = n, "event forwarder lagged; events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let reader_result = run_reader(reader, client, Arc::clone(&writer)).await;

    event_handle.abort();
    let _ = event_handle.await;
    let _ = server_handle.await;

    reader_result
}

async fn run_reader<R, W>(
    mut reader: R,
    client: HostCommandClient,
    writer: Arc<Mutex<W>>,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        let bytes_read = reader
            .read_line(&mut line)
            .await
            .map_err(|e| TrackerError::Channel(format!("failed to read command line: {e}")))?;
        if bytes_read == 0 {
            tracing::info!("input closed; shutting down bridge");
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<CommandEnvelope>(trimmed) {
            Ok(envelope) => {
                let request_id = envelope.request_id.clone();
                match client.send(envelope).await {
                    Ok(response) => response,
                    Err(e) => {
                        tracing::warn!(request_id = %request_id, error = %e, "command failed");
                        ResponseEnvelope::error(request_id, e.to_string())
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, raw_line = %trimmed, "cannot parse command envelope");
                ResponseEnvelope::error(
                    "parse-error",
                    format!("failed to parse command envelope: {e}"),
                )
            }
        };

        let json = serde_json::to_string(&response)
            .map_err(|e| TrackerError::Host(format!("cannot serialize response: {e}")))?;
        let mut w = writer.lock().await;
        write_line(&mut *w, &json).await?;
    }
    Ok(())
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, json: &str) -> Result<()> {
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

// Copyright 2026 GattLink Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Client transport server.
//!
//! Accepts TCP connections and runs one BLE session per client over
//! line-delimited JSON-RPC. Responses and server-originated
//! notifications share a single writer task per connection, so the
//! event-forwarding path never blocks on request handling.

use anyhow::Result;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::bluetooth::{HardwareProvider, ScanGating, Session};
use crate::config::Config;
use crate::error::BridgeError;
use crate::protocol::{Request, Response};

/// Bridge server that listens for client connections.
pub struct BridgeServer<P: HardwareProvider> {
    provider: Arc<P>,
    bind: String,
    gating: ScanGating,
}

impl<P: HardwareProvider> BridgeServer<P> {
    pub fn new(provider: Arc<P>, config: &Config) -> Self {
        Self {
            provider,
            bind: config.network.bind.clone(),
            gating: config.scan.gating(),
        }
    }

    /// Listen for client connections, spawning one session each.
    pub async fn run(self) -> Result<()> {
        let listener = TcpListener::bind(&self.bind).await?;
        info!("Listening on {}", self.bind);

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    info!("Client connected: {}", peer);
                    let provider = Arc::clone(&self.provider);
                    let gating = self.gating;
                    tokio::spawn(async move {
                        handle_client(provider, gating, stream).await;
                        info!("Client session ended: {}", peer);
                    });
                }
                Err(err) => {
                    error!("Accept error: {}", err);
                    // Continue listening despite errors
                    tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
                }
            }
        }
    }
}

/// Run one client's session until the transport closes, then release
/// its hardware resources.
async fn handle_client<P: HardwareProvider>(
    provider: Arc<P>,
    gating: ScanGating,
    stream: TcpStream,
) {
    let (reader, mut writer) = stream.into_split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(64);

    // Single writer: responses and notifications are serialized here.
    let writer_task = tokio::spawn(async move {
        while let Some(line) = outbound_rx.recv().await {
            if writer.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            if writer.flush().await.is_err() {
                break;
            }
        }
    });

    let mut session = Session::new(provider, gating, outbound_tx.clone());
    let mut reader = BufReader::new(reader);
    let mut line_buf = String::new();

    loop {
        line_buf.clear();

        match reader.read_line(&mut line_buf).await {
            Ok(0) => {
                debug!("Connection closed by client");
                break;
            }
            Ok(_) => {
                let trimmed = line_buf.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let response = match serde_json::from_str::<Request>(trimmed) {
                    Ok(request) => {
                        debug!("Request: {}", request.method);
                        session.handle_request(request).await
                    }
                    Err(err) => Response::failure(
                        None,
                        &BridgeError::invalid_request(format!("malformed request: {}", err)),
                    ),
                };
                match response.to_json() {
                    Ok(line) => {
                        if outbound_tx.send(line).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => error!("Failed to encode response: {}", err),
                }
            }
            Err(err) => {
                error!("Read error: {}", err);
                break;
            }
        }
    }

    // Transport teardown is the only de-provisioning path: release
    // the watcher and every subscription before the session goes away.
    session.shutdown().await;
    drop(outbound_tx);
    let _ = writer_task.await;
}

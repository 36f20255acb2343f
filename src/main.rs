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

//! GattLink Desktop Application

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gattlink_desktop::bluetooth::BluerProvider;
use gattlink_desktop::config::Config;
use gattlink_desktop::server::BridgeServer;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gattlink_desktop=info".parse().unwrap()),
        )
        .init();

    info!(
        "Starting GattLink Desktop v{}...",
        env!("CARGO_PKG_VERSION")
    );

    // Load configuration
    let config = Config::load()?;
    info!("Configuration loaded");

    // Connect to the BlueZ stack
    let provider = Arc::new(BluerProvider::new().await?);

    // Run the bridge until interrupted
    let server = BridgeServer::new(provider, &config);
    tokio::select! {
        result = server.run() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    info!("GattLink Desktop stopped");
    Ok(())
}

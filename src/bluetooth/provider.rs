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

//! Hardware provider seam.
//!
//! Everything the bridge needs from a platform BLE stack: an
//! advertisement scan stream, fresh GATT enumeration, characteristic
//! I/O, and value-change subscriptions. Sessions only ever talk to
//! this trait; the BlueZ implementation lives in [`super::stack`].

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::error::BridgeError;

/// RSSI sentinel meaning "no usable measurement". Advertisements
/// carrying it are never reported to clients.
pub const RSSI_UNAVAILABLE: i16 = -127;

/// A single advertisement event from the scan stream.
#[derive(Debug, Clone)]
pub struct Advertisement {
    /// 64-bit peripheral address.
    pub peripheral: u64,
    pub local_name: Option<String>,
    pub rssi: i16,
    pub kind: AdvertisementKind,
    /// Service UUIDs carried in the advertisement.
    pub services: Vec<Uuid>,
}

/// PDU type of an advertisement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvertisementKind {
    ConnectableUndirected,
    ConnectableDirected,
    ScannableUndirected,
    NonConnectableUndirected,
    ScanResponse,
}

impl AdvertisementKind {
    /// Only advertisements a client could act on are reported.
    pub fn is_connectable(&self) -> bool {
        matches!(
            self,
            AdvertisementKind::ConnectableUndirected
                | AdvertisementKind::ConnectableDirected
                | AdvertisementKind::ScanResponse
        )
    }
}

/// Signal-strength gating applied by the provider's own filtering
/// where the platform supports it.
#[derive(Debug, Clone, Copy)]
pub struct ScanGating {
    /// Peripheral enters range at or above this RSSI.
    pub in_range_dbm: i16,
    /// Peripheral leaves range below this RSSI (hysteresis).
    pub out_of_range_dbm: i16,
    /// Peripheral considered gone after this much silence.
    pub out_of_range_timeout: Duration,
}

impl Default for ScanGating {
    fn default() -> Self {
        Self {
            in_range_dbm: -70,
            out_of_range_dbm: -75,
            out_of_range_timeout: Duration::from_millis(2000),
        }
    }
}

/// Failures reported by the hardware stack.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// The peripheral could not be reached.
    #[error("destination unreachable")]
    Unreachable,
    /// A GATT operation completed with a non-success status.
    #[error("hardware status: {0}")]
    Status(String),
    /// The stack itself failed.
    #[error("bluetooth stack failure: {0}")]
    Stack(String),
}

impl From<ProviderError> for BridgeError {
    fn from(err: ProviderError) -> Self {
        BridgeError::Application(err.to_string())
    }
}

/// Handle used to unsubscribe from an event stream before it is
/// discarded, so no stale event is delivered after a transition.
#[derive(Debug)]
pub struct StopHandle {
    stop_tx: oneshot::Sender<()>,
}

impl StopHandle {
    pub fn new(stop_tx: oneshot::Sender<()>) -> Self {
        Self { stop_tx }
    }

    /// Signal the provider to unsubscribe. The provider closes the
    /// event channel once the subscription is gone.
    pub fn stop(self) {
        let _ = self.stop_tx.send(());
    }
}

/// An active advertisement watcher.
#[derive(Debug)]
pub struct ScanSubscription {
    pub events: mpsc::Receiver<Advertisement>,
    pub stop: StopHandle,
}

/// An active value-change subscription on one characteristic.
#[derive(Debug)]
pub struct ValueSubscription {
    pub values: mpsc::Receiver<Vec<u8>>,
    pub stop: StopHandle,
}

/// Platform BLE stack operations used by a session.
///
/// Enumeration and read calls must bypass any platform cache: the
/// bridge promises clients current data, not snapshots of earlier
/// sessions.
#[async_trait]
pub trait HardwareProvider: Send + Sync + 'static {
    /// Start an advertisement scan with the given signal gating.
    async fn start_scan(&self, gating: ScanGating) -> Result<ScanSubscription, ProviderError>;

    /// Enumerate the peripheral's GATT services, uncached.
    async fn enumerate_services(&self, peripheral: u64) -> Result<Vec<Uuid>, ProviderError>;

    /// List the characteristics of one service, uncached.
    async fn list_characteristics(
        &self,
        peripheral: u64,
        service: Uuid,
    ) -> Result<Vec<Uuid>, ProviderError>;

    /// Look up one characteristic by UUID, uncached. `None` when the
    /// service exposes no such characteristic.
    async fn find_characteristic(
        &self,
        peripheral: u64,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<Option<Uuid>, ProviderError>;

    /// Read the current value of a characteristic, uncached.
    async fn read_value(
        &self,
        peripheral: u64,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<Vec<u8>, ProviderError>;

    /// Write a value to a characteristic.
    async fn write_value(
        &self,
        peripheral: u64,
        service: Uuid,
        characteristic: Uuid,
        value: &[u8],
    ) -> Result<(), ProviderError>;

    /// Subscribe to value changes on a characteristic.
    async fn subscribe(
        &self,
        peripheral: u64,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<ValueSubscription, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connectable_kinds() {
        assert!(AdvertisementKind::ConnectableUndirected.is_connectable());
        assert!(AdvertisementKind::ConnectableDirected.is_connectable());
        assert!(AdvertisementKind::ScanResponse.is_connectable());
        assert!(!AdvertisementKind::ScannableUndirected.is_connectable());
        assert!(!AdvertisementKind::NonConnectableUndirected.is_connectable());
    }

    #[test]
    fn test_unreachable_maps_to_application_error() {
        let err: BridgeError = ProviderError::Unreachable.into();
        assert_eq!(err.code(), crate::error::CODE_APPLICATION_ERROR);
        assert_eq!(err.to_string(), "destination unreachable");
    }
}

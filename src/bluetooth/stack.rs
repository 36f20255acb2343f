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

//! BlueZ-backed hardware provider.

use anyhow::Result;
use async_trait::async_trait;
use bluer::gatt::remote::{Characteristic, Service};
use bluer::{Adapter, AdapterEvent, Address, Device, DiscoveryFilter, DiscoveryTransport};
use futures::StreamExt;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::provider::{
    Advertisement, AdvertisementKind, HardwareProvider, ProviderError, ScanGating,
    ScanSubscription, StopHandle, ValueSubscription, RSSI_UNAVAILABLE,
};

/// How long to wait for BlueZ to finish resolving GATT services.
const SERVICE_RESOLUTION_TIMEOUT: Duration = Duration::from_secs(15);
const SERVICE_RESOLUTION_POLL: Duration = Duration::from_millis(100);

/// Hardware provider backed by BlueZ over D-Bus.
pub struct BluerProvider {
    _session: bluer::Session,
    adapter: Adapter,
}

impl BluerProvider {
    /// Connect to BlueZ and power on the default adapter.
    pub async fn new() -> Result<Self> {
        info!("Initializing BlueZ session...");
        let session = bluer::Session::new().await?;

        let adapter = session.default_adapter().await?;
        info!("Using Bluetooth adapter: {}", adapter.name());

        if !adapter.is_powered().await? {
            info!("Powering on Bluetooth adapter...");
            adapter.set_powered(true).await?;
        }

        Ok(Self {
            _session: session,
            adapter,
        })
    }

    fn device(&self, peripheral: u64) -> Result<Device, ProviderError> {
        let bytes = peripheral.to_be_bytes();
        let address = Address::new([bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7]]);
        self.adapter.device(address).map_err(map_bluer_error)
    }

    /// Connect (if needed) and wait until BlueZ has resolved the
    /// peripheral's services, so enumeration reflects current state.
    async fn connected_device(&self, peripheral: u64) -> Result<Device, ProviderError> {
        let device = self.device(peripheral)?;
        if !device.is_connected().await.map_err(map_bluer_error)? {
            device.connect().await.map_err(map_bluer_error)?;
        }

        let mut waited = Duration::ZERO;
        while !device
            .is_services_resolved()
            .await
            .map_err(map_bluer_error)?
        {
            if waited >= SERVICE_RESOLUTION_TIMEOUT {
                return Err(ProviderError::Status(
                    "service resolution timed out".to_string(),
                ));
            }
            sleep(SERVICE_RESOLUTION_POLL).await;
            waited += SERVICE_RESOLUTION_POLL;
        }
        Ok(device)
    }

    async fn find_service(
        &self,
        peripheral: u64,
        uuid: Uuid,
    ) -> Result<Option<Service>, ProviderError> {
        let device = self.connected_device(peripheral).await?;
        for service in device.services().await.map_err(map_bluer_error)? {
            if service.uuid().await.map_err(map_bluer_error)? == uuid {
                return Ok(Some(service));
            }
        }
        Ok(None)
    }

    async fn characteristic(
        &self,
        peripheral: u64,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<Characteristic, ProviderError> {
        let service = self
            .find_service(peripheral, service)
            .await?
            .ok_or_else(|| ProviderError::Status(format!("service {} not present", service)))?;
        for candidate in service.characteristics().await.map_err(map_bluer_error)? {
            if candidate.uuid().await.map_err(map_bluer_error)? == characteristic {
                return Ok(candidate);
            }
        }
        Err(ProviderError::Status(format!(
            "characteristic {} not present",
            characteristic
        )))
    }
}

fn map_bluer_error(err: bluer::Error) -> ProviderError {
    use bluer::ErrorKind;
    match err.kind {
        ErrorKind::ConnectionAttemptFailed => ProviderError::Unreachable,
        _ => ProviderError::Status(err.to_string()),
    }
}

fn address_to_u64(address: Address) -> u64 {
    let a = address.0;
    u64::from_be_bytes([0, 0, a[0], a[1], a[2], a[3], a[4], a[5]])
}

/// Build an advertisement event from the adapter's view of a device.
/// BlueZ does not surface the PDU type; devices it reports through
/// discovery are connectable.
async fn advertisement_for(adapter: &Adapter, address: Address) -> Option<Advertisement> {
    let device = adapter.device(address).ok()?;
    let local_name = device.name().await.ok().flatten();
    let rssi = device.rssi().await.ok().flatten().unwrap_or(RSSI_UNAVAILABLE);
    let services = device
        .uuids()
        .await
        .ok()
        .flatten()
        .map(|uuids| uuids.into_iter().collect())
        .unwrap_or_default();
    Some(Advertisement {
        peripheral: address_to_u64(address),
        local_name,
        rssi,
        kind: AdvertisementKind::ConnectableUndirected,
        services,
    })
}

#[async_trait]
impl HardwareProvider for BluerProvider {
    async fn start_scan(&self, gating: ScanGating) -> Result<ScanSubscription, ProviderError> {
        // BlueZ offers a single RSSI floor; the hysteresis margin and
        // out-of-range timeout stay with bluetoothd's device expiry.
        let filter = DiscoveryFilter {
            transport: DiscoveryTransport::Le,
            rssi: Some(gating.out_of_range_dbm),
            duplicate_data: true,
            ..Default::default()
        };
        self.adapter
            .set_discovery_filter(filter)
            .await
            .map_err(map_bluer_error)?;

        let mut discovery = self
            .adapter
            .discover_devices_with_changes()
            .await
            .map_err(map_bluer_error)?;

        let (event_tx, event_rx) = mpsc::channel(64);
        let (stop_tx, mut stop_rx) = oneshot::channel();
        let adapter = self.adapter.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    event = discovery.next() => match event {
                        Some(AdapterEvent::DeviceAdded(address)) => {
                            if let Some(advertisement) = advertisement_for(&adapter, address).await {
                                if event_tx.send(advertisement).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Some(_) => {}
                        None => break,
                    },
                }
            }
            // dropping the discovery stream ends the BlueZ scan
            debug!("advertisement scan stopped");
        });

        Ok(ScanSubscription {
            events: event_rx,
            stop: StopHandle::new(stop_tx),
        })
    }

    async fn enumerate_services(&self, peripheral: u64) -> Result<Vec<Uuid>, ProviderError> {
        let device = self.connected_device(peripheral).await?;
        let mut uuids = Vec::new();
        for service in device.services().await.map_err(map_bluer_error)? {
            uuids.push(service.uuid().await.map_err(map_bluer_error)?);
        }
        Ok(uuids)
    }

    async fn list_characteristics(
        &self,
        peripheral: u64,
        service: Uuid,
    ) -> Result<Vec<Uuid>, ProviderError> {
        let service = self
            .find_service(peripheral, service)
            .await?
            .ok_or_else(|| ProviderError::Status(format!("service {} not present", service)))?;
        let mut uuids = Vec::new();
        for characteristic in service.characteristics().await.map_err(map_bluer_error)? {
            uuids.push(characteristic.uuid().await.map_err(map_bluer_error)?);
        }
        Ok(uuids)
    }

    async fn find_characteristic(
        &self,
        peripheral: u64,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<Option<Uuid>, ProviderError> {
        let listed = self.list_characteristics(peripheral, service).await?;
        Ok(listed.into_iter().find(|uuid| *uuid == characteristic))
    }

    async fn read_value(
        &self,
        peripheral: u64,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<Vec<u8>, ProviderError> {
        let characteristic = self.characteristic(peripheral, service, characteristic).await?;
        characteristic.read().await.map_err(map_bluer_error)
    }

    async fn write_value(
        &self,
        peripheral: u64,
        service: Uuid,
        characteristic: Uuid,
        value: &[u8],
    ) -> Result<(), ProviderError> {
        let characteristic = self.characteristic(peripheral, service, characteristic).await?;
        characteristic.write(value).await.map_err(map_bluer_error)
    }

    async fn subscribe(
        &self,
        peripheral: u64,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<ValueSubscription, ProviderError> {
        let characteristic = self.characteristic(peripheral, service, characteristic).await?;
        let mut notifications = characteristic.notify().await.map_err(map_bluer_error)?;

        let (value_tx, value_rx) = mpsc::channel(32);
        let (stop_tx, mut stop_rx) = oneshot::channel();
        tokio::spawn(async move {
            let mut notifications = std::pin::pin!(notifications);
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    value = notifications.next() => match value {
                        Some(value) => {
                            if value_tx.send(value).await.is_err() {
                                break;
                            }
                        }
                        None => {
                            warn!("notification stream ended by peripheral");
                            break;
                        }
                    },
                }
            }
            // dropping the stream clears the CCCD subscription
        });

        Ok(ValueSubscription {
            values: value_rx,
            stop: StopHandle::new(stop_tx),
        })
    }
}

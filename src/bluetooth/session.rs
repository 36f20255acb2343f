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

//! Per-client BLE session.
//!
//! Each session moves through three phases: `Initial` until the first
//! `discover`, `Discovering` while a watcher feeds the discovery
//! registry, and `Connected` once the client has committed to a
//! peripheral. Requests are handled one at a time per session, so a
//! phase check and the commit that follows it can never interleave
//! with another transition. Hardware events never enter that path:
//! advertisements and value changes are forwarded to the client by
//! dedicated tasks over the outbound channel.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::bluetooth::blocklist::{self, GattOperation};
use crate::bluetooth::filters::FilterSet;
use crate::bluetooth::provider::{
    HardwareProvider, ScanGating, ScanSubscription, StopHandle, ValueSubscription,
    RSSI_UNAVAILABLE,
};
use crate::bluetooth::uuids;
use crate::encoding;
use crate::error::BridgeError;
use crate::protocol::{
    CharacteristicDidChange, ConnectParams, DidDiscoverPeripheral, DiscoverParams, Notification,
    ReadParams, ReadResult, Request, Response, StopNotificationsParams, UuidArg, WriteParams,
};

/// Protocol version reported by `getVersion`.
pub const PROTOCOL_VERSION: &str = "1.3";

/// Peripheral addresses reported during the current discovery epoch.
/// Shared between the session and its advertisement forwarder.
type DiscoveryRegistry = Arc<Mutex<HashSet<u64>>>;

/// An event-forwarding task together with the handle that
/// unsubscribes its hardware stream.
struct Forwarder {
    stop: StopHandle,
    task: JoinHandle<()>,
}

impl Forwarder {
    /// Unsubscribe from the hardware stream, then wait for the
    /// forwarding task to drain; nothing stale is delivered after
    /// this returns.
    async fn shut_down(self) {
        self.stop.stop();
        let _ = self.task.await;
    }
}

/// Discovery-phase state.
struct Discovery {
    filters: Arc<FilterSet>,
    optional_services: HashSet<Uuid>,
    registry: DiscoveryRegistry,
    watcher: Forwarder,
}

/// Connected-phase state. The service snapshot is captured once at
/// connect time and never re-queried; the allowed-service set is
/// immutable for the lifetime of the connection.
struct Connection {
    peripheral: u64,
    services: Vec<Uuid>,
    allowed_services: HashSet<Uuid>,
    subscriptions: HashMap<(Uuid, Uuid), Forwarder>,
}

enum Phase {
    Initial,
    Discovering(Discovery),
    Connected(Connection),
}

/// One client's BLE bridge session.
pub struct Session<P: HardwareProvider> {
    provider: Arc<P>,
    gating: ScanGating,
    outbound: mpsc::Sender<String>,
    phase: Phase,
}

impl<P: HardwareProvider> Session<P> {
    pub fn new(provider: Arc<P>, gating: ScanGating, outbound: mpsc::Sender<String>) -> Self {
        Self {
            provider,
            gating,
            outbound,
            phase: Phase::Initial,
        }
    }

    /// Handle one client request, producing the matching response.
    pub async fn handle_request(&mut self, request: Request) -> Response {
        let id = request.id.clone();
        match self.dispatch(request).await {
            Ok(result) => Response::success(id, result),
            Err(err) => {
                debug!("request failed: {}", err);
                Response::failure(id, &err)
            }
        }
    }

    async fn dispatch(&mut self, request: Request) -> Result<Value, BridgeError> {
        match request.method.as_str() {
            "getVersion" => Ok(json!({ "protocol": PROTOCOL_VERSION })),
            "pingMe" => Ok(json!("willPing")),
            "discover" => self.discover(parse_params(request.params)?).await,
            "connect" => self.connect(parse_params(request.params)?).await,
            "read" => self.read(parse_params(request.params)?).await,
            "write" => self.write(parse_params(request.params)?).await,
            "stopNotifications" => {
                self.stop_notifications(parse_params(request.params)?).await
            }
            other => Err(BridgeError::MethodNotFound(other.to_string())),
        }
    }

    /// Start (or restart) discovery with a new filter set.
    async fn discover(&mut self, params: DiscoverParams) -> Result<Value, BridgeError> {
        if matches!(self.phase, Phase::Connected(_)) {
            return Err(BridgeError::invalid_request(
                "cannot discover when connected",
            ));
        }

        let filters = Arc::new(FilterSet::compile(&params.filters)?);
        let optional_services = params
            .optional_services
            .iter()
            .map(uuids::parse_arg)
            .collect::<Result<HashSet<_>, _>>()?;

        // All fallible work happens before any state is touched: a
        // failed discover leaves the previous epoch running.
        let subscription = self.provider.start_scan(self.gating).await?;

        if let Phase::Discovering(previous) = std::mem::replace(&mut self.phase, Phase::Initial) {
            previous.watcher.shut_down().await;
        }

        let registry: DiscoveryRegistry = Arc::new(Mutex::new(HashSet::new()));
        let watcher =
            self.spawn_advertisement_forwarder(subscription, Arc::clone(&filters), Arc::clone(&registry));
        self.phase = Phase::Discovering(Discovery {
            filters,
            optional_services,
            registry,
            watcher,
        });
        Ok(Value::Null)
    }

    /// The advertisement adapter: gates raw scan events, matches them
    /// against the filter set, records accepted peripherals and emits
    /// `didDiscoverPeripheral`.
    fn spawn_advertisement_forwarder(
        &self,
        subscription: ScanSubscription,
        filters: Arc<FilterSet>,
        registry: DiscoveryRegistry,
    ) -> Forwarder {
        let ScanSubscription { mut events, stop } = subscription;
        let outbound = self.outbound.clone();
        let task = tokio::spawn(async move {
            while let Some(advertisement) = events.recv().await {
                if advertisement.rssi == RSSI_UNAVAILABLE {
                    // spurious reading
                    continue;
                }
                if !advertisement.kind.is_connectable() {
                    continue;
                }
                if !filters.matches(&advertisement) {
                    continue;
                }
                // Re-reports of a known peripheral re-emit the
                // notification so clients see fresh RSSI.
                registry.lock().insert(advertisement.peripheral);
                emit(
                    &outbound,
                    "didDiscoverPeripheral",
                    DidDiscoverPeripheral {
                        peripheral_id: advertisement.peripheral,
                        name: advertisement.local_name.unwrap_or_default(),
                        rssi: advertisement.rssi,
                    },
                )
                .await;
            }
        });
        Forwarder { stop, task }
    }

    /// Connect to a previously reported peripheral.
    async fn connect(&mut self, params: ConnectParams) -> Result<Value, BridgeError> {
        match &self.phase {
            Phase::Connected(_) => {
                return Err(BridgeError::invalid_request(
                    "already connected to a peripheral",
                ));
            }
            Phase::Initial => {
                return Err(BridgeError::invalid_params(format!(
                    "invalid peripheral ID: {}",
                    params.peripheral_id
                )));
            }
            Phase::Discovering(discovery) => {
                // A client may only connect to a peripheral it was shown.
                if !discovery.registry.lock().contains(&params.peripheral_id) {
                    return Err(BridgeError::invalid_params(format!(
                        "invalid peripheral ID: {}",
                        params.peripheral_id
                    )));
                }
            }
        }

        // Fresh enumeration; a failure here leaves the discovery
        // epoch fully intact.
        let services = self
            .provider
            .enumerate_services(params.peripheral_id)
            .await?;

        let Phase::Discovering(discovery) = std::mem::replace(&mut self.phase, Phase::Initial)
        else {
            // requests are serialized per session, so the phase
            // cannot have changed across the await
            return Err(BridgeError::invalid_request("discovery state lost"));
        };

        let mut allowed_services: HashSet<Uuid> = discovery.filters.required_services().collect();
        allowed_services.extend(discovery.optional_services.iter().copied());

        discovery.watcher.shut_down().await;
        discovery.registry.lock().clear();

        debug!(
            "connected to {:012x}: {} services, {} allowed",
            params.peripheral_id,
            services.len(),
            allowed_services.len()
        );
        self.phase = Phase::Connected(Connection {
            peripheral: params.peripheral_id,
            services,
            allowed_services,
            subscriptions: HashMap::new(),
        });
        Ok(Value::Null)
    }

    /// Resolve optional service/characteristic addressing to a
    /// concrete endpoint, enforcing the allowed-service set and the
    /// block list.
    async fn resolve_endpoint(
        provider: &P,
        connection: &Connection,
        service_id: Option<&UuidArg>,
        characteristic_id: Option<&UuidArg>,
        operation: GattOperation,
    ) -> Result<(Uuid, Uuid), BridgeError> {
        let service = match service_id {
            Some(arg) => uuids::parse_arg(arg)?,
            None => *connection
                .services
                .first()
                .ok_or_else(|| BridgeError::invalid_params("peripheral has no services"))?,
        };

        // Session-level gate, independent of the block list.
        if !connection.allowed_services.contains(&service) {
            return Err(BridgeError::invalid_params(format!(
                "service {} is not in the allowed services list",
                service
            )));
        }
        if blocklist::is_blocked(service, operation) {
            return Err(BridgeError::invalid_params(format!(
                "service {} is blocked",
                service
            )));
        }
        if !connection.services.contains(&service) {
            return Err(BridgeError::invalid_params(format!(
                "service {} not found",
                service
            )));
        }

        let (characteristic, already_located) = match characteristic_id {
            Some(arg) => (uuids::parse_arg(arg)?, false),
            None => {
                let listed = provider
                    .list_characteristics(connection.peripheral, service)
                    .await?;
                let first = *listed.first().ok_or_else(|| {
                    BridgeError::invalid_params(format!(
                        "service {} has no characteristics",
                        service
                    ))
                })?;
                (first, true)
            }
        };

        if blocklist::is_blocked(characteristic, operation) {
            return Err(BridgeError::invalid_params(format!(
                "characteristic {} is blocked",
                characteristic
            )));
        }

        if !already_located {
            let found = provider
                .find_characteristic(connection.peripheral, service, characteristic)
                .await?;
            if found.is_none() {
                return Err(BridgeError::invalid_params(format!(
                    "characteristic {} not found on service {}",
                    characteristic, service
                )));
            }
        }

        Ok((service, characteristic))
    }

    fn connection(&self) -> Result<&Connection, BridgeError> {
        match &self.phase {
            Phase::Connected(connection) => Ok(connection),
            _ => Err(BridgeError::invalid_request(
                "not connected to a peripheral",
            )),
        }
    }

    /// Read a characteristic value, optionally subscribing to changes.
    async fn read(&mut self, params: ReadParams) -> Result<Value, BridgeError> {
        let connection = self.connection()?;
        let (service, characteristic) = Self::resolve_endpoint(
            self.provider.as_ref(),
            connection,
            params.service_id.as_ref(),
            params.characteristic_id.as_ref(),
            GattOperation::Read,
        )
        .await?;

        let value = self
            .provider
            .read_value(connection.peripheral, service, characteristic)
            .await?;
        let peripheral = connection.peripheral;

        // absent -> base64; explicit null -> no re-encoding
        let encoding = match params.encoding {
            None => Some("base64".to_string()),
            Some(requested) => requested,
        };
        let message = encoding::encode_value(&value, encoding.as_deref())?;

        if params.start_notifications {
            self.start_notifications(peripheral, service, characteristic)
                .await?;
        }

        to_result(ReadResult { message, encoding })
    }

    /// Subscribe to value changes on an endpoint; a no-op when the
    /// subscription is already active.
    async fn start_notifications(
        &mut self,
        peripheral: u64,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<(), BridgeError> {
        let Phase::Connected(connection) = &mut self.phase else {
            return Err(BridgeError::invalid_request(
                "not connected to a peripheral",
            ));
        };
        if connection
            .subscriptions
            .contains_key(&(service, characteristic))
        {
            return Ok(());
        }

        let subscription = self
            .provider
            .subscribe(peripheral, service, characteristic)
            .await?;
        let ValueSubscription { mut values, stop } = subscription;
        let outbound = self.outbound.clone();
        let task = tokio::spawn(async move {
            while let Some(value) = values.recv().await {
                // Changed values always go out base64-encoded, no
                // matter what encoding the subscribing read asked for.
                emit(
                    &outbound,
                    "characteristicDidChange",
                    CharacteristicDidChange {
                        service_id: service.to_string(),
                        characteristic_id: characteristic.to_string(),
                        message: encoding::to_base64(&value),
                        encoding: "base64",
                    },
                )
                .await;
            }
        });
        connection
            .subscriptions
            .insert((service, characteristic), Forwarder { stop, task });
        Ok(())
    }

    /// Write a value to a characteristic; returns the decoded byte
    /// length.
    async fn write(&mut self, params: WriteParams) -> Result<Value, BridgeError> {
        let connection = self.connection()?;
        let data = encoding::decode_message(&params.message, params.encoding.as_deref())?;
        let (service, characteristic) = Self::resolve_endpoint(
            self.provider.as_ref(),
            connection,
            params.service_id.as_ref(),
            params.characteristic_id.as_ref(),
            GattOperation::Write,
        )
        .await?;

        self.provider
            .write_value(connection.peripheral, service, characteristic, &data)
            .await?;
        Ok(json!(data.len()))
    }

    /// Stop a value-change subscription. Unsubscribing an endpoint
    /// with no active subscription is a no-op.
    async fn stop_notifications(
        &mut self,
        params: StopNotificationsParams,
    ) -> Result<Value, BridgeError> {
        let connection = self.connection()?;
        // A characteristic block-listed for reads cannot have its
        // notification state toggled.
        let (service, characteristic) = Self::resolve_endpoint(
            self.provider.as_ref(),
            connection,
            params.service_id.as_ref(),
            params.characteristic_id.as_ref(),
            GattOperation::Read,
        )
        .await?;

        let Phase::Connected(connection) = &mut self.phase else {
            return Err(BridgeError::invalid_request(
                "not connected to a peripheral",
            ));
        };
        if let Some(subscription) = connection.subscriptions.remove(&(service, characteristic)) {
            subscription.shut_down().await;
        }
        Ok(Value::Null)
    }

    /// Release the watcher and every subscription. Called when the
    /// client transport goes away; there is no protocol-level
    /// disconnect.
    pub async fn shutdown(self) {
        match self.phase {
            Phase::Initial => {}
            Phase::Discovering(discovery) => discovery.watcher.shut_down().await,
            Phase::Connected(connection) => {
                for (_, subscription) in connection.subscriptions {
                    subscription.shut_down().await;
                }
            }
        }
    }
}

fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, BridgeError> {
    serde_json::from_value(params)
        .map_err(|err| BridgeError::invalid_params(err.to_string()))
}

fn to_result<T: Serialize>(result: T) -> Result<Value, BridgeError> {
    serde_json::to_value(result).map_err(|err| BridgeError::application(err.to_string()))
}

/// Send a server-originated notification over the outbound channel.
async fn emit<T: Serialize>(outbound: &mpsc::Sender<String>, method: &str, params: T) {
    match Notification::line(method, params) {
        Ok(line) => {
            if outbound.send(line).await.is_err() {
                warn!("client outbound channel closed, dropping {}", method);
            }
        }
        Err(err) => warn!("failed to encode {} notification: {}", method, err),
    }
}

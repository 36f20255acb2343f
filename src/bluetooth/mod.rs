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

//! BLE bridge module.
//!
//! Session state machine, filter matching, access control and the
//! hardware provider seam with its BlueZ implementation.

pub mod blocklist;
pub mod filters;
pub mod provider;
pub mod session;
pub mod stack;
pub mod uuids;

pub use blocklist::GattOperation;
pub use filters::{FilterSet, ScanFilter};
pub use provider::{
    Advertisement, AdvertisementKind, HardwareProvider, ProviderError, ScanGating,
    ScanSubscription, StopHandle, ValueSubscription, RSSI_UNAVAILABLE,
};
pub use session::{Session, PROTOCOL_VERSION};
pub use stack::BluerProvider;

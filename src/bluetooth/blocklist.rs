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

//! Static GATT block list.
//!
//! Well-known services and characteristics that clients may never
//! touch, regardless of their allowed-service set. The table is fixed
//! for the lifetime of the process and consulted on every endpoint
//! resolution.

use uuid::Uuid;

/// The operation a client is attempting against an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GattOperation {
    Read,
    Write,
}

struct BlockEntry {
    uuid: Uuid,
    forbids_reads: bool,
    forbids_writes: bool,
}

const fn exclude(uuid: u128) -> BlockEntry {
    BlockEntry {
        uuid: Uuid::from_u128(uuid),
        forbids_reads: true,
        forbids_writes: true,
    }
}

const fn exclude_writes(uuid: u128) -> BlockEntry {
    BlockEntry {
        uuid: Uuid::from_u128(uuid),
        forbids_reads: false,
        forbids_writes: true,
    }
}

/// Entries follow the Web Bluetooth GATT block list.
const BLOCK_LIST: &[BlockEntry] = &[
    // Human Interface Device service
    exclude(0x00001812_0000_1000_8000_00805f9b34fb),
    // Nordic legacy DFU service
    exclude_writes(0x00001530_1212_efde_1523_785feabcd123),
    // Nordic secure DFU service
    exclude_writes(0x0000fe59_0000_1000_8000_00805f9b34fb),
    // TI over-the-air download service
    exclude_writes(0xf000ffc0_0451_4000_b000_000000000000),
    // Peripheral Privacy Flag characteristic
    exclude_writes(0x00002a02_0000_1000_8000_00805f9b34fb),
    // Reconnection Address characteristic
    exclude(0x00002a03_0000_1000_8000_00805f9b34fb),
    // Serial Number String characteristic
    exclude(0x00002a25_0000_1000_8000_00805f9b34fb),
];

/// Whether the block list forbids `operation` on `uuid`. Identifiers
/// absent from the table are unrestricted.
pub fn is_blocked(uuid: Uuid, operation: GattOperation) -> bool {
    BLOCK_LIST.iter().any(|entry| {
        entry.uuid == uuid
            && match operation {
                GattOperation::Read => entry.forbids_reads,
                GattOperation::Write => entry.forbids_writes,
            }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bluetooth::uuids::from_short;

    #[test]
    fn test_hid_service_fully_blocked() {
        let hid = from_short(0x1812);
        assert!(is_blocked(hid, GattOperation::Read));
        assert!(is_blocked(hid, GattOperation::Write));
    }

    #[test]
    fn test_dfu_services_write_blocked() {
        let secure_dfu = from_short(0xfe59);
        assert!(!is_blocked(secure_dfu, GattOperation::Read));
        assert!(is_blocked(secure_dfu, GattOperation::Write));

        let legacy_dfu = Uuid::from_u128(0x00001530_1212_efde_1523_785feabcd123);
        assert!(is_blocked(legacy_dfu, GattOperation::Write));
    }

    #[test]
    fn test_privacy_flag_readable_not_writable() {
        let privacy_flag = from_short(0x2a02);
        assert!(!is_blocked(privacy_flag, GattOperation::Read));
        assert!(is_blocked(privacy_flag, GattOperation::Write));
    }

    #[test]
    fn test_unlisted_uuid_unrestricted() {
        let battery = from_short(0x180f);
        assert!(!is_blocked(battery, GattOperation::Read));
        assert!(!is_blocked(battery, GattOperation::Write));
    }
}

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

//! GATT identifier parsing and shorthand expansion.

use uuid::Uuid;

use crate::error::BridgeError;
use crate::protocol::UuidArg;

/// The Bluetooth base UUID, 00000000-0000-1000-8000-00805f9b34fb.
/// 16- and 32-bit assigned numbers occupy the top 32 bits.
pub const BLUETOOTH_BASE_UUID: u128 = 0x00000000_0000_1000_8000_00805f9b34fb;

/// Expand a 16- or 32-bit assigned number against the base UUID.
pub fn from_short(value: u32) -> Uuid {
    Uuid::from_u128(BLUETOOTH_BASE_UUID | ((value as u128) << 96))
}

/// Parse a textual GATT identifier: the full 128-bit form, or a hex
/// shorthand of up to 8 digits (with optional `0x` prefix).
pub fn parse(text: &str) -> Result<Uuid, BridgeError> {
    let trimmed = text.trim();
    if trimmed.contains('-') {
        return Uuid::parse_str(trimmed)
            .map_err(|err| BridgeError::invalid_params(format!("invalid UUID {:?}: {}", text, err)));
    }

    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if digits.is_empty() || digits.len() > 8 {
        return Err(BridgeError::invalid_params(format!(
            "invalid UUID {:?}",
            text
        )));
    }
    let value = u32::from_str_radix(digits, 16)
        .map_err(|err| BridgeError::invalid_params(format!("invalid UUID {:?}: {}", text, err)))?;
    Ok(from_short(value))
}

/// Resolve a protocol UUID argument to a concrete identifier.
pub fn parse_arg(arg: &UuidArg) -> Result<Uuid, BridgeError> {
    match arg {
        UuidArg::Number(value) => Ok(from_short(*value)),
        UuidArg::Text(text) => parse(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_expansion() {
        assert_eq!(
            from_short(0x180f).to_string(),
            "0000180f-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(
            from_short(0xf000ffc0).to_string(),
            "f000ffc0-0000-1000-8000-00805f9b34fb"
        );
    }

    #[test]
    fn test_parse_forms() {
        let full = parse("0000180f-0000-1000-8000-00805f9b34fb").unwrap();
        assert_eq!(full, from_short(0x180f));
        assert_eq!(parse("180f").unwrap(), full);
        assert_eq!(parse("0x180F").unwrap(), full);
        assert_eq!(parse_arg(&UuidArg::Number(0x180f)).unwrap(), full);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse("").is_err());
        assert!(parse("not-a-uuid").is_err());
        assert!(parse("123456789").is_err());
        assert!(parse("0xzz").is_err());
    }
}

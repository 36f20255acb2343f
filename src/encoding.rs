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

//! Payload encoding helpers.
//!
//! Protocol messages carry characteristic values as strings, either
//! base64-encoded or as raw UTF-8 text when no encoding is named.

use base64::prelude::BASE64_STANDARD;
use base64::Engine;

use crate::error::BridgeError;

/// Decode a client-supplied message into raw bytes.
pub fn decode_message(message: &str, encoding: Option<&str>) -> Result<Vec<u8>, BridgeError> {
    match encoding {
        None => Ok(message.as_bytes().to_vec()),
        Some("base64") => BASE64_STANDARD
            .decode(message)
            .map_err(|err| BridgeError::invalid_params(format!("invalid base64 message: {}", err))),
        Some(other) => Err(BridgeError::invalid_params(format!(
            "unsupported encoding: {}",
            other
        ))),
    }
}

/// Encode a characteristic value for a protocol message. With no
/// encoding the bytes are returned as UTF-8 text, lossily.
pub fn encode_value(value: &[u8], encoding: Option<&str>) -> Result<String, BridgeError> {
    match encoding {
        None => Ok(String::from_utf8_lossy(value).into_owned()),
        Some("base64") => Ok(BASE64_STANDARD.encode(value)),
        Some(other) => Err(BridgeError::invalid_params(format!(
            "unsupported encoding: {}",
            other
        ))),
    }
}

/// Base64 encoding of a value, as used for all outbound value-change
/// notifications.
pub fn to_base64(value: &[u8]) -> String {
    BASE64_STANDARD.encode(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_round_trip() {
        let bytes = decode_message("AQID", Some("base64")).unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
        assert_eq!(encode_value(&bytes, Some("base64")).unwrap(), "AQID");
    }

    #[test]
    fn test_plain_text() {
        let bytes = decode_message("hello", None).unwrap();
        assert_eq!(bytes, b"hello");
        assert_eq!(encode_value(&bytes, None).unwrap(), "hello");
    }

    #[test]
    fn test_invalid_base64_rejected() {
        let err = decode_message("not//valid!!", Some("base64")).unwrap_err();
        assert_eq!(err.code(), crate::error::CODE_INVALID_PARAMS);
    }

    #[test]
    fn test_unknown_encoding_rejected() {
        assert!(decode_message("x", Some("hex")).is_err());
        assert!(encode_value(b"x", Some("hex")).is_err());
    }

    #[test]
    fn test_to_base64() {
        assert_eq!(to_base64(&[1, 2, 3]), "AQID");
    }
}

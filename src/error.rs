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

//! Error taxonomy for the bridge protocol.
//!
//! Every error surfaced to a client maps onto one of four JSON-RPC
//! error codes; anything the hardware stack reports is folded into
//! the application-error bucket.

use thiserror::Error;

/// JSON-RPC error code for a request that is illegal in the current
/// session state.
pub const CODE_INVALID_REQUEST: i32 = -32600;
/// JSON-RPC error code for an unrecognized method name.
pub const CODE_METHOD_NOT_FOUND: i32 = -32601;
/// JSON-RPC error code for malformed or disallowed parameters.
pub const CODE_INVALID_PARAMS: i32 = -32602;
/// JSON-RPC error code for hardware failures and unsupported features.
pub const CODE_APPLICATION_ERROR: i32 = -32500;

/// Errors returned to the client as JSON-RPC error responses.
#[derive(Debug, Clone, Error)]
pub enum BridgeError {
    /// The operation is not legal in the session's current state.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Malformed or disallowed addressing or parameters.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// The method name is not part of the protocol surface.
    #[error("method not found: {0}")]
    MethodNotFound(String),

    /// A hardware failure or an unsupported feature.
    #[error("{0}")]
    Application(String),
}

impl BridgeError {
    /// The JSON-RPC error code for this error.
    pub fn code(&self) -> i32 {
        match self {
            BridgeError::InvalidRequest(_) => CODE_INVALID_REQUEST,
            BridgeError::InvalidParams(_) => CODE_INVALID_PARAMS,
            BridgeError::MethodNotFound(_) => CODE_METHOD_NOT_FOUND,
            BridgeError::Application(_) => CODE_APPLICATION_ERROR,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        BridgeError::InvalidRequest(message.into())
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        BridgeError::InvalidParams(message.into())
    }

    pub fn application(message: impl Into<String>) -> Self {
        BridgeError::Application(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(BridgeError::invalid_request("x").code(), -32600);
        assert_eq!(BridgeError::MethodNotFound("x".into()).code(), -32601);
        assert_eq!(BridgeError::invalid_params("x").code(), -32602);
        assert_eq!(BridgeError::application("x").code(), -32500);
    }
}

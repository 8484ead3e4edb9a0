//! Error-normalization interceptor
//!
//! Every non-2xx response is reduced to one [`ApiError`] carrying the
//! server's `status_message`. Bodies of calls negotiated as binary arrive as
//! raw bytes and are decoded as UTF-8 text before being parsed as JSON.

use super::transport::{ApiResponse, ResponseKind};
use crate::error::ApiError;
use reqwest::StatusCode;

/// Convert a failed response into the uniform error shape
pub fn normalize_failure(response: &ApiResponse, kind: ResponseKind) -> ApiError {
    let extracted = match kind {
        ResponseKind::Binary => decode_binary(&response.body),
        ResponseKind::Json => {
            status_message(&response.body).ok_or_else(|| "missing status_message".to_string())
        }
    };

    let message = match extracted {
        Ok(message) => message,
        // A binary body that is not a status envelope is only tolerated for 404,
        // which callers translate into their own message.
        Err(reason) if kind == ResponseKind::Binary && response.status != 404 => {
            return ApiError::Decode(reason)
        }
        Err(_) => fallback_message(response.status),
    };

    if response.status == 404 {
        ApiError::NotFound {
            status_message: message,
        }
    } else {
        ApiError::Http {
            status: response.status,
            status_message: message,
        }
    }
}

fn decode_binary(body: &[u8]) -> Result<String, String> {
    let text = std::str::from_utf8(body).map_err(|e| format!("error body is not UTF-8: {}", e))?;
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| format!("error body is not JSON: {}", e))?;
    value
        .get("status_message")
        .and_then(|message| message.as_str())
        .map(str::to_string)
        .ok_or_else(|| "error body has no status_message".to_string())
}

fn status_message(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    value.get("status_message")?.as_str().map(str::to_string)
}

fn fallback_message(status: u16) -> String {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .map(str::to_string)
        .unwrap_or_else(|| format!("Request failed with status {}", status))
}

//! Response envelope handling
//!
//! The persistence service is inconsistent about envelopes: some routes wrap
//! the payload under a `data` key, others return it directly, and a few
//! return 200 with an error body. `decode_body` normalizes all three.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ApiError, Result};

/// A response payload that may or may not be wrapped under a `data` key.
///
/// Variant order matters: the wrapped shape is tried first, which would
/// misread a bare payload that itself carried a `data` field of the right
/// shape. None of the wire types have one; a payload that grows a `data`
/// field needs its own decoding path.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    pub fn into_inner(self) -> T {
        match self {
            Envelope::Wrapped { data } => data,
            Envelope::Bare(inner) => inner,
        }
    }
}

/// Error body shape used by routes that answer 200 on failure.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Decode a response body into `T`, accepting both envelope shapes and
/// normalizing error bodies into [`ApiError`].
pub(crate) fn decode_body<T: DeserializeOwned>(status: u16, body: &str) -> Result<T> {
    if !(200..300).contains(&status) {
        return Err(ApiError::from_status_body(status, body.to_string()));
    }

    match serde_json::from_str::<Envelope<T>>(body) {
        Ok(envelope) => Ok(envelope.into_inner()),
        Err(parse_err) => {
            // A success status with an unparseable payload is either an
            // error-bodied 200 or a contract break; tell them apart.
            if let Ok(ErrorBody { error }) = serde_json::from_str::<ErrorBody>(body) {
                return Err(ApiError::from_status_body(status, error));
            }
            Err(ApiError::Json(parse_err))
        }
    }
}

/// Decode a response whose payload the caller does not need.
pub(crate) fn decode_empty(status: u16, body: &str) -> Result<()> {
    if !(200..300).contains(&status) {
        return Err(ApiError::from_status_body(status, body.to_string()));
    }
    if let Ok(ErrorBody { error }) = serde_json::from_str::<ErrorBody>(body) {
        return Err(ApiError::from_status_body(status, error));
    }
    Ok(())
}

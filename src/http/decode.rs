//! Response body decoding.

use serde_json::Value;

use crate::error::{FailureCause, HuefyError};

/// Decodes a response body into a JSON value.
///
/// A blank body decodes to an empty object when `allow_empty` is set and is a
/// [`HuefyError::MalformedResponse`] otherwise, as is any body that is not
/// well-formed JSON.
pub fn decode_body(
    status: Option<u16>,
    body: &[u8],
    allow_empty: bool,
) -> Result<Value, HuefyError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        if allow_empty {
            return Ok(Value::Object(serde_json::Map::new()));
        }
        return Err(HuefyError::MalformedResponse {
            message: "empty response body".to_string(),
            status,
            source: FailureCause::EmptyBody,
        });
    }

    serde_json::from_slice(body).map_err(|e| HuefyError::MalformedResponse {
        message: e.to_string(),
        status,
        source: FailureCause::Decode(e),
    })
}

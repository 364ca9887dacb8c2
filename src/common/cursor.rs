//! Opaque pagination cursors.
//!
//! A cursor is the base64 encoding of the JSON form of the last evaluated key
//! returned by a query. The empty string means "no cursor" in both
//! directions: there are no more pages, or the read starts from the beginning.

use crate::{common, error};

use base64::{Engine, engine::general_purpose::STANDARD};
use serde_dynamo::{from_item, to_item};

const OPERATION: &str = "cursor";

/// Encode a last evaluated key into a cursor. An empty key encodes to `""`.
pub fn serialize(key: &common::Item) -> error::Result<String> {
    if key.is_empty() {
        return Ok(String::new());
    }
    let value: serde_json::Value =
        from_item(key.clone()).map_err(|err| error::Error::internal(OPERATION, err))?;
    let bytes = serde_json::to_vec(&value).map_err(|err| error::Error::internal(OPERATION, err))?;
    Ok(STANDARD.encode(bytes))
}

/// Decode a cursor into the key to resume from. `""` decodes to `None`.
pub fn deserialize(cursor: &str) -> error::Result<Option<common::Item>> {
    if cursor.is_empty() {
        return Ok(None);
    }
    let bytes = STANDARD
        .decode(cursor)
        .map_err(|err| error::Error::internal(OPERATION, err))?;
    let value: serde_json::Map<String, serde_json::Value> =
        serde_json::from_slice(&bytes).map_err(|err| error::Error::internal(OPERATION, err))?;
    let key: common::Item = to_item(value).map_err(|err| error::Error::internal(OPERATION, err))?;
    Ok(Some(key))
}

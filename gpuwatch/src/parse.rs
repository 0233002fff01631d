//! Decodes inbound push messages into `Snapshot`s.
//!
//! Rejection never escapes as a panic: callers get a `ParseError`, log it and
//! drop the message. Individual device entries that can't be decoded are
//! skipped without failing the whole snapshot.

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::types::{DeviceSample, Snapshot};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("message is not a JSON object")]
    NotAnObject,
    #[error("missing or non-numeric `timestamp`")]
    MissingTimestamp,
    #[error("`gpus` is missing or not an array")]
    DevicesNotArray,
}

pub fn parse_snapshot(raw: &str) -> Result<Snapshot, ParseError> {
    let v: Value = serde_json::from_str(raw)?;
    let Value::Object(mut obj) = v else {
        return Err(ParseError::NotAnObject);
    };
    let timestamp = obj
        .get("timestamp")
        .and_then(Value::as_f64)
        .filter(|t| t.is_finite())
        .ok_or(ParseError::MissingTimestamp)?;
    let Some(Value::Array(items)) = obj.remove("gpus") else {
        return Err(ParseError::DevicesNotArray);
    };

    let mut gpus = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value::<DeviceSample>(item) {
            Ok(s) => gpus.push(s),
            Err(e) => debug!(error = %e, "skipping undecodable device entry"),
        }
    }
    Ok(Snapshot { timestamp, gpus })
}

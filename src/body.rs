//! Body reader module
//!
//! Ingests a request's byte stream up to a hard cap and parses the result
//! as JSON. Only POST/PUT requests are read; everything else gets an empty
//! object without touching the stream.

use http_body_util::BodyExt;
use hyper::body::{Body, Bytes};
use serde::Deserialize;
use serde_json::Value;

use crate::dispatch::empty_object;
use crate::error::BodyError;

/// What to do with a POST/PUT body that is not valid JSON
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BodyPolicy {
    /// Swallow the parse error and treat the body as `{}` (the historical
    /// behavior; can mask client bugs)
    #[default]
    Lenient,
    /// Surface the parse error so the dispatcher can answer 400
    Strict,
}

/// Accumulate a request body and parse it as JSON.
///
/// The size check runs per frame: the moment the accumulated total would
/// exceed `limit`, reading stops with [`BodyError::TooLarge`] and the
/// dispatcher tears the connection down without a response. A payload of
/// exactly `limit` bytes is accepted. An empty payload yields `{}`.
pub async fn read_json<B>(body: B, limit: usize, policy: BodyPolicy) -> Result<Value, BodyError>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let mut body = body;
    let mut buffered: Vec<u8> = Vec::new();

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(|e| BodyError::Transport(e.into()))?;
        if let Ok(data) = frame.into_data() {
            if buffered.len() + data.len() > limit {
                return Err(BodyError::TooLarge { limit });
            }
            buffered.extend_from_slice(&data);
        }
    }

    if buffered.is_empty() {
        return Ok(empty_object());
    }

    match serde_json::from_slice(&buffered) {
        Ok(value) => Ok(value),
        Err(e) => match policy {
            BodyPolicy::Lenient => Ok(empty_object()),
            BodyPolicy::Strict => Err(BodyError::Malformed(e)),
        },
    }
}

use thiserror::Error;

/// Errors surfaced by the YoLink client.
///
/// Everything here is fatal to the call that produced it; the client never
/// retries on its own.
#[derive(Debug, Error)]
pub enum YoLinkError {
    /// Transport-level failure or a non-2xx HTTP status.
    #[error("YoLink HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The token endpoint rejected the grant or returned an unusable body.
    #[error("YoLink token exchange ({grant}) failed: {reason}")]
    Token { grant: &'static str, reason: String },

    /// The API answered with a status code other than `000000`.
    #[error("YoLink API error: method={method}, code={code}, desc={}", .desc.as_deref().unwrap_or("(no description)"))]
    Api {
        method: String,
        code: String,
        desc: Option<String>,
    },

    /// The response body was not a valid envelope.
    #[error("failed to parse YoLink response for {method}: {source}")]
    Envelope {
        method: String,
        #[source]
        source: serde_json::Error,
    },

    /// No decoder is registered for this (device type, method) pair.
    #[error("no decoder registered for device type {device_type:?} and method {method}")]
    UnknownDecoder {
        device_type: Option<String>,
        method: String,
    },

    /// The envelope reported success but carried no `data`.
    #[error("YoLink response for {method} has no data")]
    MissingData { method: String },

    /// The decoded payload is not the kind the caller asked for.
    #[error("YoLink response for {method} decoded to an unexpected payload")]
    UnexpectedPayload { method: String },

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// A payload did not have the shape its decoder expects.
///
/// Both variants name the record being decoded and the dotted JSON path, so
/// vendor payload drift shows up as e.g. `THSensor.getState: missing required
/// field 'state.temperature'`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("{record}: missing required field '{path}'")]
    MissingField { record: &'static str, path: String },

    #[error("{record}: field '{path}' is not {expected}")]
    InvalidType {
        record: &'static str,
        path: String,
        expected: &'static str,
    },
}

impl DecodeError {
    /// Dotted JSON path of the offending field.
    pub fn path(&self) -> &str {
        match self {
            DecodeError::MissingField { path, .. } | DecodeError::InvalidType { path, .. } => path,
        }
    }
}

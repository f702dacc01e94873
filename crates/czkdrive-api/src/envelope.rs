//! Response envelope decoding
//!
//! Every CZK endpoint answers with a JSON object carrying a status code, a
//! human-readable message and a `data` payload. The field names differ by
//! endpoint family, so each family declares the synonyms it accepts and the
//! order in which they are tried.
//!
//! ## Design Notes
//!
//! - An absent code field counts as success; the data payload decides.
//! - Numeric codes are truncated toward zero before comparison.
//! - A failing envelope with no message reports "unknown error".

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::CzkError;

/// Application code that signals success
pub const SUCCESS_CODE: i64 = 200;

/// Message used when a failing envelope carries none
pub const UNKNOWN_ERROR: &str = "unknown error";

/// Endpoint families and the envelope fields they use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeKind {
    /// list, create, move, rename, delete
    Operation,
    /// authenticate, refresh, download link
    Service,
    /// upload initiate and complete
    Upload,
}

impl EnvelopeKind {
    /// Code fields, in lookup order
    pub fn code_fields(self) -> &'static [&'static str] {
        match self {
            Self::Operation => &["code", "status"],
            Self::Service => &["status"],
            Self::Upload => &["status", "code"],
        }
    }

    /// Message fields, in lookup order
    pub fn message_fields(self) -> &'static [&'static str] {
        match self {
            Self::Operation => &["msg", "message"],
            Self::Service => &["message", "msg"],
            Self::Upload => &["msg", "message"],
        }
    }
}

/// A decoded response envelope
#[derive(Debug, Clone)]
pub struct Envelope {
    code: Option<i64>,
    message: Option<String>,
    success: Option<bool>,
    root: Value,
}

impl Envelope {
    /// Parses a response body for the given endpoint family
    ///
    /// # Errors
    /// Returns [`CzkError::Decode`] if the body is not a JSON object
    pub fn decode(body: &[u8], kind: EnvelopeKind) -> Result<Self, CzkError> {
        let root: Value = serde_json::from_slice(body)
            .map_err(|e| CzkError::Decode(format!("malformed JSON: {e}")))?;

        if !root.is_object() {
            return Err(CzkError::Decode("response body is not a JSON object".to_string()));
        }

        let code = kind
            .code_fields()
            .iter()
            .find_map(|field| root.get(*field).and_then(Value::as_f64))
            .map(|code| code.trunc() as i64);

        let message = kind
            .message_fields()
            .iter()
            .find_map(|field| root.get(*field).and_then(Value::as_str))
            .map(str::to_string);

        let success = root.get("success").and_then(Value::as_bool);

        Ok(Self {
            code,
            message,
            success,
            root,
        })
    }

    /// Application code, if the response carried one
    pub fn code(&self) -> Option<i64> {
        self.code
    }

    /// Message, if the response carried one
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Top-level `success` flag, if present
    pub fn success(&self) -> Option<bool> {
        self.success
    }

    /// True unless a code is present and differs from [`SUCCESS_CODE`]
    pub fn is_success(&self) -> bool {
        self.code.map_or(true, |code| code == SUCCESS_CODE)
    }

    /// The `data` payload (`Value::Null` when absent)
    pub fn data(&self) -> &Value {
        &self.root["data"]
    }

    /// A top-level field (`Value::Null` when absent)
    pub fn field(&self, key: &str) -> &Value {
        &self.root[key]
    }

    /// A non-empty string inside `data`
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data()
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Deserializes the `data` payload, using the default for a null payload
    pub fn data_as<T: DeserializeOwned + Default>(&self) -> Result<T, CzkError> {
        let data = self.data();
        if data.is_null() {
            return Ok(T::default());
        }
        serde_json::from_value(data.clone())
            .map_err(|e| CzkError::Decode(format!("unexpected data payload: {e}")))
    }

    /// Message for error reporting
    pub fn error_message(&self) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| UNKNOWN_ERROR.to_string())
    }

    /// Converts a failing envelope into [`CzkError::Application`]
    pub fn check(self) -> Result<Self, CzkError> {
        match self.code {
            Some(code) if code != SUCCESS_CODE => Err(CzkError::Application {
                code,
                message: self.error_message(),
            }),
            _ => Ok(self),
        }
    }
}

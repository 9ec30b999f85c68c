//! Normalization of Kubernetes API failures.
//!
//! The cluster client surfaces failures in several shapes: a structured
//! `Status` body, a non-JSON body, or a transport error with no response at
//! all. Everything is reduced to one [`ClusterErrorInfo`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default status code when nothing more specific is known.
const DEFAULT_STATUS_CODE: u16 = 500;
/// Default reason when the response carries none.
const DEFAULT_REASON: &str = "Unknown";

/// Uniform description of a cluster API failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterErrorInfo {
    pub status_code: u16,
    pub reason: String,
    pub message: String,
}

impl ClusterErrorInfo {
    /// Build from an HTTP-like response.
    ///
    /// A `code` inside a JSON body wins over the transport status, since the
    /// body is the more specific of the two. The message comes from the
    /// body's `message`, else the raw body text, else `fallback`.
    #[must_use]
    pub fn from_response(status_code: u16, body: Option<&str>, fallback: &str) -> Self {
        let mut info = Self {
            status_code: if status_code == 0 {
                DEFAULT_STATUS_CODE
            } else {
                status_code
            },
            reason: DEFAULT_REASON.to_string(),
            message: String::new(),
        };

        let body = body.map(str::trim).filter(|b| !b.is_empty());
        match body {
            Some(text) if text.starts_with('{') => match serde_json::from_str::<Value>(text) {
                Ok(Value::Object(obj)) => {
                    info.message = obj
                        .get("message")
                        .and_then(Value::as_str)
                        .filter(|m| !m.is_empty())
                        .map_or_else(|| text.to_string(), str::to_string);
                    if let Some(reason) = obj
                        .get("reason")
                        .and_then(Value::as_str)
                        .filter(|r| !r.is_empty())
                    {
                        info.reason = reason.to_string();
                    }
                    if let Some(code) = obj
                        .get("code")
                        .and_then(Value::as_u64)
                        .and_then(|c| u16::try_from(c).ok())
                        .filter(|c| *c != 0)
                    {
                        info.status_code = code;
                    }
                }
                _ => info.message = text.to_string(),
            },
            Some(text) => info.message = text.to_string(),
            None => info.message = fallback.to_string(),
        }

        if info.message.is_empty() {
            info.message = format!("Kubernetes API error (status code: {})", info.status_code);
        }
        info
    }

    /// Build from a message only, for failures without any response.
    #[must_use]
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            status_code: DEFAULT_STATUS_CODE,
            reason: DEFAULT_REASON.to_string(),
            message: message.into(),
        }
    }

    /// Normalize a `kube` client error.
    #[must_use]
    pub fn from_kube(err: &kube::Error) -> Self {
        match err {
            kube::Error::Api(response) => {
                // The client already decoded the Status body; re-run it
                // through the same precedence rules as a raw response.
                let body = serde_json::json!({
                    "code": response.code,
                    "reason": response.reason,
                    "message": response.message,
                });
                Self::from_response(response.code, Some(&body.to_string()), &err.to_string())
            }
            other => Self::from_message(other.to_string()),
        }
    }

    /// Normalize an arbitrary error value.
    ///
    /// Recognizes `kube` errors anywhere in the source chain; anything else
    /// falls back to its display form.
    #[must_use]
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
        while let Some(e) = current {
            if let Some(kube_err) = e.downcast_ref::<kube::Error>() {
                return Self::from_kube(kube_err);
            }
            if let Some(cluster_err) = e.downcast_ref::<crate::error::ClusterError>() {
                return cluster_err.0.clone();
            }
            current = e.source();
        }
        Self::from_message(err.to_string())
    }

    /// Whether the API reported the object as missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status_code == 404
    }
}

impl std::fmt::Display for ClusterErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}: {}", self.status_code, self.reason, self.message)
    }
}

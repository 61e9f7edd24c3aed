//! RPC envelope shared by the mediator and agent services.
//!
//! Every remote call is a JSON `RpcRequest` posted to a service's `/rpc`
//! endpoint. The answer is either `{"result": ...}` or
//! `{"error": {"kind": ..., "message": ...}}`.
//!
//! Each method carries its own `MAJOR.MINOR` version tag. A server serves a
//! request when the major versions match and the requested minor is not newer
//! than the one the server implements, so old callers keep working against
//! newer servers.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A per-method `MAJOR.MINOR` version tag.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RpcVersion {
    /// Incompatible protocol generations.
    pub major: u16,
    /// Backwards-compatible additions within a major.
    pub minor: u16,
}

impl RpcVersion {
    /// Create a version tag.
    #[must_use]
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    /// Returns true if a server implementing `self` can answer a caller
    /// that asked for `requested`.
    #[must_use]
    pub const fn can_serve(&self, requested: &Self) -> bool {
        self.major == requested.major && requested.minor <= self.minor
    }
}

impl fmt::Debug for RpcVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RpcVersion({}.{})", self.major, self.minor)
    }
}

impl fmt::Display for RpcVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for RpcVersion {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::InvalidVersion(s.to_string());
        let (major, minor) = s.split_once('.').ok_or_else(invalid)?;
        Ok(Self {
            major: major.parse().map_err(|_| invalid())?,
            minor: minor.parse().map_err(|_| invalid())?,
        })
    }
}

impl TryFrom<String> for RpcVersion {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RpcVersion> for String {
    fn from(version: RpcVersion) -> Self {
        version.to_string()
    }
}

/// A remote method invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    /// The method name.
    pub method: String,
    /// The version tag the caller was built against.
    pub version: RpcVersion,
    /// Named arguments.
    #[serde(default)]
    pub args: serde_json::Value,
}

impl RpcRequest {
    /// Build a request, serializing the arguments.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Payload` if the arguments cannot be serialized.
    pub fn new<A: Serialize>(
        method: impl Into<String>,
        version: RpcVersion,
        args: &A,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            method: method.into(),
            version,
            args: serde_json::to_value(args)?,
        })
    }

    /// Decode the arguments into the method's argument struct.
    ///
    /// # Errors
    ///
    /// Returns a `bad_request` error if the arguments don't match.
    pub fn decode_args<A: DeserializeOwned>(&self) -> Result<A, RpcError> {
        serde_json::from_value(self.args.clone()).map_err(|e| {
            RpcError::new(
                RpcErrorKind::BadRequest,
                format!("invalid arguments for {}: {e}", self.method),
            )
        })
    }

    /// Check this request against a server's method table.
    ///
    /// # Errors
    ///
    /// Returns `bad_request` for unknown methods and `version_mismatch` when
    /// the server cannot serve the requested version.
    pub fn negotiate(&self, table: &[(&str, RpcVersion)]) -> Result<RpcVersion, RpcError> {
        let served = table
            .iter()
            .find(|(name, _)| *name == self.method)
            .map(|(_, version)| *version)
            .ok_or_else(|| {
                RpcError::new(
                    RpcErrorKind::BadRequest,
                    format!("unknown method: {}", self.method),
                )
            })?;

        if served.can_serve(&self.version) {
            Ok(served)
        } else {
            Err(RpcError::from(CoreError::VersionMismatch {
                method: self.method.clone(),
                requested: self.version,
                served,
            }))
        }
    }
}

/// The answer to an `RpcRequest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RpcResponse {
    /// The method's return value.
    Result(serde_json::Value),
    /// The method failed.
    Error(RpcError),
}

impl RpcResponse {
    /// Wrap a successful return value.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Payload` if the value cannot be serialized.
    pub fn ok<T: Serialize>(value: &T) -> Result<Self, CoreError> {
        Ok(Self::Result(serde_json::to_value(value)?))
    }

    /// Unwrap the response into the expected return type.
    ///
    /// # Errors
    ///
    /// Returns the remote error, or an `internal` error if the payload does
    /// not decode into `T`.
    pub fn into_result<T: DeserializeOwned>(self) -> Result<T, RpcError> {
        match self {
            Self::Result(value) => serde_json::from_value(value).map_err(|e| {
                RpcError::new(RpcErrorKind::Internal, format!("invalid result payload: {e}"))
            }),
            Self::Error(err) => Err(err),
        }
    }
}

/// Category of a remote failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RpcErrorKind {
    /// The record does not exist under the active read view.
    NotFound,
    /// A unique field collided.
    Conflict,
    /// A compare-and-swap condition did not hold.
    ConditionFailed,
    /// The server cannot serve the requested method version.
    VersionMismatch,
    /// The request was malformed.
    BadRequest,
    /// The server failed for any other reason.
    Internal,
}

impl RpcErrorKind {
    /// The wire name of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::ConditionFailed => "condition_failed",
            Self::VersionMismatch => "version_mismatch",
            Self::BadRequest => "bad_request",
            Self::Internal => "internal",
        }
    }

    /// The HTTP status a server answers with for this kind.
    #[must_use]
    pub const fn http_status_code(self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::Conflict | Self::ConditionFailed => 409,
            Self::VersionMismatch | Self::BadRequest => 400,
            Self::Internal => 500,
        }
    }
}

impl fmt::Display for RpcErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure reported by a remote service.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct RpcError {
    /// Failure category.
    pub kind: RpcErrorKind,
    /// Human-readable description.
    pub message: String,
    /// Kind-specific payload (conflicting field, current record, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

impl RpcError {
    /// Create an error without detail.
    #[must_use]
    pub fn new(kind: RpcErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
        }
    }

    /// Attach a detail payload.
    #[must_use]
    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = Some(detail);
        self
    }
}

impl From<CoreError> for RpcError {
    fn from(err: CoreError) -> Self {
        let kind = match err {
            CoreError::VersionMismatch { .. } => RpcErrorKind::VersionMismatch,
            CoreError::InvalidId(_) | CoreError::InvalidVersion(_) => RpcErrorKind::BadRequest,
            CoreError::Payload(_) => RpcErrorKind::Internal,
        };
        Self::new(kind, err.to_string())
    }
}
